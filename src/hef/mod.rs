// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Parsing of HEF artifacts: the on-disk header, the embedded message
//! and the firmware action-list codec.

pub mod action;
pub mod header;
pub mod model;
pub mod proto;

pub use self::{
    action::{build_action_list, packed_lcu_id, packed_vdma_channel_id, Action, SequencerConfig},
    header::{HefDigest, HefHeader, HefVersion, HEF_MAGIC},
    model::{
        ContextCategory, ContextInfo, DeviceArchitecture, FormatOrder, Hef, NetworkGroupInfo,
        NmsMetadata, Operation, QuantInfo, Shape, StreamDirection, StreamInfo,
    },
};
