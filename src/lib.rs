// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! User-space driver and runtime for Hailo PCIe neural-network
//! accelerators.
//!
//! # Overview
//!
//! The accelerator is programmed through a kernel character device
//! (`/dev/hailoN`). This crate carries the whole host-side path on top
//! of that node:
//!
//! * Parsing HEF artifacts: the compiled network container with its
//!   header, integrity hashes and embedded configuration message
//! * Re-encoding per-context operation streams into the bit-exact
//!   binary action lists the firmware consumes
//! * The firmware control protocol: a request/response RPC carried by
//!   the driver's `fw-control` ioctl
//! * The VDMA data path: mapped buffers, descriptor lists, channel
//!   management and interrupt-driven completion
//! * The activation state machine that composes all of the above to
//!   bring a network group on line and tear it down again
//!
//! The ioctl layouts target the 4.23 driver series; see [`core::abi`].
//!
//! # Usage
//!
//! ```no_run
//! use hailo_runtime::{ConfiguredNetworkGroup, DeviceOptions, HailoDevice, Hef};
//!
//! let device = HailoDevice::open_first(DeviceOptions::default()).unwrap();
//! let hef = Hef::open("resnet50.hef").unwrap();
//!
//! let group = ConfiguredNetworkGroup::new(&device, hef.network_groups()[0].clone(), 0);
//! group.configure().unwrap();
//! group.activate().unwrap();
//! // ... run inference traffic over the VDMA channels ...
//! group.deactivate().unwrap();
//! ```

#![warn(missing_docs)]

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

pub mod control;
pub mod core;
pub mod hef;
pub mod network_group;
pub mod result;
pub mod vdma;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::{
    control::{ControlTransport, CpuId, DeviceIdentity, FirmwareVersion},
    core::{device::HailoDevice, options::DeviceOptions},
    hef::{Hef, NetworkGroupInfo, StreamInfo},
    network_group::{ConfiguredNetworkGroup, NetworkGroupState},
    result::{HailoError, HailoResult, ValidationError},
};
