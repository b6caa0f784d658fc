// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The VDMA data path: mapped buffers, descriptor lists and channels.

pub mod buffer;
pub mod channel;
pub mod descriptor;

use std::fmt;

use crate::{
    core::abi,
    result::{HailoError, HailoResult},
};

pub use self::{buffer::MappedBuffer, channel::VdmaChannel, descriptor::DescriptorList};
pub use crate::core::abi::{DmaDirection, InterruptsDomain, SyncDirection};

/// Which way a channel moves data, fixed by its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelDirection {
    /// Indices 0..16.
    HostToDevice,
    /// Indices 16..32.
    DeviceToHost,
}

/// A VDMA channel address: engine and channel index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChannelId {
    engine: u8,
    index: u8,
}

impl ChannelId {
    /// Validate and build a channel id.
    pub fn new(engine: u8, index: u8) -> HailoResult<ChannelId> {
        if usize::from(engine) >= abi::MAX_VDMA_ENGINES {
            return Err(HailoError::InvalidArgument(format!(
                "engine {engine} out of range 0..{}",
                abi::MAX_VDMA_ENGINES
            )));
        }
        if usize::from(index) >= abi::MAX_VDMA_CHANNELS_PER_ENGINE {
            return Err(HailoError::InvalidArgument(format!(
                "channel {index} out of range 0..{}",
                abi::MAX_VDMA_CHANNELS_PER_ENGINE
            )));
        }
        Ok(ChannelId { engine, index })
    }

    /// Engine this channel belongs to.
    pub fn engine(&self) -> u8 {
        self.engine
    }

    /// Channel index within the engine.
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Direction implied by the index convention.
    pub fn direction(&self) -> ChannelDirection {
        if usize::from(self.index) < abi::MAX_VDMA_CHANNELS_PER_ENGINE / 2 {
            ChannelDirection::HostToDevice
        } else {
            ChannelDirection::DeviceToHost
        }
    }

    /// Per-engine bitmap selecting only this channel.
    pub fn bitmap(&self) -> [u32; abi::MAX_VDMA_ENGINES] {
        let mut bitmap = [0u32; abi::MAX_VDMA_ENGINES];
        bitmap[usize::from(self.engine)] = 1 << self.index;
        bitmap
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.engine, self.index)
    }
}

/// Per-engine bitmap selecting every channel in `channels`.
pub fn channel_bitmap(channels: &[ChannelId]) -> [u32; abi::MAX_VDMA_ENGINES] {
    let mut bitmap = [0u32; abi::MAX_VDMA_ENGINES];
    for channel in channels {
        bitmap[usize::from(channel.engine)] |= 1 << channel.index;
    }
    bitmap
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn out_of_range_ids_are_rejected() {
        assert!(ChannelId::new(0, 0).is_ok());
        assert!(ChannelId::new(2, 31).is_ok());
        assert_matches!(
            ChannelId::new(3, 0),
            Err(HailoError::InvalidArgument(_))
        );
        assert_matches!(
            ChannelId::new(0, 32),
            Err(HailoError::InvalidArgument(_))
        );
    }

    #[test]
    fn direction_follows_the_index_convention() {
        assert_eq!(
            ChannelId::new(0, 0).unwrap().direction(),
            ChannelDirection::HostToDevice
        );
        assert_eq!(
            ChannelId::new(0, 15).unwrap().direction(),
            ChannelDirection::HostToDevice
        );
        assert_eq!(
            ChannelId::new(0, 16).unwrap().direction(),
            ChannelDirection::DeviceToHost
        );
        assert_eq!(
            ChannelId::new(0, 31).unwrap().direction(),
            ChannelDirection::DeviceToHost
        );
    }

    #[test]
    fn bitmaps_set_one_bit_per_channel() {
        let channels = [
            ChannelId::new(0, 0).unwrap(),
            ChannelId::new(0, 16).unwrap(),
            ChannelId::new(1, 3).unwrap(),
        ];
        assert_eq!(channel_bitmap(&channels), [0x0001_0001, 0x0000_0008, 0]);
        assert_eq!(channels[1].bitmap(), [0x0001_0000, 0, 0]);
    }
}
