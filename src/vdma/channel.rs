// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Channel operations: enable, launch, completion wait and the
//! synchronous transfer helpers built from them.

use std::time::Duration;

use crate::{
    core::{abi, device::HailoDevice, errors},
    result::{HailoError, HailoResult},
    vdma::{
        buffer::MappedBuffer, descriptor::DescriptorList, ChannelDirection, ChannelId,
        InterruptsDomain,
    },
};

/// One VDMA channel of an open device.
pub struct VdmaChannel<'d> {
    device: &'d HailoDevice,
    id: ChannelId,
}

impl<'d> VdmaChannel<'d> {
    /// Wrap a channel of the given device.
    pub fn new(device: &'d HailoDevice, id: ChannelId) -> VdmaChannel<'d> {
        VdmaChannel { device, id }
    }

    /// The channel's address.
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Enable this channel.
    pub fn enable(&self, enable_timestamps: bool) -> HailoResult<()> {
        self.device
            .vdma_enable_channels(self.id.bitmap(), enable_timestamps)
    }

    /// Disable this channel, clearing exactly its bit.
    pub fn disable(&self) -> HailoResult<()> {
        self.device.vdma_disable_channels(self.id.bitmap())
    }

    /// Launch a transfer over `segments` of a mapped buffer, given as
    /// `(offset, len)` pairs.
    pub fn launch(
        &self,
        desc_list: &DescriptorList<'_>,
        starting_desc: u32,
        buffer: &MappedBuffer<'_>,
        segments: &[(usize, usize)],
        last_interrupts_domain: InterruptsDomain,
    ) -> HailoResult<()> {
        if segments.is_empty() || segments.len() > abi::MAX_TRANSFER_BUFFERS {
            return Err(HailoError::InvalidArgument(format!(
                "transfer needs 1..={} segments, got {}",
                abi::MAX_TRANSFER_BUFFERS,
                segments.len()
            )));
        }
        let mut buffers = [abi::VdmaTransferBuffer::default(); abi::MAX_TRANSFER_BUFFERS];
        for (slot, (offset, len)) in buffers.iter_mut().zip(segments) {
            if offset + len > buffer.mapped_len() {
                return Err(HailoError::InvalidArgument(format!(
                    "segment {offset}+{len} overruns a {}-byte buffer",
                    buffer.mapped_len()
                )));
            }
            *slot = abi::VdmaTransferBuffer {
                address: (buffer.base_addr() + offset) as u64,
                size: *len as u32,
                buffer_type: abi::BUFFER_TYPE_USER_PTR,
            };
        }

        let mut params = abi::VdmaLaunchTransfer {
            engine_index: self.id.engine(),
            channel_index: self.id.index(),
            desc_handle: desc_list.handle(),
            starting_desc,
            should_bind: 1,
            buffers_count: segments.len() as u8,
            buffers,
            first_interrupts_domain: InterruptsDomain::empty().bits(),
            last_interrupts_domain: last_interrupts_domain.bits(),
            is_debug: 0,
        };
        trace!("Launching {}-segment transfer on {}", segments.len(), self.id);
        self.device.vdma_launch_transfer(&mut params)
    }

    /// Block until this channel signals, or the watchdog expires.
    ///
    /// Returns the completion records of exactly the channels that
    /// fired; re-issue the wait when expecting further firings. A
    /// record carrying an error marker aborts with a stream error.
    pub fn wait(&self, timeout: Duration) -> HailoResult<Vec<abi::ChannelIrqData>> {
        let records = self.device.vdma_interrupts_wait(self.id.bitmap(), timeout)?;
        for record in &records {
            // Copy out of the packed record before formatting.
            let (engine, channel) = (record.engine_index, record.channel_index);
            let (host_error, device_error) = (record.host_error, record.device_error);
            let is_active = record.is_active;
            if host_error != 0
                || device_error != 0
                || is_active == abi::TRANSFER_CHANNEL_WITH_ERROR
            {
                warn!(
                    "Channel {engine}:{channel} signalled an error \
                     (host {host_error}, device {device_error})"
                );
                return Err(HailoError::Driver(errors::Error::StreamAbort));
            }
        }
        Ok(records)
    }

    /// Write `data` into the buffer, flush it for the device, launch
    /// the input transfer and wait for completion.
    pub fn write_sync(
        &self,
        desc_list: &DescriptorList<'_>,
        buffer: &mut MappedBuffer<'_>,
        data: &[u8],
        timeout: Duration,
    ) -> HailoResult<()> {
        if self.id.direction() != ChannelDirection::HostToDevice {
            return Err(HailoError::InvalidArgument(format!(
                "channel {} cannot carry host-to-device traffic",
                self.id
            )));
        }
        buffer.write_data(data)?;
        buffer.sync_for_device()?;
        self.launch(desc_list, 0, buffer, &[(0, data.len())], InterruptsDomain::HOST)?;
        self.wait(timeout)?;
        Ok(())
    }

    /// Launch the output transfer, wait for completion, then pull the
    /// device's writes back into `out`.
    pub fn read_sync(
        &self,
        desc_list: &DescriptorList<'_>,
        buffer: &MappedBuffer<'_>,
        out: &mut [u8],
        timeout: Duration,
    ) -> HailoResult<()> {
        if self.id.direction() != ChannelDirection::DeviceToHost {
            return Err(HailoError::InvalidArgument(format!(
                "channel {} cannot carry device-to-host traffic",
                self.id
            )));
        }
        self.launch(desc_list, 0, buffer, &[(0, out.len())], InterruptsDomain::HOST)?;
        self.wait(timeout)?;
        buffer.sync_for_cpu()?;
        buffer.read_data(out)
    }
}

#[cfg(test)]
mod tests {
    use crate::core::{abi::DmaDirection, device::HailoDevice, options::DeviceOptions};

    use super::*;

    #[test]
    #[ignore = "requires an accelerator at /dev/hailo0"]
    fn loopback_transfer_smoke() {
        let dev = HailoDevice::open("/dev/hailo0", DeviceOptions::default()).unwrap();

        let input = VdmaChannel::new(&dev, ChannelId::new(0, 0).unwrap());
        let output = VdmaChannel::new(&dev, ChannelId::new(0, 16).unwrap());
        input.enable(false).unwrap();
        output.enable(false).unwrap();

        let mut in_buf = MappedBuffer::new(&dev, 4096, DmaDirection::ToDevice).unwrap();
        let out_buf = MappedBuffer::new(&dev, 4096, DmaDirection::FromDevice).unwrap();
        let in_list = DescriptorList::new(&dev, in_buf.mapped_len(), false).unwrap();
        let out_list = DescriptorList::new(&dev, out_buf.mapped_len(), false).unwrap();
        in_list
            .program(&in_buf, input.id().index(), 0, InterruptsDomain::HOST)
            .unwrap();
        out_list
            .program(&out_buf, output.id().index(), 0, InterruptsDomain::HOST)
            .unwrap();

        let frame = vec![0x3c; 4096];
        let timeout = dev.options().wait_timeout();
        input
            .write_sync(&in_list, &mut in_buf, &frame, timeout)
            .unwrap();
        let mut result = vec![0u8; 4096];
        output
            .read_sync(&out_list, &out_buf, &mut result, timeout)
            .unwrap();

        input.disable().unwrap();
        output.disable().unwrap();
        dev.close();
    }
}
