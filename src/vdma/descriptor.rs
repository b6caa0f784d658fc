// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Descriptor lists: the device-addressable programs behind transfers.

use crate::{
    core::{abi, device::HailoDevice},
    result::{HailoError, HailoResult},
    vdma::{buffer::MappedBuffer, InterruptsDomain},
};

/// Descriptors needed to cover `buffer_len` bytes at `desc_page_size`
/// bytes per descriptor.
pub fn descriptor_count(buffer_len: usize, desc_page_size: u16) -> u64 {
    (buffer_len as u64).div_ceil(u64::from(desc_page_size))
}

/// A kernel-owned descriptor list.
///
/// Created and released through the driver exactly once; drop performs
/// the release, logging rather than propagating a failure so cleanup
/// always drains.
pub struct DescriptorList<'d> {
    device: &'d HailoDevice,
    handle: usize,
    dma_address: u64,
    desc_count: u64,
    desc_page_size: u16,
    is_circular: bool,
}

impl<'d> DescriptorList<'d> {
    /// Create a list big enough to cover `buffer_len` bytes, using the
    /// descriptor page size the device reports.
    pub fn new(
        device: &'d HailoDevice,
        buffer_len: usize,
        is_circular: bool,
    ) -> HailoResult<DescriptorList<'d>> {
        let desc_page_size = device.properties().desc_max_page_size;
        if desc_page_size == 0 {
            return Err(HailoError::InvalidArgument(
                "device reports a zero descriptor page size".to_string(),
            ));
        }
        let desc_count = descriptor_count(buffer_len, desc_page_size);
        let (handle, dma_address) =
            device.desc_list_create(desc_count, desc_page_size, is_circular)?;
        Ok(DescriptorList {
            device,
            handle,
            dma_address,
            desc_count,
            desc_page_size,
            is_circular,
        })
    }

    /// Kernel handle of this list.
    pub fn handle(&self) -> usize {
        self.handle
    }

    /// Bus address the device fetches descriptors from.
    pub fn dma_address(&self) -> u64 {
        self.dma_address
    }

    /// Number of descriptors in the list.
    pub fn desc_count(&self) -> u64 {
        self.desc_count
    }

    /// Bytes covered by each descriptor.
    pub fn desc_page_size(&self) -> u16 {
        self.desc_page_size
    }

    /// Whether the list wraps around.
    pub fn is_circular(&self) -> bool {
        self.is_circular
    }

    /// Bind the list to a mapped buffer and program its descriptors.
    pub fn program(
        &self,
        buffer: &MappedBuffer<'_>,
        channel_index: u8,
        starting_desc: u32,
        last_interrupts_domain: InterruptsDomain,
    ) -> HailoResult<()> {
        let mut params = abi::DescListProgram {
            buffer_handle: buffer.handle(),
            buffer_size: buffer.mapped_len() as u64,
            buffer_offset: 0,
            batch_size: 1,
            desc_handle: self.handle,
            channel_index,
            starting_desc,
            should_bind: 1,
            last_interrupts_domain: last_interrupts_domain.bits(),
            is_debug: 0,
            stride: 0,
        };
        self.device.desc_list_program(&mut params)
    }
}

impl Drop for DescriptorList<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.device.desc_list_release(self.handle) {
            warn!("Failed to release descriptor list {}: {err}", self.handle);
        }
    }
}
