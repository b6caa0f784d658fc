// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Page-aligned DMA buffers mapped through the kernel driver.

use std::ops::{Deref, DerefMut};

use memmap2::MmapMut;

use crate::{
    core::{abi::DmaDirection, abi::SyncDirection, device::HailoDevice, util},
    result::{HailoError, HailoResult},
};

/// A zero-initialized, page-aligned buffer mapped for device DMA.
///
/// The kernel mapping lives exactly as long as this object; drop
/// unmaps exactly once, logging rather than propagating a failure so
/// cleanup always drains.
pub struct MappedBuffer<'d> {
    device: &'d HailoDevice,
    mapping: MmapMut,
    len: usize,
    direction: DmaDirection,
    handle: u64,
}

impl<'d> MappedBuffer<'d> {
    /// Allocate `len` bytes, rounded up to whole pages, and map them.
    pub fn new(
        device: &'d HailoDevice,
        len: usize,
        direction: DmaDirection,
    ) -> HailoResult<MappedBuffer<'d>> {
        if len == 0 {
            return Err(HailoError::InvalidArgument(
                "cannot map an empty buffer".to_string(),
            ));
        }
        let mapped_len = util::round_up_to_page(len);
        let mapping =
            MmapMut::map_anon(mapped_len).map_err(|err| HailoError::OutOfMemory(err.to_string()))?;

        let user_addr = mapping.as_ptr() as usize;
        debug_assert_eq!(user_addr % *util::PAGE_SIZE, 0);
        let handle = device.vdma_buffer_map(user_addr, mapped_len as u64, direction)?;

        Ok(MappedBuffer {
            device,
            mapping,
            len,
            direction,
            handle,
        })
    }

    /// Requested length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Never true: zero-length buffers cannot be mapped.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Mapped length: the requested length rounded up to whole pages.
    pub fn mapped_len(&self) -> usize {
        self.mapping.len()
    }

    /// Kernel handle naming this mapping.
    pub fn handle(&self) -> u64 {
        self.handle
    }

    /// DMA direction the mapping was created with.
    pub fn direction(&self) -> DmaDirection {
        self.direction
    }

    pub(crate) fn base_addr(&self) -> usize {
        self.mapping.as_ptr() as usize
    }

    /// Copy `data` to the front of the buffer.
    pub fn write_data(&mut self, data: &[u8]) -> HailoResult<()> {
        if data.len() > self.mapping.len() {
            return Err(HailoError::InvalidArgument(format!(
                "{} bytes do not fit a {}-byte buffer",
                data.len(),
                self.mapping.len()
            )));
        }
        self.mapping[..data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Copy the front of the buffer out into `out`.
    pub fn read_data(&self, out: &mut [u8]) -> HailoResult<()> {
        if out.len() > self.mapping.len() {
            return Err(HailoError::InvalidArgument(format!(
                "cannot read {} bytes from a {}-byte buffer",
                out.len(),
                self.mapping.len()
            )));
        }
        out.copy_from_slice(&self.mapping[..out.len()]);
        Ok(())
    }

    /// Flush host writes so the device sees them. Call before
    /// launching an input transfer.
    pub fn sync_for_device(&self) -> HailoResult<()> {
        self.device.vdma_buffer_sync(
            self.handle,
            SyncDirection::ForDevice,
            0,
            self.mapped_len() as u64,
        )
    }

    /// Invalidate so the host sees device writes. Call after an output
    /// transfer's completion wait returns.
    pub fn sync_for_cpu(&self) -> HailoResult<()> {
        self.device.vdma_buffer_sync(
            self.handle,
            SyncDirection::ForCpu,
            0,
            self.mapped_len() as u64,
        )
    }
}

impl Deref for MappedBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.mapping
    }
}

impl DerefMut for MappedBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.mapping
    }
}

impl Drop for MappedBuffer<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.device.vdma_buffer_unmap(self.handle) {
            warn!("Failed to unmap buffer {}: {err}", self.handle);
        }
    }
}
