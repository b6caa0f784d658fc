// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Parameter-struct layouts for the accelerator's kernel driver.
//!
//! This module targets the **4.23** driver/firmware ABI revision. Layouts
//! that changed between revisions (`DescListProgram`, the
//! `LaunchTransfer` buffer array, the `ChannelIrqData` record) are the
//! 4.23 ones; [`crate::HailoDevice::open`] refuses drivers outside that
//! series. Scalars are host little-endian, enum-typed fields are 4-byte
//! unsigned. Structs that cannot be expressed with natural alignment are
//! `#[repr(C, packed)]`; all sizes and the documented offsets are pinned
//! by the tests at the bottom of this file.

use bitflags::bitflags;

/// VDMA engines addressable through one device node.
pub const MAX_VDMA_ENGINES: usize = 3;

/// Channels per VDMA engine. Indices 0..16 run host to device, 16..32
/// device to host.
pub const MAX_VDMA_CHANNELS_PER_ENGINE: usize = 32;

/// Capacity of the interrupt-wait result array: every channel of every
/// engine may fire in one wait.
pub const CHANNEL_IRQ_DATA_COUNT: usize = MAX_VDMA_ENGINES * MAX_VDMA_CHANNELS_PER_ENGINE;

/// Buffer entries one launched transfer may scatter across.
pub const MAX_TRANSFER_BUFFERS: usize = 4;

/// Wire capacity of one firmware control frame, request or response.
pub const MAX_CONTROL_LENGTH: usize = 1500;

/// Capacity of one D2H notification payload.
pub const NOTIFICATION_BUFFER_SIZE: usize = 1500;

/// Capacity of one firmware log read.
pub const FW_LOG_BUFFER_SIZE: usize = 2048;

/// An application header carrying this address has no external action list.
pub const INVALID_EXTERNAL_ACTION_LIST_ADDRESS: u32 = 0;

/// Marker in transfer data for a channel that is not active.
pub const TRANSFER_CHANNEL_NOT_ACTIVE: u8 = 0xff;

/// Marker in transfer data for a channel that stopped with an error.
pub const TRANSFER_CHANNEL_WITH_ERROR: u8 = 0xfe;

/// Buffer handed to the driver by user pointer.
pub const BUFFER_TYPE_USER_PTR: u32 = 0;

/// Buffer handed to the driver as a dmabuf file descriptor.
pub const BUFFER_TYPE_DMABUF: u32 = 1;

/// DMA direction of a mapped buffer.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaDirection {
    /// Host memory is read by the device.
    ToDevice = 0,
    /// Host memory is written by the device.
    FromDevice = 1,
    /// Both directions.
    Bidirectional = 2,
}

/// Which way a cache synchronization runs.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    /// Make device writes visible to the host.
    ForCpu = 0,
    /// Make host writes visible to the device.
    ForDevice = 1,
}

bitflags! {
    /// Where a descriptor raises its interrupt when it completes.
    pub struct InterruptsDomain: u32 {
        /// Interrupt the device firmware.
        const DEVICE = 1 << 0;
        /// Interrupt the host.
        const HOST = 1 << 1;
    }
}

/// `query-device-properties` out-parameters.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct DeviceProperties {
    /// Largest descriptor page size the device supports.
    pub desc_max_page_size: u16,
    /// Board class, see [`BOARD_TYPE_HAILO8`].
    pub board_type: u32,
    /// How the driver allocates DMA memory.
    pub allocation_mode: u32,
    /// Physical transport of the DMA engines.
    pub dma_type: u32,
    /// Number of VDMA engines behind this node.
    pub dma_engines_count: u64,
    /// Non-zero once firmware has been loaded.
    pub is_fw_loaded: u8,
}

/// `board_type` value for the Hailo-8 class.
pub const BOARD_TYPE_HAILO8: u32 = 0;

/// `dma_type` value for PCIe-attached engines.
pub const DMA_TYPE_PCIE: u32 = 0;

/// `allocation_mode` value for user-space-backed buffers.
pub const ALLOCATION_MODE_USERPTR: u32 = 0;

/// `query-driver-info` out-parameters.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct DriverInfo {
    /// Major version of the loaded kernel driver.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
    /// Revision.
    pub revision: u32,
}

/// `vdma-buffer-map` parameters.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct VdmaBufferMap {
    /// Page-aligned virtual base of the region to map.
    pub user_addr: usize,
    /// Length of the region in bytes.
    pub size: u64,
    /// [`DmaDirection`] as its wire value.
    pub direction: u32,
    /// [`BUFFER_TYPE_USER_PTR`] or [`BUFFER_TYPE_DMABUF`].
    pub buffer_type: u32,
    /// Driver-allocated buffer handle, zero for user pointers.
    pub allocated_buffer_handle: usize,
    /// Out: handle naming the mapping in later calls.
    pub mapped_handle: u64,
}

/// `vdma-buffer-unmap` parameters.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct VdmaBufferUnmap {
    /// Handle returned by the map call.
    pub mapped_handle: u64,
}

/// `vdma-buffer-sync` parameters.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct VdmaBufferSync {
    /// Handle returned by the map call.
    pub handle: u64,
    /// [`SyncDirection`] as its wire value.
    pub sync_type: u32,
    /// Offset of the range to synchronize.
    pub offset: u64,
    /// Length of the range to synchronize.
    pub count: u64,
}

/// `desc-list-create` parameters.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct DescListCreate {
    /// Number of descriptors to allocate.
    pub desc_count: u64,
    /// Bytes covered by each descriptor.
    pub page_size: u16,
    /// Non-zero for a circular list.
    pub is_circular: u8,
    /// Out: opaque handle for program/release calls.
    pub desc_handle: usize,
    /// Out: bus address the device fetches descriptors from.
    pub dma_address: u64,
}

/// `desc-list-release` parameters.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct DescListRelease {
    /// Handle returned by the create call.
    pub desc_handle: usize,
}

/// `desc-list-program` parameters (4.23 layout, packed).
#[repr(C, packed)]
#[derive(Debug, Default, Clone, Copy)]
pub struct DescListProgram {
    /// Mapped buffer the descriptors will point into.
    pub buffer_handle: u64,
    /// Bytes of the buffer to cover.
    pub buffer_size: u64,
    /// Offset into the buffer of the first covered byte.
    pub buffer_offset: u64,
    /// Transfers batched per interrupt.
    pub batch_size: u32,
    /// Descriptor list to program.
    pub desc_handle: usize,
    /// Channel the list will feed.
    pub channel_index: u8,
    /// First descriptor to rewrite.
    pub starting_desc: u32,
    /// Non-zero to bind the buffer to the list.
    pub should_bind: u8,
    /// [`InterruptsDomain`] bits for the final descriptor.
    pub last_interrupts_domain: u32,
    /// Non-zero enables driver-side tracing of the list.
    pub is_debug: u8,
    /// Stride between batched transfers, zero for contiguous.
    pub stride: u32,
}

/// `vdma-enable-channels` parameters.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct VdmaEnableChannels {
    /// Bit `1 << index` of word `engine` selects a channel.
    pub channels_bitmap_per_engine: [u32; MAX_VDMA_ENGINES],
    /// Non-zero starts timestamp measurement on the enabled channels.
    pub enable_timestamps_measure: u8,
}

/// `vdma-disable-channels` parameters.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct VdmaDisableChannels {
    /// Bit `1 << index` of word `engine` selects a channel.
    pub channels_bitmap_per_engine: [u32; MAX_VDMA_ENGINES],
}

/// One fired channel in an interrupt-wait result (4.23 record, 8 bytes).
#[repr(C, packed)]
#[derive(Debug, Default, Clone, Copy)]
pub struct ChannelIrqData {
    /// Engine the channel belongs to.
    pub engine_index: u8,
    /// Channel index within the engine.
    pub channel_index: u8,
    /// Activity marker; see [`TRANSFER_CHANNEL_NOT_ACTIVE`] and
    /// [`TRANSFER_CHANNEL_WITH_ERROR`].
    pub is_active: u8,
    /// Descriptors the host has consumed.
    pub host_num_processed: u16,
    /// Non-zero on a host-side channel error.
    pub host_error: u8,
    /// Non-zero on a device-side channel error.
    pub device_error: u8,
    /// Non-zero when the driver validated the completed transfer.
    pub validation_success: u8,
}

/// `vdma-interrupts-wait` parameters (4.23 layout, packed).
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct VdmaInterruptsWait {
    /// In: channels to wait on, one bitmap word per engine.
    pub channels_bitmap_per_engine: [u32; MAX_VDMA_ENGINES],
    /// Out: number of entries filled in `irq_data`.
    pub channels_count: u8,
    /// Out: one record per channel that fired.
    pub irq_data: [ChannelIrqData; CHANNEL_IRQ_DATA_COUNT],
}

impl Default for VdmaInterruptsWait {
    fn default() -> VdmaInterruptsWait {
        VdmaInterruptsWait {
            channels_bitmap_per_engine: [0; MAX_VDMA_ENGINES],
            channels_count: 0,
            irq_data: [ChannelIrqData::default(); CHANNEL_IRQ_DATA_COUNT],
        }
    }
}

/// `interrupts-read-timestamp` parameters.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ChannelTimestamps {
    /// Engine the channel belongs to.
    pub engine_index: u32,
    /// Channel index within the engine.
    pub channel_index: u32,
    /// Out: number of entries filled in `timestamps`.
    pub timestamps_count: u32,
    /// Out: nanosecond timestamps of recent completions.
    pub timestamps: [u64; 32],
}

impl Default for ChannelTimestamps {
    fn default() -> ChannelTimestamps {
        ChannelTimestamps {
            engine_index: 0,
            channel_index: 0,
            timestamps_count: 0,
            timestamps: [0; 32],
        }
    }
}

/// One scatter entry of a launched transfer.
#[repr(C, packed)]
#[derive(Debug, Default, Clone, Copy)]
pub struct VdmaTransferBuffer {
    /// User pointer, or a dmabuf fd for [`BUFFER_TYPE_DMABUF`].
    pub address: u64,
    /// Bytes to transfer from this entry.
    pub size: u32,
    /// [`BUFFER_TYPE_USER_PTR`] or [`BUFFER_TYPE_DMABUF`].
    pub buffer_type: u32,
}

/// `vdma-launch-transfer` parameters (4.23 layout, packed).
#[repr(C, packed)]
#[derive(Debug, Default, Clone, Copy)]
pub struct VdmaLaunchTransfer {
    /// Engine of the launching channel.
    pub engine_index: u8,
    /// Channel index within the engine.
    pub channel_index: u8,
    /// Descriptor list carrying the transfer.
    pub desc_handle: usize,
    /// Descriptor the transfer starts at.
    pub starting_desc: u32,
    /// Non-zero to (re)bind the buffers to the list first.
    pub should_bind: u8,
    /// Entries of `buffers` that are valid.
    pub buffers_count: u8,
    /// Scatter list, `buffers_count` entries used.
    pub buffers: [VdmaTransferBuffer; MAX_TRANSFER_BUFFERS],
    /// [`InterruptsDomain`] bits for the first descriptor.
    pub first_interrupts_domain: u32,
    /// [`InterruptsDomain`] bits for the last descriptor.
    pub last_interrupts_domain: u32,
    /// Non-zero enables driver-side tracing of the transfer.
    pub is_debug: u8,
}

/// `fw-control` parameters: one request frame in, the response in-place.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FwControl {
    /// In: MD5 of the request frame. Out: MD5 of the response frame.
    pub expected_md5: [u8; 16],
    /// In: request frame length. Out: response frame length.
    pub buffer_len: u32,
    /// The frame bytes.
    pub buffer: [u8; MAX_CONTROL_LENGTH],
    /// How long the kernel may wait for the firmware, in milliseconds.
    pub timeout_ms: u32,
    /// Target processor, 0 application CPU, 1 core CPU.
    pub cpu_id: u32,
}

impl Default for FwControl {
    fn default() -> FwControl {
        FwControl {
            expected_md5: [0; 16],
            buffer_len: 0,
            buffer: [0; MAX_CONTROL_LENGTH],
            timeout_ms: 0,
            cpu_id: 0,
        }
    }
}

/// `read-notification` out-parameters.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct D2hNotification {
    /// Out: notification payload length.
    pub buffer_len: u64,
    /// Out: notification payload.
    pub buffer: [u8; NOTIFICATION_BUFFER_SIZE],
}

impl Default for D2hNotification {
    fn default() -> D2hNotification {
        D2hNotification {
            buffer_len: 0,
            buffer: [0; NOTIFICATION_BUFFER_SIZE],
        }
    }
}

/// `read-log` parameters.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FwLog {
    /// In: processor to read from, 0 application CPU, 1 core CPU.
    pub cpu_id: u32,
    /// Out: bytes filled in `buffer`.
    pub read_bytes: u32,
    /// Out: log text.
    pub buffer: [u8; FW_LOG_BUFFER_SIZE],
}

impl Default for FwLog {
    fn default() -> FwLog {
        FwLog {
            cpu_id: 0,
            read_bytes: 0,
            buffer: [0; FW_LOG_BUFFER_SIZE],
        }
    }
}

/// `write-action-list` parameters.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct WriteActionList {
    /// Serialized action-list blob to copy to device memory.
    pub data: usize,
    /// Length of the blob.
    pub size: u32,
    /// Out: device address the blob was written to.
    pub dma_address: u64,
}

/// `low-memory-buffer-alloc` parameters.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct LowMemoryBufferAlloc {
    /// Bytes to allocate.
    pub size: u64,
    /// Out: handle for the free call.
    pub handle: usize,
}

/// `low-memory-buffer-free` parameters.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct LowMemoryBufferFree {
    /// Handle returned by the alloc call.
    pub handle: usize,
}

/// `continuous-buffer-alloc` parameters.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct ContinuousBufferAlloc {
    /// Bytes to allocate.
    pub size: u64,
    /// Out: handle for the free call.
    pub handle: usize,
    /// Out: bus address of the allocation.
    pub dma_address: u64,
}

/// `continuous-buffer-free` parameters.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct ContinuousBufferFree {
    /// Handle returned by the alloc call.
    pub handle: usize,
}

/// `mark-as-in-use` out-parameters.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkAsInUse {
    /// Out: non-zero when another process already owned the device.
    pub in_use: u32,
}

#[cfg(test)]
mod tests {
    use std::mem::{offset_of, size_of};

    use super::*;

    #[test]
    fn struct_sizes_match_the_abi() {
        assert_eq!(size_of::<DeviceProperties>(), 32);
        assert_eq!(size_of::<DriverInfo>(), 12);
        assert_eq!(size_of::<VdmaBufferMap>(), 40);
        assert_eq!(size_of::<VdmaBufferUnmap>(), 8);
        assert_eq!(size_of::<VdmaBufferSync>(), 32);
        assert_eq!(size_of::<DescListCreate>(), 32);
        assert_eq!(size_of::<DescListRelease>(), 8);
        assert_eq!(size_of::<DescListProgram>(), 51);
        assert_eq!(size_of::<VdmaEnableChannels>(), 16);
        assert_eq!(size_of::<VdmaDisableChannels>(), 12);
        assert_eq!(size_of::<ChannelIrqData>(), 8);
        assert_eq!(
            size_of::<VdmaInterruptsWait>(),
            13 + 8 * CHANNEL_IRQ_DATA_COUNT
        );
        assert_eq!(size_of::<VdmaTransferBuffer>(), 16);
        assert_eq!(size_of::<VdmaLaunchTransfer>(), 89);
        assert_eq!(size_of::<FwControl>(), 1528);
        assert_eq!(size_of::<D2hNotification>(), 1512);
        assert_eq!(size_of::<WriteActionList>(), 24);
    }

    #[test]
    fn field_offsets_match_the_abi() {
        assert_eq!(offset_of!(DeviceProperties, desc_max_page_size), 0);
        assert_eq!(offset_of!(DeviceProperties, board_type), 4);
        assert_eq!(offset_of!(DeviceProperties, allocation_mode), 8);
        assert_eq!(offset_of!(DeviceProperties, dma_type), 12);
        assert_eq!(offset_of!(DeviceProperties, dma_engines_count), 16);
        assert_eq!(offset_of!(DeviceProperties, is_fw_loaded), 24);

        assert_eq!(offset_of!(VdmaBufferMap, user_addr), 0);
        assert_eq!(offset_of!(VdmaBufferMap, size), 8);
        assert_eq!(offset_of!(VdmaBufferMap, direction), 16);
        assert_eq!(offset_of!(VdmaBufferMap, buffer_type), 20);
        assert_eq!(offset_of!(VdmaBufferMap, allocated_buffer_handle), 24);
        assert_eq!(offset_of!(VdmaBufferMap, mapped_handle), 32);

        assert_eq!(offset_of!(VdmaBufferSync, handle), 0);
        assert_eq!(offset_of!(VdmaBufferSync, sync_type), 8);
        assert_eq!(offset_of!(VdmaBufferSync, offset), 16);
        assert_eq!(offset_of!(VdmaBufferSync, count), 24);

        assert_eq!(offset_of!(DescListCreate, desc_count), 0);
        assert_eq!(offset_of!(DescListCreate, page_size), 8);
        assert_eq!(offset_of!(DescListCreate, is_circular), 10);
        assert_eq!(offset_of!(DescListCreate, desc_handle), 16);
        assert_eq!(offset_of!(DescListCreate, dma_address), 24);

        assert_eq!(offset_of!(VdmaEnableChannels, enable_timestamps_measure), 12);

        assert_eq!(offset_of!(VdmaInterruptsWait, channels_count), 12);
        assert_eq!(offset_of!(VdmaInterruptsWait, irq_data), 13);

        assert_eq!(offset_of!(FwControl, expected_md5), 0);
        assert_eq!(offset_of!(FwControl, buffer_len), 16);
        assert_eq!(offset_of!(FwControl, buffer), 20);
        assert_eq!(offset_of!(FwControl, timeout_ms), 1520);
        assert_eq!(offset_of!(FwControl, cpu_id), 1524);

        assert_eq!(offset_of!(D2hNotification, buffer_len), 0);
        assert_eq!(offset_of!(D2hNotification, buffer), 8);
    }

    #[test]
    fn interrupt_domain_bits_compose() {
        let both = InterruptsDomain::DEVICE | InterruptsDomain::HOST;
        assert_eq!(both.bits(), 3);
        assert_eq!(InterruptsDomain::empty().bits(), 0);
    }
}
