// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Ioctl command words for the accelerator driver.
//!
//! Commands follow the standard Linux `_IOC` convention:
//! `(dir << 30) | (size << 16) | (type << 8) | nr`. Three magic types are
//! in use: `'g'` for general device queries, `'v'` for the VDMA engines
//! and `'n'` for the neural-network core.

use std::mem::size_of;

use super::abi;

/// Direction bits of an ioctl command word.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoctlDir {
    /// No parameter transfer.
    None = 0,
    /// Parameters are copied to the kernel.
    Write = 1,
    /// Parameters are copied back from the kernel.
    Read = 2,
    /// Both directions.
    ReadWrite = 3,
}

/// Magic type for general device queries.
pub const MAGIC_GENERAL: u8 = b'g';
/// Magic type for the VDMA engines.
pub const MAGIC_VDMA: u8 = b'v';
/// Magic type for the neural-network core.
pub const MAGIC_NNC: u8 = b'n';

/// Encode a command word from its parts.
pub const fn code(dir: IoctlDir, magic: u8, nr: u8, size: usize) -> u32 {
    ((dir as u32) << 30) | ((size as u32) << 16) | ((magic as u32) << 8) | nr as u32
}

/// Decode a command word back into `(dir, magic, nr, size)`.
pub fn decode(cmd: u32) -> (IoctlDir, u8, u8, usize) {
    let dir = match cmd >> 30 {
        0 => IoctlDir::None,
        1 => IoctlDir::Write,
        2 => IoctlDir::Read,
        _ => IoctlDir::ReadWrite,
    };
    let size = ((cmd >> 16) & 0x3fff) as usize;
    let magic = ((cmd >> 8) & 0xff) as u8;
    let nr = (cmd & 0xff) as u8;
    (dir, magic, nr, size)
}

// General ('g').

/// Query board properties; synthesized on drivers that predate it.
pub const QUERY_DEVICE_PROPERTIES: u32 = code(
    IoctlDir::Read,
    MAGIC_GENERAL,
    1,
    size_of::<abi::DeviceProperties>(),
);
/// Query the loaded driver's version triple.
pub const QUERY_DRIVER_INFO: u32 =
    code(IoctlDir::Read, MAGIC_GENERAL, 2, size_of::<abi::DriverInfo>());

// VDMA ('v').

/// Enable the channels selected by a per-engine bitmap.
pub const VDMA_ENABLE_CHANNELS: u32 = code(
    IoctlDir::Write,
    MAGIC_VDMA,
    0,
    size_of::<abi::VdmaEnableChannels>(),
);
/// Disable the channels selected by a per-engine bitmap.
pub const VDMA_DISABLE_CHANNELS: u32 = code(
    IoctlDir::Write,
    MAGIC_VDMA,
    1,
    size_of::<abi::VdmaDisableChannels>(),
);
/// Block until one of the requested channels signals.
pub const VDMA_INTERRUPTS_WAIT: u32 = code(
    IoctlDir::ReadWrite,
    MAGIC_VDMA,
    2,
    size_of::<abi::VdmaInterruptsWait>(),
);
/// Read completion timestamps recorded for one channel.
pub const VDMA_INTERRUPTS_READ_TIMESTAMPS: u32 = code(
    IoctlDir::ReadWrite,
    MAGIC_VDMA,
    3,
    size_of::<abi::ChannelTimestamps>(),
);
/// Map a user buffer for DMA.
pub const VDMA_BUFFER_MAP: u32 = code(
    IoctlDir::ReadWrite,
    MAGIC_VDMA,
    4,
    size_of::<abi::VdmaBufferMap>(),
);
/// Unmap a previously mapped buffer.
pub const VDMA_BUFFER_UNMAP: u32 = code(
    IoctlDir::Write,
    MAGIC_VDMA,
    5,
    size_of::<abi::VdmaBufferUnmap>(),
);
/// Synchronize the caches over a mapped range.
pub const VDMA_BUFFER_SYNC: u32 = code(
    IoctlDir::Write,
    MAGIC_VDMA,
    6,
    size_of::<abi::VdmaBufferSync>(),
);
/// Create a descriptor list.
pub const DESC_LIST_CREATE: u32 = code(
    IoctlDir::ReadWrite,
    MAGIC_VDMA,
    7,
    size_of::<abi::DescListCreate>(),
);
/// Release a descriptor list.
pub const DESC_LIST_RELEASE: u32 = code(
    IoctlDir::Write,
    MAGIC_VDMA,
    8,
    size_of::<abi::DescListRelease>(),
);
/// Point a descriptor list at a mapped buffer.
pub const DESC_LIST_PROGRAM: u32 = code(
    IoctlDir::Write,
    MAGIC_VDMA,
    9,
    size_of::<abi::DescListProgram>(),
);
/// Allocate a buffer below the 32-bit DMA boundary.
pub const LOW_MEMORY_BUFFER_ALLOC: u32 = code(
    IoctlDir::ReadWrite,
    MAGIC_VDMA,
    10,
    size_of::<abi::LowMemoryBufferAlloc>(),
);
/// Free a low-memory buffer.
pub const LOW_MEMORY_BUFFER_FREE: u32 = code(
    IoctlDir::Write,
    MAGIC_VDMA,
    11,
    size_of::<abi::LowMemoryBufferFree>(),
);
/// Claim the device for this process.
pub const MARK_AS_IN_USE: u32 = code(
    IoctlDir::Read,
    MAGIC_VDMA,
    12,
    size_of::<abi::MarkAsInUse>(),
);
/// Allocate a physically continuous buffer.
pub const CONTINUOUS_BUFFER_ALLOC: u32 = code(
    IoctlDir::ReadWrite,
    MAGIC_VDMA,
    13,
    size_of::<abi::ContinuousBufferAlloc>(),
);
/// Free a physically continuous buffer.
pub const CONTINUOUS_BUFFER_FREE: u32 = code(
    IoctlDir::Write,
    MAGIC_VDMA,
    14,
    size_of::<abi::ContinuousBufferFree>(),
);
/// Launch a transfer on an enabled channel. No out fields.
pub const VDMA_LAUNCH_TRANSFER: u32 = code(
    IoctlDir::Write,
    MAGIC_VDMA,
    15,
    size_of::<abi::VdmaLaunchTransfer>(),
);

// NNC ('n').

/// Carry one firmware control frame and return its response in-place.
pub const FW_CONTROL: u32 = code(
    IoctlDir::ReadWrite,
    MAGIC_NNC,
    0,
    size_of::<abi::FwControl>(),
);
/// Block for the next device-to-host notification.
pub const READ_NOTIFICATION: u32 = code(
    IoctlDir::Read,
    MAGIC_NNC,
    1,
    size_of::<abi::D2hNotification>(),
);
/// Wake any blocked notification reader and stop delivery.
pub const DISABLE_NOTIFICATION: u32 = code(IoctlDir::None, MAGIC_NNC, 2, 0);
/// Read the firmware's log buffer.
pub const READ_LOG: u32 = code(IoctlDir::ReadWrite, MAGIC_NNC, 3, size_of::<abi::FwLog>());
/// Hard-reset the neural-network core.
pub const RESET_NN_CORE: u32 = code(IoctlDir::None, MAGIC_NNC, 4, 0);
/// Write an action-list blob to device memory.
pub const WRITE_ACTION_LIST: u32 = code(
    IoctlDir::ReadWrite,
    MAGIC_NNC,
    5,
    size_of::<abi::WriteActionList>(),
);
