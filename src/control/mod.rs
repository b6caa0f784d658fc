// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The firmware control protocol: request/response frames, the typed
//! operations and the transport they ride on.

pub mod frame;
pub mod ops;

use std::time::Duration;

use crate::{core::device::HailoDevice, result::HailoResult};

pub use self::{
    frame::{Request, Response, ResponseHeader, CONTROL_PROTOCOL_VERSION},
    ops::{
        ApplicationHeader, ContextSwitchStatus, DeviceIdentity, FirmwareVersion, Opcode,
        ResetType,
    },
};

/// Processor a control request is addressed to.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuId {
    /// The application CPU.
    App = 0,
    /// The neural-network core CPU.
    Core = 1,
}

/// Carries packed control frames to the firmware and returns the raw
/// response frames.
///
/// [`HailoDevice`] is the production transport; tests substitute a
/// scripted one.
pub trait ControlTransport {
    /// Deliver one request frame and return the response frame.
    fn execute(&self, request: &[u8], cpu_id: CpuId, timeout: Duration) -> HailoResult<Vec<u8>>;
}

impl ControlTransport for HailoDevice {
    fn execute(&self, request: &[u8], cpu_id: CpuId, timeout: Duration) -> HailoResult<Vec<u8>> {
        self.fw_control(request, cpu_id as u32, timeout)
    }
}
