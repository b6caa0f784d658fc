// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Typed control operations.
//!
//! Each operation builds a request frame, hands it to the transport and
//! validates the response echo. Parameter payloads are little-endian;
//! only the frame layer around them is big-endian.

use std::time::Duration;

use crate::{
    control::{
        frame::{Request, Response, REQUEST_HEADER_SIZE},
        ControlTransport, CpuId,
    },
    core::{abi, errors, util},
    hef::ContextCategory,
    result::{HailoError, HailoResult},
};

use serde::Serialize;

/// Control operation codes.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Query the application firmware's identity.
    Identify = 0,
    /// Reset the chip or the neural-network core.
    Reset = 7,
    /// Install a network group's application header.
    SetNetworkGroupHeader = 32,
    /// Stream one chunk of a context's action list.
    SetContextInfo = 33,
    /// Read an installed context's action list back.
    DownloadContextActionList = 36,
    /// Drive the context-switch state machine.
    ChangeContextSwitchStatus = 37,
    /// Query the core firmware's identity.
    CoreIdentify = 42,
    /// Drop every configured network group.
    ClearConfiguredApps = 71,
}

impl Opcode {
    /// The wire value.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Processor that services this opcode.
    pub fn cpu(self) -> CpuId {
        match self {
            Opcode::Identify | Opcode::Reset => CpuId::App,
            _ => CpuId::Core,
        }
    }
}

/// Reset scopes of the RESET operation.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetType {
    /// Full chip reset.
    Chip = 0,
    /// Neural-network core only.
    NnCore = 1,
    /// Soft reset.
    Soft = 2,
    /// Soft reset even if the firmware objects.
    ForcedSoft = 3,
}

/// States of the firmware's context-switch machine.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSwitchStatus {
    /// Stop and clear the machine.
    Reset = 0,
    /// Run contexts.
    Enabled = 1,
    /// Hold between contexts.
    Paused = 2,
}

/// Wire value of a context category in SET_CONTEXT_INFO.
pub fn context_type_code(category: ContextCategory) -> u8 {
    match category {
        ContextCategory::Preliminary => 0,
        ContextCategory::Dynamic => 1,
        ContextCategory::BatchSwitching => 2,
        ContextCategory::Activation => 3,
    }
}

/// App index value that tells the firmware to ignore the field.
pub const APP_INDEX_IGNORE: u8 = 255;

/// The 41-byte network-group header installed before any context.
///
/// Unlike the frames around it this blob is little-endian throughout;
/// the firmware copies the raw struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationHeader {
    /// Number of dynamic contexts, at least 1.
    pub dynamic_contexts_count: u16,
    /// Run the preliminary context as soon as possible.
    pub preliminary_run_asap: bool,
    /// Let the firmware program batch registers.
    pub batch_register_config: bool,
    /// Group supports fast batch switching.
    pub can_fast_batch_switch: bool,
    /// Group was compiled with ABBALE support.
    pub is_abbale_supported: bool,
    /// Networks inside the group.
    pub networks_count: u8,
    /// Context-switch manager buffer size in bytes.
    pub csm_buffer_size: u16,
    /// Per-network batch sizes.
    pub batch_size: [u16; 8],
    /// Device address of a pre-written action list, or
    /// [`abi::INVALID_EXTERNAL_ACTION_LIST_ADDRESS`].
    pub external_action_list_address: u32,
    /// Boundary channels of the group, one bitmap word per engine.
    pub boundary_channels_bitmap: [u32; 3],
}

impl ApplicationHeader {
    /// Size of the serialized header.
    pub const SIZE: usize = 41;

    /// Serialize to the firmware's raw little-endian form.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(&self.dynamic_contexts_count.to_le_bytes());
        out.push(u8::from(self.preliminary_run_asap));
        out.push(u8::from(self.batch_register_config));
        out.push(u8::from(self.can_fast_batch_switch));
        out.push(u8::from(self.is_abbale_supported));
        out.push(self.networks_count);
        out.extend_from_slice(&self.csm_buffer_size.to_le_bytes());
        for batch in &self.batch_size {
            out.extend_from_slice(&batch.to_le_bytes());
        }
        out.extend_from_slice(&self.external_action_list_address.to_le_bytes());
        for word in &self.boundary_channels_bitmap {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out
    }
}

/// Largest context-data slice one SET_CONTEXT_INFO request can carry.
///
/// Derived from the wire capacity less the request header, the
/// parameter count and the three one-byte flag parameters with their
/// length prefixes, less the data parameter's own length prefix.
pub const MAX_CONTEXT_CHUNK: usize =
    abi::MAX_CONTROL_LENGTH - REQUEST_HEADER_SIZE - 4 - 3 * (4 + 1) - 4;

/// One slice of a context's serialized action list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextChunk<'a> {
    /// First chunk of the context.
    pub is_first: bool,
    /// Last chunk of the context.
    pub is_last: bool,
    /// The carried slice.
    pub data: &'a [u8],
}

/// Split a serialized action list into ordered chunks. An empty list
/// still produces one first-and-last chunk with no data.
pub fn context_chunks(data: &[u8]) -> Vec<ContextChunk<'_>> {
    if data.is_empty() {
        return vec![ContextChunk {
            is_first: true,
            is_last: true,
            data,
        }];
    }
    let count = data.len().div_ceil(MAX_CONTEXT_CHUNK);
    data.chunks(MAX_CONTEXT_CHUNK)
        .enumerate()
        .map(|(i, chunk)| ContextChunk {
            is_first: i == 0,
            is_last: i == count - 1,
            data: chunk,
        })
        .collect()
}

fn execute(
    transport: &dyn ControlTransport,
    request: &Request,
    cpu: CpuId,
    timeout: Duration,
) -> HailoResult<Response> {
    let packed = request.pack();
    if packed.len() > abi::MAX_CONTROL_LENGTH {
        return Err(HailoError::InvalidArgument(format!(
            "request frame of {} bytes exceeds the {}-byte wire capacity",
            packed.len(),
            abi::MAX_CONTROL_LENGTH
        )));
    }
    let raw = transport.execute(&packed, cpu, timeout)?;
    Response::parse(&raw)
}

fn roundtrip(
    transport: &dyn ControlTransport,
    request: &Request,
    opcode: Opcode,
    timeout: Duration,
) -> HailoResult<Vec<u8>> {
    let response = execute(transport, request, opcode.cpu(), timeout)?;
    response
        .expect(request.sequence, opcode.code())
        .map(|payload| payload.to_vec())
}

/// The firmware's version triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FirmwareVersion {
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
    /// Revision.
    pub revision: u32,
}

impl std::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.revision)
    }
}

/// Identity reported by IDENTIFY and CORE_IDENTIFY.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    /// Control protocol version the firmware speaks.
    pub protocol_version: u32,
    /// Firmware version triple.
    pub firmware_version: FirmwareVersion,
    /// Version of the firmware's logger format.
    pub logger_version: u32,
    /// Board name string.
    pub board_name: String,
}

impl DeviceIdentity {
    /// Wire size of the identity payload (4.23 firmware layout:
    /// five little-endian words, then a 32-byte NUL-padded name).
    pub const SIZE: usize = 52;

    fn parse(payload: &[u8]) -> HailoResult<DeviceIdentity> {
        if payload.len() < Self::SIZE {
            return Err(HailoError::Protocol(format!(
                "{}-byte identity payload is shorter than {}",
                payload.len(),
                Self::SIZE
            )));
        }
        let word = |offset: usize| {
            u32::from_le_bytes([
                payload[offset],
                payload[offset + 1],
                payload[offset + 2],
                payload[offset + 3],
            ])
        };
        let board_name = util::str_from_c_bytes(&payload[20..52])
            .ok_or_else(|| HailoError::Protocol("identity board name is not UTF-8".to_string()))?
            .to_string();
        Ok(DeviceIdentity {
            protocol_version: word(0),
            firmware_version: FirmwareVersion {
                major: word(4),
                minor: word(8),
                revision: word(12),
            },
            logger_version: word(16),
            board_name,
        })
    }
}

/// IDENTIFY: query the application firmware's identity.
pub fn identify(
    transport: &dyn ControlTransport,
    sequence: u32,
    timeout: Duration,
) -> HailoResult<DeviceIdentity> {
    let request = Request::new(sequence, Opcode::Identify.code());
    let payload = roundtrip(transport, &request, Opcode::Identify, timeout)?;
    DeviceIdentity::parse(&payload)
}

/// CORE_IDENTIFY: query the core firmware's identity.
pub fn core_identify(
    transport: &dyn ControlTransport,
    sequence: u32,
    timeout: Duration,
) -> HailoResult<DeviceIdentity> {
    let request = Request::new(sequence, Opcode::CoreIdentify.code());
    let payload = roundtrip(transport, &request, Opcode::CoreIdentify, timeout)?;
    DeviceIdentity::parse(&payload)
}

/// RESET: reset the chip or the neural-network core.
///
/// The firmware may be gone before it can answer, so a timed-out
/// round trip counts as success.
pub fn reset(
    transport: &dyn ControlTransport,
    sequence: u32,
    reset_type: ResetType,
    timeout: Duration,
) -> HailoResult<()> {
    let request =
        Request::new(sequence, Opcode::Reset.code()).param(vec![reset_type as u8]);
    match execute(transport, &request, Opcode::Reset.cpu(), timeout) {
        Ok(response) => response.expect(sequence, Opcode::Reset.code()).map(|_| ()),
        Err(HailoError::Timeout(_)) | Err(HailoError::Driver(errors::Error::Timeout)) => {
            debug!("Reset produced no response in time; treating as success");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// CLEAR_CONFIGURED_APPS: drop every configured network group.
pub fn clear_configured_apps(
    transport: &dyn ControlTransport,
    sequence: u32,
    timeout: Duration,
) -> HailoResult<()> {
    let request = Request::new(sequence, Opcode::ClearConfiguredApps.code());
    roundtrip(transport, &request, Opcode::ClearConfiguredApps, timeout).map(|_| ())
}

/// SET_NETWORK_GROUP_HEADER: install a group's application header.
pub fn set_network_group_header(
    transport: &dyn ControlTransport,
    sequence: u32,
    header: &ApplicationHeader,
    timeout: Duration,
) -> HailoResult<()> {
    let request = Request::new(sequence, Opcode::SetNetworkGroupHeader.code())
        .param(header.serialize());
    roundtrip(transport, &request, Opcode::SetNetworkGroupHeader, timeout).map(|_| ())
}

/// SET_CONTEXT_INFO: stream one chunk of a context's action list.
pub fn set_context_info(
    transport: &dyn ControlTransport,
    sequence: u32,
    category: ContextCategory,
    chunk: ContextChunk<'_>,
    timeout: Duration,
) -> HailoResult<()> {
    let request = Request::new(sequence, Opcode::SetContextInfo.code())
        .param(vec![u8::from(chunk.is_first)])
        .param(vec![u8::from(chunk.is_last)])
        .param(vec![context_type_code(category)])
        .param(chunk.data.to_vec());
    roundtrip(transport, &request, Opcode::SetContextInfo, timeout).map(|_| ())
}

/// CHANGE_CONTEXT_SWITCH_STATUS: drive the context-switch machine.
pub fn change_context_switch_status(
    transport: &dyn ControlTransport,
    sequence: u32,
    status: ContextSwitchStatus,
    app_index: u8,
    dynamic_batch_size: u16,
    batch_count: u16,
    timeout: Duration,
) -> HailoResult<()> {
    let request = Request::new(sequence, Opcode::ChangeContextSwitchStatus.code())
        .param(vec![status as u8])
        .param(vec![app_index])
        .param(dynamic_batch_size.to_be_bytes().to_vec())
        .param(batch_count.to_be_bytes().to_vec());
    roundtrip(transport, &request, Opcode::ChangeContextSwitchStatus, timeout).map(|_| ())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::testing::{MockReply, MockTransport};

    fn sample_header() -> ApplicationHeader {
        ApplicationHeader {
            dynamic_contexts_count: 2,
            preliminary_run_asap: false,
            batch_register_config: false,
            can_fast_batch_switch: false,
            is_abbale_supported: false,
            networks_count: 1,
            csm_buffer_size: 512,
            batch_size: [1, 0, 0, 0, 0, 0, 0, 0],
            external_action_list_address: abi::INVALID_EXTERNAL_ACTION_LIST_ADDRESS,
            boundary_channels_bitmap: [0; 3],
        }
    }

    #[test]
    fn application_header_serializes_to_its_documented_layout() {
        let bytes = sample_header().serialize();
        assert_eq!(bytes.len(), ApplicationHeader::SIZE);
        assert_eq!(bytes[0..2], [2, 0]); // dynamic contexts, LE
        assert_eq!(bytes[2..6], [0, 0, 0, 0]); // four flag bytes
        assert_eq!(bytes[6], 1); // networks
        assert_eq!(bytes[7..9], [0, 2]); // csm 512, LE
        assert_eq!(bytes[9..11], [1, 0]); // batch_size[0], LE
        assert_eq!(bytes[11..25], [0; 14]); // batch_size[1..]
        assert_eq!(bytes[25..29], [0; 4]); // no external action list
        assert_eq!(bytes[29..41], [0; 12]); // boundary bitmaps
    }

    #[test]
    fn opcodes_route_to_their_processors() {
        assert_eq!(Opcode::Identify.cpu(), CpuId::App);
        assert_eq!(Opcode::Reset.cpu(), CpuId::App);
        assert_eq!(Opcode::SetNetworkGroupHeader.cpu(), CpuId::Core);
        assert_eq!(Opcode::SetContextInfo.cpu(), CpuId::Core);
        assert_eq!(Opcode::ChangeContextSwitchStatus.cpu(), CpuId::Core);
        assert_eq!(Opcode::CoreIdentify.cpu(), CpuId::Core);
        assert_eq!(Opcode::ClearConfiguredApps.cpu(), CpuId::Core);
        assert_eq!(Opcode::ClearConfiguredApps.code(), 71);
        assert_eq!(Opcode::DownloadContextActionList.code(), 36);
    }

    #[test]
    fn empty_action_lists_yield_one_empty_chunk() {
        let chunks = context_chunks(&[]);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_first);
        assert!(chunks[0].is_last);
        assert!(chunks[0].data.is_empty());
    }

    #[test]
    fn chunks_split_at_the_wire_capacity() {
        assert_eq!(MAX_CONTEXT_CHUNK, 1461);

        let exact = vec![0u8; MAX_CONTEXT_CHUNK];
        let chunks = context_chunks(&exact);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_first && chunks[0].is_last);

        let bigger = vec![0u8; MAX_CONTEXT_CHUNK + 1];
        let chunks = context_chunks(&bigger);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].is_first && !chunks[0].is_last);
        assert!(!chunks[1].is_first && chunks[1].is_last);
        assert_eq!(chunks[0].data.len(), MAX_CONTEXT_CHUNK);
        assert_eq!(chunks[1].data.len(), 1);
    }

    #[test]
    fn every_chunked_request_fits_the_wire() {
        let big = vec![0xabu8; 4 * MAX_CONTEXT_CHUNK + 17];
        for chunk in context_chunks(&big) {
            let request = Request::new(1, Opcode::SetContextInfo.code())
                .param(vec![u8::from(chunk.is_first)])
                .param(vec![u8::from(chunk.is_last)])
                .param(vec![0])
                .param(chunk.data.to_vec());
            assert!(request.packed_len() <= abi::MAX_CONTROL_LENGTH);
        }
    }

    #[test]
    fn reset_treats_a_driver_timeout_as_success() {
        let transport = MockTransport::new();
        transport.push_reply(MockReply::DriverTimeout);
        reset(&transport, 9, ResetType::Chip, Duration::from_millis(10)).unwrap();

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].request.opcode, Opcode::Reset.code());
        assert_eq!(sent[0].request.params, vec![vec![0]]);
        assert_eq!(sent[0].cpu, CpuId::App);
    }

    #[test]
    fn firmware_rejection_carries_both_status_words() {
        let transport = MockTransport::new();
        transport.push_reply(MockReply::Status {
            major: 3,
            minor: 0x51,
        });
        assert_matches!(
            clear_configured_apps(&transport, 4, Duration::from_millis(10)),
            Err(HailoError::FirmwareControl {
                opcode: 71,
                major_status: 3,
                minor_status: 0x51,
            })
        );
    }

    #[test]
    fn identity_payload_parses() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&2u32.to_le_bytes());
        payload.extend_from_slice(&4u32.to_le_bytes());
        payload.extend_from_slice(&23u32.to_le_bytes());
        payload.extend_from_slice(&1u32.to_le_bytes());
        payload.extend_from_slice(&3u32.to_le_bytes());
        let mut name = [0u8; 32];
        name[..7].copy_from_slice(b"HAILO-8");
        payload.extend_from_slice(&name);

        let transport = MockTransport::new();
        transport.push_reply(MockReply::Payload(payload));
        let identity = identify(&transport, 1, Duration::from_millis(10)).unwrap();
        assert_eq!(identity.protocol_version, 2);
        assert_eq!(identity.firmware_version.to_string(), "4.23.1");
        assert_eq!(identity.logger_version, 3);
        assert_eq!(identity.board_name, "HAILO-8");
    }
}
