// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Control frames on the firmware wire.
//!
//! Frame headers, parameter counts and parameter lengths are all
//! **big-endian**; this is firmware-determined, and the opposite of the
//! little-endian parameter payloads that ride inside them. Do not share
//! integer helpers between the two layers.

use crate::result::{HailoError, HailoResult};

/// Protocol version stamped into every request.
pub const CONTROL_PROTOCOL_VERSION: u32 = 2;

/// Size of a request header on the wire.
pub const REQUEST_HEADER_SIZE: usize = 16;

/// Size of a response header on the wire.
pub const RESPONSE_HEADER_SIZE: usize = 24;

fn read_u32_be(bytes: &[u8], offset: usize) -> HailoResult<u32> {
    let end = offset + 4;
    if bytes.len() < end {
        return Err(HailoError::Protocol(format!(
            "frame truncated at offset {offset}"
        )));
    }
    Ok(u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ]))
}

/// One control request: opcode, sequence and its ordered parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Sequence number echoed by the firmware's response.
    pub sequence: u32,
    /// Operation code.
    pub opcode: u32,
    /// Length-prefixed parameters, in opcode-defined order.
    pub params: Vec<Vec<u8>>,
}

impl Request {
    /// A request with no parameters.
    pub fn new(sequence: u32, opcode: u32) -> Request {
        Request {
            sequence,
            opcode,
            params: Vec::new(),
        }
    }

    /// Append one parameter. Consumes self.
    pub fn param(mut self, bytes: Vec<u8>) -> Request {
        self.params.push(bytes);
        self
    }

    /// Wire size of the packed request.
    pub fn packed_len(&self) -> usize {
        REQUEST_HEADER_SIZE + 4 + self.params.iter().map(|p| 4 + p.len()).sum::<usize>()
    }

    /// Serialize to the wire form.
    pub fn pack(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.packed_len());
        out.extend_from_slice(&CONTROL_PROTOCOL_VERSION.to_be_bytes());
        out.extend_from_slice(&0u32.to_be_bytes()); // flags
        out.extend_from_slice(&self.sequence.to_be_bytes());
        out.extend_from_slice(&self.opcode.to_be_bytes());
        out.extend_from_slice(&(self.params.len() as u32).to_be_bytes());
        for param in &self.params {
            out.extend_from_slice(&(param.len() as u32).to_be_bytes());
            out.extend_from_slice(param);
        }
        out
    }

    /// Parse a request back off the wire.
    pub fn parse(bytes: &[u8]) -> HailoResult<Request> {
        let version = read_u32_be(bytes, 0)?;
        if version != CONTROL_PROTOCOL_VERSION {
            return Err(HailoError::Protocol(format!(
                "unknown control protocol version {version}"
            )));
        }
        let sequence = read_u32_be(bytes, 8)?;
        let opcode = read_u32_be(bytes, 12)?;
        let param_count = read_u32_be(bytes, 16)? as usize;

        let mut params = Vec::with_capacity(param_count);
        let mut offset = REQUEST_HEADER_SIZE + 4;
        for _ in 0..param_count {
            let len = read_u32_be(bytes, offset)? as usize;
            offset += 4;
            if bytes.len() < offset + len {
                return Err(HailoError::Protocol(format!(
                    "parameter truncated at offset {offset}"
                )));
            }
            params.push(bytes[offset..offset + len].to_vec());
            offset += len;
        }
        Ok(Request {
            sequence,
            opcode,
            params,
        })
    }
}

/// Header of a control response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    /// Protocol version the firmware answered with.
    pub version: u32,
    /// Response flags, currently unused.
    pub flags: u32,
    /// Echo of the request's sequence number.
    pub sequence: u32,
    /// Echo of the request's opcode.
    pub opcode: u32,
    /// Zero on success.
    pub major_status: u32,
    /// Firmware-specific detail for a non-zero major status.
    pub minor_status: u32,
}

/// One control response: its header and the opcode-specific payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The fixed header.
    pub header: ResponseHeader,
    /// Bytes following the header, opcode-specific.
    pub payload: Vec<u8>,
}

impl Response {
    /// Parse a response frame.
    pub fn parse(bytes: &[u8]) -> HailoResult<Response> {
        if bytes.len() < RESPONSE_HEADER_SIZE {
            return Err(HailoError::Protocol(format!(
                "{}-byte response is shorter than its header",
                bytes.len()
            )));
        }
        let header = ResponseHeader {
            version: read_u32_be(bytes, 0)?,
            flags: read_u32_be(bytes, 4)?,
            sequence: read_u32_be(bytes, 8)?,
            opcode: read_u32_be(bytes, 12)?,
            major_status: read_u32_be(bytes, 16)?,
            minor_status: read_u32_be(bytes, 20)?,
        };
        Ok(Response {
            header,
            payload: bytes[RESPONSE_HEADER_SIZE..].to_vec(),
        })
    }

    /// Serialize to the wire form.
    pub fn pack(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(RESPONSE_HEADER_SIZE + self.payload.len());
        out.extend_from_slice(&self.header.version.to_be_bytes());
        out.extend_from_slice(&self.header.flags.to_be_bytes());
        out.extend_from_slice(&self.header.sequence.to_be_bytes());
        out.extend_from_slice(&self.header.opcode.to_be_bytes());
        out.extend_from_slice(&self.header.major_status.to_be_bytes());
        out.extend_from_slice(&self.header.minor_status.to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Check this response against the request it should answer and
    /// return the payload.
    ///
    /// The sequence and opcode must echo the request and the major
    /// status must be zero; a firmware rejection carries both status
    /// words in the error.
    pub fn expect(&self, sequence: u32, opcode: u32) -> HailoResult<&[u8]> {
        if self.header.sequence != sequence {
            return Err(HailoError::Protocol(format!(
                "response sequence {} does not echo request sequence {sequence}",
                self.header.sequence
            )));
        }
        if self.header.opcode != opcode {
            return Err(HailoError::Protocol(format!(
                "response opcode {} does not echo request opcode {opcode}",
                self.header.opcode
            )));
        }
        if self.header.major_status != 0 {
            return Err(HailoError::FirmwareControl {
                opcode,
                major_status: self.header.major_status,
                minor_status: self.header.minor_status,
            });
        }
        Ok(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn requests_survive_a_pack_parse_round_trip() {
        let requests = [
            Request::new(1, 0),
            Request::new(7, 71),
            Request::new(0xdead_beef, 33)
                .param(vec![1])
                .param(vec![])
                .param(vec![0xaa; 300]),
        ];
        for request in requests {
            assert_eq!(Request::parse(&request.pack()).unwrap(), request);
        }
    }

    #[test]
    fn request_header_is_big_endian() {
        let packed = Request::new(0x0102_0304, 37).param(vec![0x55]).pack();
        assert_eq!(packed[0..4], [0, 0, 0, 2]); // version
        assert_eq!(packed[4..8], [0, 0, 0, 0]); // flags
        assert_eq!(packed[8..12], [0x01, 0x02, 0x03, 0x04]);
        assert_eq!(packed[12..16], [0, 0, 0, 37]);
        assert_eq!(packed[16..20], [0, 0, 0, 1]); // one parameter
        assert_eq!(packed[20..24], [0, 0, 0, 1]); // of one byte
        assert_eq!(packed[24], 0x55);
        assert_eq!(packed.len(), 25);
    }

    #[test]
    fn responses_survive_a_pack_parse_round_trip() {
        let response = Response {
            header: ResponseHeader {
                version: CONTROL_PROTOCOL_VERSION,
                flags: 0,
                sequence: 42,
                opcode: 32,
                major_status: 0,
                minor_status: 0,
            },
            payload: vec![9, 8, 7],
        };
        assert_eq!(Response::parse(&response.pack()).unwrap(), response);
    }

    #[test]
    fn expect_validates_the_echo_and_status() {
        let mut response = Response {
            header: ResponseHeader {
                version: CONTROL_PROTOCOL_VERSION,
                flags: 0,
                sequence: 5,
                opcode: 37,
                major_status: 0,
                minor_status: 0,
            },
            payload: vec![],
        };
        assert!(response.expect(5, 37).is_ok());
        assert_matches!(response.expect(6, 37), Err(HailoError::Protocol(_)));
        assert_matches!(response.expect(5, 33), Err(HailoError::Protocol(_)));

        response.header.major_status = 2;
        response.header.minor_status = 74;
        assert_matches!(
            response.expect(5, 37),
            Err(HailoError::FirmwareControl {
                opcode: 37,
                major_status: 2,
                minor_status: 74,
            })
        );
    }

    #[test]
    fn truncated_frames_are_rejected() {
        let packed = Request::new(1, 33).param(vec![1, 2, 3]).pack();
        assert_matches!(
            Request::parse(&packed[..packed.len() - 1]),
            Err(HailoError::Protocol(_))
        );
        assert_matches!(Response::parse(&[0u8; 23]), Err(HailoError::Protocol(_)));
    }
}
