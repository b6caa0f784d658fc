// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Public error and result types for the crate.

use std::{error::Error as StdError, fmt, time::Duration};

use crate::core::errors;

/// A compact alias for results returned by this crate.
pub type HailoResult<T> = Result<T, HailoError>;

/// Reasons a HEF artifact can fail validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The 4-byte file magic did not match.
    InvalidMagic {
        /// The magic value actually present in the file.
        found: u32,
    },
    /// The declared header version is not one this crate understands.
    UnsupportedVersion(u32),
    /// The file ended before the version-defined header did.
    TruncatedHeader {
        /// Bytes the header layout requires.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },
    /// The declared payload runs past the end of the file.
    TruncatedPayload {
        /// Bytes the declared lengths require.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },
    /// The recomputed integrity hash did not match the declared one.
    DigestMismatch,
    /// Two streams in one network group share a name.
    DuplicateStreamName(String),
    /// The embedded message could not be decoded.
    Proto(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidMagic { found } => {
                write!(f, "invalid HEF magic {found:#010x}")
            }
            ValidationError::UnsupportedVersion(version) => {
                write!(f, "unsupported HEF header version {version}")
            }
            ValidationError::TruncatedHeader { needed, available } => write!(
                f,
                "truncated HEF header: need {needed} bytes, have {available}"
            ),
            ValidationError::TruncatedPayload { needed, available } => write!(
                f,
                "truncated HEF payload: need {needed} bytes, have {available}"
            ),
            ValidationError::DigestMismatch => {
                write!(f, "HEF integrity hash does not match its contents")
            }
            ValidationError::DuplicateStreamName(name) => {
                write!(f, "duplicate stream name \"{name}\" in network group")
            }
            ValidationError::Proto(msg) => write!(f, "malformed HEF message: {msg}"),
        }
    }
}

impl StdError for ValidationError {}

/// Errors reported by this crate.
#[derive(Debug)]
pub enum HailoError {
    /// A HEF artifact failed validation.
    Validation(ValidationError),
    /// The caller supplied an impossible value.
    InvalidArgument(String),
    /// The requested device node does not exist.
    NotFound(String),
    /// The kernel driver rejected or failed an operation.
    Driver(errors::Error),
    /// The firmware rejected a control request.
    FirmwareControl {
        /// Opcode of the rejected request.
        opcode: u32,
        /// Major status word from the response header.
        major_status: u32,
        /// Minor status word from the response header.
        minor_status: u32,
    },
    /// A control response did not match its request.
    Protocol(String),
    /// A host-side watchdog expired before the kernel returned.
    Timeout(Duration),
    /// The operation is not permitted in the current state.
    InvalidState {
        /// The operation that was attempted.
        operation: &'static str,
        /// The state the object was in.
        state: &'static str,
    },
    /// A host-side allocation failed.
    OutOfMemory(String),
    /// Reading or writing a host file failed.
    Io(String),
}

impl fmt::Display for HailoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HailoError::Validation(err) => write!(f, "HEF validation failed: {err}"),
            HailoError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            HailoError::NotFound(what) => write!(f, "not found: {what}"),
            HailoError::Driver(err) => write!(f, "driver error: {err}"),
            HailoError::FirmwareControl {
                opcode,
                major_status,
                minor_status,
            } => write!(
                f,
                "firmware rejected control opcode {opcode}: major status {major_status}, \
                 minor status {minor_status}"
            ),
            HailoError::Protocol(msg) => write!(f, "control protocol violation: {msg}"),
            HailoError::Timeout(timeout) => {
                write!(f, "operation timed out after {timeout:?}")
            }
            HailoError::InvalidState { operation, state } => {
                write!(f, "cannot {operation} while {state}")
            }
            HailoError::OutOfMemory(msg) => write!(f, "allocation failed: {msg}"),
            HailoError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl StdError for HailoError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            HailoError::Validation(err) => Some(err),
            HailoError::Driver(err) => Some(err),
            _ => None,
        }
    }
}

impl From<errors::Error> for HailoError {
    fn from(err: errors::Error) -> HailoError {
        HailoError::Driver(err)
    }
}

impl From<ValidationError> for HailoError {
    fn from(err: ValidationError) -> HailoError {
        HailoError::Validation(err)
    }
}
