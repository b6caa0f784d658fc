// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Driver-level errors and the errno to status mapping.

use std::{error::Error as StdError, fmt};

use nix::errno::Errno;

/// Failures reported by the kernel driver, mapped from the raw errno.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Opening the character device failed.
    Open(String),
    /// The device handle was already closed.
    Closed,
    /// ENOENT: the requested object does not exist.
    NotFound,
    /// EINVAL: the kernel rejected a parameter.
    InvalidArgument,
    /// ENOTTY: the ioctl is unknown to the driver, i.e. an ABI mismatch.
    InvalidIoctl,
    /// ETIMEDOUT: the kernel gave up waiting.
    Timeout,
    /// EINTR: the call was interrupted by a signal.
    Interrupted,
    /// ECANCELED: an in-kernel wait was canceled.
    WaitCanceled,
    /// ENOBUFS: the CMA region is exhausted.
    OutOfCmaMemory,
    /// ENOMEM: the kernel could not allocate host memory.
    OutOfHostMemory,
    /// EFAULT: the operation is invalid for the current device state.
    InvalidOperation,
    /// ECONNRESET: the kernel aborted an in-flight transfer.
    StreamAbort,
    /// ECONNREFUSED: the firmware channel refused the request.
    ConnectionRefused,
    /// The reported driver version is outside the supported range.
    UnsupportedDriverVersion(String),
    /// Any other kernel error.
    OperationFailed(Errno),
}

impl Error {
    /// Map a raw errno to the driver status it stands for.
    pub fn from_errno(errno: Errno) -> Error {
        match errno {
            Errno::ENOENT => Error::NotFound,
            Errno::EINVAL => Error::InvalidArgument,
            Errno::ENOTTY => Error::InvalidIoctl,
            Errno::ETIMEDOUT => Error::Timeout,
            Errno::EINTR => Error::Interrupted,
            Errno::ECANCELED => Error::WaitCanceled,
            Errno::ENOBUFS => Error::OutOfCmaMemory,
            Errno::ENOMEM => Error::OutOfHostMemory,
            Errno::EFAULT => Error::InvalidOperation,
            Errno::ECONNRESET => Error::StreamAbort,
            Errno::ECONNREFUSED => Error::ConnectionRefused,
            other => Error::OperationFailed(other),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Open(msg) => write!(f, "failed to open device: {msg}"),
            Error::Closed => write!(f, "device handle is closed"),
            Error::NotFound => write!(f, "object not found by the driver"),
            Error::InvalidArgument => write!(f, "driver rejected a parameter"),
            Error::InvalidIoctl => {
                write!(f, "unknown ioctl: kernel driver ABI mismatch")
            }
            Error::Timeout => write!(f, "kernel driver timed out"),
            Error::Interrupted => write!(f, "interrupted by a signal"),
            Error::WaitCanceled => write!(f, "in-kernel wait was canceled"),
            Error::OutOfCmaMemory => write!(f, "out of CMA memory"),
            Error::OutOfHostMemory => write!(f, "kernel out of host memory"),
            Error::InvalidOperation => {
                write!(f, "operation invalid for current device state")
            }
            Error::StreamAbort => write!(f, "transfer aborted by the driver"),
            Error::ConnectionRefused => write!(f, "firmware channel refused the request"),
            Error::UnsupportedDriverVersion(version) => {
                write!(f, "unsupported kernel driver version {version}")
            }
            Error::OperationFailed(errno) => write!(f, "driver operation failed: {errno}"),
        }
    }
}

impl StdError for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping_covers_the_documented_table() {
        assert_eq!(Error::from_errno(Errno::ENOENT), Error::NotFound);
        assert_eq!(Error::from_errno(Errno::EINVAL), Error::InvalidArgument);
        assert_eq!(Error::from_errno(Errno::ENOTTY), Error::InvalidIoctl);
        assert_eq!(Error::from_errno(Errno::ETIMEDOUT), Error::Timeout);
        assert_eq!(Error::from_errno(Errno::EINTR), Error::Interrupted);
        assert_eq!(Error::from_errno(Errno::ECANCELED), Error::WaitCanceled);
        assert_eq!(Error::from_errno(Errno::ENOBUFS), Error::OutOfCmaMemory);
        assert_eq!(Error::from_errno(Errno::ENOMEM), Error::OutOfHostMemory);
        assert_eq!(Error::from_errno(Errno::EFAULT), Error::InvalidOperation);
        assert_eq!(Error::from_errno(Errno::ECONNRESET), Error::StreamAbort);
        assert_eq!(
            Error::from_errno(Errno::ECONNREFUSED),
            Error::ConnectionRefused
        );
    }

    #[test]
    fn unlisted_errnos_fall_through_to_operation_failed() {
        assert_eq!(
            Error::from_errno(Errno::EBUSY),
            Error::OperationFailed(Errno::EBUSY)
        );
        assert_eq!(
            Error::from_errno(Errno::EIO),
            Error::OperationFailed(Errno::EIO)
        );
    }
}
