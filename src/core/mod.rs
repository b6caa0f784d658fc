// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Device-facing machinery: the ioctl ABI, the device handle and the
//! errors the kernel driver can report.

pub mod abi;
pub mod device;
pub mod errors;
pub mod ioctl;
pub mod options;
pub mod util;
