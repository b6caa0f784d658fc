// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Small alignment and byte-slicing helpers shared by the core modules.

lazy_static! {
    /// Host page size as reported by the kernel.
    pub static ref PAGE_SIZE: usize = unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize };
}

/// Round `num` up to a multiple of `align`.
pub fn align_to(num: usize, align: usize) -> usize {
    let offset = num % align;
    if offset == 0 {
        num
    } else {
        num + (align - offset)
    }
}

/// Round a requested buffer length up to whole pages. A zero-length
/// request still occupies one page.
pub fn round_up_to_page(len: usize) -> usize {
    align_to(len.max(1), *PAGE_SIZE)
}

/// Interpret a string out of a fixed, NUL-padded byte field.
pub fn str_from_c_bytes(bytes: &[u8]) -> Option<&str> {
    let end = bytes.iter().position(|b| *b == b'\0').unwrap_or(bytes.len());
    std::str::from_utf8(&bytes[..end]).ok()
}
