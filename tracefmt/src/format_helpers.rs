// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

use std::{borrow::Cow, fmt::Write as _};

use nix::errno::Errno;
use tracefmt_common::syscalls;

/// Hex with a `0x` prefix, except for zero which is plain `0`.
pub fn format_hex(value: u64) -> String {
    if value == 0 {
        "0".to_string()
    } else {
        format!("{value:#x}")
    }
}

pub fn format_addr(addr: u64) -> String {
    if addr == 0 {
        "NULL".to_string()
    } else {
        format!("{addr:#x}")
    }
}

/// Quotes a C string, stopping at the first NUL. `unterminated` means the
/// fetch gave up before finding one, which is shown with a trailing `...`.
pub fn format_cstring(bytes: &[u8], unterminated: bool) -> String {
    let null_pos = bytes.iter().position(|&b| b == 0);
    let end_idx = null_pos.unwrap_or(bytes.len());

    let mut s = String::with_capacity(end_idx + 2);
    s.push('"');
    for &b in &bytes[..end_idx] {
        match b {
            b'"' => s.push_str("\\\""),
            b'\\' => s.push_str("\\\\"),
            b'\t' => s.push_str("\\t"),
            b'\n' => s.push_str("\\n"),
            0x0b => s.push_str("\\v"),
            0x0c => s.push_str("\\f"),
            b'\r' => s.push_str("\\r"),
            0x20..=0x7e => s.push(b as char),
            _ => {
                let _ = write!(s, "\\{b:03o}");
            }
        }
    }
    s.push('"');

    if unterminated && null_pos.is_none() {
        s.push_str("...");
    }

    s
}

/// Quotes opaque bytes with every byte hex-escaped.
pub fn format_hex_bytes(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 4 + 2);
    s.push('"');
    for b in bytes {
        let _ = write!(s, "\\x{b:02x}");
    }
    s.push('"');
    s
}

pub fn format_return_value(syscall_nr: i64, return_value: i64) -> Cow<'static, str> {
    if (-4095..0).contains(&return_value) {
        let errno = Errno::from_raw(-return_value as i32);
        return Cow::Owned(format!("-1 {errno:?} ({})", errno.desc()));
    }

    match syscall_nr {
        syscalls::SYS_openat => Cow::Owned(format!("{return_value} (fd)")),

        #[cfg(target_arch = "x86_64")]
        syscalls::SYS_getdents => Cow::Owned(format!("{return_value} (bytes)")),

        syscalls::SYS_getdents64 => Cow::Owned(format!("{return_value} (bytes)")),

        _ => Cow::Owned(return_value.to_string()),
    }
}
