// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

use crate::{
    format_helpers::format_hex,
    options::XlatStyle,
    xlat,
    xlat::{format_flags, format_xval, Xlat},
};

pub static DIRENT_TYPES: Xlat = xlat![
    DT_UNKNOWN = 0,
    DT_FIFO = 1,
    DT_CHR = 2,
    DT_DIR = 4,
    DT_BLK = 6,
    DT_REG = 8,
    DT_LNK = 10,
    DT_SOCK = 12,
    DT_WHT = 14,
];

pub static OPEN_ACCESS_MODES: Xlat = xlat![O_RDONLY, O_WRONLY, O_RDWR];

// O_SYNC contains O_DSYNC and O_TMPFILE contains O_DIRECTORY.
pub static OPEN_FLAGS: Xlat = xlat![
    O_CREAT,
    O_EXCL,
    O_NOCTTY,
    O_TRUNC,
    O_APPEND,
    O_NONBLOCK,
    O_SYNC,
    O_DSYNC,
    O_ASYNC,
    O_DIRECT,
    O_TMPFILE,
    O_DIRECTORY,
    O_NOFOLLOW,
    O_NOATIME,
    O_CLOEXEC,
    O_PATH,
];

/// Renders open(2) flags: the access mode, then the remaining flag bits.
pub fn format_open_flags(flags: i32, style: XlatStyle) -> String {
    let flags = flags as u32 as u64;
    let accmode = flags & libc::O_ACCMODE as u64;
    let rest = flags & !(libc::O_ACCMODE as u64);

    let render = |style| {
        let mut s = format_xval(&OPEN_ACCESS_MODES, accmode, Some("O_???"), style).text;
        if rest != 0 {
            s.push('|');
            s.push_str(&format_flags(&OPEN_FLAGS, rest, None, style));
        }
        s
    };

    match style {
        XlatStyle::Raw => format_hex(flags),
        XlatStyle::Abbrev => render(XlatStyle::Abbrev),
        XlatStyle::Verbose => format!("{} /* {} */", format_hex(flags), render(XlatStyle::Abbrev)),
    }
}
