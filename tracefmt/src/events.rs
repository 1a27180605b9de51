// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

//! Two-phase decoding of one syscall invocation.
//!
//! The harness calls [`handle_enter`] at the syscall entry stop, lets the
//! tracee run, records the return value with [`SyscallCall::set_exit`] and
//! then calls [`handle_exit`]. Arguments that are only filled in by the
//! kernel are rendered on exit.

#![allow(non_upper_case_globals)]

use anyhow::Result;
use log::warn;
#[cfg(target_arch = "x86_64")]
use tracefmt_common::syscalls::SYS_getdents;
use tracefmt_common::syscalls::{SYS_getdents64, SYS_openat};

use crate::{
    arg, argf,
    dirent::{Dirent64, LegacyDirent},
    format_helpers::{format_addr, format_cstring},
    formatting::{Formatter, SyscallFormatter},
    memory::TraceeMemory,
    options::DecodeOptions,
    record_stream::{decode_record_stream, HeadStrategy, TailStrategy},
    xlat_tables::format_open_flags,
};

const PATH_PRINT_MAX: u32 = 4096;

/// State of one syscall invocation between its entry and exit stops.
pub struct SyscallCall<'f> {
    pub pid: u32,
    pub args: [u64; 6],
    pub return_value: i64,
    pub error: bool,
    pub options: DecodeOptions,
    sf: SyscallFormatter<'f>,
}

impl<'f> SyscallCall<'f> {
    pub fn new(sf: SyscallFormatter<'f>, pid: u32, args: [u64; 6], options: DecodeOptions) -> Self {
        SyscallCall {
            pid,
            args,
            return_value: 0,
            error: false,
            options,
            sf,
        }
    }

    pub async fn begin(
        formatter: Formatter<'f>,
        pid: u32,
        syscall_nr: i64,
        args: [u64; 6],
        options: DecodeOptions,
    ) -> Result<Self> {
        let sf = formatter.push_syscall(pid, syscall_nr).await?;
        Ok(SyscallCall::new(sf, pid, args, options))
    }

    pub fn syscall_nr(&self) -> i64 {
        self.sf.syscall_nr()
    }

    /// Records the raw return value; the kernel reports errors as
    /// `-4095..=-1`.
    pub fn set_exit(&mut self, return_value: i64) {
        self.return_value = return_value;
        self.error = (-4095..0).contains(&return_value);
    }

    /// Writes the return value and hands the formatter back for the next call.
    pub async fn finish(self) -> Result<Formatter<'f>> {
        self.sf.finish(self.return_value, None).await
    }
}

pub async fn handle_enter(call: &mut SyscallCall<'_>, mem: &dyn TraceeMemory) -> Result<()> {
    match call.syscall_nr() {
        #[cfg(target_arch = "x86_64")]
        SYS_getdents => getdents_enter(call).await,
        SYS_getdents64 => getdents_enter(call).await,
        SYS_openat => openat_enter(call, mem).await,
        _ => Ok(()),
    }
}

pub async fn handle_exit(call: &mut SyscallCall<'_>, mem: &dyn TraceeMemory) -> Result<()> {
    match call.syscall_nr() {
        #[cfg(target_arch = "x86_64")]
        SYS_getdents => {
            let layout = LegacyDirent::default();
            getdents_exit(call, mem, &layout, layout.header_size()).await
        }
        SYS_getdents64 => getdents_exit(call, mem, &Dirent64, Dirent64.header_size()).await,
        _ => Ok(()),
    }
}

/// The buffer is not populated yet, so only the descriptor is printed.
async fn getdents_enter(call: &mut SyscallCall<'_>) -> Result<()> {
    argf!(call.sf, "{}", call.args[0] as i32);
    Ok(())
}

/// Decodes the entries of a `getdents`-style call on exit.
pub async fn getdents_exit<L>(
    call: &mut SyscallCall<'_>,
    mem: &dyn TraceeMemory,
    layout: &L,
    header_size: u32,
) -> Result<()>
where
    L: HeadStrategy + TailStrategy,
{
    let dirp = call.args[1];
    let count = call.args[2] as u32;
    let options = call.options;

    if call.error || !options.decodes_buffers() {
        arg!(call.sf, format_addr(dirp));
    } else if call.return_value as u64 > count as u64 {
        warn!(
            "kernel returned {} bytes for a {count}-byte buffer, not decoding",
            call.return_value
        );
        arg!(call.sf, format_addr(dirp));
    } else {
        decode_record_stream(
            &mut call.sf,
            mem,
            dirp,
            call.return_value as u32,
            header_size,
            layout,
            layout,
            &options,
        )
        .await?;
    }

    argf!(call.sf, "{count}");
    Ok(())
}

async fn openat_enter(call: &mut SyscallCall<'_>, mem: &dyn TraceeMemory) -> Result<()> {
    let dirfd = call.args[0] as i32;
    if dirfd == libc::AT_FDCWD {
        arg!(call.sf, "AT_FDCWD");
    } else {
        argf!(call.sf, "{dirfd}");
    }

    let pathname = call.args[1];
    match mem.read_bounded_string(pathname, PATH_PRINT_MAX) {
        Ok(path) => arg!(call.sf, format_cstring(&path.bytes, path.truncated)),
        Err(_) => arg!(call.sf, format_addr(pathname)),
    }

    let flags = call.args[2] as i32;
    arg!(call.sf, format_open_flags(flags, call.options.xlat_style));

    if flags & libc::O_CREAT != 0 || flags & libc::O_TMPFILE == libc::O_TMPFILE {
        argf!(call.sf, "{:#o}", call.args[3]);
    }

    Ok(())
}
