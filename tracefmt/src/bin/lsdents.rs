// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

//! Lists a directory by issuing `getdents64` (or `getdents`) itself and
//! rendering every call exactly as a tracer would render it for a tracee.

use std::{
    ffi::CString,
    fs::OpenOptions,
    os::{
        fd::AsRawFd as _,
        unix::{ffi::OsStrExt as _, fs::OpenOptionsExt as _},
    },
    path::PathBuf,
    pin::Pin,
};

use anyhow::{bail, Context as _, Result};
use clap::{Parser, ValueEnum};
use log::debug;
use nix::{errno::Errno, unistd::Pid};
use tokio::io::AsyncWriteExt as _;
use tracefmt::{
    events::{handle_enter, handle_exit, SyscallCall},
    formatting::{Formatter, FormattingStyle},
    memory::{ProcessVmReader, SliceMemory, TraceeMemory},
    options::{DecodeOptions, Verbosity, XlatStyle},
};
use tracefmt_common::syscalls;

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum Reader {
    /// process_vm_readv(2) on our own pid, like a tracer would do.
    #[default]
    Vm,
    /// Read the buffer directly.
    Local,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Directory to list
    path: PathBuf,

    /// Use the legacy getdents syscall and struct linux_dirent
    #[arg(long)]
    legacy: bool,

    /// How symbolic constants are rendered
    #[arg(long = "xlat", value_enum, default_value_t = XlatStyle::default())]
    xlat_style: XlatStyle,

    /// How much of each directory buffer is decoded
    #[arg(long, value_enum, default_value_t = Verbosity::default())]
    verbosity: Verbosity,

    /// Layout of each rendered call
    #[arg(long = "format", value_enum, default_value_t = FormattingStyle::default())]
    style: FormattingStyle,

    /// Size of the buffer handed to the kernel
    #[arg(long, default_value_t = 32768)]
    buffer_size: u32,

    /// How the rendered buffer is read back
    #[arg(long, value_enum, default_value_t = Reader::default())]
    reader: Reader,
}

fn getdents_nr(legacy: bool) -> Result<i64> {
    if !legacy {
        return Ok(syscalls::SYS_getdents64);
    }

    #[cfg(target_arch = "x86_64")]
    return Ok(syscalls::SYS_getdents);

    #[cfg(not(target_arch = "x86_64"))]
    bail!("getdents is not available on this architecture");
}

/// Raw syscall return value in the kernel convention.
fn raw_syscall(nr: i64, args: [u64; 6]) -> i64 {
    let ret = unsafe { libc::syscall(nr as libc::c_long, args[0], args[1], args[2]) };
    if ret < 0 {
        -(Errno::last_raw() as i64)
    } else {
        ret as i64
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    if args.buffer_size == 0 {
        bail!("--buffer-size must be positive");
    }

    let options = DecodeOptions::new(args.xlat_style, args.verbosity);
    let nr = getdents_nr(args.legacy)?;
    let pid = std::process::id();

    let mut stdout = tokio::io::BufWriter::new(tokio::io::stdout());
    let mut output: Vec<u8> = vec![];

    let flags = libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC;
    let path = CString::new(args.path.as_os_str().as_bytes())
        .context("path contains a NUL byte")?;
    let open_args = [
        libc::AT_FDCWD as u64,
        path.as_ptr() as u64,
        flags as u64,
        0,
        0,
        0,
    ];
    let opened = OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_DIRECTORY)
        .open(&args.path);

    {
        let pinned_output = Pin::new(&mut output);
        let formatter = Formatter::new(pinned_output, args.style);
        let path_memory = SliceMemory::new(open_args[1], path.as_bytes_with_nul());
        let mut call =
            SyscallCall::begin(formatter, pid, syscalls::SYS_openat, open_args, options).await?;
        handle_enter(&mut call, &path_memory).await?;
        call.set_exit(match &opened {
            Ok(fd) => fd.as_raw_fd() as i64,
            Err(err) => -(err.raw_os_error().unwrap_or(libc::EIO) as i64),
        });
        handle_exit(&mut call, &path_memory).await?;
        call.finish().await?;
    }
    stdout.write_all(&output).await?;
    stdout.flush().await?;

    let dir = opened.with_context(|| format!("cannot open {}", args.path.display()))?;
    let mut buf = vec![0u8; args.buffer_size as usize];

    loop {
        let call_args = [
            dir.as_raw_fd() as u64,
            buf.as_mut_ptr() as u64,
            args.buffer_size as u64,
            0,
            0,
            0,
        ];

        output.clear();
        let pinned_output = Pin::new(&mut output);
        let formatter = Formatter::new(pinned_output, args.style);
        let mut call = SyscallCall::begin(formatter, pid, nr, call_args, options).await?;

        let vm_reader = ProcessVmReader::new(Pid::this());
        let local_reader = SliceMemory::new(call_args[1], &[]);
        handle_enter(&mut call, &local_reader).await?;

        let ret = raw_syscall(nr, call_args);
        debug!("syscall {nr} returned {ret}");
        call.set_exit(ret);

        let filled = &buf[..ret.clamp(0, args.buffer_size as i64) as usize];
        let local_reader = SliceMemory::new(call_args[1], filled);
        let mem: &dyn TraceeMemory = match args.reader {
            Reader::Vm => &vm_reader,
            Reader::Local => &local_reader,
        };
        handle_exit(&mut call, mem).await?;
        call.finish().await?;

        stdout.write_all(&output).await?;

        if ret <= 0 {
            break;
        }
    }

    Ok(stdout.flush().await?)
}
