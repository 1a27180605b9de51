// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

//! On-the-wire layouts of the records the kernel writes into a `getdents`
//! buffer. The trailing `d_name` arrays are zero-sized: only the offset of
//! the name matters, the name itself has the record's variable length.

use core::mem::offset_of;

/// `struct linux_dirent` as seen by a tracee with 64-bit `unsigned long`.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct LinuxDirent {
    pub d_ino: u64,
    pub d_off: u64,
    pub d_reclen: u16,
    pub d_name: [u8; 0],
}

/// `struct linux_dirent` as seen by a tracee with 32-bit `unsigned long`
/// (compat personality).
#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct LinuxDirent32 {
    pub d_ino: u32,
    pub d_off: u32,
    pub d_reclen: u16,
    pub d_name: [u8; 0],
}

/// `struct linux_dirent64`, identical for every personality.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct LinuxDirent64 {
    pub d_ino: u64,
    pub d_off: i64,
    pub d_reclen: u16,
    pub d_type: u8,
    pub d_name: [u8; 0],
}

pub const LINUX_DIRENT_HEADER_SIZE: u32 = offset_of!(LinuxDirent, d_name) as u32;
pub const LINUX_DIRENT32_HEADER_SIZE: u32 = offset_of!(LinuxDirent32, d_name) as u32;
pub const LINUX_DIRENT64_HEADER_SIZE: u32 = offset_of!(LinuxDirent64, d_name) as u32;

/// Size of a buffer able to hold the header of any of the layouts above.
pub const MAX_DIRENT_HEADER_SIZE: usize = 24;

const _: () = assert!(LINUX_DIRENT_HEADER_SIZE == 18);
const _: () = assert!(LINUX_DIRENT32_HEADER_SIZE == 10);
const _: () = assert!(LINUX_DIRENT64_HEADER_SIZE == 19);
const _: () = assert!(LINUX_DIRENT64_HEADER_SIZE as usize <= MAX_DIRENT_HEADER_SIZE);
