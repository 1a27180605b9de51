// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

//! Directory entry layouts plugged into the record stream decoder.

use std::mem::offset_of;

use anyhow::Result;
use log::{debug, trace};
use tracefmt_common::{
    kernel_types::{
        LinuxDirent, LinuxDirent32, LinuxDirent64, LINUX_DIRENT32_HEADER_SIZE,
        LINUX_DIRENT64_HEADER_SIZE, LINUX_DIRENT_HEADER_SIZE,
    },
    DIRENT_NAME_PRINT_MAX,
};

use crate::{
    field,
    format_helpers::{format_addr, format_cstring},
    formatting::SyscallFormatter,
    memory::{BoundedString, TraceeMemory},
    options::DecodeOptions,
    record_stream::{HeadStrategy, TailStatus, TailStrategy},
    xlat::format_xval,
    xlat_tables::DIRENT_TYPES,
};

/// One decoded directory entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryRecord {
    pub inode: u64,
    pub offset: u64,
    pub record_len: u16,
    /// Only `linux_dirent64` carries the type in its header.
    pub file_type: Option<u8>,
    pub name: Vec<u8>,
    pub name_truncated: bool,
}

fn ne_bytes<const N: usize>(header: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    if let Some(src) = header.get(offset..offset + N) {
        out.copy_from_slice(src);
    }
    out
}

/// Width of `unsigned long` in the tracee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordSize {
    Bits32,
    Bits64,
}

impl WordSize {
    pub fn native() -> Self {
        if cfg!(target_pointer_width = "64") {
            WordSize::Bits64
        } else {
            WordSize::Bits32
        }
    }
}

/// `struct linux_dirent`, returned by `getdents`. The file type lives in
/// the last byte of the record, after the name's NUL padding.
#[derive(Debug, Clone, Copy)]
pub struct LegacyDirent {
    word_size: WordSize,
}

impl LegacyDirent {
    pub fn new(word_size: WordSize) -> Self {
        LegacyDirent { word_size }
    }

    pub fn header_size(&self) -> u32 {
        match self.word_size {
            WordSize::Bits32 => LINUX_DIRENT32_HEADER_SIZE,
            WordSize::Bits64 => LINUX_DIRENT_HEADER_SIZE,
        }
    }

    pub fn parse_head(&self, header: &[u8]) -> DirectoryRecord {
        let (inode, offset, record_len) = match self.word_size {
            WordSize::Bits32 => (
                u32::from_ne_bytes(ne_bytes(header, offset_of!(LinuxDirent32, d_ino))) as u64,
                u32::from_ne_bytes(ne_bytes(header, offset_of!(LinuxDirent32, d_off))) as u64,
                u16::from_ne_bytes(ne_bytes(header, offset_of!(LinuxDirent32, d_reclen))),
            ),
            WordSize::Bits64 => (
                u64::from_ne_bytes(ne_bytes(header, offset_of!(LinuxDirent, d_ino))),
                u64::from_ne_bytes(ne_bytes(header, offset_of!(LinuxDirent, d_off))),
                u16::from_ne_bytes(ne_bytes(header, offset_of!(LinuxDirent, d_reclen))),
            ),
        };

        DirectoryRecord {
            inode,
            offset,
            record_len,
            ..Default::default()
        }
    }
}

impl Default for LegacyDirent {
    fn default() -> Self {
        LegacyDirent::new(WordSize::native())
    }
}

/// `struct linux_dirent64`, returned by `getdents64`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dirent64;

impl Dirent64 {
    pub fn header_size(&self) -> u32 {
        LINUX_DIRENT64_HEADER_SIZE
    }

    pub fn parse_head(&self, header: &[u8]) -> DirectoryRecord {
        DirectoryRecord {
            inode: u64::from_ne_bytes(ne_bytes(header, offset_of!(LinuxDirent64, d_ino))),
            offset: u64::from_ne_bytes(ne_bytes(header, offset_of!(LinuxDirent64, d_off))),
            record_len: u16::from_ne_bytes(ne_bytes(header, offset_of!(LinuxDirent64, d_reclen))),
            file_type: Some(ne_bytes::<1>(header, offset_of!(LinuxDirent64, d_type))[0]),
            ..Default::default()
        }
    }
}

impl HeadStrategy for LegacyDirent {
    fn declared_len(&self, header: &[u8]) -> u32 {
        self.parse_head(header).record_len as u32
    }

    async fn decode_head(
        &self,
        sf: &mut SyscallFormatter<'_>,
        header: &[u8],
        _options: &DecodeOptions,
    ) -> Result<u32> {
        let record = self.parse_head(header);
        field!(sf, "d_ino", "{}", record.inode);
        field!(sf, "d_off", "{}", record.offset);
        field!(sf, "d_reclen", "{}", record.record_len);
        Ok(record.record_len as u32)
    }
}

impl HeadStrategy for Dirent64 {
    fn declared_len(&self, header: &[u8]) -> u32 {
        self.parse_head(header).record_len as u32
    }

    async fn decode_head(
        &self,
        sf: &mut SyscallFormatter<'_>,
        header: &[u8],
        _options: &DecodeOptions,
    ) -> Result<u32> {
        let record = self.parse_head(header);
        field!(sf, "d_ino", "{}", record.inode);
        field!(sf, "d_off", "{}", record.offset as i64);
        field!(sf, "d_reclen", "{}", record.record_len);
        Ok(record.record_len as u32)
    }
}

async fn print_d_type(
    sf: &mut SyscallFormatter<'_>,
    d_type: u8,
    options: &DecodeOptions,
) -> Result<()> {
    let rendered = format_xval(&DIRENT_TYPES, d_type as u64, Some("DT_???"), options.xlat_style);
    field!(sf, "d_type", "{}", rendered.text);
    Ok(())
}

/// Fetches and prints at most [`DIRENT_NAME_PRINT_MAX`] bytes of a name
/// that occupies `len` bytes of the record. `None` if it was unreadable.
async fn print_d_name(
    sf: &mut SyscallFormatter<'_>,
    mem: &dyn TraceeMemory,
    addr: u64,
    len: u32,
) -> Result<Option<BoundedString>> {
    if len == 0 {
        field!(sf, "d_name", "\"\"");
        return Ok(Some(BoundedString::default()));
    }

    match mem.read_bounded_string(addr, len.min(DIRENT_NAME_PRINT_MAX)) {
        Ok(name) => {
            field!(sf, "d_name", "{}", format_cstring(&name.bytes, name.truncated));
            Ok(Some(name))
        }
        Err(err) => {
            debug!("d_name unreadable: {err}");
            field!(sf, "d_name", "{}", format_addr(addr));
            Ok(None)
        }
    }
}

impl TailStrategy for LegacyDirent {
    async fn decode_tail(
        &self,
        sf: &mut SyscallFormatter<'_>,
        mem: &dyn TraceeMemory,
        addr: u64,
        header: &[u8],
        len: u32,
        options: &DecodeOptions,
    ) -> Result<TailStatus> {
        let mut record = self.parse_head(header);
        let name_len = len.saturating_sub(1);

        let Some(name) = print_d_name(sf, mem, addr, name_len).await? else {
            return Ok(TailStatus::PartialFailure);
        };
        record.name = name.bytes;
        record.name_truncated = name.truncated;

        if len > 0 {
            let mut d_type = [0u8; 1];
            if let Err(err) = mem.read_fixed(addr.saturating_add(name_len as u64), &mut d_type) {
                debug!("d_type unreadable: {err}");
                return Ok(TailStatus::PartialFailure);
            }
            print_d_type(sf, d_type[0], options).await?;
            record.file_type = Some(d_type[0]);
        }

        trace!("decoded {record:?}");
        Ok(TailStatus::Complete)
    }
}

impl TailStrategy for Dirent64 {
    async fn decode_tail(
        &self,
        sf: &mut SyscallFormatter<'_>,
        mem: &dyn TraceeMemory,
        addr: u64,
        header: &[u8],
        len: u32,
        options: &DecodeOptions,
    ) -> Result<TailStatus> {
        let mut record = self.parse_head(header);
        if let Some(d_type) = record.file_type {
            print_d_type(sf, d_type, options).await?;
        }

        let Some(name) = print_d_name(sf, mem, addr, len).await? else {
            return Ok(TailStatus::PartialFailure);
        };
        record.name = name.bytes;
        record.name_truncated = name.truncated;

        trace!("decoded {record:?}");
        Ok(TailStatus::Complete)
    }
}
