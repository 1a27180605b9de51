// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

use std::{cell::RefCell, pin::Pin};

use tracefmt_common::syscalls::SYS_getdents64;

use crate::{
    events::{handle_enter, handle_exit, SyscallCall},
    formatting::{Formatter, FormattingStyle},
    memory::{BoundedString, MemoryError, TraceeMemory},
    options::DecodeOptions,
    record_stream::{decode_record_stream, HeadStrategy, StreamReport, TailStrategy},
};


/// Tracee memory with a readable prefix and a log of every access.
pub struct FakeMemory {
    base: u64,
    bytes: Vec<u8>,
    readable: usize,
    reads: RefCell<Vec<(u64, u32)>>,
}

impl FakeMemory {
    pub fn new(base: u64, bytes: Vec<u8>) -> Self {
        let readable = bytes.len();
        FakeMemory {
            base,
            bytes,
            readable,
            reads: RefCell::new(vec![]),
        }
    }

    /// Makes everything from `base + len` on unreadable.
    pub fn readable_up_to(mut self, len: usize) -> Self {
        self.readable = len.min(self.bytes.len());
        self
    }

    /// Every access as `(address, bytes touched)`.
    pub fn reads(&self) -> Vec<(u64, u32)> {
        self.reads.borrow().clone()
    }

    pub fn highest_read_end(&self) -> u128 {
        self.reads
            .borrow()
            .iter()
            .map(|(addr, len)| *addr as u128 + *len as u128)
            .max()
            .unwrap_or(0)
    }

    fn offset(&self, addr: u64) -> Option<usize> {
        addr.checked_sub(self.base).map(|offset| offset as usize)
    }
}

impl TraceeMemory for FakeMemory {
    fn read_fixed(&self, addr: u64, buf: &mut [u8]) -> Result<(), MemoryError> {
        let len = buf.len() as u32;
        self.reads.borrow_mut().push((addr, len));

        let err = MemoryError::Unreadable { addr, len };
        let start = self.offset(addr).ok_or(err.clone())?;
        let end = start.checked_add(buf.len()).ok_or(err.clone())?;
        if end > self.readable {
            return Err(err);
        }

        buf.copy_from_slice(&self.bytes[start..end]);
        Ok(())
    }

    fn read_bounded_string(&self, addr: u64, max_len: u32) -> Result<BoundedString, MemoryError> {
        let err = MemoryError::Unreadable { addr, len: max_len };
        let start = self.offset(addr).ok_or(err.clone())?;

        let mut bytes = vec![];
        for i in 0..max_len as usize {
            let pos = start + i;
            if pos >= self.readable {
                self.reads.borrow_mut().push((addr, i as u32 + 1));
                return Err(err);
            }

            if self.bytes[pos] == 0 {
                self.reads.borrow_mut().push((addr, i as u32 + 1));
                return Ok(BoundedString {
                    bytes,
                    truncated: false,
                });
            }
            bytes.push(self.bytes[pos]);
        }

        self.reads.borrow_mut().push((addr, max_len));
        Ok(BoundedString {
            bytes,
            truncated: true,
        })
    }
}

/// `struct linux_dirent64` with the name NUL-padded up to `reclen`.
pub fn dirent64(ino: u64, off: i64, reclen: u16, d_type: u8, name: &[u8]) -> Vec<u8> {
    let mut record = vec![];
    record.extend_from_slice(&ino.to_ne_bytes());
    record.extend_from_slice(&off.to_ne_bytes());
    record.extend_from_slice(&reclen.to_ne_bytes());
    record.push(d_type);
    record.extend_from_slice(name);
    if record.len() < reclen as usize {
        record.resize(reclen as usize, 0);
    }
    record
}

/// `struct linux_dirent` for a 64-bit tracee, file type in the last byte.
pub fn legacy_dirent(ino: u64, off: u64, reclen: u16, name: &[u8], d_type: u8) -> Vec<u8> {
    let mut record = vec![];
    record.extend_from_slice(&ino.to_ne_bytes());
    record.extend_from_slice(&off.to_ne_bytes());
    record.extend_from_slice(&reclen.to_ne_bytes());
    record.extend_from_slice(name);
    record.resize(reclen as usize - 1, 0);
    record.push(d_type);
    record
}

/// `struct linux_dirent` for a 32-bit tracee.
pub fn legacy_dirent32(ino: u32, off: u32, reclen: u16, name: &[u8], d_type: u8) -> Vec<u8> {
    let mut record = vec![];
    record.extend_from_slice(&ino.to_ne_bytes());
    record.extend_from_slice(&off.to_ne_bytes());
    record.extend_from_slice(&reclen.to_ne_bytes());
    record.extend_from_slice(name);
    record.resize(reclen as usize - 1, 0);
    record.push(d_type);
    record
}

/// Runs the record stream decoder and returns only the rendered buffer
/// argument.
#[allow(clippy::too_many_arguments)]
pub async fn decode_to_string<H, T>(
    mem: &dyn TraceeMemory,
    start: u64,
    total_len: u32,
    header_size: u32,
    head: &H,
    tail: &T,
    options: DecodeOptions,
) -> (String, StreamReport)
where
    H: HeadStrategy,
    T: TailStrategy,
{
    let mut output: Vec<u8> = vec![];
    let pinned_output = Pin::new(&mut output);
    let formatter = Formatter::new(pinned_output, FormattingStyle::OneLine);
    let mut sf = formatter.push_syscall(1, SYS_getdents64).await.unwrap();

    let report = decode_record_stream(
        &mut sf,
        mem,
        start,
        total_len,
        header_size,
        head,
        tail,
        &options,
    )
    .await
    .unwrap();
    sf.finish(0, None).await.unwrap();

    let line = String::from_utf8(output).unwrap();
    let rendered = line
        .strip_prefix("1 getdents64(")
        .and_then(|rest| rest.strip_suffix(") = 0 (bytes)\n"))
        .unwrap()
        .to_string();

    (rendered, report)
}

/// One syscall as a tracer would see it at its two stops.
pub struct TestCall {
    pub syscall_nr: i64,
    pub args: [u64; 6],
    pub return_value: i64,
    pub options: DecodeOptions,
    pub memory: FakeMemory,
}

impl TestCall {
    pub async fn run(&self, style: FormattingStyle) -> String {
        let mut output: Vec<u8> = vec![];
        let pinned_output = Pin::new(&mut output);
        let formatter = Formatter::new(pinned_output, style);

        let mut call = SyscallCall::begin(formatter, 55, self.syscall_nr, self.args, self.options)
            .await
            .unwrap();
        handle_enter(&mut call, &self.memory).await.unwrap();
        call.set_exit(self.return_value);
        handle_exit(&mut call, &self.memory).await.unwrap();
        call.finish().await.unwrap();

        String::from_utf8(output).unwrap()
    }
}

#[macro_export]
macro_rules! syscall_test {
    ($name:ident, $init:block, $expected:expr) => {
        #[::tokio::test]
        async fn $name() {
            let call: $crate::tests::TestCall = $init;

            let output = call
                .run($crate::formatting::FormattingStyle::OneLine)
                .await;

            assert_eq!(output.as_str(), $expected);
        }
    };
}
