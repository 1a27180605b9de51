// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

//! Reads from the address space of the traced process.
//!
//! Every read is a single synchronous attempt. Nothing is cached between
//! calls, and a failed read is an ordinary outcome the decoders render.

use std::io::IoSliceMut;

use nix::{
    errno::Errno,
    sys::uio::{process_vm_readv, RemoteIoVec},
    unistd::Pid,
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("{len} bytes at {addr:#x} are outside the readable memory")]
    Unreadable { addr: u64, len: u32 },
    #[error("reading {len} bytes at {addr:#x} failed: {errno}")]
    Os { addr: u64, len: u32, errno: Errno },
    #[error("short read at {addr:#x}: {got} of {len} bytes")]
    Short { addr: u64, len: u32, got: u32 },
}

/// A string fetched up to a NUL or a length bound, whichever comes first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundedString {
    /// Bytes before the NUL, or all fetched bytes when there was none.
    pub bytes: Vec<u8>,
    /// No NUL was found within the bound.
    pub truncated: bool,
}

pub trait TraceeMemory {
    /// Fills `buf` entirely from `addr`, or fails.
    fn read_fixed(&self, addr: u64, buf: &mut [u8]) -> Result<(), MemoryError>;

    /// Reads a NUL-terminated string, never touching memory at or past
    /// `addr + max_len`.
    fn read_bounded_string(&self, addr: u64, max_len: u32) -> Result<BoundedString, MemoryError>;
}

// Chunks never cross this boundary, so a string that ends right before an
// unmapped page is still read in full.
const READ_CHUNK_ALIGN: u64 = 4096;

/// Reads another process's memory through `process_vm_readv(2)`.
pub struct ProcessVmReader {
    pid: Pid,
}

impl ProcessVmReader {
    pub fn new(pid: Pid) -> Self {
        ProcessVmReader { pid }
    }

    fn read_once(&self, addr: u64, buf: &mut [u8]) -> Result<usize, MemoryError> {
        let len = buf.len() as u32;
        let base = usize::try_from(addr).map_err(|_| MemoryError::Unreadable { addr, len })?;
        let remote_iov = RemoteIoVec {
            base,
            len: buf.len(),
        };

        process_vm_readv(self.pid, &mut [IoSliceMut::new(buf)], &[remote_iov])
            .map_err(|errno| MemoryError::Os { addr, len, errno })
    }
}

impl TraceeMemory for ProcessVmReader {
    fn read_fixed(&self, addr: u64, buf: &mut [u8]) -> Result<(), MemoryError> {
        if buf.is_empty() {
            return Ok(());
        }

        let got = self.read_once(addr, buf)?;
        if got < buf.len() {
            return Err(MemoryError::Short {
                addr,
                len: buf.len() as u32,
                got: got as u32,
            });
        }

        Ok(())
    }

    fn read_bounded_string(&self, addr: u64, max_len: u32) -> Result<BoundedString, MemoryError> {
        let mut bytes = Vec::with_capacity(max_len as usize);
        let mut cursor = addr;
        let end = addr
            .checked_add(max_len as u64)
            .ok_or(MemoryError::Unreadable { addr, len: max_len })?;

        while cursor < end {
            let boundary = (cursor / READ_CHUNK_ALIGN + 1) * READ_CHUNK_ALIGN;
            let chunk_len = (boundary.min(end) - cursor) as usize;

            let start = bytes.len();
            bytes.resize(start + chunk_len, 0);
            let got = self.read_once(cursor, &mut bytes[start..])?;
            bytes.truncate(start + got);

            if let Some(nul) = bytes[start..].iter().position(|&b| b == 0) {
                bytes.truncate(start + nul);
                return Ok(BoundedString {
                    bytes,
                    truncated: false,
                });
            }

            if got < chunk_len {
                return Err(MemoryError::Short {
                    addr,
                    len: max_len,
                    got: bytes.len() as u32,
                });
            }

            cursor += chunk_len as u64;
        }

        Ok(BoundedString {
            bytes,
            truncated: true,
        })
    }
}

/// Memory backed by a local buffer that pretends to live at `base`.
pub struct SliceMemory<'a> {
    base: u64,
    bytes: &'a [u8],
}

impl<'a> SliceMemory<'a> {
    pub fn new(base: u64, bytes: &'a [u8]) -> Self {
        SliceMemory { base, bytes }
    }

    fn range(&self, addr: u64, len: u32) -> Result<std::ops::Range<usize>, MemoryError> {
        let err = MemoryError::Unreadable { addr, len };
        let start = addr.checked_sub(self.base).ok_or(err.clone())?;
        let end = start.checked_add(len as u64).ok_or(err.clone())?;

        if end > self.bytes.len() as u64 {
            return Err(err);
        }

        Ok(start as usize..end as usize)
    }
}

impl TraceeMemory for SliceMemory<'_> {
    fn read_fixed(&self, addr: u64, buf: &mut [u8]) -> Result<(), MemoryError> {
        let range = self.range(addr, buf.len() as u32)?;
        buf.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn read_bounded_string(&self, addr: u64, max_len: u32) -> Result<BoundedString, MemoryError> {
        // Only the part up to the NUL has to be readable.
        let available = addr
            .checked_sub(self.base)
            .filter(|offset| *offset <= self.bytes.len() as u64)
            .map(|offset| &self.bytes[offset as usize..])
            .ok_or(MemoryError::Unreadable { addr, len: max_len })?;

        let window = &available[..available.len().min(max_len as usize)];
        match window.iter().position(|&b| b == 0) {
            Some(nul) => Ok(BoundedString {
                bytes: window[..nul].to_vec(),
                truncated: false,
            }),
            None if window.len() == max_len as usize => Ok(BoundedString {
                bytes: window.to_vec(),
                truncated: true,
            }),
            None => Err(MemoryError::Unreadable { addr, len: max_len }),
        }
    }
}

#[cfg(test)]
mod test {
    use std::ptr;

    use super::*;

    /// Anonymous pages of our own address space, the last one unmapped
    /// again so that it is guaranteed to fault.
    struct GuardedPages {
        base: *mut u8,
        page: usize,
        mapped: usize,
    }

    impl GuardedPages {
        fn new(mapped: usize) -> Self {
            let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
            let len = page * (mapped + 1);
            let base = unsafe {
                libc::mmap(
                    ptr::null_mut(),
                    len,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                    -1,
                    0,
                )
            };
            assert_ne!(base, libc::MAP_FAILED);

            let base = base as *mut u8;
            let hole = unsafe { base.add(page * mapped) };
            assert_eq!(unsafe { libc::munmap(hole as *mut libc::c_void, page) }, 0);

            GuardedPages { base, page, mapped }
        }

        fn hole(&self) -> u64 {
            self.base as u64 + (self.page * self.mapped) as u64
        }

        /// Copies `bytes` so they end right where the hole starts.
        fn place_before_hole(&self, bytes: &[u8]) -> u64 {
            self.place_at(self.page * self.mapped - bytes.len(), bytes)
        }

        fn place_at(&self, offset: usize, bytes: &[u8]) -> u64 {
            assert!(offset + bytes.len() <= self.page * self.mapped);
            unsafe {
                ptr::copy_nonoverlapping(bytes.as_ptr(), self.base.add(offset), bytes.len());
            }
            self.base as u64 + offset as u64
        }
    }

    impl Drop for GuardedPages {
        fn drop(&mut self) {
            unsafe { libc::munmap(self.base as *mut libc::c_void, self.page * self.mapped) };
        }
    }

    fn reader() -> ProcessVmReader {
        ProcessVmReader::new(Pid::this())
    }

    #[test]
    fn fixed_read_inside_mapping() {
        let pages = GuardedPages::new(1);
        let addr = pages.place_at(16, b"dirent!!");

        let mut buf = [0u8; 8];
        reader().read_fixed(addr, &mut buf).unwrap();
        assert_eq!(&buf, b"dirent!!");

        assert_eq!(reader().read_fixed(addr, &mut []), Ok(()));
    }

    #[test]
    fn fixed_read_across_hole_is_short() {
        let pages = GuardedPages::new(1);
        let addr = pages.place_before_hole(b"abcd");

        let mut buf = [0u8; 8];
        assert_eq!(
            reader().read_fixed(addr, &mut buf),
            Err(MemoryError::Short {
                addr,
                len: 8,
                got: 4,
            })
        );
    }

    #[test]
    fn fixed_read_of_hole_fails() {
        let pages = GuardedPages::new(1);

        let mut buf = [0u8; 4];
        let err = reader().read_fixed(pages.hole(), &mut buf).unwrap_err();
        assert!(matches!(err, MemoryError::Os { .. }), "{err:?}");
    }

    #[test]
    fn string_ending_before_hole() {
        let pages = GuardedPages::new(1);
        let addr = pages.place_before_hole(b"abc\0");

        assert_eq!(
            reader().read_bounded_string(addr, 256),
            Ok(BoundedString {
                bytes: b"abc".to_vec(),
                truncated: false,
            })
        );
    }

    #[test]
    fn unterminated_string_running_into_hole() {
        let pages = GuardedPages::new(1);
        let addr = pages.place_before_hole(b"abcd");

        assert!(reader().read_bounded_string(addr, 256).is_err());
    }

    #[test]
    fn string_bound_stops_before_hole() {
        let pages = GuardedPages::new(1);
        let addr = pages.place_before_hole(b"abcd");

        assert_eq!(
            reader().read_bounded_string(addr, 4),
            Ok(BoundedString {
                bytes: b"abcd".to_vec(),
                truncated: true,
            })
        );
    }

    #[test]
    fn string_across_chunk_boundary() {
        let pages = GuardedPages::new(2);
        let offset = pages.page - 3;
        let addr = pages.place_at(offset, b"getdents\0");

        assert_eq!(
            reader().read_bounded_string(addr, 256),
            Ok(BoundedString {
                bytes: b"getdents".to_vec(),
                truncated: false,
            })
        );
    }
}
