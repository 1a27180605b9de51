// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

//! Walks a buffer of variable-length, self-describing records in tracee
//! memory.
//!
//! The only length that is trusted is the one the kernel returned for the
//! whole buffer. Each record declares its own length, which is reconciled
//! against what is left of the trusted length before the cursor moves, and
//! the cursor always moves by at least one header.

use std::fmt;

use anyhow::{bail, Result};
use log::{debug, trace};

use crate::{
    arg, comment,
    format_helpers::{format_addr, format_hex_bytes},
    formatting::SyscallFormatter,
    memory::TraceeMemory,
    options::DecodeOptions,
};

/// Large enough for the header of every supported record format.
pub const MAX_HEADER_SIZE: usize = tracefmt_common::kernel_types::MAX_DIRENT_HEADER_SIZE;

/// Decodes and renders the fixed-size header that starts every record.
#[allow(async_fn_in_trait)]
pub trait HeadStrategy {
    /// The record length the header claims, without rendering anything.
    fn declared_len(&self, header: &[u8]) -> u32;

    /// Renders the header fields and returns the declared record length.
    async fn decode_head(
        &self,
        sf: &mut SyscallFormatter<'_>,
        header: &[u8],
        options: &DecodeOptions,
    ) -> Result<u32>;
}

/// Renders the variable part of a record that follows its header.
#[allow(async_fn_in_trait)]
pub trait TailStrategy {
    /// `addr` is where the tail starts and `len` how many bytes of the
    /// record follow the header, already clamped to the trusted length.
    async fn decode_tail(
        &self,
        sf: &mut SyscallFormatter<'_>,
        mem: &dyn TraceeMemory,
        addr: u64,
        header: &[u8],
        len: u32,
        options: &DecodeOptions,
    ) -> Result<TailStatus>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailStatus {
    Complete,
    /// Something in the tail could not be read.
    PartialFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The trusted length was consumed exactly.
    Closed,
    /// Bytes too few to form a header were left over.
    Truncated,
    MemoryUnreadable,
    /// The next record address would wrap around the address space.
    Corrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamReport {
    pub end: StreamEnd,
    pub records: u32,
    /// Bytes of the trusted length that were walked over.
    pub consumed: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthDiscrepancy {
    Overflow { declared: u32, remaining: u32 },
    Underflow { declared: u32, header_size: u32 },
}

impl fmt::Display for LengthDiscrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            LengthDiscrepancy::Overflow {
                declared,
                remaining,
            } => write!(
                f,
                "record length {declared} overflows the buffer by {} bytes",
                declared - remaining
            ),
            LengthDiscrepancy::Underflow {
                declared,
                header_size,
            } => write!(
                f,
                "record length {declared} is shorter than the {header_size}-byte header"
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciled {
    /// How far the cursor moves past this record.
    pub record_len: u32,
    pub next_remaining: u32,
    pub discrepancy: Option<LengthDiscrepancy>,
}

/// Clamps a declared record length to `[header_size, remaining]`.
///
/// `remaining` must be at least `header_size`.
pub fn reconcile_length(declared: u32, remaining: u32, header_size: u32) -> Reconciled {
    if declared > remaining {
        Reconciled {
            record_len: remaining,
            next_remaining: 0,
            discrepancy: Some(LengthDiscrepancy::Overflow {
                declared,
                remaining,
            }),
        }
    } else if declared < header_size {
        Reconciled {
            record_len: header_size,
            next_remaining: remaining - header_size,
            discrepancy: Some(LengthDiscrepancy::Underflow {
                declared,
                header_size,
            }),
        }
    } else {
        Reconciled {
            record_len: declared,
            next_remaining: remaining - declared,
            discrepancy: None,
        }
    }
}

/// Walk state, private to one decode call.
#[derive(Debug)]
struct DecodeCursor {
    remote_address: u64,
    remaining_declared_length: u32,
    records_emitted: u32,
}

impl DecodeCursor {
    fn advance(&mut self, reconciled: &Reconciled) {
        if reconciled.next_remaining != 0 {
            self.remote_address = self.remote_address.wrapping_add(reconciled.record_len as u64);
        }
        self.remaining_declared_length = reconciled.next_remaining;
    }
}

/// Tracks whether the opening bracket has been written, so that a buffer
/// whose first record is unreadable can still be shown as a bare address.
struct ArrayOutput {
    opened: bool,
}

impl ArrayOutput {
    async fn open(&mut self, sf: &mut SyscallFormatter<'_>) -> Result<()> {
        if !self.opened {
            sf.begin_array().await?;
            self.opened = true;
        }
        Ok(())
    }

    async fn unreadable(
        &mut self,
        sf: &mut SyscallFormatter<'_>,
        cursor: &DecodeCursor,
    ) -> Result<()> {
        if cursor.records_emitted == 0 && !self.opened {
            arg!(sf, format_addr(cursor.remote_address));
        } else {
            self.open(sf).await?;
            arg!(sf, "...");
            comment!(sf, "{}", format_addr(cursor.remote_address));
        }
        Ok(())
    }
}

/// Decodes `total_len` bytes of records starting at `start`.
///
/// With [`DecodeOptions::is_compact`] the records are walked but only their
/// count is printed, with a `+` when the walk did not end cleanly.
#[allow(clippy::too_many_arguments)]
pub async fn decode_record_stream<H, T>(
    sf: &mut SyscallFormatter<'_>,
    mem: &dyn TraceeMemory,
    start: u64,
    total_len: u32,
    header_size: u32,
    head: &H,
    tail: &T,
    options: &DecodeOptions,
) -> Result<StreamReport>
where
    H: HeadStrategy,
    T: TailStrategy,
{
    if header_size == 0 || header_size as usize > MAX_HEADER_SIZE {
        bail!("record header size {header_size} is not supported");
    }

    let compact = options.is_compact();
    let mut cursor = DecodeCursor {
        remote_address: start,
        remaining_declared_length: total_len,
        records_emitted: 0,
    };
    let mut output = ArrayOutput { opened: false };
    let mut header_buf = [0u8; MAX_HEADER_SIZE];

    let end = loop {
        let remaining = cursor.remaining_declared_length;
        if remaining == 0 {
            break StreamEnd::Closed;
        }

        if remaining < header_size {
            trace!(
                "{remaining} trailing bytes at {:#x} do not form a record header",
                cursor.remote_address
            );

            if compact {
                cursor.remaining_declared_length = 0;
                break StreamEnd::Truncated;
            }

            let mut stray = vec![0u8; remaining as usize];
            if let Err(err) = mem.read_fixed(cursor.remote_address, &mut stray) {
                debug!("trailing bytes unreadable: {err}");
                output.unreadable(sf, &cursor).await?;
                break StreamEnd::MemoryUnreadable;
            }

            output.open(sf).await?;
            arg!(sf, format_hex_bytes(&stray));
            cursor.remaining_declared_length = 0;
            break StreamEnd::Truncated;
        }

        let header = &mut header_buf[..header_size as usize];
        if let Err(err) = mem.read_fixed(cursor.remote_address, header) {
            debug!("record header unreadable: {err}");
            if !compact {
                output.unreadable(sf, &cursor).await?;
            }
            break StreamEnd::MemoryUnreadable;
        }
        let header = &*header;

        let declared = if compact {
            head.declared_len(header)
        } else {
            output.open(sf).await?;
            sf.begin_struct().await?;
            head.decode_head(sf, header, options).await?
        };
        cursor.records_emitted += 1;

        let reconciled = reconcile_length(declared, remaining, header_size);
        if let Some(discrepancy) = reconciled.discrepancy {
            debug!(
                "record {} at {:#x}: {discrepancy}",
                cursor.records_emitted, cursor.remote_address
            );
            if !compact {
                comment!(sf, "{discrepancy}");
            }
        }

        let addr = cursor.remote_address;
        if reconciled.next_remaining != 0
            && addr
                .checked_add(reconciled.record_len as u64)
                .filter(|next| *next > addr)
                .is_none()
        {
            debug!("record at {addr:#x} of length {} wraps", reconciled.record_len);
            if !compact {
                sf.end_struct().await?;
                comment!(sf, "next record after {} wraps the address space", format_addr(addr));
            }
            cursor.advance(&reconciled);
            break StreamEnd::Corrupted;
        }

        if !compact {
            let status = tail
                .decode_tail(
                    sf,
                    mem,
                    addr.saturating_add(header_size as u64),
                    header,
                    reconciled.record_len - header_size,
                    options,
                )
                .await?;
            sf.end_struct().await?;

            if status == TailStatus::PartialFailure && reconciled.next_remaining != 0 {
                arg!(sf, "...");
                cursor.advance(&reconciled);
                break StreamEnd::MemoryUnreadable;
            }
        }

        cursor.advance(&reconciled);
    };

    let report = StreamReport {
        end,
        records: cursor.records_emitted,
        consumed: total_len - cursor.remaining_declared_length,
    };

    if compact {
        let more = if end == StreamEnd::Closed { "" } else { "+" };
        let noun = if report.records == 1 && more.is_empty() {
            "entry"
        } else {
            "entries"
        };
        arg!(sf, format_addr(start));
        comment!(sf, "{}{more} {noun}", report.records);
    } else if output.opened {
        sf.end_array().await?;
    } else if end == StreamEnd::Closed {
        sf.begin_array().await?;
        sf.end_array().await?;
    }

    Ok(report)
}
