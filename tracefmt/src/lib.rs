// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

//! Rendering of traced syscalls: symbolic constants, flag sets, and the
//! variable-length record buffers some syscalls fill in.

pub mod dirent;
pub mod events;
pub mod format_helpers;
pub mod formatting;
pub mod memory;
pub mod options;
pub mod record_stream;
pub mod xlat;
pub mod xlat_tables;

#[cfg(test)]
mod tests;
