// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

#![no_std]

pub mod kernel_types;
pub mod syscalls;

/// Upper bound on the bytes of a directory entry name that get printed.
pub const DIRENT_NAME_PRINT_MAX: u32 = 256;
