// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

pub const SYS_openat: i64 = 56;
pub const SYS_getdents64: i64 = 61;

pub(crate) const SYSCALL_NAMES: &[(i64, &str)] =
    &[(SYS_openat, "openat"), (SYS_getdents64, "getdents64")];
