// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

pub const SYS_getdents: i64 = 78;
pub const SYS_getdents64: i64 = 217;
pub const SYS_openat: i64 = 257;

pub(crate) const SYSCALL_NAMES: &[(i64, &str)] = &[
    (SYS_getdents, "getdents"),
    (SYS_getdents64, "getdents64"),
    (SYS_openat, "openat"),
];
