// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

#![allow(non_upper_case_globals)]

#[cfg(aarch64)]
mod aarch64;
#[cfg(aarch64)]
pub use aarch64::*;

#[cfg(x86_64)]
mod x86_64;
#[cfg(x86_64)]
pub use x86_64::*;

#[cfg(not(any(aarch64, x86_64)))]
compile_error!("Unsupported architecture. Currently only aarch64 and x86_64 are supported.");

pub fn syscall_name_from_nr(nr: i64) -> Option<&'static str> {
    SYSCALL_NAMES
        .iter()
        .find(|(number, _)| *number == nr)
        .map(|(_, name)| *name)
}
