// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

use clap::ValueEnum;

/// How values with a symbolic name are rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum XlatStyle {
    /// Numbers only, tables are never consulted.
    Raw,
    /// The symbolic name when there is one, the number otherwise.
    #[default]
    Abbrev,
    /// The number, followed by the symbolic name as a comment.
    Verbose,
}

/// How much of a structure-carrying buffer gets decoded.
///
/// Ordered: anything below [`Verbosity::Compact`] leaves buffers as plain
/// addresses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum Verbosity {
    /// Print the buffer address only.
    Terse,
    /// Walk the buffer but only print how many records it holds.
    Compact,
    /// Print every record.
    #[default]
    Full,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    pub xlat_style: XlatStyle,
    pub verbosity: Verbosity,
}

impl DecodeOptions {
    pub fn new(xlat_style: XlatStyle, verbosity: Verbosity) -> Self {
        DecodeOptions {
            xlat_style,
            verbosity,
        }
    }

    pub fn decodes_buffers(&self) -> bool {
        self.verbosity >= Verbosity::Compact
    }

    pub fn is_compact(&self) -> bool {
        self.verbosity == Verbosity::Compact
    }
}
