// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

//! Value to symbol translation tables and the two ways of rendering a number
//! through them: exact match and bitmask decomposition.
//!
//! Entry order is part of the output. Flag decomposition is greedy in table
//! order, so a table must list a composite flag (`O_SYNC`, `O_TMPFILE`)
//! before the narrower flags it contains.

use crate::{format_helpers::format_hex, options::XlatStyle};

/// Builds a `static` [`Xlat`] from flag names. Names without a value are
/// looked up in `libc`.
///
/// ```ignore
/// pub static DIRENT_TYPES: Xlat = xlat![DT_UNKNOWN = 0, DT_FIFO = 1];
/// pub static OPEN_ACCESS_MODES: Xlat = xlat![O_RDONLY, O_WRONLY, O_RDWR];
/// ```
#[macro_export]
macro_rules! xlat {
    (@value $name:ident) => {
        libc::$name as u64
    };
    (@value $name:ident $value:expr) => {
        $value as u64
    };
    ($($name:ident $(= $value:expr)?),* $(,)?) => {
        $crate::xlat::Xlat::new(&[
            $($crate::xlat::XlatEntry {
                value: $crate::xlat!(@value $name $($value)?),
                name: Some(stringify!($name)),
            },)*
        ])
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XlatEntry {
    pub value: u64,
    /// `None` marks a placeholder, which is never printed.
    pub name: Option<&'static str>,
}

#[derive(Debug)]
pub struct Xlat {
    entries: &'static [XlatEntry],
    flags_mask: u64,
}

impl Xlat {
    pub const fn new(entries: &'static [XlatEntry]) -> Self {
        let mut flags_mask = 0;
        let mut i = 0;
        while i < entries.len() {
            flags_mask |= entries[i].value;
            i += 1;
        }

        Xlat {
            entries,
            flags_mask,
        }
    }

    /// Bitwise OR of every entry value.
    pub fn flags_mask(&self) -> u64 {
        self.flags_mask
    }

    /// Whether `flags` carries bits no entry of this table can ever explain.
    pub fn has_unknown_bits(&self, flags: u64) -> bool {
        flags & !self.flags_mask != 0
    }

    /// First entry with this value wins, even when it is a placeholder.
    pub fn lookup(&self, value: u64) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|entry| entry.value == value)
            .and_then(|entry| entry.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XvalRendering {
    pub text: String,
    /// The value matched a named table entry, whatever the style.
    pub known: bool,
}

/// Renders `value` as a single symbolic constant.
pub fn format_xval(
    xlat: &Xlat,
    value: u64,
    default_comment: Option<&str>,
    style: XlatStyle,
) -> XvalRendering {
    let name = xlat.lookup(value);
    let known = name.is_some();

    let text = match style {
        XlatStyle::Raw => format_hex(value),
        XlatStyle::Verbose => match name.or(default_comment) {
            Some(comment) => format!("{} /* {comment} */", format_hex(value)),
            None => format_hex(value),
        },
        XlatStyle::Abbrev => match (name, default_comment) {
            (Some(name), _) => name.to_string(),
            (None, Some(comment)) => format!("{} /* {comment} */", format_hex(value)),
            (None, None) => format_hex(value),
        },
    };

    XvalRendering { text, known }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagDecomposition {
    pub names: Vec<&'static str>,
    pub matched: u64,
    pub residual: u64,
}

/// Greedy, table-order decomposition of `flags` into named entries.
pub fn decompose_flags(xlat: &Xlat, flags: u64) -> FlagDecomposition {
    let mut decomposition = FlagDecomposition {
        residual: flags,
        ..Default::default()
    };

    for entry in xlat.entries {
        let Some(name) = entry.name else {
            continue;
        };

        if entry.value == 0 || decomposition.residual & entry.value != entry.value {
            continue;
        }

        decomposition.names.push(name);
        decomposition.matched |= entry.value;
        decomposition.residual &= !entry.value;
    }

    decomposition
}

/// Renders `flags` as `|`-joined names with any unexplained bits in hex.
pub fn format_flags(
    xlat: &Xlat,
    flags: u64,
    default_comment: Option<&str>,
    style: XlatStyle,
) -> String {
    if style == XlatStyle::Raw {
        return format_hex(flags);
    }

    if flags == 0 {
        if let Some(XlatEntry {
            value: 0,
            name: Some(name),
        }) = xlat.entries.first()
        {
            return name.to_string();
        }
    }

    let decomposition = decompose_flags(xlat, flags);

    let symbolic = if decomposition.names.is_empty() {
        None
    } else {
        let mut joined = decomposition.names.join("|");
        if decomposition.residual != 0 {
            joined.push('|');
            joined.push_str(&format_hex(decomposition.residual));
        }
        Some(joined)
    };

    match style {
        XlatStyle::Verbose => match symbolic.as_deref().or(default_comment) {
            Some(comment) => format!("{} /* {comment} */", format_hex(flags)),
            None => format_hex(flags),
        },
        _ => match (symbolic, default_comment) {
            (Some(symbolic), _) => symbolic,
            (None, Some(comment)) if flags != 0 => {
                format!("{} /* {comment} */", format_hex(flags))
            }
            (None, Some(_)) => "0".to_string(),
            (None, None) if flags != 0 => format_hex(flags),
            (None, None) => String::new(),
        },
    }
}
