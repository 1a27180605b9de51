// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gustavo Noronha Silva <gustavo@noronha.dev.br>

use std::pin::Pin;

use anyhow::{anyhow, Result};
use clap::ValueEnum;
use tokio::io::{AsyncWrite, AsyncWriteExt as _};
use tracefmt_common::syscalls::syscall_name_from_nr;

/// Push formatted argument to the formatter
#[macro_export]
macro_rules! argf {
    ($sf:expr, $($arg:tt)*) => {
        $sf.push_arg(format!($($arg)*).as_bytes()).await?
    };
}

/// Push argument to the formatter
#[macro_export]
macro_rules! arg {
    ($sf:expr, $arg:expr) => {
        $sf.push_arg($arg.as_bytes()).await?
    };
}

/// Push a `name=value` structure field to the formatter
#[macro_export]
macro_rules! field {
    ($sf:expr, $name:expr, $($arg:tt)*) => {
        $sf.push_field($name, format!($($arg)*).as_bytes()).await?
    };
}

/// Append a ` /* ... */` comment to the last value
#[macro_export]
macro_rules! comment {
    ($sf:expr, $($arg:tt)*) => {
        $sf.push_comment(format!($($arg)*).as_bytes()).await?
    };
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum FormattingStyle {
    #[default]
    OneLine,
    MultiLine,
}

pub struct Formatter<'f> {
    style: FormattingStyle,
    output: Pin<&'f mut dyn AsyncWrite>,
}

impl<'f> Formatter<'f> {
    pub fn new(output: Pin<&'f mut dyn AsyncWrite>, style: FormattingStyle) -> Self {
        Formatter { style, output }
    }

    pub async fn push_syscall(mut self, pid: u32, syscall_nr: i64) -> Result<SyscallFormatter<'f>> {
        let syscall_name = syscall_name_from_nr(syscall_nr)
            .ok_or_else(|| anyhow!(format!("Unknown syscall: {syscall_nr}")))?;

        let output = &mut self.output;

        output.write_all(pid.to_string().as_bytes()).await?;
        output.write_all(b" ").await?;
        output.write_all(syscall_name.as_bytes()).await?;
        output.write_all(b"(").await?;

        Ok(SyscallFormatter {
            formatter: self,
            args: vec![0],
            syscall_nr,
        })
    }
}

/// Writes one syscall line. Every value pushed at a given depth is separated
/// from the previous one automatically, so callers never emit separators.
pub struct SyscallFormatter<'f> {
    formatter: Formatter<'f>,
    args: Vec<usize>,
    syscall_nr: i64,
}

const INDENT_STEP: &[u8] = &[b' '; 4];
impl<'f> SyscallFormatter<'f> {
    fn argc(&self) -> usize {
        // We should always have at least one item.
        *self.args.last().unwrap()
    }

    fn inc_argc(&mut self) {
        // We should always have at least one item.
        *self.args.last_mut().unwrap() += 1;
    }

    pub fn syscall_nr(&self) -> i64 {
        self.syscall_nr
    }

    pub fn get_depth(&self) -> usize {
        self.args.len()
    }

    async fn separate(&mut self) -> Result<()> {
        let argc = self.argc();
        let depth = self.get_depth();
        let output = &mut self.formatter.output;

        if argc > 0 {
            output.write_all(b",").await?;
        }

        match self.formatter.style {
            FormattingStyle::OneLine => {
                if argc > 0 {
                    output.write_all(b" ").await?;
                }
            }
            FormattingStyle::MultiLine => {
                output.write_all(b"\n\t").await?;
                for _ in 0..depth {
                    output.write_all(INDENT_STEP).await?;
                }
            }
        }

        Ok(())
    }

    pub async fn push_depth(&mut self, bracket: &[u8]) -> Result<()> {
        self.separate().await?;
        self.inc_argc();

        self.formatter.output.write_all(bracket).await?;
        self.args.push(0);

        Ok(())
    }

    pub async fn pop_depth(&mut self, bracket: &[u8]) -> Result<()> {
        assert_ne!(self.get_depth(), 1);

        let had_items = self.argc() > 0;
        self.args.pop();

        let depth = self.get_depth();
        let output = &mut self.formatter.output;
        if let (FormattingStyle::MultiLine, true) = (self.formatter.style, had_items) {
            output.write_all(b"\n\t").await?;
            for _ in 0..depth {
                output.write_all(INDENT_STEP).await?;
            }
        }

        output.write_all(bracket).await?;

        Ok(())
    }

    pub async fn begin_struct(&mut self) -> Result<()> {
        self.push_depth(b"{").await
    }

    pub async fn end_struct(&mut self) -> Result<()> {
        self.pop_depth(b"}").await
    }

    pub async fn begin_array(&mut self) -> Result<()> {
        self.push_depth(b"[").await
    }

    pub async fn end_array(&mut self) -> Result<()> {
        self.pop_depth(b"]").await
    }

    pub async fn push_arg(&mut self, arg: &[u8]) -> Result<()> {
        self.separate().await?;
        self.formatter.output.write_all(arg).await?;
        self.inc_argc();

        Ok(())
    }

    pub async fn push_field(&mut self, name: &str, value: &[u8]) -> Result<()> {
        self.separate().await?;

        let output = &mut self.formatter.output;
        output.write_all(name.as_bytes()).await?;
        output.write_all(b"=").await?;
        output.write_all(value).await?;

        self.inc_argc();

        Ok(())
    }

    /// Annotates whatever was written last, without a separator.
    pub async fn push_comment(&mut self, text: &[u8]) -> Result<()> {
        let output = &mut self.formatter.output;
        output.write_all(b" /* ").await?;
        output.write_all(text).await?;
        output.write_all(b" */").await?;
        Ok(())
    }

    pub async fn finish(
        mut self,
        return_value: i64,
        suffix: Option<&[u8]>,
    ) -> Result<Formatter<'f>> {
        assert_eq!(self.get_depth(), 1);

        let formatted = crate::format_helpers::format_return_value(self.syscall_nr, return_value);

        let output = &mut self.formatter.output;

        if let FormattingStyle::MultiLine = self.formatter.style {
            output.write_all(b"\n\t").await?;
        }

        output.write_all(b") = ").await?;
        output.write_all(formatted.as_bytes()).await?;

        if let Some(suffix) = suffix {
            output.write_all(suffix).await?;
        }

        output.write_all(b"\n").await?;

        Ok(self.formatter)
    }
}
