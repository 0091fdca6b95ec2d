#![forbid(unsafe_code)]

//! Human-readable rendering of control sequences.

use std::fmt::Write as _;
use std::io::{self, Write};

use crate::capability::CapabilityRegistry;

const RED: &str = "\x1b[31;1m";
const BLUE_BG: &str = "\x1b[44m";
const RESET: &str = "\x1b[m";

/// How control bytes are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rendering {
    /// Caret notation only.
    #[default]
    Plain,
    /// Caret notation in bold red, spaces on a blue background.
    Ansi,
}

/// Caret notation: `ESC [ A` becomes `^[[A`, DEL becomes `^?`, bytes above
/// 0x7f become `\xNN`.
#[must_use]
pub fn escape_bytes(bytes: &[u8]) -> String {
    render(bytes, Rendering::Plain)
}

/// Caret notation with ANSI highlighting of control bytes and spaces.
#[must_use]
pub fn escape_bytes_highlighted(bytes: &[u8]) -> String {
    render(bytes, Rendering::Ansi)
}

/// Render `bytes` in the requested style.
#[must_use]
pub fn render(bytes: &[u8], rendering: Rendering) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        let (text, marked) = match b {
            0x00..=0x1f => (format!("^{}", char::from(b + 64)), true),
            b' ' => (" ".to_owned(), false),
            0x7f => ("^?".to_owned(), true),
            0x80..=0xff => (format!("\\x{b:02x}"), true),
            _ => (char::from(b).to_string(), false),
        };
        match rendering {
            Rendering::Ansi if marked => {
                let _ = write!(out, "{RED}{text}{RESET}");
            }
            Rendering::Ansi if b == b' ' => {
                let _ = write!(out, "{BLUE_BG} {RESET}");
            }
            _ => out.push_str(&text),
        }
    }
    out
}

/// Write one line per entry: index, code, optional description, and the
/// sequence (or `N/A`).
///
/// `descriptions` is indexed like the registry; the column is padded to
/// the longest description.
///
/// # Errors
///
/// Propagates write failures.
pub fn dump_registry<W: Write + ?Sized>(
    out: &mut W,
    registry: &CapabilityRegistry,
    descriptions: Option<&[&str]>,
    rendering: Rendering,
) -> io::Result<()> {
    let width = descriptions
        .map(|d| d.iter().map(|s| s.chars().count()).max().unwrap_or(0))
        .unwrap_or(0);
    for (position, entry) in registry.iter().enumerate() {
        let index = entry.index().unwrap_or(position);
        write!(out, "{index:3}: {} ", entry.code())?;
        if let Some(descriptions) = descriptions {
            let desc = descriptions.get(index).copied().unwrap_or("");
            write!(out, "{desc:<width$} ")?;
        }
        write!(out, " ")?;
        match entry.sequence() {
            Some(seq) => out.write_all(render(seq, rendering).as_bytes())?,
            None => out.write_all(b"N/A")?,
        }
        writeln!(out)?;
    }
    Ok(())
}
