#![forbid(unsafe_code)]

//! Terminal database access.
//!
//! Finding, parsing and expanding compiled terminfo entries is done by
//! `terminfo-lean`. This module adds what the registry needs on top:
//!
//! - [`Terminfo`]: an owned copy of a parsed entry, so sources can hold it
//!   after the file buffer is gone.
//! - [`codes`]: the termcap code → terminfo name index behind
//!   [`CapCode`] lookups.
//! - [`expand`]: parameter-count checks and padding carried across
//!   expansion.

pub mod codes;
pub mod expand;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::capability::CapCode;

pub use expand::{ExpandContext, ExpandError, Parameter};
pub use terminfo_lean::locate::search_directories;

/// Failures loading a terminfo entry.
#[derive(Debug)]
pub enum TerminfoError {
    /// `TERM` is unset or empty.
    NoTerm,
    /// No entry for the terminal in any search directory.
    NotFound {
        term: String,
        source: terminfo_lean::locate::Error,
    },
    /// Reading the entry file failed.
    Io { path: PathBuf, source: io::Error },
    /// The entry is not a valid compiled terminfo file.
    Parse {
        path: Option<PathBuf>,
        source: terminfo_lean::parse::Error,
    },
}

impl fmt::Display for TerminfoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTerm => write!(f, "TERM is not set"),
            Self::NotFound { term, source } => {
                write!(f, "no terminfo entry for '{term}': {source}")
            }
            Self::Io { path, source } => {
                write!(f, "cannot read terminfo entry {}: {source}", path.display())
            }
            Self::Parse {
                path: Some(path),
                source,
            } => write!(f, "bad terminfo entry {}: {source}", path.display()),
            Self::Parse { path: None, source } => write!(f, "bad terminfo entry: {source}"),
        }
    }
}

impl std::error::Error for TerminfoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NoTerm => None,
            Self::NotFound { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}

/// A parsed terminfo entry, keyed by terminfo capability name.
///
/// Absent and cancelled capabilities are simply missing. Numbers are only
/// present when positive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Terminfo {
    flags: BTreeSet<String>,
    numbers: BTreeMap<String, i32>,
    strings: BTreeMap<String, Vec<u8>>,
}

impl Terminfo {
    /// Entry with no capabilities.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a compiled entry, extended capabilities included.
    ///
    /// # Errors
    ///
    /// [`TerminfoError::Parse`] for anything `terminfo-lean` rejects.
    pub fn parse(buffer: &[u8]) -> Result<Self, TerminfoError> {
        let parsed = terminfo_lean::parse::parse(buffer)
            .map_err(|source| TerminfoError::Parse { path: None, source })?;
        Ok(Self {
            flags: parsed.booleans.iter().map(|name| (*name).to_owned()).collect(),
            numbers: parsed
                .numbers
                .iter()
                .map(|(name, value)| ((*name).to_owned(), *value))
                .collect(),
            strings: parsed
                .strings
                .iter()
                .map(|(name, value)| ((*name).to_owned(), value.to_vec()))
                .collect(),
        })
    }

    /// Read and parse the entry at `path`.
    ///
    /// # Errors
    ///
    /// [`TerminfoError::Io`] or [`TerminfoError::Parse`].
    pub fn load(path: &Path) -> Result<Self, TerminfoError> {
        let buffer = fs::read(path).map_err(|source| TerminfoError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&buffer).map_err(|err| match err {
            TerminfoError::Parse { source, .. } => TerminfoError::Parse {
                path: Some(path.to_path_buf()),
                source,
            },
            other => other,
        })
    }

    /// Find `term` on the standard search path and load it.
    ///
    /// The path honors `TERMINFO`, `~/.terminfo` and `TERMINFO_DIRS` before
    /// the system directories; see [`search_directories`].
    ///
    /// # Errors
    ///
    /// [`TerminfoError::NotFound`] when no directory has the entry, or any
    /// error of [`load`](Self::load).
    pub fn locate(term: &str) -> Result<Self, TerminfoError> {
        let path = terminfo_lean::locate::locate(term).map_err(|source| TerminfoError::NotFound {
            term: term.to_owned(),
            source,
        })?;
        crate::debug!(term, path = %path.display(), "terminfo entry located");
        Self::load(&path)
    }

    /// Load the entry for `$TERM`.
    ///
    /// # Errors
    ///
    /// [`TerminfoError::NoTerm`] when `TERM` is unset or empty, or any
    /// error of [`locate`](Self::locate).
    pub fn from_env() -> Result<Self, TerminfoError> {
        let term = std::env::var("TERM").unwrap_or_default();
        if term.is_empty() {
            return Err(TerminfoError::NoTerm);
        }
        Self::locate(&term)
    }

    /// Whether boolean capability `name` is set.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.flags.contains(name)
    }

    /// Numeric capability `name`.
    #[must_use]
    pub fn number(&self, name: &str) -> Option<i32> {
        self.numbers.get(name).copied()
    }

    /// String capability `name`.
    #[must_use]
    pub fn string(&self, name: &str) -> Option<&[u8]> {
        self.strings.get(name).map(Vec::as_slice)
    }

    /// String capability for termcap `code`.
    ///
    /// Codes without a standard terminfo name fall back to an extended
    /// capability spelled like the code, such as `Ms` or `Ss`.
    #[must_use]
    pub fn string_by_termcap(&self, code: CapCode) -> Option<&[u8]> {
        if let Some(name) = codes::terminfo_name(code) {
            return self.string(name);
        }
        let raw = code.bytes();
        let name = std::str::from_utf8(&raw).ok()?;
        self.string(name)
    }

    /// Names of every string capability present.
    pub fn string_names(&self) -> impl Iterator<Item = &str> {
        self.strings.keys().map(String::as_str)
    }

    /// Set or clear boolean capability `name`.
    pub fn set_flag(&mut self, name: &str, value: bool) -> &mut Self {
        if value {
            self.flags.insert(name.to_owned());
        } else {
            self.flags.remove(name);
        }
        self
    }

    /// Set numeric capability `name`; non-positive values remove it.
    pub fn set_number(&mut self, name: &str, value: i32) -> &mut Self {
        if value > 0 {
            self.numbers.insert(name.to_owned(), value);
        } else {
            self.numbers.remove(name);
        }
        self
    }

    /// Set string capability `name`.
    pub fn set_string(&mut self, name: &str, value: impl AsRef<[u8]>) -> &mut Self {
        self.strings.insert(name.to_owned(), value.as_ref().to_vec());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn termcap_lookup_maps_standard_names() {
        let mut entry = Terminfo::new();
        entry.set_string("cup", b"\x1b[%i%p1%d;%p2%dH").set_string("smkx", b"\x1b=");
        assert_eq!(entry.string_by_termcap(CapCode::of("cm")), Some(&b"\x1b[%i%p1%d;%p2%dH"[..]));
        assert_eq!(entry.string_by_termcap(CapCode::of("ks")), Some(&b"\x1b="[..]));
        assert_eq!(entry.string_by_termcap(CapCode::of("ke")), None);
    }

    #[test]
    fn two_letter_extended_names_resolve_by_code() {
        let mut entry = Terminfo::new();
        entry.set_string("Ms", b"\x1b]52;%p1%s;%p2%s\x07");
        assert_eq!(
            entry.string_by_termcap(CapCode::of("Ms")),
            Some(&b"\x1b]52;%p1%s;%p2%s\x07"[..])
        );
        assert_eq!(entry.string_by_termcap(CapCode::of("Zz")), None);
    }

    #[test]
    fn setters_follow_database_rules() {
        let mut entry = Terminfo::new();
        entry.set_flag("xon", true).set_number("pb", 0).set_number("colors", 8);
        assert!(entry.flag("xon"));
        assert_eq!(entry.number("pb"), None);
        assert_eq!(entry.number("colors"), Some(8));
        entry.set_flag("xon", false);
        assert!(!entry.flag("xon"));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = Terminfo::parse(b"\x00\x00not a terminfo entry").unwrap_err();
        assert!(matches!(err, TerminfoError::Parse { path: None, .. }));
        assert!(matches!(Terminfo::parse(&[]), Err(TerminfoError::Parse { .. })));
    }
}
