#![forbid(unsafe_code)]

//! Sequence sources: where capability bytes come from.
//!
//! Resolution precedence follows the `less` convention: an environment
//! variable named `LESS_TERMCAP_` followed by the two-byte code overrides
//! the terminal database. [`LayeredSource`] expresses that ordering for any
//! pair of sources.
//!
//! Sources may hand out borrowed bytes; the registry always copies them and
//! never keeps the borrow past the lookup call.

use std::borrow::Cow;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::io;

use crate::capability::CapCode;
use crate::terminfo::{Terminfo, TerminfoError};

/// Default environment override prefix.
pub const DEFAULT_ENV_PREFIX: &str = "LESS_TERMCAP_";

/// Failure of a source to answer a lookup (as opposed to "not found").
#[derive(Debug)]
pub enum SourceError {
    /// The backing store cannot be consulted.
    Unavailable(String),
    /// I/O failure while consulting the backing store.
    Io(io::Error),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "sequence source unavailable: {msg}"),
            Self::Io(err) => write!(f, "sequence source I/O error: {err}"),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Unavailable(_) => None,
            Self::Io(err) => Some(err),
        }
    }
}

/// Resolves a capability code to its raw sequence.
pub trait SequenceSource {
    /// Look up `code`.
    ///
    /// `Ok(None)` means the capability is unsupported, which is routine.
    ///
    /// # Errors
    ///
    /// Only when the source itself cannot answer.
    fn lookup(&self, code: CapCode) -> Result<Option<Cow<'_, [u8]>>, SourceError>;
}

impl<T: SequenceSource + ?Sized> SequenceSource for &T {
    fn lookup(&self, code: CapCode) -> Result<Option<Cow<'_, [u8]>>, SourceError> {
        (**self).lookup(code)
    }
}

impl<T: SequenceSource + ?Sized> SequenceSource for Box<T> {
    fn lookup(&self, code: CapCode) -> Result<Option<Cow<'_, [u8]>>, SourceError> {
        (**self).lookup(code)
    }
}

// ---------------------------------------------------------------------------
// Environment overrides
// ---------------------------------------------------------------------------

/// Snapshot of `<prefix><code>` environment variables.
///
/// The environment is read once at construction, so lookups are
/// deterministic for the lifetime of the value.
#[derive(Debug, Clone, Default)]
pub struct EnvOverride {
    prefix: String,
    values: HashMap<CapCode, Vec<u8>>,
}

impl EnvOverride {
    /// Snapshot `LESS_TERMCAP_xx` variables from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::with_prefix_from_env(DEFAULT_ENV_PREFIX)
    }

    /// Snapshot variables with a custom prefix.
    #[must_use]
    pub fn with_prefix_from_env(prefix: &str) -> Self {
        Self::from_vars(prefix, std::env::vars_os())
    }

    /// Build from explicit `(name, value)` pairs; names without the prefix
    /// or whose remainder is not a two-byte code are ignored.
    pub fn from_vars<I>(prefix: &str, vars: I) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let mut values = HashMap::new();
        for (name, value) in vars {
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(code) = name.strip_prefix(prefix).and_then(CapCode::parse) else {
                continue;
            };
            values.insert(code, os_bytes(value));
        }
        crate::debug!(prefix, overrides = values.len(), "environment overrides loaded");
        Self {
            prefix: prefix.to_owned(),
            values,
        }
    }

    /// Variable name prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Number of captured overrides.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no override was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SequenceSource for EnvOverride {
    fn lookup(&self, code: CapCode) -> Result<Option<Cow<'_, [u8]>>, SourceError> {
        Ok(self.values.get(&code).map(|v| Cow::Borrowed(v.as_slice())))
    }
}

#[cfg(unix)]
fn os_bytes(value: OsString) -> Vec<u8> {
    use std::os::unix::ffi::OsStringExt;
    value.into_vec()
}

#[cfg(not(unix))]
fn os_bytes(value: OsString) -> Vec<u8> {
    value.to_string_lossy().into_owned().into_bytes()
}

// ---------------------------------------------------------------------------
// Terminal database
// ---------------------------------------------------------------------------

/// Sequences from a terminfo entry, addressed by termcap code.
///
/// Each code is mapped to its terminfo name through
/// [`terminfo_name`](crate::terminfo::codes::terminfo_name); codes with no
/// standard name are looked up as extended capabilities of the same
/// spelling.
#[derive(Debug, Clone)]
pub struct TerminfoSource {
    entry: Terminfo,
}

impl TerminfoSource {
    /// Wrap a parsed entry.
    #[must_use]
    pub fn new(entry: Terminfo) -> Self {
        Self { entry }
    }

    /// Load the entry for `$TERM` from the standard search path.
    ///
    /// # Errors
    ///
    /// Fails when `TERM` is unset, no entry is found, or it cannot be parsed.
    pub fn from_env() -> Result<Self, TerminfoError> {
        Terminfo::from_env().map(Self::new)
    }

    /// Underlying entry.
    #[must_use]
    pub fn entry(&self) -> &Terminfo {
        &self.entry
    }
}

impl SequenceSource for TerminfoSource {
    fn lookup(&self, code: CapCode) -> Result<Option<Cow<'_, [u8]>>, SourceError> {
        Ok(self.entry.string_by_termcap(code).map(Cow::Borrowed))
    }
}

// ---------------------------------------------------------------------------
// Layering and fixed tables
// ---------------------------------------------------------------------------

/// Consults `primary` first and `fallback` only when `primary` has nothing.
#[derive(Debug, Clone)]
pub struct LayeredSource<P, F> {
    primary: P,
    fallback: F,
}

impl<P: SequenceSource, F: SequenceSource> LayeredSource<P, F> {
    /// Layer two sources.
    #[must_use]
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }

    /// The overriding source.
    #[must_use]
    pub fn primary(&self) -> &P {
        &self.primary
    }

    /// The fallback source.
    #[must_use]
    pub fn fallback(&self) -> &F {
        &self.fallback
    }
}

impl LayeredSource<EnvOverride, TerminfoSource> {
    /// Environment overrides over the `$TERM` database entry.
    ///
    /// # Errors
    ///
    /// Fails when the database entry cannot be loaded.
    pub fn from_env() -> Result<Self, TerminfoError> {
        Ok(Self::new(EnvOverride::from_env(), TerminfoSource::from_env()?))
    }
}

impl<P: SequenceSource, F: SequenceSource> SequenceSource for LayeredSource<P, F> {
    fn lookup(&self, code: CapCode) -> Result<Option<Cow<'_, [u8]>>, SourceError> {
        match self.primary.lookup(code)? {
            Some(bytes) => Ok(Some(bytes)),
            None => self.fallback.lookup(code),
        }
    }
}

/// In-memory code → sequence table.
#[derive(Debug, Clone, Default)]
pub struct FixedSource {
    values: HashMap<CapCode, Vec<u8>>,
}

impl FixedSource {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, code: CapCode, bytes: impl AsRef<[u8]>) -> Self {
        self.insert(code, bytes);
        self
    }

    /// Insert or replace a sequence.
    pub fn insert(&mut self, code: CapCode, bytes: impl AsRef<[u8]>) {
        self.values.insert(code, bytes.as_ref().to_vec());
    }
}

impl SequenceSource for FixedSource {
    fn lookup(&self, code: CapCode) -> Result<Option<Cow<'_, [u8]>>, SourceError> {
        Ok(self.values.get(&code).map(|v| Cow::Borrowed(v.as_slice())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(OsString, OsString)> {
        pairs
            .iter()
            .map(|(k, v)| (OsString::from(k), OsString::from(v)))
            .collect()
    }

    #[test]
    fn env_override_filters_by_prefix_and_code_length() {
        let over = EnvOverride::from_vars(
            DEFAULT_ENV_PREFIX,
            vars(&[
                ("LESS_TERMCAP_md", "\x1b[1;31m"),
                ("LESS_TERMCAP_toolong", "x"),
                ("LESS_TERMCAP_", "y"),
                ("OTHER_md", "z"),
            ]),
        );
        assert_eq!(over.len(), 1);
        assert_eq!(
            over.lookup(CapCode::of("md")).unwrap().as_deref(),
            Some(&b"\x1b[1;31m"[..])
        );
        assert!(over.lookup(CapCode::of("me")).unwrap().is_none());
    }

    #[test]
    fn env_override_custom_prefix() {
        let over = EnvOverride::from_vars("TI_", vars(&[("TI_cl", "CLEAR")]));
        assert_eq!(over.prefix(), "TI_");
        assert_eq!(
            over.lookup(CapCode::of("cl")).unwrap().as_deref(),
            Some(&b"CLEAR"[..])
        );
    }

    #[test]
    fn layered_prefers_primary() {
        let primary = FixedSource::new().with(CapCode::of("md"), b"OVERRIDE");
        let fallback = FixedSource::new()
            .with(CapCode::of("md"), b"\x1b[1m")
            .with(CapCode::of("me"), b"\x1b[m");
        let layered = LayeredSource::new(primary, fallback);
        assert_eq!(
            layered.lookup(CapCode::of("md")).unwrap().as_deref(),
            Some(&b"OVERRIDE"[..])
        );
        assert_eq!(
            layered.lookup(CapCode::of("me")).unwrap().as_deref(),
            Some(&b"\x1b[m"[..])
        );
        assert!(layered.lookup(CapCode::of("us")).unwrap().is_none());
    }

    #[test]
    fn terminfo_source_answers_by_termcap_code() {
        let mut entry = Terminfo::new();
        entry.set_string("bold", b"\x1b[1m").set_string("Ss", b"\x1b[%p1%d q");
        let source = TerminfoSource::new(entry);
        assert_eq!(
            source.lookup(CapCode::of("md")).unwrap().as_deref(),
            Some(&b"\x1b[1m"[..])
        );
        assert_eq!(
            source.lookup(CapCode::of("Ss")).unwrap().as_deref(),
            Some(&b"\x1b[%p1%d q"[..])
        );
        assert!(source.lookup(CapCode::of("me")).unwrap().is_none());
    }

    #[test]
    fn empty_override_still_wins() {
        let primary = EnvOverride::from_vars(DEFAULT_ENV_PREFIX, vars(&[("LESS_TERMCAP_us", "")]));
        let fallback = FixedSource::new().with(CapCode::of("us"), b"\x1b[4m");
        let layered = LayeredSource::new(primary, fallback);
        assert_eq!(
            layered.lookup(CapCode::of("us")).unwrap().as_deref(),
            Some(&b""[..])
        );
    }
}
