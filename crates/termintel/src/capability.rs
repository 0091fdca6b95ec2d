#![forbid(unsafe_code)]

//! Capability registry: named, ordered collections of control sequences.
//!
//! A [`CapabilityRegistry`] is declared with two-byte capability codes only.
//! One resolution pass asks a [`SequenceSource`] for each code and copies the
//! returned bytes into buffers the registry owns exclusively. Lookups hand
//! out borrows tied to the registry; nothing else keeps the bytes.
//!
//! # Invariants
//!
//! 1. **Dense indices**: entry indices are `0..n-1` in declaration order,
//!    assigned by [`CapabilityRegistry::resolve`] whether or not a code
//!    resolves.
//! 2. **Sentinel**: a declaration ends at the first [`CapCode::SENTINEL`];
//!    the sentinel and anything after it are never part of the registry.
//! 3. **Single owner**: every resolved buffer belongs to exactly one entry of
//!    exactly one registry. Re-resolving drops the previous buffer first.
//! 4. **No replay after release**: once released, sequence lookups fail with
//!    [`CapabilityError::Released`] until the registry is resolved again.
//!
//! # Handles
//!
//! Callers never pass raw positions around. [`CapIndex`] handles come from
//! the registry itself and carry the registry's id, so a handle used against
//! another registry, or out of range, is a checked error rather than a stray
//! read.
//!
//! # Example
//!
//! ```
//! use termintel::capability::{CapCode, CapabilityRegistry};
//! use termintel::source::FixedSource;
//!
//! let source = FixedSource::new()
//!     .with(CapCode::of("ku"), b"\x1b[A")
//!     .with(CapCode::of("kd"), b"\x1b[B");
//! let mut keys = CapabilityRegistry::declare("keys", &[CapCode::of("ku"), CapCode::of("kd")]);
//! keys.resolve(&source).unwrap();
//!
//! let up = keys.find_by_code(CapCode::of("ku")).unwrap();
//! assert_eq!(keys.get(up).unwrap(), Some(&b"\x1b[A"[..]));
//! assert_eq!(keys.find_by_sequence(b"\x1b[B").map(|i| i.index()), Some(1));
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::source::{SequenceSource, SourceError};

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// CapCode
// ---------------------------------------------------------------------------

/// Two-byte capability code, e.g. `cm` (cursor motion) or `ku` (up arrow).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CapCode([u8; 2]);

impl CapCode {
    /// Zero byte pair marking the end of a declaration.
    pub const SENTINEL: Self = Self([0, 0]);

    /// Code from raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 2]) -> Self {
        Self(bytes)
    }

    /// Code from a two-character string literal.
    ///
    /// # Panics
    ///
    /// Panics (at compile time in const contexts) unless `code` is exactly
    /// two bytes long.
    #[must_use]
    pub const fn of(code: &str) -> Self {
        let bytes = code.as_bytes();
        assert!(bytes.len() == 2, "capability codes are two bytes");
        Self([bytes[0], bytes[1]])
    }

    /// Fallible parse of a two-byte code.
    #[must_use]
    pub fn parse(code: &str) -> Option<Self> {
        match code.as_bytes() {
            [a, b] => Some(Self([*a, *b])),
            _ => None,
        }
    }

    /// Raw code bytes.
    #[must_use]
    pub const fn bytes(&self) -> [u8; 2] {
        self.0
    }

    /// True for the zero pair that terminates a declaration.
    #[must_use]
    pub const fn is_sentinel(&self) -> bool {
        self.0[0] == 0
    }
}

impl fmt::Display for CapCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CapCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapCode({self})")
    }
}

// ---------------------------------------------------------------------------
// CapIndex
// ---------------------------------------------------------------------------

/// Opaque handle to one entry of one registry.
///
/// Only a [`CapabilityRegistry`] can produce these. The raw position is
/// readable through [`index`](Self::index) for display and table lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CapIndex {
    registry: u64,
    index: usize,
}

impl CapIndex {
    /// Position of the entry within its registry.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Checked-lookup failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    /// Raw index past the end of the registry.
    IndexOutOfRange { index: usize, len: usize },
    /// Handle produced by a different registry.
    ForeignHandle { registry: String },
    /// The registry's buffers have been released.
    Released { registry: String },
}

impl fmt::Display for CapabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndexOutOfRange { index, len } => {
                write!(f, "capability index {index} out of range (len {len})")
            }
            Self::ForeignHandle { registry } => {
                write!(f, "capability handle does not belong to registry '{registry}'")
            }
            Self::Released { registry } => write!(f, "registry '{registry}' has been released"),
        }
    }
}

impl std::error::Error for CapabilityError {}

/// Resolution failures. The registry stays consistent: entries resolved
/// before the failure keep their buffers and a retry is safe.
#[derive(Debug)]
pub enum ResolveError {
    /// The copy buffer for a sequence could not be allocated.
    Allocation { code: CapCode, len: usize },
    /// The sequence source failed for this code.
    Source { code: CapCode, source: SourceError },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allocation { code, len } => {
                write!(f, "cannot allocate {len} bytes for capability '{code}'")
            }
            Self::Source { code, .. } => write!(f, "lookup of capability '{code}' failed"),
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Allocation { .. } => None,
            Self::Source { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Entries and registry
// ---------------------------------------------------------------------------

/// One capability: its code, its owned sequence (if supported), its index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityEntry {
    code: CapCode,
    sequence: Option<Box<[u8]>>,
    index: Option<usize>,
}

impl CapabilityEntry {
    /// Capability code.
    #[must_use]
    pub const fn code(&self) -> CapCode {
        self.code
    }

    /// Resolved sequence, `None` when unsupported or not yet resolved.
    #[must_use]
    pub fn sequence(&self) -> Option<&[u8]> {
        self.sequence.as_deref()
    }

    /// Index assigned at resolution; `None` before the first pass.
    #[must_use]
    pub const fn index(&self) -> Option<usize> {
        self.index
    }

    /// True when a sequence is present.
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        self.sequence.is_some()
    }
}

/// Lifecycle state of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    /// Declared, or a resolution pass did not complete.
    Declared,
    /// Every entry went through a completed resolution pass.
    Resolved,
    /// Buffers released; sequences are no longer served.
    Released,
}

/// Outcome counts from one resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveSummary {
    /// Entries that received a sequence.
    pub resolved: usize,
    /// Entries the source has no sequence for.
    pub unsupported: usize,
}

/// Named, ordered collection of capability entries.
#[derive(Debug)]
pub struct CapabilityRegistry {
    id: u64,
    name: String,
    entries: Vec<CapabilityEntry>,
    state: RegistryState,
}

impl CapabilityRegistry {
    /// Declare a registry from capability codes, stopping at the first
    /// sentinel.
    #[must_use]
    pub fn declare(name: impl Into<String>, codes: &[CapCode]) -> Self {
        let entries = codes
            .iter()
            .take_while(|code| !code.is_sentinel())
            .map(|&code| CapabilityEntry {
                code,
                sequence: None,
                index: None,
            })
            .collect();
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            entries,
            state: RegistryState::Declared,
        }
    }

    /// Registry name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> RegistryState {
        self.state
    }

    /// Number of entries (the sentinel is never counted).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True for a registry with no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = &CapabilityEntry> {
        self.entries.iter()
    }

    /// Every handle, in index order.
    pub fn handles(&self) -> impl Iterator<Item = CapIndex> + '_ {
        (0..self.entries.len()).map(|index| self.make_handle(index))
    }

    /// Total bytes currently owned by this registry's buffers.
    #[must_use]
    pub fn resolved_bytes(&self) -> usize {
        self.entries
            .iter()
            .filter_map(|entry| entry.sequence.as_ref().map(|seq| seq.len()))
            .sum()
    }

    /// Resolve every entry through `source`.
    ///
    /// Each entry's previous buffer is dropped before its lookup, so calling
    /// this on an already-resolved registry never accumulates buffers.
    /// Codes the source does not know are left unsupported.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when the source fails or a copy cannot be
    /// allocated. Entries resolved before the failure remain valid.
    pub fn resolve(
        &mut self,
        source: &dyn SequenceSource,
    ) -> Result<ResolveSummary, ResolveError> {
        let span = crate::debug_span!("resolve", registry = %self.name);
        let _enter = span.enter();

        for (position, entry) in self.entries.iter_mut().enumerate() {
            entry.index = Some(position);
        }

        // A failed pass leaves the registry usable but not fully resolved.
        self.state = RegistryState::Declared;
        let mut summary = ResolveSummary::default();
        for entry in &mut self.entries {
            entry.sequence = None;
            let found = source.lookup(entry.code).map_err(|source| ResolveError::Source {
                code: entry.code,
                source,
            })?;
            match found {
                Some(bytes) => {
                    let owned = copy_owned(&bytes).ok_or(ResolveError::Allocation {
                        code: entry.code,
                        len: bytes.len(),
                    })?;
                    entry.sequence = Some(owned);
                    summary.resolved += 1;
                }
                None => {
                    crate::trace!(code = %entry.code, "capability unsupported");
                    summary.unsupported += 1;
                }
            }
        }
        self.state = RegistryState::Resolved;

        crate::debug!(
            resolved = summary.resolved,
            unsupported = summary.unsupported,
            "registry resolved"
        );
        Ok(summary)
    }

    /// Drop every owned buffer.
    ///
    /// Safe on never-resolved and already-released registries.
    pub fn release(&mut self) {
        for entry in &mut self.entries {
            entry.sequence = None;
        }
        if self.state != RegistryState::Released {
            crate::debug!(registry = %self.name, "registry released");
        }
        self.state = RegistryState::Released;
    }

    /// Handle of the first entry with `code`.
    ///
    /// Codes are expected to be unique within a registry; with duplicates,
    /// the earliest declaration wins.
    #[must_use]
    pub fn find_by_code(&self, code: CapCode) -> Option<CapIndex> {
        self.entries
            .iter()
            .position(|entry| entry.code == code)
            .map(|index| self.make_handle(index))
    }

    /// Handle of the first entry whose resolved sequence equals `bytes`
    /// exactly. Entries without a sequence are skipped.
    ///
    /// This is a full-sequence comparison, not a prefix search: two keys
    /// whose sequences share a prefix are told apart only once the read
    /// holds all of the longer one.
    #[must_use]
    pub fn find_by_sequence(&self, bytes: &[u8]) -> Option<CapIndex> {
        self.entries
            .iter()
            .position(|entry| entry.sequence.as_deref() == Some(bytes))
            .map(|index| self.make_handle(index))
    }

    /// Checked conversion of a raw position into a handle.
    ///
    /// # Errors
    ///
    /// [`CapabilityError::IndexOutOfRange`] past the last entry.
    pub fn handle(&self, index: usize) -> Result<CapIndex, CapabilityError> {
        if index < self.entries.len() {
            Ok(self.make_handle(index))
        } else {
            Err(CapabilityError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            })
        }
    }

    /// Entry behind a handle.
    ///
    /// # Errors
    ///
    /// [`CapabilityError::ForeignHandle`] or
    /// [`CapabilityError::IndexOutOfRange`].
    pub fn entry(&self, idx: CapIndex) -> Result<&CapabilityEntry, CapabilityError> {
        if idx.registry != self.id {
            return Err(CapabilityError::ForeignHandle {
                registry: self.name.clone(),
            });
        }
        self.entries
            .get(idx.index)
            .ok_or(CapabilityError::IndexOutOfRange {
                index: idx.index,
                len: self.entries.len(),
            })
    }

    /// Sequence behind a handle; `Ok(None)` when unsupported.
    ///
    /// # Errors
    ///
    /// Fails for foreign or out-of-range handles and for released
    /// registries.
    pub fn get(&self, idx: CapIndex) -> Result<Option<&[u8]>, CapabilityError> {
        let entry = self.entry(idx)?;
        if self.state == RegistryState::Released {
            return Err(CapabilityError::Released {
                registry: self.name.clone(),
            });
        }
        Ok(entry.sequence())
    }

    /// Sequence for a code, when declared, resolved, and supported.
    #[must_use]
    pub fn sequence_for(&self, code: CapCode) -> Option<&[u8]> {
        let idx = self.find_by_code(code)?;
        self.get(idx).ok().flatten()
    }

    const fn make_handle(&self, index: usize) -> CapIndex {
        CapIndex {
            registry: self.id,
            index,
        }
    }
}

fn copy_owned(bytes: &[u8]) -> Option<Box<[u8]>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(bytes.len()).ok()?;
    buf.extend_from_slice(bytes);
    Some(buf.into_boxed_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FixedSource;
    use std::borrow::Cow;

    const UP: CapCode = CapCode::of("ku");
    const DOWN: CapCode = CapCode::of("kd");
    const HOME: CapCode = CapCode::of("kh");

    fn arrows() -> FixedSource {
        FixedSource::new()
            .with(UP, b"\x1b[A")
            .with(DOWN, b"\x1b[B")
    }

    struct FailingSource {
        fail_on: CapCode,
        inner: FixedSource,
    }

    impl SequenceSource for FailingSource {
        fn lookup(&self, code: CapCode) -> Result<Option<Cow<'_, [u8]>>, SourceError> {
            if code == self.fail_on {
                return Err(SourceError::Unavailable("database went away".into()));
            }
            self.inner.lookup(code)
        }
    }

    #[test]
    fn code_display_and_parse() {
        assert_eq!(CapCode::of("cm").to_string(), "cm");
        assert_eq!(CapCode::parse("k;"), Some(CapCode::of("k;")));
        assert_eq!(CapCode::parse("abc"), None);
        assert!(CapCode::SENTINEL.is_sentinel());
        assert_eq!(CapCode::SENTINEL.to_string(), "\\x00\\x00");
    }

    #[test]
    fn resolve_assigns_dense_indices_regardless_of_support() {
        let mut reg = CapabilityRegistry::declare("keys", &[UP, HOME, DOWN]);
        assert!(reg.iter().all(|e| e.index().is_none()));

        let summary = reg.resolve(&arrows()).unwrap();
        assert_eq!(summary, ResolveSummary { resolved: 2, unsupported: 1 });
        let indices: Vec<_> = reg.iter().map(|e| e.index()).collect();
        assert_eq!(indices, vec![Some(0), Some(1), Some(2)]);
        assert!(!reg.iter().nth(1).unwrap().is_supported());
        assert_eq!(reg.state(), RegistryState::Resolved);
    }

    #[test]
    fn find_by_code_then_get_round_trips() {
        let mut reg = CapabilityRegistry::declare("keys", &[UP, DOWN]);
        reg.resolve(&arrows()).unwrap();
        let idx = reg.find_by_code(DOWN).unwrap();
        assert_eq!(idx.index(), 1);
        assert_eq!(reg.get(idx).unwrap(), Some(&b"\x1b[B"[..]));
        assert_eq!(reg.find_by_code(HOME), None);
    }

    #[test]
    fn duplicate_codes_first_match_wins() {
        let source = FixedSource::new().with(UP, b"\x1bOA");
        let mut reg = CapabilityRegistry::declare("dup", &[UP, UP]);
        reg.resolve(&source).unwrap();
        assert_eq!(reg.find_by_code(UP).unwrap().index(), 0);
        assert_eq!(reg.find_by_sequence(b"\x1bOA").unwrap().index(), 0);
    }

    #[test]
    fn find_by_sequence_is_exact_and_skips_unsupported() {
        let mut reg = CapabilityRegistry::declare("keys", &[HOME, UP, DOWN]);
        reg.resolve(&arrows()).unwrap();
        assert_eq!(reg.find_by_sequence(b"\x1b[A").unwrap().index(), 1);
        assert_eq!(reg.find_by_sequence(b"\x1b["), None);
        assert_eq!(reg.find_by_sequence(b"\x1b[AB"), None);
        assert_eq!(reg.find_by_sequence(b""), None);
    }

    #[test]
    fn re_resolve_does_not_accumulate_buffers() {
        let mut reg = CapabilityRegistry::declare("keys", &[UP, DOWN]);
        reg.resolve(&arrows()).unwrap();
        let once = reg.resolved_bytes();
        assert_eq!(once, 6);

        reg.resolve(&arrows()).unwrap();
        assert_eq!(reg.resolved_bytes(), once);

        reg.release();
        assert_eq!(reg.resolved_bytes(), 0);
        reg.resolve(&arrows()).unwrap();
        assert_eq!(reg.resolved_bytes(), once);
    }

    #[test]
    fn release_is_safe_twice_and_on_unresolved() {
        let mut fresh = CapabilityRegistry::declare("fresh", &[UP]);
        fresh.release();
        fresh.release();
        assert_eq!(fresh.state(), RegistryState::Released);

        let mut reg = CapabilityRegistry::declare("keys", &[UP]);
        reg.resolve(&arrows()).unwrap();
        reg.release();
        reg.release();
        assert_eq!(reg.resolved_bytes(), 0);
    }

    #[test]
    fn released_registry_refuses_sequences() {
        let mut reg = CapabilityRegistry::declare("keys", &[UP]);
        reg.resolve(&arrows()).unwrap();
        let idx = reg.find_by_code(UP).unwrap();
        reg.release();
        assert!(matches!(reg.get(idx), Err(CapabilityError::Released { .. })));
        assert_eq!(reg.sequence_for(UP), None);
        assert_eq!(reg.find_by_sequence(b"\x1b[A"), None);
    }

    #[test]
    fn foreign_and_out_of_range_handles_are_rejected() {
        let mut a = CapabilityRegistry::declare("a", &[UP]);
        let mut b = CapabilityRegistry::declare("b", &[UP, DOWN]);
        a.resolve(&arrows()).unwrap();
        b.resolve(&arrows()).unwrap();

        let from_b = b.find_by_code(DOWN).unwrap();
        assert!(matches!(a.get(from_b), Err(CapabilityError::ForeignHandle { .. })));
        assert_eq!(
            a.handle(5),
            Err(CapabilityError::IndexOutOfRange { index: 5, len: 1 })
        );
        assert_eq!(b.handle(1).unwrap(), from_b);
    }

    #[test]
    fn overlapping_registries_do_not_share_buffers() {
        let mut control = CapabilityRegistry::declare("a", &[UP, DOWN]);
        let mut keys = CapabilityRegistry::declare("b", &[DOWN, UP]);
        control.resolve(&arrows()).unwrap();
        keys.resolve(&arrows()).unwrap();

        control.release();
        assert_eq!(keys.sequence_for(UP), Some(&b"\x1b[A"[..]));
        assert_eq!(keys.sequence_for(DOWN), Some(&b"\x1b[B"[..]));
        assert_eq!(keys.resolved_bytes(), 6);
    }

    #[test]
    fn declaration_stops_at_sentinel() {
        let reg = CapabilityRegistry::declare("keys", &[UP, CapCode::SENTINEL, DOWN]);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.find_by_code(DOWN), None);

        let mut empty = CapabilityRegistry::declare("empty", &[CapCode::SENTINEL, UP]);
        assert!(empty.is_empty());
        assert_eq!(empty.resolve(&arrows()).unwrap(), ResolveSummary::default());
        assert_eq!(empty.find_by_sequence(b"\x1b[A"), None);
        empty.release();
    }

    #[test]
    fn source_failure_keeps_earlier_entries_and_allows_retry() {
        let failing = FailingSource {
            fail_on: DOWN,
            inner: arrows(),
        };
        let mut reg = CapabilityRegistry::declare("keys", &[UP, DOWN, HOME]);
        let err = reg.resolve(&failing).unwrap_err();
        assert!(matches!(err, ResolveError::Source { code, .. } if code == DOWN));
        assert_eq!(reg.state(), RegistryState::Declared);
        assert_eq!(reg.sequence_for(UP), Some(&b"\x1b[A"[..]));
        // Indices are assigned even for entries the pass never reached.
        assert_eq!(reg.iter().last().unwrap().index(), Some(2));

        reg.resolve(&arrows()).unwrap();
        assert_eq!(reg.state(), RegistryState::Resolved);
        assert_eq!(reg.resolved_bytes(), 6);
    }
}
