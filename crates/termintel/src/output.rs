#![forbid(unsafe_code)]

//! Pacing-aware output.
//!
//! Capability strings may embed padding requests of the form `$<N>`, where
//! `N` is a delay in milliseconds with at most one decimal, optionally
//! followed by `*` (multiply by the number of affected lines) and `/`
//! (mandatory, even on flow-controlled terminals). [`PacedWriter`] honors
//! them according to its [`PacingPolicy`]; everything else is written as is.

use std::fmt;
use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use crate::terminfo::Terminfo;

/// Destination for capability bytes.
pub trait OutputSink {
    /// Write one sequence. `affected_lines` scales proportional padding.
    ///
    /// # Errors
    ///
    /// Propagates the underlying write failure.
    fn put(&mut self, bytes: &[u8], affected_lines: u32) -> io::Result<()>;

    /// Flush buffered output.
    ///
    /// # Errors
    ///
    /// Propagates the underlying flush failure.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: OutputSink + ?Sized> OutputSink for &mut S {
    fn put(&mut self, bytes: &[u8], affected_lines: u32) -> io::Result<()> {
        (**self).put(bytes, affected_lines)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

/// Records bytes verbatim, padding markers included.
impl OutputSink for Vec<u8> {
    fn put(&mut self, bytes: &[u8], _affected_lines: u32) -> io::Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Padding syntax
// ---------------------------------------------------------------------------

/// One `$<…>` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delay {
    /// Delay in tenths of a millisecond.
    pub tenths_ms: u32,
    /// `*`: scale by affected lines.
    pub proportional: bool,
    /// `/`: honor even when padding is otherwise disabled.
    pub mandatory: bool,
}

impl Delay {
    /// Total wait for `affected_lines`.
    #[must_use]
    pub fn duration(&self, affected_lines: u32) -> Duration {
        let tenths = if self.proportional {
            u64::from(self.tenths_ms) * u64::from(affected_lines.max(1))
        } else {
            u64::from(self.tenths_ms)
        };
        Duration::from_micros(tenths * 100)
    }
}

/// Renders the request back in `$<N[.d][*][/]>` form.
impl fmt::Display for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (whole, tenth) = (self.tenths_ms / 10, self.tenths_ms % 10);
        write!(f, "$<{whole}")?;
        if tenth != 0 {
            write!(f, ".{tenth}")?;
        }
        if self.proportional {
            f.write_str("*")?;
        }
        if self.mandatory {
            f.write_str("/")?;
        }
        f.write_str(">")
    }
}

/// A piece of a capability string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Bytes(&'a [u8]),
    Delay(Delay),
}

/// Split `seq` into literal runs and padding requests.
///
/// A `$<` that does not form a valid request is literal text.
#[must_use]
pub fn split_padding(seq: &[u8]) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;
    while i + 1 < seq.len() {
        if seq[i] == b'$' && seq[i + 1] == b'<' {
            if let Some((delay, end)) = parse_delay(seq, i + 2) {
                if literal_start < i {
                    segments.push(Segment::Bytes(&seq[literal_start..i]));
                }
                segments.push(Segment::Delay(delay));
                i = end;
                literal_start = end;
                continue;
            }
        }
        i += 1;
    }
    if literal_start < seq.len() {
        segments.push(Segment::Bytes(&seq[literal_start..]));
    }
    segments
}

/// `seq` with every padding request removed.
#[must_use]
pub fn strip_padding(seq: &[u8]) -> Vec<u8> {
    split_padding(seq)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Bytes(bytes) => Some(bytes),
            Segment::Delay(_) => None,
        })
        .flatten()
        .copied()
        .collect()
}

/// Parse `N[.d][*][/]>` starting at `i`; returns the delay and the position
/// after `>`.
fn parse_delay(seq: &[u8], mut i: usize) -> Option<(Delay, usize)> {
    let mut whole: u32 = 0;
    let mut seen_digit = false;
    while let Some(&d @ b'0'..=b'9') = seq.get(i) {
        whole = whole.saturating_mul(10).saturating_add(u32::from(d - b'0'));
        seen_digit = true;
        i += 1;
    }
    let mut tenth = 0;
    if seq.get(i) == Some(&b'.') {
        i += 1;
        if let Some(&d @ b'0'..=b'9') = seq.get(i) {
            tenth = u32::from(d - b'0');
            seen_digit = true;
            i += 1;
        }
        // Further decimals carry no weight.
        while seq.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
    }
    if !seen_digit {
        return None;
    }
    let mut delay = Delay {
        tenths_ms: whole.saturating_mul(10).saturating_add(tenth),
        proportional: false,
        mandatory: false,
    };
    loop {
        match seq.get(i)? {
            b'*' => delay.proportional = true,
            b'/' => delay.mandatory = true,
            b'>' => return Some((delay, i + 1)),
            _ => return None,
        }
        i += 1;
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// How padding delays are realized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadMode {
    /// Drop every delay.
    Strip,
    /// Flush, then sleep for the delay.
    Sleep,
    /// Emit `pad` bytes that take the delay to transmit at `baud`.
    PadChars { pad: u8, baud: u32 },
}

/// Padding behavior of a [`PacedWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    /// Realization of honored delays.
    pub mode: PadMode,
    /// Honor only `/` (mandatory) delays.
    pub mandatory_only: bool,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            mode: PadMode::Sleep,
            mandatory_only: true,
        }
    }
}

impl PacingPolicy {
    /// Drop all padding.
    #[must_use]
    pub const fn strip() -> Self {
        Self {
            mode: PadMode::Strip,
            mandatory_only: true,
        }
    }

    /// Set the realization mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: PadMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set whether only mandatory delays are honored.
    #[must_use]
    pub const fn with_mandatory_only(mut self, mandatory_only: bool) -> Self {
        self.mandatory_only = mandatory_only;
        self
    }

    /// Derive a policy from an entry's `xon`, `pb` and `pad` capabilities.
    ///
    /// Optional delays are honored only when the terminal has no xon/xoff
    /// flow control and `baud` is at least the entry's padding threshold.
    /// With a known `baud` and a `pad` character, delays become pad bytes.
    #[must_use]
    pub fn from_terminfo(entry: &Terminfo, baud: Option<u32>) -> Self {
        let xon = entry.flag("xon");
        let threshold = entry.number("pb").and_then(|n| u32::try_from(n).ok());
        let below_threshold = match (baud, threshold) {
            (Some(baud), Some(threshold)) => baud < threshold,
            (None, _) => true,
            (Some(_), None) => false,
        };
        let mode = match (baud, entry.string("pad").and_then(|p| p.first())) {
            (Some(baud), Some(&pad)) => PadMode::PadChars { pad, baud },
            _ => PadMode::Sleep,
        };
        Self {
            mode,
            mandatory_only: xon || below_threshold,
        }
    }

    fn honors(&self, delay: &Delay) -> bool {
        delay.mandatory || !self.mandatory_only
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// [`OutputSink`] over any [`Write`], interpreting padding requests.
#[derive(Debug)]
pub struct PacedWriter<W: Write> {
    inner: W,
    policy: PacingPolicy,
}

impl<W: Write> PacedWriter<W> {
    /// Writer with the default policy.
    pub fn new(inner: W) -> Self {
        Self::with_policy(inner, PacingPolicy::default())
    }

    /// Writer with an explicit policy.
    pub fn with_policy(inner: W, policy: PacingPolicy) -> Self {
        Self { inner, policy }
    }

    /// Current policy.
    #[must_use]
    pub fn policy(&self) -> PacingPolicy {
        self.policy
    }

    /// Replace the policy.
    pub fn set_policy(&mut self, policy: PacingPolicy) {
        self.policy = policy;
    }

    /// Borrow the inner writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutably borrow the inner writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Unwrap the inner writer.
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn pad(&mut self, delay: &Delay, affected_lines: u32) -> io::Result<()> {
        if !self.policy.honors(delay) {
            return Ok(());
        }
        let wait = delay.duration(affected_lines);
        match self.policy.mode {
            PadMode::Strip => Ok(()),
            PadMode::Sleep => {
                self.inner.flush()?;
                crate::trace!(micros = wait.as_micros() as u64, "padding sleep");
                thread::sleep(wait);
                Ok(())
            }
            PadMode::PadChars { pad, baud } => {
                // baud / 10 characters per second.
                let count = u128::from(baud) * wait.as_micros() / 10_000_000;
                let count = usize::try_from(count).unwrap_or(usize::MAX);
                let fill = vec![pad; count];
                self.inner.write_all(&fill)
            }
        }
    }
}

impl<W: Write> OutputSink for PacedWriter<W> {
    fn put(&mut self, bytes: &[u8], affected_lines: u32) -> io::Result<()> {
        for segment in split_padding(bytes) {
            match segment {
                Segment::Bytes(run) => self.inner.write_all(run)?,
                Segment::Delay(delay) => self.pad(&delay, affected_lines)?,
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delay(tenths_ms: u32, proportional: bool, mandatory: bool) -> Delay {
        Delay {
            tenths_ms,
            proportional,
            mandatory,
        }
    }

    #[test]
    fn splits_padding_requests() {
        let segments = split_padding(b"\x1b[H$<5>\x1b[2J$<2.5*/>");
        assert_eq!(
            segments,
            vec![
                Segment::Bytes(b"\x1b[H"),
                Segment::Delay(delay(50, false, false)),
                Segment::Bytes(b"\x1b[2J"),
                Segment::Delay(delay(25, true, true)),
            ]
        );
    }

    #[test]
    fn malformed_requests_are_literal() {
        for text in [&b"$<>"[..], b"$<x>", b"$<5", b"cost $5", b"$<5?>"] {
            assert_eq!(strip_padding(text), text, "{:?}", String::from_utf8_lossy(text));
        }
        assert_eq!(strip_padding(b"a$<1>b$<3/>c"), b"abc");
    }

    #[test]
    fn delays_render_in_source_form() {
        for text in ["$<5>", "$<2.5*/>", "$<0.5/>", "$<100*>"] {
            match split_padding(text.as_bytes()).as_slice() {
                [Segment::Delay(delay)] => assert_eq!(delay.to_string(), text),
                other => panic!("{text}: {other:?}"),
            }
        }
    }

    #[test]
    fn proportional_delay_scales_with_lines() {
        let d = delay(20, true, false);
        assert_eq!(d.duration(5), Duration::from_millis(10));
        assert_eq!(d.duration(0), Duration::from_millis(2));
        assert_eq!(delay(20, false, false).duration(5), Duration::from_millis(2));
    }

    #[test]
    fn pad_chars_fill_the_delay() {
        let policy = PacingPolicy::default()
            .with_mode(PadMode::PadChars { pad: 0, baud: 9600 })
            .with_mandatory_only(false);
        let mut w = PacedWriter::with_policy(Vec::new(), policy);
        w.put(b"X$<10>Y", 1).unwrap();
        // 10ms at 960 chars/s is 9.6 characters.
        let out = w.into_inner();
        assert_eq!(out.first(), Some(&b'X'));
        assert_eq!(out.last(), Some(&b'Y'));
        assert_eq!(out.len(), 2 + 9);
    }

    #[test]
    fn optional_delays_skipped_when_mandatory_only() {
        let policy = PacingPolicy::default().with_mode(PadMode::PadChars { pad: b'.', baud: 9600 });
        let mut w = PacedWriter::with_policy(Vec::new(), policy);
        w.put(b"a$<10>b$<10/>c", 1).unwrap();
        assert_eq!(w.into_inner(), b"ab.........c");
    }

    #[test]
    fn strip_policy_drops_everything() {
        let mut w = PacedWriter::with_policy(Vec::new(), PacingPolicy::strip());
        w.put(b"a$<100/>b", 1).unwrap();
        assert_eq!(w.get_ref(), b"ab");
    }

    #[test]
    fn policy_from_entry() {
        let mut entry = Terminfo::new();
        entry.set_number("pb", 1200).set_string("pad", b"\x00");
        let fast = PacingPolicy::from_terminfo(&entry, Some(9600));
        assert!(!fast.mandatory_only);
        assert_eq!(fast.mode, PadMode::PadChars { pad: 0, baud: 9600 });

        let slow = PacingPolicy::from_terminfo(&entry, Some(300));
        assert!(slow.mandatory_only);

        entry.set_flag("xon", true);
        assert!(PacingPolicy::from_terminfo(&entry, Some(9600)).mandatory_only);
        assert_eq!(PacingPolicy::from_terminfo(&entry, None).mode, PadMode::Sleep);
    }

    #[test]
    fn vec_sink_records_verbatim() {
        let mut sink: Vec<u8> = Vec::new();
        OutputSink::put(&mut sink, b"\x1b[K$<3>", 1).unwrap();
        assert_eq!(sink, b"\x1b[K$<3>");
    }
}
