#![forbid(unsafe_code)]

//! Sequence playback.
//!
//! A [`SequenceExecutor`] writes resolved capability sequences to an
//! [`OutputSink`], expanding parameterized templates first when asked to.
//! Playback never fails: a missing capability, a stale handle, a bad
//! template or a write error all degrade to "nothing written", reported as
//! [`Playback::Skipped`] and logged.

use std::fmt;
use std::io;

use crate::capability::{CapCode, CapIndex, CapabilityError, CapabilityRegistry};
use crate::output::OutputSink;
use crate::terminfo::expand::{expand_in, ExpandContext, ExpandError, Parameter};

/// Why a playback wrote nothing.
#[derive(Debug, PartialEq)]
pub enum SkipReason {
    /// The capability has no sequence on this terminal.
    Unsupported,
    /// The registry has been released.
    Released,
    /// The handle is foreign or out of range, or the code is not declared.
    BadHandle,
    /// Parameter expansion failed.
    Expand(ExpandError),
    /// The sink refused the bytes.
    Write(io::ErrorKind),
}

/// Outcome of one playback.
#[derive(Debug, PartialEq)]
pub enum Playback {
    /// This many sequence bytes were handed to the sink.
    Written(usize),
    /// Nothing was written.
    Skipped(SkipReason),
}

impl Playback {
    /// True when bytes reached the sink.
    #[must_use]
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written(_))
    }
}

/// Plays capability sequences through a sink.
///
/// One expansion context lives as long as the executor, so `%P`/`%g`
/// static variables persist across playbacks the way the terminal expects.
pub struct SequenceExecutor<S: OutputSink> {
    sink: S,
    context: ExpandContext,
}

impl<S: OutputSink + fmt::Debug> fmt::Debug for SequenceExecutor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceExecutor").field("sink", &self.sink).finish_non_exhaustive()
    }
}

impl<S: OutputSink> SequenceExecutor<S> {
    /// Executor writing to `sink`.
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            context: ExpandContext::new(),
        }
    }

    /// Borrow the sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutably borrow the sink.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Unwrap the sink.
    pub fn into_inner(self) -> S {
        self.sink
    }

    /// Flush the sink; failures are logged and ignored.
    pub fn flush(&mut self) {
        if let Err(err) = self.sink.flush() {
            crate::warn!(error = %err, "output flush failed");
        }
    }

    /// Play an entry affecting one line.
    pub fn execute(&mut self, registry: &CapabilityRegistry, idx: CapIndex) -> Playback {
        self.execute_with_lines(registry, idx, 1)
    }

    /// Play an entry; `lines` scales proportional padding.
    pub fn execute_with_lines(
        &mut self,
        registry: &CapabilityRegistry,
        idx: CapIndex,
        lines: u32,
    ) -> Playback {
        match sequence(registry, idx) {
            Ok(bytes) => self.write(bytes, lines),
            Err(reason) => skipped(registry, idx, reason),
        }
    }

    /// Expand an entry's template with `params`, then play it.
    pub fn execute_params(
        &mut self,
        registry: &CapabilityRegistry,
        idx: CapIndex,
        params: &[Parameter],
    ) -> Playback {
        self.execute_params_with_lines(registry, idx, params, 1)
    }

    /// Expand with `params` and play; `lines` scales proportional padding.
    pub fn execute_params_with_lines(
        &mut self,
        registry: &CapabilityRegistry,
        idx: CapIndex,
        params: &[Parameter],
        lines: u32,
    ) -> Playback {
        let template = match sequence(registry, idx) {
            Ok(bytes) => bytes,
            Err(reason) => return skipped(registry, idx, reason),
        };
        match expand_in(&mut self.context, template, params) {
            Ok(expanded) => self.write(&expanded, lines),
            Err(err) => skipped(registry, idx, SkipReason::Expand(err)),
        }
    }

    /// Play the entry declared with `code`.
    pub fn execute_code(&mut self, registry: &CapabilityRegistry, code: CapCode) -> Playback {
        match registry.find_by_code(code) {
            Some(idx) => self.execute(registry, idx),
            None => Playback::Skipped(SkipReason::BadHandle),
        }
    }

    /// Expand and play the entry declared with `code`.
    pub fn execute_code_params(
        &mut self,
        registry: &CapabilityRegistry,
        code: CapCode,
        params: &[Parameter],
    ) -> Playback {
        match registry.find_by_code(code) {
            Some(idx) => self.execute_params(registry, idx, params),
            None => Playback::Skipped(SkipReason::BadHandle),
        }
    }

    fn write(&mut self, bytes: &[u8], lines: u32) -> Playback {
        match self.sink.put(bytes, lines) {
            Ok(()) => Playback::Written(bytes.len()),
            Err(err) => {
                crate::warn!(error = %err, "sequence write failed");
                Playback::Skipped(SkipReason::Write(err.kind()))
            }
        }
    }
}

fn sequence(registry: &CapabilityRegistry, idx: CapIndex) -> Result<&[u8], SkipReason> {
    match registry.get(idx) {
        Ok(Some(bytes)) => Ok(bytes),
        Ok(None) => Err(SkipReason::Unsupported),
        Err(CapabilityError::Released { .. }) => Err(SkipReason::Released),
        Err(_) => Err(SkipReason::BadHandle),
    }
}

fn skipped(registry: &CapabilityRegistry, idx: CapIndex, reason: SkipReason) -> Playback {
    match &reason {
        SkipReason::Unsupported => {
            crate::debug!(registry = registry.name(), index = idx.index(), "capability unsupported, skipped");
        }
        other => {
            crate::warn!(registry = registry.name(), index = idx.index(), reason = ?other, "playback skipped");
        }
    }
    Playback::Skipped(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FixedSource;

    struct FailingSink;

    impl OutputSink for FailingSink {
        fn put(&mut self, _bytes: &[u8], _lines: u32) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    fn control() -> CapabilityRegistry {
        let source = FixedSource::new()
            .with(CapCode::of("cl"), b"\x1b[H\x1b[2J")
            .with(CapCode::of("cm"), b"\x1b[%i%p1%d;%p2%dH");
        let mut reg = CapabilityRegistry::declare(
            "control",
            &[CapCode::of("cl"), CapCode::of("cm"), CapCode::of("sf")],
        );
        reg.resolve(&source).unwrap();
        reg
    }

    #[test]
    fn plays_plain_sequence() {
        let reg = control();
        let mut exec = SequenceExecutor::new(Vec::new());
        let cl = reg.find_by_code(CapCode::of("cl")).unwrap();
        assert_eq!(exec.execute(&reg, cl), Playback::Written(7));
        assert_eq!(exec.sink().as_slice(), b"\x1b[H\x1b[2J");
    }

    #[test]
    fn expands_parameters_deterministically() {
        let reg = control();
        let mut exec = SequenceExecutor::new(Vec::new());
        let cm = reg.find_by_code(CapCode::of("cm")).unwrap();
        for _ in 0..2 {
            let played = exec.execute_params(&reg, cm, &[24.into(), 80.into()]);
            assert_eq!(played, Playback::Written(8));
        }
        assert_eq!(exec.into_inner(), b"\x1b[25;81H\x1b[25;81H");
    }

    #[test]
    fn unsupported_writes_nothing() {
        let reg = control();
        let mut exec = SequenceExecutor::new(Vec::new());
        let sf = reg.find_by_code(CapCode::of("sf")).unwrap();
        assert_eq!(exec.execute(&reg, sf), Playback::Skipped(SkipReason::Unsupported));
        assert_eq!(
            exec.execute_code(&reg, CapCode::of("zz")),
            Playback::Skipped(SkipReason::BadHandle)
        );
        assert!(exec.sink().is_empty());
    }

    #[test]
    fn released_and_foreign_handles_are_skipped() {
        let mut reg = control();
        let other = control();
        let mut exec = SequenceExecutor::new(Vec::new());
        let foreign = other.find_by_code(CapCode::of("cl")).unwrap();
        assert_eq!(exec.execute(&reg, foreign), Playback::Skipped(SkipReason::BadHandle));

        let cl = reg.find_by_code(CapCode::of("cl")).unwrap();
        reg.release();
        assert_eq!(exec.execute(&reg, cl), Playback::Skipped(SkipReason::Released));
        assert!(exec.sink().is_empty());
    }

    #[test]
    fn missing_parameters_skip() {
        let reg = control();
        let mut exec = SequenceExecutor::new(Vec::new());
        let played = exec.execute_code_params(&reg, CapCode::of("cm"), &[1.into()]);
        assert!(matches!(
            played,
            Playback::Skipped(SkipReason::Expand(ExpandError::MissingParameters {
                required: 2,
                supplied: 1
            }))
        ));
        assert!(exec.sink().is_empty());
    }

    #[test]
    fn static_variables_persist_between_playbacks() {
        let source = FixedSource::new()
            .with(CapCode::of("S1"), b"%p1%PA")
            .with(CapCode::of("S2"), b"<%gA%d>");
        let reg = {
            let mut reg = CapabilityRegistry::declare("vars", &[CapCode::of("S1"), CapCode::of("S2")]);
            reg.resolve(&source).unwrap();
            reg
        };
        let mut exec = SequenceExecutor::new(Vec::new());
        assert_eq!(exec.execute_code_params(&reg, CapCode::of("S1"), &[7.into()]), Playback::Written(0));
        assert_eq!(exec.execute_code_params(&reg, CapCode::of("S2"), &[]), Playback::Written(3));
        assert_eq!(exec.sink().as_slice(), b"<7>");
    }

    #[test]
    fn padding_reaches_the_sink_after_expansion() {
        let source = FixedSource::new().with(CapCode::of("AL"), b"\x1b[%p1%dL$<1*>");
        let mut reg = CapabilityRegistry::declare("control", &[CapCode::of("AL")]);
        reg.resolve(&source).unwrap();
        let mut exec = SequenceExecutor::new(Vec::new());
        exec.execute_code_params(&reg, CapCode::of("AL"), &[4.into()]);
        assert_eq!(exec.sink().as_slice(), b"\x1b[4L$<1*>");
    }

    #[test]
    fn write_failure_is_reported_not_raised() {
        let reg = control();
        let mut exec = SequenceExecutor::new(FailingSink);
        let played = exec.execute_code(&reg, CapCode::of("cl"));
        assert_eq!(played, Playback::Skipped(SkipReason::Write(io::ErrorKind::BrokenPipe)));
        assert!(!played.is_written());
    }
}
