#![forbid(unsafe_code)]

//! Parameterized capability expansion.
//!
//! The `tparm` language itself is interpreted by
//! [`terminfo_lean::expand::ExpandContext`]. Around it this module:
//!
//! - rejects calls that supply fewer parameters than the template reads
//!   (the interpreter would quietly substitute zero) or more than `%p9`
//!   can reach;
//! - keeps `$<…>` padding requests, which the interpreter drops, by
//!   re-appending them to the expanded bytes so the output sink can honor
//!   them;
//! - turns an interpreter panic (division by zero in `%/` or `%m`) into an
//!   error.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::output::{split_padding, Segment};

pub use terminfo_lean::expand::{ExpandContext, Parameter};

/// Highest parameter a template can address (`%p9`).
pub const MAX_PARAMS: usize = 9;

/// Why a template could not be expanded.
#[derive(Debug, PartialEq)]
pub enum ExpandError {
    /// The template reads `%p{required}` but fewer were supplied.
    MissingParameters { required: usize, supplied: usize },
    /// More than [`MAX_PARAMS`] were supplied.
    TooManyParameters(usize),
    /// The interpreter rejected the template.
    Template(terminfo_lean::expand::Error),
    /// The interpreter panicked, e.g. on division by zero.
    Aborted,
}

impl fmt::Display for ExpandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingParameters { required, supplied } => write!(
                f,
                "template needs {required} parameters, {supplied} supplied"
            ),
            Self::TooManyParameters(n) => {
                write!(f, "{n} parameters supplied, at most {MAX_PARAMS} allowed")
            }
            Self::Template(err) => write!(f, "bad template: {err}"),
            Self::Aborted => write!(f, "template evaluation aborted"),
        }
    }
}

impl std::error::Error for ExpandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Template(err) => Some(err),
            _ => None,
        }
    }
}

/// Highest `%pN` the template references, `0` when it reads none.
///
/// `%%` and `%'c'` are skipped so their payload is never taken for a
/// parameter push.
#[must_use]
pub fn required_params(template: &[u8]) -> usize {
    let mut highest = 0;
    let mut i = 0;
    while i < template.len() {
        if template[i] != b'%' {
            i += 1;
            continue;
        }
        match template.get(i + 1) {
            Some(b'%') => i += 2,
            Some(b'\'') => i += 4,
            Some(b'p') => {
                if let Some(d @ b'1'..=b'9') = template.get(i + 2) {
                    highest = highest.max(usize::from(d - b'0'));
                }
                i += 3;
            }
            _ => i += 2,
        }
    }
    highest
}

/// Expand `template` with `params` in `context`, whose static variables
/// carry over between calls.
///
/// # Errors
///
/// [`ExpandError::TooManyParameters`] and
/// [`ExpandError::MissingParameters`] are checked before anything is
/// interpreted; [`ExpandError::Template`] and [`ExpandError::Aborted`]
/// report interpreter failures.
pub fn expand_in(
    context: &mut ExpandContext,
    template: &[u8],
    params: &[Parameter],
) -> Result<Vec<u8>, ExpandError> {
    if params.len() > MAX_PARAMS {
        return Err(ExpandError::TooManyParameters(params.len()));
    }
    let required = required_params(template);
    if params.len() < required {
        return Err(ExpandError::MissingParameters {
            required,
            supplied: params.len(),
        });
    }
    let mut expanded = panic::catch_unwind(AssertUnwindSafe(|| context.expand(template, params)))
        .map_err(|_| ExpandError::Aborted)?
        .map_err(ExpandError::Template)?;
    for segment in split_padding(template) {
        if let Segment::Delay(delay) = segment {
            expanded.extend_from_slice(delay.to_string().as_bytes());
        }
    }
    Ok(expanded)
}

/// Expand with a fresh context.
///
/// # Errors
///
/// See [`expand_in`].
pub fn expand(template: &[u8], params: &[Parameter]) -> Result<Vec<u8>, ExpandError> {
    expand_in(&mut ExpandContext::new(), template, params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_highest_parameter() {
        assert_eq!(required_params(b"\x1b[%i%p1%d;%p2%dH"), 2);
        assert_eq!(required_params(b"%p9%t;7%;"), 9);
        assert_eq!(required_params(b"\x1b[H"), 0);
        // Literal percent and character constants are not pushes.
        assert_eq!(required_params(b"%%p3"), 0);
        assert_eq!(required_params(b"%'p'%p1%c"), 1);
    }

    #[test]
    fn parameter_count_is_checked_first() {
        assert_eq!(
            expand(b"\x1b[%p1%dS", &[]),
            Err(ExpandError::MissingParameters {
                required: 1,
                supplied: 0
            })
        );
        let ten = vec![Parameter::from(0); MAX_PARAMS + 1];
        assert_eq!(expand(b"x", &ten), Err(ExpandError::TooManyParameters(10)));
    }

    #[test]
    fn interpreter_errors_are_wrapped() {
        assert!(matches!(expand(b"%p1%Q", &[1.into()]), Err(ExpandError::Template(_))));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(expand(b"%p1%{0}%/%d", &[5.into()]), Err(ExpandError::Aborted));
        assert_eq!(expand(b"%p1%p2%m%d", &[5.into(), 0.into()]), Err(ExpandError::Aborted));
        assert_eq!(expand(b"%p1%p2%/%d", &[9.into(), 2.into()]).unwrap(), b"4");
    }

    #[test]
    fn padding_survives_expansion() {
        let out = expand(b"\x1b[%p1%dL$<2*/>", &[3.into()]).unwrap();
        assert_eq!(out, b"\x1b[3L$<2*/>");
        let out = expand(b"\x1b[%i%p1%d;%p2%dH$<5>", &[0.into(), 0.into()]).unwrap();
        assert_eq!(out, b"\x1b[1;1H$<5>");
    }

    #[test]
    fn string_parameters() {
        let out = expand(b"\x1b]52;%p1%s;%p2%s\x07", &["c".into(), b"aGk=".into()]).unwrap();
        assert_eq!(out, b"\x1b]52;c;aGk=\x07");
    }
}
