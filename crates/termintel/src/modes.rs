#![forbid(unsafe_code)]

//! Terminal discipline primitives.
//!
//! [`TerminalModes`] is the seam between the lifecycle guard and the
//! controlling terminal: snapshot/restore of the incoming discipline, echo
//! control, raw mode, and a restorer closure that may run on the signal
//! thread. The Unix implementation is [`crate::tty::TtyModes`].

use std::fmt;
use std::io;

/// Restores the terminal from any thread: writes the precomputed exit
/// sequences and re-applies the incoming discipline. Must not allocate
/// registries or take locks held by the main thread.
pub type Restorer = Box<dyn Fn() + Send + Sync>;

/// Snapshot bookkeeping failures.
#[derive(Debug)]
pub enum ModeError {
    /// A snapshot is already held; saving again would lose the original.
    SnapshotLive,
    /// Nothing to restore.
    NoSnapshot,
    /// The device rejected the request.
    Io(io::Error),
}

impl fmt::Display for ModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SnapshotLive => write!(f, "terminal mode snapshot already taken"),
            Self::NoSnapshot => write!(f, "no terminal mode snapshot to restore"),
            Self::Io(err) => write!(f, "terminal mode I/O error: {err}"),
        }
    }
}

impl std::error::Error for ModeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ModeError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Mode switching on the controlling terminal.
pub trait TerminalModes {
    /// Capture the discipline in effect now. Exactly one snapshot may be
    /// live at a time.
    ///
    /// # Errors
    ///
    /// [`ModeError::SnapshotLive`] when a snapshot is held, or the device error.
    fn save_incoming(&mut self) -> Result<(), ModeError>;

    /// Re-apply and drop the snapshot.
    ///
    /// # Errors
    ///
    /// [`ModeError::NoSnapshot`] without a snapshot, or the device error.
    fn restore_incoming(&mut self) -> Result<(), ModeError>;

    /// Turn off echo and canonical line input.
    ///
    /// # Errors
    ///
    /// Device failure.
    fn disable_echo(&mut self) -> io::Result<()>;

    /// Turn echo and canonical input back on.
    ///
    /// # Errors
    ///
    /// Device failure.
    fn restore_echo(&mut self) -> io::Result<()>;

    /// Switch to raw (non-canonical, unprocessed) input and output.
    ///
    /// # Errors
    ///
    /// Device failure.
    fn set_raw_mode(&mut self) -> io::Result<()>;

    /// A restorer that writes `exit_bytes` and re-applies the current
    /// snapshot. `None` when no snapshot is held or the device cannot be
    /// shared with another thread.
    fn emergency_restorer(&self, exit_bytes: Vec<u8>) -> Option<Restorer>;
}

impl<M: TerminalModes + ?Sized> TerminalModes for Box<M> {
    fn save_incoming(&mut self) -> Result<(), ModeError> {
        (**self).save_incoming()
    }

    fn restore_incoming(&mut self) -> Result<(), ModeError> {
        (**self).restore_incoming()
    }

    fn disable_echo(&mut self) -> io::Result<()> {
        (**self).disable_echo()
    }

    fn restore_echo(&mut self) -> io::Result<()> {
        (**self).restore_echo()
    }

    fn set_raw_mode(&mut self) -> io::Result<()> {
        (**self).set_raw_mode()
    }

    fn emergency_restorer(&self, exit_bytes: Vec<u8>) -> Option<Restorer> {
        (**self).emergency_restorer(exit_bytes)
    }
}
