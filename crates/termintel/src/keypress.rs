#![forbid(unsafe_code)]

//! Keypress classification.
//!
//! One call performs one bounded read of up to [`RAW_READ_CAPACITY`] bytes
//! and classifies the burst, in this order:
//!
//! 1. nothing read (deadline passed, or the read failed): [`Keypress::Timeout`];
//! 2. first byte is ESC: the whole burst is looked up as an exact sequence in
//!    the recognized-keys registry, giving [`Keypress::Key`] or
//!    [`Keypress::Unrecognized`];
//! 3. otherwise: [`Keypress::Character`] for the first byte. Any further
//!    bytes from the same read are dropped.
//!
//! Matching is exact, not by prefix. A key whose sequence arrives split
//! across two reads is reported as unrecognized followed by characters.

use std::fmt;
use std::io;
use std::time::Duration;

use crate::capability::{CapIndex, CapabilityRegistry};
use crate::display::escape_bytes;

/// Capacity of the per-call read buffer.
pub const RAW_READ_CAPACITY: usize = 80;

/// The escape byte that starts every multi-byte key sequence.
pub const ESC: u8 = 0x1b;

/// Byte source with a configurable bounded read.
pub trait InputDevice {
    /// Make the next read return once `min_bytes` are available or
    /// `timeout_deciseconds` tenths of a second have passed.
    ///
    /// # Errors
    ///
    /// Device failure; callers treat this as best-effort.
    fn set_read_params(&mut self, min_bytes: u8, timeout_deciseconds: u8) -> io::Result<()>;

    /// Put back the read parameters in effect before `set_read_params`.
    ///
    /// # Errors
    ///
    /// Device failure.
    fn restore_read_params(&mut self) -> io::Result<()>;

    /// One bounded read. `Ok(0)` means the deadline passed.
    ///
    /// # Errors
    ///
    /// Device failure.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<D: InputDevice + ?Sized> InputDevice for &mut D {
    fn set_read_params(&mut self, min_bytes: u8, timeout_deciseconds: u8) -> io::Result<()> {
        (**self).set_read_params(min_bytes, timeout_deciseconds)
    }

    fn restore_read_params(&mut self) -> io::Result<()> {
        (**self).restore_read_params()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }
}

/// Read parameters for each classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeypressConfig {
    /// Bytes that satisfy the read (`VMIN`).
    pub min_bytes: u8,
    /// Wait bound in tenths of a second (`VTIME`).
    pub timeout_deciseconds: u8,
}

impl Default for KeypressConfig {
    fn default() -> Self {
        Self {
            min_bytes: 1,
            timeout_deciseconds: 10,
        }
    }
}

impl KeypressConfig {
    /// Set the byte count that satisfies a read.
    #[must_use]
    pub const fn with_min_bytes(mut self, min_bytes: u8) -> Self {
        self.min_bytes = min_bytes;
        self
    }

    /// Set the wait bound in tenths of a second.
    #[must_use]
    pub const fn with_timeout_deciseconds(mut self, timeout_deciseconds: u8) -> Self {
        self.timeout_deciseconds = timeout_deciseconds;
        self
    }

    /// Wait bound as a duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout_deciseconds) * 100)
    }
}

/// Bytes of one read, kept for diagnostics.
#[derive(Clone, PartialEq, Eq)]
pub struct RawInput {
    buf: [u8; RAW_READ_CAPACITY],
    len: usize,
}

impl RawInput {
    fn from_slice(bytes: &[u8]) -> Self {
        let len = bytes.len().min(RAW_READ_CAPACITY);
        let mut buf = [0; RAW_READ_CAPACITY];
        buf[..len].copy_from_slice(&bytes[..len]);
        Self { buf, len }
    }

    /// The bytes read.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Caret-notation rendering, e.g. `^[[15;5~`.
    #[must_use]
    pub fn escaped(&self) -> String {
        escape_bytes(self.as_bytes())
    }
}

impl fmt::Debug for RawInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawInput({:?})", self.escaped())
    }
}

/// Classification of one read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keypress {
    /// Nothing arrived before the deadline.
    Timeout,
    /// A plain byte.
    Character(u8),
    /// A recognized key, as a handle into the keys registry.
    Key(CapIndex),
    /// Escape-led bytes that match no recognized key.
    Unrecognized(RawInput),
}

impl Keypress {
    /// Numeric status: `0` timeout, `1` key, `2` character,
    /// `-1` unrecognized.
    #[must_use]
    pub const fn status(&self) -> i32 {
        match self {
            Self::Timeout => 0,
            Self::Key(_) => 1,
            Self::Character(_) => 2,
            Self::Unrecognized(_) => -1,
        }
    }

    /// Key handle, when a key was recognized.
    #[must_use]
    pub const fn key(&self) -> Option<CapIndex> {
        match self {
            Self::Key(idx) => Some(*idx),
            _ => None,
        }
    }

    /// Character, when a plain byte was read.
    #[must_use]
    pub const fn character(&self) -> Option<u8> {
        match self {
            Self::Character(byte) => Some(*byte),
            _ => None,
        }
    }
}

/// Reads and classifies keypresses against a keys registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeypressClassifier {
    config: KeypressConfig,
}

impl KeypressClassifier {
    /// Classifier with explicit read parameters.
    #[must_use]
    pub const fn new(config: KeypressConfig) -> Self {
        Self { config }
    }

    /// Read parameters in use.
    #[must_use]
    pub const fn config(&self) -> KeypressConfig {
        self.config
    }

    /// Perform one bounded read on `device` and classify it.
    ///
    /// The device's previous read parameters are restored before this
    /// returns, whether or not the read succeeded.
    pub fn classify<D: InputDevice + ?Sized>(
        &self,
        device: &mut D,
        keys: &CapabilityRegistry,
    ) -> Keypress {
        let mut buf = [0u8; RAW_READ_CAPACITY];
        if let Err(err) = device.set_read_params(self.config.min_bytes, self.config.timeout_deciseconds)
        {
            crate::debug!(error = %err, "read parameters not applied");
        }
        let read = device.read(&mut buf);
        if let Err(err) = device.restore_read_params() {
            crate::warn!(error = %err, "read parameters not restored");
        }

        let len = match read {
            Ok(n) => n.min(RAW_READ_CAPACITY),
            Err(err) => {
                crate::debug!(error = %err, "keypress read failed");
                0
            }
        };
        classify_bytes(&buf[..len], keys)
    }
}

/// Classify an already-read burst.
#[must_use]
pub fn classify_bytes(bytes: &[u8], keys: &CapabilityRegistry) -> Keypress {
    match bytes.first() {
        None => Keypress::Timeout,
        Some(&ESC) => match keys.find_by_sequence(bytes) {
            Some(idx) => Keypress::Key(idx),
            None => {
                crate::trace!(len = bytes.len(), "unrecognized escape sequence");
                Keypress::Unrecognized(RawInput::from_slice(bytes))
            }
        },
        Some(&byte) => Keypress::Character(byte),
    }
}
