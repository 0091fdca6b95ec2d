#![forbid(unsafe_code)]

//! Controlling-terminal implementations of [`TerminalModes`] and
//! [`InputDevice`], on `/dev/tty` through `nix` termios and `poll(2)`.
//!
//! Every handle is an owned [`File`], so no raw descriptors are borrowed.
//! Attribute changes apply immediately (`TCSANOW`) and never discard
//! pending input.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::AsFd;
use std::sync::Mutex;
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout};
use nix::sys::termios::{self, LocalFlags, SetArg, SpecialCharacterIndices, Termios};

use crate::keypress::InputDevice;
use crate::modes::{ModeError, Restorer, TerminalModes};

const TTY_PATH: &str = "/dev/tty";

fn echo_flags() -> LocalFlags {
    LocalFlags::ECHO | LocalFlags::ECHONL | LocalFlags::ICANON
}

fn get_attrs(tty: &File) -> io::Result<Termios> {
    termios::tcgetattr(tty.as_fd()).map_err(io::Error::from)
}

fn set_attrs(tty: &File, attrs: &Termios) -> io::Result<()> {
    termios::tcsetattr(tty.as_fd(), SetArg::TCSANOW, attrs).map_err(io::Error::from)
}

fn open_tty() -> io::Result<File> {
    OpenOptions::new().read(true).write(true).open(TTY_PATH)
}

// ── Modes ────────────────────────────────────────────────────────────────

/// Mode switching on the controlling terminal.
#[derive(Debug)]
pub struct TtyModes {
    tty: File,
    incoming: Option<Termios>,
}

impl TtyModes {
    /// Open `/dev/tty` for reading and writing.
    ///
    /// # Errors
    ///
    /// Fails when the process has no controlling terminal.
    pub fn open() -> io::Result<Self> {
        Ok(Self::from_file(open_tty()?))
    }

    /// Use an already-open terminal handle.
    #[must_use]
    pub fn from_file(tty: File) -> Self {
        Self { tty, incoming: None }
    }

    /// True while an incoming snapshot is held.
    #[must_use]
    pub fn has_snapshot(&self) -> bool {
        self.incoming.is_some()
    }

    /// An input device on the same terminal.
    ///
    /// # Errors
    ///
    /// Fails when the handle cannot be duplicated.
    pub fn input(&self) -> io::Result<TtyInput> {
        Ok(TtyInput::from_file(self.tty.try_clone()?))
    }

    fn update(&self, change: impl FnOnce(&mut Termios)) -> io::Result<()> {
        let mut attrs = get_attrs(&self.tty)?;
        change(&mut attrs);
        set_attrs(&self.tty, &attrs)
    }
}

impl TerminalModes for TtyModes {
    fn save_incoming(&mut self) -> Result<(), ModeError> {
        if self.incoming.is_some() {
            return Err(ModeError::SnapshotLive);
        }
        self.incoming = Some(get_attrs(&self.tty)?);
        crate::debug!("incoming terminal mode saved");
        Ok(())
    }

    fn restore_incoming(&mut self) -> Result<(), ModeError> {
        let attrs = self.incoming.as_ref().ok_or(ModeError::NoSnapshot)?;
        set_attrs(&self.tty, attrs)?;
        self.incoming = None;
        crate::debug!("incoming terminal mode restored");
        Ok(())
    }

    fn disable_echo(&mut self) -> io::Result<()> {
        self.update(|attrs| attrs.local_flags.remove(echo_flags()))
    }

    fn restore_echo(&mut self) -> io::Result<()> {
        self.update(|attrs| attrs.local_flags.insert(echo_flags()))
    }

    fn set_raw_mode(&mut self) -> io::Result<()> {
        self.update(termios::cfmakeraw)
    }

    fn emergency_restorer(&self, exit_bytes: Vec<u8>) -> Option<Restorer> {
        let saved = Mutex::new(self.incoming.clone()?);
        let tty = self.tty.try_clone().ok()?;
        Some(Box::new(move || {
            let mut out = &tty;
            let _ = out.write_all(&exit_bytes);
            let _ = out.flush();
            if let Ok(attrs) = saved.lock() {
                let _ = set_attrs(&tty, &attrs);
            }
        }))
    }
}

// ── Input ────────────────────────────────────────────────────────────────

/// Bounded reads from the controlling terminal.
///
/// The wait is enforced with `poll(2)` before reading, so it also holds for
/// descriptors that ignore `VMIN`/`VTIME` (pipes, sockets).
#[derive(Debug)]
pub struct TtyInput {
    tty: File,
    saved: Option<Termios>,
    timeout: Option<Duration>,
}

impl TtyInput {
    /// Open `/dev/tty` for reading.
    ///
    /// # Errors
    ///
    /// Fails when the process has no controlling terminal.
    pub fn open() -> io::Result<Self> {
        Ok(Self::from_file(open_tty()?))
    }

    /// Read from an already-open handle.
    #[must_use]
    pub fn from_file(tty: File) -> Self {
        Self {
            tty,
            saved: None,
            timeout: None,
        }
    }

    fn wait_readable(&self) -> io::Result<bool> {
        let timeout = match self.timeout {
            Some(wait) => PollTimeout::from(u16::try_from(wait.as_millis()).unwrap_or(u16::MAX)),
            None => PollTimeout::NONE,
        };
        let mut fds = [PollFd::new(self.tty.as_fd(), PollFlags::POLLIN)];
        match nix::poll::poll(&mut fds, timeout) {
            Ok(n) => Ok(n > 0),
            Err(Errno::EINTR) => Ok(false),
            Err(err) => Err(io::Error::from(err)),
        }
    }
}

impl InputDevice for TtyInput {
    fn set_read_params(&mut self, min_bytes: u8, timeout_deciseconds: u8) -> io::Result<()> {
        // VTIME 0 with VMIN > 0 blocks until input arrives.
        self.timeout = (timeout_deciseconds > 0 || min_bytes == 0)
            .then(|| Duration::from_millis(u64::from(timeout_deciseconds) * 100));

        let current = get_attrs(&self.tty)?;
        let mut attrs = current.clone();
        attrs.control_chars[SpecialCharacterIndices::VMIN as usize] = min_bytes;
        attrs.control_chars[SpecialCharacterIndices::VTIME as usize] = timeout_deciseconds;
        set_attrs(&self.tty, &attrs)?;
        self.saved = Some(current);
        Ok(())
    }

    fn restore_read_params(&mut self) -> io::Result<()> {
        self.timeout = None;
        match self.saved.take() {
            Some(attrs) => set_attrs(&self.tty, &attrs),
            None => Ok(()),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.wait_readable()? {
            return Ok(0);
        }
        match self.tty.read(buf) {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => Ok(0),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixStream;
    use std::time::Instant;

    fn pipe_pair() -> (File, UnixStream) {
        let (a, b) = UnixStream::pair().unwrap();
        let reader: File = std::os::fd::OwnedFd::from(a).into();
        (reader, b)
    }

    #[test]
    fn reads_a_burst() {
        let (reader, mut writer) = pipe_pair();
        let mut input = TtyInput::from_file(reader);
        // Not a terminal: attributes fail, the poll bound still applies.
        assert!(input.set_read_params(1, 5).is_err());
        writer.write_all(b"\x1b[A").unwrap();
        let mut buf = [0u8; 80];
        assert_eq!(input.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"\x1b[A");
        input.restore_read_params().unwrap();
    }

    #[test]
    fn times_out_without_input() {
        let (reader, _writer) = pipe_pair();
        let mut input = TtyInput::from_file(reader);
        let _ = input.set_read_params(1, 1);
        let start = Instant::now();
        let mut buf = [0u8; 8];
        assert_eq!(input.read(&mut buf).unwrap(), 0);
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[test]
    fn modes_on_non_terminal_fail_cleanly() {
        let (file, _peer) = pipe_pair();
        let mut modes = TtyModes::from_file(file);
        assert!(matches!(modes.save_incoming(), Err(ModeError::Io(_))));
        assert!(!modes.has_snapshot());
        assert!(matches!(modes.restore_incoming(), Err(ModeError::NoSnapshot)));
        assert!(modes.emergency_restorer(b"\x1b[?1049l".to_vec()).is_none());
        assert!(modes.disable_echo().is_err());
    }
}
