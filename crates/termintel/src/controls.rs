#![forbid(unsafe_code)]

//! Named operations over the standard capability sets.
//!
//! [`Controls`] plays entries of a registry declared from
//! [`capsets::CONTROL`](crate::capsets::CONTROL), [`Modes`] entries of one
//! declared from [`capsets::MODES`](crate::capsets::MODES). Every operation
//! returns the [`Playback`] outcome; an unsupported capability writes
//! nothing.

use crate::capability::{CapCode, CapabilityRegistry};
use crate::executor::{Playback, SequenceExecutor, SkipReason};
use crate::keypress::{InputDevice, KeypressConfig};
use crate::output::OutputSink;
use crate::terminfo::expand::Parameter;

/// Combined outcome of several playbacks: the first skip, or the total.
fn chain(outcomes: impl IntoIterator<Item = Playback>) -> Playback {
    let mut total = 0;
    for outcome in outcomes {
        match outcome {
            Playback::Written(n) => total += n,
            skipped @ Playback::Skipped(_) => return skipped,
        }
    }
    Playback::Written(total)
}

// ── Controls ─────────────────────────────────────────────────────────────

/// Screen and cursor operations.
pub struct Controls<'a, S: OutputSink> {
    exec: &'a mut SequenceExecutor<S>,
    registry: &'a CapabilityRegistry,
}

impl<'a, S: OutputSink> Controls<'a, S> {
    /// Operations over `registry` played through `exec`.
    pub fn new(exec: &'a mut SequenceExecutor<S>, registry: &'a CapabilityRegistry) -> Self {
        Self { exec, registry }
    }

    fn play(&mut self, code: &str) -> Playback {
        self.exec.execute_code(self.registry, CapCode::of(code))
    }

    fn play_with(&mut self, code: &str, params: &[Parameter]) -> Playback {
        self.exec.execute_code_params(self.registry, CapCode::of(code), params)
    }

    /// Parameterized playback whose padding scales with `lines`.
    fn play_lines(&mut self, code: &str, lines: i32) -> Playback {
        let Some(idx) = self.registry.find_by_code(CapCode::of(code)) else {
            return Playback::Skipped(SkipReason::BadHandle);
        };
        let affected = u32::try_from(lines).unwrap_or(0).max(1);
        self.exec
            .execute_params_with_lines(self.registry, idx, &[lines.into()], affected)
    }

    /// Clear the screen and home the cursor (`cl`).
    pub fn clear_screen(&mut self) -> Playback {
        self.play("cl")
    }

    /// Clear to the end of the line (`ce`).
    pub fn clear_to_eol(&mut self) -> Playback {
        self.play("ce")
    }

    /// Clear to the end of the screen (`cd`).
    pub fn clear_to_eos(&mut self) -> Playback {
        self.play("cd")
    }

    /// Move the cursor to the top-left corner (`ho`).
    pub fn move_home(&mut self) -> Playback {
        self.play("ho")
    }

    /// Save the cursor position (`sc`).
    pub fn save_cursor(&mut self) -> Playback {
        self.play("sc")
    }

    /// Return to the saved cursor position (`rc`).
    pub fn restore_cursor(&mut self) -> Playback {
        self.play("rc")
    }

    /// Insert a blank line at the cursor (`al`).
    pub fn insert_line(&mut self) -> Playback {
        self.play("al")
    }

    /// Push the screen down one line by inserting at the top, keeping the
    /// cursor where it was.
    pub fn scroll_down(&mut self) -> Playback {
        let save = self.save_cursor();
        let home = self.move_home();
        let insert = self.insert_line();
        let restore = self.restore_cursor();
        chain([save, home, insert, restore])
    }

    /// Reverse-scroll one line.
    pub fn scroll_up(&mut self) -> Playback {
        self.play("sr")
    }

    /// Scroll forward `lines` lines.
    pub fn scroll_forward(&mut self, lines: i32) -> Playback {
        self.play_lines("SF", lines)
    }

    /// Scroll backward `lines` lines.
    pub fn scroll_backward(&mut self, lines: i32) -> Playback {
        self.play_lines("SR", lines)
    }

    /// Restrict scrolling to rows `top..=bottom` (zero-based).
    pub fn set_scroll_region(&mut self, top: i32, bottom: i32) -> Playback {
        self.play_with("cs", &[top.into(), bottom.into()])
    }

    /// Move to zero-based `row`, `column`.
    pub fn move_cursor(&mut self, row: i32, column: i32) -> Playback {
        self.play_with("cm", &[row.into(), column.into()])
    }

    /// Move down `lines` rows (`DO`).
    pub fn cursor_down(&mut self, lines: i32) -> Playback {
        self.play_with("DO", &[lines.into()])
    }

    /// Move up `lines` rows (`UP`).
    pub fn cursor_up(&mut self, lines: i32) -> Playback {
        self.play_with("UP", &[lines.into()])
    }

    /// Move left `columns` columns (`LE`).
    pub fn cursor_left(&mut self, columns: i32) -> Playback {
        self.play_with("LE", &[columns.into()])
    }

    /// Move right `columns` columns (`RI`).
    pub fn cursor_right(&mut self, columns: i32) -> Playback {
        self.play_with("RI", &[columns.into()])
    }

    /// Set the left margin at zero-based `column` (`Zm`).
    pub fn set_left_margin(&mut self, column: i32) -> Playback {
        self.play_with("Zm", &[column.into()])
    }

    /// Set the right margin at zero-based `column` (`Zn`).
    pub fn set_right_margin(&mut self, column: i32) -> Playback {
        self.play_with("Zn", &[column.into()])
    }

    /// Clear both margins (`MC`).
    pub fn clear_margins(&mut self) -> Playback {
        self.play("MC")
    }

    /// Ask the terminal where the cursor is, via the `u7` request.
    ///
    /// The terminal must already have echo and canonical input off (the
    /// lifecycle default), or the report is echoed and line-buffered.
    /// Returns the reported one-based `(row, column)`, or `None` when `u7`
    /// is unsupported or no well-formed report arrives within the
    /// classifier's default wait.
    pub fn query_cursor_position<D: InputDevice + ?Sized>(
        &mut self,
        input: &mut D,
    ) -> Option<(u16, u16)> {
        if !self.play("u7").is_written() {
            return None;
        }
        self.exec.flush();

        let config = KeypressConfig::default();
        let mut report = Vec::with_capacity(32);
        let mut buf = [0u8; 32];
        let _ = input.set_read_params(config.min_bytes, config.timeout_deciseconds);
        while report.len() < 32 && !report.contains(&b'R') {
            match input.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => report.extend_from_slice(&buf[..n]),
            }
        }
        let _ = input.restore_read_params();

        let position = parse_cursor_report(&report);
        crate::debug!(?position, "cursor position report");
        position
    }
}

/// Parse `ESC [ row ; col R`, ignoring bytes before the escape.
#[must_use]
pub fn parse_cursor_report(bytes: &[u8]) -> Option<(u16, u16)> {
    let start = bytes.iter().position(|&b| b == 0x1b)?;
    let body = bytes[start..].strip_prefix(b"\x1b[")?;
    let end = body.iter().position(|&b| b == b'R')?;
    let text = std::str::from_utf8(&body[..end]).ok()?;
    let (row, col) = text.split_once(';')?;
    Some((row.parse().ok()?, col.parse().ok()?))
}

// ── Modes ────────────────────────────────────────────────────────────────

/// Screen-mode and attribute toggles.
pub struct Modes<'a, S: OutputSink> {
    exec: &'a mut SequenceExecutor<S>,
    registry: &'a CapabilityRegistry,
}

impl<'a, S: OutputSink> Modes<'a, S> {
    /// Toggles over `registry` played through `exec`.
    pub fn new(exec: &'a mut SequenceExecutor<S>, registry: &'a CapabilityRegistry) -> Self {
        Self { exec, registry }
    }

    fn play(&mut self, code: &str) -> Playback {
        self.exec.execute_code(self.registry, CapCode::of(code))
    }

    /// Switch to the alternate screen (`ti`).
    pub fn enter_ca_mode(&mut self) -> Playback {
        self.play("ti")
    }

    /// Leave the alternate screen (`te`).
    pub fn exit_ca_mode(&mut self) -> Playback {
        self.play("te")
    }

    /// Make the keypad send application sequences (`ks`).
    pub fn keypad_xmit(&mut self) -> Playback {
        self.play("ks")
    }

    /// Return the keypad to local mode (`ke`).
    pub fn keypad_local(&mut self) -> Playback {
        self.play("ke")
    }

    /// Start bold (`md`).
    pub fn bold(&mut self) -> Playback {
        self.play("md")
    }

    /// Start underline (`us`).
    pub fn underline(&mut self) -> Playback {
        self.play("us")
    }

    /// End underline (`ue`).
    pub fn exit_underline(&mut self) -> Playback {
        self.play("ue")
    }

    /// Start standout (`so`).
    pub fn standout(&mut self) -> Playback {
        self.play("so")
    }

    /// End standout (`se`).
    pub fn exit_standout(&mut self) -> Playback {
        self.play("se")
    }

    /// Start reverse video (`mr`).
    pub fn reverse(&mut self) -> Playback {
        self.play("mr")
    }

    /// Start blinking (`mb`).
    pub fn blink(&mut self) -> Playback {
        self.play("mb")
    }

    /// Turn off every attribute (bold, reverse, blink, …).
    pub fn exit_attributes(&mut self) -> Playback {
        self.play("me")
    }

    /// Hide the cursor (`vi`).
    pub fn cursor_invisible(&mut self) -> Playback {
        self.play("vi")
    }

    /// Show the cursor normally (`ve`).
    pub fn cursor_normal(&mut self) -> Playback {
        self.play("ve")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capsets::{CONTROL, MODES};
    use crate::executor::SkipReason;
    use crate::source::FixedSource;
    use std::io;

    fn xterm() -> FixedSource {
        FixedSource::new()
            .with(CapCode::of("cl"), b"\x1b[H\x1b[2J")
            .with(CapCode::of("ho"), b"\x1b[H")
            .with(CapCode::of("sc"), b"\x1b7")
            .with(CapCode::of("rc"), b"\x1b8")
            .with(CapCode::of("al"), b"\x1b[L")
            .with(CapCode::of("cm"), b"\x1b[%i%p1%d;%p2%dH")
            .with(CapCode::of("cs"), b"\x1b[%i%p1%d;%p2%dr")
            .with(CapCode::of("SF"), b"\x1b[%p1%dS")
            .with(CapCode::of("u7"), b"\x1b[6n")
            .with(CapCode::of("md"), b"\x1b[1m")
            .with(CapCode::of("me"), b"\x1b(B\x1b[m")
    }

    fn resolved(set: crate::capsets::CapabilitySet) -> CapabilityRegistry {
        let mut reg = set.declare();
        reg.resolve(&xterm()).unwrap();
        reg
    }

    #[test]
    fn parameterized_controls() {
        let reg = resolved(CONTROL);
        let mut exec = SequenceExecutor::new(Vec::new());
        let mut c = Controls::new(&mut exec, &reg);
        assert!(c.move_cursor(0, 0).is_written());
        assert!(c.set_scroll_region(1, 22).is_written());
        assert!(c.scroll_forward(3).is_written());
        assert_eq!(exec.sink().as_slice(), b"\x1b[1;1H\x1b[2;23r\x1b[3S");
    }

    #[test]
    fn scroll_down_composes() {
        let reg = resolved(CONTROL);
        let mut exec = SequenceExecutor::new(Vec::new());
        assert_eq!(Controls::new(&mut exec, &reg).scroll_down(), Playback::Written(10));
        assert_eq!(exec.sink().as_slice(), b"\x1b7\x1b[H\x1b[L\x1b8");
    }

    #[test]
    fn unsupported_control_writes_nothing() {
        let reg = resolved(CONTROL);
        let mut exec = SequenceExecutor::new(Vec::new());
        let mut c = Controls::new(&mut exec, &reg);
        assert_eq!(c.clear_margins(), Playback::Skipped(SkipReason::Unsupported));
        assert_eq!(c.cursor_left(2), Playback::Skipped(SkipReason::Unsupported));
        assert!(exec.sink().is_empty());
    }

    #[test]
    fn attribute_modes() {
        let reg = resolved(MODES);
        let mut exec = SequenceExecutor::new(Vec::new());
        let mut m = Modes::new(&mut exec, &reg);
        m.bold();
        m.exit_attributes();
        assert_eq!(m.enter_ca_mode(), Playback::Skipped(SkipReason::Unsupported));
        assert_eq!(exec.sink().as_slice(), b"\x1b[1m\x1b(B\x1b[m");
    }

    #[test]
    fn cursor_reports() {
        assert_eq!(parse_cursor_report(b"\x1b[12;40R"), Some((12, 40)));
        assert_eq!(parse_cursor_report(b"junk\x1b[1;1R"), Some((1, 1)));
        assert_eq!(parse_cursor_report(b"\x1b[12;40"), None);
        assert_eq!(parse_cursor_report(b"\x1b[x;1R"), None);
    }

    struct Replies(Vec<Vec<u8>>);

    impl InputDevice for Replies {
        fn set_read_params(&mut self, _min: u8, _timeout: u8) -> io::Result<()> {
            Ok(())
        }

        fn restore_read_params(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() {
                return Ok(0);
            }
            let chunk = self.0.remove(0);
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    #[test]
    fn query_reassembles_split_report() {
        let reg = resolved(CONTROL);
        let mut exec = SequenceExecutor::new(Vec::new());
        let mut input = Replies(vec![b"\x1b[5".to_vec(), b";7R".to_vec()]);
        let pos = Controls::new(&mut exec, &reg).query_cursor_position(&mut input);
        assert_eq!(pos, Some((5, 7)));
        assert_eq!(exec.sink().as_slice(), b"\x1b[6n");
    }
}
