#![forbid(unsafe_code)]

//! One-time setup and teardown of a capability-driven terminal session.
//!
//! # Lifecycle Guarantees
//!
//! 1. **Setup is all-or-nothing** - if saving the incoming mode, resolving a
//!    registry, or installing signal handling fails, everything done so far
//!    is undone and the terminal is left as it was.
//!
//! 2. **Teardown runs once** - [`LifecycleGuard::shutdown`], an explicit
//!    [`LifecycleGuard::teardown`] and [`Drop`] share one idempotent path.
//!
//! 3. **Exit sequences are written once** - whichever of teardown and the
//!    interruption restorer runs first writes `ke`/`te`; the other skips them.
//!
//! # Interruption
//!
//! A dedicated `signal-hook` thread receives the registered signals. It
//! records the signal and runs the restorer built at setup: precomputed
//! copies of the exit sequences are written to the terminal and the
//! incoming discipline is re-applied. It never touches the registries.
//! The main loop notices through [`LifecycleGuard::check_interrupt`] and
//! calls [`LifecycleGuard::teardown`] with the cause, which releases every
//! registry and exits with `128 + signal`. A program that does not
//! acknowledge within [`LifecycleOptions::exit_grace`] is terminated by the
//! signal thread. The grace is counted from the end of any bounded read in
//! flight through [`LifecycleGuard::next_keypress`], so a loop blocked in
//! the classifier always gets to run its teardown and release the
//! registries.
//!
//! # Usage
//!
//! ```no_run
//! # #[cfg(unix)] {
//! use termintel::capsets;
//! use termintel::keypress::{Keypress, KeypressClassifier};
//! use termintel::lifecycle::{LifecycleGuard, LifecycleOptions};
//!
//! let mut guard =
//!     LifecycleGuard::initialize_from_env(capsets::declare_all(), LifecycleOptions::from_env())?;
//! let mut input = termintel::tty::TtyInput::open()?;
//! let classifier = KeypressClassifier::default();
//! loop {
//!     if let Some(cause) = guard.check_interrupt() {
//!         guard.teardown(Some(cause));
//!     }
//!     if let Keypress::Character(b'q') = guard.next_keypress(&classifier, &mut input) {
//!         break;
//!     }
//! }
//! // Dropping the guard restores the terminal.
//! # }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bitflags::bitflags;

use crate::capability::{CapCode, CapabilityRegistry, ResolveError};
use crate::controls::{Controls, Modes};
use crate::executor::{Playback, SequenceExecutor, SkipReason};
use crate::keypress::{InputDevice, Keypress, KeypressClassifier};
use crate::modes::{ModeError, Restorer, TerminalModes};
use crate::output::{strip_padding, OutputSink};
use crate::source::{SequenceSource, DEFAULT_ENV_PREFIX};
use crate::terminfo::TerminfoError;

#[cfg(unix)]
use signal_hook::consts::signal::{SIGABRT, SIGINT, SIGQUIT, SIGTERM, SIGTSTP};

const ENTER_CA: CapCode = CapCode::of("ti");
const EXIT_CA: CapCode = CapCode::of("te");
const KEYPAD_XMIT: CapCode = CapCode::of("ks");
const KEYPAD_LOCAL: CapCode = CapCode::of("ke");

/// Default acknowledgement grace; longer than the classifier's default wait.
pub const DEFAULT_EXIT_GRACE: Duration = Duration::from_millis(1500);

bitflags! {
    /// Terminal changes made during setup and undone at teardown.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AppliedModes: u8 {
        const CA_MODE = 1 << 0;
        const KEYPAD = 1 << 1;
        const ECHO_OFF = 1 << 2;
        const RAW = 1 << 3;
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleOptions {
    /// Play `ti` at setup and `te` at teardown.
    pub enter_ca_mode: bool,
    /// Play `ks` at setup and `ke` at teardown.
    pub keypad_transmit: bool,
    /// Turn off echo and canonical input.
    pub disable_echo: bool,
    /// Switch to raw mode.
    pub raw_mode: bool,
    /// Signals handled by the interruption thread. Empty disables it.
    pub signals: Vec<i32>,
    /// How long the signal thread waits for the program to acknowledge an
    /// interruption before exiting on its own, measured from the signal or
    /// from the deadline of a keypress read in progress, whichever is later.
    pub exit_grace: Duration,
    /// Registry holding `ti`, `te`, `ks`, `ke`.
    pub modes_registry: String,
    /// Registry searched by [`LifecycleGuard::next_keypress`].
    pub keys_registry: String,
    /// Environment override prefix for sources built from the environment.
    pub env_prefix: String,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            enter_ca_mode: true,
            keypad_transmit: true,
            disable_echo: true,
            raw_mode: false,
            signals: default_signals(),
            exit_grace: DEFAULT_EXIT_GRACE,
            modes_registry: "modes".to_owned(),
            keys_registry: "keys".to_owned(),
            env_prefix: DEFAULT_ENV_PREFIX.to_owned(),
        }
    }
}

#[cfg(unix)]
fn default_signals() -> Vec<i32> {
    vec![SIGINT, SIGQUIT, SIGABRT, SIGTERM]
}

#[cfg(not(unix))]
fn default_signals() -> Vec<i32> {
    Vec::new()
}

fn truthy(value: &str) -> bool {
    !matches!(value.trim().to_ascii_lowercase().as_str(), "" | "0" | "false" | "no" | "off")
}

impl LifecycleOptions {
    /// Defaults adjusted by `TERMINTEL_*` environment variables:
    ///
    /// | Variable | Effect |
    /// |---|---|
    /// | `TERMINTEL_NO_CA` | skip `ti`/`te` |
    /// | `TERMINTEL_NO_KEYPAD` | skip `ks`/`ke` |
    /// | `TERMINTEL_RAW` | enable raw mode |
    /// | `TERMINTEL_CATCH_TSTP` | also handle `SIGTSTP` |
    /// | `TERMINTEL_EXIT_GRACE_MS` | acknowledgement grace period |
    /// | `TERMINTEL_ENV_PREFIX` | override variable prefix |
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) with an explicit variable lookup.
    #[must_use]
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Self::default();
        let flag = |name: &str| get(name).is_some_and(|v| truthy(&v));
        if flag("TERMINTEL_NO_CA") {
            options.enter_ca_mode = false;
        }
        if flag("TERMINTEL_NO_KEYPAD") {
            options.keypad_transmit = false;
        }
        if flag("TERMINTEL_RAW") {
            options.raw_mode = true;
        }
        #[cfg(unix)]
        if flag("TERMINTEL_CATCH_TSTP") {
            options.signals.push(SIGTSTP);
        }
        if let Some(ms) = get("TERMINTEL_EXIT_GRACE_MS").and_then(|v| v.trim().parse().ok()) {
            options.exit_grace = Duration::from_millis(ms);
        }
        if let Some(prefix) = get("TERMINTEL_ENV_PREFIX").filter(|p| !p.is_empty()) {
            options.env_prefix = prefix;
        }
        options
    }

    /// Enable or disable the `ti`/`te` pair.
    #[must_use]
    pub fn with_ca_mode(mut self, enabled: bool) -> Self {
        self.enter_ca_mode = enabled;
        self
    }

    /// Enable or disable the `ks`/`ke` pair.
    #[must_use]
    pub fn with_keypad_transmit(mut self, enabled: bool) -> Self {
        self.keypad_transmit = enabled;
        self
    }

    /// Turn echo and canonical input off for the session.
    #[must_use]
    pub fn with_echo_disabled(mut self, disabled: bool) -> Self {
        self.disable_echo = disabled;
        self
    }

    /// Switch to raw mode for the session.
    #[must_use]
    pub fn with_raw_mode(mut self, enabled: bool) -> Self {
        self.raw_mode = enabled;
        self
    }

    /// Replace the handled signals; an empty list installs no handler.
    #[must_use]
    pub fn with_signals(mut self, signals: Vec<i32>) -> Self {
        self.signals = signals;
        self
    }

    /// Set the acknowledgement grace period.
    #[must_use]
    pub fn with_exit_grace(mut self, grace: Duration) -> Self {
        self.exit_grace = grace;
        self
    }

    /// Set the prefix of environment overrides.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Setup failures. The terminal is untouched when one is returned.
#[derive(Debug)]
pub enum SetupError {
    /// The incoming mode could not be captured.
    Mode(ModeError),
    /// A registry failed to resolve; every registry has been released.
    Resolve { registry: String, source: ResolveError },
    /// The signal thread could not be installed.
    Signals(io::Error),
    /// The terminal database entry could not be loaded.
    Terminfo(TerminfoError),
    /// The controlling terminal could not be opened.
    Io(io::Error),
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mode(err) => write!(f, "cannot save terminal mode: {err}"),
            Self::Resolve { registry, source } => {
                write!(f, "cannot resolve registry '{registry}': {source}")
            }
            Self::Signals(err) => write!(f, "cannot install signal handling: {err}"),
            Self::Terminfo(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "cannot open terminal: {err}"),
        }
    }
}

impl std::error::Error for SetupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Mode(err) => Some(err),
            Self::Resolve { source, .. } => Some(source),
            Self::Signals(err) | Self::Io(err) => Some(err),
            Self::Terminfo(err) => Some(err),
        }
    }
}

// ---------------------------------------------------------------------------
// Interruption
// ---------------------------------------------------------------------------

/// A received termination signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interruption {
    /// Signal number.
    pub signal: i32,
}

impl Interruption {
    /// Interruption by `signal`.
    #[must_use]
    pub const fn new(signal: i32) -> Self {
        Self { signal }
    }

    /// Conventional shell status for death by this signal.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        128 + self.signal
    }

    /// Short human description.
    #[must_use]
    pub fn describe(&self) -> &'static str {
        #[cfg(unix)]
        {
            match self.signal {
                SIGINT => "program interrupt",
                SIGQUIT => "program quit",
                SIGABRT => "program aborted",
                SIGTERM => "program terminated",
                SIGTSTP => "program stop",
                _ => "unrecognized signal",
            }
        }
        #[cfg(not(unix))]
        {
            "unrecognized signal"
        }
    }
}

impl fmt::Display for Interruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "signal {} ({})", self.signal, self.describe())
    }
}

/// State shared between the main thread and the signal thread.
#[derive(Default)]
struct InterruptState {
    requested: AtomicBool,
    signal: AtomicI32,
    acknowledged: AtomicBool,
    restored: AtomicBool,
    restorer: Mutex<Option<Restorer>>,
    read_deadline: Mutex<Option<Instant>>,
}

impl InterruptState {
    fn request(&self, signal: i32) {
        self.signal.store(signal, Ordering::SeqCst);
        self.requested.store(true, Ordering::SeqCst);
        if !self.restored.swap(true, Ordering::SeqCst) {
            if let Ok(restorer) = self.restorer.lock() {
                if let Some(restore) = restorer.as_ref() {
                    restore();
                }
            }
        }
    }

    fn pending(&self) -> Option<Interruption> {
        self.requested
            .load(Ordering::SeqCst)
            .then(|| Interruption::new(self.signal.load(Ordering::SeqCst)))
    }

    fn set_read_deadline(&self, deadline: Option<Instant>) {
        if let Ok(mut slot) = self.read_deadline.lock() {
            *slot = deadline;
        }
    }

    /// `deadline`, pushed back to `grace` past the end of a read in flight.
    #[cfg_attr(not(unix), allow(dead_code))]
    fn exit_deadline(&self, deadline: Instant, grace: Duration) -> Instant {
        match self.read_deadline.lock().ok().and_then(|slot| *slot) {
            Some(read_end) => deadline.max(read_end + grace),
            None => deadline,
        }
    }
}

/// Cloneable view of a guard's interruption state.
#[derive(Clone)]
pub struct InterruptHandle(Arc<InterruptState>);

impl fmt::Debug for InterruptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptHandle")
            .field("pending", &self.pending())
            .finish()
    }
}

impl InterruptHandle {
    /// The interruption waiting to be handled, if any.
    #[must_use]
    pub fn pending(&self) -> Option<Interruption> {
        self.0.pending()
    }

    /// Record `signal` exactly as the signal thread does, restorer included.
    pub fn raise(&self, signal: i32) {
        self.0.request(signal);
    }

    /// Tell the signal thread the program is handling the interruption.
    pub fn acknowledge(&self) {
        self.0.acknowledged.store(true, Ordering::SeqCst);
    }
}

#[cfg(unix)]
struct SignalGuard {
    handle: signal_hook::iterator::Handle,
    thread: Option<std::thread::JoinHandle<()>>,
}

#[cfg(unix)]
impl SignalGuard {
    fn new(signals: &[i32], state: Arc<InterruptState>, grace: Duration) -> io::Result<Self> {
        use signal_hook::iterator::Signals;

        let mut signals = Signals::new(signals).map_err(io::Error::other)?;
        let handle = signals.handle();
        let thread = std::thread::Builder::new()
            .name("termintel-signals".to_owned())
            .spawn(move || {
                for signal in signals.forever() {
                    crate::warn!(signal, "interruption signal received, restoring terminal");
                    state.request(signal);
                    let mut deadline = Instant::now() + grace;
                    while !state.acknowledged.load(Ordering::SeqCst) {
                        deadline = state.exit_deadline(deadline, grace);
                        if Instant::now() >= deadline {
                            crate::warn!(signal, "interruption not acknowledged, exiting");
                            std::process::exit(128 + signal);
                        }
                        std::thread::sleep(Duration::from_millis(10));
                    }
                }
            })?;
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

#[cfg(unix)]
impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

// ---------------------------------------------------------------------------
// Guard
// ---------------------------------------------------------------------------

/// Owns the registries, the mode primitives and the output for the life of
/// a session.
pub struct LifecycleGuard<M: TerminalModes, S: OutputSink> {
    registries: Vec<CapabilityRegistry>,
    modes: M,
    executor: SequenceExecutor<S>,
    options: LifecycleOptions,
    applied: AppliedModes,
    state: Arc<InterruptState>,
    #[cfg(unix)]
    signal_guard: Option<SignalGuard>,
    torn_down: bool,
}

impl<M: TerminalModes, S: OutputSink> fmt::Debug for LifecycleGuard<M, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleGuard")
            .field("registries", &self.registries.iter().map(|r| r.name()).collect::<Vec<_>>())
            .field("applied", &self.applied)
            .field("torn_down", &self.torn_down)
            .finish()
    }
}

impl<M: TerminalModes, S: OutputSink> LifecycleGuard<M, S> {
    /// Save the incoming mode, resolve every registry, install interruption
    /// handling, then apply the configured modes.
    ///
    /// # Errors
    ///
    /// [`SetupError`] from any of the first three steps, after undoing the
    /// earlier ones. Failures applying modes are logged, not returned.
    pub fn initialize(
        mut registries: Vec<CapabilityRegistry>,
        mut modes: M,
        source: &dyn SequenceSource,
        sink: S,
        options: LifecycleOptions,
    ) -> Result<Self, SetupError> {
        let span = crate::debug_span!("lifecycle_init", registries = registries.len());
        let _enter = span.enter();

        modes.save_incoming().map_err(SetupError::Mode)?;

        for position in 0..registries.len() {
            if let Err(err) = registries[position].resolve(source) {
                let name = registries[position].name().to_owned();
                crate::warn!(registry = %name, error = %err, "registry resolution failed");
                abandon(&mut registries, &mut modes);
                return Err(SetupError::Resolve {
                    registry: name,
                    source: err,
                });
            }
        }

        let state = Arc::new(InterruptState::default());
        let exit_bytes = exit_sequence(&registries, &options);
        if let Ok(mut slot) = state.restorer.lock() {
            *slot = modes.emergency_restorer(exit_bytes);
        }

        #[cfg(unix)]
        let signal_guard = if options.signals.is_empty() {
            None
        } else {
            match SignalGuard::new(&options.signals, Arc::clone(&state), options.exit_grace) {
                Ok(guard) => Some(guard),
                Err(err) => {
                    abandon(&mut registries, &mut modes);
                    return Err(SetupError::Signals(err));
                }
            }
        };

        let mut guard = Self {
            registries,
            modes,
            executor: SequenceExecutor::new(sink),
            options,
            applied: AppliedModes::empty(),
            state,
            #[cfg(unix)]
            signal_guard,
            torn_down: false,
        };
        guard.apply_modes();
        crate::info!(applied = ?guard.applied, "terminal session initialized");
        Ok(guard)
    }

    fn apply_modes(&mut self) {
        if self.options.enter_ca_mode && self.play_mode(ENTER_CA).is_written() {
            self.applied |= AppliedModes::CA_MODE;
        }
        if self.options.keypad_transmit && self.play_mode(KEYPAD_XMIT).is_written() {
            self.applied |= AppliedModes::KEYPAD;
        }
        self.executor.flush();
        if self.options.disable_echo {
            match self.modes.disable_echo() {
                Ok(()) => self.applied |= AppliedModes::ECHO_OFF,
                Err(err) => {
                    crate::warn!(error = %err, "cannot disable echo");
                }
            }
        }
        if self.options.raw_mode {
            match self.modes.set_raw_mode() {
                Ok(()) => self.applied |= AppliedModes::RAW,
                Err(err) => {
                    crate::warn!(error = %err, "cannot enter raw mode");
                }
            }
        }
    }

    fn play_mode(&mut self, code: CapCode) -> Playback {
        match self
            .registries
            .iter()
            .find(|r| r.name() == self.options.modes_registry)
        {
            Some(registry) => self.executor.execute_code(registry, code),
            None => Playback::Skipped(SkipReason::BadHandle),
        }
    }

    /// Undo the session: restore echo, play `ke` and `te`, release every
    /// registry, restore the incoming mode, stop the signal thread.
    ///
    /// With a cause, the process then exits with
    /// [`Interruption::exit_code`]. Otherwise returns whether this call did
    /// the work (`false` once already torn down).
    pub fn teardown(&mut self, cause: Option<Interruption>) -> bool {
        let did_work = self.teardown_once();
        if let Some(cause) = cause {
            crate::info!(%cause, "exiting after interruption");
            std::process::exit(cause.exit_code());
        }
        did_work
    }

    /// Ordinary teardown; see [`teardown`](Self::teardown).
    pub fn shutdown(&mut self) -> bool {
        self.teardown(None)
    }

    fn teardown_once(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        self.torn_down = true;
        self.state.acknowledged.store(true, Ordering::SeqCst);

        if !self.state.restored.swap(true, Ordering::SeqCst) {
            if self.applied.intersects(AppliedModes::ECHO_OFF | AppliedModes::RAW) {
                if let Err(err) = self.modes.restore_echo() {
                    crate::warn!(error = %err, "cannot restore echo");
                }
            }
            if self.applied.contains(AppliedModes::KEYPAD) {
                self.play_mode(KEYPAD_LOCAL);
            }
            if self.applied.contains(AppliedModes::CA_MODE) {
                self.play_mode(EXIT_CA);
            }
            self.executor.flush();
        }
        self.applied = AppliedModes::empty();

        for registry in &mut self.registries {
            registry.release();
        }
        if let Err(err) = self.modes.restore_incoming() {
            crate::warn!(error = %err, "cannot restore incoming terminal mode");
        }
        #[cfg(unix)]
        drop(self.signal_guard.take());

        crate::info!("terminal session restored");
        true
    }

    // ── Interruption ────────────────────────────────────────────────────

    /// True once a handled signal has arrived.
    #[must_use]
    pub fn interrupted(&self) -> bool {
        self.state.requested.load(Ordering::SeqCst)
    }

    /// The pending interruption, acknowledged so the signal thread leaves
    /// the exit to the caller.
    pub fn check_interrupt(&self) -> Option<Interruption> {
        let pending = self.state.pending()?;
        self.state.acknowledged.store(true, Ordering::SeqCst);
        Some(pending)
    }

    /// Handle for other threads (or tests) to observe or raise interruptions.
    #[must_use]
    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle(Arc::clone(&self.state))
    }

    // ── Access ──────────────────────────────────────────────────────────

    /// Registry called `name`.
    #[must_use]
    pub fn registry(&self, name: &str) -> Option<&CapabilityRegistry> {
        self.registries.iter().find(|r| r.name() == name)
    }

    /// Every registry, in declaration order.
    #[must_use]
    pub fn registries(&self) -> &[CapabilityRegistry] {
        &self.registries
    }

    /// Modes currently in effect.
    #[must_use]
    pub fn applied(&self) -> AppliedModes {
        self.applied
    }

    /// Options the session was set up with.
    #[must_use]
    pub fn options(&self) -> &LifecycleOptions {
        &self.options
    }

    /// Terminal mode primitives.
    #[must_use]
    pub fn modes(&self) -> &M {
        &self.modes
    }

    /// Executor writing the session's output.
    pub fn executor(&self) -> &SequenceExecutor<S> {
        &self.executor
    }

    /// Mutable access to the executor.
    pub fn executor_mut(&mut self) -> &mut SequenceExecutor<S> {
        &mut self.executor
    }

    /// Named screen and cursor operations over registry `name`.
    pub fn controls(&mut self, name: &str) -> Option<Controls<'_, S>> {
        let registry = self.registries.iter().find(|r| r.name() == name)?;
        Some(Controls::new(&mut self.executor, registry))
    }

    /// Attribute and mode toggles over the modes registry.
    pub fn mode_toggles(&mut self) -> Option<Modes<'_, S>> {
        let registry = self
            .registries
            .iter()
            .find(|r| r.name() == self.options.modes_registry)?;
        Some(Modes::new(&mut self.executor, registry))
    }

    /// Play `code` from registry `name`.
    pub fn play(&mut self, name: &str, code: CapCode) -> Playback {
        match self.registries.iter().find(|r| r.name() == name) {
            Some(registry) => self.executor.execute_code(registry, code),
            None => Playback::Skipped(SkipReason::BadHandle),
        }
    }

    /// Classify the next keypress against the keys registry.
    ///
    /// Output is flushed first so prompts appear before the wait. While the
    /// read is bounded by the classifier's timeout, the signal thread holds
    /// off its forced exit.
    pub fn next_keypress<D: InputDevice + ?Sized>(
        &mut self,
        classifier: &KeypressClassifier,
        input: &mut D,
    ) -> Keypress {
        self.executor.flush();
        self.state
            .set_read_deadline(Some(Instant::now() + classifier.config().timeout()));
        let keys = &self.options.keys_registry;
        let key = match self.registries.iter().find(|r| r.name() == *keys) {
            Some(registry) => classifier.classify(input, registry),
            None => {
                let empty = CapabilityRegistry::declare(keys.as_str(), &[]);
                classifier.classify(input, &empty)
            }
        };
        self.state.set_read_deadline(None);
        key
    }
}

impl<M: TerminalModes, S: OutputSink> Drop for LifecycleGuard<M, S> {
    fn drop(&mut self) {
        self.teardown_once();
    }
}

/// Release everything resolved so far and give back the snapshot.
fn abandon<M: TerminalModes>(registries: &mut [CapabilityRegistry], modes: &mut M) {
    for registry in registries.iter_mut() {
        registry.release();
    }
    if let Err(err) = modes.restore_incoming() {
        crate::warn!(error = %err, "cannot restore incoming terminal mode");
    }
}

/// Padding-free copies of the exit sequences the options will need.
fn exit_sequence(registries: &[CapabilityRegistry], options: &LifecycleOptions) -> Vec<u8> {
    let Some(modes) = registries.iter().find(|r| r.name() == options.modes_registry) else {
        return Vec::new();
    };
    let mut bytes = Vec::new();
    if options.keypad_transmit {
        if let Some(seq) = modes.sequence_for(KEYPAD_LOCAL) {
            bytes.extend(strip_padding(seq));
        }
    }
    if options.enter_ca_mode {
        if let Some(seq) = modes.sequence_for(EXIT_CA) {
            bytes.extend(strip_padding(seq));
        }
    }
    bytes
}

#[cfg(unix)]
mod from_env {
    use std::io;

    use super::{LifecycleGuard, LifecycleOptions, SetupError};
    use crate::capability::CapabilityRegistry;
    use crate::output::{PacedWriter, PacingPolicy};
    use crate::source::{EnvOverride, LayeredSource, TerminfoSource};
    use crate::terminfo::Terminfo;
    use crate::tty::TtyModes;

    impl LifecycleGuard<TtyModes, PacedWriter<io::Stdout>> {
        /// Set up on the controlling terminal: `$TERM`'s database entry under
        /// environment overrides, output to stdout paced by the entry.
        ///
        /// # Errors
        ///
        /// [`SetupError::Terminfo`] without a usable entry,
        /// [`SetupError::Io`] without a controlling terminal, or any error
        /// of [`LifecycleGuard::initialize`].
        pub fn initialize_from_env(
            registries: Vec<CapabilityRegistry>,
            options: LifecycleOptions,
        ) -> Result<Self, SetupError> {
            let entry = Terminfo::from_env().map_err(SetupError::Terminfo)?;
            let policy = PacingPolicy::from_terminfo(&entry, None);
            let source = LayeredSource::new(
                EnvOverride::with_prefix_from_env(&options.env_prefix),
                TerminfoSource::new(entry),
            );
            let modes = TtyModes::open().map_err(SetupError::Io)?;
            let sink = PacedWriter::with_policy(io::stdout(), policy);
            Self::initialize(registries, modes, &source, sink, options)
        }
    }
}
