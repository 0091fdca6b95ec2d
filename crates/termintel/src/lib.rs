#![forbid(unsafe_code)]

//! Terminal capabilities: resolve, own, and replay device-specific control
//! sequences, and classify raw keyboard input against recognized key
//! sequences.

pub mod capability;
pub mod capsets;
pub mod controls;
pub mod display;
pub mod executor;
pub mod keypress;
pub mod lifecycle;
pub mod logging;
pub mod modes;
pub mod output;
pub mod source;
pub mod terminfo;

#[cfg(unix)]
pub mod tty;

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, debug_span, info, trace, warn};

pub use capability::{CapCode, CapIndex, CapabilityEntry, CapabilityRegistry};
pub use executor::{Playback, SequenceExecutor, SkipReason};
pub use keypress::{InputDevice, KeypressClassifier, KeypressConfig, Keypress};
pub use lifecycle::{
    AppliedModes, InterruptHandle, Interruption, LifecycleGuard, LifecycleOptions, SetupError,
};
pub use source::SequenceSource;
