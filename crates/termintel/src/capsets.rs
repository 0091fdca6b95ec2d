#![forbid(unsafe_code)]

//! Standard capability sets.
//!
//! Each set is a fixed declaration order with a short description per
//! code. [`CONTROL`] covers screen and cursor manipulation, [`KEYS`] the
//! keys an application usually wants to recognize, [`MODES`] the
//! screen-mode and attribute toggles.

use crate::capability::{CapCode, CapabilityRegistry};

/// A named, ordered capability declaration.
#[derive(Debug, Clone, Copy)]
pub struct CapabilitySet {
    /// Registry name used by [`declare`](Self::declare).
    pub name: &'static str,
    /// Codes and descriptions, in index order.
    pub caps: &'static [(CapCode, &'static str)],
}

impl CapabilitySet {
    /// Declare an unresolved registry for this set.
    #[must_use]
    pub fn declare(&self) -> CapabilityRegistry {
        let codes: Vec<CapCode> = self.caps.iter().map(|(code, _)| *code).collect();
        CapabilityRegistry::declare(self.name, &codes)
    }

    /// Description of the entry at `index`.
    #[must_use]
    pub fn description(&self, index: usize) -> Option<&'static str> {
        self.caps.get(index).map(|(_, desc)| *desc)
    }

    /// Every description, in index order.
    #[must_use]
    pub fn descriptions(&self) -> Vec<&'static str> {
        self.caps.iter().map(|(_, desc)| *desc).collect()
    }

    /// Position of `code` in the set.
    #[must_use]
    pub fn position(&self, code: CapCode) -> Option<usize> {
        self.caps.iter().position(|(c, _)| *c == code)
    }
}

/// The three standard sets, in the order the lifecycle resolves them.
pub const ALL: [CapabilitySet; 3] = [CONTROL, KEYS, MODES];

/// Screen and cursor control.
pub const CONTROL: CapabilitySet = CapabilitySet {
    name: "control",
    caps: &[
        (CapCode::of("cl"), "clear screen"),
        (CapCode::of("ce"), "clear to end of line"),
        (CapCode::of("cd"), "clear to end of screen"),
        (CapCode::of("ho"), "cursor home"),
        (CapCode::of("sc"), "save cursor"),
        (CapCode::of("rc"), "restore cursor"),
        (CapCode::of("al"), "insert line"),
        (CapCode::of("sf"), "scroll forward"),
        (CapCode::of("sr"), "scroll reverse"),
        (CapCode::of("SF"), "scroll forward #1 lines"),
        (CapCode::of("SR"), "scroll back #1 lines"),
        (CapCode::of("cs"), "change scroll region"),
        (CapCode::of("cm"), "cursor address"),
        (CapCode::of("DO"), "cursor down #1 lines"),
        (CapCode::of("UP"), "cursor up #1 lines"),
        (CapCode::of("LE"), "cursor left #1 columns"),
        (CapCode::of("RI"), "cursor right #1 columns"),
        (CapCode::of("Zm"), "set left margin"),
        (CapCode::of("Zn"), "set right margin"),
        (CapCode::of("MC"), "clear margins"),
        (CapCode::of("u7"), "report cursor position"),
    ],
};

/// Keys recognized by the classifier.
pub const KEYS: CapabilitySet = CapabilitySet {
    name: "keys",
    caps: &[
        (CapCode::of("ku"), "up arrow"),
        (CapCode::of("kd"), "down arrow"),
        (CapCode::of("kl"), "left arrow"),
        (CapCode::of("kr"), "right arrow"),
        (CapCode::of("kh"), "home"),
        (CapCode::of("@7"), "end"),
        (CapCode::of("kN"), "page down"),
        (CapCode::of("kP"), "page up"),
        (CapCode::of("kI"), "insert"),
        (CapCode::of("kD"), "delete"),
        (CapCode::of("kb"), "backspace"),
        (CapCode::of("k1"), "F1"),
        (CapCode::of("k2"), "F2"),
        (CapCode::of("k3"), "F3"),
        (CapCode::of("k4"), "F4"),
        (CapCode::of("k5"), "F5"),
        (CapCode::of("k6"), "F6"),
        (CapCode::of("k7"), "F7"),
        (CapCode::of("k8"), "F8"),
        (CapCode::of("k9"), "F9"),
        (CapCode::of("k;"), "F10"),
        (CapCode::of("F1"), "F11"),
        (CapCode::of("F2"), "F12"),
        (CapCode::of("kB"), "back tab"),
    ],
};

/// Screen modes and text attributes.
pub const MODES: CapabilitySet = CapabilitySet {
    name: "modes",
    caps: &[
        (CapCode::of("ti"), "enter ca mode"),
        (CapCode::of("te"), "exit ca mode"),
        (CapCode::of("ks"), "keypad transmit"),
        (CapCode::of("ke"), "keypad local"),
        (CapCode::of("md"), "enter bold"),
        (CapCode::of("me"), "exit attributes"),
        (CapCode::of("us"), "enter underline"),
        (CapCode::of("ue"), "exit underline"),
        (CapCode::of("so"), "enter standout"),
        (CapCode::of("se"), "exit standout"),
        (CapCode::of("mr"), "enter reverse"),
        (CapCode::of("mb"), "enter blink"),
        (CapCode::of("vi"), "cursor invisible"),
        (CapCode::of("ve"), "cursor normal"),
    ],
};

/// Declare unresolved registries for every standard set.
#[must_use]
pub fn declare_all() -> Vec<CapabilityRegistry> {
    ALL.iter().map(CapabilitySet::declare).collect()
}
