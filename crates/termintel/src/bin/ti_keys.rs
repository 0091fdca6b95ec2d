#![forbid(unsafe_code)]

//! Interactive key tester.
//!
//! Switches the terminal into application mode, then reports how each
//! keypress is recognized. `q` quits. `--dump` lists the resolved
//! capabilities first.
//!
//! Environment: `TERM` selects the database entry, `LESS_TERMCAP_<code>`
//! overrides single capabilities (prefix set by `TERMINTEL_ENV_PREFIX`),
//! `TERMINTEL_LOG` filters the JSON log (with the `tracing-json` feature).

use std::process::ExitCode;

#[cfg(unix)]
fn main() -> ExitCode {
    use std::io::{self, Write};

    use termintel::capsets;
    use termintel::display::{self, Rendering};
    use termintel::keypress::{Keypress, KeypressClassifier};
    use termintel::lifecycle::{LifecycleGuard, LifecycleOptions};

    #[cfg(feature = "tracing-json")]
    termintel::logging::init_subscriber();

    let dump = std::env::args().skip(1).any(|arg| arg == "--dump");

    let mut guard = match LifecycleGuard::initialize_from_env(
        capsets::declare_all(),
        LifecycleOptions::from_env(),
    ) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("ti-keys: {err}");
            return ExitCode::FAILURE;
        }
    };
    let mut input = match guard.modes().input() {
        Ok(input) => input,
        Err(err) => {
            guard.shutdown();
            eprintln!("ti-keys: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(mut controls) = guard.controls(capsets::CONTROL.name) {
        controls.clear_screen();
    }
    guard.executor_mut().flush();

    if dump {
        let mut out = io::stdout().lock();
        for set in capsets::ALL {
            let Some(registry) = guard.registry(set.name) else {
                continue;
            };
            let _ = writeln!(out, "{}:", set.name);
            let descriptions = set.descriptions();
            if let Err(err) =
                display::dump_registry(&mut out, registry, Some(&descriptions[..]), Rendering::Ansi)
            {
                eprintln!("ti-keys: {err}");
            }
        }
    }

    println!("Press keys to see how they are recognized; q quits.");
    let classifier = KeypressClassifier::default();
    loop {
        if let Some(cause) = guard.check_interrupt() {
            guard.teardown(Some(cause));
        }
        match guard.next_keypress(&classifier, &mut input) {
            Keypress::Timeout => {}
            Keypress::Character(b'q') => break,
            Keypress::Character(byte) => {
                println!("You pressed {}", display::escape_bytes(&[byte]));
            }
            Keypress::Key(idx) => {
                let name = capsets::KEYS.description(idx.index()).unwrap_or("?");
                println!("You pressed {name}");
            }
            Keypress::Unrecognized(raw) => println!("Unrecognized sequence: {}", raw.escaped()),
        }
    }

    guard.shutdown();
    ExitCode::SUCCESS
}

#[cfg(not(unix))]
fn main() -> ExitCode {
    eprintln!("ti-keys: a Unix terminal is required");
    ExitCode::FAILURE
}
