//! Keypress classification through the real input device, with a socket
//! pair standing in for the terminal.

#![cfg(unix)]

use std::fs::File;
use std::io::Write;
use std::os::unix::net::UnixStream;
use std::thread;
use std::time::{Duration, Instant};

use termintel::capsets;
use termintel::keypress::{KeypressClassifier, KeypressConfig, RAW_READ_CAPACITY};
use termintel::source::FixedSource;
use termintel::tty::TtyInput;
use termintel::{CapCode, CapabilityRegistry, Keypress};

fn pipe_pair() -> (TtyInput, UnixStream) {
    let (a, b) = UnixStream::pair().unwrap();
    let reader: File = std::os::fd::OwnedFd::from(a).into();
    (TtyInput::from_file(reader), b)
}

fn xterm_keys() -> CapabilityRegistry {
    let source = FixedSource::new()
        .with(CapCode::of("ku"), b"\x1bOA")
        .with(CapCode::of("kd"), b"\x1bOB")
        .with(CapCode::of("kh"), b"\x1bOH")
        .with(CapCode::of("kD"), b"\x1b[3~")
        .with(CapCode::of("k1"), b"\x1bOP")
        .with(CapCode::of("kb"), b"\x7f");
    let mut keys = capsets::KEYS.declare();
    keys.resolve(&source).unwrap();
    keys
}

fn quick() -> KeypressClassifier {
    KeypressClassifier::new(KeypressConfig::default().with_timeout_deciseconds(2))
}

#[test]
fn recognizes_key_bursts() {
    let keys = xterm_keys();
    let (mut input, mut peer) = pipe_pair();
    let classifier = quick();

    for (code, bytes) in [
        ("ku", &b"\x1bOA"[..]),
        ("kD", &b"\x1b[3~"[..]),
        ("k1", &b"\x1bOP"[..]),
    ] {
        peer.write_all(bytes).unwrap();
        let key = classifier.classify(&mut input, &keys);
        assert_eq!(key.key(), keys.find_by_code(CapCode::of(code)), "{code}");
        assert_eq!(key.status(), 1);
    }
}

#[test]
fn plain_characters_and_unmatched_escapes() {
    let keys = xterm_keys();
    let (mut input, mut peer) = pipe_pair();
    let classifier = quick();

    peer.write_all(b"q").unwrap();
    assert_eq!(classifier.classify(&mut input, &keys), Keypress::Character(b'q'));

    // Backspace is not escape-led, so it is a character even though a key
    // carries the same byte.
    peer.write_all(b"\x7f").unwrap();
    assert_eq!(classifier.classify(&mut input, &keys), Keypress::Character(0x7f));

    peer.write_all(b"\x1b[1;5A").unwrap();
    match classifier.classify(&mut input, &keys) {
        Keypress::Unrecognized(raw) => {
            assert_eq!(raw.as_bytes(), b"\x1b[1;5A");
            assert_eq!(raw.escaped(), "^[[1;5A");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn quiet_line_times_out() {
    let keys = xterm_keys();
    let (mut input, _peer) = pipe_pair();
    let start = Instant::now();
    assert_eq!(quick().classify(&mut input, &keys), Keypress::Timeout);
    let waited = start.elapsed();
    assert!(waited >= Duration::from_millis(150), "{waited:?}");
    assert!(waited < Duration::from_secs(2), "{waited:?}");
}

#[test]
fn late_key_within_the_wait_is_seen() {
    let keys = xterm_keys();
    let (mut input, mut peer) = pipe_pair();
    let writer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        peer.write_all(b"\x1bOB").unwrap();
        peer
    });
    let key = KeypressClassifier::default().classify(&mut input, &keys);
    let _peer = writer.join().unwrap();
    assert_eq!(key.key(), keys.find_by_code(CapCode::of("kd")));
}

#[test]
fn long_bursts_are_capped() {
    let keys = xterm_keys();
    let (mut input, mut peer) = pipe_pair();
    let mut burst = vec![0x1b];
    burst.resize(RAW_READ_CAPACITY + 20, b'x');
    peer.write_all(&burst).unwrap();

    match quick().classify(&mut input, &keys) {
        Keypress::Unrecognized(raw) => assert_eq!(raw.as_bytes(), &burst[..RAW_READ_CAPACITY]),
        other => panic!("unexpected {other:?}"),
    }
    // The remainder is the next read.
    assert_eq!(quick().classify(&mut input, &keys), Keypress::Character(b'x'));
}

#[test]
fn released_keys_recognize_nothing() {
    let mut keys = xterm_keys();
    keys.release();
    let (mut input, mut peer) = pipe_pair();
    peer.write_all(b"\x1bOA").unwrap();
    assert!(matches!(quick().classify(&mut input, &keys), Keypress::Unrecognized(_)));
}
