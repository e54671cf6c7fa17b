//! Exchange framing for the write/notify characteristic pair.
//!
//! | Frame | Bytes |
//! |-------|-------|
//! | Greeting | `text` + `0x00` |
//! | Application payload | `text` (verbatim) |
//! | Echo | two uppercase hex digits of the sequence + inbound text + `0x00` |
//!
//! Inbound notifications are decoded as UTF-8, replacing invalid sequences.

use std::borrow::Cow;

/// Greeting written once a session reaches `Ready`, unless configured otherwise.
pub const DEFAULT_GREETING: &str = "Ready";

const TERMINATOR: u8 = 0;

/// Wrapping 8-bit counter used to prefix echoed notifications.
///
/// The first call to [`next`](Self::next) returns `1`; after `0xFF` the
/// counter wraps to `0x00` so the prefix stays two digits wide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceCounter(u8);

impl SequenceCounter {
    /// Advance and return the new sequence value.
    pub fn next(&mut self) -> u8 {
        self.0 = self.0.wrapping_add(1);
        self.0
    }

    /// The last value returned by [`next`](Self::next) (`0` before the first call).
    #[must_use]
    pub fn current(self) -> u8 {
        self.0
    }
}

/// Render a sequence value as a two-digit uppercase hexadecimal prefix.
#[must_use]
pub fn hex_prefix(seq: u8) -> String {
    format!("{seq:02X}")
}

/// Build the echo frame `HEXSEQ + payload + NUL`.
#[must_use]
pub fn echo_frame(seq: u8, payload: &str) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 3);
    frame.extend_from_slice(hex_prefix(seq).as_bytes());
    frame.extend_from_slice(payload.as_bytes());
    frame.push(TERMINATOR);
    frame
}

/// Build a NUL-terminated frame, used for the greeting.
#[must_use]
pub fn terminated_frame(text: &str) -> Vec<u8> {
    let mut frame = Vec::with_capacity(text.len() + 1);
    frame.extend_from_slice(text.as_bytes());
    frame.push(TERMINATOR);
    frame
}

/// Decode an inbound notification value as text.
#[must_use]
pub fn decode_payload(value: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_frame_first_echo_with_01_prefix() {
        let mut counter = SequenceCounter::default();
        let seq = counter.next();
        assert_eq!(echo_frame(seq, "hi"), b"01hi\0".to_vec());
    }

    #[test]
    fn should_render_255th_prefix_as_ff() {
        let mut counter = SequenceCounter::default();
        let mut seq = 0;
        for _ in 0..255 {
            seq = counter.next();
        }
        assert_eq!(hex_prefix(seq), "FF");
        assert_eq!(echo_frame(seq, "x"), b"FFx\0".to_vec());
    }

    #[test]
    fn should_wrap_to_00_after_ff() {
        let mut counter = SequenceCounter(0xFF);
        assert_eq!(counter.next(), 0);
        assert_eq!(hex_prefix(counter.current()), "00");
    }

    #[test]
    fn should_use_uppercase_hex_digits() {
        assert_eq!(hex_prefix(0x0A), "0A");
        assert_eq!(hex_prefix(0xBE), "BE");
    }

    #[test]
    fn should_terminate_greeting_with_nul() {
        assert_eq!(terminated_frame(DEFAULT_GREETING), b"Ready\0".to_vec());
    }

    #[test]
    fn should_replace_invalid_utf8_when_decoding() {
        assert_eq!(decode_payload(b"hi"), "hi");
        assert_eq!(decode_payload(&[0x68, 0xFF]), "h\u{FFFD}");
    }
}
