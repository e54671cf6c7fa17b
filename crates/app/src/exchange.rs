//! Exchange protocol — what gets written on the wire once a session is `Ready`.

use blecentral_domain::exchange::{
    DEFAULT_GREETING, SequenceCounter, decode_payload, echo_frame, terminated_frame,
};

/// Tunables of the exchange protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSettings {
    /// Write `HEXSEQ + payload + NUL` back for every inbound notification.
    pub echo_enabled: bool,
    /// Text written (NUL-terminated) when the session reaches `Ready`.
    pub greeting: String,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            echo_enabled: true,
            greeting: DEFAULT_GREETING.to_string(),
        }
    }
}

/// A decoded inbound notification and the frame to echo back, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub payload: String,
    pub echo: Option<Vec<u8>>,
}

/// Per-session exchange state.
///
/// The counter survives automatic reconnects; a caller-issued connect
/// builds a fresh exchange.
#[derive(Debug, Clone)]
pub struct Exchange {
    settings: ExchangeSettings,
    counter: SequenceCounter,
}

impl Exchange {
    #[must_use]
    pub fn new(settings: ExchangeSettings) -> Self {
        Self {
            settings,
            counter: SequenceCounter::default(),
        }
    }

    /// The greeting frame.
    #[must_use]
    pub fn greeting(&self) -> Vec<u8> {
        terminated_frame(&self.settings.greeting)
    }

    /// An application payload, written verbatim.
    #[must_use]
    pub fn outbound(text: &str) -> Vec<u8> {
        text.as_bytes().to_vec()
    }

    /// Decode a notification value and advance the sequence counter.
    pub fn receive(&mut self, value: &[u8]) -> Inbound {
        let payload = decode_payload(value).into_owned();
        let seq = self.counter.next();
        let echo = self
            .settings
            .echo_enabled
            .then(|| echo_frame(seq, &payload));
        Inbound { payload, echo }
    }

    /// Last sequence value used.
    #[must_use]
    pub fn sequence(&self) -> u8 {
        self.counter.current()
    }
}
