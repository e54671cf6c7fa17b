//! Event — an observable record of something the central did or saw.
//!
//! Events complement the caller callbacks: callbacks drive the caller's UI,
//! events let any number of observers (logs, tests) watch the same flow.

use crate::address::Address;
use crate::error::{ConnectError, ScanFailure};
use crate::session::SessionState;
use crate::time::{Timestamp, now};

/// What happened.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// The registry content changed; `count` is the new number of records.
    ListChanged { count: usize },
    /// A scan attempt failed.
    ScanFailed(ScanFailure),
    /// The session moved between two states.
    StateChanged {
        address: Address,
        from: SessionState,
        to: SessionState,
    },
    /// A connection attempt was abandoned.
    ConnectFailed {
        address: Address,
        error: ConnectError,
    },
    /// A text payload arrived on the notify characteristic.
    Received { address: Address, payload: String },
}

/// A timestamped [`EventKind`].
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub timestamp: Timestamp,
}

impl Event {
    /// Stamp an event with the current time.
    #[must_use]
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            timestamp: now(),
        }
    }
}
