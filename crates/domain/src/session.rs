//! Session state — the vocabulary of the connection state machine.
//!
//! ```text
//! Idle → Connecting → DiscoveringServices → Subscribing → Ready
//!          │               │                    │           │
//!          └───────────────┴────────────────────┴───────────┴─→ Disconnected(kind)
//!                                                                   │
//!                               (involuntary loss) Connecting ←─────┘
//! ```
//!
//! Setup states fall back to `Idle` when setup fails. `Disconnected` is
//! terminal for a session unless the loss was involuntary, in which case the
//! same session re-enters `Connecting`.

use std::fmt;

/// Whether a disconnect was requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectKind {
    /// The caller asked for the link to be torn down.
    Intentional,
    /// The link dropped without being asked to.
    Lost,
}

impl DisconnectKind {
    /// Classify a disconnect from the manual-disconnect flag.
    #[must_use]
    pub fn from_manual_flag(manual: bool) -> Self {
        if manual { Self::Intentional } else { Self::Lost }
    }

    /// Whether the disconnect was caller-initiated.
    #[must_use]
    pub fn is_manual(self) -> bool {
        matches!(self, Self::Intentional)
    }
}

/// State of the single connection session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    DiscoveringServices,
    Subscribing,
    Ready,
    Disconnected(DisconnectKind),
}

impl SessionState {
    /// Whether the session holds (or is establishing) a link.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::DiscoveringServices | Self::Subscribing | Self::Ready
        )
    }

    /// Whether the session is between link request and `Ready`.
    #[must_use]
    pub fn is_setup(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::DiscoveringServices | Self::Subscribing
        )
    }

    /// Whether moving from `self` to `next` respects the state order.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use SessionState::{Connecting, Disconnected, DiscoveringServices, Idle, Ready, Subscribing};

        match (self, next) {
            (Idle | Disconnected(_), Connecting)
            | (Connecting, DiscoveringServices)
            | (DiscoveringServices, Subscribing)
            | (Subscribing, Ready)
            | (Connecting | DiscoveringServices | Subscribing | Disconnected(_), Idle) => true,
            (from, Disconnected(_)) => from.is_active(),
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Connecting => f.write_str("connecting"),
            Self::DiscoveringServices => f.write_str("discovering-services"),
            Self::Subscribing => f.write_str("subscribing"),
            Self::Ready => f.write_str("ready"),
            Self::Disconnected(DisconnectKind::Intentional) => f.write_str("disconnected(intentional)"),
            Self::Disconnected(DisconnectKind::Lost) => f.write_str("disconnected(lost)"),
        }
    }
}
