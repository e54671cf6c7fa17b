//! Common error types used across the workspace.
//!
//! Errors are split by the phase they belong to. Scan and connect setup
//! errors are reported to the caller and never retried by the core; link
//! loss after a session reached `Ready` is handled by the reconnect policy
//! and only surfaces here once that policy gives up.

use crate::gatt::GattStatus;

/// Base error type wrapping every phase-specific error.
#[derive(Debug, thiserror::Error)]
pub enum CentralError {
    /// Scanning could not start or was aborted by the platform.
    #[error("scan failed")]
    Scan(#[from] ScanFailure),

    /// A connection could not be established or was abandoned.
    #[error("connect failed")]
    Connect(#[from] ConnectError),

    /// A message could not be exchanged over the current session.
    #[error("exchange failed")]
    Exchange(#[from] ExchangeError),

    /// A textual hardware address could not be parsed.
    #[error("invalid address")]
    Address(#[from] AddressParseError),
}

/// Why a scan attempt failed. Failures are terminal for that attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScanFailure {
    /// No Bluetooth adapter is present on the host.
    #[error("no bluetooth adapter available")]
    NoAdapter,

    /// The adapter exists but is powered off or disabled.
    #[error("bluetooth adapter is disabled")]
    AdapterDisabled,

    /// The platform scan primitive reported an error code.
    #[error("platform scan error (code {code})")]
    Platform {
        /// Platform-specific error code.
        code: i32,
    },
}

/// Why a connection attempt failed before (or while re-) reaching `Ready`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    /// The radio is absent or not usable.
    #[error("bluetooth adapter unavailable")]
    AdapterUnavailable,

    /// The target address does not resolve to a known device.
    #[error("device cannot be resolved")]
    DeviceUnresolvable,

    /// The platform refused to open a link.
    #[error("failed to open link")]
    LinkOpenFailed,

    /// The platform refused to start service discovery.
    #[error("service discovery could not be started")]
    DiscoveryNotStarted,

    /// Service discovery completed with an error status.
    #[error("service discovery failed ({status})")]
    ServiceDiscoveryFailed {
        /// Status reported by the platform.
        status: GattStatus,
    },

    /// The primary service is absent from the peripheral's GATT table.
    #[error("primary service missing")]
    ServiceMissing,

    /// A required characteristic is absent from the primary service.
    #[error("characteristic {uuid} missing")]
    CharacteristicMissing {
        /// The characteristic that was looked up.
        uuid: uuid::Uuid,
    },

    /// The notification-enable descriptor is absent from the notify characteristic.
    #[error("notification descriptor missing")]
    DescriptorMissing,

    /// Enabling notifications was rejected at some step.
    #[error("notification subscription failed")]
    SubscriptionFailed,

    /// The link dropped before the session reached `Ready`.
    #[error("link lost during setup")]
    LinkLost,

    /// The session did not reach `Ready` within the configured deadline.
    #[error("session setup timed out")]
    SetupTimedOut,

    /// Automatic reconnection gave up after the configured number of attempts.
    #[error("reconnect abandoned after {attempts} attempts")]
    ReconnectExhausted {
        /// Number of consecutive failed attempts.
        attempts: u32,
    },
}

/// Why an outbound write could not be issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
    /// No session is in the `Ready` state.
    #[error("no session is ready")]
    NotReady,

    /// The platform rejected the write request.
    #[error("write rejected by the link")]
    WriteRejected,
}

/// A textual hardware address did not match `XX:XX:XX:XX:XX:XX`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hardware address {input:?}")]
pub struct AddressParseError {
    /// The rejected input.
    pub input: String,
}

impl AddressParseError {
    pub(crate) fn new(input: &str) -> Self {
        Self {
            input: input.to_owned(),
        }
    }
}
