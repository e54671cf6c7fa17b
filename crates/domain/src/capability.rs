//! Capability descriptor — the fixed identifiers a peripheral must expose.
//!
//! A peripheral is usable by this central when it advertises the primary
//! service, and once connected exposes a write characteristic, a notify
//! characteristic, and the notification-enable descriptor on the latter.

use serde::Deserialize;
use uuid::Uuid;

/// Nordic UART Service.
pub const NUS_SERVICE: Uuid = Uuid::from_u128(0x6E40_0001_B5A3_F393_E0A9_E50E_24DC_CA9E);

/// Nordic UART RX characteristic (the central writes here).
pub const NUS_WRITE_CHAR: Uuid = Uuid::from_u128(0x6E40_0002_B5A3_F393_E0A9_E50E_24DC_CA9E);

/// Nordic UART TX characteristic (the peripheral notifies here).
pub const NUS_NOTIFY_CHAR: Uuid = Uuid::from_u128(0x6E40_0003_B5A3_F393_E0A9_E50E_24DC_CA9E);

/// Client Characteristic Configuration Descriptor (`0x2902`).
pub const CCCD: Uuid = Uuid::from_u128(0x0000_2902_0000_1000_8000_0080_5F9B_34FB);

/// Value written to the CCCD to enable notifications.
pub const ENABLE_NOTIFICATION_VALUE: [u8; 2] = [0x01, 0x00];

/// Immutable set of identifiers describing the capability this central talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CapabilityDescriptor {
    /// Primary service that must appear in advertisements.
    pub service: Uuid,
    /// Characteristic the central writes to.
    pub write_characteristic: Uuid,
    /// Characteristic the peripheral notifies on.
    pub notify_characteristic: Uuid,
    /// Descriptor on the notify characteristic used to enable notifications.
    pub notification_descriptor: Uuid,
}

impl CapabilityDescriptor {
    /// Whether a set of advertised service identifiers includes the primary service.
    #[must_use]
    pub fn is_advertised_by<'a>(&self, advertised: impl IntoIterator<Item = &'a Uuid>) -> bool {
        advertised.into_iter().any(|id| *id == self.service)
    }
}

impl Default for CapabilityDescriptor {
    fn default() -> Self {
        Self {
            service: NUS_SERVICE,
            write_characteristic: NUS_WRITE_CHAR,
            notify_characteristic: NUS_NOTIFY_CHAR,
            notification_descriptor: CCCD,
        }
    }
}
