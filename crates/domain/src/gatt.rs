//! GATT shapes reported by a link: connection state, operation status, and
//! the service table found by discovery.

use std::fmt;

use uuid::Uuid;

/// Physical link state as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// The link is established.
    Connected,
    /// The link is down (never came up, dropped, or torn down on request).
    Disconnected,
}

/// Completion status of an asynchronous GATT operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GattStatus {
    /// The operation succeeded.
    Success,
    /// The operation failed with a platform-specific code.
    Failure(i32),
}

impl GattStatus {
    /// Whether the status denotes success.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for GattStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Failure(code) => write!(f, "status {code}"),
        }
    }
}

/// A characteristic and the descriptors attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattCharacteristic {
    pub uuid: Uuid,
    pub descriptors: Vec<Uuid>,
}

impl GattCharacteristic {
    /// Whether the given descriptor is attached to this characteristic.
    #[must_use]
    pub fn has_descriptor(&self, uuid: Uuid) -> bool {
        self.descriptors.contains(&uuid)
    }
}

/// A discovered service and its characteristics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: Uuid,
    pub characteristics: Vec<GattCharacteristic>,
}

impl GattService {
    /// Look up a characteristic of this service by UUID.
    #[must_use]
    pub fn characteristic(&self, uuid: Uuid) -> Option<&GattCharacteristic> {
        self.characteristics.iter().find(|c| c.uuid == uuid)
    }
}

/// Look up a service by UUID in a discovered table.
#[must_use]
pub fn find_service(services: &[GattService], uuid: Uuid) -> Option<&GattService> {
    services.iter().find(|s| s.uuid == uuid)
}
