//! Capability port — where the fixed GATT identifiers come from.

use blecentral_domain::capability::CapabilityDescriptor;

/// Read-only source of the [`CapabilityDescriptor`].
///
/// Consulted once when the central is built; the descriptor is then shared
/// by value and never changes.
pub trait CapabilitySource {
    /// Return the identifiers this central talks to.
    fn capability(&self) -> CapabilityDescriptor;
}

impl CapabilitySource for CapabilityDescriptor {
    fn capability(&self) -> CapabilityDescriptor {
        *self
    }
}
