//! Peripheral — one discovered BLE peer.
//!
//! A [`PeripheralRecord`] is created from the first [`RawAdvertisement`]
//! seen for an address and refreshed in place by every later one.

use std::collections::BTreeSet;

use serde::Serialize;
use uuid::Uuid;

use crate::address::Address;
use crate::capability::CapabilityDescriptor;
use crate::time::{Timestamp, now};

/// A single advertisement as reported by the platform scan primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAdvertisement {
    /// Hardware address of the advertiser.
    pub address: Address,
    /// Advertised local name, if any.
    pub name: Option<String>,
    /// Received signal strength in dBm.
    pub rssi: i16,
    /// Service identifiers listed in the advertisement.
    pub service_ids: Vec<Uuid>,
}

/// A discovered peripheral, unique by [`Address`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeripheralRecord {
    /// Stable hardware identifier (primary key).
    pub address: Address,
    /// Display name, when the peripheral advertises one.
    pub name: Option<String>,
    /// Last received signal strength in dBm.
    pub rssi: i16,
    /// Service identifiers from the most recent advertisement.
    pub advertised_service_ids: BTreeSet<Uuid>,
    /// Whether the connection state machine holds a ready session to it.
    pub connected: bool,
    /// When the peripheral was last discovered.
    pub last_seen: Timestamp,
}

impl PeripheralRecord {
    /// Build a fresh, disconnected record from its first advertisement.
    #[must_use]
    pub fn from_advertisement(adv: RawAdvertisement) -> Self {
        Self {
            address: adv.address,
            name: adv.name,
            rssi: adv.rssi,
            advertised_service_ids: adv.service_ids.into_iter().collect(),
            connected: false,
            last_seen: now(),
        }
    }

    /// Refresh signal strength and advertised services from a re-discovery.
    ///
    /// The name is only replaced when the new advertisement carries one;
    /// many peripherals alternate between advertisements with and without
    /// the local name. `connected` is never touched here.
    pub fn refresh(&mut self, adv: RawAdvertisement) {
        debug_assert_eq!(self.address, adv.address);
        self.rssi = adv.rssi;
        self.advertised_service_ids = adv.service_ids.into_iter().collect();
        if adv.name.is_some() {
            self.name = adv.name;
        }
        self.last_seen = now();
    }

    /// Whether this peripheral advertises the configured primary service.
    #[must_use]
    pub fn is_connectable(&self, capability: &CapabilityDescriptor) -> bool {
        capability.is_advertised_by(&self.advertised_service_ids)
    }

    /// Name to show for this peripheral, falling back to its address.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.address.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::NUS_SERVICE;

    fn adv(rssi: i16, name: Option<&str>, services: Vec<Uuid>) -> RawAdvertisement {
        RawAdvertisement {
            address: "AA:BB:CC:DD:EE:FF".parse().unwrap(),
            name: name.map(str::to_owned),
            rssi,
            service_ids: services,
        }
    }

    #[test]
    fn should_start_disconnected() {
        let record = PeripheralRecord::from_advertisement(adv(-70, Some("uart"), vec![]));
        assert!(!record.connected);
        assert_eq!(record.rssi, -70);
        assert_eq!(record.name.as_deref(), Some("uart"));
    }

    #[test]
    fn should_update_rssi_and_services_on_refresh() {
        let mut record = PeripheralRecord::from_advertisement(adv(-70, None, vec![]));
        record.refresh(adv(-50, None, vec![NUS_SERVICE]));
        assert_eq!(record.rssi, -50);
        assert!(record.advertised_service_ids.contains(&NUS_SERVICE));
    }

    #[test]
    fn should_keep_name_when_refresh_has_none() {
        let mut record = PeripheralRecord::from_advertisement(adv(-70, Some("uart"), vec![]));
        record.refresh(adv(-60, None, vec![]));
        assert_eq!(record.name.as_deref(), Some("uart"));
    }

    #[test]
    fn should_preserve_connected_flag_on_refresh() {
        let mut record = PeripheralRecord::from_advertisement(adv(-70, None, vec![]));
        record.connected = true;
        record.refresh(adv(-40, None, vec![]));
        assert!(record.connected);
    }

    #[test]
    fn should_be_connectable_only_with_primary_service() {
        let cap = CapabilityDescriptor::default();
        let with = PeripheralRecord::from_advertisement(adv(-70, None, vec![NUS_SERVICE]));
        let without = PeripheralRecord::from_advertisement(adv(-70, None, vec![]));
        assert!(with.is_connectable(&cap));
        assert!(with.is_connectable(&cap));
        assert!(!without.is_connectable(&cap));
    }

    #[test]
    fn should_fall_back_to_address_for_display_name() {
        let record = PeripheralRecord::from_advertisement(adv(-70, None, vec![]));
        assert_eq!(record.display_name(), "AA:BB:CC:DD:EE:FF");
    }
}
