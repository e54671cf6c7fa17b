//! Peripheral registry — deduplicated, ordered store of discovered peripherals.
//!
//! Records are unique by address and kept in first-discovery order.
//! Readers always get a full snapshot, never a view into the live store.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use blecentral_domain::address::Address;
use blecentral_domain::peripheral::{PeripheralRecord, RawAdvertisement};

/// Outcome of recording an advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// First time this address was seen.
    Inserted,
    /// An existing record was refreshed in place.
    Updated,
}

#[derive(Default)]
struct Inner {
    records: Vec<PeripheralRecord>,
    index: HashMap<Address, usize>,
    /// Peripheral of the live session. Survives `clear`.
    linked: Option<Address>,
}

/// Thread-safe registry of discovered peripherals.
///
/// Written by the scan pump and the connection state machine, read by
/// callers rendering the list.
#[derive(Default)]
pub struct PeripheralRegistry {
    inner: RwLock<Inner>,
}

impl PeripheralRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record or refresh the existing one for the advertiser.
    ///
    /// Returns the outcome and a snapshot of the whole list taken under the
    /// same write lock, so the snapshot always contains the change.
    pub fn upsert(&self, adv: RawAdvertisement) -> (Upsert, Vec<PeripheralRecord>) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        let outcome = if let Some(&pos) = inner.index.get(&adv.address) {
            inner.records[pos].refresh(adv);
            Upsert::Updated
        } else {
            let pos = inner.records.len();
            let linked = inner.linked == Some(adv.address);
            inner.index.insert(adv.address, pos);
            let mut record = PeripheralRecord::from_advertisement(adv);
            record.connected = linked;
            inner.records.push(record);
            Upsert::Inserted
        };

        (outcome, inner.records.clone())
    }

    /// Set the `connected` flag of a record.
    ///
    /// The flag is remembered for `address` even when no record exists yet
    /// (e.g. the registry was cleared by a new scan while a session was
    /// running) and applied when the peripheral is rediscovered. Returns
    /// whether a record was updated.
    pub fn set_connected(&self, address: Address, connected: bool) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if connected {
            inner.linked = Some(address);
        } else if inner.linked == Some(address) {
            inner.linked = None;
        }
        let Some(&pos) = inner.index.get(&address) else {
            return false;
        };
        inner.records[pos].connected = connected;
        true
    }

    /// Look up a record by address.
    #[must_use]
    pub fn get(&self, address: Address) -> Option<PeripheralRecord> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .index
            .get(&address)
            .map(|&pos| inner.records[pos].clone())
    }

    /// Copy of all records in discovery order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PeripheralRecord> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .clone()
    }

    /// Number of distinct peripherals recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .len()
    }

    /// Whether no peripheral has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every record. Called when a new scan starts.
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.records.clear();
        inner.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use blecentral_domain::capability::NUS_SERVICE;

    fn adv(address: &str, rssi: i16) -> RawAdvertisement {
        RawAdvertisement {
            address: address.parse().unwrap(),
            name: None,
            rssi,
            service_ids: vec![],
        }
    }

    #[test]
    fn should_insert_first_discovery() {
        let registry = PeripheralRegistry::new();
        let (outcome, list) = registry.upsert(adv("AA:BB:CC:DD:EE:FF", -70));
        assert_eq!(outcome, Upsert::Inserted);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn should_update_rssi_in_place_for_same_address() {
        let registry = PeripheralRegistry::new();
        registry.upsert(adv("AA:BB:CC:DD:EE:FF", -70));
        let (outcome, list) = registry.upsert(adv("AA:BB:CC:DD:EE:FF", -50));

        assert_eq!(outcome, Upsert::Updated);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].rssi, -50);
    }

    #[test]
    fn should_keep_one_record_per_address_for_any_sequence() {
        let registry = PeripheralRegistry::new();
        let addresses = [
            "00:00:00:00:00:01",
            "00:00:00:00:00:02",
            "00:00:00:00:00:01",
            "00:00:00:00:00:03",
            "00:00:00:00:00:02",
            "00:00:00:00:00:01",
        ];

        let mut seen = HashSet::new();
        for (i, addr) in addresses.iter().enumerate() {
            seen.insert(*addr);
            let rssi = -40 - i16::try_from(i).unwrap();
            let (_, list) = registry.upsert(adv(addr, rssi));
            assert!(list.len() <= seen.len());
        }

        assert_eq!(registry.len(), 3);
        let unique: HashSet<_> = registry.snapshot().iter().map(|r| r.address).collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn should_preserve_discovery_order() {
        let registry = PeripheralRegistry::new();
        registry.upsert(adv("00:00:00:00:00:02", -70));
        registry.upsert(adv("00:00:00:00:00:01", -70));
        registry.upsert(adv("00:00:00:00:00:02", -30));

        let order: Vec<String> = registry
            .snapshot()
            .iter()
            .map(|r| r.address.to_string())
            .collect();
        assert_eq!(order, ["00:00:00:00:00:02", "00:00:00:00:00:01"]);
    }

    #[test]
    fn should_refresh_advertised_services() {
        let registry = PeripheralRegistry::new();
        registry.upsert(adv("AA:BB:CC:DD:EE:FF", -70));
        let mut again = adv("AA:BB:CC:DD:EE:FF", -60);
        again.service_ids = vec![NUS_SERVICE];
        registry.upsert(again);

        let record = registry.get("AA:BB:CC:DD:EE:FF".parse().unwrap()).unwrap();
        assert!(record.advertised_service_ids.contains(&NUS_SERVICE));
    }

    #[test]
    fn should_keep_connected_flag_across_rediscovery() {
        let registry = PeripheralRegistry::new();
        let address = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        registry.upsert(adv("AA:BB:CC:DD:EE:FF", -70));
        assert!(registry.set_connected(address, true));

        registry.upsert(adv("AA:BB:CC:DD:EE:FF", -65));
        assert!(registry.get(address).unwrap().connected);
    }

    #[test]
    fn should_report_missing_record_when_setting_connected() {
        let registry = PeripheralRegistry::new();
        assert!(!registry.set_connected("AA:BB:CC:DD:EE:FF".parse().unwrap(), true));
    }

    #[test]
    fn should_restore_connected_flag_when_rediscovered_after_clear() {
        let registry = PeripheralRegistry::new();
        let address = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        registry.upsert(adv("AA:BB:CC:DD:EE:FF", -70));
        registry.set_connected(address, true);

        registry.clear();
        registry.upsert(adv("AA:BB:CC:DD:EE:FF", -70));
        registry.upsert(adv("11:22:33:44:55:66", -70));
        assert!(registry.get(address).unwrap().connected);
        assert!(!registry.get("11:22:33:44:55:66".parse().unwrap()).unwrap().connected);

        registry.set_connected(address, false);
        registry.clear();
        registry.upsert(adv("AA:BB:CC:DD:EE:FF", -70));
        assert!(!registry.get(address).unwrap().connected);
    }

    #[test]
    fn should_empty_on_clear() {
        let registry = PeripheralRegistry::new();
        registry.upsert(adv("AA:BB:CC:DD:EE:FF", -70));
        registry.clear();
        assert!(registry.is_empty());
        let (outcome, _) = registry.upsert(adv("AA:BB:CC:DD:EE:FF", -70));
        assert_eq!(outcome, Upsert::Inserted);
    }

    #[test]
    fn should_stay_consistent_under_concurrent_writers() {
        let registry = Arc::new(PeripheralRegistry::new());
        let handles: Vec<_> = (0..4u8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..50u8 {
                        let addr = format!("00:00:00:00:00:{:02X}", i % 10);
                        registry.upsert(adv(&addr, -i16::from(t)));
                        let _ = registry.snapshot();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 10);
    }
}
