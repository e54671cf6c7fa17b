//! Mapping between btleplug types and the domain model.

use std::collections::BTreeSet;

use btleplug::api::{BDAddr, PeripheralProperties, Service};

use blecentral_domain::address::Address;
use blecentral_domain::gatt::{GattCharacteristic, GattService};
use blecentral_domain::peripheral::RawAdvertisement;

/// RSSI reported when the platform does not know the signal strength yet.
pub const UNKNOWN_RSSI: i16 = i16::MIN;

#[must_use]
pub fn address(addr: BDAddr) -> Address {
    Address::new(addr.into_inner())
}

/// Build an advertisement from the properties btleplug gathered for a peripheral.
#[must_use]
pub fn advertisement(props: &PeripheralProperties) -> RawAdvertisement {
    RawAdvertisement {
        address: address(props.address),
        name: props.local_name.clone(),
        rssi: props.rssi.unwrap_or(UNKNOWN_RSSI),
        service_ids: props.services.clone(),
    }
}

/// Flatten btleplug's discovered services into the domain GATT table.
#[must_use]
pub fn gatt_table(services: &BTreeSet<Service>) -> Vec<GattService> {
    services
        .iter()
        .map(|service| GattService {
            uuid: service.uuid,
            characteristics: service
                .characteristics
                .iter()
                .map(|characteristic| GattCharacteristic {
                    uuid: characteristic.uuid,
                    descriptors: characteristic
                        .descriptors
                        .iter()
                        .map(|descriptor| descriptor.uuid)
                        .collect(),
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use btleplug::api::{CharPropFlags, Characteristic, Descriptor};

    use blecentral_domain::capability::{CCCD, NUS_NOTIFY_CHAR, NUS_SERVICE, NUS_WRITE_CHAR};
    use blecentral_domain::gatt::find_service;

    use super::*;

    #[test]
    fn should_convert_bdaddr_to_address() {
        let addr = BDAddr::from([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(address(addr).to_string(), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn should_build_advertisement_from_properties() {
        let props = PeripheralProperties {
            address: BDAddr::from([1, 2, 3, 4, 5, 6]),
            local_name: Some("uart".to_string()),
            rssi: Some(-61),
            services: vec![NUS_SERVICE],
            ..PeripheralProperties::default()
        };

        let adv = advertisement(&props);
        assert_eq!(adv.address.to_string(), "01:02:03:04:05:06");
        assert_eq!(adv.name.as_deref(), Some("uart"));
        assert_eq!(adv.rssi, -61);
        assert_eq!(adv.service_ids, [NUS_SERVICE]);
    }

    #[test]
    fn should_mark_missing_rssi_as_unknown() {
        let adv = advertisement(&PeripheralProperties::default());
        assert_eq!(adv.rssi, UNKNOWN_RSSI);
    }

    #[test]
    fn should_keep_descriptors_in_gatt_table() {
        let notify = Characteristic {
            uuid: NUS_NOTIFY_CHAR,
            service_uuid: NUS_SERVICE,
            properties: CharPropFlags::NOTIFY,
            descriptors: BTreeSet::from([Descriptor {
                uuid: CCCD,
                service_uuid: NUS_SERVICE,
                characteristic_uuid: NUS_NOTIFY_CHAR,
            }]),
        };
        let write = Characteristic {
            uuid: NUS_WRITE_CHAR,
            service_uuid: NUS_SERVICE,
            properties: CharPropFlags::WRITE,
            descriptors: BTreeSet::new(),
        };
        let services = BTreeSet::from([Service {
            uuid: NUS_SERVICE,
            primary: true,
            characteristics: BTreeSet::from([notify, write]),
        }]);

        let table = gatt_table(&services);
        let service = find_service(&table, NUS_SERVICE).unwrap();
        assert!(service.characteristic(NUS_WRITE_CHAR).is_some());
        assert!(
            service
                .characteristic(NUS_NOTIFY_CHAR)
                .unwrap()
                .has_descriptor(CCCD)
        );
    }
}
