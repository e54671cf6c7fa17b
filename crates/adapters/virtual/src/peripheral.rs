//! Scripted peripherals.

use uuid::Uuid;

use blecentral_domain::address::Address;
use blecentral_domain::capability::{CCCD, NUS_NOTIFY_CHAR, NUS_SERVICE, NUS_WRITE_CHAR};
use blecentral_domain::gatt::{GattCharacteristic, GattService};
use blecentral_domain::peripheral::RawAdvertisement;

/// Ways a virtual peripheral can misbehave.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Faults {
    /// The platform refuses to open a link.
    pub refuse_link: bool,
    /// The link opens but drops before coming up.
    pub drop_on_connect: bool,
    /// Service discovery completes with this failure status.
    pub discovery_status: Option<i32>,
    /// Descriptor writes complete with this failure status.
    pub descriptor_status: Option<i32>,
}

/// A simulated peripheral: what it advertises and the GATT table it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualPeripheral {
    pub address: Address,
    pub name: Option<String>,
    pub rssi: i16,
    pub advertised: Vec<Uuid>,
    pub services: Vec<GattService>,
    pub faults: Faults,
}

impl VirtualPeripheral {
    /// A peripheral advertising nothing and serving an empty table.
    #[must_use]
    pub fn new(address: Address) -> Self {
        Self {
            address,
            name: None,
            rssi: -70,
            advertised: Vec::new(),
            services: Vec::new(),
            faults: Faults::default(),
        }
    }

    /// A peripheral exposing the Nordic UART service.
    #[must_use]
    pub fn uart(address: Address, name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            rssi: -55,
            advertised: vec![NUS_SERVICE],
            services: vec![GattService {
                uuid: NUS_SERVICE,
                characteristics: vec![
                    GattCharacteristic {
                        uuid: NUS_WRITE_CHAR,
                        descriptors: vec![],
                    },
                    GattCharacteristic {
                        uuid: NUS_NOTIFY_CHAR,
                        descriptors: vec![CCCD],
                    },
                ],
            }],
            ..Self::new(address)
        }
    }

    #[must_use]
    pub fn with_rssi(mut self, rssi: i16) -> Self {
        self.rssi = rssi;
        self
    }

    #[must_use]
    pub fn with_faults(mut self, faults: Faults) -> Self {
        self.faults = faults;
        self
    }

    /// Drop a characteristic from every served service.
    #[must_use]
    pub fn without_characteristic(mut self, uuid: Uuid) -> Self {
        for service in &mut self.services {
            service.characteristics.retain(|c| c.uuid != uuid);
        }
        self
    }

    /// The advertisement this peripheral broadcasts.
    #[must_use]
    pub fn advertisement(&self) -> RawAdvertisement {
        RawAdvertisement {
            address: self.address,
            name: self.name.clone(),
            rssi: self.rssi,
            service_ids: self.advertised.clone(),
        }
    }
}
