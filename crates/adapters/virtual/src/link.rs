//! Virtual GATT link.

use std::sync::{Mutex, PoisonError};

use uuid::Uuid;

use blecentral_app::ports::{Link, LinkEvent, RequestRejected};
use blecentral_domain::address::Address;
use blecentral_domain::gatt::{GattService, GattStatus, LinkState};

use crate::radio::{LinkSlot, RadioState, Shared, lock};

/// A link to a [`VirtualPeripheral`](crate::VirtualPeripheral).
///
/// Completions are reported before the request call returns.
pub struct VirtualLink {
    shared: Shared,
    address: Address,
    id: u64,
    services: Mutex<Vec<GattService>>,
}

impl VirtualLink {
    pub(crate) fn new(shared: Shared, address: Address, id: u64) -> Self {
        Self {
            shared,
            address,
            id,
            services: Mutex::default(),
        }
    }

    fn with_slot<T>(
        &self,
        f: impl FnOnce(&mut RadioState, &mut LinkSlot) -> T,
    ) -> Result<T, RequestRejected> {
        let mut state = lock(&self.shared);
        let mut slot = match state.links.remove(&self.address) {
            Some(slot) if slot.id == self.id => slot,
            Some(other) => {
                state.links.insert(self.address, other);
                return Err(RequestRejected);
            }
            None => return Err(RequestRejected),
        };
        let result = f(&mut *state, &mut slot);
        state.links.insert(self.address, slot);
        Ok(result)
    }

    fn release(&self) -> Option<LinkSlot> {
        let mut state = lock(&self.shared);
        if state.links.get(&self.address)?.id != self.id {
            return None;
        }
        state.links.remove(&self.address)
    }
}

impl Link for VirtualLink {
    fn discover_services(&self) -> Result<(), RequestRejected> {
        let address = self.address;
        let found = self.with_slot(|state, slot| {
            let peripheral = state.peripheral(address);
            let failure = peripheral.and_then(|p| p.faults.discovery_status);
            let status = failure.map_or(GattStatus::Success, GattStatus::Failure);
            slot.sink.send(LinkEvent::ServicesDiscovered(status));
            match failure {
                Some(_) => None,
                None => Some(peripheral.map(|p| p.services.clone()).unwrap_or_default()),
            }
        })?;
        if let Some(services) = found {
            *self.services.lock().unwrap_or_else(PoisonError::into_inner) = services;
        }
        Ok(())
    }

    fn services(&self) -> Vec<GattService> {
        self.services
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_notify(&self, characteristic: Uuid, enabled: bool) -> Result<(), RequestRejected> {
        self.with_slot(|_, slot| {
            slot.notifying.retain(|uuid| *uuid != characteristic);
            if enabled {
                slot.notifying.push(characteristic);
            }
        })
    }

    fn write_descriptor(
        &self,
        characteristic: Uuid,
        descriptor: Uuid,
        _value: &[u8],
    ) -> Result<(), RequestRejected> {
        let address = self.address;
        self.with_slot(|state, slot| {
            let status = state
                .peripheral(address)
                .and_then(|p| p.faults.descriptor_status)
                .map_or(GattStatus::Success, GattStatus::Failure);
            slot.sink.send(LinkEvent::DescriptorWritten {
                characteristic,
                descriptor,
                status,
            });
        })
    }

    fn write_characteristic(&self, characteristic: Uuid, value: &[u8]) -> Result<(), RequestRejected> {
        let address = self.address;
        self.with_slot(|state, _| {
            tracing::trace!(%address, %characteristic, len = value.len(), "virtual write");
            state
                .writes
                .entry(address)
                .or_default()
                .push((characteristic, value.to_vec()));
        })
    }

    fn disconnect(&self) {
        if let Some(slot) = self.release() {
            slot.sink
                .send(LinkEvent::StateChanged(LinkState::Disconnected));
        }
    }

    fn close(&self) {
        if self.release().is_some() {
            tracing::debug!(address = %self.address, id = self.id, "virtual link closed");
        }
    }
}
