//! The virtual radio and the controls tests and demos use to script it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use blecentral_app::ports::{
    LinkEvent, LinkEventSink, LinkPrimitive, ScanEvent, ScanEventSink, ScanHandle, ScanPrimitive,
};
use blecentral_domain::address::Address;
use blecentral_domain::error::{ConnectError, ScanFailure};
use blecentral_domain::gatt::LinkState;
use blecentral_domain::peripheral::RawAdvertisement;

use crate::link::VirtualLink;
use crate::peripheral::{Faults, VirtualPeripheral};

/// Availability of the simulated host adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AdapterMode {
    #[default]
    Ready,
    Absent,
    Disabled,
}

pub(crate) struct LinkSlot {
    pub(crate) id: u64,
    pub(crate) sink: LinkEventSink,
    pub(crate) notifying: Vec<Uuid>,
}

#[derive(Default)]
pub(crate) struct RadioState {
    pub(crate) adapter: AdapterMode,
    pub(crate) peripherals: Vec<VirtualPeripheral>,
    pub(crate) scan_error: Option<i32>,
    pub(crate) scan_sink: Option<ScanEventSink>,
    pub(crate) scan_stops: usize,
    pub(crate) links: HashMap<Address, LinkSlot>,
    pub(crate) next_link_id: u64,
    pub(crate) link_opens: HashMap<Address, usize>,
    pub(crate) writes: HashMap<Address, Vec<(Uuid, Vec<u8>)>>,
}

impl RadioState {
    pub(crate) fn peripheral(&self, address: Address) -> Option<&VirtualPeripheral> {
        self.peripherals.iter().find(|p| p.address == address)
    }
}

pub(crate) type Shared = Arc<Mutex<RadioState>>;

pub(crate) fn lock(shared: &Shared) -> MutexGuard<'_, RadioState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process radio implementing both the scan and link ports.
///
/// Every request completes synchronously: a link reports `Connected` as
/// soon as it is opened, discovery and descriptor writes complete
/// immediately, according to each peripheral's [`Faults`].
#[derive(Clone, Default)]
pub struct VirtualRadio {
    shared: Shared,
}

impl VirtualRadio {
    #[must_use]
    pub fn new(peripherals: Vec<VirtualPeripheral>) -> Self {
        let radio = Self::default();
        lock(&radio.shared).peripherals = peripherals;
        radio
    }

    pub fn set_adapter(&self, mode: AdapterMode) {
        lock(&self.shared).adapter = mode;
    }

    /// Make the next scans fail with a platform error after reporting
    /// the known peripherals.
    pub fn set_scan_error(&self, code: Option<i32>) {
        lock(&self.shared).scan_error = code;
    }

    /// Add or replace a peripheral. A running scan reports it immediately.
    pub fn add_peripheral(&self, peripheral: VirtualPeripheral) {
        let mut state = lock(&self.shared);
        let adv = peripheral.advertisement();
        state.peripherals.retain(|p| p.address != peripheral.address);
        state.peripherals.push(peripheral);
        if let Some(sink) = &state.scan_sink {
            let _ = sink.send(ScanEvent::Result(adv));
        }
    }

    pub fn set_faults(&self, address: Address, faults: Faults) {
        let mut state = lock(&self.shared);
        if let Some(peripheral) = state.peripherals.iter_mut().find(|p| p.address == address) {
            peripheral.faults = faults;
        }
    }

    /// Deliver several advertisements at once to the running scan.
    pub fn advertise_batch(&self, batch: Vec<RawAdvertisement>) -> bool {
        lock(&self.shared)
            .scan_sink
            .as_ref()
            .is_some_and(|sink| sink.send(ScanEvent::Batch(batch)).is_ok())
    }

    /// Notify `value` on `characteristic` of the linked peripheral.
    ///
    /// Returns `false` when no link is up or notifications are not enabled.
    pub fn notify(&self, address: Address, characteristic: Uuid, value: &[u8]) -> bool {
        let state = lock(&self.shared);
        let Some(slot) = state.links.get(&address) else {
            return false;
        };
        slot.notifying.contains(&characteristic)
            && slot.sink.send(LinkEvent::Notification {
                characteristic,
                value: value.to_vec(),
            })
    }

    /// Drop the link as if the peripheral went out of range.
    pub fn drop_link(&self, address: Address) -> bool {
        let Some(slot) = lock(&self.shared).links.remove(&address) else {
            return false;
        };
        tracing::debug!(%address, "virtual link dropped");
        slot.sink
            .send(LinkEvent::StateChanged(LinkState::Disconnected))
    }

    #[must_use]
    pub fn is_linked(&self, address: Address) -> bool {
        lock(&self.shared).links.contains_key(&address)
    }

    /// Whether the linked peripheral has notifications enabled on `characteristic`.
    #[must_use]
    pub fn is_notifying(&self, address: Address, characteristic: Uuid) -> bool {
        lock(&self.shared)
            .links
            .get(&address)
            .is_some_and(|slot| slot.notifying.contains(&characteristic))
    }

    /// How many links were requested to `address`.
    #[must_use]
    pub fn link_opens(&self, address: Address) -> usize {
        lock(&self.shared)
            .link_opens
            .get(&address)
            .copied()
            .unwrap_or_default()
    }

    /// Values written to any characteristic of `address`, oldest first.
    #[must_use]
    pub fn writes(&self, address: Address) -> Vec<Vec<u8>> {
        lock(&self.shared)
            .writes
            .get(&address)
            .map(|writes| writes.iter().map(|(_, value)| value.clone()).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn scan_stops(&self) -> usize {
        lock(&self.shared).scan_stops
    }
}

/// Handle to a virtual scan.
pub struct VirtualScanHandle {
    shared: Shared,
    sink: ScanEventSink,
}

impl ScanHandle for VirtualScanHandle {
    fn stop(&self) {
        let mut state = lock(&self.shared);
        let current = state
            .scan_sink
            .as_ref()
            .is_some_and(|sink| sink.same_channel(&self.sink));
        if current {
            state.scan_sink = None;
            state.scan_stops += 1;
        }
    }
}

impl ScanPrimitive for VirtualRadio {
    type Handle = VirtualScanHandle;

    async fn begin_scan(&self, sink: ScanEventSink) -> Result<VirtualScanHandle, ScanFailure> {
        let mut state = lock(&self.shared);
        match state.adapter {
            AdapterMode::Absent => return Err(ScanFailure::NoAdapter),
            AdapterMode::Disabled => return Err(ScanFailure::AdapterDisabled),
            AdapterMode::Ready => {}
        }

        for peripheral in &state.peripherals {
            let _ = sink.send(ScanEvent::Result(peripheral.advertisement()));
        }
        if let Some(code) = state.scan_error {
            let _ = sink.send(ScanEvent::Error(code));
        }
        state.scan_sink = Some(sink.clone());

        Ok(VirtualScanHandle {
            shared: Arc::clone(&self.shared),
            sink,
        })
    }
}

impl LinkPrimitive for VirtualRadio {
    type Link = VirtualLink;

    fn open_link(&self, address: Address, sink: LinkEventSink) -> Result<VirtualLink, ConnectError> {
        let mut state = lock(&self.shared);
        *state.link_opens.entry(address).or_default() += 1;

        if state.adapter != AdapterMode::Ready {
            return Err(ConnectError::AdapterUnavailable);
        }
        let faults = state
            .peripheral(address)
            .ok_or(ConnectError::DeviceUnresolvable)?
            .faults;
        if faults.refuse_link {
            return Err(ConnectError::LinkOpenFailed);
        }

        state.next_link_id += 1;
        let id = state.next_link_id;
        if faults.drop_on_connect {
            sink.send(LinkEvent::StateChanged(LinkState::Disconnected));
        } else {
            sink.send(LinkEvent::StateChanged(LinkState::Connected));
            state.links.insert(
                address,
                LinkSlot {
                    id,
                    sink,
                    notifying: Vec::new(),
                },
            );
        }
        tracing::debug!(%address, id, "virtual link opened");

        Ok(VirtualLink::new(Arc::clone(&self.shared), address, id))
    }
}
