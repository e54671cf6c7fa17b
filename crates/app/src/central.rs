//! Central — the surface a caller (UI, daemon, test) drives.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use blecentral_domain::capability::CapabilityDescriptor;
use blecentral_domain::error::CentralError;
use blecentral_domain::event::Event;
use blecentral_domain::peripheral::PeripheralRecord;
use blecentral_domain::session::SessionState;

use crate::connection::{ConnectionHandle, SessionSettings};
use crate::event_bus::InProcessEventBus;
use crate::listener::{ConnectListener, ScanListener};
use crate::ports::{CapabilitySource, EventPublisher, LinkPrimitive, ScanPrimitive};
use crate::registry::PeripheralRegistry;
use crate::scan_controller::ScanController;

const EVENT_BUS_CAPACITY: usize = 256;

/// A BLE central speaking the write/notify exchange with one peripheral at a time.
pub struct Central<S: ScanPrimitive> {
    capability: CapabilityDescriptor,
    registry: Arc<PeripheralRegistry>,
    bus: InProcessEventBus,
    scanner: ScanController<S>,
    connection: ConnectionHandle,
}

impl<S: ScanPrimitive> Central<S> {
    /// Wire a central on the current tokio runtime.
    ///
    /// The capability is read once here and fixed for the central's lifetime.
    pub fn new<P>(
        scan: S,
        link: P,
        capability: &impl CapabilitySource,
        settings: SessionSettings,
    ) -> Self
    where
        P: LinkPrimitive + 'static,
    {
        let capability = capability.capability();
        let registry = Arc::new(PeripheralRegistry::new());
        let bus = InProcessEventBus::new(EVENT_BUS_CAPACITY);
        let publisher: Arc<dyn EventPublisher> = Arc::new(bus.clone());

        let scanner = ScanController::new(scan, Arc::clone(&registry), Arc::clone(&publisher));
        let (connection, _actor) = ConnectionHandle::spawn(
            link,
            capability,
            settings,
            Arc::clone(&registry),
            publisher,
        );

        Self {
            capability,
            registry,
            bus,
            scanner,
            connection,
        }
    }

    /// Clear the list and start scanning.
    ///
    /// # Errors
    ///
    /// Returns [`CentralError::Scan`] when the scan cannot start.
    pub async fn scan(&self, listener: Arc<dyn ScanListener>) -> Result<(), CentralError> {
        self.scanner.scan(listener).await?;
        Ok(())
    }

    pub fn stop_scan(&self) {
        self.scanner.stop_scan();
    }

    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.scanner.is_scanning()
    }

    /// Whether `peripheral` advertises the configured primary service.
    #[must_use]
    pub fn can_connect(&self, peripheral: &PeripheralRecord) -> bool {
        peripheral.is_connectable(&self.capability)
    }

    /// Connect to `peripheral`, superseding any current session.
    ///
    /// The outcome is reported on `listener`.
    #[tracing::instrument(skip_all, fields(address = %peripheral.address))]
    pub fn connect(&self, peripheral: PeripheralRecord, listener: Arc<dyn ConnectListener>) {
        self.connection.connect(peripheral, listener);
    }

    /// Manually disconnect the current session. No automatic reconnect follows.
    pub fn disconnect(&self) {
        self.connection.disconnect();
    }

    /// Write an application payload on the `Ready` session.
    ///
    /// # Errors
    ///
    /// Returns [`CentralError::Exchange`], see [`ConnectionHandle::send`].
    pub async fn send(&self, text: &str) -> Result<(), CentralError> {
        self.connection.send(text).await?;
        Ok(())
    }

    /// Stop scanning and manually disconnect.
    pub fn stop(&self) {
        tracing::info!("stopping central");
        self.stop_scan();
        self.disconnect();
    }

    /// Snapshot of discovered peripherals in discovery order.
    #[must_use]
    pub fn peripherals(&self) -> Vec<PeripheralRecord> {
        self.registry.snapshot()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.connection.state()
    }

    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.connection.state_changes()
    }

    /// Receive every [`Event`] published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    #[must_use]
    pub fn capability(&self) -> CapabilityDescriptor {
        self.capability
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use blecentral_domain::address::Address;
    use blecentral_domain::capability::{CCCD, NUS_NOTIFY_CHAR, NUS_SERVICE, NUS_WRITE_CHAR};
    use blecentral_domain::error::{ConnectError, ExchangeError, ScanFailure};
    use blecentral_domain::event::EventKind;
    use blecentral_domain::gatt::{GattCharacteristic, GattService, GattStatus, LinkState};
    use blecentral_domain::peripheral::RawAdvertisement;
    use blecentral_domain::session::DisconnectKind;
    use uuid::Uuid;

    use super::*;
    use crate::ports::{
        Link, LinkEvent, LinkEventSink, RequestRejected, ScanEventSink, ScanHandle,
    };

    struct IdleHandle;

    impl ScanHandle for IdleHandle {
        fn stop(&self) {}
    }

    struct IdleScanner;

    impl ScanPrimitive for IdleScanner {
        type Handle = IdleHandle;

        async fn begin_scan(&self, _sink: ScanEventSink) -> Result<IdleHandle, ScanFailure> {
            Ok(IdleHandle)
        }
    }

    /// Link that completes every request immediately and successfully.
    struct EagerLink {
        sink: LinkEventSink,
        writes: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl Link for EagerLink {
        fn discover_services(&self) -> Result<(), RequestRejected> {
            self.sink
                .send(LinkEvent::ServicesDiscovered(GattStatus::Success));
            Ok(())
        }

        fn services(&self) -> Vec<GattService> {
            vec![GattService {
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
            }]
        }

        fn set_notify(&self, _characteristic: Uuid, _enabled: bool) -> Result<(), RequestRejected> {
            Ok(())
        }

        fn write_descriptor(
            &self,
            characteristic: Uuid,
            descriptor: Uuid,
            _value: &[u8],
        ) -> Result<(), RequestRejected> {
            self.sink.send(LinkEvent::DescriptorWritten {
                characteristic,
                descriptor,
                status: GattStatus::Success,
            });
            Ok(())
        }

        fn write_characteristic(&self, _characteristic: Uuid, value: &[u8]) -> Result<(), RequestRejected> {
            self.writes.lock().unwrap().push(value.to_vec());
            Ok(())
        }

        fn disconnect(&self) {
            self.sink
                .send(LinkEvent::StateChanged(LinkState::Disconnected));
        }

        fn close(&self) {}
    }

    #[derive(Default)]
    struct EagerPrimitive {
        writes: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl LinkPrimitive for EagerPrimitive {
        type Link = EagerLink;

        fn open_link(&self, _address: Address, sink: LinkEventSink) -> Result<EagerLink, ConnectError> {
            sink.send(LinkEvent::StateChanged(LinkState::Connected));
            Ok(EagerLink {
                sink,
                writes: Arc::clone(&self.writes),
            })
        }
    }

    struct SilentListener;

    impl ConnectListener for SilentListener {
        fn on_connected(&self, _peripheral: &PeripheralRecord) {}
        fn on_disconnected(&self, _peripheral: &PeripheralRecord, _manual: bool) {}
        fn on_received(&self, _peripheral: &PeripheralRecord, _payload: &str) {}
        fn on_connect_failed(&self, _peripheral: &PeripheralRecord, _error: &ConnectError) {}
    }

    fn record(service_ids: Vec<Uuid>) -> PeripheralRecord {
        PeripheralRecord::from_advertisement(RawAdvertisement {
            address: "AA:BB:CC:DD:EE:FF".parse().unwrap(),
            name: None,
            rssi: -60,
            service_ids,
        })
    }

    fn central() -> (Central<IdleScanner>, Arc<Mutex<Vec<Vec<u8>>>>) {
        let primitive = EagerPrimitive::default();
        let writes = Arc::clone(&primitive.writes);
        let central = Central::new(
            IdleScanner,
            primitive,
            &CapabilityDescriptor::default(),
            SessionSettings::default(),
        );
        (central, writes)
    }

    #[tokio::test]
    async fn should_only_connect_to_peripherals_advertising_service() {
        let (central, _) = central();
        assert!(central.can_connect(&record(vec![NUS_SERVICE])));
        assert!(!central.can_connect(&record(vec![])));
    }

    #[tokio::test]
    async fn should_reach_ready_and_send_through_actor() {
        let (central, writes) = central();
        let mut events = central.subscribe();
        let mut states = central.state_changes();

        central.connect(record(vec![NUS_SERVICE]), Arc::new(SilentListener));
        tokio::time::timeout(
            Duration::from_secs(1),
            states.wait_for(|state| *state == SessionState::Ready),
        )
        .await
        .unwrap()
        .unwrap();

        central.send("hello").await.unwrap();
        assert_eq!(
            *writes.lock().unwrap(),
            [b"Ready\0".to_vec(), b"hello".to_vec()]
        );

        let first = events.recv().await.unwrap();
        assert!(matches!(
            first.kind,
            EventKind::StateChanged {
                to: SessionState::Connecting,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn should_refuse_send_when_idle() {
        let (central, _) = central();
        assert!(matches!(
            central.send("x").await,
            Err(CentralError::Exchange(ExchangeError::NotReady))
        ));
    }

    #[tokio::test]
    async fn should_stop_into_intentional_disconnect() {
        let (central, _) = central();
        let mut states = central.state_changes();
        central.connect(record(vec![NUS_SERVICE]), Arc::new(SilentListener));
        states
            .wait_for(|state| *state == SessionState::Ready)
            .await
            .unwrap();

        central.stop();
        states
            .wait_for(|state| *state == SessionState::Disconnected(DisconnectKind::Intentional))
            .await
            .unwrap();
        assert!(!central.is_scanning());
    }
}
