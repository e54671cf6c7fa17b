//! GATT link over btleplug.
//!
//! btleplug exposes async calls while the link port is fire-and-forget, so
//! every [`BleLink`] owns a worker task. Requests are queued to the worker
//! and executed in order; each completion is reported on the link's sink.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use btleplug::api::{
    Central as _, CentralEvent, CharPropFlags, Characteristic, Peripheral as _, WriteType,
};
use btleplug::platform::{Adapter, Peripheral};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_stream::StreamExt as _;
use uuid::Uuid;

use blecentral_app::ports::{Link, LinkEvent, LinkEventSink, RequestRejected};
use blecentral_domain::address::Address;
use blecentral_domain::capability::CCCD;
use blecentral_domain::gatt::{GattService, GattStatus, LinkState};

use crate::convert;
use crate::error::error_code;

#[derive(Debug)]
enum Request {
    DiscoverServices,
    SetNotify { characteristic: Uuid, enabled: bool },
    WriteDescriptor { characteristic: Uuid, descriptor: Uuid, value: Vec<u8> },
    WriteCharacteristic { characteristic: Uuid, value: Vec<u8> },
    Disconnect,
    Close,
}

/// An open link to one peripheral.
pub struct BleLink {
    requests: mpsc::UnboundedSender<Request>,
    services: Arc<Mutex<Vec<GattService>>>,
}

impl BleLink {
    pub(crate) fn spawn(
        runtime: &Handle,
        adapter: Adapter,
        peripheral: Peripheral,
        sink: LinkEventSink,
    ) -> Self {
        let (requests, queue) = mpsc::unbounded_channel();
        let services = Arc::<Mutex<Vec<GattService>>>::default();
        let worker = Worker {
            address: convert::address(peripheral.address()),
            adapter,
            peripheral,
            sink,
            services: Arc::clone(&services),
            notifying: HashSet::new(),
        };
        runtime.spawn(worker.run(queue));
        Self { requests, services }
    }

    fn submit(&self, request: Request) -> Result<(), RequestRejected> {
        self.requests.send(request).map_err(|_| RequestRejected)
    }
}

impl Link for BleLink {
    fn discover_services(&self) -> Result<(), RequestRejected> {
        self.submit(Request::DiscoverServices)
    }

    fn services(&self) -> Vec<GattService> {
        self.services
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_notify(&self, characteristic: Uuid, enabled: bool) -> Result<(), RequestRejected> {
        self.submit(Request::SetNotify {
            characteristic,
            enabled,
        })
    }

    fn write_descriptor(
        &self,
        characteristic: Uuid,
        descriptor: Uuid,
        value: &[u8],
    ) -> Result<(), RequestRejected> {
        self.submit(Request::WriteDescriptor {
            characteristic,
            descriptor,
            value: value.to_vec(),
        })
    }

    fn write_characteristic(&self, characteristic: Uuid, value: &[u8]) -> Result<(), RequestRejected> {
        self.submit(Request::WriteCharacteristic {
            characteristic,
            value: value.to_vec(),
        })
    }

    fn disconnect(&self) {
        let _ = self.submit(Request::Disconnect);
    }

    fn close(&self) {
        let _ = self.submit(Request::Close);
    }
}

struct Worker {
    address: Address,
    adapter: Adapter,
    peripheral: Peripheral,
    sink: LinkEventSink,
    services: Arc<Mutex<Vec<GattService>>>,
    notifying: HashSet<Uuid>,
}

impl Worker {
    async fn run(mut self, mut requests: mpsc::UnboundedReceiver<Request>) {
        let id = self.peripheral.id();
        let mut central_events = match self.adapter.events().await {
            Ok(events) => events,
            Err(err) => {
                tracing::warn!(address = %self.address, %err, "cannot watch adapter events");
                self.report(LinkEvent::StateChanged(LinkState::Disconnected));
                return;
            }
        };

        // Anything queued before the link is up aborts the attempt.
        let connected = tokio::select! {
            result = self.peripheral.connect() => result,
            request = requests.recv() => {
                if matches!(request, Some(Request::Disconnect)) {
                    self.report(LinkEvent::StateChanged(LinkState::Disconnected));
                }
                self.teardown().await;
                return;
            }
        };
        if let Err(err) = connected {
            tracing::warn!(address = %self.address, %err, "BLE connect failed");
            self.report(LinkEvent::StateChanged(LinkState::Disconnected));
            return;
        }

        let mut notifications = match self.peripheral.notifications().await {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!(address = %self.address, %err, "cannot open notification stream");
                self.teardown().await;
                self.report(LinkEvent::StateChanged(LinkState::Disconnected));
                return;
            }
        };
        tracing::info!(address = %self.address, "BLE link up");
        self.report(LinkEvent::StateChanged(LinkState::Connected));

        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    None | Some(Request::Close) => break,
                    Some(Request::Disconnect) => {
                        if let Err(err) = self.peripheral.disconnect().await {
                            tracing::warn!(address = %self.address, %err, "BLE disconnect failed");
                        }
                        self.report(LinkEvent::StateChanged(LinkState::Disconnected));
                        break;
                    }
                    Some(request) => self.handle(request).await,
                },
                Some(event) = central_events.next() => {
                    if matches!(event, CentralEvent::DeviceDisconnected(ref gone) if *gone == id) {
                        tracing::info!(address = %self.address, "BLE link lost");
                        self.report(LinkEvent::StateChanged(LinkState::Disconnected));
                        break;
                    }
                }
                Some(notification) = notifications.next() => {
                    if self.notifying.contains(&notification.uuid) {
                        self.report(LinkEvent::Notification {
                            characteristic: notification.uuid,
                            value: notification.value,
                        });
                    }
                }
            }
        }

        self.teardown().await;
    }

    async fn handle(&mut self, request: Request) {
        match request {
            Request::DiscoverServices => {
                let status = match self.peripheral.discover_services().await {
                    Ok(()) => {
                        let table = convert::gatt_table(&self.peripheral.services());
                        *self.services.lock().unwrap_or_else(PoisonError::into_inner) = table;
                        GattStatus::Success
                    }
                    Err(err) => {
                        tracing::warn!(address = %self.address, %err, "service discovery failed");
                        GattStatus::Failure(error_code(&err))
                    }
                };
                self.report(LinkEvent::ServicesDiscovered(status));
            }
            Request::SetNotify {
                characteristic,
                enabled,
            } => {
                if enabled {
                    self.notifying.insert(characteristic);
                } else {
                    self.notifying.remove(&characteristic);
                }
            }
            Request::WriteDescriptor {
                characteristic,
                descriptor,
                value,
            } => {
                let status = match self.write_descriptor(characteristic, descriptor, &value).await {
                    Ok(()) => GattStatus::Success,
                    Err(err) => {
                        tracing::warn!(address = %self.address, %err, %descriptor, "descriptor write failed");
                        GattStatus::Failure(error_code(&err))
                    }
                };
                self.report(LinkEvent::DescriptorWritten {
                    characteristic,
                    descriptor,
                    status,
                });
            }
            Request::WriteCharacteristic {
                characteristic,
                value,
            } => {
                if let Err(err) = self.write_characteristic(characteristic, &value).await {
                    tracing::warn!(address = %self.address, %err, %characteristic, "characteristic write failed");
                }
            }
            Request::Disconnect | Request::Close => {}
        }
    }

    async fn write_descriptor(
        &self,
        characteristic: Uuid,
        descriptor: Uuid,
        value: &[u8],
    ) -> Result<(), btleplug::Error> {
        let characteristic = self.characteristic(characteristic)?;
        if descriptor == CCCD {
            // Platforms own the CCCD; btleplug writes it through (un)subscribe.
            return if value.first().is_some_and(|flags| flags & 0b11 != 0) {
                self.peripheral.subscribe(&characteristic).await
            } else {
                self.peripheral.unsubscribe(&characteristic).await
            };
        }
        let descriptor = characteristic
            .descriptors
            .iter()
            .find(|d| d.uuid == descriptor)
            .ok_or(btleplug::Error::NoSuchCharacteristic)?;
        self.peripheral.write_descriptor(descriptor, value).await
    }

    async fn write_characteristic(&self, characteristic: Uuid, value: &[u8]) -> Result<(), btleplug::Error> {
        let characteristic = self.characteristic(characteristic)?;
        self.peripheral
            .write(&characteristic, value, write_type(characteristic.properties))
            .await
    }

    fn characteristic(&self, uuid: Uuid) -> Result<Characteristic, btleplug::Error> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or(btleplug::Error::NoSuchCharacteristic)
    }

    fn report(&self, event: LinkEvent) {
        if !self.sink.send(event) {
            tracing::debug!(address = %self.address, "session gone, link event dropped");
        }
    }

    async fn teardown(&self) {
        let connected = self.peripheral.is_connected().await.unwrap_or(false);
        if connected && let Err(err) = self.peripheral.disconnect().await {
            tracing::debug!(address = %self.address, %err, "BLE disconnect on close failed");
        }
        tracing::debug!(address = %self.address, "BLE link closed");
    }
}

/// Prefer acknowledged writes; fall back to write-without-response when
/// that is all the characteristic supports.
fn write_type(properties: CharPropFlags) -> WriteType {
    if properties.contains(CharPropFlags::WRITE) || !properties.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE) {
        WriteType::WithResponse
    } else {
        WriteType::WithoutResponse
    }
}
