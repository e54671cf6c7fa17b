//! Scan session controller — runs the platform scan and feeds the registry.
//!
//! At most one scan runs at a time. Starting a scan stops the previous one
//! and clears the registry; platform failures end the scan and are never
//! retried here.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use blecentral_domain::error::ScanFailure;
use blecentral_domain::event::{Event, EventKind};
use blecentral_domain::peripheral::RawAdvertisement;

use crate::listener::ScanListener;
use crate::ports::{EventPublisher, ScanEvent, ScanHandle, ScanPrimitive};
use crate::registry::{PeripheralRegistry, Upsert};

struct ActiveScan<H> {
    handle: Arc<H>,
    pump: JoinHandle<()>,
}

impl<H: ScanHandle> ActiveScan<H> {
    fn stop(self) {
        self.handle.stop();
        self.pump.abort();
    }
}

struct Slot<H> {
    /// Bumped by every start and stop; a start only installs its scan if
    /// nothing bumped it while the platform was starting.
    epoch: u64,
    active: Option<ActiveScan<H>>,
}

/// Drives a [`ScanPrimitive`] and keeps the [`PeripheralRegistry`] current.
pub struct ScanController<S: ScanPrimitive> {
    primitive: S,
    registry: Arc<PeripheralRegistry>,
    publisher: Arc<dyn EventPublisher>,
    slot: Mutex<Slot<S::Handle>>,
}

impl<S: ScanPrimitive> ScanController<S> {
    pub fn new(
        primitive: S,
        registry: Arc<PeripheralRegistry>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            primitive,
            registry,
            publisher,
            slot: Mutex::new(Slot {
                epoch: 0,
                active: None,
            }),
        }
    }

    /// Stop the running scan and invalidate any start still in flight.
    fn cancel(&self) -> u64 {
        let (epoch, active) = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            slot.epoch += 1;
            (slot.epoch, slot.active.take())
        };
        if let Some(active) = active {
            info!("scan stopped");
            active.stop();
        }
        epoch
    }

    /// Start a fresh scan.
    ///
    /// Discoveries are reported to `listener` as full list snapshots until
    /// [`stop_scan`](Self::stop_scan) is called or the platform aborts.
    ///
    /// # Errors
    ///
    /// Returns the [`ScanFailure`] when the platform refuses to start; the
    /// listener has already been told.
    #[tracing::instrument(skip_all)]
    pub async fn scan(&self, listener: Arc<dyn ScanListener>) -> Result<(), ScanFailure> {
        let epoch = self.cancel();
        self.registry.clear();

        let (sink, events) = mpsc::unbounded_channel();
        let handle = match self.primitive.begin_scan(sink).await {
            Ok(handle) => Arc::new(handle),
            Err(failure) => {
                warn!(%failure, "scan could not start");
                listener.on_scan_failed(failure);
                self.publisher
                    .publish(Event::new(EventKind::ScanFailed(failure)));
                return Err(failure);
            }
        };

        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.epoch != epoch {
            drop(slot);
            debug!("scan cancelled while starting");
            handle.stop();
            return Ok(());
        }
        info!("scan started");
        let pump = tokio::spawn(pump(
            events,
            Arc::clone(&handle),
            Arc::clone(&self.registry),
            Arc::clone(&self.publisher),
            listener,
        ));
        slot.active = Some(ActiveScan { handle, pump });
        Ok(())
    }

    /// Stop the running scan, if any. Idempotent.
    ///
    /// A scan still starting when this is called is stopped as soon as the
    /// platform hands it over.
    pub fn stop_scan(&self) {
        self.cancel();
    }

    /// Whether a scan is currently delivering results.
    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .active
            .as_ref()
            .is_some_and(|active| !active.pump.is_finished())
    }
}

async fn pump<H: ScanHandle>(
    mut events: mpsc::UnboundedReceiver<ScanEvent>,
    handle: Arc<H>,
    registry: Arc<PeripheralRegistry>,
    publisher: Arc<dyn EventPublisher>,
    listener: Arc<dyn ScanListener>,
) {
    while let Some(event) = events.recv().await {
        match event {
            ScanEvent::Result(adv) => record(&registry, &*publisher, &*listener, adv),
            ScanEvent::Batch(batch) => {
                for adv in batch {
                    record(&registry, &*publisher, &*listener, adv);
                }
            }
            ScanEvent::Error(code) => {
                handle.stop();
                let failure = ScanFailure::Platform { code };
                warn!(code, "scan aborted by platform");
                listener.on_scan_failed(failure);
                publisher.publish(Event::new(EventKind::ScanFailed(failure)));
                break;
            }
        }
    }
}

fn record(
    registry: &PeripheralRegistry,
    publisher: &dyn EventPublisher,
    listener: &dyn ScanListener,
    adv: RawAdvertisement,
) {
    let address = adv.address;
    let (outcome, list) = registry.upsert(adv);
    if outcome == Upsert::Inserted {
        debug!(%address, total = list.len(), "peripheral discovered");
    }
    listener.on_list_changed(&list);
    publisher.publish(Event::new(EventKind::ListChanged { count: list.len() }));
}
