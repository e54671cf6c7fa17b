//! BLE scanner — forwards btleplug discoveries into the scan sink.

use std::pin::Pin;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicBool, Ordering};

use btleplug::api::{Central as _, CentralEvent, Peripheral as _};
use btleplug::platform::{Adapter, PeripheralId};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt as _};

use blecentral_app::ports::{ScanEvent, ScanEventSink, ScanHandle};
use blecentral_domain::peripheral::RawAdvertisement;

use crate::convert;
use crate::error::error_code;
use crate::radio::PeripheralCache;

pub(crate) type CentralEvents = Pin<Box<dyn Stream<Item = CentralEvent> + Send>>;

/// Handle to a running btleplug scan.
pub struct BleScanHandle {
    adapter: Adapter,
    forwarder: JoinHandle<()>,
    runtime: Handle,
    stopped: AtomicBool,
}

impl BleScanHandle {
    pub(crate) fn new(adapter: Adapter, forwarder: JoinHandle<()>, runtime: Handle) -> Self {
        Self {
            adapter,
            forwarder,
            runtime,
            stopped: AtomicBool::new(false),
        }
    }
}

impl ScanHandle for BleScanHandle {
    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.forwarder.abort();
        let adapter = self.adapter.clone();
        self.runtime.spawn(async move {
            if let Err(err) = adapter.stop_scan().await {
                tracing::warn!(%err, "failed to stop BLE scan");
            }
        });
    }
}

impl Drop for BleScanHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Report every discovered or updated peripheral until the sink closes.
pub(crate) async fn forward(
    adapter: Adapter,
    mut events: CentralEvents,
    sink: ScanEventSink,
    cache: PeripheralCache,
) {
    while let Some(event) = events.next().await {
        let id = match event {
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
            _ => continue,
        };
        let event = match advertisement(&adapter, &id, &cache).await {
            Ok(Some(adv)) => ScanEvent::Result(adv),
            Ok(None) => continue,
            Err(err) => {
                tracing::warn!(%err, "BLE scan failed while reading peripheral");
                ScanEvent::Error(error_code(&err))
            }
        };
        let fatal = matches!(event, ScanEvent::Error(_));
        if sink.send(event).is_err() || fatal {
            break;
        }
    }
    tracing::debug!("BLE scan forwarder finished");
}

async fn advertisement(
    adapter: &Adapter,
    id: &PeripheralId,
    cache: &PeripheralCache,
) -> Result<Option<RawAdvertisement>, btleplug::Error> {
    let peripheral = match adapter.peripheral(id).await {
        Ok(peripheral) => peripheral,
        Err(btleplug::Error::DeviceNotFound) => return Ok(None),
        Err(err) => return Err(err),
    };
    let Some(props) = peripheral.properties().await? else {
        return Ok(None);
    };

    let adv = convert::advertisement(&props);
    tracing::trace!(address = %adv.address, name = ?adv.name, rssi = adv.rssi, "BLE advertisement");
    cache
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(adv.address, peripheral);
    Ok(Some(adv))
}
