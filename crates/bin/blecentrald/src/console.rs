//! Listeners that report scan and session progress through `tracing`.

use tokio::sync::broadcast;

use blecentral_app::{ConnectListener, ScanListener};
use blecentral_domain::error::{ConnectError, ScanFailure};
use blecentral_domain::event::{Event, EventKind};
use blecentral_domain::peripheral::PeripheralRecord;

pub struct ScanLog;

impl ScanListener for ScanLog {
    fn on_list_changed(&self, peripherals: &[PeripheralRecord]) {
        tracing::debug!(count = peripherals.len(), "peripheral list changed");
    }

    fn on_scan_failed(&self, failure: ScanFailure) {
        tracing::error!(%failure, "scan failed");
    }
}

pub struct SessionLog;

impl ConnectListener for SessionLog {
    fn on_connected(&self, peripheral: &PeripheralRecord) {
        tracing::info!(address = %peripheral.address, name = %peripheral.display_name(), "connected");
    }

    fn on_disconnected(&self, peripheral: &PeripheralRecord, manual: bool) {
        if manual {
            tracing::info!(address = %peripheral.address, "disconnected");
        } else {
            tracing::warn!(address = %peripheral.address, "link lost, reconnecting");
        }
    }

    fn on_received(&self, peripheral: &PeripheralRecord, payload: &str) {
        tracing::info!(address = %peripheral.address, payload, "received");
    }

    fn on_connect_failed(&self, peripheral: &PeripheralRecord, error: &ConnectError) {
        tracing::error!(address = %peripheral.address, %error, "connection failed");
    }
}

/// Log session transitions until the bus closes.
pub async fn watch_events(mut events: broadcast::Receiver<Event>) {
    loop {
        match events.recv().await {
            Ok(Event {
                kind: EventKind::StateChanged { address, from, to },
                ..
            }) => tracing::debug!(%address, ?from, ?to, "session state"),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "event log lagging");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
