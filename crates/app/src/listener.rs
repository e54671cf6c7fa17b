//! Caller-facing callbacks.
//!
//! A UI (or any other caller) implements these traits to be told about
//! scan results and session lifecycle. Callbacks run on the core's own
//! tasks; they must return quickly and must not block.

use blecentral_domain::error::{ConnectError, ScanFailure};
use blecentral_domain::peripheral::PeripheralRecord;

/// Receives the outcome of a scan.
pub trait ScanListener: Send + Sync {
    /// The registry changed; `peripherals` is the full ordered list.
    fn on_list_changed(&self, peripherals: &[PeripheralRecord]);

    /// The scan failed and is over.
    fn on_scan_failed(&self, failure: ScanFailure);
}

/// Receives the lifecycle of one connection session.
pub trait ConnectListener: Send + Sync {
    /// The session reached `Ready`.
    fn on_connected(&self, peripheral: &PeripheralRecord);

    /// The link went down. `manual` is `true` when the caller asked for it.
    fn on_disconnected(&self, peripheral: &PeripheralRecord, manual: bool);

    /// A text payload arrived from the peripheral.
    fn on_received(&self, peripheral: &PeripheralRecord, payload: &str);

    /// The connection could not be established (or re-established).
    fn on_connect_failed(&self, peripheral: &PeripheralRecord, error: &ConnectError);
}
