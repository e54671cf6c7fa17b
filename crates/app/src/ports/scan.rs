//! Scan port — the platform primitive that reports advertisements.

use std::future::Future;

use tokio::sync::mpsc;

use blecentral_domain::error::ScanFailure;
use blecentral_domain::peripheral::RawAdvertisement;

/// A raw event produced by a running scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A single advertisement.
    Result(RawAdvertisement),
    /// Several advertisements delivered at once.
    Batch(Vec<RawAdvertisement>),
    /// The platform aborted the scan with an error code.
    Error(i32),
}

/// Where a scan primitive pushes its events.
pub type ScanEventSink = mpsc::UnboundedSender<ScanEvent>;

/// Handle to a running scan.
pub trait ScanHandle: Send + Sync {
    /// Stop the scan. Must be idempotent.
    fn stop(&self);
}

/// The platform scan primitive.
///
/// Implementations live in adapter crates (e.g. `adapter_ble`). Starting a
/// scan either fails immediately with a typed [`ScanFailure`] or returns a
/// handle; discoveries then flow into `sink` until the handle is stopped.
pub trait ScanPrimitive: Send + Sync {
    /// Handle returned for a started scan.
    type Handle: ScanHandle + 'static;

    /// Start an unbounded scan pushing events into `sink`.
    fn begin_scan(
        &self,
        sink: ScanEventSink,
    ) -> impl Future<Output = Result<Self::Handle, ScanFailure>> + Send;
}
