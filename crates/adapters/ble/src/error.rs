//! BLE adapter error types and their mapping onto the domain taxonomy.

use blecentral_domain::error::ScanFailure;

/// Errors specific to the BLE adapter.
#[derive(Debug, thiserror::Error)]
pub enum BleError {
    /// The platform BLE stack reported an error.
    #[error("BLE platform error")]
    Platform(#[from] btleplug::Error),

    /// The configured adapter index does not exist on this host.
    #[error("no BLE adapter at index {index} ({available} available)")]
    AdapterIndex { index: usize, available: usize },
}

/// Numeric code reported for a platform error.
///
/// btleplug errors carry no numeric status, so each kind gets a stable code.
#[must_use]
pub fn error_code(err: &btleplug::Error) -> i32 {
    use btleplug::Error;

    match err {
        Error::PermissionDenied => 1,
        Error::DeviceNotFound => 2,
        Error::NotConnected => 3,
        Error::UnexpectedCallback => 4,
        Error::UnexpectedCharacteristic => 5,
        Error::NoSuchCharacteristic => 6,
        Error::NotSupported(_) => 7,
        Error::TimedOut(_) => 8,
        _ => -1,
    }
}

/// Map a failure to start scanning onto a [`ScanFailure`].
#[must_use]
pub fn scan_failure(err: &btleplug::Error) -> ScanFailure {
    ScanFailure::Platform {
        code: error_code(err),
    }
}
