//! BLE radio configuration.

use serde::Deserialize;

/// Configuration for the btleplug-backed radio.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BleConfig {
    /// Index of the host adapter to use when several are present.
    pub adapter_index: usize,
    /// Ask the platform to only report advertisers of the primary service.
    ///
    /// Off by default: the registry keeps every advertiser and the caller
    /// filters with `can_connect`.
    pub filter_by_service: bool,
}
