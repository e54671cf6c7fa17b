//! # blecentral-adapter-ble
//!
//! Host radio adapter — implements the scan and link ports of
//! `blecentral-app` on top of [`btleplug`].
//!
//! ## How it works
//!
//! | Port | btleplug |
//! |------|----------|
//! | `begin_scan` | `Central::start_scan`, forwarding `DeviceDiscovered` / `DeviceUpdated` |
//! | `ScanHandle::stop` | `Central::stop_scan` |
//! | `open_link` | resolves the address in the scan cache, then `Peripheral::connect` on a worker task |
//! | `discover_services` | `Peripheral::discover_services` |
//! | descriptor write on the CCCD | `Peripheral::subscribe` / `unsubscribe` |
//! | `write_characteristic` | `Peripheral::write` |
//! | link loss | `CentralEvent::DeviceDisconnected` |
//!
//! Peripherals can only be connected after a scan has reported them, since
//! btleplug hands out peripheral handles per adapter session.
//!
//! ## Dependency rule
//!
//! Same as other adapters: depends on `blecentral-app` and `blecentral-domain`.

mod config;
mod convert;
mod error;
mod link;
mod radio;
mod scanner;

pub use config::BleConfig;
pub use error::BleError;
pub use link::BleLink;
pub use radio::BleRadio;
pub use scanner::BleScanHandle;
