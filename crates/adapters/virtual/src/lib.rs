//! # blecentral-adapter-virtual
//!
//! Virtual radio that serves scripted peripherals in-process, for demos and
//! end-to-end tests that must run without Bluetooth hardware.
//!
//! ## Scripting
//!
//! | Control | Effect |
//! |---------|--------|
//! | [`VirtualRadio::set_adapter`] | Adapter present, absent or powered off |
//! | [`VirtualRadio::add_peripheral`] | Advertise a new peripheral to the running scan |
//! | [`VirtualRadio::set_scan_error`] | Abort later scans with a platform code |
//! | [`Faults`] | Refuse links, drop on connect, fail discovery or descriptor writes |
//! | [`VirtualRadio::notify`] | Push a notification over the open link |
//! | [`VirtualRadio::drop_link`] | Lose the link as if out of range |
//! | [`VirtualRadio::writes`] | Inspect what the central wrote |
//!
//! ## Dependency rule
//!
//! Depends on `blecentral-app` (port traits) and `blecentral-domain` only.

mod link;
mod peripheral;
mod radio;

pub use link::VirtualLink;
pub use peripheral::{Faults, VirtualPeripheral};
pub use radio::{AdapterMode, VirtualRadio, VirtualScanHandle};
