//! # blecentral-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that radio adapters implement:
//!   - `ScanPrimitive` / `ScanHandle` — start and stop advertisement scans
//!   - `LinkPrimitive` / `Link` — open a GATT link and issue requests on it
//!   - `CapabilitySource` — the service/characteristic identifiers to talk to
//!   - `EventPublisher` — observe what the central does
//! - Own the **peripheral registry** and the **scan controller** feeding it
//! - Run the **connection state machine** as a single actor task, including
//!   the bounded reconnect policy and the echo exchange protocol
//! - Expose everything to callers through [`Central`]
//!
//! ## Dependency rule
//! Depends on `blecentral-domain` only (plus `tokio` for channels and tasks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod central;
pub mod connection;
pub mod event_bus;
pub mod exchange;
pub mod listener;
pub mod ports;
pub mod registry;
pub mod scan_controller;

pub use central::Central;
pub use connection::{ConnectionHandle, ReconnectPolicy, SessionSettings};
pub use exchange::ExchangeSettings;
pub use listener::{ConnectListener, ScanListener};
