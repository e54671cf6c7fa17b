//! # blecentral-domain
//!
//! Pure domain model for the blecentral BLE central-role client.
//!
//! ## Responsibilities
//! - Foundational types: hardware addresses, error taxonomy, timestamps
//! - Define the **capability descriptor** (service, write and notify
//!   characteristics, notification-enable descriptor)
//! - Define **peripheral records** and the raw advertisements they are built from
//! - Define the **GATT table** shapes reported by a link after discovery
//! - Define the **session state** machine vocabulary and its legal transitions
//! - Define the **exchange framing** (greeting, echo with hex sequence prefix)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or radio crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod time;

pub mod address;
pub mod capability;
pub mod event;
pub mod exchange;
pub mod gatt;
pub mod peripheral;
pub mod session;
