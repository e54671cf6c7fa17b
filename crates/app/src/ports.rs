//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the radio.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.
//!
//! Every platform interaction is a fire-and-forget request; results come
//! back as events pushed into a sink handed over when the scan or link is
//! opened.

pub mod capability;
pub mod event_bus;
pub mod link;
pub mod scan;

pub use capability::CapabilitySource;
pub use event_bus::EventPublisher;
pub use link::{Link, LinkEnvelope, LinkEvent, LinkEventSink, LinkPrimitive, RequestRejected};
pub use scan::{ScanEvent, ScanEventSink, ScanHandle, ScanPrimitive};
