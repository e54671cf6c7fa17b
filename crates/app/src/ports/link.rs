//! Link port — one GATT connection to a peripheral.
//!
//! A link is opened against an address and reports everything that happens
//! on it through a [`LinkEventSink`]. The sink tags each event with the
//! generation of the session that opened the link, so the connection state
//! machine can drop events coming from a link it has already superseded.

use tokio::sync::mpsc;
use uuid::Uuid;

use blecentral_domain::address::Address;
use blecentral_domain::error::ConnectError;
use blecentral_domain::gatt::{GattService, GattStatus, LinkState};

/// An asynchronous result or indication reported by a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The physical link came up or went down.
    StateChanged(LinkState),
    /// Service discovery finished.
    ServicesDiscovered(GattStatus),
    /// A descriptor write finished.
    DescriptorWritten {
        characteristic: Uuid,
        descriptor: Uuid,
        status: GattStatus,
    },
    /// The peripheral notified a new characteristic value.
    Notification { characteristic: Uuid, value: Vec<u8> },
}

/// A [`LinkEvent`] tagged with the generation of the link that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEnvelope {
    pub generation: u64,
    pub event: LinkEvent,
}

/// Where a link pushes its events.
#[derive(Debug, Clone)]
pub struct LinkEventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<LinkEnvelope>,
}

impl LinkEventSink {
    /// Create a sink stamping events with `generation`.
    #[must_use]
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<LinkEnvelope>) -> Self {
        Self { generation, tx }
    }

    /// Generation this sink stamps onto events.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Push an event. Returns `false` once the receiving side is gone.
    pub fn send(&self, event: LinkEvent) -> bool {
        self.tx
            .send(LinkEnvelope {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// The platform refused to queue a link request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("link request rejected")]
pub struct RequestRejected;

/// An open GATT link.
///
/// Requests return as soon as they are queued; completion is reported on
/// the link's [`LinkEventSink`].
pub trait Link: Send + Sync {
    /// Request service discovery. Completion: [`LinkEvent::ServicesDiscovered`].
    fn discover_services(&self) -> Result<(), RequestRejected>;

    /// Services found by the last successful discovery.
    fn services(&self) -> Vec<GattService>;

    /// Enable or disable local delivery of notifications for a characteristic.
    fn set_notify(&self, characteristic: Uuid, enabled: bool) -> Result<(), RequestRejected>;

    /// Request a descriptor write. Completion: [`LinkEvent::DescriptorWritten`].
    fn write_descriptor(
        &self,
        characteristic: Uuid,
        descriptor: Uuid,
        value: &[u8],
    ) -> Result<(), RequestRejected>;

    /// Request a characteristic write.
    fn write_characteristic(&self, characteristic: Uuid, value: &[u8]) -> Result<(), RequestRejected>;

    /// Ask the platform to tear the link down. Completion:
    /// [`LinkEvent::StateChanged`] with [`LinkState::Disconnected`].
    fn disconnect(&self);

    /// Release the link. No events are reported afterwards.
    fn close(&self);
}

/// The platform link primitive.
///
/// Opening a link either fails fast (no adapter, unknown address, platform
/// refusal) or returns a link that will report
/// [`LinkState::Connected`] or [`LinkState::Disconnected`] on `sink`.
pub trait LinkPrimitive: Send + Sync {
    /// Link type produced by this primitive.
    type Link: Link + 'static;

    /// Start connecting to `address`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::AdapterUnavailable`],
    /// [`ConnectError::DeviceUnresolvable`], or [`ConnectError::LinkOpenFailed`].
    fn open_link(&self, address: Address, sink: LinkEventSink) -> Result<Self::Link, ConnectError>;
}
