//! The synchronous core of the connection session.
//!
//! The machine never blocks and never awaits: it issues fire-and-forget
//! requests on the link and reacts to the [`LinkEvent`]s they eventually
//! produce. Delays it needs (reconnect backoff, setup deadline) are queued
//! as timers for the owning actor to arm.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use blecentral_domain::address::Address;
use blecentral_domain::capability::{CapabilityDescriptor, ENABLE_NOTIFICATION_VALUE};
use blecentral_domain::error::{ConnectError, ExchangeError};
use blecentral_domain::event::{Event, EventKind};
use blecentral_domain::gatt::{GattService, GattStatus, LinkState, find_service};
use blecentral_domain::peripheral::PeripheralRecord;
use blecentral_domain::session::{DisconnectKind, SessionState};

use super::SessionSettings;
use crate::exchange::Exchange;
use crate::listener::ConnectListener;
use crate::ports::{EventPublisher, Link, LinkEnvelope, LinkEvent, LinkEventSink, LinkPrimitive};
use crate::registry::PeripheralRegistry;

/// A delayed input to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wakeup {
    /// Backoff elapsed; reopen the link of session `generation`.
    Reconnect { generation: u64 },
    /// Setup of attempt `generation` took too long.
    SetupDeadline { generation: u64 },
}

struct Session<L> {
    target: PeripheralRecord,
    listener: Arc<dyn ConnectListener>,
    exchange: Exchange,
    link: Option<L>,
    generation: u64,
    manual_disconnect_requested: bool,
    reached_ready: bool,
    failed_attempts: u32,
}

impl<L: Link> Session<L> {
    fn release_link(&mut self) {
        if let Some(link) = self.link.take() {
            link.disconnect();
            link.close();
        }
    }
}

/// Owns at most one session and its link.
pub(crate) struct SessionMachine<P: LinkPrimitive> {
    primitive: P,
    capability: CapabilityDescriptor,
    settings: SessionSettings,
    registry: Arc<PeripheralRegistry>,
    publisher: Arc<dyn EventPublisher>,
    link_tx: mpsc::UnboundedSender<LinkEnvelope>,
    state_tx: watch::Sender<SessionState>,
    state: SessionState,
    next_generation: u64,
    timers: Vec<(Duration, Wakeup)>,
    session: Option<Session<P::Link>>,
}

impl<P: LinkPrimitive> SessionMachine<P> {
    pub(crate) fn new(
        primitive: P,
        capability: CapabilityDescriptor,
        settings: SessionSettings,
        registry: Arc<PeripheralRegistry>,
        publisher: Arc<dyn EventPublisher>,
        link_tx: mpsc::UnboundedSender<LinkEnvelope>,
        state_tx: watch::Sender<SessionState>,
    ) -> Self {
        Self {
            primitive,
            capability,
            settings,
            registry,
            publisher,
            link_tx,
            state_tx,
            state: SessionState::Idle,
            next_generation: 0,
            timers: Vec::new(),
            session: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    /// Timers queued since the last call.
    pub(crate) fn take_timers(&mut self) -> Vec<(Duration, Wakeup)> {
        std::mem::take(&mut self.timers)
    }

    /// Start a new session, tearing the current one down first.
    pub(crate) fn connect(&mut self, target: PeripheralRecord, listener: Arc<dyn ConnectListener>) {
        self.supersede();
        info!(address = %target.address, name = %target.display_name(), "connecting");
        self.session = Some(Session {
            target,
            listener,
            exchange: Exchange::new(self.settings.exchange.clone()),
            link: None,
            generation: 0,
            manual_disconnect_requested: false,
            reached_ready: false,
            failed_attempts: 0,
        });
        self.open();
    }

    /// Manual disconnect. No-op when nothing is connected.
    pub(crate) fn disconnect(&mut self) {
        let state = self.state;
        let Some(session) = self.session.as_mut() else {
            debug!("disconnect requested with no session");
            return;
        };
        let address = session.target.address;

        if state.is_active() {
            info!(%address, "manual disconnect requested");
            session.manual_disconnect_requested = true;
            if let Some(link) = &session.link {
                link.disconnect();
            }
        } else if state == SessionState::Disconnected(DisconnectKind::Lost) {
            info!(%address, "pending reconnect cancelled");
            self.session = None;
            self.transition(address, SessionState::Idle);
        }
    }

    /// Write an application payload while `Ready`.
    pub(crate) fn send(&self, text: &str) -> Result<(), ExchangeError> {
        if self.state != SessionState::Ready {
            return Err(ExchangeError::NotReady);
        }
        let link = self
            .session
            .as_ref()
            .and_then(|session| session.link.as_ref())
            .ok_or(ExchangeError::NotReady)?;
        link.write_characteristic(
            self.capability.write_characteristic,
            &Exchange::outbound(text),
        )
        .map_err(|_| ExchangeError::WriteRejected)
    }

    pub(crate) fn on_link_event(&mut self, envelope: LinkEnvelope) {
        let current = self
            .session
            .as_ref()
            .filter(|session| session.link.is_some())
            .map(|session| session.generation);
        if current != Some(envelope.generation) {
            debug!(generation = envelope.generation, event = ?envelope.event, "dropping stale link event");
            return;
        }

        match envelope.event {
            LinkEvent::StateChanged(LinkState::Connected) => self.on_link_up(),
            LinkEvent::StateChanged(LinkState::Disconnected) => self.on_link_down(),
            LinkEvent::ServicesDiscovered(status) => self.on_services_discovered(status),
            LinkEvent::DescriptorWritten {
                characteristic,
                descriptor,
                status,
            } => self.on_descriptor_written(characteristic, descriptor, status),
            LinkEvent::Notification {
                characteristic,
                value,
            } => self.on_notification(characteristic, &value),
        }
    }

    pub(crate) fn on_wakeup(&mut self, wakeup: Wakeup) {
        let current = self.session.as_ref().map(|session| session.generation);
        match wakeup {
            Wakeup::Reconnect { generation }
                if current == Some(generation)
                    && self.state == SessionState::Disconnected(DisconnectKind::Lost) =>
            {
                self.open();
            }
            Wakeup::SetupDeadline { generation }
                if current == Some(generation) && self.state.is_setup() =>
            {
                warn!(state = %self.state, "session setup timed out");
                self.fail_setup(ConnectError::SetupTimedOut);
            }
            _ => debug!(?wakeup, "ignoring stale wakeup"),
        }
    }

    /// Release the link without reporting anything. Used when the actor stops.
    pub(crate) fn shutdown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.release_link();
        }
    }

    fn supersede(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        let address = session.target.address;
        session.release_link();

        if self.state.is_active() {
            debug!(%address, "superseding current session");
            self.registry.set_connected(address, false);
            self.transition(address, SessionState::Disconnected(DisconnectKind::Intentional));
            session.target.connected = false;
            session.listener.on_disconnected(&session.target, true);
        }
    }

    fn open(&mut self) {
        self.next_generation += 1;
        let generation = self.next_generation;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let address = session.target.address;
        session.generation = generation;

        let sink = LinkEventSink::new(generation, self.link_tx.clone());
        match self.primitive.open_link(address, sink) {
            Ok(link) => {
                session.link = Some(link);
                self.transition(address, SessionState::Connecting);
                if let Some(timeout) = self.settings.setup_timeout {
                    self.timers
                        .push((timeout, Wakeup::SetupDeadline { generation }));
                }
            }
            Err(error) => {
                warn!(%address, %error, "failed to open link");
                if session.reached_ready {
                    self.retry_or_give_up();
                } else {
                    self.abandon(error);
                }
            }
        }
    }

    fn on_link_up(&mut self) {
        if self.state != SessionState::Connecting || self.disconnect_pending() {
            return;
        }
        let Some(address) = self.address() else {
            return;
        };
        self.transition(address, SessionState::DiscoveringServices);

        let started = self
            .link()
            .is_some_and(|link| link.discover_services().is_ok());
        if !started {
            self.fail_setup(ConnectError::DiscoveryNotStarted);
        }
    }

    fn on_services_discovered(&mut self, status: GattStatus) {
        if self.state != SessionState::DiscoveringServices || self.disconnect_pending() {
            return;
        }
        if !status.is_success() {
            self.fail_setup(ConnectError::ServiceDiscoveryFailed { status });
            return;
        }
        let Some(services) = self.link().map(Link::services) else {
            return;
        };
        if let Err(error) = check_capability(&self.capability, &services) {
            self.fail_setup(error);
            return;
        }
        let Some(address) = self.address() else {
            return;
        };
        self.transition(address, SessionState::Subscribing);

        let notify = self.capability.notify_characteristic;
        let descriptor = self.capability.notification_descriptor;
        let requested = self.link().is_some_and(|link| {
            link.set_notify(notify, true).is_ok()
                && link
                    .write_descriptor(notify, descriptor, &ENABLE_NOTIFICATION_VALUE)
                    .is_ok()
        });
        if !requested {
            self.fail_setup(ConnectError::SubscriptionFailed);
        }
    }

    fn on_descriptor_written(&mut self, characteristic: Uuid, descriptor: Uuid, status: GattStatus) {
        if self.state != SessionState::Subscribing
            || self.disconnect_pending()
            || characteristic != self.capability.notify_characteristic
            || descriptor != self.capability.notification_descriptor
        {
            return;
        }
        if status.is_success() {
            self.become_ready();
        } else {
            warn!(%status, "enabling notifications failed");
            self.fail_setup(ConnectError::SubscriptionFailed);
        }
    }

    fn become_ready(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.reached_ready = true;
        session.failed_attempts = 0;
        session.target.connected = true;
        let address = session.target.address;
        let target = session.target.clone();
        let listener = Arc::clone(&session.listener);
        let greeting = session.exchange.greeting();

        self.registry.set_connected(address, true);
        self.transition(address, SessionState::Ready);
        info!(%address, "session ready");
        listener.on_connected(&target);

        let write = self.capability.write_characteristic;
        if let Some(Err(error)) = self
            .link()
            .map(|link| link.write_characteristic(write, &greeting))
        {
            warn!(%address, %error, "greeting write rejected");
        }
    }

    fn on_notification(&mut self, characteristic: Uuid, value: &[u8]) {
        if self.state != SessionState::Ready {
            return;
        }
        if characteristic != self.capability.notify_characteristic {
            debug!(%characteristic, "ignoring notification on foreign characteristic");
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let inbound = session.exchange.receive(value);
        let address = session.target.address;
        debug!(%address, payload = %inbound.payload, seq = session.exchange.sequence(), "received");

        session.listener.on_received(&session.target, &inbound.payload);
        self.publisher.publish(Event::new(EventKind::Received {
            address,
            payload: inbound.payload,
        }));

        if let Some(echo) = inbound.echo {
            let write = self.capability.write_characteristic;
            if let Some(Err(error)) = self.link().map(|link| link.write_characteristic(write, &echo)) {
                warn!(%address, %error, "echo write rejected");
            }
        }
    }

    fn on_link_down(&mut self) {
        if !self.state.is_active() {
            return;
        }
        let was_ready = self.state == SessionState::Ready;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let manual = std::mem::take(&mut session.manual_disconnect_requested);
        if let Some(link) = session.link.take() {
            link.close();
        }
        session.target.connected = false;
        let address = session.target.address;
        let target = session.target.clone();
        let listener = Arc::clone(&session.listener);
        let reached_ready = session.reached_ready;

        self.registry.set_connected(address, false);
        let kind = DisconnectKind::from_manual_flag(manual);
        info!(%address, ?kind, "link down");
        self.transition(address, SessionState::Disconnected(kind));
        if was_ready || manual {
            listener.on_disconnected(&target, kind.is_manual());
        }

        if manual {
            self.session = None;
        } else if was_ready {
            self.open();
        } else if reached_ready {
            self.retry_or_give_up();
        } else {
            self.abandon(ConnectError::LinkLost);
        }
    }

    fn fail_setup(&mut self, error: ConnectError) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        warn!(address = %session.target.address, %error, "session setup failed");
        session.release_link();
        if session.reached_ready {
            self.retry_or_give_up();
        } else {
            self.abandon(error);
        }
    }

    fn retry_or_give_up(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.release_link();
        session.failed_attempts += 1;
        let attempts = session.failed_attempts;
        let generation = session.generation;
        let address = session.target.address;

        if self.settings.reconnect.is_exhausted(attempts) {
            warn!(%address, attempts, "giving up reconnecting");
            self.abandon(ConnectError::ReconnectExhausted { attempts });
            return;
        }

        let delay = self.settings.reconnect.delay_for(attempts);
        info!(%address, attempts, ?delay, "reconnect scheduled");
        self.transition(address, SessionState::Disconnected(DisconnectKind::Lost));
        self.timers.push((delay, Wakeup::Reconnect { generation }));
    }

    /// End the session and report `error` to the caller.
    fn abandon(&mut self, error: ConnectError) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.release_link();
        let address = session.target.address;
        self.transition(address, SessionState::Idle);
        session.listener.on_connect_failed(&session.target, &error);
        self.publisher
            .publish(Event::new(EventKind::ConnectFailed { address, error }));
    }

    fn transition(&mut self, address: Address, to: SessionState) {
        let from = self.state;
        if from == to {
            return;
        }
        debug_assert!(from.can_transition_to(to), "illegal transition {from} -> {to}");
        self.state = to;
        self.state_tx.send_replace(to);
        debug!(%address, %from, %to, "session state changed");
        self.publisher
            .publish(Event::new(EventKind::StateChanged { address, from, to }));
    }

    /// Setup stops advancing once the caller asked to disconnect; the session
    /// then only waits for the link to go down.
    fn disconnect_pending(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.manual_disconnect_requested)
    }

    fn address(&self) -> Option<Address> {
        self.session.as_ref().map(|session| session.target.address)
    }

    fn link(&self) -> Option<&P::Link> {
        self.session.as_ref().and_then(|session| session.link.as_ref())
    }
}

/// Verify a discovered table exposes everything the exchange needs.
fn check_capability(
    capability: &CapabilityDescriptor,
    services: &[GattService],
) -> Result<(), ConnectError> {
    let service = find_service(services, capability.service).ok_or(ConnectError::ServiceMissing)?;
    service
        .characteristic(capability.write_characteristic)
        .ok_or(ConnectError::CharacteristicMissing {
            uuid: capability.write_characteristic,
        })?;
    let notify = service
        .characteristic(capability.notify_characteristic)
        .ok_or(ConnectError::CharacteristicMissing {
            uuid: capability.notify_characteristic,
        })?;
    if notify.has_descriptor(capability.notification_descriptor) {
        Ok(())
    } else {
        Err(ConnectError::DescriptorMissing)
    }
}
