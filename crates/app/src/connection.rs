//! Connection state machine and the actor that serialises access to it.
//!
//! Every input to a session (caller commands, link events, timer wakeups)
//! goes through one tokio task owning a [`SessionMachine`], so state
//! transitions are totally ordered no matter which context produced them.

mod machine;
mod reconnect;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use blecentral_domain::capability::CapabilityDescriptor;
use blecentral_domain::error::ExchangeError;
use blecentral_domain::peripheral::PeripheralRecord;
use blecentral_domain::session::SessionState;

use crate::exchange::ExchangeSettings;
use crate::listener::ConnectListener;
use crate::ports::{EventPublisher, LinkEnvelope, LinkPrimitive};
use crate::registry::PeripheralRegistry;

pub(crate) use machine::{SessionMachine, Wakeup};
pub use reconnect::ReconnectPolicy;

/// Tunables of a connection session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub exchange: ExchangeSettings,
    pub reconnect: ReconnectPolicy,
    /// Deadline for one attempt to go from `Connecting` to `Ready`.
    pub setup_timeout: Option<Duration>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            exchange: ExchangeSettings::default(),
            reconnect: ReconnectPolicy::default(),
            setup_timeout: Some(Duration::from_secs(30)),
        }
    }
}

enum Command {
    Connect {
        peripheral: PeripheralRecord,
        listener: Arc<dyn ConnectListener>,
    },
    Disconnect,
    Send {
        text: String,
        reply: oneshot::Sender<Result<(), ExchangeError>>,
    },
}

/// Cheap, cloneable handle to the connection actor.
#[derive(Clone)]
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SessionState>,
}

impl ConnectionHandle {
    /// Spawn the connection actor on the current tokio runtime.
    ///
    /// The actor stops once every handle has been dropped.
    pub fn spawn<P>(
        primitive: P,
        capability: CapabilityDescriptor,
        settings: SessionSettings,
        registry: Arc<PeripheralRegistry>,
        publisher: Arc<dyn EventPublisher>,
    ) -> (Self, JoinHandle<()>)
    where
        P: LinkPrimitive + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);

        let machine = SessionMachine::new(
            primitive, capability, settings, registry, publisher, link_tx, state_tx,
        );
        let task = tokio::spawn(run(machine, command_rx, link_rx));

        (
            Self {
                commands: command_tx,
                state: state_rx,
            },
            task,
        )
    }

    /// Start a session with `peripheral`, superseding any current one.
    pub fn connect(&self, peripheral: PeripheralRecord, listener: Arc<dyn ConnectListener>) {
        self.submit(Command::Connect {
            peripheral,
            listener,
        });
    }

    /// Request a manual disconnect of the current session.
    pub fn disconnect(&self) {
        self.submit(Command::Disconnect);
    }

    /// Write an application payload on the current session.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::NotReady`] when no session is `Ready` and
    /// [`ExchangeError::WriteRejected`] when the link refuses the write.
    pub async fn send(&self, text: &str) -> Result<(), ExchangeError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Send {
                text: text.to_string(),
                reply,
            })
            .map_err(|_| ExchangeError::NotReady)?;
        response.await.unwrap_or(Err(ExchangeError::NotReady))
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Receiver notified on every session state change.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    fn submit(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::warn!("connection actor is gone, command dropped");
        }
    }
}

async fn run<P: LinkPrimitive>(
    mut machine: SessionMachine<P>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut links: mpsc::UnboundedReceiver<LinkEnvelope>,
) {
    let (wake_tx, mut wakes) = mpsc::unbounded_channel::<Wakeup>();

    loop {
        tokio::select! {
            biased;
            command = commands.recv() => {
                let Some(command) = command else { break };
                match command {
                    Command::Connect { peripheral, listener } => machine.connect(peripheral, listener),
                    Command::Disconnect => machine.disconnect(),
                    Command::Send { text, reply } => {
                        let _ = reply.send(machine.send(&text));
                    }
                }
            }
            Some(envelope) = links.recv() => machine.on_link_event(envelope),
            Some(wakeup) = wakes.recv() => machine.on_wakeup(wakeup),
        }

        for (delay, wakeup) in machine.take_timers() {
            let wake_tx = wake_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = wake_tx.send(wakeup);
            });
        }
    }

    machine.shutdown();
    tracing::debug!("connection actor stopped");
}
