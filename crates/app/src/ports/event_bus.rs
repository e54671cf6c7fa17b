//! Event bus port — publish/subscribe for central events.

use blecentral_domain::event::Event;

/// Publishes events to interested subscribers.
///
/// Publishing never fails and never blocks: it is called from inside the
/// connection state machine.
pub trait EventPublisher: Send + Sync {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: Event);
}

impl<T: EventPublisher + ?Sized> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: Event) {
        (**self).publish(event);
    }
}
