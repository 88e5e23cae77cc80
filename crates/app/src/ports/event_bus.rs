//! Event bus port — publish/subscribe for platform notifications.

use std::future::Future;

use fusehub_domain::error::FuseHubError;
use fusehub_domain::event::Event;

/// Publishes events to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), FuseHubError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), FuseHubError>> + Send {
        (**self).publish(event)
    }
}
