//! Message sink port — how ingestion adapters hand envelopes to the hub.

use std::future::Future;

use fusehub_domain::account::AccountSource;
use fusehub_domain::envelope::Envelope;

use crate::router::RouteOutcome;

/// Accepts decoded envelopes from one account's message queue.
pub trait MessageSink: Send + Sync {
    /// Route one envelope received on `source`'s connection.
    fn deliver(
        &self,
        source: AccountSource,
        envelope: Envelope,
    ) -> impl Future<Output = RouteOutcome> + Send;
}

impl<T: MessageSink> MessageSink for std::sync::Arc<T> {
    fn deliver(
        &self,
        source: AccountSource,
        envelope: Envelope,
    ) -> impl Future<Output = RouteOutcome> + Send {
        (**self).deliver(source, envelope)
    }
}
