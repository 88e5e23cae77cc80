//! # fusehub-adapter-mqtt
//!
//! MQTT adapter — one account's message-queue connection.
//!
//! ## Responsibilities
//! - Connect to the account's broker and subscribe to its device topic
//! - Decode every publish payload into an [`Envelope`]
//! - Hand envelopes to a [`MessageSink`] (the hub) on the connection's own task
//!
//! Reconnects are left to rumqttc's event loop; a failed poll is logged and
//! retried after a short pause.
//!
//! ## Dependency rule
//! Same as other adapters: depends on `fusehub-app` and `fusehub-domain`.

pub mod config;
pub mod error;

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::task::JoinHandle;

use fusehub_app::ports::MessageSink;
use fusehub_app::router::RouteOutcome;
use fusehub_domain::account::AccountSource;
use fusehub_domain::envelope::Envelope;

pub use config::MqttConfig;
pub use error::MqttError;

const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Decode one publish payload.
///
/// # Errors
///
/// Returns [`MqttError::PayloadParse`] when the payload is not a JSON envelope.
pub fn decode_envelope(payload: &[u8]) -> Result<Envelope, MqttError> {
    serde_json::from_slice(payload).map_err(MqttError::PayloadParse)
}

/// Decode `payload` and deliver it to `sink`. Undecodable payloads are
/// logged and skipped.
pub async fn forward<S: MessageSink>(
    source: AccountSource,
    payload: &[u8],
    sink: &S,
) -> Option<RouteOutcome> {
    match decode_envelope(payload) {
        Ok(envelope) => Some(sink.deliver(source, envelope).await),
        Err(err) => {
            tracing::warn!(source = %source, error = %err, "skipping undecodable message");
            None
        }
    }
}

/// Message-queue ingestion for one account.
pub struct MqttMessageSource {
    source: AccountSource,
    config: MqttConfig,
    client: Option<AsyncClient>,
    task: Option<JoinHandle<()>>,
}

impl MqttMessageSource {
    #[must_use]
    pub fn new(source: AccountSource, config: MqttConfig) -> Self {
        Self {
            source,
            config,
            client: None,
            task: None,
        }
    }

    #[must_use]
    pub fn source(&self) -> AccountSource {
        self.source
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Connect, subscribe and start delivering envelopes to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::Client`] if the subscription request cannot be queued.
    #[tracing::instrument(skip(self, sink), fields(source = %self.source, broker = %self.config.broker_host))]
    pub async fn start<S>(&mut self, sink: Arc<S>) -> Result<(), MqttError>
    where
        S: MessageSink + 'static,
    {
        let mut options = MqttOptions::new(
            self.config.client_id.clone(),
            self.config.broker_host.clone(),
            self.config.broker_port,
        );
        options.set_keep_alive(Duration::from_secs(u64::from(self.config.keep_alive_secs)));
        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            options.set_credentials(username.clone(), password.clone());
        }

        let (client, eventloop) = AsyncClient::new(options, self.config.channel_capacity.max(1));
        client
            .subscribe(self.config.topic.clone(), QoS::AtLeastOnce)
            .await
            .map_err(MqttError::Client)?;

        self.task = Some(tokio::spawn(run(self.source, eventloop, sink)));
        self.client = Some(client);
        tracing::info!(topic = %self.config.topic, "message source started");
        Ok(())
    }

    /// Disconnect and stop the delivery task.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::Client`] if the disconnect request cannot be queued.
    pub async fn stop(&mut self) -> Result<(), MqttError> {
        let disconnected = match self.client.take() {
            Some(client) => client.disconnect().await.map_err(MqttError::Client),
            None => Ok(()),
        };
        if let Some(task) = self.task.take() {
            task.abort();
        }
        tracing::info!(source = %self.source, "message source stopped");
        disconnected
    }
}

async fn run<S: MessageSink>(source: AccountSource, mut eventloop: EventLoop, sink: Arc<S>) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                tracing::trace!(source = %source, topic = ?publish.topic, "message received");
                forward(source, &publish.payload, sink.as_ref()).await;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(source = %source, error = %err, "message queue connection error");
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }
}
