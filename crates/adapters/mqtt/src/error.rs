//! MQTT adapter error types.

use fusehub_domain::error::FuseHubError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The rumqttc client returned an error.
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),

    /// Failed to parse an incoming MQTT payload as an envelope.
    #[error("failed to parse MQTT payload")]
    PayloadParse(#[source] serde_json::Error),

    /// A domain-level error (validation, not-found, etc.).
    #[error("domain error")]
    Domain(#[source] FuseHubError),
}

impl MqttError {
    /// Convert into a [`FuseHubError::Backend`] for propagation across port
    /// boundaries.
    pub fn into_domain(self) -> FuseHubError {
        match self {
            Self::Domain(err) => err,
            other => FuseHubError::backend(other),
        }
    }
}

impl From<MqttError> for FuseHubError {
    fn from(err: MqttError) -> Self {
        err.into_domain()
    }
}
