//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`FuseHubError`]
//! via `#[from]` or an explicit `into_domain()` at port boundaries.

/// Base error type shared by every fusehub crate.
#[derive(Debug, thiserror::Error)]
pub enum FuseHubError {
    /// A domain invariant was violated.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A looked-up resource does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// A backend account call failed. The source error is opaque to the core.
    #[error("backend error")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl FuseHubError {
    /// Wrap any backend-specific error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }
}

/// Domain invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Device identifiers must be non-empty.
    #[error("device identifier must not be empty")]
    EmptyDeviceId,

    /// Virtual function keys must be non-empty.
    #[error("virtual function key must not be empty")]
    EmptyFunctionKey,

    /// A local-strategy entry must name its status code.
    #[error("status code must not be empty for data point {0}")]
    EmptyStatusCode(u32),
}

/// A resource lookup that came back empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    /// Kind of resource (e.g. `"Device"`).
    pub entity: &'static str,
    /// Identifier that was looked up.
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_validation_error_into_base_error() {
        let err: FuseHubError = ValidationError::EmptyDeviceId.into();
        assert!(matches!(
            err,
            FuseHubError::Validation(ValidationError::EmptyDeviceId)
        ));
    }

    #[test]
    fn should_display_not_found_with_entity_and_id() {
        let err = NotFoundError {
            entity: "Device",
            id: "bf91f775".to_string(),
        };
        assert_eq!(err.to_string(), "Device bf91f775 not found");
    }

    #[test]
    fn should_keep_backend_source_error() {
        let io = std::io::Error::other("connection reset");
        let err = FuseHubError::backend(io);
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "connection reset");
    }
}
