//! Virtual adapter error types.

use std::path::PathBuf;

use fusehub_domain::error::FuseHubError;

/// Errors specific to the virtual backend.
#[derive(Debug, thiserror::Error)]
pub enum VirtualError {
    /// The seed file could not be read.
    #[error("failed to read seed file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The seed file is not a JSON array of device records.
    #[error("failed to parse seed file")]
    Parse(#[source] serde_json::Error),

    /// Failure injected through [`crate::VirtualBackend::set_failing`].
    #[error("simulated backend failure")]
    Simulated,

    /// A domain-level error (validation, not-found, etc.).
    #[error("domain error")]
    Domain(#[source] FuseHubError),
}

impl VirtualError {
    /// Convert into a [`FuseHubError`] for propagation across port boundaries.
    pub fn into_domain(self) -> FuseHubError {
        match self {
            Self::Domain(err) => err,
            other => FuseHubError::backend(other),
        }
    }
}

impl From<VirtualError> for FuseHubError {
    fn from(err: VirtualError) -> Self {
        err.into_domain()
    }
}
