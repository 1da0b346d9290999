//! Resolution error types for the service layer.

use thiserror::Error;

/// Errors that can occur while resolving an external track id.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// An HTTP request to an external source failed.
    #[error("HTTP error from {source_name}: {message}")]
    Http {
        source_name: String,
        message: String,
    },

    /// The external source returned a rate-limit response.
    #[error("rate limited by {source_name}")]
    RateLimited { source_name: String },

    /// No source could supply the track.
    #[error("not found: track {id} at {source_name}")]
    NotFound { id: String, source_name: String },

    /// The external source refused the request (a 4xx other than 404/429).
    #[error("request rejected by {source_name}: {message}")]
    Rejected {
        source_name: String,
        message: String,
    },

    /// A response from an external source could not be parsed.
    #[error("parse error from {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    /// The source answered but did not carry a recognized feature.
    #[error("track {id} from {source_name} has no value for {feature}")]
    MissingFeature {
        id: String,
        source_name: String,
        feature: String,
    },

    /// The source needs credentials that are not configured.
    #[error("no credentials configured for {source_name}")]
    MissingCredentials { source_name: String },

    /// An error propagated from `reqwest`.
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// An error propagated from the core index.
    #[error("catalog error: {0}")]
    Catalog(#[from] songsight_core::Error),
}

impl ResolveError {
    /// Returns `true` when the error is transient and the operation may
    /// succeed if retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { .. } | Self::RateLimited { .. } => true,
            Self::Request(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Returns `true` when the error indicates the track was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Catalog(songsight_core::Error::NotFound { .. })
        )
    }
}

/// Convenience alias for resolution results.
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;
