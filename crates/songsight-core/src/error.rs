use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The catalog source is malformed or incomplete.
    #[error("catalog load error: {0}")]
    CatalogLoad(String),

    #[error("not found: track with id {id}")]
    NotFound { id: String },

    #[error("unknown feature: {name}")]
    UnknownFeature { name: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An explicit feature vector does not match the feature set.
    #[error("dimension mismatch: expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("non-finite value for feature {feature}")]
    NonFiniteValue { feature: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub(crate) fn unknown_feature(name: impl Into<String>) -> Self {
        Self::UnknownFeature { name: name.into() }
    }

    /// Returns `true` for errors caused by a bad query rather than bad data.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::UnknownFeature { .. }
                | Self::DimensionMismatch { .. }
                | Self::NonFiniteValue { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
