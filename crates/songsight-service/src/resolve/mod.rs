//! Resolution of external track ids into feature vectors.
//!
//! A [`CatalogResolver`] turns an id into a vector in the canonical feature
//! order of the configured feature set. Resolvers compose: the
//! [`ChainResolver`] asks each member in turn and moves on when one reports
//! not-found, and the [`CachingResolver`] remembers earlier answers.

use std::fmt;
use std::sync::Arc;

use songsight_core::{CatalogStore, FeatureVector};

use crate::error::{ResolveError, ResolveResult};

pub mod cache;
pub mod spotify;

pub use cache::CachingResolver;
pub use spotify::SpotifyResolver;

/// A source of feature vectors for track ids.
#[async_trait::async_trait]
pub trait CatalogResolver: Send + Sync + fmt::Debug {
    /// Short human-readable source name used in logs and errors.
    fn name(&self) -> &str;

    /// Resolve `id` to its feature vector.
    ///
    /// # Errors
    ///
    /// [`ResolveError::NotFound`] when the source does not know the id;
    /// transport and parse errors otherwise.
    async fn resolve(&self, id: &str) -> ResolveResult<FeatureVector>;
}

// ---------------------------------------------------------------------------
// Catalog-backed resolver
// ---------------------------------------------------------------------------

/// Resolves ids against the current catalog snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotResolver {
    store: Arc<CatalogStore>,
}

impl SnapshotResolver {
    pub fn new(store: Arc<CatalogStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl CatalogResolver for SnapshotResolver {
    fn name(&self) -> &str {
        "catalog"
    }

    async fn resolve(&self, id: &str) -> ResolveResult<FeatureVector> {
        let snapshot = self.store.snapshot();
        let track = snapshot.get_track(id)?;
        Ok(track.features.clone())
    }
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// Tries resolvers in order; the first answer that is not a not-found wins.
#[derive(Debug, Default)]
pub struct ChainResolver {
    resolvers: Vec<Box<dyn CatalogResolver>>,
}

impl ChainResolver {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, resolver: impl CatalogResolver + 'static) -> Self {
        self.resolvers.push(Box::new(resolver));
        self
    }

    pub fn push(&mut self, resolver: Box<dyn CatalogResolver>) {
        self.resolvers.push(resolver);
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Names of the chained sources, in order.
    pub fn sources(&self) -> Vec<&str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }
}

#[async_trait::async_trait]
impl CatalogResolver for ChainResolver {
    fn name(&self) -> &str {
        "chain"
    }

    async fn resolve(&self, id: &str) -> ResolveResult<FeatureVector> {
        for resolver in &self.resolvers {
            match resolver.resolve(id).await {
                Ok(vector) => {
                    log::debug!("Resolved {} via {}", id, resolver.name());
                    return Ok(vector);
                }
                Err(e) if e.is_not_found() => {
                    log::debug!("{} does not know {}", resolver.name(), id);
                }
                Err(e) => return Err(e),
            }
        }

        Err(ResolveError::NotFound {
            id: id.to_string(),
            source_name: self.sources().join(", "),
        })
    }
}
