//! In-memory cache in front of another resolver.

use std::collections::{HashMap, VecDeque};

use tokio::sync::RwLock;

use songsight_core::FeatureVector;

use super::CatalogResolver;
use crate::error::ResolveResult;

#[derive(Debug, Default)]
struct CacheState {
    vectors: HashMap<String, FeatureVector>,
    /// Insertion order, oldest first.
    order: VecDeque<String>,
}

/// Remembers up to `capacity` successful resolutions, evicting the oldest
/// first. Failures are never cached.
#[derive(Debug)]
pub struct CachingResolver<R> {
    inner: R,
    capacity: usize,
    state: RwLock<CacheState>,
}

impl<R: CatalogResolver> CachingResolver<R> {
    pub fn new(inner: R, capacity: usize) -> Self {
        Self {
            inner,
            capacity,
            state: RwLock::new(CacheState::default()),
        }
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.vectors.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.vectors.clear();
        state.order.clear();
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    async fn insert(&self, id: &str, vector: FeatureVector) {
        if self.capacity == 0 {
            return;
        }

        let mut state = self.state.write().await;
        if state.vectors.insert(id.to_string(), vector).is_some() {
            return;
        }
        state.order.push_back(id.to_string());

        while state.order.len() > self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.vectors.remove(&oldest);
            }
        }
    }
}

#[async_trait::async_trait]
impl<R: CatalogResolver> CatalogResolver for CachingResolver<R> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn resolve(&self, id: &str) -> ResolveResult<FeatureVector> {
        if let Some(vector) = self.state.read().await.vectors.get(id) {
            log::debug!("Resolver cache hit for {}", id);
            return Ok(vector.clone());
        }

        log::debug!("Resolver cache miss for {}", id);
        let vector = self.inner.resolve(id).await?;
        self.insert(id, vector.clone()).await;
        Ok(vector)
    }
}
