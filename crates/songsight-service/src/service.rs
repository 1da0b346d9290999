//! Query facade over the catalog store and the resolver chain.

use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;

use songsight_core::catalog::CatalogSource;
use songsight_core::compare::RADAR_FEATURES;
use songsight_core::{
    CatalogStore, Comparison, Extreme, FeatureSet, FeatureVector, RadarChart, Seed, Snapshot,
    Track,
};

use crate::config::Config;
use crate::error::ResolveResult;
use crate::resolve::{CachingResolver, CatalogResolver, ChainResolver, SnapshotResolver, SpotifyResolver};

/// Entries kept by the external lookup cache.
const RESOLVER_CACHE_CAPACITY: usize = 1024;

/// A catalog track and its distance from a query seed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    pub track: Track,
    pub distance: f64,
}

/// The songsight query surface.
///
/// Every call reads one snapshot of the catalog; results are owned, so they
/// stay valid across reloads.
pub struct Service {
    config: Config,
    store: Arc<CatalogStore>,
    source: Option<CatalogSource>,
    resolver: Box<dyn CatalogResolver>,
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("catalog_path", &self.config.catalog_path)
            .field("version", &self.store.version())
            .field("resolver", &self.resolver.name())
            .finish_non_exhaustive()
    }
}

impl Service {
    /// Assemble a service from parts. Without a source, [`Service::reload`]
    /// has nothing to reload from.
    pub fn new(config: Config, store: Arc<CatalogStore>, resolver: Box<dyn CatalogResolver>) -> Self {
        Self {
            config,
            store,
            source: None,
            resolver,
        }
    }

    /// Load the configured catalog and build the default resolver chain.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let features = config.feature_set()?;
        let source = CatalogSource::from_path(&config.catalog_path);
        let store = CatalogStore::open(&source, features.clone(), config.similarity.clone())
            .with_context(|| format!("Failed to open catalog {}", config.catalog_path.display()))?;
        let store = Arc::new(store);

        let resolver = default_resolver(&config, &store, features)?;
        log::info!(
            "Serving {} tracks from {} (lookup via {})",
            store.snapshot().catalog().len(),
            config.catalog_path.display(),
            resolver.sources().join(" -> ")
        );

        Ok(Self {
            config,
            store,
            source: Some(source),
            resolver: Box::new(resolver),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<CatalogStore> {
        &self.store
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.snapshot()
    }

    pub fn features(&self) -> FeatureSet {
        self.snapshot().features().clone()
    }

    pub fn get_track(&self, id: &str) -> songsight_core::Result<Track> {
        self.snapshot().get_track(id).cloned()
    }

    /// Tracks with `feature` in `[min, max]`, ascending. A missing bound is
    /// open; at most `limit` tracks (default from config) are returned.
    pub fn range(
        &self,
        feature: &str,
        min: Option<f64>,
        max: Option<f64>,
        limit: Option<usize>,
    ) -> songsight_core::Result<Vec<Track>> {
        let limit = limit.unwrap_or(self.config.defaults.range_limit);
        let snapshot = self.snapshot();
        let tracks = snapshot.range_query(
            feature,
            min.unwrap_or(f64::NEG_INFINITY),
            max.unwrap_or(f64::INFINITY),
        )?;
        Ok(tracks.into_iter().take(limit).cloned().collect())
    }

    /// Random tracks from the top or bottom of `feature`. The seed falls
    /// back to the configured `random_seed`.
    pub fn random(
        &self,
        feature: &str,
        count: Option<usize>,
        pool: Option<usize>,
        extreme: Extreme,
        seed: Option<u64>,
    ) -> songsight_core::Result<Vec<Track>> {
        let defaults = &self.config.defaults;
        let snapshot = self.snapshot();
        let tracks = snapshot.random_from_extreme(
            feature,
            pool.unwrap_or(defaults.random_pool),
            count.unwrap_or(defaults.random_count),
            extreme,
            seed.or(self.config.random_seed),
        )?;
        Ok(tracks.into_iter().cloned().collect())
    }

    /// Catalog tracks most similar to catalog track `id`.
    pub fn like(&self, id: &str, k: Option<usize>) -> songsight_core::Result<Vec<Match>> {
        let snapshot = self.snapshot();
        let k = k.unwrap_or(self.config.defaults.like_k);
        let neighbors = snapshot.nearest(Seed::Track(id), k)?;
        attach_tracks(&snapshot, neighbors)
    }

    /// Catalog tracks most similar to any track a resolver knows. A catalog
    /// track with the same id is left out unless the seed is configured to
    /// be included.
    pub async fn like_external(&self, id: &str, k: Option<usize>) -> ResolveResult<Vec<Match>> {
        let k = k.unwrap_or(self.config.defaults.like_k);
        let vector = self.resolve(id).await?;

        let snapshot = self.snapshot();
        let skip_seed = !self.config.similarity.include_seed && snapshot.catalog().contains(id);
        let wanted = if skip_seed { k.saturating_add(1) } else { k };

        let neighbors = snapshot
            .nearest(Seed::Vector(&vector), wanted)?
            .into_iter()
            .filter(|n| !(skip_seed && n.track_id.as_str() == id))
            .take(k)
            .collect();
        Ok(attach_tracks(&snapshot, neighbors)?)
    }

    /// Resolve an id to a feature vector through the resolver chain.
    pub async fn resolve(&self, id: &str) -> ResolveResult<FeatureVector> {
        let vector = self.resolver.resolve(id).await?;
        vector.check_dimension(self.snapshot().features())?;
        Ok(vector)
    }

    /// Compare two catalog tracks, optionally relabelling them.
    pub fn compare(
        &self,
        id_a: &str,
        id_b: &str,
        label_a: Option<String>,
        label_b: Option<String>,
    ) -> songsight_core::Result<Comparison> {
        Ok(self.snapshot().compare(id_a, id_b)?.with_labels(label_a, label_b))
    }

    /// Radar chart of `comparison` over the standard radar features present
    /// in the feature set, or over every feature if none are.
    pub fn radar(&self, comparison: &Comparison) -> songsight_core::Result<RadarChart> {
        let features = self.features();
        let mut axes: Vec<&str> = RADAR_FEATURES
            .iter()
            .copied()
            .filter(|name| features.contains(name))
            .collect();
        if axes.is_empty() {
            axes = features.names().collect();
        }
        comparison.radar(&features, &axes)
    }

    /// Reload the catalog from its source, keeping the current snapshot if
    /// loading fails.
    pub fn reload(&self) -> anyhow::Result<u64> {
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Service has no catalog source to reload from"))?;
        let features = self.config.feature_set()?;
        let version = self
            .store
            .reload_from(source, features)
            .with_context(|| format!("Failed to reload {}", source.path().display()))?;
        Ok(version)
    }
}

fn attach_tracks(
    snapshot: &Snapshot,
    neighbors: Vec<songsight_core::Neighbor>,
) -> songsight_core::Result<Vec<Match>> {
    neighbors
        .into_iter()
        .map(|n| {
            Ok(Match {
                track: snapshot.get_track(n.track_id.as_str())?.clone(),
                distance: n.distance,
            })
        })
        .collect()
}

/// Catalog first, then Spotify (cached) when credentials are configured.
pub fn default_resolver(
    config: &Config,
    store: &Arc<CatalogStore>,
    features: FeatureSet,
) -> anyhow::Result<ChainResolver> {
    let mut chain = ChainResolver::new().with(SnapshotResolver::new(Arc::clone(store)));

    if let (Some(id), Some(secret)) = (&config.spotify_client_id, &config.spotify_client_secret) {
        let spotify = SpotifyResolver::new(id.as_str(), secret.as_str(), features)
            .context("Failed to build Spotify client")?;
        chain.push(Box::new(CachingResolver::new(spotify, RESOLVER_CACHE_CAPACITY)));
    } else {
        log::debug!("No Spotify credentials configured; external lookup disabled");
    }

    Ok(chain)
}
