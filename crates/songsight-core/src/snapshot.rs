//! Versioned, immutable catalog snapshots and the store that swaps them.
//!
//! A [`Snapshot`] bundles a catalog with everything derived from it: the
//! similarity engine (with its cached normalization scales) and one lazily
//! built [`RankIndex`] per feature. Nothing in a snapshot changes after
//! construction apart from the one-time initialization of those indexes,
//! so any number of threads can query it without coordination.
//!
//! [`CatalogStore`] holds the current snapshot behind an atomic pointer.
//! Readers grab an `Arc` and keep querying that snapshot even if a reload
//! swaps in a new one meanwhile; a failed reload leaves the current
//! snapshot in place.

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::catalog::{Catalog, CatalogSource};
use crate::compare::Comparison;
use crate::error::Result;
use crate::feature::FeatureSet;
use crate::index::{RankEntry, RankIndex};
use crate::model::Track;
use crate::sampler;
use crate::similarity::{Neighbor, Seed, SimilarityConfig, SimilarityEngine};

/// Which end of a feature ranking to draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Extreme {
    /// Largest values first.
    #[default]
    Top,
    /// Smallest values first.
    Bottom,
}

impl FromStr for Extreme {
    type Err = String;

    /// Accepts `top`/`desc` and `bottom`/`asc`, case-insensitively.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "top" | "desc" => Ok(Self::Top),
            "bottom" | "asc" => Ok(Self::Bottom),
            other => Err(format!(
                "unknown ranking end: {} (expected top, bottom, asc or desc)",
                other
            )),
        }
    }
}

impl fmt::Display for Extreme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Top => write!(f, "top"),
            Self::Bottom => write!(f, "bottom"),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One immutable catalog version with its derived query structures.
#[derive(Debug)]
pub struct Snapshot {
    version: u64,
    catalog: Catalog,
    similarity: SimilarityEngine,
    indexes: Vec<OnceLock<RankIndex>>,
}

impl Snapshot {
    /// Derive the query structures for `catalog`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` does not fit the
    /// catalog's feature set.
    pub fn new(version: u64, catalog: Catalog, config: &SimilarityConfig) -> Result<Self> {
        let similarity = SimilarityEngine::new(&catalog, config)?;
        let indexes = (0..catalog.features().len())
            .map(|_| OnceLock::new())
            .collect();
        Ok(Self {
            version,
            catalog,
            similarity,
            indexes,
        })
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn features(&self) -> &FeatureSet {
        self.catalog.features()
    }

    #[must_use]
    pub fn similarity(&self) -> &SimilarityEngine {
        &self.similarity
    }

    /// The rank index for `feature`, built on first use.
    pub fn rank_index(&self, feature: &str) -> Result<&RankIndex> {
        let position = self.catalog.features().position(feature)?;
        Ok(self.indexes[position].get_or_init(|| RankIndex::build(&self.catalog, position)))
    }

    /// Look up a track and its feature vector.
    pub fn get_track(&self, id: &str) -> Result<&Track> {
        self.catalog.get(id)
    }

    /// Tracks with `min <= feature <= max`, ascending by value then id.
    pub fn range_query(&self, feature: &str, min: f64, max: f64) -> Result<Vec<&Track>> {
        let index = self.rank_index(feature)?;
        Ok(self.resolve(index.range(min, max)))
    }

    /// The `n` tracks with the largest values, descending.
    pub fn top_n(&self, feature: &str, n: usize) -> Result<Vec<&Track>> {
        let index = self.rank_index(feature)?;
        Ok(self.resolve(index.top(n)))
    }

    /// The `n` tracks with the smallest values, ascending.
    pub fn bottom_n(&self, feature: &str, n: usize) -> Result<Vec<&Track>> {
        let index = self.rank_index(feature)?;
        Ok(self.resolve(index.bottom(n)))
    }

    pub fn extreme_n(&self, feature: &str, n: usize, extreme: Extreme) -> Result<Vec<&Track>> {
        match extreme {
            Extreme::Top => self.top_n(feature, n),
            Extreme::Bottom => self.bottom_n(feature, n),
        }
    }

    /// `count` random tracks drawn from the top or bottom `n` by `feature`.
    pub fn random_from_extreme(
        &self,
        feature: &str,
        n: usize,
        count: usize,
        extreme: Extreme,
        seed: Option<u64>,
    ) -> Result<Vec<&Track>> {
        let pool = self.extreme_n(feature, n, extreme)?;
        Ok(sampler::sample(&pool, count, seed)
            .into_iter()
            .copied()
            .collect())
    }

    /// The `k` tracks most similar to `seed`.
    pub fn nearest(&self, seed: Seed<'_>, k: usize) -> Result<Vec<Neighbor>> {
        self.similarity.nearest(&self.catalog, seed, k)
    }

    /// Side-by-side comparison of two tracks.
    pub fn compare(&self, id_a: &str, id_b: &str) -> Result<Comparison> {
        Comparison::build(&self.catalog, id_a, id_b)
    }

    /// Distance between two catalog tracks under this snapshot's metric.
    pub fn distance(&self, id_a: &str, id_b: &str) -> Result<f64> {
        let a = self.catalog.get(id_a)?;
        let b = self.catalog.get(id_b)?;
        Ok(self
            .similarity
            .distance(a.features.as_slice(), b.features.as_slice()))
    }

    fn resolve<'a>(&self, entries: impl IntoIterator<Item = &'a RankEntry>) -> Vec<&Track> {
        let tracks = self.catalog.all();
        entries.into_iter().map(|e| &tracks[e.track]).collect()
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Holder of the current snapshot; reloads replace it atomically.
#[derive(Debug)]
pub struct CatalogStore {
    current: ArcSwap<Snapshot>,
    config: SimilarityConfig,
    next_version: AtomicU64,
    reload_lock: Mutex<()>,
}

impl CatalogStore {
    /// Create a store whose first snapshot (version 1) wraps `catalog`.
    pub fn new(catalog: Catalog, config: SimilarityConfig) -> Result<Self> {
        let snapshot = Snapshot::new(1, catalog, &config)?;
        Ok(Self {
            current: ArcSwap::from_pointee(snapshot),
            config,
            next_version: AtomicU64::new(2),
            reload_lock: Mutex::new(()),
        })
    }

    /// Load `source` and wrap it in a new store.
    pub fn open(
        source: &CatalogSource,
        features: FeatureSet,
        config: SimilarityConfig,
    ) -> Result<Self> {
        let catalog = source.load(features)?;
        Self::new(catalog, config)
    }

    /// The current snapshot. It stays valid for as long as the caller
    /// holds it, regardless of later reloads.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.current.load().version
    }

    #[must_use]
    pub fn similarity_config(&self) -> &SimilarityConfig {
        &self.config
    }

    /// Replace the whole catalog. On error the current snapshot is kept.
    pub fn reload(&self, catalog: Catalog) -> Result<u64> {
        let _guard = self
            .reload_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Versions are only spent on snapshots that go live.
        let version = self.next_version.load(Ordering::Relaxed);
        let snapshot = Snapshot::new(version, catalog, &self.config)?;
        self.next_version.store(version + 1, Ordering::Relaxed);
        let tracks = snapshot.catalog().len();
        self.current.store(Arc::new(snapshot));

        log::info!("Catalog snapshot {} is live ({} tracks)", version, tracks);
        Ok(version)
    }

    /// Load `source` and swap it in. On error the current snapshot is kept.
    pub fn reload_from(&self, source: &CatalogSource, features: FeatureSet) -> Result<u64> {
        let catalog = source.load(features).inspect_err(|e| {
            log::warn!(
                "Catalog reload from {} failed, keeping snapshot {}: {}",
                source.path().display(),
                self.version(),
                e
            );
        })?;
        self.reload(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::feature::FeatureSpec;
    use crate::model::FeatureVector;

    fn features() -> FeatureSet {
        FeatureSet::new(vec![
            FeatureSpec::at_least("tempo", 0.0),
            FeatureSpec::bounded("energy", 0.0, 1.0),
        ])
        .unwrap()
    }

    fn example_catalog() -> Catalog {
        Catalog::new(
            features(),
            vec![
                Track::new("A", FeatureVector::new(vec![100.0, 0.5])),
                Track::new("B", FeatureVector::new(vec![120.0, 0.9])),
                Track::new("C", FeatureVector::new(vec![80.0, 0.2])),
            ],
        )
        .unwrap()
    }

    fn ids(tracks: &[&Track]) -> Vec<String> {
        tracks.iter().map(|t| t.id.to_string()).collect()
    }

    #[test]
    fn test_example_queries() {
        let snapshot = Snapshot::new(1, example_catalog(), &SimilarityConfig::default()).unwrap();

        let range = snapshot.range_query("tempo", 90.0, 130.0).unwrap();
        assert_eq!(ids(&range), vec!["A", "B"]);

        let nearest = snapshot.nearest(Seed::Track("A"), 1).unwrap();
        assert_eq!(nearest[0].track_id.as_str(), "C");

        assert_eq!(ids(&snapshot.top_n("energy", 2).unwrap()), vec!["B", "A"]);
        assert_eq!(ids(&snapshot.bottom_n("energy", 1).unwrap()), vec!["C"]);
        assert_eq!(
            ids(&snapshot.top_n("tempo", 3).unwrap()),
            vec!["B", "A", "C"]
        );
    }

    #[test]
    fn test_unknown_feature_queries() {
        let snapshot = Snapshot::new(1, example_catalog(), &SimilarityConfig::default()).unwrap();
        assert!(matches!(
            snapshot.range_query("cowbell", 0.0, 1.0),
            Err(Error::UnknownFeature { .. })
        ));
        assert!(matches!(
            snapshot.top_n("cowbell", 1),
            Err(Error::UnknownFeature { .. })
        ));
        assert!(matches!(
            snapshot.random_from_extreme("cowbell", 1, 1, Extreme::Bottom, None),
            Err(Error::UnknownFeature { .. })
        ));
    }

    #[test]
    fn test_rank_index_is_built_once() {
        let snapshot = Snapshot::new(1, example_catalog(), &SimilarityConfig::default()).unwrap();
        let first = snapshot.rank_index("tempo").unwrap() as *const RankIndex;
        let second = snapshot.rank_index("tempo").unwrap() as *const RankIndex;
        assert_eq!(first, second);
    }

    #[test]
    fn test_random_from_extreme() {
        let snapshot = Snapshot::new(1, example_catalog(), &SimilarityConfig::default()).unwrap();

        let picked = snapshot
            .random_from_extreme("tempo", 2, 1, Extreme::Top, Some(7))
            .unwrap();
        assert_eq!(picked.len(), 1);
        assert!(["A", "B"].contains(&picked[0].id.as_str()));

        let again = snapshot
            .random_from_extreme("tempo", 2, 1, Extreme::Top, Some(7))
            .unwrap();
        assert_eq!(ids(&picked), ids(&again));

        let all = snapshot
            .random_from_extreme("tempo", 10, 10, Extreme::Bottom, Some(1))
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_distance_between_tracks() {
        let snapshot = Snapshot::new(1, example_catalog(), &SimilarityConfig::default()).unwrap();
        let d = snapshot.distance("A", "B").unwrap();
        assert!((d - 400.16_f64.sqrt()).abs() < 1e-9);
        assert!(snapshot.distance("A", "Z").is_err());
    }

    #[test]
    fn test_extreme_from_str() {
        assert_eq!("top".parse::<Extreme>().unwrap(), Extreme::Top);
        assert_eq!("DESC".parse::<Extreme>().unwrap(), Extreme::Top);
        assert_eq!("asc".parse::<Extreme>().unwrap(), Extreme::Bottom);
        assert_eq!("bottom".parse::<Extreme>().unwrap(), Extreme::Bottom);
        assert!("middle".parse::<Extreme>().is_err());
    }

    #[test]
    fn test_store_reload_swaps_snapshot() {
        let store = CatalogStore::new(example_catalog(), SimilarityConfig::default()).unwrap();
        let before = store.snapshot();
        assert_eq!(before.version(), 1);

        let replacement = Catalog::new(
            features(),
            vec![Track::new("Z", FeatureVector::new(vec![60.0, 0.1]))],
        )
        .unwrap();
        let version = store.reload(replacement).unwrap();
        assert_eq!(version, 2);
        assert_eq!(store.version(), 2);

        // The old snapshot is still whole.
        assert_eq!(before.catalog().len(), 3);
        assert!(before.get_track("A").is_ok());

        let after = store.snapshot();
        assert_eq!(after.catalog().len(), 1);
        assert!(matches!(after.get_track("A"), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_store_failed_reload_keeps_snapshot() {
        let mut weights = std::collections::BTreeMap::new();
        weights.insert("energy".to_string(), 2.0);
        let config = SimilarityConfig {
            weights,
            ..SimilarityConfig::default()
        };
        let store = CatalogStore::new(example_catalog(), config).unwrap();

        // The new catalog lacks the weighted feature, so the engine rejects it.
        let tempo_only = FeatureSet::new(vec![FeatureSpec::unbounded("tempo")]).unwrap();
        let replacement = Catalog::new(
            tempo_only,
            vec![Track::new("Z", FeatureVector::new(vec![60.0]))],
        )
        .unwrap();

        assert!(store.reload(replacement).is_err());
        assert_eq!(store.version(), 1);
        assert_eq!(store.snapshot().catalog().len(), 3);

        // The failed attempt does not use up a version.
        assert_eq!(store.reload(example_catalog()).unwrap(), 2);
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn test_store_reload_from_missing_source() {
        let store = CatalogStore::new(example_catalog(), SimilarityConfig::default()).unwrap();
        let source = CatalogSource::Json("/nonexistent/catalog.json".into());
        assert!(store.reload_from(&source, features()).is_err());
        assert_eq!(store.version(), 1);
    }
}
