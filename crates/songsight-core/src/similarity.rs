//! Similarity engine: a fixed, explainable distance between feature
//! vectors and exact k-nearest-neighbour search over a catalog.
//!
//! The distance is a weighted Euclidean (or Manhattan) metric over the
//! canonical feature order:
//!
//! ```text
//! euclidean(a, b) = sqrt( Σ w_f * (s_f * (a_f - b_f))^2 )
//! manhattan(a, b) =       Σ w_f * |s_f * (a_f - b_f)|
//! ```
//!
//! `w_f` defaults to 1. `s_f` is 1 unless normalization is on, in which case
//! it is the reciprocal of the feature's range: the declared domain when the
//! feature has both bounds, otherwise the range observed in the catalog.
//! Scales are computed once when the engine is built.
//!
//! Search is a linear scan keeping the k best candidates in a bounded
//! max-heap: O(n log k) per query.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::model::{FeatureVector, TrackId};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Euclidean,
    Manhattan,
}

/// Tuning for the similarity engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Per-feature weights; features not listed weigh 1.
    pub weights: BTreeMap<String, f64>,

    /// Scale each feature by the reciprocal of its range.
    pub normalize: bool,

    pub metric: Metric,

    /// Keep the seed track in its own neighbour list.
    pub include_seed: bool,
}

// ---------------------------------------------------------------------------
// Query and result types
// ---------------------------------------------------------------------------

/// Origin of a nearest-neighbour query.
#[derive(Debug, Clone, Copy)]
pub enum Seed<'a> {
    /// A catalog track, excluded from its own results by default.
    Track(&'a str),
    /// An explicit vector (e.g. resolved from an external service).
    Vector(&'a FeatureVector),
}

/// One entry of a similarity result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    pub track_id: TrackId,
    pub distance: f64,
}

/// Heap element ordered by distance, then id.
#[derive(Debug)]
struct Candidate<'a> {
    distance: f64,
    id: &'a TrackId,
}

impl Ord for Candidate<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(other.id))
    }
}

impl PartialOrd for Candidate<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate<'_> {}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Distance function resolved against one catalog.
#[derive(Debug, Clone)]
pub struct SimilarityEngine {
    metric: Metric,
    include_seed: bool,
    weights: Vec<f64>,
    scales: Vec<f64>,
}

impl SimilarityEngine {
    /// Resolve `config` against the catalog's feature set and, when
    /// normalizing, its observed value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for weights naming unknown features
    /// or weights that are negative or not finite.
    pub fn new(catalog: &Catalog, config: &SimilarityConfig) -> Result<Self> {
        let features = catalog.features();

        let mut weights = vec![1.0; features.len()];
        for (name, &weight) in &config.weights {
            let position = features.position(name).map_err(|_| {
                Error::InvalidConfig(format!("similarity weight for unknown feature {}", name))
            })?;
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "similarity weight for {} must be a non-negative number, got {}",
                    name, weight
                )));
            }
            weights[position] = weight;
        }

        let scales = if config.normalize {
            (0..features.len())
                .map(|position| {
                    let range = features
                        .spec(position)
                        .declared_range()
                        .unwrap_or_else(|| observed_range(catalog, position));
                    if range > 0.0 {
                        1.0 / range
                    } else {
                        1.0
                    }
                })
                .collect()
        } else {
            vec![1.0; features.len()]
        };

        log::debug!(
            "Similarity engine ready: metric={:?}, normalize={}, include_seed={}",
            config.metric,
            config.normalize,
            config.include_seed
        );

        Ok(Self {
            metric: config.metric,
            include_seed: config.include_seed,
            weights,
            scales,
        })
    }

    #[must_use]
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Per-feature scale factors, in canonical order.
    #[must_use]
    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    /// Distance between two vectors in canonical order.
    #[must_use]
    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        let terms = a
            .iter()
            .zip(b)
            .zip(self.weights.iter().zip(&self.scales))
            .map(|((x, y), (w, s))| (w, s * (x - y)));

        match self.metric {
            Metric::Euclidean => terms.map(|(w, d)| w * d * d).sum::<f64>().sqrt(),
            Metric::Manhattan => terms.map(|(w, d)| w * d.abs()).sum(),
        }
    }

    /// The `k` catalog tracks closest to `seed`, ascending by distance then id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown seed id and
    /// [`Error::DimensionMismatch`] for a seed vector of the wrong length,
    /// and [`Error::NonFiniteValue`] for a seed vector holding NaN or
    /// infinity.
    pub fn nearest(&self, catalog: &Catalog, seed: Seed<'_>, k: usize) -> Result<Vec<Neighbor>> {
        let (query, exclude) = match seed {
            Seed::Track(id) => {
                let position = catalog.position_of(id).ok_or_else(|| Error::not_found(id))?;
                let excluded = (!self.include_seed).then_some(position);
                (catalog.all()[position].features.as_slice(), excluded)
            }
            Seed::Vector(vector) => {
                vector.check_dimension(catalog.features())?;
                if let Some((feature, _)) = vector
                    .named(catalog.features())
                    .find(|(_, value)| !value.is_finite())
                {
                    return Err(Error::NonFiniteValue {
                        feature: feature.to_string(),
                    });
                }
                (vector.as_slice(), None)
            }
        };

        if k == 0 {
            return Ok(Vec::new());
        }

        let mut heap: BinaryHeap<Candidate<'_>> = BinaryHeap::with_capacity(k.min(catalog.len()) + 1);
        for (position, track) in catalog.all().iter().enumerate() {
            if exclude == Some(position) {
                continue;
            }
            let candidate = Candidate {
                distance: self.distance(query, track.features.as_slice()),
                id: &track.id,
            };
            if heap.len() < k {
                heap.push(candidate);
            } else if heap.peek().is_some_and(|worst| candidate < *worst) {
                heap.pop();
                heap.push(candidate);
            }
        }

        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| Neighbor {
                track_id: c.id.clone(),
                distance: c.distance,
            })
            .collect())
    }
}

fn observed_range(catalog: &Catalog, position: usize) -> f64 {
    let (min, max) = catalog
        .all()
        .iter()
        .map(|track| track.value(position))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), v| {
            (min.min(v), max.max(v))
        });
    max - min
}
