//! Core track feature index for songsight.
//!
//! This crate defines the feature set and track model, catalog loading,
//! the per-feature rank index, the similarity engine, the sampler, the
//! comparison builder, and the versioned snapshot store that ties them
//! together for concurrent readers.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod catalog;
pub mod compare;
pub mod error;
pub mod feature;
pub mod index;
pub mod model;
pub mod sampler;
pub mod similarity;
pub mod snapshot;

pub use catalog::Catalog;
pub use compare::{Comparison, ComparisonEntry, RadarChart};
pub use error::{Error, Result};
pub use feature::{FeatureSet, FeatureSpec};
pub use index::RankIndex;
pub use model::{FeatureVector, Track, TrackId};
pub use similarity::{Metric, Neighbor, Seed, SimilarityConfig, SimilarityEngine};
pub use snapshot::{CatalogStore, Extreme, Snapshot};
