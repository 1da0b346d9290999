//! The fixed, ordered set of audio features every track is described by.
//!
//! The order of a [`FeatureSet`] is the canonical feature order of the whole
//! system: track vectors, distance computations and comparison records all
//! iterate it positionally, so two comparisons built against the same set
//! can be zipped entry by entry.
//!
//! A feature set can be loaded from a standalone TOML file:
//!
//! ```toml
//! [[feature]]
//! name = "energy"
//! min = 0.0
//! max = 1.0
//!
//! [[feature]]
//! name = "tempo"
//! min = 0.0
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Feature specification
// ---------------------------------------------------------------------------

/// A recognized feature name together with its documented domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,

    /// Inclusive lower bound of the domain, if documented.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Inclusive upper bound of the domain, if documented.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl FeatureSpec {
    /// A feature with no documented bounds.
    #[must_use]
    pub fn unbounded(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min: None,
            max: None,
        }
    }

    #[must_use]
    pub fn bounded(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            min: Some(min),
            max: Some(max),
        }
    }

    #[must_use]
    pub fn at_least(name: impl Into<String>, min: f64) -> Self {
        Self {
            name: name.into(),
            min: Some(min),
            max: None,
        }
    }

    /// Width of the declared domain, when both bounds are declared.
    #[must_use]
    pub fn declared_range(&self) -> Option<f64> {
        match (self.min, self.max) {
            (Some(min), Some(max)) => Some(max - min),
            _ => None,
        }
    }

    /// Whether `value` lies inside the declared domain.
    #[must_use]
    pub fn admits(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

// ---------------------------------------------------------------------------
// Feature set
// ---------------------------------------------------------------------------

/// Ordered, duplicate-free list of recognized features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FeatureSpec>", into = "Vec<FeatureSpec>")]
pub struct FeatureSet {
    specs: Vec<FeatureSpec>,
    positions: HashMap<String, usize>,
}

#[derive(Debug, Deserialize)]
struct FeatureFile {
    feature: FeatureSet,
}

impl FeatureSet {
    /// Build a feature set, validating names and bounds.
    pub fn new(specs: Vec<FeatureSpec>) -> Result<Self> {
        if specs.is_empty() {
            return Err(Error::InvalidConfig(
                "feature set must name at least one feature".to_string(),
            ));
        }

        let mut positions = HashMap::with_capacity(specs.len());
        for (position, spec) in specs.iter().enumerate() {
            if spec.name.trim().is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "feature at position {} has an empty name",
                    position
                )));
            }
            if let (Some(min), Some(max)) = (spec.min, spec.max) {
                if !(min <= max) {
                    return Err(Error::InvalidConfig(format!(
                        "feature {} has inverted bounds [{}, {}]",
                        spec.name, min, max
                    )));
                }
            }
            if positions.insert(spec.name.clone(), position).is_some() {
                return Err(Error::InvalidConfig(format!(
                    "feature {} is declared twice",
                    spec.name
                )));
            }
        }

        Ok(Self { specs, positions })
    }

    /// Load a feature set from a TOML file of `[[feature]]` tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;
        let file: FeatureFile = toml::from_str(&content).map_err(|e| {
            Error::InvalidConfig(format!(
                "failed to parse feature set from {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(file.feature)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Position of a feature in canonical order.
    pub fn position(&self, name: &str) -> Result<usize> {
        self.positions
            .get(name)
            .copied()
            .ok_or_else(|| Error::unknown_feature(name))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    /// Spec at a canonical position.
    ///
    /// # Panics
    ///
    /// Panics if `position` is out of range.
    #[must_use]
    pub fn spec(&self, position: usize) -> &FeatureSpec {
        &self.specs[position]
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureSpec> {
        self.specs.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|spec| spec.name.as_str())
    }
}

impl Default for FeatureSet {
    /// The audio features of the songsight dataset, in dataset column order.
    fn default() -> Self {
        let specs = vec![
            FeatureSpec::bounded("acousticness", 0.0, 1.0),
            FeatureSpec::bounded("danceability", 0.0, 1.0),
            FeatureSpec::at_least("duration_ms", 0.0),
            FeatureSpec::bounded("energy", 0.0, 1.0),
            FeatureSpec::bounded("instrumentalness", 0.0, 1.0),
            FeatureSpec::bounded("key", -1.0, 11.0),
            FeatureSpec::bounded("liveness", 0.0, 1.0),
            FeatureSpec::unbounded("loudness"),
            FeatureSpec::bounded("mode", 0.0, 1.0),
            FeatureSpec::bounded("speechiness", 0.0, 1.0),
            FeatureSpec::at_least("tempo", 0.0),
            FeatureSpec::at_least("time_signature", 0.0),
            FeatureSpec::bounded("valence", 0.0, 1.0),
            FeatureSpec::bounded("popularity", 0.0, 100.0),
        ];
        let positions = specs
            .iter()
            .enumerate()
            .map(|(position, spec)| (spec.name.clone(), position))
            .collect();
        Self { specs, positions }
    }
}

impl TryFrom<Vec<FeatureSpec>> for FeatureSet {
    type Error = Error;

    fn try_from(specs: Vec<FeatureSpec>) -> Result<Self> {
        Self::new(specs)
    }
}

impl From<FeatureSet> for Vec<FeatureSpec> {
    fn from(set: FeatureSet) -> Self {
        set.specs
    }
}
