use serde::{Deserialize, Serialize};
use std::ops::Index;

use crate::error::{Error, Result};
use crate::feature::FeatureSet;
use crate::model::ids::TrackId;

/// Feature values laid out in the canonical order of a [`FeatureSet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    #[must_use]
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// Check the vector against a feature set's dimension.
    pub fn check_dimension(&self, features: &FeatureSet) -> Result<()> {
        if self.0.len() == features.len() {
            Ok(())
        } else {
            Err(Error::DimensionMismatch {
                expected: features.len(),
                actual: self.0.len(),
            })
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Pair each value with its feature name.
    pub fn named<'a>(&'a self, features: &'a FeatureSet) -> impl Iterator<Item = (&'a str, f64)> {
        features.names().zip(self.0.iter().copied())
    }
}

impl Index<usize> for FeatureVector {
    type Output = f64;

    fn index(&self, position: usize) -> &f64 {
        &self.0[position]
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// A catalog track: identity, display metadata, and its feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,

    /// Track title, when the source carries one.
    pub name: Option<String>,

    /// Primary artist name, when the source carries one.
    pub artist: Option<String>,

    pub features: FeatureVector,
}

impl Track {
    #[must_use]
    pub fn new(id: impl Into<TrackId>, features: FeatureVector) -> Self {
        Self {
            id: id.into(),
            name: None,
            artist: None,
            features,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, name: impl Into<String>, artist: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self.artist = Some(artist.into());
        self
    }

    /// Value of the feature at a canonical position.
    #[must_use]
    pub fn value(&self, position: usize) -> f64 {
        self.features[position]
    }

    /// Display label: `"<artist> - <title>"`, or the id when either is missing.
    #[must_use]
    pub fn label(&self) -> String {
        match (&self.artist, &self.name) {
            (Some(artist), Some(name)) => format!("{} - {}", artist, name),
            _ => self.id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureSpec;

    #[test]
    fn test_track_label() {
        let track = Track::new("abc", FeatureVector::new(vec![0.5]));
        assert_eq!(track.label(), "abc");

        let track = track.with_metadata("Clair de Lune", "Debussy");
        assert_eq!(track.label(), "Debussy - Clair de Lune");
    }

    #[test]
    fn test_check_dimension() {
        let features = FeatureSet::new(vec![
            FeatureSpec::unbounded("tempo"),
            FeatureSpec::unbounded("energy"),
        ])
        .unwrap();

        assert!(FeatureVector::new(vec![120.0, 0.5]).check_dimension(&features).is_ok());
        let err = FeatureVector::new(vec![120.0])
            .check_dimension(&features)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_named_values() {
        let features = FeatureSet::new(vec![
            FeatureSpec::unbounded("tempo"),
            FeatureSpec::unbounded("energy"),
        ])
        .unwrap();
        let vector = FeatureVector::new(vec![120.0, 0.5]);
        let named: Vec<_> = vector.named(&features).collect();
        assert_eq!(named, vec![("tempo", 120.0), ("energy", 0.5)]);
    }
}
