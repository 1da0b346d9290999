//! Side-by-side feature comparison of two tracks.
//!
//! A [`Comparison`] lists every feature in canonical order with both
//! tracks' values, so comparisons built against the same catalog can be
//! zipped positionally. [`Comparison::radar`] projects a subset of features
//! onto the axes of a radar chart for rendering.

use serde::Serialize;
use std::f64::consts::PI;

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::feature::FeatureSet;
use crate::model::TrackId;

/// Features drawn on a comparison radar chart by default.
pub const RADAR_FEATURES: [&str; 6] = [
    "danceability",
    "energy",
    "instrumentalness",
    "liveness",
    "speechiness",
    "valence",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonEntry {
    pub feature: String,
    pub a: f64,
    pub b: f64,
}

impl ComparisonEntry {
    /// `b - a`.
    #[must_use]
    pub fn difference(&self) -> f64 {
        self.b - self.a
    }
}

/// Structured comparison of track A against track B.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub track_a: TrackId,
    pub track_b: TrackId,
    pub label_a: String,
    pub label_b: String,
    pub entries: Vec<ComparisonEntry>,
}

impl Comparison {
    /// Compare two catalog tracks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if either id is absent.
    pub fn build(catalog: &Catalog, id_a: &str, id_b: &str) -> Result<Self> {
        let a = catalog.get(id_a)?;
        let b = catalog.get(id_b)?;

        let entries = catalog
            .features()
            .names()
            .zip(a.features.as_slice().iter().zip(b.features.as_slice()))
            .map(|(feature, (&a, &b))| ComparisonEntry {
                feature: feature.to_string(),
                a,
                b,
            })
            .collect();

        Ok(Self {
            track_a: a.id.clone(),
            track_b: b.id.clone(),
            label_a: a.label(),
            label_b: b.label(),
            entries,
        })
    }

    /// Replace the default labels where an override is given.
    #[must_use]
    pub fn with_labels(mut self, label_a: Option<String>, label_b: Option<String>) -> Self {
        if let Some(label) = label_a {
            self.label_a = label;
        }
        if let Some(label) = label_b {
            self.label_b = label;
        }
        self
    }

    /// The same comparison with A and B exchanged.
    #[must_use]
    pub fn swapped(&self) -> Self {
        Self {
            track_a: self.track_b.clone(),
            track_b: self.track_a.clone(),
            label_a: self.label_b.clone(),
            label_b: self.label_a.clone(),
            entries: self
                .entries
                .iter()
                .map(|e| ComparisonEntry {
                    feature: e.feature.clone(),
                    a: e.b,
                    b: e.a,
                })
                .collect(),
        }
    }

    #[must_use]
    pub fn entry(&self, feature: &str) -> Option<&ComparisonEntry> {
        self.entries.iter().find(|e| e.feature == feature)
    }

    /// Project `axes` onto a radar chart.
    ///
    /// Axis `i` of `N` sits at angle `i / N * 2π`. Values are scaled into
    /// [0, 1] by the feature's declared domain. A bound the feature does not
    /// declare is replaced by the smaller or larger value of the pair, so
    /// larger values always sit further out. Equal values with no span
    /// between the bounds sit halfway.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownFeature`] for an axis not in `features`.
    pub fn radar(&self, features: &FeatureSet, axes: &[&str]) -> Result<RadarChart> {
        let count = axes.len();
        let axes = axes
            .iter()
            .enumerate()
            .map(|(i, &name)| -> Result<RadarAxis> {
                let spec = features.spec(features.position(name)?);
                let entry = self
                    .entry(name)
                    .ok_or_else(|| Error::unknown_feature(name))?;

                // A missing bound is taken from the pair itself.
                let lo = spec.min.unwrap_or(entry.a.min(entry.b));
                let hi = spec.max.unwrap_or(entry.a.max(entry.b));
                let (a, b) = if hi > lo {
                    ((entry.a - lo) / (hi - lo), (entry.b - lo) / (hi - lo))
                } else {
                    (0.5, 0.5)
                };

                Ok(RadarAxis {
                    feature: name.to_string(),
                    angle: i as f64 / count as f64 * 2.0 * PI,
                    a: a.clamp(0.0, 1.0),
                    b: b.clamp(0.0, 1.0),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RadarChart {
            label_a: self.label_a.clone(),
            label_b: self.label_b.clone(),
            axes,
        })
    }
}

/// One spoke of a radar chart, values in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadarAxis {
    pub feature: String,
    /// Radians clockwise from the top.
    pub angle: f64,
    pub a: f64,
    pub b: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadarChart {
    pub label_a: String,
    pub label_b: String,
    pub axes: Vec<RadarAxis>,
}
