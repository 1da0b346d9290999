//! The feature catalog: every known track, validated once at load.

pub mod source;

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::feature::FeatureSet;
use crate::model::{Track, TrackId};

pub use source::{CatalogSource, TrackRecord};

/// Immutable collection of tracks sharing one feature set.
///
/// Construction is the only way to obtain a catalog and it validates the
/// whole input up front, so every track in a catalog has a finite,
/// in-domain value for every feature and ids are unique.
#[derive(Debug, Clone)]
pub struct Catalog {
    features: FeatureSet,
    tracks: Vec<Track>,
    by_id: HashMap<TrackId, usize>,
}

impl Catalog {
    /// Build a catalog from fully formed tracks, in load order.
    pub fn new(features: FeatureSet, tracks: Vec<Track>) -> Result<Self> {
        if tracks.is_empty() {
            return Err(Error::CatalogLoad("catalog contains no tracks".to_string()));
        }

        let mut by_id = HashMap::with_capacity(tracks.len());
        for (position, track) in tracks.iter().enumerate() {
            validate_track(&features, track)?;
            if by_id.insert(track.id.clone(), position).is_some() {
                return Err(Error::CatalogLoad(format!(
                    "duplicate track id {}",
                    track.id
                )));
            }
        }

        Ok(Self {
            features,
            tracks,
            by_id,
        })
    }

    /// Build a catalog from loosely typed records (JSON rows, database rows).
    pub fn from_records(
        features: FeatureSet,
        records: impl IntoIterator<Item = TrackRecord>,
    ) -> Result<Self> {
        let tracks = records
            .into_iter()
            .map(|record| record.into_track(&features))
            .collect::<Result<Vec<_>>>()?;
        Self::new(features, tracks)
    }

    #[must_use]
    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// Look up a track by id.
    pub fn get(&self, id: &str) -> Result<&Track> {
        self.position_of(id)
            .map(|position| &self.tracks[position])
            .ok_or_else(|| Error::not_found(id))
    }

    /// Load-order position of a track id, if present.
    #[must_use]
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// All tracks in load order.
    #[must_use]
    pub fn all(&self) -> &[Track] {
        &self.tracks
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

fn validate_track(features: &FeatureSet, track: &Track) -> Result<()> {
    if track.features.len() != features.len() {
        return Err(Error::CatalogLoad(format!(
            "track {} has {} feature values, expected {}",
            track.id,
            track.features.len(),
            features.len()
        )));
    }

    for (spec, &value) in features.iter().zip(track.features.as_slice()) {
        if !value.is_finite() {
            return Err(Error::CatalogLoad(format!(
                "track {} has a non-finite value for {}",
                track.id, spec.name
            )));
        }
        if !spec.admits(value) {
            return Err(Error::CatalogLoad(format!(
                "track {} has {} = {} outside its domain",
                track.id, spec.name, value
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureSpec;
    use crate::model::FeatureVector;

    fn features() -> FeatureSet {
        FeatureSet::new(vec![
            FeatureSpec::at_least("tempo", 0.0),
            FeatureSpec::bounded("energy", 0.0, 1.0),
        ])
        .unwrap()
    }

    fn track(id: &str, tempo: f64, energy: f64) -> Track {
        Track::new(id, FeatureVector::new(vec![tempo, energy]))
    }

    #[test]
    fn test_catalog_get_and_all() {
        let catalog = Catalog::new(
            features(),
            vec![track("A", 100.0, 0.5), track("B", 120.0, 0.9)],
        )
        .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("B").unwrap().value(0), 120.0);
        assert_eq!(catalog.all()[0].id.as_str(), "A");
        assert!(catalog.contains("A"));
    }

    #[test]
    fn test_catalog_get_missing() {
        let catalog = Catalog::new(features(), vec![track("A", 100.0, 0.5)]).unwrap();
        let err = catalog.get("Z").unwrap_err();
        assert!(matches!(err, Error::NotFound { ref id } if id == "Z"));
    }

    #[test]
    fn test_catalog_rejects_duplicates() {
        let result = Catalog::new(
            features(),
            vec![track("A", 100.0, 0.5), track("A", 90.0, 0.1)],
        );
        assert!(matches!(result, Err(Error::CatalogLoad(_))));
    }

    #[test]
    fn test_catalog_rejects_empty() {
        assert!(matches!(
            Catalog::new(features(), Vec::new()),
            Err(Error::CatalogLoad(_))
        ));
    }

    #[test]
    fn test_catalog_rejects_bad_values() {
        let out_of_domain = Catalog::new(features(), vec![track("A", 100.0, 1.5)]);
        assert!(matches!(out_of_domain, Err(Error::CatalogLoad(_))));

        let nan = Catalog::new(features(), vec![track("A", f64::NAN, 0.5)]);
        assert!(matches!(nan, Err(Error::CatalogLoad(_))));

        let short = Catalog::new(
            features(),
            vec![Track::new("A", FeatureVector::new(vec![100.0]))],
        );
        assert!(matches!(short, Err(Error::CatalogLoad(_))));
    }
}
