//! Per-feature rank index.
//!
//! A [`RankIndex`] holds every catalog track sorted ascending by one
//! feature's value, ties broken by ascending track id, so the order is
//! total and repeated queries return identical results. Range lookups are
//! two binary searches over that order; top and bottom N are slices of it.

use std::iter::Rev;
use std::slice::Iter;

use crate::catalog::Catalog;

/// One position in a rank index: a feature value and the load-order
/// position of the track it belongs to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankEntry {
    pub value: f64,
    pub track: usize,
}

/// Tracks of one catalog sorted by a single feature.
#[derive(Debug, Clone)]
pub struct RankIndex {
    feature: usize,
    entries: Vec<RankEntry>,
}

impl RankIndex {
    /// Sort the catalog by the feature at canonical position `feature`.
    #[must_use]
    pub fn build(catalog: &Catalog, feature: usize) -> Self {
        let tracks = catalog.all();
        let mut entries: Vec<RankEntry> = tracks
            .iter()
            .enumerate()
            .map(|(track, t)| RankEntry {
                value: t.value(feature),
                track,
            })
            .collect();

        entries.sort_by(|a, b| {
            a.value
                .total_cmp(&b.value)
                .then_with(|| tracks[a.track].id.cmp(&tracks[b.track].id))
        });

        log::debug!(
            "Built rank index for {} over {} tracks",
            catalog.features().spec(feature).name,
            entries.len()
        );

        Self { feature, entries }
    }

    /// Canonical position of the indexed feature.
    #[must_use]
    pub fn feature(&self) -> usize {
        self.feature
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries with `min <= value <= max`, ascending.
    ///
    /// An inverted or NaN range selects nothing.
    #[must_use]
    pub fn range(&self, min: f64, max: f64) -> &[RankEntry] {
        if !(min <= max) {
            return &[];
        }
        let lo = self.entries.partition_point(|e| e.value < min);
        let hi = self.entries.partition_point(|e| e.value <= max);
        &self.entries[lo..hi.max(lo)]
    }

    /// The `n` smallest entries, ascending.
    #[must_use]
    pub fn bottom(&self, n: usize) -> &[RankEntry] {
        &self.entries[..n.min(self.entries.len())]
    }

    /// The `n` largest entries, descending.
    ///
    /// This is the exact mirror of the ascending order, so equal values come
    /// out in descending id order.
    pub fn top(&self, n: usize) -> Rev<Iter<'_, RankEntry>> {
        let start = self.entries.len() - n.min(self.entries.len());
        self.entries[start..].iter().rev()
    }

    /// All entries, ascending.
    #[must_use]
    pub fn entries(&self) -> &[RankEntry] {
        &self.entries
    }
}
