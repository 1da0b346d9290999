//! Property-style checks of the query surface over a generated catalog,
//! plus concurrent reads against a store that is being reloaded.

use std::collections::HashSet;

use songsight_core::sampler;
use songsight_core::{
    Catalog, CatalogStore, Extreme, FeatureSet, FeatureSpec, FeatureVector, Seed,
    SimilarityConfig, Snapshot, Track,
};

fn features() -> FeatureSet {
    FeatureSet::new(vec![
        FeatureSpec::at_least("tempo", 0.0),
        FeatureSpec::bounded("energy", 0.0, 1.0),
        FeatureSpec::bounded("valence", 0.0, 1.0),
    ])
    .unwrap()
}

/// 60 tracks with plenty of duplicate values per feature.
fn generated_catalog() -> Catalog {
    let tracks = (0..60u32)
        .map(|i| {
            let tempo = f64::from((i * 37) % 17) * 10.0 + 60.0;
            let energy = f64::from((i * 13) % 20) / 20.0;
            let valence = f64::from((i * 7) % 11) / 10.0;
            Track::new(
                format!("t{:02}", i).as_str(),
                FeatureVector::new(vec![tempo, energy, valence]),
            )
        })
        .collect();
    Catalog::new(features(), tracks).unwrap()
}

fn uniform_catalog(count: usize, tempo: f64) -> Catalog {
    let tracks = (0..count)
        .map(|i| {
            Track::new(
                format!("u{}", i).as_str(),
                FeatureVector::new(vec![tempo, 0.5, 0.5]),
            )
        })
        .collect();
    Catalog::new(features(), tracks).unwrap()
}

fn snapshot() -> Snapshot {
    Snapshot::new(1, generated_catalog(), &SimilarityConfig::default()).unwrap()
}

#[test]
fn test_range_query_selects_exactly_the_range() {
    let snapshot = snapshot();
    let bounds = [(0.0, 1.0), (0.25, 0.5), (0.5, 0.5), (0.9, 0.95), (-1.0, 0.0)];
    for feature in ["energy", "valence"] {
        let position = snapshot.features().position(feature).unwrap();
        for &(min, max) in &bounds {
            let result = snapshot.range_query(feature, min, max).unwrap();
            let returned: HashSet<_> = result.iter().map(|t| t.id.clone()).collect();

            for track in snapshot.catalog().all() {
                let v = track.value(position);
                assert_eq!(returned.contains(&track.id), min <= v && v <= max);
            }
            assert!(result
                .windows(2)
                .all(|w| (w[0].value(position), &w[0].id) <= (w[1].value(position), &w[1].id)));
        }
    }
}

#[test]
fn test_top_and_bottom_partition_catalog() {
    let snapshot = snapshot();
    let size = snapshot.catalog().len();
    for feature in ["tempo", "energy", "valence"] {
        for n in [0, 1, 7, 30] {
            let top = snapshot.top_n(feature, n).unwrap();
            let bottom = snapshot.bottom_n(feature, n).unwrap();
            let middle = &snapshot.rank_index(feature).unwrap().entries()[n..size - n];

            let mut seen: Vec<String> = top
                .iter()
                .chain(bottom.iter())
                .map(|t| t.id.to_string())
                .collect();
            seen.extend(
                middle
                    .iter()
                    .map(|e| snapshot.catalog().all()[e.track].id.to_string()),
            );
            let unique: HashSet<_> = seen.iter().collect();
            assert_eq!(seen.len(), size);
            assert_eq!(unique.len(), size);
        }
    }
}

#[test]
fn test_top_n_full_catalog_is_descending() {
    let snapshot = snapshot();
    let size = snapshot.catalog().len();
    let position = snapshot.features().position("tempo").unwrap();

    let all = snapshot.top_n("tempo", size).unwrap();
    assert_eq!(all.len(), size);
    assert!(all.windows(2).all(|w| w[0].value(position) >= w[1].value(position)));

    assert_eq!(snapshot.top_n("tempo", size * 3).unwrap().len(), size);
    assert!(snapshot.top_n("tempo", 0).unwrap().is_empty());
}

#[test]
fn test_nearest_properties() {
    let snapshot = snapshot();
    let size = snapshot.catalog().len();
    for track in snapshot.catalog().all().iter().step_by(7) {
        let id = track.id.as_str();
        let result = snapshot.nearest(Seed::Track(id), 10).unwrap();
        assert_eq!(result.len(), 10);
        assert!(result.iter().all(|n| n.track_id.as_str() != id));
        assert!(result.windows(2).all(|w| w[0].distance <= w[1].distance));

        let everything = snapshot.nearest(Seed::Track(id), size + 5).unwrap();
        assert_eq!(everything.len(), size - 1);

        assert!(snapshot.nearest(Seed::Track(id), 0).unwrap().is_empty());
    }
}

#[test]
fn test_nearest_matches_brute_force() {
    let snapshot = snapshot();
    let config = SimilarityConfig {
        normalize: true,
        ..SimilarityConfig::default()
    };
    let snapshot = Snapshot::new(2, snapshot.catalog().clone(), &config).unwrap();
    let seed = snapshot.get_track("t05").unwrap();

    let mut expected: Vec<(f64, String)> = snapshot
        .catalog()
        .all()
        .iter()
        .filter(|t| t.id != seed.id)
        .map(|t| {
            let d = snapshot
                .similarity()
                .distance(seed.features.as_slice(), t.features.as_slice());
            (d, t.id.to_string())
        })
        .collect();
    expected.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    expected.truncate(5);

    let actual: Vec<(f64, String)> = snapshot
        .nearest(Seed::Track("t05"), 5)
        .unwrap()
        .into_iter()
        .map(|n| (n.distance, n.track_id.to_string()))
        .collect();
    assert_eq!(actual, expected);
}

#[test]
fn test_compare_is_structurally_symmetric() {
    let snapshot = snapshot();
    let ab = snapshot.compare("t01", "t02").unwrap();
    let ba = snapshot.compare("t02", "t01").unwrap();
    assert_eq!(ab.entries.len(), snapshot.features().len());
    for (x, y) in ab.entries.iter().zip(&ba.entries) {
        assert_eq!(x.feature, y.feature);
        assert_eq!((x.a, x.b), (y.b, y.a));
    }
}

#[test]
fn test_random_from_extreme_draws_from_pool() {
    let snapshot = snapshot();
    let pool: HashSet<String> = snapshot
        .top_n("energy", 20)
        .unwrap()
        .iter()
        .map(|t| t.id.to_string())
        .collect();

    for seed in 0..10 {
        let picked = snapshot
            .random_from_extreme("energy", 20, 5, Extreme::Top, Some(seed))
            .unwrap();
        assert_eq!(picked.len(), 5);
        let ids: HashSet<String> = picked.iter().map(|t| t.id.to_string()).collect();
        assert_eq!(ids.len(), 5);
        assert!(ids.is_subset(&pool));

        let again = snapshot
            .random_from_extreme("energy", 20, 5, Extreme::Top, Some(seed))
            .unwrap();
        assert_eq!(picked, again);
    }
}

#[test]
fn test_sampler_over_tracks() {
    let catalog = generated_catalog();
    let picked = sampler::sample(catalog.all(), 3, Some(99));
    assert_eq!(picked, sampler::sample(catalog.all(), 3, Some(99)));
}

#[test]
fn test_concurrent_reads_see_whole_snapshots() {
    let store = CatalogStore::new(uniform_catalog(40, 100.0), SimilarityConfig::default()).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..200 {
                    let snapshot = store.snapshot();
                    let (expected_len, expected_tempo) = if snapshot.version() % 2 == 1 {
                        (40, 100.0)
                    } else {
                        (25, 200.0)
                    };

                    let all = snapshot.range_query("tempo", 0.0, 1000.0).unwrap();
                    assert_eq!(all.len(), expected_len);
                    assert!(all.iter().all(|t| t.value(0) == expected_tempo));

                    let seed = all[0].id.to_string();
                    let nearest = snapshot.nearest(Seed::Track(&seed), 100).unwrap();
                    assert_eq!(nearest.len(), expected_len - 1);
                }
            });
        }

        scope.spawn(|| {
            for i in 0..50 {
                let catalog = if i % 2 == 0 {
                    uniform_catalog(25, 200.0)
                } else {
                    uniform_catalog(40, 100.0)
                };
                store.reload(catalog).unwrap();
            }
        });
    });

    assert_eq!(store.version(), 51);
}
