use anyhow::Result;
use serde_json::json;
use songsight_service::Service;

use super::{format_value, print_json};

/// List the feature set with declared domains and the range seen in the catalog.
pub fn list_features(service: &Service, json: bool) -> Result<()> {
    let snapshot = service.snapshot();
    let features = snapshot.features();

    let mut rows = Vec::with_capacity(features.len());
    for spec in features.iter() {
        let entries = snapshot.rank_index(&spec.name)?.entries();
        let observed = entries.first().zip(entries.last()).map(|(lo, hi)| (lo.value, hi.value));
        rows.push((spec, observed));
    }

    if json {
        let values: Vec<_> = rows
            .iter()
            .map(|(spec, observed)| {
                json!({
                    "name": spec.name,
                    "min": spec.min,
                    "max": spec.max,
                    "observed_min": observed.map(|(lo, _)| lo),
                    "observed_max": observed.map(|(_, hi)| hi),
                })
            })
            .collect();
        return print_json(&values);
    }

    let bound = |b: Option<f64>| b.map_or_else(|| "-".to_string(), format_value);

    println!(
        "{} features, {} tracks (snapshot {})\n",
        features.len(),
        snapshot.catalog().len(),
        snapshot.version()
    );
    println!("  {:<18} {:>10} {:>10}   {:>10} {:>10}", "feature", "min", "max", "seen min", "seen max");
    for (spec, observed) in rows {
        println!(
            "  {:<18} {:>10} {:>10}   {:>10} {:>10}",
            spec.name,
            bound(spec.min),
            bound(spec.max),
            bound(observed.map(|(lo, _)| lo)),
            bound(observed.map(|(_, hi)| hi)),
        );
    }

    Ok(())
}
