pub mod compare;
pub mod config;
pub mod features;
pub mod query;
pub mod resolve;
pub mod track;

use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Map, Value};

use songsight_core::{FeatureSet, FeatureVector, Track};

/// Integers print bare, everything else with four decimals.
pub(crate) fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value:.4}")
    }
}

/// `id` alone, or `id  artist - title` when the track carries metadata.
pub(crate) fn describe(track: &Track) -> String {
    if track.name.is_some() || track.artist.is_some() {
        format!("{}  {}", track.id, track.label())
    } else {
        track.id.to_string()
    }
}

pub(crate) fn vector_json(vector: &FeatureVector, features: &FeatureSet) -> Value {
    let values: Map<String, Value> = vector
        .named(features)
        .map(|(name, value)| (name.to_string(), json!(value)))
        .collect();
    Value::Object(values)
}

pub(crate) fn track_json(track: &Track, features: &FeatureSet) -> Value {
    json!({
        "id": track.id,
        "name": track.name,
        "artist": track.artist,
        "features": vector_json(&track.features, features),
    })
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
