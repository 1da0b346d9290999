use anyhow::{Context, Result};
use serde_json::json;

use songsight_core::{Extreme, Track};
use songsight_service::{Match, Service};

use super::{describe, format_value, print_json, track_json};

fn print_tracks(service: &Service, feature: &str, tracks: &[Track], json: bool) -> Result<()> {
    let features = service.features();
    if json {
        let values: Vec<_> = tracks.iter().map(|t| track_json(t, &features)).collect();
        return print_json(&values);
    }

    let position = features.position(feature)?;
    for track in tracks {
        println!("  {:>12}  {}", format_value(track.value(position)), describe(track));
    }
    Ok(())
}

/// List tracks with `feature` between `min` and `max`.
pub fn run_range(
    service: &Service,
    feature: &str,
    min: Option<f64>,
    max: Option<f64>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let tracks = service.range(feature, min, max, limit)?;

    if !json {
        let lo = min.map_or_else(|| "-inf".to_string(), format_value);
        let hi = max.map_or_else(|| "inf".to_string(), format_value);
        println!("{} tracks with {feature} in [{lo}, {hi}]\n", tracks.len());
    }
    print_tracks(service, feature, &tracks, json)
}

/// Pick random tracks from one end of a feature ranking.
pub fn run_random(
    service: &Service,
    feature: &str,
    count: Option<usize>,
    pool: Option<usize>,
    order: Extreme,
    seed: Option<u64>,
    json: bool,
) -> Result<()> {
    let tracks = service.random(feature, count, pool, order, seed)?;

    if !json {
        let pool = pool.unwrap_or(service.config().defaults.random_pool);
        println!("{} random tracks from the {order} {pool} by {feature}\n", tracks.len());
    }
    print_tracks(service, feature, &tracks, json)
}

/// List the tracks most similar to `id`.
pub async fn run_like(
    service: &Service,
    id: &str,
    k: Option<usize>,
    external: bool,
    json: bool,
) -> Result<()> {
    let matches: Vec<Match> = if external {
        service
            .like_external(id, k)
            .await
            .with_context(|| format!("Could not find tracks like {id}"))?
    } else {
        service.like(id, k)?
    };

    if json {
        let features = service.features();
        let values: Vec<_> = matches
            .iter()
            .map(|m| {
                json!({
                    "distance": m.distance,
                    "track": track_json(&m.track, &features),
                })
            })
            .collect();
        return print_json(&values);
    }

    println!("{} tracks like {id}\n", matches.len());
    for m in &matches {
        println!("  {:>10.4}  {}", m.distance, describe(&m.track));
    }
    Ok(())
}
