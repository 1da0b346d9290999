use anyhow::{Context, Result};
use songsight_service::Service;

use super::{format_value, print_json, vector_json};

/// Resolve a track id through the catalog and any external sources.
pub async fn run_resolve(service: &Service, id: &str, json: bool) -> Result<()> {
    let vector = service
        .resolve(id)
        .await
        .with_context(|| format!("Could not resolve {id}"))?;
    let features = service.features();

    if json {
        return print_json(&vector_json(&vector, &features));
    }

    let origin = if service.snapshot().catalog().contains(id) {
        "catalog"
    } else {
        "external"
    };
    println!("{id} ({origin})");
    for (name, value) in vector.named(&features) {
        println!("  {name:<18} {}", format_value(value));
    }

    Ok(())
}
