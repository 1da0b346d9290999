use anyhow::Result;
use songsight_service::Service;

use super::{format_value, print_json, track_json};

/// Show one track and its feature values.
pub fn show_track(service: &Service, id: &str, json: bool) -> Result<()> {
    let track = service.get_track(id)?;
    let features = service.features();

    if json {
        return print_json(&track_json(&track, &features));
    }

    println!("\n🎵 {}\n", track.label());
    println!("  Id: {}", track.id);
    if let Some(artist) = &track.artist {
        println!("  Artist: {artist}");
    }
    if let Some(name) = &track.name {
        println!("  Title: {name}");
    }

    println!();
    for (name, value) in track.features.named(&features) {
        println!("  {name:<18} {}", format_value(value));
    }

    Ok(())
}
