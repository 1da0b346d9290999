use anyhow::{Context, Result};
use toml_edit::{value, DocumentMut, Item};

use songsight_service::{config, Config};

/// How a config key's value is parsed before it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Text,
    Integer,
    Float,
    Bool,
    Metric,
}

const KEYS: &[(&str, ValueKind)] = &[
    ("catalog_path", ValueKind::Text),
    ("features_path", ValueKind::Text),
    ("random_seed", ValueKind::Integer),
    ("spotify_client_id", ValueKind::Text),
    ("spotify_client_secret", ValueKind::Text),
    ("similarity.metric", ValueKind::Metric),
    ("similarity.normalize", ValueKind::Bool),
    ("similarity.include_seed", ValueKind::Bool),
    ("defaults.like_k", ValueKind::Integer),
    ("defaults.random_count", ValueKind::Integer),
    ("defaults.random_pool", ValueKind::Integer),
    ("defaults.range_limit", ValueKind::Integer),
];

fn key_kind(key: &str) -> Option<ValueKind> {
    if let Some(feature) = key.strip_prefix("similarity.weights.") {
        return (!feature.is_empty() && !feature.contains('.')).then_some(ValueKind::Float);
    }
    KEYS.iter().find(|(k, _)| *k == key).map(|(_, kind)| *kind)
}

fn valid_keys() -> String {
    let mut keys: Vec<&str> = KEYS.iter().map(|(k, _)| *k).collect();
    keys.push("similarity.weights.<feature>");
    keys.join(", ")
}

fn parse_value(key: &str, kind: ValueKind, raw: &str) -> Result<Item> {
    let item = match kind {
        ValueKind::Text => value(raw),
        ValueKind::Integer => {
            let n: i64 = raw
                .parse()
                .with_context(|| format!("{key} expects a whole number, got {raw:?}"))?;
            if n < 0 {
                anyhow::bail!("{key} must not be negative");
            }
            value(n)
        }
        ValueKind::Float => {
            let x: f64 = raw
                .parse()
                .with_context(|| format!("{key} expects a number, got {raw:?}"))?;
            if !x.is_finite() || x < 0.0 {
                anyhow::bail!("{key} must be a finite, non-negative number");
            }
            value(x)
        }
        ValueKind::Bool => {
            let b: bool = raw
                .parse()
                .with_context(|| format!("{key} expects true or false, got {raw:?}"))?;
            value(b)
        }
        ValueKind::Metric => match raw.to_ascii_lowercase().as_str() {
            m @ ("euclidean" | "manhattan") => value(m),
            _ => anyhow::bail!("{key} must be euclidean or manhattan, got {raw:?}"),
        },
    };
    Ok(item)
}

/// Set `key` to `raw` in the TOML document `contents`, keeping comments and
/// layout of everything else.
fn edit_config(contents: &str, key: &str, raw: &str) -> Result<String> {
    let kind = key_kind(key).ok_or_else(|| {
        anyhow::anyhow!("Unknown config key: {}\n\nValid keys: {}", key, valid_keys())
    })?;
    let item = parse_value(key, kind, raw)?;

    let mut doc: DocumentMut = contents.parse().context("Config file is not valid TOML")?;
    let parts: Vec<&str> = key.split('.').collect();
    let (last, tables) = parts
        .split_last()
        .ok_or_else(|| anyhow::anyhow!("Empty config key"))?;

    let mut table = doc.as_table_mut();
    for name in tables {
        table = table
            .entry(name)
            .or_insert(toml_edit::table())
            .as_table_mut()
            .ok_or_else(|| anyhow::anyhow!("{name} in the config file is not a table"))?;
    }
    table[*last] = item;

    Ok(doc.to_string())
}

fn or_unset<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| String::from("<not set>"), |v| v.to_string())
}

fn secret(value: Option<&String>) -> String {
    value.map_or_else(|| String::from("<not set>"), |_| String::from("<set>"))
}

/// Show the current effective configuration.
pub fn show_config() -> Result<()> {
    let config = Config::load()?;

    println!("Current Configuration");
    println!("=====================\n");

    println!("Config file: {}", config::config_file_path().display());

    let exists = config::config_file_path().exists();
    println!("File exists: {}\n", if exists { "yes" } else { "no (using defaults)" });

    let features = config.feature_set()?;
    let names: Vec<&str> = features.names().collect();

    println!("Settings:");
    println!("  catalog_path: {}", config.catalog_path.display());
    println!("  features: {} ({})", features.len(), names.join(", "));
    println!("  similarity.metric: {:?}", config.similarity.metric);
    println!("  similarity.normalize: {}", config.similarity.normalize);
    println!("  similarity.include_seed: {}", config.similarity.include_seed);
    for (feature, weight) in &config.similarity.weights {
        println!("  similarity.weights.{feature}: {weight}");
    }
    println!("  defaults.like_k: {}", config.defaults.like_k);
    println!("  defaults.random_count: {}", config.defaults.random_count);
    println!("  defaults.random_pool: {}", config.defaults.random_pool);
    println!("  defaults.range_limit: {}", config.defaults.range_limit);
    println!("  random_seed: {}", or_unset(config.random_seed));
    println!("  spotify_client_id: {}", or_unset(config.spotify_client_id.as_deref()));
    println!("  spotify_client_secret: {}", secret(config.spotify_client_secret.as_ref()));
    println!("  logging.level: {:?}", config.logging.level());
    println!("  logging.coloured: {}", config.logging.coloured());
    println!("  logging.output: {:?}", config.logging.output());

    println!("\nPriority: CLI args > ENV vars (SONGSIGHT_*) > Config file > Defaults");

    Ok(())
}

/// Get a specific config value.
pub fn get_config(key: Option<String>) -> Result<()> {
    let Some(key) = key else {
        // No key provided, show entire config file contents
        let config_path = config::config_file_path();

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            print!("{}", contents);
        } else {
            println!("Config file does not exist: {}", config_path.display());
            println!("\nRun 'songsight config init' to create it.");
        }
        return Ok(());
    };

    let config = Config::load()?;
    let shown = match key.as_str() {
        "catalog_path" => config.catalog_path.display().to_string(),
        "features_path" => or_unset(config.features_path.as_ref().map(|p| p.display())),
        "random_seed" => or_unset(config.random_seed),
        "spotify_client_id" => or_unset(config.spotify_client_id),
        "spotify_client_secret" => or_unset(config.spotify_client_secret),
        "similarity.metric" => format!("{:?}", config.similarity.metric).to_lowercase(),
        "similarity.normalize" => config.similarity.normalize.to_string(),
        "similarity.include_seed" => config.similarity.include_seed.to_string(),
        "defaults.like_k" => config.defaults.like_k.to_string(),
        "defaults.random_count" => config.defaults.random_count.to_string(),
        "defaults.random_pool" => config.defaults.random_pool.to_string(),
        "defaults.range_limit" => config.defaults.range_limit.to_string(),
        other => match other.strip_prefix("similarity.weights.") {
            Some(feature) => config
                .similarity
                .weights
                .get(feature)
                .map_or_else(|| String::from("1 (default)"), ToString::to_string),
            None => anyhow::bail!("Unknown config key: {}\n\nValid keys: {}", key, valid_keys()),
        },
    };
    println!("{shown}");

    Ok(())
}

/// Set a config value.
pub fn set_config(key: &str, raw: &str) -> Result<()> {
    let config_path = config::config_file_path();

    // Ensure config file exists
    config::ensure_config_file()?;

    let contents = std::fs::read_to_string(&config_path)
        .context("Failed to read config file")?;
    let updated = edit_config(&contents, key, raw)?;

    std::fs::write(&config_path, updated)
        .context("Failed to write config file")?;

    println!("✓ Updated {} = {}", key, raw);
    println!("  in {}", config_path.display());

    Ok(())
}

/// Show the config file path.
pub fn show_path() -> Result<()> {
    let config_path = config::config_file_path();
    println!("{}", config_path.display());
    Ok(())
}

/// Show example configuration.
pub fn show_example() -> Result<()> {
    print!("{}", config::example_config());
    Ok(())
}

/// Initialize config file with defaults.
pub fn init_config() -> Result<()> {
    let created = config::ensure_config_file()?;
    let config_path = config::config_file_path();

    if created {
        println!("✓ Created config file: {}", config_path.display());
        println!("\nEdit this file to configure songsight.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}
