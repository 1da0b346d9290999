use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use songsight_core::Extreme;
use songsight_service::{Config, Service};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "songsight", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the track catalog (default: ~/.local/share/songsight/catalog.db)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Show one track and its feature values
    Track {
        /// Track id
        id: String,
    },
    /// List tracks whose feature value lies in a range
    ///
    /// Both bounds are inclusive and either may be left open. Results are
    /// ordered by ascending value, ties by track id.
    ///
    /// Example: songsight range tempo --min 118 --max 122
    Range {
        /// Feature to filter on
        feature: String,
        /// Lower bound (inclusive)
        #[arg(long, allow_negative_numbers = true)]
        min: Option<f64>,
        /// Upper bound (inclusive)
        #[arg(long, allow_negative_numbers = true)]
        max: Option<f64>,
        /// Maximum number of tracks to list (default: 200)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Pick random tracks from the top or bottom of a feature
    ///
    /// Ranks the catalog by the feature, keeps the first POOL tracks from the
    /// chosen end, and samples COUNT of them without replacement. A fixed
    /// --seed (or `random_seed` in the config) makes the draw repeatable.
    Random {
        /// Feature to rank by
        feature: String,
        /// Number of tracks to pick (default: 10)
        #[arg(long, short = 'n')]
        count: Option<usize>,
        /// Size of the pool to pick from (default: 100)
        #[arg(long)]
        pool: Option<usize>,
        /// Which end to draw from: top/desc or bottom/asc
        #[arg(long, default_value = "top")]
        order: Extreme,
        /// Seed for a repeatable draw
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Find the tracks most similar to a track
    Like {
        /// Track id
        id: String,
        /// Number of similar tracks (default: 10)
        #[arg(short)]
        k: Option<usize>,
        /// Resolve the id through external sources when it is not in the catalog
        #[arg(long)]
        external: bool,
    },
    /// Compare two tracks feature by feature
    Compare {
        /// First track id
        a: String,
        /// Second track id
        b: String,
        /// Label for the first track (default: "artist - title")
        #[arg(long)]
        label_a: Option<String>,
        /// Label for the second track
        #[arg(long)]
        label_b: Option<String>,
        /// Write a radar chart of the comparison to this SVG file
        #[arg(long)]
        svg: Option<PathBuf>,
    },
    /// List the feature set and each feature's domain
    Features,
    /// Look up a track's feature vector, in the catalog or externally
    Resolve {
        /// Track id
        id: String,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigAction {
    /// Show the current effective configuration
    Show,
    /// Get a config value (or print the whole file)
    Get {
        /// Key to read, e.g. defaults.like_k
        key: Option<String>,
    },
    /// Set a config value in the config file
    Set {
        /// Key to write, e.g. similarity.metric
        key: String,
        /// New value
        value: String,
    },
    /// Show the config file path
    Path,
    /// Print an example config file
    Example,
    /// Create the config file with defaults
    Init,
}

fn load_config(catalog: Option<PathBuf>) -> Result<Config> {
    match catalog {
        Some(path) => Config::load_with_catalog_path(path),
        None => Config::load(),
    }
}

fn run_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => commands::config::show_config(),
        ConfigAction::Get { key } => commands::config::get_config(key),
        ConfigAction::Set { key, value } => commands::config::set_config(&key, &value),
        ConfigAction::Path => commands::config::show_path(),
        ConfigAction::Example => commands::config::show_example(),
        ConfigAction::Init => commands::config::init_config(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let command = match cli.command {
        Commands::Config { action } => return run_config(action),
        other => other,
    };

    let config = load_config(cli.catalog)?;
    twyg::setup(config.logging.clone())
        .map_err(|e| anyhow::anyhow!("Failed to set up logging: {e:?}"))?;

    let service = Service::from_config(config)?;
    log::debug!(
        "Opened catalog {} at version {}",
        service.config().catalog_path.display(),
        service.store().version()
    );
    let json = cli.json;

    match command {
        Commands::Track { id } => commands::track::show_track(&service, &id, json)?,
        Commands::Range {
            feature,
            min,
            max,
            limit,
        } => commands::query::run_range(&service, &feature, min, max, limit, json)?,
        Commands::Random {
            feature,
            count,
            pool,
            order,
            seed,
        } => commands::query::run_random(&service, &feature, count, pool, order, seed, json)?,
        Commands::Like { id, k, external } => {
            commands::query::run_like(&service, &id, k, external, json).await?;
        }
        Commands::Compare {
            a,
            b,
            label_a,
            label_b,
            svg,
        } => commands::compare::run_compare(&service, &a, &b, label_a, label_b, svg, json)?,
        Commands::Features => commands::features::list_features(&service, json)?,
        Commands::Resolve { id } => commands::resolve::run_resolve(&service, &id, json).await?,
        // Handled before the catalog is opened.
        Commands::Config { .. } => {}
    }

    Ok(())
}
