use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use recommender::catalog::InMemoryCatalog;
use recommender::config::RecommenderConfig;
use recommender::database::DatabaseManager;
use recommender::metadata::MetadataClient;
use recommender::models::EntityKind;
use recommender::recommendations::{
    EngineSettings, RecommendationEngine, RecommendationRequest, ResultLimit,
};
use recommender::saved::{ItemKey, SavedItem, SavedItemStore};

#[derive(Parser)]
#[command(name = "recommender", version, about = "Find similar music you don't own yet")]
struct Cli {
    /// JSON config file; defaults are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Recommend artists, albums or tracks similar to a seed
    Recommend {
        kind: EntityKind,
        name: String,
        /// Owning artist, required for albums and tracks
        #[arg(long)]
        artist: Option<String>,
        /// One of 5, 8, 10 or 12
        #[arg(long)]
        limit: Option<usize>,
        /// JSON file listing what is already owned
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Manage a user's saved items
    Saved {
        #[command(subcommand)]
        action: SavedAction,
    },
}

#[derive(Subcommand)]
enum SavedAction {
    List {
        user: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    Save {
        user: String,
        kind: EntityKind,
        name: String,
        #[arg(long, default_value = "")]
        artist: String,
        #[arg(long)]
        image: Option<String>,
        #[arg(long, default_value = "")]
        link: String,
    },
    Delete {
        user: String,
        kind: EntityKind,
        name: String,
        #[arg(long, default_value = "")]
        artist: String,
    },
    /// Report which keys are saved. Keys are a JSON array of
    /// `{"name", "artist", "kind"}` objects read from `--keys` or stdin.
    Check {
        user: String,
        #[arg(long)]
        keys: Option<PathBuf>,
    },
}

/// Ownership file accepted by `recommend --catalog`.
#[derive(Default, Deserialize)]
#[serde(default)]
struct CatalogFile {
    artists: Vec<String>,
    albums: Vec<OwnedEntry>,
    tracks: Vec<OwnedEntry>,
}

#[derive(Deserialize)]
struct OwnedEntry {
    artist: String,
    title: String,
}

#[derive(Serialize)]
struct Outcome<T: Serialize> {
    outcome: T,
}

fn load_config(path: Option<&Path>) -> Result<RecommenderConfig> {
    let config = match path {
        Some(path) => RecommenderConfig::load(path).map_err(|e| anyhow!(e))?,
        None => RecommenderConfig::default(),
    };
    Ok(config.apply_env())
}

fn load_catalog(path: Option<&Path>) -> Result<InMemoryCatalog> {
    let catalog = InMemoryCatalog::new();
    let Some(path) = path else {
        return Ok(catalog);
    };

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog {:?}", path))?;
    let file: CatalogFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse catalog {:?}", path))?;

    for artist in &file.artists {
        catalog.add_artist(artist);
    }
    for album in &file.albums {
        catalog.add_album(&album.artist, &album.title);
    }
    for track in &file.tracks {
        catalog.add_track(&track.artist, &track.title);
    }
    log::info!(
        "Loaded catalog: {} artists, {} albums, {} tracks",
        file.artists.len(),
        file.albums.len(),
        file.tracks.len()
    );
    Ok(catalog)
}

fn parse_keys(json: &str) -> Result<Vec<ItemKey>> {
    serde_json::from_str(json).context("Expected a JSON array of {name, artist, kind} keys")
}

fn read_keys(path: Option<&Path>) -> Result<Vec<ItemKey>> {
    let content = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read keys {:?}", path))?,
        None => std::io::read_to_string(std::io::stdin()).context("Failed to read keys from stdin")?,
    };
    parse_keys(&content)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Cancel the token on Ctrl-C so in-flight work stops promptly.
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling");
            token.cancel();
        }
    });
    cancel
}

async fn run_recommend(
    config: &RecommenderConfig,
    kind: EntityKind,
    name: String,
    artist: Option<String>,
    limit: Option<usize>,
    catalog: Option<PathBuf>,
    cancel: &CancellationToken,
) -> Result<()> {
    let limit = ResultLimit::try_from(limit.unwrap_or(config.result_limit))?;
    let client = MetadataClient::from_config(config)?;
    let catalog = load_catalog(catalog.as_deref())?;
    let engine = RecommendationEngine::new(
        Arc::new(client),
        Arc::new(catalog),
        EngineSettings::from(config),
    );

    let request = RecommendationRequest {
        kind,
        name,
        artist,
        limit,
    };
    let set = engine.recommend(&request, cancel).await?;
    print_json(&set)
}

async fn run_saved(
    config: &RecommenderConfig,
    action: SavedAction,
    cancel: &CancellationToken,
) -> Result<()> {
    let db = DatabaseManager::new(&config.database_path())
        .await
        .map_err(|e| anyhow!(e))?;
    let store = SavedItemStore::new(db.pool.clone());

    match action {
        SavedAction::List { user, limit } => {
            print_json(&store.list(&user, limit, cancel).await?)?;
        }
        SavedAction::Save {
            user,
            kind,
            name,
            artist,
            image,
            link,
        } => {
            let mut item = SavedItem::new(name, artist, kind);
            item.image_url = image;
            item.link = link;
            let outcome = store.save(&user, item, cancel).await?;
            print_json(&Outcome { outcome })?;
        }
        SavedAction::Delete {
            user,
            kind,
            name,
            artist,
        } => {
            let key = ItemKey::new(name, artist, kind);
            let outcome = store.delete(&user, &key, cancel).await?;
            print_json(&Outcome { outcome })?;
        }
        SavedAction::Check { user, keys } => {
            let keys = read_keys(keys.as_deref())?;
            print_json(&store.check_many(&user, &keys, cancel).await?)?;
        }
    }

    db.pool.close().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let cancel = cancel_on_interrupt();

    match cli.command {
        Command::Recommend {
            kind,
            name,
            artist,
            limit,
            catalog,
        } => run_recommend(&config, kind, name, artist, limit, catalog, &cancel).await,
        Command::Saved { action } => run_saved(&config, action, &cancel).await,
    }
}
