use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use playa_core::actions::PlayTarget;
use playa_core::catalog::DisplayContext;
use playa_core::config::AppConfig;
use playa_core::models::{
    movie_files_from_json, ItemPatch, ItemRecord, ItemType, ScanResults, Source,
};
use playa_core::navigation::Destination;
use playa_core::reconcile::SyncTally;
use playa_runtime::{ItemSummaryDto, Runtime, RuntimeError};

#[derive(Parser)]
#[command(name = "playa", version, about = "Catalog and play your shows, movies and playlists")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile the catalog against the library directories
    Scan {
        #[arg(long, value_enum, default_value = "all")]
        kind: ScanKind,
        /// Read scan results from a JSON file instead of walking the disk
        #[arg(long)]
        from_json: Option<PathBuf>,
    },
    /// List items on the home screen or in the archives
    List {
        #[arg(long)]
        archives: bool,
        #[arg(long)]
        json: bool,
    },
    /// Show one item and its episodes
    Show {
        id: i64,
        #[arg(long)]
        json: bool,
    },
    /// Search items by name
    Search { query: String },
    /// Add an external show/movie or a YouTube playlist
    Add {
        #[arg(value_enum)]
        kind: AddKind,
        url: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        tvdb_id: Option<i64>,
        #[arg(long)]
        movie: bool,
    },
    /// Edit an item
    Edit {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        tvdb_id: Option<i64>,
        #[arg(long)]
        clear_tvdb_id: bool,
        /// Play episodes newest first
        #[arg(long)]
        reversed: Option<bool>,
    },
    Archive { id: i64 },
    Unarchive { id: i64 },
    /// Move an item's current episode
    Nav {
        id: i64,
        #[arg(value_enum)]
        destination: NavArg,
    },
    /// Open the item's current episode (or the item itself)
    Play {
        id: i64,
        /// Print what would be opened without launching it
        #[arg(long)]
        print_only: bool,
    },
    Delete { id: i64 },
    DeleteEpisode { item_id: i64, episode_id: i64 },
    /// Refresh an item's episodes from TVDB
    Sync { id: i64 },
    /// Search TVDB for an item and optionally link one of the matches
    Lookup {
        id: i64,
        /// Search for this instead of the item's name
        #[arg(long)]
        query: Option<String>,
        /// Link the Nth match (1-based)
        #[arg(long)]
        pick: Option<usize>,
    },
    /// Fill a movie's duration from its TVDB runtime
    MovieRuntime { id: i64 },
    /// Refresh YouTube playlists that are due, or one playlist
    Playlists {
        #[arg(long)]
        force: bool,
        #[arg(long)]
        id: Option<i64>,
    },
    /// Show or change settings
    Config {
        #[arg(long)]
        tv_dir: Option<String>,
        #[arg(long)]
        movie_dir: Option<String>,
        #[arg(long)]
        show_finished: Option<bool>,
        #[arg(long)]
        tvdb_api_key: Option<String>,
        #[arg(long)]
        tvdb_pin: Option<String>,
        #[arg(long)]
        youtube_api_key: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ScanKind {
    All,
    Shows,
    Movies,
}

#[derive(Clone, Copy, ValueEnum)]
enum AddKind {
    External,
    Playlist,
}

#[derive(Clone, Copy, ValueEnum)]
enum NavArg {
    First,
    Prev,
    Next,
    Finished,
    Random,
}

impl From<NavArg> for Destination {
    fn from(arg: NavArg) -> Self {
        match arg {
            NavArg::First => Destination::First,
            NavArg::Prev => Destination::Prev,
            NavArg::Next => Destination::Next,
            NavArg::Finished => Destination::Finished,
            NavArg::Random => Destination::Random,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_tracing();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Console gets warnings; the daily log file in the data directory gets
/// `RUST_LOG` or `playa=info`.
fn init_tracing() -> WorkerGuard {
    let log_dir = AppConfig::data_dir().join("logs");
    let file_appender = tracing_appender::rolling::daily(&log_dir, "playa.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("playa=info"));
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("playa=warn"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_filter),
        )
        .init();
    guard
}

async fn run(command: Command) -> Result<(), RuntimeError> {
    let rt = Runtime::new()?;
    rt.load_catalog().await?;

    match command {
        Command::Scan { kind, from_json } => {
            let tally = match (kind, from_json) {
                (ScanKind::All, None) => rt.scan_library().await?,
                (ScanKind::Shows, None) => rt.scan_shows().await?,
                (ScanKind::Movies, None) => rt.scan_movies().await?,
                (ScanKind::Shows, Some(path)) => {
                    let scan = ScanResults::from_json(&read_file(&path)?)?;
                    rt.reconcile_shows(scan).await?
                }
                (ScanKind::Movies, Some(path)) => {
                    let files = movie_files_from_json(&read_file(&path)?)?;
                    rt.reconcile_movies(files).await?
                }
                (ScanKind::All, Some(_)) => {
                    return Err(RuntimeError::Config(
                        "--from-json needs --kind shows or --kind movies".into(),
                    ));
                }
            };
            print_tally(&tally);
        }
        Command::List { archives, json } => {
            let context = if archives {
                DisplayContext::Archives
            } else {
                DisplayContext::Home
            };
            let items = rt.list(context).await;
            if json {
                println!("{}", to_json(&items)?);
            } else {
                items.iter().for_each(print_summary);
            }
        }
        Command::Show { id, json } => {
            let detail = rt.item_detail(id).await?;
            if json {
                println!("{}", to_json(&detail)?);
            } else {
                print_summary(&detail.summary);
                for ep in &detail.episodes {
                    let marker = if ep.is_current { ">" } else { " " };
                    let duration = ep.duration.as_deref().unwrap_or("");
                    println!("  {marker} {:>6}  {}  {duration}", ep.id, ep.label);
                }
            }
        }
        Command::Search { query } => {
            for hit in rt.search(&query).await {
                println!(
                    "{:>6}  {:<5}  {:<10}  {}",
                    hit.id,
                    hit.item_type.as_db_str(),
                    hit.source.as_db_str(),
                    hit.name
                );
            }
        }
        Command::Add {
            kind,
            url,
            name,
            tvdb_id,
            movie,
        } => {
            let item_type = if movie { ItemType::Movie } else { ItemType::Show };
            let source = match kind {
                AddKind::External => Source::External,
                AddKind::Playlist => Source::YtPlaylist,
            };
            let mut record = ItemRecord::new(item_type, source);
            record.name = name;
            record.url = Some(url);
            record.tvdb_id = tvdb_id;
            let id = rt.add_item(record).await?;
            println!("Added item {id}");
        }
        Command::Edit {
            id,
            name,
            tvdb_id,
            clear_tvdb_id,
            reversed,
        } => {
            let patch = ItemPatch {
                name,
                tvdb_id: if clear_tvdb_id {
                    Some(None)
                } else {
                    tvdb_id.map(Some)
                },
                order_is_reversed: reversed,
                ..Default::default()
            };
            rt.update_item(id, patch).await?;
        }
        Command::Archive { id } => rt.set_archived(id, true).await?,
        Command::Unarchive { id } => rt.set_archived(id, false).await?,
        Command::Nav { id, destination } => {
            let summary = rt.nav(id, destination.into()).await?;
            print_summary(&summary);
        }
        Command::Play { id, print_only } => {
            let target = rt.play(id).await?;
            println!("{target}");
            if !print_only {
                launch(&target)?;
            }
        }
        Command::Delete { id } => rt.delete_item(id).await?,
        Command::DeleteEpisode {
            item_id,
            episode_id,
        } => rt.delete_episode(item_id, episode_id).await?,
        Command::Sync { id } => print_tally(&rt.sync_tvdb(id).await?),
        Command::Lookup { id, query, pick } => {
            let matches = rt.search_tvdb(id, query.as_deref()).await?;
            if matches.is_empty() {
                println!("No TVDB matches");
            }
            for (n, found) in matches.iter().enumerate() {
                let year = found.year.as_deref().unwrap_or("????");
                let slug = found.slug.as_deref().unwrap_or("");
                println!("{:>3}. {} ({year})  tvdb:{}  {slug}", n + 1, found.name, found.tvdb_id);
            }
            if let Some(pick) = pick {
                let found = pick
                    .checked_sub(1)
                    .and_then(|n| matches.get(n))
                    .ok_or_else(|| RuntimeError::Config(format!("no match number {pick}")))?;
                rt.link_tvdb(id, found).await?;
                println!("Linked item {id} to TVDB {}", found.tvdb_id);
            }
        }
        Command::MovieRuntime { id } => match rt.fill_movie_runtime(id).await? {
            Some(duration) => println!("{duration}"),
            None => println!("TVDB has no runtime for this movie"),
        },
        Command::Playlists { force, id } => match id {
            Some(id) => print_tally(&rt.update_playlist(id).await?),
            None => {
                let refresh = rt.update_all_playlists(force).await?;
                let summary = refresh.summary();
                if summary.is_empty() {
                    println!("No playlists due for a refresh");
                } else {
                    println!("{summary}");
                }
                for error in &refresh.errors {
                    eprintln!("  {error}");
                }
            }
        },
        Command::Config {
            tv_dir,
            movie_dir,
            show_finished,
            tvdb_api_key,
            tvdb_pin,
            youtube_api_key,
        } => {
            let mut config = rt.get_config().await;
            let changed = tv_dir.is_some()
                || movie_dir.is_some()
                || show_finished.is_some()
                || tvdb_api_key.is_some()
                || tvdb_pin.is_some()
                || youtube_api_key.is_some();
            if let Some(v) = tv_dir {
                config.library.tv_dir = v;
            }
            if let Some(v) = movie_dir {
                config.library.movie_dir = v;
            }
            if let Some(v) = show_finished {
                config.library.show_finished_items = v;
            }
            if let Some(v) = tvdb_api_key {
                config.services.tvdb.api_key = v;
            }
            if let Some(v) = tvdb_pin {
                config.services.tvdb.pin = v;
            }
            if let Some(v) = youtube_api_key {
                config.services.youtube.api_key = v;
            }
            if changed {
                rt.update_config(config).await?;
            }
            println!("config:   {}", AppConfig::config_path().display());
            println!("database: {}", AppConfig::db_path().display());
        }
    }
    Ok(())
}

fn print_tally(tally: &SyncTally) {
    println!("{}", tally.summary());
    for error in &tally.errors {
        eprintln!("  {error}");
    }
}

fn print_summary(item: &ItemSummaryDto) {
    println!(
        "{:>6}  {:<5}  {:<10}  {:<40}  {}",
        item.id,
        item.item_type.as_db_str(),
        item.source.as_db_str(),
        item.name,
        item.progress
    );
}

fn launch(target: &PlayTarget) -> Result<(), RuntimeError> {
    let result = match target {
        PlayTarget::File(path) => open::that(path),
        PlayTarget::Url(url) => open::that(url),
    };
    result.map_err(|e| RuntimeError::NotFound(format!("could not open {target}: {e}")))
}

fn read_file(path: &Path) -> Result<String, RuntimeError> {
    std::fs::read_to_string(path)
        .map_err(|e| RuntimeError::Scan(format!("{}: {e}", path.display())))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, RuntimeError> {
    serde_json::to_string_pretty(value).map_err(|e| RuntimeError::Config(e.to_string()))
}
