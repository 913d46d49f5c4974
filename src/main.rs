//! MOVOS command line client
//! Browse an Xtream Codes provider, manage favorites and probe streams from a terminal

// Use mimalloc for faster memory allocation (Linux, macOS)
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tracing::{error, warn, Level};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use movos::player::{FfmpegBackend, NullSink};
use movos::{
    App, AppConfig, Error, FileStore, MediaItem, MediaKind, PlaybackController, PlaybackError,
    PlaybackOptions, PlaybackStatus, ProviderClient, Result, SystemClock,
};

#[derive(Parser, Debug)]
#[command(name = "movos", version, about = "Xtream Codes catalog browser and stream prober")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Where the credential, favorites and history are stored
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Authenticate and remember the login
    Login {
        url: String,
        username: String,
        password: String,
    },
    /// Forget the stored login
    Logout,
    /// List the categories of a kind (live, vod, series)
    Categories { kind: MediaKind },
    /// List items of a kind, optionally filtered
    Browse {
        kind: MediaKind,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        search: Option<String>,
        /// Number of pages to reveal
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
    /// List the episodes of a series
    Episodes { series_id: String },
    /// Show favorites
    Favorites,
    /// Show recently opened items
    History,
    /// Add or remove an item from favorites
    Favorite { kind: MediaKind, id: String },
    /// Open an item and wait until its stream plays or fails
    Probe {
        kind: MediaKind,
        id: String,
        /// Give up after this many seconds
        #[arg(long, default_value_t = 20)]
        timeout: u64,
    },
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args) {
        error!("{}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(verbose)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn build_app(data_dir: Option<PathBuf>) -> App {
    let mut config = AppConfig::load();
    if data_dir.is_some() {
        config.data_dir = data_dir;
    }

    let clock = Arc::new(SystemClock);
    let player = PlaybackController::new(
        Box::new(FfmpegBackend::new()),
        Box::new(NullSink::new()),
        clock.clone(),
        PlaybackOptions::from(&config),
    );
    let provider = Arc::new(ProviderClient::new(&config));
    let store = Arc::new(FileStore::new(config.data_dir()));
    App::new(config, provider, store, clock, player)
}

fn run(args: Args) -> Result<()> {
    let mut app = build_app(args.data_dir);

    match args.command {
        Commands::Login {
            url,
            username,
            password,
        } => {
            let session = app.login(&url, &username, &password)?;
            let user = &session.user;
            println!("Logged in as {}", user.username);
            println!("  Status:      {}", user.status);
            println!("  Expires:     {}", user.expiry);
            println!(
                "  Connections: {}/{}",
                user.active_connections, user.max_connections
            );
            if user.is_trial {
                println!("  Trial account");
            }
            if !session.server.timezone.is_empty() {
                println!("  Timezone:    {}", session.server.timezone);
            }
        }

        Commands::Logout => {
            app.logout()?;
            println!("Logged out");
        }

        Commands::Categories { kind } => {
            restore(&mut app)?;
            load_kind(&mut app, kind)?;
            for category in app.categories() {
                println!("{:>8}  {}", category.id, category.name);
            }
        }

        Commands::Browse {
            kind,
            category,
            search,
            pages,
        } => {
            restore(&mut app)?;
            load_kind(&mut app, kind)?;
            app.select_category(category);
            if let Some(term) = search {
                app.set_search(&term);
                app.flush_search();
            }
            for _ in 1..pages {
                if !app.reveal_more() {
                    break;
                }
            }
            for item in app.visible() {
                print_item(item);
            }
            println!("({} of {})", app.visible().len(), app.filtered_len());
        }

        Commands::Episodes { series_id } => {
            restore(&mut app)?;
            for episode in app.series_episodes(&series_id)? {
                println!(
                    "S{:02}E{:02}  {:>8}  {}",
                    episode.season, episode.episode_num, episode.id, episode.title
                );
            }
        }

        Commands::Favorites => {
            for item in app.favorites() {
                print_item(item);
            }
        }

        Commands::History => {
            for item in app.history() {
                print_item(item);
            }
        }

        Commands::Favorite { kind, id } => {
            let saved = app
                .favorites()
                .iter()
                .find(|f| f.kind == kind && f.id == id)
                .cloned();
            let item = match saved {
                Some(item) => item,
                None => {
                    restore(&mut app)?;
                    load_kind(&mut app, kind)?;
                    app.snapshot()
                        .item(&id)
                        .cloned()
                        .ok_or(Error::UnknownItem { kind, id })?
                }
            };
            if app.toggle_favorite(&item)? {
                println!("Added {} to favorites", item.title);
            } else {
                println!("Removed {} from favorites", item.title);
            }
        }

        Commands::Probe { kind, id, timeout } => {
            restore(&mut app)?;
            load_kind(&mut app, kind)?;
            let item = app.open_item(&id)?;
            if kind == MediaKind::Series {
                let episodes = app.series_episodes(&item.id)?;
                let first = episodes
                    .first()
                    .ok_or_else(|| Error::NotPlayable(item.title.clone()))?;
                app.play_episode(first)?;
            } else {
                app.play(&item)?;
            }
            wait_for_playback(&mut app, Duration::from_secs(timeout))?;
            println!("{} is playing", item.title);
            app.close_player();
        }
    }

    Ok(())
}

fn restore(app: &mut App) -> Result<()> {
    if app.restore() {
        Ok(())
    } else {
        Err(Error::NotLoggedIn)
    }
}

/// Select `kind` and block until its catalog is in
fn load_kind(app: &mut App, kind: MediaKind) -> Result<()> {
    app.select_kind(kind)?;
    let timeout = Duration::from_secs(app.config().request_timeout_secs + 5);
    if !app.wait_for_catalog(timeout) {
        warn!(%kind, "Timed out waiting for catalog");
    }
    match app.last_error() {
        Some(e) => Err(e.clone().into()),
        None => Ok(()),
    }
}

fn wait_for_playback(app: &mut App, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        app.poll();
        match app.playback_status() {
            PlaybackStatus::Ready => return Ok(()),
            PlaybackStatus::Error | PlaybackStatus::Idle => {
                let error = app
                    .playback()
                    .and_then(|s| s.error.clone())
                    .unwrap_or(PlaybackError::UnsupportedFormat);
                return Err(error.into());
            }
            PlaybackStatus::Loading => {}
        }
        if Instant::now() >= deadline {
            return Err(PlaybackError::Timeout(timeout).into());
        }
        thread::sleep(Duration::from_millis(50));
    }
}

fn print_item(item: &MediaItem) {
    println!(
        "{:>8}  {:<6}  {:<48}  {}  {:.1}",
        item.id,
        item.kind.to_string(),
        item.title,
        item.year,
        item.rating
    );
}
