//! B-Lib CLI - personal bookmark library kept in sync with a hosted store
//!
//! Usage: blib <command> [options]

use blib_common::{Bookmark, BlibError, BookmarkId, OwnerId, EXIT_CONFIG_ERROR, EXIT_ERROR};
use blib_config::{Config, CONFIG_PATH, ENV_USER_ID};
use blib_core::{derive_title, normalize_url, view, Projection};
use blib_sync::{
    DeleteOutcome, HostedStore, IdentityContext, ReconciliationEngine, Session, StaticIdentity,
    SyncConfig, SyncError,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "blib",
    version = "0.1.0",
    about = "B-Lib bookmark library with live sync"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose/debug logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Directory holding .blib/config.toml (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter .blib/config.toml
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// List saved bookmarks, newest first
    #[command(alias = "list")]
    Ls {
        /// Filter by title, URL or domain
        query: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Save a URL
    Add {
        /// URL to save; https:// is assumed when no scheme is given
        url: String,

        /// Title (derived from the URL when omitted)
        #[arg(short, long)]
        title: Option<String>,

        /// Print the saved bookmark as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a bookmark after confirmation
    Rm {
        /// Bookmark id as shown by `blib ls`
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Keep the library open and reprint it on every change
    Watch {
        /// Filter by title, URL or domain
        query: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    blib_common::telemetry::init_tracing(cli.verbose, false);
    tracing::info!("B-Lib CLI started");

    let root = match cli.root {
        Some(root) => root,
        None => match std::env::current_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(EXIT_ERROR);
            }
        },
    };

    let result = match cli.command {
        Commands::Init { force } => cmd_init(&root, force).await,
        Commands::Ls { query, json } => cmd_ls(&root, query, json).await,
        Commands::Add { url, title, json } => cmd_add(&root, url, title, json).await,
        Commands::Rm { id, yes } => cmd_rm(&root, id, yes).await,
        Commands::Watch { query } => cmd_watch(&root, query).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(exit_code(&e));
    }
}

//
// Helper functions
//

fn exit_code(error: &anyhow::Error) -> i32 {
    if let Some(SyncError::Config(_)) = error.downcast_ref::<SyncError>() {
        return EXIT_CONFIG_ERROR;
    }
    if let Some(BlibError::ConfigError(_)) = error.downcast_ref::<BlibError>() {
        return EXIT_CONFIG_ERROR;
    }
    EXIT_ERROR
}

/// Load config, resolve the signed-in user and build the hosted store.
///
/// The identity is checked first so a signed-out user sees that before any
/// complaint about the remote settings.
fn connect(root: &Path) -> anyhow::Result<(Config, OwnerId, Arc<HostedStore>)> {
    let config = Config::load(root)?;

    let identity = match &config.auth.user_id {
        Some(user_id) => StaticIdentity::signed_in(user_id.clone()),
        None => StaticIdentity::signed_out(),
    };
    let owner = identity.current_user_id().ok_or(SyncError::NotSignedIn)?;

    let store = HostedStore::new(SyncConfig::from_config(&config))?;
    tracing::debug!(owner = %owner, "Connected to hosted store");
    Ok((config, owner, Arc::new(store)))
}

fn projection(config: &Config, query: Option<String>) -> Projection {
    Projection::new(query.unwrap_or_default()).with_favicon_size(config.view.favicon_size)
}

fn print_library(projection: &Projection, bookmarks: &[Bookmark], search_threshold: usize) {
    println!("{}", view::summary(bookmarks.len()));

    let rows = projection.rows(bookmarks, Utc::now());
    if rows.is_empty() {
        println!("{}", projection.empty_message());
        return;
    }

    for row in &rows {
        println!(
            "  {}  {}  ({}, {})",
            row.bookmark.id, row.bookmark.title, row.domain, row.age
        );
        println!("      {}", row.bookmark.url);
    }

    if projection.query().is_empty() && view::search_enabled(bookmarks.len(), search_threshold) {
        eprintln!("Tip: filter with `blib ls <query>`");
    }
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    eprint!("{} [y/N] ", prompt);
    std::io::stderr().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

//
// Command implementations
//

async fn cmd_init(root: &Path, force: bool) -> anyhow::Result<()> {
    let config_path = root.join(CONFIG_PATH);
    if config_path.exists() && !force {
        eprintln!("✓ {} already exists", CONFIG_PATH);
        return Ok(());
    }

    Config::write_template(root)?;
    eprintln!("✓ Created {}", CONFIG_PATH);
    eprintln!(
        "  Fill in [remote] project_url and anon_key, then sign in via [auth] user_id or {}",
        ENV_USER_ID
    );
    Ok(())
}

async fn cmd_ls(root: &Path, query: Option<String>, json: bool) -> anyhow::Result<()> {
    let (config, owner, store) = connect(root)?;
    let engine = ReconciliationEngine::new(owner, store);
    engine.resync().await?;

    let snapshot = engine.snapshot();
    let projection = projection(&config, query);

    if json {
        let rows = projection.rows(snapshot.as_slice(), Utc::now());
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print_library(&projection, snapshot.as_slice(), config.view.search_threshold);
    }
    Ok(())
}

async fn cmd_add(
    root: &Path,
    url: String,
    title: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let url = normalize_url(&url);
    if url.is_empty() {
        anyhow::bail!("URL cannot be empty");
    }
    let title = title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| derive_title(&url));

    let (_, owner, store) = connect(root)?;
    let engine = ReconciliationEngine::new(owner, store);
    let created = engine.add(&url, &title).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&created)?);
    } else {
        eprintln!("✓ Saved bookmark: {} {}", created.id, created.title);
    }
    Ok(())
}

async fn cmd_rm(root: &Path, id: String, yes: bool) -> anyhow::Result<()> {
    let (_, owner, store) = connect(root)?;
    let engine = ReconciliationEngine::new(owner, store);
    engine.resync().await?;

    let id = BookmarkId::new(id);
    if !engine.mark_pending_delete(&id) {
        anyhow::bail!("No bookmark with id {}", id);
    }

    if !yes {
        let title = engine
            .snapshot()
            .get(&id)
            .map(|b| b.title.clone())
            .unwrap_or_default();
        if !confirm(&format!("Delete \u{201c}{}\u{201d}?", title))? {
            engine.cancel_pending_delete();
            eprintln!("Cancelled");
            return Ok(());
        }
    }

    match engine.confirm_pending_delete().await? {
        Some(DeleteOutcome::Deleted) => eprintln!("✓ Deleted {}", id),
        _ => eprintln!("✓ {} was already gone", id),
    }
    Ok(())
}

async fn cmd_watch(root: &Path, query: Option<String>) -> anyhow::Result<()> {
    let (config, owner, store) = connect(root)?;
    let session = Session::open(&StaticIdentity::signed_in(owner.as_str()), store).await?;
    let projection = projection(&config, query);
    let threshold = config.view.search_threshold;

    let mut changes = session.engine().subscribe();
    let mut status = session.status_changes();

    let initial = changes.borrow_and_update().clone();
    print_library(&projection, initial.as_slice(), threshold);
    eprintln!("● {} (Ctrl-C to stop)", status.borrow_and_update().label());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = changes.borrow_and_update().clone();
                println!();
                print_library(&projection, snapshot.as_slice(), threshold);
            }
            changed = status.changed() => {
                if changed.is_err() {
                    eprintln!("⚠ Live updates stopped");
                    break;
                }
                let current = *status.borrow_and_update();
                eprintln!("● {}", current.label());
            }
        }
    }

    session.close().await;
    Ok(())
}
