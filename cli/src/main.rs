#[cfg(test)]
#[path = "main_test.rs"]
mod main_test;

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use scrapbook::clock::{Clock, SystemClock};
use scrapbook::config::EditorConfig;
use scrapbook::drafts::{DraftError, DraftIndex, DraftSummary};
use scrapbook::element::StickyPatch;
use scrapbook::normalize::normalize_str;
use scrapbook::session::{Seed, Session, WriteOutcome};
use scrapbook::storage::{FileStorage, KeyValueStore, StorageError};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("draft index error: {0}")]
    Drafts(#[from] DraftError),
    #[error("read failed: {0}")]
    Io(#[from] io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0} is not a board snapshot")]
    NotABoard(String),
    #[error("no stored board named {0}")]
    UnknownBoard(String),
    #[error("board {0} could not be saved")]
    WriteFailed(String),
}

#[derive(Parser, Debug)]
#[command(name = "scrapbook", about = "Inspect and edit locally stored scrapbook boards")]
struct Cli {
    /// Directory holding one file per storage key.
    #[arg(long, env = "SCRAPBOOK_DATA_DIR", default_value = ".scrapbook")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a board as it would hydrate.
    Show {
        doc_id: String,
        #[arg(long, default_value = "")]
        background: String,
    },
    /// Normalize a snapshot file (or - for stdin) and print the result.
    Normalize {
        #[arg(default_value = "-")]
        input: String,
    },
    /// Add a sticky note to a board and save it.
    AddNote {
        doc_id: String,
        #[arg(long, default_value = "")]
        text: String,
        #[arg(long)]
        title: Option<String>,
    },
    /// Remove text, sticky notes and background from a board.
    Clear { doc_id: String },
    /// List draft summaries, newest first.
    Drafts,
    /// List recently edited boards.
    Recents,
}

fn main() -> Result<(), CliError> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("ignoring unreadable .env: {e}");
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = EditorConfig::from_env();
    let storage = FileStorage::open(&cli.data_dir)?;
    info!(data_dir = %cli.data_dir.display(), "storage opened");

    match cli.command {
        Command::Show { doc_id, background } => run_show(storage, config, &doc_id, &background),
        Command::Normalize { input } => run_normalize(&input),
        Command::AddNote { doc_id, text, title } => run_add_note(storage, config, &doc_id, text, title),
        Command::Clear { doc_id } => run_clear(storage, config, &doc_id),
        Command::Drafts => run_drafts(storage, config),
        Command::Recents => run_recents(storage, config),
    }
}

fn open(storage: FileStorage, config: EditorConfig, doc_id: &str, background: &str) -> Session<FileStorage, SystemClock> {
    let mut session = Session::new(storage, SystemClock, config);
    session.open(doc_id, Seed::background(background));
    session
}

fn run_show(storage: FileStorage, config: EditorConfig, doc_id: &str, background: &str) -> Result<(), CliError> {
    let session = open(storage, config, doc_id, background);
    print_json(&serde_json::to_value(session.snapshot())?)
}

fn run_normalize(input: &str) -> Result<(), CliError> {
    let raw = if input == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(input)?
    };
    let snapshot = normalize_str(&raw, SystemClock.now_ms()).ok_or_else(|| CliError::NotABoard(input.to_owned()))?;
    print_json(&serde_json::to_value(snapshot)?)
}

fn run_add_note(
    storage: FileStorage,
    config: EditorConfig,
    doc_id: &str,
    text: String,
    title: Option<String>,
) -> Result<(), CliError> {
    let drafts = DraftIndex::new(storage.clone(), config.clone());
    let mut session = open(storage, config, doc_id, "");
    let id = session.edit(|store| {
        let id = store.add_sticky_note();
        store.update_sticky_by_id(&id, &StickyPatch { text: Some(text), ..StickyPatch::default() });
        id
    });
    save(&mut session, doc_id)?;

    let title = match (title, drafts.get(doc_id)?) {
        (Some(title), _) => title,
        (None, Some(existing)) => existing.title,
        (None, None) => doc_id.to_owned(),
    };
    let summary = DraftSummary::describe(title, session.snapshot());
    drafts.upsert(doc_id, summary.clone())?;
    for evicted in drafts.touch_recent(doc_id, summary)? {
        warn!(doc_id = %evicted, "board evicted from recents");
    }
    println!("{id}");
    Ok(())
}

fn run_clear(storage: FileStorage, config: EditorConfig, doc_id: &str) -> Result<(), CliError> {
    if storage.get(&config.board_key(doc_id))?.is_none() {
        return Err(CliError::UnknownBoard(doc_id.to_owned()));
    }
    let mut session = open(storage, config, doc_id, "");
    session.edit(scrapbook::store::DocStore::clear);
    save(&mut session, doc_id)?;
    let snap = session.snapshot();
    info!(doc_id, remaining = snap.element_count(), "board cleared");
    Ok(())
}

/// Flush pending edits, failing if storage rejected them.
fn save(session: &mut Session<FileStorage, SystemClock>, doc_id: &str) -> Result<(), CliError> {
    match session.flush() {
        WriteOutcome::Failed => Err(CliError::WriteFailed(doc_id.to_owned())),
        WriteOutcome::Persisted | WriteOutcome::Idle => Ok(()),
    }
}

fn run_drafts(storage: FileStorage, config: EditorConfig) -> Result<(), CliError> {
    let drafts = DraftIndex::new(storage, config).list()?;
    let rows: Vec<Value> = drafts
        .into_iter()
        .map(|(doc_id, summary)| -> Result<Value, serde_json::Error> {
            let mut row = serde_json::to_value(summary)?;
            if let Value::Object(map) = &mut row {
                map.insert("docId".to_owned(), Value::String(doc_id));
            }
            Ok(row)
        })
        .collect::<Result<_, _>>()?;
    print_json(&Value::Array(rows))
}

fn run_recents(storage: FileStorage, config: EditorConfig) -> Result<(), CliError> {
    let recents = DraftIndex::new(storage, config).recents()?;
    print_json(&serde_json::to_value(recents)?)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
