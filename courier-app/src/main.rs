//! courier: send spreadsheets line by line, watch for duplicate reports.
//!
//! ```text
//! courier send --file numbers.xlsx --recipient @lookup_bot --mode columns
//! courier status
//! courier stop
//! courier monitor --recipient @lookup_bot --conversations groups.json
//! ```
//!
//! This binary talks to a console messenger (dry run); plug a real platform
//! in by implementing `courier::Messenger`.

mod console;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use courier::client::JsonFileBackend;
use courier::{
    JobInput, MonitorConfig, PipelineConfig, ReplyMonitor, SendMode, SendPipeline, SqliteBackend,
    StateStore,
};
use tokio_util::sync::CancellationToken;

use console::ConsoleMessenger;

#[derive(Parser)]
#[command(name = "courier")]
#[command(version, about = "Bulk sender with persisted progress and reply correlation", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// State store: `*.db`/`*.sqlite` for SQLite, anything else is a directory of JSON files
    #[arg(long, global = true, env = "COURIER_STORE", default_value = "courier.db")]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send every unit of a file or text block to one recipient
    Send {
        #[command(flatten)]
        input: InputArgs,

        /// Recipient handle, phone or id
        #[arg(long, short)]
        recipient: String,

        /// Seconds to wait after each successful send
        #[arg(long, default_value_t = 0)]
        delay: u64,

        /// Start even if the store says another job is running
        #[arg(long)]
        force: bool,
    },
    /// Ask the running send job to stop
    Stop,
    /// Show progress of the current or last send job
    Status {
        /// Print the raw JSON documents
        #[arg(long)]
        json: bool,
    },
    /// Show the messages a file or text block would produce
    Preview {
        #[command(flatten)]
        input: InputArgs,

        /// Messages shown per batch
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Watch reports and answer duplicates in the originating group
    Monitor {
        /// Only reports from this handle count
        #[arg(long, short)]
        recipient: Option<String>,

        /// Restrict scans to these group ids
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        groups: Vec<i64>,

        /// Duplicate window in seconds
        #[arg(long)]
        window: Option<i64>,

        /// JSON fixture with conversations and their history
        #[arg(long)]
        conversations: Option<PathBuf>,
    },
}

#[derive(Args)]
struct InputArgs {
    /// `.xlsx`, `.csv` or `.txt` file
    #[arg(long, short, required_unless_present = "text", conflicts_with = "text")]
    file: Option<PathBuf>,

    /// Values entered by hand, one per line
    #[arg(long, short)]
    text: Option<String>,

    /// `columns`: every cell on its own; `rows`: one message per row
    #[arg(long, short, default_value = "columns")]
    mode: SendMode,
}

impl InputArgs {
    fn job_input(&self) -> std::io::Result<JobInput> {
        match (&self.file, &self.text) {
            (Some(path), _) => Ok(JobInput::File {
                filename: path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
                bytes:    std::fs::read(path)?,
            }),
            (None, Some(text)) => Ok(JobInput::Text(text.clone())),
            (None, None) => Ok(JobInput::Text(String::new())),
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("courier=info")).init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("✗ {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(&cli.store)?;

    match cli.command {
        Commands::Send { input, recipient, delay, force } => {
            let current = store.load_sending()?;
            if current.is_sending && !force {
                return Err(format!(
                    "a job to {} is already running ({}/{}); use `courier stop` or --force",
                    current.current_recipient, current.current_message, current.total_messages
                ).into());
            }

            let config = PipelineConfig { delay: Duration::from_secs(delay), ..Default::default() };
            let pipeline = SendPipeline::new(Arc::new(ConsoleMessenger::new()), store, config);
            stop_on_ctrl_c(pipeline.stop_token());

            let state = pipeline.run_job(input.job_input()?, &recipient, input.mode).await?;
            println!(
                "✅ {} sent, {} failed ({}/{} attempted)",
                state.sent_count, state.failed_count, state.current_message, state.total_messages
            );
        }

        Commands::Stop => {
            if store.request_stop()? {
                println!("🛑 Stop requested");
            } else {
                println!("No send job is running");
            }
        }

        Commands::Status { json } => {
            let sending = store.load_sending()?;
            let reply = store.load_reply()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&sending)?);
                println!("{}", serde_json::to_string_pretty(&reply)?);
                return Ok(());
            }
            let phase = match (sending.is_sending, sending.is_paused) {
                (true, true) => format!("cooling down, {}s left", sending.pause_countdown),
                (true, false) => "sending".to_owned(),
                (false, _) => "idle".to_owned(),
            };
            println!("📤 {phase}");
            println!("   recipient : {}", sending.current_recipient);
            println!("   progress  : {}/{} ({:.0}%)", sending.current_message, sending.total_messages, sending.progress() * 100.0);
            println!("   sent      : {}  failed: {}", sending.sent_count, sending.failed_count);
            println!("   speed     : {:.1}/min  eta: {}s", sending.sending_speed, sending.estimated_remaining);
            if let Some(started) = sending.start_time.and_then(|t| chrono::DateTime::from_timestamp(t, 0)) {
                println!("   started   : {}", started.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            println!(
                "👂 monitoring: {}  reports: {}  duplicates: {}  indexed: {}  replied: {}",
                reply.monitoring,
                reply.total_replies(),
                reply.total_duplicates(),
                reply.group_numbers.entry_count(),
                reply.found_matches.len()
            );
        }

        Commands::Preview { input, limit } => {
            let table = input.job_input()?.into_table()?;
            let batches = table.plan(input.mode);
            println!("{} column(s), {} row(s), mode {}", table.columns().len(), table.len(), input.mode);
            for batch in &batches {
                println!("── {} ({} message(s))", batch.label, batch.messages.len());
                for message in batch.messages.iter().take(limit) {
                    println!("   {message}");
                }
                if batch.messages.len() > limit {
                    println!("   …");
                }
            }
        }

        Commands::Monitor { recipient, groups, window, conversations } => {
            let mut messenger = ConsoleMessenger::new();
            if let Some(path) = &conversations {
                messenger = messenger.with_fixture(path)?;
            }
            let monitor = ReplyMonitor::new(Arc::new(messenger), store.clone(), MonitorConfig::default());
            if recipient.is_some() {
                monitor.set_target_recipient(recipient)?;
            }
            if !groups.is_empty() {
                monitor.set_target_groups(groups)?;
            }
            if let Some(secs) = window {
                monitor.set_duplicate_window(secs)?;
            }

            let cancel = CancellationToken::new();
            stop_on_ctrl_c(cancel.clone());
            println!("👂 Reading reports from stdin as `sender: text` (Ctrl+C to quit) …");
            monitor.run(cancel).await?;

            let reply = store.load_reply()?;
            println!("{} report(s), {} duplicate(s), {} auto-repl(ies)", reply.total_replies(), reply.total_duplicates(), reply.found_matches.len());
        }
    }

    Ok(())
}

fn open_store(path: &Path) -> std::io::Result<StateStore> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("db" | "sqlite" | "sqlite3") => Ok(StateStore::new(Arc::new(SqliteBackend::new(path)?))),
        _ => Ok(StateStore::new(Arc::new(JsonFileBackend::new(path)?))),
    }
}

fn stop_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n🛑 Stopping after the current message …");
            token.cancel();
        }
    });
}
