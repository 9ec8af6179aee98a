//! persp-ctl - Manage CloudHealth perspectives from TOML intent files
//!
//! Network commands (create, read, update, delete, import, plan) need an API
//! key; `encode` and `decode` run the codec offline.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use persp_common::config::{resolve_api_key, resolve_state_dir, LoggingConfig, TomlConfig};
use persp_common::intent::load_intent;
use persp_common::{decode, encode};
use persp_ctl::{HttpTransport, Lifecycle, StateStore};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for persp-ctl
#[derive(Parser, Debug)]
#[command(name = "persp-ctl")]
#[command(about = "Manage CloudHealth perspectives from TOML intent files")]
#[command(version)]
struct Args {
    /// Config file (default: <config_dir>/persp/config.toml)
    #[arg(long, global = true, env = "PERSP_CONFIG")]
    config: Option<PathBuf>,

    /// CloudHealth API key
    #[arg(long, global = true, env = "PERSP_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Directory holding state records
    #[arg(long, global = true, env = "PERSP_STATE_DIR")]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a perspective from an intent file
    Create { label: String, intent: PathBuf },
    /// Refresh the stored state from the server
    Read { label: String },
    /// Push an intent file over an existing perspective
    Update { label: String, intent: PathBuf },
    /// Delete a perspective and its state
    Delete { label: String },
    /// Start managing an existing perspective by id
    Import { label: String, id: String },
    /// Show authored differences between intent and the server
    Plan { label: String, intent: PathBuf },
    /// Print the JSON an intent file encodes to
    Encode { intent: PathBuf },
    /// Decode a server response (file or `-` for stdin) and print the model
    Decode { response: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, source) =
        TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.logging)?;

    info!("Starting persp-ctl v{}", env!("CARGO_PKG_VERSION"));
    source.log();

    match args.command {
        Command::Encode { intent } => {
            let mut perspective = load_intent(&intent)?;
            let body = encode(&mut perspective)?;
            println!("{}", String::from_utf8_lossy(&body));
            return Ok(());
        }
        Command::Decode { response } => {
            let body = read_input(&response)?;
            let perspective = decode(&body)?;
            println!("{}", serde_json::to_string_pretty(&perspective)?);
            return Ok(());
        }
        _ => {}
    }

    let api_key = resolve_api_key(args.api_key.as_deref(), &config)?;
    let state_dir = resolve_state_dir(args.state_dir.as_deref(), &config);
    info!("State directory: {}", state_dir.display());

    let transport = HttpTransport::new(
        config.api_url.clone(),
        api_key,
        Duration::from_secs(config.timeout_secs),
    )?;
    let lifecycle = Lifecycle::new(transport, StateStore::new(state_dir));

    match args.command {
        Command::Create { label, intent } => {
            let record = lifecycle.create(&label, load_intent(&intent)?).await?;
            println!("Perspective {} created", record.id);
        }
        Command::Read { label } => {
            let record = lifecycle.read(&label).await?;
            println!("{}", serde_json::to_string_pretty(&record.perspective)?);
        }
        Command::Update { label, intent } => {
            let record = lifecycle.update(&label, load_intent(&intent)?).await?;
            println!("Perspective {} updated", record.id);
        }
        Command::Delete { label } => {
            lifecycle.delete(&label).await?;
            println!("Perspective `{}` deleted", label);
        }
        Command::Import { label, id } => {
            let record = lifecycle.import(&label, &id).await?;
            println!(
                "Imported perspective {} ({} groups)",
                record.id,
                record.perspective.groups.len()
            );
        }
        Command::Plan { label, intent } => {
            let changes = lifecycle.plan(&label, &load_intent(&intent)?).await?;
            if changes.is_empty() {
                println!("No changes.");
            } else {
                for change in changes {
                    println!("  ~ {}", change);
                }
            }
        }
        Command::Encode { .. } | Command::Decode { .. } => unreachable!("handled offline above"),
    }

    Ok(())
}

/// Initialize tracing: `RUST_LOG` wins over the configured level; a
/// configured log file replaces stderr output
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let file_layer = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
        }
        None => None,
    };
    let stderr_layer = file_layer
        .is_none()
        .then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}
