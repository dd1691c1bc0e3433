use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use harness_provider::config::{FileConfig, Overrides, ProviderConfig};
use harness_provider::harness::HarnessClient;
use harness_provider::provider::{Document, Provider};
use harness_provider::resource::Diagnostics;
use harness_provider::sweep::{Sweeper, DEFAULT_PREFIX};
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Manage Harness entities as Terraform resources
#[derive(Parser, Debug)]
#[command(name = "terraform-provider-harness", version = harness_provider::VERSION, about, long_about = None)]
struct Args {
    /// Harness gateway URL
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Harness account identifier
    #[arg(long, global = true)]
    account_id: Option<String>,

    /// Config file (defaults to <config_dir>/harness-provider/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List resource and data source types
    Resources,
    /// Print the declared schema of a type
    Schema { type_name: String },
    /// Create a resource from a configuration document
    Create { type_name: String, config: PathBuf },
    /// Refresh a state document
    Read { type_name: String, state: PathBuf },
    /// Apply a configuration document on top of a state document
    Update {
        type_name: String,
        state: PathBuf,
        config: PathBuf,
    },
    /// Delete the object a state document refers to
    Delete { type_name: String, state: PathBuf },
    /// Import an existing object by its composite id
    Import { type_name: String, id: String },
    /// Read a data source
    Data { type_name: String, config: PathBuf },
    /// Show what applying a configuration would change
    Plan {
        type_name: String,
        config: PathBuf,
        /// Prior state, omitted for a new object
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Save --endpoint and --account-id to the config file
    Configure,
    /// Delete leftover test applications
    Sweep {
        #[arg(long, default_value = DEFAULT_PREFIX)]
        prefix: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("terraform-provider-harness {} started with log level: {:?}", harness_provider::VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("harness-provider").join("provider.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".harness-provider").join("provider.log");
    }
    PathBuf::from("provider.log")
}

/// Read a JSON object from a file, `-` reads stdin
fn read_document(path: &Path) -> Result<Document> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read document from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?
    };

    match serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))? {
        Value::Object(map) => Ok(map),
        _ => bail!("{} must contain a JSON object", path.display()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report(diags: &Diagnostics) {
    for diagnostic in diags.iter() {
        eprintln!("{}", diagnostic);
    }
}

/// Persist the connection flags into the config file, keeping anything
/// already stored there
fn configure(path: Option<&Path>, overrides: &Overrides, mut file: FileConfig) -> Result<PathBuf> {
    let path = match path.map(Path::to_path_buf).or_else(FileConfig::default_path) {
        Some(path) => path,
        None => bail!("No configuration directory available, pass --config"),
    };
    if overrides.endpoint.is_none() && overrides.account_id.is_none() {
        bail!("Nothing to save, pass --endpoint and/or --account-id");
    }

    if overrides.endpoint.is_some() {
        file.endpoint = overrides.endpoint.clone();
    }
    if overrides.account_id.is_some() {
        file.account_id = overrides.account_id.clone();
    }
    ProviderConfig::resolve(&Overrides::default(), &file)?;

    file.save(&path)
        .with_context(|| format!("Failed to save config file {}", path.display()))?;
    tracing::info!("Saved configuration to {:?}", path);
    Ok(path)
}

async fn run(args: Args) -> Result<ExitCode> {
    let file = FileConfig::load(args.config.as_deref())?;
    let overrides = Overrides {
        endpoint: args.endpoint.clone(),
        account_id: args.account_id.clone(),
    };
    let config = ProviderConfig::resolve(&overrides, &file)?;
    tracing::debug!("Resolved configuration: {:?}", config);

    // Listing types and saving config need no credentials
    let client = match args.command {
        Command::Resources | Command::Schema { .. } | Command::Configure => HarnessClient::with_credentials(
            &config.endpoint,
            config.account_id.as_deref().unwrap_or_default(),
            Default::default(),
        )?,
        _ => HarnessClient::new(&config)?,
    };
    let provider = Provider::new(client);

    let outcome: Result<Value, Diagnostics> = match args.command {
        Command::Resources => Ok(serde_json::json!({
            "resources": provider.resource_types(),
            "data_sources": provider.data_source_types(),
        })),
        Command::Schema { type_name } => provider
            .schema(&type_name)
            .and_then(|s| serde_json::to_value(s).map_err(|e| Diagnostics::error(e.to_string()))),
        Command::Create { type_name, config } => {
            let config = read_document(&config)?;
            provider.create(&type_name, config).await.map(Value::Object)
        }
        Command::Read { type_name, state } => {
            let state = read_document(&state)?;
            provider
                .read(&type_name, state)
                .await
                .map(|s| s.map(Value::Object).unwrap_or(Value::Null))
        }
        Command::Update {
            type_name,
            state,
            config,
        } => {
            let state = read_document(&state)?;
            let config = read_document(&config)?;
            provider
                .update(&type_name, state, config)
                .await
                .map(|s| s.map(Value::Object).unwrap_or(Value::Null))
        }
        Command::Delete { type_name, state } => {
            let state = read_document(&state)?;
            provider.delete(&type_name, state).await.map(|()| Value::Null)
        }
        Command::Import { type_name, id } => provider.import(&type_name, &id).await.map(Value::Object),
        Command::Data { type_name, config } => {
            let config = read_document(&config)?;
            provider.read_data_source(&type_name, config).await.map(Value::Object)
        }
        Command::Plan {
            type_name,
            config,
            state,
        } => {
            let config = read_document(&config)?;
            let state = state.as_deref().map(read_document).transpose()?;
            provider
                .plan(&type_name, state.as_ref(), config)
                .and_then(|p| serde_json::to_value(p).map_err(|e| Diagnostics::error(e.to_string())))
        }
        Command::Configure => {
            let path = configure(args.config.as_deref(), &overrides, file)?;
            Ok(serde_json::json!({ "saved": path.display().to_string() }))
        }
        Command::Sweep { prefix } => Sweeper::new(provider.client())
            .with_prefix(prefix)
            .sweep_applications()
            .await
            .map(|n| serde_json::json!({ "deleted": n }))
            .map_err(Diagnostics::from),
    };

    match outcome {
        Ok(value) => {
            print_json(&value)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(diags) => {
            tracing::error!("{}", diags);
            report(&diags);
            Ok(ExitCode::FAILURE)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = match setup_logging(args.log_level) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error: {err:?}");
            return ExitCode::FAILURE;
        }
    };

    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}
