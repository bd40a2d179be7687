//! Release-template forge CLI

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use tracing::error;

use relforge::app::options::AppOptions;
use relforge::config::load_config;
use relforge::errors::ForgeError;
use relforge::http::XlrClient;
use relforge::logs::{init_logging, LogLevel, LogOptions};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_TIME"),
    ")"
);

#[derive(Parser, Debug)]
#[command(
    name = "relforge",
    version,
    long_version = LONG_VERSION,
    about = "Generate release templates from a YAML deployment specification"
)]
struct Cli {
    /// Path to the YAML deployment specification
    config: PathBuf,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Explicit log level, overrides -v
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    /// Directory for daily log files
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Emit JSON-formatted logs
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn options(&self) -> AppOptions {
        let log_level = self.log_level.clone().unwrap_or(match self.verbose {
            0 => LogLevel::Info,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        });
        AppOptions {
            config_path: self.config.clone(),
            logs: LogOptions {
                log_level,
                stdout: true,
                log_dir: self.log_dir.clone(),
                json_format: self.json_logs,
            },
        }
    }
}

#[tokio::main]
async fn main() {
    let options = Cli::parse().options();

    let _guard = match init_logging(options.logs.clone()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            process::exit(1);
        }
    };

    if let Err(err) = try_main(&options).await {
        error!("{}", err);
        eprintln!("{} {}", "error:".red().bold(), err);
        process::exit(1);
    }
}

async fn try_main(options: &AppOptions) -> Result<(), ForgeError> {
    let config = load_config(&options.config_path)?;
    let base_url = config.orchestrator.base_url.clone();
    let client = XlrClient::new(
        &base_url,
        &config.auth.username,
        config.auth.password.clone(),
    )?;
    relforge::app::run::run(Arc::new(client), config, &base_url).await?;
    Ok(())
}
