//! CLI command definitions and argument parsing

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use jpake_core::{
    http_rendezvous::HttpRendezvous, AbortHandle, AbortReason, PairingConfig, PairingSession,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::{console::ConsoleController, ExitCode};

/// jpake - pair two devices with a PIN and hand over credentials
#[derive(Parser, Debug)]
#[command(name = "jpake")]
#[command(version, about = "Pair two devices with a PIN and hand over credentials")]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Debug mode (protocol-level tracing)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Rendezvous server URL
    #[arg(long, global = true)]
    pub server_url: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show a PIN and wait for credentials from the sending device
    Receive,
    /// Pair with a device showing a PIN and send it credentials
    Pair(PairArgs),
}

#[derive(Args, Debug)]
pub struct PairArgs {
    /// PIN shown on the receiving device
    pub pin: String,

    /// Credentials as JSON, or @path to read them from a file
    #[arg(long)]
    pub credentials: String,
}

impl Cli {
    /// Load the configuration: `--config` file, else environment, then flags.
    pub fn load_config(&self) -> anyhow::Result<PairingConfig> {
        let mut config = match &self.config {
            Some(path) => PairingConfig::from_toml(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => PairingConfig::from_env()?,
        };
        if let Some(url) = &self.server_url {
            config.server_url = url.clone();
        }
        config.validate()?;
        Ok(config)
    }

    /// Execute the CLI command with a pre-loaded configuration
    pub async fn execute_with_config(self, config: PairingConfig) -> anyhow::Result<ExitCode> {
        let transport = Arc::new(HttpRendezvous::new(
            config.server_url.clone(),
            config.request_timeout(),
        )?);
        debug!(server = %config.server_url, "using rendezvous server");

        match self.command {
            Commands::Receive => {
                let controller = Arc::new(ConsoleController::receiver());
                let mut session = PairingSession::new(config, transport, controller);
                abort_on_ctrl_c(session.abort_handle());
                session.receive_no_pin().await?;
                Ok(ExitCode::from_outcome(session.outcome()))
            }
            Commands::Pair(args) => {
                let credentials = match load_credentials(&args.credentials) {
                    Ok(credentials) => credentials,
                    Err(e) => {
                        eprintln!("Invalid credentials: {e:#}");
                        return Ok(ExitCode::InvalidInput);
                    }
                };
                let controller = Arc::new(ConsoleController::sender());
                let mut session = PairingSession::new(config, transport, controller);
                abort_on_ctrl_c(session.abort_handle());

                session.pair_with_pin(&args.pin).await?;
                if session.is_paired() {
                    info!("paired, sending credentials");
                    session.send_credentials(credentials).await?;
                }
                Ok(ExitCode::from_outcome(session.outcome()))
            }
        }
    }
}

/// Parse `--credentials`: inline JSON, or `@path` to a JSON file.
pub fn load_credentials(arg: &str) -> anyhow::Result<Value> {
    let text = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?,
        None => arg.to_string(),
    };
    let value: Value = serde_json::from_str(&text).context("credentials must be JSON")?;
    Ok(value)
}

fn abort_on_ctrl_c(handle: AbortHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() && !handle.is_finished() {
            handle.abort(AbortReason::UserAbort);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_pair_command() {
        let cli = Cli::try_parse_from([
            "jpake",
            "--server-url",
            "https://rendezvous.example",
            "pair",
            "abcd-efgh-k7q2",
            "--credentials",
            r#"{"user":"x"}"#,
        ])
        .unwrap();
        let Commands::Pair(args) = &cli.command else {
            panic!("expected pair");
        };
        assert_eq!(args.pin, "abcd-efgh-k7q2");
        let config = cli.load_config().unwrap();
        assert_eq!(config.server_url, "https://rendezvous.example");
    }

    #[test]
    fn test_pair_requires_credentials() {
        assert!(Cli::try_parse_from(["jpake", "pair", "abcdefghk7q2"]).is_err());
    }

    #[test]
    fn test_load_credentials_inline_and_file() {
        assert_eq!(load_credentials(r#"{"a":1}"#).unwrap()["a"], 1);
        assert!(load_credentials("not json").is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"account":"me"}}"#).unwrap();
        let arg = format!("@{}", file.path().display());
        assert_eq!(load_credentials(&arg).unwrap()["account"], "me");
    }

    #[test]
    fn test_config_file_and_flag_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server_url = \"https://from-file.example\"\nmax_tries = 7").unwrap();
        let path = file.path().display().to_string();

        let cli = Cli::try_parse_from(["jpake", "--config", &path, "receive"]).unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.server_url, "https://from-file.example");
        assert_eq!(config.max_tries, 7);

        let cli = Cli::try_parse_from([
            "jpake",
            "--config",
            &path,
            "--server-url",
            "https://flag.example",
            "receive",
        ])
        .unwrap();
        assert_eq!(cli.load_config().unwrap().server_url, "https://flag.example");
    }
}
