//! Entry point for `udp-file-client`.
//!
//! Parses CLI arguments and dispatches into either **list** or **get** mode.
//! All protocol work is delegated to library modules; `main.rs` owns only
//! process setup (logging, argument parsing) and printing results.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use udp_file_client::config::{
    DEFAULT_HOST, DEFAULT_IDLE_TIMEOUT, DEFAULT_OVERALL_TIMEOUT, DEFAULT_PORT,
    DEFAULT_RECV_BUFFER,
};
use udp_file_client::{reassemble, write_file, Client, ClientConfig, Outcome};

/// Fetch files from a segmented-file UDP server.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Server host name or address.
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,
    /// Server UDP port.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Wait per receive call, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_IDLE_TIMEOUT.as_millis() as u64)]
    idle_timeout_ms: u64,
    /// Budget for a whole reply wait or transfer, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_OVERALL_TIMEOUT.as_millis() as u64)]
    overall_timeout_ms: u64,
    /// Receive buffer size in bytes.
    #[arg(long, default_value_t = DEFAULT_RECV_BUFFER)]
    recv_buffer: usize,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the files the server offers.
    List,
    /// Download one file.
    Get {
        /// Name as listed in the catalog.
        name: String,
        /// Directory to write the file into.
        #[arg(short, long, default_value = "received")]
        output: PathBuf,
    },
}

impl Cli {
    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.host.clone(), self.port);
        config.channel.recv_buffer = self.recv_buffer;
        config.collect.idle_timeout = Duration::from_millis(self.idle_timeout_ms);
        config.collect.overall_timeout = Duration::from_millis(self.overall_timeout_ms);
        config
    }
}

fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    let client = Client::new(cli.client_config());
    log::info!("talking to {}:{}", cli.host, cli.port);

    match cli.command {
        Command::List => {
            let catalog = client.fetch_catalog().context("fetching catalog")?;
            for name in &catalog.files {
                println!("{name}");
            }
        }
        Command::Get { name, output } => {
            let transfer = client
                .fetch_file(&name)
                .with_context(|| format!("fetching {name}"))?;
            let collection = &transfer.collection;
            if collection.outcome == Outcome::DeadlineExceeded {
                log::warn!(
                    "{name}: received {} of {} parts before the deadline",
                    collection.received(),
                    collection.expected
                );
            }

            let bytes = match reassemble(collection) {
                Ok(bytes) => bytes,
                Err(e) => bail!("{name}: incomplete transfer: {e}"),
            };
            let path = write_file(&output, &transfer.name, &bytes)
                .with_context(|| format!("writing {name} to {}", output.display()))?;
            println!("{}", path.display());
        }
    }

    Ok(())
}
