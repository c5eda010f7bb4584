mod decode;
mod read;
mod relay;

use std::io::stderr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read AIS sentences from a receiver and forward them over UDP.
    ///
    /// Every sentence with a valid checksum is sent, with its line terminator, as a
    /// single datagram. Invalid sentences are logged and dropped.
    Read {
        /// Receiver device or file, or - for stdin.
        ///
        /// A serial device must already be configured for the receiver's line speed in raw
        /// mode, e.g., using stty.
        #[arg(short = 'l', long, default_value = "/dev/ttyS0", value_name = "path")]
        device: PathBuf,

        /// Exit with an error if the device is silent this long. 0 waits forever.
        #[arg(short = 't', long, default_value_t = 3600, value_name = "secs")]
        idle_timeout: u64,

        /// Destination for forwarded sentences.
        #[arg(short = 'H', long, default_value = "data.aishub.net:2500", value_name = "host:port")]
        dest: String,

        /// Also log sentences to <dir>/YYYYMMDD/aisHH.log, rotated hourly.
        #[arg(short, long, value_name = "dir")]
        data_dir: Option<PathBuf>,
    },
    /// Relay UDP datagrams from one address to one or more destinations.
    Relay {
        /// Address to listen on. Port defaults to 4321.
        #[arg(value_name = "src[:port]")]
        source: String,

        /// Addresses to forward to. Port defaults to 2500.
        #[arg(value_name = "dst[:port]", required = true)]
        dests: Vec<String>,
    },
    /// Decode a file of AIS sentences.
    Decode {
        /// Input file containing one sentence per line.
        input: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: decode::Format,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_ansi(false)
        .without_time()
        .with_env_filter(
            EnvFilter::try_from_env("AIS_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Read {
            device,
            idle_timeout,
            dest,
            data_dir,
        } => {
            let idle_timeout = (*idle_timeout > 0).then(|| Duration::from_secs(*idle_timeout));
            read::read(device, dest, data_dir.as_deref(), idle_timeout)
        }
        Commands::Relay { source, dests } => relay::relay(source, dests),
        Commands::Decode { input, format } => decode::decode(input, format),
    }
}
