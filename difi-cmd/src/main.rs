mod info;
mod listen;

use std::io::stderr;
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use difi::config::DEFAULT_PORT;
use difi::{BitDepth, Config, ContextPolicy, TransportKind};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub enum Format {
    Json,
    Text,
}

impl clap::ValueEnum for Format {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Json, Self::Text]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::Json => Some(clap::builder::PossibleValue::new("json")),
            Self::Text => Some(clap::builder::PossibleValue::new("text")),
        }
    }
}

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Receive a live DIFI stream.
    ///
    /// Metadata events (context, sequence gaps, static header changes) are written to
    /// stdout as they arrive. Samples are only kept if --output is given.
    Listen {
        /// Accept a single TCP client rather than receiving UDP datagrams.
        #[arg(long, action)]
        tcp: bool,

        /// Local address to bind. An IPv4 multicast address joins that group.
        #[arg(short, long, default_value = "0.0.0.0")]
        address: String,

        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Drop packets that do not have this stream id.
        #[arg(short, long)]
        stream_id: Option<u32>,

        /// Bits per I and Q sample component, 8 or 16.
        #[arg(short, long, default_value = "16")]
        bit_depth: BitDepth,

        /// What to do with context packets that disagree with --bit-depth: ignore,
        /// warn-forward, warn-drop or abort.
        #[arg(long, default_value = "warn-drop")]
        policy: ContextPolicy,

        /// Stop after this many samples.
        #[arg(short, long)]
        count: Option<u64>,

        /// Write samples to this file as interleaved little-endian f32 I/Q.
        #[arg(short, long, value_name = "path")]
        output: Option<PathBuf>,

        /// Delete output file if it already exists
        #[arg(long, action)]
        clobber: bool,

        /// Event output format
        #[arg(short, long, default_value = "text")]
        format: Format,
    },
    /// Show information about a captured DIFI byte stream.
    ///
    /// The capture must contain packets back to back, as received over TCP.
    Info {
        /// Input capture file
        input: PathBuf,

        /// Drop packets that do not have this stream id.
        #[arg(short, long)]
        stream_id: Option<u32>,

        /// Bits per I and Q sample component, 8 or 16.
        #[arg(short, long, default_value = "16")]
        bit_depth: BitDepth,

        /// What to do with context packets that disagree with --bit-depth.
        #[arg(long, default_value = "warn-drop")]
        policy: ContextPolicy,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: Format,
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
            EnvFilter::try_from_env("DIFI_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Listen {
            tcp,
            address,
            port,
            stream_id,
            bit_depth,
            policy,
            count,
            output,
            clobber,
            format,
        } => {
            if let Some(output) = output {
                if !clobber && output.exists() {
                    bail!("{output:?} exists; use --clobber");
                }
            }
            let config = Config {
                address: address.clone(),
                port: *port,
                transport: if *tcp {
                    TransportKind::Tcp
                } else {
                    TransportKind::Udp
                },
                stream_id: *stream_id,
                bit_depth: *bit_depth,
                context_policy: *policy,
                ..Config::default()
            };
            info!(
                address = %config.address,
                port = config.port,
                transport = ?config.transport,
                "receiving"
            );
            listen::listen(config, *count, output.as_deref(), format)
        }
        Commands::Info {
            input,
            stream_id,
            bit_depth,
            policy,
            format,
        } => {
            let config = Config {
                stream_id: *stream_id,
                bit_depth: *bit_depth,
                context_policy: *policy,
                ..Config::default()
            };
            info::info(input, config, format)
        }
    }
}
