mod decode;

use std::io::stderr;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
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
    /// Decode mode adaptation framed DVB-S2 baseband frames and the GSE frames they carry.
    ///
    /// Each input file must contain a single buffer as it was captured, starting with the
    /// mode adaptation sync byte 0xB8. Buffers that are not recognized are reported and
    /// skipped.
    Decode {
        /// Hex encoded buffers to decode in addition to any input files.
        #[arg(short = 'x', long, value_name = "hex")]
        hex: Vec<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: decode::Format,

        /// Fully dissect GSE payloads, handing IPv4 and IPv6 PDUs off rather than only
        /// reporting them as opaque bytes.
        #[arg(long, action)]
        full: bool,

        /// Write fully dissected IPv4 and IPv6 payloads to this file. Implies --full.
        #[arg(short, long, value_name = "path")]
        extract: Option<PathBuf>,

        /// Delete extract file if it already exists
        #[arg(long, action)]
        clobber: bool,

        /// Input files.
        inputs: Vec<PathBuf>,
    },
    /// Compute the baseband header CRC-8 of hex encoded bytes.
    Crc8 {
        /// Hex encoded bytes, e.g., the first 9 bytes of a baseband header
        hex: String,
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
            EnvFilter::try_from_env("DVBGSE_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Decode {
            hex,
            format,
            full,
            extract,
            clobber,
            inputs,
        } => {
            if let Some(path) = extract {
                if !clobber && path.exists() {
                    bail!("{path:?} exists; use --clobber");
                }
            }
            let mut sources = Vec::default();
            for (idx, s) in hex.iter().enumerate() {
                let buf = ::hex::decode(s.trim())
                    .with_context(|| format!("invalid hex buffer at {idx}"))?;
                sources.push(decode::Source::new(format!("hex[{idx}]"), buf));
            }
            for path in inputs {
                let buf = std::fs::read(path).with_context(|| format!("reading {path:?}"))?;
                sources.push(decode::Source::new(path.to_string_lossy().to_string(), buf));
            }
            if sources.is_empty() {
                bail!("nothing to decode; provide input files or --hex");
            }
            decode::decode(&sources, format, *full, extract.as_deref())
        }
        Commands::Crc8 { hex } => {
            let dat = ::hex::decode(hex.trim()).context("invalid hex")?;
            println!("0x{:02x}", dvbgse::integrity::compute_crc8(&dat));
            Ok(())
        }
    }
}
