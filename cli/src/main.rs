//! Spanline CLI
//!
//! Command-line tool for preparing and inspecting span payloads accepted by
//! the Spanline collector.
//!
//! # Usage
//!
//! ```bash
//! spanline --help
//! spanline encode spans.json --format proto --gzip -o spans.bin
//! spanline decode spans.bin --format proto --gzip
//! ```

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use shared::codec::{decode_spans, encode_spans, SpanFormat};
use shared::compression::{gunzip, gzip};
use shared::models::Span;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Spanline CLI - span payload tooling
#[derive(Parser)]
#[command(name = "spanline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a JSON span list into an upload body
    Encode {
        /// Input JSON file ("-" for stdin)
        #[arg(default_value = "-")]
        input: PathBuf,
        /// Wire format of the output
        #[arg(short, long, value_enum, default_value_t = WireFormat::Json)]
        format: WireFormat,
        /// Gzip the output
        #[arg(long)]
        gzip: bool,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Decode an upload body and print its spans as JSON
    Decode {
        /// Input file ("-" for stdin)
        #[arg(default_value = "-")]
        input: PathBuf,
        /// Wire format of the input
        #[arg(short, long, value_enum, default_value_t = WireFormat::Json)]
        format: WireFormat,
        /// Gunzip the input first
        #[arg(long)]
        gzip: bool,
        /// Validate every span and fail on the first invalid one
        #[arg(long)]
        validate: bool,
    },
}

/// Span list encodings accepted by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum WireFormat {
    Json,
    Proto,
}

impl From<WireFormat> for SpanFormat {
    fn from(format: WireFormat) -> Self {
        match format {
            WireFormat::Json => Self::Json,
            WireFormat::Proto => Self::Proto,
        }
    }
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("Failed to read stdin")?;
        Ok(buf)
    } else {
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
    }
}

fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
        }
        None => std::io::stdout()
            .write_all(bytes)
            .context("Failed to write stdout"),
    }
}

/// Turns a JSON span list into an upload body.
fn encode(json: &[u8], format: WireFormat, compress: bool) -> Result<Vec<u8>> {
    let spans = decode_spans(SpanFormat::Json, json).context("Input is not a JSON span list")?;
    tracing::debug!(spans = spans.len(), ?format, "Encoding spans");
    let body = encode_spans(format.into(), &spans)?;
    if compress {
        return gzip(&body).context("Failed to gzip output");
    }
    Ok(body)
}

/// Turns an upload body back into spans.
fn decode(body: &[u8], format: WireFormat, decompress: bool, validate: bool) -> Result<Vec<Span>> {
    let body = if decompress {
        gunzip(body).context("Cannot gunzip input")?
    } else {
        body.to_vec()
    };
    let spans = decode_spans(format.into(), &body)?;
    if validate {
        for span in &spans {
            span.validate_span()?;
        }
    }
    Ok(spans)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Encode {
            input,
            format,
            gzip,
            output,
        } => {
            let body = encode(&read_input(&input)?, format, gzip)?;
            write_output(output.as_deref(), &body)?;
        }
        Commands::Decode {
            input,
            format,
            gzip,
            validate,
        } => {
            let spans = decode(&read_input(&input)?, format, gzip, validate)?;
            let mut json = serde_json::to_vec_pretty(&spans)?;
            json.push(b'\n');
            write_output(None, &json)?;
        }
    }

    Ok(())
}
