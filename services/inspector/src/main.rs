//! mqlink-inspect - Decode raw message buffers and encode JSON envelopes
//!
//! Usage:
//!   mqlink-inspect decode --input dump.bin --encoding 546
//!   mqlink-inspect decode --input dump.hex --hex --format MQHRF2
//!   mqlink-inspect encode --input envelope.json --output message.bin
//!   mqlink-inspect decode --input message.bin --descriptor message.bin.descriptor.json

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;
use types::constants::MQENC_NATIVE;

#[derive(Parser, Debug)]
#[command(name = "mqlink-inspect", version, about = "Inspect mqlink message buffers")]
struct Args {
    /// Log verbosity; RUST_LOG takes precedence when set
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    log_level: LogLevel,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a raw message buffer into a JSON envelope
    Decode {
        /// Raw message data, as bytes or hex text
        #[arg(short, long)]
        input: PathBuf,

        /// Input is hex text rather than raw bytes
        #[arg(long)]
        hex: bool,

        /// Descriptor encoding the buffer was written with
        #[arg(long, default_value_t = MQENC_NATIVE)]
        encoding: i32,

        /// Descriptor format of the buffer
        #[arg(long, default_value = "")]
        format: String,

        /// Descriptor sidecar written by `encode`; replaces --encoding and --format
        #[arg(long)]
        descriptor: Option<PathBuf>,

        /// Write the JSON report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Encode a JSON envelope into raw message data plus a descriptor sidecar
    Encode {
        /// JSON envelope
        #[arg(short, long)]
        input: PathBuf,

        /// Destination of the encoded data
        #[arg(short, long)]
        output: PathBuf,

        /// Write hex text rather than raw bytes
        #[arg(long)]
        hex: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

fn init_logging(level: LogLevel, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.directive().into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_level, args.json_logs);

    match args.command {
        Command::Decode {
            input,
            hex,
            encoding,
            format,
            descriptor,
            output,
        } => {
            let data = commands::read_input(&input, hex)?;
            let report = match descriptor {
                Some(path) => {
                    let sidecar = commands::read_sidecar(&path)?;
                    info!(
                        input = %input.display(),
                        bytes = data.len(),
                        encoding = sidecar.descriptor.encoding,
                        descriptor = %path.display(),
                        "Decoding message"
                    );
                    commands::decode_message(sidecar.into_message(data))?
                }
                None => {
                    info!(input = %input.display(), bytes = data.len(), encoding, "Decoding message");
                    commands::decode_buffer(data, encoding, &format)?
                }
            };
            let json = serde_json::to_string_pretty(&report).context("Failed to render report")?;
            match output {
                Some(path) => std::fs::write(&path, json)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => println!("{json}"),
            }
        }
        Command::Encode { input, output, hex } => {
            let json = std::fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let message = commands::encode_json(&json)?;
            let sidecar_file = commands::sidecar_path(&output);
            commands::write_output(&output, message.data(), hex)?;
            commands::write_sidecar(&sidecar_file, &commands::Sidecar::of(&message))?;
            info!(
                output = %output.display(),
                descriptor = %sidecar_file.display(),
                bytes = message.data_length(),
                format = %message.descriptor.format,
                encoding = message.descriptor.encoding,
                properties = message.properties().len(),
                "Encoded message"
            );
        }
    }
    Ok(())
}
