//! Serializable CLI - tools for working with stored representations
//!
//! Commands:
//!   serializable inspect <file>    - List references, tagged objects and key tables
//!   serializable normalize <file>  - Decode with the builtin registry and re-encode

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serializable::inspect::{inspect, Finding};
use serializable::{registry, Codec, Ir, Options};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "serializable")]
#[command(about = "Tools for working with serializable JSON representations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the type references, tagged objects and key tables in a representation
    Inspect {
        /// Path to the JSON file, or `-` for stdin
        input: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Decode a representation against the builtin types and print it re-encoded
    Normalize {
        /// Path to the JSON file, or `-` for stdin
        input: PathBuf,

        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,

        /// Reject inputs larger than this many bytes
        #[arg(long, default_value_t = Options::default().max_input_len)]
        max_input_len: usize,
    },
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { input, json } => inspect_command(&input, json),
        Commands::Normalize {
            input,
            pretty,
            max_input_len,
        } => normalize_command(&input, Options { max_input_len, pretty }),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))
}

fn inspect_command(input: &Path, json: bool) -> anyhow::Result<()> {
    let text = read_input(input)?;
    let ir: Ir = serde_json::from_str(&text)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", input.display(), e))?;
    let findings = inspect(&ir);

    if json {
        println!("{}", serde_json::to_string_pretty(&findings)?);
        return Ok(());
    }

    if findings.is_empty() {
        println!("plain JSON: no references, tagged objects or key tables");
        return Ok(());
    }
    for finding in &findings {
        let pointer = if finding.pointer().is_empty() { "/" } else { finding.pointer() };
        match finding {
            Finding::Reference { reference, .. } => {
                println!("{:<40} reference  {}", pointer, reference);
            }
            Finding::Tagged {
                reference,
                positional,
                ..
            } => {
                let how = if *positional { "positional" } else { "fields" };
                println!("{:<40} object     {} ({})", pointer, reference, how);
            }
            Finding::KeyTable { keys, .. } => {
                println!("{:<40} key table  {} key(s)", pointer, keys.len());
                for (i, key) in keys.iter().enumerate() {
                    println!("{:<40}   [{}] {}", "", i, key);
                }
            }
            Finding::Malformed { reason, .. } => {
                println!("{:<40} malformed  {}", pointer, reason);
            }
        }
    }
    Ok(())
}

fn normalize_command(input: &Path, options: Options) -> anyhow::Result<()> {
    let text = read_input(input)?;
    let codec = Codec::new(registry()).with_options(options);
    let value = codec
        .from_json(&text)
        .map_err(|e| anyhow::anyhow!("Failed to decode {}: {}", input.display(), e))?;
    tracing::debug!(kind = value.kind_name(), "decoded input");
    println!("{}", codec.to_json(&value)?);
    Ok(())
}
