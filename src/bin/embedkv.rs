//! embedkv Shell Binary
//!
//! Opens an engine and runs commands read from stdin over an in-process
//! connection, one command per line.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use bytes::Bytes;
use clap::Parser;
use embedkv::{Config, Endpoint, Engine, Frame};
use tracing_subscriber::{fmt, EnvFilter};

/// embedkv interactive shell
#[derive(Parser, Debug)]
#[command(name = "embedkv")]
#[command(about = "Embedded RESP key-value engine shell")]
#[command(version)]
struct Args {
    /// Append-only file; enables persistence and replay when given
    #[arg(short, long)]
    aof: Option<String>,

    /// Number of logical databases
    #[arg(short, long, default_value = "16")]
    databases: usize,

    /// How long to wait for each reply (milliseconds)
    #[arg(short, long, default_value = "30000")]
    timeout_ms: u64,
}

fn main() {
    // Logs go to stderr so replies on stdout stay clean
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,embedkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    tracing::info!("embedkv v{}", embedkv::VERSION);

    let mut builder = Config::builder()
        .databases(args.databases)
        .request_timeout_ms(args.timeout_ms);
    if let Some(path) = &args.aof {
        tracing::info!("Append-only file: {}", path);
        builder = builder.append_only(path);
    }
    let config = builder.build();

    let engine = match Engine::open(config) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    let endpoint = Endpoint::new(Arc::clone(&engine));
    let client = match endpoint.connect() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to connect: {}", e);
            std::process::exit(1);
        }
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Failed to read stdin: {}", e);
                break;
            }
        };
        let words: Vec<Bytes> = line
            .split_whitespace()
            .map(|word| Bytes::copy_from_slice(word.as_bytes()))
            .collect();
        if words.is_empty() {
            continue;
        }
        if words[0].eq_ignore_ascii_case(b"quit") {
            break;
        }

        let output = match client.send(&words) {
            Ok(reply) => render(&reply, 0),
            Err(e) => format!("(error) {}", e),
        };
        if writeln!(stdout, "{}", output).is_err() {
            break;
        }
    }

    client.close();
    endpoint.close();
    if let Err(e) = engine.close() {
        tracing::error!("Failed to close engine: {}", e);
        std::process::exit(1);
    }
}

/// Render a reply the way interactive RESP shells do
fn render(frame: &Frame, indent: usize) -> String {
    match frame {
        Frame::Status(text) => text.clone(),
        Frame::Error(text) => format!("(error) {}", text),
        Frame::Integer(n) => format!("(integer) {}", n),
        Frame::Bulk(None) | Frame::Array(None) => "(nil)".to_string(),
        Frame::Bulk(Some(data)) => format!("\"{}\"", String::from_utf8_lossy(data)),
        Frame::Array(Some(items)) if items.is_empty() => "(empty array)".to_string(),
        Frame::Array(Some(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let pad = if i == 0 { String::new() } else { " ".repeat(indent) };
                format!("{}{}) {}", pad, i + 1, render(item, indent + 3))
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}
