mod auth;
mod config;
mod db;
mod error;
mod ipc;
mod locations;
mod model;
mod notifications;
mod profiles;
mod recommendations;
mod scoring;

use anyhow::Context;
use clap::Parser;
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

fn init_logging(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries the protocol; logs must stay on stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let config = config::Config::parse();
    init_logging(&config.log_filter);

    let mut state = ipc::AppState::new(config.clone());
    if let Some(path) = config.workspace.as_deref() {
        ipc::open_workspace(&mut state, path)
            .with_context(|| format!("failed to open workspace {}", path.display()))?;
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "campusd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply with an id we could not read.
                tracing::warn!(error = %e, "unparseable request line");
                let _ = writeln!(stdout, "{}", ipc::err("", "bad_json", e.to_string()));
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"success\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    tracing::info!("campusd shutting down");
    Ok(())
}
