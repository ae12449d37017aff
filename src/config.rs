use clap::Parser;
use std::path::PathBuf;

/// Data sidecar for the campus portal. Speaks JSON lines on stdin/stdout.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "campusd", version, about)]
pub struct Config {
    /// Workspace directory to open at startup (otherwise wait for `workspace.select`).
    #[arg(long, env = "CAMPUSD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Email that is registered as SUPER_ADMIN whenever a workspace opens.
    #[arg(long, env = "CAMPUSD_BOOTSTRAP_ADMIN")]
    pub bootstrap_admin: Option<String>,

    /// Log filter directive, e.g. `info` or `campusd=debug`. Logs go to stderr.
    #[arg(long = "log", env = "CAMPUSD_LOG", default_value = "info")]
    pub log_filter: String,
}
