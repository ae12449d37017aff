use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::config::Config;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: Config,
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// Email of the signed-in user, as asserted by the host.
    pub session: Option<String>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        AppState {
            config,
            workspace: None,
            db: None,
            session: None,
        }
    }
}
