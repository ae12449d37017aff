use crate::auth;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use chrono::Utc;
use serde_json::json;
use std::path::{Path, PathBuf};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "signedIn": state.session.is_some()
        }),
    )
}

/// Opens (or creates) the workspace database and makes it current.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<()> {
    let conn = db::open_db(path)?;
    if let Some(email) = state.config.bootstrap_admin.as_deref() {
        // A bad bootstrap address must not keep the workspace closed.
        match auth::ensure_super_admin(&conn, email, Utc::now()) {
            Ok(user) => tracing::info!(email = %user.email, "bootstrap admin ready"),
            Err(e) => tracing::warn!(email, error = %e, "bootstrap admin skipped"),
        }
    }
    tracing::info!(workspace = %path.display(), "workspace opened");
    state.workspace = Some(path.to_path_buf());
    state.db = Some(conn);
    // Identities belong to a workspace; never carry one across.
    state.session = None;
    Ok(())
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path");
    };

    match open_workspace(state, &path) {
        Ok(()) => ok(&req.id, json!({ "workspacePath": path.to_string_lossy() })),
        Err(e) => {
            tracing::error!(workspace = %path.display(), error = ?e, "failed to open workspace");
            err(&req.id, "db_failed", "failed to open workspace")
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
