use crate::auth::{self, User};
use crate::error::{AppError, AppResult};
use crate::ipc::error::{err, ok};
use crate::ipc::types::AppState;
use rusqlite::Connection;
use serde::Serialize;
use std::str::FromStr;

/// Turns a handler result into a response line. Storage failures are logged with
/// their cause and reported as a generic `failed to <operation>`.
pub fn respond<T: Serialize>(id: &str, operation: &str, result: AppResult<T>) -> serde_json::Value {
    match result {
        Ok(data) => match serde_json::to_value(data) {
            Ok(v) => ok(id, v),
            Err(e) => {
                tracing::error!(operation, error = %e, "failed to encode response");
                err(id, "db_failed", format!("failed to {operation}"))
            }
        },
        Err(e) if e.is_internal() => {
            tracing::error!(operation, error = %e, "request failed");
            err(id, e.code(), format!("failed to {operation}"))
        }
        Err(e) => {
            tracing::debug!(operation, code = e.code(), error = %e, "request rejected");
            err(id, e.code(), e.to_string())
        }
    }
}

pub fn conn(state: &AppState) -> AppResult<&Connection> {
    state.db.as_ref().ok_or(AppError::NoWorkspace)
}

/// Workspace connection plus the signed-in user.
pub fn caller(state: &AppState) -> AppResult<(&Connection, User)> {
    let conn = conn(state)?;
    let user = auth::current_user(conn, state.session.as_deref())?;
    Ok((conn, user))
}

pub fn admin(state: &AppState) -> AppResult<(&Connection, User)> {
    let (conn, user) = caller(state)?;
    auth::require_admin(&user)?;
    Ok((conn, user))
}

pub fn get_required_str(params: &serde_json::Value, key: &'static str) -> AppResult<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::invalid(key, "missing or not a string"))
}

pub fn get_optional_str(params: &serde_json::Value, key: &'static str) -> AppResult<Option<String>> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| AppError::invalid(key, "must be a string")),
    }
}

pub fn get_required_i64(params: &serde_json::Value, key: &'static str) -> AppResult<i64> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| AppError::invalid(key, "missing or not an integer"))
}

pub fn get_optional_i64(params: &serde_json::Value, key: &'static str) -> AppResult<Option<i64>> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| AppError::invalid(key, "must be an integer")),
    }
}

pub fn get_required_f64(params: &serde_json::Value, key: &'static str) -> AppResult<f64> {
    params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| AppError::invalid(key, "missing or not a number"))
}

pub fn get_required_bool(params: &serde_json::Value, key: &'static str) -> AppResult<bool> {
    params
        .get(key)
        .and_then(|v| v.as_bool())
        .ok_or_else(|| AppError::invalid(key, "missing or not a boolean"))
}

/// A list of strings; absent or null means empty.
pub fn get_str_list(params: &serde_json::Value, key: &'static str) -> AppResult<Vec<String>> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(|s| s.to_string())
                    .ok_or_else(|| AppError::invalid(key, "must contain only strings"))
            })
            .collect(),
        Some(_) => Err(AppError::invalid(key, "must be an array of strings")),
    }
}

pub fn parse_label<T: FromStr<Err = String>>(key: &'static str, raw: &str) -> AppResult<T> {
    raw.parse::<T>().map_err(|reason| AppError::invalid(key, reason))
}

pub fn get_required_label<T: FromStr<Err = String>>(
    params: &serde_json::Value,
    key: &'static str,
) -> AppResult<T> {
    parse_label(key, &get_required_str(params, key)?)
}

/// Empty strings count as absent, matching how the admin forms submit "no target".
pub fn get_optional_label<T: FromStr<Err = String>>(
    params: &serde_json::Value,
    key: &'static str,
) -> AppResult<Option<T>> {
    match get_optional_str(params, key)? {
        Some(s) if !s.trim().is_empty() => parse_label(key, &s).map(Some),
        _ => Ok(None),
    }
}
