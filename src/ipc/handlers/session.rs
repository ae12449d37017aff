use crate::auth::{self, User};
use crate::error::{AppError, AppResult};
use crate::ipc::helpers::{caller, conn, get_required_label, get_required_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use chrono::Utc;
use serde_json::json;

/// The host has authenticated the user; bind its email to this sidecar.
fn sign_in(state: &mut AppState, req: &Request) -> AppResult<User> {
    let email = auth::normalize_email(&get_required_str(&req.params, "email")?)?;
    let user = auth::current_user(conn(state)?, Some(email.as_str()))?;
    tracing::info!(user_id = %user.id, role = %user.role, "signed in");
    state.session = Some(email);
    Ok(user)
}

fn sign_out(state: &mut AppState) -> serde_json::Value {
    let was = state.session.take().is_some();
    json!({ "signedOut": was })
}

fn register(state: &AppState, req: &Request) -> AppResult<User> {
    let email = get_required_str(&req.params, "email")?;
    let name = get_required_str(&req.params, "name")?;
    auth::register(conn(state)?, &email, &name, Role::Student, Utc::now())
}

fn set_role(state: &AppState, req: &Request) -> AppResult<User> {
    let (conn, me) = caller(state)?;
    if me.role != Role::SuperAdmin {
        return Err(AppError::Forbidden("SUPER_ADMIN"));
    }
    let email = get_required_str(&req.params, "email")?;
    let role: Role = get_required_label(&req.params, "role")?;
    let user = auth::set_role(conn, &email, role)?;
    tracing::info!(by = %me.id, user_id = %user.id, role = %user.role, "role changed");
    Ok(user)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.signIn" => Some(respond(&req.id, "sign in", sign_in(state, req))),
        "session.signOut" => Some(respond(&req.id, "sign out", Ok(sign_out(state)))),
        "session.get" => Some(respond(
            &req.id,
            "load session",
            caller(state).map(|(_, user)| user),
        )),
        "users.register" => Some(respond(&req.id, "register user", register(state, req))),
        "users.setRole" => Some(respond(&req.id, "change role", set_role(state, req))),
        _ => None,
    }
}
