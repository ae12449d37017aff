use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    tracing::debug!(id = %req.id, method = %req.method, "request");

    if let Some(resp) = handlers::core::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::session::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::onboarding::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::scoring::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::notifications::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::recommendations::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::admin::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::map::try_handle(state, &req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
    )
}
