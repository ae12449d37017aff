use crate::error::AppResult;
use crate::ipc::helpers::{caller, get_required_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::notifications::{self, Notification};
use chrono::Utc;
use serde_json::json;

fn list(state: &AppState) -> AppResult<serde_json::Value> {
    let (conn, user) = caller(state)?;
    let items = notifications::list_for(conn, &user)?;
    let unread = items.iter().filter(|n| !n.read).count();
    Ok(json!({
        "notifications": items,
        "unreadCount": unread,
    }))
}

fn mark_read(state: &AppState, req: &Request) -> AppResult<Notification> {
    let notification_id = get_required_str(&req.params, "notificationId")?;
    let (conn, user) = caller(state)?;
    notifications::mark_read(conn, &user, &notification_id, Utc::now())
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "notifications.list" => Some(respond(&req.id, "fetch notifications", list(state))),
        "notifications.markRead" => Some(respond(&req.id, "mark as read", mark_read(state, req))),
        _ => None,
    }
}
