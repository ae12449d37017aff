use crate::error::AppResult;
use crate::ipc::helpers::{
    admin, get_optional_label, get_required_i64, get_required_label, get_required_str,
    get_str_list, respond,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{NotificationPriority, NotificationType, RecommendationType, Role};
use crate::notifications::{self, NewNotification, Notification};
use crate::recommendations::{self, BroadcastSummary, NewRecommendation};
use chrono::Utc;

fn create_notification(state: &AppState, req: &Request) -> AppResult<Notification> {
    let (conn, author) = admin(state)?;
    let input = NewNotification {
        title: get_required_str(&req.params, "title")?,
        message: get_required_str(&req.params, "message")?,
        notification_type: get_required_label::<NotificationType>(&req.params, "type")?,
        priority: get_required_label::<NotificationPriority>(&req.params, "priority")?,
        target_role: get_optional_label::<Role>(&req.params, "targetRole")?,
        target_users: get_str_list(&req.params, "targetUsers")?,
    };
    notifications::create(conn, &author, &input, Utc::now())
}

fn broadcast_recommendation(state: &AppState, req: &Request) -> AppResult<BroadcastSummary> {
    let (conn, author) = admin(state)?;
    let input = NewRecommendation {
        title: get_required_str(&req.params, "title")?,
        description: get_required_str(&req.params, "description")?,
        recommendation_type: get_required_label::<RecommendationType>(&req.params, "type")?,
        priority: get_required_i64(&req.params, "priority")?,
        tags: get_str_list(&req.params, "tags")?,
    };
    tracing::info!(by = %author.id, "broadcasting recommendation");
    recommendations::broadcast(conn, &input, Utc::now())
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "admin.createNotification" => Some(respond(
            &req.id,
            "create notification",
            create_notification(state, req),
        )),
        "admin.broadcastRecommendation" => Some(respond(
            &req.id,
            "create recommendation",
            broadcast_recommendation(state, req),
        )),
        _ => None,
    }
}
