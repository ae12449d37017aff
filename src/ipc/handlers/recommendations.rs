use crate::error::AppResult;
use crate::ipc::helpers::{caller, get_optional_label, get_required_label, get_required_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::model::RecommendationStatus;
use crate::profiles;
use crate::recommendations::{self, Recommendation};
use chrono::Utc;

fn list(state: &AppState, req: &Request) -> AppResult<Vec<Recommendation>> {
    let status = get_optional_label::<RecommendationStatus>(&req.params, "status")?;
    let (conn, user) = caller(state)?;
    let profile = profiles::require_for_user(conn, &user.id)?;
    recommendations::list_for_student(conn, &profile.id, status)
}

fn update_status(state: &AppState, req: &Request) -> AppResult<Recommendation> {
    let recommendation_id = get_required_str(&req.params, "recommendationId")?;
    let status = get_required_label::<RecommendationStatus>(&req.params, "status")?;
    let (conn, user) = caller(state)?;
    let profile = profiles::require_for_user(conn, &user.id)?;
    recommendations::update_status(conn, &profile.id, &recommendation_id, status, Utc::now())
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "recommendations.list" => Some(respond(
            &req.id,
            "fetch recommendations",
            list(state, req),
        )),
        "recommendations.updateStatus" => Some(respond(
            &req.id,
            "update recommendation",
            update_status(state, req),
        )),
        _ => None,
    }
}
