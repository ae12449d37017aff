use crate::error::AppResult;
use crate::ipc::helpers::{caller, get_required_i64, get_required_str, get_str_list, respond};
use crate::ipc::types::{AppState, Request};
use crate::profiles::{self, NewProfile, StudentProfile};
use chrono::Utc;
use serde_json::json;

fn status(state: &AppState) -> AppResult<serde_json::Value> {
    let (conn, user) = caller(state)?;
    let profile = profiles::find_for_user(conn, &user.id)?;
    Ok(json!({
        "hasProfile": profile.is_some(),
        "userId": user.id,
        "studentId": profile.map(|p| p.id),
    }))
}

fn create_profile(state: &AppState, req: &Request) -> AppResult<StudentProfile> {
    let (conn, user) = caller(state)?;
    let input = NewProfile {
        year_of_study: get_required_i64(&req.params, "yearOfStudy")?,
        major: get_required_str(&req.params, "major")?,
        interests: get_str_list(&req.params, "interests")?,
    };
    profiles::create_profile(conn, &user.id, &input, Utc::now())
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "onboarding.status" => Some(respond(&req.id, "check profile status", status(state))),
        "onboarding.createProfile" => Some(respond(
            &req.id,
            "create profile",
            create_profile(state, req),
        )),
        _ => None,
    }
}
