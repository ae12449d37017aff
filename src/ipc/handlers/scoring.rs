use crate::error::AppResult;
use crate::ipc::helpers::{
    caller, get_optional_i64, get_required_i64, get_required_label, get_required_str, respond,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{ActivityType, ScoreCategory};
use crate::profiles::{self, StudentProfile};
use crate::scoring::{self, Activity, ActivityOutcome, CategoryAudit, NewActivity, Streak};
use chrono::Utc;

fn my_profile(state: &AppState) -> AppResult<StudentProfile> {
    let (conn, user) = caller(state)?;
    profiles::require_for_user(conn, &user.id)
}

fn add_activity(state: &AppState, req: &Request) -> AppResult<ActivityOutcome> {
    let input = NewActivity {
        category: get_required_label::<ScoreCategory>(&req.params, "category")?,
        activity_type: get_required_label::<ActivityType>(&req.params, "type")?,
        description: get_required_str(&req.params, "description")?,
        points: get_required_i64(&req.params, "points")?,
    };
    let (conn, user) = caller(state)?;
    let profile = profiles::require_for_user(conn, &user.id)?;
    scoring::add_activity(conn, &profile.id, &input, Utc::now())
}

fn recent(state: &AppState, req: &Request) -> AppResult<Vec<Activity>> {
    let limit = get_optional_i64(&req.params, "limit")?;
    let (conn, user) = caller(state)?;
    let profile = profiles::require_for_user(conn, &user.id)?;
    scoring::recent_activities(conn, &profile.id, limit)
}

fn streak(state: &AppState) -> AppResult<Streak> {
    let (conn, user) = caller(state)?;
    let profile = profiles::require_for_user(conn, &user.id)?;
    scoring::streak(conn, &profile.id)
}

fn audit(state: &AppState) -> AppResult<Vec<CategoryAudit>> {
    let (conn, user) = caller(state)?;
    let profile = profiles::require_for_user(conn, &user.id)?;
    scoring::audit(conn, &profile.id)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "scoring.profile" => Some(respond(&req.id, "load profile", my_profile(state))),
        "scoring.addActivity" => Some(respond(&req.id, "add activity", add_activity(state, req))),
        "scoring.recentActivities" => {
            Some(respond(&req.id, "fetch activities", recent(state, req)))
        }
        "scoring.streak" => Some(respond(&req.id, "fetch streak", streak(state))),
        "scoring.audit" => Some(respond(&req.id, "audit scores", audit(state))),
        _ => None,
    }
}
