//! Admin-authored recommendations, fanned out to every student, and their
//! per-student lifecycle.

use crate::db;
use crate::error::{AppError, AppResult};
use crate::model::{column_enum, RecommendationStatus, RecommendationType};
use crate::profiles;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewRecommendation {
    pub title: String,
    pub description: String,
    pub recommendation_type: RecommendationType,
    pub priority: i64,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: String,
    pub student_id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub recommendation_type: RecommendationType,
    pub status: RecommendationStatus,
    pub priority: i64,
    pub tags: Vec<String>,
    pub metadata: serde_json::Value,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastSummary {
    pub count: usize,
}

fn broadcast_metadata() -> serde_json::Value {
    json!({
        "provider": "University Admin",
        "difficulty": "Intermediate",
        "estimatedHours": 5
    })
}

fn clean_tags(raw: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for t in raw {
        let t = t.trim();
        if !t.is_empty() && !tags.iter().any(|x| x == t) {
            tags.push(t.to_string());
        }
    }
    tags
}

/// One PENDING row per existing student profile, written in a single transaction.
pub fn broadcast(
    conn: &Connection,
    input: &NewRecommendation,
    now: DateTime<Utc>,
) -> AppResult<BroadcastSummary> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(AppError::invalid("title", "must not be empty"));
    }
    let description = input.description.trim();
    if description.is_empty() {
        return Err(AppError::invalid("description", "must not be empty"));
    }
    if !(0..=100).contains(&input.priority) {
        return Err(AppError::invalid("priority", "must be between 0 and 100"));
    }
    let tags = serde_json::to_string(&clean_tags(&input.tags))?;
    let metadata = broadcast_metadata().to_string();
    let stamp = db::timestamp(now);

    let tx = db::begin_write(conn)?;
    let student_ids = profiles::all_student_ids(&tx)?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO recommendations(
               id, student_id, title, description, type, status, priority, tags, metadata, created_at, updated_at
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        for sid in &student_ids {
            stmt.execute(rusqlite::params![
                Uuid::new_v4().to_string(),
                sid,
                title,
                description,
                input.recommendation_type.as_str(),
                RecommendationStatus::Pending.as_str(),
                input.priority,
                tags,
                metadata,
                stamp,
                stamp,
            ])?;
        }
    }
    tx.commit()?;

    tracing::info!(count = student_ids.len(), title, "recommendation broadcast");
    Ok(BroadcastSummary {
        count: student_ids.len(),
    })
}

const COLUMNS: &str =
    "id, student_id, title, description, type, status, priority, tags, metadata, created_at, updated_at";

fn map_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<(Recommendation, String, String)> {
    Ok((
        Recommendation {
            id: r.get(0)?,
            student_id: r.get(1)?,
            title: r.get(2)?,
            description: r.get(3)?,
            recommendation_type: column_enum(4, r.get(4)?)?,
            status: column_enum(5, r.get(5)?)?,
            priority: r.get(6)?,
            tags: Vec::new(),
            metadata: serde_json::Value::Null,
            created_at: r.get(9)?,
            updated_at: r.get(10)?,
        },
        r.get(7)?,
        r.get(8)?,
    ))
}

fn decode((mut rec, tags, metadata): (Recommendation, String, String)) -> AppResult<Recommendation> {
    rec.tags = serde_json::from_str(&tags)?;
    rec.metadata = serde_json::from_str(&metadata)?;
    Ok(rec)
}

pub fn list_for_student(
    conn: &Connection,
    student_id: &str,
    status: Option<RecommendationStatus>,
) -> AppResult<Vec<Recommendation>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM recommendations
         WHERE student_id = ?1 AND (?2 IS NULL OR status = ?2)
         ORDER BY created_at DESC, rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map((student_id, status.map(|s| s.as_str())), map_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(decode).collect()
}

/// Moves one of the student's own recommendations forward in its lifecycle.
pub fn update_status(
    conn: &Connection,
    student_id: &str,
    recommendation_id: &str,
    next: RecommendationStatus,
    now: DateTime<Utc>,
) -> AppResult<Recommendation> {
    let sql = format!("SELECT {COLUMNS} FROM recommendations WHERE id = ? AND student_id = ?");
    let found = conn
        .query_row(&sql, (recommendation_id, student_id), map_row)
        .optional()?;
    let Some(mut rec) = found.map(decode).transpose()? else {
        return Err(AppError::NotFound {
            entity: "recommendation",
        });
    };

    if rec.status == next {
        return Ok(rec);
    }
    apply_status(conn, &mut rec, next, now)?;
    Ok(rec)
}

/// Writes `next` only if the row still holds the status `rec` was read with.
/// A concurrent writer that got there first turns this into `InvalidTransition`.
fn apply_status(
    conn: &Connection,
    rec: &mut Recommendation,
    next: RecommendationStatus,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if !rec.status.can_move_to(next) {
        return Err(AppError::InvalidTransition {
            from: rec.status.to_string(),
            to: next.to_string(),
        });
    }
    let stamp = db::timestamp(now);
    let changed = conn.execute(
        "UPDATE recommendations SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        (next.as_str(), &stamp, &rec.id, rec.status.as_str()),
    )?;
    if changed == 0 {
        let current: String = conn.query_row(
            "SELECT status FROM recommendations WHERE id = ?",
            [&rec.id],
            |r| r.get(0),
        )?;
        tracing::warn!(recommendation_id = %rec.id, read = %rec.status, current = %current, "status changed underneath update");
        return Err(AppError::InvalidTransition {
            from: current,
            to: next.to_string(),
        });
    }
    tracing::debug!(recommendation_id = %rec.id, from = %rec.status, to = %next, "recommendation status changed");
    rec.status = next;
    rec.updated_at = stamp;
    Ok(())
}
