//! Student profiles: onboarding and the materialized score totals.

use crate::db;
use crate::error::{is_unique_violation, AppError, AppResult};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

pub const SEED_SCORE: i64 = 500;

pub type Components = BTreeMap<String, i64>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub id: String,
    pub user_id: String,
    pub year_of_study: i64,
    pub major: String,
    pub interests: Vec<String>,
    pub readiness_score: i64,
    pub citizenship_score: i64,
    pub self_management_score: i64,
    pub readiness_components: Components,
    pub citizenship_components: Components,
    pub self_management_components: Components,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewProfile {
    pub year_of_study: i64,
    pub major: String,
    pub interests: Vec<String>,
}

fn components(pairs: &[(&str, i64)]) -> Components {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

pub fn seed_readiness_components() -> Components {
    components(&[
        ("learningDiscipline", 50),
        ("skillGrowth", 50),
        ("engagement", 50),
        ("careerReadiness", 50),
        ("autonomy", 50),
    ])
}

pub fn seed_citizenship_components() -> Components {
    components(&[
        ("sharedNotes", 0),
        ("helpedPeers", 0),
        ("reportedIssues", 0),
        ("gaveFeedback", 0),
        ("qualityContributions", 0),
    ])
}

pub fn seed_self_management_components() -> Components {
    components(&[
        ("appointments", 100),
        ("deadlines", 100),
        ("attendance", 100),
        ("adminInteractions", 100),
    ])
}

const PROFILE_COLUMNS: &str = "id, user_id, year_of_study, major, interests,
    readiness_score, citizenship_score, self_management_score,
    readiness_components, citizenship_components, self_management_components, created_at";

struct RawProfile {
    profile: StudentProfile,
    interests: String,
    readiness: String,
    citizenship: String,
    self_management: String,
}

fn map_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawProfile> {
    Ok(RawProfile {
        profile: StudentProfile {
            id: row.get(0)?,
            user_id: row.get(1)?,
            year_of_study: row.get(2)?,
            major: row.get(3)?,
            interests: Vec::new(),
            readiness_score: row.get(5)?,
            citizenship_score: row.get(6)?,
            self_management_score: row.get(7)?,
            readiness_components: Components::new(),
            citizenship_components: Components::new(),
            self_management_components: Components::new(),
            created_at: row.get(11)?,
        },
        interests: row.get(4)?,
        readiness: row.get(8)?,
        citizenship: row.get(9)?,
        self_management: row.get(10)?,
    })
}

fn decode(raw: RawProfile) -> AppResult<StudentProfile> {
    let mut p = raw.profile;
    p.interests = serde_json::from_str(&raw.interests)?;
    p.readiness_components = serde_json::from_str(&raw.readiness)?;
    p.citizenship_components = serde_json::from_str(&raw.citizenship)?;
    p.self_management_components = serde_json::from_str(&raw.self_management)?;
    Ok(p)
}

pub fn find_for_user(conn: &Connection, user_id: &str) -> AppResult<Option<StudentProfile>> {
    let sql = format!("SELECT {PROFILE_COLUMNS} FROM student_profiles WHERE user_id = ?");
    let raw = conn.query_row(&sql, [user_id], map_raw).optional()?;
    raw.map(decode).transpose()
}

pub fn require_for_user(conn: &Connection, user_id: &str) -> AppResult<StudentProfile> {
    find_for_user(conn, user_id)?.ok_or(AppError::NotFound {
        entity: "student profile",
    })
}

fn clean_interests(raw: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for s in raw {
        let t = s.trim();
        if !t.is_empty() && !out.iter().any(|x| x.eq_ignore_ascii_case(t)) {
            out.push(t.to_string());
        }
    }
    out
}

/// Creates the profile with seeded scores and its streak row in one transaction.
pub fn create_profile(
    conn: &Connection,
    user_id: &str,
    input: &NewProfile,
    now: DateTime<Utc>,
) -> AppResult<StudentProfile> {
    if !(1..=10).contains(&input.year_of_study) {
        return Err(AppError::invalid("yearOfStudy", "must be between 1 and 10"));
    }
    let major = input.major.trim();
    if major.is_empty() {
        return Err(AppError::invalid("major", "must not be empty"));
    }

    let profile = StudentProfile {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        year_of_study: input.year_of_study,
        major: major.to_string(),
        interests: clean_interests(&input.interests),
        readiness_score: SEED_SCORE,
        citizenship_score: SEED_SCORE,
        self_management_score: SEED_SCORE,
        readiness_components: seed_readiness_components(),
        citizenship_components: seed_citizenship_components(),
        self_management_components: seed_self_management_components(),
        created_at: db::timestamp(now),
    };

    let tx = db::begin_write(conn)?;
    let inserted = tx.execute(
        "INSERT INTO student_profiles(
           id, user_id, year_of_study, major, interests,
           readiness_score, citizenship_score, self_management_score,
           readiness_components, citizenship_components, self_management_components, created_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            profile.id,
            profile.user_id,
            profile.year_of_study,
            profile.major,
            serde_json::to_string(&profile.interests)?,
            profile.readiness_score,
            profile.citizenship_score,
            profile.self_management_score,
            serde_json::to_string(&profile.readiness_components)?,
            serde_json::to_string(&profile.citizenship_components)?,
            serde_json::to_string(&profile.self_management_components)?,
            profile.created_at,
        ],
    );
    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::Conflict("student profile already exists".into()))
        }
        Err(e) => return Err(e.into()),
    }
    tx.execute(
        "INSERT INTO learning_streaks(student_id, current_streak, longest_streak, last_activity_date)
         VALUES(?, 0, 0, ?)",
        (&profile.id, now.date_naive().to_string()),
    )?;
    tx.commit()?;

    tracing::info!(student_id = %profile.id, user_id, "student profile created");
    Ok(profile)
}

/// Ids of every student profile, oldest first.
pub fn all_student_ids(conn: &Connection) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT id FROM student_profiles ORDER BY created_at, rowid")?;
    let ids = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}
