//! Activity ledger and the score totals it materializes.
//!
//! The ledger (`activities`) is the source of truth: for every category the
//! cached total on `student_profiles` equals `SEED_SCORE` plus the sum of the
//! points recorded in that category.

use crate::db;
use crate::error::{AppError, AppResult};
use crate::model::{column_enum, ActivityType, ScoreCategory};
use crate::profiles::SEED_SCORE;
use chrono::{DateTime, Days, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

pub const DEFAULT_RECENT_LIMIT: i64 = 10;
const MAX_RECENT_LIMIT: i64 = 100;

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub category: ScoreCategory,
    pub activity_type: ActivityType,
    pub description: String,
    pub points: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub student_id: String,
    pub category: ScoreCategory,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub description: String,
    pub points: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Streak {
    pub current_streak: i64,
    pub longest_streak: i64,
    pub last_activity_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityOutcome {
    pub activity: Activity,
    pub category: ScoreCategory,
    pub new_score: i64,
    pub streak: Streak,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAudit {
    pub category: ScoreCategory,
    pub ledger_points: i64,
    pub expected: i64,
    pub cached: i64,
    pub consistent: bool,
}

/// Advances a streak for an activity on `today`.
pub fn advance_streak(streak: Streak, today: NaiveDate) -> Streak {
    let yesterday = today.checked_sub_days(Days::new(1));
    let current = match streak.last_activity_date {
        Some(last) if last == today && streak.current_streak > 0 => streak.current_streak,
        Some(last) if Some(last) == yesterday => streak.current_streak + 1,
        _ => 1,
    };
    Streak {
        current_streak: current,
        longest_streak: streak.longest_streak.max(current),
        last_activity_date: Some(today),
    }
}

fn validate(input: &NewActivity) -> AppResult<()> {
    if input.activity_type.category() != input.category {
        return Err(AppError::invalid(
            "type",
            format!(
                "{} is not a {} activity",
                input.activity_type, input.category
            ),
        ));
    }
    if input.description.trim().is_empty() {
        return Err(AppError::invalid("description", "must not be empty"));
    }
    Ok(())
}

fn load_streak(conn: &Connection, student_id: &str) -> AppResult<Option<Streak>> {
    let row = conn
        .query_row(
            "SELECT current_streak, longest_streak, last_activity_date
             FROM learning_streaks WHERE student_id = ?",
            [student_id],
            |r| {
                Ok(Streak {
                    current_streak: r.get(0)?,
                    longest_streak: r.get(1)?,
                    last_activity_date: r
                        .get::<_, Option<String>>(2)?
                        .map(|raw| column_date(2, raw))
                        .transpose()?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

fn column_date(idx: usize, raw: String) -> rusqlite::Result<NaiveDate> {
    raw.parse::<NaiveDate>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("{raw:?}: {e}").into(),
        )
    })
}

/// Records one activity: ledger row, score increment and streak advance commit
/// together or not at all. An unknown student fails before anything is written.
pub fn add_activity(
    conn: &Connection,
    student_id: &str,
    input: &NewActivity,
    now: DateTime<Utc>,
) -> AppResult<ActivityOutcome> {
    validate(input)?;

    let tx = db::begin_write(conn)?;

    let exists: Option<i64> = tx
        .query_row(
            "SELECT 1 FROM student_profiles WHERE id = ?",
            [student_id],
            |r| r.get(0),
        )
        .optional()?;
    if exists.is_none() {
        return Err(AppError::NotFound {
            entity: "student profile",
        });
    }

    let activity = Activity {
        id: Uuid::new_v4().to_string(),
        student_id: student_id.to_string(),
        category: input.category,
        activity_type: input.activity_type,
        description: input.description.trim().to_string(),
        points: input.points,
        created_at: db::timestamp(now),
    };
    tx.execute(
        "INSERT INTO activities(id, student_id, category, type, description, points, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &activity.id,
            &activity.student_id,
            activity.category.as_str(),
            activity.activity_type.as_str(),
            &activity.description,
            activity.points,
            &activity.created_at,
        ),
    )?;

    // Increment in SQL so concurrent writers never lose an update.
    let column = input.category.score_column();
    tx.execute(
        &format!("UPDATE student_profiles SET {column} = {column} + ? WHERE id = ?"),
        (input.points, student_id),
    )?;
    let new_score: i64 = tx.query_row(
        &format!("SELECT {column} FROM student_profiles WHERE id = ?"),
        [student_id],
        |r| r.get(0),
    )?;

    let previous = load_streak(&tx, student_id)?.unwrap_or(Streak {
        current_streak: 0,
        longest_streak: 0,
        last_activity_date: None,
    });
    let streak = advance_streak(previous, now.date_naive());
    tx.execute(
        "INSERT INTO learning_streaks(student_id, current_streak, longest_streak, last_activity_date)
         VALUES(?, ?, ?, ?)
         ON CONFLICT(student_id) DO UPDATE SET
           current_streak = excluded.current_streak,
           longest_streak = excluded.longest_streak,
           last_activity_date = excluded.last_activity_date",
        (
            student_id,
            streak.current_streak,
            streak.longest_streak,
            streak
                .last_activity_date
                .map(|d| d.to_string()),
        ),
    )?;

    tx.commit()?;

    tracing::debug!(
        student_id,
        category = %input.category,
        points = input.points,
        new_score,
        "activity recorded"
    );
    Ok(ActivityOutcome {
        activity,
        category: input.category,
        new_score,
        streak,
    })
}

/// Newest activities across every category.
pub fn recent_activities(
    conn: &Connection,
    student_id: &str,
    limit: Option<i64>,
) -> AppResult<Vec<Activity>> {
    let limit = limit
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .clamp(1, MAX_RECENT_LIMIT);
    let mut stmt = conn.prepare(
        "SELECT id, student_id, category, type, description, points, created_at
         FROM activities
         WHERE student_id = ?
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?",
    )?;
    let rows = stmt
        .query_map((student_id, limit), |r| {
            Ok(Activity {
                id: r.get(0)?,
                student_id: r.get(1)?,
                category: column_enum(2, r.get(2)?)?,
                activity_type: column_enum(3, r.get(3)?)?,
                description: r.get(4)?,
                points: r.get(5)?,
                created_at: r.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// The student's streak; zeros when no row exists yet.
pub fn streak(conn: &Connection, student_id: &str) -> AppResult<Streak> {
    Ok(load_streak(conn, student_id)?.unwrap_or(Streak {
        current_streak: 0,
        longest_streak: 0,
        last_activity_date: None,
    }))
}

/// Recomputes every total from the ledger and compares it with the cached score.
pub fn audit(conn: &Connection, student_id: &str) -> AppResult<Vec<CategoryAudit>> {
    let cached: Option<(i64, i64, i64)> = conn
        .query_row(
            "SELECT readiness_score, citizenship_score, self_management_score
             FROM student_profiles WHERE id = ?",
            [student_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?;
    let Some((readiness, citizenship, self_management)) = cached else {
        return Err(AppError::NotFound {
            entity: "student profile",
        });
    };

    let mut out = Vec::with_capacity(ScoreCategory::ALL.len());
    for category in ScoreCategory::ALL {
        let ledger_points: i64 = conn.query_row(
            "SELECT COALESCE(SUM(points), 0) FROM activities WHERE student_id = ? AND category = ?",
            (student_id, category.as_str()),
            |r| r.get(0),
        )?;
        let cached = match category {
            ScoreCategory::Readiness => readiness,
            ScoreCategory::Citizenship => citizenship,
            ScoreCategory::SelfManagement => self_management,
        };
        let expected = SEED_SCORE + ledger_points;
        if expected != cached {
            tracing::warn!(student_id, category = %category, expected, cached, "score cache drifted from ledger");
        }
        out.push(CategoryAudit {
            category: *category,
            ledger_points,
            expected,
            cached,
            consistent: expected == cached,
        });
    }
    Ok(out)
}
