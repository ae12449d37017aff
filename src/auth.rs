//! Session identity: resolves the host-supplied session email to a user row and
//! enforces role gates.

use crate::db;
use crate::error::{is_unique_violation, AppError, AppResult};
use crate::model::{column_enum, Role};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: String,
}

pub fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_ascii_lowercase();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(AppError::invalid("email", "must contain '@'"));
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(AppError::invalid("email", "malformed address"));
    }
    Ok(email)
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        role: column_enum(3, row.get(3)?)?,
        created_at: row.get(4)?,
    })
}

pub fn find_by_email(conn: &Connection, email: &str) -> AppResult<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, email, name, role, created_at FROM users WHERE email = ?",
            [email],
            map_user,
        )
        .optional()?;
    Ok(user)
}

/// The caller behind the current session. A missing session or an email with no
/// user row are both `Unauthorized`.
pub fn current_user(conn: &Connection, session_email: Option<&str>) -> AppResult<User> {
    let Some(email) = session_email else {
        return Err(AppError::Unauthorized);
    };
    find_by_email(conn, email)?.ok_or(AppError::Unauthorized)
}

pub fn require_admin(user: &User) -> AppResult<()> {
    if user.role.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("ADMIN"))
    }
}

pub fn register(
    conn: &Connection,
    email: &str,
    name: &str,
    role: Role,
    now: DateTime<Utc>,
) -> AppResult<User> {
    let email = normalize_email(email)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::invalid("name", "must not be empty"));
    }
    let user = User {
        id: Uuid::new_v4().to_string(),
        email,
        name: name.to_string(),
        role,
        created_at: db::timestamp(now),
    };
    match conn.execute(
        "INSERT INTO users(id, email, name, role, created_at) VALUES(?, ?, ?, ?, ?)",
        (
            &user.id,
            &user.email,
            &user.name,
            user.role.as_str(),
            &user.created_at,
        ),
    ) {
        Ok(_) => Ok(user),
        Err(e) if is_unique_violation(&e) => Err(AppError::Conflict(format!(
            "user {} already exists",
            user.email
        ))),
        Err(e) => Err(e.into()),
    }
}

pub fn set_role(conn: &Connection, email: &str, role: Role) -> AppResult<User> {
    let email = normalize_email(email)?;
    let changed = conn.execute(
        "UPDATE users SET role = ? WHERE email = ?",
        (role.as_str(), &email),
    )?;
    if changed == 0 {
        return Err(AppError::NotFound { entity: "user" });
    }
    find_by_email(conn, &email)?.ok_or(AppError::NotFound { entity: "user" })
}

/// Makes sure the configured bootstrap address exists and is a SUPER_ADMIN.
pub fn ensure_super_admin(conn: &Connection, email: &str, now: DateTime<Utc>) -> AppResult<User> {
    let email = normalize_email(email)?;
    if find_by_email(conn, &email)?.is_some() {
        return set_role(conn, &email, Role::SuperAdmin);
    }
    let name = email.split('@').next().unwrap_or("admin").to_string();
    register(conn, &email, &name, Role::SuperAdmin, now)
}
