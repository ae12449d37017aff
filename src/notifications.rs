//! Notification targeting and per-user read receipts.

use crate::auth::User;
use crate::db;
use crate::error::{AppError, AppResult};
use crate::model::{column_enum, NotificationPriority, NotificationType, Role};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub priority: NotificationPriority,
    pub target_role: Option<Role>,
    pub target_users: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub priority: NotificationPriority,
    pub target_role: Option<Role>,
    pub target_users: BTreeSet<String>,
    pub read_by: BTreeSet<String>,
    pub created_by: Option<String>,
    pub created_at: String,
}

/// A notification as seen by one caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivered {
    #[serde(flatten)]
    pub notification: Notification,
    pub read: bool,
}

impl Notification {
    /// Broadcast when no role is set; otherwise the role matches or the user is listed.
    pub fn is_visible_to(&self, user_id: &str, role: Role) -> bool {
        match self.target_role {
            None => true,
            Some(r) => r == role || self.target_users.contains(user_id),
        }
    }
}

pub fn create(
    conn: &Connection,
    author: &User,
    input: &NewNotification,
    now: DateTime<Utc>,
) -> AppResult<Notification> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(AppError::invalid("title", "must not be empty"));
    }
    let message = input.message.trim();
    if message.is_empty() {
        return Err(AppError::invalid("message", "must not be empty"));
    }

    let target_users: BTreeSet<String> = input
        .target_users
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let mut unknown = Vec::new();
    for uid in &target_users {
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM users WHERE id = ?", [uid], |r| r.get(0))
            .optional()?;
        if found.is_none() {
            unknown.push(uid.clone());
        }
    }
    if !unknown.is_empty() {
        return Err(AppError::invalid(
            "targetUsers",
            format!("unknown user ids: {}", unknown.join(", ")),
        ));
    }

    let n = Notification {
        id: Uuid::new_v4().to_string(),
        title: title.to_string(),
        message: message.to_string(),
        notification_type: input.notification_type,
        priority: input.priority,
        target_role: input.target_role,
        target_users,
        read_by: BTreeSet::new(),
        created_by: Some(author.id.clone()),
        created_at: db::timestamp(now),
    };

    let tx = db::begin_write(conn)?;
    tx.execute(
        "INSERT INTO notifications(id, title, message, type, priority, target_role, created_by, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &n.id,
            &n.title,
            &n.message,
            n.notification_type.as_str(),
            n.priority.as_str(),
            n.target_role.map(|r| r.as_str()),
            &n.created_by,
            &n.created_at,
        ),
    )?;
    {
        let mut stmt =
            tx.prepare("INSERT INTO notification_targets(notification_id, user_id) VALUES(?, ?)")?;
        for uid in &n.target_users {
            stmt.execute((&n.id, uid))?;
        }
    }
    tx.commit()?;

    tracing::info!(
        notification_id = %n.id,
        target_role = n.target_role.map(|r| r.as_str()).unwrap_or("ALL"),
        target_users = n.target_users.len(),
        "notification created"
    );
    Ok(n)
}

fn user_ids(conn: &Connection, sql: &str, notification_id: &str) -> AppResult<BTreeSet<String>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let ids = stmt
        .query_map([notification_id], |r| r.get::<_, String>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(ids)
}

fn hydrate(conn: &Connection, mut n: Notification) -> AppResult<Notification> {
    n.target_users = user_ids(
        conn,
        "SELECT user_id FROM notification_targets WHERE notification_id = ?",
        &n.id,
    )?;
    n.read_by = user_ids(
        conn,
        "SELECT user_id FROM notification_reads WHERE notification_id = ?",
        &n.id,
    )?;
    Ok(n)
}

fn map_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    let role: Option<String> = r.get(5)?;
    Ok(Notification {
        id: r.get(0)?,
        title: r.get(1)?,
        message: r.get(2)?,
        notification_type: column_enum(3, r.get(3)?)?,
        priority: column_enum(4, r.get(4)?)?,
        target_role: role.map(|s| column_enum(5, s)).transpose()?,
        target_users: BTreeSet::new(),
        read_by: BTreeSet::new(),
        created_by: r.get(6)?,
        created_at: r.get(7)?,
    })
}

pub fn find(conn: &Connection, notification_id: &str) -> AppResult<Option<Notification>> {
    let n = conn
        .query_row(
            "SELECT id, title, message, type, priority, target_role, created_by, created_at
             FROM notifications WHERE id = ?",
            [notification_id],
            map_row,
        )
        .optional()?;
    n.map(|n| hydrate(conn, n)).transpose()
}

/// Everything visible to `user`, newest first.
pub fn list_for(conn: &Connection, user: &User) -> AppResult<Vec<Delivered>> {
    let mut stmt = conn.prepare(
        "SELECT n.id, n.title, n.message, n.type, n.priority, n.target_role, n.created_by, n.created_at
         FROM notifications n
         WHERE n.target_role IS NULL
            OR n.target_role = ?1
            OR EXISTS(
                SELECT 1 FROM notification_targets t
                WHERE t.notification_id = n.id AND t.user_id = ?2
            )
         ORDER BY n.created_at DESC, n.rowid DESC",
    )?;
    let rows = stmt
        .query_map((user.role.as_str(), &user.id), map_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Vec::with_capacity(rows.len());
    for n in rows {
        let n = hydrate(conn, n)?;
        let read = n.read_by.contains(&user.id);
        out.push(Delivered {
            notification: n,
            read,
        });
    }
    Ok(out)
}

/// Adds the caller to `readBy`. Repeating it changes nothing.
pub fn mark_read(
    conn: &Connection,
    user: &User,
    notification_id: &str,
    now: DateTime<Utc>,
) -> AppResult<Notification> {
    let Some(n) = find(conn, notification_id)? else {
        return Err(AppError::NotFound {
            entity: "notification",
        });
    };
    if !n.is_visible_to(&user.id, user.role) {
        return Err(AppError::NotFound {
            entity: "notification",
        });
    }
    let added = conn.execute(
        "INSERT OR IGNORE INTO notification_reads(notification_id, user_id, read_at) VALUES(?, ?, ?)",
        (&n.id, &user.id, db::timestamp(now)),
    )?;
    if added == 0 {
        tracing::debug!(notification_id, user_id = %user.id, "notification already read");
        return Ok(n);
    }
    hydrate(conn, n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth;
    use crate::db::open_memory;
    use chrono::Duration;

    fn user(conn: &Connection, email: &str, role: Role) -> User {
        auth::register(conn, email, "U", role, Utc::now()).expect("register")
    }

    fn notice(role: Option<Role>, users: Vec<String>) -> NewNotification {
        NewNotification {
            title: "Library hours".into(),
            message: "Open late this week".into(),
            notification_type: NotificationType::Event,
            priority: NotificationPriority::Normal,
            target_role: role,
            target_users: users,
        }
    }

    #[test]
    fn broadcast_is_visible_to_every_role() {
        let conn = open_memory().expect("db");
        let admin = user(&conn, "admin@uni.edu", Role::Admin);
        create(&conn, &admin, &notice(None, vec![]), Utc::now()).expect("create");
        for (i, role) in Role::ALL.iter().enumerate() {
            let u = user(&conn, &format!("u{i}@uni.edu"), *role);
            let seen = list_for(&conn, &u).expect("list");
            assert_eq!(seen.len(), 1, "role {role} should see broadcast");
            assert!(!seen[0].read);
        }
    }

    #[test]
    fn role_and_user_targeting() {
        let conn = open_memory().expect("db");
        let admin = user(&conn, "admin@uni.edu", Role::Admin);
        let teacher = user(&conn, "t@uni.edu", Role::Teacher);
        let student = user(&conn, "s@uni.edu", Role::Student);
        let picked = user(&conn, "p@uni.edu", Role::Student);

        let now = Utc::now();
        create(&conn, &admin, &notice(Some(Role::Teacher), vec![]), now).expect("teachers");
        create(
            &conn,
            &admin,
            &notice(Some(Role::Teacher), vec![picked.id.clone()]),
            now + Duration::seconds(1),
        )
        .expect("teachers plus one student");

        assert_eq!(list_for(&conn, &teacher).expect("teacher").len(), 2);
        assert_eq!(list_for(&conn, &student).expect("student").len(), 0);
        let picked_sees = list_for(&conn, &picked).expect("picked");
        assert_eq!(picked_sees.len(), 1);
        assert!(picked_sees[0]
            .notification
            .is_visible_to(&picked.id, picked.role));
        assert!(!picked_sees[0]
            .notification
            .is_visible_to(&student.id, student.role));
    }

    #[test]
    fn mark_read_is_idempotent() {
        let conn = open_memory().expect("db");
        let admin = user(&conn, "admin@uni.edu", Role::Admin);
        let student = user(&conn, "s@uni.edu", Role::Student);
        let n = create(&conn, &admin, &notice(None, vec![]), Utc::now()).expect("create");

        mark_read(&conn, &student, &n.id, Utc::now()).expect("first");
        let after = mark_read(&conn, &student, &n.id, Utc::now()).expect("second");
        assert_eq!(after.read_by.len(), 1);
        let rows: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM notification_reads WHERE notification_id = ? AND user_id = ?",
                (&n.id, &student.id),
                |r| r.get(0),
            )
            .expect("count");
        assert_eq!(rows, 1);
        assert!(list_for(&conn, &student).expect("list")[0].read);
    }

    #[test]
    fn invisible_or_missing_notification_cannot_be_marked() {
        let conn = open_memory().expect("db");
        let admin = user(&conn, "admin@uni.edu", Role::Admin);
        let student = user(&conn, "s@uni.edu", Role::Student);
        let n = create(&conn, &admin, &notice(Some(Role::Teacher), vec![]), Utc::now()).expect("create");
        assert!(matches!(
            mark_read(&conn, &student, &n.id, Utc::now()),
            Err(AppError::NotFound { .. })
        ));
        assert!(matches!(
            mark_read(&conn, &student, "nope", Utc::now()),
            Err(AppError::NotFound { .. })
        ));
    }

    #[test]
    fn unknown_target_users_are_rejected() {
        let conn = open_memory().expect("db");
        let admin = user(&conn, "admin@uni.edu", Role::Admin);
        let res = create(
            &conn,
            &admin,
            &notice(Some(Role::Student), vec!["ghost".into()]),
            Utc::now(),
        );
        assert!(matches!(res, Err(AppError::InvalidInput { field: "targetUsers", .. })));
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM notifications", [], |r| r.get(0))
            .expect("count");
        assert_eq!(n, 0);
    }
}
