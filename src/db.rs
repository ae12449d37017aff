use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;

pub const DB_FILENAME: &str = "campus.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILENAME);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    // Several sidecars may share one workspace; wait for the writer instead of failing.
    conn.busy_timeout(std::time::Duration::from_secs(5))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'STUDENT',
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_profiles(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL UNIQUE,
            year_of_study INTEGER NOT NULL,
            major TEXT NOT NULL,
            interests TEXT NOT NULL DEFAULT '[]',
            readiness_score INTEGER NOT NULL DEFAULT 500,
            citizenship_score INTEGER NOT NULL DEFAULT 500,
            self_management_score INTEGER NOT NULL DEFAULT 500,
            readiness_components TEXT NOT NULL,
            citizenship_components TEXT NOT NULL,
            self_management_components TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS activities(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            category TEXT NOT NULL,
            type TEXT NOT NULL,
            description TEXT NOT NULL,
            points INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES student_profiles(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_activities_student ON activities(student_id, created_at)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS learning_streaks(
            student_id TEXT PRIMARY KEY,
            current_streak INTEGER NOT NULL DEFAULT 0,
            longest_streak INTEGER NOT NULL DEFAULT 0,
            last_activity_date TEXT,
            FOREIGN KEY(student_id) REFERENCES student_profiles(id),
            CHECK(longest_streak >= current_streak)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS notifications(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            message TEXT NOT NULL,
            type TEXT NOT NULL,
            priority TEXT NOT NULL,
            target_role TEXT,
            created_by TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(created_by) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_notifications_role ON notifications(target_role)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS notification_targets(
            notification_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            PRIMARY KEY(notification_id, user_id),
            FOREIGN KEY(notification_id) REFERENCES notifications(id),
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_notification_targets_user ON notification_targets(user_id)",
        [],
    )?;
    // Read receipts are a set: the primary key makes a second mark a no-op.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS notification_reads(
            notification_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            read_at TEXT NOT NULL,
            PRIMARY KEY(notification_id, user_id),
            FOREIGN KEY(notification_id) REFERENCES notifications(id),
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS recommendations(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            type TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'PENDING',
            priority INTEGER NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES student_profiles(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_recommendations_student ON recommendations(student_id, status)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS locations(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            type TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            building TEXT NOT NULL,
            floor INTEGER NOT NULL,
            room_number TEXT NOT NULL,
            capacity INTEGER,
            description TEXT,
            features TEXT NOT NULL DEFAULT '[]',
            is_available INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_locations_type_name ON locations(type, name)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS location_ratings(
            id TEXT PRIMARY KEY,
            location_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            rating INTEGER NOT NULL CHECK(rating BETWEEN 1 AND 5),
            comment TEXT,
            created_at TEXT NOT NULL,
            UNIQUE(location_id, user_id),
            FOREIGN KEY(location_id) REFERENCES locations(id),
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        [],
    )?;

    Ok(())
}

/// `BEGIN IMMEDIATE`: the write lock is taken up front, so a concurrent writer
/// waits on the busy timeout rather than failing a later lock upgrade.
pub fn begin_write(conn: &Connection) -> rusqlite::Result<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
}

/// Timestamps are stored as fixed-width UTC RFC 3339 so text order is time order.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
