//! Campus map directory.

use crate::db;
use crate::error::{AppError, AppResult};
use crate::model::{column_enum, LocationType};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewLocation {
    pub name: String,
    pub location_type: LocationType,
    pub latitude: f64,
    pub longitude: f64,
    pub building: String,
    pub floor: i64,
    pub room_number: String,
    pub capacity: Option<i64>,
    pub description: Option<String>,
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub location_type: LocationType,
    pub latitude: f64,
    pub longitude: f64,
    pub building: String,
    pub floor: i64,
    pub room_number: String,
    pub capacity: Option<i64>,
    pub description: Option<String>,
    pub features: Vec<String>,
    pub is_available: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: String,
    pub location_id: String,
    pub user_id: String,
    pub rating: i64,
    pub comment: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationDetail {
    #[serde(flatten)]
    pub location: Location,
    pub ratings: Vec<Rating>,
    pub average_rating: Option<f64>,
}

const COLUMNS: &str = "id, name, type, latitude, longitude, building, floor, room_number,
    capacity, description, features, is_available, created_at, updated_at";

fn map_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<(Location, String)> {
    Ok((
        Location {
            id: r.get(0)?,
            name: r.get(1)?,
            location_type: column_enum(2, r.get(2)?)?,
            latitude: r.get(3)?,
            longitude: r.get(4)?,
            building: r.get(5)?,
            floor: r.get(6)?,
            room_number: r.get(7)?,
            capacity: r.get(8)?,
            description: r.get(9)?,
            features: Vec::new(),
            is_available: r.get::<_, i64>(11)? != 0,
            created_at: r.get(12)?,
            updated_at: r.get(13)?,
        },
        r.get(10)?,
    ))
}

fn decode((mut loc, features): (Location, String)) -> AppResult<Location> {
    loc.features = serde_json::from_str(&features)?;
    Ok(loc)
}

pub fn create(conn: &Connection, input: &NewLocation, now: DateTime<Utc>) -> AppResult<Location> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::invalid("name", "must not be empty"));
    }
    if !(-90.0..=90.0).contains(&input.latitude) {
        return Err(AppError::invalid("latitude", "must be between -90 and 90"));
    }
    if !(-180.0..=180.0).contains(&input.longitude) {
        return Err(AppError::invalid("longitude", "must be between -180 and 180"));
    }
    if matches!(input.capacity, Some(c) if c < 0) {
        return Err(AppError::invalid("capacity", "must not be negative"));
    }
    let stamp = db::timestamp(now);
    let loc = Location {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        location_type: input.location_type,
        latitude: input.latitude,
        longitude: input.longitude,
        building: input.building.trim().to_string(),
        floor: input.floor,
        room_number: input.room_number.trim().to_string(),
        capacity: input.capacity,
        description: input
            .description
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        features: input
            .features
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        is_available: true,
        created_at: stamp.clone(),
        updated_at: stamp,
    };
    conn.execute(
        &format!("INSERT INTO locations({COLUMNS}) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"),
        rusqlite::params![
            loc.id,
            loc.name,
            loc.location_type.as_str(),
            loc.latitude,
            loc.longitude,
            loc.building,
            loc.floor,
            loc.room_number,
            loc.capacity,
            loc.description,
            serde_json::to_string(&loc.features)?,
            loc.is_available as i64,
            loc.created_at,
            loc.updated_at,
        ],
    )?;
    tracing::info!(location_id = %loc.id, name = %loc.name, "location created");
    Ok(loc)
}

/// Locations sorted by name, optionally restricted to one type.
pub fn list(conn: &Connection, filter: Option<LocationType>) -> AppResult<Vec<Location>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM locations
         WHERE (?1 IS NULL OR type = ?1)
         ORDER BY name COLLATE NOCASE, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([filter.map(|t| t.as_str())], map_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(decode).collect()
}

fn find(conn: &Connection, location_id: &str) -> AppResult<Location> {
    let sql = format!("SELECT {COLUMNS} FROM locations WHERE id = ?");
    let row = conn.query_row(&sql, [location_id], map_row).optional()?;
    match row {
        Some(r) => decode(r),
        None => Err(AppError::NotFound { entity: "location" }),
    }
}

pub fn get(conn: &Connection, location_id: &str) -> AppResult<LocationDetail> {
    let location = find(conn, location_id)?;
    let mut stmt = conn.prepare(
        "SELECT id, location_id, user_id, rating, comment, created_at
         FROM location_ratings WHERE location_id = ?
         ORDER BY created_at DESC, rowid DESC",
    )?;
    let ratings = stmt
        .query_map([location_id], |r| {
            Ok(Rating {
                id: r.get(0)?,
                location_id: r.get(1)?,
                user_id: r.get(2)?,
                rating: r.get(3)?,
                comment: r.get(4)?,
                created_at: r.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    let average_rating = if ratings.is_empty() {
        None
    } else {
        Some(ratings.iter().map(|r| r.rating as f64).sum::<f64>() / ratings.len() as f64)
    };
    Ok(LocationDetail {
        location,
        ratings,
        average_rating,
    })
}

pub fn set_availability(
    conn: &Connection,
    location_id: &str,
    is_available: bool,
    now: DateTime<Utc>,
) -> AppResult<Location> {
    let changed = conn.execute(
        "UPDATE locations SET is_available = ?, updated_at = ? WHERE id = ?",
        (is_available as i64, db::timestamp(now), location_id),
    )?;
    if changed == 0 {
        return Err(AppError::NotFound { entity: "location" });
    }
    find(conn, location_id)
}

/// One rating per user and location; rating again replaces the earlier one.
pub fn rate(
    conn: &Connection,
    location_id: &str,
    user_id: &str,
    rating: i64,
    comment: Option<&str>,
    now: DateTime<Utc>,
) -> AppResult<Rating> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::invalid("rating", "must be between 1 and 5"));
    }
    find(conn, location_id)?;
    let r = Rating {
        id: Uuid::new_v4().to_string(),
        location_id: location_id.to_string(),
        user_id: user_id.to_string(),
        rating,
        comment: comment
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        created_at: db::timestamp(now),
    };
    conn.execute(
        "INSERT INTO location_ratings(id, location_id, user_id, rating, comment, created_at)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(location_id, user_id) DO UPDATE SET
           rating = excluded.rating,
           comment = excluded.comment,
           created_at = excluded.created_at",
        (&r.id, &r.location_id, &r.user_id, r.rating, &r.comment, &r.created_at),
    )?;
    // On replace the original row id is kept.
    let id: String = conn.query_row(
        "SELECT id FROM location_ratings WHERE location_id = ? AND user_id = ?",
        (location_id, user_id),
        |row| row.get(0),
    )?;
    Ok(Rating { id, ..r })
}
