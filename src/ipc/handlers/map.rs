use crate::error::AppResult;
use crate::ipc::helpers::{
    admin, caller, conn, get_optional_i64, get_optional_label, get_optional_str,
    get_required_bool, get_required_f64, get_required_i64, get_required_label, get_required_str,
    get_str_list, respond,
};
use crate::ipc::types::{AppState, Request};
use crate::locations::{self, Location, LocationDetail, NewLocation, Rating};
use crate::model::LocationType;
use chrono::Utc;

fn list(state: &AppState, req: &Request) -> AppResult<Vec<Location>> {
    let filter = get_optional_label::<LocationType>(&req.params, "type")?;
    locations::list(conn(state)?, filter)
}

fn get(state: &AppState, req: &Request) -> AppResult<LocationDetail> {
    let location_id = get_required_str(&req.params, "locationId")?;
    locations::get(conn(state)?, &location_id)
}

fn create(state: &AppState, req: &Request) -> AppResult<Location> {
    let (conn, _) = admin(state)?;
    let p = &req.params;
    let input = NewLocation {
        name: get_required_str(p, "name")?,
        location_type: get_required_label::<LocationType>(p, "type")?,
        latitude: get_required_f64(p, "latitude")?,
        longitude: get_required_f64(p, "longitude")?,
        building: get_required_str(p, "building")?,
        floor: get_required_i64(p, "floor")?,
        room_number: get_required_str(p, "roomNumber")?,
        capacity: get_optional_i64(p, "capacity")?,
        description: get_optional_str(p, "description")?,
        features: get_str_list(p, "features")?,
    };
    locations::create(conn, &input, Utc::now())
}

fn set_availability(state: &AppState, req: &Request) -> AppResult<Location> {
    let (conn, _) = admin(state)?;
    let location_id = get_required_str(&req.params, "locationId")?;
    let is_available = get_required_bool(&req.params, "isAvailable")?;
    locations::set_availability(conn, &location_id, is_available, Utc::now())
}

fn rate(state: &AppState, req: &Request) -> AppResult<Rating> {
    let (conn, user) = caller(state)?;
    let location_id = get_required_str(&req.params, "locationId")?;
    let rating = get_required_i64(&req.params, "rating")?;
    let comment = get_optional_str(&req.params, "comment")?;
    locations::rate(
        conn,
        &location_id,
        &user.id,
        rating,
        comment.as_deref(),
        Utc::now(),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "map.locations.list" => Some(respond(&req.id, "fetch locations", list(state, req))),
        "map.locations.get" => Some(respond(&req.id, "fetch location", get(state, req))),
        "map.locations.create" => Some(respond(&req.id, "create location", create(state, req))),
        "map.locations.setAvailability" => Some(respond(
            &req.id,
            "update location status",
            set_availability(state, req),
        )),
        "map.locations.rate" => Some(respond(&req.id, "rate location", rate(state, req))),
        _ => None,
    }
}
