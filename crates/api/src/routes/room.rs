use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use bson::DateTime;
use chrono::Utc;
use roomgate_db::models::{Room, RoomStatus};
use roomgate_services::admission::{CreateRoom, StatusChange};
use roomgate_services::capacity::Occupancy;
use roomgate_services::store::{RoomChanges, RoomQuery};
use serde::{Deserialize, Serialize};

use super::{hex, page_params, paginated, parse_id, rfc3339};
use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub title: String,
    pub description: Option<String>,
    pub date: Option<chrono::DateTime<Utc>>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub max_participants: Option<u32>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub start_now: bool,
}

/// Edits a room's details. Status moves through `/status` instead.
#[derive(Debug, Deserialize)]
pub struct UpdateRoomRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<chrono::DateTime<Utc>>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub max_participants: Option<u32>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<RoomStatus>,
    pub created_by: Option<String>,
    pub is_public: Option<bool>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub status: Option<RoomStatus>,
    pub from_date: Option<chrono::DateTime<Utc>>,
    pub to_date: Option<chrono::DateTime<Utc>>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct UserRoomsQuery {
    pub status: Option<RoomStatus>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Both bounds or neither; without them the current month is used.
#[derive(Debug, Deserialize)]
pub struct TimelineQuery {
    pub start: Option<chrono::DateTime<Utc>>,
    pub end: Option<chrono::DateTime<Utc>>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: RoomStatus,
}

#[derive(Debug, Serialize)]
pub struct RoomResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub room_name: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub status: RoomStatus,
    pub max_participants: u32,
    pub created_by: String,
    pub is_public: bool,
    pub created_at: String,
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomResponse>), ApiError> {
    let room = state
        .admission
        .create_room(
            auth.user_id,
            CreateRoom {
                title: body.title,
                description: body.description,
                date: body.date,
                start_time: body.start_time,
                end_time: body.end_time,
                max_participants: body.max_participants,
                is_public: body.is_public,
                start_now: body.start_now,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(to_response(room))))
}

pub async fn get(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(room_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rid = parse_id(&room_id, "room_id")?;
    let (room, duration) = state.admission.room_info(rid).await?;

    Ok(Json(serde_json::json!({
        "room": to_response(room),
        "duration": duration,
    })))
}

pub async fn list(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let created_by = query
        .created_by
        .as_deref()
        .map(|raw| parse_id(raw, "created_by"))
        .transpose()?;
    let filter = RoomQuery {
        status: query.status,
        created_by,
        is_public: query.is_public,
        ..Default::default()
    };
    let rooms = state
        .admission
        .list_rooms(filter, page_params(query.page, query.per_page))
        .await?;
    Ok(Json(paginated(rooms.map(to_response))))
}

pub async fn search(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let filter = RoomQuery {
        status: query.status,
        text: query.q,
        date_from: query.from_date.map(DateTime::from_chrono),
        date_to: query.to_date.map(DateTime::from_chrono),
        ..Default::default()
    };
    let rooms = state
        .admission
        .search_rooms(filter, page_params(query.page, query.per_page))
        .await?;
    Ok(Json(paginated(rooms.map(to_response))))
}

pub async fn by_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(user_id): Path<String>,
    Query(query): Query<UserRoomsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let uid = parse_id(&user_id, "user_id")?;
    let rooms = state
        .admission
        .user_rooms(uid, query.status, page_params(query.page, query.per_page))
        .await?;
    Ok(Json(paginated(rooms.map(to_response))))
}

pub async fn timeline(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<TimelineQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let range = match (query.start, query.end) {
        (Some(start), Some(end)) => Some((DateTime::from_chrono(start), DateTime::from_chrono(end))),
        (None, None) => None,
        _ => {
            return Err(ApiError::BadRequest(
                "start and end must be given together".to_string(),
            ));
        }
    };
    let timeline = state
        .admission
        .room_timeline(auth.user_id, range, page_params(query.page, query.per_page))
        .await?;

    let mut body = paginated(timeline.rooms.map(to_response));
    body["date_range"] = serde_json::json!({
        "start": rfc3339(timeline.from),
        "end": rfc3339(timeline.to),
    });
    Ok(Json(body))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
    Json(body): Json<UpdateRoomRequest>,
) -> Result<Json<RoomResponse>, ApiError> {
    let rid = parse_id(&room_id, "room_id")?;
    let changes = RoomChanges {
        title: body.title,
        description: body.description,
        date: body.date.map(DateTime::from_chrono),
        start_time: body.start_time,
        end_time: body.end_time,
        max_participants: body.max_participants,
        is_public: body.is_public,
    };
    let room = state.admission.update_room(rid, auth.user_id, changes).await?;
    Ok(Json(to_response(room)))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rid = parse_id(&room_id, "room_id")?;
    let removal = state.admission.delete_room(rid, auth.user_id).await?;
    Ok(Json(serde_json::json!({
        "deleted": true,
        "room": to_response(removal.room),
        "participants_removed": removal.participants_removed,
    })))
}

pub async fn go_live(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rid = parse_id(&room_id, "room_id")?;
    let change = state.admission.go_live(rid, auth.user_id).await?;
    Ok(Json(status_change(change)))
}

pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rid = parse_id(&room_id, "room_id")?;
    let change = state
        .admission
        .set_status(rid, auth.user_id, body.status)
        .await?;
    Ok(Json(status_change(change)))
}

pub async fn occupancy(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(room_id): Path<String>,
) -> Result<Json<Occupancy>, ApiError> {
    let rid = parse_id(&room_id, "room_id")?;
    Ok(Json(state.admission.occupancy(rid).await?))
}

fn status_change(change: StatusChange) -> serde_json::Value {
    serde_json::json!({
        "room": to_response(change.room),
        "participants_auto_joined": change.participants_auto_joined,
        "sessions_closed": change.sessions_closed,
    })
}

pub(crate) fn to_response(room: Room) -> RoomResponse {
    RoomResponse {
        id: hex(room.id),
        title: room.title,
        description: room.description,
        room_name: room.room_name,
        date: rfc3339(room.date),
        start_time: room.start_time,
        end_time: room.end_time,
        status: room.status,
        max_participants: room.max_participants,
        created_by: room.created_by.to_hex(),
        is_public: room.is_public,
        created_at: rfc3339(room.created_at),
    }
}
