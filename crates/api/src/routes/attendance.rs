use axum::{
    Json,
    extract::{Path, State},
};
use bson::DateTime;
use chrono::Utc;
use roomgate_db::models::ParticipantRole;
use roomgate_services::attendance::{AttendanceEntry, SessionDuration};
use roomgate_services::store::SessionAmendment;
use serde::{Deserialize, Serialize};

use super::{hex, parse_id, rfc3339};
use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Serialize)]
pub struct AttendanceResponse {
    pub id: String,
    pub room_id: String,
    pub user_id: String,
    pub role: ParticipantRole,
    pub join_time: String,
    pub leave_time: Option<String>,
    pub is_active: bool,
    pub duration: Option<SessionDuration>,
}

#[derive(Debug, Deserialize)]
pub struct AmendRequest {
    pub leave_time: Option<chrono::DateTime<Utc>>,
    pub role: Option<ParticipantRole>,
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(attendance_id): Path<String>,
) -> Result<Json<AttendanceResponse>, ApiError> {
    let id = parse_id(&attendance_id, "attendance_id")?;
    let entry = state.admission.attendance_record(id, auth.user_id).await?;
    Ok(Json(to_response(entry)))
}

pub async fn amend(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(attendance_id): Path<String>,
    Json(body): Json<AmendRequest>,
) -> Result<Json<AttendanceResponse>, ApiError> {
    let id = parse_id(&attendance_id, "attendance_id")?;
    let amendment = SessionAmendment {
        leave_time: body.leave_time.map(DateTime::from_chrono),
        role: body.role,
    };
    let entry = state
        .admission
        .amend_attendance(id, auth.user_id, amendment)
        .await?;
    Ok(Json(to_response(entry)))
}

pub async fn for_room(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rid = parse_id(&room_id, "room_id")?;
    let (entries, stats) = state.admission.room_attendance(rid, auth.user_id).await?;

    let items: Vec<AttendanceResponse> = entries.into_iter().map(to_response).collect();
    Ok(Json(serde_json::json!({
        "items": items,
        "stats": stats,
    })))
}

pub async fn mine(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (entries, stats) = state.admission.user_attendance(auth.user_id).await?;

    let items: Vec<AttendanceResponse> = entries.into_iter().map(to_response).collect();
    Ok(Json(serde_json::json!({
        "items": items,
        "stats": stats,
    })))
}

pub(crate) fn to_response(entry: AttendanceEntry) -> AttendanceResponse {
    let record = entry.record;
    AttendanceResponse {
        id: hex(record.id),
        room_id: record.room_id.to_hex(),
        user_id: record.user_id.to_hex(),
        role: record.role,
        is_active: record.is_active(),
        join_time: rfc3339(record.join_time),
        leave_time: record.leave_time.map(rfc3339),
        duration: entry.duration,
    }
}
