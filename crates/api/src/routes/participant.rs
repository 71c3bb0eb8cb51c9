use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use roomgate_db::models::{Participant, ParticipantRole, ParticipantStatus};
use roomgate_services::lifecycle::ParticipantAction;
use roomgate_services::store::ParticipantFilter;
use serde::{Deserialize, Serialize};

use super::{hex, parse_id, rfc3339};
use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<ParticipantStatus>,
    pub role: Option<ParticipantRole>,
}

#[derive(Debug, Deserialize)]
pub struct AddParticipantRequest {
    pub user_id: String,
    pub requested_role: Option<ParticipantRole>,
    /// Store an invitation the user accepts by joining.
    #[serde(default)]
    pub invite: bool,
}

#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub action: ParticipantAction,
}

#[derive(Debug, Serialize)]
pub struct ParticipantResponse {
    pub id: String,
    pub room_id: String,
    pub user_id: String,
    pub role: ParticipantRole,
    pub status: ParticipantStatus,
    pub joined_at: Option<String>,
    pub left_at: Option<String>,
    pub created_at: String,
}

pub async fn list(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(room_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rid = parse_id(&room_id, "room_id")?;
    let filter = ParticipantFilter {
        status: query.status,
        role: query.role,
    };
    let listing = state.admission.list_participants(rid, filter).await?;

    let items: Vec<ParticipantResponse> =
        listing.participants.into_iter().map(to_response).collect();
    Ok(Json(serde_json::json!({
        "total": items.len(),
        "items": items,
        "counts": listing.counts,
    })))
}

pub async fn add(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
    Json(body): Json<AddParticipantRequest>,
) -> Result<(StatusCode, Json<ParticipantResponse>), ApiError> {
    let rid = parse_id(&room_id, "room_id")?;
    let uid = parse_id(&body.user_id, "user_id")?;

    let participant = state
        .admission
        .add_participant(rid, auth.user_id, uid, body.requested_role, body.invite)
        .await?;

    Ok((StatusCode::CREATED, Json(to_response(participant))))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((room_id, participant_id)): Path<(String, String)>,
    Json(body): Json<ActionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rid = parse_id(&room_id, "room_id")?;
    let pid = parse_id(&participant_id, "participant_id")?;

    let outcome = state
        .admission
        .moderate(rid, auth.user_id, pid, body.action)
        .await?;

    Ok(Json(serde_json::json!({
        "action": body.action.as_str(),
        "message": outcome.message,
        "participant": to_response(outcome.participant),
        "occupancy": outcome.occupancy,
    })))
}

pub async fn remove(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((room_id, participant_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rid = parse_id(&room_id, "room_id")?;
    let pid = parse_id(&participant_id, "participant_id")?;

    let occupancy = state
        .admission
        .remove_participant(rid, auth.user_id, pid)
        .await?;

    Ok(Json(serde_json::json!({
        "removed": true,
        "occupancy": occupancy,
    })))
}

pub(crate) fn to_response(p: Participant) -> ParticipantResponse {
    ParticipantResponse {
        id: hex(p.id),
        room_id: p.room_id.to_hex(),
        user_id: p.user_id.to_hex(),
        role: p.role,
        status: p.status,
        joined_at: p.joined_at.map(rfc3339),
        left_at: p.left_at.map(rfc3339),
        created_at: rfc3339(p.created_at),
    }
}
