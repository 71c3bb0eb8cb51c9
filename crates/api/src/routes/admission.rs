use axum::{
    Json,
    extract::{Path, State},
};
use roomgate_db::models::ParticipantRole;
use roomgate_services::admission::{JoinOutcome, JoinRequest};
use serde::Deserialize;
use tracing::debug;

use super::{attendance, parse_id, participant, room};
use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Default, Deserialize)]
pub struct JoinBody {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub requested_role: Option<ParticipantRole>,
}

pub async fn join(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
    Json(body): Json<JoinBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rid = parse_id(&room_id, "room_id")?;

    let outcome = state
        .admission
        .join(JoinRequest {
            room_id: rid,
            user_id: auth.user_id,
            display_name: body.display_name.or(Some(auth.name)),
            email: body.email.or(Some(auth.email)),
            requested_role: body.requested_role,
        })
        .await?;

    debug!(room_id = %rid, user_id = %auth.user_id, admitted = outcome.admitted, "Join handled");
    Ok(Json(join_response(outcome)))
}

pub async fn leave(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rid = parse_id(&room_id, "room_id")?;
    let outcome = state.admission.leave(rid, auth.user_id).await?;

    Ok(Json(serde_json::json!({
        "participant": outcome.participant.map(participant::to_response),
        "session": outcome.session.map(attendance::to_response),
        "occupancy": outcome.occupancy,
        "released": outcome.released,
    })))
}

/// `role` and `status` are the stored participant's; `resolved_role` is what this request resolved to.
fn join_response(outcome: JoinOutcome) -> serde_json::Value {
    let (role, status) = (outcome.participant.role, outcome.participant.status);
    serde_json::json!({
        "admitted": outcome.admitted,
        "room": room::to_response(outcome.room),
        "participant": participant::to_response(outcome.participant),
        "role": role,
        "status": status,
        "resolved_role": outcome.resolution.role,
        "is_moderator": outcome.resolution.is_moderator,
        "reason": outcome.resolution.reason,
        "occupancy": outcome.occupancy,
        "grant": outcome.grant,
        "waiting_reason": outcome.waiting_reason,
        "is_new_participant": outcome.is_new_participant,
        "room_went_live": outcome.room_went_live,
        "participants_auto_joined": outcome.participants_auto_joined,
        "duration": outcome.duration,
    })
}
