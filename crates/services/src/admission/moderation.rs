//! Moderator-driven changes: participant actions, explicit room status
//! changes, and adding or removing participants.

use bson::{oid::ObjectId, DateTime};
use roomgate_db::models::{
    GlobalRole, Participant, ParticipantRole, ParticipantStatus, Room, RoomStatus,
};
use tracing::info;

use super::error::NotFoundAs;
use super::rooms::forbid;
use super::{AdmissionError, AdmissionResult, AdmissionService};
use crate::capacity::Occupancy;
use crate::dao::DaoError;
use crate::lifecycle::participant::{self, ensure_removable};
use crate::lifecycle::{ActivationAttempt, JoinGate, ParticipantAction, RoomEvent, TransitionError};
use crate::resolver::{Requester, Resolution, resolve};

#[derive(Debug, Clone)]
pub struct ModerationOutcome {
    /// Post-state as stored. Concurrent actions on one participant are
    /// last-writer-wins, so this may differ from what was requested.
    pub participant: Participant,
    pub message: &'static str,
    pub occupancy: Option<Occupancy>,
}

#[derive(Debug, Clone)]
pub struct StatusChange {
    pub room: Room,
    pub participants_auto_joined: Option<u64>,
    pub sessions_closed: Option<u64>,
}

impl AdmissionService {
    /// The actor must resolve as a moderator of `room`.
    pub(super) async fn require_moderator(
        &self,
        room: &Room,
        actor: ObjectId,
    ) -> AdmissionResult<Resolution> {
        let (_, requester) = self.load_requester(actor).await.map_err(forbid)?;
        let resolution = resolve(room, &requester, None);
        if !resolution.is_moderator {
            info!(room_id = ?room.id, %actor, "Rejected non-moderator action");
            return Err(AdmissionError::Forbidden(
                "Only room moderators can do this".to_string(),
            ));
        }
        Ok(resolution)
    }

    async fn participant_in(
        &self,
        room_id: ObjectId,
        participant_id: ObjectId,
    ) -> AdmissionResult<Participant> {
        let participant = self
            .stores
            .participants
            .find_participant(participant_id)
            .await
            .or_not_found("Participant")?;
        if participant.room_id != room_id {
            return Err(AdmissionError::NotFound("Participant"));
        }
        Ok(participant)
    }

    /// Standing of a participant's identity, without the verification gate.
    async fn standing(&self, user_id: ObjectId) -> AdmissionResult<Requester> {
        let is_admin = match self.stores.directory.find_user(user_id).await {
            Ok(user) => user.global_role == GlobalRole::Admin,
            Err(DaoError::NotFound) => false,
            Err(e) => return Err(e.into()),
        };
        Ok(Requester {
            user_id,
            is_admin,
            has_active_host_account: self
                .stores
                .directory
                .has_active_host_account(user_id)
                .await?,
        })
    }

    pub async fn moderate(
        &self,
        room_id: ObjectId,
        actor: ObjectId,
        participant_id: ObjectId,
        action: ParticipantAction,
    ) -> AdmissionResult<ModerationOutcome> {
        let room = self.find_room(room_id).await?;
        self.require_moderator(&room, actor).await?;
        let target = self.participant_in(room_id, participant_id).await?;

        if action == ParticipantAction::Join && room.status.is_closed() {
            return Err(TransitionError::Room {
                event: "join",
                from: room.status,
            }
            .into());
        }

        let standing = resolve(&room, &self.standing(target.user_id).await?, None);
        let gate = JoinGate {
            can_join_directly: standing.can_join_directly,
            room_live: room.status == RoomStatus::Live,
            is_moderator: standing.is_moderator,
        };
        let now = DateTime::now();
        let transition = participant::apply(&target, action, gate, now)?;
        let participant = self
            .stores
            .participants
            .save_participant(&transition.participant)
            .await?;

        let occupancy = match action {
            ParticipantAction::Leave | ParticipantAction::Block => {
                self.end_session(room_id, target.user_id, now).await?.occupancy
            }
            _ => None,
        };

        info!(
            %room_id,
            %participant_id,
            %actor,
            action = action.as_str(),
            status = participant.status.as_str(),
            role = participant.role.as_str(),
            "Participant moderated"
        );
        Ok(ModerationOutcome {
            participant,
            message: transition.message,
            occupancy,
        })
    }

    /// Pre-registers a participant. The user may add themselves; anyone else needs a moderator.
    ///
    /// An invitation is stored as `invited` and moves to the waiting room on the
    /// user's first join. Otherwise the status is `joined` when the resolver allows
    /// direct entry, else `waiting`. No occupancy is taken here; the slot is
    /// claimed when the user actually joins.
    pub async fn add_participant(
        &self,
        room_id: ObjectId,
        actor: ObjectId,
        user_id: ObjectId,
        requested_role: Option<ParticipantRole>,
        invite: bool,
    ) -> AdmissionResult<Participant> {
        let room = self.find_room(room_id).await?;
        if room.status.is_closed() {
            return Err(TransitionError::Room {
                event: "join",
                from: room.status,
            }
            .into());
        }
        if actor != user_id {
            self.require_moderator(&room, actor).await?;
        } else if invite {
            return Err(AdmissionError::Validation(
                "You cannot invite yourself".to_string(),
            ));
        }

        let (_, requester) = self.load_requester(user_id).await?;
        let resolution = resolve(&room, &requester, requested_role);
        let now = DateTime::now();
        let status = if invite {
            ParticipantStatus::Invited
        } else if resolution.can_join_directly {
            ParticipantStatus::Joined
        } else {
            ParticipantStatus::Waiting
        };

        let participant = self
            .stores
            .participants
            .insert_participant(Participant {
                id: None,
                room_id,
                user_id,
                role: resolution.role,
                status,
                joined_at: (status == ParticipantStatus::Joined).then_some(now),
                left_at: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .map_err(|e| match e {
                DaoError::DuplicateKey(_) => AdmissionError::Conflict(
                    "Participant already exists in this room".to_string(),
                ),
                other => other.into(),
            })?;

        info!(
            %room_id,
            %user_id,
            role = participant.role.as_str(),
            status = participant.status.as_str(),
            "Participant added"
        );
        Ok(participant)
    }

    /// Hosts can never be removed.
    pub async fn remove_participant(
        &self,
        room_id: ObjectId,
        actor: ObjectId,
        participant_id: ObjectId,
    ) -> AdmissionResult<Option<Occupancy>> {
        let room = self.find_room(room_id).await?;
        self.require_moderator(&room, actor).await?;
        let target = self.participant_in(room_id, participant_id).await?;
        ensure_removable(&target)?;

        if !self.stores.participants.remove_participant(participant_id).await? {
            return Err(AdmissionError::NotFound("Participant"));
        }
        let end = self
            .end_session(room_id, target.user_id, DateTime::now())
            .await?;
        info!(%room_id, %participant_id, %actor, "Participant removed");
        Ok(end.occupancy)
    }

    /// Explicit `scheduled -> live` with bulk promotion of waiting participants.
    pub async fn go_live(&self, room_id: ObjectId, actor: ObjectId) -> AdmissionResult<StatusChange> {
        let room = self.find_room(room_id).await?;
        self.require_moderator(&room, actor).await?;
        RoomEvent::Activate.check(room.status)?;

        match self.lifecycle.try_activate(room_id, DateTime::now()).await? {
            ActivationAttempt::Activated(report) => Ok(StatusChange {
                room: report.room,
                participants_auto_joined: Some(report.participants_auto_joined),
                sessions_closed: None,
            }),
            ActivationAttempt::NotScheduled(current) => Err(TransitionError::Room {
                event: RoomEvent::Activate.as_str(),
                from: current.status,
            }
            .into()),
        }
    }

    /// Moves the room to `status`. Completing or cancelling tears down occupancy
    /// and closes every open attendance session.
    pub async fn set_status(
        &self,
        room_id: ObjectId,
        actor: ObjectId,
        status: RoomStatus,
    ) -> AdmissionResult<StatusChange> {
        let event = RoomEvent::for_target(status).ok_or_else(|| {
            AdmissionError::Validation(format!("Cannot move a room back to {}", status.as_str()))
        })?;
        if event == RoomEvent::Activate {
            return self.go_live(room_id, actor).await;
        }

        let room = self.find_room(room_id).await?;
        self.require_moderator(&room, actor).await?;
        event.check(room.status)?;

        let now = DateTime::now();
        let teardown = match event {
            RoomEvent::Cancel => self.lifecycle.cancel(room_id, now).await?,
            _ => self.lifecycle.complete(room_id, now).await?,
        };
        match teardown {
            Some(report) => Ok(StatusChange {
                room: report.room,
                participants_auto_joined: None,
                sessions_closed: Some(report.sessions_closed),
            }),
            None => {
                let current = self.find_room(room_id).await?;
                Err(TransitionError::Room {
                    event: event.as_str(),
                    from: current.status,
                }
                .into())
            }
        }
    }
}
