//! Join and leave orchestration over the counter, resolver, both state
//! machines and the grant issuer.
//!
//! A join takes its occupancy slot before anything durable changes. A
//! rejected slot returns immediately; a failure after the slot was taken
//! hands it back before the error is returned.

mod catalog;
mod error;
mod moderation;
mod rooms;

use std::sync::Arc;
use std::time::Duration;

use bson::{oid::ObjectId, DateTime};
use roomgate_config::AdmissionSettings;
use roomgate_db::models::{
    GlobalRole, Participant, ParticipantRole, ParticipantStatus, Room, RoomStatus, User,
};
use serde::Serialize;
use tracing::{info, warn};

pub use catalog::{RoomRemoval, Timeline};
pub use error::{AdmissionError, AdmissionResult};
pub use moderation::{ModerationOutcome, StatusChange};
pub use rooms::{CreateRoom, ParticipantListing};

use self::error::NotFoundAs;
use crate::attendance::AttendanceEntry;
use crate::capacity::{Occupancy, OccupancyCounter, RoomConfig};
use crate::dao::DaoError;
use crate::grant::{Grant, GrantIssuer, GrantRequest, ScheduledDuration, scheduled_duration};
use crate::lifecycle::participant::{self, enqueue};
use crate::lifecycle::{
    ActivationAttempt, JoinGate, ParticipantAction, RoomLifecycle, TransitionError,
};
use crate::resolver::{Requester, Resolution, resolve};
use crate::store::Stores;

#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub room_id: ObjectId,
    pub user_id: ObjectId,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub requested_role: Option<ParticipantRole>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WaitingReason {
    RoomNotStarted,
    WaitingForApproval,
}

impl WaitingReason {
    fn for_room(status: RoomStatus) -> Self {
        if status == RoomStatus::Scheduled {
            WaitingReason::RoomNotStarted
        } else {
            WaitingReason::WaitingForApproval
        }
    }
}

#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub admitted: bool,
    pub room: Room,
    pub participant: Participant,
    pub resolution: Resolution,
    /// `None` when the counter could not be read on a path that does not depend on it.
    pub occupancy: Option<Occupancy>,
    pub grant: Option<Grant>,
    pub waiting_reason: Option<WaitingReason>,
    pub is_new_participant: bool,
    pub room_went_live: bool,
    pub participants_auto_joined: u64,
    pub duration: ScheduledDuration,
}

#[derive(Debug, Clone)]
pub struct LeaveOutcome {
    pub participant: Option<Participant>,
    pub session: Option<AttendanceEntry>,
    pub occupancy: Option<Occupancy>,
    /// Whether this call gave a slot back. A repeated leave releases nothing.
    pub released: bool,
}

/// Result of closing a user's attendance and returning their slot.
struct SessionEnd {
    session: Option<AttendanceEntry>,
    occupancy: Option<Occupancy>,
    released: bool,
}

/// What `enter` produced, and whether it opened the attendance session the slot belongs to.
struct Entered {
    outcome: JoinOutcome,
    session_opened: bool,
}

/// Everything `enter` needs once a slot is held.
struct Entry<'a> {
    room: Room,
    user: User,
    requester: Requester,
    request: &'a JoinRequest,
    resolution: Resolution,
    existing: Option<Participant>,
    activates: bool,
    holds_slot: bool,
    duration: ScheduledDuration,
    now: DateTime,
}

fn room_key(room_id: ObjectId) -> String {
    room_id.to_hex()
}

pub struct AdmissionService {
    stores: Stores,
    counter: Arc<dyn OccupancyCounter>,
    lifecycle: RoomLifecycle,
    grants: GrantIssuer,
    settings: AdmissionSettings,
}

impl AdmissionService {
    pub fn new(
        stores: Stores,
        counter: Arc<dyn OccupancyCounter>,
        grants: GrantIssuer,
        settings: AdmissionSettings,
    ) -> Self {
        let lifecycle = RoomLifecycle::new(stores.clone(), counter.clone());
        Self {
            stores,
            counter,
            lifecycle,
            grants,
            settings,
        }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub async fn join(&self, request: JoinRequest) -> AdmissionResult<JoinOutcome> {
        let (room_id, user_id) = (request.room_id, request.user_id);
        let room = self.find_room(room_id).await?;
        if room.status.is_closed() {
            info!(%room_id, %user_id, status = room.status.as_str(), "Join rejected: room closed");
            return Err(TransitionError::Room {
                event: "join",
                from: room.status,
            }
            .into());
        }

        let (user, requester) = self.load_requester(user_id).await?;
        let existing = self.stores.participants.find_member(room_id, user_id).await?;
        if existing
            .as_ref()
            .is_some_and(|p| p.status == ParticipantStatus::Blocked)
        {
            info!(%room_id, %user_id, "Join rejected: participant blocked");
            return Err(AdmissionError::Unauthorized(
                "You are blocked from this room".to_string(),
            ));
        }

        let resolution = resolve(&room, &requester, request.requested_role);
        let duration = scheduled_duration(&room.start_time, &room.end_time)?;
        let now = DateTime::now();

        // a moderator arriving at a scheduled room always opens it
        let activates = resolution.is_moderator && room.status == RoomStatus::Scheduled;
        let already_joined = existing
            .as_ref()
            .is_some_and(|p| p.status == ParticipantStatus::Joined);
        if !(activates || resolution.can_join_directly || already_joined) {
            return self
                .wait(room_id, user_id, room, existing, resolution, duration, now)
                .await;
        }

        let key = room_key(room_id);
        let holds_slot = self
            .stores
            .attendance
            .active_session(room_id, user_id)
            .await?
            .is_some();
        let occupancy = if holds_slot {
            self.counter.peek(&key).await.ok()
        } else {
            self.ensure_configured(&room, &key).await?;
            let outcome = self.counter.try_admit(&key).await.inspect_err(|e| {
                warn!(%room_id, %user_id, error = %e, "Join rejected: occupancy store unavailable");
            })?;
            if !outcome.admitted {
                info!(
                    %room_id,
                    %user_id,
                    count = outcome.occupancy.count,
                    max = outcome.occupancy.max,
                    "Join rejected: room full"
                );
                return Err(AdmissionError::RoomFull(outcome.occupancy));
            }
            Some(outcome.occupancy)
        };

        let entry = Entry {
            room,
            user,
            requester,
            request: &request,
            resolution,
            existing,
            activates,
            holds_slot,
            duration,
            now,
        };
        match self.enter(entry).await {
            Ok(Entered {
                mut outcome,
                session_opened,
            }) => {
                outcome.occupancy = if holds_slot || session_opened {
                    occupancy
                } else {
                    // a concurrent join by the same user opened the session first
                    info!(%room_id, %user_id, "Duplicate join: returning extra slot");
                    match self.counter.release(&key).await {
                        Ok(occupancy) => Some(occupancy),
                        Err(e) => {
                            warn!(%room_id, %user_id, error = %e, "Failed to return duplicate slot");
                            None
                        }
                    }
                };
                Ok(outcome)
            }
            Err(e) => {
                if !holds_slot {
                    if let Err(release_err) = self.counter.release(&key).await {
                        warn!(%room_id, error = %release_err, "Failed to return slot after aborted join");
                    }
                }
                warn!(%room_id, %user_id, error = %e, "Join aborted after slot was taken");
                Err(e)
            }
        }
    }

    /// Signs the grant, opens the room if this join activates it, then records
    /// the participant and the attendance session.
    async fn enter(&self, entry: Entry<'_>) -> AdmissionResult<Entered> {
        let Entry {
            mut room,
            user,
            requester,
            request,
            mut resolution,
            mut existing,
            activates,
            holds_slot,
            duration,
            now,
        } = entry;
        let (room_id, user_id) = (request.room_id, request.user_id);

        let user_hex = user_id.to_hex();
        let grant = self.grants.issue(&GrantRequest {
            room_name: &room.room_name,
            user_id: &user_hex,
            display_name: request.display_name.as_deref().unwrap_or(&user.name),
            email: request.email.as_deref().or(Some(user.email.as_str())),
            avatar_url: None,
            is_moderator: resolution.is_moderator,
            role: existing.as_ref().map_or(resolution.role, |p| p.role),
            duration_minutes: duration.total_minutes,
        })?;

        let mut room_went_live = false;
        let mut participants_auto_joined = 0;
        if activates {
            match self.lifecycle.try_activate(room_id, now).await? {
                ActivationAttempt::Activated(report) => {
                    room = report.room;
                    room_went_live = true;
                    participants_auto_joined = report.participants_auto_joined;
                }
                ActivationAttempt::NotScheduled(current) => {
                    if current.status.is_closed() {
                        return Err(TransitionError::Room {
                            event: "join",
                            from: current.status,
                        }
                        .into());
                    }
                    room = current;
                }
            }
            resolution = resolve(&room, &requester, request.requested_role);
            existing = self.stores.participants.find_member(room_id, user_id).await?;
        }

        let gate = JoinGate {
            can_join_directly: resolution.can_join_directly,
            room_live: room.status == RoomStatus::Live,
            is_moderator: resolution.is_moderator,
        };
        let (participant, is_new_participant) = match existing {
            Some(p) => (self.admit_existing(p, gate, now).await?, false),
            None => {
                let fresh = Participant {
                    id: None,
                    room_id,
                    user_id,
                    role: resolution.role,
                    status: ParticipantStatus::Joined,
                    joined_at: Some(now),
                    left_at: None,
                    created_at: now,
                    updated_at: now,
                };
                match self.stores.participants.insert_participant(fresh).await {
                    Ok(p) => (p, true),
                    Err(DaoError::DuplicateKey(_)) => {
                        let p = self.member(room_id, user_id).await?;
                        (self.admit_existing(p, gate, now).await?, false)
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        let session_opened = !holds_slot
            && self
                .stores
                .attendance
                .open_session(room_id, user_id, participant.role, now)
                .await?
                .is_opened();

        info!(
            %room_id,
            %user_id,
            role = participant.role.as_str(),
            reason = ?resolution.reason,
            room_went_live,
            "Participant admitted"
        );
        Ok(Entered {
            outcome: JoinOutcome {
                admitted: true,
                room,
                participant,
                resolution,
                occupancy: None,
                grant: Some(grant),
                waiting_reason: None,
                is_new_participant,
                room_went_live,
                participants_auto_joined,
                duration,
            },
            session_opened,
        })
    }

    async fn admit_existing(
        &self,
        participant: Participant,
        gate: JoinGate,
        now: DateTime,
    ) -> AdmissionResult<Participant> {
        let current = match participant.status {
            ParticipantStatus::Joined => return Ok(participant),
            ParticipantStatus::Invited => enqueue(&participant, now)?,
            _ => participant,
        };
        let transition = participant::apply(&current, ParticipantAction::Join, gate, now)?;
        Ok(self
            .stores
            .participants
            .save_participant(&transition.participant)
            .await?)
    }

    /// Records the requester in the waiting room without touching occupancy.
    #[allow(clippy::too_many_arguments)]
    async fn wait(
        &self,
        room_id: ObjectId,
        user_id: ObjectId,
        room: Room,
        existing: Option<Participant>,
        resolution: Resolution,
        duration: ScheduledDuration,
        now: DateTime,
    ) -> AdmissionResult<JoinOutcome> {
        let (participant, is_new_participant) = match existing {
            Some(p) if p.status == ParticipantStatus::Invited => {
                let next = enqueue(&p, now)?;
                (self.stores.participants.save_participant(&next).await?, false)
            }
            Some(p) => (p, false),
            None => {
                let fresh = Participant {
                    id: None,
                    room_id,
                    user_id,
                    role: resolution.role,
                    status: ParticipantStatus::Waiting,
                    joined_at: None,
                    left_at: None,
                    created_at: now,
                    updated_at: now,
                };
                match self.stores.participants.insert_participant(fresh).await {
                    Ok(p) => (p, true),
                    Err(DaoError::DuplicateKey(_)) => (self.member(room_id, user_id).await?, false),
                    Err(e) => return Err(e.into()),
                }
            }
        };

        let reason = WaitingReason::for_room(room.status);
        info!(%room_id, %user_id, ?reason, status = participant.status.as_str(), "Participant waiting");
        let occupancy = self.counter.peek(&room_key(room_id)).await.ok();

        Ok(JoinOutcome {
            admitted: false,
            room,
            participant,
            resolution,
            occupancy,
            grant: None,
            waiting_reason: Some(reason),
            is_new_participant,
            room_went_live: false,
            participants_auto_joined: 0,
            duration,
        })
    }

    /// Idempotent: a second call finds no open session and releases nothing.
    pub async fn leave(&self, room_id: ObjectId, user_id: ObjectId) -> AdmissionResult<LeaveOutcome> {
        self.find_room(room_id).await?;
        let now = DateTime::now();

        let participant = match self.stores.participants.find_member(room_id, user_id).await? {
            Some(p) if p.status == ParticipantStatus::Joined => {
                let transition =
                    participant::apply(&p, ParticipantAction::Leave, JoinGate::default(), now)?;
                Some(
                    self.stores
                        .participants
                        .save_participant(&transition.participant)
                        .await?,
                )
            }
            other => other,
        };

        let end = self.end_session(room_id, user_id, now).await?;
        info!(%room_id, %user_id, released = end.released, "Participant left");
        Ok(LeaveOutcome {
            participant,
            session: end.session,
            occupancy: end.occupancy,
            released: end.released,
        })
    }

    /// Current occupancy. Falls back to the room's own ceiling when the counter
    /// has not been configured yet.
    pub async fn occupancy(&self, room_id: ObjectId) -> AdmissionResult<Occupancy> {
        let room = self.find_room(room_id).await?;
        let occupancy = self.counter.peek(&room_key(room_id)).await?;
        if occupancy.max == 0 && !room.status.is_closed() {
            return Ok(Occupancy::new(occupancy.count, room.max_participants));
        }
        Ok(occupancy)
    }

    async fn end_session(
        &self,
        room_id: ObjectId,
        user_id: ObjectId,
        now: DateTime,
    ) -> AdmissionResult<SessionEnd> {
        let session = self
            .stores
            .attendance
            .close_session(room_id, user_id, now)
            .await?;
        let key = room_key(room_id);

        let (occupancy, released) = if session.is_some() {
            match self.counter.release(&key).await {
                Ok(occupancy) => (Some(occupancy), true),
                Err(e) => {
                    // the counter's expiry reclaims the slot
                    warn!(%room_id, %user_id, error = %e, "Failed to release occupancy");
                    (None, false)
                }
            }
        } else {
            (self.counter.peek(&key).await.ok(), false)
        };

        Ok(SessionEnd {
            session: session.map(AttendanceEntry::from),
            occupancy,
            released,
        })
    }

    async fn find_room(&self, room_id: ObjectId) -> AdmissionResult<Room> {
        self.stores.rooms.find_room(room_id).await.or_not_found("Room")
    }

    async fn member(&self, room_id: ObjectId, user_id: ObjectId) -> AdmissionResult<Participant> {
        self.stores
            .participants
            .find_member(room_id, user_id)
            .await?
            .ok_or(AdmissionError::NotFound("Participant"))
    }

    /// Loads the identity and its standing. Unverified identities stop here.
    async fn load_requester(&self, user_id: ObjectId) -> AdmissionResult<(User, Requester)> {
        let user = match self.stores.directory.find_user(user_id).await {
            Ok(user) => user,
            Err(DaoError::NotFound) => {
                return Err(AdmissionError::Unauthorized("Unknown identity".to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        if !user.is_verified {
            info!(%user_id, "Rejected unverified identity");
            return Err(AdmissionError::Unauthorized(
                "Account is not verified. Verify it before joining rooms.".to_string(),
            ));
        }

        let has_active_host_account = self
            .stores
            .directory
            .has_active_host_account(user_id)
            .await?;
        let requester = Requester {
            user_id,
            is_admin: user.global_role == GlobalRole::Admin,
            has_active_host_account,
        };
        Ok((user, requester))
    }

    fn counter_config(&self, room: &Room) -> RoomConfig {
        RoomConfig {
            max_participants: room.max_participants,
            ttl: Duration::from_secs(self.settings.counter_ttl_secs),
        }
    }

    async fn ensure_configured(&self, room: &Room, key: &str) -> AdmissionResult<()> {
        if self.counter.config(key).await?.is_none() {
            self.counter.configure(key, self.counter_config(room)).await?;
        }
        Ok(())
    }
}
