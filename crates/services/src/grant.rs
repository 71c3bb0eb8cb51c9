//! Signed, time-boxed access grants for the external conferencing engine.
//!
//! The engine only verifies; this module is the sole holder of the shared
//! signing secret. A grant outlives the scheduled meeting by a fixed buffer.

use bitflags::bitflags;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use roomgate_config::ConferencingSettings;
use roomgate_db::models::ParticipantRole;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GrantError {
    #[error("Grant signing credential is not configured")]
    MissingCredential,
    #[error("Grant signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),
    #[error("Grant lifetime out of range: {0}")]
    InvalidLifetime(String),
}

bitflags! {
    /// Engine features a session may use. Derived once per session.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Permissions: u8 {
        const LIVESTREAMING = 1 << 0;
        const RECORDING = 1 << 1;
        const TRANSCRIPTION = 1 << 2;
        const OUTBOUND_CALL = 1 << 3;
        const SCREEN_SHARING = 1 << 4;
        const PARTICIPANTS_PANE = 1 << 5;
        const CHAT = 1 << 6;

        const EVERYONE = Self::PARTICIPANTS_PANE.bits() | Self::CHAT.bits();
        const MODERATOR = Self::EVERYONE.bits()
            | Self::LIVESTREAMING.bits()
            | Self::RECORDING.bits()
            | Self::TRANSCRIPTION.bits()
            | Self::OUTBOUND_CALL.bits()
            | Self::SCREEN_SHARING.bits();
    }
}

impl Permissions {
    pub fn for_session(is_moderator: bool) -> Self {
        if is_moderator {
            Permissions::MODERATOR
        } else {
            Permissions::EVERYONE
        }
    }
}

/// Feature map in the layout the engine reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    pub livestreaming: bool,
    pub recording: bool,
    pub transcription: bool,
    #[serde(rename = "outbound-call")]
    pub outbound_call: bool,
    #[serde(rename = "screen-sharing")]
    pub screen_sharing: bool,
    #[serde(rename = "participants-pane")]
    pub participants_pane: bool,
    pub chat: bool,
}

impl From<Permissions> for Features {
    fn from(p: Permissions) -> Self {
        Self {
            livestreaming: p.contains(Permissions::LIVESTREAMING),
            recording: p.contains(Permissions::RECORDING),
            transcription: p.contains(Permissions::TRANSCRIPTION),
            outbound_call: p.contains(Permissions::OUTBOUND_CALL),
            screen_sharing: p.contains(Permissions::SCREEN_SHARING),
            participants_pane: p.contains(Permissions::PARTICIPANTS_PANE),
            chat: p.contains(Permissions::CHAT),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: String,
    pub moderator: bool,
    pub role: ParticipantRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantContext {
    pub user: GrantUser,
    pub features: Features,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantClaims {
    pub context: GrantContext,
    pub aud: String,
    pub iss: String,
    /// Engine domain.
    pub sub: String,
    pub room: String,
    pub exp: i64,
    pub nbf: i64,
    pub iat: i64,
    pub moderator: bool,
    pub affiliation: String,
}

#[derive(Debug, Clone)]
pub struct GrantRequest<'a> {
    pub room_name: &'a str,
    pub user_id: &'a str,
    pub display_name: &'a str,
    pub email: Option<&'a str>,
    pub avatar_url: Option<&'a str>,
    pub is_moderator: bool,
    pub role: ParticipantRole,
    pub duration_minutes: i64,
}

/// A signed grant plus where to present it.
#[derive(Debug, Clone, Serialize)]
pub struct Grant {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub domain: String,
    pub room_name: String,
    pub meeting_url: String,
    pub features: Features,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduledDuration {
    pub hours: i64,
    pub minutes: i64,
    pub total_minutes: i64,
    pub formatted: FormattedDuration,
}

/// `"{h}h {m}m"`, serialized as a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormattedDuration {
    hours: i64,
    minutes: i64,
}

impl std::fmt::Display for FormattedDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}h {}m", self.hours, self.minutes)
    }
}

impl Serialize for FormattedDuration {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Minutes from `start` to `end` (`HH:MM`), wrapping past midnight when `end` is earlier.
pub fn scheduled_duration(start: &str, end: &str) -> Result<ScheduledDuration, GrantError> {
    let parse = |s: &str| {
        NaiveTime::parse_from_str(s, "%H:%M")
            .map_err(|e| GrantError::InvalidSchedule(format!("{s}: {e}")))
    };
    let (start, end) = (parse(start)?, parse(end)?);

    let mut total_minutes = (end - start).num_minutes();
    if total_minutes < 0 {
        total_minutes += 24 * 60;
    }
    let (hours, minutes) = (total_minutes / 60, total_minutes % 60);
    Ok(ScheduledDuration {
        hours,
        minutes,
        total_minutes,
        formatted: FormattedDuration { hours, minutes },
    })
}

pub struct GrantIssuer {
    settings: ConferencingSettings,
    encoding_key: Option<EncodingKey>,
}

impl GrantIssuer {
    pub fn new(settings: ConferencingSettings) -> Self {
        let encoding_key = (!settings.app_secret.is_empty())
            .then(|| EncodingKey::from_secret(settings.app_secret.as_bytes()));
        Self {
            settings,
            encoding_key,
        }
    }

    pub fn domain(&self) -> &str {
        &self.settings.domain
    }

    pub fn issue(&self, request: &GrantRequest<'_>) -> Result<Grant, GrantError> {
        self.issue_at(request, Utc::now())
    }

    /// `now + duration + buffer`, rejecting values chrono cannot represent.
    fn expiry(&self, now: DateTime<Utc>, duration_minutes: i64) -> Result<DateTime<Utc>, GrantError> {
        let buffer_secs = self.settings.grant_buffer_secs;
        let lifetime = i64::try_from(buffer_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .zip(Duration::try_minutes(duration_minutes.max(0)))
            .and_then(|(buffer, duration)| duration.checked_add(&buffer))
            .ok_or_else(|| GrantError::InvalidLifetime(format!("buffer of {buffer_secs}s")))?;
        now.checked_add_signed(lifetime)
            .ok_or_else(|| GrantError::InvalidLifetime(format!("expiry {now} + {lifetime}")))
    }

    pub fn issue_at(
        &self,
        request: &GrantRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<Grant, GrantError> {
        let key = self.encoding_key.as_ref().ok_or(GrantError::MissingCredential)?;
        let features = Features::from(Permissions::for_session(request.is_moderator));

        let expires_at = self.expiry(now, request.duration_minutes)?;

        let claims = GrantClaims {
            context: GrantContext {
                user: GrantUser {
                    id: request.user_id.to_string(),
                    name: request.display_name.to_string(),
                    email: request.email.unwrap_or_default().to_string(),
                    avatar: request.avatar_url.unwrap_or_default().to_string(),
                    moderator: request.is_moderator,
                    role: request.role,
                },
                features,
            },
            aud: self.settings.app_id.clone(),
            iss: self.settings.app_id.clone(),
            sub: self.settings.domain.clone(),
            room: request.room_name.to_string(),
            exp: expires_at.timestamp(),
            nbf: now.timestamp(),
            iat: now.timestamp(),
            moderator: request.is_moderator,
            affiliation: if request.is_moderator { "owner" } else { "member" }.to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, key)?;
        debug!(room = request.room_name, user_id = request.user_id, "Grant issued");

        Ok(Grant {
            meeting_url: format!(
                "https://{}/{}?jwt={}",
                self.settings.domain, request.room_name, token
            ),
            token,
            expires_at,
            domain: self.settings.domain.clone(),
            room_name: request.room_name.to_string(),
            features,
        })
    }
}
