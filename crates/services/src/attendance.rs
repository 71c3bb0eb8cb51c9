//! Session durations and aggregate statistics over attendance records.

use std::collections::{BTreeMap, HashSet};

use bson::DateTime;
use roomgate_db::models::Attendance;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionDuration {
    pub milliseconds: i64,
    pub minutes: i64,
    pub formatted: String,
}

impl SessionDuration {
    pub fn between(join: DateTime, leave: DateTime) -> Self {
        let milliseconds = (leave.timestamp_millis() - join.timestamp_millis()).max(0);
        let minutes = milliseconds / 60_000;
        let (h, m) = (minutes / 60, minutes % 60);
        let formatted = if h > 0 {
            format!("{h}h {m}m")
        } else {
            format!("{m}m")
        };
        Self {
            milliseconds,
            minutes,
            formatted,
        }
    }

    /// `None` while the session is still open.
    pub fn of(record: &Attendance) -> Option<Self> {
        record
            .leave_time
            .map(|leave| Self::between(record.join_time, leave))
    }
}

/// An attendance record with its computed duration.
#[derive(Debug, Clone)]
pub struct AttendanceEntry {
    pub record: Attendance,
    pub duration: Option<SessionDuration>,
}

impl From<Attendance> for AttendanceEntry {
    fn from(record: Attendance) -> Self {
        let duration = SessionDuration::of(&record);
        Self { record, duration }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttendanceStats {
    pub total_sessions: u64,
    pub active_sessions: u64,
    pub unique_users: u64,
    pub unique_rooms: u64,
    pub total_duration_minutes: i64,
    /// Mean over closed sessions only.
    pub average_duration_minutes: Option<f64>,
    pub role_distribution: BTreeMap<String, u64>,
}

impl AttendanceStats {
    pub fn from_records(records: &[Attendance]) -> Self {
        let mut stats = AttendanceStats::default();
        let mut users = HashSet::new();
        let mut rooms = HashSet::new();
        let mut closed_ms: Vec<i64> = Vec::new();

        for record in records {
            stats.total_sessions += 1;
            users.insert(record.user_id);
            rooms.insert(record.room_id);
            *stats
                .role_distribution
                .entry(record.role.as_str().to_string())
                .or_default() += 1;
            match SessionDuration::of(record) {
                Some(d) => closed_ms.push(d.milliseconds),
                None => stats.active_sessions += 1,
            }
        }

        let total_ms: i64 = closed_ms.iter().sum();
        stats.unique_users = users.len() as u64;
        stats.unique_rooms = rooms.len() as u64;
        stats.total_duration_minutes = total_ms / 60_000;
        stats.average_duration_minutes = (!closed_ms.is_empty())
            .then(|| total_ms as f64 / closed_ms.len() as f64 / 60_000.0);
        stats
    }
}
