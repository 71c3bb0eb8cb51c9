use thiserror::Error;

use crate::capacity::{CounterError, Occupancy};
use crate::dao::DaoError;
use crate::grant::GrantError;
use crate::lifecycle::TransitionError;

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("Room is full ({} of {} places taken)", .0.count, .0.max)]
    RoomFull(Occupancy),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Signing(GrantError),
    #[error("{0}")]
    Unavailable(String),
    #[error(transparent)]
    Dao(DaoError),
}

pub type AdmissionResult<T> = Result<T, AdmissionError>;

impl From<DaoError> for AdmissionError {
    fn from(e: DaoError) -> Self {
        match e {
            DaoError::NotFound => AdmissionError::NotFound("Entity"),
            DaoError::DuplicateKey(msg) => AdmissionError::Conflict(msg),
            DaoError::Validation(msg) => AdmissionError::Validation(msg),
            DaoError::Mongo(e) => AdmissionError::Unavailable(format!("State store: {e}")),
            other => AdmissionError::Dao(other),
        }
    }
}

impl From<CounterError> for AdmissionError {
    fn from(e: CounterError) -> Self {
        AdmissionError::Unavailable(e.to_string())
    }
}

impl From<GrantError> for AdmissionError {
    fn from(e: GrantError) -> Self {
        match e {
            GrantError::InvalidSchedule(msg) => AdmissionError::Validation(msg),
            other => AdmissionError::Signing(other),
        }
    }
}

/// Renames a bare `NotFound` after the entity that was looked up.
pub(crate) trait NotFoundAs<T> {
    fn or_not_found(self, what: &'static str) -> AdmissionResult<T>;
}

impl<T> NotFoundAs<T> for Result<T, DaoError> {
    fn or_not_found(self, what: &'static str) -> AdmissionResult<T> {
        self.map_err(|e| match e {
            DaoError::NotFound => AdmissionError::NotFound(what),
            other => other.into(),
        })
    }
}
