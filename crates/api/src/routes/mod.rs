pub mod admission;
pub mod attendance;
pub mod participant;
pub mod room;

use bson::{DateTime, oid::ObjectId};
use roomgate_services::dao::{PaginatedResult, PaginationParams};
use serde::Serialize;

use crate::error::ApiError;

pub(crate) fn parse_id(raw: &str, what: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid {what}")))
}

pub(crate) fn hex(id: Option<ObjectId>) -> String {
    id.map(|id| id.to_hex()).unwrap_or_default()
}

pub(crate) fn rfc3339(at: DateTime) -> String {
    at.to_chrono().to_rfc3339()
}

pub(crate) fn page_params(page: Option<u64>, per_page: Option<u64>) -> PaginationParams {
    let defaults = PaginationParams::default();
    PaginationParams {
        page: page.unwrap_or(defaults.page),
        per_page: per_page.unwrap_or(defaults.per_page),
    }
}

pub(crate) fn paginated<T: Serialize>(result: PaginatedResult<T>) -> serde_json::Value {
    serde_json::json!({
        "items": result.items,
        "total": result.total,
        "page": result.page,
        "per_page": result.per_page,
        "total_pages": result.total_pages,
    })
}
