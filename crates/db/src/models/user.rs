use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Identity as owned by the account platform. Read-only from the admission core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub global_role: GlobalRole,
    #[serde(default)]
    pub is_verified: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GlobalRole {
    Admin,
    #[default]
    User,
}

impl User {
    pub const COLLECTION: &'static str = "users";
}
