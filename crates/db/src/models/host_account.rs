use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Business/host account attached to a user. Only `is_active` matters for admission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostAccount {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub host_code: String,
    pub business_name: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl HostAccount {
    pub const COLLECTION: &'static str = "hosts";
}
