use async_trait::async_trait;
use bson::{doc, oid::ObjectId};
use mongodb::Database;
use roomgate_db::models::{HostAccount, User};

use super::base::{BaseDao, DaoResult};
use crate::store::DirectoryStore;

/// Users and host accounts, owned by the account platform.
pub struct DirectoryDao {
    pub users: BaseDao<User>,
    pub hosts: BaseDao<HostAccount>,
}

impl DirectoryDao {
    pub fn new(db: &Database) -> Self {
        Self {
            users: BaseDao::new(db, User::COLLECTION),
            hosts: BaseDao::new(db, HostAccount::COLLECTION),
        }
    }
}

#[async_trait]
impl DirectoryStore for DirectoryDao {
    async fn find_user(&self, user_id: ObjectId) -> DaoResult<User> {
        self.users.find_by_id(user_id).await
    }

    async fn has_active_host_account(&self, user_id: ObjectId) -> DaoResult<bool> {
        let count = self
            .hosts
            .count(doc! { "user_id": user_id, "is_active": true })
            .await?;
        Ok(count > 0)
    }

    async fn insert_user(&self, user: User) -> DaoResult<User> {
        let id = self.users.insert_one(&user).await?;
        self.users.find_by_id(id).await
    }

    async fn insert_host_account(&self, account: HostAccount) -> DaoResult<HostAccount> {
        let id = self.hosts.insert_one(&account).await?;
        self.hosts.find_by_id(id).await
    }
}
