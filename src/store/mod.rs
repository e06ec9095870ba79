// Document persistence for posts and users.
// Handlers only see the `DocumentStore` trait; the MongoDB implementation is
// chosen once by the startup sequence.

#[cfg(test)]
pub mod memory;
mod mongo;

pub use mongo::MongoConnector;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{future::Future, sync::Arc};
use thiserror::Error;

pub type SharedStore = Arc<dyn DocumentStore>;

/// Status every new account starts with.
pub const DEFAULT_USER_STATUS: &str = "I am new!";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("database unreachable: {0}")]
    Unreachable(String),

    #[error("stored document is malformed: {0}")]
    Malformed(String),
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub content: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub image_url: String,
}

/// Full replacement of the editable fields of a post.
pub type PostUpdate = NewPost;

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

/// Storage operations needed by the feed and auth routes.
///
/// Ids are opaque strings. An id that cannot name a document is treated as
/// "not found" rather than as an error.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All posts, newest first.
    async fn list_posts(&self) -> Result<Vec<Post>, StoreError>;

    async fn insert_post(&self, post: NewPost) -> Result<Post, StoreError>;

    async fn find_post(&self, id: &str) -> Result<Option<Post>, StoreError>;

    /// Returns the updated post, or `None` when no post has this id.
    async fn update_post(&self, id: &str, update: PostUpdate)
    -> Result<Option<Post>, StoreError>;

    /// Returns the removed post, or `None` when no post has this id.
    async fn delete_post(&self, id: &str) -> Result<Option<Post>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;
}

/// Opens a verified connection to a document store.
pub trait Connect {
    fn connect(&self) -> impl Future<Output = Result<SharedStore, StoreError>> + Send;
}
