use super::{
    Connect, DEFAULT_USER_STATUS, DocumentStore, NewPost, NewUser, Post, PostUpdate,
    SharedStore, StoreError, User,
};
use async_trait::async_trait;
use chrono::Utc;
use futures_util::TryStreamExt;
use mongodb::{
    Client, Collection,
    bson::{DateTime, doc, oid::ObjectId},
    options::{ClientOptions, ReturnDocument},
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

const APP_NAME: &str = "feed-server";
const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Connects to MongoDB from a connection string.
#[derive(Debug, Clone)]
pub struct MongoConnector {
    uri: String,
    fallback_database: String,
}

impl MongoConnector {
    pub fn new(uri: impl Into<String>, fallback_database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            fallback_database: fallback_database.into(),
        }
    }
}

impl Connect for MongoConnector {
    async fn connect(&self) -> Result<SharedStore, StoreError> {
        let mut options = ClientOptions::parse(&self.uri).await?;
        options.app_name = Some(APP_NAME.to_string());
        // The driver connects lazily; bound server selection so the ping below
        // fails in seconds instead of hanging on an unreachable host.
        options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);

        let client = Client::with_options(options)?;
        let database = client
            .default_database()
            .unwrap_or_else(|| client.database(&self.fallback_database));

        debug!("Pinging database '{}'...", database.name());
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;
        info!("Connected to database '{}'", database.name());

        Ok(Arc::new(MongoStore {
            posts: database.collection("posts"),
            users: database.collection("users"),
        }))
    }
}

pub struct MongoStore {
    posts: Collection<PostDocument>,
    users: Collection<UserDocument>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct PostDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    title: String,
    content: String,
    image_url: String,
    created_at: DateTime,
    updated_at: DateTime,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct UserDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    email: String,
    name: String,
    password: String,
    status: String,
    created_at: DateTime,
}

fn to_chrono(value: DateTime) -> Result<chrono::DateTime<Utc>, StoreError> {
    chrono::DateTime::from_timestamp_millis(value.timestamp_millis())
        .ok_or_else(|| StoreError::Malformed(format!("timestamp out of range: {}", value)))
}

impl TryFrom<PostDocument> for Post {
    type Error = StoreError;

    fn try_from(doc: PostDocument) -> Result<Self, Self::Error> {
        Ok(Post {
            id: doc.id.to_hex(),
            title: doc.title,
            content: doc.content,
            image_url: doc.image_url,
            created_at: to_chrono(doc.created_at)?,
            updated_at: to_chrono(doc.updated_at)?,
        })
    }
}

impl TryFrom<UserDocument> for User {
    type Error = StoreError;

    fn try_from(doc: UserDocument) -> Result<Self, Self::Error> {
        Ok(User {
            id: doc.id.to_hex(),
            email: doc.email,
            name: doc.name,
            password_hash: doc.password,
            status: doc.status,
            created_at: to_chrono(doc.created_at)?,
        })
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn list_posts(&self) -> Result<Vec<Post>, StoreError> {
        let documents: Vec<PostDocument> = self
            .posts
            .find(doc! {})
            .sort(doc! { "createdAt": -1 })
            .await?
            .try_collect()
            .await?;

        documents.into_iter().map(Post::try_from).collect()
    }

    async fn insert_post(&self, post: NewPost) -> Result<Post, StoreError> {
        let now = DateTime::now();
        let document = PostDocument {
            id: ObjectId::new(),
            title: post.title,
            content: post.content,
            image_url: post.image_url,
            created_at: now,
            updated_at: now,
        };
        self.posts.insert_one(&document).await?;
        Post::try_from(document)
    }

    async fn find_post(&self, id: &str) -> Result<Option<Post>, StoreError> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(None);
        };
        self.posts
            .find_one(doc! { "_id": oid })
            .await?
            .map(Post::try_from)
            .transpose()
    }

    async fn update_post(
        &self,
        id: &str,
        update: PostUpdate,
    ) -> Result<Option<Post>, StoreError> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(None);
        };
        let changes = doc! {
            "$set": {
                "title": update.title,
                "content": update.content,
                "imageUrl": update.image_url,
                "updatedAt": DateTime::now(),
            }
        };
        self.posts
            .find_one_and_update(doc! { "_id": oid }, changes)
            .return_document(ReturnDocument::After)
            .await?
            .map(Post::try_from)
            .transpose()
    }

    async fn delete_post(&self, id: &str) -> Result<Option<Post>, StoreError> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(None);
        };
        self.posts
            .find_one_and_delete(doc! { "_id": oid })
            .await?
            .map(Post::try_from)
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.users
            .find_one(doc! { "email": email })
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let document = UserDocument {
            id: ObjectId::new(),
            email: user.email,
            name: user.name,
            password: user.password_hash,
            status: DEFAULT_USER_STATUS.to_string(),
            created_at: DateTime::now(),
        };
        self.users.insert_one(&document).await?;
        User::try_from(document)
    }
}
