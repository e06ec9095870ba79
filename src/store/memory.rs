use super::{
    Connect, DEFAULT_USER_STATUS, DocumentStore, NewPost, NewUser, Post, PostUpdate,
    SharedStore, StoreError, User,
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-process store used by handler tests.
#[derive(Default)]
pub struct MemoryStore {
    posts: RwLock<Vec<Post>>,
    users: RwLock<Vec<User>>,
}

impl MemoryStore {
    pub fn shared() -> SharedStore {
        Arc::new(Self::default())
    }
}

/// Connector that always hands out a fresh `MemoryStore`.
pub struct MemoryConnector;

impl Connect for MemoryConnector {
    async fn connect(&self) -> Result<SharedStore, StoreError> {
        Ok(MemoryStore::shared())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_posts(&self) -> Result<Vec<Post>, StoreError> {
        let mut posts = self.posts.read().await.clone();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    async fn insert_post(&self, post: NewPost) -> Result<Post, StoreError> {
        let now = Utc::now();
        let post = Post {
            id: Uuid::new_v4().simple().to_string(),
            title: post.title,
            content: post.content,
            image_url: post.image_url,
            created_at: now,
            updated_at: now,
        };
        self.posts.write().await.push(post.clone());
        Ok(post)
    }

    async fn find_post(&self, id: &str) -> Result<Option<Post>, StoreError> {
        Ok(self.posts.read().await.iter().find(|p| p.id == id).cloned())
    }

    async fn update_post(
        &self,
        id: &str,
        update: PostUpdate,
    ) -> Result<Option<Post>, StoreError> {
        let mut posts = self.posts.write().await;
        let Some(post) = posts.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        post.title = update.title;
        post.content = update.content;
        post.image_url = update.image_url;
        post.updated_at = Utc::now();
        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, id: &str) -> Result<Option<Post>, StoreError> {
        let mut posts = self.posts.write().await;
        let index = posts.iter().position(|p| p.id == id);
        Ok(index.map(|i| posts.remove(i)))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let user = User {
            id: Uuid::new_v4().simple().to_string(),
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            status: DEFAULT_USER_STATUS.to_string(),
            created_at: Utc::now(),
        };
        self.users.write().await.push(user.clone());
        Ok(user)
    }
}
