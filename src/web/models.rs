// API-specific data models for the web server

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::store::Post;

/// Body of POST /feed/post and PUT /feed/post/{postId}
#[derive(Deserialize, Debug, Clone)]
pub struct PostInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Existing image URL kept when an update carries no new file.
    #[serde(default)]
    pub image: Option<String>,
}

/// Body of PUT /auth/signup
#[derive(Deserialize, Debug, Clone)]
pub struct SignupInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
}

/// Body of POST /auth/login
#[derive(Deserialize, Debug, Clone)]
pub struct LoginInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PostsResponse {
    pub message: String,
    pub posts: Vec<Post>,
    pub total_items: usize,
}

#[derive(Serialize, Debug)]
pub struct PostResponse {
    pub message: String,
    pub post: Post,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserIdResponse {
    pub message: String,
    pub user_id: String,
}

/// One failed input check, reported in the `data` array of a 422 response.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FieldError {
    pub param: &'static str,
    pub msg: &'static str,
}

/// Collects field errors; `into_data` yields `None` when everything passed.
#[derive(Default, Debug)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn check(&mut self, ok: bool, param: &'static str, msg: &'static str) {
        if !ok {
            self.0.push(FieldError { param, msg });
        }
    }

    pub fn into_data(self) -> Option<Value> {
        if self.0.is_empty() {
            None
        } else {
            Some(json!(self.0))
        }
    }
}
