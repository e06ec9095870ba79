// Auth routes, mounted under /auth
// Account creation and credential checks only; no session or token is issued.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{post, put},
};
use serde_json::json;
use tracing::info;

use super::{
    error::ApiError,
    extract_request_data::Payload,
    models::{FieldErrors, LoginInput, SignupInput, UserIdResponse},
};
use crate::{context::AppContext, store::NewUser};

#[cfg(not(test))]
const BCRYPT_COST: u32 = 12;
#[cfg(test)]
const BCRYPT_COST: u32 = 4;
const MIN_PASSWORD_LEN: usize = 5;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/signup", put(signup))
        .route("/login", post(login))
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, BCRYPT_COST))
        .await
        .map_err(|e| ApiError::Internal(format!("Password hashing task failed: {}", e)))?
        .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))
}

async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| ApiError::Internal(format!("Password verification task failed: {}", e)))?
        .map_err(|e| ApiError::Internal(format!("Password verification failed: {}", e)))
}

// --- PUT /auth/signup ---
async fn signup(
    State(ctx): State<AppContext>,
    Payload(input): Payload<SignupInput>,
) -> Result<(StatusCode, Json<UserIdResponse>), ApiError> {
    let email = normalize_email(&input.email);
    let name = input.name.trim().to_string();
    let password = input.password.trim().to_string();

    let mut errors = FieldErrors::default();
    errors.check(looks_like_email(&email), "email", "Please enter a valid email.");
    errors.check(!name.is_empty(), "name", "Name must not be empty.");
    errors.check(
        password.chars().count() >= MIN_PASSWORD_LEN,
        "password",
        "Password must be at least 5 characters.",
    );
    if let Some(data) = errors.into_data() {
        return Err(ApiError::validation("Validation failed.", data));
    }

    if ctx.store.find_user_by_email(&email).await?.is_some() {
        return Err(ApiError::validation(
            "E-Mail address already exists!",
            json!([{ "param": "email", "msg": "E-Mail address already exists!" }]),
        ));
    }

    let password_hash = hash_password(password).await?;
    let user = ctx
        .store
        .insert_user(NewUser {
            email,
            name,
            password_hash,
        })
        .await?;

    info!(user_id = %user.id, "User created");

    Ok((
        StatusCode::CREATED,
        Json(UserIdResponse {
            message: "User created!".to_string(),
            user_id: user.id,
        }),
    ))
}

// --- POST /auth/login ---
async fn login(
    State(ctx): State<AppContext>,
    Payload(input): Payload<LoginInput>,
) -> Result<Json<UserIdResponse>, ApiError> {
    let email = normalize_email(&input.email);

    let user = ctx
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| {
            ApiError::Unauthorized("A user with this email could not be found.".to_string())
        })?;

    if !verify_password(input.password.trim().to_string(), user.password_hash).await? {
        return Err(ApiError::Unauthorized("Wrong password!".to_string()));
    }

    info!(user_id = %user.id, "User logged in");

    Ok(Json(UserIdResponse {
        message: "Logged in.".to_string(),
        user_id: user.id,
    }))
}
