// Feed routes, mounted under /feed

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{
    error::ApiError,
    extract_request_data::{PathParam, Payload, UploadedImage},
    models::{FieldErrors, PostInput, PostResponse, PostsResponse},
    upload::StoredImage,
};
use crate::{context::AppContext, realtime::ChannelEvent, store::NewPost};

const POSTS_CHANNEL: &str = "posts";
const MIN_TEXT_LEN: usize = 5;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/posts", get(list_posts))
        .route("/post", post(create_post))
        .route(
            "/post/{post_id}",
            get(get_post).put(update_post).delete(delete_post),
        )
}

fn validate(input: &PostInput) -> Result<(String, String), ApiError> {
    let title = input.title.trim();
    let content = input.content.trim();

    let mut errors = FieldErrors::default();
    errors.check(
        title.chars().count() >= MIN_TEXT_LEN,
        "title",
        "Title must be at least 5 characters.",
    );
    errors.check(
        content.chars().count() >= MIN_TEXT_LEN,
        "content",
        "Content must be at least 5 characters.",
    );

    match errors.into_data() {
        Some(data) => Err(ApiError::validation(
            "Validation failed, entered data is incorrect.",
            data,
        )),
        None => Ok((title.to_string(), content.to_string())),
    }
}

fn post_not_found() -> ApiError {
    ApiError::NotFound("Could not find post.".to_string())
}

// An upload the handler ended up not using must not stay on disk
async fn discard(ctx: &AppContext, image: Option<StoredImage>) {
    if let Some(image) = image {
        ctx.uploads.clear(&image.url()).await;
    }
}

fn publish(ctx: &AppContext, data: Value) {
    ctx.realtime.emit(ChannelEvent::new(POSTS_CHANNEL, data));
}

// --- GET /feed/posts ---
async fn list_posts(State(ctx): State<AppContext>) -> Result<Json<PostsResponse>, ApiError> {
    let posts = ctx.store.list_posts().await?;
    debug!("Listing {} posts", posts.len());

    Ok(Json(PostsResponse {
        message: "Fetched posts successfully.".to_string(),
        total_items: posts.len(),
        posts,
    }))
}

// --- POST /feed/post ---
async fn create_post(
    State(ctx): State<AppContext>,
    UploadedImage(image): UploadedImage,
    Payload(input): Payload<PostInput>,
) -> Result<(StatusCode, Json<PostResponse>), ApiError> {
    let (title, content) = match validate(&input) {
        Ok(fields) => fields,
        Err(e) => {
            discard(&ctx, image).await;
            return Err(e);
        }
    };

    let Some(image) = image else {
        return Err(ApiError::validation(
            "No image provided.",
            json!([{ "param": "image", "msg": "An image file (png, jpg or jpeg) is required." }]),
        ));
    };

    let post = match ctx
        .store
        .insert_post(NewPost {
            title,
            content,
            image_url: image.url(),
        })
        .await
    {
        Ok(post) => post,
        Err(e) => {
            discard(&ctx, Some(image)).await;
            return Err(e.into());
        }
    };

    info!(post_id = %post.id, "Post created");
    publish(&ctx, json!({ "action": "create", "post": post }));

    Ok((
        StatusCode::CREATED,
        Json(PostResponse {
            message: "Post created successfully!".to_string(),
            post,
        }),
    ))
}

// --- GET /feed/post/{postId} ---
async fn get_post(
    State(ctx): State<AppContext>,
    PathParam(post_id): PathParam<String>,
) -> Result<Json<PostResponse>, ApiError> {
    let post = ctx.store.find_post(&post_id).await?.ok_or_else(post_not_found)?;

    Ok(Json(PostResponse {
        message: "Post fetched.".to_string(),
        post,
    }))
}

// --- PUT /feed/post/{postId} ---
async fn update_post(
    State(ctx): State<AppContext>,
    PathParam(post_id): PathParam<String>,
    UploadedImage(image): UploadedImage,
    Payload(input): Payload<PostInput>,
) -> Result<Json<PostResponse>, ApiError> {
    let (title, content) = match validate(&input) {
        Ok(fields) => fields,
        Err(e) => {
            discard(&ctx, image).await;
            return Err(e);
        }
    };

    let image_url = match (&image, input.image.as_deref()) {
        (Some(stored), _) => stored.url(),
        (None, Some(existing)) if !existing.is_empty() => existing.to_string(),
        (None, _) => {
            return Err(ApiError::validation(
                "No file picked.",
                json!([{
                    "param": "image",
                    "msg": "Send a new image file or the current image URL."
                }]),
            ));
        }
    };

    let existing = match ctx.store.find_post(&post_id).await {
        Ok(Some(post)) => post,
        Ok(None) => {
            discard(&ctx, image).await;
            return Err(post_not_found());
        }
        Err(e) => {
            discard(&ctx, image).await;
            return Err(e.into());
        }
    };

    let update = NewPost {
        title,
        content,
        image_url: image_url.clone(),
    };
    let post = match ctx.store.update_post(&post_id, update).await {
        Ok(Some(post)) => post,
        Ok(None) => {
            discard(&ctx, image).await;
            return Err(post_not_found());
        }
        Err(e) => {
            discard(&ctx, image).await;
            return Err(e.into());
        }
    };

    if existing.image_url != image_url {
        ctx.uploads.clear(&existing.image_url).await;
    }

    info!(post_id = %post.id, "Post updated");
    publish(&ctx, json!({ "action": "update", "post": post }));

    Ok(Json(PostResponse {
        message: "Post updated!".to_string(),
        post,
    }))
}

// --- DELETE /feed/post/{postId} ---
async fn delete_post(
    State(ctx): State<AppContext>,
    PathParam(post_id): PathParam<String>,
) -> Result<Json<Value>, ApiError> {
    let post = ctx.store.delete_post(&post_id).await?.ok_or_else(post_not_found)?;

    ctx.uploads.clear(&post.image_url).await;

    info!(post_id = %post.id, "Post deleted");
    publish(&ctx, json!({ "action": "delete", "post": post.id }));

    Ok(Json(json!({ "message": "Deleted post." })))
}
