use super::{IMAGES_URL_PREFIX, auth, error, feed, pipeline};
use crate::{context::AppContext, realtime};
use axum::{Router, extract::DefaultBodyLimit, middleware, routing::get};
use tower_http::{
    services::ServeDir,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::Level;

pub fn create_app(ctx: AppContext) -> Router<()> {
    let images = ServeDir::new(ctx.uploads.directory());
    let max_body_bytes = ctx.max_body_bytes;

    Router::new()
        // Route collaborators
        .nest("/feed", feed::routes())
        .nest("/auth", auth::routes())
        // Realtime channel shares the HTTP listener
        .route("/socket", get(realtime::socket_handler))
        // Stored images never reach feed/auth handlers
        .nest_service(IMAGES_URL_PREFIX, images)
        .fallback(error::not_found)
        // Only reaches routes added above, nested ones included
        .method_not_allowed_fallback(error::method_not_allowed)
        // Pipeline stages; the last layer added runs first
        .layer(middleware::from_fn_with_state(
            ctx.clone(),
            pipeline::single_image_upload,
        ))
        .layer(middleware::from_fn_with_state(ctx.clone(), pipeline::json_body))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(middleware::from_fn(pipeline::cors_headers))
        // Add tracing for HTTP requests and responses
        .layer(
            TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::new().level(Level::INFO)),
        )
        // Provide the shared state
        .with_state(ctx)
}

#[cfg(test)]
mod tests {
    use crate::web::testing::{Part, TestApp};
    use axum::http::{
        Method, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, HeaderMap,
        },
    };
    use serde_json::json;

    fn assert_cors(headers: &HeaderMap) {
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(
            headers[ACCESS_CONTROL_ALLOW_METHODS],
            "GET, POST, PUT, PATCH, DELETE"
        );
        assert_eq!(
            headers[ACCESS_CONTROL_ALLOW_HEADERS],
            "Content-Type, Authorization"
        );
    }

    #[tokio::test]
    async fn cors_headers_on_success_error_and_preflight() {
        let app = TestApp::new();

        let response = app.raw(Method::GET, "/feed/posts").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_cors(response.headers());

        let response = app.raw(Method::GET, "/feed/post/missing").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_cors(response.headers());

        let response = app.raw(Method::OPTIONS, "/feed/post").await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_cors(response.headers());

        let response = app.raw(Method::GET, "/images/nothing-here.png").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_cors(response.headers());
    }

    #[tokio::test]
    async fn unknown_paths_get_a_json_404() {
        let app = TestApp::new();
        let (status, body) = app.get("/nowhere").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "message": "Not Found" }));
    }

    #[tokio::test]
    async fn wrong_method_on_a_known_path_is_a_json_405() {
        let app = TestApp::new();

        let (status, body) = app.send(Method::POST, "/feed/posts").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body, json!({ "message": "Method Not Allowed" }));

        let response = app.raw(Method::GET, "/auth/login").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_cors(response.headers());
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    }

    #[tokio::test]
    async fn undecodable_post_id_is_a_json_400() {
        let app = TestApp::new();

        let response = app.raw(Method::GET, "/feed/post/%FF").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");

        let bytes = TestApp::body_bytes(response).await;
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["message"].as_str().unwrap().contains("post_id"), "{}", body);
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let app = TestApp::new();
        let (status, body) = app.raw_json(Method::POST, "/auth/login", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().starts_with("Invalid JSON body"));
    }

    #[tokio::test]
    async fn oversized_json_is_rejected() {
        let app = TestApp::with_body_limit(64);
        let big = format!("{{\"title\":\"{}\"}}", "x".repeat(256));
        let (status, _) = app.raw_json(Method::POST, "/feed/post", &big).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn uploaded_image_is_served_back() {
        let app = TestApp::new();
        let payload = b"\x89PNG\r\n\x1a\nnot really a png";

        let (status, body) = app
            .multipart(
                Method::POST,
                "/feed/post",
                vec![
                    Part::text("title", "Served post"),
                    Part::text("content", "Look at this"),
                    Part::file("image", "pic.png", "image/png", payload),
                ],
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let url = body["post"]["imageUrl"].as_str().unwrap();
        let response = app.raw(Method::GET, &format!("/{}", url)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_cors(response.headers());
        assert_eq!(TestApp::body_bytes(response).await, payload.to_vec());
    }

    #[tokio::test]
    async fn image_paths_never_reach_feed_routes() {
        let app = TestApp::new();
        // Would be a feed route if prefixes leaked into each other
        let response = app.raw(Method::GET, "/images/feed/posts").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let (status, _) = app.get("/feed/posts").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn only_the_first_image_is_kept() {
        let app = TestApp::new();

        let (status, _) = app
            .multipart(
                Method::POST,
                "/feed/post",
                vec![
                    Part::text("title", "Two images"),
                    Part::text("content", "Only one kept"),
                    Part::file("image", "first.png", "image/png", b"one"),
                    Part::file("image", "second.png", "image/png", b"two"),
                    Part::file("avatar", "third.png", "image/png", b"three"),
                ],
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let files = app.stored_files();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("first.png"));
    }

    #[tokio::test]
    async fn rejected_first_image_does_not_block_a_later_accepted_one() {
        let app = TestApp::new();

        let (status, body) = app
            .multipart(
                Method::POST,
                "/feed/post",
                vec![
                    Part::text("title", "Gif then png"),
                    Part::text("content", "The png is kept"),
                    Part::file("image", "anim.gif", "image/gif", b"GIF89a"),
                    Part::file("image", "still.png", "image/png", b"png"),
                ],
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);

        let files = app.stored_files();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("still.png"));
    }
}
