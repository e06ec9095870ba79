// Request pipeline stages run before route dispatch.
// Layered in app.rs in this order: JSON body, single image upload, then CORS
// headers wrapped around everything.

use axum::{
    body::{self, Body},
    extract::{FromRequest, Multipart, Request, State},
    http::{
        HeaderMap, HeaderValue, Method, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN,
        },
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use headers::{ContentType, HeaderMapExt};
use http_body_util::LengthLimitError;
use mime::Mime;
use serde_json::{Map, Value};
use std::error::Error as StdError;
use tracing::{debug, warn};

use super::{
    error::ApiError,
    extract_request_data::RequestBody,
    upload::{StoredImage, is_accepted_image},
};
use crate::context::AppContext;

/// Multipart field carrying the uploaded image.
pub const IMAGE_FIELD: &str = "image";

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, DELETE";
pub const ALLOW_HEADERS: &str = "Content-Type, Authorization";

fn declared_mime(headers: &HeaderMap) -> Option<Mime> {
    headers.typed_get::<ContentType>().map(Mime::from)
}

fn is_json(mime: &Mime) -> bool {
    mime.type_() == mime::APPLICATION
        && (mime.subtype() == mime::JSON || mime.suffix() == Some(mime::JSON))
}

fn is_multipart_form(mime: &Mime) -> bool {
    mime.type_() == mime::MULTIPART && mime.subtype() == mime::FORM_DATA
}

fn body_read_error(err: axum::Error) -> ApiError {
    let too_large = std::iter::successors(
        Some(&err as &(dyn StdError + 'static)),
        |&e| e.source(),
    )
    .any(|e| e.is::<LengthLimitError>());

    if too_large {
        ApiError::PayloadTooLarge("Request body is too large.".to_string())
    } else {
        ApiError::BadRequest(format!("Failed to read request body: {}", err))
    }
}

/// Stage 1: parse `application/json` bodies into a structured value.
pub async fn json_body(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match declared_mime(request.headers()) {
        Some(mime) if is_json(&mime) => {}
        _ => return Ok(next.run(request).await),
    }

    let (mut parts, body) = request.into_parts();
    let bytes = body::to_bytes(body, ctx.max_body_bytes)
        .await
        .map_err(body_read_error)?;

    let value = if bytes.is_empty() {
        Value::Object(Map::new())
    } else {
        serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))?
    };

    parts.extensions.insert(RequestBody(value));
    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

/// Stage 2: parse a multipart form with at most one accepted `image` file.
///
/// Text fields become the request body. An `image` file with an unaccepted
/// declared type is dropped and the request continues without it.
pub async fn single_image_upload(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match declared_mime(request.headers()) {
        Some(mime) if is_multipart_form(&mime) => {}
        _ => return Ok(next.run(request).await),
    }

    let (mut parts, body) = request.into_parts();

    // Multipart needs the headers and the body limit extension, not the parts themselves
    let mut form_request = Request::new(body);
    *form_request.headers_mut() = parts.headers.clone();
    *form_request.extensions_mut() = parts.extensions.clone();

    let multipart = Multipart::from_request(form_request, &())
        .await
        .map_err(|e| {
            ApiError::BadRequest(format!("Failed to process multipart request: {}", e.body_text()))
        })?;

    let mut image: Option<StoredImage> = None;
    let fields = match read_form(&ctx, multipart, &mut image).await {
        Ok(fields) => fields,
        Err(e) => {
            if let Some(stored) = image.take() {
                ctx.uploads.clear(&stored.url()).await;
            }
            return Err(e);
        }
    };

    parts.extensions.insert(RequestBody(Value::Object(fields)));
    if let Some(stored) = image {
        parts.extensions.insert(stored);
    }

    Ok(next.run(Request::from_parts(parts, Body::empty())).await)
}

async fn read_form(
    ctx: &AppContext,
    mut multipart: Multipart,
    image: &mut Option<StoredImage>,
) -> Result<Map<String, Value>, ApiError> {
    let mut fields = Map::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if field.file_name().is_none() {
            let text = field.text().await?;
            fields.insert(name, Value::String(text));
            continue;
        }

        if name != IMAGE_FIELD {
            debug!("Ignoring file in multipart field '{}'", name);
            continue;
        }

        if image.is_some() {
            warn!(
                "Multiple '{}' files found in multipart request, keeping the first one",
                IMAGE_FIELD
            );
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !is_accepted_image(&content_type) {
            debug!("Dropping upload with declared type '{}'", content_type);
            continue;
        }

        *image = Some(ctx.uploads.store(field).await?);
    }

    Ok(fields)
}

/// Stage 4: permissive cross-origin headers on every response.
/// `OPTIONS` requests are answered here without reaching a route.
pub async fn cors_headers(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static(ALLOW_ORIGIN));
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_detection_accepts_parameters_and_suffixes() {
        let plain: Mime = "application/json".parse().unwrap();
        let charset: Mime = "application/json; charset=utf-8".parse().unwrap();
        let suffixed: Mime = "application/merge-patch+json".parse().unwrap();
        let text: Mime = "text/plain".parse().unwrap();

        assert!(is_json(&plain));
        assert!(is_json(&charset));
        assert!(is_json(&suffixed));
        assert!(!is_json(&text));
    }

    #[test]
    fn multipart_detection_requires_form_data() {
        let form: Mime = "multipart/form-data; boundary=abc".parse().unwrap();
        let mixed: Mime = "multipart/mixed; boundary=abc".parse().unwrap();

        assert!(is_multipart_form(&form));
        assert!(!is_multipart_form(&mixed));
    }

    #[test]
    fn missing_content_type_is_not_parsed() {
        assert!(declared_mime(&HeaderMap::new()).is_none());
    }

    #[tokio::test]
    async fn body_over_the_limit_is_payload_too_large() {
        let err = body::to_bytes(Body::from(vec![0u8; 32]), 8).await.unwrap_err();
        assert!(matches!(body_read_error(err), ApiError::PayloadTooLarge(_)));
    }

    #[test]
    fn other_body_errors_are_bad_requests() {
        let err = axum::Error::new(std::io::Error::other("connection reset"));
        assert!(matches!(body_read_error(err), ApiError::BadRequest(_)));
    }
}
