// Extractors reading what the request pipeline attached to a request
// (the parsed body and the optional stored image), plus path parameters
// rejected through `ApiError`.

use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::convert::Infallible;

use super::{error::ApiError, upload::StoredImage};

/// Body parsed by the pipeline: a JSON document, or the text fields of a
/// multipart form as string members of an object.
#[derive(Debug, Clone)]
pub struct RequestBody(pub Value);

/// Typed view of the request body. Requests without a parsed body
/// deserialize from an empty object.
#[derive(Debug)]
pub struct Payload<T>(pub T);

impl<T, S> FromRequestParts<S> for Payload<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .extensions
            .get::<RequestBody>()
            .map(|body| body.0.clone())
            .unwrap_or_else(|| Value::Object(Map::new()));

        serde_json::from_value(value).map(Payload).map_err(|e| {
            ApiError::validation(
                "Validation failed, entered data is incorrect.",
                json!([{ "msg": e.to_string() }]),
            )
        })
    }
}

/// The image accepted by the upload stage, if any.
#[derive(Debug, Clone)]
pub struct UploadedImage(pub Option<StoredImage>);

impl<S> FromRequestParts<S> for UploadedImage
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(UploadedImage(parts.extensions.get::<StoredImage>().cloned()))
    }
}

/// `Path` whose rejection is a JSON `400` instead of axum's plain-text body.
#[derive(Debug)]
pub struct PathParam<T>(pub T);

impl<T, S> FromRequestParts<S> for PathParam<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<T>::from_request_parts(parts, state)
            .await
            .map(|Path(value)| PathParam(value))
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
    }
}
