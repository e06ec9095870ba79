// Web server module
// HTTP surface of the feed server: request pipeline, route collaborators,
// static images and error translation.

mod app;
mod auth;
mod error;
mod extract_request_data;
mod feed;
mod listeners;
mod models;
mod pipeline;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

pub use app::create_app;
pub use listeners::create_listener;

// Default upper bound for request bodies, uploads included
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024; // 10MB

// URL prefix under which stored images are served
pub const IMAGES_URL_PREFIX: &str = "/images";
