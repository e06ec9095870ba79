// Application context handed to every route through axum state.
// Built once by the startup sequence after the database connection succeeds.

use crate::{
    realtime::RealtimeChannel,
    store::SharedStore,
    web::upload::UploadDestination,
};

#[derive(Clone)]
pub struct AppContext {
    pub store: SharedStore,
    pub realtime: RealtimeChannel,
    pub uploads: UploadDestination,
    /// Upper bound for any request body, uploads included.
    pub max_body_bytes: usize,
}
