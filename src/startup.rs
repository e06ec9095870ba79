// Fail-fast startup: database first, then listener, realtime channel and
// router. Nothing is bound unless the database connection succeeds.

use std::{future::Future, net::SocketAddr, path::PathBuf};
use thiserror::Error;
use tokio::sync::{broadcast::error::RecvError, watch};
use tracing::{error, info, warn};

use crate::{
    context::AppContext,
    realtime::RealtimeChannel,
    store::{Connect, SharedStore, StoreError},
    web::{self, upload::UploadDestination},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Connecting,
    Listening(SocketAddr),
    Failed,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub images_dir: PathBuf,
    pub max_body_bytes: usize,
}

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("failed to connect to the database: {0}")]
    Persistence(#[from] StoreError),

    #[error("failed to prepare image directory {path}: {source}")]
    ImagesDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to bind {host}:{port}: {source}")]
    Bind {
        host: String,
        port: u16,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(std::io::Error),
}

pub struct Startup {
    settings: ServerSettings,
    readiness: watch::Sender<Readiness>,
}

impl Startup {
    pub fn new(settings: ServerSettings) -> Self {
        let (readiness, _) = watch::channel(Readiness::Connecting);
        Self {
            settings,
            readiness,
        }
    }

    pub fn readiness(&self) -> watch::Receiver<Readiness> {
        self.readiness.subscribe()
    }

    /// Runs the server until `shutdown` resolves. Returns early with an error,
    /// and without binding anything, if the database cannot be reached.
    pub async fn run<C: Connect>(
        self,
        connector: &C,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), StartupError> {
        info!("Connecting to database...");

        let store = match connector.connect().await {
            Ok(store) => store,
            Err(e) => {
                error!("Database connection failed: {}", e);
                self.readiness.send_replace(Readiness::Failed);
                return Err(e.into());
            }
        };

        let result = self.serve(store, shutdown).await;
        if let Err(e) = &result {
            error!("Server stopped with an error: {}", e);
        }
        result
    }

    async fn serve(
        &self,
        store: SharedStore,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), StartupError> {
        let ServerSettings {
            host,
            port,
            images_dir,
            max_body_bytes,
        } = &self.settings;

        if let Err(source) = tokio::fs::create_dir_all(images_dir).await {
            self.readiness.send_replace(Readiness::Failed);
            return Err(StartupError::ImagesDir {
                path: images_dir.clone(),
                source,
            });
        }

        let (addr, listener) = match web::create_listener(host, *port).await {
            Ok(bound) => bound,
            Err(source) => {
                self.readiness.send_replace(Readiness::Failed);
                return Err(StartupError::Bind {
                    host: host.clone(),
                    port: *port,
                    source,
                });
            }
        };
        info!("Server successfully bound. Listening on {}", addr);

        let realtime = RealtimeChannel::init();
        log_connections(&realtime);

        let ctx = AppContext {
            store,
            realtime,
            uploads: UploadDestination::new(images_dir.clone()),
            max_body_bytes: *max_body_bytes,
        };
        let app = web::create_app(ctx);

        self.readiness.send_replace(Readiness::Listening(addr));

        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(StartupError::Serve)
    }
}

fn log_connections(channel: &RealtimeChannel) {
    let mut connections = channel.on_connection();
    tokio::spawn(async move {
        loop {
            match connections.recv().await {
                Ok(connection) => info!(client_id = %connection.client_id, "Client connected"),
                Err(RecvError::Lagged(missed)) => warn!("Missed {} connection notices", missed),
                Err(RecvError::Closed) => break,
            }
        }
    });
}
