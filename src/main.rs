// Main entry point for feed-server.
// Reads configuration, sets up logging, and hands over to the startup sequence,
// which connects to MongoDB before binding the HTTP listener.

mod context;
mod realtime;
mod shutdown_signal;
mod startup;
mod store;
mod web;

use clap::{ArgGroup, Parser};
use startup::{ServerSettings, Startup};
use std::path::PathBuf;
use store::MongoConnector;
use tracing_subscriber::EnvFilter;

/// Command line arguments for feed-server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("database_uri")
        .required(true)
        .multiple(true)
        .args(["mongodb_uri", "mongoose_uri"])
))]
struct AppConfig {
    /// MongoDB connection string. The database named in the URI is used when present.
    #[arg(long, env = "MONGODB_URI")]
    mongodb_uri: Option<String>,

    /// Older name for the connection string, read from existing `.env` files.
    /// `--mongodb-uri` wins when both are set.
    #[arg(long, env = "MONGOOSE_URI", hide = true)]
    mongoose_uri: Option<String>,

    /// Database to use when the connection string does not name one.
    #[arg(long, env = "FEED_SERVER_DATABASE", default_value = "feed")]
    database: String,

    /// Hostname/IP to bind the server to.
    /// Given without a value it becomes "*", listening on all interfaces.
    #[arg(
        long,
        env = "FEED_SERVER_HOST",
        default_value = "localhost",
        num_args = 0..=1,
        default_missing_value = "*"
    )]
    host: String,

    /// Port number to listen on.
    #[arg(short, long, env = "FEED_SERVER_PORT", default_value_t = 8080)]
    port: u16,

    /// Directory uploaded images are written to and served from.
    #[arg(long, env = "FEED_SERVER_IMAGES_DIR", default_value = "images")]
    images_dir: PathBuf,

    /// Maximum accepted request body size in bytes.
    #[arg(long, env = "FEED_SERVER_MAX_BODY_BYTES", default_value_t = web::DEFAULT_MAX_BODY_BYTES)]
    max_body_bytes: usize,
}

impl AppConfig {
    fn database_uri(&self) -> Option<&str> {
        self.mongodb_uri
            .as_deref()
            .or(self.mongoose_uri.as_deref())
            .filter(|uri| !uri.is_empty())
    }
}

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let config = AppConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("Starting feed-server...");
    tracing::info!("Image directory set to: {}", config.images_dir.display());

    let Some(uri) = config.database_uri() else {
        tracing::error!("FATAL: no MongoDB connection string configured");
        eprintln!("FATAL: set MONGODB_URI (or --mongodb-uri). Exiting.");
        std::process::exit(1);
    };
    let connector = MongoConnector::new(uri, config.database.as_str());

    let startup = Startup::new(ServerSettings {
        host: config.host,
        port: config.port,
        images_dir: config.images_dir,
        max_body_bytes: config.max_body_bytes,
    });

    let mut readiness = startup.readiness();
    tokio::spawn(async move {
        while readiness.changed().await.is_ok() {
            let state = *readiness.borrow_and_update();
            tracing::debug!(?state, "Server readiness changed");
        }
    });

    if let Err(e) = startup
        .run(&connector, shutdown_signal::shutdown_signal())
        .await
    {
        tracing::error!("FATAL: {}", e);
        eprintln!("FATAL: feed-server could not start. Error: {}. Exiting.", e);
        std::process::exit(1);
    }

    tracing::info!("feed-server has shut down.");
}
