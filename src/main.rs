use std::io;
use std::sync::Arc;

use actix_web::HttpServer;
use clap::Parser;
use env_logger::{Builder, Env};
use log::{error, info};

use vidtube::config::{Config, StoreBackend};
use vidtube::db;
use vidtube::handlers;
use vidtube::media::CloudinaryStorage;
use vidtube::state::AppState;
use vidtube::store::{MemoryStore, ScyllaStore, Store};

async fn open_store(config: &Config) -> io::Result<Arc<dyn Store>> {
    match config.store {
        StoreBackend::Memory => {
            info!("Using the in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Scylla => {
            let settings = config.scylla();
            let session = db::create_session(&settings)
                .await
                .map_err(io::Error::other)?;
            db::ensure_schema(&session, &settings)
                .await
                .map_err(io::Error::other)?;
            info!("Connected to ScyllaDB keyspace {}", settings.keyspace);
            Ok(Arc::new(ScyllaStore::new(Arc::new(session), settings.keyspace)))
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let config = Config::parse();
    Builder::from_env(Env::default().default_filter_or(config.log_level.as_str()))
        .format_timestamp_secs()
        .init();

    if let Err(err) = config.validate() {
        error!("Invalid configuration: {}", err);
        return Err(io::Error::new(io::ErrorKind::InvalidInput, err));
    }

    info!("Starting vidtube backend...");
    let store = open_store(&config).await?;
    let media = CloudinaryStorage::new(config.cloudinary(), config.request_timeout())
        .map_err(io::Error::other)?;
    let state = AppState::from_config(&config, store, Arc::new(media));

    let (host, port) = config.bind_address();
    info!("Listening on {}:{} with {} workers", host, port, config.worker_count());
    HttpServer::new(move || handlers::app(state.clone()))
        .workers(config.worker_count())
        .bind((host, port))?
        .run()
        .await
}
