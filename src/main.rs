//! uploadbox server binary.
//!
//! A single-operator file drop: anonymous multipart uploads land in a flat
//! storage directory under a timestamp-prefixed name, while listing,
//! download and delete sit behind a shared-password session. The main entry
//! point creates the storage directory, loads or generates the TLS pair and
//! serves the Axum router over HTTPS.

mod auth;
mod background;
mod codec;
mod config;
mod error;
mod files;
mod http;
mod listing;
mod logging;
mod pages;
mod router;
mod storage;
mod tls;
mod upload;

use axum_server::Handle;
use clap::Parser;
use shadow_rs::shadow;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

use crate::auth::AuthConfig;
use crate::background::spawn_background_tasks;
use crate::config::{Args, DEFAULT_PASSWORD};
use crate::storage::Storage;
use crate::upload::UploadConfig;

shadow!(build);

/// Starts the uploadbox server and blocks until shutdown.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    logging::init_logging();

    let args = Args::parse();
    let storage = Arc::new(Storage::new(PathBuf::from(&args.storage_dir)));
    storage.ensure_root().await?;
    if args.password == DEFAULT_PASSWORD {
        warn!("using the default password, set UPLOADBOX_PASSWORD to change it");
    }
    let auth_config = Arc::new(AuthConfig::new(
        args.password.clone(),
        Duration::from_secs(args.session_ttl_secs),
    ));
    let upload_config = Arc::new(UploadConfig {
        max_file_size: args.max_file_size,
    });

    let host = args
        .host
        .parse::<IpAddr>()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?;
    let addr = SocketAddr::new(host, args.port);
    let tls_config = tls::build_rustls_config(&args, host)
        .await
        .inspect_err(|err| error!(error = %err, "TLS setup failed"))?;

    let app = router::build_router(storage.clone(), auth_config.clone(), upload_config);
    let handle = Handle::new();

    info!("🚀 Serving uploads on https://{}", addr);
    info!(storage = ?storage.root_path(), "📁 Storage directory ready");
    info!("🔐 File list at https://{}/view", addr);

    spawn_background_tasks(auth_config);
    let server = axum_server::bind_rustls(addr, tls_config)
        .handle(handle.clone())
        .serve(app.into_make_service_with_connect_info::<SocketAddr>());

    tokio::select! {
        result = server => result?,
        _ = shutdown_signal(handle) => {}
    }

    Ok(())
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received termination signal shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
