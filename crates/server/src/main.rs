// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! omd: the OrbitMesh control-plane daemon.

use om_core::MeshConfig;
use om_server::{env, MeshServer, ServerError};
use std::path::Path;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let filter = EnvFilter::try_from_env("OM_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config()?;
    let listener = TcpListener::bind(env::listen_addr()).await?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received");
                cancel.cancel();
            }
        }
    });

    MeshServer::new(config, env::auth_token()).serve(listener, cancel).await
}

/// CLI argument wins over `OM_CONFIG`; neither means defaults.
fn load_config() -> Result<MeshConfig, ServerError> {
    let path = std::env::args().nth(1).or_else(env::config_path);
    match path {
        Some(path) => {
            info!(%path, "loading config");
            Ok(MeshConfig::load(Path::new(&path))?)
        }
        None => Ok(MeshConfig::default()),
    }
}
