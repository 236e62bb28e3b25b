// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use object_detect_node::{api::start_server, config::ServiceConfig, version};
use std::env;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    dotenv::dotenv().ok();

    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    info!("🚀 Starting {}", version::get_version_string());

    let config = ServiceConfig::from_env();
    config.validate().context("invalid configuration")?;

    info!("Upload directory: {}", config.upload_dir.display());
    info!(
        "Model: {} (source: {})",
        config.model_path.display(),
        config.model_url
    );

    start_server(config).await
}
