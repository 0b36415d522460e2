// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//! Shopfront API server binary
//!
//! Starts the storefront HTTP API over the JSON document store.

use shopfront_api::ApiConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ApiConfig::from_env();

    tracing::info!(
        data_file = %config.data_file.display(),
        debounce_ms = config.debounce_ms,
        "Configured Shopfront store"
    );

    shopfront_api::serve(config).await?;

    Ok(())
}
