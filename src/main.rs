//! segment-log broker
//!
//! Serves one log segment over the binary produce/consume protocol.
//!
//! ## Configuration
//! - `SEGLOG_ADDR`: bind address (default `127.0.0.1:9092`)
//! - `SEGLOG_DATA_DIR`: directory holding the segment files (default `./data`)
//! - `SEGLOG_MAX_STORE_BYTES`, `SEGLOG_MAX_INDEX_BYTES`, `SEGLOG_INITIAL_OFFSET`
//!
//! ## Logging
//! Controlled via `RUST_LOG` (default `info`).
//!
//! On Ctrl-C the broker stops accepting, drops open connections and closes the
//! segment, which truncates the index file to its written entries.

use segment_log::broker::server::{self, ServerConfig};
use segment_log::config::Config;
use segment_log::storage::segment::Segment;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let server_config = ServerConfig::from_env();
    let config = Config::from_env()?;

    std::fs::create_dir_all(&server_config.data_dir)?;
    tracing::info!(
        data_dir = %server_config.data_dir.display(),
        max_store_bytes = config.segment.max_store_bytes,
        max_index_bytes = config.segment.max_index_bytes,
        "starting broker"
    );

    let segment = Arc::new(Segment::open(
        &server_config.data_dir,
        config.segment.initial_offset,
        &config,
    )?);

    server::run(&server_config.bind_addr, Arc::clone(&segment), async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    })
    .await?;

    // Blocking handlers still in flight keep a clone until they finish.
    let mut segment = segment;
    for _ in 0..50 {
        match Arc::try_unwrap(segment) {
            Ok(segment) => {
                segment.close()?;
                tracing::info!("segment closed");
                return Ok(());
            }
            Err(shared) => {
                segment = shared;
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }

    tracing::warn!("segment still in use after shutdown; index left at full capacity");
    Ok(())
}
