use crate::broker::connection;
use crate::error::LogError;
use crate::protocol::frame::MAX_FRAME_SIZE;
use crate::storage::segment::Segment;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Bind `addr` and serve `segment` until `shutdown` resolves.
pub async fn run<F>(addr: &str, segment: Arc<Segment>, shutdown: F) -> Result<(), LogError>
where
    F: Future<Output = ()>,
{
    let listener = TcpListener::bind(addr).await?;
    serve(listener, segment, shutdown).await
}

/// Run the broker accept loop on an already-bound listener.
///
/// Architecture:
/// - Main loop accepts connections
/// - Each connection runs in its own task, tracked in a JoinSet
/// - When `shutdown` resolves, accepting stops and open connections are
///   aborted, so the caller gets back sole ownership of the segment
pub async fn serve<F>(listener: TcpListener, segment: Arc<Segment>, shutdown: F) -> Result<(), LogError>
where
    F: Future<Output = ()>,
{
    let local_addr = listener.local_addr()?;
    info!(%local_addr, max_frame_size = MAX_FRAME_SIZE, "broker listening");

    let mut connections = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(open_connections = connections.len(), "shutting down broker");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer_addr) = accepted?;
                debug!(%peer_addr, "accepted connection");

                let segment = Arc::clone(&segment);
                connections.spawn(async move {
                    match connection::handle_connection(stream, segment).await {
                        Ok(()) => debug!(%peer_addr, "connection closed"),
                        Err(e) => warn!(%peer_addr, error = %e, "connection error"),
                    }
                });
            }
            // Reap finished connection tasks.
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    connections.shutdown().await;
    Ok(())
}

/// Broker process settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9092".to_string(),
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl ServerConfig {
    /// Read `SEGLOG_ADDR` and `SEGLOG_DATA_DIR` over the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("SEGLOG_ADDR").unwrap_or(defaults.bind_addr),
            data_dir: std::env::var_os("SEGLOG_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
        }
    }
}
