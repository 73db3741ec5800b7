use crate::error::LogError;
use crate::protocol::response::{ERR_DECODE, ERR_FRAME, ERR_STORAGE};
use crate::protocol::{frame, request::Request, response::Response};
use crate::storage::segment::Segment;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::warn;

/// Handle a single client connection.
///
/// Connection lifecycle:
/// 1. Loop: read frame → decode request → handle → encode response → write frame
/// 2. On EOF, return Ok
/// 3. On a frame error, send an error response if possible and close
///
/// A request that fails to decode gets an error response and the loop goes on;
/// the frame boundary is still intact.
///
/// Segment calls do blocking file I/O, so they run on the blocking pool and
/// never hold a lock across `.await`.
pub async fn handle_connection<S>(mut stream: S, segment: Arc<Segment>) -> Result<(), LogError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let frame_bytes = match frame::read_frame(&mut stream).await {
            Ok(bytes) => bytes,
            Err(LogError::ConnectionClosed) => return Ok(()),
            Err(e) => {
                let error_response = Response::Error {
                    code: ERR_FRAME,
                    message: format!("frame error: {}", e),
                };
                let _ = frame::write_frame(&mut stream, &error_response.encode()).await;
                return Err(e);
            }
        };

        let request = match Request::decode(&frame_bytes) {
            Ok(req) => req,
            Err(e) => {
                let error_response = Response::Error {
                    code: ERR_DECODE,
                    message: format!("decode error: {}", e),
                };
                frame::write_frame(&mut stream, &error_response.encode()).await?;
                continue;
            }
        };

        let segment = Arc::clone(&segment);
        let response = match tokio::task::spawn_blocking(move || Response::handle(request, &segment)).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "request handler did not complete");
                Response::Error {
                    code: ERR_STORAGE,
                    message: "request handler did not complete".to_string(),
                }
            }
        };

        frame::write_frame(&mut stream, &response.encode()).await?;
    }
}
