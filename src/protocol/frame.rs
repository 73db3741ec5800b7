use crate::error::LogError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame size: 10MB
/// Bounds the allocation a peer can force with one length prefix.
pub const MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Largest record the broker accepts.
/// A `Consumed` reply adds 13 bytes (type, offset, record length) and must still fit one frame.
pub const MAX_RECORD_SIZE: usize = MAX_FRAME_SIZE - 13;

/// Frame format: [4 bytes length (big-endian)][payload bytes]
///
/// Read a complete frame from the stream.
///
/// Returns the payload bytes (without the length prefix).
///
/// # Errors
/// - `ConnectionClosed` if stream ends before complete frame
/// - `FrameTooLarge` if length exceeds MAX_FRAME_SIZE
/// - `InvalidProtocol` on a zero-length frame
/// - `Io` on underlying I/O errors
pub async fn read_frame<R>(stream: &mut R) -> Result<Vec<u8>, LogError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await.map_err(closed_on_eof)?;

    let len = u32::from_be_bytes(len_buf) as usize;

    if len > MAX_FRAME_SIZE {
        return Err(LogError::FrameTooLarge(len, MAX_FRAME_SIZE));
    }

    if len == 0 {
        return Err(LogError::InvalidProtocol("zero-length frame".to_string()));
    }

    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.map_err(closed_on_eof)?;

    Ok(payload)
}

/// Write a complete frame to the stream.
///
/// Automatically prepends the 4-byte length prefix.
///
/// # Errors
/// - `FrameTooLarge` if payload exceeds MAX_FRAME_SIZE
/// - `Io` on underlying I/O errors
pub async fn write_frame<W>(stream: &mut W, payload: &[u8]) -> Result<(), LogError>
where
    W: AsyncWrite + Unpin,
{
    let len = payload.len();

    if len > MAX_FRAME_SIZE {
        return Err(LogError::FrameTooLarge(len, MAX_FRAME_SIZE));
    }

    // One buffer so the prefix and payload go out in a single write.
    let mut frame = Vec::with_capacity(4 + len);
    frame.extend_from_slice(&(len as u32).to_be_bytes());
    frame.extend_from_slice(payload);

    stream.write_all(&frame).await?;
    stream.flush().await?;

    Ok(())
}

fn closed_on_eof(e: std::io::Error) -> LogError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        LogError::ConnectionClosed
    } else {
        LogError::Io(e)
    }
}
