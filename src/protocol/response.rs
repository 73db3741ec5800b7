use crate::error::LogError;
use crate::protocol::frame::MAX_RECORD_SIZE;
use crate::protocol::request::Request;
use crate::storage::segment::Segment;
use tracing::{debug, error, warn};

/// Error code: the request frame could not be read.
pub const ERR_FRAME: u16 = 1;
/// Error code: the request could not be decoded.
pub const ERR_DECODE: u16 = 2;
/// Error code: the segment has no room for another record.
pub const ERR_SEGMENT_FULL: u16 = 3;
/// Error code: the storage layer failed.
pub const ERR_STORAGE: u16 = 4;
/// Error code: the record could not be returned in one consume frame.
pub const ERR_RECORD_TOO_LARGE: u16 = 5;

/// Wire protocol response format:
///
/// [1 byte: response_type]
/// [remaining bytes: response-specific payload]
///
/// Response types:
/// - 0x01: Produced
/// - 0x02: Consumed
/// - 0x03: NotFound
/// - 0xFE: Error
/// - 0xFF: Pong
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Acknowledgment for a Produce request.
    ///
    /// Payload format:
    /// - offset (8 bytes, big-endian): the offset the record was stored at
    Produced { offset: u64 },

    /// The record for a Consume request.
    ///
    /// Payload format:
    /// - offset (8 bytes, big-endian)
    /// - record_len (4 bytes, big-endian)
    /// - record (record_len bytes)
    Consumed { offset: u64, record: Vec<u8> },

    /// No record is stored at the requested offset.
    ///
    /// Payload format:
    /// - offset (8 bytes, big-endian)
    NotFound { offset: u64 },

    /// Error response for any failed request.
    ///
    /// Payload format:
    /// - error_code (2 bytes, big-endian)
    /// - message_len (2 bytes, big-endian)
    /// - message (utf8 string)
    Error { code: u16, message: String },

    /// Simple health check response.
    Pong,
}

impl Response {
    /// Handle a request against the segment and produce a response.
    ///
    /// Error handling:
    /// - Record over `MAX_RECORD_SIZE` → Error with `ERR_RECORD_TOO_LARGE`, nothing stored
    /// - Offset outside the segment → NotFound
    /// - Index full → Error with `ERR_SEGMENT_FULL`
    /// - Any other storage error → Error with `ERR_STORAGE`
    ///
    /// Blocking: this does file I/O. Async callers run it on the blocking pool.
    pub fn handle(req: Request, segment: &Segment) -> Self {
        match req {
            Request::Produce { record } if record.len() > MAX_RECORD_SIZE => {
                let e = LogError::RecordTooLarge(record.len(), MAX_RECORD_SIZE);
                warn!(len = record.len(), "rejecting oversized record");
                Response::Error {
                    code: ERR_RECORD_TOO_LARGE,
                    message: e.to_string(),
                }
            }
            Request::Produce { record } => match segment.append(&record) {
                Ok(offset) => {
                    debug!(offset, len = record.len(), "produced record");
                    Response::Produced { offset }
                }
                Err(e) if e.is_capacity_exceeded() => {
                    warn!(base_offset = segment.base_offset(), "segment full, rejecting produce");
                    Response::Error {
                        code: ERR_SEGMENT_FULL,
                        message: e.to_string(),
                    }
                }
                Err(e) => {
                    error!(error = %e, "produce failed");
                    Response::Error {
                        code: ERR_STORAGE,
                        message: e.to_string(),
                    }
                }
            },
            Request::Consume { offset } => match segment.read(offset) {
                Ok(record) => Response::Consumed {
                    offset: record.offset,
                    record: record.payload,
                },
                Err(e) if e.is_end_of_data() => Response::NotFound { offset },
                Err(e) => {
                    error!(offset, error = %e, "consume failed");
                    Response::Error {
                        code: ERR_STORAGE,
                        message: e.to_string(),
                    }
                }
            },
            Request::Ping => Response::Pong,
        }
    }

    /// Encode a response into raw bytes.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Response::Produced { offset } => {
                let mut buf = Vec::with_capacity(9);
                buf.push(0x01);
                buf.extend_from_slice(&offset.to_be_bytes());
                buf
            }
            Response::Consumed { offset, record } => {
                let mut buf = Vec::with_capacity(1 + 8 + 4 + record.len());
                buf.push(0x02);
                buf.extend_from_slice(&offset.to_be_bytes());
                buf.extend_from_slice(&(record.len() as u32).to_be_bytes());
                buf.extend_from_slice(record);
                buf
            }
            Response::NotFound { offset } => {
                let mut buf = Vec::with_capacity(9);
                buf.push(0x03);
                buf.extend_from_slice(&offset.to_be_bytes());
                buf
            }
            Response::Error { code, message } => {
                // Messages longer than a u16 length are cut at a char boundary.
                let mut end = message.len().min(u16::MAX as usize);
                while !message.is_char_boundary(end) {
                    end -= 1;
                }
                let message = &message[..end];

                let mut buf = Vec::with_capacity(5 + message.len());
                buf.push(0xFE);
                buf.extend_from_slice(&code.to_be_bytes());
                buf.extend_from_slice(&(message.len() as u16).to_be_bytes());
                buf.extend_from_slice(message.as_bytes());
                buf
            }
            Response::Pong => vec![0xFF],
        }
    }

    /// Decode a response from raw bytes.
    ///
    /// Used primarily for testing and client implementations.
    pub fn decode(buf: &[u8]) -> Result<Self, LogError> {
        let (&response_type, payload) = buf
            .split_first()
            .ok_or_else(|| LogError::DecodeError("empty buffer".to_string()))?;

        match response_type {
            0x01 => Ok(Response::Produced {
                offset: read_u64(payload, "produced offset")?,
            }),
            0x02 => Self::decode_consumed(payload),
            0x03 => Ok(Response::NotFound {
                offset: read_u64(payload, "not found offset")?,
            }),
            0xFE => Self::decode_error(payload),
            0xFF => Ok(Response::Pong),
            _ => Err(LogError::UnknownResponseType(response_type)),
        }
    }

    fn decode_consumed(buf: &[u8]) -> Result<Self, LogError> {
        if buf.len() < 12 {
            return Err(LogError::DecodeError("truncated consume response".to_string()));
        }

        let offset = read_u64(&buf[..8], "consumed offset")?;
        let len = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]) as usize;

        let record = buf
            .get(12..12 + len)
            .ok_or_else(|| LogError::DecodeError("truncated record".to_string()))?;

        Ok(Response::Consumed {
            offset,
            record: record.to_vec(),
        })
    }

    fn decode_error(buf: &[u8]) -> Result<Self, LogError> {
        if buf.len() < 4 {
            return Err(LogError::DecodeError("truncated error response".to_string()));
        }

        let code = u16::from_be_bytes([buf[0], buf[1]]);
        let len = u16::from_be_bytes([buf[2], buf[3]]) as usize;

        let message = buf
            .get(4..4 + len)
            .ok_or_else(|| LogError::DecodeError("truncated error message".to_string()))?;
        let message = String::from_utf8(message.to_vec())
            .map_err(|e| LogError::DecodeError(format!("invalid utf8 message: {}", e)))?;

        Ok(Response::Error { code, message })
    }
}

fn read_u64(buf: &[u8], what: &str) -> Result<u64, LogError> {
    let bytes: [u8; 8] = buf
        .try_into()
        .map_err(|_| LogError::DecodeError(format!("{} needs 8 bytes, got {}", what, buf.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, SegmentConfig};

    fn temp_dir() -> tempfile::TempDir {
        tempfile::tempdir().expect("failed to create temp dir")
    }

    #[test]
    fn test_produce_then_consume() {
        let dir = temp_dir();
        let segment = Segment::open(dir.path(), 0, &Config::default()).expect("failed to open segment");

        let produced = Response::handle(Request::Produce { record: b"hello".to_vec() }, &segment);
        assert_eq!(produced, Response::Produced { offset: 0 });

        let consumed = Response::handle(Request::Consume { offset: 0 }, &segment);
        assert_eq!(
            consumed,
            Response::Consumed {
                offset: 0,
                record: b"hello".to_vec()
            }
        );
    }

    #[test]
    fn test_consume_missing_offset_is_not_found() {
        let dir = temp_dir();
        let segment = Segment::open(dir.path(), 0, &Config::default()).expect("failed to open segment");

        let response = Response::handle(Request::Consume { offset: 3 }, &segment);
        assert_eq!(response, Response::NotFound { offset: 3 });
    }

    #[test]
    fn test_full_segment_reports_segment_full() {
        let dir = temp_dir();
        let config = Config {
            segment: SegmentConfig {
                max_index_bytes: 12,
                ..Default::default()
            },
        };
        let segment = Segment::open(dir.path(), 0, &config).expect("failed to open segment");

        Response::handle(Request::Produce { record: b"one".to_vec() }, &segment);
        match Response::handle(Request::Produce { record: b"two".to_vec() }, &segment) {
            Response::Error { code, .. } => assert_eq!(code, ERR_SEGMENT_FULL),
            other => panic!("expected Error, got {:?}", other),
        }
    }

    #[test]
    fn test_oversized_record_rejected_before_append() {
        let dir = temp_dir();
        let segment = Segment::open(dir.path(), 0, &Config::default()).expect("failed to open segment");

        let response = Response::handle(
            Request::Produce {
                record: vec![7u8; MAX_RECORD_SIZE + 1],
            },
            &segment,
        );
        match response {
            Response::Error { code, .. } => assert_eq!(code, ERR_RECORD_TOO_LARGE),
            other => panic!("expected Error, got {:?}", other),
        }

        assert_eq!(segment.next_offset().expect("next_offset"), 0);
        assert_eq!(
            Response::handle(Request::Consume { offset: 0 }, &segment),
            Response::NotFound { offset: 0 }
        );
    }

    #[test]
    fn test_consumed_wire_layout() {
        let bytes = Response::Consumed {
            offset: 7,
            record: b"ab".to_vec(),
        }
        .encode();

        assert_eq!(bytes, vec![0x02, 0, 0, 0, 0, 0, 0, 0, 7, 0, 0, 0, 2, b'a', b'b']);
    }

    #[test]
    fn test_truncated_consumed_rejected() {
        let bytes = [0x02, 0, 0, 0, 0, 0, 0, 0, 7, 0, 0, 0, 9, b'a'];
        assert!(matches!(Response::decode(&bytes), Err(LogError::DecodeError(_))));
    }

    #[test]
    fn test_long_error_message_is_cut() {
        let response = Response::Error {
            code: ERR_STORAGE,
            message: "é".repeat(40_000),
        };

        match Response::decode(&response.encode()).expect("failed to decode") {
            Response::Error { message, .. } => {
                assert!(message.len() <= u16::MAX as usize);
                assert!(message.chars().all(|c| c == 'é'));
            }
            other => panic!("expected Error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_response_type() {
        assert!(matches!(
            Response::decode(&[0x42]),
            Err(LogError::UnknownResponseType(0x42))
        ));
    }
}
