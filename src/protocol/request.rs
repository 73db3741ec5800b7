use crate::error::LogError;

/// Wire protocol request format:
///
/// [1 byte: request_type]
/// [remaining bytes: request-specific payload]
///
/// Request types:
/// - 0x01: Produce
/// - 0x02: Consume
/// - 0xFF: Ping (for connection health checks)
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Append one record to the log.
    ///
    /// Payload format:
    /// - record_len (4 bytes, big-endian)
    /// - record (record_len bytes)
    Produce { record: Vec<u8> },

    /// Read the record stored at an offset.
    ///
    /// Payload format:
    /// - offset (8 bytes, big-endian)
    Consume { offset: u64 },

    /// Simple health check request.
    Ping,
}

impl Request {
    /// Encode a request into raw bytes (without the frame prefix).
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Request::Produce { record } => {
                let mut buf = Vec::with_capacity(1 + 4 + record.len());
                buf.push(0x01);
                buf.extend_from_slice(&(record.len() as u32).to_be_bytes());
                buf.extend_from_slice(record);
                buf
            }
            Request::Consume { offset } => {
                let mut buf = Vec::with_capacity(1 + 8);
                buf.push(0x02);
                buf.extend_from_slice(&offset.to_be_bytes());
                buf
            }
            Request::Ping => vec![0xFF],
        }
    }

    /// Decode a request from raw bytes.
    ///
    /// The buffer contains the complete payload (after length-prefix was stripped).
    pub fn decode(buf: &[u8]) -> Result<Self, LogError> {
        let (&request_type, payload) = buf
            .split_first()
            .ok_or_else(|| LogError::DecodeError("empty buffer".to_string()))?;

        match request_type {
            0x01 => Self::decode_produce(payload),
            0x02 => Self::decode_consume(payload),
            0xFF => Ok(Request::Ping),
            _ => Err(LogError::UnknownRequestType(request_type)),
        }
    }

    fn decode_produce(buf: &[u8]) -> Result<Self, LogError> {
        if buf.len() < 4 {
            return Err(LogError::DecodeError("missing record length".to_string()));
        }
        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;

        let record = buf
            .get(4..4 + len)
            .ok_or_else(|| LogError::DecodeError("truncated record".to_string()))?;

        if buf.len() != 4 + len {
            return Err(LogError::DecodeError(format!(
                "{} trailing bytes after record",
                buf.len() - 4 - len
            )));
        }

        Ok(Request::Produce {
            record: record.to_vec(),
        })
    }

    fn decode_consume(buf: &[u8]) -> Result<Self, LogError> {
        let bytes: [u8; 8] = buf
            .try_into()
            .map_err(|_| LogError::DecodeError(format!("consume offset needs 8 bytes, got {}", buf.len())))?;

        Ok(Request::Consume {
            offset: u64::from_be_bytes(bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_produce_wire_layout() {
        let bytes = Request::Produce {
            record: b"hi".to_vec(),
        }
        .encode();

        assert_eq!(bytes, vec![0x01, 0, 0, 0, 2, b'h', b'i']);
        assert_eq!(
            Request::decode(&bytes).expect("failed to decode"),
            Request::Produce { record: b"hi".to_vec() }
        );
    }

    #[test]
    fn test_consume_decode() {
        let bytes = Request::Consume { offset: 42 }.encode();
        assert_eq!(bytes.len(), 9);
        assert_eq!(
            Request::decode(&bytes).expect("failed to decode"),
            Request::Consume { offset: 42 }
        );
    }

    #[test]
    fn test_empty_record_allowed() {
        let bytes = Request::Produce { record: Vec::new() }.encode();
        assert_eq!(
            Request::decode(&bytes).expect("failed to decode"),
            Request::Produce { record: Vec::new() }
        );
    }

    #[test]
    fn test_truncated_requests_rejected() {
        assert!(matches!(Request::decode(&[]), Err(LogError::DecodeError(_))));
        assert!(matches!(Request::decode(&[0x01, 0, 0]), Err(LogError::DecodeError(_))));
        assert!(matches!(
            Request::decode(&[0x01, 0, 0, 0, 5, b'a']),
            Err(LogError::DecodeError(_))
        ));
        assert!(matches!(Request::decode(&[0x02, 0, 1]), Err(LogError::DecodeError(_))));
    }

    #[test]
    fn test_unknown_request_type() {
        assert!(matches!(
            Request::decode(&[0x7A]),
            Err(LogError::UnknownRequestType(0x7A))
        ));
    }
}
