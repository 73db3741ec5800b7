/// Errors produced by the log segment and the broker that serves it.
///
/// Three storage classes need different handling one layer up:
/// - `EndOfData`: the read addressed data that was never written (not found)
/// - `CapacityExceeded`: the index is full (roll to a new segment)
/// - `Io`: everything else (fatal for the call)
#[derive(thiserror::Error, Debug)]
pub enum LogError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("end of data: {0}")]
    EndOfData(String),

    #[error("index capacity exceeded: size {size} bytes, capacity {capacity} bytes")]
    CapacityExceeded { size: u64, capacity: u64 },

    #[error("offset not found: {0}")]
    OffsetNotFound(u64),

    #[error("corrupted index: {0}")]
    CorruptIndex(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("record too large: {0} bytes (max: {1})")]
    RecordTooLarge(usize, usize),

    #[error("lock poisoned")]
    LockPoisoned,

    #[error("invalid protocol: {0}")]
    InvalidProtocol(String),

    #[error("frame too large: {0} bytes (max: {1})")]
    FrameTooLarge(usize, usize),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("unknown request type: {0}")]
    UnknownRequestType(u8),

    #[error("unknown response type: {0}")]
    UnknownResponseType(u8),

    #[error("decode error: {0}")]
    DecodeError(String),
}

pub type Result<T> = std::result::Result<T, LogError>;

impl LogError {
    /// True when a read addressed a position or entry past the valid data.
    ///
    /// A positional read that runs off the end of the file surfaces from std as
    /// `UnexpectedEof`; that is the same condition.
    pub fn is_end_of_data(&self) -> bool {
        match self {
            LogError::EndOfData(_) | LogError::OffsetNotFound(_) => true,
            LogError::Io(e) => e.kind() == std::io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }

    /// True when an index write ran out of preallocated space.
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, LogError::CapacityExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes_are_distinct() {
        let eod = LogError::EndOfData("entry 3".to_string());
        let full = LogError::CapacityExceeded { size: 24, capacity: 24 };
        let io = LogError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk"));

        assert!(eod.is_end_of_data());
        assert!(!eod.is_capacity_exceeded());

        assert!(full.is_capacity_exceeded());
        assert!(!full.is_end_of_data());

        assert!(!io.is_end_of_data());
        assert!(!io.is_capacity_exceeded());
    }

    #[test]
    fn test_unexpected_eof_counts_as_end_of_data() {
        let err: LogError = std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into();
        assert!(err.is_end_of_data());
    }
}
