//! Byte widths and big-endian helpers shared by the store and the index.
//!
//! Store frame:
//! ```text
//! | length: u64 | payload: [u8; length] |
//! | 8 bytes     | variable              |
//! ```
//!
//! Index entry:
//! ```text
//! | offset: u32 | position: u64 |
//! | 4 bytes     | 8 bytes       |
//! ```

/// Width of the record length prefix in the store.
pub const LEN_WIDTH: u64 = 8;

/// Width of the entry offset in an index entry.
pub const OFF_WIDTH: u64 = 4;

/// Width of the store position in an index entry.
pub const POS_WIDTH: u64 = 8;

/// Width of one index entry.
pub const ENT_WIDTH: u64 = OFF_WIDTH + POS_WIDTH;

/// Encode one index entry.
pub fn encode_entry(offset: u32, position: u64) -> [u8; ENT_WIDTH as usize] {
    let mut entry = [0u8; ENT_WIDTH as usize];
    entry[..OFF_WIDTH as usize].copy_from_slice(&offset.to_be_bytes());
    entry[OFF_WIDTH as usize..].copy_from_slice(&position.to_be_bytes());
    entry
}

/// Decode one index entry.
pub fn decode_entry(buf: &[u8; ENT_WIDTH as usize]) -> (u32, u64) {
    let mut off_bytes = [0u8; OFF_WIDTH as usize];
    let mut pos_bytes = [0u8; POS_WIDTH as usize];
    off_bytes.copy_from_slice(&buf[..OFF_WIDTH as usize]);
    pos_bytes.copy_from_slice(&buf[OFF_WIDTH as usize..]);
    (u32::from_be_bytes(off_bytes), u64::from_be_bytes(pos_bytes))
}

/// Encode a store length prefix.
pub fn encode_len(len: u64) -> [u8; LEN_WIDTH as usize] {
    len.to_be_bytes()
}

/// Decode a store length prefix.
pub fn decode_len(buf: [u8; LEN_WIDTH as usize]) -> u64 {
    u64::from_be_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_layout_is_big_endian() {
        let entry = encode_entry(1, 13);
        assert_eq!(entry, [0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 13]);
        assert_eq!(decode_entry(&entry), (1, 13));
    }

    #[test]
    fn test_decode_entry_from_larger_buffer() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&encode_entry(0, 0));
        buf.extend_from_slice(&encode_entry(2, 26));

        let second: &[u8; ENT_WIDTH as usize] = buf[12..24].try_into().expect("12-byte entry");
        assert_eq!(decode_entry(second), (2, 26));

        let short: Result<&[u8; ENT_WIDTH as usize], _> = buf[..11].try_into();
        assert!(short.is_err());
    }

    #[test]
    fn test_len_prefix_layout() {
        assert_eq!(encode_len(5), [0, 0, 0, 0, 0, 0, 0, 5]);
        assert_eq!(decode_len([0, 0, 0, 0, 0, 0, 1, 0]), 256);
    }

    #[test]
    fn test_widths() {
        assert_eq!(ENT_WIDTH, 12);
        assert_eq!(LEN_WIDTH, 8);
    }
}
