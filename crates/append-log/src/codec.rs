//! Record framing for the on-disk log.
//!
//! Every record is stored as `checksum (u32 LE) || length (u32 LE) || payload`
//! with no padding between records. The checksum is CRC-32C (Castagnoli)
//! over the payload bytes only.

use crate::error::{Error, Result};

/// Record header size (4 bytes checksum + 4 bytes payload length).
pub const RECORD_HEADER_LEN: usize = 8;

/// Computes the CRC-32C checksum of `data`.
#[must_use]
pub fn crc32c(data: &[u8]) -> u32 {
    ::crc32c::crc32c(data)
}

/// Fixed-size header preceding every payload in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// CRC-32C of the payload.
    pub checksum: u32,
    /// Payload length in bytes.
    pub payload_len: u32,
}

impl RecordHeader {
    /// Builds the header for `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordTooLarge`] if the payload length does not fit in 32 bits.
    pub fn for_payload(payload: &[u8]) -> Result<Self> {
        let payload_len =
            u32::try_from(payload.len()).map_err(|_| Error::RecordTooLarge(payload.len()))?;

        Ok(Self {
            checksum: crc32c(payload),
            payload_len,
        })
    }

    /// Serializes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; RECORD_HEADER_LEN] {
        let mut buf = [0u8; RECORD_HEADER_LEN];
        buf[0..4].copy_from_slice(&self.checksum.to_le_bytes());
        buf[4..8].copy_from_slice(&self.payload_len.to_le_bytes());
        buf
    }

    /// Deserializes a header. No validation is performed.
    #[must_use]
    pub fn decode(buf: &[u8; RECORD_HEADER_LEN]) -> Self {
        Self {
            checksum: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            payload_len: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        }
    }

    /// Total on-disk size of the record this header describes.
    #[must_use]
    pub const fn record_len(&self) -> u64 {
        RECORD_HEADER_LEN as u64 + self.payload_len as u64
    }

    /// Returns true if `payload` matches the stored length and checksum.
    #[must_use]
    pub fn verify(&self, payload: &[u8]) -> bool {
        payload.len() == self.payload_len as usize && crc32c(payload) == self.checksum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32c_check_value() {
        assert_eq!(crc32c(b"123456789"), 0xE306_9283);
        assert_eq!(crc32c(b""), 0);
    }

    #[test]
    fn test_crc32c_iscsi_vectors() {
        assert_eq!(crc32c(&[0u8; 32]), 0x8A91_36AA);
        assert_eq!(crc32c(&[0xFFu8; 32]), 0x62A8_AB43);

        let ascending: Vec<u8> = (0u8..32).collect();
        assert_eq!(crc32c(&ascending), 0x46DD_794E);
    }

    #[test]
    fn test_header_layout_is_little_endian() {
        let header = RecordHeader {
            checksum: 0x0403_0201,
            payload_len: 0x0807_0605,
        };

        assert_eq!(header.encode(), [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(RecordHeader::decode(&header.encode()), header);
    }

    #[test]
    fn test_header_for_payload() {
        let header = RecordHeader::for_payload(b"hello").unwrap();

        assert_eq!(header.payload_len, 5);
        assert_eq!(header.checksum, crc32c(b"hello"));
        assert_eq!(header.record_len(), 13);
        assert!(header.verify(b"hello"));
        assert!(!header.verify(b"hellO"));
        assert!(!header.verify(b"hell"));
    }

    #[test]
    fn test_empty_payload() {
        let header = RecordHeader::for_payload(b"").unwrap();

        assert_eq!(header.encode(), [0u8; RECORD_HEADER_LEN]);
        assert_eq!(header.record_len(), RECORD_HEADER_LEN as u64);
        assert!(header.verify(b""));
    }
}
