//! Reading key encoding.
//!
//! Key format: `[device_id bytes][0xFF][observed_ms (8 bytes)][id (8 bytes)]`
//!
//! `0xFF` never occurs in UTF-8, so a device prefix cannot match a longer
//! device id. Timestamps are signed; flipping the sign bit before the
//! big-endian encoding keeps byte order equal to numeric order.

/// Separator between the device id and the fixed-width suffix.
const SEPARATOR: u8 = 0xFF;

/// Size of the fixed-width suffix.
const SUFFIX_SIZE: usize = 16;

/// Key of one stored reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingKey {
    pub device_id: String,
    pub observed_ms: i64,
    pub id: u64,
}

impl ReadingKey {
    pub fn new(device_id: impl Into<String>, observed_ms: i64, id: u64) -> Self {
        Self {
            device_id: device_id.into(),
            observed_ms,
            id,
        }
    }

    /// Encode the key to bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Self::prefix(&self.device_id);
        buf.extend_from_slice(&encode_ts(self.observed_ms));
        buf.extend_from_slice(&self.id.to_be_bytes());
        buf
    }

    /// Decode a key from bytes.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < SUFFIX_SIZE + 1 {
            return None;
        }
        let split = bytes.len() - SUFFIX_SIZE;
        if bytes[split - 1] != SEPARATOR {
            return None;
        }

        let device_id = std::str::from_utf8(&bytes[..split - 1]).ok()?.to_string();
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&bytes[split..split + 8]);
        let mut id = [0u8; 8];
        id.copy_from_slice(&bytes[split + 8..]);

        Some(Self {
            device_id,
            observed_ms: decode_ts(ts),
            id: u64::from_be_bytes(id),
        })
    }

    /// Prefix shared by every key of a device.
    pub fn prefix(device_id: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(device_id.len() + 1 + SUFFIX_SIZE);
        buf.extend_from_slice(device_id.as_bytes());
        buf.push(SEPARATOR);
        buf
    }

    /// Smallest key of a device at or after `observed_ms`.
    pub fn lower_bound(device_id: &str, observed_ms: i64) -> Vec<u8> {
        Self::new(device_id, observed_ms, 0).encode()
    }

    /// Largest key of a device at or before `observed_ms`.
    pub fn upper_bound(device_id: &str, observed_ms: i64) -> Vec<u8> {
        Self::new(device_id, observed_ms, u64::MAX).encode()
    }
}

fn encode_ts(ts: i64) -> [u8; 8] {
    ((ts as u64) ^ (1 << 63)).to_be_bytes()
}

fn decode_ts(bytes: [u8; 8]) -> i64 {
    (u64::from_be_bytes(bytes) ^ (1 << 63)) as i64
}
