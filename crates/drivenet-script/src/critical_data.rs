//! Sidechain critical data committed in OP_RETURN outputs.
//!
//! A critical-data record is a short payload plus the 32-byte critical
//! hash it commits to. When the payload starts with the BMM magic
//! `00 bf 00`, it also names a blind-merged-mining request.

use drivenet_primitives::util::{ByteReader, ByteWriter};

use crate::CriticalDataError;

/// Prefix marking a payload as a BMM request.
pub const BMM_REQUEST_PREFIX: [u8; 3] = [0x00, 0xbf, 0x00];

/// Minimum payload length: the prefix plus one request byte.
pub const MIN_PAYLOAD_LEN: usize = 4;

/// Length of the committed critical hash.
pub const HASH_CRITICAL_LEN: usize = 32;

/// A blind-merged-mining request decoded from a critical-data payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BmmRequest {
    pub sidechain_number: u8,
    pub prev_block_ref: u8,
}

/// Payload bytes and critical hash from a critical hash commitment.
///
/// Wire layout is `[len: u8][payload][hash: 32 bytes]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriticalData {
    bytes: Vec<u8>,
    hash_critical: [u8; HASH_CRITICAL_LEN],
}

impl CriticalData {
    /// Build a record, checking the payload and hash lengths.
    ///
    /// # Arguments
    /// * `bytes` - Payload of 4..=255 bytes.
    /// * `hash_critical` - Exactly 32 bytes.
    ///
    /// # Returns
    /// The record, or `CriticalDataError::Construction` naming the bad field.
    pub fn new(bytes: Vec<u8>, hash_critical: &[u8]) -> Result<Self, CriticalDataError> {
        let hash: [u8; HASH_CRITICAL_LEN] = hash_critical.try_into().map_err(|_| {
            CriticalDataError::Construction(format!(
                "critical hash must be {} bytes, got {}",
                HASH_CRITICAL_LEN,
                hash_critical.len()
            ))
        })?;
        if bytes.len() < MIN_PAYLOAD_LEN {
            return Err(CriticalDataError::Construction(format!(
                "payload must be at least {} bytes, got {}",
                MIN_PAYLOAD_LEN,
                bytes.len()
            )));
        }
        if bytes.len() > u8::MAX as usize {
            return Err(CriticalDataError::Construction(format!(
                "payload of {} bytes does not fit a one-byte length",
                bytes.len()
            )));
        }
        Ok(CriticalData { bytes, hash_critical: hash })
    }

    /// Read a record from the cursor.
    ///
    /// Running out of data is `CriticalDataError::Read`; a payload shorter
    /// than 4 bytes is `CriticalDataError::Construction`.
    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Self, CriticalDataError> {
        let len = reader.read_u8()? as usize;
        let bytes = reader.read_bytes(len)?.to_vec();
        let hash = reader.read_bytes(HASH_CRITICAL_LEN)?;
        CriticalData::new(bytes, hash)
    }

    /// Decode a record from the start of `data`. Trailing bytes are ignored.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CriticalDataError> {
        CriticalData::decode(&mut ByteReader::new(data))
    }

    /// Serialize the record.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(1 + self.bytes.len() + HASH_CRITICAL_LEN);
        self.write(&mut w);
        w.into_bytes()
    }

    /// Append the serialized record to a writer.
    pub fn write(&self, w: &mut ByteWriter) {
        w.write_u8(self.bytes.len() as u8);
        w.write_bytes(&self.bytes);
        w.write_bytes(&self.hash_critical);
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn hash_critical(&self) -> &[u8; HASH_CRITICAL_LEN] {
        &self.hash_critical
    }

    /// Interpret the payload as a BMM request.
    ///
    /// A 4-byte payload carries only the previous block reference; longer
    /// payloads carry the sidechain number followed by the reference.
    pub fn bmm_request(&self) -> Option<BmmRequest> {
        bmm_request_from_payload(&self.bytes)
    }
}

fn bmm_request_from_payload(p: &[u8]) -> Option<BmmRequest> {
    if p.len() < MIN_PAYLOAD_LEN || p[..3] != BMM_REQUEST_PREFIX {
        return None;
    }
    if p.len() == MIN_PAYLOAD_LEN {
        return Some(BmmRequest { sidechain_number: 0, prev_block_ref: p[3] });
    }
    Some(BmmRequest { sidechain_number: p[3], prev_block_ref: p[4] })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "4273f4fda0dee0a38edd067d5c7deea527e627e8b59f98595cee1545fcc38243";

    fn hash() -> Vec<u8> {
        hex::decode(HASH).unwrap()
    }

    #[test]
    fn test_bmm_request_with_sidechain() {
        let cd = CriticalData::new(hex::decode("00bf00010100").unwrap(), &hash()).unwrap();
        assert_eq!(
            cd.bmm_request(),
            Some(BmmRequest { sidechain_number: 1, prev_block_ref: 1 })
        );
    }

    #[test]
    fn test_bmm_request_four_bytes() {
        let cd = CriticalData::new(hex::decode("00bf0007").unwrap(), &hash()).unwrap();
        assert_eq!(
            cd.bmm_request(),
            Some(BmmRequest { sidechain_number: 0, prev_block_ref: 7 })
        );
    }

    #[test]
    fn test_bmm_request_wrong_magic() {
        let cd = CriticalData::new(hex::decode("01bf000101").unwrap(), &hash()).unwrap();
        assert_eq!(cd.bmm_request(), None);
        let cd = CriticalData::new(hex::decode("00be000101").unwrap(), &hash()).unwrap();
        assert_eq!(cd.bmm_request(), None);
    }

    #[test]
    fn test_round_trip() {
        let cd = CriticalData::new(hex::decode("00bf00010100").unwrap(), &hash()).unwrap();
        let raw = cd.encode();
        assert_eq!(raw.len(), 1 + 6 + 32);
        assert_eq!(raw[0], 6);
        assert_eq!(hex::encode(&raw[7..]), HASH);
        assert_eq!(CriticalData::from_bytes(&raw).unwrap(), cd);
    }

    #[test]
    fn test_decode_short_buffer() {
        let cd = CriticalData::new(hex::decode("00bf0001").unwrap(), &hash()).unwrap();
        let raw = cd.encode();
        for cut in 0..raw.len() {
            let err = CriticalData::from_bytes(&raw[..cut]).unwrap_err();
            assert!(matches!(err, CriticalDataError::Read(_)), "cut at {}", cut);
        }
    }

    #[test]
    fn test_decode_short_payload() {
        let mut raw = vec![0x02, 0x00, 0xbf];
        raw.extend_from_slice(&hash());
        let err = CriticalData::from_bytes(&raw).unwrap_err();
        assert!(matches!(err, CriticalDataError::Construction(_)));
    }

    #[test]
    fn test_new_rejects_bad_lengths() {
        assert!(matches!(
            CriticalData::new(vec![0, 0xbf, 0, 1], &[0u8; 31]),
            Err(CriticalDataError::Construction(_))
        ));
        assert!(matches!(
            CriticalData::new(vec![0, 0xbf, 0], &hash()),
            Err(CriticalDataError::Construction(_))
        ));
        assert!(matches!(
            CriticalData::new(vec![0u8; 256], &hash()),
            Err(CriticalDataError::Construction(_))
        ));
    }

    #[test]
    fn test_decode_from_cursor_leaves_tail() {
        let cd = CriticalData::new(hex::decode("00bf0001").unwrap(), &hash()).unwrap();
        let mut raw = cd.encode();
        raw.push(0xee);
        let mut reader = ByteReader::new(&raw);
        assert_eq!(CriticalData::decode(&mut reader).unwrap(), cd);
        assert_eq!(reader.read_u8().unwrap(), 0xee);
    }
}
