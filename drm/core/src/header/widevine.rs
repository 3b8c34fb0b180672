use prost::Message;

use crate::error::HeaderError;
use crate::header::{ProtectionHeaderParser, ensure_len};
use crate::pssh::read_u32_be;
use crate::types::{KeyId, ProtectionSystemId};

const VERSION_OFFSET: usize = 8;
/// v0: `data_size`; v1: `key_id_count`.
const COUNT_OFFSET: usize = 28;
/// v0: first WidevinePsshData record; v1: first header key id.
const PAYLOAD_OFFSET: usize = 32;
const V1_KEY_ID_SIZE: usize = 16;

/**
    The identity fields of the WidevinePsshData protobuf. Every other field
    (algorithm, provider, policy, ...) is skipped by the decoder.
*/
#[derive(Clone, PartialEq, prost::Message)]
struct WidevinePsshData {
    #[prost(bytes = "vec", repeated, tag = "2")]
    key_ids: Vec<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "4")]
    content_id: Option<Vec<u8>>,
}

/**
    Widevine PSSH parser.

    Version 0 boxes carry their identities inside the WidevinePsshData
    payload. Key ids are listed first, followed by the content id when
    present. Empty values are ignored.

    Version 1 boxes list key ids in the box header; only the first one is
    returned.
*/
#[derive(Debug, Clone, Copy, Default)]
pub struct WidevineHeaderParser;

impl ProtectionHeaderParser for WidevineHeaderParser {
    fn system(&self) -> ProtectionSystemId {
        ProtectionSystemId::Widevine
    }

    fn extract_key_ids(&self, header: &[u8]) -> Result<Vec<KeyId>, HeaderError> {
        ensure_len(header, VERSION_OFFSET, 1, "version")?;
        match header[VERSION_OFFSET] {
            0 => v0_key_ids(header),
            1 => v1_key_id(header),
            version => Err(HeaderError::UnsupportedVersion(version)),
        }
    }
}

fn v0_key_ids(header: &[u8]) -> Result<Vec<KeyId>, HeaderError> {
    ensure_len(header, COUNT_OFFSET, 4, "data_size")?;
    let data_size = read_u32_be(header, COUNT_OFFSET) as usize;
    ensure_len(header, PAYLOAD_OFFSET, data_size, "pssh data")?;

    let data = WidevinePsshData::decode(&header[PAYLOAD_OFFSET..PAYLOAD_OFFSET + data_size])
        .map_err(|e| HeaderError::Malformed(format!("WidevinePsshData: {e}")))?;

    Ok(data
        .key_ids
        .into_iter()
        .chain(data.content_id)
        .filter(|value| !value.is_empty())
        .map(KeyId::new)
        .collect())
}

fn v1_key_id(header: &[u8]) -> Result<Vec<KeyId>, HeaderError> {
    ensure_len(header, COUNT_OFFSET, 4, "key_id_count")?;
    if read_u32_be(header, COUNT_OFFSET) == 0 {
        return Ok(Vec::new());
    }
    // Only the first header key id is bound to a session.
    ensure_len(header, PAYLOAD_OFFSET, V1_KEY_ID_SIZE, "key_id")?;
    Ok(vec![KeyId::new(
        &header[PAYLOAD_OFFSET..PAYLOAD_OFFSET + V1_KEY_ID_SIZE],
    )])
}
