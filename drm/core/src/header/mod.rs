/*!
    Protection-header parsing.

    Each DRM system gets one stateless [`ProtectionHeaderParser`]. The input
    is the full protection header as handed over by the container parser
    (for PSSH-based systems that is the whole ISOBMFF `pssh` box).

    Parsers validate every offset before reading and report violations as
    [`HeaderError`]; they never panic on malformed input.
*/

mod clearkey;
mod playready;
mod widevine;

pub use self::clearkey::ClearKeyHeaderParser;
pub use self::playready::{PlayReadyHeaderParser, kid_to_guid};
pub use self::widevine::WidevineHeaderParser;

use crate::error::HeaderError;
use crate::pssh::read_u32_be;
use crate::types::{KeyId, ProtectionSystemId};

/**
    Extraction of key identities from a system-specific protection header.
*/
pub trait ProtectionHeaderParser: Send + Sync {
    /**
        The DRM system this parser understands.
    */
    fn system(&self) -> ProtectionSystemId;

    /**
        Extract every key identity the header carries.

        An empty vector is not an error here; callers that need an identity
        decide how to treat its absence.
    */
    fn extract_key_ids(&self, header: &[u8]) -> Result<Vec<KeyId>, HeaderError>;

    /**
        Content metadata embedded in the header, if this system carries any.
    */
    fn extract_content_metadata(&self, _header: &[u8]) -> Option<Vec<u8>> {
        None
    }
}

static WIDEVINE: WidevineHeaderParser = WidevineHeaderParser;
static PLAYREADY: PlayReadyHeaderParser = PlayReadyHeaderParser;
static CLEARKEY: ClearKeyHeaderParser = ClearKeyHeaderParser;

/**
    The parser registered for `system`.
*/
pub fn parser_for(system: ProtectionSystemId) -> &'static dyn ProtectionHeaderParser {
    match system {
        ProtectionSystemId::Widevine => &WIDEVINE,
        ProtectionSystemId::PlayReady => &PLAYREADY,
        ProtectionSystemId::ClearKey => &CLEARKEY,
    }
}

/// Offset of the payload size field in a DRM-agnostic header.
const AGNOSTIC_SIZE_OFFSET: usize = 28;

/**
    Length-prefixed payload of a DRM-agnostic header.

    The agnostic header shares the PSSH box framing; its payload (a u32
    big-endian size at offset 28 followed by that many bytes) is the content
    metadata blob itself.
*/
pub fn agnostic_content_metadata(header: &[u8]) -> Result<Vec<u8>, HeaderError> {
    ensure_len(header, AGNOSTIC_SIZE_OFFSET, 4, "metadata size")?;
    let size = read_u32_be(header, AGNOSTIC_SIZE_OFFSET) as usize;
    let start = AGNOSTIC_SIZE_OFFSET + 4;
    ensure_len(header, start, size, "metadata")?;
    Ok(header[start..start + size].to_vec())
}

pub(crate) fn ensure_len(
    data: &[u8],
    offset: usize,
    need: usize,
    field: &'static str,
) -> Result<(), HeaderError> {
    match offset.checked_add(need) {
        Some(end) if end <= data.len() => Ok(()),
        _ => Err(HeaderError::Truncated {
            field,
            offset,
            need,
            len: data.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pssh::PsshBox;

    #[test]
    fn parser_for_matches_system() {
        for system in [
            ProtectionSystemId::Widevine,
            ProtectionSystemId::PlayReady,
            ProtectionSystemId::ClearKey,
        ] {
            assert_eq!(parser_for(system).system(), system);
        }
    }

    #[test]
    fn agnostic_metadata_reads_payload() {
        let header = PsshBox::v0(ProtectionSystemId::PlayReady, b"policy-blob".to_vec()).to_bytes();
        assert_eq!(agnostic_content_metadata(&header).unwrap(), b"policy-blob");
    }

    #[test]
    fn agnostic_metadata_rejects_oversized_length() {
        let mut header = PsshBox::v0(ProtectionSystemId::PlayReady, b"abc".to_vec()).to_bytes();
        header[28..32].copy_from_slice(&1000u32.to_be_bytes());
        let err = agnostic_content_metadata(&header).unwrap_err();
        assert!(matches!(err, HeaderError::Truncated { field: "metadata", .. }));
        assert!(matches!(
            agnostic_content_metadata(&[0; 20]),
            Err(HeaderError::Truncated { .. })
        ));
    }
}
