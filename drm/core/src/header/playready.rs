use crate::error::HeaderError;
use crate::header::ProtectionHeaderParser;
use crate::types::{KeyId, ProtectionSystemId};
use crate::utils::{between, find_subslice, strip_nul, trim_ascii};

const KID_START: &[u8] = b"<KID>";
const KID_END: &[u8] = b"</KID>";
const KID_ATTR_START: &[u8] = b"<KID ";
const KID_VALUE_ATTR: &[u8] = b"VALUE=\"";

const METADATA_START: &[u8] = b"<ckm:policy xmlns:ckm=\"urn:ccp:ckm\">";
const METADATA_END: &[u8] = b"</ckm:policy>";

/**
    PlayReady (and DRM-agnostic) header parser.

    The PlayReady Header Object embeds a UTF-16LE WRM header. NUL bytes are
    dropped before searching, which turns the ASCII subset of that XML into
    plain bytes without decoding the record structure around it.

    The KID is accepted both as element text (`<KID>...</KID>`, WRM 4.0) and
    as a `VALUE` attribute (`<KID ... VALUE="..."/>`, WRM 4.1+). It is a
    base64 little-endian GUID; the resulting key identity is the 36-character
    lowercase GUID string.
*/
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayReadyHeaderParser;

impl ProtectionHeaderParser for PlayReadyHeaderParser {
    fn system(&self) -> ProtectionSystemId {
        ProtectionSystemId::PlayReady
    }

    fn extract_key_ids(&self, header: &[u8]) -> Result<Vec<KeyId>, HeaderError> {
        let cleaned = strip_nul(header);
        let encoded = find_kid(&cleaned)?;
        let raw = data_encoding::BASE64
            .decode(trim_ascii(encoded))
            .map_err(|e| HeaderError::InvalidBase64(format!("KID: {e}")))?;
        let raw: [u8; 16] = raw
            .as_slice()
            .try_into()
            .map_err(|_| HeaderError::InvalidKeyIdLength(raw.len()))?;
        Ok(vec![KeyId::new(kid_to_guid(&raw))])
    }

    fn extract_content_metadata(&self, header: &[u8]) -> Option<Vec<u8>> {
        let cleaned = strip_nul(header);
        between(&cleaned, METADATA_START, METADATA_END).map(<[u8]>::to_vec)
    }
}

fn find_kid(cleaned: &[u8]) -> Result<&[u8], HeaderError> {
    if let Some(kid) = between(cleaned, KID_START, KID_END) {
        return Ok(kid);
    }

    let element = find_subslice(cleaned, KID_ATTR_START, 0)
        .ok_or(HeaderError::MissingDelimiter("<KID>"))?;
    let value = find_subslice(cleaned, KID_VALUE_ATTR, element)
        .ok_or(HeaderError::MissingDelimiter("VALUE=\""))?
        + KID_VALUE_ATTR.len();
    let end = find_subslice(cleaned, b"\"", value).ok_or(HeaderError::MissingDelimiter("\""))?;
    Ok(&cleaned[value..end])
}

/**
    Render a little-endian PlayReady KID as a canonical lowercase GUID string.

    The first three GUID fields are stored little-endian, so bytes 0..4,
    4..6 and 6..8 are reversed before formatting.
*/
pub fn kid_to_guid(kid: &[u8; 16]) -> String {
    uuid::Uuid::from_bytes_le(*kid).hyphenated().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pssh::PsshBox;
    use hex_literal::hex;

    const RAW_KID: [u8; 16] = hex!("00112233445566778899aabbccddeeff");
    const GUID: &str = "33221100-5544-7766-8899-aabbccddeeff";

    fn utf16(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    fn header(xml: &str) -> Vec<u8> {
        PsshBox::v0(ProtectionSystemId::PlayReady, utf16(xml)).to_bytes()
    }

    fn encoded_kid() -> String {
        data_encoding::BASE64.encode(&RAW_KID)
    }

    #[test]
    fn guid_byte_order() {
        assert_eq!(kid_to_guid(&RAW_KID), GUID);
    }

    #[test]
    fn kid_element_text() {
        let xml = format!(
            "<WRMHEADER version=\"4.0.0.0\"><DATA><KID>{}</KID></DATA></WRMHEADER>",
            encoded_kid()
        );
        let ids = PlayReadyHeaderParser.extract_key_ids(&header(&xml)).unwrap();
        assert_eq!(ids, vec![KeyId::new(GUID.as_bytes().to_vec())]);
        assert_eq!(ids[0].len(), 36);
    }

    #[test]
    fn kid_value_attribute() {
        let xml = format!(
            "<WRMHEADER version=\"4.2.0.0\"><DATA><PROTECTINFO><KIDS><KID ALGID=\"AESCTR\" VALUE=\"{}\"></KID></KIDS></PROTECTINFO></DATA></WRMHEADER>",
            encoded_kid()
        );
        let ids = PlayReadyHeaderParser.extract_key_ids(&header(&xml)).unwrap();
        assert_eq!(ids[0].to_string(), GUID);
    }

    #[test]
    fn missing_kid() {
        let err = PlayReadyHeaderParser
            .extract_key_ids(&header("<WRMHEADER><DATA></DATA></WRMHEADER>"))
            .unwrap_err();
        assert!(matches!(err, HeaderError::MissingDelimiter(_)));
    }

    #[test]
    fn wrong_kid_length() {
        let short = data_encoding::BASE64.encode(&RAW_KID[..8]);
        let err = PlayReadyHeaderParser
            .extract_key_ids(&header(&format!("<KID>{short}</KID>")))
            .unwrap_err();
        assert_eq!(err, HeaderError::InvalidKeyIdLength(8));
    }

    #[test]
    fn invalid_base64_kid() {
        let err = PlayReadyHeaderParser
            .extract_key_ids(&header("<KID>not base64!</KID>"))
            .unwrap_err();
        assert!(matches!(err, HeaderError::InvalidBase64(_)));
    }

    #[test]
    fn content_metadata_block() {
        let xml = format!(
            "<WRMHEADER><DATA><KID>{}</KID><CUSTOMATTRIBUTES><ckm:policy xmlns:ckm=\"urn:ccp:ckm\">eyJ4NXQjUzI1NiI6</ckm:policy></CUSTOMATTRIBUTES></DATA></WRMHEADER>",
            encoded_kid()
        );
        let metadata = PlayReadyHeaderParser.extract_content_metadata(&header(&xml));
        assert_eq!(metadata.as_deref(), Some(&b"eyJ4NXQjUzI1NiI6"[..]));
    }

    #[test]
    fn no_content_metadata() {
        let xml = format!("<KID>{}</KID>", encoded_kid());
        assert_eq!(PlayReadyHeaderParser.extract_content_metadata(&header(&xml)), None);
    }
}
