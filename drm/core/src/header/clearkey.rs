use crate::error::HeaderError;
use crate::header::ProtectionHeaderParser;
use crate::pssh::PsshBox;
use crate::types::{KeyId, ProtectionSystemId};

/**
    ClearKey (W3C common PSSH) parser.

    ClearKey boxes list their key ids in the version 1 box header and carry
    no payload of interest. A version 0 box has no key ids.
*/
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearKeyHeaderParser;

impl ProtectionHeaderParser for ClearKeyHeaderParser {
    fn system(&self) -> ProtectionSystemId {
        ProtectionSystemId::ClearKey
    }

    fn extract_key_ids(&self, header: &[u8]) -> Result<Vec<KeyId>, HeaderError> {
        let pssh = PsshBox::from_bytes(header)?;
        Ok(pssh.key_ids.into_iter().map(KeyId::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn key_ids_from_box_header() {
        let kid1 = hex!("1077efecc0b24d02ace33c1e52e2fb4b");
        let kid2 = hex!("00000000000000000000000000000002");
        let header = PsshBox::v1(ProtectionSystemId::ClearKey, vec![kid1, kid2], Vec::new()).to_bytes();
        let ids = ClearKeyHeaderParser.extract_key_ids(&header).unwrap();
        assert_eq!(ids, vec![KeyId::from(kid1), KeyId::from(kid2)]);
    }

    #[test]
    fn v0_box_has_no_key_ids() {
        let header = PsshBox::v0(ProtectionSystemId::ClearKey, Vec::new()).to_bytes();
        assert!(ClearKeyHeaderParser.extract_key_ids(&header).unwrap().is_empty());
    }

    #[test]
    fn malformed_box_is_error() {
        assert!(matches!(
            ClearKeyHeaderParser.extract_key_ids(&[0; 8]),
            Err(HeaderError::Pssh(_))
        ));
    }
}
