use core::fmt;
use core::str::FromStr;

use crate::constants::{
    CLEARKEY_KEY_SYSTEM, CLEARKEY_SYSTEM_ID, PLAYREADY_KEY_SYSTEM, PLAYREADY_SYSTEM_ID,
    WIDEVINE_KEY_SYSTEM, WIDEVINE_SYSTEM_ID,
};
use crate::error::ParseError;
use crate::utils::{bytes_equal, eq_ignore_ascii_case, hex_digit, trim_ascii};

/**
    DRM content protection system handled by the session manager.

    Recognizes systems by their DASH-IF registered UUIDs and by their EME
    key-system strings.

    Reference: <https://dashif.org/identifiers/content_protection/>
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtectionSystemId {
    PlayReady,
    Widevine,
    ClearKey,
}

impl ProtectionSystemId {
    /**
        Identify a DRM system from its 16-byte UUID.
    */
    pub const fn from_bytes(bytes: &[u8; 16]) -> Option<Self> {
        if bytes_equal(bytes, &WIDEVINE_SYSTEM_ID) {
            Some(Self::Widevine)
        } else if bytes_equal(bytes, &PLAYREADY_SYSTEM_ID) {
            Some(Self::PlayReady)
        } else if bytes_equal(bytes, &CLEARKEY_SYSTEM_ID) {
            Some(Self::ClearKey)
        } else {
            None
        }
    }

    /**
        Return the raw 16-byte UUID for this system.
    */
    pub const fn to_bytes(self) -> [u8; 16] {
        match self {
            Self::Widevine => WIDEVINE_SYSTEM_ID,
            Self::PlayReady => PLAYREADY_SYSTEM_ID,
            Self::ClearKey => CLEARKEY_SYSTEM_ID,
        }
    }

    /**
        Human-readable name for this system.
    */
    pub const fn to_name(self) -> &'static str {
        match self {
            Self::Widevine => "Widevine",
            Self::PlayReady => "PlayReady",
            Self::ClearKey => "ClearKey",
        }
    }

    /**
        EME key-system string for this system.
    */
    pub const fn key_system(self) -> &'static str {
        match self {
            Self::Widevine => WIDEVINE_KEY_SYSTEM,
            Self::PlayReady => PLAYREADY_KEY_SYSTEM,
            Self::ClearKey => CLEARKEY_KEY_SYSTEM,
        }
    }

    /**
        Parse a UUID string into a `ProtectionSystemId`.

        Accepts both hyphenated (`edef8ba9-79d6-4ace-a3c8-27dcd51d21ed`) and
        plain (`edef8ba979d64acea3c827dcd51d21ed`) formats. Hex digits are
        case-insensitive. An optional `urn:uuid:` prefix is ignored.
    */
    pub const fn from_uuid(s: &[u8]) -> Option<Self> {
        let s = trim_ascii(s);
        let s = if s.len() > 9 && eq_ignore_ascii_case(s.split_at(9).0, b"urn:uuid:") {
            s.split_at(9).1
        } else {
            s
        };

        let mut bytes = [0u8; 16];
        let mut bi = 0;
        let mut si = 0;

        while si < s.len() {
            if s[si] == b'-' {
                si += 1;
                continue;
            }
            if bi >= 16 || si + 1 >= s.len() {
                return None;
            }
            let hi = match hex_digit(s[si]) {
                Some(v) => v,
                None => return None,
            };
            let lo = match hex_digit(s[si + 1]) {
                Some(v) => v,
                None => return None,
            };
            bytes[bi] = (hi << 4) | lo;
            bi += 1;
            si += 2;
        }

        if bi != 16 {
            return None;
        }

        Self::from_bytes(&bytes)
    }

    /**
        Identify a DRM system from an EME key-system string
        (`com.widevine.alpha`, `com.microsoft.playready`, `org.w3.clearkey`).

        Vendor suffixes such as `com.microsoft.playready.recommendation` are
        accepted.
    */
    pub fn from_key_system(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        [Self::Widevine, Self::PlayReady, Self::ClearKey]
            .into_iter()
            .find(|id| s == id.key_system() || s.starts_with(&format!("{}.", id.key_system())))
    }

    /**
        Format as a standard UUID string (`xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`).
    */
    pub fn to_uuid(self) -> String {
        uuid::Uuid::from_bytes(self.to_bytes()).hyphenated().to_string()
    }
}

impl fmt::Display for ProtectionSystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.to_name(), self.to_uuid())
    }
}

/**
    Parse either a system UUID or a key-system string.
*/
impl FromStr for ProtectionSystemId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_uuid(s.as_bytes())
            .or_else(|| Self::from_key_system(s))
            .ok_or_else(|| ParseError {
                kind: "protection system",
                value: s.to_owned(),
            })
    }
}

/**
    Opaque identity of a content decryption key.

    Two key ids are equal iff their bytes are identical. Widevine key ids are
    raw bytes; PlayReady key ids are the 36-character lowercase GUID string.
*/
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct KeyId(Vec<u8>);

impl KeyId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /**
        Key ID as a lowercase hex string.
    */
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    fn is_printable(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|b| b.is_ascii_graphic())
    }
}

impl From<[u8; 16]> for KeyId {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes.to_vec())
    }
}

impl AsRef<[u8]> for KeyId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/**
    Printable key ids (PlayReady GUID strings) are shown as text, anything
    else as hex.
*/
impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_printable() {
            f.write_str(&String::from_utf8_lossy(&self.0))
        } else {
            f.write_str(&self.to_hex())
        }
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn system_id_from_known_bytes() {
        assert_eq!(
            ProtectionSystemId::from_bytes(&WIDEVINE_SYSTEM_ID),
            Some(ProtectionSystemId::Widevine)
        );
        assert_eq!(
            ProtectionSystemId::from_bytes(&PLAYREADY_SYSTEM_ID),
            Some(ProtectionSystemId::PlayReady)
        );
        assert_eq!(
            ProtectionSystemId::from_bytes(&CLEARKEY_SYSTEM_ID),
            Some(ProtectionSystemId::ClearKey)
        );
        assert_eq!(ProtectionSystemId::from_bytes(&[0; 16]), None);
    }

    #[test]
    fn system_id_from_uuid_forms() {
        assert_eq!(
            ProtectionSystemId::from_uuid(b"edef8ba9-79d6-4ace-a3c8-27dcd51d21ed"),
            Some(ProtectionSystemId::Widevine)
        );
        assert_eq!(
            ProtectionSystemId::from_uuid(b"9A04F07998404286AB92E65BE0885F95"),
            Some(ProtectionSystemId::PlayReady)
        );
        assert_eq!(
            ProtectionSystemId::from_uuid(b"urn:uuid:1077efec-c0b2-4d02-ace3-3c1e52e2fb4b"),
            Some(ProtectionSystemId::ClearKey)
        );
    }

    #[test]
    fn system_id_from_uuid_invalid() {
        assert_eq!(ProtectionSystemId::from_uuid(b""), None);
        assert_eq!(ProtectionSystemId::from_uuid(b"not-a-uuid"), None);
        assert_eq!(
            ProtectionSystemId::from_uuid(b"edef8ba9-79d6-4ace-a3c8-27dcd51d21"),
            None
        );
        assert_eq!(
            ProtectionSystemId::from_uuid(b"edef8ba9-79d6-4ace-a3c8-27dcd51d21edff"),
            None
        );
        // Well-formed but unregistered
        assert_eq!(
            ProtectionSystemId::from_uuid(b"00112233-4455-6677-8899-aabbccddeeff"),
            None
        );
    }

    #[test]
    fn system_id_from_key_system() {
        assert_eq!(
            ProtectionSystemId::from_key_system("com.widevine.alpha"),
            Some(ProtectionSystemId::Widevine)
        );
        assert_eq!(
            ProtectionSystemId::from_key_system("com.microsoft.playready.recommendation"),
            Some(ProtectionSystemId::PlayReady)
        );
        assert_eq!(
            ProtectionSystemId::from_key_system(" org.w3.clearkey "),
            Some(ProtectionSystemId::ClearKey)
        );
        assert_eq!(ProtectionSystemId::from_key_system("com.widevine.alphabet"), None);
    }

    #[test]
    fn system_id_from_str_accepts_both_forms() {
        let a: ProtectionSystemId = "edef8ba9-79d6-4ace-a3c8-27dcd51d21ed".parse().unwrap();
        let b: ProtectionSystemId = "com.widevine.alpha".parse().unwrap();
        assert_eq!(a, b);
        let err = "com.apple.fps".parse::<ProtectionSystemId>().unwrap_err();
        assert_eq!(err.kind, "protection system");
    }

    #[test]
    fn system_id_uuid_round_trip() {
        for id in [
            ProtectionSystemId::Widevine,
            ProtectionSystemId::PlayReady,
            ProtectionSystemId::ClearKey,
        ] {
            assert_eq!(ProtectionSystemId::from_uuid(id.to_uuid().as_bytes()), Some(id));
        }
        assert_eq!(
            format!("{}", ProtectionSystemId::PlayReady),
            "PlayReady (9a04f079-9840-4286-ab92-e65be0885f95)"
        );
    }

    #[test]
    fn key_id_equality_is_bytewise() {
        let a = KeyId::from(hex!("00000000000000000000000000000001"));
        let b = KeyId::new(hex!("00000000000000000000000000000001").to_vec());
        let c = KeyId::from(hex!("00000000000000000000000000000002"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn key_id_display() {
        let raw = KeyId::from(hex!("000102030405060708090a0b0c0d0e0f"));
        assert_eq!(raw.to_string(), "000102030405060708090a0b0c0d0e0f");
        let guid = KeyId::new(b"10000000-1000-1000-1000-100000000001".to_vec());
        assert_eq!(guid.to_string(), "10000000-1000-1000-1000-100000000001");
    }
}
