use thiserror::Error;

/**
    Errors from PSSH box framing.
*/
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PsshError {
    #[error("invalid base64: {0}")]
    InvalidBase64(String),

    #[error("malformed PSSH box: {0}")]
    Malformed(String),
}

/**
    Errors from extracting key identities out of a protection header.

    Parsers never read past the end of the header; every bounds violation
    surfaces as one of these variants.
*/
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("protection header truncated reading {field} (need {need} bytes at offset {offset}, have {len})")]
    Truncated {
        field: &'static str,
        offset: usize,
        need: usize,
        len: usize,
    },

    #[error("malformed protection header: {0}")]
    Malformed(String),

    #[error("unsupported PSSH version {0}")]
    UnsupportedVersion(u8),

    #[error("key id is {0} bytes, expected 16")]
    InvalidKeyIdLength(usize),

    #[error("invalid base64 key id: {0}")]
    InvalidBase64(String),

    #[error("delimiter {0:?} not found in protection header")]
    MissingDelimiter(&'static str),

    #[error(transparent)]
    Pssh(#[from] PsshError),
}

/**
    Error returned by `FromStr` implementations on enum types.
*/
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
}
