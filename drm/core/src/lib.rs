#![allow(clippy::doc_overindented_list_items)]

mod constants;
mod error;
mod pssh;
mod types;

pub mod header;
pub mod utils;

pub use self::constants::{
    CLEARKEY_KEY_SYSTEM, CLEARKEY_SYSTEM_ID, PLAYREADY_KEY_SYSTEM, PLAYREADY_SYSTEM_ID,
    WIDEVINE_KEY_SYSTEM, WIDEVINE_SYSTEM_ID,
};
pub use self::error::{HeaderError, ParseError, PsshError};
pub use self::header::{ProtectionHeaderParser, agnostic_content_metadata, parser_for};
pub use self::pssh::PsshBox;
pub use self::types::{KeyId, ProtectionSystemId};
