mod inspect_pssh;
mod license;
mod token;

use std::path::Path;

use anyhow::{Context, Result};

use drm_session::SessionConfig;

pub use self::inspect_pssh::InspectPsshCommand;
pub use self::license::LicenseCommand;
pub use self::token::TokenCommand;

/**
    Config from `path`, or the defaults.
*/
fn load_config(path: Option<&Path>) -> Result<SessionConfig> {
    match path {
        Some(path) => SessionConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(SessionConfig::default()),
    }
}
