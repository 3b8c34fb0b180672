use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use drm_session::{AccessTokenCache, LicenseClient, LicenseScheme, ReqwestTransport};

/**
    Send a license challenge to a license server.

    With `--content-metadata` the challenge is wrapped in the vendor JSON
    envelope and an access token is attached unless the config asks for
    anonymous requests.
*/
#[derive(Args)]
pub struct LicenseCommand {
    /// License server URL.
    #[arg(short, long)]
    url: String,

    /// File holding the raw license challenge.
    #[arg(short, long)]
    challenge: PathBuf,

    /// Content metadata file; selects the vendor scheme.
    #[arg(short = 'm', long)]
    content_metadata: Option<PathBuf>,

    /// Session config JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the license here instead of printing it as base64.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl LicenseCommand {
    pub fn run(self) -> Result<()> {
        let config = super::load_config(self.config.as_deref())?;
        let transport = Arc::new(ReqwestTransport::new(&config).context("failed to build HTTP client")?);

        let challenge = std::fs::read(&self.challenge)
            .with_context(|| format!("failed to read {}", self.challenge.display()))?;
        eprintln!("Loaded challenge ({} bytes)", challenge.len());

        let content_metadata = match &self.content_metadata {
            Some(path) => Some(
                std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?,
            ),
            None => None,
        };

        let access_token = match &content_metadata {
            Some(_) if !config.anonymous_license_request => {
                let cache = AccessTokenCache::new(config.access_token_url.clone());
                let token = cache
                    .get_or_fetch(transport.as_ref())
                    .context("failed to get access token")?;
                info!(url = cache.url(), "attached access token");
                Some(token)
            }
            _ => None,
        };

        let scheme = match &content_metadata {
            Some(metadata) => LicenseScheme::Vendor {
                content_metadata: metadata,
                access_token: access_token.as_ref(),
            },
            None => LicenseScheme::Generic,
        };

        let client = LicenseClient::new(transport, &config);
        eprintln!("Sending challenge to {}", self.url);
        let license = client
            .acquire(&challenge, &self.url, scheme)
            .context("license request failed")?;
        eprintln!("Received license ({} bytes)", license.len());

        match &self.output {
            Some(path) => std::fs::write(path, &license)
                .with_context(|| format!("failed to write {}", path.display()))?,
            None => println!("{}", data_encoding::BASE64.encode(&license)),
        }

        Ok(())
    }
}
