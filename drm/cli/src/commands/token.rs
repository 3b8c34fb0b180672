use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use drm_session::{AccessTokenCache, ReqwestTransport};

/**
    Fetch an access token from the auth service and print it.
*/
#[derive(Args)]
pub struct TokenCommand {
    /// Auth service URL; defaults to the configured one.
    #[arg(short, long)]
    url: Option<String>,

    /// Session config JSON.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl TokenCommand {
    pub fn run(self) -> Result<()> {
        let config = super::load_config(self.config.as_deref())?;
        let transport = ReqwestTransport::new(&config).context("failed to build HTTP client")?;

        let url = self.url.unwrap_or_else(|| config.access_token_url.clone());
        let cache = AccessTokenCache::new(url);
        eprintln!("Requesting token from {}", cache.url());
        let token = cache
            .get_or_fetch(&transport)
            .context("failed to get access token")?;

        eprintln!("Received token ({} bytes)", token.len());
        println!("{}", token.as_str());
        Ok(())
    }
}
