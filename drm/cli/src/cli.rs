use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::{InspectPsshCommand, LicenseCommand, TokenCommand};

/**
    DRM session tooling: protection headers, license requests and access
    tokens.
*/
#[derive(Parser)]
#[command(name = "drm-cli")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect a PSSH box or protection header.
    InspectPssh(InspectPsshCommand),
    /// Send a license challenge to a license server.
    License(LicenseCommand),
    /// Fetch an access token from the auth service.
    Token(TokenCommand),
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Command::InspectPssh(cmd) => cmd.run(),
            Command::License(cmd) => cmd.run(),
            Command::Token(cmd) => cmd.run(),
        }
    }
}
