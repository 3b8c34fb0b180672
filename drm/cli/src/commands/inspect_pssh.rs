use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use drm_core::{ProtectionSystemId, PsshBox};

/**
    Inspect a PSSH box or protection header.
*/
#[derive(Args)]
pub struct InspectPsshCommand {
    /// Base64-encoded PSSH box.
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    pub base64: Option<String>,

    /// Read the raw header from a file instead.
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /**
        Protection system (UUID or key-system string). Defaults to the
        system id in the box header.
    */
    #[arg(short, long)]
    pub system: Option<ProtectionSystemId>,

    /// Also read the header as a DRM-agnostic content metadata blob.
    #[arg(long)]
    pub agnostic: bool,
}

impl InspectPsshCommand {
    pub fn run(self) -> Result<()> {
        let header = match (&self.base64, &self.file) {
            (_, Some(path)) => std::fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))?,
            (Some(encoded), None) => data_encoding::BASE64
                .decode(encoded.trim().as_bytes())
                .context("failed to decode base64 header")?,
            (None, None) => anyhow::bail!("no header given"),
        };

        let pssh = PsshBox::from_bytes(&header).ok();
        if let Some(pssh) = &pssh {
            println!("Version:    {}", pssh.version);
            println!("System ID:  {}", hex::encode(pssh.system_id));
            println!("Data Size:  {} bytes", pssh.data.len());
            if !pssh.key_ids.is_empty() {
                println!();
                println!("Box Key IDs ({}):", pssh.key_ids.len());
                for kid in &pssh.key_ids {
                    println!("  {}", hex::encode(kid));
                }
            }
        }

        let system = self
            .system
            .or_else(|| pssh.as_ref().and_then(PsshBox::system))
            .context("unknown protection system, pass --system")?;
        println!("System:     {system}");

        let parser = drm_core::parser_for(system);
        let key_ids = parser
            .extract_key_ids(&header)
            .context("failed to extract key ids")?;
        println!();
        println!("Key IDs ({}):", key_ids.len());
        for kid in &key_ids {
            println!("  {kid}");
        }

        if let Some(metadata) = parser.extract_content_metadata(&header) {
            println!();
            println!("Content Metadata ({} bytes):", metadata.len());
            println!("  {}", String::from_utf8_lossy(&metadata));
        }

        if self.agnostic {
            let metadata = drm_core::agnostic_content_metadata(&header)
                .context("failed to read agnostic content metadata")?;
            println!();
            println!("Agnostic Metadata ({} bytes):", metadata.len());
            println!("  {}", data_encoding::BASE64.encode(&metadata));
        }

        Ok(())
    }
}
