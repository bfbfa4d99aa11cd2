//! # Digest Subcommand
//!
//! Computes the content digest of a local file without touching the network.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use xpan_core::{ContentDigest, DigestEngine, UploadTarget};

/// Arguments for the `xpan digest` subcommand.
#[derive(Args, Debug)]
pub struct DigestArgs {
    /// Local file to digest.
    pub file: PathBuf,
}

/// Execute the digest subcommand.
pub fn run_digest(args: &DigestArgs) -> Result<u8> {
    let digest = digest_file(&args.file)?;
    let rendered = serde_json::to_string_pretty(&digest).context("failed to render digest")?;
    println!("{rendered}");
    Ok(0)
}

/// Digest `path` with the protocol block size.
///
/// Only the hashes are kept; the file content is never buffered.
pub fn digest_file(path: &Path) -> Result<ContentDigest> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let len = file
        .metadata()
        .with_context(|| format!("cannot stat {}", path.display()))?
        .len();
    let target = UploadTarget::new(path.display().to_string(), len as i64)?;
    let digest = DigestEngine::new(0)
        .digest_only(&target, file)
        .with_context(|| format!("failed to digest {}", path.display()))?;
    Ok(digest)
}
