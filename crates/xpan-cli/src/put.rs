//! # Put Subcommand
//!
//! Uploads a local file. Configuration comes from `XPAN_*` environment
//! variables; Ctrl-C cancels the upload promptly.

use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use xpan_client::{CancelSource, XpanClient, XpanConfig};
use xpan_core::{CommittedFile, UploadTarget};

/// Arguments for the `xpan put` subcommand.
#[derive(Args, Debug)]
pub struct PutArgs {
    /// Local file to upload.
    pub file: PathBuf,

    /// Remote path, relative to `XPAN_ROOT`.
    pub remote: String,

    /// Replace an existing remote file instead of failing.
    #[arg(long)]
    pub overwrite: bool,

    /// Abandon the upload after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub deadline: Option<u64>,
}

/// Execute the put subcommand.
pub fn run_put(args: &PutArgs) -> Result<u8> {
    let config = XpanConfig::from_env().context("invalid configuration")?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let file = runtime.block_on(put_file(config, args))?;
    let rendered = serde_json::to_string_pretty(&file).context("failed to render result")?;
    println!("{rendered}");
    Ok(0)
}

/// Upload `args.file` to `args.remote` with an explicit configuration.
pub async fn put_file(config: XpanConfig, args: &PutArgs) -> Result<CommittedFile> {
    let client = XpanClient::new(config).context("failed to build client")?;

    let file = File::open(&args.file)
        .with_context(|| format!("cannot open {}", args.file.display()))?;
    let len = file
        .metadata()
        .with_context(|| format!("cannot stat {}", args.file.display()))?
        .len();
    let target = UploadTarget::new(args.remote.as_str(), len as i64)?.overwrite(args.overwrite);

    let source = CancelSource::new();
    let mut token = source.token();
    if let Some(secs) = args.deadline {
        token = token.with_deadline(tokio::time::Instant::now() + Duration::from_secs(secs));
    }
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling upload");
            source.cancel();
        }
    });

    tracing::info!(file = %args.file.display(), remote = %args.remote, size = len, "uploading");
    let result = client.upload(target, file, &token).await;
    interrupt.abort();

    result.with_context(|| format!("upload of {} failed", args.file.display()))
}
