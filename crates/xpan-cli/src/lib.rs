//! # xpan-cli: Command-Line Uploader
//!
//! ## Subcommands
//!
//! - `put`: upload a local file and print the committed file record
//! - `digest`: print the digest set precreate would declare, offline
//!
//! ## Crate Policy
//!
//! - Argument parsing lives in `main.rs`; handlers live here.
//! - Handlers delegate to `xpan-core` and `xpan-client` and only format output.
//! - Machine-readable output goes to stdout as JSON; diagnostics go through
//!   `tracing` to stderr.

pub mod digest;
pub mod put;
