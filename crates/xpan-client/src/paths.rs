//! Logical-path to remote-path resolution.
//!
//! The remote addresses files by absolute path. [`RootedPaths`] anchors
//! caller paths under a configured root, the way a remote mounted at
//! `remote:some/dir` maps `a/b.txt` to `/some/dir/a/b.txt`.

use crate::error::XpanError;

/// Maps a caller-supplied path to the absolute remote path.
pub trait PathResolver: Send + Sync + std::fmt::Debug {
    /// Absolute remote path for `remote`, or [`XpanError::InvalidPath`]
    /// if it cannot be placed.
    fn resolve(&self, remote: &str) -> Result<String, XpanError>;
}

/// Joins paths under a fixed root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootedPaths {
    root: String,
}

impl RootedPaths {
    /// Leading and trailing slashes on `root` are ignored.
    pub fn new(root: &str) -> Self {
        Self {
            root: root.trim_matches('/').to_string(),
        }
    }

    /// The root without surrounding slashes; empty for `/`.
    pub fn root(&self) -> &str {
        &self.root
    }
}

impl PathResolver for RootedPaths {
    fn resolve(&self, remote: &str) -> Result<String, XpanError> {
        let invalid = |reason: &str| XpanError::InvalidPath {
            path: remote.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        for segment in self.root.split('/').chain(remote.split('/')) {
            match segment {
                "" | "." => {}
                ".." => return Err(invalid("parent segments are not allowed")),
                s => segments.push(s),
            }
        }

        let file_segments = remote.split('/').filter(|s| !s.is_empty() && *s != ".").count();
        if file_segments == 0 {
            return Err(invalid("path names no file"));
        }
        Ok(format!("/{}", segments.join("/")))
    }
}
