//! File-backed scan provider.
//!
//! An external radio bridge writes the devices it currently sees to a feed
//! file, either as a JSON array of observations or as JSON Lines. Each scan
//! reads the whole file; the bridge owns the discovery window.

use crate::scanner::types::{Observation, ScanError};
use crate::scanner::ScanProvider;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Reads observations from a feed file on every scan.
#[derive(Debug, Clone)]
pub struct FeedScanner {
    path: PathBuf,
}

impl FeedScanner {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScanProvider for FeedScanner {
    fn scan(&self, _duration: Duration) -> Result<Vec<Observation>, ScanError> {
        if !self.path.exists() {
            return Err(ScanError::Unavailable(format!(
                "feed file {} does not exist",
                self.path.display()
            )));
        }

        let content = std::fs::read_to_string(&self.path)?;
        parse_feed(&content)
    }

    fn name(&self) -> &str {
        "feed"
    }
}

/// Parse feed content as a JSON array or, failing that, as JSON Lines.
pub fn parse_feed(content: &str) -> Result<Vec<Observation>, ScanError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).map_err(|e| ScanError::Malformed(e.to_string()));
    }

    trimmed
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line)
                .map_err(|e| ScanError::Malformed(format!("line {}: {e}", idx + 1)))
        })
        .collect()
}
