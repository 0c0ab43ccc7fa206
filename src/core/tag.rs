//! Deterministic, privacy-preserving device tags.
//!
//! A tag is derived from the device address alone: the first 8 hex digits of
//! its SHA-256 digest, upper-cased, behind a configurable prefix. The same
//! address always yields the same tag, across runs and machines.

use sha2::{Digest, Sha256};

/// Prefix used when none is configured.
pub const DEFAULT_TAG_PREFIX: &str = "TAG";

/// Number of hex digits kept from the digest.
pub const TAG_HEX_LEN: usize = 8;

/// Builds tags for a fixed prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagGenerator {
    prefix: String,
}

impl TagGenerator {
    /// Create a generator, rejecting prefixes that would make tags ambiguous.
    pub fn new(prefix: impl Into<String>) -> Result<Self, InvalidTagPrefix> {
        let prefix = prefix.into();
        if !is_valid_prefix(&prefix) {
            return Err(InvalidTagPrefix(prefix));
        }
        Ok(Self { prefix })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Derive the tag for `address`.
    pub fn generate(&self, address: &str) -> String {
        let digest = Sha256::digest(address.as_bytes());
        let hex = hex::encode_upper(&digest[..TAG_HEX_LEN / 2]);
        format!("{}-{}", self.prefix, hex)
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_TAG_PREFIX.to_string(),
        }
    }
}

/// Derive a tag with the default prefix.
pub fn generate_tag(address: &str) -> String {
    TagGenerator::default().generate(address)
}

/// Prefixes must be non-empty ASCII alphanumerics so the `-` separator stays unambiguous.
pub fn is_valid_prefix(prefix: &str) -> bool {
    !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_alphanumeric())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid tag prefix {0:?}: must be non-empty ASCII letters or digits")]
pub struct InvalidTagPrefix(pub String);
