//! SHA-256 digest helpers shared by the chain engine and the layer
//! fetcher: hashing, `sha256:`-prefix handling, and hex validation.

use std::path::Path;

use sha2::Digest;

use crate::error::{PusherError, Result};

/// Utilities for working with SHA-256 digests in Docker's `sha256:<hex>`
/// format.
pub struct DigestUtils;

impl DigestUtils {
    /// Compute the raw (unprefixed) SHA-256 hex digest of `data`.
    pub fn compute_sha256(data: &[u8]) -> String {
        let mut hasher = sha2::Sha256::new();
        hasher.update(data);
        format!("{:x}", hasher.finalize())
    }

    /// Compute the full `sha256:`-prefixed Docker digest of `data`.
    pub fn compute_docker_digest(data: &[u8]) -> String {
        format!("sha256:{}", Self::compute_sha256(data))
    }

    /// Compute the full digest of a file's contents, read in one shot.
    /// Used by the layer fetcher's resume check against a small number of
    /// already-staged layers; not suitable for huge files.
    pub fn compute_file_digest(path: &Path) -> Result<String> {
        let data = std::fs::read(path)?;
        Ok(Self::compute_docker_digest(&data))
    }

    /// 64 lowercase/uppercase hex characters.
    pub fn is_valid_sha256_hex(digest: &str) -> bool {
        digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// `sha256:` followed by 64 hex characters.
    pub fn is_valid_docker_digest(digest: &str) -> bool {
        match digest.strip_prefix("sha256:") {
            Some(hex_part) => Self::is_valid_sha256_hex(hex_part),
            None => false,
        }
    }

    /// Strips the `sha256:` prefix, validating the remainder is hex.
    pub fn extract_hex_part(digest: &str) -> Result<&str> {
        let hex_part = digest
            .strip_prefix("sha256:")
            .ok_or_else(|| PusherError::Registry(format!("digest missing sha256: prefix: {digest}")))?;
        if !Self::is_valid_sha256_hex(hex_part) {
            return Err(PusherError::Registry(format!(
                "digest has non-hex payload: {digest}"
            )));
        }
        Ok(hex_part)
    }

    /// Compares `data`'s digest against `expected_digest`, raising
    /// `DigestMismatch` on failure.
    pub fn verify_data_integrity(data: &[u8], expected_digest: &str) -> Result<()> {
        let computed = Self::compute_sha256(data);
        let expected_hex = Self::extract_hex_part(expected_digest)?;

        if computed != expected_hex {
            return Err(PusherError::DigestMismatch {
                expected: expected_digest.to_string(),
                actual: format!("sha256:{computed}"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_sha256_matches_known_vector() {
        let digest = DigestUtils::compute_sha256(b"hello world");
        assert_eq!(
            digest,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn compute_docker_digest_adds_prefix() {
        let digest = DigestUtils::compute_docker_digest(b"hello world");
        assert_eq!(
            digest,
            "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn validates_digest_format() {
        assert!(DigestUtils::is_valid_docker_digest(
            "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        ));
        assert!(!DigestUtils::is_valid_docker_digest("sha256:invalid"));
        assert!(!DigestUtils::is_valid_docker_digest(
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        ));
    }

    #[test]
    fn verify_data_integrity_detects_mismatch() {
        let data = b"hello world";
        let wrong = "sha256:0000000000000000000000000000000000000000000000000000000000000000"
            .trim_end_matches('0')
            .to_string()
            + "00";
        assert!(DigestUtils::verify_data_integrity(data, &wrong).is_err());
    }

    #[test]
    fn verify_data_integrity_accepts_match() {
        let data = b"hello world";
        let digest = "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
        assert!(DigestUtils::verify_data_integrity(data, digest).is_ok());
    }

    #[test]
    fn compute_file_digest_reads_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, b"hello world").unwrap();
        let digest = DigestUtils::compute_file_digest(&path).unwrap();
        assert_eq!(
            digest,
            "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
