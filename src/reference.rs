//! Image reference parsing: `[registry/]repo[:tag|@digest]` into its three
//! parts. Pure, synchronous, no I/O.

use crate::error::{PusherError, Result};

pub const DEFAULT_REGISTRY: &str = "registry-1.docker.io";
const DEFAULT_REFERENCE: &str = "latest";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub registry: String,
    pub namespace: String,
    pub reference: String,
}

impl ImageReference {
    /// True when no registry host was given and the default was used.
    pub fn is_default_registry(&self) -> bool {
        self.registry == DEFAULT_REGISTRY
    }

    /// `<namespace-with-slashes-replaced>_<reference-with-colons-replaced>`,
    /// used as the staging/output directory stem.
    pub fn image_name(&self) -> String {
        format!(
            "{}_{}",
            self.namespace.replace('/', "_"),
            self.reference.replace(':', "_")
        )
    }

    /// The repository name to record in `RepoTags`: `namespace` with the
    /// implicit `library/` prefix stripped when it came from the default
    /// registry.
    pub fn repo_display_name(&self) -> &str {
        if self.is_default_registry() {
            self.namespace
                .strip_prefix("library/")
                .unwrap_or(&self.namespace)
        } else {
            &self.namespace
        }
    }
}

/// Parses a single reference token per the rules in the design:
///
/// 1. One segment: default registry, `library/` prefix.
/// 2. First segment contains `.` or `:`: it's the registry host.
/// 3. Otherwise: default registry, all-but-last segments form the namespace.
/// 4. Last segment splits on `@` (digest) else `:` (tag); more than one
///    colon in that split is an error.
pub fn parse(reference: &str) -> Result<ImageReference> {
    if reference.is_empty() {
        return Err(PusherError::InvalidReference(
            "reference must not be empty".to_string(),
        ));
    }

    let segments: Vec<&str> = reference.split('/').collect();

    let (registry, namespace_prefix, last) = if segments.len() == 1 {
        (DEFAULT_REGISTRY.to_string(), vec!["library"], segments[0])
    } else if segments[0].contains('.') || segments[0].contains(':') {
        (
            segments[0].to_string(),
            segments[1..segments.len() - 1].to_vec(),
            segments[segments.len() - 1],
        )
    } else {
        (
            DEFAULT_REGISTRY.to_string(),
            segments[..segments.len() - 1].to_vec(),
            segments[segments.len() - 1],
        )
    };

    let (name_tail, reference_part) = split_last_segment(last)?;

    let mut namespace_parts: Vec<&str> = namespace_prefix;
    namespace_parts.push(name_tail);
    let namespace = namespace_parts.join("/");

    Ok(ImageReference {
        registry,
        namespace,
        reference: reference_part.unwrap_or_else(|| DEFAULT_REFERENCE.to_string()),
    })
}

/// Splits the final `/`-segment on `@` (digest reference) else `:` (tag).
/// More than one colon after the name is `InvalidReference`.
fn split_last_segment(segment: &str) -> Result<(&str, Option<String>)> {
    if let Some((name, digest)) = segment.split_once('@') {
        return Ok((name, Some(digest.to_string())));
    }

    let colon_count = segment.matches(':').count();
    if colon_count > 1 {
        return Err(PusherError::InvalidReference(format!(
            "too many ':' separators in '{segment}'"
        )));
    }

    match segment.split_once(':') {
        Some((name, tag)) => Ok((name, Some(tag.to_string()))),
        None => Ok((segment, None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_segment_gets_library_and_default_registry() {
        let r = parse("alpine").unwrap();
        assert_eq!(r.registry, DEFAULT_REGISTRY);
        assert_eq!(r.namespace, "library/alpine");
        assert_eq!(r.reference, "latest");
    }

    #[test]
    fn tag_is_preserved() {
        let r = parse("alpine:3.19").unwrap();
        assert_eq!(r.registry, DEFAULT_REGISTRY);
        assert_eq!(r.namespace, "library/alpine");
        assert_eq!(r.reference, "3.19");
    }

    #[test]
    fn registry_host_detected_by_dot() {
        let r = parse("ghcr.io/acme/app:v1").unwrap();
        assert_eq!(r.registry, "ghcr.io");
        assert_eq!(r.namespace, "acme/app");
        assert_eq!(r.reference, "v1");
    }

    #[test]
    fn registry_host_detected_by_port_colon() {
        let r = parse("host:5000/a/b@sha256:deadbeef").unwrap();
        assert_eq!(r.registry, "host:5000");
        assert_eq!(r.namespace, "a/b");
        assert_eq!(r.reference, "sha256:deadbeef");
    }

    #[test]
    fn multi_segment_without_host_uses_default_registry() {
        let r = parse("library/ubuntu:latest").unwrap();
        assert_eq!(r.registry, DEFAULT_REGISTRY);
        assert_eq!(r.namespace, "library/ubuntu");
        assert_eq!(r.reference, "latest");
    }

    #[test]
    fn too_many_colons_is_invalid() {
        assert!(parse("host/name:a:b").is_err());
    }

    #[test]
    fn empty_reference_is_invalid() {
        assert!(parse("").is_err());
    }

    #[test]
    fn repo_display_name_strips_library_prefix_for_default_registry() {
        let r = parse("alpine").unwrap();
        assert_eq!(r.repo_display_name(), "alpine");

        let r = parse("ghcr.io/acme/app").unwrap();
        assert_eq!(r.repo_display_name(), "acme/app");
    }

    #[test]
    fn image_name_replaces_slashes_and_colons() {
        let r = parse("host:5000/a/b:v1").unwrap();
        assert_eq!(r.image_name(), "a_b_v1");
    }
}
