//! Top-level orchestration tying the reference parser, registry client,
//! chain engine, layer fetcher, and tar writer together: manifest-list →
//! manifest dispatch, per-layer loop, staging bookkeeping, final archive.

use std::path::{Path, PathBuf};

use crate::canonical_json::Value;
use crate::chain;
use crate::digest::DigestUtils;
use crate::error::{PusherError, Result};
use crate::progress::ProgressSink;
use crate::reference::{self, ImageReference};
use crate::registry::RegistryClient;
use crate::{layer_fetcher, tar_writer};

/// Everything the assembler needs beyond the image reference itself —
/// the ambient options a CLI invocation supplies.
#[derive(Debug, Clone)]
pub struct PullOptions {
    pub arch: String,
    pub output_dir: PathBuf,
    pub credentials: Option<(String, String)>,
    pub skip_tls: bool,
}

impl Default for PullOptions {
    fn default() -> Self {
        Self {
            arch: "amd64".to_string(),
            output_dir: PathBuf::from("."),
            credentials: None,
            skip_tls: false,
        }
    }
}

/// Pulls `image` per `options`, returning the path to the written
/// `<image_name>.tar`. On any failure, the staging directory is left in
/// place so a subsequent call can resume the partially-downloaded layers.
pub async fn pull_image(
    image: &str,
    options: &PullOptions,
    progress: &dyn ProgressSink,
) -> Result<PathBuf> {
    let reference = reference::parse(image)?;
    let image_name = reference.image_name();
    let image_repo = reference.repo_display_name().to_string();

    let staging_root = options.output_dir.join(format!("{image_name}.tmp"));
    create_staging_dir(&staging_root)?;

    let client = RegistryClient::new(
        &reference.registry,
        &reference.namespace,
        options.credentials.clone(),
        options.skip_tls,
    )?;

    let (manifest_list, _content_digest) = client.get_manifest_list(&reference.reference).await?;

    let selected = manifest_list
        .manifests
        .iter()
        .find(|entry| entry.platform.architecture == options.arch);

    let (manifest_ref, manifest_list_os) = match selected {
        Some(entry) => (entry.digest.clone(), Some(entry.platform.os.clone())),
        None => (reference.reference.clone(), None),
    };

    let image_manifest = client.get_manifest(&manifest_ref).await?;

    let config_bytes = client.get_blob(&image_manifest.config.digest).await?;
    let config_digest_hex = DigestUtils::extract_hex_part(&image_manifest.config.digest)?;
    let config_file_name = format!("{config_digest_hex}.json");
    std::fs::write(staging_root.join(&config_file_name), &config_bytes)?;

    let config_value: serde_json::Value = serde_json::from_slice(&config_bytes)?;
    let diff_ids = extract_diff_ids(&config_value)?;

    if diff_ids.len() != image_manifest.layers.len() {
        return Err(PusherError::ManifestInconsistent(format!(
            "manifest has {} layers but config lists {} diff ids",
            image_manifest.layers.len(),
            diff_ids.len()
        )));
    }

    let image_os = manifest_list_os
        .or_else(|| {
            config_value
                .get("os")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "linux".to_string());

    let chains = chain::chain_ids(&diff_ids);
    let v1_ids = chain::v1_layer_ids(&chains, &config_value, &image_os)?;

    let mut manifest_layers = Vec::with_capacity(v1_ids.len());
    let mut top_v1_hex = String::new();

    for (i, layer) in image_manifest.layers.iter().enumerate() {
        let (v1_hex, descriptor) = &v1_ids[i];
        let layer_dir = staging_root.join(v1_hex);
        std::fs::create_dir_all(&layer_dir)?;

        let layer_tar_path = layer_dir.join("layer.tar");
        layer_fetcher::fetch_layer(&client, &layer.digest, &diff_ids[i], &layer_tar_path, progress)
            .await?;

        std::fs::write(layer_dir.join("json"), descriptor.render())?;
        std::fs::write(layer_dir.join("VERSION"), "1.0")?;

        manifest_layers.push(format!("{v1_hex}/layer.tar"));
        top_v1_hex = v1_hex.clone();
    }

    write_manifest_json(&staging_root, &config_file_name, &image_repo, &reference, &manifest_layers)?;
    write_repositories(&staging_root, &image_repo, &reference, &top_v1_hex)?;

    let image_created_unix = config_value
        .get("created")
        .and_then(|v| v.as_str())
        .and_then(parse_rfc3339_to_unix)
        .unwrap_or(0);

    let out_path = options.output_dir.join(format!("{image_name}.tar"));
    tar_writer::write_archive(&staging_root, &out_path, image_created_unix)?;
    std::fs::remove_dir_all(&staging_root)?;

    Ok(out_path)
}

fn create_staging_dir(staging_root: &Path) -> Result<()> {
    if staging_root.exists() && !staging_root.is_dir() {
        return Err(PusherError::StagingConflict(staging_root.to_path_buf()));
    }
    std::fs::create_dir_all(staging_root)?;
    Ok(())
}

fn extract_diff_ids(config_value: &serde_json::Value) -> Result<Vec<String>> {
    config_value
        .get("rootfs")
        .and_then(|r| r.get("diff_ids"))
        .and_then(|d| d.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .ok_or_else(|| PusherError::ManifestInconsistent("image config missing rootfs.diff_ids".to_string()))
}

fn write_manifest_json(
    staging_root: &Path,
    config_file_name: &str,
    image_repo: &str,
    reference: &ImageReference,
    layers: &[String],
) -> Result<()> {
    let entry = Value::object(vec![
        ("Config", Value::str(config_file_name)),
        (
            "RepoTags",
            Value::Array(vec![Value::str(format!(
                "{image_repo}:{}",
                reference.reference
            ))]),
        ),
        (
            "Layers",
            Value::Array(layers.iter().map(|l| Value::str(l.clone())).collect()),
        ),
    ]);
    let document = Value::Array(vec![entry]);
    let mut content = document.render();
    content.push('\n');
    std::fs::write(staging_root.join("manifest.json"), content)?;
    Ok(())
}

fn write_repositories(
    staging_root: &Path,
    image_repo: &str,
    reference: &ImageReference,
    top_v1_hex: &str,
) -> Result<()> {
    let tag_map = Value::object(vec![(reference.reference.as_str(), Value::str(top_v1_hex))]);
    let document = Value::object(vec![(image_repo, tag_map)]);
    let mut content = document.render();
    content.push('\n');
    std::fs::write(staging_root.join("repositories"), content)?;
    Ok(())
}

/// Parses an RFC 3339 timestamp (Docker's `created` field format) into a
/// Unix timestamp, clamped to non-negative since tar mtimes predate 1970
/// never occur in practice for real images.
fn parse_rfc3339_to_unix(value: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.timestamp())
}
