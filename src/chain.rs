//! Chain-ID reduction and legacy v1 layer-ID synthesis. Pure functions,
//! no I/O: the assembler is the only caller that touches disk.

use sha2::{Digest, Sha256};

use crate::canonical_json::Value;
use crate::error::{PusherError, Result};

const EPOCH: &str = "1970-01-01T00:00:00Z";
const DOCKER_VERSION: &str = "18.06.1-ce";
const DEFAULT_ARCH: &str = "amd64";
const DEFAULT_OS: &str = "linux";

/// `chain[0] = diff[0]`; `chain[i] = sha256(chain[i-1] + " " + diff[i])`.
pub fn chain_ids(diffs: &[String]) -> Vec<String> {
    let mut chains = Vec::with_capacity(diffs.len());
    for (i, diff) in diffs.iter().enumerate() {
        if i == 0 {
            chains.push(diff.clone());
        } else {
            let input = format!("{} {}", chains[i - 1], diff);
            chains.push(sha256_prefixed(input.as_bytes()));
        }
    }
    chains
}

fn sha256_prefixed(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// The canonical, all-zeroed `container_config` stub used by every
/// non-top layer and as the template default for the top layer.
fn zeroed_container_config() -> Value {
    Value::object(vec![
        ("Hostname", Value::str("")),
        ("Domainname", Value::str("")),
        ("User", Value::str("")),
        ("AttachStdin", Value::Bool(false)),
        ("AttachStdout", Value::Bool(false)),
        ("AttachStderr", Value::Bool(false)),
        ("Tty", Value::Bool(false)),
        ("OpenStdin", Value::Bool(false)),
        ("StdinOnce", Value::Bool(false)),
        ("Env", Value::Null),
        ("Cmd", Value::Null),
        ("Image", Value::str("")),
        ("Volumes", Value::Null),
        ("WorkingDir", Value::str("")),
        ("Entrypoint", Value::Null),
        ("OnBuild", Value::Null),
        ("Labels", Value::Null),
    ])
}

/// One layer's worth of input to the v1-id hash, plus the separate
/// on-disk descriptor (they share data but not key order — see
/// `v1_layer_ids` and `LayerDescriptor::to_disk_json`).
struct LayerDescriptor {
    id: String,
    parent: Option<String>,
    chain_id: String,
    os: String,
    /// `Some(config)` only for the topmost layer.
    image_config: Option<serde_json::Value>,
}

impl LayerDescriptor {
    /// The value that gets SHA-256'd to produce `id`. Follows the
    /// template's field order literally, since this is the value upstream
    /// Docker must reproduce byte-for-byte.
    fn hash_input(&self) -> Value {
        match &self.image_config {
            None => {
                let mut pairs = vec![
                    ("container_config", zeroed_container_config()),
                    ("created", Value::str(EPOCH)),
                    ("layer_id", Value::str(&self.chain_id)),
                ];
                if let Some(parent) = &self.parent {
                    pairs.push(("parent", Value::str(parent)));
                }
                Value::Object(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
            }
            Some(config) => {
                let mut pairs: Vec<(String, Value)> = vec![
                    ("architecture".into(), Value::str(DEFAULT_ARCH)),
                    ("config".into(), Value::str("")),
                    ("container".into(), Value::str("")),
                    ("container_config".into(), Value::str("")),
                    ("created".into(), Value::str(EPOCH)),
                    ("docker_version".into(), Value::str(DOCKER_VERSION)),
                    ("layer_id".into(), Value::str(&self.chain_id)),
                    ("os".into(), Value::str(DEFAULT_OS)),
                ];
                if let Some(parent) = &self.parent {
                    pairs.push(("parent".into(), Value::str(parent)));
                }

                merge_image_config(&mut pairs, config);
                Value::Object(pairs)
            }
        }
    }

    /// The value written to `<v1-id>/json` on disk: `id`, optional
    /// `parent`, then `created`, `container_config`, `os` for non-top
    /// layers (this on-disk order differs from the hash-input order
    /// above); for the top layer, `created, container, container_config,
    /// docker_version, config, architecture, os` seeded first so a config
    /// without those top-level fields (the common buildkit case) still
    /// gets them, then the real image config merged over the seed,
    /// minus `history`/`rootfs`.
    fn to_disk_json(&self) -> Value {
        let mut pairs: Vec<(String, Value)> = vec![("id".into(), Value::str(&self.id))];
        if let Some(parent) = &self.parent {
            pairs.push(("parent".into(), Value::str(parent)));
        }

        match &self.image_config {
            None => {
                pairs.push(("created".into(), Value::str(EPOCH)));
                pairs.push(("container_config".into(), zeroed_container_config()));
                pairs.push(("os".into(), Value::str(&self.os)));
            }
            Some(config) => {
                pairs.push(("created".into(), Value::str(EPOCH)));
                pairs.push(("container".into(), Value::str("")));
                pairs.push(("container_config".into(), Value::str("")));
                pairs.push(("docker_version".into(), Value::str(DOCKER_VERSION)));
                pairs.push(("config".into(), Value::str("")));
                pairs.push(("architecture".into(), Value::str(DEFAULT_ARCH)));
                pairs.push(("os".into(), Value::str(DEFAULT_OS)));
                merge_image_config(&mut pairs, config);
            }
        }

        Value::Object(pairs)
    }
}

/// Appends the real image config's fields to `pairs`, in the config's own
/// key order, skipping `history`/`rootfs` and overriding template
/// placeholders already present in `pairs` rather than duplicating them.
fn merge_image_config(pairs: &mut Vec<(String, Value)>, config: &serde_json::Value) {
    let serde_json::Value::Object(map) = config else {
        return;
    };
    for (key, value) in map {
        if key == "history" || key == "rootfs" {
            continue;
        }
        let rendered = Value::from_serde(value);
        if let Some(slot) = pairs.iter_mut().find(|(k, _)| k == key) {
            slot.1 = rendered;
        } else {
            pairs.push((key.clone(), rendered));
        }
    }
}

/// Computes the v1 layer id for every layer in order, given the chain ids
/// and the (already-parsed, order-preserving) image config. `image_os` is
/// the platform os string from the selected manifest-list entry.
pub fn v1_layer_ids(
    chains: &[String],
    image_config: &serde_json::Value,
    image_os: &str,
) -> Result<Vec<(String, Value)>> {
    if chains.is_empty() {
        return Err(PusherError::ManifestInconsistent(
            "image has no layers".to_string(),
        ));
    }

    let top_index = chains.len() - 1;
    let mut ids = Vec::with_capacity(chains.len());
    let mut parent: Option<String> = None;

    for (i, chain_id) in chains.iter().enumerate() {
        let mut descriptor = LayerDescriptor {
            id: String::new(),
            parent: parent.clone(),
            chain_id: chain_id.clone(),
            os: image_os.to_string(),
            image_config: if i == top_index {
                Some(image_config.clone())
            } else {
                None
            },
        };

        let hash_input = descriptor.hash_input().render();
        let id = sha256_prefixed(hash_input.as_bytes());
        let id_hex = id.trim_start_matches("sha256:").to_string();
        descriptor.id = id_hex.clone();

        ids.push((id_hex, descriptor.to_disk_json()));
        parent = Some(ids.last().unwrap().0.clone());
    }

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_diff_chain_is_itself() {
        let chains = chain_ids(&["sha256:aa".to_string()]);
        assert_eq!(chains, vec!["sha256:aa".to_string()]);
    }

    #[test]
    fn chain_length_matches_diffs() {
        let diffs = vec![
            "sha256:aa".to_string(),
            "sha256:bb".to_string(),
            "sha256:cc".to_string(),
        ];
        let chains = chain_ids(&diffs);
        assert_eq!(chains.len(), diffs.len());
        assert_eq!(chains[0], diffs[0]);
    }

    /// The second chain id is sha256 of "chain[0] chain[1]" etc.
    #[test]
    fn chain_recurrence_matches_manual_hash() {
        let diffs = vec![
            "sha256:aa".to_string(),
            "sha256:bb".to_string(),
            "sha256:cc".to_string(),
        ];
        let chains = chain_ids(&diffs);

        let expected_1 = sha256_prefixed(b"sha256:aa sha256:bb");
        assert_eq!(chains[1], expected_1);

        let expected_2 = sha256_prefixed(format!("{} sha256:cc", chains[1]).as_bytes());
        assert_eq!(chains[2], expected_2);
    }

    #[test]
    fn non_top_layer_json_has_no_layer_id_field() {
        let config: serde_json::Value = serde_json::json!({
            "architecture": "amd64",
            "created": "2024-01-01T00:00:00Z",
            "rootfs": {"diff_ids": ["sha256:aa", "sha256:bb"]},
            "history": []
        });
        let chains = vec!["sha256:aa".to_string(), "sha256:bb".to_string()];
        let ids = v1_layer_ids(&chains, &config, "linux").unwrap();

        let (_, non_top_json) = &ids[0];
        let rendered = non_top_json.render();
        assert!(rendered.contains("\"container_config\""));
        assert!(rendered.contains("\"os\":\"linux\""));
        assert!(!rendered.contains("layer_id"));
        assert!(!rendered.contains("\"parent\""));
    }

    #[test]
    fn second_layer_has_parent_equal_to_first_id() {
        let config: serde_json::Value = serde_json::json!({});
        let chains = vec!["sha256:aa".to_string(), "sha256:bb".to_string()];
        let ids = v1_layer_ids(&chains, &config, "linux").unwrap();

        let first_id = &ids[0].0;
        let (_, second_json) = &ids[1];
        let rendered = second_json.render();
        assert!(rendered.contains(&format!("\"parent\":\"{first_id}\"")));
    }

    #[test]
    fn top_layer_drops_history_and_rootfs() {
        let config: serde_json::Value = serde_json::json!({
            "architecture": "arm64",
            "created": "2024-06-01T00:00:00Z",
            "history": [{"created_by": "x"}],
            "rootfs": {"diff_ids": ["sha256:aa"]}
        });
        let chains = vec!["sha256:aa".to_string()];
        let ids = v1_layer_ids(&chains, &config, "linux").unwrap();
        let rendered = ids[0].1.render();
        assert!(!rendered.contains("history"));
        assert!(!rendered.contains("rootfs"));
        assert!(rendered.contains("\"architecture\":\"arm64\""));
    }

    #[test]
    fn top_layer_hash_input_orders_os_before_parent() {
        let config: serde_json::Value = serde_json::json!({"architecture": "amd64"});
        let chains = vec!["sha256:aa".to_string(), "sha256:bb".to_string()];
        let top = LayerDescriptor {
            id: String::new(),
            parent: Some("deadbeef".to_string()),
            chain_id: chains[1].clone(),
            os: "linux".to_string(),
            image_config: Some(config),
        };
        let rendered = top.hash_input().render();
        let os_pos = rendered.find("\"os\"").unwrap();
        let parent_pos = rendered.find("\"parent\"").unwrap();
        assert!(os_pos < parent_pos, "os must precede parent: {rendered}");
    }

    #[test]
    fn top_layer_disk_json_seeds_legacy_template_fields() {
        // A buildkit-style config with no top-level container/container_config/docker_version.
        let config: serde_json::Value = serde_json::json!({
            "architecture": "amd64",
            "created": "2024-06-01T00:00:00Z",
            "rootfs": {"diff_ids": ["sha256:aa"]}
        });
        let chains = vec!["sha256:aa".to_string()];
        let ids = v1_layer_ids(&chains, &config, "linux").unwrap();
        let rendered = ids[0].1.render();

        for key in ["container", "container_config", "docker_version", "config"] {
            assert!(rendered.contains(&format!("\"{key}\"")), "missing seeded key {key}: {rendered}");
        }
        assert!(rendered.contains("\"created\":\"2024-06-01T00:00:00Z\""));
    }

    #[test]
    fn ids_are_stable_across_repeated_calls() {
        let config: serde_json::Value = serde_json::json!({"architecture": "amd64"});
        let chains = vec!["sha256:aa".to_string(), "sha256:bb".to_string()];
        let a = v1_layer_ids(&chains, &config, "linux").unwrap();
        let b = v1_layer_ids(&chains, &config, "linux").unwrap();
        assert_eq!(a[0].0, b[0].0);
        assert_eq!(a[1].0, b[1].0);
    }

    #[test]
    fn empty_chain_list_is_manifest_inconsistent() {
        let config: serde_json::Value = serde_json::json!({});
        assert!(v1_layer_ids(&[], &config, "linux").is_err());
    }
}
