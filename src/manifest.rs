//! Wire types for the registry's manifest-list and manifest JSON bodies,
//! trimmed to the fields the assembler actually reads.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestList {
    #[serde(default)]
    pub manifests: Vec<ManifestListEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestListEntry {
    pub digest: String,
    pub platform: Platform,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Platform {
    pub architecture: String,
    pub os: String,
    #[serde(default)]
    pub variant: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub config: BlobDescriptor,
    #[serde(default)]
    pub layers: Vec<BlobDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlobDescriptor {
    pub digest: String,
    #[serde(rename = "mediaType", default)]
    pub media_type: String,
    #[serde(default)]
    pub size: u64,
}
