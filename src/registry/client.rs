//! `RegistryClient`: owns the HTTP session (shared `reqwest::Client`,
//! current Bearer token) and exposes the typed GETs the assembler and
//! layer fetcher need. A failed request gets exactly one retry after a
//! fresh token exchange; a second 401 is fatal.

use std::sync::RwLock;

use reqwest::header::{ACCEPT, RANGE};
use reqwest::{Response, StatusCode};

use crate::error::{PusherError, Result};
use crate::manifest::{Manifest, ManifestList};
use crate::registry::auth::{self, BearerChallenge};

const MANIFEST_LIST_ACCEPT: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
const MANIFEST_ACCEPT: &str = "application/vnd.docker.distribution.manifest.v2+json";
const BLOB_STREAM_ACCEPT: &str = "application/vnd.docker.image.rootfs.diff.tar.gzip";

pub struct RegistryClient {
    http: reqwest::Client,
    base: url::Url,
    credentials: Option<(String, String)>,
    token: RwLock<Option<String>>,
}

impl RegistryClient {
    /// `registry` and `namespace` form the base URL
    /// `https://<registry>/v2/<namespace>/`.
    pub fn new(
        registry: &str,
        namespace: &str,
        credentials: Option<(String, String)>,
        skip_tls: bool,
    ) -> Result<Self> {
        let builder = if skip_tls {
            reqwest::Client::builder().danger_accept_invalid_certs(true)
        } else {
            reqwest::Client::builder()
        };
        let http = builder.build()?;

        let base = url::Url::parse(&format!("https://{registry}/v2/{namespace}/"))?;

        Ok(Self {
            http,
            base,
            credentials,
            token: RwLock::new(None),
        })
    }

    pub async fn get_manifest_list(&self, reference: &str) -> Result<(ManifestList, Option<String>)> {
        let path = format!("manifests/{reference}");
        let response = self
            .execute(reqwest::Method::GET, &path, Some(MANIFEST_LIST_ACCEPT), None)
            .await?;
        let content_digest = response
            .headers()
            .get("docker-content-digest")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let list: ManifestList = response.json().await?;
        Ok((list, content_digest))
    }

    pub async fn get_manifest(&self, reference: &str) -> Result<Manifest> {
        let path = format!("manifests/{reference}");
        let response = self
            .execute(reqwest::Method::GET, &path, Some(MANIFEST_ACCEPT), None)
            .await?;
        let manifest: Manifest = response.json().await?;
        Ok(manifest)
    }

    /// Fetches a blob whole (used for the small image-config blob).
    pub async fn get_blob(&self, digest: &str) -> Result<Vec<u8>> {
        let path = format!("blobs/{digest}");
        let response = self
            .execute(reqwest::Method::GET, &path, None, None)
            .await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Opens a streamed layer blob GET, optionally resuming from
    /// `range_start` bytes in. Returns the raw response so the layer
    /// fetcher can consume the body in bounded chunks; a 416 is returned
    /// as `Ok` with that status so the caller can treat "already
    /// complete" specially.
    pub async fn get_blob_stream(&self, digest: &str, range_start: Option<u64>) -> Result<Response> {
        let path = format!("blobs/{digest}");
        let range = range_start.map(|start| format!("bytes={start}-"));
        self.execute(
            reqwest::Method::GET,
            &path,
            Some(BLOB_STREAM_ACCEPT),
            range.as_deref(),
        )
        .await
    }

    /// Issues a request, retrying exactly once through the Bearer
    /// challenge/response handshake on a 401. A second 401 is fatal.
    async fn execute(
        &self,
        method: reqwest::Method,
        path: &str,
        accept: Option<&str>,
        range: Option<&str>,
    ) -> Result<Response> {
        let url = self.base.join(path)?;

        let build = |token: Option<String>| {
            let mut builder = self.http.request(method.clone(), url.clone());
            if let Some(accept) = accept {
                builder = builder.header(ACCEPT, accept);
            }
            if let Some(range) = range {
                builder = builder.header(RANGE, range);
            }
            if let Some(token) = token {
                builder = builder.bearer_auth(token);
            }
            builder
        };

        let current_token = self.token.read().unwrap().clone();
        let response = build(current_token).send().await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::classify(response).await;
        }

        let challenge = Self::challenge_from(&response)?;
        let token = auth::fetch_token(&self.http, &challenge, self.credentials.as_ref()).await?;
        *self.token.write().unwrap() = Some(token.clone());

        let retry = build(Some(token)).send().await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            return Err(PusherError::AuthFailed(
                "registry rejected credentials after token refresh".to_string(),
            ));
        }
        Self::classify(retry).await
    }

    fn challenge_from(response: &Response) -> Result<BearerChallenge> {
        let header = response
            .headers()
            .get(reqwest::header::WWW_AUTHENTICATE)
            .ok_or_else(|| PusherError::AuthFailed("401 with no WWW-Authenticate header".to_string()))?
            .to_str()
            .map_err(|e| PusherError::AuthFailed(format!("invalid WWW-Authenticate header: {e}")))?;
        auth::parse_bearer_challenge(header)
    }

    async fn classify(response: Response) -> Result<Response> {
        let status = response.status();
        if matches!(
            status,
            StatusCode::OK
                | StatusCode::CREATED
                | StatusCode::ACCEPTED
                | StatusCode::NO_CONTENT
                | StatusCode::RANGE_NOT_SATISFIABLE
        ) {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(PusherError::Registry(format!(
            "unexpected status {status}: {body}"
        )))
    }
}
