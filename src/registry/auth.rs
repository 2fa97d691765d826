//! Bearer-challenge parsing and token exchange, driven by the
//! single-retry policy in `client.rs`.

use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::error::{PusherError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerChallenge {
    pub realm: String,
    pub service: String,
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

/// Parses `Bearer realm="...",service="...",scope="..."`. Only the
/// `Bearer` scheme is honored; anything else is not a challenge this
/// client can answer.
pub fn parse_bearer_challenge(header: &str) -> Result<BearerChallenge> {
    let params = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| PusherError::AuthFailed(format!("unsupported auth scheme: {header}")))?;

    let mut realm = None;
    let mut service = None;
    let mut scope = None;

    for param in params.split(',') {
        let param = param.trim();
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').to_string();
        match key.trim() {
            "realm" => realm = Some(value),
            "service" => service = Some(value),
            "scope" => scope = Some(value),
            _ => {}
        }
    }

    let realm = realm
        .ok_or_else(|| PusherError::AuthFailed("auth challenge missing realm".to_string()))?;
    let service = service
        .ok_or_else(|| PusherError::AuthFailed("auth challenge missing service".to_string()))?;

    Ok(BearerChallenge {
        realm,
        service,
        scope,
    })
}

/// Builds the token-request URL: `realm` with `service`/`scope` appended
/// to any query parameters `realm` already carries.
pub fn token_url(challenge: &BearerChallenge) -> Result<Url> {
    let mut url = Url::parse(&challenge.realm)?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("service", &challenge.service);
        if let Some(scope) = &challenge.scope {
            pairs.append_pair("scope", scope);
        }
    }
    Ok(url)
}

/// Performs the token request, carrying Basic credentials when supplied,
/// and returns the bearer token string.
pub async fn fetch_token(
    client: &Client,
    challenge: &BearerChallenge,
    credentials: Option<&(String, String)>,
) -> Result<String> {
    let url = token_url(challenge)?;
    let mut request = client.get(url);
    if let Some((user, password)) = credentials {
        request = request.basic_auth(user, Some(password));
    }

    let response = request.send().await?;
    if !response.status().is_success() {
        let status = response.status();
        return Err(PusherError::AuthFailed(format!(
            "token endpoint returned {status}"
        )));
    }

    let parsed: TokenResponse = response.json().await?;
    parsed
        .token
        .or(parsed.access_token)
        .ok_or_else(|| PusherError::AuthFailed("token response had no token field".to_string()))
}
