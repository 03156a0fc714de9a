//! CI secrets store API client (GitHub-shaped).

pub mod secrets;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::blocking::RequestBuilder;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::error::{OpsError, Result};

/// API base URL.
pub const API_BASE: &str = "https://api.github.com";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("opskit/", env!("CARGO_PKG_VERSION"));

/// An `owner/repo` repository reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl FromStr for RepoRef {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self> {
        let Some((owner, name)) = s.split_once('/') else {
            return Err(OpsError::InvalidRepo(s.to_string()));
        };
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(OpsError::InvalidRepo(s.to_string()));
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// The repository's current secrets public key. Rotates server-side, so it
/// must be fetched fresh immediately before each encryption.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoPublicKey {
    pub key_id: String,
    pub key: String,
}

/// Blocking API client.
pub struct Client {
    http: reqwest::blocking::Client,
    base: String,
    token: String,
}

impl Client {
    pub fn new(token: String) -> Result<Self> {
        Self::with_base(token, API_BASE)
    }

    pub fn with_base(token: String, base: &str) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base, path))
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
    }

    /// Verify the token can see the repository before doing any work.
    pub fn check_repo(&self, repo: &RepoRef) -> Result<()> {
        let resp = self
            .request(Method::GET, &format!("/repos/{}", repo))
            .send()?;

        match resp.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => Err(OpsError::Api(format!(
                "repository {} does not exist or is not accessible",
                repo
            ))),
            StatusCode::UNAUTHORIZED => {
                Err(OpsError::Api("token is invalid or expired".to_string()))
            }
            status => Err(OpsError::Api(format!(
                "repository check failed ({}): {}",
                status,
                resp.text()?.trim()
            ))),
        }
    }

    /// Fetch the current public key and its identifier for a repository.
    pub fn public_key(&self, repo: &RepoRef) -> Result<RepoPublicKey> {
        let resp = self
            .request(
                Method::GET,
                &format!("/repos/{}/actions/secrets/public-key", repo),
            )
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            return Err(OpsError::Api(format!(
                "fetching public key failed ({}): {}",
                status,
                resp.text()?.trim()
            )));
        }

        let key: RepoPublicKey = resp.json()?;
        debug!(key_id = %key.key_id, "fetched repository public key");
        Ok(key)
    }

    /// Upload an already-encrypted secret. 201 (created) and 204 (updated)
    /// are success; anything else fails with the raw response body.
    pub fn put_secret(
        &self,
        repo: &RepoRef,
        name: &str,
        encrypted_value: &str,
        key_id: &str,
    ) -> Result<()> {
        let payload = serde_json::json!({
            "encrypted_value": encrypted_value,
            "key_id": key_id,
        });

        let resp = self
            .request(
                Method::PUT,
                &format!("/repos/{}/actions/secrets/{}", repo, name),
            )
            .json(&payload)
            .send()?;

        match resp.status() {
            StatusCode::CREATED | StatusCode::NO_CONTENT => Ok(()),
            status => Err(OpsError::Api(format!(
                "upload failed ({}): {}",
                status,
                resp.text()?.trim()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_ref_parses() {
        let repo: RepoRef = "octo/tools".parse().unwrap();
        assert_eq!(repo.owner, "octo");
        assert_eq!(repo.name, "tools");
        assert_eq!(repo.to_string(), "octo/tools");
    }

    #[test]
    fn test_repo_ref_rejects_malformed() {
        assert!("no-slash".parse::<RepoRef>().is_err());
        assert!("/missing-owner".parse::<RepoRef>().is_err());
        assert!("owner/".parse::<RepoRef>().is_err());
        assert!("a/b/c".parse::<RepoRef>().is_err());
    }

    #[test]
    fn test_public_key_decodes() {
        let body = r#"{"key_id":"568250167242549743","key":"nx6+Zt2C7euOFSIiqhAwEyY5Ne1U5h1r79v06hH88F0="}"#;
        let key: RepoPublicKey = serde_json::from_str(body).unwrap();
        assert_eq!(key.key_id, "568250167242549743");
    }
}
