//! DNS and tunnel provider API client.
//!
//! Every endpoint returns the provider's standard envelope:
//! `{ success, errors, result }`. Responses are decoded into explicit
//! per-endpoint structs; a non-success envelope aborts the operation with
//! the remote error messages joined verbatim.

pub mod dns;
pub mod tunnel;

use std::time::Duration;

use reqwest::blocking::RequestBuilder;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::{OpsError, Result};

/// Versioned API base path.
pub const API_BASE: &str = "https://api.cloudflare.com/client/v4";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Authentication material: bearer token (preferred) or the legacy
/// email + global key header pair.
#[derive(Debug, Clone)]
pub enum Auth {
    Token(String),
    Key { email: String, key: String },
}

/// Standard response envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

/// One error entry from the envelope.
#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    message: String,
}

/// A DNS zone.
#[derive(Debug, Clone, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
    pub status: String,
}

/// Blocking API client.
pub struct Client {
    http: reqwest::blocking::Client,
    base: String,
    auth: Auth,
}

impl Client {
    pub fn new(auth: Auth) -> Result<Self> {
        Self::with_base(auth, API_BASE)
    }

    /// Client against a non-default base URL.
    pub fn with_base(auth: Auth, base: &str) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            auth,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base, path);
        let req = self.http.request(method, url);
        match &self.auth {
            Auth::Token(token) => req.bearer_auth(token),
            Auth::Key { email, key } => req
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", key),
        }
    }

    /// Send a request and unwrap the envelope.
    fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let resp = req.send()?;
        let status = resp.status();
        let body = resp.text()?;

        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|_| {
            OpsError::Api(format!("unexpected response ({}): {}", status, body.trim()))
        })?;

        if !envelope.success {
            let joined = envelope
                .errors
                .iter()
                .map(|e| format!("{} (code {})", e.message, e.code))
                .collect::<Vec<_>>()
                .join(", ");
            debug!(%status, "api call failed");
            return Err(OpsError::Api(joined));
        }

        envelope.result.ok_or(OpsError::EmptyResult)
    }

    /// Same as [`send`], but tolerate an absent result payload (delete
    /// endpoints return only an id, sometimes nothing useful).
    fn send_unit(&self, req: RequestBuilder) -> Result<()> {
        match self.send::<serde_json::Value>(req) {
            Ok(_) | Err(OpsError::EmptyResult) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// List all zones visible to the credentials.
    pub fn list_zones(&self) -> Result<Vec<Zone>> {
        self.send(self.request(Method::GET, "/zones"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_success_decodes_result() {
        let body = r#"{"success":true,"errors":[],"result":[{"id":"z1","name":"example.com","status":"active"}]}"#;
        let env: Envelope<Vec<Zone>> = serde_json::from_str(body).unwrap();
        assert!(env.success);
        assert_eq!(env.result.unwrap()[0].id, "z1");
    }

    #[test]
    fn test_envelope_error_messages() {
        let body = r#"{"success":false,"errors":[{"code":9109,"message":"Invalid access token"}],"result":null}"#;
        let env: Envelope<Vec<Zone>> = serde_json::from_str(body).unwrap();
        assert!(!env.success);
        assert_eq!(env.errors[0].message, "Invalid access token");
        assert_eq!(env.errors[0].code, 9109);
    }

    #[test]
    fn test_envelope_missing_errors_field() {
        let body = r#"{"success":true,"result":"tok"}"#;
        let env: Envelope<String> = serde_json::from_str(body).unwrap();
        assert_eq!(env.result.as_deref(), Some("tok"));
        assert!(env.errors.is_empty());
    }
}
