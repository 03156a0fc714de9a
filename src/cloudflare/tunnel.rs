//! Tunnel endpoints, scoped to an account identifier.
//!
//! A tunnel's connection token is retrievable in full through the token
//! endpoint; each retrieval is a distinct re-authorized API call, never a
//! cached read. Callers must persist the token immediately after creation.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Client;
use crate::error::Result;

/// A tunnel as returned by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct Tunnel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub connections: Vec<TunnelConnection>,
}

/// One active edge connection of a tunnel.
#[derive(Debug, Clone, Deserialize)]
pub struct TunnelConnection {
    #[serde(default)]
    pub colo_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreatePayload<'a> {
    name: &'a str,
    config_src: &'a str,
}

/// Whether `ensure_tunnel` found or made the tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ensured {
    Existing,
    Created,
}

impl Client {
    pub fn list_tunnels(&self, account: &str) -> Result<Vec<Tunnel>> {
        let req = self.request(Method::GET, &format!("/accounts/{}/cfd_tunnel", account));
        self.send(req)
    }

    pub fn create_tunnel(&self, account: &str, name: &str) -> Result<Tunnel> {
        let payload = CreatePayload {
            name,
            config_src: "cloudflare",
        };
        let req = self
            .request(Method::POST, &format!("/accounts/{}/cfd_tunnel", account))
            .json(&payload);
        self.send(req)
    }

    pub fn delete_tunnel(&self, account: &str, id: &str) -> Result<()> {
        let req = self.request(Method::DELETE, &format!("/accounts/{}/cfd_tunnel/{}", account, id));
        self.send_unit(req)
    }

    /// Fetch the connection token. A fresh call every time; the result is
    /// never cached locally.
    pub fn tunnel_token(&self, account: &str, id: &str) -> Result<String> {
        let req = self.request(
            Method::GET,
            &format!("/accounts/{}/cfd_tunnel/{}/token", account, id),
        );
        self.send(req)
    }

    /// Lookup-then-create by name: the tunnel variant of the reconcile
    /// pattern. An existing tunnel with the requested name is reused, so a
    /// re-run never duplicates it. First name match wins.
    pub fn ensure_tunnel(&self, account: &str, name: &str) -> Result<(Tunnel, Ensured)> {
        let existing = self
            .list_tunnels(account)?
            .into_iter()
            .find(|t| t.name == name);

        match existing {
            Some(tunnel) => {
                debug!(%name, id = %tunnel.id, "tunnel already exists, reusing");
                Ok((tunnel, Ensured::Existing))
            }
            None => {
                debug!(%name, "creating tunnel");
                let tunnel = self.create_tunnel(account, name)?;
                Ok((tunnel, Ensured::Created))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tunnel_decodes_minimal_payload() {
        let body = r#"{"id":"t1","name":"edge"}"#;
        let tunnel: Tunnel = serde_json::from_str(body).unwrap();
        assert_eq!(tunnel.id, "t1");
        assert!(tunnel.status.is_none());
        assert!(tunnel.connections.is_empty());
    }

    #[test]
    fn test_tunnel_decodes_connections() {
        let body = r#"{"id":"t1","name":"edge","status":"healthy","created_at":"2026-01-01T00:00:00Z","connections":[{"colo_name":"AMS"},{}]}"#;
        let tunnel: Tunnel = serde_json::from_str(body).unwrap();
        assert_eq!(tunnel.connections.len(), 2);
        assert_eq!(tunnel.connections[0].colo_name.as_deref(), Some("AMS"));
    }

    #[test]
    fn test_create_payload_shape() {
        let payload = CreatePayload {
            name: "edge",
            config_src: "cloudflare",
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["name"], "edge");
        assert_eq!(json["config_src"], "cloudflare");
    }
}
