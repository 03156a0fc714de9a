//! DNS record endpoints and the zone-scoped record store.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Client;
use crate::core::reconcile::{DesiredRecord, RecordStore};
use crate::error::{OpsError, Result};

/// A DNS record as returned by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct DnsRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    #[serde(default)]
    pub proxied: bool,
    #[serde(default)]
    pub ttl: u32,
}

/// Write payload for create and update calls.
#[derive(Debug, Serialize)]
struct RecordPayload<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    name: &'a str,
    content: &'a str,
    proxied: bool,
    ttl: u32,
}

impl<'a> From<&'a DesiredRecord> for RecordPayload<'a> {
    fn from(desired: &'a DesiredRecord) -> Self {
        Self {
            kind: &desired.kind,
            name: &desired.name,
            content: &desired.content,
            proxied: desired.proxied,
            ttl: desired.effective_ttl(),
        }
    }
}

impl Client {
    /// List records in a zone, optionally filtered by name and/or type.
    pub fn list_records(
        &self,
        zone: &str,
        name: Option<&str>,
        kind: Option<&str>,
    ) -> Result<Vec<DnsRecord>> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(name) = name {
            query.push(("name", name));
        }
        if let Some(kind) = kind {
            query.push(("type", kind));
        }

        let req = self
            .request(Method::GET, &format!("/zones/{}/dns_records", zone))
            .query(&query);
        self.send(req)
    }

    pub fn create_record(&self, zone: &str, desired: &DesiredRecord) -> Result<DnsRecord> {
        let req = self
            .request(Method::POST, &format!("/zones/{}/dns_records", zone))
            .json(&RecordPayload::from(desired));
        self.send(req)
    }

    pub fn update_record(&self, zone: &str, id: &str, desired: &DesiredRecord) -> Result<DnsRecord> {
        let req = self
            .request(Method::PUT, &format!("/zones/{}/dns_records/{}", zone, id))
            .json(&RecordPayload::from(desired));
        self.send(req)
    }

    pub fn delete_record(&self, zone: &str, id: &str) -> Result<()> {
        let req = self.request(Method::DELETE, &format!("/zones/{}/dns_records/{}", zone, id));
        self.send_unit(req)
    }

    /// Flip the proxy flag on the first record matching a name, keeping its
    /// other attributes. The ttl is forced to automatic while proxied.
    pub fn set_proxied(&self, zone: &str, name: &str, proxied: bool) -> Result<DnsRecord> {
        let records = self.list_records(zone, Some(name), None)?;
        let Some(existing) = records.into_iter().next() else {
            return Err(OpsError::RecordNotFound(name.to_string()));
        };

        debug!(name, proxied, "toggling proxy flag");
        let desired = DesiredRecord {
            name: existing.name,
            kind: existing.kind,
            content: existing.content,
            proxied,
            ttl: existing.ttl,
        };
        self.update_record(zone, &existing.id, &desired)
    }
}

/// A zone-scoped view of the record collection implementing the
/// reconciliation contract.
pub struct ZoneRecords<'a> {
    client: &'a Client,
    zone: &'a str,
}

impl<'a> ZoneRecords<'a> {
    pub fn new(client: &'a Client, zone: &'a str) -> Self {
        Self { client, zone }
    }
}

impl RecordStore for ZoneRecords<'_> {
    fn find(&mut self, name: &str, kind: &str) -> Result<Option<String>> {
        let records = self.client.list_records(self.zone, Some(name), Some(kind))?;
        // First match wins; duplicates are a documented limitation.
        Ok(records.into_iter().next().map(|r| r.id))
    }

    fn create(&mut self, desired: &DesiredRecord) -> Result<()> {
        self.client.create_record(self.zone, desired).map(|_| ())
    }

    fn update(&mut self, id: &str, desired: &DesiredRecord) -> Result<()> {
        self.client.update_record(self.zone, id, desired).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_payload_forces_ttl_when_proxied() {
        let desired = DesiredRecord {
            name: "a.example.com".to_string(),
            kind: "A".to_string(),
            content: "1.2.3.4".to_string(),
            proxied: true,
            ttl: 3600,
        };
        let payload = RecordPayload::from(&desired);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["ttl"], 1);
        assert_eq!(json["type"], "A");
        assert_eq!(json["proxied"], true);
    }

    #[test]
    fn test_record_payload_keeps_ttl_when_direct() {
        let desired = DesiredRecord {
            name: "a.example.com".to_string(),
            kind: "A".to_string(),
            content: "1.2.3.4".to_string(),
            proxied: false,
            ttl: 3600,
        };
        let json = serde_json::to_value(&RecordPayload::from(&desired)).unwrap();
        assert_eq!(json["ttl"], 3600);
    }

    #[test]
    fn test_record_decodes_with_defaults() {
        let body = r#"{"id":"r1","name":"a.example.com","type":"A","content":"1.2.3.4"}"#;
        let record: DnsRecord = serde_json::from_str(body).unwrap();
        assert!(!record.proxied);
        assert_eq!(record.ttl, 0);
        assert_eq!(record.kind, "A");
    }
}
