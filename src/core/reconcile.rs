//! Lookup-then-write reconciliation for remote declarative resources.
//!
//! The contract: look the resource up by its key fields; update it in place
//! if a match exists, create it otherwise. The two steps are not
//! transactional and nothing locks the remote collection, so concurrent
//! invocations against the same key can duplicate a create or lose an
//! update; callers must serialize externally.
//!
//! When multiple remote records match a (name, type) filter only the first
//! returned is acted upon. The upstream API does not promise uniqueness;
//! this is a documented limitation, not something we reconcile away.

use tracing::debug;

use crate::error::Result;

/// Sentinel ttl meaning "automatic", required by the provider whenever a
/// record is proxied.
pub const TTL_AUTO: u32 = 1;

/// Desired state of a DNS record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredRecord {
    /// Fully qualified record name, e.g. `grafana.example.com`.
    pub name: String,
    /// Record type, e.g. `A`, `AAAA`, `CNAME`.
    pub kind: String,
    /// Target value, e.g. an IP address.
    pub content: String,
    /// Route through the provider's edge proxy.
    pub proxied: bool,
    /// Requested ttl; ignored when proxied.
    pub ttl: u32,
}

impl DesiredRecord {
    /// The ttl that is actually applied: proxied records always get the
    /// automatic sentinel regardless of the requested value.
    pub fn effective_ttl(&self) -> u32 {
        if self.proxied {
            TTL_AUTO
        } else {
            self.ttl
        }
    }
}

/// Remote operations a reconcilable record collection must expose.
pub trait RecordStore {
    /// Find an existing record by key fields, returning its identifier.
    /// When several match, the first returned wins.
    fn find(&mut self, name: &str, kind: &str) -> Result<Option<String>>;

    /// Create a record from the desired state.
    fn create(&mut self, desired: &DesiredRecord) -> Result<()>;

    /// Update the record with the given identifier to the desired state.
    fn update(&mut self, id: &str, desired: &DesiredRecord) -> Result<()>;
}

/// What a reconcile call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Created,
    Updated,
}

/// Reconcile the desired record against the remote collection.
///
/// Any non-success remote response aborts and surfaces the remote error
/// verbatim; nothing is retried.
pub fn reconcile(store: &mut dyn RecordStore, desired: &DesiredRecord) -> Result<Applied> {
    match store.find(&desired.name, &desired.kind)? {
        Some(id) => {
            debug!(name = %desired.name, kind = %desired.kind, %id, "updating existing record");
            store.update(&id, desired)?;
            Ok(Applied::Updated)
        }
        None => {
            debug!(name = %desired.name, kind = %desired.kind, "creating record");
            store.create(desired)?;
            Ok(Applied::Created)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct StoredRecord {
        id: String,
        name: String,
        kind: String,
        content: String,
        proxied: bool,
        ttl: u32,
    }

    #[derive(Default)]
    struct MemoryStore {
        records: Vec<StoredRecord>,
        next_id: u32,
    }

    impl MemoryStore {
        fn applied(&self, desired: &DesiredRecord, id: String) -> StoredRecord {
            StoredRecord {
                id,
                name: desired.name.clone(),
                kind: desired.kind.clone(),
                content: desired.content.clone(),
                proxied: desired.proxied,
                ttl: desired.effective_ttl(),
            }
        }
    }

    impl RecordStore for MemoryStore {
        fn find(&mut self, name: &str, kind: &str) -> Result<Option<String>> {
            Ok(self
                .records
                .iter()
                .find(|r| r.name == name && r.kind == kind)
                .map(|r| r.id.clone()))
        }

        fn create(&mut self, desired: &DesiredRecord) -> Result<()> {
            self.next_id += 1;
            let rec = self.applied(desired, format!("rec-{}", self.next_id));
            self.records.push(rec);
            Ok(())
        }

        fn update(&mut self, id: &str, desired: &DesiredRecord) -> Result<()> {
            let rec = self.applied(desired, id.to_string());
            let slot = self
                .records
                .iter_mut()
                .find(|r| r.id == id)
                .expect("update of unknown id");
            *slot = rec;
            Ok(())
        }
    }

    fn desired(content: &str, proxied: bool, ttl: u32) -> DesiredRecord {
        DesiredRecord {
            name: "a.example.com".to_string(),
            kind: "A".to_string(),
            content: content.to_string(),
            proxied,
            ttl,
        }
    }

    #[test]
    fn test_proxied_forces_automatic_ttl() {
        assert_eq!(desired("1.2.3.4", true, 3600).effective_ttl(), TTL_AUTO);
        assert_eq!(desired("1.2.3.4", false, 3600).effective_ttl(), 3600);
    }

    #[test]
    fn test_reconcile_creates_when_absent() {
        let mut store = MemoryStore::default();
        let applied = reconcile(&mut store, &desired("1.2.3.4", true, 300)).unwrap();

        assert_eq!(applied, Applied::Created);
        assert_eq!(store.records.len(), 1);
        assert_eq!(store.records[0].ttl, TTL_AUTO);
        assert!(store.records[0].proxied);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut store = MemoryStore::default();
        let want = desired("1.2.3.4", true, 300);

        assert_eq!(reconcile(&mut store, &want).unwrap(), Applied::Created);
        assert_eq!(reconcile(&mut store, &want).unwrap(), Applied::Updated);
        assert_eq!(store.records.len(), 1);
    }

    #[test]
    fn test_reconcile_updates_content_in_place() {
        // End-to-end scenario: create proxied, then change the target.
        let mut store = MemoryStore::default();

        reconcile(&mut store, &desired("1.2.3.4", true, 300)).unwrap();
        let applied = reconcile(&mut store, &desired("5.6.7.8", true, 300)).unwrap();

        assert_eq!(applied, Applied::Updated);
        assert_eq!(store.records.len(), 1);
        assert_eq!(store.records[0].content, "5.6.7.8");
        assert_eq!(store.records[0].ttl, TTL_AUTO);
    }

    #[test]
    fn test_first_match_wins_with_duplicates() {
        let mut store = MemoryStore::default();
        store.records.push(StoredRecord {
            id: "dup-1".to_string(),
            name: "a.example.com".to_string(),
            kind: "A".to_string(),
            content: "1.1.1.1".to_string(),
            proxied: false,
            ttl: 300,
        });
        store.records.push(StoredRecord {
            id: "dup-2".to_string(),
            name: "a.example.com".to_string(),
            kind: "A".to_string(),
            content: "2.2.2.2".to_string(),
            proxied: false,
            ttl: 300,
        });

        reconcile(&mut store, &desired("9.9.9.9", false, 300)).unwrap();

        assert_eq!(store.records[0].content, "9.9.9.9");
        assert_eq!(store.records[1].content, "2.2.2.2");
    }

    #[test]
    fn test_different_kind_creates_second_record() {
        let mut store = MemoryStore::default();
        reconcile(&mut store, &desired("1.2.3.4", false, 300)).unwrap();

        let aaaa = DesiredRecord {
            kind: "AAAA".to_string(),
            content: "2001:db8::1".to_string(),
            ..desired("", false, 300)
        };
        reconcile(&mut store, &aaaa).unwrap();

        assert_eq!(store.records.len(), 2);
    }
}
