//! Sealed-box encryption and secret upload.
//!
//! Secrets are encrypted client-side with the repository's current public
//! key using anonymous sealed boxes: no sender identity is embedded and
//! only the holder of the matching private key can open the payload.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use crypto_box::aead::OsRng;
use crypto_box::PublicKey;
use tracing::trace;

use super::{Client, RepoRef};
use crate::error::{OpsError, Result};

/// Seal a value against a base64-encoded X25519 public key, returning the
/// base64-encoded ciphertext.
pub fn seal(public_key_b64: &str, value: &str) -> Result<String> {
    let key_bytes = BASE64
        .decode(public_key_b64)
        .map_err(|e| OpsError::Encrypt(format!("bad public key encoding: {}", e)))?;
    let key_bytes: [u8; 32] = key_bytes
        .as_slice()
        .try_into()
        .map_err(|_| OpsError::Encrypt("public key must be 32 bytes".to_string()))?;

    let public_key = PublicKey::from(key_bytes);
    let sealed = public_key
        .seal(&mut OsRng, value.as_bytes())
        .map_err(|e| OpsError::Encrypt(e.to_string()))?;

    trace!(plaintext_len = value.len(), sealed_len = sealed.len(), "sealed secret");
    Ok(BASE64.encode(sealed))
}

/// Encrypt and upload one secret.
///
/// The public key is fetched immediately before encryption because it
/// rotates server-side; a stale key would be rejected by the store.
pub fn upload(client: &Client, repo: &RepoRef, name: &str, value: &str) -> Result<()> {
    let key = client.public_key(repo)?;
    let encrypted = seal(&key.key, value)?;
    client.put_secret(repo, name, &encrypted, &key.key_id)
}

/// Outcome of one item in a batch upload.
#[derive(Debug)]
pub struct ItemOutcome {
    pub name: String,
    pub error: Option<String>,
}

/// Per-item results of a batch upload, reduced into a summary at the end.
/// Failed items never roll back the ones that already succeeded.
#[derive(Debug, Default)]
pub struct UploadReport {
    pub items: Vec<ItemOutcome>,
}

impl UploadReport {
    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn failed(&self) -> usize {
        self.items.iter().filter(|i| i.error.is_some()).count()
    }

    pub fn succeeded(&self) -> usize {
        self.total() - self.failed()
    }

    /// Non-zero exit when any item failed.
    pub fn into_result(self) -> Result<()> {
        let failed = self.failed();
        if failed == 0 {
            Ok(())
        } else {
            Err(OpsError::Partial {
                failed,
                total: self.total(),
            })
        }
    }
}

/// Upload a batch of secrets strictly sequentially, one item to completion
/// before the next. Errors are recorded per item and never abort the batch.
pub fn push<F>(
    client: &Client,
    repo: &RepoRef,
    items: &[(String, String)],
    mut progress: F,
) -> UploadReport
where
    F: FnMut(usize, &str, Option<&str>),
{
    let mut report = UploadReport::default();

    for (i, (name, value)) in items.iter().enumerate() {
        let outcome = upload(client, repo, name, value);
        let error = outcome.err().map(|e| e.to_string());
        progress(i, name, error.as_deref());
        report.items.push(ItemOutcome {
            name: name.clone(),
            error,
        });
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto_box::SecretKey;

    #[test]
    fn test_seal_round_trip() {
        let secret_key = SecretKey::generate(&mut OsRng);
        let public_b64 = BASE64.encode(secret_key.public_key().as_bytes());

        let sealed_b64 = seal(&public_b64, "hunter2").unwrap();
        let sealed = BASE64.decode(sealed_b64).unwrap();
        let opened = secret_key.unseal(&sealed).unwrap();

        assert_eq!(opened, b"hunter2");
    }

    #[test]
    fn test_seal_output_is_nondeterministic() {
        let secret_key = SecretKey::generate(&mut OsRng);
        let public_b64 = BASE64.encode(secret_key.public_key().as_bytes());

        let a = seal(&public_b64, "same").unwrap();
        let b = seal(&public_b64, "same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_seal_rejects_bad_keys() {
        assert!(seal("not base64!!!", "v").is_err());
        assert!(seal(&BASE64.encode([0u8; 16]), "v").is_err());
    }

    #[test]
    fn test_report_counts() {
        let report = UploadReport {
            items: vec![
                ItemOutcome {
                    name: "A".to_string(),
                    error: None,
                },
                ItemOutcome {
                    name: "B".to_string(),
                    error: Some("upload failed (403)".to_string()),
                },
            ],
        };
        assert_eq!(report.total(), 2);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert!(report.into_result().is_err());
    }

    #[test]
    fn test_report_all_ok() {
        let report = UploadReport {
            items: vec![ItemOutcome {
                name: "A".to_string(),
                error: None,
            }],
        };
        assert!(report.into_result().is_ok());
    }
}
