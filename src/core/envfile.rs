//! Line-oriented `KEY=VALUE` environment file handling.
//!
//! The env file is the only local state these tools touch: credentials and
//! server addresses are read from it, and tunnel tokens may be appended to
//! it. Comments (`#`) and blank lines are ignored, surrounding quotes are
//! stripped, and empty values are skipped.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::{OpsError, Result};

/// Parsed env file contents, in file order.
#[derive(Debug, Default, Clone)]
pub struct EnvFile {
    path: PathBuf,
    entries: Vec<(String, String)>,
}

impl EnvFile {
    /// Load and parse an env file. The file must exist.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| OpsError::EnvFile(format!("{}: {}", path.display(), e)))?;
        let entries = parse(&contents);
        debug!(path = %path.display(), entries = entries.len(), "loaded env file");
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Load an env file if it exists; otherwise return an empty set.
    ///
    /// Used for credential fallback, where a missing file just means there
    /// is nothing to fall back to.
    pub fn load_optional(path: &Path) -> Self {
        if path.exists() {
            match Self::load(path) {
                Ok(env) => env,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "env file exists but is unreadable, continuing without it");
                    Self {
                        path: path.to_path_buf(),
                        entries: Vec::new(),
                    }
                }
            }
        } else {
            Self {
                path: path.to_path_buf(),
                entries: Vec::new(),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Discover server IPs by the suffix convention: keys ending in `_V4`
    /// or `_V6`, excluding SSH-related variables, with any CIDR suffix
    /// stripped from the value.
    pub fn server_ips(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter(|(k, _)| (k.ends_with("_V4") || k.ends_with("_V6")) && !k.contains("_SSH"))
            .map(|(k, v)| {
                let ip = v.split('/').next().unwrap_or(v).to_string();
                (k.clone(), ip)
            })
            .filter(|(_, ip)| !ip.is_empty())
            .collect()
    }

    /// Discover service hostnames: keys ending in `_DOMAIN`.
    pub fn service_domains(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter(|(k, _)| k.ends_with("_DOMAIN"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Append a `KEY="value"` line with a dated comment. Append-only:
    /// existing lines are never rewritten, so a re-run adds a second line
    /// and the later one wins on load.
    pub fn append(&self, label: &str, key: &str, value: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| OpsError::EnvFile(format!("{}: {}", self.path.display(), e)))?;

        writeln!(
            file,
            "\n# {} ({})\n{}=\"{}\"",
            label,
            Utc::now().format("%Y-%m-%d %H:%M UTC"),
            key,
            value
        )
        .map_err(|e| OpsError::EnvFile(format!("{}: {}", self.path.display(), e)))?;

        Ok(())
    }
}

/// Parse env file contents into ordered key/value pairs.
///
/// Later assignments shadow earlier ones on lookup through [`EnvFile::get`]
/// only via first-match, so duplicates are dropped here, keeping the last.
fn parse(contents: &str) -> Vec<(String, String)> {
    let mut entries: Vec<(String, String)> = Vec::new();

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Tolerate shell-style "export KEY=VALUE" lines
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };

        let key = key.trim();
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
            .unwrap_or(value);

        if key.is_empty() || value.is_empty() {
            continue;
        }

        if let Some(slot) = entries.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value.to_string();
        } else {
            entries.push((key.to_string(), value.to_string()));
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_from(contents: &str) -> EnvFile {
        EnvFile {
            path: PathBuf::from(".env"),
            entries: parse(contents),
        }
    }

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let env = env_from("# comment\n\nFOO=bar\n  # indented comment\nBAZ=qux\n");
        assert_eq!(env.get("FOO"), Some("bar"));
        assert_eq!(env.get("BAZ"), Some("qux"));
        assert_eq!(env.entries().len(), 2);
    }

    #[test]
    fn test_parse_strips_quotes() {
        let env = env_from("A=\"double\"\nB='single'\nC=plain\n");
        assert_eq!(env.get("A"), Some("double"));
        assert_eq!(env.get("B"), Some("single"));
        assert_eq!(env.get("C"), Some("plain"));
    }

    #[test]
    fn test_parse_skips_empty_values() {
        let env = env_from("EMPTY=\nSET=1\n");
        assert_eq!(env.get("EMPTY"), None);
        assert_eq!(env.get("SET"), Some("1"));
    }

    #[test]
    fn test_parse_handles_export_prefix_and_duplicates() {
        let env = env_from("export TOKEN=\"first\"\nTOKEN=second\n");
        assert_eq!(env.get("TOKEN"), Some("second"));
        assert_eq!(env.entries().len(), 1);
    }

    #[test]
    fn test_server_ip_discovery() {
        let env = env_from(
            "WEB1_V4=203.0.113.10/24\nWEB2_V6=2001:db8::1\nWEB1_SSH_V4=203.0.113.99\nOTHER=x\n",
        );
        let ips = env.server_ips();
        assert_eq!(
            ips,
            vec![
                ("WEB1_V4".to_string(), "203.0.113.10".to_string()),
                ("WEB2_V6".to_string(), "2001:db8::1".to_string()),
            ]
        );
    }

    #[test]
    fn test_service_domain_discovery() {
        let env = env_from("GRAFANA_DOMAIN=grafana.example.com\nLOKI_DOMAIN=loki.example.com\n");
        let domains = env.service_domains();
        assert_eq!(domains.len(), 2);
        assert_eq!(domains[0].1, "grafana.example.com");
    }

    #[test]
    fn test_append_then_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "EXISTING=1\n").unwrap();

        let env = EnvFile::load(&path).unwrap();
        env.append("Tunnel token (my-tunnel)", "TUNNEL_TOKEN", "tok-abc").unwrap();

        let reloaded = EnvFile::load(&path).unwrap();
        assert_eq!(reloaded.get("EXISTING"), Some("1"));
        assert_eq!(reloaded.get("TUNNEL_TOKEN"), Some("tok-abc"));
    }

    #[test]
    fn test_load_optional_missing_file() {
        let env = EnvFile::load_optional(Path::new("/nonexistent/.env"));
        assert!(env.is_empty());
    }

    #[test]
    fn test_load_optional_unreadable_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        // Not valid UTF-8, so the read itself fails
        std::fs::write(&path, [0xff, 0xfe, b'A', b'=', 0xff]).unwrap();

        let env = EnvFile::load_optional(&path);
        assert!(env.is_empty());
        assert_eq!(env.path(), path.as_path());
    }
}
