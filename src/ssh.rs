//! Two-tier SSH public key deployment and key pair management.
//!
//! Tier one shells out to `sshpass` + `ssh-copy-id`, the standard key-copy
//! tooling. On any failure there (tool missing, non-zero exit) tier two
//! opens a password-authenticated session and installs the key by hand:
//! ensure `~/.ssh` exists with mode 700, ensure `authorized_keys` exists
//! with mode 600, and append the key line only if an exact substring match
//! does not find it already. Append-if-absent makes a repeat deploy a
//! no-op, but the check-then-append is not atomic across concurrent runs.

use std::io::Read;
use std::net::{IpAddr, SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use ssh2::Session;
use tracing::{debug, trace};

use crate::core::validation::{self, bare_host};
use crate::error::{OpsError, Result};

/// Fixed timeout for the fallback SSH session (connect and per-call).
const SSH_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_PORT: u16 = 22;
pub const DEFAULT_USER: &str = "root";

/// A validated deployment target.
#[derive(Debug, Clone)]
pub struct Target {
    pub host: IpAddr,
    pub port: u16,
    pub user: String,
}

impl Target {
    /// Build a target from a raw host literal, validating the address
    /// family before any network attempt.
    pub fn new(host: &str, port: u16, user: &str) -> Result<Self> {
        validation::classify_host(host)?;
        let host = bare_host(host)
            .parse::<IpAddr>()
            .map_err(|_| OpsError::InvalidHost(host.to_string()))?;
        Ok(Self {
            host,
            port,
            user: user.to_string(),
        })
    }

    /// Parse a `HOST` or `HOST:PORT` line (bracketed IPv6 for the latter).
    pub fn parse_line(line: &str, user: &str) -> Result<Self> {
        let line = line.trim();

        if let Some(rest) = line.strip_prefix('[') {
            // [v6] or [v6]:port
            let Some((host, tail)) = rest.split_once(']') else {
                return Err(OpsError::InvalidHost(line.to_string()));
            };
            let port = match tail.strip_prefix(':') {
                Some(p) => p
                    .parse::<u16>()
                    .map_err(|_| OpsError::InvalidHost(line.to_string()))?,
                None if tail.is_empty() => DEFAULT_PORT,
                None => return Err(OpsError::InvalidHost(line.to_string())),
            };
            return Self::new(host, port, user);
        }

        // v4:port: exactly one colon and a numeric tail
        if line.matches(':').count() == 1 {
            if let Some((host, port)) = line.rsplit_once(':') {
                if let Ok(port) = port.parse::<u16>() {
                    if host.parse::<std::net::Ipv4Addr>().is_ok() {
                        return Self::new(host, port, user);
                    }
                }
            }
        }

        Self::new(line, DEFAULT_PORT, user)
    }

    fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Host formatted for an `ssh` command line.
    fn ssh_host(&self) -> String {
        match self.host {
            IpAddr::V4(v4) => v4.to_string(),
            IpAddr::V6(v6) => v6.to_string(),
        }
    }
}

/// What a deploy actually did on the remote host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployOutcome {
    /// Key line appended (or installed by ssh-copy-id).
    Installed,
    /// Exact key line already present; nothing written.
    AlreadyPresent,
}

/// Minimal remote command execution surface, so the install logic can be
/// tested without a live host.
pub trait RemoteShell {
    /// Run a command, returning its exit code and stdout.
    fn exec(&mut self, cmd: &str) -> Result<(i32, String)>;
}

/// `RemoteShell` over a password-authenticated ssh2 session.
pub struct Ssh2Shell {
    session: Session,
}

impl Ssh2Shell {
    pub fn connect(target: &Target, password: &str) -> Result<Self> {
        debug!(host = %target.host, port = target.port, "opening ssh session");
        let tcp = TcpStream::connect_timeout(&target.addr(), SSH_TIMEOUT)?;

        let mut session = Session::new()?;
        session.set_timeout(SSH_TIMEOUT.as_millis() as u32);
        session.set_tcp_stream(tcp);
        session.handshake()?;
        session.userauth_password(&target.user, password)?;

        Ok(Self { session })
    }
}

impl RemoteShell for Ssh2Shell {
    fn exec(&mut self, cmd: &str) -> Result<(i32, String)> {
        trace!(%cmd, "remote exec");
        let mut channel = self.session.channel_session()?;
        channel.exec(cmd)?;

        let mut stdout = String::new();
        channel.read_to_string(&mut stdout)?;
        channel.wait_close()?;
        let code = channel.exit_status()?;

        Ok((code, stdout))
    }
}

/// Quote a string for a POSIX shell single-quoted context.
fn sh_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

fn check_cmd(public_key: &str) -> String {
    format!("grep -F {} ~/.ssh/authorized_keys", sh_quote(public_key))
}

fn append_cmd(public_key: &str) -> String {
    format!("echo {} >> ~/.ssh/authorized_keys", sh_quote(public_key))
}

/// Commands that make sure the key file exists with the right modes.
const SETUP_CMDS: [&str; 4] = [
    "mkdir -p ~/.ssh",
    "chmod 700 ~/.ssh",
    "touch ~/.ssh/authorized_keys",
    "chmod 600 ~/.ssh/authorized_keys",
];

/// Install a public key line into the remote `authorized_keys`, appending
/// only if an exact substring match does not already find it.
pub fn ensure_key(shell: &mut dyn RemoteShell, public_key: &str) -> Result<DeployOutcome> {
    for cmd in SETUP_CMDS {
        let (code, _) = shell.exec(cmd)?;
        if code != 0 {
            return Err(OpsError::Deploy(format!("remote `{}` exited with {}", cmd, code)));
        }
    }

    let (code, _) = shell.exec(&check_cmd(public_key))?;
    if code == 0 {
        debug!("public key already present, skipping append");
        return Ok(DeployOutcome::AlreadyPresent);
    }

    let (code, _) = shell.exec(&append_cmd(public_key))?;
    if code != 0 {
        return Err(OpsError::Deploy(format!(
            "appending to authorized_keys exited with {}",
            code
        )));
    }

    Ok(DeployOutcome::Installed)
}

/// Tier one: `sshpass` + `ssh-copy-id`. Returns `Ok(false)` when the tools
/// are unavailable or the copy fails, so the caller can fall back.
pub fn try_ssh_copy_id(target: &Target, password: &str, key_file: &Path) -> Result<bool> {
    if which::which("sshpass").is_err() || which::which("ssh-copy-id").is_err() {
        debug!("sshpass or ssh-copy-id not found, falling back to session deploy");
        return Ok(false);
    }

    let status = Command::new("sshpass")
        .arg("-p")
        .arg(password)
        .arg("ssh-copy-id")
        .arg("-i")
        .arg(key_file)
        .arg("-p")
        .arg(target.port.to_string())
        .args(["-o", "StrictHostKeyChecking=no"])
        .args(["-o", "UserKnownHostsFile=/dev/null"])
        .arg(format!("{}@{}", target.user, target.ssh_host()))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(s) if s.success() => Ok(true),
        Ok(s) => {
            debug!(code = ?s.code(), "ssh-copy-id failed, falling back");
            Ok(false)
        }
        Err(e) => {
            debug!(error = %e, "ssh-copy-id could not run, falling back");
            Ok(false)
        }
    }
}

/// Deploy a public key to one host: ssh-copy-id first, manual session
/// install on any failure. Single attempt, no retry.
pub fn deploy(
    target: &Target,
    password: &str,
    key_file: &Path,
    public_key: &str,
) -> Result<DeployOutcome> {
    if try_ssh_copy_id(target, password, key_file)? {
        return Ok(DeployOutcome::Installed);
    }

    let mut shell = Ssh2Shell::connect(target, password)?;
    ensure_key(&mut shell, public_key)
}

/// Default private key path (`~/.ssh/id_rsa`).
pub fn default_key_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ssh")
        .join("id_rsa")
}

/// Read and validate a public key file.
pub fn read_public_key(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path)?;
    let content = content.trim().to_string();
    validation::validate_public_key(&content)?;
    Ok(content)
}

/// Read and validate a private key file.
pub fn read_private_key(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path)?;
    validation::validate_private_key(&content)?;
    Ok(content)
}

/// Generate a new RSA-4096 key pair with `ssh-keygen`, no passphrase.
pub fn generate_keypair(path: &Path, comment: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700))?;
        }
    }

    let output = Command::new("ssh-keygen")
        .args(["-t", "rsa", "-b", "4096"])
        .arg("-C")
        .arg(comment)
        .arg("-f")
        .arg(path)
        .args(["-N", ""])
        .output()
        .map_err(|e| OpsError::Deploy(format!("failed to run ssh-keygen: {}", e)))?;

    if !output.status.success() {
        return Err(OpsError::Deploy(format!(
            "ssh-keygen failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        let pub_path = path.with_extension("pub");
        if pub_path.exists() {
            std::fs::set_permissions(pub_path, std::fs::Permissions::from_mode(0o644))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Simulates a remote host with an in-memory authorized_keys file,
    /// interpreting exactly the commands `ensure_key` issues.
    struct FakeShell {
        key: String,
        authorized_keys: String,
        ssh_dir_exists: bool,
    }

    impl FakeShell {
        fn new(key: &str) -> Self {
            Self {
                key: key.to_string(),
                authorized_keys: String::new(),
                ssh_dir_exists: false,
            }
        }
    }

    impl RemoteShell for FakeShell {
        fn exec(&mut self, cmd: &str) -> Result<(i32, String)> {
            if cmd == "mkdir -p ~/.ssh" {
                self.ssh_dir_exists = true;
                return Ok((0, String::new()));
            }
            if cmd.starts_with("chmod") || cmd.starts_with("touch") {
                assert!(self.ssh_dir_exists, "setup out of order: {}", cmd);
                return Ok((0, String::new()));
            }
            if cmd == check_cmd(&self.key) {
                let found = self.authorized_keys.contains(&self.key);
                return Ok((if found { 0 } else { 1 }, String::new()));
            }
            if cmd == append_cmd(&self.key) {
                self.authorized_keys.push_str(&self.key);
                self.authorized_keys.push('\n');
                return Ok((0, String::new()));
            }
            panic!("unexpected command: {}", cmd);
        }
    }

    const KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAI ops@host";

    #[test]
    fn test_ensure_key_appends_when_absent() {
        let mut shell = FakeShell::new(KEY);
        let outcome = ensure_key(&mut shell, KEY).unwrap();

        assert_eq!(outcome, DeployOutcome::Installed);
        assert_eq!(shell.authorized_keys.matches(KEY).count(), 1);
    }

    #[test]
    fn test_ensure_key_is_idempotent() {
        let mut shell = FakeShell::new(KEY);
        ensure_key(&mut shell, KEY).unwrap();
        let second = ensure_key(&mut shell, KEY).unwrap();

        assert_eq!(second, DeployOutcome::AlreadyPresent);
        assert_eq!(shell.authorized_keys.matches(KEY).count(), 1);
    }

    #[test]
    fn test_sh_quote_escapes_single_quotes() {
        assert_eq!(sh_quote("plain"), "'plain'");
        assert_eq!(sh_quote("it's"), "'it'\\''s'");
    }

    #[test]
    fn test_target_validates_host() {
        assert!(Target::new("192.168.1.1", 22, "root").is_ok());
        assert!(Target::new("[::1]", 22, "root").is_ok());
        assert!(Target::new("999.1.1.1", 22, "root").is_err());
        assert!(Target::new("not-an-ip", 22, "root").is_err());
    }

    #[test]
    fn test_parse_line_with_port() {
        let t = Target::parse_line("203.0.113.10:2222", "ops").unwrap();
        assert_eq!(t.port, 2222);
        assert_eq!(t.user, "ops");

        let t = Target::parse_line("[2001:db8::1]:2200", "root").unwrap();
        assert_eq!(t.port, 2200);
    }

    #[test]
    fn test_parse_line_bare_hosts() {
        assert_eq!(Target::parse_line("203.0.113.10", "root").unwrap().port, DEFAULT_PORT);
        // Bare IPv6 has colons but is not a host:port pair
        assert_eq!(Target::parse_line("::1", "root").unwrap().port, DEFAULT_PORT);
    }

    #[test]
    fn test_parse_line_rejects_garbage() {
        assert!(Target::parse_line("203.0.113.10:notaport", "root").is_err());
        assert!(Target::parse_line("[::1", "root").is_err());
    }
}
