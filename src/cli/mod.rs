//! Command-line interface.

pub mod completions;
pub mod dns;
pub mod key;
pub mod menu;
pub mod output;
pub mod patch;
pub mod secrets;
pub mod tunnel;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::core::envfile::EnvFile;
use crate::error::Result;

/// Opskit - infrastructure bootstrap toolkit.
#[derive(Parser)]
#[command(
    name = "opskit",
    about = "DNS, tunnel, CI-secret and SSH-key bootstrapping in one binary",
    version
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Env file used for credential fallback and server discovery
    #[arg(long, global = true, default_value = ".env", value_name = "PATH")]
    pub env_file: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// DNS provider credentials. A bearer token wins over email + global key.
#[derive(Args, Debug, Clone, Default)]
pub struct CloudflareArgs {
    /// API bearer token
    #[arg(long, env = "CLOUDFLARE_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Account email (legacy email + global key auth)
    #[arg(long, env = "CLOUDFLARE_EMAIL")]
    pub email: Option<String>,

    /// Global API key (legacy email + global key auth)
    #[arg(long, env = "CLOUDFLARE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

/// CI provider credentials and repository.
#[derive(Args, Debug, Clone, Default)]
pub struct GithubArgs {
    /// API token (ghp_...)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Repository in owner/repo form
    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub repo: Option<String>,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Command {
    /// Manage DNS records and proxy flags
    Dns {
        #[command(flatten)]
        auth: CloudflareArgs,

        /// Zone id (selected from the zone list when omitted)
        #[arg(long, env = "CLOUDFLARE_ZONE_ID")]
        zone: Option<String>,

        #[command(subcommand)]
        action: DnsAction,
    },

    /// Create and provision secure tunnels
    Tunnel {
        #[command(flatten)]
        auth: CloudflareArgs,

        /// Account id
        #[arg(long, env = "CLOUDFLARE_ACCOUNT_ID")]
        account: Option<String>,

        #[command(subcommand)]
        action: TunnelAction,
    },

    /// Upload encrypted secrets to the CI store
    Secrets {
        #[command(flatten)]
        github: GithubArgs,

        #[command(subcommand)]
        action: SecretsAction,
    },

    /// Deploy, generate and upload SSH keys
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Patch Ansible's CLI entry module to run on Windows
    PatchAnsible {
        /// Virtualenv root containing the Ansible installation
        #[arg(long, default_value = "venv", value_name = "PATH")]
        venv: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

/// Desired state of one DNS record.
#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    /// Record name (e.g. api.example.com)
    pub name: String,

    /// Record content (e.g. 203.0.113.10)
    pub content: String,

    /// Record type
    #[arg(long = "type", value_name = "TYPE", default_value = "A")]
    pub kind: String,

    /// Serve through the proxy (forces automatic ttl)
    #[arg(long)]
    pub proxied: bool,

    /// Time to live in seconds (1 = automatic)
    #[arg(long, default_value_t = 1)]
    pub ttl: u32,
}

#[derive(Subcommand)]
pub enum DnsAction {
    /// List zones visible to the credentials
    Zones,

    /// List records in the zone
    List {
        /// Filter by record name
        #[arg(long)]
        name: Option<String>,
        /// Filter by record type
        #[arg(long = "type", value_name = "TYPE")]
        kind: Option<String>,
    },

    /// Create a record without checking for an existing one
    Add {
        #[command(flatten)]
        record: RecordArgs,
    },

    /// Create the record, or update the existing one to match
    Upsert {
        #[command(flatten)]
        record: RecordArgs,
    },

    /// Delete the first record matching a name
    Delete {
        /// Record name
        name: String,
        /// Restrict the match to a record type
        #[arg(long = "type", value_name = "TYPE")]
        kind: Option<String>,
    },

    /// Enable the proxy on the first record matching a name
    ProxyOn {
        /// Record name
        name: String,
    },

    /// Disable the proxy on the first record matching a name
    ProxyOff {
        /// Record name
        name: String,
    },

    /// Upsert proxied records for every *_DOMAIN entry in the env file
    FromEnv,
}

/// How a tunnel token gets onto the host that will run the connector.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployKind {
    /// Hand the token to an Ansible playbook
    Ansible,
    /// Store the token as a Kubernetes secret and apply manifests
    Kubernetes,
    /// Print the token once for manual installation
    Manual,
}

#[derive(Subcommand)]
pub enum TunnelAction {
    /// List tunnels in the account
    List,

    /// Create (or reuse) a tunnel and provision its connection token
    Create {
        /// Tunnel name
        name: String,

        /// Deployment backend for the token
        #[arg(long, value_enum, default_value_t = DeployKind::Manual)]
        deploy: DeployKind,

        /// Append the token to the env file
        #[arg(long)]
        save_env: bool,

        /// Run the deployment instead of printing instructions
        #[arg(long)]
        run: bool,

        /// Ansible inventory limit pattern
        #[arg(long)]
        limit: Option<String>,

        /// Directory of ordered Kubernetes manifests
        #[arg(long, default_value = "k8s", value_name = "DIR")]
        manifests: PathBuf,
    },

    /// Print a fresh connection token for an existing tunnel
    Token {
        /// Tunnel name
        name: String,
    },

    /// Delete a tunnel by name
    Delete {
        /// Tunnel name
        name: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum SecretsAction {
    /// Upload every env file entry as a repository secret
    Push {
        /// Env file to read (defaults to the global --env-file)
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,

        /// Skip entries whose key contains any of these substrings
        #[arg(long, value_name = "SUBSTRING")]
        exclude: Vec<String>,

        /// Show what would be uploaded without touching the network
        #[arg(long)]
        dry_run: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Reject invalid names instead of sanitizing them
        #[arg(long)]
        strict: bool,
    },

    /// Upload a single secret
    Put {
        /// Secret name
        name: String,

        /// Secret value (prompted when omitted)
        value: Option<String>,

        /// Reject an invalid name instead of sanitizing it
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Subcommand)]
pub enum KeyAction {
    /// Install the public key on remote hosts
    Deploy {
        /// Target hosts, HOST or HOST:PORT (env file *_V4/*_V6 entries when omitted)
        hosts: Vec<String>,

        /// Remote user
        #[arg(long, default_value = crate::ssh::DEFAULT_USER)]
        user: String,

        /// Private key file (public key is the .pub sibling)
        #[arg(short = 'i', long, value_name = "PATH")]
        key: Option<PathBuf>,

        /// Remote password (prompted when omitted)
        #[arg(long, env = "SSH_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Upload a private key to the CI secrets store
    Upload {
        #[command(flatten)]
        github: GithubArgs,

        /// Private key file
        #[arg(short = 'i', long, value_name = "PATH")]
        key: Option<PathBuf>,

        /// Secret name
        #[arg(long, default_value = "SSH_PRIVATE_KEY")]
        name: String,

        /// Generate the key pair first if the file does not exist
        #[arg(long)]
        generate: bool,
    },

    /// Generate a new RSA-4096 key pair
    Generate {
        /// Output file
        #[arg(short = 'f', long, value_name = "PATH")]
        file: Option<PathBuf>,

        /// Key comment
        #[arg(long)]
        comment: Option<String>,

        /// Overwrite an existing key pair
        #[arg(long)]
        force: bool,
    },
}

/// Dispatch a parsed invocation. No subcommand drops into the
/// interactive menu.
pub fn execute(cli: Cli) -> Result<()> {
    let env = EnvFile::load_optional(&cli.env_file);

    match cli.command {
        Some(Command::Dns { auth, zone, action }) => dns::run(&env, auth, zone, action),
        Some(Command::Tunnel {
            auth,
            account,
            action,
        }) => tunnel::run(&env, auth, account, action),
        Some(Command::Secrets { github, action }) => secrets::run(&env, github, action),
        Some(Command::Key { action }) => key::run(&env, action),
        Some(Command::PatchAnsible { venv }) => patch::run(&venv),
        Some(Command::Completions { shell }) => {
            completions::run(shell);
            Ok(())
        }
        None => menu::run(&env),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_record_args_defaults() {
        let cli = Cli::parse_from(["opskit", "dns", "add", "api.example.com", "203.0.113.10"]);
        let Some(Command::Dns {
            action: DnsAction::Add { record },
            ..
        }) = cli.command
        else {
            panic!("expected dns add");
        };
        assert_eq!(record.kind, "A");
        assert_eq!(record.ttl, 1);
        assert!(!record.proxied);
    }

    #[test]
    fn test_global_env_file_flag() {
        let cli = Cli::parse_from(["opskit", "--env-file", "/tmp/custom.env", "dns", "zones"]);
        assert_eq!(cli.env_file, PathBuf::from("/tmp/custom.env"));
    }
}
