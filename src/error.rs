use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpsError {
    #[error("missing credentials: provide --token or --email + --api-key")]
    MissingCloudflareAuth,

    #[error("missing GitHub token: pass --token or set GITHUB_TOKEN")]
    MissingGithubToken,

    #[error("missing account id: pass --account or set CLOUDFLARE_ACCOUNT_ID")]
    MissingAccount,

    #[error("api error: {0}")]
    Api(String),

    #[error("unexpected response: missing result payload")]
    EmptyResult,

    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("tunnel not found: {0}")]
    TunnelNotFound(String),

    #[error("no zones available for this account")]
    NoZones,

    #[error("invalid host address: {0}")]
    InvalidHost(String),

    #[error("invalid repository: {0} (expected owner/repo)")]
    InvalidRepo(String),

    #[error("invalid secret name: {name} ({reason})")]
    InvalidSecretName { name: String, reason: String },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("deploy failed: {0}")]
    Deploy(String),

    #[error("env file error: {0}")]
    EnvFile(String),

    #[error("patch failed: {0}")]
    Patch(String),

    #[error("{0} required in non-interactive mode")]
    NonInteractive(&'static str),

    #[error("{failed} of {total} operations failed")]
    Partial { failed: usize, total: usize },

    #[error("operation cancelled")]
    Cancelled,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ssh session error: {0}")]
    Ssh(#[from] ssh2::Error),

    #[error("prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OpsError>;
