//! Credential and identifier resolution.
//!
//! Priority order is always: explicit flag (clap also maps process env
//! vars onto flags), then env-file fallback, then an interactive prompt
//! when stdin is a terminal. Missing input in non-interactive mode is an
//! error before any network call is made.

use std::io::{self, IsTerminal};

use dialoguer::{Input, Password, Select};
use tracing::debug;

use crate::cloudflare::{Auth, Client};
use crate::core::envfile::EnvFile;
use crate::error::{OpsError, Result};

/// Resolve DNS provider credentials.
///
/// A bearer token wins over the email + global key pair.
pub fn cloudflare_auth(
    token: Option<String>,
    email: Option<String>,
    api_key: Option<String>,
    env: &EnvFile,
) -> Result<Auth> {
    let token = token.or_else(|| env.get("CLOUDFLARE_API_TOKEN").map(str::to_string));
    if let Some(token) = token {
        debug!("using bearer token auth");
        return Ok(Auth::Token(token));
    }

    let email = email.or_else(|| env.get("CLOUDFLARE_EMAIL").map(str::to_string));
    let api_key = api_key.or_else(|| env.get("CLOUDFLARE_API_KEY").map(str::to_string));
    if let (Some(email), Some(key)) = (email, api_key) {
        debug!("using email + global key auth");
        return Ok(Auth::Key { email, key });
    }

    if io::stdin().is_terminal() {
        let token: String = Password::new()
            .with_prompt("Cloudflare API token")
            .allow_empty_password(true)
            .interact()?;
        if !token.is_empty() {
            return Ok(Auth::Token(token));
        }
    }

    Err(OpsError::MissingCloudflareAuth)
}

/// Resolve the CI provider token.
pub fn github_token(flag: Option<String>, env: &EnvFile) -> Result<String> {
    if let Some(token) = flag.or_else(|| env.get("GITHUB_TOKEN").map(str::to_string)) {
        return Ok(token);
    }

    if io::stdin().is_terminal() {
        let token: String = Password::new().with_prompt("GitHub token (ghp_...)").interact()?;
        if !token.is_empty() {
            return Ok(token);
        }
    }

    Err(OpsError::MissingGithubToken)
}

/// Resolve the `owner/repo` repository reference.
pub fn github_repo(flag: Option<String>, env: &EnvFile) -> Result<String> {
    if let Some(repo) = flag.or_else(|| env.get("GITHUB_REPOSITORY").map(str::to_string)) {
        return Ok(repo);
    }

    if io::stdin().is_terminal() {
        let repo: String = Input::new()
            .with_prompt("GitHub repository (owner/repo)")
            .interact_text()?;
        if !repo.is_empty() {
            return Ok(repo);
        }
    }

    Err(OpsError::NonInteractive("--repo"))
}

/// Resolve the tunnel provider account identifier.
pub fn account_id(flag: Option<String>, env: &EnvFile) -> Result<String> {
    if let Some(account) = flag.or_else(|| env.get("CLOUDFLARE_ACCOUNT_ID").map(str::to_string)) {
        return Ok(account);
    }

    if io::stdin().is_terminal() {
        let account: String = Input::new().with_prompt("Cloudflare account id").interact_text()?;
        if !account.is_empty() {
            return Ok(account);
        }
    }

    Err(OpsError::MissingAccount)
}

/// Resolve a zone id, querying the provider and prompting a selection when
/// none was supplied.
pub fn zone_id(flag: Option<String>, env: &EnvFile, client: &Client) -> Result<String> {
    if let Some(zone) = flag.or_else(|| env.get("CLOUDFLARE_ZONE_ID").map(str::to_string)) {
        return Ok(zone);
    }

    let zones = client.list_zones()?;
    if zones.is_empty() {
        return Err(OpsError::NoZones);
    }

    if zones.len() == 1 || !io::stdin().is_terminal() {
        debug!(zone = %zones[0].name, "defaulting to first zone");
        return Ok(zones[0].id.clone());
    }

    let labels: Vec<String> = zones
        .iter()
        .map(|z| format!("{} ({})", z.name, z.status))
        .collect();
    let idx = Select::new()
        .with_prompt("Select a zone")
        .items(&labels)
        .default(0)
        .interact()?;

    Ok(zones[idx].id.clone())
}
