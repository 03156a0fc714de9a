//! `opskit secrets`: encrypted secret upload.

use std::io::{self, IsTerminal};
use std::path::PathBuf;

use dialoguer::{Confirm, Password};
use zeroize::Zeroizing;

use crate::cli::output;
use crate::cli::{GithubArgs, SecretsAction};
use crate::core::envfile::EnvFile;
use crate::core::{creds, validation};
use crate::error::{OpsError, Result};
use crate::github::{secrets, Client, RepoRef};

/// How much of a value is shown in previews and confirmations.
const PREVIEW_LEN: usize = 20;

pub fn run(env: &EnvFile, github: GithubArgs, action: SecretsAction) -> Result<()> {
    match action {
        SecretsAction::Push {
            file,
            exclude,
            dry_run,
            yes,
            strict,
        } => push(env, github, file, &exclude, dry_run, yes, strict),
        SecretsAction::Put {
            name,
            value,
            strict,
        } => put(env, github, &name, value, strict),
    }
}

fn preview(value: &str) -> String {
    if value.chars().count() <= PREVIEW_LEN {
        value.to_string()
    } else {
        let head: String = value.chars().take(PREVIEW_LEN).collect();
        format!("{}...", head)
    }
}

/// Map a raw env key onto a valid secret name, per the strictness policy.
fn secret_name(raw: &str, strict: bool) -> Result<String> {
    if strict {
        validation::validate_secret_name(raw)?;
        return Ok(raw.to_string());
    }

    let sanitized = validation::sanitize_secret_name(raw);
    if sanitized != raw {
        output::warn(&format!("{} uploaded as {}", raw, sanitized));
    }
    Ok(sanitized)
}

fn connect(env: &EnvFile, github: GithubArgs) -> Result<(Client, RepoRef)> {
    let token = creds::github_token(github.token, env)?;
    let repo: RepoRef = creds::github_repo(github.repo, env)?.parse()?;
    let client = Client::new(token)?;
    client.check_repo(&repo)?;
    Ok((client, repo))
}

fn push(
    env: &EnvFile,
    github: GithubArgs,
    file: Option<PathBuf>,
    exclude: &[String],
    dry_run: bool,
    yes: bool,
    strict: bool,
) -> Result<()> {
    let source = match &file {
        Some(path) => EnvFile::load(path)?,
        None => env.clone(),
    };
    if source.is_empty() {
        return Err(OpsError::EnvFile(format!(
            "{} has no entries to push",
            source.path().display()
        )));
    }

    let mut items: Vec<(String, String)> = Vec::new();
    let mut skipped = 0;
    for (key, value) in source.entries() {
        if exclude.iter().any(|pat| key.contains(pat.as_str())) {
            skipped += 1;
            continue;
        }
        items.push((secret_name(key, strict)?, value.clone()));
    }

    output::section(&format!("Secrets for {}", source.path().display()));
    for (name, value) in &items {
        output::kv(name, preview(value));
    }
    if skipped > 0 {
        output::dimmed(&format!("{} entries excluded", skipped));
    }
    if items.is_empty() {
        output::dimmed("nothing left to push after exclusions");
        return Ok(());
    }

    // Dry run never resolves credentials or opens a connection.
    if dry_run {
        output::hint(&format!("dry run: {} secrets would be uploaded", items.len()));
        return Ok(());
    }

    if !yes {
        if !io::stdin().is_terminal() {
            return Err(OpsError::NonInteractive("--yes"));
        }
        let confirmed = Confirm::new()
            .with_prompt(format!("Upload {} secrets?", items.len()))
            .default(false)
            .interact()?;
        if !confirmed {
            return Err(OpsError::Cancelled);
        }
    }

    let (client, repo) = connect(env, github)?;
    output::header(&format!("Uploading to {}", repo));

    let report = secrets::push(&client, &repo, &items, |_, name, error| match error {
        None => output::success(name),
        Some(e) => output::error(&format!("{}: {}", name, e)),
    });

    output::summary(report.succeeded(), report.failed());
    report.into_result()
}

fn put(
    env: &EnvFile,
    github: GithubArgs,
    name: &str,
    value: Option<String>,
    strict: bool,
) -> Result<()> {
    let name = secret_name(name, strict)?;

    let value = Zeroizing::new(match value {
        Some(v) => v,
        None => {
            if !io::stdin().is_terminal() {
                return Err(OpsError::NonInteractive("VALUE"));
            }
            Password::new()
                .with_prompt(format!("Value for {}", name))
                .interact()?
        }
    });

    let (client, repo) = connect(env, github)?;
    secrets::upload(&client, &repo, &name, value.as_str())?;
    output::success(&format!("{} uploaded to {}", output::name(&name), repo));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_long_values() {
        assert_eq!(preview("short"), "short");
        assert_eq!(
            preview("0123456789012345678901234"),
            "01234567890123456789..."
        );
    }

    #[test]
    fn test_secret_name_strict_rejects() {
        assert!(secret_name("9BAD", true).is_err());
        assert_eq!(secret_name("GOOD_NAME", true).unwrap(), "GOOD_NAME");
    }

    #[test]
    fn test_secret_name_sanitizes_by_default() {
        assert_eq!(secret_name("my-api.key", false).unwrap(), "MY_API_KEY");
    }
}
