//! `opskit key`: SSH key deployment, generation and upload.

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use dialoguer::Password;
use zeroize::Zeroizing;

use crate::cli::output;
use crate::cli::{GithubArgs, KeyAction};
use crate::core::envfile::EnvFile;
use crate::core::{creds, validation};
use crate::error::{OpsError, Result};
use crate::github::{secrets, Client, RepoRef};
use crate::ssh::{self, DeployOutcome, Target};

pub fn run(env: &EnvFile, action: KeyAction) -> Result<()> {
    match action {
        KeyAction::Deploy {
            hosts,
            user,
            key,
            password,
        } => deploy(env, &hosts, &user, key, password),
        KeyAction::Upload {
            github,
            key,
            name,
            generate,
        } => upload(env, github, key, &name, generate),
        KeyAction::Generate {
            file,
            comment,
            force,
        } => generate(file, comment, force),
    }
}

fn key_path(key: Option<PathBuf>) -> PathBuf {
    key.unwrap_or_else(ssh::default_key_path)
}

fn public_key_path(private: &Path) -> PathBuf {
    let mut name = private.file_name().unwrap_or_default().to_os_string();
    name.push(".pub");
    private.with_file_name(name)
}

fn default_comment() -> String {
    format!("{}@{}", whoami::username(), whoami::fallible::hostname().unwrap_or_else(|_| "local".to_string()))
}

/// Install the public key on one or more hosts. All targets are parsed and
/// validated before the first connection, and a failure on one host never
/// stops the rest.
fn deploy(
    env: &EnvFile,
    hosts: &[String],
    user: &str,
    key: Option<PathBuf>,
    password: Option<String>,
) -> Result<()> {
    let private = key_path(key);
    let public = public_key_path(&private);
    let public_key = ssh::read_public_key(&public).map_err(|e| match e {
        OpsError::Io(_) => OpsError::InvalidKey(format!(
            "{} not readable; run `opskit key generate` first",
            public.display()
        )),
        other => other,
    })?;

    let host_lines: Vec<String> = if hosts.is_empty() {
        env.server_ips().into_iter().map(|(_, ip)| ip).collect()
    } else {
        hosts.to_vec()
    };
    if host_lines.is_empty() {
        return Err(OpsError::EnvFile(format!(
            "no hosts given and no *_V4/*_V6 entries in {}",
            env.path().display()
        )));
    }

    let targets = host_lines
        .iter()
        .map(|line| Target::parse_line(line, user))
        .collect::<Result<Vec<_>>>()?;

    output::header(&format!("Deploying {} to:", public.display()));
    for target in &targets {
        output::list_item(&format!("{}@{}:{}", target.user, target.host, target.port));
    }

    let password = Zeroizing::new(match password {
        Some(p) => p,
        None => {
            if !io::stdin().is_terminal() {
                return Err(OpsError::NonInteractive("--password"));
            }
            Password::new()
                .with_prompt(format!("Password for {}@remote", user))
                .interact()?
        }
    });

    let mut failed = 0;
    for target in &targets {
        let label = format!("{}@{}:{}", target.user, target.host, target.port);
        match ssh::deploy(target, password.as_str(), &private, &public_key) {
            Ok(DeployOutcome::Installed) => output::success(&format!("{} key installed", label)),
            Ok(DeployOutcome::AlreadyPresent) => {
                output::dimmed(&format!("{} key already present", label))
            }
            Err(e) => {
                failed += 1;
                output::error(&format!("{}: {}", label, e));
            }
        }
    }

    output::summary(targets.len() - failed, failed);
    if failed > 0 {
        return Err(OpsError::Partial {
            failed,
            total: targets.len(),
        });
    }
    Ok(())
}

/// Upload the private key to the CI secrets store, optionally generating
/// the pair first.
fn upload(
    env: &EnvFile,
    github: GithubArgs,
    key: Option<PathBuf>,
    name: &str,
    generate: bool,
) -> Result<()> {
    let private = key_path(key);

    if !private.exists() {
        if !generate {
            return Err(OpsError::InvalidKey(format!(
                "{} does not exist; pass --generate to create it",
                private.display()
            )));
        }
        ssh::generate_keypair(&private, &default_comment())?;
        output::success(&format!("generated {}", private.display()));
    }

    let content = Zeroizing::new(ssh::read_private_key(&private)?);

    let name = validation::sanitize_secret_name(name);
    let token = creds::github_token(github.token, env)?;
    let repo: RepoRef = creds::github_repo(github.repo, env)?.parse()?;
    let client = Client::new(token)?;
    client.check_repo(&repo)?;

    secrets::upload(&client, &repo, &name, content.as_str())?;
    output::success(&format!("{} uploaded to {}", output::name(&name), repo));
    output::hint("grant the workflow access to the secret in repository settings");
    Ok(())
}

fn generate(file: Option<PathBuf>, comment: Option<String>, force: bool) -> Result<()> {
    let private = key_path(file);

    if private.exists() && !force {
        return Err(OpsError::InvalidKey(format!(
            "{} already exists; pass --force to overwrite",
            private.display()
        )));
    }
    if private.exists() {
        std::fs::remove_file(&private)?;
        let public = public_key_path(&private);
        if public.exists() {
            std::fs::remove_file(public)?;
        }
    }

    let comment = comment.unwrap_or_else(default_comment);
    ssh::generate_keypair(&private, &comment)?;

    output::success(&format!("generated {}", private.display()));
    output::kv("public key", public_key_path(&private).display());
    output::kv("comment", &comment);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_path_appends_pub() {
        assert_eq!(
            public_key_path(Path::new("/home/u/.ssh/id_rsa")),
            PathBuf::from("/home/u/.ssh/id_rsa.pub")
        );
    }
}
