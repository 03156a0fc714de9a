//! `opskit tunnel`: tunnel provisioning.
//!
//! `create` walks a strictly forward state flow: ensure the tunnel exists,
//! retrieve its connection token, hand the token to one deployment backend.
//! Single attempt, no rollback; on a deployment failure the operator
//! re-runs the backend by hand with the displayed token fragment.

use std::io::{self, IsTerminal, Write as IoWrite};
use std::path::Path;
use std::process::{Command, Stdio};

use dialoguer::Confirm;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::cli::output;
use crate::cli::{CloudflareArgs, DeployKind, TunnelAction};
use crate::cloudflare::tunnel::{Ensured, Tunnel};
use crate::cloudflare::Client;
use crate::core::envfile::EnvFile;
use crate::core::creds;
use crate::error::{OpsError, Result};

/// Env var carrying the connection token into playbooks and child shells.
const TOKEN_VAR: &str = "CLOUDFLARE_TUNNEL_TOKEN";
const PLAYBOOK: &str = "playbooks/cloudflared_playbook.yml";
const K8S_NAMESPACE: &str = "cloudflare-tunnel";
const K8S_SECRET: &str = "cloudflared-token";
const K8S_DEPLOYMENT: &str = "cloudflared";

/// How much of the token is ever shown outside the one-time full print.
const TOKEN_FRAGMENT: usize = 10;

pub struct CreateOpts {
    pub name: String,
    pub deploy: DeployKind,
    pub save_env: bool,
    pub run: bool,
    pub limit: Option<String>,
    pub manifests: std::path::PathBuf,
}

pub fn run(
    env: &EnvFile,
    auth: CloudflareArgs,
    account: Option<String>,
    action: TunnelAction,
) -> Result<()> {
    let auth = creds::cloudflare_auth(auth.api_token, auth.email, auth.api_key, env)?;
    let client = Client::new(auth)?;
    let account = creds::account_id(account, env)?;

    match action {
        TunnelAction::List => list(&client, &account),
        TunnelAction::Create {
            name,
            deploy,
            save_env,
            run,
            limit,
            manifests,
        } => create(
            &client,
            &account,
            env,
            CreateOpts {
                name,
                deploy,
                save_env,
                run,
                limit,
                manifests,
            },
        ),
        TunnelAction::Token { name } => token(&client, &account, &name),
        TunnelAction::Delete { name, yes } => delete(&client, &account, &name, yes),
    }
}

fn fragment(token: &str) -> String {
    let head: String = token.chars().take(TOKEN_FRAGMENT).collect();
    format!("{}...", head)
}

fn find_by_name(client: &Client, account: &str, name: &str) -> Result<Tunnel> {
    client
        .list_tunnels(account)?
        .into_iter()
        .find(|t| t.name == name)
        .ok_or_else(|| OpsError::TunnelNotFound(name.to_string()))
}

fn list(client: &Client, account: &str) -> Result<()> {
    let tunnels = client.list_tunnels(account)?;
    if tunnels.is_empty() {
        output::dimmed("no tunnels in this account");
        return Ok(());
    }

    output::section("Tunnels");
    for tunnel in &tunnels {
        let status = tunnel.status.as_deref().unwrap_or("unknown");
        output::kv(
            &tunnel.name,
            format!(
                "{}  {} ({} connections)",
                tunnel.id,
                status,
                tunnel.connections.len()
            ),
        );
    }
    Ok(())
}

fn token(client: &Client, account: &str, name: &str) -> Result<()> {
    let tunnel = find_by_name(client, account, name)?;
    let token = Zeroizing::new(client.tunnel_token(account, &tunnel.id)?);
    println!("{}", token.as_str());
    Ok(())
}

fn delete(client: &Client, account: &str, name: &str, yes: bool) -> Result<()> {
    let tunnel = find_by_name(client, account, name)?;

    if !yes {
        if !io::stdin().is_terminal() {
            return Err(OpsError::NonInteractive("--yes"));
        }
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete tunnel {} ({})?", tunnel.name, tunnel.id))
            .default(false)
            .interact()?;
        if !confirmed {
            return Err(OpsError::Cancelled);
        }
    }

    client.delete_tunnel(account, &tunnel.id)?;
    output::success(&format!("deleted {}", output::name(&tunnel.name)));
    Ok(())
}

fn create(client: &Client, account: &str, env: &EnvFile, opts: CreateOpts) -> Result<()> {
    let (tunnel, ensured) = client.ensure_tunnel(account, &opts.name)?;
    match ensured {
        Ensured::Created => output::success(&format!("created tunnel {}", output::name(&tunnel.name))),
        Ensured::Existing => output::warn(&format!("tunnel {} already exists, reusing", tunnel.name)),
    }
    output::kv("id", &tunnel.id);

    let token = Zeroizing::new(client.tunnel_token(account, &tunnel.id)?);
    info!(tunnel = %tunnel.name, "retrieved connection token");

    if opts.save_env {
        env.append(
            &format!("Tunnel token ({})", tunnel.name),
            TOKEN_VAR,
            token.as_str(),
        )?;
        output::success(&format!("token appended to {}", env.path().display()));
        output::hint("make sure the env file is ignored by version control");
    }

    match opts.deploy {
        DeployKind::Ansible => deploy_ansible(token.as_str(), &opts),
        DeployKind::Kubernetes => deploy_kubernetes(token.as_str(), &opts),
        DeployKind::Manual => {
            output::section("Connection token");
            println!("{}", token.as_str());
            output::warn("the token is not shown again; store it now");
            Ok(())
        }
    }
}

fn deploy_ansible(token: &str, opts: &CreateOpts) -> Result<()> {
    if !opts.run {
        output::section("Next step");
        println!(
            "  {}",
            output::cmd(&format!("export {}=\"{}\"", TOKEN_VAR, fragment(token)))
        );
        println!("  {}", output::cmd(&format!("ansible-playbook {}", PLAYBOOK)));
        return Ok(());
    }

    output::progress("running ansible-playbook");
    let mut cmd = Command::new("ansible-playbook");
    cmd.arg(PLAYBOOK).env(TOKEN_VAR, token);
    if let Some(limit) = &opts.limit {
        cmd.args(["--limit", limit]);
    }

    let status = cmd
        .status()
        .map_err(|e| OpsError::Deploy(format!("failed to run ansible-playbook: {}", e)))?;
    output::progress_done(status.success());

    if !status.success() {
        return Err(OpsError::Deploy(format!(
            "ansible-playbook exited with {}; re-run it manually with {}={}",
            status.code().unwrap_or(-1),
            TOKEN_VAR,
            fragment(token)
        )));
    }
    Ok(())
}

fn kubectl_ok(args: &[&str]) -> Result<bool> {
    debug!(?args, "kubectl");
    let status = Command::new("kubectl")
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| OpsError::Deploy(format!("failed to run kubectl: {}", e)))?;
    Ok(status.success())
}

fn deploy_kubernetes(token: &str, opts: &CreateOpts) -> Result<()> {
    if which::which("kubectl").is_err() {
        return Err(OpsError::Deploy("kubectl is not installed".to_string()));
    }
    if !kubectl_ok(&["cluster-info"])? {
        return Err(OpsError::Deploy(
            "cannot reach the cluster; check kubeconfig and try `kubectl cluster-info`".to_string(),
        ));
    }
    output::success("cluster is reachable");

    // Idempotent namespace: create may fail when it already exists.
    let _ = kubectl_ok(&["create", "namespace", K8S_NAMESPACE]);
    output::success(&format!("namespace {} ready", K8S_NAMESPACE));

    apply_secret(token)?;
    output::success(&format!("secret {} applied", K8S_SECRET));

    if !opts.run {
        output::section("Next step");
        println!(
            "  {}",
            output::cmd(&format!("kubectl apply -f {}", opts.manifests.display()))
        );
        return Ok(());
    }

    apply_manifests(&opts.manifests)?;

    output::progress("waiting for the deployment to become available");
    let deployment = format!("deployment/{}", K8S_DEPLOYMENT);
    let ok = kubectl_ok(&[
        "wait",
        "--for=condition=available",
        "--timeout=120s",
        &deployment,
        "-n",
        K8S_NAMESPACE,
    ])?;
    output::progress_done(ok);

    if !ok {
        return Err(OpsError::Deploy(
            "deployment did not become available within 120s".to_string(),
        ));
    }
    Ok(())
}

/// Render the token secret with a client-side dry run and pipe the
/// manifest into `kubectl apply`, so a re-run updates in place.
fn apply_secret(token: &str) -> Result<()> {
    let rendered = Command::new("kubectl")
        .args(["create", "secret", "generic", K8S_SECRET])
        .arg(format!("--from-literal=token={}", token))
        .arg(format!("--namespace={}", K8S_NAMESPACE))
        .args(["--dry-run=client", "-o", "yaml"])
        .stderr(Stdio::null())
        .output()
        .map_err(|e| OpsError::Deploy(format!("failed to run kubectl: {}", e)))?;
    if !rendered.status.success() {
        return Err(OpsError::Deploy("rendering the token secret failed".to_string()));
    }

    let mut apply = Command::new("kubectl")
        .args(["apply", "-f", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .spawn()
        .map_err(|e| OpsError::Deploy(format!("failed to run kubectl: {}", e)))?;
    if let Some(stdin) = apply.stdin.as_mut() {
        stdin.write_all(&rendered.stdout)?;
    }
    let status = apply.wait()?;
    if !status.success() {
        return Err(OpsError::Deploy("applying the token secret failed".to_string()));
    }
    Ok(())
}

/// Apply every yaml manifest in the directory, in name order.
fn apply_manifests(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Err(OpsError::Deploy(format!(
            "manifest directory {} does not exist",
            dir.display()
        )));
    }

    let mut manifests: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("yaml") | Some("yml")
            )
        })
        .collect();
    manifests.sort();

    if manifests.is_empty() {
        return Err(OpsError::Deploy(format!(
            "no manifests found in {}",
            dir.display()
        )));
    }

    for manifest in &manifests {
        let label = manifest
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("manifest");
        output::progress(&format!("applying {}", label));
        let ok = kubectl_ok(&["apply", "-f", &manifest.to_string_lossy()])?;
        output::progress_done(ok);
        if !ok {
            return Err(OpsError::Deploy(format!("applying {} failed", label)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_truncates() {
        assert_eq!(fragment("eyJhIjoiYmNkZWYifQ"), "eyJhIjoiYm...");
        assert_eq!(fragment("short"), "short...");
    }
}
