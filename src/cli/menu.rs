//! Interactive top-level menu, shown when no subcommand is given.
//!
//! Every entry delegates to the same functions the subcommands use;
//! missing credentials are resolved by the usual prompt fallbacks.

use std::io::{self, IsTerminal};

use clap::CommandFactory;
use dialoguer::{Confirm, Input, Select};

use crate::cli::output;
use crate::cli::{dns, key, patch, secrets, tunnel};
use crate::cli::{Cli, CloudflareArgs, DeployKind, DnsAction, GithubArgs, KeyAction, RecordArgs, SecretsAction, TunnelAction};
use crate::core::envfile::EnvFile;
use crate::error::Result;

const TOP: [&str; 6] = [
    "DNS records",
    "Tunnels",
    "CI secrets",
    "SSH keys",
    "Patch Ansible for Windows",
    "Quit",
];

pub fn run(env: &EnvFile) -> Result<()> {
    if !io::stdin().is_terminal() {
        // Piped invocation with no subcommand: show usage instead of hanging.
        Cli::command().print_help()?;
        return Ok(());
    }

    loop {
        println!();
        let choice = Select::new()
            .with_prompt("What do you want to do?")
            .items(&TOP)
            .default(0)
            .interact()?;

        let outcome = match choice {
            0 => dns_menu(env),
            1 => tunnel_menu(env),
            2 => secrets_menu(env),
            3 => keys_menu(env),
            4 => patch::run(std::path::Path::new("venv")),
            _ => return Ok(()),
        };

        // Keep the menu alive; one failed action is not fatal here.
        if let Err(e) = outcome {
            output::error(&e.to_string());
        }
    }
}

fn dns_menu(env: &EnvFile) -> Result<()> {
    let items = ["List zones", "List records", "Upsert a record", "Sync records from env file", "Back"];
    let choice = Select::new().items(&items).default(0).interact()?;

    let action = match choice {
        0 => DnsAction::Zones,
        1 => DnsAction::List {
            name: None,
            kind: None,
        },
        2 => {
            let name: String = Input::new().with_prompt("Record name").interact_text()?;
            let content: String = Input::new().with_prompt("Content (IP)").interact_text()?;
            let proxied = Confirm::new()
                .with_prompt("Serve through the proxy?")
                .default(true)
                .interact()?;
            DnsAction::Upsert {
                record: RecordArgs {
                    name,
                    content,
                    kind: "A".to_string(),
                    proxied,
                    ttl: 1,
                },
            }
        }
        3 => DnsAction::FromEnv,
        _ => return Ok(()),
    };

    dns::run(env, CloudflareArgs::default(), None, action)
}

fn tunnel_menu(env: &EnvFile) -> Result<()> {
    let items = ["List tunnels", "Create a tunnel", "Show a tunnel token", "Back"];
    let choice = Select::new().items(&items).default(0).interact()?;

    let action = match choice {
        0 => TunnelAction::List,
        1 => {
            let name: String = Input::new().with_prompt("Tunnel name").interact_text()?;
            let save_env = Confirm::new()
                .with_prompt("Append the token to the env file?")
                .default(false)
                .interact()?;
            TunnelAction::Create {
                name,
                deploy: DeployKind::Manual,
                save_env,
                run: false,
                limit: None,
                manifests: "k8s".into(),
            }
        }
        2 => {
            let name: String = Input::new().with_prompt("Tunnel name").interact_text()?;
            TunnelAction::Token { name }
        }
        _ => return Ok(()),
    };

    tunnel::run(env, CloudflareArgs::default(), None, action)
}

fn secrets_menu(env: &EnvFile) -> Result<()> {
    let items = ["Push the env file", "Preview (dry run)", "Back"];
    let choice = Select::new().items(&items).default(0).interact()?;

    let action = match choice {
        0 => SecretsAction::Push {
            file: None,
            exclude: Vec::new(),
            dry_run: false,
            yes: false,
            strict: false,
        },
        1 => SecretsAction::Push {
            file: None,
            exclude: Vec::new(),
            dry_run: true,
            yes: false,
            strict: false,
        },
        _ => return Ok(()),
    };

    secrets::run(env, GithubArgs::default(), action)
}

fn keys_menu(env: &EnvFile) -> Result<()> {
    let items = ["Deploy the public key to env file servers", "Generate a key pair", "Back"];
    let choice = Select::new().items(&items).default(0).interact()?;

    let action = match choice {
        0 => KeyAction::Deploy {
            hosts: Vec::new(),
            user: crate::ssh::DEFAULT_USER.to_string(),
            key: None,
            password: None,
        },
        1 => KeyAction::Generate {
            file: None,
            comment: None,
            force: false,
        },
        _ => return Ok(()),
    };

    key::run(env, action)
}
