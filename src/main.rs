//! Opskit - operational bootstrap toolkit.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use opskit::cli::output;
use opskit::cli::{execute, Cli};
use opskit::error::OpsError;

fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber with env-filter support
    let filter = EnvFilter::try_from_env("OPSKIT_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("opskit=debug")
        } else {
            EnvFilter::new("opskit=warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).without_time())
        .init();

    if let Err(e) = execute(cli) {
        let suggestion = match &e {
            OpsError::MissingCloudflareAuth => {
                Some("set CLOUDFLARE_API_TOKEN (or CLOUDFLARE_EMAIL + CLOUDFLARE_API_KEY)")
            }
            OpsError::MissingGithubToken => {
                Some("create a token with repo scope at https://github.com/settings/tokens/new")
            }
            OpsError::MissingAccount => Some("set CLOUDFLARE_ACCOUNT_ID in your environment"),
            _ => None,
        };

        output::error(&e.to_string());
        if let Some(hint) = suggestion {
            output::hint(hint);
        }
        std::process::exit(1);
    }
}
