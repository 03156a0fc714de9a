//! `opskit dns`: record management and proxy toggles.

use crate::cli::output;
use crate::cli::{CloudflareArgs, DnsAction, RecordArgs};
use crate::cloudflare::dns::{DnsRecord, ZoneRecords};
use crate::cloudflare::Client;
use crate::core::envfile::EnvFile;
use crate::core::reconcile::{reconcile, Applied, DesiredRecord, TTL_AUTO};
use crate::core::{creds, validation};
use crate::error::{OpsError, Result};

pub fn run(env: &EnvFile, auth: CloudflareArgs, zone: Option<String>, action: DnsAction) -> Result<()> {
    let auth = creds::cloudflare_auth(auth.api_token, auth.email, auth.api_key, env)?;
    let client = Client::new(auth)?;

    if let DnsAction::Zones = action {
        return zones(&client);
    }

    let zone = creds::zone_id(zone, env, &client)?;
    match action {
        DnsAction::Zones => unreachable!("handled above"),
        DnsAction::List { name, kind } => list(&client, &zone, name.as_deref(), kind.as_deref()),
        DnsAction::Add { record } => add(&client, &zone, record),
        DnsAction::Upsert { record } => upsert(&client, &zone, record),
        DnsAction::Delete { name, kind } => delete(&client, &zone, &name, kind.as_deref()),
        DnsAction::ProxyOn { name } => set_proxied(&client, &zone, &name, true),
        DnsAction::ProxyOff { name } => set_proxied(&client, &zone, &name, false),
        DnsAction::FromEnv => from_env(&client, &zone, env),
    }
}

fn zones(client: &Client) -> Result<()> {
    let zones = client.list_zones()?;
    if zones.is_empty() {
        output::dimmed("no zones visible to these credentials");
        return Ok(());
    }

    output::section("Zones");
    for zone in &zones {
        output::kv(&zone.name, format!("{}  {}", zone.id, zone.status));
    }
    Ok(())
}

fn describe(record: &DnsRecord) -> String {
    let ttl = if record.ttl == TTL_AUTO {
        "auto".to_string()
    } else {
        record.ttl.to_string()
    };
    format!(
        "{:5} {} (proxied: {}, ttl: {})",
        record.kind, record.content, record.proxied, ttl
    )
}

fn list(client: &Client, zone: &str, name: Option<&str>, kind: Option<&str>) -> Result<()> {
    let records = client.list_records(zone, name, kind)?;
    if records.is_empty() {
        output::dimmed("no records match");
        return Ok(());
    }

    output::section("Records");
    for record in &records {
        output::kv(&record.name, describe(record));
    }
    Ok(())
}

fn desired_from(args: RecordArgs) -> DesiredRecord {
    DesiredRecord {
        name: args.name,
        kind: args.kind,
        content: args.content,
        proxied: args.proxied,
        ttl: args.ttl,
    }
}

fn add(client: &Client, zone: &str, args: RecordArgs) -> Result<()> {
    let desired = desired_from(args);
    let record = client.create_record(zone, &desired)?;
    output::success(&format!(
        "created {} -> {}",
        output::name(&record.name),
        record.content
    ));
    Ok(())
}

fn upsert(client: &Client, zone: &str, args: RecordArgs) -> Result<()> {
    let desired = desired_from(args);
    let mut store = ZoneRecords::new(client, zone);

    match reconcile(&mut store, &desired)? {
        Applied::Created => output::success(&format!(
            "created {} -> {}",
            output::name(&desired.name),
            desired.content
        )),
        Applied::Updated => output::success(&format!(
            "updated {} -> {}",
            output::name(&desired.name),
            desired.content
        )),
    }
    Ok(())
}

fn delete(client: &Client, zone: &str, name: &str, kind: Option<&str>) -> Result<()> {
    let records = client.list_records(zone, Some(name), kind)?;
    let Some(record) = records.into_iter().next() else {
        return Err(OpsError::RecordNotFound(name.to_string()));
    };

    client.delete_record(zone, &record.id)?;
    output::success(&format!("deleted {} ({})", output::name(&record.name), record.kind));
    Ok(())
}

fn set_proxied(client: &Client, zone: &str, name: &str, proxied: bool) -> Result<()> {
    let record = client.set_proxied(zone, name, proxied)?;
    let state = if proxied { "proxied" } else { "direct" };
    output::success(&format!("{} is now {}", output::name(&record.name), state));
    Ok(())
}

/// Upsert a proxied record for every `*_DOMAIN` entry, pointing at the
/// first server IP discovered in the env file. Per-item results; one
/// failure never stops the rest.
fn from_env(client: &Client, zone: &str, env: &EnvFile) -> Result<()> {
    let domains = env.service_domains();
    if domains.is_empty() {
        return Err(OpsError::EnvFile(format!(
            "no *_DOMAIN entries in {}",
            env.path().display()
        )));
    }

    let ips = env.server_ips();
    let Some((ip_key, ip)) = ips.first() else {
        return Err(OpsError::EnvFile(format!(
            "no *_V4/*_V6 server entries in {}",
            env.path().display()
        )));
    };

    let family = validation::classify_host(ip)?;
    let kind = match family {
        validation::IpFamily::V4 => "A",
        validation::IpFamily::V6 => "AAAA",
    };
    output::kv("server", format!("{} ({})", ip, ip_key));

    let mut failed = 0;
    for (key, domain) in &domains {
        let desired = DesiredRecord {
            name: domain.clone(),
            kind: kind.to_string(),
            content: ip.clone(),
            proxied: true,
            ttl: TTL_AUTO,
        };

        let mut store = ZoneRecords::new(client, zone);
        match reconcile(&mut store, &desired) {
            Ok(Applied::Created) => output::success(&format!("{} created ({})", domain, key)),
            Ok(Applied::Updated) => output::success(&format!("{} updated ({})", domain, key)),
            Err(e) => {
                failed += 1;
                output::error(&format!("{}: {}", domain, e));
            }
        }
    }

    output::summary(domains.len() - failed, failed);
    if failed > 0 {
        return Err(OpsError::Partial {
            failed,
            total: domains.len(),
        });
    }
    Ok(())
}
