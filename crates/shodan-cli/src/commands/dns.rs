//! DNS commands - forward and reverse lookups

use anyhow::Result;
use shodan_client::ShodanClient;
use std::net::IpAddr;

use crate::output::{DnsRow, OutputContext};

/// Resolve hostnames to addresses
pub async fn resolve(client: &ShodanClient, hosts: &[String], ctx: &OutputContext) -> Result<()> {
    let resolved = client.dns_resolve(hosts).await?;

    // Keep the order the names were given in
    let rows: Vec<DnsRow> = hosts
        .iter()
        .map(|host| DnsRow {
            query: host.clone(),
            result: resolved
                .get(host)
                .copied()
                .flatten()
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    ctx.print(&rows);
    Ok(())
}

/// Look up the hostnames of addresses
pub async fn reverse(client: &ShodanClient, ips: &[IpAddr], ctx: &OutputContext) -> Result<()> {
    let names = client.dns_reverse(ips).await?;

    let rows: Vec<DnsRow> = ips
        .iter()
        .map(|ip| {
            let query = ip.to_string();
            let result = match names.get(&query) {
                Some(Some(hostnames)) if !hostnames.is_empty() => hostnames.join(", "),
                _ => "-".to_string(),
            };
            DnsRow { query, result }
        })
        .collect();

    ctx.print(&rows);
    Ok(())
}
