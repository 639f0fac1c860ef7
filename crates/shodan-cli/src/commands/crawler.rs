//! Crawler metadata commands - ports and protocols

use anyhow::Result;
use shodan_client::ShodanClient;

use crate::output::{OutputContext, PortRow, ProtocolRow};

/// List the ports the crawlers look for
pub async fn ports(client: &ShodanClient, ctx: &OutputContext) -> Result<()> {
    let mut ports = client.ports().await?;
    ports.sort_unstable();

    let rows: Vec<PortRow> = ports.into_iter().map(|port| PortRow { port }).collect();
    ctx.print(&rows);
    Ok(())
}

/// List the protocols available for on-demand scans
pub async fn protocols(client: &ShodanClient, ctx: &OutputContext) -> Result<()> {
    let protocols = client.protocols().await?;

    let mut rows: Vec<ProtocolRow> = protocols
        .into_iter()
        .map(|(name, description)| ProtocolRow { name, description })
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));

    ctx.print(&rows);
    Ok(())
}
