//! Tool commands - public IP and outgoing HTTP headers

use anyhow::Result;
use shodan_client::ShodanClient;

use crate::output::{HeaderRow, OutputContext};

/// Show the public IP address of this machine
pub async fn myip(client: &ShodanClient, ctx: &OutputContext) -> Result<()> {
    let ip = client.my_ip().await?;
    ctx.print_kv(&[("IP", ip.to_string())]);
    Ok(())
}

/// Show the headers this client sends to web servers
pub async fn headers(client: &ShodanClient, ctx: &OutputContext) -> Result<()> {
    let headers = client.http_headers().await?;

    let mut rows: Vec<HeaderRow> = headers
        .into_iter()
        .map(|(name, value)| HeaderRow { name, value })
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));

    ctx.print(&rows);
    Ok(())
}
