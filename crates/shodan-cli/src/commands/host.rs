//! Host and search commands

use anyhow::Result;
use shodan_client::{HostOptions, HostSearch, SearchOptions, ShodanClient};
use std::net::IpAddr;

use crate::output::{or_dash, BannerRow, FacetRow, OutputContext, OutputFormat};

/// Show everything known about one IP
pub async fn host(
    client: &ShodanClient,
    ip: IpAddr,
    options: HostOptions,
    ctx: &OutputContext,
) -> Result<()> {
    let host = client.host(ip, options).await?;

    if ctx.format == OutputFormat::Json {
        ctx.print_json(&host);
        return Ok(());
    }

    let ports = host
        .ports
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let pairs = vec![
        ("IP", host.ip_str.clone()),
        ("Hostnames", host.hostnames.join(", ")),
        ("Organization", or_dash(host.org.as_deref())),
        ("ISP", or_dash(host.isp.as_deref())),
        ("ASN", or_dash(host.asn.as_deref())),
        ("OS", or_dash(host.os.as_deref())),
        ("Country", or_dash(host.location.country_name.as_deref())),
        ("City", or_dash(host.location.city.as_deref())),
        ("Ports", ports),
        ("Vulnerabilities", host.vulns.join(", ")),
        ("Last update", or_dash(host.last_update.as_deref())),
    ];
    ctx.print_kv(&pairs);

    if !host.data.is_empty() {
        println!();
        let rows: Vec<BannerRow> = host.data.iter().map(BannerRow::from).collect();
        ctx.print(&rows);
    }
    Ok(())
}

/// Search the banner database
pub async fn search(client: &ShodanClient, options: &SearchOptions, ctx: &OutputContext) -> Result<()> {
    let found = client.search(options).await?;

    if ctx.format == OutputFormat::Json {
        ctx.print_json(&found);
        return Ok(());
    }

    ctx.info(&format!("{} results", found.total));
    let rows: Vec<BannerRow> = found.matches.iter().map(BannerRow::from).collect();
    ctx.print(&rows);
    print_facets(&found, ctx);
    Ok(())
}

/// Count results without spending query credits on matches
pub async fn count(client: &ShodanClient, options: &SearchOptions, ctx: &OutputContext) -> Result<()> {
    let counted = client.search_count(options).await?;

    if ctx.format == OutputFormat::Json {
        ctx.print_json(&counted);
        return Ok(());
    }

    ctx.print_kv(&[("Total", counted.total.to_string())]);
    print_facets(&counted, ctx);
    Ok(())
}

fn print_facets(results: &HostSearch, ctx: &OutputContext) {
    if results.facets.is_empty() {
        return;
    }
    let rows = FacetRow::from_search(results);
    println!();
    ctx.print(&rows);
}
