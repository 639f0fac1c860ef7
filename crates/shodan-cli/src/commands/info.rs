//! Info and account commands - plan and account details for the API key

use anyhow::Result;
use shodan_client::ShodanClient;

use crate::output::{or_dash, OutputContext};

/// Show plan and credit information
pub async fn info(client: &ShodanClient, ctx: &OutputContext) -> Result<()> {
    let info = client.api_info().await?;

    let pairs = vec![
        ("Plan", info.plan),
        ("Query credits", info.query_credits.to_string()),
        ("Scan credits", info.scan_credits.to_string()),
        ("Unlocked", info.unlocked.to_string()),
        ("Unlocked left", info.unlocked_left.to_string()),
        ("HTTPS", info.https.to_string()),
        ("Telnet", info.telnet.to_string()),
    ];

    ctx.print_kv(&pairs);
    Ok(())
}

/// Show the account linked to the API key
pub async fn account(client: &ShodanClient, ctx: &OutputContext) -> Result<()> {
    let profile = client.account_profile().await?;

    let pairs = vec![
        ("Name", or_dash(profile.name)),
        ("Member", profile.member.to_string()),
        ("Credits", profile.credits.to_string()),
        ("Created", or_dash(profile.created)),
    ];

    ctx.print_kv(&pairs);
    Ok(())
}
