//! Alert commands - manage network alerts

use anyhow::Result;
use clap::Subcommand;
use shodan_client::ShodanClient;

use crate::output::{AlertRow, OutputContext};

#[derive(Debug, Clone, Subcommand)]
pub enum AlertCommand {
    /// List the network alerts of the account
    List,

    /// Show one network alert
    Info {
        /// Alert ID
        id: String,
    },

    /// Create a network alert
    Create {
        /// Alert name
        name: String,

        /// IPs or netblocks (CIDR) to monitor
        #[arg(required = true)]
        ips: Vec<String>,

        /// Lifetime in seconds (0 = never expires)
        #[arg(long, default_value = "0")]
        expires: u32,
    },

    /// Delete a network alert
    Delete {
        /// Alert ID
        id: String,
    },
}

/// Run an alert subcommand
pub async fn alert(client: &ShodanClient, command: &AlertCommand, ctx: &OutputContext) -> Result<()> {
    match command {
        AlertCommand::List => {
            let alerts = client.alerts().await?;
            let rows: Vec<AlertRow> = alerts.iter().map(AlertRow::from).collect();
            ctx.print(&rows);
        }
        AlertCommand::Info { id } => {
            let alert = client.alert(id).await?;
            ctx.print(&[AlertRow::from(&alert)]);
        }
        AlertCommand::Create { name, ips, expires } => {
            let alert = client.create_alert(name, ips, *expires).await?;
            ctx.success(&format!("Created alert {}", alert.id));
            ctx.print(&[AlertRow::from(&alert)]);
        }
        AlertCommand::Delete { id } => {
            client.delete_alert(id).await?;
            ctx.success(&format!("Deleted alert {}", id));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(subcommand)]
        command: AlertCommand,
    }

    fn parse(argv: &[&str]) -> Result<AlertCommand, clap::Error> {
        Harness::try_parse_from(std::iter::once("alert").chain(argv.iter().copied()))
            .map(|h| h.command)
    }

    #[test]
    fn test_create_takes_several_ranges() {
        match parse(&["create", "office", "198.51.100.0/24", "203.0.113.7", "--expires", "60"])
            .unwrap()
        {
            AlertCommand::Create { name, ips, expires } => {
                assert_eq!(name, "office");
                assert_eq!(ips.len(), 2);
                assert_eq!(expires, 60);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_create_needs_a_range() {
        assert!(parse(&["create", "office"]).is_err());
    }

    #[test]
    fn test_delete_takes_id() {
        assert!(matches!(
            parse(&["delete", "OYPRB8IR9Z35AZPR"]).unwrap(),
            AlertCommand::Delete { id } if id == "OYPRB8IR9Z35AZPR"
        ));
    }
}
