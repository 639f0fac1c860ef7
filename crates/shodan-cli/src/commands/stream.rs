//! Stream command - real-time banner streaming

use anyhow::{bail, Result};
use clap::{ArgGroup, Args};
use shodan_client::{CancellationToken, ShodanClient, StreamFilter};

use crate::output::OutputContext;

/// Which banners to stream; at most one filter may be given
#[derive(Debug, Clone, Default, Args)]
#[command(group(ArgGroup::new("filter").multiple(false)))]
pub struct StreamArgs {
    /// Only banners on these ports (comma-separated)
    #[arg(long, value_delimiter = ',', group = "filter")]
    pub ports: Vec<u16>,

    /// Only banners from these ASNs, e.g. AS3303 (comma-separated)
    #[arg(long, value_delimiter = ',', group = "filter")]
    pub asn: Vec<String>,

    /// Only banners from these countries, e.g. DE,NL (comma-separated)
    #[arg(long, value_delimiter = ',', group = "filter")]
    pub countries: Vec<String>,

    /// Only banners on the ranges of this network alert
    #[arg(long, group = "filter")]
    pub alert: Option<String>,

    /// Only banners on the ranges of any network alert
    #[arg(long, group = "filter")]
    pub all_alerts: bool,

    /// Stop after this many banners
    #[arg(long)]
    pub limit: Option<usize>,
}

impl StreamArgs {
    pub fn filter(&self) -> StreamFilter {
        if !self.ports.is_empty() {
            StreamFilter::ByPorts(self.ports.clone())
        } else if !self.asn.is_empty() {
            StreamFilter::ByAsn(self.asn.clone())
        } else if !self.countries.is_empty() {
            StreamFilter::ByCountries(self.countries.clone())
        } else if let Some(id) = &self.alert {
            StreamFilter::ByAlert(id.clone())
        } else if self.all_alerts {
            StreamFilter::ByAllAlerts
        } else {
            StreamFilter::All
        }
    }
}

/// Print banners until Ctrl+C, the limit, or the end of the stream
pub async fn stream(client: &ShodanClient, args: &StreamArgs, ctx: &OutputContext) -> Result<()> {
    let filter = args.filter();
    ctx.info(&format!("Streaming {} banners...", filter));
    ctx.info("Press Ctrl+C to stop");

    // Ctrl+C cancels the token; the session then closes its channel
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    ctrlc::set_handler(move || token.cancel())?;

    let mut banners = client.stream(filter, &cancel).await?;

    let alert = banners.alert();
    if let Some(name) = &alert.name {
        ctx.info(&format!(
            "Alert: {} ({})",
            name,
            alert.id.as_deref().unwrap_or("-")
        ));
    }

    let mut received = 0usize;
    while let Some(banner) = banners.recv().await {
        ctx.print_banner(&banner);
        received += 1;
        if args.limit.is_some_and(|limit| received >= limit) {
            break;
        }
    }

    let reason = banners.finish().await;
    if reason.is_failure() {
        bail!("Stream closed after {} banner(s): {}", received, reason);
    }

    ctx.success(&format!("Received {} banner(s), {}", received, reason));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: StreamArgs,
    }

    fn parse(argv: &[&str]) -> Result<StreamArgs, clap::Error> {
        Harness::try_parse_from(std::iter::once("stream").chain(argv.iter().copied()))
            .map(|h| h.args)
    }

    #[test]
    fn test_no_filter_streams_everything() {
        assert_eq!(parse(&[]).unwrap().filter(), StreamFilter::All);
    }

    #[test]
    fn test_comma_separated_ports() {
        let args = parse(&["--ports", "22,443", "--limit", "5"]).unwrap();
        assert_eq!(args.filter(), StreamFilter::ByPorts(vec![22, 443]));
        assert_eq!(args.limit, Some(5));
    }

    #[test]
    fn test_alert_filters() {
        assert_eq!(
            parse(&["--alert", "OYPRB8IR9Z35AZPR"]).unwrap().filter(),
            StreamFilter::ByAlert("OYPRB8IR9Z35AZPR".into())
        );
        assert_eq!(
            parse(&["--all-alerts"]).unwrap().filter(),
            StreamFilter::ByAllAlerts
        );
    }

    #[test]
    fn test_filters_are_exclusive() {
        assert!(parse(&["--ports", "22", "--countries", "DE"]).is_err());
    }
}
