//! Output formatting for shodan-cli (table, json)

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use shodan_client::{Alert, HostObservation, HostSearch};
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Json => "json",
        }
    }

    /// Parse a format name from the config file; unknown names fall back to table
    pub fn from_name(name: &str) -> Self {
        <Self as ValueEnum>::from_str(name, true).unwrap_or_default()
    }
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Print a success message (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{}", msg.green());
        }
    }

    /// Print an info message (unless in quiet mode)
    ///
    /// Goes to stderr so JSON output on stdout stays parseable.
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{}", msg);
        }
    }

    /// Print data in the configured format
    pub fn print<T: Tabled + Serialize>(&self, data: &[T]) {
        match self.format {
            OutputFormat::Table => {
                if data.is_empty() {
                    if !self.quiet {
                        println!("No data");
                    }
                } else {
                    println!("{}", Table::new(data));
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(data).unwrap_or_else(|_| "[]".to_string())
                );
            }
        }
    }

    /// Print key-value pairs (for info commands)
    pub fn print_kv(&self, pairs: &[(&str, String)]) {
        match self.format {
            OutputFormat::Table => {
                for (key, value) in pairs {
                    println!("{}: {}", key.bold(), value);
                }
            }
            OutputFormat::Json => {
                let map: serde_json::Map<String, serde_json::Value> = pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.clone())))
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&map).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
    }

    /// Print a whole response as pretty JSON
    pub fn print_json<T: Serialize>(&self, value: &T) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
        );
    }

    /// Print one streamed banner: a single line in table mode, one JSON
    /// document per line otherwise
    pub fn print_banner(&self, banner: &HostObservation) {
        match self.format {
            OutputFormat::Table => {
                let row = BannerRow::from(banner);
                println!(
                    "[{}] {}:{}/{} {} {} {}",
                    row.timestamp.dimmed(),
                    row.ip.bold(),
                    row.port,
                    row.transport,
                    row.country.cyan(),
                    row.org,
                    row.product
                );
            }
            OutputFormat::Json => {
                if let Ok(json) = serde_json::to_string(banner) {
                    println!("{}", json);
                }
            }
        }
    }
}

/// Render an optional field, `-` when absent
pub fn or_dash<T: ToString>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}

// =============================================================================
// Display types for various commands
// =============================================================================

/// Port display for ports command
#[derive(Debug, Tabled, Serialize)]
pub struct PortRow {
    #[tabled(rename = "Port")]
    pub port: u16,
}

/// Protocol display for protocols command
#[derive(Debug, Tabled, Serialize)]
pub struct ProtocolRow {
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Description")]
    pub description: String,
}

/// Header display for headers command
#[derive(Debug, Tabled, Serialize)]
pub struct HeaderRow {
    #[tabled(rename = "Header")]
    pub name: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

/// Name/address pair for resolve and reverse commands
#[derive(Debug, Tabled, Serialize)]
pub struct DnsRow {
    #[tabled(rename = "Query")]
    pub query: String,
    #[tabled(rename = "Result")]
    pub result: String,
}

/// Alert display for alert commands
#[derive(Debug, Tabled, Serialize)]
pub struct AlertRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "IPs")]
    pub ips: String,
    #[tabled(rename = "Size")]
    pub size: i64,
    #[tabled(rename = "Expires")]
    pub expiration: String,
}

impl From<&Alert> for AlertRow {
    fn from(alert: &Alert) -> Self {
        let ips = alert
            .filters
            .as_ref()
            .map(|f| f.ip.join(", "))
            .filter(|ips| !ips.is_empty());
        let expiration = if alert.expired {
            "expired".to_string()
        } else {
            or_dash(alert.expiration.as_deref())
        };
        Self {
            id: alert.id.clone(),
            name: alert.name.clone(),
            ips: or_dash(ips),
            size: alert.size,
            expiration,
        }
    }
}

/// Facet bucket display for search and count commands
#[derive(Debug, Tabled, Serialize)]
pub struct FacetRow {
    #[tabled(rename = "Facet")]
    pub facet: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Count")]
    pub count: u64,
}

impl FacetRow {
    /// Rows for every facet, facets sorted by name, buckets in service order
    pub fn from_search(results: &HostSearch) -> Vec<Self> {
        let mut names: Vec<&String> = results.facets.keys().collect();
        names.sort();
        names
            .into_iter()
            .flat_map(|name| {
                results.facets[name].iter().map(move |bucket| Self {
                    facet: name.clone(),
                    value: match &bucket.value {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    },
                    count: bucket.count,
                })
            })
            .collect()
    }
}

/// Banner display for stream, host and search commands
#[derive(Debug, Tabled, Serialize)]
pub struct BannerRow {
    #[tabled(rename = "Time")]
    pub timestamp: String,
    #[tabled(rename = "IP")]
    pub ip: String,
    #[tabled(rename = "Port")]
    pub port: String,
    #[tabled(rename = "Transport")]
    pub transport: String,
    #[tabled(rename = "Country")]
    pub country: String,
    #[tabled(rename = "Org")]
    pub org: String,
    #[tabled(rename = "Product")]
    pub product: String,
}

impl From<&HostObservation> for BannerRow {
    fn from(banner: &HostObservation) -> Self {
        Self {
            timestamp: or_dash(banner.timestamp()),
            ip: or_dash(banner.ip()),
            port: or_dash(banner.port()),
            transport: banner.transport().unwrap_or("tcp").to_string(),
            country: or_dash(banner.location().and_then(|l| l.country_code)),
            org: or_dash(banner.org()),
            product: or_dash(banner.product()),
        }
    }
}
