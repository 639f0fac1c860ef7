//! Response types for the request/response endpoints

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::streaming::{HostObservation, Location};

/// Error body returned by the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// API plan information (`/api-info`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiInfo {
    #[serde(default)]
    pub query_credits: i64,
    #[serde(default)]
    pub scan_credits: i64,
    #[serde(default)]
    pub telnet: bool,
    #[serde(default)]
    pub plan: String,
    #[serde(default)]
    pub https: bool,
    #[serde(default)]
    pub unlocked: bool,
    #[serde(default)]
    pub unlocked_left: i64,
}

/// Account linked to the API key (`/account/profile`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountProfile {
    #[serde(default)]
    pub member: bool,
    #[serde(default)]
    pub credits: i64,
    #[serde(default, rename = "display_name")]
    pub name: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
}

// =============================================================================
// Network Alerts
// =============================================================================

/// Criteria of a network alert
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertFilters {
    /// IPs and netblocks (CIDR) monitored by the alert
    #[serde(default)]
    pub ip: Vec<String>,
}

/// A network alert (`/shodan/alert/{id}/info`)
///
/// The `id` is what [`StreamFilter::ByAlert`](crate::StreamFilter::ByAlert)
/// subscribes to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub expiration: Option<String>,
    /// Lifetime in seconds, 0 for none
    #[serde(default)]
    pub expires: i64,
    #[serde(default)]
    pub expired: bool,
    /// Number of IPs covered
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub filters: Option<AlertFilters>,
    #[serde(default)]
    pub notifiers: Vec<serde_json::Value>,
    #[serde(default)]
    pub triggers: HashMap<String, serde_json::Value>,
}

/// Body of `POST /shodan/alert`
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CreateAlertRequest<'a> {
    pub name: &'a str,
    pub filters: AlertFilters,
    pub expires: u32,
}

// =============================================================================
// Hosts & Search
// =============================================================================

/// Query options for a host lookup
#[derive(Debug, Clone, Copy, Default)]
pub struct HostOptions {
    /// Include historical banners
    pub history: bool,
    /// Only return ports and general host information
    pub minify: bool,
}

/// Everything known about one IP (`/shodan/host/{ip}`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Host {
    #[serde(default)]
    pub ip_str: String,
    #[serde(default)]
    pub ip: Option<u64>,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub ports: Vec<u16>,
    #[serde(default)]
    pub hostnames: Vec<String>,
    #[serde(default)]
    pub org: Option<String>,
    #[serde(default)]
    pub isp: Option<String>,
    #[serde(default)]
    pub asn: Option<String>,
    #[serde(default)]
    pub vulns: Vec<String>,
    #[serde(default)]
    pub last_update: Option<String>,
    /// Banners, in the same shape as streamed ones
    #[serde(default)]
    pub data: Vec<HostObservation>,
    #[serde(flatten)]
    pub location: Location,
}

/// Search query with optional facets and page
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub query: String,
    /// Comma-separated facets, e.g. `country:10,port`
    pub facets: Option<String>,
    /// Result page, starting at 1
    pub page: Option<u32>,
    pub minify: bool,
}

impl SearchOptions {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub(crate) fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("query", self.query.clone())];
        if let Some(facets) = &self.facets {
            params.push(("facets", facets.clone()));
        }
        if let Some(page) = self.page {
            params.push(("page", page.to_string()));
        }
        if self.minify {
            params.push(("minify", "true".to_string()));
        }
        params
    }
}

/// One facet bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facet {
    pub count: u64,
    pub value: serde_json::Value,
}

/// Search results (`/shodan/host/search`, `/shodan/host/count`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostSearch {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub facets: HashMap<String, Vec<Facet>>,
    /// Empty for count queries
    #[serde(default)]
    pub matches: Vec<HostObservation>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_host_flattens_location() {
        let host: Host = serde_json::from_value(json!({
            "ip_str": "192.0.2.10",
            "ports": [22, 80],
            "country_code": "DE",
            "city": "Berlin",
            "data": [{ "port": 22, "transport": "tcp" }]
        }))
        .unwrap();

        assert_eq!(host.ports, vec![22, 80]);
        assert_eq!(host.location.country_code.as_deref(), Some("DE"));
        assert_eq!(host.data[0].port(), Some(22));
    }

    #[test]
    fn test_search_params_skip_unset() {
        let mut options = SearchOptions::new("apache country:DE");
        assert_eq!(options.params().len(), 1);

        options.facets = Some("port:5".into());
        options.page = Some(2);
        let params = options.params();
        assert!(params.contains(&("facets", "port:5".to_string())));
        assert!(params.contains(&("page", "2".to_string())));
    }
}
