//! Stream filter selection

use std::fmt;

use crate::error::{Result, ShodanClientError};

const BANNERS_PATH: &str = "/shodan/banners";
const PORTS_PATH: &str = "/shodan/ports";
const ASN_PATH: &str = "/shodan/asn";
const COUNTRIES_PATH: &str = "/shodan/countries";
const ALERT_PATH: &str = "/shodan/alert";

/// Characters that would change the meaning of a path segment. `%` is
/// included so an encoded `/` or `.` cannot get through either.
const RESERVED: &[char] = &['/', '\\', ',', '?', '#', '%'];

/// Selects which banner stream a session subscribes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFilter {
    /// Every banner the crawlers collect
    All,
    /// Banners for the given ports
    ByPorts(Vec<u16>),
    /// Banners for devices in the given ASNs (e.g. `"AS3303"`)
    ByAsn(Vec<String>),
    /// Banners for devices in the given countries (ISO codes, any case)
    ByCountries(Vec<String>),
    /// Banners on the IP ranges of one network alert
    ByAlert(String),
    /// Banners on the IP ranges of all network alerts
    ByAllAlerts,
}

impl StreamFilter {
    /// Resolve the filter to its endpoint path.
    ///
    /// List elements are comma-joined in the order given. An empty list is
    /// passed through as an empty segment; the service decides what it means.
    pub fn path(&self) -> Result<String> {
        let path = match self {
            Self::All => BANNERS_PATH.to_string(),
            Self::ByPorts(ports) => {
                let joined = ports
                    .iter()
                    .map(u16::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{}/{}", PORTS_PATH, joined)
            }
            Self::ByAsn(asns) => format!("{}/{}", ASN_PATH, join_checked("ASN", asns)?),
            Self::ByCountries(countries) => {
                let upper: Vec<String> = countries.iter().map(|c| c.to_uppercase()).collect();
                format!("{}/{}", COUNTRIES_PATH, join_checked("country", &upper)?)
            }
            Self::ByAlert(id) => {
                check_alert_id(id).map_err(ShodanClientError::InvalidFilter)?;
                format!("{}/{}", ALERT_PATH, id)
            }
            Self::ByAllAlerts => ALERT_PATH.to_string(),
        };

        Ok(path)
    }

    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::ByPorts(_) => "ports",
            Self::ByAsn(_) => "asn",
            Self::ByCountries(_) => "countries",
            Self::ByAlert(_) => "alert",
            Self::ByAllAlerts => "all_alerts",
        }
    }
}

impl fmt::Display for StreamFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all banners"),
            Self::ByPorts(ports) => write!(f, "ports {:?}", ports),
            Self::ByAsn(asns) => write!(f, "ASNs {}", asns.join(",")),
            Self::ByCountries(c) => write!(f, "countries {}", c.join(",")),
            Self::ByAlert(id) => write!(f, "alert {}", id),
            Self::ByAllAlerts => write!(f, "all alerts"),
        }
    }
}

fn join_checked(what: &str, items: &[String]) -> Result<String> {
    for item in items {
        check_element(what, item).map_err(ShodanClientError::InvalidFilter)?;
    }
    Ok(items.join(","))
}

/// Check that an alert id can be used as a single path segment.
///
/// Shared with the alert management endpoints, which put the id in the path
/// the same way.
pub(crate) fn check_alert_id(id: &str) -> std::result::Result<(), String> {
    // An empty id would collide with the all-alerts path
    if id.trim().is_empty() {
        return Err("alert id must not be empty".into());
    }
    check_element("alert id", id)
}

fn check_element(what: &str, value: &str) -> std::result::Result<(), String> {
    // URL parsing drops control characters and resolves dot segments, which
    // would move the request onto another stream's path
    if value.contains(RESERVED) || value.chars().any(char::is_control) {
        return Err(format!("{} {:?} contains a reserved character", what, value));
    }
    if value == "." || value == ".." {
        return Err(format!("{} {:?} is a dot segment", what, value));
    }
    Ok(())
}
