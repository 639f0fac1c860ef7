//! Banner decoding
//!
//! Each frame is one JSON object. The object is kept as an open map so new
//! upstream fields survive decoding; well-known fields get typed accessors.

use std::net::IpAddr;
use std::sync::Arc;

use bytes::Bytes;
use chrono::NaiveDateTime;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const ALERT_ID_HEADER: &str = "SHODAN-ALERT-ID";
pub const ALERT_NAME_HEADER: &str = "SHODAN-ALERT-NAME";
pub const ALERT_TRIGGER_HEADER: &str = "SHODAN-ALERT-TRIGGER";
pub const SIGNATURE_HEADER: &str = "SHODAN-SIGNATURE-SHA1";

/// Timestamp layout used by the banner `timestamp` field
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Alert that triggered delivery on a connection.
///
/// Read once from the response headers and shared by every banner of that
/// connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMetadata {
    pub id: Option<String>,
    pub name: Option<String>,
    pub trigger: Option<String>,
    pub sha1_signature: Option<String>,
}

impl AlertMetadata {
    /// Capture alert metadata from response headers
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        };

        Self {
            id: get(ALERT_ID_HEADER),
            name: get(ALERT_NAME_HEADER),
            trigger: get(ALERT_TRIGGER_HEADER),
            sha1_signature: get(SIGNATURE_HEADER),
        }
    }

    /// True when no alert header was present
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.name.is_none()
            && self.trigger.is_none()
            && self.sha1_signature.is_none()
    }
}

/// Geolocation block of a banner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region_code: Option<String>,
    #[serde(default)]
    pub area_code: Option<i64>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub country_name: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub country_code3: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub dma_code: Option<i64>,
}

/// One observed host banner plus the alert metadata of its connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostObservation {
    /// Upstream banner fields, as received
    #[serde(flatten)]
    pub fields: Map<String, Value>,

    /// Alert metadata of the connection that produced this banner
    #[serde(skip)]
    pub alert: Arc<AlertMetadata>,
}

impl HostObservation {
    /// Get a field as a specific type
    pub fn get<T: serde::de::DeserializeOwned>(&self, field: &str) -> Option<T> {
        self.fields
            .get(field)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Get a field as string
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|v| v.as_str())
    }

    /// Check if a field is present
    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Address from `ip_str`
    pub fn ip(&self) -> Option<IpAddr> {
        self.get_str("ip_str").and_then(|s| s.parse().ok())
    }

    /// IPv4 address as an integer (`ip`)
    pub fn ip_long(&self) -> Option<u64> {
        self.fields.get("ip").and_then(|v| v.as_u64())
    }

    pub fn port(&self) -> Option<u16> {
        self.fields
            .get("port")
            .and_then(|v| v.as_u64())
            .and_then(|p| u16::try_from(p).ok())
    }

    pub fn transport(&self) -> Option<&str> {
        self.get_str("transport")
    }

    /// Time the banner was collected
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        self.get_str("timestamp")
            .and_then(|s| NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok())
    }

    pub fn hostnames(&self) -> Vec<String> {
        self.get("hostnames").unwrap_or_default()
    }

    pub fn domains(&self) -> Vec<String> {
        self.get("domains").unwrap_or_default()
    }

    pub fn product(&self) -> Option<&str> {
        self.get_str("product")
    }

    pub fn org(&self) -> Option<&str> {
        self.get_str("org")
    }

    pub fn asn(&self) -> Option<&str> {
        self.get_str("asn")
    }

    /// Raw banner text
    pub fn data(&self) -> Option<&str> {
        self.get_str("data")
    }

    pub fn location(&self) -> Option<Location> {
        self.get("location")
    }
}

/// A frame that is not a JSON object
#[derive(Debug, Clone, Error)]
#[error("malformed banner frame ({} bytes): {message}", raw.len())]
pub struct DecodeError {
    /// Frame bytes as received
    pub raw: Bytes,
    pub message: String,
}

impl DecodeError {
    /// Frame text for diagnostics, cut to `max` bytes
    pub fn preview(&self, max: usize) -> String {
        let text = String::from_utf8_lossy(&self.raw);
        if text.len() > max {
            let mut end = max;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &text[..end])
        } else {
            text.into_owned()
        }
    }
}

/// Decode one frame into a banner carrying the connection's alert metadata
pub fn decode(frame: &Bytes, alert: &Arc<AlertMetadata>) -> Result<HostObservation, DecodeError> {
    match serde_json::from_slice::<Map<String, Value>>(frame) {
        Ok(fields) => Ok(HostObservation {
            fields,
            alert: Arc::clone(alert),
        }),
        Err(e) => Err(DecodeError {
            raw: frame.clone(),
            message: e.to_string(),
        }),
    }
}
