//! Shodan HTTP client implementation

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Result, ShodanClientError};
use crate::streaming::{
    build_stream_url, check_alert_id, redacted, service_error, with_key, BannerStream,
    SessionOptions, StreamFilter,
};
use crate::types::*;

/// TCP keep-alive interval for stream connections
const STREAM_KEEPALIVE: Duration = Duration::from_secs(60);

/// Shodan API client
///
/// Cheap to clone; clones share the connection pools and configuration.
#[derive(Debug, Clone)]
pub struct ShodanClient {
    /// Client for request/response calls (total timeout applies)
    client: Client,
    /// Client for stream calls (connect timeout only)
    stream_client: Client,
    base_url: Url,
    stream_base_url: Url,
    config: Arc<ClientConfig>,
}

impl ShodanClient {
    /// Create a client with default endpoints
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_config(ClientConfig::new(api_key))
    }

    /// Create a client using the key from `SHODAN_KEY`
    pub fn from_env() -> Result<Self> {
        Self::with_config(ClientConfig::from_env())
    }

    /// Create a client from a full configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()?;

        // No total timeout: it would cut a healthy stream
        let stream_client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .tcp_keepalive(STREAM_KEEPALIVE)
            .build()?;

        let base_url = Url::parse(&config.base_url)?;
        let stream_base_url = Url::parse(&config.stream_base_url)?;

        Ok(Self {
            client,
            stream_client,
            base_url,
            stream_base_url,
            config: Arc::new(config),
        })
    }

    /// Get the REST base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Get the stream base URL
    pub fn stream_base_url(&self) -> &Url {
        &self.stream_base_url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // =========================================================================
    // Banner Streams
    // =========================================================================

    /// Open a banner stream for `filter`.
    ///
    /// Filter and connection errors are returned here. Once this returns
    /// `Ok`, every later failure only closes the stream; use
    /// [`BannerStream::finish`] to learn why.
    #[instrument(skip(self, filter, cancel), fields(filter = filter.kind()))]
    pub async fn stream(
        &self,
        filter: StreamFilter,
        cancel: &CancellationToken,
    ) -> Result<BannerStream> {
        let url = build_stream_url(&self.stream_base_url, &filter, &self.config.api_key)?;
        debug!("Opening {} stream", filter);

        BannerStream::open(&self.stream_client, url, cancel, self.session_options()).await
    }

    /// All banners the crawlers collect
    pub async fn stream_banners(&self, cancel: &CancellationToken) -> Result<BannerStream> {
        self.stream(StreamFilter::All, cancel).await
    }

    /// Banners for the given ports only
    pub async fn stream_banners_by_ports(
        &self,
        ports: &[u16],
        cancel: &CancellationToken,
    ) -> Result<BannerStream> {
        self.stream(StreamFilter::ByPorts(ports.to_vec()), cancel).await
    }

    /// Banners for devices in the given ASNs
    pub async fn stream_banners_by_asn(
        &self,
        asns: &[String],
        cancel: &CancellationToken,
    ) -> Result<BannerStream> {
        self.stream(StreamFilter::ByAsn(asns.to_vec()), cancel).await
    }

    /// Banners for devices located in the given countries
    pub async fn stream_banners_by_countries(
        &self,
        countries: &[String],
        cancel: &CancellationToken,
    ) -> Result<BannerStream> {
        self.stream(StreamFilter::ByCountries(countries.to_vec()), cancel)
            .await
    }

    /// Banners on the IP ranges of one network alert
    pub async fn stream_banners_by_alert(
        &self,
        alert_id: &str,
        cancel: &CancellationToken,
    ) -> Result<BannerStream> {
        self.stream(StreamFilter::ByAlert(alert_id.to_string()), cancel)
            .await
    }

    /// Banners on the IP ranges of every network alert
    pub async fn stream_banners_by_alerts(
        &self,
        cancel: &CancellationToken,
    ) -> Result<BannerStream> {
        self.stream(StreamFilter::ByAllAlerts, cancel).await
    }

    fn session_options(&self) -> SessionOptions {
        SessionOptions {
            channel_capacity: self.config.channel_capacity,
            max_frame_bytes: self.config.max_frame_bytes,
        }
    }

    // =========================================================================
    // Account & API
    // =========================================================================

    /// Plan and credit information for the API key
    #[instrument(skip(self))]
    pub async fn api_info(&self) -> Result<ApiInfo> {
        self.get_json("/api-info", &[]).await
    }

    /// Account linked to the API key
    #[instrument(skip(self))]
    pub async fn account_profile(&self) -> Result<AccountProfile> {
        self.get_json("/account/profile", &[]).await
    }

    // =========================================================================
    // Tools
    // =========================================================================

    /// Current public IP address as seen by the service
    #[instrument(skip(self))]
    pub async fn my_ip(&self) -> Result<IpAddr> {
        let ip: String = self.get_json("/tools/myip", &[]).await?;
        ip.trim()
            .parse()
            .map_err(|e| ShodanClientError::Parse(format!("Invalid IP {:?}: {}", ip, e)))
    }

    /// Headers this client sends when connecting to a web server
    #[instrument(skip(self))]
    pub async fn http_headers(&self) -> Result<HashMap<String, String>> {
        self.get_json("/tools/httpheaders", &[]).await
    }

    // =========================================================================
    // Crawler Metadata
    // =========================================================================

    /// Ports the crawlers are looking for
    #[instrument(skip(self))]
    pub async fn ports(&self) -> Result<Vec<u16>> {
        self.get_json("/shodan/ports", &[]).await
    }

    /// Protocols usable for on-demand scans (name -> description)
    #[instrument(skip(self))]
    pub async fn protocols(&self) -> Result<HashMap<String, String>> {
        self.get_json("/shodan/protocols", &[]).await
    }

    // =========================================================================
    // DNS
    // =========================================================================

    /// Resolve hostnames; unresolved names map to `None`
    #[instrument(skip(self))]
    pub async fn dns_resolve(
        &self,
        hostnames: &[String],
    ) -> Result<HashMap<String, Option<IpAddr>>> {
        let joined = hostnames.join(",");
        self.get_json("/dns/resolve", &[("hostnames", joined.as_str())])
            .await
    }

    /// Hostnames defined for the given addresses
    #[instrument(skip(self))]
    pub async fn dns_reverse(
        &self,
        ips: &[IpAddr],
    ) -> Result<HashMap<String, Option<Vec<String>>>> {
        let joined = ips
            .iter()
            .map(IpAddr::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.get_json("/dns/reverse", &[("ips", joined.as_str())])
            .await
    }

    // =========================================================================
    // Network Alerts
    // =========================================================================

    /// Create a network alert monitoring `ips` (addresses or CIDR netblocks).
    ///
    /// `expires` is the lifetime in seconds, 0 for an alert that never expires.
    #[instrument(skip(self))]
    pub async fn create_alert(&self, name: &str, ips: &[String], expires: u32) -> Result<Alert> {
        if ips.is_empty() {
            return Err(ShodanClientError::InvalidArgument(
                "an alert needs at least one IP or netblock".into(),
            ));
        }
        let body = CreateAlertRequest {
            name,
            filters: AlertFilters { ip: ips.to_vec() },
            expires,
        };

        let url = with_key(&self.base_url, "/shodan/alert", &self.config.api_key)?;
        debug!(url = %redacted(&url), "POST");

        let response = self.client.post(url).json(&body).send().await?;
        self.handle_response(response).await
    }

    /// All network alerts of the account
    #[instrument(skip(self))]
    pub async fn alerts(&self) -> Result<Vec<Alert>> {
        self.get_json("/shodan/alert/info", &[]).await
    }

    /// One network alert
    #[instrument(skip(self))]
    pub async fn alert(&self, id: &str) -> Result<Alert> {
        check_alert_id(id).map_err(ShodanClientError::InvalidArgument)?;
        self.get_json(&format!("/shodan/alert/{}/info", id), &[])
            .await
    }

    /// Delete a network alert
    #[instrument(skip(self))]
    pub async fn delete_alert(&self, id: &str) -> Result<()> {
        check_alert_id(id).map_err(ShodanClientError::InvalidArgument)?;
        let url = with_key(
            &self.base_url,
            &format!("/shodan/alert/{}", id),
            &self.config.api_key,
        )?;
        debug!(url = %redacted(&url), "DELETE");

        let response = self.client.delete(url).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(service_error(response).await)
        }
    }

    // =========================================================================
    // Hosts & Search
    // =========================================================================

    /// All services found on one IP
    #[instrument(skip(self))]
    pub async fn host(&self, ip: IpAddr, options: HostOptions) -> Result<Host> {
        let mut params = Vec::new();
        if options.history {
            params.push(("history", "true"));
        }
        if options.minify {
            params.push(("minify", "true"));
        }
        self.get_json(&format!("/shodan/host/{}", ip), &params)
            .await
    }

    /// Search the banner database with the Shodan query syntax
    #[instrument(skip(self, options), fields(query = %options.query))]
    pub async fn search(&self, options: &SearchOptions) -> Result<HostSearch> {
        self.host_query("/shodan/host/search", options).await
    }

    /// Like [`search`](Self::search) but only returns the total and facets
    #[instrument(skip(self, options), fields(query = %options.query))]
    pub async fn search_count(&self, options: &SearchOptions) -> Result<HostSearch> {
        self.host_query("/shodan/host/count", options).await
    }

    async fn host_query(&self, path: &str, options: &SearchOptions) -> Result<HostSearch> {
        if options.query.trim().is_empty() {
            return Err(ShodanClientError::InvalidArgument(
                "search query must not be empty".into(),
            ));
        }
        let params = options.params();
        let params: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        self.get_json(path, &params).await
    }

    // =========================================================================
    // Helper Methods
    // =========================================================================

    /// GET `path` on the REST base URL with the API key and decode the JSON body
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let mut url = with_key(&self.base_url, path, &self.config.api_key)?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        debug!(url = %redacted(&url), "GET");

        let response = self.client.get(url).send().await?;
        self.handle_response(response).await
    }

    /// Handle response, returning parsed JSON or error
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if response.status().is_success() {
            response
                .json()
                .await
                .map_err(|e| ShodanClientError::Parse(e.to_string()))
        } else {
            Err(service_error(response).await)
        }
    }
}
