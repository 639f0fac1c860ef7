//! Shodan Client Library
//!
//! A typed client for the Shodan API. The core is banner streaming: a
//! long-lived HTTP connection delivering newline-delimited JSON banners,
//! decoded and handed to the caller through a cancellable per-session
//! channel.
//!
//! # Example
//!
//! ```rust,no_run
//! use shodan_client::{CancellationToken, ShodanClient, StreamFilter};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ShodanClient::from_env()?;
//!     let cancel = CancellationToken::new();
//!
//!     // Banners from German and Dutch hosts
//!     let filter = StreamFilter::ByCountries(vec!["de".into(), "nl".into()]);
//!     let mut stream = client.stream(filter, &cancel).await?;
//!
//!     while let Some(banner) = stream.recv().await {
//!         println!("{:?} {:?}", banner.ip(), banner.port());
//!     }
//!
//!     // Plain request/response calls
//!     let info = client.api_info().await?;
//!     println!("plan: {}", info.plan);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! The `testing` module serves an axum router on an ephemeral port and
//! returns a client pointed at it:
//!
//! ```rust,ignore
//! use shodan_client::testing::TestServer;
//!
//! let server = TestServer::start(router).await?;
//! let ports = server.client.ports().await?;
//! ```

mod client;
mod config;
mod error;
pub mod streaming;
pub mod testing;
mod types;

pub use client::ShodanClient;
pub use config::{ClientConfig, API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_STREAM_BASE_URL};
pub use error::{Result, ShodanClientError, BODY_UNREADABLE};
pub use types::*;

// Re-export streaming types for convenience
pub use streaming::{
    AlertMetadata, BannerStream, HostObservation, SessionState, StreamFilter, StreamTermination,
};

pub use tokio_util::sync::CancellationToken;
