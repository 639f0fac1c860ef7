//! Banner streaming
//!
//! Opens one of the filtered banner streams, splits the body into
//! newline-delimited frames, decodes each frame and hands the banners to the
//! caller over a per-session channel.
//!
//! # Example
//!
//! ```no_run
//! use shodan_client::{ShodanClient, StreamFilter};
//! use shodan_client::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ShodanClient::from_env()?;
//! let cancel = CancellationToken::new();
//!
//! let mut stream = client
//!     .stream(StreamFilter::ByPorts(vec![22, 443]), &cancel)
//!     .await?;
//!
//! while let Some(banner) = stream.recv().await {
//!     println!("{:?}:{:?} {:?}", banner.ip(), banner.port(), banner.product());
//! }
//!
//! // Why did it end?
//! println!("{:?}", stream.finish().await);
//! # Ok(())
//! # }
//! ```

mod connector;
mod decode;
mod filter;
mod frame;
mod request;
mod session;

pub use connector::{open, ByteStream, StreamConnection};
pub use decode::{decode, AlertMetadata, DecodeError, HostObservation, Location};
pub use filter::StreamFilter;
pub use frame::{FrameReader, ReadOutcome};
pub use request::build_stream_url;
pub use session::{BannerStream, SessionOptions, SessionState, StreamTermination};

pub(crate) use connector::service_error;
pub(crate) use filter::check_alert_id;
pub(crate) use request::{redacted, with_key};
