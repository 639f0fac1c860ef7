//! Stream connection establishment

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use reqwest::{Client, Response, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::decode::AlertMetadata;
use super::request::redacted;
use crate::error::{Result, ShodanClientError, BODY_UNREADABLE};
use crate::types::ErrorResponse;

/// Response body as a stream of byte chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// An open banner stream: the response body plus the alert metadata captured
/// from its headers.
///
/// The body is released at most once, either by the frame reader when the
/// stream ends or by the session on cancellation. Dropping the connection
/// releases it as well.
pub struct StreamConnection {
    body: Option<ByteStream>,
    alert: Arc<AlertMetadata>,
    status: StatusCode,
}

impl StreamConnection {
    /// Wrap an already open body
    pub fn new(body: ByteStream, alert: AlertMetadata) -> Self {
        Self {
            body: Some(body),
            alert: Arc::new(alert),
            status: StatusCode::OK,
        }
    }

    /// Alert metadata of this connection
    pub fn alert(&self) -> &Arc<AlertMetadata> {
        &self.alert
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_released(&self) -> bool {
        self.body.is_none()
    }

    /// Close the body. Returns `true` only for the call that actually closed it.
    pub fn release(&mut self) -> bool {
        match self.body.take() {
            Some(body) => {
                drop(body);
                debug!("Stream connection released");
                true
            }
            None => false,
        }
    }

    pub(crate) fn body_mut(&mut self) -> Option<&mut ByteStream> {
        self.body.as_mut()
    }
}

impl fmt::Debug for StreamConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConnection")
            .field("status", &self.status)
            .field("alert", &self.alert)
            .field("released", &self.is_released())
            .finish()
    }
}

/// Send a stream request and return the still-open body.
///
/// Fails with [`ShodanClientError::Transport`] when no response arrives,
/// [`ShodanClientError::Service`] on a non-success status and
/// [`ShodanClientError::Cancelled`] if `cancel` fires first.
pub async fn open(http: &Client, url: Url, cancel: &CancellationToken) -> Result<StreamConnection> {
    debug!(url = %redacted(&url), "Connecting to banner stream");

    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ShodanClientError::Cancelled),
        response = http.get(url).send() => response?,
    };

    let status = response.status();
    if !status.is_success() {
        return Err(service_error(response).await);
    }

    let alert = AlertMetadata::from_headers(response.headers());
    debug!(%status, ?alert, "Banner stream open");

    let body = response
        .bytes_stream()
        .map(|chunk| chunk.map_err(std::io::Error::other));

    Ok(StreamConnection {
        body: Some(Box::pin(body)),
        alert: Arc::new(alert),
        status,
    })
}

/// Build a service error from a failed response, consuming its body
pub(crate) async fn service_error(response: Response) -> ShodanClientError {
    let status = response.status().as_u16();

    let message = match response.bytes().await {
        Ok(body) => match serde_json::from_slice::<ErrorResponse>(&body) {
            Ok(err) => err.error,
            Err(_) => {
                let text = String::from_utf8_lossy(&body).trim().to_string();
                if text.is_empty() {
                    BODY_UNREADABLE.to_string()
                } else {
                    text
                }
            }
        },
        Err(_) => BODY_UNREADABLE.to_string(),
    };

    ShodanClientError::service(status, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn test_release_is_idempotent() {
        let body = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"{}\n"))]);
        let mut conn = StreamConnection::new(Box::pin(body), AlertMetadata::default());

        assert!(!conn.is_released());
        assert!(conn.release());
        assert!(!conn.release());
        assert!(conn.is_released());
        assert!(conn.body_mut().is_none());
    }

    #[tokio::test]
    async fn test_open_honours_prior_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let url = Url::parse("http://127.0.0.1:9/shodan/banners").unwrap();
        let err = open(&Client::new(), url, &cancel).await.unwrap_err();
        assert!(matches!(err, ShodanClientError::Cancelled));
    }
}
