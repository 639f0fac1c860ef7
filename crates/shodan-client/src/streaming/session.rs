//! Streaming session
//!
//! A session owns one connection, one read loop running on its own task and
//! one output channel. Nothing is shared with other sessions.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::Stream;
use reqwest::Client;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use super::connector::{self, StreamConnection};
use super::decode::{self, AlertMetadata, DecodeError, HostObservation};
use super::frame::{FrameReader, ReadOutcome};
use crate::error::Result;

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Opening,
    Streaming,
    Draining,
    /// Channel closed and connection released
    Closed,
}

/// Why a session ended.
///
/// Never sent on the banner channel; read it with [`BannerStream::finish`].
#[derive(Debug, Clone)]
pub enum StreamTermination {
    /// The service closed the body
    EndOfStream,
    /// The body failed mid-stream
    ReadError(String),
    /// A frame was not a JSON object
    DecodeError(DecodeError),
    /// The session token was cancelled
    Cancelled,
    /// The receiving side went away
    ConsumerClosed,
    /// The read loop task panicked or was aborted
    TaskFailed(String),
}

impl StreamTermination {
    /// True for the reasons a caller may want to reconnect after
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::ReadError(_) | Self::DecodeError(_) | Self::TaskFailed(_)
        )
    }
}

impl fmt::Display for StreamTermination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndOfStream => write!(f, "stream ended"),
            Self::ReadError(e) => write!(f, "read error: {}", e),
            Self::DecodeError(e) => write!(f, "{}", e),
            Self::Cancelled => write!(f, "cancelled"),
            Self::ConsumerClosed => write!(f, "consumer closed"),
            Self::TaskFailed(e) => write!(f, "stream task failed: {}", e),
        }
    }
}

/// Settings applied to each session
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub channel_capacity: usize,
    pub max_frame_bytes: usize,
}

/// Consumer side of a streaming session.
///
/// Yields banners in wire order until the session ends, then `None`.
/// Dropping it cancels the session.
pub struct BannerStream {
    id: String,
    rx: mpsc::Receiver<HostObservation>,
    cancel: CancellationToken,
    state: watch::Receiver<SessionState>,
    alert: Arc<AlertMetadata>,
    handle: Option<JoinHandle<StreamTermination>>,
}

impl BannerStream {
    /// Open `url` and start the read loop.
    ///
    /// The session runs under a child of `cancel`: cancelling the parent ends
    /// this session, cancelling this session leaves the parent untouched.
    pub async fn open(
        http: &Client,
        url: Url,
        cancel: &CancellationToken,
        options: SessionOptions,
    ) -> Result<Self> {
        let token = cancel.child_token();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);

        state_tx.send_replace(SessionState::Opening);
        let connection = match connector::open(http, url, &token).await {
            Ok(connection) => connection,
            Err(e) => {
                state_tx.send_replace(SessionState::Closed);
                return Err(e);
            }
        };

        Ok(Self::start(connection, token, state_tx, state_rx, options))
    }

    /// Start a session over an already open connection
    pub fn spawn(
        connection: StreamConnection,
        cancel: &CancellationToken,
        options: SessionOptions,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        Self::start(connection, cancel.child_token(), state_tx, state_rx, options)
    }

    fn start(
        connection: StreamConnection,
        token: CancellationToken,
        state_tx: watch::Sender<SessionState>,
        state_rx: watch::Receiver<SessionState>,
        options: SessionOptions,
    ) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(options.channel_capacity.max(1));
        let alert = Arc::clone(connection.alert());

        state_tx.send_replace(SessionState::Streaming);
        debug!(session = %id, "Banner stream session started");

        let dispatcher = Dispatcher {
            session: id.clone(),
            reader: FrameReader::new(options.max_frame_bytes),
            alert: Arc::clone(&alert),
            connection,
            tx,
            cancel: token.clone(),
            state: state_tx,
            delivered: 0,
        };
        let handle = tokio::spawn(dispatcher.run());

        Self {
            id,
            rx,
            cancel: token,
            state: state_rx,
            alert,
            handle: Some(handle),
        }
    }

    /// Session ID (for logs)
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Receive the next banner; `None` once the session has ended
    pub async fn recv(&mut self) -> Option<HostObservation> {
        self.rx.recv().await
    }

    /// Cancel the session. Safe to call any number of times.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Current lifecycle state.
    ///
    /// The channel closes just before `Closed` is published, so right after
    /// [`recv`](Self::recv) returns `None` this can still read `Draining`;
    /// wait on [`state_changes`](Self::state_changes) to observe `Closed`.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Alert metadata of the underlying connection
    pub fn alert(&self) -> &Arc<AlertMetadata> {
        &self.alert
    }

    /// End the session if it is still running and return why it ended.
    ///
    /// After the channel has been drained to `None` this is the reason the
    /// stream closed; on a live session it is [`StreamTermination::Cancelled`].
    pub async fn finish(mut self) -> StreamTermination {
        // Cancel first: the loop must not mistake the closed channel for a
        // consumer that went away on its own
        self.cancel.cancel();
        self.rx.close();
        match self.handle.take() {
            Some(handle) => match handle.await {
                Ok(reason) => reason,
                Err(e) => StreamTermination::TaskFailed(e.to_string()),
            },
            None => StreamTermination::TaskFailed("session already joined".into()),
        }
    }
}

impl fmt::Debug for BannerStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BannerStream")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("alert", &self.alert)
            .finish()
    }
}

impl Stream for BannerStream {
    type Item = HostObservation;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for BannerStream {
    fn drop(&mut self) {
        // Only reached when not finished: stop the loop so it releases the connection
        if self.handle.is_some() {
            self.cancel.cancel();
        }
    }
}

/// Read loop: frame reader → decoder → channel
struct Dispatcher {
    session: String,
    reader: FrameReader,
    connection: StreamConnection,
    alert: Arc<AlertMetadata>,
    tx: mpsc::Sender<HostObservation>,
    cancel: CancellationToken,
    state: watch::Sender<SessionState>,
    delivered: u64,
}

impl Dispatcher {
    async fn run(mut self) -> StreamTermination {
        let reason = self.pump().await;

        self.state.send_replace(SessionState::Draining);
        self.connection.release();

        let Dispatcher {
            session,
            tx,
            state,
            delivered,
            ..
        } = self;
        drop(tx);
        state.send_replace(SessionState::Closed);

        info!(session = %session, delivered, reason = ?reason, "Banner stream session closed");
        reason
    }

    async fn pump(&mut self) -> StreamTermination {
        loop {
            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return StreamTermination::Cancelled,
                outcome = self.reader.next_frame(&mut self.connection) => outcome,
            };

            let frame = match outcome {
                ReadOutcome::Frame(frame) => frame,
                ReadOutcome::Skip => {
                    trace!(session = %self.session, "Heartbeat");
                    continue;
                }
                ReadOutcome::EndOfStream => return StreamTermination::EndOfStream,
                ReadOutcome::ReadError(e) => {
                    warn!(session = %self.session, error = %e, "Banner stream read failed");
                    return StreamTermination::ReadError(e);
                }
            };

            let banner = match decode::decode(&frame, &self.alert) {
                Ok(banner) => banner,
                Err(e) => {
                    warn!(
                        session = %self.session,
                        error = %e.message,
                        frame = %e.preview(100),
                        "Malformed banner, closing stream"
                    );
                    return StreamTermination::DecodeError(e);
                }
            };

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return StreamTermination::Cancelled,
                sent = self.tx.send(banner) => {
                    if sent.is_err() {
                        return if self.cancel.is_cancelled() {
                            StreamTermination::Cancelled
                        } else {
                            StreamTermination::ConsumerClosed
                        };
                    }
                }
            }
            self.delivered += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const OPTIONS: SessionOptions = SessionOptions {
        channel_capacity: 4,
        max_frame_bytes: 1024,
    };

    /// Body wrapper counting how often it is dropped
    struct CountedBody<S> {
        inner: S,
        drops: Arc<AtomicUsize>,
    }

    impl<S: Stream + Unpin> Stream for CountedBody<S> {
        type Item = S::Item;

        fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<S::Item>> {
            Pin::new(&mut self.inner).poll_next(cx)
        }
    }

    impl<S> Drop for CountedBody<S> {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn chunk(s: &'static str) -> std::io::Result<Bytes> {
        Ok(Bytes::from_static(s.as_bytes()))
    }

    fn alert() -> AlertMetadata {
        AlertMetadata {
            id: Some("A1".into()),
            name: Some("office".into()),
            trigger: None,
            sha1_signature: Some("abc".into()),
        }
    }

    /// Connection over `chunks` that never ends on its own
    fn open_ended(chunks: Vec<std::io::Result<Bytes>>, drops: &Arc<AtomicUsize>) -> StreamConnection {
        let body = CountedBody {
            inner: stream::iter(chunks).chain(stream::pending()),
            drops: Arc::clone(drops),
        };
        StreamConnection::new(Box::pin(body), alert())
    }

    fn finite(chunks: Vec<std::io::Result<Bytes>>, drops: &Arc<AtomicUsize>) -> StreamConnection {
        let body = CountedBody {
            inner: stream::iter(chunks),
            drops: Arc::clone(drops),
        };
        StreamConnection::new(Box::pin(body), alert())
    }

    async fn closed(stream: &BannerStream) {
        let mut states = stream.state_changes();
        tokio::time::timeout(
            Duration::from_secs(5),
            states.wait_for(|s| *s == SessionState::Closed),
        )
        .await
        .expect("session did not reach Closed")
        .expect("state sender dropped before close");
    }

    async fn collect(stream: &mut BannerStream) -> Vec<HostObservation> {
        let mut out = Vec::new();
        while let Some(banner) =
            tokio::time::timeout(Duration::from_secs(5), stream.recv())
                .await
                .expect("session did not close")
        {
            out.push(banner);
        }
        out
    }

    #[tokio::test]
    async fn test_heartbeat_produces_no_record() {
        let drops = Arc::new(AtomicUsize::new(0));
        let conn = finite(vec![chunk("{\"a\":1}\n\n{\"b\":2}\n")], &drops);
        let mut stream = BannerStream::spawn(conn, &CancellationToken::new(), OPTIONS);

        let banners = collect(&mut stream).await;
        assert_eq!(banners.len(), 2);
        assert_eq!(banners[0].get::<i64>("a"), Some(1));
        assert_eq!(banners[1].get::<i64>("b"), Some(2));

        assert!(matches!(stream.finish().await, StreamTermination::EndOfStream));
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_every_record_carries_connection_metadata() {
        let drops = Arc::new(AtomicUsize::new(0));
        let conn = finite(
            vec![chunk("{\"port\":22}\n{\"port\":80}\n{\"port\":443}\n")],
            &drops,
        );
        let mut stream = BannerStream::spawn(conn, &CancellationToken::new(), OPTIONS);
        let expected = Arc::clone(stream.alert());

        let banners = collect(&mut stream).await;
        assert_eq!(banners.len(), 3);
        for banner in &banners {
            assert_eq!(*banner.alert, *expected);
            assert_eq!(banner.alert.id.as_deref(), Some("A1"));
        }
    }

    #[tokio::test]
    async fn test_partial_tail_not_delivered() {
        let drops = Arc::new(AtomicUsize::new(0));
        let conn = finite(vec![chunk("{\"a\":1}\n{\"b\":2")], &drops);
        let mut stream = BannerStream::spawn(conn, &CancellationToken::new(), OPTIONS);

        let banners = collect(&mut stream).await;
        assert_eq!(banners.len(), 1);
        assert!(matches!(stream.finish().await, StreamTermination::EndOfStream));
    }

    #[tokio::test]
    async fn test_decode_error_is_fatal() {
        let drops = Arc::new(AtomicUsize::new(0));
        let conn = open_ended(
            vec![chunk("{\"a\":1}\nnot json\n{\"c\":3}\n")],
            &drops,
        );
        let mut stream = BannerStream::spawn(conn, &CancellationToken::new(), OPTIONS);

        let banners = collect(&mut stream).await;
        assert_eq!(banners.len(), 1);
        match stream.finish().await {
            StreamTermination::DecodeError(e) => assert_eq!(&e.raw[..], b"not json"),
            other => panic!("unexpected termination: {:?}", other),
        }
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_read_error_closes_channel() {
        let drops = Arc::new(AtomicUsize::new(0));
        let conn = finite(
            vec![
                chunk("{\"a\":1}\n"),
                Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "dropped")),
            ],
            &drops,
        );
        let mut stream = BannerStream::spawn(conn, &CancellationToken::new(), OPTIONS);

        assert_eq!(collect(&mut stream).await.len(), 1);
        let reason = stream.finish().await;
        assert!(matches!(reason, StreamTermination::ReadError(_)));
        assert!(reason.is_failure());
    }

    #[tokio::test]
    async fn test_repeated_cancel_releases_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        let conn = open_ended(vec![chunk("{\"a\":1}\n")], &drops);
        let mut stream = BannerStream::spawn(conn, &CancellationToken::new(), OPTIONS);

        assert!(stream.recv().await.is_some());

        stream.cancel();
        stream.cancel();
        stream.cancel();

        let next = tokio::time::timeout(Duration::from_secs(5), stream.recv())
            .await
            .expect("channel did not close after cancel");
        assert!(next.is_none());
        closed(&stream).await;

        assert!(matches!(stream.finish().await, StreamTermination::Cancelled));
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_parent_cancel_reaches_session() {
        let drops = Arc::new(AtomicUsize::new(0));
        let parent = CancellationToken::new();
        let mut stream = BannerStream::spawn(open_ended(vec![], &drops), &parent, OPTIONS);

        parent.cancel();
        assert!(collect(&mut stream).await.is_empty());
        assert!(matches!(stream.finish().await, StreamTermination::Cancelled));
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_session_cancel_leaves_parent_and_siblings() {
        let drops = Arc::new(AtomicUsize::new(0));
        let parent = CancellationToken::new();
        let first = BannerStream::spawn(open_ended(vec![], &drops), &parent, OPTIONS);
        let mut second = BannerStream::spawn(
            finite(vec![chunk("{\"x\":1}\n")], &drops),
            &parent,
            OPTIONS,
        );

        first.cancel();
        assert!(!parent.is_cancelled());
        assert_eq!(collect(&mut second).await.len(), 1);
        assert!(matches!(second.finish().await, StreamTermination::EndOfStream));
        assert!(matches!(first.finish().await, StreamTermination::Cancelled));
    }

    #[tokio::test]
    async fn test_finish_without_draining() {
        let drops = Arc::new(AtomicUsize::new(0));
        let conn = open_ended(
            vec![chunk("{\"a\":1}\n{\"a\":2}\n{\"a\":3}\n")],
            &drops,
        );
        let options = SessionOptions {
            channel_capacity: 1,
            ..OPTIONS
        };
        let stream = BannerStream::spawn(conn, &CancellationToken::new(), options);

        assert!(matches!(stream.finish().await, StreamTermination::Cancelled));
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_finish_on_live_session_reports_cancelled() {
        let options = SessionOptions {
            channel_capacity: 1,
            ..OPTIONS
        };
        for _ in 0..100 {
            let drops = Arc::new(AtomicUsize::new(0));
            let conn = open_ended(
                vec![chunk("{\"a\":1}\n{\"a\":2}\n{\"a\":3}\n")],
                &drops,
            );
            let stream = BannerStream::spawn(conn, &CancellationToken::new(), options);

            let reason = stream.finish().await;
            assert!(
                matches!(reason, StreamTermination::Cancelled),
                "unexpected reason: {:?}",
                reason
            );
            assert_eq!(drops.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn test_full_channel_stops_reading_until_cancelled() {
        let drops = Arc::new(AtomicUsize::new(0));
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pulled);
        let chunks: Vec<std::io::Result<Bytes>> =
            (1..=5).map(|_| chunk("{\"a\":1}\n")).collect();
        let body = CountedBody {
            inner: stream::iter(chunks)
                .chain(stream::pending())
                .inspect(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            drops: Arc::clone(&drops),
        };
        let options = SessionOptions {
            channel_capacity: 1,
            ..OPTIONS
        };
        let mut stream = BannerStream::spawn(
            StreamConnection::new(Box::pin(body), alert()),
            &CancellationToken::new(),
            options,
        );

        // One banner buffered, the loop blocked sending the second
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pulled.load(Ordering::SeqCst), 2);
        assert_eq!(stream.state(), SessionState::Streaming);
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        stream.cancel();
        closed(&stream).await;
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert_eq!(pulled.load(Ordering::SeqCst), 2);

        // The buffered banner is still handed out, then the channel ends
        assert_eq!(collect(&mut stream).await.len(), 1);
        assert!(matches!(stream.finish().await, StreamTermination::Cancelled));
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_debug_shows_session() {
        let drops = Arc::new(AtomicUsize::new(0));
        let stream = BannerStream::spawn(
            open_ended(vec![], &drops),
            &CancellationToken::new(),
            OPTIONS,
        );

        let shown = format!("{:?}", stream);
        assert!(shown.contains(stream.id()));
        assert!(shown.contains("office"));
    }

    #[tokio::test]
    async fn test_drop_cancels_session() {
        let drops = Arc::new(AtomicUsize::new(0));
        let stream = BannerStream::spawn(
            open_ended(vec![], &drops),
            &CancellationToken::new(),
            OPTIONS,
        );
        let mut states = stream.state_changes();
        drop(stream);

        tokio::time::timeout(
            Duration::from_secs(5),
            states.wait_for(|s| *s == SessionState::Closed),
        )
        .await
        .expect("session did not close after drop")
        .expect("state sender dropped before close");
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_implements_stream() {
        let drops = Arc::new(AtomicUsize::new(0));
        let conn = finite(vec![chunk("{\"n\":1}\n{\"n\":2}\n")], &drops);
        let stream = BannerStream::spawn(conn, &CancellationToken::new(), OPTIONS);

        let values: Vec<i64> = stream
            .filter_map(|b| async move { b.get::<i64>("n") })
            .collect()
            .await;
        assert_eq!(values, vec![1, 2]);
    }
}
