//! Newline-delimited frame reader
//!
//! Splits the response body into frames. Blank lines are keep-alive
//! heartbeats and come back as [`ReadOutcome::Skip`].

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tracing::debug;

use super::connector::StreamConnection;

/// Result of one read step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// One complete frame, terminator stripped
    Frame(Bytes),
    /// Heartbeat line, carries no payload
    Skip,
    /// The body ended
    EndOfStream,
    /// The body failed or a frame exceeded the size limit
    ReadError(String),
}

/// Frame reader state
#[derive(Debug)]
pub struct FrameReader {
    /// Bytes received but not yet returned as a frame
    buffer: BytesMut,
    /// Prefix of `buffer` already searched for a newline
    scanned: usize,
    max_frame_bytes: usize,
}

impl FrameReader {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            scanned: 0,
            max_frame_bytes,
        }
    }

    /// Read up to and including the next newline.
    ///
    /// On end of body or read failure the connection is released before
    /// returning. Safe to drop mid-await: buffered bytes are kept.
    pub async fn next_frame(&mut self, connection: &mut StreamConnection) -> ReadOutcome {
        loop {
            if let Some(line) = self.take_line() {
                if line.len() > self.max_frame_bytes {
                    connection.release();
                    return ReadOutcome::ReadError(format!(
                        "frame of {} bytes exceeds the {} byte limit",
                        line.len(),
                        self.max_frame_bytes
                    ));
                }
                return if line.is_empty() {
                    ReadOutcome::Skip
                } else {
                    ReadOutcome::Frame(line)
                };
            }

            if self.buffer.len() > self.max_frame_bytes {
                connection.release();
                return ReadOutcome::ReadError(format!(
                    "frame exceeds {} bytes without a terminator",
                    self.max_frame_bytes
                ));
            }

            let Some(body) = connection.body_mut() else {
                return ReadOutcome::EndOfStream;
            };

            match body.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    connection.release();
                    return ReadOutcome::ReadError(e.to_string());
                }
                None => {
                    if !self.buffer.is_empty() {
                        debug!(
                            bytes = self.buffer.len(),
                            "Discarding unterminated trailing frame"
                        );
                        self.buffer.clear();
                        self.scanned = 0;
                    }
                    connection.release();
                    return ReadOutcome::EndOfStream;
                }
            }
        }
    }

    /// Split off the next complete line, if any
    fn take_line(&mut self) -> Option<Bytes> {
        match self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            Some(offset) => {
                let pos = self.scanned + offset;
                let mut line = self.buffer.split_to(pos + 1);
                self.scanned = 0;

                let mut end = pos;
                while end > 0 && line[end - 1] == b'\r' {
                    end -= 1;
                }
                line.truncate(end);
                Some(line.freeze())
            }
            None => {
                self.scanned = self.buffer.len();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::decode::AlertMetadata;
    use futures::stream;

    fn connection(chunks: Vec<std::io::Result<&'static str>>) -> StreamConnection {
        let body = stream::iter(
            chunks
                .into_iter()
                .map(|c| c.map(|s| Bytes::from_static(s.as_bytes())))
                .collect::<Vec<_>>(),
        );
        StreamConnection::new(Box::pin(body), AlertMetadata::default())
    }

    async fn read_all(reader: &mut FrameReader, conn: &mut StreamConnection) -> Vec<ReadOutcome> {
        let mut out = Vec::new();
        loop {
            let outcome = reader.next_frame(conn).await;
            let done = matches!(
                outcome,
                ReadOutcome::EndOfStream | ReadOutcome::ReadError(_)
            );
            out.push(outcome);
            if done {
                return out;
            }
        }
    }

    fn frame(s: &'static str) -> ReadOutcome {
        ReadOutcome::Frame(Bytes::from_static(s.as_bytes()))
    }

    #[tokio::test]
    async fn test_frames_and_heartbeats() {
        let mut conn = connection(vec![Ok("{\"a\":1}\n\n{\"b\":2}\n")]);
        let mut reader = FrameReader::new(1024);

        let out = read_all(&mut reader, &mut conn).await;
        assert_eq!(
            out,
            vec![
                frame("{\"a\":1}"),
                ReadOutcome::Skip,
                frame("{\"b\":2}"),
                ReadOutcome::EndOfStream
            ]
        );
        assert!(conn.is_released());
    }

    #[tokio::test]
    async fn test_frames_split_across_chunks() {
        let mut conn = connection(vec![Ok("{\"a\""), Ok(":1}\r"), Ok("\n{\"b\":2}\r\n")]);
        let mut reader = FrameReader::new(1024);

        let out = read_all(&mut reader, &mut conn).await;
        assert_eq!(
            out,
            vec![
                frame("{\"a\":1}"),
                frame("{\"b\":2}"),
                ReadOutcome::EndOfStream
            ]
        );
    }

    #[tokio::test]
    async fn test_crlf_heartbeat_is_skipped() {
        let mut conn = connection(vec![Ok("\r\n\r\n{}\n")]);
        let mut reader = FrameReader::new(1024);

        let out = read_all(&mut reader, &mut conn).await;
        assert_eq!(
            out,
            vec![
                ReadOutcome::Skip,
                ReadOutcome::Skip,
                frame("{}"),
                ReadOutcome::EndOfStream
            ]
        );
    }

    #[tokio::test]
    async fn test_unterminated_tail_discarded() {
        let mut conn = connection(vec![Ok("{\"a\":1}\n{\"b\":")]);
        let mut reader = FrameReader::new(1024);

        let out = read_all(&mut reader, &mut conn).await;
        assert_eq!(out, vec![frame("{\"a\":1}"), ReadOutcome::EndOfStream]);
    }

    #[tokio::test]
    async fn test_read_error_releases_connection() {
        let mut conn = connection(vec![
            Ok("{}\n"),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset by peer",
            )),
        ]);
        let mut reader = FrameReader::new(1024);

        let out = read_all(&mut reader, &mut conn).await;
        assert_eq!(out[0], frame("{}"));
        assert!(matches!(&out[1], ReadOutcome::ReadError(msg) if msg.contains("reset by peer")));
        assert!(conn.is_released());
    }

    #[tokio::test]
    async fn test_oversized_frame_ends_read() {
        let mut conn = connection(vec![Ok("0123456789"), Ok("0123456789\n")]);
        let mut reader = FrameReader::new(8);

        let out = read_all(&mut reader, &mut conn).await;
        assert!(matches!(out[..], [ReadOutcome::ReadError(_)]));
        assert!(conn.is_released());
    }

    #[test]
    fn test_waits_for_newline() {
        let head = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"{\"a\""))]);
        let body = head.chain(stream::pending());
        let mut conn = StreamConnection::new(Box::pin(body), AlertMetadata::default());
        let mut reader = FrameReader::new(1024);

        let mut next = tokio_test::task::spawn(reader.next_frame(&mut conn));
        tokio_test::assert_pending!(next.poll());
        tokio_test::assert_pending!(next.poll());
    }

    #[tokio::test]
    async fn test_complete_oversized_frame_ends_read() {
        let mut conn = connection(vec![Ok("{}\n{\"long\":12345}\n{}\n")]);
        let mut reader = FrameReader::new(8);

        let out = read_all(&mut reader, &mut conn).await;
        assert_eq!(out[0], frame("{}"));
        assert!(matches!(&out[1], ReadOutcome::ReadError(msg) if msg.contains("8 byte limit")));
        assert_eq!(out.len(), 2);
        assert!(conn.is_released());
    }

    #[tokio::test]
    async fn test_repeated_carriage_returns_stripped() {
        let mut conn = connection(vec![Ok("\r\r\n{\"a\":1}\r\r\n")]);
        let mut reader = FrameReader::new(1024);

        let out = read_all(&mut reader, &mut conn).await;
        assert_eq!(
            out,
            vec![ReadOutcome::Skip, frame("{\"a\":1}"), ReadOutcome::EndOfStream]
        );
    }

    #[tokio::test]
    async fn test_released_connection_reads_as_end() {
        let mut conn = connection(vec![Ok("{}\n")]);
        conn.release();
        let mut reader = FrameReader::new(1024);
        assert_eq!(reader.next_frame(&mut conn).await, ReadOutcome::EndOfStream);
    }
}
