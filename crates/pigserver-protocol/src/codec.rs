//! The buffered line reader: the receive side of the codec.
//!
//! Encapsulates the per-connection read buffer so that ownership of it can
//! be handed off wholesale (see spec.md's "read-buffer ownership" §5) when a
//! connection handler parks and a game coordinator takes over the same
//! socket, or vice versa on teardown.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::constants::READ_BUFFER_LEN;

/// Outcome of one [`LineReader::receive_line`] call.
#[derive(Debug)]
pub enum ReceiveOutcome {
    /// A complete line, trailing `\r`/`\n` already stripped.
    Line(String),
    /// Peer closed the connection (zero-byte read).
    Disconnect,
    /// No complete line arrived before the timeout; buffered bytes are kept.
    Timeout,
    /// The buffer filled before a line terminator appeared; it has been
    /// cleared. The connection sent a malformed, unterminated line.
    Overflow,
    /// The underlying socket returned an I/O error.
    IoError(std::io::Error),
}

/// A buffered line-oriented reader over one connection's byte stream.
///
/// `S` is generic so the same reader works over a live `TcpStream` in
/// production and over an in-memory duplex stream in tests.
pub struct LineReader<S> {
    stream: S,
    buf: Vec<u8>,
}

impl<S: AsyncRead + Unpin> LineReader<S> {
    pub fn new(stream: S) -> Self {
        LineReader { stream, buf: Vec::with_capacity(READ_BUFFER_LEN) }
    }

    /// Reclaim the underlying stream, discarding any buffered partial line.
    /// Used when ownership of the socket itself (not the reader) moves on.
    pub fn into_inner(self) -> S {
        self.stream
    }

    fn take_line(&mut self) -> Option<String> {
        let newline_pos = self.buf.iter().position(|&b| b == b'\n')?;
        let mut line_bytes = self.buf[..newline_pos].to_vec();
        if line_bytes.last() == Some(&b'\r') {
            line_bytes.pop();
        }
        self.buf.drain(..=newline_pos);
        Some(String::from_utf8_lossy(&line_bytes).into_owned())
    }

    /// Read one framed line, waiting up to `timeout` for it to arrive.
    pub async fn receive_line(&mut self, timeout: Duration) -> ReceiveOutcome {
        if let Some(line) = self.take_line() {
            return ReceiveOutcome::Line(line);
        }

        loop {
            let remaining = READ_BUFFER_LEN - self.buf.len();
            if remaining == 0 {
                self.buf.clear();
                return ReceiveOutcome::Overflow;
            }

            let mut chunk = [0u8; READ_BUFFER_LEN];
            let read_result =
                tokio::time::timeout(timeout, self.stream.read(&mut chunk[..remaining])).await;

            let n = match read_result {
                Err(_elapsed) => return ReceiveOutcome::Timeout,
                Ok(Ok(0)) => return ReceiveOutcome::Disconnect,
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return ReceiveOutcome::IoError(e),
            };

            self.buf.extend_from_slice(&chunk[..n]);
            if let Some(line) = self.take_line() {
                return ReceiveOutcome::Line(line);
            }
        }
    }
}

impl<S: AsyncWrite + Unpin> LineReader<S> {
    /// Best-effort write of an already-encoded line. Returns the number of
    /// bytes written, or the I/O failure — this is component C1's `send`.
    pub async fn send(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
        self.stream.write_all(bytes).await?;
        Ok(bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn reads_one_line_delivered_in_one_write() {
        let (mut client, server) = duplex(4096);
        let mut reader = LineReader::new(server);
        client.write_all(b"LOGIN|nick:alice\n").await.unwrap();
        match reader.receive_line(Duration::from_secs(1)).await {
            ReceiveOutcome::Line(line) => assert_eq!(line, "LOGIN|nick:alice"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn strips_trailing_cr() {
        let (mut client, server) = duplex(4096);
        let mut reader = LineReader::new(server);
        client.write_all(b"PING\r\n").await.unwrap();
        match reader.receive_line(Duration::from_secs(1)).await {
            ReceiveOutcome::Line(line) => assert_eq!(line, "PING"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn joins_partial_reads_across_writes() {
        let (mut client, server) = duplex(4096);
        let mut reader = LineReader::new(server);
        client.write_all(b"JOIN_R").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        client.write_all(b"OOM|room:0\n").await.unwrap();
        match reader.receive_line(Duration::from_secs(1)).await {
            ReceiveOutcome::Line(line) => assert_eq!(line, "JOIN_ROOM|room:0"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn two_lines_in_one_write_are_delivered_one_at_a_time() {
        let (mut client, server) = duplex(4096);
        let mut reader = LineReader::new(server);
        client.write_all(b"PING\nPING\n").await.unwrap();
        for _ in 0..2 {
            match reader.receive_line(Duration::from_secs(1)).await {
                ReceiveOutcome::Line(line) => assert_eq!(line, "PING"),
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn zero_byte_read_is_disconnect() {
        let (client, server) = duplex(4096);
        let mut reader = LineReader::new(server);
        drop(client);
        match reader.receive_line(Duration::from_secs(1)).await {
            ReceiveOutcome::Disconnect => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_data_before_deadline_is_timeout() {
        let (_client, server) = duplex(4096);
        let mut reader = LineReader::new(server);
        match reader.receive_line(Duration::from_millis(20)).await {
            ReceiveOutcome::Timeout => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unterminated_line_filling_the_buffer_overflows() {
        let (mut client, server) = duplex(READ_BUFFER_LEN + 64);
        let mut reader = LineReader::new(server);
        let junk = vec![b'x'; READ_BUFFER_LEN];
        client.write_all(&junk).await.unwrap();
        match reader.receive_line(Duration::from_secs(1)).await {
            ReceiveOutcome::Overflow => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(reader.buf.is_empty());
    }

    /// A single write that lands just shy of capacity, followed by one that
    /// would push past it, must still overflow at exactly `READ_BUFFER_LEN`
    /// rather than being allowed to grow past it first.
    #[tokio::test]
    async fn overflow_triggers_at_exact_capacity_even_across_split_reads() {
        let (mut client, server) = duplex(READ_BUFFER_LEN + 64);
        let mut reader = LineReader::new(server);
        client.write_all(&vec![b'x'; READ_BUFFER_LEN - 1]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        client.write_all(b"yy").await.unwrap();
        match reader.receive_line(Duration::from_secs(1)).await {
            ReceiveOutcome::Overflow => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(reader.buf.is_empty());
    }

    #[tokio::test]
    async fn a_line_exactly_at_capacity_is_still_delivered() {
        let (mut client, server) = duplex(READ_BUFFER_LEN + 64);
        let mut reader = LineReader::new(server);
        let mut line = vec![b'x'; READ_BUFFER_LEN - 1];
        line.push(b'\n');
        client.write_all(&line).await.unwrap();
        match reader.receive_line(Duration::from_secs(1)).await {
            ReceiveOutcome::Line(l) => assert_eq!(l.len(), READ_BUFFER_LEN - 1),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_writes_the_given_bytes() {
        let (mut client, server) = duplex(4096);
        let mut reader = LineReader::new(server);
        let n = reader.send(b"WELCOME|players:10|rooms:5\n").await.unwrap();
        assert_eq!(n, 28);
        let mut buf = [0u8; 28];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"WELCOME|players:10|rooms:5\n");
    }
}
