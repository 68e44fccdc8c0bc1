//! Shared plumbing for streamed HTTP responses.
//!
//! Both SSE (`data: {...}`) and newline-delimited JSON arrive as byte
//! chunks that don't respect line boundaries; [`LineBuffer`] reassembles
//! complete lines across chunks.

use pixelprompt_core::error::ProviderError;

/// Accumulates raw bytes and yields complete lines.
pub(crate) struct LineBuffer {
    buffer: String,
}

impl LineBuffer {
    pub(crate) fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    pub(crate) fn push(&mut self, bytes: &[u8]) {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
    }

    /// The next complete line, without its terminator.
    pub(crate) fn next_line(&mut self) -> Option<String> {
        let end = self.buffer.find('\n')?;
        let line = self.buffer[..end].trim_end_matches('\r').to_string();
        self.buffer.drain(..=end);
        Some(line)
    }
}

/// Classify a transport-level reqwest failure.
///
/// Timeouts keep their own kind; everything else at this layer means we
/// couldn't reach (or keep talking to) the backend.
pub(crate) fn transport_error(err: &reqwest::Error, endpoint: &str) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(format!("request to {endpoint} timed out: {err}"))
    } else {
        ProviderError::Unreachable(format!("cannot reach {endpoint}: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassembles_lines_across_chunks() {
        let mut buf = LineBuffer::new();
        buf.push(b"data: {\"a\":");
        assert!(buf.next_line().is_none());
        buf.push(b"1}\r\ndata: done\n");
        assert_eq!(buf.next_line().as_deref(), Some("data: {\"a\":1}"));
        assert_eq!(buf.next_line().as_deref(), Some("data: done"));
        assert!(buf.next_line().is_none());
    }

    #[test]
    fn empty_lines_are_yielded() {
        let mut buf = LineBuffer::new();
        buf.push(b"\n\nx\n");
        assert_eq!(buf.next_line().as_deref(), Some(""));
        assert_eq!(buf.next_line().as_deref(), Some(""));
        assert_eq!(buf.next_line().as_deref(), Some("x"));
    }
}
