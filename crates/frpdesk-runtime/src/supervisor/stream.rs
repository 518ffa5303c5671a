//! Byte-based line readers for child stdout/stderr.
//!
//! frp writes UTF-8, but a user-pointed binary can emit anything, and
//! `BufReader::lines()` would end the reader task on the first invalid
//! sequence. Reading raw bytes and decoding lossily keeps output capture
//! alive for the whole process lifetime.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::broadcast;
use tracing::debug;

use frpdesk_core::domain::{LogBuffer, LogEntry, LogStream};
use frpdesk_core::events::ProcessEvent;

/// One reader task per stream: append to the process buffer, broadcast
/// every line as an `Output` event, exit on EOF.
pub(crate) fn spawn_line_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    pid: u32,
    log_stream: LogStream,
    buffer: Arc<Mutex<LogBuffer>>,
    events: broadcast::Sender<ProcessEvent>,
) {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break, // EOF
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                    }

                    let entry = LogEntry::new(log_stream, String::from_utf8_lossy(&buf));
                    buffer
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(entry.clone());
                    let _ = events.send(ProcessEvent::Output { pid, entry });
                }
                Err(e) => {
                    debug!(pid, error = %e, "output reader exiting on read error");
                    break;
                }
            }
        }

        debug!(pid, "output reader exiting");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn read_all(bytes: &'static [u8]) -> (Vec<LogEntry>, Vec<ProcessEvent>) {
        let buffer = Arc::new(Mutex::new(LogBuffer::new()));
        let (tx, mut rx) = broadcast::channel(64);

        spawn_line_reader(bytes, 42, LogStream::Stdout, Arc::clone(&buffer), tx);

        let mut events = Vec::new();
        while let Ok(Ok(event)) =
            tokio::time::timeout(Duration::from_secs(1), rx.recv()).await
        {
            events.push(event);
        }

        let entries = buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .to_vec();
        (entries, events)
    }

    #[tokio::test]
    async fn splits_lines_and_trims_newlines() {
        let (entries, events) = read_all(b"first\nsecond\r\nlast without newline").await;

        let texts: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "last without newline"]);
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], ProcessEvent::Output { pid: 42, .. }));
    }

    #[tokio::test]
    async fn invalid_utf8_is_decoded_lossily() {
        let (entries, _) = read_all(b"ok\n\xff\xfe broken\n").await;

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "ok");
        assert!(entries[1].text.contains("broken"));
        assert!(entries[1].text.contains('\u{fffd}'));
    }
}
