//! Server-sent-event framing for the `/tail` stream.
//!
//! The tail delivers one JSON trail record per `data:` line. Chunk
//! boundaries fall anywhere, so bytes are buffered until a full line is
//! available; CR/LF endings, comment lines, and non-`data` fields are
//! tolerated per the SSE grammar. A record that fails to parse is skipped
//! with a warning — one bad line must not end the subscription.

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tracing::warn;

use parlor_engine::{EventRecord, RecordStream, SourceError};

/// Parse SSE `data:` payloads out of a byte stream.
///
/// Yields one `Ok(String)` per data line. A transport error surfaces as a
/// single `Err` item, after which the stream ends (the controller reopens
/// from scratch). A trailing unterminated line is processed on clean EOF.
pub(crate) fn data_lines<S, E>(
    byte_stream: S,
) -> impl Stream<Item = Result<String, SourceError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: std::fmt::Display,
{
    futures::stream::unfold(
        (byte_stream, BytesMut::with_capacity(8192), false),
        |(mut stream, mut buffer, done)| async move {
            if done {
                return None;
            }

            loop {
                if let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
                    let mut line = buffer.split_to(newline + 1);
                    line.truncate(line.len() - 1);
                    if line.last() == Some(&b'\r') {
                        line.truncate(line.len() - 1);
                    }

                    let Ok(line) = std::str::from_utf8(&line) else {
                        warn!("skipping non-UTF-8 tail line");
                        continue;
                    };
                    if let Some(data) = extract_data(line) {
                        return Some((Ok(data), (stream, buffer, false)));
                    }
                    continue;
                }

                match stream.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(error)) => {
                        return Some((
                            Err(SourceError::Transport(error.to_string())),
                            (stream, buffer, true),
                        ));
                    }
                    None => {
                        // Clean EOF: a final line may lack its newline.
                        if !buffer.is_empty() {
                            if let Ok(line) = std::str::from_utf8(&buffer) {
                                if let Some(data) = extract_data(line.trim_end()) {
                                    buffer.clear();
                                    return Some((Ok(data), (stream, buffer, true)));
                                }
                            }
                        }
                        return None;
                    }
                }
            }
        },
    )
}

/// Extract the payload of a `data:` line; `None` for everything else
/// (comments, other fields, blank separators).
fn extract_data(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }
    let data = trimmed
        .strip_prefix("data: ")
        .or_else(|| trimmed.strip_prefix("data:"))?
        .trim();
    (!data.is_empty()).then(|| data.to_owned())
}

/// Adapt a tail byte stream into the engine's [`RecordStream`].
///
/// Unparseable records are skipped with a warning rather than failing the
/// subscription.
pub(crate) fn record_stream<S, E>(byte_stream: S) -> RecordStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: std::fmt::Display + 'static,
{
    Box::pin(data_lines(byte_stream).filter_map(|item| async move {
        match item {
            Ok(data) => match serde_json::from_str::<EventRecord>(&data) {
                Ok(record) => Some(Ok(record)),
                Err(error) => {
                    warn!(%error, "skipping unparseable tail record");
                    None
                }
            },
            Err(error) => Some(Err(error)),
        }
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FakeIoError;

    impl std::fmt::Display for FakeIoError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("connection reset")
        }
    }

    fn chunks(parts: &[&str]) -> impl Stream<Item = Result<Bytes, FakeIoError>> + Unpin + use<> {
        futures::stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from(p.to_string())))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect(parts: &[&str]) -> Vec<String> {
        data_lines(chunks(parts))
            .map(|item| item.unwrap())
            .collect()
            .await
    }

    // ── extract_data ─────────────────────────────────────────────────────

    #[test]
    fn extracts_data_with_and_without_space() {
        assert_eq!(extract_data("data: {\"a\":1}"), Some("{\"a\":1}".into()));
        assert_eq!(extract_data("data:{\"a\":1}"), Some("{\"a\":1}".into()));
    }

    #[test]
    fn skips_comments_fields_and_blanks() {
        assert_eq!(extract_data(": keepalive"), None);
        assert_eq!(extract_data("event: record"), None);
        assert_eq!(extract_data("id: 42"), None);
        assert_eq!(extract_data(""), None);
        assert_eq!(extract_data("data: "), None);
    }

    // ── data_lines ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn single_event_single_chunk() {
        assert_eq!(collect(&["data: {\"k\":1}\n\n"]).await, vec!["{\"k\":1}"]);
    }

    #[tokio::test]
    async fn multiple_events_in_one_chunk() {
        assert_eq!(
            collect(&["data: {\"a\":1}\n\ndata: {\"b\":2}\n\n"]).await,
            vec!["{\"a\":1}", "{\"b\":2}"]
        );
    }

    #[tokio::test]
    async fn event_split_across_chunks() {
        assert_eq!(
            collect(&["data: {\"par", "tial\":true}\n\n"]).await,
            vec!["{\"partial\":true}"]
        );
    }

    #[tokio::test]
    async fn crlf_line_endings() {
        assert_eq!(
            collect(&["data: {\"cr\":true}\r\n\r\n"]).await,
            vec!["{\"cr\":true}"]
        );
    }

    #[tokio::test]
    async fn trailing_line_without_newline_is_processed() {
        assert_eq!(
            collect(&["data: {\"tail\":true}"]).await,
            vec!["{\"tail\":true}"]
        );
    }

    #[tokio::test]
    async fn comments_and_other_fields_are_skipped() {
        assert_eq!(
            collect(&[": ping\n\nevent: record\ndata: {\"v\":1}\n\n"]).await,
            vec!["{\"v\":1}"]
        );
    }

    #[tokio::test]
    async fn read_error_surfaces_then_ends() {
        let parts: Vec<Result<Bytes, FakeIoError>> = vec![
            Ok(Bytes::from("data: {\"ok\":1}\n")),
            Err(FakeIoError),
        ];
        let items: Vec<Result<String, SourceError>> =
            data_lines(futures::stream::iter(parts)).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().unwrap(), "{\"ok\":1}");
        assert!(matches!(
            items[1],
            Err(SourceError::Transport(ref m)) if m == "connection reset"
        ));
    }

    // ── record_stream ────────────────────────────────────────────────────

    #[tokio::test]
    async fn records_parse_and_bad_lines_are_skipped() {
        let body = concat!(
            "data: {\"kind\":\"INTENT\",\"thread_id\":\"t1\",\"turn_id\":\"u1\",",
            "\"payload\":{\"intent_type\":\"chat.message\",\"message\":\"hi\"}}\n",
            "data: not json\n",
            "data: {\"kind\":\"DECISION\",\"thread_id\":\"t1\",\"payload\":{}}\n",
        );
        let records: Vec<EventRecord> = record_stream(chunks(&[body]))
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].turn_id.as_ref().unwrap().as_str(), "u1");
    }
}
