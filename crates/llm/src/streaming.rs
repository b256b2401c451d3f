//! Server-sent event decoding for streamed chat
//!
//! The response body arrives in arbitrary network chunks. `SseBuffer`
//! reassembles lines across chunk boundaries (including split UTF-8
//! sequences) and yields the payload of every `data:` line; the payloads are
//! then mapped to provider-neutral `ChatStreamEvent`s.

use docqa_core::{ChatEventStream, ChatStreamEvent};
use futures::{Stream, StreamExt};
use serde::Deserialize;

use crate::cohere::ApiCitation;
use crate::LlmError;

/// Line reassembly buffer for an SSE body
#[derive(Debug, Default)]
pub struct SseBuffer {
    buf: Vec<u8>,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk, returning the data payloads it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if let Some(payload) = data_payload(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush a trailing line that was not newline-terminated
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buf);
        data_payload(&line)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(|c| c == '\n' || c == '\r');

    // Blank separators, comments and event/id/retry fields carry nothing
    let value = line.strip_prefix("data:")?;
    let value = value.strip_prefix(' ').unwrap_or(value);

    if value.is_empty() || value == "[DONE]" {
        return None;
    }
    Some(value.to_string())
}

/// Decode an SSE body into its data payloads
///
/// A body error ends the stream after being yielded once.
pub fn sse_data_stream<S, B>(body: S) -> impl Stream<Item = Result<String, LlmError>> + Send
where
    S: Stream<Item = Result<B, LlmError>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    async_stream::stream! {
        let mut buffer = SseBuffer::new();
        futures::pin_mut!(body);

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    for payload in buffer.push(bytes.as_ref()) {
                        yield Ok(payload);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        if let Some(payload) = buffer.finish() {
            yield Ok(payload);
        }
    }
}

/// Map an SSE body to chat events
///
/// Payloads that are not valid events are skipped with a warning. Body
/// errors become `Error::TransportClosed` when raised as
/// `LlmError::StreamInterrupted`.
pub fn chat_event_stream<S, B>(body: S) -> ChatEventStream
where
    S: Stream<Item = Result<B, LlmError>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let payloads = sse_data_stream(body);
        futures::pin_mut!(payloads);

        while let Some(item) = payloads.next().await {
            match item {
                Ok(payload) => match parse_stream_event(&payload) {
                    Ok(event) => yield Ok(event),
                    Err(e) => tracing::warn!(error = %e, "Skipping malformed stream event"),
                },
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            }
        }
    })
}

#[derive(Debug, Deserialize)]
struct RawStreamEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    delta: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ContentDelta {
    message: ContentDeltaMessage,
}

#[derive(Debug, Deserialize)]
struct ContentDeltaMessage {
    content: ContentDeltaText,
}

#[derive(Debug, Deserialize)]
struct ContentDeltaText {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct CitationDelta {
    message: CitationDeltaMessage,
}

#[derive(Debug, Deserialize)]
struct CitationDeltaMessage {
    citations: ApiCitation,
}

/// Parse one data payload into a chat event
pub fn parse_stream_event(data: &str) -> Result<ChatStreamEvent, LlmError> {
    let raw: RawStreamEvent =
        serde_json::from_str(data).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

    match raw.kind.as_str() {
        "content-delta" => {
            let delta: ContentDelta = delta_body(&raw)?;
            Ok(ChatStreamEvent::ContentDelta {
                text: delta.message.content.text,
            })
        }
        "citation-start" => {
            let delta: CitationDelta = delta_body(&raw)?;
            Ok(ChatStreamEvent::CitationStart {
                sources: delta
                    .message
                    .citations
                    .sources
                    .into_iter()
                    .map(Into::into)
                    .collect(),
            })
        }
        _ => Ok(ChatStreamEvent::Other { kind: raw.kind }),
    }
}

fn delta_body<T: serde::de::DeserializeOwned>(raw: &RawStreamEvent) -> Result<T, LlmError> {
    let delta = raw
        .delta
        .clone()
        .ok_or_else(|| LlmError::InvalidResponse(format!("{} event without delta", raw.kind)))?;
    serde_json::from_value(delta).map_err(|e| LlmError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::CitationSource;
    use futures::stream;

    const CONTENT_DELTA: &str =
        r#"{"type":"content-delta","index":0,"delta":{"message":{"content":{"text":"Refunds"}}}}"#;
    const CITATION_START: &str = r#"{"type":"citation-start","index":0,"delta":{"message":{"citations":{"start":0,"end":7,"text":"Refunds","sources":[{"type":"document","id":"1","document":{"id":"1","title":"Policy","text":"30 days"}}]}}}}"#;

    #[test]
    fn test_buffer_reassembles_split_lines() {
        let mut buffer = SseBuffer::new();
        assert!(buffer.push(b"event: content-delta\nda").is_empty());
        assert!(buffer.push(b"ta: {\"a\":").is_empty());
        let payloads = buffer.push(b"1}\r\n\ndata: [DONE]\n");
        assert_eq!(payloads, vec![r#"{"a":1}"#.to_string()]);
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_buffer_split_utf8() {
        let line = "data: café\n".as_bytes();
        // Split inside the two-byte 'é'
        let split = line.len() - 2;
        let mut buffer = SseBuffer::new();
        assert!(buffer.push(&line[..split]).is_empty());
        assert_eq!(buffer.push(&line[split..]), vec!["café".to_string()]);
    }

    #[test]
    fn test_buffer_flushes_unterminated_line() {
        let mut buffer = SseBuffer::new();
        assert!(buffer.push(b"data: tail").is_empty());
        assert_eq!(buffer.finish(), Some("tail".to_string()));
    }

    #[test]
    fn test_parse_content_delta() {
        let event = parse_stream_event(CONTENT_DELTA).unwrap();
        assert_eq!(
            event,
            ChatStreamEvent::ContentDelta {
                text: "Refunds".to_string()
            }
        );
    }

    #[test]
    fn test_parse_citation_start() {
        let event = parse_stream_event(CITATION_START).unwrap();
        assert_eq!(
            event,
            ChatStreamEvent::CitationStart {
                sources: vec![CitationSource {
                    id: "1".to_string(),
                    title: Some("Policy".to_string()),
                    text: Some("30 days".to_string()),
                }]
            }
        );
    }

    #[test]
    fn test_parse_other_events() {
        let event =
            parse_stream_event(r#"{"type":"message-end","delta":{"finish_reason":"COMPLETE"}}"#)
                .unwrap();
        assert_eq!(
            event,
            ChatStreamEvent::Other {
                kind: "message-end".to_string()
            }
        );
        assert!(parse_stream_event("not json").is_err());
    }

    #[tokio::test]
    async fn test_event_stream_over_chunks() {
        let body = format!(
            "event: content-delta\ndata: {CONTENT_DELTA}\n\ndata: garbage\n\n\
             data: {CITATION_START}\n\n"
        );
        let bytes = body.into_bytes();
        let (a, b) = bytes.split_at(17);
        let chunks: Vec<Result<Vec<u8>, LlmError>> = vec![Ok(a.to_vec()), Ok(b.to_vec())];

        let events: Vec<_> = chat_event_stream(stream::iter(chunks)).collect().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Ok(ChatStreamEvent::ContentDelta { .. })));
        assert!(matches!(events[1], Ok(ChatStreamEvent::CitationStart { .. })));
    }

    #[tokio::test]
    async fn test_event_stream_interrupted() {
        let chunks: Vec<Result<Vec<u8>, LlmError>> = vec![
            Ok(format!("data: {CONTENT_DELTA}\n").into_bytes()),
            Err(LlmError::StreamInterrupted("connection reset".to_string())),
            Ok(format!("data: {CONTENT_DELTA}\n").into_bytes()),
        ];

        let events: Vec<_> = chat_event_stream(stream::iter(chunks)).collect().await;
        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        assert!(matches!(&events[1], Err(e) if e.is_transport_closed()));
    }
}
