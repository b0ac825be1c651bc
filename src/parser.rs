//! Incremental JSON-RPC 2.0 message parser
//!
//! This module converts an arbitrary character stream into a sequence of
//! [`ParsedMessage`] values. Framing is balanced-brace based rather than
//! newline based: a message is the shortest prefix whose `{`/`}` depth
//! returns to zero outside string literals, so the parser tolerates
//! messages split across chunks and back-to-back messages in one chunk.
//!
//! The parser is pure: it performs no I/O and may be fed one byte at a
//! time. Each direction of the gateway owns its own [`MessageParser`];
//! the two streams are independently framed and must never share one.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC message classification, derived from field presence:
/// `method` + `id` is a request, `method` alone a notification, `error`
/// an error response, `result` a success response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Request,
    Response,
    Error,
    Notification,
}

impl MessageType {
    /// Lowercase wire/display form of the message type.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Request => "request",
            MessageType::Response => "response",
            MessageType::Error => "error",
            MessageType::Notification => "notification",
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code
    pub code: i64,
    /// Short human-readable message
    pub message: String,
    /// Optional structured detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A fully decoded JSON-RPC message plus its exact source text.
///
/// `raw` is the canonical forwarded form: when no redaction occurs the
/// gateway forwards these exact bytes, so round-tripping through the
/// parser is loss-free.
#[derive(Debug, Clone)]
pub struct ParsedMessage {
    /// Classification derived from field presence
    pub message_type: MessageType,
    /// The exact substring this message was decoded from
    pub raw: String,
    /// The decoded JSON object
    pub parsed: Value,
    /// `method` for requests and notifications
    pub method: Option<String>,
    /// `params` for requests and notifications (object or array)
    pub params: Option<Value>,
    /// `result` for success responses
    pub result: Option<Value>,
    /// `error` for error responses
    pub error: Option<JsonRpcError>,
    /// Message id, preserved as received (integer or string); `None` for
    /// notifications and for an explicit `"id": null`
    pub id: Option<Value>,
}

impl ParsedMessage {
    /// True for a `tools/call` request.
    pub fn is_tool_call(&self) -> bool {
        self.message_type == MessageType::Request && self.method.as_deref() == Some("tools/call")
    }

    /// True for a `resources/read` request.
    pub fn is_resource_read(&self) -> bool {
        self.message_type == MessageType::Request
            && self.method.as_deref() == Some("resources/read")
    }

    /// Tool name from a `tools/call` request, when `params` is an object.
    pub fn tool_name(&self) -> Option<&str> {
        if !self.is_tool_call() {
            return None;
        }
        self.params.as_ref()?.get("name")?.as_str()
    }

    /// Resource URI from a `resources/read` request, when `params` is an
    /// object.
    pub fn resource_uri(&self) -> Option<&str> {
        if !self.is_resource_read() {
            return None;
        }
        self.params.as_ref()?.get("uri")?.as_str()
    }
}

/// Incremental parser with cross-feed buffering.
///
/// Feed arbitrary chunks with [`MessageParser::feed`]; complete messages
/// are returned as they become available and the unconsumed tail is kept
/// for the next call.
#[derive(Debug, Default)]
pub struct MessageParser {
    buffer: String,
}

impl MessageParser {
    /// Create a parser with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `data` to the buffer and extract every complete message.
    ///
    /// Malformed messages (bad JSON, wrong `jsonrpc` version, top-level
    /// arrays, unclassifiable objects) are logged at debug level and
    /// dropped; parsing continues with the following bytes.
    pub fn feed(&mut self, data: &str) -> Vec<ParsedMessage> {
        self.buffer.push_str(data);
        let mut messages = Vec::new();

        loop {
            let (message, remaining) = extract_message(&self.buffer);
            self.buffer = remaining;
            let Some(message) = message else {
                break;
            };

            match parse_message(&message) {
                Some(parsed) => messages.push(parsed),
                None => {
                    tracing::debug!(
                        message = %truncate_for_log(&message),
                        "dropping malformed JSON-RPC message"
                    );
                }
            }
        }

        messages
    }

    /// Discard any buffered partial input.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

/// Extract one brace-balanced candidate from the front of `buffer`.
///
/// Returns `(candidate, remaining)`. Leading whitespace is skipped. The
/// candidate spans from the first retained character through the `}` that
/// returns the brace depth to zero, so any non-object prefix (including a
/// batch's `[`) rides along and fails JSON decoding downstream, which
/// drops it as a parse error. A buffer containing no `{` at all can never
/// frame a message and is discarded; otherwise an incomplete tail is
/// preserved for the next feed.
fn extract_message(buffer: &str) -> (Option<String>, String) {
    let work = buffer.trim_start();
    if work.is_empty() {
        return (None, String::new());
    }

    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escape = false;
    let mut saw_brace = false;

    for (i, ch) in work.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' => escape = true,
            '"' => in_string = !in_string,
            '{' if !in_string => {
                depth += 1;
                saw_brace = true;
            }
            '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if saw_brace && depth == 0 {
                    let end = i + ch.len_utf8();
                    return (Some(work[..end].to_string()), work[end..].to_string());
                }
            }
            _ => {}
        }
    }

    if !saw_brace {
        tracing::debug!(dropped = work.len(), "discarding bytes with no JSON object");
        return (None, String::new());
    }

    // No complete message yet; keep the tail for the next feed.
    (None, work.to_string())
}

/// Decode and classify one framed message.
///
/// Returns `None` when the text is not a JSON object, the `jsonrpc`
/// version is not `"2.0"`, or no message kind applies.
fn parse_message(message: &str) -> Option<ParsedMessage> {
    let data: Value = serde_json::from_str(message).ok()?;

    if !data.is_object() || data.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return None;
    }

    // Ids are preserved as received; an explicit null behaves like absence
    // for response-routing purposes.
    let id = data.get("id").filter(|v| !v.is_null()).cloned();

    if let Some(method) = data.get("method").and_then(Value::as_str) {
        let message_type = if data.get("id").is_some() {
            MessageType::Request
        } else {
            MessageType::Notification
        };
        return Some(ParsedMessage {
            message_type,
            raw: message.to_string(),
            method: Some(method.to_string()),
            params: data.get("params").cloned(),
            result: None,
            error: None,
            id,
            parsed: data,
        });
    }

    if let Some(error) = data.get("error") {
        let error: JsonRpcError = serde_json::from_value(error.clone()).ok()?;
        return Some(ParsedMessage {
            message_type: MessageType::Error,
            raw: message.to_string(),
            method: None,
            params: None,
            result: None,
            error: Some(error),
            id,
            parsed: data,
        });
    }

    if data.get("result").is_some() {
        return Some(ParsedMessage {
            message_type: MessageType::Response,
            raw: message.to_string(),
            method: None,
            params: None,
            result: data.get("result").cloned(),
            error: None,
            id,
            parsed: data,
        });
    }

    None
}

/// Build a single-line JSON-RPC error response.
pub fn create_error_response(
    id: Option<Value>,
    code: i64,
    message: &str,
    data: Option<Value>,
) -> String {
    let response = serde_json::json!({
        "jsonrpc": "2.0",
        "id": id.unwrap_or(Value::Null),
        "error": {
            "code": code,
            "message": message,
            "data": data.unwrap_or(Value::Null),
        },
    });
    response.to_string()
}

fn truncate_for_log(s: &str) -> &str {
    let mut end = s.len().min(120);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_one(parser: &mut MessageParser, data: &str) -> ParsedMessage {
        let mut messages = parser.feed(data);
        assert_eq!(messages.len(), 1, "expected exactly one message");
        messages.remove(0)
    }

    #[test]
    fn test_parse_request() {
        let mut parser = MessageParser::new();
        let msg = feed_one(
            &mut parser,
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"echo"}}"#,
        );
        assert_eq!(msg.message_type, MessageType::Request);
        assert_eq!(msg.method.as_deref(), Some("tools/call"));
        assert_eq!(msg.id, Some(serde_json::json!(1)));
        assert!(msg.is_tool_call());
        assert_eq!(msg.tool_name(), Some("echo"));
    }

    #[test]
    fn test_parse_notification() {
        let mut parser = MessageParser::new();
        let msg = feed_one(
            &mut parser,
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        );
        assert_eq!(msg.message_type, MessageType::Notification);
        assert_eq!(msg.id, None);
        assert!(!msg.is_tool_call());
    }

    #[test]
    fn test_parse_response() {
        let mut parser = MessageParser::new();
        let msg = feed_one(&mut parser, r#"{"jsonrpc":"2.0","id":2,"result":{"ok":true}}"#);
        assert_eq!(msg.message_type, MessageType::Response);
        assert_eq!(msg.result, Some(serde_json::json!({"ok": true})));
    }

    #[test]
    fn test_parse_error_response() {
        let mut parser = MessageParser::new();
        let msg = feed_one(
            &mut parser,
            r#"{"jsonrpc":"2.0","id":3,"error":{"code":-32601,"message":"Method not found"}}"#,
        );
        assert_eq!(msg.message_type, MessageType::Error);
        let error = msg.error.unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.message, "Method not found");
        assert!(error.data.is_none());
    }

    #[test]
    fn test_resource_read_accessors() {
        let mut parser = MessageParser::new();
        let msg = feed_one(
            &mut parser,
            r#"{"jsonrpc":"2.0","id":4,"method":"resources/read","params":{"uri":"file:///tmp/x"}}"#,
        );
        assert!(msg.is_resource_read());
        assert_eq!(msg.resource_uri(), Some("file:///tmp/x"));
        assert_eq!(msg.tool_name(), None);
    }

    #[test]
    fn test_split_feed_reassembles() {
        let mut parser = MessageParser::new();
        assert!(parser.feed(r#"{"jsonrpc":"2.0","id":3,"#).is_empty());
        let msg = feed_one(&mut parser, r#""method":"ping"}"#);
        assert_eq!(msg.method.as_deref(), Some("ping"));
        assert_eq!(msg.id, Some(serde_json::json!(3)));
    }

    #[test]
    fn test_split_inside_escape_sequence() {
        // The message contains the string "a\"b"; split between the
        // backslash and the quote.
        let full = r#"{"jsonrpc":"2.0","method":"log","params":{"text":"a\"b"}}"#;
        let split_at = full.find(r#"\""#).unwrap() + 1;

        let mut parser = MessageParser::new();
        assert!(parser.feed(&full[..split_at]).is_empty());
        let msg = feed_one(&mut parser, &full[split_at..]);
        assert_eq!(msg.raw, full);
        assert_eq!(msg.params.unwrap()["text"], "a\"b");
    }

    #[test]
    fn test_braces_inside_strings_ignored() {
        let mut parser = MessageParser::new();
        let raw = r#"{"jsonrpc":"2.0","method":"log","params":{"text":"}{}{"}}"#;
        let msg = feed_one(&mut parser, raw);
        assert_eq!(msg.raw, raw);
    }

    #[test]
    fn test_back_to_back_messages() {
        let mut parser = MessageParser::new();
        let messages = parser.feed(
            r#"{"jsonrpc":"2.0","id":1,"method":"a"}{"jsonrpc":"2.0","id":2,"method":"b"}"#,
        );
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].method.as_deref(), Some("a"));
        assert_eq!(messages[1].method.as_deref(), Some("b"));
    }

    #[test]
    fn test_chunked_byte_at_a_time_matches_whole_feed() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"echo"}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":"1","result":[1,2,3]}"#,
        );

        let mut whole = MessageParser::new();
        let expected: Vec<String> = whole.feed(input).into_iter().map(|m| m.raw).collect();

        let mut chunked = MessageParser::new();
        let mut got = Vec::new();
        let mut buf = [0u8; 4];
        for ch in input.chars() {
            let s = ch.encode_utf8(&mut buf);
            got.extend(chunked.feed(s).into_iter().map(|m| m.raw));
        }

        assert_eq!(expected.len(), 2);
        assert_eq!(got, expected);
    }

    #[test]
    fn test_integer_and_string_ids_distinct() {
        let mut parser = MessageParser::new();
        let int_id = feed_one(&mut parser, r#"{"jsonrpc":"2.0","id":7,"method":"x"}"#);
        let str_id = feed_one(&mut parser, r#"{"jsonrpc":"2.0","id":"7","method":"x"}"#);
        assert_eq!(int_id.id, Some(serde_json::json!(7)));
        assert_eq!(str_id.id, Some(serde_json::json!("7")));
        assert_ne!(int_id.id, str_id.id);
    }

    #[test]
    fn test_null_id_request_classified_but_unanswerable() {
        let mut parser = MessageParser::new();
        let msg = feed_one(&mut parser, r#"{"jsonrpc":"2.0","id":null,"method":"x"}"#);
        // The id key is present so this is a request, but a null id cannot
        // be echoed into a response.
        assert_eq!(msg.message_type, MessageType::Request);
        assert_eq!(msg.id, None);
    }

    #[test]
    fn test_rejects_wrong_version() {
        let mut parser = MessageParser::new();
        assert!(parser
            .feed(r#"{"jsonrpc":"1.0","id":1,"method":"x"}"#)
            .is_empty());
    }

    #[test]
    fn test_rejects_batch_arrays() {
        let mut parser = MessageParser::new();
        // Top-level arrays (JSON-RPC batching) are dropped as parse errors.
        let messages = parser.feed(
            r#"[{"jsonrpc":"2.0","id":1,"method":"x"},{"jsonrpc":"2.0","id":2,"method":"y"}]"#,
        );
        assert!(messages.is_empty());

        // The stream recovers for the next standalone message.
        let msg = feed_one(&mut parser, r#"{"jsonrpc":"2.0","id":3,"method":"z"}"#);
        assert_eq!(msg.method.as_deref(), Some("z"));
    }

    #[test]
    fn test_rejects_unclassifiable_object() {
        let mut parser = MessageParser::new();
        assert!(parser.feed(r#"{"jsonrpc":"2.0","id":1}"#).is_empty());
    }

    #[test]
    fn test_garbage_prefix_drops_candidate_then_recovers() {
        let mut parser = MessageParser::new();
        // The garbage prefix rides along with the first balanced candidate,
        // which therefore fails to decode and is dropped.
        assert!(parser
            .feed(r#"not json at all {"jsonrpc":"2.0","id":1,"method":"x"}"#)
            .is_empty());

        // Parsing continues cleanly afterwards.
        let msg = feed_one(&mut parser, r#"{"jsonrpc":"2.0","id":2,"method":"y"}"#);
        assert_eq!(msg.method.as_deref(), Some("y"));
    }

    #[test]
    fn test_braceless_garbage_is_discarded() {
        let mut parser = MessageParser::new();
        assert!(parser.feed("plain text with no braces\n").is_empty());
        // The garbage did not wedge the buffer.
        let msg = feed_one(&mut parser, r#"{"jsonrpc":"2.0","method":"ping"}"#);
        assert_eq!(msg.method.as_deref(), Some("ping"));
    }

    #[test]
    fn test_whitespace_between_messages_skipped() {
        let mut parser = MessageParser::new();
        let messages = parser.feed(
            "  \n {\"jsonrpc\":\"2.0\",\"method\":\"a\"} \n\n {\"jsonrpc\":\"2.0\",\"method\":\"b\"}\n",
        );
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn test_raw_preservation() {
        let raw = r#"{"jsonrpc": "2.0", "id": 9,  "method": "tools/call", "params": {"name": "fmt"}}"#;
        let mut parser = MessageParser::new();
        let msg = feed_one(&mut parser, raw);
        assert_eq!(msg.raw, raw);
        let reparsed: Value = serde_json::from_str(&msg.raw).unwrap();
        assert_eq!(reparsed, msg.parsed);
    }

    #[test]
    fn test_reset_discards_partial_buffer() {
        let mut parser = MessageParser::new();
        assert!(parser.feed(r#"{"jsonrpc":"2.0","#).is_empty());
        parser.reset();
        // The dangling prefix is gone; a fresh message parses cleanly.
        let msg = feed_one(&mut parser, r#"{"jsonrpc":"2.0","method":"x"}"#);
        assert_eq!(msg.method.as_deref(), Some("x"));
    }

    #[test]
    fn test_create_error_response_shape() {
        let response = create_error_response(
            Some(serde_json::json!(7)),
            -32000,
            "Request blocked by security policy",
            Some(serde_json::json!({"reason": "test"})),
        );
        assert!(!response.contains('\n'));
        let value: Value = serde_json::from_str(&response).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 7);
        assert_eq!(value["error"]["code"], -32000);
        assert_eq!(value["error"]["data"]["reason"], "test");
    }

    #[test]
    fn test_create_error_response_null_id() {
        let response = create_error_response(None, -32700, "Parse error", None);
        let value: Value = serde_json::from_str(&response).unwrap();
        assert!(value["id"].is_null());
        assert!(value["error"]["data"].is_null());
    }
}
