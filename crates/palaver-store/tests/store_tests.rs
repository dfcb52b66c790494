//! Tests for palaver-store: digest payload decoding and search normalization

use palaver_store::http::normalize_matches;
use palaver_store::DigestPayload;
use serde_json::json;

// ===========================================================================
// DigestPayload decoding — every field is optional on the wire
// ===========================================================================

#[test]
fn digest_payload_full() {
    let payload: DigestPayload = serde_json::from_value(json!({
        "transcript": [
            { "speaker": "alice", "content": "hello" },
            { "speaker": "stack", "content": "hi" }
        ],
        "summary": "Greetings exchanged.",
        "relationship": "Alice is polite."
    }))
    .unwrap();
    assert_eq!(payload.transcript.len(), 2);
    assert_eq!(payload.summary.as_deref(), Some("Greetings exchanged."));
    assert_eq!(payload.relationship.as_deref(), Some("Alice is polite."));
}

#[test]
fn digest_payload_sparse() {
    let payload: DigestPayload = serde_json::from_value(json!({})).unwrap();
    assert!(payload.transcript.is_empty());
    assert!(payload.summary.is_none());
    assert!(payload.relationship.is_none());
}

#[test]
fn digest_payload_transcript_only() {
    let payload: DigestPayload = serde_json::from_value(json!({
        "transcript": [{ "speaker": "bob", "content": "hm" }]
    }))
    .unwrap();
    assert_eq!(payload.transcript[0].speaker, "bob");
}

// ===========================================================================
// Search result normalization — array | single object | bare string
// ===========================================================================

#[test]
fn normalize_array_of_strings() {
    let matches = normalize_matches(json!(["first", "second"]));
    assert_eq!(matches, vec!["first".to_string(), "second".to_string()]);
}

#[test]
fn normalize_array_of_objects() {
    let matches = normalize_matches(json!([
        { "content": "iron is up", "score": 0.9 },
        { "text": "prices fell" }
    ]));
    assert_eq!(matches, vec!["iron is up".to_string(), "prices fell".to_string()]);
}

#[test]
fn normalize_single_object() {
    let matches = normalize_matches(json!({ "content": "one hit" }));
    assert_eq!(matches, vec!["one hit".to_string()]);
}

#[test]
fn normalize_bare_string() {
    let matches = normalize_matches(json!("a lone match"));
    assert_eq!(matches, vec!["a lone match".to_string()]);
}

#[test]
fn normalize_empty_and_junk() {
    assert!(normalize_matches(json!([])).is_empty());
    assert!(normalize_matches(json!(null)).is_empty());
    assert!(normalize_matches(json!(42)).is_empty());
    assert!(normalize_matches(json!(["", "  ", { "score": 1 }])).is_empty());
}

#[test]
fn normalize_preserves_order() {
    let matches = normalize_matches(json!(["c", "a", "b"]));
    assert_eq!(matches, vec!["c", "a", "b"]);
}
