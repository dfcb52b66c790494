//! Tests for palaver-core: identity normalization, digest rendering, protocol frames

use palaver_core::protocol;
use palaver_core::*;

// ===========================================================================
// SessionRef
// ===========================================================================

#[test]
fn session_ref_basics() {
    let r = SessionRef::new("conv-1");
    assert_eq!(r.as_str(), "conv-1");
    assert_eq!(format!("{}", r), "conv-1");
    assert_eq!(r, SessionRef::from("conv-1"));
}

// ===========================================================================
// ParticipantId normalization
// ===========================================================================

#[test]
fn participant_id_plain_names() {
    assert_eq!(ParticipantId::normalize("Stack").as_str(), "Stack");
    assert_eq!(ParticipantId::normalize("grimjaw").as_str(), "grimjaw");
    assert_eq!(ParticipantId::normalize("agent_7").as_str(), "agent_7");
}

#[test]
fn participant_id_whitespace_becomes_separator() {
    assert_eq!(ParticipantId::normalize("Old Grimjaw").as_str(), "Old_Grimjaw");
}

#[test]
fn participant_id_collapses_repeats_and_trims() {
    assert_eq!(ParticipantId::normalize("  a   b  ").as_str(), "a_b");
    assert_eq!(ParticipantId::normalize("a__--__b").as_str(), "a_b");
    assert_eq!(ParticipantId::normalize("-leading-").as_str(), "leading");
}

#[test]
fn participant_id_drops_punctuation() {
    assert_eq!(ParticipantId::normalize("Mx. O'Brien!").as_str(), "Mx_OBrien");
}

#[test]
fn participant_id_empty_fallback() {
    assert_eq!(ParticipantId::normalize("???").as_str(), "participant");
    assert_eq!(ParticipantId::normalize("").as_str(), "participant");
}

#[test]
fn participant_id_deterministic() {
    let a = ParticipantId::normalize("The  Narrator");
    let b = ParticipantId::normalize("The  Narrator");
    assert_eq!(a, b);
}

// ===========================================================================
// ContextDigest rendering
// ===========================================================================

#[test]
fn empty_digest_renders_placeholder() {
    let digest = ContextDigest {
        transcript: Vec::new(),
        summary: None,
        relationship: None,
        perspective: ParticipantId::normalize("stack"),
    };
    assert!(digest.is_empty());
    assert_eq!(digest.render(), "(no prior context)");
}

#[test]
fn digest_renders_all_parts() {
    let digest = ContextDigest {
        transcript: vec![
            TranscriptLine { speaker: "alice".into(), content: "hello".into() },
            TranscriptLine { speaker: "stack".into(), content: "hi alice".into() },
        ],
        summary: Some("Two people greeting.".into()),
        relationship: Some("Alice has been friendly.".into()),
        perspective: ParticipantId::normalize("stack"),
    };
    let rendered = digest.render();
    assert!(rendered.contains("Two people greeting."));
    assert!(rendered.contains("Alice has been friendly."));
    assert!(rendered.contains("alice: hello"));
    assert!(rendered.contains("stack: hi alice"));
    assert!(!rendered.contains("(no prior context)"));
}

#[test]
fn digest_transcript_only() {
    let digest = ContextDigest {
        transcript: vec![TranscriptLine { speaker: "bob".into(), content: "hey".into() }],
        summary: None,
        relationship: None,
        perspective: ParticipantId::normalize("stack"),
    };
    assert!(!digest.is_empty());
    assert!(digest.render().contains("bob: hey"));
}

// ===========================================================================
// Decision / ToolKind
// ===========================================================================

#[test]
fn decision_confidence_clamped() {
    assert_eq!(Decision::respond("r", 1.5).confidence, 1.0);
    assert_eq!(Decision::silent("r", -0.5).confidence, 0.0);
}

#[test]
fn tool_kind_parse_canonical() {
    assert_eq!(ToolKind::parse("relationship-insight"), Some(ToolKind::RelationshipInsight));
    assert_eq!(ToolKind::parse("history-search"), Some(ToolKind::HistorySearch));
    assert_eq!(ToolKind::parse(" respond-now "), Some(ToolKind::RespondNow));
}

#[test]
fn tool_kind_parse_rejects_junk() {
    assert_eq!(ToolKind::parse("use_tool"), None);
    assert_eq!(ToolKind::parse(""), None);
    assert_eq!(ToolKind::parse("RESPOND-NOW?"), None);
}

#[test]
fn tool_kind_roundtrip() {
    for kind in [ToolKind::RelationshipInsight, ToolKind::HistorySearch, ToolKind::RespondNow] {
        assert_eq!(ToolKind::parse(kind.as_str()), Some(kind));
    }
}

// ===========================================================================
// Protocol frames
// ===========================================================================

#[test]
fn frame_roundtrip() {
    let msg = ChannelMessage::chat("alice", SenderType::Human, "hello everyone");
    let encoded = protocol::encode_frame(&msg).unwrap();
    let decoded = protocol::decode_frame(&encoded).unwrap();
    assert_eq!(decoded, msg);
}

#[test]
fn decode_rejects_garbage() {
    assert!(protocol::decode_frame("not json").is_err());
    assert!(protocol::decode_frame("{\"kind\":\"chat\"}").is_err());
}

#[test]
fn session_push_only_on_system_frames() {
    let control = ChannelMessage::session_control("conv-9");
    assert_eq!(protocol::session_push(&control), Some("conv-9"));

    let chat = ChannelMessage::chat("alice", SenderType::Human, "hi");
    assert_eq!(protocol::session_push(&chat), None);

    let join = ChannelMessage::join("bob", SenderType::Human);
    assert_eq!(protocol::session_push(&join), None);
}
