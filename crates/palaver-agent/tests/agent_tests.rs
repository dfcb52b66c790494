//! Agent pipeline tests with scripted collaborators
//!
//! The store and the generation backend are mocked behind their traits, so
//! every decision path in the runtime can be driven deterministically.

use palaver_agent::{
    AgentRuntime, Archetype, GateStrategy, Persona, PipelineSettings, ResponseGate,
    ResponsePlanner, Toolbox, TrustLexicon, TRUST_MAX, TRUST_MIN,
};
use palaver_core::{ChannelMessage, ContextDigest, ParticipantId, SenderType, SessionRef};
use palaver_llm::{GenerationBackend, GenerationRequest, LlmError, LlmResult};
use palaver_store::{ContextStore, DigestPayload, DigestQuery, StoreError, StoreResult};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

// ============================================================
// Mock collaborators
// ============================================================

#[derive(Default)]
struct MockStore {
    recorded: Mutex<Vec<(String, String, String)>>,
    relationship_queries: Mutex<Vec<(String, String)>>,
    search_queries: Mutex<Vec<String>>,
    relationship_answer: Mutex<String>,
    search_results: Mutex<Vec<String>>,
    fail_digest: Mutex<bool>,
}

impl MockStore {
    fn recorded_by(&self, speaker: &str) -> Vec<String> {
        self.recorded
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, s, _)| s == speaker)
            .map(|(_, _, c)| c.clone())
            .collect()
    }

    fn recorded_count(&self) -> usize {
        self.recorded.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl ContextStore for MockStore {
    async fn conversation(&self, _session: &SessionRef) -> StoreResult<()> {
        Ok(())
    }

    async fn ensure_participant(&self, _id: &ParticipantId) -> StoreResult<()> {
        Ok(())
    }

    async fn record_utterance(
        &self,
        session: &SessionRef,
        speaker: &ParticipantId,
        content: &str,
    ) -> StoreResult<()> {
        self.recorded.lock().unwrap().push((
            session.as_str().to_string(),
            speaker.as_str().to_string(),
            content.to_string(),
        ));
        Ok(())
    }

    async fn context_digest(
        &self,
        _session: &SessionRef,
        _query: &DigestQuery,
    ) -> StoreResult<DigestPayload> {
        if *self.fail_digest.lock().unwrap() {
            return Err(StoreError::RequestFailed("digest down".into()));
        }
        Ok(DigestPayload::default())
    }

    async fn ask_relationship(
        &self,
        _session: &SessionRef,
        target: &ParticipantId,
        question: &str,
        _perspective: &ParticipantId,
    ) -> StoreResult<String> {
        self.relationship_queries
            .lock()
            .unwrap()
            .push((target.as_str().to_string(), question.to_string()));
        Ok(self.relationship_answer.lock().unwrap().clone())
    }

    async fn search_conversation(
        &self,
        _session: &SessionRef,
        query: &str,
    ) -> StoreResult<Vec<String>> {
        self.search_queries.lock().unwrap().push(query.to_string());
        Ok(self.search_results.lock().unwrap().clone())
    }
}

/// Pops scripted completions in order. An exhausted script is a hard backend
/// error so an unexpected extra call shows up as a silent agent, not a reply.
struct MockBackend {
    script: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<usize>,
}

impl MockBackend {
    fn scripted(responses: &[&str]) -> Self {
        Self {
            script: Mutex::new(responses.iter().map(|r| Ok(r.to_string())).collect()),
            calls: Mutex::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(0),
        }
    }

    fn push(&self, response: &str) {
        self.script.lock().unwrap().push_back(Ok(response.to_string()));
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl GenerationBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, _request: GenerationRequest) -> LlmResult<String> {
        *self.calls.lock().unwrap() += 1;
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(e)) => Err(LlmError::RequestFailed(e)),
            None => Err(LlmError::RequestFailed("script exhausted".into())),
        }
    }
}

// ============================================================
// Helpers
// ============================================================

const RESPOND_NOW: &str = r#"{"tool": "respond-now", "reason": "enough", "confidence": 0.9}"#;

fn heuristic_persona(name: &str) -> Persona {
    Persona::new(name, Archetype::Friendly).with_gate(GateStrategy::Heuristic)
}

fn make_runtime(
    persona: Persona,
    store: Arc<MockStore>,
    backend: Arc<MockBackend>,
) -> (AgentRuntime, mpsc::Receiver<ChannelMessage>) {
    let (tx, rx) = mpsc::channel(16);
    let runtime = AgentRuntime::new(persona, store, backend, PipelineSettings::default(), tx);
    (runtime, rx)
}

fn drain(rx: &mut mpsc::Receiver<ChannelMessage>) -> Vec<ChannelMessage> {
    let mut out = Vec::new();
    while let Ok(message) = rx.try_recv() {
        out.push(message);
    }
    out
}

fn empty_digest(perspective: &str) -> ContextDigest {
    ContextDigest {
        transcript: Vec::new(),
        summary: None,
        relationship: None,
        perspective: ParticipantId::normalize(perspective),
    }
}

// ============================================================
// Intake filtering
// ============================================================

#[tokio::test]
async fn duplicate_delivery_is_discarded_before_recording() {
    let store = Arc::new(MockStore::default());
    let backend = Arc::new(MockBackend::scripted(&[RESPOND_NOW, "Hello yourself."]));
    let (mut runtime, mut rx) = make_runtime(heuristic_persona("Stack"), store.clone(), backend);

    runtime.handle(ChannelMessage::session_control("s1")).await;
    let message = ChannelMessage::chat("alice", SenderType::Human, "Hello Stack!");
    runtime.handle(message.clone()).await;
    runtime.handle(message).await;

    assert_eq!(drain(&mut rx).len(), 1);
    // One inbound recording, one reply recording. The duplicate touched nothing.
    assert_eq!(store.recorded_by("alice"), vec!["Hello Stack!".to_string()]);
    assert_eq!(store.recorded_by("Stack"), vec!["Hello yourself.".to_string()]);
}

#[tokio::test]
async fn own_messages_are_ignored() {
    let store = Arc::new(MockStore::default());
    let backend = Arc::new(MockBackend::failing());
    let (mut runtime, mut rx) = make_runtime(heuristic_persona("Stack"), store.clone(), backend);

    runtime.handle(ChannelMessage::session_control("s1")).await;
    runtime
        .handle(ChannelMessage::chat("Stack", SenderType::Agent, "echo of myself, Stack"))
        .await;

    assert!(drain(&mut rx).is_empty());
    assert_eq!(store.recorded_count(), 0);
}

#[tokio::test]
async fn chat_before_session_assignment_is_dropped() {
    let store = Arc::new(MockStore::default());
    let backend = Arc::new(MockBackend::failing());
    let (mut runtime, mut rx) = make_runtime(heuristic_persona("Stack"), store.clone(), backend);

    runtime
        .handle(ChannelMessage::chat("alice", SenderType::Human, "Stack, are you there?"))
        .await;

    assert!(drain(&mut rx).is_empty());
    assert_eq!(store.recorded_count(), 0);
}

#[tokio::test]
async fn agent_chatter_without_address_is_ignored() {
    let store = Arc::new(MockStore::default());
    let backend = Arc::new(MockBackend::failing());
    let (mut runtime, mut rx) = make_runtime(heuristic_persona("Merge"), store.clone(), backend);

    runtime.handle(ChannelMessage::session_control("s1")).await;
    runtime
        .handle(ChannelMessage::chat(
            "Lint",
            SenderType::Agent,
            "I think the answer is forty-two.",
        ))
        .await;

    // Not even recorded: the filter runs before context assembly.
    assert!(drain(&mut rx).is_empty());
    assert_eq!(store.recorded_count(), 0);
}

#[tokio::test]
async fn agent_cooldown_throttles_cross_talk_but_not_humans() {
    let store = Arc::new(MockStore::default());
    let backend = Arc::new(MockBackend::scripted(&[RESPOND_NOW, "Noted, Lint."]));
    let (mut runtime, mut rx) =
        make_runtime(heuristic_persona("Stack"), store.clone(), backend.clone());

    runtime.handle(ChannelMessage::session_control("s1")).await;
    runtime
        .handle(ChannelMessage::chat("Lint", SenderType::Agent, "Stack, do you agree?"))
        .await;
    assert_eq!(drain(&mut rx).len(), 1);

    // Second agent address lands inside the cooldown window.
    runtime
        .handle(ChannelMessage::chat("Lint", SenderType::Agent, "Stack, still there?"))
        .await;
    assert!(drain(&mut rx).is_empty());

    // A human is never throttled.
    backend.push(RESPOND_NOW);
    backend.push("Of course.");
    runtime
        .handle(ChannelMessage::chat("alice", SenderType::Human, "Stack, still there?"))
        .await;
    assert_eq!(drain(&mut rx).len(), 1);
}

// ============================================================
// Gate
// ============================================================

#[tokio::test]
async fn heuristic_gate_is_biased_toward_silence() {
    let gate = ResponseGate::new(&heuristic_persona("Stack"));

    let mention = ChannelMessage::chat("alice", SenderType::Human, "Hello Stack, got a minute?");
    assert!(gate.heuristic(&mention).should_respond);

    let question = ChannelMessage::chat("alice", SenderType::Human, "what time does it open");
    assert!(gate.heuristic(&question).should_respond);

    let chatter = ChannelMessage::chat("alice", SenderType::Human, "lovely weather today.");
    assert!(!gate.heuristic(&chatter).should_respond);
}

#[tokio::test]
async fn backed_gate_goes_silent_on_backend_failure() {
    let gate = ResponseGate::new(&Persona::new("Stack", Archetype::Friendly));
    let backend = MockBackend::failing();
    let message = ChannelMessage::chat("alice", SenderType::Human, "Hello Stack!");

    let decision = gate
        .decide(
            &message,
            &empty_digest("Stack"),
            &backend,
            "m",
            std::time::Duration::from_secs(1),
        )
        .await;

    // Even a direct mention stays unanswered when the gate cannot run.
    assert!(!decision.should_respond);
}

#[tokio::test]
async fn backed_gate_falls_back_to_heuristic_on_junk_output() {
    let gate = ResponseGate::new(&Persona::new("Stack", Archetype::Friendly));
    let backend = MockBackend::scripted(&["hmm, probably yes? hard to say"]);
    let message = ChannelMessage::chat("alice", SenderType::Human, "Hello Stack!");

    let decision = gate
        .decide(
            &message,
            &empty_digest("Stack"),
            &backend,
            "m",
            std::time::Duration::from_secs(1),
        )
        .await;

    // Heuristic takes over: direct mention means respond.
    assert!(decision.should_respond);
}

// ============================================================
// Tool loop
// ============================================================

#[tokio::test]
async fn repeat_tool_pick_ends_the_loop_with_one_use() {
    let store = Arc::new(MockStore::default());
    *store.relationship_answer.lock().unwrap() = "Alice collects maps.".to_string();

    let choice = r#"{"tool": "relationship-insight", "reason": "know her", "confidence": 0.8}"#;
    // Round 1 choice, tool input formulation, round 2 repeats the spent tool.
    let backend = Arc::new(MockBackend::scripted(&[
        choice,
        r#"{"target": "alice", "question": "what does she collect?"}"#,
        choice,
    ]));

    let perspective = ParticipantId::normalize("Stack");
    let planner = ResponsePlanner::new(backend.clone(), "m", 3, std::time::Duration::from_secs(1));
    let toolbox = Toolbox::new(
        store.clone(),
        backend.clone(),
        "m",
        perspective,
        std::time::Duration::from_secs(1),
        std::time::Duration::from_secs(1),
    );

    let session = SessionRef::new("s1");
    let message = ChannelMessage::chat("alice", SenderType::Human, "Stack, remember me?");
    let tracker = planner
        .plan(&session, &message, &empty_digest("Stack"), &toolbox)
        .await;

    assert_eq!(tracker.relationship_insight.as_deref(), Some("Alice collects maps."));
    assert_eq!(store.relationship_queries.lock().unwrap().len(), 1);
    assert_eq!(backend.calls(), 3);
}

#[tokio::test]
async fn round_cap_forces_a_response_with_gathered_results() {
    let store = Arc::new(MockStore::default());
    *store.relationship_answer.lock().unwrap() = "Alice collects maps.".to_string();
    *store.search_results.lock().unwrap() = vec!["alice: I found an atlas".to_string()];

    let backend = Arc::new(MockBackend::scripted(&[
        r#"{"tool": "relationship-insight", "reason": "r", "confidence": 0.8}"#,
        r#"{"target": "alice", "question": "q"}"#,
        r#"{"tool": "history-search", "reason": "r", "confidence": 0.8}"#,
        r#"{"query": "atlas"}"#,
    ]));

    let planner = ResponsePlanner::new(backend.clone(), "m", 2, std::time::Duration::from_secs(1));
    let toolbox = Toolbox::new(
        store,
        backend,
        "m",
        ParticipantId::normalize("Stack"),
        std::time::Duration::from_secs(1),
        std::time::Duration::from_secs(1),
    );

    let session = SessionRef::new("s1");
    let message = ChannelMessage::chat("alice", SenderType::Human, "Stack, the atlas?");
    let tracker = planner
        .plan(&session, &message, &empty_digest("Stack"), &toolbox)
        .await;

    assert!(tracker.relationship_insight.is_some());
    assert_eq!(
        tracker.history_matches,
        Some(vec!["alice: I found an atlas".to_string()])
    );
}

#[tokio::test]
async fn tool_choice_failure_degrades_to_responding() {
    let store = Arc::new(MockStore::default());
    let backend = Arc::new(MockBackend::failing());

    let planner = ResponsePlanner::new(backend.clone(), "m", 3, std::time::Duration::from_secs(1));
    let toolbox = Toolbox::new(
        store,
        backend,
        "m",
        ParticipantId::normalize("Stack"),
        std::time::Duration::from_secs(1),
        std::time::Duration::from_secs(1),
    );

    let session = SessionRef::new("s1");
    let message = ChannelMessage::chat("alice", SenderType::Human, "Stack?");
    let tracker = planner
        .plan(&session, &message, &empty_digest("Stack"), &toolbox)
        .await;

    assert!(tracker.is_empty());
}

// ============================================================
// Emission
// ============================================================

#[tokio::test]
async fn blank_generation_is_suppressed_not_emitted() {
    let store = Arc::new(MockStore::default());
    let backend = Arc::new(MockBackend::scripted(&[RESPOND_NOW, "   \n  "]));
    let (mut runtime, mut rx) = make_runtime(heuristic_persona("Stack"), store.clone(), backend);

    runtime.handle(ChannelMessage::session_control("s1")).await;
    runtime
        .handle(ChannelMessage::chat("alice", SenderType::Human, "Hello Stack!"))
        .await;

    assert!(drain(&mut rx).is_empty());
    // The inbound message was still recorded; only the reply was dropped.
    assert_eq!(store.recorded_by("Stack").len(), 0);
    assert_eq!(store.recorded_by("alice").len(), 1);
}

#[tokio::test]
async fn generation_failure_aborts_silently() {
    let store = Arc::new(MockStore::default());
    let backend = Arc::new(MockBackend::scripted(&[RESPOND_NOW]));
    let (mut runtime, mut rx) = make_runtime(heuristic_persona("Stack"), store.clone(), backend);

    runtime.handle(ChannelMessage::session_control("s1")).await;
    runtime
        .handle(ChannelMessage::chat("alice", SenderType::Human, "Hello Stack!"))
        .await;

    assert!(drain(&mut rx).is_empty());
    assert_eq!(store.recorded_by("Stack").len(), 0);
}

#[tokio::test]
async fn context_assembly_failure_aborts_the_pipeline() {
    let store = Arc::new(MockStore::default());
    *store.fail_digest.lock().unwrap() = true;
    let backend = Arc::new(MockBackend::failing());
    let (mut runtime, mut rx) = make_runtime(heuristic_persona("Stack"), store.clone(), backend.clone());

    runtime.handle(ChannelMessage::session_control("s1")).await;
    runtime
        .handle(ChannelMessage::chat("alice", SenderType::Human, "Hello Stack!"))
        .await;

    assert!(drain(&mut rx).is_empty());
    assert_eq!(backend.calls(), 0);
}

// ============================================================
// End to end
// ============================================================

#[tokio::test]
async fn direct_mention_yields_one_reply_recorded_under_normalized_id() {
    let store = Arc::new(MockStore::default());
    let backend = Arc::new(MockBackend::scripted(&[
        RESPOND_NOW,
        "Working representations are how I keep track of what matters.",
    ]));
    let (mut runtime, mut rx) = make_runtime(heuristic_persona("Stack"), store.clone(), backend);

    runtime.handle(ChannelMessage::session_control("s1")).await;
    runtime
        .handle(ChannelMessage::chat(
            "Dr. Quest",
            SenderType::Human,
            "Hello Stack, explain working representations",
        ))
        .await;

    let sent = drain(&mut rx);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].sender_id, "Stack");
    assert_eq!(sent[0].meta.sender_type, SenderType::Agent);

    // The sender's display name was normalized before any store write.
    assert_eq!(
        store.recorded_by("Dr_Quest"),
        vec!["Hello Stack, explain working representations".to_string()]
    );
    assert_eq!(store.recorded_by("Stack").len(), 1);

    // First exchange seeds trust at the archetype's starting point.
    assert_eq!(runtime.trust_toward(&ParticipantId::normalize("Dr. Quest")), 20);
}

#[tokio::test]
async fn session_reset_clears_dedup_and_trust() {
    let store = Arc::new(MockStore::default());
    let backend = Arc::new(MockBackend::scripted(&[RESPOND_NOW, "Thanks, alice!"]));
    let (mut runtime, mut rx) = make_runtime(heuristic_persona("Stack"), store.clone(), backend.clone());

    runtime.handle(ChannelMessage::session_control("s1")).await;
    let message = ChannelMessage::chat("alice", SenderType::Human, "thank you Stack");
    runtime.handle(message.clone()).await;
    assert_eq!(drain(&mut rx).len(), 1);

    let alice = ParticipantId::normalize("alice");
    assert_eq!(runtime.trust_toward(&alice), 24); // 20 + "thank" marker

    runtime.handle(ChannelMessage::session_control("s2")).await;
    assert_eq!(runtime.session().map(SessionRef::as_str), Some("s2"));
    // Derived state is gone with the old session.
    assert_eq!(runtime.trust_toward(&alice), 20);

    // The very same frame is fresh again under the new session.
    backend.push(RESPOND_NOW);
    backend.push("Thanks again!");
    runtime.handle(message).await;
    let sent = drain(&mut rx);
    assert_eq!(sent.len(), 1);
    assert_eq!(
        store.recorded.lock().unwrap().last().map(|(s, _, _)| s.clone()),
        Some("s2".to_string())
    );
}

#[tokio::test]
async fn reassigning_the_same_session_is_not_a_reset() {
    let store = Arc::new(MockStore::default());
    let backend = Arc::new(MockBackend::scripted(&[RESPOND_NOW, "Hi."]));
    let (mut runtime, mut rx) = make_runtime(heuristic_persona("Stack"), store.clone(), backend);

    runtime.handle(ChannelMessage::session_control("s1")).await;
    let message = ChannelMessage::chat("alice", SenderType::Human, "Hello Stack!");
    runtime.handle(message.clone()).await;
    assert_eq!(drain(&mut rx).len(), 1);

    runtime.handle(ChannelMessage::session_control("s1")).await;
    runtime.handle(message).await;

    // Dedup survived: the duplicate stayed filtered.
    assert!(drain(&mut rx).is_empty());
    assert_eq!(store.recorded_by("alice").len(), 1);
}

#[tokio::test]
async fn narrator_introduces_each_joiner_once() {
    let store = Arc::new(MockStore::default());
    let backend = Arc::new(MockBackend::failing());
    let persona = Persona::new("Tale", Archetype::Narrator)
        .with_scene_intro("The tavern door creaks open.");
    let (mut runtime, mut rx) = make_runtime(persona, store.clone(), backend);

    runtime.handle(ChannelMessage::session_control("s1")).await;
    runtime.handle(ChannelMessage::join("alice", SenderType::Human)).await;
    runtime.handle(ChannelMessage::join("alice", SenderType::Human)).await;
    runtime.handle(ChannelMessage::join("bob", SenderType::Human)).await;

    let sent = drain(&mut rx);
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|m| m.content == "The tavern door creaks open."));
    // Introductions are recorded like any other utterance.
    assert_eq!(store.recorded_by("Tale").len(), 2);
}

// ============================================================
// Trust
// ============================================================

#[test]
fn trust_stays_clamped_at_both_ends() {
    let lexicon = TrustLexicon::default();
    assert_eq!(lexicon.apply(TRUST_MAX, "thank you, I appreciate it, impressive", ""), TRUST_MAX);
    assert_eq!(lexicon.apply(TRUST_MIN, "shut up you stupid useless thing", ""), TRUST_MIN);
}

#[test]
fn own_hostility_counts_at_half_weight() {
    let lexicon = TrustLexicon::default();
    // "shut up" is 6 inbound, 3 outbound.
    assert_eq!(lexicon.delta("shut up", ""), -6);
    assert_eq!(lexicon.delta("", "shut up"), -3);
}

#[test]
fn mixed_exchange_nets_out() {
    let lexicon = TrustLexicon::default();
    // "thank" (+4) and "hate" (-4) cancel.
    assert_eq!(lexicon.delta("thank you, though I hate the rain", ""), 0);
}

#[tokio::test]
async fn hostile_exchange_lowers_trust_from_the_archetype_floor() {
    let store = Arc::new(MockStore::default());
    let backend = Arc::new(MockBackend::scripted(&[RESPOND_NOW, "Watch your tone."]));
    let persona = Persona::new("Grimjaw", Archetype::Hostile).with_gate(GateStrategy::Heuristic);
    let (mut runtime, mut rx) = make_runtime(persona, store, backend);

    runtime.handle(ChannelMessage::session_control("s1")).await;
    runtime
        .handle(ChannelMessage::chat("alice", SenderType::Human, "Grimjaw you stupid brute"))
        .await;

    assert_eq!(drain(&mut rx).len(), 1);
    // Hostile starts at -40; "stupid" costs 5 more.
    assert_eq!(runtime.trust_toward(&ParticipantId::normalize("alice")), -45);
}
