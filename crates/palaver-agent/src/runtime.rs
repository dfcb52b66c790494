//! Agent runtime — intake filtering and the per-message pipeline
//!
//! One runtime per agent, one tokio task, one message at a time. Serializing
//! per-agent handling makes the dedup cache, cooldown clock, and trust map
//! single-writer by construction; agents still run concurrently with each
//! other. The only shared mutable resource is the remote conversation log.

use crate::context::ContextAssembler;
use crate::emitter::ResponseEmitter;
use crate::gate::ResponseGate;
use crate::persona::Persona;
use crate::planner::{ResponsePlanner, MAX_TOOL_ROUNDS};
use crate::toolbox::Toolbox;
use crate::trust;
use palaver_core::{protocol, ChannelMessage, MessageKind, ParticipantId, SessionRef};
use palaver_llm::GenerationBackend;
use palaver_store::ContextStore;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pipeline tuning shared by all agents in a process.
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub model: String,
    pub token_budget: usize,
    pub max_tool_rounds: usize,
    /// Minimum gap between replies to other agents.
    pub agent_cooldown: Duration,
    pub dedup_capacity: usize,
    pub store_timeout: Duration,
    pub llm_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            model: "claude-3-5-haiku-latest".to_string(),
            token_budget: 2048,
            max_tool_rounds: MAX_TOOL_ROUNDS,
            agent_cooldown: Duration::from_secs(20),
            dedup_capacity: 128,
            store_timeout: Duration::from_secs(10),
            llm_timeout: Duration::from_secs(30),
        }
    }
}

/// Bounded FIFO of already-processed message keys. Delivery retries arrive
/// close together, so a small window is enough.
struct DedupCache {
    seen: HashSet<(String, String, String)>,
    order: VecDeque<(String, String, String)>,
    capacity: usize,
}

impl DedupCache {
    fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Returns true if the key was already present.
    fn check_and_insert(&mut self, message: &ChannelMessage) -> bool {
        let key = (
            message.sender_id.clone(),
            message.content.clone(),
            message.meta.timestamp.to_rfc3339(),
        );
        if self.seen.contains(&key) {
            return true;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(key.clone());
        self.order.push_back(key);
        false
    }

    fn clear(&mut self) {
        self.seen.clear();
        self.order.clear();
    }
}

pub struct AgentRuntime {
    persona: Persona,
    settings: PipelineSettings,
    gate: ResponseGate,
    assembler: ContextAssembler,
    planner: ResponsePlanner,
    toolbox: Toolbox,
    emitter: ResponseEmitter,
    backend: Arc<dyn GenerationBackend>,

    // Local derived state — all cleared on session reset.
    session: Option<SessionRef>,
    dedup: DedupCache,
    last_reply_at: Option<Instant>,
    trust: HashMap<ParticipantId, i32>,
    introduced: HashSet<ParticipantId>,
}

impl AgentRuntime {
    pub fn new(
        persona: Persona,
        store: Arc<dyn ContextStore>,
        backend: Arc<dyn GenerationBackend>,
        settings: PipelineSettings,
        outbound: mpsc::Sender<ChannelMessage>,
    ) -> Self {
        let gate = ResponseGate::new(&persona);
        let assembler = ContextAssembler::new(
            store.clone(),
            persona.id.clone(),
            settings.token_budget,
            settings.store_timeout,
        );
        let planner = ResponsePlanner::new(
            backend.clone(),
            settings.model.clone(),
            settings.max_tool_rounds,
            settings.llm_timeout,
        );
        let toolbox = Toolbox::new(
            store.clone(),
            backend.clone(),
            settings.model.clone(),
            persona.id.clone(),
            settings.store_timeout,
            settings.llm_timeout,
        );
        let emitter = ResponseEmitter::new(
            backend.clone(),
            store,
            settings.model.clone(),
            outbound,
            settings.store_timeout,
            settings.llm_timeout,
        );
        Self {
            dedup: DedupCache::new(settings.dedup_capacity),
            gate,
            assembler,
            planner,
            toolbox,
            emitter,
            backend,
            persona,
            settings,
            session: None,
            last_reply_at: None,
            trust: HashMap::new(),
            introduced: HashSet::new(),
        }
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn session(&self) -> Option<&SessionRef> {
        self.session.as_ref()
    }

    pub fn trust_toward(&self, counterpart: &ParticipantId) -> i32 {
        self.trust
            .get(counterpart)
            .copied()
            .unwrap_or(self.persona.initial_trust)
    }

    /// Consume inbound messages until the channel closes or shutdown fires.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<ChannelMessage>, shutdown: CancellationToken) {
        info!(agent = %self.persona.id, "agent runtime started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                message = inbound.recv() => match message {
                    Some(message) => self.handle(message).await,
                    None => break,
                },
            }
        }
        info!(agent = %self.persona.id, "agent runtime stopped");
    }

    /// Handle one inbound message end to end. Nothing in here may panic; the
    /// worst outcome for any single message is that this agent stays silent.
    pub async fn handle(&mut self, message: ChannelMessage) {
        if let Some(new_session) = protocol::session_push(&message) {
            self.apply_session(new_session);
            return;
        }

        match message.kind {
            MessageKind::Chat => self.handle_chat(message).await,
            MessageKind::Join => self.handle_join(message).await,
            MessageKind::System | MessageKind::Leave => {}
        }
    }

    fn apply_session(&mut self, new_session: &str) {
        let reset = self
            .session
            .as_ref()
            .map(|current| current.as_str() != new_session)
            .unwrap_or(false);
        if reset {
            // Full session reset: new conversation reference, and every piece
            // of locally derived state goes with the old one.
            info!(agent = %self.persona.id, session = new_session, "session reset");
            self.dedup.clear();
            self.last_reply_at = None;
            self.trust.clear();
            self.introduced.clear();
        } else if self.session.is_none() {
            info!(agent = %self.persona.id, session = new_session, "session assigned");
        }
        self.session = Some(SessionRef::new(new_session));
    }

    async fn handle_chat(&mut self, message: ChannelMessage) {
        let sender = ParticipantId::normalize(&message.sender_id);
        if sender == self.persona.id {
            return;
        }

        // Dedup before any recording — context recording is not idempotent.
        if self.dedup.check_and_insert(&message) {
            debug!(agent = %self.persona.id, "duplicate delivery discarded");
            return;
        }

        // Capture the reference now; a reset mid-pipeline must not be observed.
        let session = match self.session.clone() {
            Some(session) => session,
            None => {
                warn!(agent = %self.persona.id, "chat before session assignment, dropping");
                return;
            }
        };

        // Agent-to-agent throttling: require explicit address and honor the
        // cooldown since our own last reply. Unbounded agent reply loops are
        // a correctness failure, not a tuning concern.
        if message.is_from_agent() {
            if !self.gate.mentions(&message.content) {
                debug!(agent = %self.persona.id, from = %sender, "agent chatter without address, ignoring");
                return;
            }
            if let Some(last) = self.last_reply_at {
                let elapsed = last.elapsed();
                if elapsed < self.settings.agent_cooldown {
                    debug!(
                        agent = %self.persona.id,
                        remaining_ms = (self.settings.agent_cooldown - elapsed).as_millis() as u64,
                        "cooldown active, ignoring agent message"
                    );
                    return;
                }
            }
        }

        let digest = match self.assembler.prepare(&session, &message).await {
            Ok(digest) => digest,
            Err(e) => {
                // Fatal for this message only; the next one starts clean.
                warn!(agent = %self.persona.id, "context assembly failed: {}", e);
                return;
            }
        };

        let decision = self
            .gate
            .decide(
                &message,
                &digest,
                self.backend.as_ref(),
                &self.settings.model,
                self.settings.llm_timeout,
            )
            .await;
        info!(
            agent = %self.persona.id,
            from = %sender,
            respond = decision.should_respond,
            confidence = decision.confidence,
            reason = %decision.reason,
            "gate decision"
        );
        if !decision.should_respond {
            return;
        }

        let tracker = self
            .planner
            .plan(&session, &message, &digest, &self.toolbox)
            .await;

        let trust_score = self.trust_toward(&sender);
        let reply = self
            .emitter
            .generate_and_send(&self.persona, &session, &message, &digest, &tracker, trust_score)
            .await;

        if let Some(reply) = reply {
            self.last_reply_at = Some(Instant::now());
            if self.persona.tracks_trust() {
                let updated =
                    self.persona
                        .lexicon
                        .apply(trust_score, &message.content, &reply);
                if updated != trust_score {
                    debug!(
                        agent = %self.persona.id,
                        counterpart = %sender,
                        from = trust_score,
                        to = updated,
                        "trust updated"
                    );
                }
                self.trust.insert(sender, trust::clamp(updated));
            }
        }
    }

    /// Narrator personas greet each joining participant once.
    async fn handle_join(&mut self, message: ChannelMessage) {
        let intro = match self.persona.scene_intro.clone() {
            Some(intro) => intro,
            None => return,
        };
        let joiner = ParticipantId::normalize(&message.sender_id);
        if joiner == self.persona.id || self.introduced.contains(&joiner) {
            return;
        }
        let session = match self.session.clone() {
            Some(session) => session,
            None => return,
        };
        if self
            .emitter
            .publish(&self.persona, &session, &intro)
            .await
            .is_some()
        {
            self.introduced.insert(joiner);
        }
    }
}
