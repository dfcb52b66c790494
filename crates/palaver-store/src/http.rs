//! HTTP client for the relationship/context store

use crate::client::{ContextStore, DigestPayload, DigestQuery, StoreError, StoreResult};
use palaver_core::{ParticipantId, SessionRef};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

pub struct HttpContextStore {
    client: Client,
    base_url: String,
}

impl HttpContextStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: Client::new(),
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response, what: &str) -> StoreResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let error_text = response.text().await.unwrap_or_default();
        error!("store error on {}: {} {}", what, status, error_text);
        if status.as_u16() == 404 {
            Err(StoreError::ConversationNotFound(error_text))
        } else {
            Err(StoreError::RequestFailed(format!("{}: {}", status, error_text)))
        }
    }
}

#[async_trait::async_trait]
impl ContextStore for HttpContextStore {
    async fn conversation(&self, session: &SessionRef) -> StoreResult<()> {
        let response = self
            .client
            .get(self.url(&format!("/conversations/{}", session)))
            .send()
            .await?;
        Self::check(response, "conversation").await?;
        Ok(())
    }

    async fn ensure_participant(&self, id: &ParticipantId) -> StoreResult<()> {
        let response = self
            .client
            .put(self.url(&format!("/participants/{}", id)))
            .json(&serde_json::json!({}))
            .send()
            .await?;
        Self::check(response, "ensure_participant").await?;
        Ok(())
    }

    async fn record_utterance(
        &self,
        session: &SessionRef,
        speaker: &ParticipantId,
        content: &str,
    ) -> StoreResult<()> {
        let body = RecordBody {
            speaker_id: speaker.as_str(),
            content,
        };
        let response = self
            .client
            .post(self.url(&format!("/conversations/{}/utterances", session)))
            .json(&body)
            .send()
            .await?;
        Self::check(response, "record_utterance").await?;
        debug!("recorded utterance: session={} speaker={}", session, speaker);
        Ok(())
    }

    async fn context_digest(
        &self,
        session: &SessionRef,
        query: &DigestQuery,
    ) -> StoreResult<DigestPayload> {
        let response = self
            .client
            .post(self.url(&format!("/conversations/{}/digest", session)))
            .json(query)
            .send()
            .await?;
        let response = Self::check(response, "context_digest").await?;
        response
            .json::<DigestPayload>()
            .await
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))
    }

    async fn ask_relationship(
        &self,
        session: &SessionRef,
        target: &ParticipantId,
        question: &str,
        perspective: &ParticipantId,
    ) -> StoreResult<String> {
        let body = RelationshipBody {
            target: target.as_str(),
            question,
            perspective: perspective.as_str(),
        };
        let response = self
            .client
            .post(self.url(&format!("/conversations/{}/relationship", session)))
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response, "ask_relationship").await?;
        let answer: AnswerBody = response
            .json()
            .await
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;
        Ok(answer.answer)
    }

    async fn search_conversation(
        &self,
        session: &SessionRef,
        query: &str,
    ) -> StoreResult<Vec<String>> {
        let response = self
            .client
            .post(self.url(&format!("/conversations/{}/search", session)))
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await?;
        let response = Self::check(response, "search_conversation").await?;
        let value: Value = response
            .json()
            .await
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;
        Ok(normalize_matches(value))
    }
}

/// Normalize whatever shape the store returns — an array of matches, a single
/// match object, or a bare string — into an ordered sequence of match texts.
pub fn normalize_matches(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.into_iter().filter_map(match_text).collect(),
        other => match_text(other).into_iter().collect(),
    }
}

fn match_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Object(mut map) => map
            .remove("content")
            .or_else(|| map.remove("text"))
            .and_then(|v| v.as_str().map(String::from))
            .filter(|s| !s.trim().is_empty()),
        _ => None,
    }
}

#[derive(Serialize)]
struct RecordBody<'a> {
    speaker_id: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct RelationshipBody<'a> {
    target: &'a str,
    question: &'a str,
    perspective: &'a str,
}

#[derive(Deserialize)]
struct AnswerBody {
    answer: String,
}
