//! Per-message state machine for the Two Chairs exercise.
//!
//! Every state transition for a session runs under that session's lock:
//! the crisis latch, message append, round recomputation and the reply
//! that closes a round. Different sessions never wait on each other.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use twochairs_core::errors::GatewayError;
use twochairs_core::ids::{SessionId, UserId};
use twochairs_core::moderation::ModerationService;
use twochairs_core::provider::{GenerateOptions, LanguageModel};
use twochairs_core::roles::Role;
use twochairs_store::alerts::{AlertKind, AlertRepo, AlertRow};
use twochairs_store::messages::{MessageRepo, MessageRow};
use twochairs_store::sessions::{SessionRepo, SessionRow};
use twochairs_store::users::{UserRepo, UserRow};
use twochairs_store::{Database, StoreError};

use crate::config::{OrchestratorConfig, ToneMode};
use crate::cycle::Round;
use crate::error::EngineError;
use crate::prompts;
use crate::relevance;
use crate::response::{
    AwaitingResponse, CompletedResponse, LockedResponse, RoundResponse, SafetyPopup,
};
use crate::safety::SafetyGate;
use crate::suggestions::SuggestionGenerator;
use crate::tone;

pub const DEFAULT_MODE: &str = "two-chairs";

/// A user-authored message entering the pipeline.
#[derive(Clone, Debug)]
pub struct IncomingMessage {
    pub session_id: SessionId,
    pub role: Role,
    pub text: String,
}

impl IncomingMessage {
    /// Validate raw request fields. Text is trimmed.
    pub fn parse(session_id: &str, role: &str, text: &str) -> Result<Self, EngineError> {
        if session_id.trim().is_empty() {
            return Err(EngineError::Validation("sessionId is required".into()));
        }
        let role: Role = role
            .parse()
            .map_err(|_| EngineError::Validation("role must be 'self' or 'monster'".into()))?;
        let msg = Self {
            session_id: SessionId::from_raw(session_id.trim()),
            role,
            text: text.trim().to_string(),
        };
        msg.validate()?;
        Ok(msg)
    }

    fn validate(&self) -> Result<(), EngineError> {
        if !self.role.is_user_role() {
            return Err(EngineError::Validation("role must be 'self' or 'monster'".into()));
        }
        if self.text.trim().is_empty() {
            return Err(EngineError::Validation("text must not be empty".into()));
        }
        Ok(())
    }
}

pub struct RoundOrchestrator {
    sessions: SessionRepo,
    messages: MessageRepo,
    alerts: AlertRepo,
    users: UserRepo,
    reply_model: Arc<dyn LanguageModel>,
    tone_model: Arc<dyn LanguageModel>,
    gate: SafetyGate,
    suggestions: SuggestionGenerator,
    config: OrchestratorConfig,
    locks: DashMap<SessionId, Arc<Mutex<()>>>,
}

impl RoundOrchestrator {
    pub fn new(
        db: Database,
        reply_model: Arc<dyn LanguageModel>,
        tone_model: Arc<dyn LanguageModel>,
        moderation: Arc<dyn ModerationService>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            sessions: SessionRepo::new(db.clone()),
            messages: MessageRepo::new(db.clone()),
            alerts: AlertRepo::new(db.clone()),
            users: UserRepo::new(db),
            suggestions: SuggestionGenerator::new(reply_model.clone(), config.suggestion_timeout),
            gate: SafetyGate::new(moderation),
            reply_model,
            tone_model,
            config,
            locks: DashMap::new(),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    fn session_lock(&self, id: &SessionId) -> Arc<Mutex<()>> {
        self.locks.entry(id.clone()).or_default().clone()
    }

    fn load_session(&self, id: &SessionId) -> Result<SessionRow, EngineError> {
        self.sessions.get(id).map_err(|e| match e {
            StoreError::NotFound { .. } => EngineError::SessionNotFound(id.to_string()),
            other => EngineError::Store(other),
        })
    }

    fn locked(&self, notified_trusted_contact: Option<bool>) -> RoundResponse {
        RoundResponse::Locked(LockedResponse::new(&self.config.safety, notified_trusted_contact))
    }

    // ── Users & sessions ────────────────────────────────────────────

    pub fn create_user(
        &self,
        display_name: Option<&str>,
        trusted_contact: Option<&str>,
    ) -> Result<UserRow, EngineError> {
        let display_name = display_name.map(str::trim).filter(|s| !s.is_empty());
        let trusted_contact = trusted_contact.map(str::trim).filter(|s| !s.is_empty());
        Ok(self.users.create(display_name, trusted_contact)?)
    }

    /// Open a session. Without a user an anonymous one is created so the
    /// cross-session summary always has an owner.
    #[instrument(skip(self))]
    pub fn create_session(
        &self,
        user_id: Option<&UserId>,
        mode: Option<&str>,
    ) -> Result<SessionRow, EngineError> {
        let user_id = match user_id {
            Some(id) => {
                if !self.users.exists(id)? {
                    return Err(EngineError::Validation(format!("unknown userId: {id}")));
                }
                id.clone()
            }
            None => self.users.create(None, None)?.id,
        };
        let mode = mode.map(str::trim).filter(|m| !m.is_empty()).unwrap_or(DEFAULT_MODE);

        let session = self.sessions.create(Some(&user_id), mode)?;
        info!(session_id = %session.id, user_id = %user_id, mode, "session created");
        Ok(session)
    }

    pub fn get_session(&self, session_id: &SessionId) -> Result<SessionRow, EngineError> {
        self.load_session(session_id)
    }

    pub fn list_messages(&self, session_id: &SessionId) -> Result<Vec<MessageRow>, EngineError> {
        self.load_session(session_id)?;
        Ok(self.messages.list_for_session(session_id)?)
    }

    pub fn list_alerts(&self, session_id: &SessionId) -> Result<Vec<AlertRow>, EngineError> {
        self.load_session(session_id)?;
        Ok(self.alerts.list_for_session(session_id)?)
    }

    /// The in-progress round, replayed from the stored log.
    pub fn current_round(&self, session_id: &SessionId) -> Result<Round, EngineError> {
        self.load_session(session_id)?;
        Ok(Round::current(&self.messages.list_for_session(session_id)?))
    }

    // ── Message pipeline ────────────────────────────────────────────

    #[instrument(skip(self, message), fields(session_id = %message.session_id, role = %message.role))]
    pub async fn post_message(&self, message: IncomingMessage) -> Result<RoundResponse, EngineError> {
        message.validate()?;
        let IncomingMessage {
            session_id,
            role,
            text,
        } = message;
        let text = text.trim();

        self.load_session(&session_id)?;
        let lock = self.session_lock(&session_id);
        let _guard = lock.lock().await;

        let session = self.load_session(&session_id)?;
        if session.status.is_locked() {
            self.messages.append(&session_id, role, text)?;
            debug!(session_id = %session_id, "session is latched, message kept for audit");
            return Ok(self.locked(None));
        }

        if let Some(trigger) = self.gate.screen(session_id.as_str(), text).await {
            self.sessions
                .latch_crisis(&session_id, role, text, &trigger.alert_payload())?;
            warn!(session_id = %session_id, trigger = %trigger, "crisis detected, session locked");
            return Ok(self.locked(Some(false)));
        }

        let pending = Round::current(&self.messages.list_for_session(&session_id)?);
        if pending.is_complete() {
            return Err(EngineError::RoundPending);
        }

        self.messages.append(&session_id, role, text)?;
        let round = Round::current(&self.messages.list_for_session(&session_id)?);

        if !round.is_complete() {
            let suggestions = if role == Role::Monster && round.awaits_self_reply() {
                Some(
                    self.suggestions
                        .suggest_next_self_turns(session_id.as_str(), &round)
                        .await,
                )
            } else {
                None
            };
            return Ok(RoundResponse::Awaiting(AwaitingResponse::for_round(
                &round,
                suggestions,
            )));
        }

        let completed = self.complete_round(&session, &round).await?;
        Ok(RoundResponse::Completed(completed))
    }

    /// Re-run the reply for a round stuck at six messages after a failed
    /// reply. No user message is written.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn retry_round(&self, session_id: &SessionId) -> Result<RoundResponse, EngineError> {
        self.load_session(session_id)?;
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let session = self.load_session(session_id)?;
        if session.status.is_locked() {
            return Ok(self.locked(None));
        }

        let round = Round::current(&self.messages.list_for_session(session_id)?);
        if !round.is_complete() {
            return Err(EngineError::NothingToRetry);
        }

        info!(session_id = %session_id, "retrying pending round");
        let completed = self.complete_round(&session, &round).await?;
        Ok(RoundResponse::Completed(completed))
    }

    /// Close a complete round: judge tone, recall relevant context, generate
    /// and persist the angel reply, refresh summaries, and offer escalation
    /// when every self turn read as negative.
    async fn complete_round(
        &self,
        session: &SessionRow,
        round: &Round,
    ) -> Result<CompletedResponse, EngineError> {
        let session_id = &session.id;
        let self_texts = round.self_texts();

        let labels = match self.config.tone {
            ToneMode::Local => tone::classify_negatives_local(&self_texts),
            ToneMode::Model => {
                tone::classify_negatives(self.tone_model.as_ref(), session_id.as_str(), &self_texts)
                    .await
            }
        };

        let user = session.user_id.as_ref().and_then(|uid| match self.users.get(uid) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(session_id = %session_id, user_id = %uid, error = %e, "user lookup failed, skipping long-term context");
                None
            }
        });
        let user_summary = user.as_ref().map(|u| u.user_summary.as_str()).unwrap_or("");

        let round_text = round.joined_text();
        let use_session = self.recall(
            self.config.always_include_session_summary,
            &round_text,
            &session.summary,
        );
        let use_user = self.recall(self.config.always_include_user_summary, &round_text, user_summary);
        debug!(
            session_id = %session_id,
            session_summary = use_session,
            user_summary = use_user,
            "context recall decided"
        );

        let prompt = prompts::compose_reply_prompt(
            use_user.then_some(user_summary),
            use_session.then_some(session.summary.as_str()),
            round,
        );
        let options = GenerateOptions::with_temperature(prompts::REPLY_TEMPERATURE);
        let reply = match self
            .reply_model
            .generate(prompts::ANGEL_SYSTEM_PROMPT, &prompt, &options)
            .await
        {
            Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            Ok(_) => {
                error!(session_id = %session_id, "reply model returned empty text");
                return Err(GatewayError::MalformedResponse("empty reply".into()).into());
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "reply generation failed, round left pending");
                return Err(e.into());
            }
        };

        self.messages.append(session_id, Role::Angel, &reply)?;
        info!(session_id = %session_id, "round completed");

        if let Some(summary) = self.refresh_session_summary(session_id).await {
            if self.config.update_user_summary {
                if let Some(user) = &user {
                    self.refresh_user_summary(session_id, user, &summary).await;
                }
            }
        }

        let all_negative = labels.len() == 3 && labels.iter().all(|n| *n);
        let safety = if all_negative {
            if let Err(e) = self.alerts.record(
                session_id,
                AlertKind::CycleNegative,
                &json!({ "selfNegatives": labels }),
            ) {
                error!(session_id = %session_id, error = %e, "failed to record cycle-negative alert");
            }
            warn!(session_id = %session_id, "all self turns negative, offering escalation");
            Some(SafetyPopup::new(&self.config.safety))
        } else {
            None
        };

        Ok(CompletedResponse::new(reply, safety))
    }

    fn recall(&self, always: bool, round_text: &str, summary: &str) -> bool {
        if always {
            !summary.trim().is_empty()
        } else {
            relevance::is_relevant(round_text, summary, self.config.min_overlap)
        }
    }

    /// Best-effort. Returns the new summary when one was stored.
    async fn refresh_session_summary(&self, session_id: &SessionId) -> Option<String> {
        let history = match self.messages.list_for_session(session_id) {
            Ok(history) => history,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "summary skipped, history unavailable");
                return None;
            }
        };

        let prompt = prompts::session_summary_prompt(&history);
        let summary = self.summarize(session_id, "session", &prompt).await?;

        match self.sessions.update_summary(session_id, &summary) {
            Ok(()) => Some(summary),
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "failed to store session summary");
                None
            }
        }
    }

    async fn refresh_user_summary(&self, session_id: &SessionId, user: &UserRow, session_summary: &str) {
        let prompt = prompts::user_summary_prompt(&user.user_summary, session_summary);
        let Some(summary) = self.summarize(session_id, "user", &prompt).await else {
            return;
        };
        if let Err(e) = self.users.update_summary(&user.id, &summary) {
            warn!(session_id = %session_id, user_id = %user.id, error = %e, "failed to store user summary");
        }
    }

    /// One summary call bounded by `summary_timeout`. Every failure is
    /// logged and becomes `None`.
    async fn summarize(&self, session_id: &SessionId, scope: &'static str, prompt: &str) -> Option<String> {
        let options = GenerateOptions::with_temperature(prompts::SUMMARY_TEMPERATURE);
        let call = self.reply_model.generate("", prompt, &options);
        match tokio::time::timeout(self.config.summary_timeout, call).await {
            Ok(Ok(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Ok(Ok(_)) => {
                warn!(session_id = %session_id, scope, "empty summary ignored");
                None
            }
            Ok(Err(e)) => {
                warn!(session_id = %session_id, scope, error = %e, "summary generation failed");
                None
            }
            Err(_) => {
                warn!(
                    session_id = %session_id,
                    scope,
                    timeout_ms = self.config.summary_timeout.as_millis() as u64,
                    "summary generation timed out"
                );
                None
            }
        }
    }
}
