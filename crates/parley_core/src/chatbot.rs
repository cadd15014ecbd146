//! Orchestrator: one utterance in, one reply out.
//!
//! Resolution order for a valid utterance:
//! cache → arithmetic → all-clauses-local → whole-utterance local → remote.
//! Every stage runs inside a single recovery boundary; faults become the
//! configured default reply and bump the `errors` counter.

use crate::cache::ResponseCache;
use crate::config::ChatConfig;
use crate::error::Result;
use crate::facts::{self, UserFacts};
use crate::gemini::GeminiClient;
use crate::history::ConversationLog;
use crate::knowledge::KnowledgeBase;
use crate::learner::{self, LearnResult};
use crate::math;
use crate::matcher::{MatchResult, Matcher};
use crate::normalize::{Normalizer, ParsedInput};
use crate::pattern::PatternStore;
use crate::remote::{self, CompletionClient, RemoteAssistant};
use crate::segment;
use serde::Serialize;
use std::fmt;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Replies containing any of these are neither cached nor learned.
pub const ERROR_KEYWORDS: &[&str] = &[
    "error",
    "sorry",
    "unable",
    "cannot",
    "failed",
    "404",
    "503",
    "api limit",
    "server busy",
    "config error",
    "quota",
    "resource exhausted",
];

/// Auto-learned replies must be longer than this.
const MIN_LEARNED_REPLY_LEN: usize = 5;

pub fn looks_like_error(text: &str) -> bool {
    let lower = text.to_lowercase();
    ERROR_KEYWORDS.iter().any(|k| lower.contains(k))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Local,
    Ai,
    Cached,
    Math,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Source::Local => "LOCAL",
            Source::Ai => "AI",
            Source::Cached => "CACHED",
            Source::Math => "MATH",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    /// `None` for notices (invalid input, default response)
    pub source: Option<Source>,
    /// Match kind or "multi" for local replies
    pub detail: Option<String>,
}

impl Reply {
    fn new(text: impl Into<String>, source: Source, detail: Option<String>) -> Self {
        Self {
            text: text.into(),
            source: Some(source),
            detail,
        }
    }

    fn notice(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: None,
            detail: None,
        }
    }

    /// `[SOURCE:detail] text` when `show_source`, else the bare text.
    pub fn render(&self, show_source: bool) -> String {
        match (&self.source, show_source) {
            (Some(source), true) => match &self.detail {
                Some(detail) => format!("[{}:{}] {}", source, detail, self.text),
                None => format!("[{}] {}", source, self.text),
            },
            _ => self.text.clone(),
        }
    }
}

/// Session counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total_queries: u64,
    pub local_responses: u64,
    pub ai_responses: u64,
    pub cache_hits: u64,
    pub errors: u64,
}

/// Counters plus derived session figures
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    #[serde(flatten)]
    pub counters: Stats,
    pub uptime_secs: f64,
    pub cache_size: usize,
    pub history_length: usize,
    pub learned_patterns: usize,
}

pub struct Chatbot {
    config: ChatConfig,
    normalizer: Normalizer,
    cache: ResponseCache,
    matcher: Matcher,
    history: ConversationLog,
    facts: UserFacts,
    remote: Option<RemoteAssistant>,
    stats: Stats,
    started: Instant,
}

impl Chatbot {
    /// Build every component from configuration. Record files that are
    /// missing or unreadable fall back to defaults.
    pub fn new(config: ChatConfig, user_override: Option<&str>) -> Self {
        let storage = &config.storage;
        let store = PatternStore::load(&storage.patterns_path());
        let knowledge = KnowledgeBase::load(&storage.knowledge_path());
        let matcher = Matcher::new(store, knowledge, config.matching.clone());
        let history = ConversationLog::new(storage.conversation_path(), &config.conversation);
        let username = facts::resolve_username(user_override);
        let facts = UserFacts::load(&storage.users_dir(), &username);

        Self {
            normalizer: Normalizer::new(config.input.clone()),
            cache: ResponseCache::from_settings(&config.cache),
            matcher,
            history,
            facts,
            remote: None,
            stats: Stats::default(),
            started: Instant::now(),
            config,
        }
    }

    /// Validate configuration, restore history and attach the remote
    /// assistant when an API key is available.
    pub fn initialize(&mut self) -> Result<()> {
        info!("Initializing chatbot...");
        self.config.validate()?;

        if !self.config.conversation.clear_history_on_restart {
            self.history.load();
        }

        if self.remote.is_none() && self.config.remote.fallback_to_ai {
            match self.config.remote.resolved_api_key() {
                Some(key) => match GeminiClient::new(&self.config.remote, key) {
                    Ok(client) => {
                        self.attach_remote(Box::new(client));
                        info!("Remote model {} attached", self.config.remote.model);
                    }
                    Err(e) => {
                        warn!("Remote initialization failed: {}", e);
                        if !self.config.errors.graceful_degradation {
                            return Err(e);
                        }
                    }
                },
                None => info!("No API key configured, running local-only"),
            }
        }

        info!("Chatbot initialized for user: {}", self.facts.username());
        Ok(())
    }

    pub fn attach_remote(&mut self, client: Box<dyn CompletionClient>) {
        self.remote = Some(RemoteAssistant::new(
            client,
            self.config.remote.clone(),
            self.config.security.clone(),
        ));
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn username(&self) -> &str {
        self.facts.username()
    }

    pub fn facts(&self) -> &UserFacts {
        &self.facts
    }

    pub fn history(&self) -> &ConversationLog {
        &self.history
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Rendered reply text for one utterance.
    pub fn process_input(&mut self, raw: &str) -> String {
        let show_source = self.config.response.show_response_source;
        self.respond(raw).render(show_source)
    }

    /// Resolve one utterance. Never fails: faults become the default reply.
    pub fn respond(&mut self, raw: &str) -> Reply {
        if let Err(reason) = self.normalizer.validate(raw) {
            warn!("Invalid input: {}", reason);
            return Reply::notice(format!("Invalid input: {}", reason));
        }

        self.stats.total_queries += 1;
        let started = Instant::now();

        match self.resolve(raw) {
            Ok(reply) => {
                debug!(
                    "Resolved via {:?} in {:?}",
                    reply.source,
                    started.elapsed()
                );
                reply
            }
            Err(e) => {
                self.stats.errors += 1;
                error!(kind = e.kind(), "Error processing input {:?}: {}", raw, e);
                if self.config.errors.verbose_errors {
                    Reply::notice(format!("Error: {}", e))
                } else {
                    Reply::notice(self.config.errors.default_error_response.clone())
                }
            }
        }
    }

    fn resolve(&mut self, raw: &str) -> Result<Reply> {
        let parsed = self.normalizer.parse(raw);
        debug!("Parsed input: {:?}", parsed.normalized);

        if let Some(hit) = self.cache.get(&parsed.normalized) {
            self.stats.cache_hits += 1;
            debug!("Cache hit");
            return Ok(Reply::new(hit, Source::Cached, None));
        }

        if let Some(reply) = self.try_math(raw, &parsed.normalized) {
            return Ok(reply);
        }

        if self.config.matching.enable_local_priority {
            if let Some(reply) = self.try_all_clauses(raw) {
                return Ok(reply);
            }
            if let Some(reply) = self.try_local(raw, &parsed) {
                return Ok(reply);
            }
        }

        if self.config.remote.fallback_to_ai && self.remote.is_some() {
            return self.ask_remote(raw, &parsed.normalized);
        }

        debug!("No resolution for {:?}", parsed.normalized);
        Ok(Reply::notice(self.config.errors.default_error_response.clone()))
    }

    fn try_math(&mut self, raw: &str, key: &str) -> Option<Reply> {
        let expr = math::extract(raw).or_else(|| {
            let trimmed = raw.trim();
            math::is_expression(trimmed).then(|| trimmed.to_string())
        })?;
        let (_, formatted) = math::evaluate(&expr)?;

        let text = format!("{} = {}", expr, formatted);
        self.stats.local_responses += 1;
        self.cache.set(key, &text);
        self.history.append(raw, &text, "MATH");
        info!("Evaluated expression {}", expr);
        Some(Reply::new(text, Source::Math, None))
    }

    /// A local match that clears the confidence gate, with its response.
    fn accepted(&self, result: MatchResult) -> Option<(MatchResult, String)> {
        if !result.matched {
            return None;
        }
        let mut threshold = self.config.matching.pattern_match_threshold;
        if crate::pattern::is_learned_name(&result.source) {
            threshold = threshold.min(self.config.matching.learned_semantic_threshold);
        }
        if result.confidence < threshold {
            return None;
        }
        let response = result.response.clone()?;
        Some((result, response))
    }

    /// Answer a multi-clause utterance only if every clause resolves locally.
    fn try_all_clauses(&mut self, raw: &str) -> Option<Reply> {
        let clauses = segment::split(raw);
        if clauses.len() < 2 {
            return None;
        }

        let mut parts = Vec::with_capacity(clauses.len());
        for clause in &clauses {
            let parsed = self.normalizer.parse(clause);
            let result = self.matcher.match_input(&parsed);
            let (_, response) = self.accepted(result)?;
            parts.push(response);
        }

        let text = parts.join(" ");
        self.stats.local_responses += 1;
        self.history.append(raw, &text, "LOCAL");
        info!("Multi-clause local match: {} clauses", clauses.len());
        Some(Reply::new(text, Source::Local, Some("multi".to_string())))
    }

    fn try_local(&mut self, raw: &str, parsed: &ParsedInput) -> Option<Reply> {
        let result = self.matcher.match_input(parsed);
        let (result, response) = self.accepted(result)?;

        self.stats.local_responses += 1;
        self.cache.set(&parsed.normalized, &response);
        self.history.append(raw, &response, "LOCAL");
        info!(
            "Local match: {} (confidence: {:.2})",
            result.source, result.confidence
        );
        Some(Reply::new(response, Source::Local, Some(result.kind.to_string())))
    }

    fn ask_remote(&mut self, raw: &str, key: &str) -> Result<Reply> {
        self.stats.ai_responses += 1;

        let mut context = if self.config.conversation.enable_context {
            self.history.context(self.config.conversation.context_window_size)
        } else {
            Vec::new()
        };
        let summary = self.facts.context_summary();
        if !summary.is_empty() {
            context.push(format!("System Note: {}", summary));
        }

        let Some(assistant) = self.remote.as_mut() else {
            return Ok(Reply::notice(self.config.errors.default_error_response.clone()));
        };
        let window = self.config.conversation.context_window_size;

        let text = match assistant.generate(raw, &context, window) {
            Ok(text) => {
                let is_error = looks_like_error(&text);
                if !is_error {
                    self.cache.set(key, &text);
                }
                if self.config.matching.enable_auto_learning
                    && !is_error
                    && text.chars().count() > MIN_LEARNED_REPLY_LEN
                {
                    match learner::learn(&mut self.matcher, raw, &text) {
                        Ok(result) if result.learned => info!("Auto-learned new pattern"),
                        Ok(result) => debug!("Auto-learn skipped: {:?}", result.reason),
                        Err(e) => warn!("Auto-learn failed: {}", e),
                    }
                }
                if let Some(name) = facts::extract_name(raw) {
                    match self.facts.set_fact("name", &name) {
                        Ok(()) => info!("Learned user name: {}", name),
                        Err(e) => warn!("Failed to save user name: {}", e),
                    }
                }
                text
            }
            Err(e) => remote::friendly_message(&e, &self.config.errors),
        };

        self.history.append(raw, &text, "AI");
        info!("AI response generated");
        Ok(Reply::new(text, Source::Ai, None))
    }

    /// Manual training. Failures are logged and reported as `false`.
    pub fn learn_pattern(&mut self, pattern: &str, response: &str) -> bool {
        match self.learn(pattern, response) {
            Ok(result) => result.learned,
            Err(e) => {
                error!("Failed to learn pattern: {}", e);
                false
            }
        }
    }

    pub fn learn(&mut self, pattern: &str, response: &str) -> Result<LearnResult> {
        learner::learn(&mut self.matcher, pattern, response)
    }

    pub fn set_auto_learning(&mut self, enabled: bool) {
        self.config.matching.enable_auto_learning = enabled;
        info!("Auto-learning {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn auto_learning(&self) -> bool {
        self.config.matching.enable_auto_learning
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Re-read pattern and knowledge records.
    pub fn reload_patterns(&mut self) {
        self.matcher.reload();
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            counters: self.stats.clone(),
            uptime_secs: self.started.elapsed().as_secs_f64(),
            cache_size: self.cache.len(),
            history_length: self.history.len(),
            learned_patterns: self.matcher.store().learned_count(),
        }
    }

    /// Flush history and log the session summary.
    pub fn shutdown(&mut self) {
        info!("Shutting down chatbot...");
        if self.config.conversation.save_conversations {
            if let Err(e) = self.history.save() {
                warn!("Error saving history: {}", e);
            }
        }
        let stats = self.stats();
        info!(
            total_queries = stats.counters.total_queries,
            local = stats.counters.local_responses,
            ai = stats.counters.ai_responses,
            cache_hits = stats.counters.cache_hits,
            errors = stats.counters.errors,
            "Session stats"
        );
        info!("Chatbot shutdown complete");
    }
}
