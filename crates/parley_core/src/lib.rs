//! Core resolution pipeline for Parley.
//!
//! Normalization, clause splitting, arithmetic, the response cache, the
//! pattern store and matcher, learning and deduplication, and the
//! orchestrator that chains them in front of a remote model.

pub mod cache;
pub mod chatbot;
pub mod config;
pub mod dedup;
pub mod error;
pub mod facts;
pub mod gemini;
pub mod history;
pub mod knowledge;
pub mod learner;
pub mod matcher;
pub mod math;
pub mod normalize;
pub mod pattern;
pub mod persist;
pub mod remote;
pub mod segment;
pub mod similarity;

pub use cache::ResponseCache;
pub use chatbot::{Chatbot, Reply, Source, Stats, StatsSnapshot};
pub use config::ChatConfig;
pub use dedup::DedupReport;
pub use error::{ChatError, Result};
pub use learner::LearnResult;
pub use matcher::{MatchKind, MatchResult, Matcher};
pub use normalize::{Normalizer, ParsedInput};
pub use pattern::{PatternEntry, PatternStore};
pub use remote::{CompletionClient, FakeCompletionClient, RemoteError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
