//! Parley configuration.
//!
//! Config file: `~/.config/parley/config.toml`. Every section and field is
//! optional; anything missing falls back to the defaults below.

use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable consulted when `[remote] api_key` is unset.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Remote model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// API key; falls back to $GEMINI_API_KEY
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Attempts per request (at least one is always made)
    pub max_retries: u32,
    /// Base delay between attempts; attempt N waits `retry_delay_secs * N`
    pub retry_delay_secs: f64,
    pub temperature: f32,
    pub max_response_length: u32,
    /// Ask the remote model when nothing local matches
    pub fallback_to_ai: bool,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            timeout_secs: 30,
            max_retries: 3,
            retry_delay_secs: 1.0,
            temperature: 0.7,
            max_response_length: 2000,
            fallback_to_ai: true,
        }
    }
}

impl RemoteSettings {
    /// Key from config, else from the environment.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

/// Local matching settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingSettings {
    /// Minimum confidence for a local answer to be used (0-1)
    #[serde(default = "default_pattern_threshold")]
    pub pattern_match_threshold: f64,

    #[serde(default = "default_true")]
    pub use_fuzzy_matching: bool,

    /// Partial-ratio threshold for fuzzy fallback (0-100)
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_match_threshold: u32,

    /// Combined tag score needed by built-in entries (0-1)
    #[serde(default = "default_semantic_threshold")]
    pub semantic_threshold: f64,

    /// Combined tag score needed by learned entries (0-1)
    #[serde(default = "default_learned_semantic_threshold")]
    pub learned_semantic_threshold: f64,

    /// Tag ratio for a knowledge hit (0-100)
    #[serde(default = "default_knowledge_threshold")]
    pub knowledge_threshold: u32,

    /// Partial ratio needed before a partial knowledge hit is considered (0-100)
    #[serde(default = "default_knowledge_partial_threshold")]
    pub knowledge_partial_threshold: u32,

    /// Upper bound on the fuzzy threshold applied to learned entries (0-100)
    #[serde(default = "default_learned_fuzzy_cap")]
    pub learned_fuzzy_cap: u32,

    /// Token-sort similarity at which two learned entries are the same (0-1)
    #[serde(default = "default_dedup_similarity")]
    pub dedup_similarity: f64,

    /// Try local resolution before the remote model
    #[serde(default = "default_true")]
    pub enable_local_priority: bool,

    /// Turn remote answers into learned patterns
    #[serde(default)]
    pub enable_auto_learning: bool,
}

fn default_true() -> bool {
    true
}

fn default_pattern_threshold() -> f64 {
    0.7
}

fn default_fuzzy_threshold() -> u32 {
    80
}

fn default_semantic_threshold() -> f64 {
    0.7
}

fn default_learned_semantic_threshold() -> f64 {
    0.6
}

fn default_knowledge_threshold() -> u32 {
    85
}

fn default_knowledge_partial_threshold() -> u32 {
    95
}

fn default_learned_fuzzy_cap() -> u32 {
    60
}

fn default_dedup_similarity() -> f64 {
    0.9
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            pattern_match_threshold: default_pattern_threshold(),
            use_fuzzy_matching: true,
            fuzzy_match_threshold: default_fuzzy_threshold(),
            semantic_threshold: default_semantic_threshold(),
            learned_semantic_threshold: default_learned_semantic_threshold(),
            knowledge_threshold: default_knowledge_threshold(),
            knowledge_partial_threshold: default_knowledge_partial_threshold(),
            learned_fuzzy_cap: default_learned_fuzzy_cap(),
            dedup_similarity: default_dedup_similarity(),
            enable_local_priority: true,
            enable_auto_learning: false,
        }
    }
}

/// Reply presentation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseSettings {
    /// Prefix replies with `[SOURCE:detail]`
    pub show_response_source: bool,
    pub show_typing_indicator: bool,
    pub enable_colors: bool,
    pub prompt_symbol: String,
    pub bot_symbol: String,
}

impl Default for ResponseSettings {
    fn default() -> Self {
        Self {
            show_response_source: true,
            show_typing_indicator: true,
            enable_colors: true,
            prompt_symbol: "You: ".to_string(),
            bot_symbol: "Bot: ".to_string(),
        }
    }
}

/// Conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationSettings {
    pub max_history_length: usize,
    /// Exchanges handed to the remote model as context
    pub context_window_size: usize,
    pub enable_context: bool,
    pub clear_history_on_restart: bool,
    pub save_conversations: bool,
    pub log_conversations: bool,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            max_history_length: 50,
            context_window_size: 10,
            enable_context: true,
            clear_history_on_restart: false,
            save_conversations: true,
            log_conversations: true,
        }
    }
}

/// Response cache
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub max_size: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 3600,
            max_size: 1000,
        }
    }
}

/// Input normalization and validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    pub min_length: usize,
    pub max_length: usize,
    pub strip_whitespace: bool,
    pub convert_to_lowercase: bool,
    pub remove_special_chars: bool,
    /// Reject script-injection style input
    pub sanitize: bool,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            min_length: 1,
            max_length: 1000,
            strip_whitespace: true,
            convert_to_lowercase: true,
            remove_special_chars: false,
            sanitize: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// trace, debug, info, warn or error
    pub level: String,
    pub log_to_file: bool,
    /// Defaults to `<data_dir>/logs/parley.log`
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_file: None,
        }
    }
}

/// Where records live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub data_dir: PathBuf,
    pub patterns_file: Option<PathBuf>,
    pub knowledge_file: Option<PathBuf>,
    pub conversation_file: Option<PathBuf>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            patterns_file: None,
            knowledge_file: None,
            conversation_file: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("parley")
}

impl StorageSettings {
    /// Storage rooted at `dir` with every record at its default name.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn patterns_path(&self) -> PathBuf {
        self.patterns_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("patterns.json"))
    }

    pub fn knowledge_path(&self) -> PathBuf {
        self.knowledge_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("knowledge.json"))
    }

    pub fn conversation_path(&self) -> PathBuf {
        self.conversation_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("conversation_history.json"))
    }

    pub fn users_dir(&self) -> PathBuf {
        self.data_dir.join("users")
    }
}

/// Request throttling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    pub rate_limit_enabled: bool,
    pub max_requests_per_minute: u32,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            rate_limit_enabled: true,
            max_requests_per_minute: 60,
        }
    }
}

/// Failure handling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorSettings {
    pub default_error_response: String,
    /// Show raw error text instead of the default response
    pub verbose_errors: bool,
    /// Keep running local-only when the remote model cannot be initialized
    pub graceful_degradation: bool,
}

impl Default for ErrorSettings {
    fn default() -> Self {
        Self {
            default_error_response:
                "I'm sorry, I couldn't process that. Could you rephrase?".to_string(),
            verbose_errors: false,
            graceful_degradation: true,
        }
    }
}

/// Main Parley configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default)]
    pub remote: RemoteSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub response: ResponseSettings,
    #[serde(default)]
    pub conversation: ConversationSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub input: InputSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub security: SecuritySettings,
    #[serde(default)]
    pub errors: ErrorSettings,
}

impl ChatConfig {
    /// Default user config path: ~/.config/parley/config.toml
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("parley").join("config.toml"))
    }

    /// Load configuration
    ///
    /// Priority:
    /// 1. Explicit path (must exist)
    /// 2. User config (~/.config/parley/config.toml)
    /// 3. Defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }

        if let Some(user_path) = Self::user_config_path() {
            if user_path.exists() {
                return Self::load_from_path(&user_path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ChatError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        toml::from_str(&contents)
            .map_err(|e| ChatError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Save configuration to the user config file
    pub fn save(&self) -> Result<()> {
        let path = Self::user_config_path()
            .ok_or_else(|| ChatError::Config("Cannot determine config directory".to_string()))?;
        self.save_to_path(&path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let toml_string = self.to_toml()?;
        crate::persist::write_atomic(path, toml_string.as_bytes())
    }

    /// Effective configuration rendered as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ChatError::Config(format!("Failed to serialize configuration: {}", e)))
    }

    /// Check value ranges. Called once at startup.
    pub fn validate(&self) -> Result<()> {
        let m = &self.matching;
        check_unit("pattern_match_threshold", m.pattern_match_threshold)?;
        check_unit("semantic_threshold", m.semantic_threshold)?;
        check_unit("learned_semantic_threshold", m.learned_semantic_threshold)?;
        check_unit("dedup_similarity", m.dedup_similarity)?;
        for (name, value) in [
            ("fuzzy_match_threshold", m.fuzzy_match_threshold),
            ("knowledge_threshold", m.knowledge_threshold),
            ("knowledge_partial_threshold", m.knowledge_partial_threshold),
            ("learned_fuzzy_cap", m.learned_fuzzy_cap),
        ] {
            if value > 100 {
                return Err(ChatError::Config(format!("{} must be 0-100, got {}", name, value)));
            }
        }

        if !(0.0..=2.0).contains(&self.remote.temperature) {
            return Err(ChatError::Config(format!(
                "temperature must be 0-2, got {}",
                self.remote.temperature
            )));
        }
        if self.remote.retry_delay_secs < 0.0 || !self.remote.retry_delay_secs.is_finite() {
            return Err(ChatError::Config("retry_delay_secs must be >= 0".to_string()));
        }
        if self.conversation.max_history_length == 0 {
            return Err(ChatError::Config("max_history_length must be positive".to_string()));
        }
        if self.cache.ttl_secs == 0 {
            return Err(ChatError::Config("cache ttl_secs must be positive".to_string()));
        }
        if self.input.min_length > self.input.max_length {
            return Err(ChatError::Config(format!(
                "input min_length {} exceeds max_length {}",
                self.input.min_length, self.input.max_length
            )));
        }
        Ok(())
    }

    /// Log file location, defaulting under the data directory.
    pub fn log_file_path(&self) -> PathBuf {
        self.logging
            .log_file
            .clone()
            .unwrap_or_else(|| self.storage.data_dir.join("logs").join("parley.log"))
    }
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ChatError::Config(format!("{} must be 0-1, got {}", name, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ChatConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.matching.pattern_match_threshold, 0.7);
        assert_eq!(config.matching.fuzzy_match_threshold, 80);
        assert_eq!(config.cache.max_size, 1000);
        assert!(!config.matching.enable_auto_learning);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml = r#"
            [matching]
            fuzzy_match_threshold = 70

            [cache]
            enabled = false
        "#;
        let config: ChatConfig = toml::from_str(toml).unwrap();

        assert_eq!(config.matching.fuzzy_match_threshold, 70);
        assert_eq!(config.matching.semantic_threshold, 0.7);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.conversation.max_history_length, 50);
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = ChatConfig::default();
        config.matching.pattern_match_threshold = 1.5;
        assert!(matches!(config.validate(), Err(ChatError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_history() {
        let mut config = ChatConfig::default();
        config.conversation.max_history_length = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_input_bounds() {
        let mut config = ChatConfig::default();
        config.input.min_length = 10;
        config.input.max_length = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_storage_paths() {
        let storage = StorageSettings::in_dir("/tmp/parley-test");
        assert_eq!(
            storage.patterns_path(),
            PathBuf::from("/tmp/parley-test/patterns.json")
        );
        assert_eq!(
            storage.users_dir(),
            PathBuf::from("/tmp/parley-test/users")
        );
    }

    #[test]
    fn test_toml_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = ChatConfig::default();
        config.matching.enable_auto_learning = true;
        config.remote.model = "gemini-test".to_string();
        config.save_to_path(&path).unwrap();

        let loaded = ChatConfig::load(Some(&path)).unwrap();
        assert!(loaded.matching.enable_auto_learning);
        assert_eq!(loaded.remote.model, "gemini-test");
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ChatConfig::load(Some(&dir.path().join("nope.toml")));
        assert!(result.is_err());
    }
}
