//! Per-user fact store.
//!
//! Storage: `<data_dir>/users/<username>.json`

use crate::error::{ChatError, Result};
use crate::persist;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_USERNAME: &str = "default_user";

static NAME_INTRO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)my name is\s+([a-z]+)").expect("static regex"));

/// Stored user profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub facts: BTreeMap<String, String>,
    #[serde(default)]
    pub preferences: BTreeMap<String, String>,
}

impl UserProfile {
    fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            created_at: Some(Utc::now()),
            facts: BTreeMap::new(),
            preferences: BTreeMap::new(),
        }
    }
}

/// Override, else `$USER`, else [`DEFAULT_USERNAME`].
pub fn resolve_username(user_override: Option<&str>) -> String {
    user_override
        .map(str::to_string)
        .or_else(|| std::env::var("USER").ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_USERNAME.to_string())
}

/// The name in a "my name is <word>" introduction, if any.
pub fn extract_name(text: &str) -> Option<String> {
    NAME_INTRO
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub struct UserFacts {
    path: PathBuf,
    profile: UserProfile,
}

impl UserFacts {
    /// Load the profile for `username` from `users_dir`; a missing or
    /// unreadable file starts a fresh profile.
    pub fn load(users_dir: &Path, username: &str) -> Self {
        let file_stem: String = username
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        let path = users_dir.join(format!("{}.json", file_stem));

        let profile = match persist::read_json::<UserProfile>(&path) {
            Ok(Some(profile)) => profile,
            Ok(None) => UserProfile::new(username),
            Err(e) => {
                warn!("Failed to load profile for {}: {}", username, e);
                UserProfile::new(username)
            }
        };

        Self { path, profile }
    }

    pub fn username(&self) -> &str {
        &self.profile.username
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn get_fact(&self, key: &str) -> Option<&str> {
        self.profile.facts.get(key).map(String::as_str)
    }

    /// Set a fact and persist the profile.
    pub fn set_fact(&mut self, key: &str, value: &str) -> Result<()> {
        self.profile.facts.insert(key.to_string(), value.to_string());
        persist::write_json_atomic(&self.path, &self.profile)
            .map_err(|e| ChatError::Facts(format!("saving {}: {}", self.path.display(), e)))?;
        info!("Stored fact {} for {}", key, self.profile.username);
        Ok(())
    }

    /// `User Profile (<name>):\n- k: v\n...`, empty without facts.
    pub fn context_summary(&self) -> String {
        if self.profile.facts.is_empty() {
            return String::new();
        }
        let mut summary = format!("User Profile ({}):\n", self.profile.username);
        for (key, value) in &self.profile.facts {
            summary.push_str(&format!("- {}: {}\n", key, value));
        }
        summary
    }
}
