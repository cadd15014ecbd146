//! Remote fallback through the orchestrator using a scripted client.

use parley_core::config::{ChatConfig, StorageSettings};
use parley_core::remote::{FakeCompletionClient, RemoteError};
use parley_core::{Chatbot, Source};
use serde_json::json;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

fn remote_bot(client: Arc<FakeCompletionClient>, auto_learn: bool) -> (Chatbot, TempDir) {
    let dir = tempdir().unwrap();
    let mut config = ChatConfig::default();
    config.storage = StorageSettings::in_dir(dir.path());
    config.remote.retry_delay_secs = 0.0;
    config.remote.max_retries = 2;
    config.matching.enable_auto_learning = auto_learn;

    let mut bot = Chatbot::new(config, Some("tester"));
    bot.attach_remote(Box::new(client));
    bot.initialize().unwrap();
    (bot, dir)
}

#[test]
fn test_remote_answer_is_cached() {
    let client = Arc::new(FakeCompletionClient::always("Mount Everest is the tallest."));
    let (mut bot, _dir) = remote_bot(client.clone(), false);

    let reply = bot.respond("tallest mountain on earth");
    assert_eq!(reply.source, Some(Source::Ai));
    assert_eq!(reply.text, "Mount Everest is the tallest.");

    let again = bot.respond("tallest mountain on earth");
    assert_eq!(again.source, Some(Source::Cached));
    assert_eq!(client.call_count(), 1);

    let stats = bot.stats().counters;
    assert_eq!(stats.ai_responses, 1);
    assert_eq!(stats.cache_hits, 1);
}

#[test]
fn test_error_like_answer_is_not_cached() {
    let client = Arc::new(FakeCompletionClient::always("Sorry, I am unable to help."));
    let (mut bot, _dir) = remote_bot(client.clone(), true);

    bot.respond("tallest mountain on earth");
    bot.respond("tallest mountain on earth");
    assert_eq!(client.call_count(), 2);
    assert_eq!(bot.stats().learned_patterns, 0);
}

#[test]
fn test_auto_learning_makes_answer_local() {
    let client = Arc::new(FakeCompletionClient::always("Canberra is the capital."));
    let (mut bot, _dir) = remote_bot(client.clone(), true);

    bot.respond("capital of australia");
    assert_eq!(bot.stats().learned_patterns, 1);

    // Different wording, same tags: answered by the learned entry
    let reply = bot.respond("australia capital please");
    assert_eq!(reply.source, Some(Source::Local));
    assert_eq!(reply.text, "Canberra is the capital.");
    assert_eq!(client.call_count(), 1);
}

#[test]
fn test_transport_errors_become_friendly_messages() {
    let client = Arc::new(FakeCompletionClient::always_error(RemoteError::RateLimited(
        "429".into(),
    )));
    let (mut bot, _dir) = remote_bot(client.clone(), false);

    let reply = bot.respond("tallest mountain on earth");
    assert_eq!(reply.source, Some(Source::Ai));
    assert!(reply.text.contains("API limit"));
    assert_eq!(client.call_count(), 2);
    assert_eq!(bot.stats().counters.errors, 0);
    assert_eq!(bot.stats().cache_size, 0);
}

#[test]
fn test_context_and_user_facts_in_prompt() {
    let client = Arc::new(FakeCompletionClient::new(vec![
        Ok(json!({"text": "Nice to meet you, Ada!"})),
        Ok(json!({"text": "Your name is Ada."})),
    ]));
    let (mut bot, dir) = remote_bot(client.clone(), false);

    bot.respond("my name is Ada");
    assert_eq!(bot.facts().get_fact("name"), Some("Ada"));
    assert!(dir.path().join("users").join("tester.json").exists());

    bot.respond("remind me who I am");
    let prompt = client.last_prompt().unwrap();
    assert!(prompt.starts_with("Context:\nUser: my name is Ada\nBot: Nice to meet you, Ada!"));
    assert!(prompt.contains("System Note: User Profile (tester):\n- name: Ada"));
    assert!(prompt.ends_with("User: remind me who I am"));
}

#[test]
fn test_local_match_skips_remote() {
    let client = Arc::new(FakeCompletionClient::always("unused"));
    let (mut bot, _dir) = remote_bot(client.clone(), false);

    assert_eq!(bot.respond("hey").source, Some(Source::Local));
    assert_eq!(client.call_count(), 0);
}

#[test]
fn test_profile_write_failure_keeps_answer() {
    let dir = tempdir().unwrap();
    // A plain file where the users directory should be
    std::fs::write(dir.path().join("users"), "not a directory").unwrap();

    let mut config = ChatConfig::default();
    config.storage = StorageSettings::in_dir(dir.path());
    config.remote.retry_delay_secs = 0.0;
    config.matching.enable_auto_learning = false;
    let client = Arc::new(FakeCompletionClient::always("Nice to meet you, Sam."));
    let mut bot = Chatbot::new(config, Some("tester"));
    bot.attach_remote(Box::new(client.clone()));
    bot.initialize().unwrap();

    let reply = bot.respond("my name is Sam");
    assert_eq!(reply.source, Some(Source::Ai));
    assert_eq!(reply.text, "Nice to meet you, Sam.");
    assert_eq!(bot.stats().counters.errors, 0);
    assert_eq!(bot.history().len(), 1);
}

#[test]
fn test_prompt_keeps_last_context_lines() {
    let dir = tempdir().unwrap();
    let mut config = ChatConfig::default();
    config.storage = StorageSettings::in_dir(dir.path());
    config.remote.retry_delay_secs = 0.0;
    config.matching.enable_auto_learning = false;
    config.conversation.context_window_size = 2;
    let client = Arc::new(FakeCompletionClient::new(vec![
        Ok(json!("Answer one.")),
        Ok(json!("Answer two.")),
        Ok(json!("Answer three.")),
    ]));
    let mut bot = Chatbot::new(config, Some("tester"));
    bot.attach_remote(Box::new(client.clone()));
    bot.initialize().unwrap();

    bot.respond("first question here");
    bot.respond("second question here");
    bot.respond("third question here");

    let prompt = client.last_prompt().unwrap();
    assert_eq!(
        prompt,
        "Context:\nUser: second question here\nBot: Answer two.\n\nUser: third question here"
    );
}
