//! Display helpers for parleyctl output.

use owo_colors::OwoColorize;
use parley_core::chatbot::{Reply, Source, StatsSnapshot};
use parley_core::config::ResponseSettings;
use parley_core::VERSION;

const HR: &str = "────────────────────────────────────────";

/// key width
const KW: usize = 16;

pub fn print_banner(username: &str, remote: bool, colors: bool) {
    let title = format!("parley v{}", VERSION);
    if colors {
        println!("{}", title.bold().cyan());
        println!("{}", HR.dimmed());
    } else {
        println!("{}", title);
        println!("{}", HR);
    }
    println!("user: {}   remote: {}", username, if remote { "on" } else { "off" });
    println!("Type 'help' for commands, 'quit' to leave.");
    println!();
}

/// Colour for each reply source.
fn paint_tag(tag: &str, source: Option<Source>) -> String {
    match source {
        Some(Source::Local) => tag.green().to_string(),
        Some(Source::Math) => tag.bright_blue().to_string(),
        Some(Source::Cached) => tag.dimmed().to_string(),
        Some(Source::Ai) => tag.magenta().to_string(),
        None => tag.to_string(),
    }
}

/// Reply line as shown in the chat loop, bot symbol included.
pub fn format_reply(reply: &Reply, settings: &ResponseSettings) -> String {
    let rendered = reply.render(settings.show_response_source);
    if !settings.enable_colors || reply.source.is_none() || !settings.show_response_source {
        return format!("{}{}", settings.bot_symbol, rendered);
    }

    // Colour only the bracketed tag
    match rendered.find("] ") {
        Some(end) => {
            let (tag, text) = rendered.split_at(end + 1);
            format!(
                "{}{}{}",
                settings.bot_symbol.bold(),
                paint_tag(tag, reply.source),
                text
            )
        }
        None => format!("{}{}", settings.bot_symbol.bold(), rendered),
    }
}

pub fn print_reply(reply: &Reply, settings: &ResponseSettings) {
    println!("{}", format_reply(reply, settings));
}

fn print_kv(key: &str, value: &str, colors: bool) {
    if colors {
        println!("  {:width$} {}", key.dimmed(), value, width = KW);
    } else {
        println!("  {:width$} {}", key, value, width = KW);
    }
}

pub fn print_stats(stats: &StatsSnapshot, colors: bool) {
    println!();
    println!("Session statistics");
    println!("{}", HR);
    let c = &stats.counters;
    print_kv("total_queries", &c.total_queries.to_string(), colors);
    print_kv("local", &c.local_responses.to_string(), colors);
    print_kv("ai", &c.ai_responses.to_string(), colors);
    print_kv("cache_hits", &c.cache_hits.to_string(), colors);
    print_kv("errors", &c.errors.to_string(), colors);
    print_kv("uptime", &format!("{:.1}s", stats.uptime_secs), colors);
    print_kv("cache_size", &stats.cache_size.to_string(), colors);
    print_kv("history", &stats.history_length.to_string(), colors);
    print_kv("learned", &stats.learned_patterns.to_string(), colors);
    println!();
}

pub fn print_help() {
    println!();
    println!("Commands:");
    println!("  help              show this help");
    println!("  stats             session statistics");
    println!("  config            effective configuration");
    println!("  clear             forget the conversation history");
    println!("  train             teach a response (asks for pattern and response)");
    println!("  autolearn on|off  toggle learning from remote answers");
    println!("  quit | exit | bye leave the chat");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_settings() -> ResponseSettings {
        ResponseSettings {
            enable_colors: false,
            ..ResponseSettings::default()
        }
    }

    fn scratch_bot(dir: &tempfile::TempDir) -> parley_core::Chatbot {
        let config = parley_core::ChatConfig {
            storage: parley_core::config::StorageSettings::in_dir(dir.path()),
            ..Default::default()
        };
        parley_core::Chatbot::new(config, Some("tester"))
    }

    #[test]
    fn test_format_reply_plain() {
        let dir = tempfile::tempdir().unwrap();
        let reply = scratch_bot(&dir).respond("2 + 2");
        assert_eq!(format_reply(&reply, &plain_settings()), "Bot: [MATH] 2 + 2 = 4");
    }

    #[test]
    fn test_format_reply_without_source() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ResponseSettings {
            show_response_source: false,
            ..plain_settings()
        };
        let reply = scratch_bot(&dir).respond("5 * 5");
        assert_eq!(format_reply(&reply, &settings), "Bot: 5 * 5 = 25");
    }
}
