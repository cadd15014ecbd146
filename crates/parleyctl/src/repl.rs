//! REPL - Interactive chat loop
//!
//! Reads utterances from stdin line by line. A handful of words are
//! session commands; everything else goes to the chatbot.

use anyhow::Result;
use owo_colors::OwoColorize;
use parley_core::Chatbot;
use std::io::{self, BufRead, Write};

use crate::display;
use crate::spinner::Spinner;

/// What one input line asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Stats,
    Config,
    Clear,
    Quit,
    Train,
    /// `None` toggles
    AutoLearn(Option<bool>),
    Utterance(String),
    Empty,
}

pub fn parse_command(line: &str) -> ReplCommand {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ReplCommand::Empty;
    }

    let lower = trimmed.to_lowercase();
    let mut words = lower.split_whitespace();
    let head = words.next().unwrap_or_default();
    let arg = words.next();
    let extra = words.next().is_some();

    match (head, arg, extra) {
        ("quit" | "exit" | "bye", None, false) => ReplCommand::Quit,
        ("help", None, false) => ReplCommand::Help,
        ("stats", None, false) => ReplCommand::Stats,
        ("config", None, false) => ReplCommand::Config,
        ("clear", None, false) => ReplCommand::Clear,
        ("train", None, false) => ReplCommand::Train,
        ("autolearn", None, false) => ReplCommand::AutoLearn(None),
        ("autolearn", Some("on"), false) => ReplCommand::AutoLearn(Some(true)),
        ("autolearn", Some("off"), false) => ReplCommand::AutoLearn(Some(false)),
        _ => ReplCommand::Utterance(trimmed.to_string()),
    }
}

fn prompt(symbol: &str, colors: bool) {
    if colors {
        print!("{}", symbol.bold());
    } else {
        print!("{}", symbol);
    }
    let _ = io::stdout().flush();
}

/// Ask for one line; `None` on EOF or "cancel".
fn ask_line(lines: &mut impl Iterator<Item = io::Result<String>>, label: &str) -> Option<String> {
    print!("{}", label);
    let _ = io::stdout().flush();
    match lines.next() {
        Some(Ok(line)) => {
            let line = line.trim().to_string();
            if line.is_empty() || line.eq_ignore_ascii_case("cancel") {
                None
            } else {
                Some(line)
            }
        }
        _ => None,
    }
}

fn train(bot: &mut Chatbot, lines: &mut impl Iterator<Item = io::Result<String>>) {
    println!("Teach a response (empty line or 'cancel' aborts).");
    let Some(pattern) = ask_line(lines, "Pattern: ") else {
        println!("Training cancelled.");
        return;
    };
    let Some(response) = ask_line(lines, "Response: ") else {
        println!("Training cancelled.");
        return;
    };

    match bot.learn(&pattern, &response) {
        Ok(result) if result.learned => println!(
            "Learned ({}).",
            result.entry_name.as_deref().unwrap_or("pattern")
        ),
        Ok(result) => println!(
            "Nothing learned: {}",
            result.reason.as_deref().unwrap_or("no change")
        ),
        Err(e) => eprintln!("Failed to learn pattern: {}", e),
    }
}

/// Run the chat loop until quit or EOF.
pub fn run(bot: &mut Chatbot) -> Result<()> {
    let settings = bot.config().response.clone();
    let colors = settings.enable_colors;
    display::print_banner(bot.username(), bot.has_remote(), colors);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        prompt(&settings.prompt_symbol, colors);

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                eprintln!("Error reading input: {}", e);
                continue;
            }
            None => {
                println!();
                break;
            }
        };

        match parse_command(&line) {
            ReplCommand::Empty => continue,
            ReplCommand::Quit => {
                println!("Goodbye!");
                break;
            }
            ReplCommand::Help => display::print_help(),
            ReplCommand::Stats => display::print_stats(&bot.stats(), colors),
            ReplCommand::Config => match bot.config().to_toml() {
                Ok(text) => println!("{}", text),
                Err(e) => eprintln!("{}", e),
            },
            ReplCommand::Clear => {
                bot.clear_history();
                println!("Conversation history cleared.");
            }
            ReplCommand::Train => train(bot, &mut lines),
            ReplCommand::AutoLearn(setting) => {
                let enabled = setting.unwrap_or(!bot.auto_learning());
                bot.set_auto_learning(enabled);
                println!("Auto-learning {}.", if enabled { "on" } else { "off" });
            }
            ReplCommand::Utterance(text) => {
                let spinner = Spinner::start("thinking...", settings.show_typing_indicator);
                let reply = bot.respond(&text);
                spinner.stop();
                display::print_reply(&reply, &settings);
            }
        }
    }

    bot.shutdown();
    Ok(())
}
