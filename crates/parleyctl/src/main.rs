//! Parley Control - command-line front end for the Parley chatbot
//!
//! With no subcommand it starts an interactive chat.

use anyhow::{Context, Result};
use clap::Parser;
use parley_core::{dedup, ChatConfig, Chatbot};

use parleyctl::cli::{Cli, Commands};
use parleyctl::{display, logging, repl};

fn build_bot(config: ChatConfig, user: Option<&str>) -> Result<Chatbot> {
    let mut bot = Chatbot::new(config, user);
    bot.initialize().context("initializing chatbot")?;
    Ok(bot)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ChatConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if cli.local_only {
        config.remote.fallback_to_ai = false;
    }
    logging::init(&config, cli.verbose)?;

    let user = cli.user.as_deref();
    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let mut bot = build_bot(config, user)?;
            repl::run(&mut bot)
        }
        Commands::Ask { text } => {
            let mut bot = build_bot(config, user)?;
            let reply = bot.respond(&text.join(" "));
            let settings = bot.config().response.clone();
            display::print_reply(&reply, &settings);
            bot.shutdown();
            Ok(())
        }
        Commands::Train { pattern, response } => {
            let mut bot = build_bot(config, user)?;
            let result = bot.learn(&pattern, &response).context("learning pattern")?;
            match (result.learned, result.entry_name) {
                (true, Some(name)) => println!("Learned: {}", name),
                (true, None) => println!("Learned."),
                (false, _) => println!(
                    "Not learned: {}",
                    result.reason.as_deref().unwrap_or("no change")
                ),
            }
            Ok(())
        }
        Commands::Dedup { file } => {
            let path = file.unwrap_or_else(|| config.storage.patterns_path());
            let report = dedup::deduplicate_file(&path, config.matching.dedup_similarity)
                .with_context(|| format!("deduplicating {}", path.display()))?;
            println!(
                "{}: {} entries, {} merged, {} remaining",
                path.display(),
                report.original,
                report.merged,
                report.final_count
            );
            Ok(())
        }
        Commands::Config { save } => {
            println!("{}", config.to_toml()?);
            if save {
                config.save().context("saving configuration")?;
                if let Some(path) = ChatConfig::user_config_path() {
                    println!("Saved to {}", path.display());
                }
            }
            Ok(())
        }
    }
}
