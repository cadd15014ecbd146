//! Argument parsing for parleyctl.

use clap::Parser;
use parleyctl::cli::{Cli, Commands};
use std::path::PathBuf;

#[test]
fn test_no_subcommand_means_chat() {
    let cli = Cli::try_parse_from(["parleyctl"]).unwrap();
    assert!(cli.command.is_none());
    assert!(!cli.local_only);
}

#[test]
fn test_ask_joins_words() {
    let cli = Cli::try_parse_from(["parleyctl", "ask", "what", "is", "2", "+", "2"]).unwrap();
    match cli.command {
        Some(Commands::Ask { text }) => assert_eq!(text.join(" "), "what is 2 + 2"),
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn test_ask_requires_text() {
    assert!(Cli::try_parse_from(["parleyctl", "ask"]).is_err());
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "parleyctl",
        "train",
        "who wrote dune",
        "Frank Herbert",
        "--local-only",
        "--user",
        "ada",
        "--config",
        "/tmp/parley.toml",
    ])
    .unwrap();
    assert!(cli.local_only);
    assert_eq!(cli.user.as_deref(), Some("ada"));
    assert_eq!(cli.config, Some(PathBuf::from("/tmp/parley.toml")));
    assert_eq!(
        cli.command,
        Some(Commands::Train {
            pattern: "who wrote dune".to_string(),
            response: "Frank Herbert".to_string(),
        })
    );
}

#[test]
fn test_dedup_and_config_flags() {
    let cli = Cli::try_parse_from(["parleyctl", "dedup", "--file", "p.json"]).unwrap();
    assert_eq!(
        cli.command,
        Some(Commands::Dedup {
            file: Some(PathBuf::from("p.json"))
        })
    );

    let cli = Cli::try_parse_from(["parleyctl", "config", "--save"]).unwrap();
    assert_eq!(cli.command, Some(Commands::Config { save: true }));
}
