//! parleyctl library - exposes the CLI pieces for integration tests

pub mod cli;
pub mod display;
pub mod logging;
pub mod repl;
pub mod spinner;
