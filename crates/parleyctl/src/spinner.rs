//! Typing indicator shown while a reply is produced.
//!
//! Runs on a detached thread that only draws; nothing waits on it except
//! `stop`, which flips the flag and clears the line.

use owo_colors::OwoColorize;
use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Braille spinner frames
const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

const SPINNER_INTERVAL_MS: u64 = 120;

pub struct Spinner {
    running: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
    start_time: Instant,
    drawing: bool,
}

impl Spinner {
    /// Start drawing unless disabled or stdout is not a terminal.
    pub fn start(message: &str, enabled: bool) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let drawing = enabled && io::stdout().is_terminal();

        if !drawing {
            return Self {
                running,
                handle: None,
                start_time: Instant::now(),
                drawing,
            };
        }

        let running_clone = running.clone();
        let message = message.to_string();
        let handle = std::thread::spawn(move || {
            let mut frame = 0;
            while running_clone.load(Ordering::Relaxed) {
                print!(
                    "\r{} {}",
                    SPINNER_FRAMES[frame].bright_yellow(),
                    message.dimmed()
                );
                let _ = io::stdout().flush();
                frame = (frame + 1) % SPINNER_FRAMES.len();
                std::thread::sleep(Duration::from_millis(SPINNER_INTERVAL_MS));
            }
        });

        Self {
            running,
            handle: Some(handle),
            start_time: Instant::now(),
            drawing,
        }
    }

    /// Stop the spinner and return elapsed time
    pub fn stop(mut self) -> Duration {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        if self.drawing {
            print!("\r{}\r", " ".repeat(60));
            let _ = io::stdout().flush();
        }
        self.start_time.elapsed()
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}
