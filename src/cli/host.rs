//! Console host: results as JSON lines on stdout, diagnostics and errors on stderr.

use crate::operation::{OperationFailure, OperationHost};
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use serde_json::Value;
use std::io::Write;
use tracing::warn;

/// How the confirmation gate answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// Process everything.
    Auto,
    /// Ask on the terminal for each operation.
    Confirm,
    /// Describe each operation and process nothing.
    WhatIf,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    outputs: usize,
    errors: usize,
}

pub struct ConsoleHost {
    prompt: PromptMode,
    verbose: bool,
    color: bool,
    tally: Mutex<Tally>,
}

impl ConsoleHost {
    pub fn new(prompt: PromptMode, verbose: bool, color: bool) -> Self {
        Self {
            prompt,
            verbose,
            color,
            tally: Mutex::new(Tally::default()),
        }
    }

    pub fn outputs_written(&self) -> usize {
        self.tally.lock().outputs
    }

    pub fn errors_written(&self) -> usize {
        self.tally.lock().errors
    }
}

impl OperationHost for ConsoleHost {
    fn write_verbose(&self, message: &str) {
        if !self.verbose {
            return;
        }
        if self.color {
            eprintln!("{} {}", "VERBOSE:".yellow(), message);
        } else {
            eprintln!("VERBOSE: {}", message);
        }
    }

    fn write_error(&self, failure: &OperationFailure, input: &Value) {
        self.tally.lock().errors += 1;
        if self.color {
            eprintln!("{} {}", "error:".red().bold(), failure);
            eprintln!("  {} {}", "input:".dimmed(), input);
        } else {
            eprintln!("error: {}", failure);
            eprintln!("  input: {}", input);
        }
    }

    fn write_output(&self, output: Value) {
        self.tally.lock().outputs += 1;
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", output) {
            warn!(error = %e, "Failed to write result");
        }
    }

    fn should_process(&self, target: &str, action: &str) -> bool {
        match self.prompt {
            PromptMode::Auto => true,
            PromptMode::WhatIf => {
                eprintln!("What if: {} {}", action, target);
                false
            }
            PromptMode::Confirm => {
                use dialoguer::Confirm;
                Confirm::new()
                    .with_prompt(format!("{} {}?", action, target))
                    .default(false)
                    .interact()
                    .unwrap_or_else(|e| {
                        warn!(error = %e, "Confirmation prompt failed; skipping");
                        false
                    })
            }
        }
    }
}
