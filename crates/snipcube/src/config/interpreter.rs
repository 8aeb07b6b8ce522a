use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Placeholder replaced by the snippet text in the interpreter command
pub const SNIPPET_PLACEHOLDER: &str = "{snippet}";

/// Default PATH for sandboxed execution
pub const DEFAULT_SANDBOX_PATH: &str = "/usr/bin:/bin";

/// Configuration for the interpreter started inside the sandbox
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpreterConfig {
    /// Command and arguments with placeholders
    /// Placeholders: {snippet}
    pub command: Vec<String>,

    /// Environment variables for the interpreter
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// PATH environment variable for the interpreter
    #[serde(default = "default_path")]
    pub path: String,
}

impl InterpreterConfig {
    /// Expand placeholders in the interpreter command
    pub fn expand_command(&self, snippet: &str) -> Vec<String> {
        self.command
            .iter()
            .map(|arg| arg.replace(SNIPPET_PLACEHOLDER, snippet))
            .collect()
    }

    /// Check whether any argument receives the snippet
    pub fn takes_snippet(&self) -> bool {
        self.command
            .iter()
            .any(|arg| arg.contains(SNIPPET_PLACEHOLDER))
    }
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            command: vec!["snipcube-eval".to_string(), SNIPPET_PLACEHOLDER.to_string()],
            env: HashMap::new(),
            path: default_path(),
        }
    }
}

fn default_path() -> String {
    DEFAULT_SANDBOX_PATH.to_string()
}
