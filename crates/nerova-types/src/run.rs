use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a single goal-pursuing execution.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque continuation token issued by the Critic service so a stateless
/// client can reconstruct per-run context across calls.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Terminal and non-terminal states a `Run` can occupy.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Stop,
    Resend,
    Continue,
    AwaitAssistance,
    Halt,
    Aborted,
    Error,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Stop | RunStatus::Halt | RunStatus::Aborted | RunStatus::Error
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::InProgress => "in_progress",
            RunStatus::Stop => "stop",
            RunStatus::Resend => "resend",
            RunStatus::Continue => "continue",
            RunStatus::AwaitAssistance => "await_assistance",
            RunStatus::Halt => "halt",
            RunStatus::Aborted => "aborted",
            RunStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// A single goal-pursuing execution, as described in spec.md §3.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub base_prompt: String,
    pub contexts: Vec<String>,
    pub complete_history: Vec<String>,
    pub iterations: u32,
    pub status: RunStatus,
    pub session_id: Option<SessionId>,
    pub artifact_dir: String,
}

impl Run {
    pub fn new(base_prompt: impl Into<String>, artifact_dir: impl Into<String>) -> Self {
        Self {
            id: RunId::new(),
            base_prompt: base_prompt.into(),
            contexts: Vec::new(),
            complete_history: Vec::new(),
            iterations: 0,
            status: RunStatus::InProgress,
            session_id: None,
            artifact_dir: artifact_dir.into(),
        }
    }

    /// `basePrompt + "\n\nContext:\n" + contexts joined by "\n---\n"`, per §4.1 step 3a.
    /// Returns `base_prompt` unchanged when no context is active.
    pub fn effective_prompt(&self) -> String {
        if self.contexts.is_empty() {
            return self.base_prompt.clone();
        }
        format!(
            "{}\n\nContext:\n{}",
            self.base_prompt,
            self.contexts.join("\n---\n")
        )
    }
}

/// Collapse whitespace runs to a single space, trim, and lowercase.
///
/// `normalize(normalize(x)) == normalize(x)` (spec.md §8 property 3).
pub fn normalize(input: &str) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim().to_lowercase()
}

/// Merge newly observed milestone strings into an existing history,
/// deduplicating case-insensitively while retaining first-seen casing and
/// order. Idempotent: applying twice yields the same list (spec.md §8
/// property 1).
pub fn extract_completes(history: &[String], incoming: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = history.iter().map(|s| normalize(s)).collect();
    let mut merged = history.to_vec();
    for item in incoming {
        let key = normalize(item);
        if key.is_empty() || seen.contains(&key) {
            continue;
        }
        seen.insert(key);
        merged.push(item.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_and_lowercases() {
        assert_eq!(normalize("  Add   to\tCart \n"), "add to cart");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize("  Add   to\tCart \n");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn extract_completes_dedupes_case_insensitively() {
        let history = vec!["opened example.com".to_string()];
        let incoming = vec!["Opened Example.com".to_string(), "added to cart".to_string()];
        let merged = extract_completes(&history, &incoming);
        assert_eq!(merged, vec!["opened example.com", "added to cart"]);
    }

    #[test]
    fn extract_completes_is_idempotent() {
        let history = vec!["a".to_string()];
        let incoming = vec!["b".to_string()];
        let once = extract_completes(&history, &incoming);
        let twice = extract_completes(&once, &incoming);
        assert_eq!(once, twice);
    }

    #[test]
    fn extract_completes_preserves_first_seen_casing() {
        let history: Vec<String> = vec![];
        let incoming = vec!["Add To Cart".to_string(), "ADD TO CART".to_string()];
        let merged = extract_completes(&history, &incoming);
        assert_eq!(merged, vec!["Add To Cart"]);
    }

    #[test]
    fn effective_prompt_without_context() {
        let run = Run::new("find the cheapest flight", "/tmp/run");
        assert_eq!(run.effective_prompt(), "find the cheapest flight");
    }

    #[test]
    fn effective_prompt_with_context() {
        let mut run = Run::new("find the cheapest flight", "/tmp/run");
        run.contexts.push("focus on the search box".to_string());
        assert_eq!(
            run.effective_prompt(),
            "find the cheapest flight\n\nContext:\nfocus on the search box"
        );
    }
}
