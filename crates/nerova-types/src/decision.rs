use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Hint bundle attached to a `click_by_text_role` / `accept` target.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Hints {
    #[serde(default)]
    pub text_exact: Vec<String>,
    #[serde(default)]
    pub text_contains: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub text: Vec<String>,
}

/// A Critic-proposed click target, before resolution to a concrete pixel.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClickTarget {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub target_type: Option<String>,
    /// CSS-viewport pixels in the screenshot's device-pixel space; see
    /// `nerova-locator` for DPR normalization.
    pub center: Option<[f64; 2]>,
    #[serde(default)]
    pub hints: Hints,
    pub content: Option<String>,
    pub clear: Option<bool>,
    pub submit: Option<bool>,
    pub role: Option<String>,
    pub radius: Option<f64>,
}

/// Scroll direction requested by the Critic.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Scroll parameters: either a page count (1..=3) or a raw pixel amount.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScrollParams {
    pub direction: ScrollDirection,
    pub pages: Option<u32>,
    pub amount: Option<f64>,
}

/// The parsed JSON decision returned by the Critic (spec.md §3).
///
/// Modeled as a tagged variant over `action` per Design Note §9: unknown
/// actions fall through to `Unknown` and the loop halts rather than panics,
/// while still keeping the raw JSON around for journaling.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Decision {
    pub action: DecisionAction,
    pub reason: String,
    pub confidence: f64,
    #[serde(rename = "continue")]
    pub keep_going: bool,
    #[serde(default, deserialize_with = "deserialize_complete")]
    pub complete: Vec<String>,
    pub target: Option<ClickTarget>,
    pub scroll: Option<ScrollParams>,
    pub url: Option<String>,
    pub new_context: Option<String>,
    pub keep: Option<bool>,
    /// Escape hatch for fields not otherwise modeled, kept for logging.
    #[serde(default)]
    pub raw_unknown: Option<Value>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Accept,
    ClickByTextRole,
    Scroll,
    Back,
    Navigate,
    Resend,
    Stop,
    /// Bootstrap-only actions (spec.md §4.1 phase 2).
    Proceed,
    #[serde(other)]
    Unknown,
}

impl DecisionAction {
    pub fn is_click(self) -> bool {
        matches!(self, DecisionAction::Accept | DecisionAction::ClickByTextRole)
    }
}

/// The Critic emits `complete` as either a bare string or an array of
/// strings; normalize to a `Vec<String>` on the way in.
fn deserialize_complete<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
        None,
    }

    match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(s)) if !s.trim().is_empty() => Ok(vec![s]),
        Some(OneOrMany::One(_)) => Ok(vec![]),
        Some(OneOrMany::Many(v)) => Ok(v),
        Some(OneOrMany::None) | None => Ok(vec![]),
    }
}

/// Strip a leading ```-fence (with optional language tag) that the Critic
/// sometimes wraps its JSON response in, then parse.
pub fn parse_decision(content: &str) -> Result<Decision, serde_json::Error> {
    let trimmed = strip_code_fence(content);
    serde_json::from_str(&trimmed)
}

fn strip_code_fence(content: &str) -> String {
    let trimmed = content.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        let rest = rest.trim_start_matches(['\r', '\n']);
        if let Some(end) = rest.rfind("```") {
            return rest[..end].trim().to_string();
        }
        return rest.trim().to_string();
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_complete_as_string_or_array() {
        let one = parse_decision(
            r#"{"action":"stop","reason":"done","confidence":0.9,"continue":false,"complete":"bought item"}"#,
        )
        .unwrap();
        assert_eq!(one.complete, vec!["bought item".to_string()]);

        let many = parse_decision(
            r#"{"action":"stop","reason":"done","confidence":0.9,"continue":false,"complete":["a","b"]}"#,
        )
        .unwrap();
        assert_eq!(many.complete, vec!["a".to_string(), "b".to_string()]);

        let none = parse_decision(
            r#"{"action":"stop","reason":"done","confidence":0.9,"continue":false}"#,
        )
        .unwrap();
        assert!(none.complete.is_empty());
    }

    #[test]
    fn strips_code_fence() {
        let wrapped = "```json\n{\"action\":\"stop\",\"reason\":\"x\",\"confidence\":1.0,\"continue\":false}\n```";
        let decision = parse_decision(wrapped).unwrap();
        assert_eq!(decision.action, DecisionAction::Stop);
    }

    #[test]
    fn unknown_action_falls_through() {
        let decision = parse_decision(
            r#"{"action":"teleport","reason":"x","confidence":1.0,"continue":false}"#,
        )
        .unwrap();
        assert_eq!(decision.action, DecisionAction::Unknown);
    }
}
