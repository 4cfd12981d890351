use crate::errors::LlmError;

/// First-non-empty-wins key resolution (spec.md §4.4, §6): explicit override,
/// then role-specific env vars in priority order.
pub fn resolve_key(
    role: &'static str,
    explicit: Option<&str>,
    env_vars: &[&str],
) -> Result<String, LlmError> {
    if let Some(value) = explicit {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }

    for var in env_vars {
        if let Ok(value) = std::env::var(var) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Ok(trimmed.to_string());
            }
        }
    }

    Err(LlmError::KeyMissing { role })
}

/// Critic key fallback chain: `CRITIC_OPENAI_KEY` / `OPENAI_API_KEY` /
/// `NEROVA_AGENT_CRITIC_KEY` (spec.md §6).
pub fn resolve_critic_key(explicit: Option<&str>) -> Result<String, LlmError> {
    resolve_key(
        "critic",
        explicit,
        &["CRITIC_OPENAI_KEY", "OPENAI_API_KEY", "NEROVA_AGENT_CRITIC_KEY"],
    )
}

/// Assistant key fallback chain: `RETRIEVER_OPENAI_KEY` / `NANO_OPENAI_KEY` /
/// `NEROVA_AGENT_ASSISTANT_KEY` / `OPENAI_API_KEY` (spec.md §6).
pub fn resolve_assistant_key(explicit: Option<&str>) -> Result<String, LlmError> {
    resolve_key(
        "assistant",
        explicit,
        &[
            "RETRIEVER_OPENAI_KEY",
            "NANO_OPENAI_KEY",
            "NEROVA_AGENT_ASSISTANT_KEY",
            "OPENAI_API_KEY",
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn explicit_override_wins() {
        let _guard = ENV_LOCK.lock().unwrap();
        assert_eq!(
            resolve_key("critic", Some("explicit-key"), &["SOME_VAR"]).unwrap(),
            "explicit-key"
        );
    }

    #[test]
    fn falls_back_to_env_in_order() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("NEROVA_TEST_FIRST");
        std::env::set_var("NEROVA_TEST_SECOND", "second-value");
        let resolved = resolve_key(
            "critic",
            None,
            &["NEROVA_TEST_FIRST", "NEROVA_TEST_SECOND"],
        )
        .unwrap();
        assert_eq!(resolved, "second-value");
        std::env::remove_var("NEROVA_TEST_SECOND");
    }

    #[test]
    fn missing_key_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("NEROVA_TEST_MISSING");
        let result = resolve_key("critic", None, &["NEROVA_TEST_MISSING"]);
        assert!(matches!(result, Err(LlmError::KeyMissing { role: "critic" })));
    }
}
