use std::path::PathBuf;

/// Process-wide configuration resolved from the environment variables
/// spec.md §6 names. Modeled on the teacher's `policy-center/loader.rs`
/// overlay resolution, reduced to a single `from_env` pass since no
/// file-based overlay system is specified.
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub log_dir: PathBuf,
    pub brain_url: String,
    pub max_steps: u32,
    pub headless: bool,
    pub keep_browser: bool,
    pub boot_url: Option<String>,
    pub click_radius: f64,
    pub screenshot_timeout_ms: u64,
    pub critic_model: Option<String>,
    pub assistant_model: Option<String>,
    pub assistant_id: Option<String>,
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_string(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let default_log_dir = home.join(".nerovaagent").join("runs");

        Self {
            port: env_parsed("PORT", 8787),
            host: env_string("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            log_dir: env_string("LOG_DIR").map(PathBuf::from).unwrap_or(default_log_dir),
            brain_url: env_string("NEROVA_BRAIN_URL")
                .unwrap_or_else(|| "http://127.0.0.1:8787".to_string()),
            max_steps: env_parsed(
                "AGENT_MAX_STEPS",
                env_parsed("NEROVA_MAX_STEPS", 10u32),
            ),
            headless: env_string("NEROVA_HEADLESS").as_deref() == Some("1"),
            keep_browser: env_string("NEROVA_KEEP_BROWSER").as_deref() == Some("1"),
            boot_url: env_string("NEROVA_BOOT_URL"),
            click_radius: env_parsed("AGENT_CLICK_RADIUS", 120.0),
            screenshot_timeout_ms: env_parsed("AGENT_SCREENSHOT_TIMEOUT_MS", 20_000u64),
            critic_model: env_string("CRITIC_MODEL"),
            assistant_model: env_string("ASSISTANT_MODEL"),
            assistant_id: env_string("ASSISTANT_ID2"),
        }
    }

    pub fn browser_profile_dir(&self) -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".nerovaagent")
            .join("browser")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parsed_falls_back_to_default_on_missing_or_invalid() {
        std::env::remove_var("NEROVA_TEST_PORT");
        assert_eq!(env_parsed::<u16>("NEROVA_TEST_PORT", 9), 9);
    }
}
