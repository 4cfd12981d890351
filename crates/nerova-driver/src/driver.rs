use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::Value;

use nerova_types::{HittableElement, PauseSignal};

use crate::commands::WorkerCommand;
use crate::error::DriverError;
use crate::pool::AgentHandle;

/// Thin, typed facade over `AgentHandle::send_command` for the commands the
/// control loop and click resolver actually issue (spec.md §4.1, §4.2). Every
/// command races the run's pause signal so a pause interrupts an in-flight
/// command, not just the next loop-top check (spec.md §5).
pub struct RemoteDriver {
    agent: Arc<AgentHandle>,
    pause: Arc<dyn PauseSignal>,
    screenshot_timeout: Duration,
}

impl RemoteDriver {
    pub fn new(agent: Arc<AgentHandle>, pause: Arc<dyn PauseSignal>) -> Self {
        Self {
            agent,
            pause,
            screenshot_timeout: WorkerCommand::Screenshot { options: None }.default_timeout(),
        }
    }

    /// Overrides the worker-command default for `screenshot`, configured
    /// from `AGENT_SCREENSHOT_TIMEOUT_MS` (spec.md §6).
    pub fn with_screenshot_timeout(mut self, timeout: Duration) -> Self {
        self.screenshot_timeout = timeout;
        self
    }

    async fn call(&self, command: WorkerCommand) -> Result<Value, DriverError> {
        self.agent
            .send_command(command, None, &self.pause.cancellation_token())
            .await
    }

    pub async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.call(WorkerCommand::Navigate {
            url: url.to_string(),
            options: Some(serde_json::json!({ "waitUntil": "load" })),
        })
        .await?;
        Ok(())
    }

    pub async fn go_back(&self) -> Result<(), DriverError> {
        self.call(WorkerCommand::GoBack).await?;
        Ok(())
    }

    /// Returns raw PNG bytes decoded from the worker's base64 response.
    pub async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        let value = self
            .agent
            .send_command(
                WorkerCommand::Screenshot { options: None },
                Some(self.screenshot_timeout),
                &self.pause.cancellation_token(),
            )
            .await?;
        let encoded = value
            .get("data")
            .and_then(Value::as_str)
            .or_else(|| value.as_str())
            .ok_or_else(|| DriverError::Internal("screenshot response missing data".into()))?;
        let stripped = strip_data_url_prefix(encoded);
        STANDARD
            .decode(stripped)
            .map_err(|err| DriverError::Internal(format!("invalid base64 screenshot: {err}")))
    }

    /// Returns `(width, height, devicePixelRatio)`; `dpr` defaults to 1.0
    /// when the worker omits it.
    pub async fn viewport(&self) -> Result<(u32, u32, f64), DriverError> {
        let value = self.call(WorkerCommand::Viewport).await?;
        let width = value.get("width").and_then(Value::as_u64).unwrap_or(0) as u32;
        let height = value.get("height").and_then(Value::as_u64).unwrap_or(0) as u32;
        let dpr = value.get("dpr").and_then(Value::as_f64).unwrap_or(1.0);
        Ok((width, height, dpr))
    }

    pub async fn click_viewport(&self, vx: f64, vy: f64) -> Result<(), DriverError> {
        self.agent
            .send_command(
                WorkerCommand::ClickViewport {
                    vx,
                    vy,
                    button: None,
                    click_count: Some(1),
                },
                Some(Duration::from_secs(5)),
                &self.pause.cancellation_token(),
            )
            .await?;
        Ok(())
    }

    pub async fn clear_active_input(&self) -> Result<(), DriverError> {
        self.agent
            .send_command(
                WorkerCommand::ClearActiveInput { token: None },
                Some(Duration::from_secs(5)),
                &self.pause.cancellation_token(),
            )
            .await?;
        Ok(())
    }

    /// Types one character at a time; callers are responsible for the
    /// 120ms inter-keystroke pause barrier (spec.md §4.2 post-click effects).
    pub async fn type_char(&self, ch: char) -> Result<(), DriverError> {
        self.agent
            .send_command(
                WorkerCommand::TypeText {
                    text: ch.to_string(),
                    delay: None,
                },
                Some(Duration::from_secs(5)),
                &self.pause.cancellation_token(),
            )
            .await?;
        Ok(())
    }

    pub async fn press_enter(&self) -> Result<(), DriverError> {
        self.agent
            .send_command(
                WorkerCommand::PressEnter,
                Some(Duration::from_secs(5)),
                &self.pause.cancellation_token(),
            )
            .await?;
        Ok(())
    }

    pub async fn scroll_universal(&self, direction: &str) -> Result<(), DriverError> {
        self.call(WorkerCommand::ScrollUniversal {
            direction: direction.to_string(),
        })
        .await?;
        Ok(())
    }

    pub async fn scroll_viewport(&self, dx: f64, dy: f64) -> Result<(), DriverError> {
        self.call(WorkerCommand::ScrollViewport { dx, dy }).await?;
        Ok(())
    }

    pub async fn get_hittables_viewport(&self) -> Result<Vec<HittableElement>, DriverError> {
        let value = self
            .call(WorkerCommand::GetHittablesViewport { options: None })
            .await?;
        serde_json::from_value(value)
            .map_err(|err| DriverError::Internal(format!("invalid hittables payload: {err}")))
    }
}

fn strip_data_url_prefix(value: &str) -> &str {
    if let Some(idx) = value.find("base64,") {
        &value[idx + "base64,".len()..]
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_data_url_prefix() {
        assert_eq!(
            strip_data_url_prefix("data:image/png;base64,QUJD"),
            "QUJD"
        );
        assert_eq!(strip_data_url_prefix("QUJD"), "QUJD");
    }
}
