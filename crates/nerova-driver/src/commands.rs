use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The fixed command set worker-side behavior is contracted to implement
/// (spec.md §4.3). `#[serde(tag = "command", content = "payload")]` produces
/// the wire shape `{"command": "NAVIGATE", "payload": {...}}` which the
/// `CommandFrame` envelope wraps with `type`/`id`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "command", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerCommand {
    Ping,
    Init,
    Navigate {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        options: Option<Value>,
    },
    GoBack,
    Url,
    Screenshot {
        #[serde(skip_serializing_if = "Option::is_none")]
        options: Option<Value>,
    },
    Viewport,
    SetViewport {
        width: u32,
        height: u32,
    },
    ClickViewport {
        vx: f64,
        vy: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        button: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        click_count: Option<u8>,
    },
    MouseMove {
        vx: f64,
        vy: f64,
    },
    MouseClick {
        vx: f64,
        vy: f64,
    },
    KeyPress {
        key: String,
    },
    TypeText {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        delay: Option<u64>,
    },
    PressEnter,
    ClearActiveInput {
        #[serde(skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
    ScrollUniversal {
        direction: String,
    },
    ScrollViewport {
        dx: f64,
        dy: f64,
    },
    GetHittablesViewport {
        #[serde(skip_serializing_if = "Option::is_none")]
        options: Option<Value>,
    },
    Evaluate {
        expression: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        arg: Option<Value>,
    },
    WaitForLoadState,
    WaitForTimeout {
        ms: u64,
    },
    WaitForFunction {
        expression: String,
    },
    WaitForAnimationFrame,
    AddInitScript {
        script: String,
    },
}

impl WorkerCommand {
    /// Default per-call timeout, spec.md §5: "default 15 s; 20 s screenshot; 5 s click/typing".
    pub fn default_timeout(&self) -> std::time::Duration {
        use std::time::Duration;
        match self {
            WorkerCommand::Screenshot { .. } => Duration::from_secs(20),
            WorkerCommand::ClickViewport { .. }
            | WorkerCommand::TypeText { .. }
            | WorkerCommand::PressEnter
            | WorkerCommand::ClearActiveInput { .. } => Duration::from_secs(5),
            _ => Duration::from_secs(15),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_to_command_payload_shape() {
        let cmd = WorkerCommand::Navigate {
            url: "https://example.com".to_string(),
            options: None,
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["command"], "NAVIGATE");
        assert_eq!(json["payload"]["url"], "https://example.com");
    }

    #[test]
    fn timeouts_match_spec_overrides() {
        assert_eq!(
            WorkerCommand::Screenshot { options: None }.default_timeout(),
            std::time::Duration::from_secs(20)
        );
        assert_eq!(
            WorkerCommand::ClickViewport {
                vx: 0.0,
                vy: 0.0,
                button: None,
                click_count: None
            }
            .default_timeout(),
            std::time::Duration::from_secs(5)
        );
        assert_eq!(WorkerCommand::Ping.default_timeout(), std::time::Duration::from_secs(15));
    }
}
