use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::commands::WorkerCommand;

/// `{type: COMMAND, id, command, payload}`, spec.md §4.3.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommandFrame {
    #[serde(rename = "type")]
    pub frame_type: FrameType,
    pub id: String,
    #[serde(flatten)]
    pub command: WorkerCommand,
}

impl CommandFrame {
    pub fn new(id: impl Into<String>, command: WorkerCommand) -> Self {
        Self {
            frame_type: FrameType::Command,
            id: id.into(),
            command,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum FrameType {
    #[serde(rename = "COMMAND")]
    Command,
}

/// `WELCOME{agentId}`, sent by the driver after a successful handshake.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WelcomeFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(rename = "agentId")]
    pub agent_id: String,
}

impl WelcomeFrame {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            frame_type: "WELCOME".to_string(),
            agent_id: agent_id.into(),
        }
    }
}

/// Messages a worker may send: `HANDSHAKE`, `HANDSHAKE_ACK`, `PING` (passive
/// heartbeat), `PONG`, `RESPONSE`, `EVENT`, `LOG`, `STATUS` (spec.md §4.3).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerMessage {
    #[serde(rename = "HANDSHAKE")]
    Handshake {
        #[serde(rename = "agentId")]
        agent_id: Option<String>,
    },
    #[serde(rename = "HANDSHAKE_ACK")]
    HandshakeAck,
    #[serde(rename = "PING")]
    Ping,
    #[serde(rename = "PONG")]
    Pong,
    #[serde(rename = "RESPONSE")]
    Response {
        id: String,
        ok: bool,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<String>,
    },
    #[serde(rename = "EVENT")]
    Event { payload: Value },
    #[serde(rename = "LOG")]
    Log { message: String },
    #[serde(rename = "STATUS")]
    Status { status: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_frame_round_trips() {
        let frame = CommandFrame::new("cmd-1", WorkerCommand::GoBack);
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"type\":\"COMMAND\""));
        assert!(json.contains("\"id\":\"cmd-1\""));
        assert!(json.contains("\"command\":\"GO_BACK\""));

        let parsed: CommandFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, "cmd-1");
    }

    #[test]
    fn parses_response_message() {
        let raw = r#"{"type":"RESPONSE","id":"cmd-1","ok":true,"result":{"pong":12}}"#;
        let msg: WorkerMessage = serde_json::from_str(raw).unwrap();
        match msg {
            WorkerMessage::Response { id, ok, result, .. } => {
                assert_eq!(id, "cmd-1");
                assert!(ok);
                assert_eq!(result.unwrap()["pong"], 12);
            }
            _ => panic!("wrong variant"),
        }
    }
}
