//! Remote Browser Driver protocol and agent pool: command/response framing,
//! correlation, handshake, heartbeat pruning, and agent selection
//! (spec.md §4.3).

mod commands;
mod driver;
mod error;
mod pool;
mod protocol;

pub use commands::WorkerCommand;
pub use driver::RemoteDriver;
pub use error::DriverError;
pub use pool::{AgentHandle, AgentPool};
pub use protocol::{CommandFrame, FrameType, WelcomeFrame, WorkerMessage};
