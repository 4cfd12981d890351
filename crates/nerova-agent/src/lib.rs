//! Control Loop: bootstrap phase, iteration loop, and pause/abort
//! supervisor driving one run to a terminal status (spec.md §4.1).

mod brain_client;
mod controller;
mod errors;
mod scroll;
mod supervisor;

pub use brain_client::{BrainClient, BrainDecisionResponse, CriticCallInput};
pub use controller::{RunController, RunParams};
pub use errors::AgentError;
pub use scroll::{base_page_delta, resolve_delta};
pub use supervisor::RunSupervisor;
