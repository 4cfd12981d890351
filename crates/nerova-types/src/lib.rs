//! Shared data model for the nerovaagent control loop, click resolver, and
//! remote browser driver: `Run`, `Decision`, `HittableElement`, and agent
//! pool bookkeeping (spec.md §3).

mod agent;
mod decision;
mod hittable;
mod pause;
mod run;

pub use agent::{AgentId, AgentRecord, AgentStatus};
pub use pause::{NeverPause, PauseSignal};
pub use decision::{
    parse_decision, ClickTarget, Decision, DecisionAction, Hints, ScrollDirection, ScrollParams,
};
pub use hittable::{
    HitState, HittableElement, DEFAULT_MAX_HITTABLES, MAX_HITTABLES_CAP, MIN_HITTABLE_SIZE_PX,
};
pub use run::{extract_completes, normalize, Run, RunId, RunStatus, SessionId};
