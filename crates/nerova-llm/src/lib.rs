//! Critic and Assistant HTTP clients, and API-key resolution (spec.md §4.4).

mod assistant;
mod critic;
mod errors;
mod keys;
mod prompts;

pub use assistant::{AssistantAction, AssistantClient, AssistantDecision, AssistantResolver};
pub use critic::{build_payload, build_request_body, CriticClient, CriticRequestBody, CriticRequestInput};
pub use errors::LlmError;
pub use keys::{resolve_assistant_key, resolve_critic_key, resolve_key};
pub use prompts::{
    ACTION_DISAMBIGUATOR_SYSTEM_PROMPT, CRITIC_SYSTEM_PROMPT, URL_BOOTSTRAP_CRITIC_SYSTEM_PROMPT,
};
