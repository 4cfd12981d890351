use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{info, warn};

use nerova_driver::{DriverError, RemoteDriver};
use nerova_journal::{RunJournal, RunSummary as JournalSummary};
use nerova_locator::{ClickResolver, ResolvedClick, ResolverError};
use nerova_types::{extract_completes, DecisionAction, PauseSignal, Run, RunStatus};

use crate::brain_client::{BrainClient, CriticCallInput};
use crate::errors::AgentError;
use crate::scroll::resolve_delta;
use crate::supervisor::RunSupervisor;

/// Upper bound on bootstrap attempts (spec.md §4.1 phase 2).
const MAX_BOOTSTRAP_ATTEMPTS: u32 = 5;
const NAVIGATE_SETTLE: Duration = Duration::from_millis(800);
const RESEND_DELAY: Duration = Duration::from_millis(300);

/// A pause mid-screenshot must still surface as `PauseInterrupt`, not get
/// flattened into `screenshot_failed` along with every other driver error.
fn screenshot_error(err: DriverError) -> AgentError {
    match err {
        DriverError::PauseInterrupt => AgentError::PauseInterrupt,
        _ => AgentError::ScreenshotFailed,
    }
}

/// Everything `Run(...)` takes as input (spec.md §4.1).
pub struct RunParams {
    pub prompt: String,
    pub context_notes: Vec<String>,
    pub critic_key: Option<String>,
    pub critic_model: Option<String>,
    pub max_steps: u32,
    pub boot_url: Option<String>,
}

/// Drives one run from bootstrap through a terminal status, per spec.md
/// §4.1. Owns no process-wide state; the caller supplies a fresh
/// `RunSupervisor` per run (Design Note §9).
pub struct RunController {
    driver: Arc<RemoteDriver>,
    brain: Arc<BrainClient>,
    resolver: ClickResolver,
    supervisor: Arc<RunSupervisor>,
}

impl RunController {
    /// `click_radius` overrides the Click Resolver's spec default (step 1)
    /// from `AGENT_CLICK_RADIUS` (spec.md §6).
    pub fn new(
        driver: Arc<RemoteDriver>,
        brain: Arc<BrainClient>,
        supervisor: Arc<RunSupervisor>,
        click_radius: f64,
    ) -> Self {
        let resolver = ClickResolver::new(driver.clone(), brain.clone()).with_default_radius(click_radius);
        Self {
            driver,
            brain,
            resolver,
            supervisor,
        }
    }

    pub async fn run(
        &self,
        params: RunParams,
        artifact_dir: &str,
        journal: &mut RunJournal,
    ) -> Result<JournalSummary, AgentError> {
        if params.prompt.trim().is_empty() {
            return Err(AgentError::PromptRequired);
        }

        let mut run = Run::new(params.prompt.clone(), artifact_dir.to_string());
        run.contexts = params.context_notes.clone();

        // A pause interrupting the initial navigate or bootstrap is just as
        // resumable as one mid-iteration, so it gets the same control-flow
        // handling here instead of bubbling out of `run` as a bare error.
        let final_status = match self.drive(&params, &mut run, journal).await {
            Ok(status) => status,
            Err(err) if err.is_control_flow() => {
                if matches!(err, AgentError::RunAborted) {
                    RunStatus::Aborted
                } else {
                    RunStatus::Halt
                }
            }
            Err(err) => {
                warn!(error = %err, "run terminated with error");
                run.status = RunStatus::Error;
                let summary = self.finalize(&run, Some(err.to_string()));
                journal.write_summary(&summary)?;
                journal.log(format!("run finished with status {}", run.status))?;
                return Ok(summary);
            }
        };
        run.status = final_status;

        let summary = self.finalize(&run, None);
        journal.write_summary(&summary)?;
        journal.log(format!("run finished with status {}", run.status))?;
        Ok(summary)
    }

    async fn drive(
        &self,
        params: &RunParams,
        run: &mut Run,
        journal: &mut RunJournal,
    ) -> Result<RunStatus, AgentError> {
        if let Some(boot_url) = &params.boot_url {
            self.driver.navigate(boot_url).await?;
            tokio::time::sleep(NAVIGATE_SETTLE).await;
        }

        self.bootstrap(params, run, journal).await?;

        self.iterate(params, run, journal).await
    }

    fn finalize(&self, run: &Run, error: Option<String>) -> JournalSummary {
        JournalSummary {
            run_id: run.id.0.clone(),
            status: run.status.to_string(),
            iterations: run.iterations,
            complete_history: run.complete_history.clone(),
            finished_at: chrono::Utc::now(),
            error,
        }
    }

    async fn bootstrap(
        &self,
        params: &RunParams,
        run: &mut Run,
        journal: &mut RunJournal,
    ) -> Result<(), AgentError> {
        for attempt in 1..=MAX_BOOTSTRAP_ATTEMPTS {
            if self.supervisor.abort_requested() {
                return Err(AgentError::RunAborted);
            }

            let screenshot = self
                .driver
                .screenshot()
                .await
                .map_err(screenshot_error)?;

            let response = self
                .brain
                .bootstrap(&CriticCallInput {
                    prompt: &run.effective_prompt(),
                    screenshot_png: &screenshot,
                    session_id: run.session_id.as_ref().map(|s| s.0.as_str()),
                    critic_key: params.critic_key.as_deref(),
                    model: params.critic_model.as_deref(),
                })
                .await?;

            journal.log_stage("bootstrap", json!({ "attempt": attempt, "ok": response.ok }))?;

            if let Some(session_id) = response.session_id {
                run.session_id = Some(nerova_types::SessionId(session_id));
            }
            run.complete_history = extract_completes(&run.complete_history, &response.complete_history);

            let Some(decision) = response.decision else {
                info!(attempt, "bootstrap: no decision, resending");
                continue;
            };

            match decision.action {
                DecisionAction::Navigate => {
                    if let Some(url) = decision.url {
                        self.driver.navigate(&url).await?;
                        tokio::time::sleep(NAVIGATE_SETTLE).await;
                    }
                    return Ok(());
                }
                DecisionAction::Proceed => return Ok(()),
                DecisionAction::Resend => continue,
                _ => continue,
            }
        }

        info!("bootstrap exhausted attempts, proceeding with current page");
        Ok(())
    }

    /// Returns the run's terminal status once the loop exits.
    async fn iterate(
        &self,
        params: &RunParams,
        run: &mut Run,
        journal: &mut RunJournal,
    ) -> Result<RunStatus, AgentError> {
        let mut step = 0u32;

        loop {
            if step >= params.max_steps {
                return Ok(RunStatus::Stop);
            }
            if self.supervisor.abort_requested() {
                return Err(AgentError::RunAborted);
            }
            if self.supervisor.pause_requested() {
                journal.log_stage("pause_barrier", json!({ "step": step }))?;
                self.supervisor.wait_for_resume().await;
                if self.supervisor.abort_requested() {
                    return Err(AgentError::RunAborted);
                }
            }

            if let Some(context) = self.supervisor.take_queued_context().await {
                run.contexts.push(context);
                journal.log_stage("context_override_update", json!({ "step": step }))?;
            }

            let effective_prompt = run.effective_prompt();
            let screenshot = self
                .driver
                .screenshot()
                .await
                .map_err(screenshot_error)?;
            let (_width, height, dpr) = self.driver.viewport().await?;

            journal.write_step_bytes(step, "critic.png", &screenshot)?;
            journal.write_step_json(
                step,
                "critic-input",
                json!({ "prompt": effective_prompt, "criticKey": params.critic_key }),
            )?;

            let response = self
                .brain
                .critic(&CriticCallInput {
                    prompt: &effective_prompt,
                    screenshot_png: &screenshot,
                    session_id: run.session_id.as_ref().map(|s| s.0.as_str()),
                    critic_key: params.critic_key.as_deref(),
                    model: params.critic_model.as_deref(),
                })
                .await?;

            journal.write_step_json(
                step,
                "critic-output",
                json!({ "ok": response.ok, "error": response.error }),
            )?;

            if let Some(session_id) = &response.session_id {
                run.session_id = Some(nerova_types::SessionId(session_id.clone()));
            }
            run.complete_history = extract_completes(&run.complete_history, &response.complete_history);

            let Some(decision) = response.decision else {
                info!(step, "critic returned no decision, resending");
                journal.log_stage("resend", json!({ "step": step, "reason": "no_decision" }))?;
                tokio::time::sleep(RESEND_DELAY).await;
                continue;
            };

            if let Some(new_context) = &decision.new_context {
                if decision.keep == Some(true) {
                    run.contexts.push(new_context.clone());
                } else {
                    run.contexts = vec![new_context.clone()];
                }
            }

            // A pause that interrupts a driver call mid-dispatch (spec.md
            // §5) resends the current step once resumed rather than
            // terminating the run; the barrier at the top of this loop
            // blocks on `wait_for_resume` next time around.
            let status = match self
                .dispatch(params, run, journal, step, height as f64, dpr, decision)
                .await
            {
                Ok(status) => status,
                Err(AgentError::PauseInterrupt) => DispatchOutcome::Resend,
                Err(other) => return Err(other),
            };

            match status {
                DispatchOutcome::Advance => {
                    step += 1;
                    run.iterations = step;
                    if !self.supervisor.pause_requested() {
                        journal.log(format!(
                            "step {step} complete; history size {}",
                            run.complete_history.len()
                        ))?;
                    }
                }
                DispatchOutcome::Resend => {
                    journal.log_stage("resend", json!({ "step": step, "reason": "decision" }))?;
                    tokio::time::sleep(RESEND_DELAY).await;
                }
                DispatchOutcome::Terminal(terminal) => return Ok(terminal),
            }
        }
    }

    async fn dispatch(
        &self,
        _params: &RunParams,
        run: &mut Run,
        journal: &mut RunJournal,
        step: u32,
        viewport_height: f64,
        dpr: f64,
        decision: nerova_types::Decision,
    ) -> Result<DispatchOutcome, AgentError> {
        match decision.action {
            DecisionAction::Stop => Ok(DispatchOutcome::Terminal(RunStatus::Stop)),
            DecisionAction::Resend => Ok(DispatchOutcome::Resend),
            DecisionAction::Navigate => {
                let Some(url) = decision.url else {
                    return Ok(DispatchOutcome::Terminal(RunStatus::Halt));
                };
                self.driver.navigate(&url).await?;
                tokio::time::sleep(NAVIGATE_SETTLE).await;
                Ok(DispatchOutcome::Advance)
            }
            DecisionAction::Back => {
                self.driver.go_back().await?;
                Ok(DispatchOutcome::Advance)
            }
            DecisionAction::Scroll => {
                let Some(scroll) = decision.scroll else {
                    return Ok(DispatchOutcome::Terminal(RunStatus::Halt));
                };
                let delta = resolve_delta(&scroll, viewport_height);
                self.driver.scroll_viewport(0.0, delta).await?;
                Ok(DispatchOutcome::Advance)
            }
            DecisionAction::Accept | DecisionAction::ClickByTextRole => {
                let Some(target) = decision.target.clone() else {
                    return Ok(DispatchOutcome::Terminal(RunStatus::Halt));
                };

                let screenshot = self
                    .driver
                    .screenshot()
                    .await
                    .map_err(screenshot_error)?;

                match self
                    .resolver
                    .resolve(
                        &run.effective_prompt(),
                        &target,
                        dpr,
                        &screenshot,
                        self.supervisor.as_ref(),
                        Some((&*journal, step)),
                    )
                    .await
                {
                    Ok(resolved) => {
                        let [x, y] = resolved.point();
                        self.driver.click_viewport(x, y).await?;
                        journal.write_step_json(
                            step,
                            "click-selection",
                            json!({ "point": [x, y], "element": matches!(resolved, ResolvedClick::Element(_)) }),
                        )?;
                        nerova_locator::run_post_click_effects(
                            &self.driver,
                            target.content.as_deref(),
                            target.clear.unwrap_or(false),
                            target.submit.unwrap_or(false),
                            self.supervisor.as_ref(),
                        )
                        .await?;
                        Ok(DispatchOutcome::Advance)
                    }
                    Err(ResolverError::AwaitAssistance) => {
                        Ok(DispatchOutcome::Terminal(RunStatus::AwaitAssistance))
                    }
                    Err(ResolverError::PauseInterrupt) => Ok(DispatchOutcome::Resend),
                    Err(other) => Err(other.into()),
                }
            }
            DecisionAction::Proceed | DecisionAction::Unknown => {
                Ok(DispatchOutcome::Terminal(RunStatus::Halt))
            }
        }
    }
}

enum DispatchOutcome {
    Advance,
    Resend,
    Terminal(RunStatus),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_delta_is_finite() {
        let params = nerova_types::ScrollParams {
            direction: nerova_types::ScrollDirection::Down,
            pages: Some(1),
            amount: None,
        };
        assert!(resolve_delta(&params, 800.0).is_finite());
    }
}
