use std::sync::Arc;

use nerova_driver::RemoteDriver;
use nerova_journal::RunJournal;
use nerova_llm::AssistantResolver;
use nerova_types::{normalize, ClickTarget, HittableElement, HitState, PauseSignal};
use serde_json::json;
use tracing::{debug, info};

use crate::dedup::dedupe;
use crate::errors::ResolverError;
use crate::exact_match::find_exact_match;
use crate::radius::{filter_by_radius, normalize_center_and_radius, DEFAULT_RADIUS_PX};

/// Cap on candidates handed to the Assistant in a single disambiguation call
/// (spec.md §4.2 step 7).
const ASSISTANT_CANDIDATE_CAP: usize = 12;

/// Outcome of a resolved click: either a concrete DOM element (clicked via
/// its own center) or a bare viewport point from the Assistant.
#[derive(Clone, Debug)]
pub enum ResolvedClick {
    Element(HittableElement),
    Point([f64; 2]),
}

impl ResolvedClick {
    pub fn point(&self) -> [f64; 2] {
        match self {
            ResolvedClick::Element(e) => e.center,
            ResolvedClick::Point(p) => *p,
        }
    }
}

/// Implements spec.md §4.2's eight-step resolution pipeline: normalize,
/// snapshot, dedupe, radius filter, hittability preference, role filter,
/// exact-text terminal match, Assistant fallback.
pub struct ClickResolver {
    driver: Arc<RemoteDriver>,
    assistant: Arc<dyn AssistantResolver>,
    default_radius: f64,
}

impl ClickResolver {
    pub fn new(driver: Arc<RemoteDriver>, assistant: Arc<dyn AssistantResolver>) -> Self {
        Self {
            driver,
            assistant,
            default_radius: DEFAULT_RADIUS_PX,
        }
    }

    /// Overrides the spec default (step 1) from `AGENT_CLICK_RADIUS`.
    pub fn with_default_radius(mut self, radius: f64) -> Self {
        self.default_radius = radius;
        self
    }

    pub async fn resolve(
        &self,
        goal_prompt: &str,
        target: &ClickTarget,
        dpr: f64,
        screenshot_png: &[u8],
        pause: &dyn PauseSignal,
        artifacts: Option<(&RunJournal, u32)>,
    ) -> Result<ResolvedClick, ResolverError> {
        if pause.abort_requested() || pause.pause_requested() {
            return Err(ResolverError::PauseInterrupt);
        }

        let (center, radius) = normalize_center_and_radius(target, dpr, self.default_radius);

        let snapshot = self.driver.get_hittables_viewport().await?;
        let deduped = dedupe(snapshot);

        if let Some((journal, step)) = artifacts {
            let _ = journal.write_step_json(
                step,
                "step3-hittables",
                json!({ "count": deduped.len(), "elements": &deduped }),
            );
        }

        let by_radius = filter_by_radius(deduped.clone(), center, radius);

        if let Some((journal, step)) = artifacts {
            let _ = journal.write_step_json(
                step,
                "step3-radius",
                json!({ "center": center, "radius": radius, "count": by_radius.len(), "elements": &by_radius }),
            );
        }

        let preferred = prefer_hittable(by_radius);
        let pool = apply_role_filter(preferred, &wanted_roles(target));

        if let Some(found) = find_exact_match(&pool, &target.hints.text_exact, center) {
            debug!(id = %found.id, "exact text match resolved click");
            return Ok(ResolvedClick::Element(found.clone()));
        }

        if pause.abort_requested() || pause.pause_requested() {
            return Err(ResolverError::PauseInterrupt);
        }

        let candidate_pool = if pool.is_empty() { &deduped } else { &pool };
        let decision = self
            .ask_assistant(goal_prompt, target, candidate_pool, screenshot_png, artifacts)
            .await?;

        if decision.is_confident_click() {
            if let (Some(center), Some(id)) = (decision.center, decision.candidate_id.as_deref()) {
                if let Some(element) = candidate_pool.iter().find(|e| e.id == id) {
                    return Ok(ResolvedClick::Element(element.clone()));
                }
                return Ok(ResolvedClick::Point(center));
            }
            if let Some(center) = decision.center {
                return Ok(ResolvedClick::Point(center));
            }
        }

        info!("assistant declined to resolve a confident click");
        Err(ResolverError::AwaitAssistance)
    }

    async fn ask_assistant(
        &self,
        goal_prompt: &str,
        target: &ClickTarget,
        candidates: &[HittableElement],
        screenshot_png: &[u8],
        artifacts: Option<(&RunJournal, u32)>,
    ) -> Result<nerova_llm::AssistantDecision, ResolverError> {
        let candidates: Vec<_> = candidates
            .iter()
            .take(ASSISTANT_CANDIDATE_CAP)
            .map(|e| {
                json!({
                    "id": e.id,
                    "name": e.name,
                    "role": e.role,
                    "center": e.center,
                })
            })
            .collect();
        let target_json = serde_json::to_value(target).unwrap_or(serde_json::Value::Null);

        if let Some((journal, step)) = artifacts {
            let _ = journal.write_step_json(
                step,
                "assistant-request",
                json!({ "goal": goal_prompt, "target": &target_json, "candidates": &candidates }),
            );
        }

        let outcome = self
            .assistant
            .disambiguate(goal_prompt, target_json, candidates, screenshot_png)
            .await;

        if let Some((journal, step)) = artifacts {
            let response_json = match &outcome {
                Ok(decision) => serde_json::to_value(decision).unwrap_or(serde_json::Value::Null),
                Err(err) => json!({ "error": err.to_string() }),
            };
            let _ = journal.write_step_json(step, "assistant-response", response_json);
        }

        match outcome {
            Ok(decision) => Ok(decision),
            Err(nerova_llm::LlmError::PauseInterrupt) => Err(ResolverError::PauseInterrupt),
            Err(other) => Err(ResolverError::AssistantError(other)),
        }
    }
}

/// spec.md §4.2 step 4: prefer elements the collection pass reported as
/// actually hittable; if none, keep the broader pool rather than emptying it.
fn prefer_hittable(elements: Vec<HittableElement>) -> Vec<HittableElement> {
    let hittable: Vec<HittableElement> = elements
        .iter()
        .filter(|e| e.hit_state == HitState::Hittable)
        .cloned()
        .collect();
    if hittable.is_empty() {
        elements
    } else {
        hittable
    }
}

/// spec.md §4.2 step 5: the union of `target.role` and `target.hints.roles`.
fn wanted_roles(target: &ClickTarget) -> Vec<String> {
    let mut roles = target.hints.roles.clone();
    if let Some(role) = &target.role {
        roles.push(role.clone());
    }
    roles
}

/// spec.md §4.2 step 5: narrow to `hints.roles` (case-insensitive) when
/// given and the narrowing would leave at least one candidate.
fn apply_role_filter(elements: Vec<HittableElement>, roles: &[String]) -> Vec<HittableElement> {
    if roles.is_empty() {
        return elements;
    }
    let wanted: Vec<String> = roles.iter().map(|r| normalize(r)).collect();
    let narrowed: Vec<HittableElement> = elements
        .iter()
        .filter(|e| wanted.contains(&normalize(&e.role)))
        .cloned()
        .collect();
    if narrowed.is_empty() {
        elements
    } else {
        narrowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(id: &str, role: &str, hit_state: HitState) -> HittableElement {
        HittableElement {
            id: id.to_string(),
            name: "n".to_string(),
            role: role.to_string(),
            enabled: true,
            hit_state,
            center: [0.0, 0.0],
            rect: [0.0, 0.0, 10.0, 10.0],
            selector: format!("#{id}"),
            href: None,
            class_name: None,
        }
    }

    #[test]
    fn prefer_hittable_keeps_broader_pool_when_none_hittable() {
        let elements = vec![element("a", "button", HitState::Occluded)];
        let out = prefer_hittable(elements.clone());
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn prefer_hittable_narrows_when_some_hittable() {
        let elements = vec![
            element("a", "button", HitState::Occluded),
            element("b", "button", HitState::Hittable),
        ];
        let out = prefer_hittable(elements);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "b");
    }

    #[test]
    fn role_filter_falls_back_to_full_pool_when_empty() {
        let elements = vec![element("a", "link", HitState::Hittable)];
        let out = apply_role_filter(elements, &["button".to_string()]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn role_filter_narrows_case_insensitively() {
        let elements = vec![
            element("a", "Button", HitState::Hittable),
            element("b", "link", HitState::Hittable),
        ];
        let out = apply_role_filter(elements, &["button".to_string()]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "a");
    }

    #[test]
    fn wanted_roles_unions_target_role_and_hints() {
        let target = ClickTarget {
            id: None,
            target_type: None,
            center: None,
            hints: nerova_types::Hints {
                roles: vec!["link".to_string()],
                ..Default::default()
            },
            content: None,
            clear: None,
            submit: None,
            role: Some("button".to_string()),
            radius: None,
        };
        let mut roles = wanted_roles(&target);
        roles.sort();
        assert_eq!(roles, vec!["button".to_string(), "link".to_string()]);
    }
}
