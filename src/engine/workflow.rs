//! Artifact workflow — ordered steps driven to a terminal `complete` marker.
//!
//! Each step's stored value is the last assistant-proposed text the user
//! explicitly confirmed; raw user input is only ever a refinable draft.
//! Transitions are gated on confirmation, never on mere input.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::composer::Composer;
use crate::error::{EngineError, Error, StoreError};
use crate::store::{StepTurn, Store};

use super::rules::{RuleSet, UtteranceClass};

/// Terminal value of `current_step`. Absorbing: once reached, further
/// advances are no-ops.
pub const COMPLETE: &str = "complete";

/// Fallback redirect when a step has no focus prompt of its own.
const DEFAULT_FOCUS: &str = "Let's keep moving forward with your project.";

/// One stage of the artifact workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    /// Step name — the identifier used in routes and stored data.
    pub step: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_input: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation: Vec<String>,
    /// Explicit successor. When absent, the next step in declaration order
    /// is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step: Option<String>,
    /// Redirect used when the user drifts off-topic during this step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_prompt: Option<String>,
}

/// The ordered step schema, loaded once at startup and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSpec {
    pub steps: Vec<StepSpec>,
}

impl WorkflowSpec {
    /// The built-in project coaching workflow.
    pub fn default_coaching() -> Self {
        Self {
            steps: vec![
                StepSpec {
                    step: "Define Business Problem".to_string(),
                    description: "State the core business problem in one or two sentences."
                        .to_string(),
                    expected_input: Some("a short problem statement".to_string()),
                    choices: Vec::new(),
                    validation: Vec::new(),
                    next_step: None,
                    focus_prompt: Some(
                        "Let's make sure we define the core business problem clearly."
                            .to_string(),
                    ),
                },
                StepSpec {
                    step: "Set Project Direction".to_string(),
                    description: "Capture the project direction as a vision statement or OKRs."
                        .to_string(),
                    expected_input: Some("a vision statement or a set of OKRs".to_string()),
                    choices: vec![
                        "vision statement".to_string(),
                        "OKRs".to_string(),
                    ],
                    validation: Vec::new(),
                    next_step: None,
                    focus_prompt: Some(
                        "Are you ready to set the project direction with a vision statement or OKRs?"
                            .to_string(),
                    ),
                },
                StepSpec {
                    step: "Outline Success Metrics".to_string(),
                    description: "List the measurable outcomes that would mark this project \
                                  as successful."
                        .to_string(),
                    expected_input: Some("two or three measurable outcomes".to_string()),
                    choices: Vec::new(),
                    validation: vec!["each metric should be measurable".to_string()],
                    next_step: None,
                    focus_prompt: None,
                },
            ],
        }
    }

    /// Load a workflow spec from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| StoreError::Serialization(format!("{}: {e}", path.display())))
    }

    pub fn find_step(&self, name: &str) -> Option<&StepSpec> {
        self.steps.iter().find(|s| s.step == name)
    }

    /// Name of the first step. Specs are never empty in practice; an empty
    /// spec starts at `complete`.
    pub fn first_step(&self) -> &str {
        self.steps.first().map(|s| s.step.as_str()).unwrap_or(COMPLETE)
    }

    /// Compute the successor of `current`: the explicit `next_step` pointer
    /// when present, otherwise the positionally next step. A step with no
    /// successor — or one missing from the order entirely — goes to
    /// `complete`.
    pub fn advance(&self, current: &str) -> String {
        if let Some(spec) = self.find_step(current) {
            if let Some(ref next) = spec.next_step {
                return next.clone();
            }
        }
        match self.steps.iter().position(|s| s.step == current) {
            Some(pos) => self
                .steps
                .get(pos + 1)
                .map(|s| s.step.clone())
                .unwrap_or_else(|| COMPLETE.to_string()),
            None => COMPLETE.to_string(),
        }
    }
}

/// Persisted workflow progress for one identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub current_step: String,
    /// Step name → last confirmed assistant-produced text.
    pub data: BTreeMap<String, String>,
}

impl WorkflowState {
    pub fn new(initial_step: impl Into<String>) -> Self {
        Self {
            current_step: initial_step.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.current_step == COMPLETE
    }
}

/// Outcome of a submitted step response.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub message: String,
    pub next_step: String,
    pub chat_history: Vec<StepTurn>,
}

/// Drives the artifact workflow: refine drafts, detect confirmation, commit
/// values, and advance the step cursor.
pub struct WorkflowEngine {
    store: Arc<dyn Store>,
    composer: Arc<Composer>,
    spec: Arc<WorkflowSpec>,
    rules: RuleSet,
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn Store>, composer: Arc<Composer>, spec: Arc<WorkflowSpec>) -> Self {
        Self {
            store,
            composer,
            spec,
            rules: RuleSet::coaching_defaults(),
        }
    }

    /// Process one user response for the named step.
    ///
    /// The user turn is always logged, then one of three things happens:
    /// - a confirmation commits the previous proposal (or the numbered
    ///   option within it) as the step's value and advances the cursor;
    /// - off-track input gets the step's focus redirect, cursor unchanged;
    /// - anything else gets a fresh three-option refinement, cursor
    ///   unchanged. An unconfirmed step can iterate indefinitely.
    pub async fn submit_step(
        &self,
        identity: &str,
        step_name: &str,
        response: &str,
    ) -> Result<StepOutcome, Error> {
        let step = self
            .spec
            .find_step(step_name)
            .ok_or_else(|| EngineError::UnknownStep(step_name.to_string()))?;

        let mut state = self
            .store
            .workflow_state(identity, self.spec.first_step())
            .await?;

        // Snapshot the log before this turn — confirmation resolves against
        // the proposal the user was actually looking at.
        let prior_log = self.store.step_log(identity).await?;
        let last_proposal = prior_log
            .iter()
            .rev()
            .find(|t| t.role == crate::store::Speaker::Bot)
            .map(|t| t.text.clone());

        self.store
            .append_step_turn(identity, StepTurn::user(response))
            .await?;

        match self.rules.classify(response) {
            UtteranceClass::Confirmation { choice } => {
                let value = self.resolve_confirmed_value(choice, last_proposal, response);
                self.store
                    .append_step_turn(identity, StepTurn::bot(value.as_str()))
                    .await?;
                state.data.insert(step.step.clone(), value);
                if !state.is_complete() {
                    state.current_step = self.spec.advance(&step.step);
                }
                debug!(
                    identity,
                    step = %step.step,
                    next = %state.current_step,
                    "Step confirmed and advanced"
                );
            }
            UtteranceClass::OffTopic => {
                let redirect = step
                    .focus_prompt
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FOCUS.to_string());
                self.store
                    .append_step_turn(identity, StepTurn::bot(redirect))
                    .await?;
            }
            UtteranceClass::Vague | UtteranceClass::Neutral => {
                let refinement = self.refine(step, response).await;
                self.store
                    .append_step_turn(identity, StepTurn::bot(refinement))
                    .await?;
            }
        }

        self.store.save_workflow_state(identity, &state).await?;

        Ok(StepOutcome {
            message: "Step saved".to_string(),
            next_step: state.current_step,
            chat_history: self.store.step_log(identity).await?,
        })
    }

    /// Current workflow state for an identity, creating it lazily.
    pub async fn state(&self, identity: &str) -> Result<WorkflowState, Error> {
        Ok(self
            .store
            .workflow_state(identity, self.spec.first_step())
            .await?)
    }

    /// The committed value for a confirmed turn: the numbered option out of
    /// the previous proposal when one was named, otherwise the previous
    /// proposal in full. With no proposal on record the draft itself is
    /// committed.
    fn resolve_confirmed_value(
        &self,
        choice: Option<usize>,
        last_proposal: Option<String>,
        response: &str,
    ) -> String {
        match last_proposal {
            Some(proposal) => {
                if let Some(n) = choice {
                    let options = self.rules.option_lines(&proposal);
                    if n >= 1 && n <= options.len() {
                        return options[n - 1].clone();
                    }
                }
                proposal
            }
            None => response.trim().to_string(),
        }
    }

    /// Produce the three-option refinement for a draft: model-backed when
    /// the composer call succeeds and parses, deterministic otherwise.
    async fn refine(&self, step: &StepSpec, input: &str) -> String {
        match self
            .composer
            .refine_step(&step.step, &step.description, input)
            .await
        {
            Ok(text) => {
                if self.rules.option_lines(&text).len() >= 3 {
                    return text;
                }
                warn!(step = %step.step, "Model refinement had no option lines, using local rewrite");
                render_options(&local_candidates(input))
            }
            Err(e) => {
                warn!(step = %step.step, error = %e, "Model refinement failed, using local rewrite");
                render_options(&local_candidates(input))
            }
        }
    }
}

// ── Deterministic refinement ────────────────────────────────────────

/// Three templated rephrasings of a draft.
fn local_candidates(input: &str) -> Vec<String> {
    let trimmed = input.trim().trim_end_matches('.');
    vec![
        format!("{}.", sentence_case(trimmed)),
        format!("Our team needs to address {trimmed}."),
        format!("The goal of this step is to tackle {trimmed}."),
    ]
}

fn render_options(candidates: &[String]) -> String {
    let mut lines = vec!["Here are a few ways to phrase that:".to_string()];
    for (i, candidate) in candidates.iter().enumerate() {
        lines.push(format!("Option {}: {candidate}", i + 1));
    }
    lines.push("Which option works best, or would you like to refine further?".to_string());
    lines.join("\n")
}

fn sentence_case(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
