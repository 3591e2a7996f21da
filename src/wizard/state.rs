//! Wizard progress and the data collected so far.
//!
//! ```text
//! Step(1) ──advance()──> Step(2) ──advance()──> ... ──advance()──> Step(N) ──complete()──> Completed
//!    ^                      │                                         │
//!    └─────retreat()────────┘                   <──retreat()──────────┘
//! ```
//!
//! Forward transitions are only taken by the controller after the server has
//! accepted the current step. `retreat()` never touches the network and keeps
//! every value entered so far.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{KaizenError, Result};

/// Field name to value, for one step.
pub type FieldValues = BTreeMap<String, String>;

/// 1-based step index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct StepNumber(u8);

impl StepNumber {
    pub const FIRST: StepNumber = StepNumber(1);

    /// `n` as a step of a flow with `total_steps` steps.
    pub fn new(n: u8, total_steps: u8) -> Option<Self> {
        (1..=total_steps).contains(&n).then_some(StepNumber(n))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for StepNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned identifier correlating every step of one application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(String);

impl ApplicationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "step", rename_all = "lowercase")]
pub enum WizardState {
    Step(StepNumber),
    Completed,
}

/// One run of the wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WizardApplication {
    application_id: Option<ApplicationId>,
    state: WizardState,
    step_data: BTreeMap<StepNumber, FieldValues>,
    total_steps: u8,
    application_number: Option<String>,
}

impl WizardApplication {
    pub fn new(total_steps: u8) -> Self {
        Self {
            application_id: None,
            state: WizardState::Step(StepNumber::FIRST),
            step_data: BTreeMap::new(),
            total_steps: total_steps.max(1),
            application_number: None,
        }
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    /// The step being filled in, or None once completed.
    pub fn current_step(&self) -> Option<StepNumber> {
        match self.state {
            WizardState::Step(step) => Some(step),
            WizardState::Completed => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state == WizardState::Completed
    }

    pub fn total_steps(&self) -> u8 {
        self.total_steps
    }

    pub fn last_step(&self) -> StepNumber {
        StepNumber(self.total_steps)
    }

    pub fn application_id(&self) -> Option<&ApplicationId> {
        self.application_id.as_ref()
    }

    /// Set by the server when the application is finalized.
    pub fn application_number(&self) -> Option<&str> {
        self.application_number.as_deref()
    }

    pub fn values(&self, step: StepNumber) -> Option<&FieldValues> {
        self.step_data.get(&step)
    }

    pub fn value(&self, step: StepNumber, field: &str) -> Option<&str> {
        self.step_data
            .get(&step)
            .and_then(|values| values.get(field))
            .map(String::as_str)
    }

    pub fn set_value(&mut self, step: StepNumber, field: &str, value: String) {
        self.step_data
            .entry(step)
            .or_default()
            .insert(field.to_string(), value);
    }

    /// Record the id from a save reply. The first id sticks: a later reply with
    /// a different id is logged and ignored.
    pub fn assign_id(&mut self, id: ApplicationId) -> &ApplicationId {
        match &self.application_id {
            Some(current) if *current != id => {
                tracing::warn!(
                    current = %current,
                    received = %id,
                    "Server returned a different application id, keeping the first one"
                );
            }
            Some(_) => {}
            None => tracing::debug!(application_id = %id, "Application id assigned"),
        }
        self.application_id.get_or_insert(id)
    }

    /// `Step(k)` to `Step(k + 1)`.
    pub(crate) fn advance(&mut self) -> Result<StepNumber> {
        match self.state {
            WizardState::Step(step) if step.0 < self.total_steps => {
                let next = StepNumber(step.0 + 1);
                self.state = WizardState::Step(next);
                Ok(next)
            }
            WizardState::Step(step) => Err(KaizenError::InvalidState(format!(
                "step {step} is the last step, submit instead"
            ))),
            WizardState::Completed => Err(KaizenError::InvalidState(
                "application already completed".to_string(),
            )),
        }
    }

    /// `Step(k)` to `Step(k - 1)`.
    pub(crate) fn retreat(&mut self) -> Result<StepNumber> {
        match self.state {
            WizardState::Step(step) if step.0 > 1 => {
                let prev = StepNumber(step.0 - 1);
                self.state = WizardState::Step(prev);
                Ok(prev)
            }
            WizardState::Step(_) => Err(KaizenError::InvalidState(
                "already on the first step".to_string(),
            )),
            WizardState::Completed => Err(KaizenError::InvalidState(
                "application already completed".to_string(),
            )),
        }
    }

    /// `Step(N)` to `Completed`.
    pub(crate) fn complete(&mut self, application_number: Option<String>) -> Result<()> {
        match self.state {
            WizardState::Step(step) if step.0 == self.total_steps => {
                self.state = WizardState::Completed;
                self.application_number = application_number;
                Ok(())
            }
            WizardState::Step(step) => Err(KaizenError::InvalidState(format!(
                "cannot complete from step {step} of {}",
                self.total_steps
            ))),
            WizardState::Completed => Err(KaizenError::InvalidState(
                "application already completed".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_bounds() {
        assert_eq!(StepNumber::new(0, 6), None);
        assert_eq!(StepNumber::new(6, 6).map(StepNumber::get), Some(6));
        assert_eq!(StepNumber::new(7, 6), None);
    }

    #[test]
    fn test_forward_and_back() {
        let mut app = WizardApplication::new(3);
        assert_eq!(app.current_step(), Some(StepNumber::FIRST));
        assert!(app.retreat().is_err());

        assert_eq!(app.advance().unwrap().get(), 2);
        assert_eq!(app.advance().unwrap().get(), 3);
        assert!(matches!(app.advance(), Err(KaizenError::InvalidState(_))));

        assert_eq!(app.retreat().unwrap().get(), 2);
        assert!(app.complete(None).is_err());
        app.advance().unwrap();
        app.complete(Some("FR-1".to_string())).unwrap();

        assert!(app.is_completed());
        assert_eq!(app.current_step(), None);
        assert_eq!(app.application_number(), Some("FR-1"));
        assert!(app.advance().is_err());
        assert!(app.retreat().is_err());
    }

    #[test]
    fn test_first_id_sticks() {
        let mut app = WizardApplication::new(6);
        assert_eq!(app.assign_id(ApplicationId::new("abc123")).as_str(), "abc123");
        assert_eq!(app.assign_id(ApplicationId::new("abc123")).as_str(), "abc123");
        assert_eq!(app.assign_id(ApplicationId::new("zzz999")).as_str(), "abc123");
        assert_eq!(app.application_id().map(ApplicationId::as_str), Some("abc123"));
    }

    #[test]
    fn test_values_survive_retreat() {
        let mut app = WizardApplication::new(6);
        app.set_value(StepNumber::FIRST, "full_name", "Maria Silva".to_string());
        app.advance().unwrap();
        app.retreat().unwrap();
        assert_eq!(app.value(StepNumber::FIRST, "full_name"), Some("Maria Silva"));
    }

    #[test]
    fn test_state_serialization() {
        let state = WizardState::Step(StepNumber::new(3, 6).unwrap());
        assert_eq!(
            serde_json::to_value(state).unwrap(),
            serde_json::json!({"state": "step", "step": 3})
        );
        assert_eq!(
            serde_json::to_value(WizardState::Completed).unwrap(),
            serde_json::json!({"state": "completed"})
        );
    }
}
