//! Multi-step application wizard.
//!
//! A [`WizardController`] drives one run of a [`FlowDefinition`] against the
//! franchise endpoints. Each step is validated locally, saved, and only then left:
//!
//! ```text
//!              validate ok          save ok
//! Step(k) ──next_step()──> saving ──────────> Step(k + 1)
//!    │           │                    │
//!    │           └── invalid ─────────┴── save failed ──> Step(k), errors published
//!    │
//!    └──prev_step()──> Step(k - 1)          (no network, values kept)
//!
//!              validate ok   save ok   submit ok
//! Step(N) ──submit()──────────────────────────────> Completed
//!                  └── any failure ──> Step(N), application id kept for the retry
//! ```
//!
//! The controller takes `&mut self` for every transition, so two step actions can
//! never overlap. Analytics and notifications are side effects only: they never
//! decide a transition.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::analytics::{StepAction, Tracker, TrackingEvent};
use crate::config::SiteConfig;
use crate::error::{KaizenError, Result};
use crate::http::HttpClient;
use crate::notify::{NotificationKind, Notifier};
use crate::validation::{FieldErrors, FieldKind, ValidationMessage, validate_fields};

pub mod api;
pub mod attribution;
pub mod flow;
pub mod state;

pub use api::{FranchiseApi, StepSaved, Submitted};
pub use attribution::{Attribution, SessionId};
pub use flow::{FlowDefinition, StepDefinition};
pub use state::{ApplicationId, FieldValues, StepNumber, WizardApplication, WizardState};

const SAVE_ERROR_TITLE: &str = "Erro ao salvar dados";
const SUBMIT_ERROR_TITLE: &str = "Erro ao enviar aplicação";

/// What the view needs to render the wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WizardSnapshot {
    pub state: WizardState,
    pub application_id: Option<ApplicationId>,
    pub field_errors: FieldErrors,
    pub global_error: Option<String>,
    /// A save or submit is in flight
    pub saving: bool,
}

/// Notice durations in milliseconds, zero meaning "until dismissed".
#[derive(Debug, Clone, Copy)]
struct NoticeDurations {
    step: u64,
    completion: u64,
    error: u64,
}

/// Services the wizard reports to.
#[derive(Clone)]
pub struct WizardServices {
    pub tracker: Tracker,
    pub notifier: Arc<dyn Notifier>,
}

pub struct WizardController<H: HttpClient> {
    flow: FlowDefinition,
    application: WizardApplication,
    api: FranchiseApi<H>,
    attribution: Attribution,
    services: WizardServices,
    notices: NoticeDurations,
    field_errors: FieldErrors,
    global_error: Option<String>,
    updates: watch::Sender<WizardSnapshot>,
}

impl<H: HttpClient> WizardController<H> {
    /// Open the franchise wizard on step 1 with no application id.
    pub fn open(
        api: FranchiseApi<H>,
        attribution: Attribution,
        services: WizardServices,
        config: &SiteConfig,
    ) -> Self {
        Self::open_flow(FlowDefinition::franchise(), api, attribution, services, config)
    }

    pub fn open_flow(
        flow: FlowDefinition,
        api: FranchiseApi<H>,
        attribution: Attribution,
        services: WizardServices,
        config: &SiteConfig,
    ) -> Self {
        let application = WizardApplication::new(flow.total_steps());
        let snapshot = WizardSnapshot {
            state: application.state(),
            application_id: None,
            field_errors: FieldErrors::new(),
            global_error: None,
            saving: false,
        };
        let (updates, _) = watch::channel(snapshot);

        tracing::info!(
            flow = flow.name(),
            steps = flow.total_steps(),
            session_id = %attribution.session_id,
            "Wizard opened"
        );

        services.tracker.track(TrackingEvent::ModalOpen {
            modal_name: flow.modal_name(),
            modal_trigger: "button_click".to_string(),
        });
        services.tracker.track(TrackingEvent::FunnelStep {
            step_number: StepNumber::FIRST.get(),
            step_action: StepAction::Start,
            step_name: flow.step_name(StepNumber::FIRST),
            application_id: None,
        });

        Self {
            flow,
            application,
            api,
            attribution,
            services,
            notices: NoticeDurations {
                step: config.step_notice_ms,
                completion: config.completion_notice_ms,
                error: config.error_notice_ms,
            },
            field_errors: FieldErrors::new(),
            global_error: None,
            updates,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<WizardSnapshot> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> WizardSnapshot {
        self.updates.borrow().clone()
    }

    pub fn state(&self) -> WizardState {
        self.application.state()
    }

    pub fn current_step(&self) -> Option<StepNumber> {
        self.application.current_step()
    }

    pub fn application_id(&self) -> Option<&ApplicationId> {
        self.application.application_id()
    }

    pub fn application(&self) -> &WizardApplication {
        &self.application
    }

    pub fn field_errors(&self) -> &FieldErrors {
        &self.field_errors
    }

    pub fn global_error(&self) -> Option<&str> {
        self.global_error.as_deref()
    }

    pub fn flow(&self) -> &FlowDefinition {
        &self.flow
    }

    /// Value of `field`, looked up in the step that declares it (or the current step).
    pub fn value(&self, field: &str) -> Option<&str> {
        let step = self.step_for_field(field)?;
        self.application.value(step, field)
    }

    /// Record an edit. The field's input mask is applied and its error cleared.
    pub fn set_field(&mut self, field: &str, value: &str) {
        let Some(step) = self.step_for_field(field) else {
            tracing::debug!(field, "Ignoring edit on a completed wizard");
            return;
        };
        let kind = self
            .flow
            .field(field)
            .map(|(_, spec)| spec.kind)
            .unwrap_or_else(|| FieldKind::infer(field));

        self.application.set_value(step, field, kind.mask(value));
        if self.field_errors.remove(field).is_some() {
            self.publish();
        }
    }

    /// Validate a single field when it loses focus.
    pub fn blur_field(&mut self, field: &str) -> Option<ValidationMessage> {
        let (step, spec) = self.flow.field(field)?;
        let value = self.application.value(step, field).unwrap_or("");

        let result = spec.validate(value).err();
        match result {
            Some(message) => self.field_errors.insert(field, message),
            None => {
                self.field_errors.remove(field);
            }
        }
        self.publish();
        result
    }

    /// Validate and save the current step, then move to the next one.
    #[tracing::instrument(skip(self), fields(flow = self.flow.name()))]
    pub async fn next_step(&mut self) -> Result<StepNumber> {
        let step = self.require_step()?;
        if step == self.application.last_step() {
            return Err(KaizenError::InvalidState(format!(
                "step {step} is the last step, submit instead"
            )));
        }

        self.validate_step(step)?;
        self.save_step(step).await?;

        let next = self.application.advance()?;
        self.services.tracker.track(TrackingEvent::FunnelStep {
            step_number: next.get(),
            step_action: StepAction::Start,
            step_name: self.flow.step_name(next),
            application_id: self.application_id().map(|id| id.to_string()),
        });

        tracing::info!(from = %step, to = %next, "Wizard advanced");
        self.publish();
        Ok(next)
    }

    /// Go back one step. Never touches the network.
    pub fn prev_step(&mut self) -> Result<StepNumber> {
        let prev = self.application.retreat()?;
        self.global_error = None;
        tracing::debug!(to = %prev, "Wizard went back");
        self.publish();
        Ok(prev)
    }

    /// Validate and save the last step, then finalize the application.
    ///
    /// On failure the wizard stays on the last step with its application id, so
    /// calling `submit` again retries with the same id.
    #[tracing::instrument(skip(self), fields(flow = self.flow.name()))]
    pub async fn submit(&mut self) -> Result<Submitted> {
        let step = self.require_step()?;
        if step != self.application.last_step() {
            return Err(KaizenError::InvalidState(format!(
                "cannot submit from step {step} of {}",
                self.application.total_steps()
            )));
        }

        self.validate_step(step)?;
        self.save_step(step).await?;

        let Some(application_id) = self.application.application_id().cloned() else {
            let err = KaizenError::InvalidState("no application id was assigned".to_string());
            self.report_failure(SUBMIT_ERROR_TITLE, &err);
            return Err(err);
        };

        let result = {
            let _saving = SavingGuard::start(&self.updates);
            self.api.submit(&application_id).await
        };

        let submitted = match result {
            Ok(submitted) => submitted,
            Err(e) => {
                tracing::warn!(application_id = %application_id, error = %e, "Failed to submit application");
                self.report_failure(SUBMIT_ERROR_TITLE, &e);
                return Err(e);
            }
        };

        self.application
            .complete(submitted.application_number.clone())?;
        self.global_error = None;

        self.services.tracker.track(TrackingEvent::LeadConversion {
            conversion_type: format!("{}_application", self.flow.name()),
            application_id: Some(application_id.to_string()),
            lead_source: non_empty_or(&self.attribution.utm_source, "direct"),
            lead_medium: non_empty_or(&self.attribution.utm_medium, "none"),
            lead_campaign: non_empty_or(&self.attribution.utm_campaign, "none"),
        });

        let number = submitted
            .application_number
            .as_deref()
            .filter(|n| !n.trim().is_empty());
        let params: Vec<(&str, &str)> = number
            .map(|n| vec![("application_number", n)])
            .unwrap_or_default();
        self.services.notifier.show(
            NotificationKind::Success,
            &self.flow.completion_title_key(),
            &self.flow.completion_message_key(number.is_some()),
            &params,
            self.notices.completion,
        );

        tracing::info!(
            application_id = %application_id,
            application_number = ?submitted.application_number,
            "Application submitted"
        );
        self.publish();
        Ok(submitted)
    }

    /// Close the modal and hand back what was collected.
    pub fn close(self) -> WizardApplication {
        let reason = if self.application.is_completed() {
            "completed"
        } else {
            "user_close"
        };
        self.services.tracker.track(TrackingEvent::ModalClose {
            modal_name: self.flow.modal_name(),
            close_reason: reason.to_string(),
        });
        tracing::info!(
            state = ?self.application.state(),
            application_id = ?self.application.application_id(),
            reason,
            "Wizard closed"
        );
        self.application
    }

    fn require_step(&self) -> Result<StepNumber> {
        self.application
            .current_step()
            .ok_or_else(|| KaizenError::InvalidState("application already completed".to_string()))
    }

    fn step_for_field(&self, field: &str) -> Option<StepNumber> {
        self.flow
            .field(field)
            .map(|(step, _)| step)
            .or_else(|| self.application.current_step())
    }

    /// Gate before leaving `step`. Failures are published per field and never
    /// reach the network.
    fn validate_step(&mut self, step: StepNumber) -> Result<()> {
        let empty = FieldValues::new();
        let values = self.application.values(step).unwrap_or(&empty);

        match validate_fields(self.flow.fields(step), values) {
            Ok(()) => {
                self.field_errors.clear();
                Ok(())
            }
            Err(errors) => {
                tracing::debug!(step = %step, %errors, "Step failed validation");
                self.field_errors = errors.clone();
                self.services.tracker.track(TrackingEvent::FormError {
                    form_name: self.flow.modal_name(),
                    error_type: "validation".to_string(),
                    error_message: errors.to_string(),
                });
                self.publish();
                Err(KaizenError::Validation(errors))
            }
        }
    }

    async fn save_step(&mut self, step: StepNumber) -> Result<()> {
        let body = self.save_body(step)?;

        let result = {
            let _saving = SavingGuard::start(&self.updates);
            self.api.save_step(step, &body).await
        };

        let saved = match result {
            Ok(saved) => saved,
            Err(e) => {
                tracing::warn!(step = %step, error = %e, "Failed to save step");
                self.report_failure(SAVE_ERROR_TITLE, &e);
                return Err(e);
            }
        };

        if let Some(id) = saved.application_id {
            self.application.assign_id(id);
        }
        self.global_error = None;

        self.services.tracker.track(TrackingEvent::FunnelStep {
            step_number: step.get(),
            step_action: StepAction::Complete,
            step_name: self.flow.step_name(step),
            application_id: self.application_id().map(|id| id.to_string()),
        });
        // The last step is acknowledged by the completion notice
        if step != self.application.last_step() {
            self.services.notifier.show(
                NotificationKind::Success,
                &self.flow.step_notice_key(step),
                "",
                &[],
                self.notices.step,
            );
        }

        self.publish();
        Ok(())
    }

    /// Step values, then attribution, then the application id when known.
    fn save_body(&self, step: StepNumber) -> Result<Map<String, Value>> {
        let mut body: Map<String, Value> = self
            .application
            .values(step)
            .map(|values| {
                values
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect()
            })
            .unwrap_or_default();

        if let Value::Object(attribution) = serde_json::to_value(&self.attribution)? {
            body.extend(attribution);
        }
        if let Some(id) = self.application.application_id() {
            body.insert(
                "application_id".to_string(),
                Value::String(id.as_str().to_string()),
            );
        }
        Ok(body)
    }

    fn report_failure(&mut self, title: &str, error: &KaizenError) {
        let message = error.user_message();
        self.services.tracker.track(TrackingEvent::FormError {
            form_name: self.flow.modal_name(),
            error_type: error.kind().as_str().to_string(),
            error_message: message.clone(),
        });
        self.services.notifier.show(
            NotificationKind::Error,
            title,
            &message,
            &[],
            self.notices.error,
        );
        self.global_error = Some(message);
        self.publish();
    }

    fn publish(&self) {
        self.updates.send_replace(WizardSnapshot {
            state: self.application.state(),
            application_id: self.application.application_id().cloned(),
            field_errors: self.field_errors.clone(),
            global_error: self.global_error.clone(),
            saving: false,
        });
    }
}

/// Publishes `saving = true` while alive.
struct SavingGuard<'a> {
    updates: &'a watch::Sender<WizardSnapshot>,
}

impl<'a> SavingGuard<'a> {
    fn start(updates: &'a watch::Sender<WizardSnapshot>) -> Self {
        updates.send_modify(|s| s.saving = true);
        Self { updates }
    }
}

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) {
        self.updates.send_modify(|s| s.saving = false);
    }
}

fn non_empty_or(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}
