//! Client for the franchise application endpoints.
//!
//! Replies use the backend's shared `{ success, ... }` envelope; a step
//! save may carry the `application_id`, the submit an `application_number`.

use metrics::counter;
use serde_json::{Map, Value};

use crate::config::SiteConfig;
use crate::envelope::{self, Envelope};
use crate::error::Result;
use crate::http::{HttpClient, HttpRequest};
use crate::wizard::state::{ApplicationId, StepNumber};

const SAVE_FALLBACK: &str = "Erro ao salvar dados";
const SUBMIT_FALLBACK: &str = "Erro ao enviar aplicação";

/// Accepted step save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSaved {
    /// Present on the first save, and echoed by some later ones
    pub application_id: Option<ApplicationId>,
    pub message: Option<String>,
}

/// Accepted final submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub application_number: Option<String>,
    pub message: Option<String>,
}

#[derive(Clone)]
pub struct FranchiseApi<H: HttpClient> {
    http: H,
    base_url: String,
    csrf_token: Option<String>,
    timeout_ms: Option<u64>,
}

impl<H: HttpClient> FranchiseApi<H> {
    pub fn new(http: H, config: &SiteConfig) -> Self {
        Self {
            http,
            base_url: config.site_base_url.clone(),
            csrf_token: config.csrf_token.clone(),
            timeout_ms: config.save_timeout_ms,
        }
    }

    /// `POST /franchise/api/step<k>/` with the step's fields and attribution.
    pub async fn save_step(&self, step: StepNumber, body: &Map<String, Value>) -> Result<StepSaved> {
        let path = format!("/franchise/api/step{step}/");
        let result = self.post(&path, body, SAVE_FALLBACK).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind().as_str(),
        };
        counter!(
            "kaizen_wizard_step_saves_total",
            "step" => step.to_string(),
            "outcome" => outcome
        )
        .increment(1);

        let reply = result?;
        Ok(StepSaved {
            application_id: reply.application_id,
            message: reply.message,
        })
    }

    /// `POST /franchise/api/submit/` with only the application id.
    pub async fn submit(&self, application_id: &ApplicationId) -> Result<Submitted> {
        let mut body = Map::new();
        body.insert(
            "application_id".to_string(),
            Value::String(application_id.as_str().to_string()),
        );
        let result = self.post("/franchise/api/submit/", &body, SUBMIT_FALLBACK).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind().as_str(),
        };
        counter!("kaizen_wizard_submissions_total", "outcome" => outcome).increment(1);

        let reply = result?;
        Ok(Submitted {
            application_number: reply.application_number,
            message: reply.message,
        })
    }

    #[tracing::instrument(skip(self, body), fields(base_url = %self.base_url))]
    async fn post(&self, path: &str, body: &Map<String, Value>, fallback: &str) -> Result<Envelope> {
        let mut request = HttpRequest::post_json(&self.base_url, path, body)?;
        if let Some(token) = &self.csrf_token {
            request = request.with_header("X-CSRFToken", token.as_str());
        }

        let response = self.http.execute(&request, self.timeout_ms).await?;
        envelope::decode(response, fallback)
    }
}
