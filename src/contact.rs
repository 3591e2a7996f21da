//! Contact page form.
//!
//! Fields are masked as typed, checked when they lose focus, and all checked
//! again before the single `POST /contato/ajax/`. A failed submit keeps the
//! values for another attempt; an accepted one clears the form.

use std::collections::BTreeMap;
use std::sync::Arc;

use metrics::counter;
use serde_json::{Map, Value, json};

use crate::analytics::{Tracker, TrackingEvent};
use crate::config::SiteConfig;
use crate::envelope;
use crate::error::{KaizenError, Result};
use crate::http::{HttpClient, HttpRequest};
use crate::notify::{NotificationKind, Notifier};
use crate::validation::{
    FieldErrors, FieldKind, FieldSpec, ValidationMessage, parse_url, validate_fields,
};
use crate::wizard::Attribution;

const CONTACT_PATH: &str = "/contato/ajax/";
const FORM_TYPE: &str = "contact_page";
const SUCCESS_KEY: &str = "i18n.contact.success";
const ERROR_KEY: &str = "i18n.contact.error";

/// Accepted contact message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactSent {
    /// Server acknowledgement, when it sent one
    pub message: Option<String>,
}

pub struct ContactForm<H: HttpClient> {
    http: H,
    base_url: String,
    csrf_token: Option<String>,
    timeout_ms: Option<u64>,
    fields: Vec<FieldSpec>,
    values: BTreeMap<String, String>,
    field_errors: FieldErrors,
    attribution: Option<Attribution>,
    tracker: Tracker,
    notifier: Arc<dyn Notifier>,
    success_notice_ms: u64,
    error_notice_ms: u64,
}

impl<H: HttpClient> ContactForm<H> {
    pub fn new(http: H, config: &SiteConfig, tracker: Tracker, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            http,
            base_url: config.site_base_url.clone(),
            csrf_token: config.csrf_token.clone(),
            timeout_ms: config.save_timeout_ms,
            fields: Self::default_fields(),
            values: BTreeMap::new(),
            field_errors: FieldErrors::new(),
            attribution: None,
            tracker,
            notifier,
            success_notice_ms: config.completion_notice_ms,
            error_notice_ms: config.error_notice_ms,
        }
    }

    /// The contact page's fields: `website` is the only optional one.
    pub fn default_fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::required("name").with_min_len(2),
            FieldSpec::required("email"),
            FieldSpec::required("phone"),
            FieldSpec::required("message").with_min_len(10),
            FieldSpec::required("faturamento"),
            FieldSpec::required("area"),
            FieldSpec::optional("website"),
        ]
    }

    /// Send the visitor's UTM parameters along with the message.
    pub fn with_attribution(mut self, attribution: Attribution) -> Self {
        self.attribution = Some(attribution);
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn value(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    pub fn field_errors(&self) -> &FieldErrors {
        &self.field_errors
    }

    /// Record an edit with the field's input mask applied, clearing its error.
    pub fn set_field(&mut self, field: &str, value: &str) {
        let kind = self.kind_of(field);
        self.values.insert(field.to_string(), kind.mask(value));
        self.field_errors.remove(field);
    }

    /// Check one field when it loses focus. A website without a scheme gets `http://`.
    pub fn blur_field(&mut self, field: &str) -> Option<ValidationMessage> {
        let spec = self.fields.iter().find(|f| f.name == field)?;

        if spec.kind == FieldKind::Url {
            if let Some(value) = self.values.get_mut(field) {
                if let Some(url) = parse_url(value.as_str()) {
                    *value = url.to_string();
                }
            }
        }

        let value = self.values.get(field).map(String::as_str).unwrap_or("");
        let result = spec.validate(value).err();
        match result {
            Some(message) => self.field_errors.insert(field, message),
            None => {
                self.field_errors.remove(field);
            }
        }
        result
    }

    /// Validate every field, then send the message.
    ///
    /// Validation failures never reach the network. Server rejections and
    /// transport failures are shown as an error notice and tracked as
    /// `contact_form_error`; the values are kept so the visitor can retry.
    #[tracing::instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn submit(&mut self) -> Result<ContactSent> {
        if let Err(errors) = validate_fields(&self.fields, &self.values) {
            tracing::debug!(%errors, "Contact form failed validation");
            self.field_errors = errors.clone();
            return Err(KaizenError::Validation(errors));
        }
        self.field_errors.clear();

        let result = self.send().await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind().as_str(),
        };
        counter!("kaizen_contact_submissions_total", "outcome" => outcome).increment(1);

        match result {
            Ok(sent) => {
                tracing::info!("Contact message sent");
                self.tracker.track(TrackingEvent::custom(
                    "contact_form_submit",
                    json!({"form_type": FORM_TYPE, "success": true}),
                ));
                let title = sent.message.as_deref().unwrap_or(SUCCESS_KEY);
                self.notifier.show(
                    NotificationKind::Success,
                    title,
                    "",
                    &[],
                    self.success_notice_ms,
                );
                self.values.clear();
                Ok(sent)
            }
            Err(e) => {
                let tracked = match &e {
                    KaizenError::Rejected { message, .. } => message.clone(),
                    _ => "network_error".to_string(),
                };
                tracing::warn!(error = %e, "Failed to send contact message");
                self.tracker.track(TrackingEvent::custom(
                    "contact_form_error",
                    json!({"form_type": FORM_TYPE, "error": tracked}),
                ));
                self.notifier.show(
                    NotificationKind::Error,
                    ERROR_KEY,
                    &e.user_message(),
                    &[],
                    self.error_notice_ms,
                );
                Err(e)
            }
        }
    }

    async fn send(&self) -> Result<ContactSent> {
        let mut request = HttpRequest::post_json(&self.base_url, CONTACT_PATH, &self.body())?
            .with_header("X-Requested-With", "XMLHttpRequest");
        if let Some(token) = &self.csrf_token {
            request = request.with_header("X-CSRFToken", token.as_str());
        }

        let response = self.http.execute(&request, self.timeout_ms).await?;
        let reply = envelope::decode(response, "Erro ao enviar mensagem")?;
        Ok(ContactSent {
            message: reply.message.filter(|m| !m.trim().is_empty()),
        })
    }

    /// Field values, then the UTM parameters when attribution is known.
    fn body(&self) -> Map<String, Value> {
        let mut body: Map<String, Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();

        if let Some(a) = &self.attribution {
            for (key, value) in [
                ("utm_source", &a.utm_source),
                ("utm_medium", &a.utm_medium),
                ("utm_campaign", &a.utm_campaign),
                ("utm_term", &a.utm_term),
                ("utm_content", &a.utm_content),
            ] {
                body.insert(key.to_string(), Value::String(value.clone()));
            }
        }
        body
    }

    fn kind_of(&self, field: &str) -> FieldKind {
        self.fields
            .iter()
            .find(|f| f.name == field)
            .map(|f| f.kind)
            .unwrap_or_else(|| FieldKind::infer(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::PageContext;
    use crate::http::MockHttpClient;
    use crate::notify::NotificationCenter;

    fn form() -> ContactForm<MockHttpClient> {
        ContactForm::new(
            MockHttpClient::new(),
            &SiteConfig::default(),
            Tracker::tracing(PageContext::default()),
            Arc::new(NotificationCenter::default()),
        )
    }

    #[test]
    fn test_name_mask_and_blur() {
        let mut form = form();
        form.set_field("name", "M4ria!");
        assert_eq!(form.value("name"), Some("Mria"));

        form.set_field("name", "M");
        assert_eq!(
            form.blur_field("name"),
            Some(ValidationMessage::TooShort { min: 2 })
        );
        form.set_field("name", "Maria");
        assert!(form.field_errors().is_empty());
        assert_eq!(form.blur_field("name"), None);
    }

    #[test]
    fn test_website_blur_adds_scheme() {
        let mut form = form();
        form.set_field("website", "agenciakaizen.com.br");
        assert_eq!(form.blur_field("website"), None);
        assert_eq!(form.value("website"), Some("http://agenciakaizen.com.br/"));

        form.set_field("website", "");
        assert_eq!(form.blur_field("website"), None);
        assert_eq!(form.value("website"), Some(""));
    }

    #[test]
    fn test_phone_is_masked() {
        let mut form = form();
        form.set_field("phone", "11999998888");
        assert_eq!(form.value("phone"), Some("(11) 99999-8888"));
        assert_eq!(form.blur_field("phone"), None);
    }
}
