//! Reply envelope shared by the site backend's AJAX endpoints.
//!
//! ```json
//! { "success": true, "application_id": "42", "message": "..." }
//! { "success": false, "error": "CPF inválido", "field": "cpf" }
//! { "success": false, "message": "Nome deve conter apenas letras" }
//! ```
//!
//! `success: false` becomes [`KaizenError::Rejected`] whatever the status code;
//! the rejection text is `error`, then `message`, then the caller's fallback.
//! A non-2xx answer without an envelope becomes [`KaizenError::HttpStatus`].

use serde::Deserialize;

use crate::error::{KaizenError, Result};
use crate::http::HttpResponse;
use crate::wizard::state::ApplicationId;

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub application_id: Option<ApplicationId>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub application_number: Option<String>,
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

/// Decode `response` into an accepted envelope.
pub(crate) fn decode(response: HttpResponse, fallback: &str) -> Result<Envelope> {
    let reply: Envelope = match serde_json::from_str(&response.body) {
        Ok(reply) => reply,
        Err(_) if !response.is_success() => {
            tracing::warn!(status = response.status, "Backend error without a reply body");
            return Err(KaizenError::HttpStatus {
                status: response.status,
                body: response.body,
            });
        }
        Err(e) => return Err(e.into()),
    };

    if !reply.success {
        let message = non_blank(reply.error)
            .or_else(|| non_blank(reply.message))
            .unwrap_or_else(|| fallback.to_string());
        tracing::info!(
            status = response.status,
            field = ?reply.field,
            error = %message,
            "Backend rejected the request"
        );
        return Err(KaizenError::Rejected {
            message,
            field: reply.field,
        });
    }

    if !response.is_success() {
        // Claims success with an error status; trust the status
        return Err(KaizenError::HttpStatus {
            status: response.status,
            body: response.body,
        });
    }

    Ok(reply)
}
