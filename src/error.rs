//! Error types for the content loader and the application wizard.

use thiserror::Error;

use crate::validation::FieldErrors;

/// Shown in place of internal failures (decoding errors, invalid state).
pub const INTERNAL_ERROR_MESSAGE: &str = "Erro interno. Tente novamente em alguns instantes.";

/// Result type alias using the crate error type.
pub type Result<T> = std::result::Result<T, KaizenError>;

/// Main error type for the site client.
#[derive(Error, Debug)]
pub enum KaizenError {
    /// One or more fields failed local validation. Never reaches the network.
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// The server answered with `success: false` (business-rule rejection).
    #[error("Request rejected: {message}")]
    Rejected {
        message: String,
        /// Field the server blamed, when it names one
        field: Option<String>,
    },

    /// The server answered with a non-success status and no structured reply
    #[error("HTTP request returned status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The request did not complete within the configured timeout
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// The wizard was asked for a transition that its current state does not allow
    #[error("Invalid wizard state: {0}")]
    InvalidState(String),

    /// HTTP client error
    #[error("HTTP request failed: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse classification of an error, used for metric labels and for deciding
/// how a failure is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection refused, DNS failure, timeout.
    Network,
    /// Non-2xx status without a structured rejection.
    Server,
    /// Client-side validation failure.
    Validation,
    /// `success: false` reply from the server.
    Rejected,
    /// Decoding failures, invalid state, anything else.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Server => "server",
            ErrorKind::Validation => "validation",
            ErrorKind::Rejected => "rejected",
            ErrorKind::Internal => "internal",
        }
    }
}

impl KaizenError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KaizenError::Validation(_) => ErrorKind::Validation,
            KaizenError::Rejected { .. } => ErrorKind::Rejected,
            KaizenError::HttpStatus { .. } => ErrorKind::Server,
            KaizenError::Timeout(_) => ErrorKind::Network,
            KaizenError::HttpClient(e) if e.is_status() => ErrorKind::Server,
            KaizenError::HttpClient(_) => ErrorKind::Network,
            KaizenError::InvalidState(_)
            | KaizenError::Serialization(_)
            | KaizenError::Other(_) => ErrorKind::Internal,
        }
    }

    /// True for transport-level failures (unreachable host, timeout).
    pub fn is_network(&self) -> bool {
        self.kind() == ErrorKind::Network
    }

    /// Message suitable for showing to the person filling in a form.
    pub fn user_message(&self) -> String {
        match self {
            KaizenError::Rejected { message, .. } => message.clone(),
            KaizenError::Validation(errors) => errors.to_string(),
            KaizenError::HttpStatus { status, .. } => format!("Erro no servidor ({status})"),
            KaizenError::Timeout(_) | KaizenError::HttpClient(_) => {
                "Erro de conexão. Tente novamente.".to_string()
            }
            KaizenError::InvalidState(_)
            | KaizenError::Serialization(_)
            | KaizenError::Other(_) => INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(KaizenError::Timeout(5000).kind(), ErrorKind::Network);
        assert!(KaizenError::Timeout(5000).is_network());
        assert_eq!(
            KaizenError::HttpStatus {
                status: 502,
                body: String::new()
            }
            .kind(),
            ErrorKind::Server
        );
        assert_eq!(
            KaizenError::Rejected {
                message: "CPF inválido".to_string(),
                field: Some("cpf".to_string()),
            }
            .kind(),
            ErrorKind::Rejected
        );
        assert_eq!(
            KaizenError::InvalidState("completed".to_string()).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_user_message_prefers_server_text() {
        let err = KaizenError::Rejected {
            message: "Aplicação não encontrada".to_string(),
            field: None,
        };
        assert_eq!(err.user_message(), "Aplicação não encontrada");
        assert_eq!(
            KaizenError::Timeout(10).user_message(),
            "Erro de conexão. Tente novamente."
        );
    }

    #[test]
    fn test_internal_failures_get_a_generic_message() {
        let err = KaizenError::InvalidState("no application id was assigned".to_string());
        assert_eq!(err.user_message(), INTERNAL_ERROR_MESSAGE);

        let err: KaizenError = serde_json::from_str::<u32>("{").unwrap_err().into();
        assert_eq!(err.user_message(), INTERNAL_ERROR_MESSAGE);

        let err = KaizenError::Other(anyhow::anyhow!("analytics receiver dropped"));
        assert!(!err.user_message().contains("analytics"));
    }
}
