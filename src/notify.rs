//! User-facing notifications and the translation catalog behind them.
//!
//! Titles and messages that start with `i18n.` are looked up in a [`Catalog`]
//! when shown; anything else is displayed verbatim.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use dashmap::DashMap;
use regex::{Captures, Regex};
use serde::Serialize;
use tokio::time::Instant;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)\}").expect("valid placeholder pattern"));

/// Prefix marking a string as a catalog key.
pub const I18N_PREFIX: &str = "i18n.";

/// Language used when a key is missing from the selected one.
pub const DEFAULT_LANGUAGE: &str = "pt-br";

const PT_BR: &[(&str, &str)] = &[
    ("validation.required", "Este campo é obrigatório."),
    ("validation.email", "Por favor, insira um e-mail válido."),
    (
        "validation.phone",
        "Por favor, insira um telefone válido no formato (11) 99999-9999.",
    ),
    ("validation.cpf", "Por favor, insira um CPF válido."),
    ("validation.cep", "Por favor, insira um CEP válido."),
    ("validation.min_length", "Este campo está muito curto."),
    ("validation.letters", "Use apenas letras."),
    ("validation.url", "URL inválida."),
    ("error.validation", "Por favor, corrija os erros no formulário."),
    (
        "franchise.success.step1",
        "Dados pessoais salvos! Vamos para o próximo passo.",
    ),
    (
        "franchise.success.step2",
        "Perfil profissional registrado! Continue o processo.",
    ),
    (
        "franchise.success.step3",
        "Informações de investimento salvas! Quase lá.",
    ),
    ("franchise.success.step4", "Documentos enviados! Último passo."),
    (
        "franchise.success.step5",
        "Agendamento realizado! Aguarde nosso contato.",
    ),
    (
        "franchise.success.complete",
        "Processo de franqueado iniciado com sucesso!",
    ),
    (
        "franchise.success.complete_message",
        "Sua aplicação {application_number} foi recebida. Entraremos em contato em breve.",
    ),
    (
        "franchise.success.received",
        "Sua aplicação foi recebida. Entraremos em contato em breve.",
    ),
    ("franchise.error.save", "Erro ao salvar dados"),
    ("franchise.error.submit", "Erro ao enviar aplicação"),
    (
        "contact.success",
        "Mensagem enviada com sucesso! Entraremos em contato em breve.",
    ),
    ("contact.error", "Erro ao enviar mensagem"),
];

const EN: &[(&str, &str)] = &[
    ("validation.required", "This field is required."),
    ("validation.email", "Please enter a valid email address."),
    ("validation.phone", "Please enter a valid phone number."),
    ("validation.cpf", "Please enter a valid CPF."),
    ("validation.cep", "Please enter a valid postal code."),
    ("validation.min_length", "This field is too short."),
    ("validation.letters", "Use letters only."),
    ("validation.url", "Invalid URL."),
    ("error.validation", "Please fix the errors in the form."),
    (
        "franchise.success.complete",
        "Your franchise application has started!",
    ),
    ("franchise.error.save", "Error saving data"),
    ("franchise.error.submit", "Error sending application"),
];

/// Translation tables keyed by language, with `{param}` substitution.
#[derive(Debug, Clone)]
pub struct Catalog {
    language: String,
    tables: HashMap<String, HashMap<String, String>>,
}

impl Default for Catalog {
    fn default() -> Self {
        let mut catalog = Self {
            language: DEFAULT_LANGUAGE.to_string(),
            tables: HashMap::new(),
        };
        for (key, value) in PT_BR {
            catalog.insert(DEFAULT_LANGUAGE, key, value);
        }
        for (key, value) in EN {
            catalog.insert("en", key, value);
        }
        catalog
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Switch language. Returns false (and keeps the current one) when no table exists.
    pub fn set_language(&mut self, language: &str) -> bool {
        let language = language.to_lowercase();
        if !self.tables.contains_key(&language) {
            tracing::warn!(language = %language, "Unknown language, keeping current");
            return false;
        }
        self.language = language;
        true
    }

    pub fn insert(&mut self, language: &str, key: &str, value: &str) {
        self.tables
            .entry(language.to_lowercase())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    /// Look up `key` in the current language, then the default one. An unknown
    /// key is returned unchanged. Placeholders without a matching param are kept.
    pub fn t(&self, key: &str, params: &[(&str, &str)]) -> String {
        let lookup = |language: &str| self.tables.get(language).and_then(|t| t.get(key));
        let Some(text) = lookup(&self.language).or_else(|| lookup(DEFAULT_LANGUAGE)) else {
            return key.to_string();
        };

        PLACEHOLDER
            .replace_all(text, |caps: &Captures| {
                params
                    .iter()
                    .find(|(name, _)| *name == &caps[1])
                    .map(|(_, value)| value.to_string())
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Translate `text` if it carries the `i18n.` prefix, otherwise return it as is.
    pub fn translate(&self, text: &str, params: &[(&str, &str)]) -> String {
        match text.strip_prefix(I18N_PREFIX) {
            Some(key) => self.t(key, params),
            None => text.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NotificationId(pub u64);

/// A notification as displayed, after translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// None for notices that stay until hidden
    pub duration: Option<Duration>,
    pub shown_at: Instant,
}

impl Notification {
    pub fn is_expired(&self, now: Instant) -> bool {
        self.duration
            .is_some_and(|duration| now.duration_since(self.shown_at) >= duration)
    }
}

/// Something that can put a message in front of the user.
pub trait Notifier: Send + Sync {
    /// Show a notification. A `duration_ms` of zero keeps it until hidden.
    fn show(
        &self,
        kind: NotificationKind,
        title: &str,
        message: &str,
        params: &[(&str, &str)],
        duration_ms: u64,
    ) -> NotificationId;

    fn hide(&self, id: NotificationId) -> bool;

    fn success(&self, title: &str, message: &str, duration_ms: u64) -> NotificationId {
        self.show(NotificationKind::Success, title, message, &[], duration_ms)
    }

    fn error(&self, title: &str, message: &str, duration_ms: u64) -> NotificationId {
        self.show(NotificationKind::Error, title, message, &[], duration_ms)
    }
}

/// In-memory notifier that keeps the currently active notifications.
#[derive(Clone)]
pub struct NotificationCenter {
    catalog: Arc<Catalog>,
    active: Arc<DashMap<NotificationId, Notification>>,
    next_id: Arc<AtomicU64>,
}

impl NotificationCenter {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
            active: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Notifications still on screen, oldest first. Expired ones are dropped.
    pub fn active(&self) -> Vec<Notification> {
        let now = Instant::now();
        self.active.retain(|_, n| !n.is_expired(now));

        let mut notifications: Vec<Notification> =
            self.active.iter().map(|e| e.value().clone()).collect();
        notifications.sort_by_key(|n| n.id);
        notifications
    }

    pub fn hide_all(&self) {
        self.active.clear();
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(Catalog::default())
    }
}

impl Notifier for NotificationCenter {
    fn show(
        &self,
        kind: NotificationKind,
        title: &str,
        message: &str,
        params: &[(&str, &str)],
        duration_ms: u64,
    ) -> NotificationId {
        let id = NotificationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let notification = Notification {
            id,
            kind,
            title: self.catalog.translate(title, params),
            message: self.catalog.translate(message, params),
            duration: (duration_ms > 0).then(|| Duration::from_millis(duration_ms)),
            shown_at: Instant::now(),
        };

        tracing::debug!(
            id = id.0,
            ?kind,
            title = %notification.title,
            duration_ms,
            "Showing notification"
        );
        self.active.insert(id, notification);
        id
    }

    fn hide(&self, id: NotificationId) -> bool {
        self.active.remove(&id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_only_prefixed() {
        let catalog = Catalog::new();
        assert_eq!(
            catalog.translate("i18n.franchise.success.step1", &[]),
            "Dados pessoais salvos! Vamos para o próximo passo."
        );
        assert_eq!(
            catalog.translate("Erro ao salvar dados", &[]),
            "Erro ao salvar dados"
        );
    }

    #[test]
    fn test_missing_key_falls_back() {
        let mut catalog = Catalog::new();
        assert!(catalog.set_language("EN"));
        // Only in pt-br
        assert_eq!(
            catalog.t("franchise.success.step4", &[]),
            "Documentos enviados! Último passo."
        );
        assert_eq!(catalog.t("nope.missing", &[]), "nope.missing");
        assert!(!catalog.set_language("fr"));
        assert_eq!(catalog.language(), "en");
    }

    #[test]
    fn test_param_substitution() {
        let catalog = Catalog::new();
        assert_eq!(
            catalog.t(
                "franchise.success.complete_message",
                &[("application_number", "FR-2025-0042")]
            ),
            "Sua aplicação FR-2025-0042 foi recebida. Entraremos em contato em breve."
        );
        // Unknown params stay as placeholders
        assert!(
            catalog
                .t("franchise.success.complete_message", &[])
                .contains("{application_number}")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_notifications_expire() {
        let center = NotificationCenter::default();
        let step = center.success(
            "i18n.franchise.success.step1",
            "i18n.franchise.success.step1",
            2000,
        );
        let sticky = center.error("Erro ao salvar dados", "CPF já cadastrado", 0);

        let active = center.active();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].id, step);
        assert_eq!(active[0].kind, NotificationKind::Success);

        tokio::time::advance(Duration::from_millis(2001)).await;

        let active = center.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, sticky);
        assert_eq!(active[0].message, "CPF já cadastrado");

        assert!(center.hide(sticky));
        assert!(!center.hide(sticky));
        assert!(center.active().is_empty());
    }
}
