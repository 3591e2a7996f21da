//! Analytics event dispatch.
//!
//! A [`Tracker`] is constructed once per page and handed to the components that
//! emit events. Every event becomes a data-layer entry carrying the page context
//! and a timestamp, which is then passed to an [`AnalyticsSink`].
//!
//! Tracking is fire-and-forget: a failing sink is logged and otherwise ignored.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// What happened in a wizard step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    Start,
    Complete,
}

/// Keys every data-layer entry sets itself; custom properties cannot override them.
const RESERVED_KEYS: [&str; 4] = ["event", "timestamp", "page_url", "page_title"];

/// Events emitted by the site components.
///
/// Page URL, title and timestamp are added by the [`Tracker`], not carried here.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrackingEvent {
    PageView {
        page_referrer: String,
        utm_source: String,
        utm_medium: String,
        utm_campaign: String,
        utm_term: String,
        utm_content: String,
    },
    CtaClick {
        cta_name: String,
        cta_location: String,
    },
    FormSubmit {
        form_name: String,
        form_location: String,
        /// Submitted fields as a JSON string
        form_data: String,
    },
    ModalOpen {
        modal_name: String,
        modal_trigger: String,
    },
    ModalClose {
        modal_name: String,
        close_reason: String,
    },
    FunnelStep {
        step_number: u8,
        step_action: StepAction,
        step_name: String,
        application_id: Option<String>,
    },
    FormError {
        form_name: String,
        error_type: String,
        error_message: String,
    },
    LeadConversion {
        conversion_type: String,
        application_id: Option<String>,
        lead_source: String,
        lead_medium: String,
        lead_campaign: String,
    },
    NewsletterSignup {
        source: String,
        utm_source: String,
        utm_medium: String,
        utm_campaign: String,
    },
    CalendlyScheduled {
        event_id: String,
        event_uri: String,
        scheduled_date: String,
        lead_id: Option<String>,
    },
    /// Percentage of the page scrolled, 0 to 100
    ScrollDepth {
        scroll_depth: u8,
    },
    /// Seconds spent on the page
    TimeOnPage {
        time_on_page: u64,
    },
    FileDownload {
        file_name: String,
        file_type: String,
        file_location: String,
    },
    ExternalLinkClick {
        link_url: String,
        link_text: String,
        link_location: String,
    },
    #[serde(rename = "blog_load_more")]
    ListLoadMore {
        #[serde(rename = "feed")]
        source: String,
        page: u32,
        total: u64,
    },
    /// Any other event, pushed by name with free-form properties.
    #[serde(skip)]
    Custom {
        event: String,
        properties: Map<String, Value>,
    },
}

impl TrackingEvent {
    /// A named event with free-form properties.
    pub fn custom(event: impl Into<String>, properties: Value) -> Self {
        let properties = match properties {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        TrackingEvent::Custom {
            event: event.into(),
            properties,
        }
    }

    /// Data-layer event name.
    pub fn name(&self) -> &str {
        match self {
            TrackingEvent::PageView { .. } => "page_view",
            TrackingEvent::CtaClick { .. } => "cta_click",
            TrackingEvent::FormSubmit { .. } => "form_submit",
            TrackingEvent::ModalOpen { .. } => "modal_open",
            TrackingEvent::ModalClose { .. } => "modal_close",
            TrackingEvent::FunnelStep { .. } => "funnel_step",
            TrackingEvent::FormError { .. } => "form_error",
            TrackingEvent::LeadConversion { .. } => "lead_conversion",
            TrackingEvent::NewsletterSignup { .. } => "newsletter_signup",
            TrackingEvent::CalendlyScheduled { .. } => "calendly_scheduled",
            TrackingEvent::ScrollDepth { .. } => "scroll_depth",
            TrackingEvent::TimeOnPage { .. } => "time_on_page",
            TrackingEvent::FileDownload { .. } => "file_download",
            TrackingEvent::ExternalLinkClick { .. } => "external_link_click",
            TrackingEvent::ListLoadMore { .. } => "blog_load_more",
            TrackingEvent::Custom { event, .. } => event,
        }
    }

    /// Event-specific properties, without the event name.
    pub fn properties(&self) -> Map<String, Value> {
        let mut map = match self {
            TrackingEvent::Custom { properties, .. } => properties.clone(),
            _ => match serde_json::to_value(self) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            },
        };
        for key in RESERVED_KEYS {
            map.remove(key);
        }
        map
    }
}

/// Page the events are emitted from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageContext {
    pub url: String,
    pub title: String,
}

impl PageContext {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
        }
    }
}

/// One entry pushed to the data layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataLayerEntry {
    pub event: String,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
    pub page_url: String,
    pub page_title: String,
}

/// Destination for data-layer entries.
pub trait AnalyticsSink: Send + Sync {
    fn dispatch(&self, entry: DataLayerEntry) -> anyhow::Result<()>;
}

/// Writes every entry as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AnalyticsSink for TracingSink {
    fn dispatch(&self, entry: DataLayerEntry) -> anyhow::Result<()> {
        let properties = serde_json::to_string(&entry.properties)?;
        tracing::info!(
            target: "kaizen::analytics",
            event = %entry.event,
            page_url = %entry.page_url,
            %properties,
            "Analytics event"
        );
        Ok(())
    }
}

/// Forwards entries to an unbounded channel, for a consumer task or for tests.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<DataLayerEntry>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DataLayerEntry>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl AnalyticsSink for ChannelSink {
    fn dispatch(&self, entry: DataLayerEntry) -> anyhow::Result<()> {
        self.tx
            .send(entry)
            .map_err(|e| anyhow::anyhow!("analytics receiver dropped ({} lost)", e.0.event))
    }
}

/// Handle used by components to emit events. Cheap to clone.
#[derive(Clone)]
pub struct Tracker {
    sink: Arc<dyn AnalyticsSink>,
    page: Arc<PageContext>,
    shutdown: CancellationToken,
}

impl Tracker {
    pub fn new(sink: impl AnalyticsSink + 'static, page: PageContext) -> Self {
        Self {
            sink: Arc::new(sink),
            page: Arc::new(page),
            shutdown: CancellationToken::new(),
        }
    }

    /// A tracker that only logs.
    pub fn tracing(page: PageContext) -> Self {
        Self::new(TracingSink, page)
    }

    pub fn page(&self) -> &PageContext {
        &self.page
    }

    /// Push an event to the sink. Never fails; sink errors are logged.
    pub fn track(&self, event: TrackingEvent) {
        if self.shutdown.is_cancelled() {
            tracing::trace!(event = event.name(), "Tracker shut down, dropping event");
            return;
        }

        let entry = DataLayerEntry {
            event: event.name().to_string(),
            properties: event.properties(),
            timestamp: Utc::now(),
            page_url: self.page.url.clone(),
            page_title: self.page.title.clone(),
        };

        if let Err(e) = self.sink.dispatch(entry) {
            tracing::warn!(event = event.name(), error = %e, "Failed to dispatch analytics event");
        }
    }

    /// Stop dispatching. Shared by every clone of this tracker.
    pub fn shutdown(&self) {
        tracing::debug!("Analytics tracker shut down");
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("page", &self.page)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page() -> PageContext {
        PageContext::new("https://agenciakaizen.com.br/franquia/", "Seja um franqueado")
    }

    #[test]
    fn test_properties_omit_event_name() {
        let event = TrackingEvent::FunnelStep {
            step_number: 2,
            step_action: StepAction::Complete,
            step_name: "franchise_step_2".to_string(),
            application_id: Some("abc123".to_string()),
        };
        assert_eq!(event.name(), "funnel_step");
        assert_eq!(
            Value::Object(event.properties()),
            json!({
                "step_number": 2,
                "step_action": "complete",
                "step_name": "franchise_step_2",
                "application_id": "abc123"
            })
        );
    }

    #[test]
    fn test_load_more_event_shape() {
        let event = TrackingEvent::ListLoadMore {
            source: "articles".to_string(),
            page: 2,
            total: 30,
        };
        assert_eq!(event.name(), "blog_load_more");
        assert_eq!(
            Value::Object(event.properties()),
            json!({"feed": "articles", "page": 2, "total": 30})
        );
    }

    #[test]
    fn test_site_event_names_and_shapes() {
        let event = TrackingEvent::CtaClick {
            cta_name: "Fale conosco".to_string(),
            cta_location: "hero".to_string(),
        };
        assert_eq!(event.name(), "cta_click");
        assert_eq!(
            Value::Object(event.properties()),
            json!({"cta_name": "Fale conosco", "cta_location": "hero"})
        );

        let event = TrackingEvent::ScrollDepth { scroll_depth: 75 };
        assert_eq!(event.name(), "scroll_depth");
        assert_eq!(event.properties()["scroll_depth"], 75);

        let event = TrackingEvent::ExternalLinkClick {
            link_url: "https://wa.me/5511999999999".to_string(),
            link_text: "WhatsApp".to_string(),
            link_location: "footer".to_string(),
        };
        assert_eq!(event.name(), "external_link_click");
        assert_eq!(event.properties()["link_text"], "WhatsApp");

        let event = TrackingEvent::CalendlyScheduled {
            event_id: "evt_1".to_string(),
            event_uri: "https://calendly.com/events/evt_1".to_string(),
            scheduled_date: "2025-03-10".to_string(),
            lead_id: None,
        };
        assert_eq!(event.name(), "calendly_scheduled");
        assert_eq!(event.properties()["lead_id"], Value::Null);
    }

    #[test]
    fn test_custom_event_keeps_reserved_keys_for_the_tracker() {
        let event = TrackingEvent::custom(
            "contact_form_submit",
            json!({"form_type": "contact_page", "success": true, "event": "spoofed", "page_url": "x"}),
        );
        assert_eq!(event.name(), "contact_form_submit");
        assert_eq!(
            Value::Object(event.properties()),
            json!({"form_type": "contact_page", "success": true})
        );

        let (sink, mut rx) = ChannelSink::new();
        Tracker::new(sink, page()).track(event);
        let flat = serde_json::to_value(rx.try_recv().unwrap()).unwrap();
        assert_eq!(flat["event"], "contact_form_submit");
        assert_eq!(flat["page_url"], "https://agenciakaizen.com.br/franquia/");
        assert_eq!(flat["form_type"], "contact_page");
    }

    #[test]
    fn test_custom_event_with_scalar_payload() {
        let event = TrackingEvent::custom("video_play", json!("hero"));
        assert_eq!(event.properties()["value"], "hero");
        assert!(TrackingEvent::custom("ping", Value::Null).properties().is_empty());
    }

    #[test]
    fn test_entry_carries_page_context() {
        let (sink, mut rx) = ChannelSink::new();
        let tracker = Tracker::new(sink, page());

        tracker.track(TrackingEvent::ModalOpen {
            modal_name: "franchise_modal".to_string(),
            modal_trigger: "button_click".to_string(),
        });

        let entry = rx.try_recv().unwrap();
        assert_eq!(entry.event, "modal_open");
        assert_eq!(entry.page_url, "https://agenciakaizen.com.br/franquia/");
        assert_eq!(entry.page_title, "Seja um franqueado");
        assert_eq!(entry.properties["modal_trigger"], "button_click");

        let flat = serde_json::to_value(&entry).unwrap();
        assert_eq!(flat["event"], "modal_open");
        assert_eq!(flat["modal_name"], "franchise_modal");
    }

    #[test]
    fn test_dropped_receiver_is_not_an_error_for_callers() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        let tracker = Tracker::new(sink, page());
        // Logged and ignored
        tracker.track(TrackingEvent::ModalClose {
            modal_name: "franchise_modal".to_string(),
            close_reason: "user_close".to_string(),
        });
    }

    #[test]
    fn test_shutdown_stops_all_clones() {
        let (sink, mut rx) = ChannelSink::new();
        let tracker = Tracker::new(sink, page());
        let clone = tracker.clone();

        tracker.shutdown();
        clone.track(TrackingEvent::ModalClose {
            modal_name: "franchise_modal".to_string(),
            close_reason: "user_close".to_string(),
        });

        assert!(clone.is_shut_down());
        assert!(rx.try_recv().is_err());
    }
}
