//! Client-side core of the Agência Kaizen website.
//!
//! Two protocols live here, on top of an abstract [`HttpClient`]:
//!
//! - [`ListLoader`]: incremental "load more" pagination over the content API,
//!   with a single-flight guard so racing triggers never fetch the same page twice.
//! - [`WizardController`]: the six-step franchise application, which saves every
//!   step before advancing and keeps one server-assigned application id for the run.
//!
//! The contact page's form ([`ContactForm`]) shares the validation rules and the
//! backend reply handling with the wizard.
//!
//! Analytics ([`Tracker`]), notifications ([`NotificationCenter`]) and
//! configuration ([`SiteConfig`]) are plain values constructed by the caller and
//! passed in; nothing here is global.

pub mod analytics;
pub mod config;
pub mod contact;
pub mod content;
pub mod domain;
mod envelope;
pub mod error;
pub mod http;
pub mod loader;
pub mod notify;
pub mod validation;
pub mod wizard;

// Re-export commonly used types
pub use analytics::{AnalyticsSink, ChannelSink, PageContext, Tracker, TracingSink, TrackingEvent};
pub use config::SiteConfig;
pub use contact::{ContactForm, ContactSent};
pub use content::{ArticleFeed, CompanyFeed, ContentApi};
pub use domain::{Article, Company, ListPage, ListParams, Location};
pub use error::{ErrorKind, KaizenError, Result};
pub use http::{HttpClient, HttpRequest, HttpResponse, MockHttpClient, ReqwestHttpClient};
pub use loader::{
    IntersectionEntry, IntersectionWatch, ListLoader, LoadOutcome, LoaderState, PageSource, Trigger,
};
pub use notify::{Catalog, NotificationCenter, NotificationKind, Notifier};
pub use validation::{FieldErrors, FieldKind, FieldSpec, ValidationMessage};
pub use wizard::{
    ApplicationId, Attribution, FlowDefinition, FranchiseApi, SessionId, StepNumber,
    WizardController, WizardServices, WizardSnapshot, WizardState,
};
