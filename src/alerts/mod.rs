//! Edge-triggered alerting on consecutive evaluation outcomes
//!
//! Each service task owns an [`AlertEngine`] that turns failure and success
//! streaks into notifications delivered through the [`NotifierRegistry`].

pub mod config;
pub mod engine;
pub mod notifier;

pub use config::{AlertConfig, AlertPhase, AlertState, AlertTransition};
pub use engine::{AlertBoard, AlertEngine, AlertSnapshot};
pub use notifier::{
    LogNotifier, Notifier, NotifierError, NotifierRegistry, WebhookConfig, WebhookNotifier,
    LOG_PROVIDER,
};
