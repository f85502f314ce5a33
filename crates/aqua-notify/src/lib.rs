pub mod message;
pub mod notifier;
pub mod providers;

pub use message::{NotifyLevel, NotifyMessage};
pub use notifier::{Delivery, Notifier};
pub use providers::{
    build_notifier, EmailConfig, EmailNotifier, LogNotifier, NotifierConfig, SlackConfig,
    SlackNotifier, SmsConfig, SmsNotifier, WebhookConfig, WebhookNotifier,
};
