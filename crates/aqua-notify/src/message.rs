use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 通知级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyLevel {
    Info,
    Warning,
    Critical,
}

impl NotifyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyLevel::Info => "info",
            NotifyLevel::Warning => "warning",
            NotifyLevel::Critical => "critical",
        }
    }

    /// Slack 附件颜色
    pub fn color(&self) -> &'static str {
        match self {
            NotifyLevel::Info => "good",
            NotifyLevel::Warning => "warning",
            NotifyLevel::Critical => "danger",
        }
    }
}

impl fmt::Display for NotifyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 出站通知
///
/// `tags` 携带结构化上下文（池、传感器、数值等），由各渠道按需展示。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyMessage {
    pub subject: String,
    pub body: String,
    pub level: NotifyLevel,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl NotifyMessage {
    pub fn new(level: NotifyLevel, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            level,
            created_at: Utc::now(),
            tags: BTreeMap::new(),
        }
    }

    pub fn critical(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NotifyLevel::Critical, subject, body)
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.tags.insert(key.into(), value.to_string());
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags() {
        let message = NotifyMessage::critical("Water quality alert: pool 7", "pH too high")
            .with_tag("pool_id", 7)
            .with_tag("sensor_type", "ph");

        assert_eq!(message.level, NotifyLevel::Critical);
        assert_eq!(message.tag("pool_id"), Some("7"));
        assert_eq!(message.tag("value"), None);
    }

    #[test]
    fn test_level_serialization() {
        assert_eq!(
            serde_json::to_value(NotifyLevel::Warning).unwrap(),
            serde_json::json!("warning")
        );
        assert!(NotifyLevel::Critical > NotifyLevel::Info);
        assert_eq!(NotifyLevel::Critical.color(), "danger");
    }
}
