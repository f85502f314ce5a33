use crate::message::NotifyMessage;
use crate::notifier::{Delivery, Notifier};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// 通知器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotifierConfig {
    Webhook(WebhookConfig),
    Slack(SlackConfig),
    Email(EmailConfig),
    /// 短信网关，目标为手机号
    Sms(SmsConfig),
    /// 仅写日志，不做网络投递
    Log,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        NotifierConfig::Log
    }
}

/// 根据配置创建通知器
pub fn build_notifier(config: &NotifierConfig) -> Result<Arc<dyn Notifier>> {
    let notifier: Arc<dyn Notifier> = match config {
        NotifierConfig::Webhook(c) => Arc::new(WebhookNotifier::new(c.clone())),
        NotifierConfig::Slack(c) => Arc::new(SlackNotifier::new(c.clone())),
        NotifierConfig::Email(c) => Arc::new(EmailNotifier::new(c.clone())?),
        NotifierConfig::Sms(c) => Arc::new(SmsNotifier::new(c.clone())),
        NotifierConfig::Log => Arc::new(LogNotifier),
    };
    info!("Notifier configured: {}", notifier.name());
    Ok(notifier)
}

// ============================================================================
// 邮件通知
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

fn default_smtp_port() -> u16 {
    587
}

pub struct EmailNotifier {
    config: EmailConfig,
    mailer: lettre::AsyncSmtpTransport<lettre::Tokio1Executor>,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Result<Self> {
        use lettre::transport::smtp::authentication::Credentials;
        use lettre::{AsyncSmtpTransport, Tokio1Executor};

        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
            .credentials(creds)
            .port(config.smtp_port)
            .build();

        Ok(Self { config, mailer })
    }

    fn render_body(message: &NotifyMessage) -> String {
        let mut body = format!("{}\n\n", message.body);
        for (key, value) in &message.tags {
            body.push_str(&format!("{}: {}\n", key, value));
        }
        body.push_str(&format!(
            "level: {}\ntime: {}\n",
            message.level,
            message.created_at.to_rfc3339()
        ));
        body
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, message: &NotifyMessage, destination: &str) -> Result<Delivery> {
        use lettre::message::header::ContentType;
        use lettre::{AsyncTransport, Message};

        let email = Message::builder()
            .from(self.config.from.parse()?)
            .to(destination.parse()?)
            .subject(&message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(Self::render_body(message))?;

        match self.mailer.send(email).await {
            Ok(_) => Ok(Delivery::Delivered),
            Err(e) => Ok(Delivery::Rejected(format!("Email send failed: {}", e))),
        }
    }

    fn name(&self) -> &str {
        "email"
    }
}

// ============================================================================
// Webhook 通知
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
}

pub struct WebhookNotifier {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn build_message(&self, message: &NotifyMessage, destination: &str) -> serde_json::Value {
        serde_json::json!({
            "destination": destination,
            "subject": message.subject,
            "text": message.body,
            "level": message.level,
            "timestamp": message.created_at.to_rfc3339(),
            "tags": message.tags,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &NotifyMessage, destination: &str) -> Result<Delivery> {
        let mut request = self.client.post(&self.config.url);

        if let Some(headers) = &self.config.headers {
            for (key, value) in headers {
                request = request.header(key, value);
            }
        }

        let response = request
            .json(&self.build_message(message, destination))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(Delivery::Delivered)
        } else {
            Ok(Delivery::Rejected(format!(
                "Webhook failed with status: {}",
                response.status()
            )))
        }
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

// ============================================================================
// Slack 通知
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    pub webhook_url: String,
}

pub struct SlackNotifier {
    config: SlackConfig,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(config: SlackConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn build_message(&self, message: &NotifyMessage, destination: &str) -> serde_json::Value {
        let fields: Vec<serde_json::Value> = message
            .tags
            .iter()
            .map(|(key, value)| {
                serde_json::json!({
                    "title": key,
                    "value": value,
                    "short": true
                })
            })
            .collect();

        serde_json::json!({
            "channel": destination,
            "attachments": [{
                "color": message.level.color(),
                "title": message.subject,
                "text": message.body,
                "fields": fields,
                "ts": message.created_at.timestamp()
            }]
        })
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, message: &NotifyMessage, destination: &str) -> Result<Delivery> {
        let body = self.build_message(message, destination);

        let response = self
            .client
            .post(&self.config.webhook_url)
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(Delivery::Delivered)
        } else {
            Ok(Delivery::Rejected(format!(
                "Slack failed: {}",
                response.status()
            )))
        }
    }

    fn name(&self) -> &str {
        "slack"
    }
}

// ============================================================================
// 短信通知
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsConfig {
    #[serde(default = "default_sms_api_url")]
    pub api_url: String,
    pub api_key: String,
    /// 发送方号码
    pub from: String,
}

fn default_sms_api_url() -> String {
    "https://api.infobip.com/sms/2/text/advanced".to_string()
}

pub struct SmsNotifier {
    config: SmsConfig,
    client: reqwest::Client,
}

impl SmsNotifier {
    pub fn new(config: SmsConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// 短信只发送正文
    fn build_message(&self, message: &NotifyMessage, phone_number: &str) -> serde_json::Value {
        serde_json::json!({
            "messages": [{
                "destinations": [{ "to": phone_number }],
                "from": self.config.from,
                "text": message.body
            }]
        })
    }
}

#[async_trait]
impl Notifier for SmsNotifier {
    async fn send(&self, message: &NotifyMessage, destination: &str) -> Result<Delivery> {
        let response = self
            .client
            .post(&self.config.api_url)
            .header("Authorization", format!("App {}", self.config.api_key))
            .header("Accept", "application/json")
            .json(&self.build_message(message, destination))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(Delivery::Delivered)
        } else {
            let detail = response.text().await.unwrap_or_default();
            Ok(Delivery::Rejected(format!("SMS failed with status {}: {}", status, detail)))
        }
    }

    fn name(&self) -> &str {
        "sms"
    }
}

// ============================================================================
// 日志通知
// ============================================================================

/// 未配置外部渠道时使用，只输出日志
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &NotifyMessage, destination: &str) -> Result<Delivery> {
        info!(
            destination = %destination,
            level = %message.level,
            tags = ?message.tags,
            "{}: {}",
            message.subject,
            message.body
        );
        Ok(Delivery::Delivered)
    }

    fn name(&self) -> &str {
        "log"
    }
}
