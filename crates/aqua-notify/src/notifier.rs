use crate::message::NotifyMessage;
use anyhow::Result;
use async_trait::async_trait;

/// 单次投递结果
///
/// 渠道明确拒绝（如非 2xx 响应）时为 `Rejected`；网络层错误通过 `Err` 返回。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Rejected(String),
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered)
    }
}

/// 通知渠道
///
/// 每次调用只投递到一个目标，目标含义（邮箱、频道、会话 ID）由具体实现解释。
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &NotifyMessage, destination: &str) -> Result<Delivery>;

    /// 渠道名称
    fn name(&self) -> &str;
}
