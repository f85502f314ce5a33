use crate::cooldown::CooldownTracker;
use crate::evaluator::AlertDescriptor;
use aqua_notify::{Delivery, Notifier, NotifyMessage};
use aqua_types::AlertDirection;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// 一次告警分发的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DispatchOutcome {
    /// 是否因冷却被抑制
    pub suppressed: bool,
    /// 尝试投递的目标数
    pub attempted: usize,
    /// 投递成功的目标数
    pub succeeded: usize,
}

impl DispatchOutcome {
    pub fn suppressed() -> Self {
        Self {
            suppressed: true,
            ..Self::default()
        }
    }

    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }
}

/// 读数按原值输出，整数补一位小数
fn number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// 告警消息正文
pub fn alert_text(descriptor: &AlertDescriptor) -> String {
    let (state, relation) = match descriptor.direction {
        AlertDirection::TooLow => ("too low", "below minimum"),
        AlertDirection::TooHigh => ("too high", "above maximum"),
    };
    let unit = &descriptor.unit;

    format!(
        "Pool {}: {} is {} ({} {}, {} {} {}). Acceptable range: {}–{} {}.",
        descriptor.pool_id,
        descriptor.display_name,
        state,
        number(descriptor.value),
        unit,
        relation,
        number(descriptor.violated_bound()),
        unit,
        number(descriptor.min),
        number(descriptor.max),
        unit,
    )
}

/// 告警分发器
///
/// 冷却检查 -> 格式化 -> 逐目标独立投递 -> 记录冷却。
/// 单个目标失败或超时只记日志，不影响其他目标，也不向上传播。
pub struct AlertDispatcher {
    notifier: Arc<dyn Notifier>,
    destinations: Vec<String>,
    cooldown: Arc<CooldownTracker>,
    send_timeout: Duration,
}

impl AlertDispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        destinations: Vec<String>,
        cooldown: Arc<CooldownTracker>,
        send_timeout: Duration,
    ) -> Self {
        if destinations.is_empty() {
            warn!("Alert dispatcher created without destinations");
        }
        Self {
            notifier,
            destinations,
            cooldown,
            send_timeout,
        }
    }

    pub fn cooldown(&self) -> &Arc<CooldownTracker> {
        &self.cooldown
    }

    pub fn destinations(&self) -> &[String] {
        &self.destinations
    }

    fn build_message(descriptor: &AlertDescriptor) -> NotifyMessage {
        NotifyMessage::critical(
            format!("Water quality alert: pool {}", descriptor.pool_id),
            alert_text(descriptor),
        )
        .with_tag("pool_id", descriptor.pool_id)
        .with_tag("sensor_type", descriptor.sensor_type)
        .with_tag("value", descriptor.value)
        .with_tag("min", descriptor.min)
        .with_tag("max", descriptor.max)
        .with_tag(
            "direction",
            match descriptor.direction {
                AlertDirection::TooLow => "too_low",
                AlertDirection::TooHigh => "too_high",
            },
        )
    }

    /// 分发告警
    pub async fn dispatch(&self, descriptor: &AlertDescriptor) -> DispatchOutcome {
        let permit = self.cooldown.acquire(descriptor.key()).await;
        if !permit.can_alert() {
            debug!(
                pool_id = descriptor.pool_id,
                sensor_type = %descriptor.sensor_type,
                "Alert suppressed by cooldown"
            );
            return DispatchOutcome::suppressed();
        }

        let message = Self::build_message(descriptor);
        let sends = self
            .destinations
            .iter()
            .map(|destination| self.send_one(&message, destination, descriptor));
        let results = join_all(sends).await;

        // 尽力投递一轮即计入冷却，避免对故障渠道反复重试
        permit.record();

        let outcome = DispatchOutcome {
            suppressed: false,
            attempted: results.len(),
            succeeded: results.into_iter().filter(|ok| *ok).count(),
        };

        info!(
            pool_id = descriptor.pool_id,
            sensor_type = %descriptor.sensor_type,
            direction = ?descriptor.direction,
            value = descriptor.value,
            attempted = outcome.attempted,
            succeeded = outcome.succeeded,
            "Alert dispatched"
        );

        outcome
    }

    async fn send_one(
        &self,
        message: &NotifyMessage,
        destination: &str,
        descriptor: &AlertDescriptor,
    ) -> bool {
        match timeout(self.send_timeout, self.notifier.send(message, destination)).await {
            Ok(Ok(Delivery::Delivered)) => true,
            Ok(Ok(Delivery::Rejected(reason))) => {
                warn!(
                    pool_id = descriptor.pool_id,
                    sensor_type = %descriptor.sensor_type,
                    destination = %destination,
                    notifier = self.notifier.name(),
                    "Notification rejected: {}",
                    reason
                );
                false
            }
            Ok(Err(e)) => {
                warn!(
                    pool_id = descriptor.pool_id,
                    sensor_type = %descriptor.sensor_type,
                    destination = %destination,
                    notifier = self.notifier.name(),
                    error = %e,
                    "Notification error"
                );
                false
            }
            Err(_) => {
                warn!(
                    pool_id = descriptor.pool_id,
                    sensor_type = %descriptor.sensor_type,
                    destination = %destination,
                    notifier = self.notifier.name(),
                    timeout = ?self.send_timeout,
                    "Notification timed out"
                );
                false
            }
        }
    }
}
