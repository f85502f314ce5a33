use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// 配置源抽象
#[async_trait]
pub trait ConfigSource<T>: Send + Sync
where
    T: Clone + Send + Sync,
{
    /// 加载配置
    async fn load(&self) -> Result<T>;

    /// 监听配置变更
    async fn watch(&self) -> Result<ConfigWatcher>;
}

/// 配置监听器
pub struct ConfigWatcher {
    rx: mpsc::Receiver<()>,
}

impl ConfigWatcher {
    pub fn new(rx: mpsc::Receiver<()>) -> Self {
        Self { rx }
    }

    pub async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }
}

/// 内存配置源
///
/// 用于测试以及在代码中直接提供配置的场景；`set` 之后会通知监听者。
pub struct StaticSource<T> {
    config: Arc<RwLock<T>>,
    watchers: Arc<RwLock<Vec<mpsc::Sender<()>>>>,
}

impl<T> StaticSource<T>
where
    T: Clone + Send + Sync,
{
    pub fn new(config: T) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            watchers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// 替换配置并通知监听者
    pub async fn set(&self, config: T) {
        *self.config.write().await = config;

        let mut watchers = self.watchers.write().await;
        watchers.retain(|tx| !tx.is_closed());
        for tx in watchers.iter() {
            let _ = tx.try_send(());
        }
    }
}

#[async_trait]
impl<T> ConfigSource<T> for StaticSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn load(&self) -> Result<T> {
        Ok(self.config.read().await.clone())
    }

    async fn watch(&self) -> Result<ConfigWatcher> {
        let (tx, rx) = mpsc::channel(1);
        self.watchers.write().await.push(tx);
        Ok(ConfigWatcher::new(rx))
    }
}
