use async_trait::async_trait;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::error::Result;
use crate::source::{ConfigSource, ConfigWatcher};

/// 文件配置源
///
/// 扩展名为 `.json` 时按 JSON 解析，否则按 TOML 解析。
pub struct FileSource<T> {
    path: PathBuf,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> FileSource<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _phantom: std::marker::PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_json(&self) -> bool {
        self.path.extension().and_then(|s| s.to_str()) == Some("json")
    }
}

impl<T> FileSource<T>
where
    T: DeserializeOwned,
{
    /// 解析配置文本
    pub fn parse(&self, content: &str) -> Result<T> {
        let config = if self.is_json() {
            serde_json::from_str(content)?
        } else {
            toml::from_str(content)?
        };
        Ok(config)
    }
}

#[async_trait]
impl<T> ConfigSource<T> for FileSource<T>
where
    T: Clone + DeserializeOwned + Send + Sync + 'static,
{
    async fn load(&self) -> Result<T> {
        debug!("Loading config from file: {:?}", self.path);

        let content = fs::read_to_string(&self.path).await?;
        self.parse(&content)
    }

    async fn watch(&self) -> Result<ConfigWatcher> {
        let (tx, rx) = mpsc::channel(10);
        let path = self.path.clone();

        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut watcher: RecommendedWatcher = Watcher::new(notify_tx, notify::Config::default())?;
        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        std::thread::spawn(move || {
            // watcher 必须与线程同生命周期
            let _watcher = watcher;
            debug!("File watcher started for: {:?}", path);

            loop {
                match notify_rx.recv() {
                    Ok(Ok(Event { kind, .. })) => {
                        use notify::EventKind::*;
                        match kind {
                            Modify(_) | Create(_) => {
                                debug!("Config file changed: {:?}", path);
                                if tx.blocking_send(()).is_err() {
                                    break;
                                }
                            }
                            _ => {}
                        }
                    }
                    Ok(Err(e)) => {
                        error!("Watch error: {}", e);
                    }
                    Err(e) => {
                        error!("Channel error: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(ConfigWatcher::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use serde::Deserialize;

    #[derive(Debug, Clone, Deserialize, PartialEq)]
    struct TestConfig {
        name: String,
        value: i32,
    }

    #[tokio::test]
    async fn test_file_source_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.toml");
        std::fs::write(&path, "name = \"test\"\nvalue = 42\n").unwrap();

        let source = FileSource::new(&path);
        let loaded: TestConfig = source.load().await.unwrap();

        assert_eq!(
            loaded,
            TestConfig {
                name: "test".to_string(),
                value: 42,
            }
        );
    }

    #[tokio::test]
    async fn test_file_source_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.json");
        std::fs::write(&path, r#"{"name": "test", "value": 7}"#).unwrap();

        let source = FileSource::new(&path);
        let loaded: TestConfig = source.load().await.unwrap();

        assert_eq!(loaded.value, 7);
    }

    #[tokio::test]
    async fn test_file_source_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source: FileSource<TestConfig> = FileSource::new(dir.path().join("absent.toml"));

        let err = source.load().await.unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[tokio::test]
    async fn test_file_source_invalid_content_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "name = ").unwrap();

        let source: FileSource<TestConfig> = FileSource::new(&path);
        let err = source.load().await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
