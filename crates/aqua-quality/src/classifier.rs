use crate::aggregator::{LatestReadingAggregator, PoolSnapshot};
use crate::error::{QualityError, Result};
use crate::store::ReadingStore;
use aqua_types::{PoolId, QualityClassification, QualityLabel, SensorType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 预测服务请求体
///
/// 缺失的读数序列化为 `null`，由预测服务自行处理。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub temp: Option<f64>,
    pub turbidity: Option<f64>,
    #[serde(rename = "do")]
    pub dissolved_oxygen: Option<f64>,
    /// 以 ORP 读数作为 BOD 代理值
    pub bod: Option<f64>,
    pub ph: Option<f64>,
    pub ammonia: Option<f64>,
    pub nitrite: Option<f64>,
}

impl PredictionRequest {
    pub fn from_snapshot(snapshot: &PoolSnapshot) -> Self {
        Self {
            temp: snapshot.value(SensorType::Temperature),
            turbidity: snapshot.value(SensorType::Turbidity),
            dissolved_oxygen: snapshot.value(SensorType::DissolvedOxygen),
            bod: snapshot.value(SensorType::Orp),
            ph: snapshot.value(SensorType::Ph),
            ammonia: snapshot.value(SensorType::Ammonia),
            nitrite: snapshot.value(SensorType::Nitrite),
        }
    }
}

/// 预测服务响应体
///
/// `{"quality": "Good", "probabilities": {"Excellent": .., "Good": .., "Poor": ..}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub quality: String,
    pub probabilities: ClassProbabilities,
}

/// 各水质等级的概率
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    #[serde(rename = "Excellent")]
    pub excellent: f64,
    #[serde(rename = "Good")]
    pub good: f64,
    #[serde(rename = "Poor")]
    pub poor: f64,
}

/// 解析后的预测结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub quality: QualityLabel,
    pub probability_excellent: f64,
    pub probability_good: f64,
    pub probability_poor: f64,
}

impl TryFrom<PredictionResponse> for Prediction {
    type Error = QualityError;

    fn try_from(response: PredictionResponse) -> Result<Self> {
        let quality = response
            .quality
            .parse::<QualityLabel>()
            .map_err(|e| QualityError::Upstream(format!("malformed prediction: {}", e)))?;

        let ClassProbabilities {
            excellent,
            good,
            poor,
        } = response.probabilities;
        if [excellent, good, poor].iter().any(|p| !p.is_finite()) {
            return Err(QualityError::Upstream(
                "malformed prediction: non-finite probability".to_string(),
            ));
        }

        Ok(Self {
            quality,
            probability_excellent: excellent,
            probability_good: good,
            probability_poor: poor,
        })
    }
}

/// 外部预测服务
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(&self, request: &PredictionRequest) -> Result<Prediction>;

    /// 预测服务标识（用于日志）
    fn endpoint(&self) -> &str;
}

/// HTTP 预测服务客户端
pub struct HttpPredictor {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpPredictor {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            timeout,
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> QualityError {
        if e.is_timeout() {
            QualityError::Timeout(self.timeout)
        } else {
            QualityError::Upstream(format!("request to {} failed: {}", self.endpoint, e))
        }
    }
}

#[async_trait]
impl Predictor for HttpPredictor {
    async fn predict(&self, request: &PredictionRequest) -> Result<Prediction> {
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(QualityError::Upstream(format!(
                "prediction service returned HTTP {}",
                status
            )));
        }

        let body: PredictionResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                QualityError::Timeout(self.timeout)
            } else {
                QualityError::Upstream(format!("malformed prediction payload: {}", e))
            }
        })?;

        Prediction::try_from(body)
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// 水质分类编排器
///
/// 快照 -> 构造请求 -> 调用预测服务 -> 持久化。失败时不写入任何结果，也不重试。
pub struct ClassifierOrchestrator {
    aggregator: LatestReadingAggregator,
    predictor: Arc<dyn Predictor>,
    store: Arc<dyn ReadingStore>,
}

impl ClassifierOrchestrator {
    pub fn new(store: Arc<dyn ReadingStore>, predictor: Arc<dyn Predictor>) -> Self {
        Self {
            aggregator: LatestReadingAggregator::new(store.clone()),
            predictor,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn ReadingStore> {
        &self.store
    }

    /// 对一个池做一次分类
    pub async fn classify(&self, pool_id: PoolId) -> Result<QualityClassification> {
        let snapshot = self.aggregator.snapshot(pool_id).await?;
        let request = PredictionRequest::from_snapshot(&snapshot);

        debug!(
            pool_id = pool_id,
            endpoint = %self.predictor.endpoint(),
            request = ?request,
            "Requesting water quality prediction"
        );

        let prediction = self.predictor.predict(&request).await.map_err(|e| {
            warn!(
                pool_id = pool_id,
                endpoint = %self.predictor.endpoint(),
                error = %e,
                "Water quality prediction failed"
            );
            e
        })?;

        let classification = QualityClassification::new(
            pool_id,
            prediction.quality,
            prediction.probability_excellent,
            prediction.probability_good,
            prediction.probability_poor,
        );
        let saved = self.store.save_classification(&classification).await?;

        info!(
            pool_id = pool_id,
            quality = %saved.quality,
            probability_excellent = saved.probability_excellent,
            probability_good = saved.probability_good,
            probability_poor = saved.probability_poor,
            "Water quality classified"
        );

        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryReadingStore;
    use aqua_types::Reading;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use tokio_test::{assert_err, assert_ok};

    /// 按池返回预设结果的预测器，记录收到的请求
    struct ScriptedPredictor {
        requests: Mutex<Vec<PredictionRequest>>,
        result: std::result::Result<Prediction, String>,
    }

    impl ScriptedPredictor {
        fn ok(quality: QualityLabel) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                result: Ok(Prediction {
                    quality,
                    probability_excellent: 0.1,
                    probability_good: 0.8,
                    probability_poor: 0.1,
                }),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                result: Err(message.to_string()),
            }
        }
    }

    #[async_trait]
    impl Predictor for ScriptedPredictor {
        async fn predict(&self, request: &PredictionRequest) -> Result<Prediction> {
            self.requests.lock().unwrap().push(request.clone());
            self.result.clone().map_err(QualityError::Upstream)
        }

        fn endpoint(&self) -> &str {
            "scripted"
        }
    }

    #[test]
    fn test_request_serializes_missing_as_null() {
        let mut snapshot = PoolSnapshot::new(3);
        snapshot.insert(Reading::new(3, SensorType::Ph, 7.2));
        snapshot.insert(Reading::new(3, SensorType::Orp, 320.0));

        let request = PredictionRequest::from_snapshot(&snapshot);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["ph"], 7.2);
        assert_eq!(json["bod"], 320.0);
        assert!(json["ammonia"].is_null());
        assert!(json["do"].is_null());
        assert_eq!(json.as_object().unwrap().len(), 7);
    }

    #[test]
    fn test_response_decodes_nested_probabilities() {
        let response: PredictionResponse = serde_json::from_str(
            r#"{"quality":"Good","probabilities":{"Excellent":0.1,"Good":0.8,"Poor":0.1}}"#,
        )
        .unwrap();

        let prediction = assert_ok!(Prediction::try_from(response));
        assert_eq!(prediction.quality, QualityLabel::Good);
        assert_eq!(prediction.probability_excellent, 0.1);
        assert_eq!(prediction.probability_good, 0.8);
        assert_eq!(prediction.probability_poor, 0.1);
    }

    #[test]
    fn test_response_label_validation() {
        let response = |quality: &str| PredictionResponse {
            quality: quality.to_string(),
            probabilities: ClassProbabilities {
                excellent: 0.6,
                good: 0.3,
                poor: 0.1,
            },
        };

        let prediction = Prediction::try_from(response("excellent")).unwrap();
        assert_eq!(prediction.quality, QualityLabel::Excellent);

        let err = assert_err!(Prediction::try_from(response("Murky")));
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn test_classify_with_missing_ammonia() {
        let store = Arc::new(MemoryReadingStore::new());
        store.add_pool(3).await;
        store
            .record_reading(Reading::new(3, SensorType::Ph, 7.0))
            .await
            .unwrap();
        store
            .record_reading(Reading::new(3, SensorType::Temperature, 24.5))
            .await
            .unwrap();

        let predictor = Arc::new(ScriptedPredictor::ok(QualityLabel::Good));
        let orchestrator = ClassifierOrchestrator::new(store.clone(), predictor.clone());

        let classification = orchestrator.classify(3).await.unwrap();
        assert_eq!(classification.quality, QualityLabel::Good);
        assert!(classification.id.is_some());

        let requests = predictor.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].ammonia, None);
        assert_eq!(requests[0].temp, Some(24.5));
        drop(requests);

        assert_eq!(store.classification_count().await, 1);
    }

    #[tokio::test]
    async fn test_failed_prediction_persists_nothing() {
        let store = Arc::new(MemoryReadingStore::new());
        store.add_pool(1).await;

        let orchestrator = ClassifierOrchestrator::new(
            store.clone(),
            Arc::new(ScriptedPredictor::failing("HTTP 500")),
        );

        let err = assert_err!(orchestrator.classify(1).await);
        assert!(err.is_upstream());
        assert_eq!(store.classification_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_pool_skips_prediction() {
        let store = Arc::new(MemoryReadingStore::new());
        let predictor = Arc::new(ScriptedPredictor::ok(QualityLabel::Good));
        let orchestrator = ClassifierOrchestrator::new(store, predictor.clone());

        let err = orchestrator.classify(8).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(predictor.requests.lock().unwrap().is_empty());
    }

    /// 模拟预测服务：记录收到的请求体，延迟后以固定状态码和响应体应答
    async fn mock_predictor(
        status: StatusCode,
        body: Value,
        delay: Duration,
    ) -> (String, Arc<Mutex<Vec<Value>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let recorder = received.clone();

        let app = Router::new().route(
            "/predict",
            post(move |Json(request): Json<Value>| {
                let recorder = recorder.clone();
                let body = body.clone();
                async move {
                    recorder.lock().unwrap().push(request);
                    tokio::time::sleep(delay).await;
                    (status, Json(body))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/predict", addr), received)
    }

    fn sample_request() -> PredictionRequest {
        PredictionRequest {
            temp: Some(25.0),
            turbidity: None,
            dissolved_oxygen: Some(6.4),
            bod: None,
            ph: Some(7.3),
            ammonia: None,
            nitrite: Some(0.1),
        }
    }

    #[tokio::test]
    async fn test_http_predictor_success() {
        let (endpoint, received) = mock_predictor(
            StatusCode::OK,
            json!({
                "quality": "Excellent",
                "probabilities": {"Excellent": 0.7, "Good": 0.2, "Poor": 0.1}
            }),
            Duration::ZERO,
        )
        .await;

        let predictor = HttpPredictor::new(endpoint, Duration::from_secs(5));
        let prediction = assert_ok!(predictor.predict(&sample_request()).await);
        assert_eq!(prediction.quality, QualityLabel::Excellent);
        assert_eq!(prediction.probability_excellent, 0.7);
        assert_eq!(prediction.probability_poor, 0.1);

        let requests = received.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["do"], 6.4);
        assert!(requests[0]["ammonia"].is_null());
    }

    #[tokio::test]
    async fn test_http_predictor_non_2xx_is_upstream() {
        let (endpoint, _) = mock_predictor(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({"error": "busy"}),
            Duration::ZERO,
        )
        .await;

        let predictor = HttpPredictor::new(endpoint, Duration::from_secs(5));
        let err = assert_err!(predictor.predict(&sample_request()).await);
        assert!(matches!(err, QualityError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_http_predictor_flat_probabilities_are_upstream() {
        let (endpoint, _) = mock_predictor(
            StatusCode::OK,
            json!({"quality": "Good", "probability_good": 0.8}),
            Duration::ZERO,
        )
        .await;

        let predictor = HttpPredictor::new(endpoint, Duration::from_secs(5));
        let err = assert_err!(predictor.predict(&sample_request()).await);
        assert!(matches!(err, QualityError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_http_predictor_timeout() {
        let (endpoint, _) = mock_predictor(
            StatusCode::OK,
            json!({
                "quality": "Good",
                "probabilities": {"Excellent": 0.1, "Good": 0.8, "Poor": 0.1}
            }),
            Duration::from_secs(60),
        )
        .await;

        let predictor = HttpPredictor::new(endpoint, Duration::from_millis(200));
        let err = assert_err!(predictor.predict(&sample_request()).await);
        assert!(matches!(err, QualityError::Timeout(_)));
        assert!(err.is_upstream());
    }
}
