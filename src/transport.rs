//! HTTP transport to the inference server.
//!
//! One attempt per call, no retry, no queueing: the scheduler already
//! guarantees a single outstanding exchange, and its next tick is the
//! retry mechanism.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::ServerConfig;
use crate::protocol::{InferenceRequest, InferenceResponse, SessionRequest, SessionSummary};

/// Seam between the scheduler and the network. Implementations make
/// exactly one exchange per call.
pub trait InferenceBackend: Send + Sync + 'static {
    fn infer(
        &self,
        request: InferenceRequest,
    ) -> impl Future<Output = Result<InferenceResponse>> + Send;
}

/// セッションIDを生成（プロセス起動時に一度だけ）
pub fn new_session_id() -> String {
    format!("sess_{}", chrono::Local::now().format("%Y%m%d_%H%M%S_%3f"))
}

pub struct HttpInferenceClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpInferenceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        Self::new(&config.base_url, Duration::from_millis(config.timeout_ms))
    }

    async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp>
    where
        Req: serde::Serialize,
        Resp: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        if !response.status().is_success() {
            anyhow::bail!("{url} returned {}", response.status());
        }

        response
            .json::<Resp>()
            .await
            .with_context(|| format!("failed to decode response from {url}"))
    }

    /// ストリーミング開始前にセッションを登録
    pub async fn start_session(&self, session_id: &str) -> Result<()> {
        let _: serde_json::Value = self
            .post_json(
                "/start_session",
                &SessionRequest {
                    session_id: session_id.to_string(),
                },
            )
            .await?;
        Ok(())
    }

    /// セッションを終了し、サマリーを受け取る
    pub async fn stop_session(&self, session_id: &str) -> Result<SessionSummary> {
        self.post_json(
            "/stop_session",
            &SessionRequest {
                session_id: session_id.to_string(),
            },
        )
        .await
    }
}

impl InferenceBackend for HttpInferenceClient {
    async fn infer(&self, request: InferenceRequest) -> Result<InferenceResponse> {
        self.post_json("/process_frame", &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_shape() {
        let id = new_session_id();
        assert!(id.starts_with("sess_"), "id={id}");
        // sess_ + YYYYmmdd_HHMMSS_mmm
        assert_eq!(id.len(), "sess_".len() + 8 + 1 + 6 + 1 + 3, "id={id}");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client =
            HttpInferenceClient::new("http://127.0.0.1:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:8000");
    }
}
