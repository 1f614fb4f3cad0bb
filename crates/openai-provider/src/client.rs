//! OpenAiClient implementation.

use std::time::Instant;

use async_trait::async_trait;
use provider_core::{ChatCompleter, ChatMessage, Embedder, ProviderError};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api_types::{
    ApiError, ChatCompletionRequest, ChatCompletionResponse, EmbeddingRequest, EmbeddingResponse,
};
use crate::config::OpenAiConfig;
use crate::telemetry::{self, CHAT_ENDPOINT, EMBEDDINGS_ENDPOINT};

/// HTTP client for an OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    /// Create a new client with the given configuration.
    pub fn new(config: OpenAiConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::Configuration("API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ProviderError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        info!(
            "OpenAiClient initialized with model: {}, embedding model: {} ({} dims)",
            config.model, config.embedding_model, config.embedding_dimensions
        );

        Ok(Self { client, config })
    }

    /// Create a client from environment variables.
    ///
    /// See [`OpenAiConfig::from_env`] for required environment variables.
    pub fn from_env() -> Result<Self, ProviderError> {
        Self::new(OpenAiConfig::from_env()?)
    }

    /// Get the configuration.
    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn map_send_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(self.config.timeout)
        } else {
            ProviderError::Network(format!("Failed to send request: {}", e))
        }
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, ProviderError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.config.api_url.trim_end_matches('/'), path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let response = check_status(response).await?;

        response.json::<R>().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(self.config.timeout)
            } else {
                ProviderError::InvalidResponse(format!("Failed to parse response: {}", e))
            }
        })
    }
}

/// Turn a non-success response into [`ProviderError::Upstream`].
async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiError>(&error_text) {
        Ok(api_error) => {
            warn!(
                status = status.as_u16(),
                error_type = api_error.error.error_type.as_deref().unwrap_or("-"),
                "Provider returned an error"
            );
            api_error.error.message
        }
        Err(_) => error_text,
    };

    Err(ProviderError::Upstream {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ChatCompleter for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let started = Instant::now();
        let result = self
            .post_json::<_, ChatCompletionResponse>("/v1/chat/completions", &request)
            .await;
        let elapsed = started.elapsed();
        telemetry::record_call(&self.config.model, CHAT_ENDPOINT, elapsed, result.is_ok());
        let completion = result?;

        if let Some(usage) = &completion.usage {
            telemetry::record_usage(&self.config.model, usage);
        }

        let finish_reason = completion.finish_reason().unwrap_or("-");
        debug!(
            model = %self.config.model,
            elapsed_ms = elapsed.as_millis() as u64,
            finish_reason,
            "Chat completion finished"
        );
        if finish_reason == "length" {
            warn!(model = %self.config.model, "Completion truncated at max_tokens");
        }

        completion
            .first_content()
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("completion had no content".to_string()))
    }

    fn name(&self) -> &str {
        "OpenAiClient"
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, ProviderError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let request = EmbeddingRequest {
            model: &self.config.embedding_model,
            input: [text],
            dimensions: u32::try_from(self.config.embedding_dimensions).ok(),
        };

        let started = Instant::now();
        let result = self
            .post_json::<_, EmbeddingResponse>("/v1/embeddings", &request)
            .await;
        let elapsed = started.elapsed();
        telemetry::record_call(
            &self.config.embedding_model,
            EMBEDDINGS_ENDPOINT,
            elapsed,
            result.is_ok(),
        );
        let response = result?;

        if let Some(usage) = &response.usage {
            telemetry::record_usage(&self.config.embedding_model, usage);
        }

        debug!(
            model = %self.config.embedding_model,
            elapsed_ms = elapsed.as_millis() as u64,
            "Embedding finished"
        );

        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ProviderError::InvalidResponse("no embedding returned".to_string()))?;

        if embedding.len() != self.config.embedding_dimensions {
            return Err(ProviderError::InvalidResponse(format!(
                "embedding has {} dimensions, expected {}",
                embedding.len(),
                self.config.embedding_dimensions
            )));
        }

        Ok(Some(embedding))
    }

    fn dimensions(&self) -> usize {
        self.config.embedding_dimensions
    }

    fn name(&self) -> &str {
        "OpenAiClient"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::{json, Value};
    use std::time::Duration;

    async fn spawn_server(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client_for(url: String) -> OpenAiClient {
        OpenAiClient::new(
            OpenAiConfig::builder()
                .api_key("sk-test")
                .api_url(url)
                .embedding_model("test-embed", 3)
                .timeout(Duration::from_millis(500))
                .build(),
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_empty_key() {
        let result = OpenAiClient::new(OpenAiConfig::default());
        assert!(matches!(result, Err(ProviderError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|Json(body): Json<Value>| async move {
                let last = body["messages"].as_array().unwrap().last().unwrap()["content"]
                    .as_str()
                    .unwrap()
                    .to_string();
                Json(json!({
                    "choices": [{"message": {"role": "assistant", "content": format!(" re: {last} ")}}]
                }))
            }),
        );
        let client = client_for(spawn_server(app).await);

        let reply = client
            .complete(&[ChatMessage::system("sys"), ChatMessage::user("Hi")])
            .await
            .unwrap();
        assert_eq!(reply, "re: Hi");
    }

    #[tokio::test]
    async fn test_upstream_error_is_surfaced() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({"error": {"message": "Rate limit reached", "type": "requests"}})),
                )
            }),
        );
        let client = client_for(spawn_server(app).await);

        match client.complete(&[ChatMessage::user("Hi")]).await {
            Err(ProviderError::Upstream { status, message }) => {
                assert_eq!(status, 429);
                assert_eq!(message, "Rate limit reached");
            }
            other => panic!("Expected upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({"choices": []}))
            }),
        );
        let client = client_for(spawn_server(app).await);

        let result = client.complete(&[ChatMessage::user("Hi")]).await;
        assert!(matches!(result, Err(ProviderError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_embed() {
        let app = Router::new().route(
            "/v1/embeddings",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["model"], "test-embed");
                assert_eq!(body["dimensions"], 3);
                Json(json!({"data": [{"index": 0, "embedding": [0.1, 0.2, 0.3]}]}))
            }),
        );
        let client = client_for(spawn_server(app).await);

        assert_eq!(client.embed("  ").await.unwrap(), None);
        let embedding = client.embed("Opening hours").await.unwrap().unwrap();
        assert_eq!(embedding.len(), 3);
        assert_eq!(client.dimensions(), 3);
    }

    #[tokio::test]
    async fn test_embed_rejects_wrong_dimensions() {
        let app = Router::new().route(
            "/v1/embeddings",
            post(|| async { Json(json!({"data": [{"embedding": [0.1, 0.2]}]})) }),
        );
        let client = client_for(spawn_server(app).await);

        let result = client.embed("text").await;
        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }

    #[test]
    fn test_calls_and_tokens_are_recorded() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        metrics::with_local_recorder(&recorder, || {
            runtime.block_on(async {
                let app = Router::new().route(
                    "/v1/chat/completions",
                    post(|| async {
                        Json(json!({
                            "choices": [{
                                "message": {"role": "assistant", "content": "Open at 9"},
                                "finish_reason": "length"
                            }],
                            "usage": {"prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16}
                        }))
                    }),
                );
                let client = client_for(spawn_server(app).await);
                client.complete(&[ChatMessage::user("Hours?")]).await.unwrap();
            })
        });

        let rendered = handle.render();
        assert!(rendered.contains("openai_api_calls_total"));
        assert!(rendered.contains(r#"endpoint="chat.completions""#));
        assert!(rendered.contains(r#"status="success""#));
        assert!(rendered.contains("openai_api_duration_seconds"));
        let tokens = |kind: &str| {
            rendered
                .lines()
                .find(|line| {
                    line.starts_with("openai_api_tokens_total{")
                        && line.contains(r#"model="gpt-4o""#)
                        && line.contains(&format!(r#"type="{kind}""#))
                })
                .and_then(|line| line.rsplit(' ').next())
                .map(str::to_string)
        };
        assert_eq!(tokens("prompt").as_deref(), Some("12"));
        assert_eq!(tokens("completion").as_deref(), Some("4"));
    }
}
