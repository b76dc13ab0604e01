//! OpenAI chat completion and image generation client

use super::{GeneratedImage, GenerationError, Generator};
use async_trait::async_trait;
use cantina_common::config::GenerationConfig;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;

const USER_AGENT: &str = concat!("cantina-sync/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
    quality: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
    revised_prompt: Option<String>,
}

/// OpenAI API client
pub struct OpenAiClient {
    http_client: reqwest::Client,
    rate_limiter: DefaultDirectRateLimiter,
    api_key: String,
    config: GenerationConfig,
}

impl OpenAiClient {
    pub fn new(api_key: String, config: GenerationConfig) -> Result<Self, GenerationError> {
        let per_minute = NonZeroU32::new(config.requests_per_minute).ok_or_else(|| {
            GenerationError::Configuration("requests_per_minute must be at least 1".to_string())
        })?;

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GenerationError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
            api_key,
            config,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, GenerationError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.rate_limiter.until_ready().await;

        let response = self
            .http_client
            .post(self.endpoint(path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| GenerationError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GenerationError::ApiError(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| GenerationError::ParseError(e.to_string()))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, GenerationError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| GenerationError::DownloadError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::DownloadError(format!("HTTP {}", status.as_u16())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GenerationError::DownloadError(e.to_string()))?;

        if bytes.is_empty() {
            return Err(GenerationError::DownloadError("empty body".to_string()));
        }

        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Generator for OpenAiClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.config.text_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let response: ChatResponse = self.post_json("chat/completions", &request).await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(GenerationError::EmptyResponse)?;

        tracing::debug!(model = %self.config.text_model, chars = content.len(), "Completion received");

        Ok(content)
    }

    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, GenerationError> {
        let request = ImageRequest {
            model: &self.config.image_model,
            prompt,
            n: 1,
            size: &self.config.image_size,
            quality: &self.config.image_quality,
        };

        let response: ImageResponse = self.post_json("images/generations", &request).await?;

        let image = response
            .data
            .into_iter()
            .next()
            .ok_or(GenerationError::EmptyResponse)?;
        let url = image.url.ok_or(GenerationError::EmptyResponse)?;

        let bytes = self.download(&url).await?;

        tracing::debug!(model = %self.config.image_model, bytes = bytes.len(), "Image downloaded");

        Ok(GeneratedImage {
            bytes,
            revised_prompt: image.revised_prompt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = OpenAiClient::new("sk-test".to_string(), GenerationConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_zero_rate_is_configuration_error() {
        let config = GenerationConfig {
            requests_per_minute: 0,
            ..Default::default()
        };
        let result = OpenAiClient::new("sk-test".to_string(), config);
        assert!(matches!(result, Err(GenerationError::Configuration(_))));
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let config = GenerationConfig {
            base_url: "http://localhost:9000/v1/".to_string(),
            ..Default::default()
        };
        let client = OpenAiClient::new("sk-test".to_string(), config).unwrap();
        assert_eq!(client.endpoint("chat/completions"), "http://localhost:9000/v1/chat/completions");
    }

    #[test]
    fn test_image_response_shape() {
        let response: ImageResponse = serde_json::from_str(
            r#"{"created": 1, "data": [{"url": "https://x/y.png", "revised_prompt": "A plate"}]}"#,
        )
        .unwrap();
        assert_eq!(response.data[0].url.as_deref(), Some("https://x/y.png"));
        assert_eq!(response.data[0].revised_prompt.as_deref(), Some("A plate"));
    }
}
