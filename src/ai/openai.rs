use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

use super::{AiProvider, GenerationRequest, check_response};
use crate::config::AiConfig;
use crate::utils::error::{AppError, Result};

const NAME: &str = "openai";

/// OpenAI-compatible chat completions with inline `data:` image URLs.
pub struct OpenAiProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

impl OpenAiProvider {
    pub fn new(config: &AiConfig, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.openai_base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: config.openai_model.clone(),
        })
    }

    fn body(&self, request: &GenerationRequest) -> Value {
        let mut content = vec![json!({"type": "text", "text": request.prompt})];
        content.extend(
            request
                .images
                .iter()
                .map(|image| json!({"type": "image_url", "image_url": {"url": image.data_url()}})),
        );

        json!({
            "model": self.model,
            "messages": [{"role": "user", "content": content}],
            "max_tokens": request.max_tokens,
        })
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.body(request))
            .send()
            .await?;

        let parsed: ChatResponse = check_response(NAME, response).await?.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::provider(NAME, "response contained no choices"))
    }
}
