use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

use super::{AiProvider, GenerationRequest, check_response};
use crate::config::AiConfig;
use crate::utils::error::Result;

const NAME: &str = "ollama";

/// Local Ollama server. Uses the vision model only when images are attached.
pub struct OllamaProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    vision_model: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaProvider {
    pub fn new(config: &AiConfig, base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.local_timeout))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/generate", base_url.trim_end_matches('/')),
            model: config.ollama_model.clone(),
            vision_model: config.ollama_vision_model.clone(),
        })
    }

    fn body(&self, request: &GenerationRequest) -> Value {
        if request.images.is_empty() {
            json!({"model": self.model, "prompt": request.prompt, "stream": false})
        } else {
            let images: Vec<&str> = request.images.iter().map(|i| i.data.as_str()).collect();
            json!({
                "model": self.vision_model,
                "prompt": request.prompt,
                "stream": false,
                "images": images,
            })
        }
    }
}

#[async_trait]
impl AiProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.body(request))
            .send()
            .await?;

        let parsed: GenerateResponse = check_response(NAME, response).await?.json().await?;
        Ok(parsed.response)
    }
}
