use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::{AppError, Result},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

/// Hosted chat-completion endpoint (OpenAI-compatible body).
#[derive(Clone, Debug)]
pub struct ChatClient {
    api_url: String,
    api_key: Option<String>,
    model: String,
    client: Client,
}

impl ChatClient {
    pub fn new(api_url: String, api_key: Option<String>, model: String) -> Self {
        Self {
            api_url,
            api_key,
            model,
            client: Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.chat_api_url.clone(),
            config.chat_api_key.clone(),
            config.chat_model.clone(),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && !self.api_url.trim().is_empty()
    }

    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::ExternalAPI("Chat API key not configured".to_string()))?;

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&ChatRequest {
                model: &self.model,
                messages,
            })
            .send()
            .await
            .map_err(|e| AppError::ExternalAPI(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalAPI(format!(
                "Chat API error: {}",
                response.status()
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::ExternalAPI(e.to_string()))?;
        extract_reply(&payload)
    }
}

fn extract_reply(payload: &serde_json::Value) -> Result<String> {
    payload
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .map(|content| content.to_string())
        .ok_or_else(|| AppError::ExternalAPI("Chat API returned no choices".to_string()))
}
