use serde::Serialize;

use crate::{
    error::{AppError, Result},
    integrations::{ChatClient, ChatMessage},
    services::portfolio::Portfolio,
};

#[derive(Debug, Clone, Serialize)]
pub struct AssistantReply {
    pub question: String,
    pub reply: String,
}

/// Answers free-form questions about the connected wallet using a hosted model.
#[derive(Clone)]
pub struct AssistantService {
    chat: ChatClient,
}

impl AssistantService {
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }

    pub fn is_configured(&self) -> bool {
        self.chat.is_configured()
    }

    pub async fn ask(&self, question: &str, portfolio: &Portfolio) -> Result<AssistantReply> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::BadRequest("Message must not be empty".to_string()));
        }

        let prompt = build_prompt(question, portfolio)?;
        tracing::debug!("Assistant prompt is {} bytes", prompt.len());
        let reply = self.chat.complete(&[ChatMessage::user(prompt)]).await?;

        Ok(AssistantReply {
            question: question.to_string(),
            reply,
        })
    }
}

fn build_prompt(question: &str, portfolio: &Portfolio) -> Result<String> {
    let details = serde_json::to_string_pretty(portfolio)
        .map_err(|e| AppError::Internal(format!("Failed to encode portfolio: {}", e)))?;
    Ok(format!("{}\n\nFull account details:\n{}", question, details))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::portfolio::build_portfolio;
    use crate::models::WalletSnapshot;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn prompt_appends_portfolio_json() {
        let portfolio = build_portfolio(&WalletSnapshot::default(), &[]);
        let prompt = build_prompt("how rich am I?", &portfolio).unwrap();
        assert!(prompt.starts_with("how rich am I?\n\nFull account details:\n{"));
        assert!(prompt.contains("\"total_value_usd\": 0.0"));
    }

    #[tokio::test]
    async fn blank_question_is_rejected() {
        let assistant = AssistantService::new(ChatClient::new(
            "http://127.0.0.1:1".to_string(),
            Some("key".to_string()),
            "m".to_string(),
        ));
        let portfolio = build_portfolio(&WalletSnapshot::default(), &[]);
        assert!(matches!(
            assistant.ask("   ", &portfolio).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn ask_forwards_question_with_context() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("Full account details"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "Nothing yet." } }]
            })))
            .mount(&server)
            .await;

        let assistant = AssistantService::new(ChatClient::new(
            server.uri(),
            Some("key".to_string()),
            "asi1-mini".to_string(),
        ));
        let portfolio = build_portfolio(&WalletSnapshot::default(), &[]);
        let reply = assistant.ask(" what do I hold? ", &portfolio).await.unwrap();
        assert_eq!(reply.question, "what do I hold?");
        assert_eq!(reply.reply, "Nothing yet.");
    }
}
