//! HTTP client for the `/ask` free-form passthrough
//!
//! Model-agnostic: speaks both the Anthropic messages format and
//! OpenAI-compatible chat completions (local llama.cpp/ollama style
//! endpoints included). The assistant works fully without it; `/ask` simply
//! reports that no model is configured.

use crate::core::config::LlmConfig;
use crate::core::error::{AssistantError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const ASK_SYSTEM_PROMPT: &str = "You are a concise local desktop assistant. \
Answer the user's question directly in a few sentences, plain text only.";

#[derive(Debug, Clone, PartialEq)]
enum ApiFormat {
    Anthropic,
    OpenAi,
}

pub struct LlmClient {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
    api_format: ApiFormat,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Self {
        let api_format = detect_api_format(&config.api_url);
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            api_url: config.api_url.clone(),
            model: config.model.clone(),
            api_format,
        }
    }

    /// Send a free-form question, returning the model's text answer
    pub async fn ask(&self, question: &str) -> Result<String> {
        match self.api_format {
            ApiFormat::Anthropic => self.ask_anthropic(question).await,
            ApiFormat::OpenAi => self.ask_openai(question).await,
        }
    }

    async fn ask_anthropic(&self, question: &str) -> Result<String> {
        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: 1024,
            system: ASK_SYSTEM_PROMPT.into(),
            messages: vec![Message {
                role: "user".into(),
                content: question.into(),
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AssistantError::Llm(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AssistantError::Llm(format!("API error: {}", error_text)));
        }

        let completion: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::Llm(e.to_string()))?;

        completion
            .content
            .first()
            .map(|c| c.text.clone())
            .ok_or_else(|| AssistantError::Llm("Empty response".into()))
    }

    async fn ask_openai(&self, question: &str) -> Result<String> {
        let request = OpenAiRequest {
            model: self.model.clone(),
            max_tokens: 1024,
            messages: vec![
                Message {
                    role: "system".into(),
                    content: ASK_SYSTEM_PROMPT.into(),
                },
                Message {
                    role: "user".into(),
                    content: question.into(),
                },
            ],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AssistantError::Llm(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AssistantError::Llm(format!("API error: {}", error_text)));
        }

        let completion: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::Llm(e.to_string()))?;

        completion
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| AssistantError::Llm("Empty response".into()))
    }
}

fn detect_api_format(url: &str) -> ApiFormat {
    if url.contains("anthropic.com") {
        ApiFormat::Anthropic
    } else {
        // local servers and most hosted providers use the OpenAI format
        ApiFormat::OpenAi
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(
            detect_api_format("https://api.anthropic.com/v1/messages"),
            ApiFormat::Anthropic
        );
        assert_eq!(
            detect_api_format("http://localhost:8080/v1/chat/completions"),
            ApiFormat::OpenAi
        );
    }

    #[test]
    fn test_client_construction() {
        let client = LlmClient::new(&LlmConfig {
            api_url: "http://localhost:11434/v1/chat/completions".into(),
            api_key: "unused".into(),
            model: "llama3".into(),
        });
        assert_eq!(client.model, "llama3");
        assert_eq!(client.api_format, ApiFormat::OpenAi);
    }
}
