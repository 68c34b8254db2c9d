use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{ChatProvider, SYSTEM_PROMPT, TEMPERATURE};
use crate::errors::ProviderError;
use crate::models::{ChatMessage, ProviderRequest, Role};

const NAME: &str = "openrouter";

// OpenAI-style chat message; content is a string or a parts array
#[derive(Serialize, Debug)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a ChatMessage,
}

#[derive(Serialize, Debug)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
}

pub struct OpenRouterProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    referer: String,
    title: String,
}

impl OpenRouterProvider {
    pub fn new(
        client: reqwest::Client,
        api_key: Option<String>,
        base_url: &str,
        model: &str,
    ) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            referer: String::new(),
            title: String::new(),
        }
    }

    pub fn with_attribution(mut self, referer: &str, title: &str) -> Self {
        self.referer = referer.to_string();
        self.title = title.to_string();
        self
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .ok_or(ProviderError::NotConfigured(NAME))
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn build_body<'a>(
    model: &'a str,
    system: &'a ChatMessage,
    request: &'a ProviderRequest,
) -> CompletionRequest<'a> {
    let mut messages = Vec::with_capacity(request.history.len() + 2);
    messages.push(WireMessage {
        role: "system",
        content: system,
    });
    messages.extend(request.history.iter().map(|turn| WireMessage {
        role: role_name(turn.role),
        content: &turn.content,
    }));
    messages.push(WireMessage {
        role: "user",
        content: &request.message,
    });

    CompletionRequest {
        model: request.model.as_deref().unwrap_or(model),
        messages,
        temperature: TEMPERATURE,
    }
}

// Pull choices[0].message.content out of a completion body
fn parse_completion(body: &Value) -> Result<String, ProviderError> {
    if let Some(message) = body.pointer("/error/message").and_then(Value::as_str) {
        return Err(ProviderError::Api {
            status: body
                .pointer("/error/code")
                .and_then(Value::as_u64)
                .and_then(|c| u16::try_from(c).ok())
                .unwrap_or(502),
            message: message.to_string(),
        });
    }

    let content = body
        .pointer("/choices/0/message/content")
        .ok_or_else(|| ProviderError::Parse("missing choices[0].message.content".to_string()))?;
    let text = content
        .as_str()
        .ok_or_else(|| ProviderError::Parse("content is not a string".to_string()))?
        .trim();

    if text.is_empty() {
        return Err(ProviderError::Empty);
    }
    Ok(text.to_string())
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

#[async_trait]
impl ChatProvider for OpenRouterProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, request: &ProviderRequest) -> Result<String, ProviderError> {
        let api_key = self.api_key()?;
        let system = ChatMessage::Text(SYSTEM_PROMPT.to_string());
        let body = build_body(&self.model, &system, request);

        debug!(model = body.model, turns = body.messages.len(), "calling openrouter");

        let mut call = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body);
        if !self.referer.is_empty() {
            call = call.header("HTTP-Referer", &self.referer);
        }
        if !self.title.is_empty() {
            call = call.header("X-Title", &self.title);
        }

        let res = call
            .send()
            .await
            .map_err(|e| ProviderError::Connection(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        let json: Value = res
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        parse_completion(&json)
    }

    async fn probe(&self) -> bool {
        let Ok(api_key) = self.api_key() else {
            return false;
        };
        match self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(api_key)
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await
        {
            Ok(res) => res.status().is_success(),
            Err(_) => false,
        }
    }
}
