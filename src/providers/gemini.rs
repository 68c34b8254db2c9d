use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::{ChatProvider, SYSTEM_PROMPT, TEMPERATURE};
use crate::errors::ProviderError;
use crate::models::{ChatMessage, MessagePart, ProviderRequest, Role};

const NAME: &str = "gemini";
const API_VERSION: &str = "v1beta";

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl GeminiProvider {
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
        }
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .ok_or(ProviderError::NotConfigured(NAME))
    }
}

// "data:image/png;base64,AAAA" -> ("image/png", "AAAA")
fn split_data_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    let (meta, data) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    Some((mime, data))
}

fn to_parts(message: &ChatMessage) -> Vec<Value> {
    match message {
        ChatMessage::Text(text) => vec![json!({ "text": text })],
        ChatMessage::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                MessagePart::Text { text } => json!({ "text": text }),
                MessagePart::ImageUrl { image_url } => match split_data_url(&image_url.url) {
                    Some((mime, data)) => {
                        json!({ "inlineData": { "mimeType": mime, "data": data } })
                    }
                    // Remote images can't be fetched by the API; pass the link as text
                    None => json!({ "text": format!("[image: {}]", image_url.url) }),
                },
            })
            .collect(),
    }
}

// System turns from the history join the prompt in systemInstruction
fn build_body(request: &ProviderRequest) -> Value {
    let mut system_parts = vec![json!({ "text": SYSTEM_PROMPT })];
    let mut contents = Vec::with_capacity(request.history.len() + 1);
    for turn in &request.history {
        match turn.role {
            Role::System => system_parts.push(json!({ "text": turn.content.text() })),
            Role::User => contents.push(json!({ "role": "user", "parts": to_parts(&turn.content) })),
            Role::Assistant => {
                contents.push(json!({ "role": "model", "parts": to_parts(&turn.content) }))
            }
        }
    }
    contents.push(json!({ "role": "user", "parts": to_parts(&request.message) }));

    json!({
        "systemInstruction": { "parts": system_parts },
        "contents": contents,
        "generationConfig": { "temperature": TEMPERATURE },
    })
}

// Concatenate the text parts of the first candidate
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

    let parts = body
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::Parse("missing candidates[0].content.parts".to_string()))?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    let text = text.trim();

    if text.is_empty() {
        return Err(ProviderError::Empty);
    }
    Ok(text.to_string())
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, request: &ProviderRequest) -> Result<String, ProviderError> {
        let api_key = self.api_key()?;
        let url = format!(
            "{}/{}/models/{}:generateContent",
            self.base_url, API_VERSION, self.model
        );

        debug!(model = %self.model, turns = request.history.len() + 1, "calling gemini");

        let res = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&build_body(request))
            .send()
            .await
            .map_err(|e| ProviderError::Connection(e.to_string()))?;

        let status = res.status();
        let json: Value = match res.json().await {
            Ok(json) => json,
            Err(e) if status.is_success() => return Err(ProviderError::Parse(e.to_string())),
            Err(_) => {
                return Err(ProviderError::Api {
                    status: status.as_u16(),
                    message: status.to_string(),
                });
            }
        };

        if !status.is_success() {
            let message = json
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("request failed")
                .to_string();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        parse_completion(&json)
    }

    async fn probe(&self) -> bool {
        let Ok(api_key) = self.api_key() else {
            return false;
        };
        match self
            .client
            .get(format!("{}/{}/models", self.base_url, API_VERSION))
            .header("x-goog-api-key", api_key)
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await
        {
            Ok(res) => res.status().is_success(),
            Err(_) => false,
        }
    }
}
