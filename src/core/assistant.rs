//! The assistant reply endpoint.
//!
//! Given the transcript so far, an [`AssistantClient`] produces exactly one
//! assistant message. The chat UI animates that message afterwards; nothing
//! here streams.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::config::AssistantConfig;
use crate::core::constants::API_KEY_ENV;
use crate::core::message::Message;
use crate::utils::url::construct_api_url;

#[derive(Debug)]
pub enum AssistantError {
    /// The request was abandoned through its cancellation token.
    Cancelled,
    Http(reqwest::Error),
    /// The endpoint answered with a non-success status.
    Status { status: u16, summary: String },
    /// The response carried no assistant text.
    EmptyReply,
}

impl fmt::Display for AssistantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssistantError::Cancelled => write!(f, "Request cancelled"),
            AssistantError::Http(err) => write!(f, "Request failed: {err}"),
            AssistantError::Status { status, summary } => {
                write!(f, "Assistant API error ({status}): {summary}")
            }
            AssistantError::EmptyReply => write!(f, "Assistant returned an empty reply"),
        }
    }
}

impl std::error::Error for AssistantError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AssistantError::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AssistantError {
    fn from(err: reqwest::Error) -> Self {
        AssistantError::Http(err)
    }
}

#[async_trait]
pub trait AssistantClient: Send + Sync {
    /// Produces the next assistant message for `messages`, giving up with
    /// [`AssistantError::Cancelled`] as soon as `cancel` fires.
    async fn reply(
        &self,
        messages: &[Message],
        cancel: CancellationToken,
    ) -> Result<Message, AssistantError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: ApiContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ApiContent<'a> {
    Text(&'a str),
    Parts(Vec<ApiContentPart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ApiImageUrl<'a> },
}

#[derive(Serialize)]
struct ApiImageUrl<'a> {
    url: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatResponseChoice>,
}

#[derive(Deserialize)]
struct ChatResponseChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

fn to_api_message(message: &Message) -> ApiMessage<'_> {
    let content = match &message.image_url {
        Some(url) => ApiContent::Parts(vec![
            ApiContentPart::Text {
                text: &message.content,
            },
            ApiContentPart::ImageUrl {
                image_url: ApiImageUrl { url },
            },
        ]),
        None => ApiContent::Text(&message.content),
    };
    ApiMessage {
        role: message.role.as_str(),
        content,
    }
}

fn extract_error_summary(body: &str) -> String {
    let trimmed = body.trim();
    let from_json = serde_json::from_str::<serde_json::Value>(trimmed)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .or_else(|| value.get("error").filter(|v| v.is_string()))
                .or_else(|| value.get("message"))
                .and_then(|v| v.as_str())
                .map(str::to_owned)
        });

    let text = from_json.unwrap_or_else(|| trimmed.to_string());
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        "<empty>".to_string()
    } else {
        collapsed
    }
}

/// OpenAI-compatible `chat/completions` client.
#[derive(Clone)]
pub struct HttpAssistant {
    client: reqwest::Client,
    base_url: String,
    model: String,
    system_prompt: String,
    api_key: Option<String>,
}

impl HttpAssistant {
    pub fn new(config: &AssistantConfig, api_key: Option<String>) -> Result<Self, AssistantError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            api_key,
        })
    }

    /// Reads the API key from the environment.
    pub fn from_env(config: &AssistantConfig) -> Result<Self, AssistantError> {
        let api_key = std::env::var(API_KEY_ENV).ok().filter(|key| !key.is_empty());
        Self::new(config, api_key)
    }

    fn build_request<'a>(&'a self, messages: &'a [Message]) -> ChatRequest<'a> {
        let mut api_messages = Vec::with_capacity(messages.len() + 1);
        if !self.system_prompt.trim().is_empty() {
            api_messages.push(ApiMessage {
                role: "system",
                content: ApiContent::Text(&self.system_prompt),
            });
        }
        api_messages.extend(messages.iter().map(to_api_message));
        ChatRequest {
            model: &self.model,
            messages: api_messages,
            stream: false,
        }
    }

    async fn send(&self, messages: &[Message]) -> Result<Message, AssistantError> {
        let url = construct_api_url(&self.base_url, "chat/completions");
        let mut request = self.client.post(url).json(&self.build_request(messages));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(AssistantError::Status {
                status: status.as_u16(),
                summary: extract_error_summary(&body),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(AssistantError::EmptyReply)?;
        Ok(Message::assistant(content))
    }
}

#[async_trait]
impl AssistantClient for HttpAssistant {
    async fn reply(
        &self,
        messages: &[Message],
        cancel: CancellationToken,
    ) -> Result<Message, AssistantError> {
        debug!(count = messages.len(), model = %self.model, "requesting assistant reply");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AssistantError::Cancelled),
            result = self.send(messages) => result,
        }
    }
}
