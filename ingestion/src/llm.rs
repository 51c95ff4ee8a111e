use async_trait::async_trait;
use cardgraph_core::config::LlmConfig;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(config: &LlmConfig, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: config.model.clone(),
            messages,
            max_tokens: config.answer_max_tokens,
            temperature: config.answer_temperature,
        }
    }

    pub fn with_limits(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// Concatenated user turns, for matching and logging.
    pub fn user_text(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A chat-completion backend. Returns the assistant's reply text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> anyhow::Result<String>;
}

/// Replays canned replies in order and records every request it saw.
/// An exhausted script is an error, like an unreachable backend.
#[derive(Default)]
pub struct ScriptedCompletionClient {
    replies: Mutex<VecDeque<anyhow::Result<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletionClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Ok(reply.into()));
        }
    }

    pub fn push_failure(&self, message: impl Into<String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Err(anyhow::anyhow!(message.into())));
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> anyhow::Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        let next = self
            .replies
            .lock()
            .map_err(|_| anyhow::anyhow!("completion script poisoned"))?
            .pop_front();
        next.unwrap_or_else(|| Err(anyhow::anyhow!("completion script exhausted")))
    }
}
