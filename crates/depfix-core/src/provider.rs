//! Abstract provider interfaces.
//!
//! The evaluation core never talks to a model or a tokenizer itself; these
//! traits exist so the same repository can carry both the harness and the
//! independent generation experiments. Concrete providers live outside the
//! core crates.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One chat message exchanged with a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// A chat-completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate_reply(
        &self,
        messages: &[Message],
        max_new_tokens: u32,
        temperature: f32,
        n: u32,
    ) -> Result<String>;

    /// Convenience for providers with structured-output support; the
    /// default parses the plain reply as JSON.
    async fn generate_json(
        &self,
        messages: &[Message],
        max_new_tokens: u32,
    ) -> Result<serde_json::Value> {
        let reply = self.generate_reply(messages, max_new_tokens, 0.0, 1).await?;
        Ok(serde_json::from_str(&reply)?)
    }
}

/// Token counting for prompt budgeting.
pub trait Tokenizer: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
}
