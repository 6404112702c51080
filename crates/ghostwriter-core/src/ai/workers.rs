use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::error::Error;
use crate::session::LyricsGenerator;
use crate::state::ChatMessage;
use crate::stream::{token_stream, TokenStream};

pub const DEFAULT_API_BASE: &str = "https://api.cloudflare.com/client/v4";
pub const DEFAULT_MODEL: &str = "@cf/meta/llama-3.1-8b-instruct";

#[derive(Serialize)]
struct RunRequest<'a> {
    messages: &'a [ChatMessage],
    stream: bool,
}

/// Cloudflare Workers AI text generation, streamed over SSE
#[derive(Clone)]
pub struct WorkersAiClient {
    client: Client,
    base_url: String,
    account_id: String,
    api_token: String,
    model: String,
}

impl WorkersAiClient {
    pub fn new(account_id: &str, api_token: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_API_BASE.to_string(),
            account_id: account_id.to_string(),
            api_token: api_token.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn run_url(&self) -> String {
        format!(
            "{}/accounts/{}/ai/run/{}",
            self.base_url, self.account_id, self.model
        )
    }

    /// Send the conversation and return the decoded fragment stream once the
    /// response headers arrive.
    pub async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<TokenStream, Error> {
        let request = RunRequest {
            messages,
            stream: true,
        };

        debug!(model = %self.model, messages = messages.len(), "requesting lyrics");
        let response = self
            .client
            .post(self.run_url())
            .bearer_auth(&self.api_token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                service: "Workers AI",
                status,
                body,
            });
        }

        Ok(token_stream(response.bytes_stream()))
    }
}

#[async_trait]
impl LyricsGenerator for WorkersAiClient {
    async fn stream_lyrics(&self, messages: &[ChatMessage]) -> Result<TokenStream, Error> {
        self.stream_chat(messages).await
    }
}
