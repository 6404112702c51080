use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::error::Error;
use crate::session::CoverGenerator;

pub const DEFAULT_MODEL_URL: &str =
    "https://api-inference.huggingface.co/models/stabilityai/stable-diffusion-3.5-large";

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

/// Hugging Face Inference API text-to-image
#[derive(Clone)]
pub struct HuggingFaceClient {
    client: Client,
    model_url: String,
    api_token: String,
}

impl HuggingFaceClient {
    pub fn new(api_token: &str) -> Self {
        Self {
            client: Client::new(),
            model_url: DEFAULT_MODEL_URL.to_string(),
            api_token: api_token.to_string(),
        }
    }

    pub fn with_model_url(mut self, model_url: &str) -> Self {
        self.model_url = model_url.to_string();
        self
    }

    pub fn model_url(&self) -> &str {
        &self.model_url
    }

    /// Generate an image and return its raw encoded bytes
    pub async fn text_to_image(&self, prompt: &str) -> Result<Vec<u8>, Error> {
        debug!(url = %self.model_url, "requesting album cover");
        let response = self
            .client
            .post(&self.model_url)
            .bearer_auth(&self.api_token)
            .json(&InferenceRequest { inputs: prompt })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                service: "Hugging Face",
                status,
                body,
            });
        }

        let bytes = response.bytes().await?;
        debug!(len = bytes.len(), "album cover received");
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl CoverGenerator for HuggingFaceClient {
    async fn generate_cover(&self, prompt: &str) -> Result<Vec<u8>, Error> {
        self.text_to_image(prompt).await
    }
}
