pub mod image_client;
pub mod sse;

use crate::{
    config::{defaults, GeminiConfig},
    error::{DndigError, Result},
    models::{ChunkEvent, GenerationRequest},
};
use async_trait::async_trait;
use futures::stream::Stream;
use reqwest::Client;
use std::pin::Pin;

pub use image_client::ImageClient;

/// A finite, non-restartable sequence of decoded response chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChunkEvent>> + Send>>;

/// One streaming generation call per invocation of `stream_generate`.
///
/// A stream may yield any number of image chunks and may fail part way;
/// chunks yielded before the failure remain valid.
#[async_trait]
pub trait ImageStreamer: Send + Sync {
    async fn stream_generate(&self, request: &GenerationRequest) -> Result<ChunkStream>;
}

#[derive(Clone)]
pub struct GeminiClient {
    image_client: ImageClient,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                DndigError::RemoteApi(format!(
                    "API key not found. Set {} environment variable or provide --api-key.",
                    defaults::API_KEY_ENV_VAR
                ))
            })?;

        let client = Client::builder()
            .user_agent(concat!("dndig/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                DndigError::RemoteApi(format!("Failed to initialize Gemini client: {}", e))
            })?;

        log::info!("Gemini API client initialized (model: {})", config.model);

        Ok(Self {
            image_client: ImageClient::new(client, api_key, config.model, config.base_url),
        })
    }

    pub fn image(&self) -> &ImageClient {
        &self.image_client
    }
}

#[async_trait]
impl ImageStreamer for GeminiClient {
    async fn stream_generate(&self, request: &GenerationRequest) -> Result<ChunkStream> {
        self.image_client.stream_generate(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_a_startup_error() {
        let err = GeminiClient::new(GeminiConfig::new()).err().unwrap();
        assert!(matches!(err, DndigError::RemoteApi(ref msg) if msg.contains("GEMINI_API_KEY")));

        let err = GeminiClient::new(GeminiConfig::new().with_api_key("  ")).err().unwrap();
        assert!(matches!(err, DndigError::RemoteApi(_)));
    }

    #[test]
    fn client_keeps_configured_model() {
        let client =
            GeminiClient::new(GeminiConfig::new().with_api_key("k").with_model("m-1")).unwrap();
        assert_eq!(client.image().model(), "m-1");
    }
}
