use crate::{
    config::defaults,
    error::{DndigError, Result},
    gemini::{sse::SseDecoder, ChunkStream, ImageStreamer},
    models::{
        gemini::{
            Content, ErrorEnvelope, GenerateContentRequest, GenerateContentResponse,
            GenerationParams, GoogleSearch, ImageConfig, InlineData, Part, Tool,
        },
        ChunkEvent, GenerationRequest,
    },
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::StreamExt;
use reqwest::Client;
use tokio_stream::wrappers::ReceiverStream;

#[derive(Clone)]
pub struct ImageClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl ImageClient {
    pub fn new(
        client: Client,
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    pub fn build_payload(request: &GenerationRequest) -> GenerateContentRequest {
        let mut parts = vec![Part::Text {
            text: request.prompt_text().to_string(),
        }];
        parts.extend(request.reference_images().iter().map(|image| Part::InlineData {
            inline_data: InlineData {
                mime_type: image.mime_type.clone(),
                data: STANDARD.encode(&image.data),
            },
        }));

        let system_instruction = request.system_instructions().map(|text| Content {
            role: None,
            parts: vec![Part::Text {
                text: text.to_string(),
            }],
        });

        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            system_instruction,
            generation_config: GenerationParams {
                temperature: request.temperature(),
                response_modalities: defaults::RESPONSE_MODALITIES
                    .iter()
                    .map(|m| m.to_string())
                    .collect(),
                image_config: ImageConfig {
                    aspect_ratio: request.aspect_ratio().to_string(),
                    image_size: request.resolution().to_string(),
                },
            },
            tools: vec![Tool {
                google_search: GoogleSearch::default(),
            }],
        }
    }
}

#[async_trait]
impl ImageStreamer for ImageClient {
    async fn stream_generate(&self, request: &GenerationRequest) -> Result<ChunkStream> {
        let payload = Self::build_payload(request);

        log::debug!(
            "Generating image with model={}, temperature={}, aspect_ratio={}, resolution={}, reference_images={}",
            self.model,
            request.temperature(),
            request.aspect_ratio(),
            request.resolution(),
            request.reference_images().len()
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                log::error!("API error during image generation: {}", e);
                DndigError::RemoteApi(format!("Failed to generate image: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("Gemini returned {}: {}", status, body);
            return Err(DndigError::RemoteApi(describe_error(status.as_u16(), &body)));
        }

        let (tx, rx) = tokio::sync::mpsc::channel(16);
        let mut body = Box::pin(response.bytes_stream());

        tokio::spawn(async move {
            let mut decoder = SseDecoder::new();
            while let Some(next) = body.next().await {
                match next {
                    Ok(bytes) => {
                        for data in decoder.push(&bytes) {
                            let event = decode_event(&data);
                            let failed = event.is_err();
                            if tx.send(event).await.is_err() || failed {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx
                            .send(Err(DndigError::RemoteApi(format!(
                                "Response stream interrupted: {}",
                                e
                            ))))
                            .await;
                        return;
                    }
                }
            }

            if let Some(data) = decoder.finish() {
                let _ = tx.send(decode_event(&data)).await;
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Decodes one SSE payload into a chunk event.
pub fn decode_event(data: &str) -> Result<ChunkEvent> {
    let value: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| DndigError::RemoteApi(format!("Malformed response chunk: {}", e)))?;

    if value.get("error").is_some() {
        let envelope: ErrorEnvelope = serde_json::from_value(value)
            .map_err(|e| DndigError::RemoteApi(format!("Malformed error chunk: {}", e)))?;
        return Err(DndigError::RemoteApi(format!(
            "Gemini error {} {}: {}",
            envelope.error.code, envelope.error.status, envelope.error.message
        )));
    }

    let response: GenerateContentResponse = serde_json::from_value(value)
        .map_err(|e| DndigError::RemoteApi(format!("Malformed response chunk: {}", e)))?;
    chunk_event_from(response)
}

/// Picks the first inline image of the first candidate, if any.
pub fn chunk_event_from(response: GenerateContentResponse) -> Result<ChunkEvent> {
    let inline = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| {
            content
                .parts
                .into_iter()
                .find_map(|part| part.inline_data.filter(|data| !data.data.is_empty()))
        });

    match inline {
        Some(inline) => {
            let data = STANDARD
                .decode(inline.data.as_bytes())
                .map_err(|e| DndigError::RemoteApi(format!("Invalid image payload: {}", e)))?;
            Ok(ChunkEvent::Image {
                data,
                mime_type: inline.mime_type,
            })
        }
        None => Ok(ChunkEvent::NoImage),
    }
}

fn describe_error(status: u16, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => format!(
            "Failed to generate image: HTTP {} {}: {}",
            status, envelope.error.status, envelope.error.message
        ),
        Err(_) => format!("Failed to generate image: HTTP {}: {}", status, body.trim()),
    }
}
