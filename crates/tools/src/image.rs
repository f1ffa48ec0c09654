//! Image synthesis capability.
//!
//! One [`ImageTool`] is registered per image intent. The batch variant
//! splits a request for `count` images into `count` single-image calls so
//! that one failed generation leaves the others usable.

use async_trait::async_trait;
use forager_core::error::ToolError;
use forager_core::intent::Intent;
use forager_core::tool::ToolCapability;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::http_error;

pub const MAX_BATCH: u64 = 4;
pub const DEFAULT_BATCH: u64 = 4;

/// Generated images and the model that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImages {
    pub urls: Vec<String>,
    pub model: String,
}

/// An image synthesis service.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    async fn generate(&self, prompt: &str, count: u32) -> Result<GeneratedImages, ToolError>;
}

/// An OpenAI-compatible `/images/generations` endpoint.
pub struct OpenAiImageBackend {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiImageBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImageApiResponse {
    #[serde(default)]
    data: Vec<ImageApiDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageApiDatum {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
}

#[async_trait]
impl ImageBackend for OpenAiImageBackend {
    async fn generate(&self, prompt: &str, count: u32) -> Result<GeneratedImages, ToolError> {
        let url = format!("{}/images/generations", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "n": count,
            "size": "1024x1024",
        });

        debug!(model = %self.model, count, "Requesting image generation");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| http_error("image", e))?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(ToolError::Transport {
                tool_name: "image".into(),
                reason: format!("image service answered {status}"),
            });
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ToolError::Rejected {
                tool_name: "image".into(),
                reason: format!("{status}: {detail}"),
            });
        }

        let parsed: ImageApiResponse = response.json().await.map_err(|e| ToolError::Transport {
            tool_name: "image".into(),
            reason: format!("unreadable image response: {e}"),
        })?;

        let urls: Vec<String> = parsed
            .data
            .into_iter()
            .filter_map(|d| {
                d.url
                    .or_else(|| d.b64_json.map(|b| format!("data:image/png;base64,{b}")))
            })
            .collect();

        if urls.is_empty() {
            return Err(ToolError::Rejected {
                tool_name: "image".into(),
                reason: "image service returned no images".into(),
            });
        }

        Ok(GeneratedImages {
            urls,
            model: self.model.clone(),
        })
    }
}

/// The `image_single` / `image_batch` capability.
pub struct ImageTool {
    backend: Arc<dyn ImageBackend>,
    batch: bool,
}

impl ImageTool {
    pub fn single(backend: Arc<dyn ImageBackend>) -> Self {
        Self {
            backend,
            batch: false,
        }
    }

    pub fn batch(backend: Arc<dyn ImageBackend>) -> Self {
        Self {
            backend,
            batch: true,
        }
    }
}

#[async_trait]
impl ToolCapability for ImageTool {
    fn intent(&self) -> Intent {
        if self.batch {
            Intent::ImageBatch
        } else {
            Intent::ImageSingle
        }
    }

    fn description(&self) -> &str {
        if self.batch {
            "Generate several variations of an image from a text prompt (up to 4)."
        } else {
            "Generate one image from a text prompt."
        }
    }

    fn parameters_schema(&self) -> serde_json::Value {
        if self.batch {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "prompt": { "type": "string", "description": "What to draw" },
                    "count": {
                        "type": "integer",
                        "description": "How many variations (default 4)",
                        "minimum": 1,
                        "maximum": MAX_BATCH
                    }
                },
                "required": ["prompt"]
            })
        } else {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "prompt": { "type": "string", "description": "What to draw" }
                },
                "required": ["prompt"]
            })
        }
    }

    fn split(&self, arguments: &serde_json::Value) -> Vec<serde_json::Value> {
        if !self.batch {
            return vec![arguments.clone()];
        }
        let count = arguments["count"]
            .as_u64()
            .unwrap_or(DEFAULT_BATCH)
            .clamp(1, MAX_BATCH);
        let prompt = arguments["prompt"].clone();

        (0..count)
            .map(|_| serde_json::json!({ "prompt": prompt, "count": 1 }))
            .collect()
    }

    async fn invoke(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let prompt = arguments["prompt"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'prompt' argument".into()))?;

        let images = self.backend.generate(prompt, 1).await?;

        Ok(serde_json::json!({
            "prompt": prompt,
            "urls": images.urls,
            "model": images.model,
        }))
    }
}
