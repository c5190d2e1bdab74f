//! HTTP client for the external vision-description service.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use shoptalk_core::traits::VisionDescriber;
use shoptalk_core::types::PageImage;
use shoptalk_core::{Error, Result};

const DESCRIBE_PROMPT: &str = "You are analyzing an image from a CNC machine or \
industrial equipment manual. Describe this image in detail for searchability: \
what it shows (diagram, photo, screenshot, table), all visible labels, part \
names, measurements and annotations, its purpose in a maintenance or operator \
manual, and any step numbers, warning symbols, or safety notes. Be thorough \
but concise; the description is used for text search.";

#[derive(Serialize)]
struct DescribeRequest<'a> {
    prompt: &'a str,
    image: String,
}

#[derive(Deserialize)]
struct DescribeResponse {
    description: String,
}

/// Posts base64-encoded figures to a configured endpoint and returns the
/// description text. Failures are surfaced per image; the pipeline decides
/// whether to continue.
pub struct HttpVisionDescriber {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpVisionDescriber {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), endpoint: endpoint.into() }
    }
}

#[async_trait]
impl VisionDescriber for HttpVisionDescriber {
    async fn describe(&self, image: &PageImage) -> Result<String> {
        let body = DescribeRequest {
            prompt: DESCRIBE_PROMPT,
            image: base64::engine::general_purpose::STANDARD.encode(&image.bytes),
        };
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(std::time::Duration::from_secs(60))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::provider("vision", e))?;
        if !response.status().is_success() {
            return Err(Error::provider("vision", format!("HTTP {}", response.status())));
        }
        let parsed: DescribeResponse =
            response.json().await.map_err(|e| Error::provider("vision", e))?;
        debug!(chars = parsed.description.len(), "figure described");
        Ok(parsed.description.trim().to_string())
    }
}
