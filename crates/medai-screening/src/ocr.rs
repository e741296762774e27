//! Document text detection.

use crate::error::OcrError;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Image-to-text backend.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Returns the full detected text, or an empty string when nothing was read.
    async fn extract_text(&self, image: &[u8]) -> Result<String, OcrError>;
}

/// Google Cloud Vision `images:annotate` client using DOCUMENT_TEXT_DETECTION.
#[derive(Debug, Clone)]
pub struct GoogleVisionOcr {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateResult {
    full_text_annotation: Option<FullTextAnnotation>,
    error: Option<Status>,
}

#[derive(Deserialize)]
struct FullTextAnnotation {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Status {
    #[serde(default)]
    message: String,
}

impl GoogleVisionOcr {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, OcrError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

#[async_trait]
impl OcrEngine for GoogleVisionOcr {
    async fn extract_text(&self, image: &[u8]) -> Result<String, OcrError> {
        let body = json!({
            "requests": [{
                "image": { "content": STANDARD.encode(image) },
                "features": [{ "type": "DOCUMENT_TEXT_DETECTION" }]
            }]
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(OcrError::Service(format!("HTTP {status}: {detail}")));
        }

        let parsed: AnnotateResponse = response
            .json()
            .await
            .map_err(|e| OcrError::InvalidResponse(e.to_string()))?;
        let Some(result) = parsed.responses.into_iter().next() else {
            return Err(OcrError::InvalidResponse("empty responses array".into()));
        };
        if let Some(error) = result.error {
            return Err(OcrError::Service(error.message));
        }
        Ok(result
            .full_text_annotation
            .map(|annotation| annotation.text)
            .unwrap_or_default())
    }
}
