//! Mistral OCR provider (uses Mistral's OCR API).
//!
//! The PDF is sent inline as a base64 data URL, so no Files API upload is
//! needed.

use super::{join_page_markdown, OcrProvider};
use crate::config::OcrConfig;
use crate::error::{DocParserError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, error, info};

pub struct MistralOcrProvider {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl MistralOcrProvider {
    pub fn new(config: &OcrConfig, client: reqwest::Client) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(DocParserError::Configuration(
                "MISTRAL_API_KEY environment variable not set".to_string(),
            ));
        }
        Ok(Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
        })
    }

    async fn call_ocr(&self, body: &OcrRequest) -> anyhow::Result<OcrResponse> {
        let resp = self
            .client
            .post(format!("{}/ocr", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Mistral OCR API error ({}): {}", status, text);
        }

        let raw_text = resp.text().await?;
        debug!(
            "MistralOcrProvider: raw response ({} bytes): {}",
            raw_text.len(),
            preview(&raw_text, 500)
        );
        Ok(serde_json::from_str(&raw_text)?)
    }
}

// ── Mistral API request/response types ──────────────────────────────────────

#[derive(Serialize)]
struct OcrRequest {
    model: String,
    document: DocumentSource,
    include_image_base64: bool,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum DocumentSource {
    #[serde(rename = "document_url")]
    Url { document_url: String },
}

#[derive(Deserialize)]
struct OcrResponse {
    #[serde(default)]
    pages: Vec<MistralPage>,
}

#[derive(Deserialize)]
struct MistralPage {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    markdown: Option<String>,
}

// ── Provider implementation ─────────────────────────────────────────────────

#[async_trait::async_trait]
impl OcrProvider for MistralOcrProvider {
    fn name(&self) -> &str {
        "mistral_ocr"
    }

    async fn extract_text(&self, path: &Path) -> Result<String> {
        let encoded = encode_pdf(path).await?;

        let body = OcrRequest {
            model: self.model.clone(),
            document: DocumentSource::Url {
                document_url: pdf_data_url(&encoded),
            },
            include_image_base64: true,
        };

        info!(
            "MistralOcrProvider: calling OCR API ({} base64 bytes)",
            encoded.len()
        );

        let mut ocr = self
            .call_ocr(&body)
            .await
            .map_err(|e| DocParserError::Ocr(format!("{:#}", e)))?;

        ocr.pages.sort_by_key(|p| p.index);
        info!("MistralOcrProvider: {} pages returned", ocr.pages.len());

        Ok(join_page_markdown(
            ocr.pages.iter().map(|p| p.markdown.as_deref()),
        ))
    }
}

/// Read the whole file and base64-encode it.
async fn encode_pdf(path: &Path) -> Result<String> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|source| {
            error!("MistralOcrProvider: cannot read {:?}: {}", path, source);
            DocParserError::Encoding {
                path: path.to_path_buf(),
                source,
            }
        })?;
    Ok(BASE64.encode(data))
}

fn pdf_data_url(encoded: &str) -> String {
    format!("data:application/pdf;base64,{}", encoded)
}

fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
