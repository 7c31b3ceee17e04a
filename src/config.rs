//! Process configuration.
//!
//! Everything is read from the environment once at startup (after `.env` is
//! loaded) and handed to the adapters explicitly. Missing credentials fail
//! startup instead of failing the first request.

use std::path::PathBuf;

use crate::error::{DocParserError, Result};

const DEFAULT_MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1";
const DEFAULT_OCR_MODEL: &str = "mistral-ocr-latest";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MEDIA_ROOT: &str = "media";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_MAX_UPLOAD_MB: usize = 100;

/// Mistral OCR settings.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// Chat-completions settings for field extraction.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ocr: OcrConfig,
    pub llm: LlmConfig,
    pub media_root: PathBuf,
    pub bind_addr: String,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| -> String {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let max_upload_mb = match lookup("DOCPARSER_MAX_UPLOAD_MB") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
                DocParserError::Configuration(format!(
                    "DOCPARSER_MAX_UPLOAD_MB must be a whole number of megabytes, got {:?}",
                    raw
                ))
            })?,
            None => DEFAULT_MAX_UPLOAD_MB,
        };
        let max_upload_bytes = max_upload_mb.checked_mul(1024 * 1024).ok_or_else(|| {
            DocParserError::Configuration(format!(
                "DOCPARSER_MAX_UPLOAD_MB is too large: {}",
                max_upload_mb
            ))
        })?;

        Ok(Self {
            ocr: OcrConfig {
                api_key: required(&lookup, "MISTRAL_API_KEY")?,
                base_url: get("MISTRAL_BASE_URL", DEFAULT_MISTRAL_BASE_URL),
                model: get("MISTRAL_OCR_MODEL", DEFAULT_OCR_MODEL),
            },
            llm: LlmConfig {
                api_key: required(&lookup, "OPENAI_API_KEY")?,
                base_url: get("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
                model: get("OPENAI_MODEL", DEFAULT_LLM_MODEL),
                temperature: 0.1,
                max_tokens: 2000,
            },
            media_root: PathBuf::from(get("DOCPARSER_MEDIA_ROOT", DEFAULT_MEDIA_ROOT)),
            bind_addr: get("DOCPARSER_BIND", DEFAULT_BIND_ADDR),
            max_upload_bytes,
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            DocParserError::Configuration(format!("{} environment variable not set", key))
        })
}
