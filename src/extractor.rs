//! Structured field extraction over OCR markdown.
//!
//! One chat completion per request. The reply must be a JSON array of
//! `{"field", "value"}` objects; anything else is a [`DocParserError::MalformedResponse`].

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{DocParserError, Result};
use crate::models::DataPoint;
use crate::openai::{ChatBackend, Message};
use crate::sanitize::clean_json_string;

const SYSTEM_PROMPT: &str =
    "You are a precise data extraction assistant. Return only valid JSON arrays.";

/// Extraction adapter in front of a chat backend.
#[derive(Clone)]
pub struct Extractor {
    backend: Arc<dyn ChatBackend>,
}

impl Extractor {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    /// Ask the model for the data points described by `instructions`.
    pub async fn extract_fields(
        &self,
        markdown_text: &str,
        instructions: &str,
    ) -> Result<Vec<DataPoint>> {
        info!(
            "Starting field extraction ({} chars of markdown, {} chars of instructions)",
            markdown_text.len(),
            instructions.len()
        );

        let messages = vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(build_prompt(instructions, markdown_text)),
        ];

        let response = self
            .backend
            .chat(messages)
            .await
            .map_err(|e| DocParserError::Completion(format!("{:#}", e)))?;

        debug!("Raw LLM response length: {} chars", response.len());

        let data_points = parse_data_points(&response).map_err(|e| {
            warn!(
                "Unusable extraction response: {} (raw: {})",
                e,
                response.chars().take(200).collect::<String>()
            );
            e
        })?;

        info!(
            "Extracted {} data points ({} not found)",
            data_points.len(),
            data_points.iter().filter(|p| p.is_not_found()).count()
        );
        Ok(data_points)
    }
}

/// Build the user prompt. `instructions` and `markdown_text` are embedded verbatim.
pub fn build_prompt(instructions: &str, markdown_text: &str) -> String {
    format!(
        r#"You are a precise data extraction specialist. Based on the following document content and extraction instructions, extract ONLY the requested data points and return them as a JSON array of objects with "field" and "value" properties.

EXTRACTION INSTRUCTIONS:
{instructions}

DOCUMENT CONTENT:
{markdown_text}

IMPORTANT RULES:
1. Return ONLY a JSON array of objects with "field" and "value" properties
2. Each object should have exactly two properties: "field" (string) and "value" (string)
3. Do not include any explanations, markdown, or additional text
4. If a requested field is not found, use "Not found" as the value
5. Be specific with field names based on the user's instructions
6. Extract all relevant instances of requested data

Example format:
[
  {{"field": "Invoice Number", "value": "INV-2024-001"}},
  {{"field": "Date", "value": "2024-01-15"}},
  {{"field": "Total Amount", "value": "$1,250.00"}}
]

Return the JSON array now:
"#
    )
}

/// Sanitize, parse and validate a raw completion.
pub fn parse_data_points(response: &str) -> Result<Vec<DataPoint>> {
    let json_str = clean_json_string(strip_code_fence(response));

    let parsed: Value = serde_json::from_str(&json_str).map_err(|e| {
        DocParserError::MalformedResponse(format!(
            "invalid JSON ({}): {}",
            e,
            json_str.chars().take(200).collect::<String>()
        ))
    })?;

    let items = match parsed {
        Value::Array(items) => items,
        other => {
            return Err(DocParserError::MalformedResponse(format!(
                "expected a JSON array, got {}",
                json_kind(&other)
            )))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| data_point_from_value(i, item))
        .collect()
}

fn data_point_from_value(index: usize, item: Value) -> Result<DataPoint> {
    let malformed = |reason: String| {
        DocParserError::MalformedResponse(format!("item {}: {}", index, reason))
    };

    let obj = match item {
        Value::Object(obj) => obj,
        other => return Err(malformed(format!("expected an object, got {}", json_kind(&other)))),
    };

    let field = match obj.get("field") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => return Err(malformed(format!("\"field\" is {}", json_kind(other)))),
        None => return Err(malformed("missing \"field\"".to_string())),
    };

    let value = match obj.get("value") {
        Some(Value::String(s)) => s.clone(),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => v.to_string(),
        Some(other) => return Err(malformed(format!("\"value\" is {}", json_kind(other)))),
        None => return Err(malformed("missing \"value\"".to_string())),
    };

    Ok(DataPoint::new(field, value))
}

/// Pull the JSON out of a reply that wraps it in a markdown code fence.
///
/// Prose before the fence and a language tag after the opening backticks
/// (`json`, `JSON`, ...) are dropped, whether or not the tag is followed by a
/// newline. Replies without a fence are returned trimmed.
fn strip_code_fence(text: &str) -> &str {
    let Some(block) = text.split("```").nth(1) else {
        return text.trim();
    };
    let block = block.trim_start();
    let tag_len = block
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(block.len());
    block[tag_len..].trim()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
