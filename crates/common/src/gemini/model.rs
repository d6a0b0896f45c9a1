//! Wire schema for the managed File Search API.
//!
//! These types pin the provider contract to one schema version: every
//! field the service may omit is an `Option`, every unknown field is
//! ignored, and response types carry `#[serde(default)]` so a partial
//! payload deserializes instead of failing the request. Downstream code
//! pattern-matches over these optionals rather than probing for fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Generation request ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

impl GenerateContentRequest {
    /// Build a grounded generation request: one user turn, a system
    /// instruction, and the file-search tool scoped to the given stores.
    pub fn grounded(
        prompt: &str,
        system_instruction: &str,
        store_ids: Vec<String>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            contents: vec![Content::user(prompt)],
            system_instruction: Some(Content::text(system_instruction)),
            generation_config: Some(config),
            tools: vec![Tool {
                file_search: Some(FileSearch {
                    file_search_store_names: store_ids,
                }),
            }],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: &str) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part::text(text)],
        }
    }

    pub fn text(text: &str) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Part {
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_search: Option<FileSearch>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSearch {
    pub file_search_store_names: Vec<String>,
}

// ── Generation response ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationResponse {
    pub candidates: Vec<Candidate>,
    pub model_version: Option<String>,
}

impl GenerationResponse {
    /// Concatenated text of the first candidate, or empty when the
    /// response carries no generated content.
    pub fn text(&self) -> String {
        let Some(candidate) = self.candidates.first() else {
            return String::new();
        };
        let Some(content) = &candidate.content else {
            return String::new();
        };
        content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
    pub grounding_metadata: Option<GroundingMetadata>,
}

/// Grounding attached to a candidate. Depending on the API surface the
/// chunk list arrives either directly or nested under
/// `fileSearchGrounding`; both shapes are modeled.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroundingMetadata {
    pub grounding_chunks: Option<Vec<GroundingChunk>>,
    pub file_search_grounding: Option<FileSearchGrounding>,
    pub support_score: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileSearchGrounding {
    pub grounding_chunks: Option<Vec<GroundingChunk>>,
}

/// One evidence fragment backing part of an answer. Field availability
/// varies across provider versions; extraction fallback order lives in
/// `crate::citations`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroundingChunk {
    pub file_name: Option<String>,
    pub chunk_text: Option<String>,
    pub content: Option<String>,
    pub page_number: Option<i32>,
    pub score: Option<f64>,
    pub relevance_score: Option<f64>,
    pub source: Option<ChunkSource>,
    pub retrieved_context: Option<RetrievedContext>,
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkSource {
    pub file_name: Option<String>,
    pub page_number: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievedContext {
    pub uri: Option<String>,
    pub title: Option<String>,
    pub text: Option<String>,
}

// ── Stores and documents ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStoreRequest {
    pub display_name: String,
}

/// A provider-managed document store. `name` is the opaque resource id
/// (`fileSearchStores/...`); `display_name` is the human-chosen label.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreInfo {
    pub name: String,
    pub display_name: Option<String>,
    pub create_time: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListStoresResponse {
    pub file_search_stores: Vec<StoreInfo>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentInfo {
    pub name: String,
    pub display_name: Option<String>,
    pub mime_type: Option<String>,
    // int64 fields arrive as JSON strings
    pub size_bytes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListDocumentsResponse {
    pub documents: Vec<DocumentInfo>,
    pub next_page_token: Option<String>,
}

// ── Upload ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadConfig {
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunking_config: Option<ChunkingConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkingConfig {
    pub white_space_config: WhiteSpaceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhiteSpaceConfig {
    pub max_tokens_per_chunk: u32,
    pub max_overlap_tokens: u32,
}

/// A provider-tracked asynchronous unit of work (document ingestion).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Operation {
    pub name: String,
    pub done: bool,
    pub error: Option<OperationError>,
    pub response: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperationError {
    pub code: Option<i32>,
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_with_unknown_fields_deserializes() {
        let resp: GenerationResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [{"text": "grounded answer"}], "role": "model"},
                "finishReason": "STOP",
                "safetyRatings": [{"category": "HARM", "probability": "NEGLIGIBLE"}]
            }],
            "modelVersion": "gemini-2.5-flash",
            "usageMetadata": {"promptTokenCount": 12}
        }))
        .unwrap();

        assert_eq!(resp.text(), "grounded answer");
        assert_eq!(resp.model_version.as_deref(), Some("gemini-2.5-flash"));
    }

    #[test]
    fn empty_payload_deserializes_to_defaults() {
        let resp: GenerationResponse = serde_json::from_value(json!({})).unwrap();
        assert!(resp.candidates.is_empty());
        assert_eq!(resp.text(), "");
    }

    #[test]
    fn text_concatenates_parts_of_first_candidate_only() {
        let resp: GenerationResponse = serde_json::from_value(json!({
            "candidates": [
                {"content": {"parts": [{"text": "one "}, {"text": "two"}]}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        }))
        .unwrap();
        assert_eq!(resp.text(), "one two");
    }

    #[test]
    fn grounded_request_serializes_camel_case() {
        let request = GenerateContentRequest::grounded(
            "q",
            "sys",
            vec!["fileSearchStores/abc".to_string()],
            GenerationConfig {
                temperature: Some(0.0),
                max_output_tokens: Some(1024),
            },
        );
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "sys");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 1024);
        assert_eq!(
            value["tools"][0]["fileSearch"]["fileSearchStoreNames"][0],
            "fileSearchStores/abc"
        );
    }

    #[test]
    fn store_list_deserializes() {
        let resp: ListStoresResponse = serde_json::from_value(json!({
            "fileSearchStores": [
                {"name": "fileSearchStores/x1", "displayName": "contracts",
                 "createTime": "2026-01-12T08:00:00Z"}
            ]
        }))
        .unwrap();
        assert_eq!(resp.file_search_stores.len(), 1);
        assert_eq!(
            resp.file_search_stores[0].display_name.as_deref(),
            Some("contracts")
        );
    }

    #[test]
    fn operation_error_deserializes() {
        let op: Operation = serde_json::from_value(json!({
            "name": "operations/u1",
            "done": true,
            "error": {"code": 8, "message": "quota exhausted"}
        }))
        .unwrap();
        assert!(op.done);
        assert_eq!(op.error.unwrap().message.as_deref(), Some("quota exhausted"));
    }
}
