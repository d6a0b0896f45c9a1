//! Citation extraction and response normalization
//!
//! The provider's grounding payload is loosely structured and its shape
//! drifts across API versions: the same logical field can surface at
//! several different paths. This module maps that payload onto the stable
//! `Citation` contract with an ordered fallback chain per field. All
//! extraction is total: a degenerate payload yields no citations, never
//! an error.

use crate::gemini::model::{Candidate, GenerationResponse, GroundingChunk};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Placeholder when no field in the chunk resolves to a file name
pub const UNKNOWN_FILE: &str = "Unknown File";

/// Characters of chunk text that participate in the dedup key
const DEDUP_TEXT_PREFIX: usize = 100;

/// One grounding reference returned alongside an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub file_name: String,
    pub chunk_text: String,
    pub page_number: Option<i32>,
    pub score: Option<f64>,
    pub metadata: Option<Map<String, Value>>,
}

/// Aggregate grounding information for one response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingSummary {
    pub support_score: Option<f64>,
    pub grounding_chunks_count: usize,
}

/// Outcome of one query: the generated answer plus its structural
/// evidence. Constructed fresh per query and never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub model_used: String,
    pub query: String,
    pub grounding_metadata: Option<GroundingSummary>,
}

impl SearchOutcome {
    /// An answer-only outcome with no citations; used for the "store not
    /// found" and provider-failure paths, which report through the answer
    /// text rather than an error.
    pub fn fallback(answer: impl Into<String>, model: &str, query: &str) -> Self {
        Self {
            answer: answer.into(),
            citations: Vec::new(),
            model_used: model.to_string(),
            query: query.to_string(),
            grounding_metadata: None,
        }
    }

    /// Normalize a provider response into an outcome
    pub fn from_response(response: &GenerationResponse, model: &str, query: &str) -> Self {
        Self {
            answer: response.text(),
            citations: extract_citations(response),
            model_used: model.to_string(),
            query: query.to_string(),
            grounding_metadata: extract_grounding_summary(response),
        }
    }
}

/// Extract citations from a response's grounding metadata.
///
/// Only the first candidate participates: generation requests ask for a
/// single candidate, and merging grounding across several would conflate
/// unrelated evidence.
pub fn extract_citations(response: &GenerationResponse) -> Vec<Citation> {
    let Some(chunks) = grounding_chunks(response) else {
        return Vec::new();
    };

    let citations = chunks.iter().map(citation_from_chunk).collect();
    deduplicate(citations)
}

/// Extract the grounding summary (support score and chunk count) from a
/// response, or `None` when it carries no grounding at all.
pub fn extract_grounding_summary(response: &GenerationResponse) -> Option<GroundingSummary> {
    let grounding = response.candidates.first()?.grounding_metadata.as_ref()?;
    Some(GroundingSummary {
        support_score: grounding.support_score,
        grounding_chunks_count: grounding_chunks(response).map_or(0, <[GroundingChunk]>::len),
    })
}

/// Locate the grounding-chunk sequence of the first candidate. The chunk
/// list surfaces either directly or nested under `file_search_grounding`,
/// in that order of preference.
fn grounding_chunks(response: &GenerationResponse) -> Option<&[GroundingChunk]> {
    let candidate: &Candidate = response.candidates.first()?;
    let grounding = candidate.grounding_metadata.as_ref()?;

    if let Some(chunks) = grounding.grounding_chunks.as_deref() {
        if !chunks.is_empty() {
            return Some(chunks);
        }
    }
    grounding
        .file_search_grounding
        .as_ref()
        .and_then(|nested| nested.grounding_chunks.as_deref())
        .filter(|chunks| !chunks.is_empty())
}

fn citation_from_chunk(chunk: &GroundingChunk) -> Citation {
    Citation {
        file_name: file_name_of(chunk),
        chunk_text: chunk_text_of(chunk),
        page_number: page_number_of(chunk),
        score: score_of(chunk),
        metadata: metadata_of(chunk),
    }
}

/// File name fallback chain: direct field, source file name, last path
/// segment of the retrieved-context URI, retrieved-context title, then
/// the placeholder. First match wins.
fn file_name_of(chunk: &GroundingChunk) -> String {
    if let Some(name) = &chunk.file_name {
        return name.clone();
    }
    if let Some(name) = chunk.source.as_ref().and_then(|s| s.file_name.as_ref()) {
        return name.clone();
    }
    if let Some(context) = &chunk.retrieved_context {
        if let Some(uri) = &context.uri {
            return uri.rsplit('/').next().unwrap_or(uri).to_string();
        }
        if let Some(title) = &context.title {
            return title.clone();
        }
    }
    UNKNOWN_FILE.to_string()
}

/// Chunk text fallback chain: direct field, `content`, retrieved-context
/// text, then empty.
fn chunk_text_of(chunk: &GroundingChunk) -> String {
    chunk
        .chunk_text
        .as_ref()
        .or(chunk.content.as_ref())
        .or_else(|| chunk.retrieved_context.as_ref().and_then(|c| c.text.as_ref()))
        .cloned()
        .unwrap_or_default()
}

fn page_number_of(chunk: &GroundingChunk) -> Option<i32> {
    chunk
        .page_number
        .or_else(|| chunk.source.as_ref().and_then(|s| s.page_number))
}

fn score_of(chunk: &GroundingChunk) -> Option<f64> {
    chunk.score.or(chunk.relevance_score)
}

fn metadata_of(chunk: &GroundingChunk) -> Option<Map<String, Value>> {
    chunk.metadata.clone().filter(|map| !map.is_empty())
}

/// Collapse citations sharing a file name and leading chunk text,
/// retaining the first occurrence in provider order.
fn deduplicate(citations: Vec<Citation>) -> Vec<Citation> {
    let mut seen = std::collections::HashSet::new();
    citations
        .into_iter()
        .filter(|citation| {
            let prefix: String = citation.chunk_text.chars().take(DEDUP_TEXT_PREFIX).collect();
            seen.insert((citation.file_name.clone(), prefix))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: Value) -> GenerationResponse {
        serde_json::from_value(value).unwrap()
    }

    fn grounded_response(chunks: Value) -> GenerationResponse {
        response(json!({
            "candidates": [{
                "content": {"parts": [{"text": "answer"}], "role": "model"},
                "groundingMetadata": {
                    "groundingChunks": chunks,
                    "supportScore": 0.82
                }
            }]
        }))
    }

    #[test]
    fn no_candidates_yields_empty_and_none() {
        let resp = response(json!({}));
        assert!(extract_citations(&resp).is_empty());
        assert!(extract_grounding_summary(&resp).is_none());
    }

    #[test]
    fn candidate_without_grounding_yields_empty() {
        let resp = response(json!({
            "candidates": [{"content": {"parts": [{"text": "plain answer"}]}}]
        }));
        assert!(extract_citations(&resp).is_empty());
        assert!(extract_grounding_summary(&resp).is_none());
    }

    #[test]
    fn direct_fields_extract_verbatim() {
        let resp = grounded_response(json!([{
            "fileName": "report.pdf",
            "chunkText": "revenue grew 12%",
            "pageNumber": 4,
            "score": 0.91,
            "metadata": {"section": "financials"}
        }]));

        let citations = extract_citations(&resp);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].file_name, "report.pdf");
        assert_eq!(citations[0].chunk_text, "revenue grew 12%");
        assert_eq!(citations[0].page_number, Some(4));
        assert_eq!(citations[0].score, Some(0.91));
        assert_eq!(
            citations[0].metadata.as_ref().unwrap()["section"],
            "financials"
        );
    }

    #[test]
    fn retrieved_context_fallbacks_apply() {
        let resp = grounded_response(json!([{
            "retrievedContext": {
                "uri": "fileSearchStores/s1/documents/manual.txt",
                "title": "Manual",
                "text": "24 month warranty"
            },
            "relevanceScore": 0.4
        }]));

        let citations = extract_citations(&resp);
        assert_eq!(citations[0].file_name, "manual.txt");
        assert_eq!(citations[0].chunk_text, "24 month warranty");
        assert_eq!(citations[0].score, Some(0.4));
        assert_eq!(citations[0].page_number, None);
    }

    #[test]
    fn direct_file_name_wins_over_retrieved_context_uri() {
        let resp = grounded_response(json!([{
            "fileName": "direct.pdf",
            "retrievedContext": {"uri": "stores/s1/docs/indirect.pdf"}
        }]));

        assert_eq!(extract_citations(&resp)[0].file_name, "direct.pdf");
    }

    #[test]
    fn source_file_name_wins_over_context_title() {
        let resp = grounded_response(json!([{
            "source": {"fileName": "from-source.pdf", "pageNumber": 7},
            "retrievedContext": {"title": "From Title"}
        }]));

        let citations = extract_citations(&resp);
        assert_eq!(citations[0].file_name, "from-source.pdf");
        assert_eq!(citations[0].page_number, Some(7));
    }

    #[test]
    fn unresolvable_chunk_gets_placeholders() {
        let resp = grounded_response(json!([{"score": 0.1}]));

        let citations = extract_citations(&resp);
        assert_eq!(citations[0].file_name, UNKNOWN_FILE);
        assert_eq!(citations[0].chunk_text, "");
        assert!(citations[0].metadata.is_none());
    }

    #[test]
    fn empty_metadata_map_becomes_none() {
        let resp = grounded_response(json!([{"fileName": "a.txt", "metadata": {}}]));
        assert!(extract_citations(&resp)[0].metadata.is_none());
    }

    #[test]
    fn nested_file_search_grounding_is_found() {
        let resp = response(json!({
            "candidates": [{
                "groundingMetadata": {
                    "fileSearchGrounding": {
                        "groundingChunks": [{"fileName": "nested.md", "content": "body"}]
                    }
                }
            }]
        }));

        let citations = extract_citations(&resp);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].file_name, "nested.md");
        assert_eq!(citations[0].chunk_text, "body");
    }

    #[test]
    fn duplicate_chunks_collapse_to_first() {
        let long_a = format!("{}{}", "x".repeat(100), "tail one");
        let long_b = format!("{}{}", "x".repeat(100), "tail two");
        let resp = grounded_response(json!([
            {"fileName": "a.txt", "chunkText": long_a.clone(), "score": 0.9},
            // same file, same first 100 chars, different tail: a duplicate
            {"fileName": "a.txt", "chunkText": long_b, "score": 0.1},
            // same text in a different file: not a duplicate
            {"fileName": "b.txt", "chunkText": long_a}
        ]));

        let citations = extract_citations(&resp);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].file_name, "a.txt");
        assert_eq!(citations[0].score, Some(0.9));
        assert_eq!(citations[1].file_name, "b.txt");
    }

    #[test]
    fn extraction_is_idempotent() {
        let resp = grounded_response(json!([
            {"fileName": "a.txt", "chunkText": "one"},
            {"fileName": "b.txt", "chunkText": "two"}
        ]));

        assert_eq!(extract_citations(&resp), extract_citations(&resp));
    }

    #[test]
    fn grounding_summary_counts_chunks() {
        let resp = grounded_response(json!([
            {"fileName": "a.txt"}, {"fileName": "b.txt"}
        ]));

        let summary = extract_grounding_summary(&resp).unwrap();
        assert_eq!(summary.grounding_chunks_count, 2);
        assert_eq!(summary.support_score, Some(0.82));
    }

    #[test]
    fn grounding_summary_present_even_without_chunks() {
        let resp = response(json!({
            "candidates": [{"groundingMetadata": {"supportScore": 0.5}}]
        }));

        let summary = extract_grounding_summary(&resp).unwrap();
        assert_eq!(summary.grounding_chunks_count, 0);
        assert_eq!(summary.support_score, Some(0.5));
    }

    #[test]
    fn multibyte_chunk_text_dedups_without_panicking() {
        let text = "é".repeat(150);
        let resp = grounded_response(json!([
            {"fileName": "a.txt", "chunkText": text.clone()},
            {"fileName": "a.txt", "chunkText": text}
        ]));

        assert_eq!(extract_citations(&resp).len(), 1);
    }
}
