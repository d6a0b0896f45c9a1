//! Query handlers: search, ask, multi-store, batch, summarize
//!
//! All of these return 200 with an answer-shaped body even when the
//! store is missing or the provider fails; the orchestrator has already
//! folded those conditions into the answer text. Only malformed requests
//! surface as errors here.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::{Duration, Instant};
use validator::Validate;

use crate::AppState;
use ragbridge_common::{
    citations::{Citation, SearchOutcome},
    errors::{AppError, Result},
    metrics,
    search::SearchOptions,
};

/// Search request
#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    #[validate(length(min = 1, max = 4000))]
    pub query: String,

    #[validate(length(min = 1))]
    pub store_name: String,

    /// Accepted range 0.0-2.0; passed through to the provider unclamped
    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: i32,

    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_max_tokens() -> i32 {
    1024
}

/// Direct question request: the search body plus optional extra context
#[derive(Debug, Deserialize, Validate)]
pub struct AskRequest {
    #[validate(length(min = 1, max = 4000))]
    pub query: String,

    #[validate(length(min = 1))]
    pub store_name: String,

    /// Accepted range 0.0-2.0; passed through to the provider unclamped
    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: i32,

    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Optional extra context prepended to the question
    #[serde(default)]
    pub context: Option<String>,
}

/// Multi-store search request
#[derive(Debug, Deserialize, Validate)]
pub struct MultiSearchRequest {
    #[validate(length(min = 1, max = 4000))]
    pub query: String,

    #[validate(length(min = 1))]
    pub store_names: Vec<String>,

    #[serde(default = "default_multi_temperature")]
    pub temperature: f32,

    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_multi_temperature() -> f32 {
    0.1
}

/// Batch search request
#[derive(Debug, Deserialize, Validate)]
pub struct BatchSearchRequest {
    #[validate(length(min = 1, max = 25))]
    pub queries: Vec<String>,

    #[validate(length(min = 1))]
    pub store_name: String,

    /// Override for the configured inter-query delay
    #[serde(default)]
    pub delay_seconds: Option<f64>,
}

/// Summarization request
#[derive(Debug, Deserialize, Validate)]
pub struct SummarizeRequest {
    #[validate(length(min = 1))]
    pub store_name: String,

    #[serde(default)]
    pub focus_topic: Option<String>,
}

/// Answer-shaped response
#[derive(Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub metadata: Map<String, Value>,
}

#[derive(Serialize)]
pub struct BatchSearchResponse {
    pub results: Vec<QueryResponse>,
    pub count: usize,
    pub processing_time: f64,
}

#[derive(Serialize)]
pub struct SummarizeResponse {
    pub summary: String,
    pub citations: Vec<Citation>,
    pub metadata: Map<String, Value>,
}

/// Assemble the response metadata object: grounding summary fields plus
/// processing time, the original query, and the model used.
fn response_metadata(outcome: &SearchOutcome, processing_time: Option<f64>) -> Map<String, Value> {
    let mut metadata = Map::new();
    if let Some(summary) = &outcome.grounding_metadata {
        if let Some(score) = summary.support_score {
            metadata.insert("support_score".to_string(), json!(score));
        }
        metadata.insert(
            "grounding_chunks_count".to_string(),
            json!(summary.grounding_chunks_count),
        );
    }
    if let Some(seconds) = processing_time {
        metadata.insert("processing_time".to_string(), json!(seconds));
    }
    metadata.insert("query".to_string(), json!(outcome.query));
    metadata.insert("model".to_string(), json!(outcome.model_used));
    metadata
}

fn query_response(outcome: SearchOutcome, processing_time: Option<f64>) -> QueryResponse {
    let metadata = response_metadata(&outcome, processing_time);
    QueryResponse {
        answer: outcome.answer,
        citations: outcome.citations,
        metadata,
    }
}

fn validated<T: Validate>(request: T) -> Result<T> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;
    Ok(request)
}

/// Search one store and generate a grounded answer
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let request = validated(request)?;
    let start = Instant::now();

    let options = SearchOptions {
        temperature: request.temperature,
        max_tokens: Some(request.max_tokens),
        system_prompt: request.system_prompt.clone(),
    };
    let outcome = state
        .engine
        .search_and_generate(&request.query, &request.store_name, &options)
        .await;

    let elapsed = start.elapsed().as_secs_f64();
    metrics::record_query(elapsed, "search", outcome.citations.len());
    tracing::info!(
        store = %request.store_name,
        citations = outcome.citations.len(),
        latency_ms = (elapsed * 1000.0) as u64,
        "Search completed"
    );

    Ok(Json(query_response(outcome, Some(elapsed))))
}

/// Ask a direct question with optional extra context
pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<QueryResponse>> {
    let request = validated(request)?;
    let start = Instant::now();

    let options = SearchOptions {
        temperature: request.temperature,
        max_tokens: Some(request.max_tokens),
        system_prompt: request.system_prompt.clone(),
    };
    let outcome = state
        .engine
        .ask_question(
            &request.query,
            &request.store_name,
            request.context.as_deref(),
            &options,
        )
        .await;

    let elapsed = start.elapsed().as_secs_f64();
    metrics::record_query(elapsed, "ask", outcome.citations.len());
    Ok(Json(query_response(outcome, Some(elapsed))))
}

/// Search several stores with one generation call
pub async fn search_multi(
    State(state): State<AppState>,
    Json(request): Json<MultiSearchRequest>,
) -> Result<Json<QueryResponse>> {
    let request = validated(request)?;
    let start = Instant::now();

    let options = SearchOptions {
        temperature: request.temperature,
        max_tokens: None,
        system_prompt: request.system_prompt.clone(),
    };
    let outcome = state
        .engine
        .search_multiple_stores(&request.query, &request.store_names, &options)
        .await;

    let elapsed = start.elapsed().as_secs_f64();
    metrics::record_query(elapsed, "search_multi", outcome.citations.len());
    Ok(Json(query_response(outcome, Some(elapsed))))
}

/// Run several queries sequentially against one store
pub async fn search_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchSearchRequest>,
) -> Result<Json<BatchSearchResponse>> {
    let request = validated(request)?;
    let start = Instant::now();

    let delay = request
        .delay_seconds
        .map(|seconds| Duration::from_secs_f64(seconds.max(0.0)))
        .unwrap_or_else(|| state.config.batch_delay());
    let outcomes = state
        .engine
        .batch_search(&request.queries, &request.store_name, delay)
        .await;

    let elapsed = start.elapsed().as_secs_f64();
    let results: Vec<QueryResponse> = outcomes
        .into_iter()
        .map(|outcome| query_response(outcome, None))
        .collect();

    metrics::record_query(elapsed, "search_batch", results.len());
    Ok(Json(BatchSearchResponse {
        count: results.len(),
        results,
        processing_time: elapsed,
    }))
}

/// Summarize the documents in a store
pub async fn summarize(
    State(state): State<AppState>,
    Json(request): Json<SummarizeRequest>,
) -> Result<Json<SummarizeResponse>> {
    let request = validated(request)?;
    let start = Instant::now();

    let outcome = state
        .engine
        .summarize_documents(&request.store_name, request.focus_topic.as_deref())
        .await;

    let elapsed = start.elapsed().as_secs_f64();
    metrics::record_query(elapsed, "summarize", outcome.citations.len());

    let metadata = response_metadata(&outcome, Some(elapsed));
    Ok(Json(SummarizeResponse {
        summary: outcome.answer,
        citations: outcome.citations,
        metadata,
    }))
}
