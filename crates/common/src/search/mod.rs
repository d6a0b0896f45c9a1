//! Search orchestration over the File Search provider
//!
//! `SearchEngine` resolves human store names, builds grounded generation
//! requests, and normalizes provider responses. Every operation returns a
//! `SearchOutcome` rather than an error: resolution and provider failures
//! degrade to an explanatory answer string so the caller always receives
//! an answer-shaped result.

use crate::citations::SearchOutcome;
use crate::gemini::model::{GenerateContentRequest, GenerationConfig};
use crate::gemini::FileSearchProvider;
use crate::prompts;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

/// Generation knobs for one query. Temperature and max tokens are passed
/// through to the provider unclamped (accepted temperature range is
/// 0.0-2.0; the provider enforces its own bounds).
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub temperature: f32,
    pub max_tokens: Option<i32>,
    pub system_prompt: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: Some(1024),
            system_prompt: None,
        }
    }
}

/// Query orchestrator. Holds the injected provider handle and the model
/// name; shared read-only across request handlers.
pub struct SearchEngine {
    provider: Arc<dyn FileSearchProvider>,
    model: String,
}

impl SearchEngine {
    pub fn new(provider: Arc<dyn FileSearchProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Search one store and generate a grounded answer.
    pub async fn search_and_generate(
        &self,
        query: &str,
        store_name: &str,
        options: &SearchOptions,
    ) -> SearchOutcome {
        let Some(store_id) = self.resolve_logged(store_name).await else {
            return self.store_not_found(store_name, query);
        };

        tracing::info!(store = store_name, query, "Searching store");
        let prompt = prompts::format_search_prompt(query);
        self.generate_grounded(prompt, query, vec![store_id], options)
            .await
    }

    /// Search several stores with a single generation call. Unresolvable
    /// names are skipped with a warning rather than failing the query.
    pub async fn search_multiple_stores(
        &self,
        query: &str,
        store_names: &[String],
        options: &SearchOptions,
    ) -> SearchOutcome {
        let resolutions = join_all(
            store_names
                .iter()
                .map(|name| self.provider.resolve_store(name)),
        )
        .await;

        let mut store_ids = Vec::new();
        for (name, resolution) in store_names.iter().zip(resolutions) {
            match resolution {
                Ok(Some(id)) => store_ids.push(id),
                Ok(None) => tracing::warn!(store = %name, "Store not found, skipping"),
                Err(e) => tracing::warn!(store = %name, error = %e, "Store lookup failed, skipping"),
            }
        }

        if store_ids.is_empty() {
            return SearchOutcome::fallback(
                format!(
                    "None of the requested stores were found: {}",
                    store_names.join(", ")
                ),
                &self.model,
                query,
            );
        }

        tracing::info!(stores = store_ids.len(), query, "Searching multiple stores");
        let prompt = prompts::format_search_prompt(query);
        self.generate_grounded(prompt, query, store_ids, options).await
    }

    /// Ask a direct question, optionally with extra caller-supplied
    /// context. The default options (temperature 0.0) suit Q&A.
    pub async fn ask_question(
        &self,
        question: &str,
        store_name: &str,
        context: Option<&str>,
        options: &SearchOptions,
    ) -> SearchOutcome {
        let Some(store_id) = self.resolve_logged(store_name).await else {
            return self.store_not_found(store_name, question);
        };

        let mut prompt = prompts::format_qa_prompt(question);
        if let Some(context) = context {
            prompt = format!("Additional context: {context}\n\n{prompt}");
        }

        self.generate_grounded(prompt, question, vec![store_id], options)
            .await
    }

    /// Summarize the documents in a store, optionally focused on a topic.
    /// Slightly higher temperature and a larger budget suit summaries.
    pub async fn summarize_documents(
        &self,
        store_name: &str,
        focus_topic: Option<&str>,
    ) -> SearchOutcome {
        const SUMMARY_QUERY: &str = "Document summarization";

        let Some(store_id) = self.resolve_logged(store_name).await else {
            return self.store_not_found(store_name, SUMMARY_QUERY);
        };

        let prompt = match focus_topic {
            Some(topic) => format!(
                "{}\n\nFocus particularly on information related to: {topic}",
                prompts::SUMMARIZATION_PROMPT
            ),
            None => prompts::SUMMARIZATION_PROMPT.to_string(),
        };

        let options = SearchOptions {
            temperature: 0.3,
            max_tokens: Some(3072),
            system_prompt: None,
        };
        self.generate_grounded(prompt, SUMMARY_QUERY, vec![store_id], &options)
            .await
    }

    /// Process queries sequentially against one store with a fixed delay
    /// between calls (courtesy throttle for provider rate limits). One
    /// query's failure never aborts the rest; the output always has one
    /// outcome per input query, in input order.
    pub async fn batch_search(
        &self,
        queries: &[String],
        store_name: &str,
        delay: Duration,
    ) -> Vec<SearchOutcome> {
        let mut results = Vec::with_capacity(queries.len());

        for (index, query) in queries.iter().enumerate() {
            tracing::info!(index = index + 1, total = queries.len(), "Processing batch query");
            let outcome = self
                .search_and_generate(query, store_name, &SearchOptions::default())
                .await;
            results.push(outcome);

            if index + 1 < queries.len() {
                tokio::time::sleep(delay).await;
            }
        }

        tracing::info!(count = results.len(), "Batch search complete");
        results
    }

    /// Resolve a store display name, folding lookup errors into "not
    /// found" - resolution failure is reported through the outcome, never
    /// raised.
    async fn resolve_logged(&self, store_name: &str) -> Option<String> {
        match self.provider.resolve_store(store_name).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::warn!(store = store_name, error = %e, "Store lookup failed");
                None
            }
        }
    }

    fn store_not_found(&self, store_name: &str, query: &str) -> SearchOutcome {
        SearchOutcome::fallback(
            format!("Store '{store_name}' not found. Create it first via the stores API."),
            &self.model,
            query,
        )
    }

    /// Issue the generation call and normalize the response. Provider
    /// failures become an error-message-bearing outcome.
    async fn generate_grounded(
        &self,
        prompt: String,
        query: &str,
        store_ids: Vec<String>,
        options: &SearchOptions,
    ) -> SearchOutcome {
        let request = GenerateContentRequest::grounded(
            &prompt,
            options
                .system_prompt
                .as_deref()
                .unwrap_or(prompts::RAG_SYSTEM_PROMPT),
            store_ids,
            GenerationConfig {
                temperature: Some(options.temperature),
                max_output_tokens: options.max_tokens,
            },
        );

        match self.provider.generate(&self.model, request).await {
            Ok(response) => {
                let outcome = SearchOutcome::from_response(&response, &self.model, query);
                if outcome.grounding_metadata.is_none() {
                    tracing::debug!(query, "Response carried no grounding metadata");
                }
                outcome
            }
            Err(e) => {
                tracing::error!(error = %e, query, "Generation request failed");
                SearchOutcome::fallback(
                    format!("Error processing query: {e}"),
                    &self.model,
                    query,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::MockFileSearch;
    use std::io::Write;
    use tokio_util::sync::CancellationToken;

    async fn engine_with_document(text: &str) -> (SearchEngine, String) {
        let provider = Arc::new(MockFileSearch::new());
        let store = provider.create_store("manuals").await.unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{text}").unwrap();
        provider
            .upload(
                file.path(),
                &store.name,
                "manual.txt",
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        (
            SearchEngine::new(provider, "mock-model"),
            "manuals".to_string(),
        )
    }

    #[tokio::test]
    async fn missing_store_reports_not_found_without_error() {
        let provider = Arc::new(MockFileSearch::new());
        let engine = SearchEngine::new(provider, "mock-model");

        let outcome = engine
            .search_and_generate("anything", "nonexistent-store", &SearchOptions::default())
            .await;

        assert!(outcome.answer.contains("not found"));
        assert!(outcome.citations.is_empty());
        assert_eq!(outcome.model_used, "mock-model");
        assert_eq!(outcome.query, "anything");
    }

    #[tokio::test]
    async fn grounded_answer_carries_citations() {
        let (engine, store) =
            engine_with_document("The warranty period is 24 months from purchase.").await;

        let outcome = engine
            .search_and_generate("What is the warranty period?", &store, &SearchOptions::default())
            .await;

        assert!(!outcome.answer.is_empty());
        assert!(!outcome.citations.is_empty());
        assert_eq!(outcome.query, "What is the warranty period?");
        let summary = outcome.grounding_metadata.unwrap();
        assert!(summary.grounding_chunks_count >= 1);
    }

    #[tokio::test]
    async fn unrelated_query_reports_not_available() {
        let (engine, store) =
            engine_with_document("The warranty period is 24 months from purchase.").await;

        let outcome = engine
            .search_and_generate("Chronology of byzantine emperors", &store, &SearchOptions::default())
            .await;

        assert!(outcome.answer.contains("not available"));
        assert!(outcome.citations.is_empty());
    }

    #[tokio::test]
    async fn multi_store_skips_unresolvable_names() {
        let (engine, store) =
            engine_with_document("The warranty period is 24 months from purchase.").await;

        let stores = vec![store, "ghost-store".to_string()];
        let outcome = engine
            .search_multiple_stores("warranty period?", &stores, &SearchOptions::default())
            .await;

        assert!(!outcome.citations.is_empty());
    }

    #[tokio::test]
    async fn multi_store_with_no_matches_falls_back() {
        let provider = Arc::new(MockFileSearch::new());
        let engine = SearchEngine::new(provider, "mock-model");

        let stores = vec!["ghost-a".to_string(), "ghost-b".to_string()];
        let outcome = engine
            .search_multiple_stores("anything", &stores, &SearchOptions::default())
            .await;

        assert!(outcome.answer.contains("ghost-a"));
        assert!(outcome.citations.is_empty());
    }

    #[tokio::test]
    async fn batch_returns_one_outcome_per_query_in_order() {
        let (engine, store) =
            engine_with_document("The warranty period is 24 months from purchase.").await;

        let queries = vec![
            "warranty period?".to_string(),
            "unrelated byzantine emperors".to_string(),
            "months of warranty?".to_string(),
        ];
        let results = engine
            .batch_search(&queries, &store, Duration::from_millis(0))
            .await;

        assert_eq!(results.len(), 3);
        for (query, outcome) in queries.iter().zip(&results) {
            assert_eq!(&outcome.query, query);
        }
        assert!(!results[0].citations.is_empty());
        assert!(results[1].citations.is_empty());
    }

    #[tokio::test]
    async fn batch_against_missing_store_still_yields_all_results() {
        let provider = Arc::new(MockFileSearch::new());
        let engine = SearchEngine::new(provider, "mock-model");

        let queries = vec!["a".to_string(), "b".to_string()];
        let results = engine
            .batch_search(&queries, "ghost", Duration::from_millis(0))
            .await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.answer.contains("not found")));
    }

    #[tokio::test]
    async fn ask_question_answers_from_documents() {
        let (engine, store) =
            engine_with_document("The warranty period is 24 months from purchase.").await;

        let outcome = engine
            .ask_question(
                "How long is the warranty?",
                &store,
                Some("The customer bought a refrigerator."),
                &SearchOptions::default(),
            )
            .await;

        assert!(!outcome.answer.is_empty());
        assert_eq!(outcome.query, "How long is the warranty?");
        assert!(!outcome.citations.is_empty());
    }

    #[tokio::test]
    async fn summarize_uses_store_content() {
        let (engine, store) =
            engine_with_document("Summary material about warranty and returns policy.").await;

        let outcome = engine.summarize_documents(&store, Some("warranty")).await;
        assert!(!outcome.answer.is_empty());
        assert_eq!(outcome.query, "Document summarization");
    }
}
