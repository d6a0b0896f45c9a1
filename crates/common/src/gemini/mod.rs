//! File Search provider abstraction
//!
//! Provides a unified interface over the managed document-store and
//! grounded-generation API:
//! - `GeminiFileSearch` - the real REST client
//! - `MockFileSearch` - in-memory double for tests and local development

pub mod client;
pub mod model;

pub use client::{GeminiFileSearch, PollConfig};

use crate::config::ProviderConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use model::{
    ChunkingConfig, Candidate, Content, DocumentInfo, GenerateContentRequest,
    GenerationResponse, GroundingChunk, GroundingMetadata, Part, RetrievedContext, StoreInfo,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Resource-id prefix for document stores
pub const STORE_PREFIX: &str = "fileSearchStores/";

/// Trait for the managed File Search service
#[async_trait]
pub trait FileSearchProvider: Send + Sync {
    /// Create a new document store with the given display name
    async fn create_store(&self, display_name: &str) -> Result<StoreInfo>;

    /// List all document stores
    async fn list_stores(&self) -> Result<Vec<StoreInfo>>;

    /// Delete a store by resource id
    async fn delete_store(&self, resource_id: &str, force: bool) -> Result<()>;

    /// List the documents ingested into a store
    async fn list_documents(&self, resource_id: &str) -> Result<Vec<DocumentInfo>>;

    /// Upload a document into a store and wait (bounded) for ingestion
    /// to complete. Returns the document resource name.
    async fn upload(
        &self,
        path: &Path,
        resource_id: &str,
        display_name: &str,
        chunking: Option<ChunkingConfig>,
        cancel: &CancellationToken,
    ) -> Result<String>;

    /// Run a generation request against the provider
    async fn generate(
        &self,
        model: &str,
        request: GenerateContentRequest,
    ) -> Result<GenerationResponse>;

    /// Resolve a human display name to a store resource id. A value that
    /// already looks like a resource id passes through unchanged.
    async fn resolve_store(&self, display_name: &str) -> Result<Option<String>> {
        if display_name.starts_with(STORE_PREFIX) {
            return Ok(Some(display_name.to_string()));
        }
        let stores = self.list_stores().await?;
        Ok(stores
            .into_iter()
            .find(|store| {
                store.display_name.as_deref() == Some(display_name) || store.name == display_name
            })
            .map(|store| store.name))
    }
}

/// Create a provider based on configuration
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn FileSearchProvider>> {
    match config.kind.as_str() {
        "gemini" => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| AppError::Configuration {
                    message: "provider.api_key is required for the gemini backend".to_string(),
                })?;
            Ok(Arc::new(GeminiFileSearch::new(api_key, config)?))
        }
        "mock" => Ok(Arc::new(MockFileSearch::new())),
        other => {
            tracing::warn!(provider = other, "Unknown provider kind, using mock");
            Ok(Arc::new(MockFileSearch::new()))
        }
    }
}

// ── Mock provider ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct MockDocument {
    name: String,
    display_name: String,
    text: String,
}

#[derive(Debug, Default)]
struct MockState {
    counter: u64,
    stores: Vec<StoreInfo>,
    documents: HashMap<String, Vec<MockDocument>>,
}

/// In-memory provider double. Uploaded document text is matched against
/// query terms so grounded and "not found" paths both stay exercisable
/// without network access.
#[derive(Debug, Default)]
pub struct MockFileSearch {
    state: Mutex<MockState>,
}

impl MockFileSearch {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock provider state poisoned")
    }

    /// The question embedded in an instruction template, or the whole
    /// prompt when there is no `Question:` line (summaries).
    fn effective_query(prompt: &str) -> &str {
        prompt
            .lines()
            .find_map(|line| line.trim().strip_prefix("Question: "))
            .unwrap_or(prompt)
    }

    /// Words of the query worth matching against document text
    fn query_terms(query: &str) -> Vec<String> {
        query
            .split_whitespace()
            .map(|word| {
                word.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .filter(|word| word.len() > 3)
            .collect()
    }
}

#[async_trait]
impl FileSearchProvider for MockFileSearch {
    async fn create_store(&self, display_name: &str) -> Result<StoreInfo> {
        let mut state = self.lock();
        state.counter += 1;
        let store = StoreInfo {
            name: format!("{STORE_PREFIX}mock-{}", state.counter),
            display_name: Some(display_name.to_string()),
            create_time: None,
        };
        state.stores.push(store.clone());
        Ok(store)
    }

    async fn list_stores(&self) -> Result<Vec<StoreInfo>> {
        Ok(self.lock().stores.clone())
    }

    async fn delete_store(&self, resource_id: &str, _force: bool) -> Result<()> {
        let mut state = self.lock();
        let before = state.stores.len();
        state.stores.retain(|store| store.name != resource_id);
        if state.stores.len() == before {
            return Err(AppError::StoreNotFound {
                name: resource_id.to_string(),
            });
        }
        state.documents.remove(resource_id);
        Ok(())
    }

    async fn list_documents(&self, resource_id: &str) -> Result<Vec<DocumentInfo>> {
        let state = self.lock();
        let docs = state
            .documents
            .get(resource_id)
            .map(|docs| {
                docs.iter()
                    .map(|doc| DocumentInfo {
                        name: doc.name.clone(),
                        display_name: Some(doc.display_name.clone()),
                        mime_type: None,
                        size_bytes: Some(doc.text.len().to_string()),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(docs)
    }

    async fn upload(
        &self,
        path: &Path,
        resource_id: &str,
        display_name: &str,
        _chunking: Option<ChunkingConfig>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(AppError::OperationCancelled);
        }
        let bytes = tokio::fs::read(path).await?;
        let text = String::from_utf8_lossy(&bytes).into_owned();

        let mut state = self.lock();
        state.counter += 1;
        let name = format!("{resource_id}/documents/mock-doc-{}", state.counter);
        state
            .documents
            .entry(resource_id.to_string())
            .or_default()
            .push(MockDocument {
                name: name.clone(),
                display_name: display_name.to_string(),
                text,
            });
        Ok(name)
    }

    async fn generate(
        &self,
        model: &str,
        request: GenerateContentRequest,
    ) -> Result<GenerationResponse> {
        let prompt: String = request
            .contents
            .iter()
            .flat_map(|content| content.parts.iter())
            .filter_map(|part| part.text.as_deref())
            .collect();
        let store_ids: Vec<String> = request
            .tools
            .iter()
            .filter_map(|tool| tool.file_search.as_ref())
            .flat_map(|fs| fs.file_search_store_names.iter().cloned())
            .collect();

        let terms = Self::query_terms(Self::effective_query(&prompt));
        let state = self.lock();
        let mut chunks = Vec::new();
        let mut snippets = Vec::new();
        for store_id in &store_ids {
            for doc in state.documents.get(store_id).into_iter().flatten() {
                let haystack = doc.text.to_lowercase();
                if terms.iter().any(|term| haystack.contains(term)) {
                    let snippet: String = doc.text.chars().take(200).collect();
                    chunks.push(GroundingChunk {
                        score: Some(0.9),
                        retrieved_context: Some(RetrievedContext {
                            uri: Some(doc.name.clone()),
                            title: Some(doc.display_name.clone()),
                            text: Some(snippet.clone()),
                        }),
                        ..Default::default()
                    });
                    snippets.push(snippet);
                }
            }
        }

        let (answer, grounding) = if chunks.is_empty() {
            (
                "This information is not available in the provided documents.".to_string(),
                None,
            )
        } else {
            (
                snippets.join("\n"),
                Some(GroundingMetadata {
                    grounding_chunks: Some(chunks),
                    file_search_grounding: None,
                    support_score: Some(0.9),
                }),
            )
        };

        Ok(GenerationResponse {
            candidates: vec![Candidate {
                content: Some(Content {
                    role: Some("model".to_string()),
                    parts: vec![Part::text(&answer)],
                }),
                finish_reason: Some("STOP".to_string()),
                grounding_metadata: grounding,
            }],
            model_version: Some(model.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::model::GenerationConfig;
    use std::io::Write;

    #[tokio::test]
    async fn test_mock_store_lifecycle() {
        let provider = MockFileSearch::new();
        let store = provider.create_store("notes").await.unwrap();
        assert!(store.name.starts_with(STORE_PREFIX));

        let resolved = provider.resolve_store("notes").await.unwrap();
        assert_eq!(resolved.as_deref(), Some(store.name.as_str()));

        // resource ids pass through without a lookup
        let passthrough = provider.resolve_store(&store.name).await.unwrap();
        assert_eq!(passthrough.as_deref(), Some(store.name.as_str()));

        provider.delete_store(&store.name, true).await.unwrap();
        assert!(provider.resolve_store("notes").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mock_grounded_generation() {
        let provider = MockFileSearch::new();
        let store = provider.create_store("manuals").await.unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "The warranty period is 24 months from purchase.").unwrap();

        let cancel = CancellationToken::new();
        provider
            .upload(file.path(), &store.name, "manual.txt", None, &cancel)
            .await
            .unwrap();

        let docs = provider.list_documents(&store.name).await.unwrap();
        assert_eq!(docs.len(), 1);

        let request = GenerateContentRequest::grounded(
            "What is the warranty period?",
            "system",
            vec![store.name.clone()],
            GenerationConfig::default(),
        );
        let response = provider.generate("mock-model", request).await.unwrap();
        assert!(!response.text().is_empty());
        let grounding = response.candidates[0].grounding_metadata.as_ref().unwrap();
        assert_eq!(grounding.grounding_chunks.as_ref().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_unrelated_query_reports_not_available() {
        let provider = MockFileSearch::new();
        let store = provider.create_store("manuals").await.unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "The warranty period is 24 months.").unwrap();
        let cancel = CancellationToken::new();
        provider
            .upload(file.path(), &store.name, "manual.txt", None, &cancel)
            .await
            .unwrap();

        let request = GenerateContentRequest::grounded(
            "Chronology of byzantine emperors",
            "system",
            vec![store.name.clone()],
            GenerationConfig::default(),
        );
        let response = provider.generate("mock-model", request).await.unwrap();
        assert!(response.text().contains("not available"));
        assert!(response.candidates[0].grounding_metadata.is_none());
    }
}
