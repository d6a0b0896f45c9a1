//! REST client for the managed File Search API

use crate::config::ProviderConfig;
use crate::errors::{AppError, Result};
use crate::gemini::model::{
    ChunkingConfig, CreateStoreRequest, DocumentInfo, GenerateContentRequest,
    GenerationResponse, ListDocumentsResponse, ListStoresResponse, Operation, StoreInfo,
    UploadConfig,
};
use crate::gemini::FileSearchProvider;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Bounds for the upload-operation polling loop
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub timeout: Duration,
}

impl From<&ProviderConfig> for PollConfig {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            initial_interval: Duration::from_secs(config.poll_initial_interval_secs),
            max_interval: Duration::from_secs(config.poll_max_interval_secs),
            timeout: Duration::from_secs(config.poll_timeout_secs),
        }
    }
}

/// File Search REST client
pub struct GeminiFileSearch {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    max_retries: u32,
    poll: PollConfig,
}

impl GeminiFileSearch {
    /// Create a new client from provider configuration
    pub fn new(api_key: String, config: &ProviderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            poll: PollConfig::from(config),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Media uploads go through the `/upload/` variant of the API root.
    fn upload_url(&self, resource_id: &str) -> String {
        let upload_base = self.base_url.replacen("/v1beta", "/upload/v1beta", 1);
        format!("{upload_base}/{resource_id}:uploadToFileSearchStore")
    }

    /// Issue a request, retrying transient failures when configured.
    /// `max_retries = 0` means a single attempt; no policy is assumed.
    async fn send_json<T, F>(&self, make_request: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(100 * 2_u64.pow(attempt - 1));
                tokio::time::sleep(delay).await;
            }

            match self.dispatch(make_request()).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if attempt < self.max_retries {
                        tracing::warn!(
                            attempt = attempt + 1,
                            max_attempts = self.max_retries + 1,
                            error = %e,
                            "Provider request failed, retrying"
                        );
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::Provider {
            message: "unknown error after retries".to_string(),
        }))
    }

    async fn dispatch<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| AppError::Provider {
                message: format!("request failed: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Provider {
                message: format!("API error {status}: {body}"),
            });
        }

        response.json().await.map_err(|e| AppError::Provider {
            message: format!("failed to parse response: {e}"),
        })
    }

    async fn get_operation(&self, name: &str) -> Result<Operation> {
        self.send_json(|| self.http.get(self.url(name))).await
    }
}

#[async_trait]
impl FileSearchProvider for GeminiFileSearch {
    async fn create_store(&self, display_name: &str) -> Result<StoreInfo> {
        let body = CreateStoreRequest {
            display_name: display_name.to_string(),
        };
        let store: StoreInfo = self
            .send_json(|| self.http.post(self.url("fileSearchStores")).json(&body))
            .await?;
        tracing::info!(store_id = %store.name, display_name, "Created document store");
        Ok(store)
    }

    async fn list_stores(&self) -> Result<Vec<StoreInfo>> {
        let mut stores = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = page_token.clone();
            let page: ListStoresResponse = self
                .send_json(|| {
                    let mut request = self.http.get(self.url("fileSearchStores"));
                    if let Some(token) = &token {
                        request = request.query(&[("pageToken", token)]);
                    }
                    request
                })
                .await?;
            stores.extend(page.file_search_stores);
            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(stores)
    }

    async fn delete_store(&self, resource_id: &str, force: bool) -> Result<()> {
        let _: serde_json::Value = self
            .send_json(|| {
                self.http
                    .delete(self.url(resource_id))
                    .query(&[("force", force)])
            })
            .await?;
        tracing::info!(store_id = resource_id, "Deleted document store");
        Ok(())
    }

    async fn list_documents(&self, resource_id: &str) -> Result<Vec<DocumentInfo>> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;
        let path = format!("{resource_id}/documents");

        loop {
            let token = page_token.clone();
            let page: ListDocumentsResponse = self
                .send_json(|| {
                    let mut request = self.http.get(self.url(&path));
                    if let Some(token) = &token {
                        request = request.query(&[("pageToken", token)]);
                    }
                    request
                })
                .await?;
            documents.extend(page.documents);
            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(documents)
    }

    async fn upload(
        &self,
        path: &Path,
        resource_id: &str,
        display_name: &str,
        chunking: Option<ChunkingConfig>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        let metadata = serde_json::to_string(&UploadConfig {
            display_name: display_name.to_string(),
            chunking_config: chunking,
        })?;

        let metadata_part = reqwest::multipart::Part::text(metadata)
            .mime_str("application/json")
            .map_err(|e| AppError::Internal {
                message: format!("invalid metadata part: {e}"),
            })?;
        let file_part = reqwest::multipart::Part::bytes(bytes)
            .file_name(display_name.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| AppError::Internal {
                message: format!("invalid file part: {e}"),
            })?;
        let form = reqwest::multipart::Form::new()
            .part("metadata", metadata_part)
            .part("file", file_part);

        // Multipart bodies are not replayable, so the upload request
        // itself is never retried.
        let operation: Operation = self
            .dispatch(self.http.post(self.upload_url(resource_id)).multipart(form))
            .await?;

        tracing::info!(
            operation = %operation.name,
            store_id = resource_id,
            display_name,
            "Upload accepted, waiting for ingestion"
        );

        let operation = if operation.done {
            operation
        } else {
            let name = operation.name.clone();
            poll_until_done(|| self.get_operation(&name), &self.poll, cancel).await?
        };

        if let Some(error) = operation.error {
            return Err(AppError::Provider {
                message: format!(
                    "ingestion failed: {}",
                    error.message.unwrap_or_else(|| "unknown error".to_string())
                ),
            });
        }

        // The finished operation carries the ingested document resource;
        // fall back to the operation name when the shape omits it.
        let document = operation
            .response
            .as_ref()
            .and_then(|response| response.get("document"))
            .and_then(|document| document.get("name"))
            .and_then(|name| name.as_str())
            .map(str::to_string)
            .unwrap_or(operation.name);

        Ok(document)
    }

    async fn generate(
        &self,
        model: &str,
        request: GenerateContentRequest,
    ) -> Result<GenerationResponse> {
        let path = format!("models/{model}:generateContent");
        self.send_json(|| self.http.post(self.url(&path)).json(&request))
            .await
    }
}

/// Poll an operation until it reports done, bounded by the configured
/// deadline and the caller's cancellation token. The interval doubles
/// after every poll up to the configured ceiling.
pub(crate) async fn poll_until_done<F, Fut>(
    mut fetch: F,
    config: &PollConfig,
    cancel: &CancellationToken,
) -> Result<Operation>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Operation>>,
{
    let deadline = tokio::time::Instant::now() + config.timeout;
    let mut interval = config.initial_interval;

    loop {
        let operation = fetch().await?;
        if operation.done {
            return Ok(operation);
        }

        if tokio::time::Instant::now() + interval >= deadline {
            return Err(AppError::ProviderTimeout {
                timeout_secs: config.timeout.as_secs(),
            });
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(AppError::OperationCancelled),
            _ = tokio::time::sleep(interval) => {}
        }

        interval = (interval * 2).min(config.max_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_client() -> GeminiFileSearch {
        GeminiFileSearch::new("test-key".to_string(), &ProviderConfig::default()).unwrap()
    }

    fn test_poll_config() -> PollConfig {
        PollConfig {
            initial_interval: Duration::from_secs(2),
            max_interval: Duration::from_secs(30),
            timeout: Duration::from_secs(600),
        }
    }

    #[test]
    fn upload_url_uses_upload_api_root() {
        let client = test_client();
        assert_eq!(
            client.upload_url("fileSearchStores/abc"),
            "https://generativelanguage.googleapis.com/upload/v1beta/fileSearchStores/abc:uploadToFileSearchStore"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn poll_returns_once_operation_completes() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let operation = poll_until_done(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    Ok(Operation {
                        name: "operations/u1".to_string(),
                        done: n >= 2,
                        ..Default::default()
                    })
                }
            },
            &test_poll_config(),
            &cancel,
        )
        .await
        .unwrap();

        assert!(operation.done);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_errors_at_deadline_when_never_done() {
        let cancel = CancellationToken::new();
        let config = PollConfig {
            initial_interval: Duration::from_secs(2),
            max_interval: Duration::from_secs(8),
            timeout: Duration::from_secs(60),
        };

        let result = poll_until_done(
            || async { Ok(Operation::default()) },
            &config,
            &cancel,
        )
        .await;

        assert!(matches!(
            result,
            Err(AppError::ProviderTimeout { timeout_secs: 60 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_stops_when_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = poll_until_done(
            || async { Ok(Operation::default()) },
            &test_poll_config(),
            &cancel,
        )
        .await;

        assert!(matches!(result, Err(AppError::OperationCancelled)));
    }
}
