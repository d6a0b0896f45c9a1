//! Document intake: validation and upload
//!
//! Everything the provider can choke on is checked up front (existence,
//! format, size, readability), and every expected failure is reported as
//! a rejection value rather than an error. Directory uploads treat
//! partial success as the normal outcome: invalid files are skipped and
//! individual upload failures never abort the rest.

use crate::config::IntakeConfig;
use crate::errors::{AppError, Result};
use crate::gemini::model::{ChunkingConfig, WhiteSpaceConfig};
use crate::gemini::FileSearchProvider;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// File extensions the provider accepts for ingestion
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "pdf", "txt", "docx", "html", "htm", "md", "markdown", "csv", "json", "xml",
];

/// Why a file was refused before upload
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FileRejection {
    #[error("file not found: {path}")]
    NotFound { path: String },

    #[error("unsupported file format: {extension} (supported: pdf, txt, docx, html, htm, md, markdown, csv, json, xml)")]
    UnsupportedFormat { extension: String },

    #[error("file too large: {size_mb:.1}MB (max {limit_mb}MB)")]
    TooLarge { size_mb: f64, limit_mb: u64 },

    #[error("cannot read file: {reason}")]
    Unreadable { reason: String },
}

/// One file skipped or failed during a directory upload
#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Outcome of a directory upload. Partial success is expected, not an
/// error state.
#[derive(Debug, Default)]
pub struct DirectoryUploadReport {
    /// Display names of successfully ingested files
    pub uploaded: Vec<String>,
    /// Files that failed validation and were never sent
    pub skipped: Vec<SkippedFile>,
    /// Files that passed validation but failed during upload
    pub failed: Vec<SkippedFile>,
}

/// Validates documents and forwards them to the provider store
pub struct DocumentIntake {
    provider: Arc<dyn FileSearchProvider>,
    http: reqwest::Client,
    max_file_size_bytes: u64,
    max_tokens_per_chunk: u32,
    max_overlap_tokens: u32,
}

impl DocumentIntake {
    pub fn new(provider: Arc<dyn FileSearchProvider>, config: &IntakeConfig) -> Self {
        Self {
            provider,
            http: reqwest::Client::new(),
            max_file_size_bytes: config.max_file_size_mb * 1024 * 1024,
            max_tokens_per_chunk: config.max_tokens_per_chunk,
            max_overlap_tokens: config.max_overlap_tokens,
        }
    }

    /// Check whether a file can be uploaded. A file exactly at the size
    /// ceiling passes; one byte over fails.
    pub fn validate_file(&self, path: &Path) -> std::result::Result<(), FileRejection> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FileRejection::NotFound {
                    path: path.display().to_string(),
                })
            }
            Err(e) => {
                return Err(FileRejection::Unreadable {
                    reason: e.to_string(),
                })
            }
        };
        if !metadata.is_file() {
            return Err(FileRejection::NotFound {
                path: path.display().to_string(),
            });
        }

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(FileRejection::UnsupportedFormat {
                extension: if extension.is_empty() {
                    "(none)".to_string()
                } else {
                    format!(".{extension}")
                },
            });
        }

        if metadata.len() > self.max_file_size_bytes {
            return Err(FileRejection::TooLarge {
                size_mb: metadata.len() as f64 / (1024.0 * 1024.0),
                limit_mb: self.max_file_size_bytes / (1024 * 1024),
            });
        }

        if let Err(e) = fs::File::open(path) {
            return Err(FileRejection::Unreadable {
                reason: if e.kind() == ErrorKind::PermissionDenied {
                    "permission denied".to_string()
                } else {
                    e.to_string()
                },
            });
        }

        Ok(())
    }

    /// Validate several files independently. One invalid file never
    /// blocks validation of the others.
    pub fn validate_batch(
        &self,
        paths: &[PathBuf],
    ) -> BTreeMap<PathBuf, std::result::Result<(), FileRejection>> {
        paths
            .iter()
            .map(|path| (path.clone(), self.validate_file(path)))
            .collect()
    }

    /// Chunking configuration derived from intake settings
    pub fn chunking_config(&self) -> ChunkingConfig {
        ChunkingConfig {
            white_space_config: WhiteSpaceConfig {
                max_tokens_per_chunk: self.max_tokens_per_chunk,
                max_overlap_tokens: self.max_overlap_tokens,
            },
        }
    }

    /// Validate and upload one document. Returns the provider's document
    /// resource name.
    pub async fn upload_document(
        &self,
        path: &Path,
        store_id: &str,
        display_name: Option<&str>,
        custom_chunking: bool,
        cancel: &CancellationToken,
    ) -> Result<String> {
        self.validate_file(path)
            .map_err(|rejection| AppError::DocumentRejected {
                reason: rejection.to_string(),
            })?;

        let display_name = display_name
            .map(str::to_string)
            .or_else(|| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "document".to_string());
        let chunking = custom_chunking.then(|| self.chunking_config());

        let start = Instant::now();
        let result = self
            .provider
            .upload(path, store_id, &display_name, chunking, cancel)
            .await;
        crate::metrics::record_upload(start.elapsed().as_secs_f64(), result.is_ok());

        match &result {
            Ok(document) => {
                tracing::info!(%document, display_name = %display_name, "Document ingested");
            }
            Err(e) => {
                tracing::error!(error = %e, display_name = %display_name, "Document upload failed");
            }
        }
        result
    }

    /// Walk a directory, validate every supported file, and upload the
    /// valid ones. Individual failures are recorded and skipped.
    pub async fn upload_directory(
        &self,
        directory: &Path,
        store_id: &str,
        recursive: bool,
        cancel: &CancellationToken,
    ) -> Result<DirectoryUploadReport> {
        if !directory.is_dir() {
            return Err(AppError::DirectoryNotFound {
                path: directory.display().to_string(),
            });
        }

        let mut candidates = Vec::new();
        collect_supported_files(directory, recursive, &mut candidates)?;
        candidates.sort();

        if candidates.is_empty() {
            tracing::warn!(directory = %directory.display(), "No supported files found");
            return Ok(DirectoryUploadReport::default());
        }

        let mut report = DirectoryUploadReport::default();
        for (path, validation) in self.validate_batch(&candidates) {
            if let Err(rejection) = validation {
                tracing::warn!(path = %path.display(), reason = %rejection, "Skipping invalid file");
                report.skipped.push(SkippedFile {
                    path: path.display().to_string(),
                    reason: rejection.to_string(),
                });
                continue;
            }

            // Display names keep the path relative to the upload root
            let display_name = path
                .strip_prefix(directory)
                .unwrap_or(&path)
                .display()
                .to_string();

            match self
                .upload_document(&path, store_id, Some(&display_name), false, cancel)
                .await
            {
                Ok(_) => report.uploaded.push(display_name),
                Err(e) => report.failed.push(SkippedFile {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                }),
            }
        }

        tracing::info!(
            uploaded = report.uploaded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Directory upload complete"
        );
        Ok(report)
    }

    /// Download a document and upload it to a store. The intermediate
    /// temp file is removed on every exit path. Returns the document
    /// resource name and the file name derived from the URL.
    pub async fn upload_from_url(
        &self,
        url: &str,
        store_id: &str,
        display_name: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<(String, String)> {
        let file_name = file_name_from_url(url);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::DocumentRejected {
                reason: format!("failed to download {url}: {e}"),
            })?;
        if !response.status().is_success() {
            return Err(AppError::DocumentRejected {
                reason: format!("download of {url} failed with status {}", response.status()),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::DocumentRejected {
                reason: format!("failed to read {url}: {e}"),
            })?;

        // Keep the URL's extension so validation sees the real format
        let suffix = Path::new(&file_name)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let temp = tempfile::Builder::new()
            .prefix("ragbridge-")
            .suffix(&suffix)
            .tempfile()?;
        fs::write(temp.path(), &bytes)?;

        let document = self
            .upload_document(
                temp.path(),
                store_id,
                Some(display_name.unwrap_or(&file_name)),
                false,
                cancel,
            )
            .await?;
        Ok((document, file_name))
    }
}

fn collect_supported_files(
    directory: &Path,
    recursive: bool,
    out: &mut Vec<PathBuf>,
) -> std::io::Result<()> {
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        if path.is_dir() {
            if recursive {
                collect_supported_files(&path, recursive, out)?;
            }
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        {
            out.push(path);
        }
    }
    Ok(())
}

/// Last path segment of a URL, without query or fragment
fn file_name_from_url(url: &str) -> String {
    let trimmed = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .trim_end_matches('/');
    trimmed
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or("document")
        .to_string()
}
