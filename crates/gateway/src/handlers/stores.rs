//! Store management handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::handlers::resolve_store_id;
use crate::AppState;
use ragbridge_common::{
    errors::{AppError, Result},
    gemini::model::{DocumentInfo, StoreInfo},
};

/// Request to create a new store
#[derive(Debug, Deserialize, Validate)]
pub struct CreateStoreRequest {
    #[validate(length(min = 1, max = 512))]
    pub store_name: String,
}

/// API-facing store shape (snake_case, unlike the provider wire format)
#[derive(Debug, Serialize)]
pub struct StoreSummary {
    pub name: String,
    pub display_name: Option<String>,
    pub create_time: Option<String>,
}

impl From<StoreInfo> for StoreSummary {
    fn from(store: StoreInfo) -> Self {
        Self {
            name: store.name,
            display_name: store.display_name,
            create_time: store.create_time,
        }
    }
}

/// API-facing document shape
#[derive(Debug, Serialize)]
pub struct DocumentSummary {
    pub name: String,
    pub display_name: Option<String>,
    pub mime_type: Option<String>,
    pub size_bytes: Option<String>,
}

impl From<DocumentInfo> for DocumentSummary {
    fn from(document: DocumentInfo) -> Self {
        Self {
            name: document.name,
            display_name: document.display_name,
            mime_type: document.mime_type,
            size_bytes: document.size_bytes,
        }
    }
}

#[derive(Serialize)]
pub struct StoresResponse {
    pub success: bool,
    pub count: usize,
    pub stores: Vec<StoreSummary>,
}

#[derive(Serialize)]
pub struct StoreCreatedResponse {
    pub success: bool,
    pub store_id: Option<String>,
    pub message: String,
}

#[derive(Serialize)]
pub struct StoreDeletedResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize)]
pub struct StoreInfoResponse {
    pub success: bool,
    pub store: StoreSummary,
}

#[derive(Serialize)]
pub struct StoreDocumentsResponse {
    pub success: bool,
    pub count: usize,
    pub documents: Vec<DocumentSummary>,
}

/// List all stores
pub async fn list_stores(State(state): State<AppState>) -> Result<Json<StoresResponse>> {
    let stores = state.provider.list_stores().await?;
    Ok(Json(StoresResponse {
        success: true,
        count: stores.len(),
        stores: stores.into_iter().map(StoreSummary::from).collect(),
    }))
}

/// Create a new store
pub async fn create_store(
    State(state): State<AppState>,
    Json(request): Json<CreateStoreRequest>,
) -> Result<Json<StoreCreatedResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("store_name".to_string()),
    })?;

    let store = state.provider.create_store(&request.store_name).await?;
    Ok(Json(StoreCreatedResponse {
        success: true,
        store_id: Some(store.name),
        message: format!("Successfully created store '{}'", request.store_name),
    }))
}

/// Delete a store by display name or resource id
pub async fn delete_store(
    State(state): State<AppState>,
    Path(store_name): Path<String>,
) -> Result<Json<StoreDeletedResponse>> {
    let store_id = resolve_store_id(&state, &store_name).await?;
    state.provider.delete_store(&store_id, true).await?;

    tracing::info!(store = %store_name, store_id = %store_id, "Store deleted");
    Ok(Json(StoreDeletedResponse {
        success: true,
        message: format!("Successfully deleted store '{store_name}'"),
    }))
}

/// Get information about one store
pub async fn store_info(
    State(state): State<AppState>,
    Path(store_name): Path<String>,
) -> Result<Json<StoreInfoResponse>> {
    let stores = state.provider.list_stores().await?;
    let store = stores
        .into_iter()
        .find(|store| {
            store.display_name.as_deref() == Some(store_name.as_str())
                || store.name == store_name
        })
        .ok_or_else(|| AppError::StoreNotFound {
            name: store_name.clone(),
        })?;

    Ok(Json(StoreInfoResponse {
        success: true,
        store: store.into(),
    }))
}

/// List the documents ingested into a store
pub async fn list_store_documents(
    State(state): State<AppState>,
    Path(store_name): Path<String>,
) -> Result<Json<StoreDocumentsResponse>> {
    let store_id = resolve_store_id(&state, &store_name).await?;
    let documents = state.provider.list_documents(&store_id).await?;

    Ok(Json(StoreDocumentsResponse {
        success: true,
        count: documents.len(),
        documents: documents.into_iter().map(DocumentSummary::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::mock_state;

    #[tokio::test]
    async fn create_then_list_and_info() {
        let state = mock_state();

        let created = create_store(
            State(state.clone()),
            Json(CreateStoreRequest {
                store_name: "contracts".to_string(),
            }),
        )
        .await
        .unwrap();
        assert!(created.0.success);
        let store_id = created.0.store_id.unwrap();

        let listed = list_stores(State(state.clone())).await.unwrap();
        assert_eq!(listed.0.count, 1);
        assert_eq!(listed.0.stores[0].name, store_id);
        assert_eq!(listed.0.stores[0].display_name.as_deref(), Some("contracts"));

        let info = store_info(State(state.clone()), Path("contracts".to_string()))
            .await
            .unwrap();
        assert_eq!(info.0.store.name, store_id);
    }

    #[tokio::test]
    async fn info_for_unknown_store_is_not_found() {
        let state = mock_state();
        let result = store_info(State(state), Path("ghost".to_string())).await;
        assert!(matches!(result, Err(AppError::StoreNotFound { .. })));
    }

    #[tokio::test]
    async fn delete_unknown_store_is_not_found() {
        let state = mock_state();
        let result = delete_store(State(state), Path("ghost".to_string())).await;
        assert!(matches!(result, Err(AppError::StoreNotFound { .. })));
    }

    #[tokio::test]
    async fn empty_store_name_fails_validation() {
        let state = mock_state();
        let result = create_store(
            State(state),
            Json(CreateStoreRequest {
                store_name: String::new(),
            }),
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation { .. })));
    }
}
