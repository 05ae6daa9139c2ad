//! Module metadata descriptor and its upload to content-addressed storage.

use std::{collections::HashMap, time::Duration};

use abi::recipe::{initialize_calldata_abi, process_calldata_abi, AbiParam};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use url::Url;

pub const MODULE_METADATA_SCHEMA: &str = "https://json-schemas.lens.dev/modules/1.0.0.json";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to serialize metadata: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid upload endpoint: {0}")]
    Endpoint(String),
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("upload service answered {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataAttribute {
    #[serde(rename = "type")]
    pub kind: String,
    pub key: String,
    pub value: String,
}

/// The `lens` body of a module metadata document. Calldata ABIs are carried
/// as JSON-encoded strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleMetadata {
    pub name: String,
    pub title: String,
    pub description: String,
    pub authors: Vec<String>,
    #[serde(rename = "initializeCalldataABI")]
    pub initialize_calldata_abi: String,
    #[serde(rename = "processCalldataABI")]
    pub process_calldata_abi: String,
    pub attributes: Vec<MetadataAttribute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDocument {
    #[serde(rename = "$schema")]
    pub schema: String,
    pub lens: ModuleMetadata,
}

impl MetadataDocument {
    pub fn new(lens: ModuleMetadata) -> Self {
        Self {
            schema: MODULE_METADATA_SCHEMA.to_string(),
            lens,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PublishError> {
        Ok(serde_json::to_vec(self)?)
    }
}

fn abi_listing(params: &[AbiParam]) -> Result<String, PublishError> {
    Ok(serde_json::to_string(params)?)
}

/// Descriptor of the recipe open action module.
pub fn recipe_module_metadata() -> Result<MetadataDocument, PublishError> {
    Ok(MetadataDocument::new(ModuleMetadata {
        name: "RecipeActionModule".into(),
        title: "Recipe Open Action".into(),
        description:
            "Allow users to add a recipe to their cookbook from the creator of a publication"
                .into(),
        authors: vec!["hashwarlock@phala.network".into()],
        initialize_calldata_abi: abi_listing(&initialize_calldata_abi())?,
        process_calldata_abi: abi_listing(&process_calldata_abi())?,
        attributes: Vec::new(),
    }))
}

/// Content id: unpadded URL-safe base64 of the document's SHA-256.
pub fn content_id(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(bytes))
}

/// Durable storage that hands back a content id for an uploaded document.
#[async_trait]
pub trait MetadataUploader: Send + Sync {
    async fn upload(&self, document: &[u8]) -> Result<String, PublishError>;
}

/// Keeps documents in process memory, keyed by content id.
#[derive(Debug, Default)]
pub struct InMemoryContentStore {
    documents: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &str) -> Option<Vec<u8>> {
        self.documents.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl MetadataUploader for InMemoryContentStore {
    async fn upload(&self, document: &[u8]) -> Result<String, PublishError> {
        let id = content_id(document);
        self.documents
            .write()
            .await
            .entry(id.clone())
            .or_insert_with(|| document.to_vec());
        Ok(id)
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

/// Posts the document as JSON to an upload gateway that answers
/// `{"id": "<content id>"}`.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    http: Client,
    endpoint: Url,
}

impl HttpUploader {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, PublishError> {
        let endpoint = Url::parse(endpoint).map_err(|err| PublishError::Endpoint(err.to_string()))?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| PublishError::Upload(err.to_string()))?;
        Ok(Self { http, endpoint })
    }
}

#[async_trait]
impl MetadataUploader for HttpUploader {
    async fn upload(&self, document: &[u8]) -> Result<String, PublishError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(document.to_vec())
            .send()
            .await
            .map_err(|err| PublishError::Upload(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|err| PublishError::Upload(err.to_string()))?;
        if body.id.trim().is_empty() {
            return Err(PublishError::Upload("empty content id".into()));
        }
        Ok(body.id)
    }
}

/// Serializes, uploads and returns `<scheme>://<content id>`.
pub async fn publish_metadata(
    uploader: &dyn MetadataUploader,
    scheme: &str,
    document: &MetadataDocument,
) -> Result<String, PublishError> {
    let bytes = document.to_bytes()?;
    let id = uploader.upload(&bytes).await?;
    let uri = format!("{scheme}://{id}");
    info!(module = %document.lens.name, %uri, "module metadata uploaded");
    Ok(uri)
}

#[cfg(test)]
#[path = "tests/metadata_tests.rs"]
mod tests;
