use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{
    domain::{decode_prefixed_hex, Address, TxHash},
    error::ErrorCode,
    protocol::ContractArtifact,
};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no deployment named '{name}' on network '{network}'")]
    DeploymentNotFound { network: String, name: String },
    #[error("no compiled artifact for contract '{0}'")]
    ArtifactNotFound(String),
    #[error("artifact '{name}' is malformed: {reason}")]
    MalformedArtifact { name: String, reason: String },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("json error at {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::DeploymentNotFound { .. } | StorageError::ArtifactNotFound(_)
        )
    }

    pub fn code(&self) -> ErrorCode {
        if self.is_not_found() {
            ErrorCode::NotFound
        } else {
            ErrorCode::Internal
        }
    }

    fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn json(path: &Path, source: serde_json::Error) -> Self {
        StorageError::Json {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Address record of one deployed contract, stored as
/// `<deployments_dir>/<network>/<ContractName>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub contract_name: String,
    pub address: Address,
    pub transaction_hash: TxHash,
    pub deployer: Address,
    pub block_number: u64,
    #[serde(default)]
    pub args: Vec<String>,
    pub deployed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DeploymentStore {
    network: String,
    dir: PathBuf,
}

impl DeploymentStore {
    pub fn new(root: impl AsRef<Path>, network: impl Into<String>) -> Self {
        let network = network.into();
        Self {
            dir: root.as_ref().join(&network),
            network,
        }
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    pub async fn save(&self, record: &DeploymentRecord) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|err| StorageError::io(&self.dir, err))?;
        let path = self.record_path(&record.contract_name);
        let body =
            serde_json::to_vec_pretty(record).map_err(|err| StorageError::json(&path, err))?;
        fs::write(&path, body)
            .await
            .map_err(|err| StorageError::io(&path, err))?;
        debug!(path = %path.display(), address = %record.address, "deployment recorded");
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<DeploymentRecord, StorageError> {
        let path = self.record_path(name);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StorageError::DeploymentNotFound {
                    network: self.network.clone(),
                    name: name.to_string(),
                });
            }
            Err(err) => return Err(StorageError::io(&path, err)),
        };
        serde_json::from_slice(&raw).map_err(|err| StorageError::json(&path, err))
    }

    /// All recorded deployments on this network, sorted by contract name.
    pub async fn list(&self) -> Result<Vec<DeploymentRecord>, StorageError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StorageError::io(&self.dir, err)),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| StorageError::io(&self.dir, err))?
        {
            let path = entry.path();
            let Some(name) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_suffix(".json"))
            else {
                continue;
            };
            records.push(self.get(name).await?);
        }
        records.sort_by(|a, b| a.contract_name.cmp(&b.contract_name));
        Ok(records)
    }
}

/// Source of compiled contract creation code.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn load(&self, contract_name: &str) -> Result<ContractArtifact, StorageError>;
}

#[derive(Debug, Default, Clone)]
pub struct StaticArtifacts {
    artifacts: HashMap<String, ContractArtifact>,
}

impl StaticArtifacts {
    pub fn new(artifacts: impl IntoIterator<Item = ContractArtifact>) -> Self {
        Self {
            artifacts: artifacts
                .into_iter()
                .map(|artifact| (artifact.contract_name.clone(), artifact))
                .collect(),
        }
    }
}

#[async_trait]
impl ArtifactSource for StaticArtifacts {
    async fn load(&self, contract_name: &str) -> Result<ContractArtifact, StorageError> {
        self.artifacts
            .get(contract_name)
            .cloned()
            .ok_or_else(|| StorageError::ArtifactNotFound(contract_name.to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatArtifact {
    contract_name: String,
    bytecode: String,
}

/// Reads Hardhat compiler output (`artifacts/contracts/**/<Name>.json`).
#[derive(Debug, Clone)]
pub struct HardhatArtifacts {
    root: PathBuf,
}

impl HardhatArtifacts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn find(&self, file_name: &str) -> Result<Option<PathBuf>, StorageError> {
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(StorageError::io(&dir, err)),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|err| StorageError::io(&dir, err))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|err| StorageError::io(&path, err))?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if path.file_name().and_then(|name| name.to_str()) == Some(file_name) {
                    return Ok(Some(path));
                }
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl ArtifactSource for HardhatArtifacts {
    async fn load(&self, contract_name: &str) -> Result<ContractArtifact, StorageError> {
        let path = self
            .find(&format!("{contract_name}.json"))
            .await?
            .ok_or_else(|| StorageError::ArtifactNotFound(contract_name.to_string()))?;
        let raw = fs::read(&path)
            .await
            .map_err(|err| StorageError::io(&path, err))?;
        let artifact: HardhatArtifact =
            serde_json::from_slice(&raw).map_err(|err| StorageError::json(&path, err))?;

        let malformed = |reason: String| StorageError::MalformedArtifact {
            name: contract_name.to_string(),
            reason,
        };
        if artifact.contract_name != contract_name {
            return Err(malformed(format!(
                "file declares contract '{}'",
                artifact.contract_name
            )));
        }
        let bytecode =
            decode_prefixed_hex(&artifact.bytecode).map_err(|err| malformed(err.to_string()))?;
        if bytecode.is_empty() {
            return Err(malformed("empty bytecode (abstract contract or interface)".into()));
        }

        Ok(ContractArtifact {
            contract_name: artifact.contract_name,
            bytecode,
        })
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
