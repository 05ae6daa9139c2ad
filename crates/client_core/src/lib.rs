//! Client-side tooling for the recipe open action: deployment, metadata
//! publication, the two-phase action protocol and form submission.

use std::sync::Arc;

use tracing::warn;

pub mod action_client;
pub mod confirm;
pub mod deploy;
pub mod forms;
pub mod metadata;
pub mod settings;
pub mod token;

pub use action_client::{ActionClient, ActionError, InitializeOutcome, ProcessOutcome};
pub use confirm::{wait_for_receipt, ConfirmError, ConfirmationPolicy};
pub use deploy::{DeployConfig, DeployError, DeploySummary, DeployTag, Orchestrator};
pub use forms::{FormError, FormInvoker, InitializeForm, InvokeError, ProcessForm, SubmissionState};
pub use metadata::{
    HttpUploader, InMemoryContentStore, MetadataDocument, MetadataUploader, PublishError,
};
pub use settings::{load_settings, Settings, SettingsError};
pub use token::Erc20Client;

/// Upload gateway from settings, or an in-process store when none is set.
pub fn metadata_uploader(settings: &Settings) -> Result<Arc<dyn MetadataUploader>, PublishError> {
    match &settings.metadata_upload_url {
        Some(url) => Ok(Arc::new(HttpUploader::new(url, settings.http_timeout())?)),
        None => {
            warn!("no metadata upload url configured; metadata is kept in memory only");
            Ok(Arc::new(InMemoryContentStore::new()))
        }
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
