//! String-typed call forms and the invoker that submits them.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shared::{
    domain::{
        decode_prefixed_hex, Address, ProfileId, PubType, PublicationId, TokenAmount, TxHash,
    },
    error::{ErrorCode, ErrorReport},
    protocol::{InitializeActionCall, ProcessActionParams},
};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::action_client::{ActionClient, ActionError, InitializeOutcome, ProcessOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field '{field}' is malformed: {reason}")]
pub struct FormError {
    pub field: &'static str,
    pub reason: String,
}

impl FormError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::new(ErrorCode::Validation, self.to_string())
    }
}

fn parse_uint(field: &'static str, raw: &str) -> Result<u64, FormError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(FormError::new(field, "value is required"));
    }
    raw.parse::<u64>()
        .map_err(|err| FormError::new(field, format!("not an unsigned integer: {err}")))
}

fn parse_address(field: &'static str, raw: &str) -> Result<Address, FormError> {
    Address::from_str(raw.trim()).map_err(|err| FormError::new(field, err.to_string()))
}

fn parse_bytes(field: &'static str, raw: &str) -> Result<Vec<u8>, FormError> {
    decode_prefixed_hex(raw.trim()).map_err(|err| FormError::new(field, err.to_string()))
}

/// Comma-separated list; an empty string is an empty list.
fn parse_list<T>(
    field: &'static str,
    raw: &str,
    item: impl Fn(&'static str, &str) -> Result<T, FormError>,
) -> Result<Vec<T>, FormError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',').map(|part| item(field, part)).collect()
}

fn parse_pub_type(field: &'static str, raw: &str) -> Result<PubType, FormError> {
    let value = parse_uint(field, raw)?;
    u8::try_from(value)
        .ok()
        .and_then(|value| PubType::try_from(value).ok())
        .ok_or_else(|| FormError::new(field, format!("unknown publication type {value}")))
}

fn parse_value(field: &'static str, raw: &str) -> Result<TokenAmount, FormError> {
    if raw.trim().is_empty() {
        return Ok(TokenAmount::ZERO);
    }
    TokenAmount::parse_ether(raw.trim()).map_err(|err| FormError::new(field, err.to_string()))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeForm {
    pub profile_id: String,
    pub publication_id: String,
    pub executor_address: String,
    pub calldata: String,
}

impl InitializeForm {
    pub fn coerce(&self) -> Result<InitializeActionCall, FormError> {
        Ok(InitializeActionCall {
            profile_id: ProfileId(parse_uint("profileId", &self.profile_id)?),
            publication_id: PublicationId(parse_uint("publicationId", &self.publication_id)?),
            transaction_executor: parse_address("executorAddress", &self.executor_address)?,
            data: parse_bytes("calldata", &self.calldata)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessForm {
    pub publication_acted_profile_id: String,
    pub publication_acted_id: String,
    pub actor_profile_id: String,
    pub actor_profile_owner: String,
    pub transaction_executor: String,
    pub referrer_profile_ids: String,
    pub referrer_pub_ids: String,
    pub referrer_pub_types: String,
    pub action_module_data: String,
    /// Ether attached to the call, as a decimal string.
    pub value: String,
}

impl ProcessForm {
    pub fn coerce(&self) -> Result<(ProcessActionParams, TokenAmount), FormError> {
        let params = ProcessActionParams {
            publication_acted_profile_id: ProfileId(parse_uint(
                "publicationActedProfileId",
                &self.publication_acted_profile_id,
            )?),
            publication_acted_id: PublicationId(parse_uint(
                "publicationActedId",
                &self.publication_acted_id,
            )?),
            actor_profile_id: ProfileId(parse_uint("actorProfileId", &self.actor_profile_id)?),
            actor_profile_owner: parse_address("actorProfileOwner", &self.actor_profile_owner)?,
            transaction_executor: parse_address(
                "transactionExecutor",
                &self.transaction_executor,
            )?,
            referrer_profile_ids: parse_list(
                "referrerProfileIds",
                &self.referrer_profile_ids,
                |field, raw| parse_uint(field, raw).map(ProfileId),
            )?,
            referrer_pub_ids: parse_list("referrerPubIds", &self.referrer_pub_ids, |field, raw| {
                parse_uint(field, raw).map(PublicationId)
            })?,
            referrer_pub_types: parse_list(
                "referrerPubTypes",
                &self.referrer_pub_types,
                parse_pub_type,
            )?,
            action_module_data: parse_bytes("actionModuleData", &self.action_module_data)?,
        };
        Ok((params, parse_value("value", &self.value)?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Pending,
    Settled { transaction_hash: TxHash, block_number: u64 },
    Failed(ErrorReport),
}

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error(transparent)]
    Form(#[from] FormError),
    #[error(transparent)]
    Action(#[from] ActionError),
}

impl InvokeError {
    pub fn report(&self) -> ErrorReport {
        match self {
            InvokeError::Form(err) => err.report(),
            InvokeError::Action(err) => err.report(),
        }
    }
}

/// Coerces forms and submits them through an [`ActionClient`], publishing
/// the submission state to watchers. Submissions stay `Pending` until the
/// transaction is mined; the client's confirmation timeout is dropped.
pub struct FormInvoker {
    client: ActionClient,
    sender: Address,
    state: watch::Sender<SubmissionState>,
}

impl FormInvoker {
    pub fn new(client: ActionClient, sender: Address) -> Self {
        let (state, _) = watch::channel(SubmissionState::Idle);
        let confirmation = client.confirmation().without_timeout();
        Self {
            client: client.with_confirmation(confirmation),
            sender,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SubmissionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SubmissionState {
        self.state.borrow().clone()
    }

    fn settle(&self, transaction_hash: TxHash, block_number: u64) {
        info!(tx = %transaction_hash, block = block_number, "transaction confirmed");
        self.state.send_replace(SubmissionState::Settled {
            transaction_hash,
            block_number,
        });
    }

    fn fail(&self, err: &InvokeError) {
        warn!(%err, "submission failed");
        self.state.send_replace(SubmissionState::Failed(err.report()));
    }

    pub async fn submit_initialize(
        &self,
        form: &InitializeForm,
    ) -> Result<InitializeOutcome, InvokeError> {
        let result = async {
            let call = form.coerce()?;
            self.state.send_replace(SubmissionState::Pending);
            Ok::<_, InvokeError>(self.client.initialize(self.sender, &call).await?)
        }
        .await;

        match &result {
            Ok(outcome) => self.settle(outcome.transaction_hash, outcome.block_number),
            Err(err) => self.fail(err),
        }
        result
    }

    pub async fn submit_process(&self, form: &ProcessForm) -> Result<ProcessOutcome, InvokeError> {
        let result = async {
            let (params, value) = form.coerce()?;
            self.state.send_replace(SubmissionState::Pending);
            Ok::<_, InvokeError>(self.client.process(self.sender, &params, value).await?)
        }
        .await;

        match &result {
            Ok(outcome) => self.settle(outcome.transaction_hash, outcome.block_number),
            Err(err) => self.fail(err),
        }
        result
    }
}

#[cfg(test)]
#[path = "tests/forms_tests.rs"]
mod tests;
