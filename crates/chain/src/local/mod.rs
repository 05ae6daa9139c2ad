//! In-process chain hosting native simulations of the contracts the recipe
//! tooling deploys. Calls go through the same ABI encoding a node would see.

use std::collections::HashMap;

use abi::{keccak256, recipe::split_call, AbiError, Revert};
use async_trait::async_trait;
use shared::{
    domain::{Address, TokenAmount, TxHash, ETHER_DECIMALS},
    protocol::{CallRequest, ContractArtifact, LogEntry, TransactionReceipt, TransactionRequest},
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{ChainClient, ChainError};

mod cookbook;
mod recipe_module;
mod registry;
mod token;

use cookbook::CookBook;
use recipe_module::RecipeActionModule;
use registry::MockModuleRegistry;
use token::Erc20Token;

pub const LOCAL_CHAIN_ID: u64 = 31337;
const DEFAULT_ACCOUNTS: usize = 10;
const DEFAULT_ACCOUNT_ETHER: u128 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalContractKind {
    CookBook,
    MockModuleRegistry,
    TestToken,
    RecipeActionModule,
}

impl LocalContractKind {
    pub const ALL: [LocalContractKind; 4] = [
        LocalContractKind::CookBook,
        LocalContractKind::MockModuleRegistry,
        LocalContractKind::TestToken,
        LocalContractKind::RecipeActionModule,
    ];

    pub fn contract_name(self) -> &'static str {
        match self {
            LocalContractKind::CookBook => "CookBook",
            LocalContractKind::MockModuleRegistry => "MockModuleRegistry",
            LocalContractKind::TestToken => "TestToken",
            LocalContractKind::RecipeActionModule => "RecipeActionModule",
        }
    }

    fn creation_marker(self) -> [u8; 32] {
        keccak256(format!("local-chain:{}", self.contract_name()))
    }

    /// Artifact whose bytecode is a marker the local chain recognises.
    pub fn artifact(self) -> ContractArtifact {
        ContractArtifact {
            contract_name: self.contract_name().to_string(),
            bytecode: self.creation_marker().to_vec(),
        }
    }

    fn from_creation_code(code: &[u8]) -> Option<(Self, &[u8])> {
        let marker = code.get(..32)?;
        Self::ALL
            .into_iter()
            .find(|kind| kind.creation_marker().as_slice() == marker)
            .map(|kind| (kind, &code[32..]))
    }
}

/// Revert payload raised by a simulated contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExecutionRevert(pub Vec<u8>);

impl ExecutionRevert {
    pub(crate) fn reason(message: &str) -> Self {
        Self(abi::revert::encode_reason(message))
    }

    pub(crate) fn custom(signature: &str) -> Self {
        Self(abi::revert::encode_custom(signature))
    }
}

impl From<AbiError> for ExecutionRevert {
    fn from(err: AbiError) -> Self {
        Self::reason(&format!("abi: {err}"))
    }
}

pub(crate) type ExecResult = Result<Vec<u8>, ExecutionRevert>;

#[derive(Debug, Clone)]
enum LocalContract {
    TestToken(Erc20Token),
    Registry(MockModuleRegistry),
    CookBook(CookBook),
    RecipeModule(RecipeActionModule),
}

impl LocalContract {
    fn construct(
        kind: LocalContractKind,
        ctx: &mut CallContext<'_>,
        args: &[u8],
    ) -> Result<Self, ExecutionRevert> {
        Ok(match kind {
            LocalContractKind::TestToken => LocalContract::TestToken(Erc20Token::deploy(ctx)?),
            LocalContractKind::MockModuleRegistry => {
                LocalContract::Registry(MockModuleRegistry::default())
            }
            LocalContractKind::CookBook => LocalContract::CookBook(CookBook::deploy(args)?),
            LocalContractKind::RecipeActionModule => {
                LocalContract::RecipeModule(RecipeActionModule::deploy(ctx, args)?)
            }
        })
    }

    fn dispatch(&mut self, ctx: &mut CallContext<'_>, data: &[u8]) -> ExecResult {
        let Ok((selector, args)) = split_call(data) else {
            return Err(ExecutionRevert(Vec::new()));
        };
        match self {
            LocalContract::TestToken(token) => token.dispatch(ctx, selector, args),
            LocalContract::Registry(registry) => registry.dispatch(selector, args),
            LocalContract::CookBook(cook_book) => cook_book.dispatch(ctx, selector, args),
            LocalContract::RecipeModule(module) => module.dispatch(ctx, selector, args),
        }
    }
}

/// Execution frame of a single contract call.
pub(crate) struct CallContext<'a> {
    world: &'a mut World,
    logs: &'a mut Vec<LogEntry>,
    pub caller: Address,
    pub this: Address,
}

impl CallContext<'_> {
    pub(crate) fn emit(&mut self, log: LogEntry) {
        self.logs.push(log);
    }

    /// Calls another contract with this contract as `msg.sender`.
    pub(crate) fn call(&mut self, to: Address, data: Vec<u8>) -> ExecResult {
        self.world.execute(self.logs, self.this, to, &data, 0)
    }
}

#[derive(Debug, Clone, Default)]
struct World {
    contracts: HashMap<Address, LocalContract>,
    balances: HashMap<Address, u128>,
}

impl World {
    fn transfer_value(&mut self, from: Address, to: Address, value: u128) -> Result<(), ExecutionRevert> {
        if value == 0 {
            return Ok(());
        }
        let available = self.balances.get(&from).copied().unwrap_or(0);
        let remaining = available
            .checked_sub(value)
            .ok_or_else(|| ExecutionRevert::reason("insufficient funds for value transfer"))?;
        self.balances.insert(from, remaining);
        *self.balances.entry(to).or_default() += value;
        Ok(())
    }

    fn execute(
        &mut self,
        logs: &mut Vec<LogEntry>,
        caller: Address,
        to: Address,
        data: &[u8],
        value: u128,
    ) -> ExecResult {
        self.transfer_value(caller, to, value)?;

        // Absent while executing, so re-entering a contract lands here too.
        let Some(mut contract) = self.contracts.remove(&to) else {
            if data.is_empty() {
                return Ok(Vec::new());
            }
            return Err(ExecutionRevert::reason("call to non-contract address"));
        };

        let result = {
            let mut ctx = CallContext {
                world: self,
                logs,
                caller,
                this: to,
            };
            contract.dispatch(&mut ctx, data)
        };
        self.contracts.insert(to, contract);
        result
    }

    fn create(
        &mut self,
        logs: &mut Vec<LogEntry>,
        deployer: Address,
        nonce: u64,
        kind: LocalContractKind,
        args: &[u8],
        value: u128,
    ) -> Result<Address, ExecutionRevert> {
        let address = derive_address(&[deployer.as_bytes(), &nonce.to_be_bytes()[..]].concat());
        self.transfer_value(deployer, address, value)?;

        let contract = {
            let mut ctx = CallContext {
                world: self,
                logs,
                caller: deployer,
                this: address,
            };
            LocalContract::construct(kind, &mut ctx, args)?
        };
        self.contracts.insert(address, contract);
        Ok(address)
    }
}

fn derive_address(seed: &[u8]) -> Address {
    let digest = keccak256(seed);
    let mut address = [0u8; 20];
    address.copy_from_slice(&digest[12..]);
    Address(address)
}

struct LocalState {
    world: World,
    accounts: Vec<Address>,
    nonces: HashMap<Address, u64>,
    receipts: HashMap<TxHash, TransactionReceipt>,
    block_number: u64,
}

/// Auto-mining chain: every accepted transaction is its own block, and a
/// reverted transaction leaves no trace.
pub struct LocalChain {
    state: Mutex<LocalState>,
}

impl Default for LocalChain {
    fn default() -> Self {
        Self::with_accounts(DEFAULT_ACCOUNTS)
    }
}

impl LocalChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accounts(count: usize) -> Self {
        let funding = DEFAULT_ACCOUNT_ETHER * 10u128.pow(ETHER_DECIMALS);
        let accounts: Vec<Address> = (0..count)
            .map(|index| derive_address(format!("local-chain-account-{index}").as_bytes()))
            .collect();
        let world = World {
            contracts: HashMap::new(),
            balances: accounts.iter().map(|account| (*account, funding)).collect(),
        };

        Self {
            state: Mutex::new(LocalState {
                world,
                accounts,
                nonces: HashMap::new(),
                receipts: HashMap::new(),
                block_number: 0,
            }),
        }
    }

    pub fn artifacts() -> Vec<ContractArtifact> {
        LocalContractKind::ALL
            .into_iter()
            .map(LocalContractKind::artifact)
            .collect()
    }

    pub async fn native_balance(&self, account: Address) -> TokenAmount {
        let state = self.state.lock().await;
        TokenAmount(state.world.balances.get(&account).copied().unwrap_or(0))
    }

    pub async fn block_number(&self) -> u64 {
        self.state.lock().await.block_number
    }
}

#[async_trait]
impl ChainClient for LocalChain {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(LOCAL_CHAIN_ID)
    }

    async fn accounts(&self) -> Result<Vec<Address>, ChainError> {
        Ok(self.state.lock().await.accounts.clone())
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, ChainError> {
        let mut state = self.state.lock().await;
        if !state.accounts.contains(&tx.from) {
            return Err(ChainError::UnknownAccount(tx.from));
        }

        let nonce = state.nonces.get(&tx.from).copied().unwrap_or(0);
        let hash = TxHash(keccak256(
            [tx.from.as_bytes(), &nonce.to_be_bytes()[..], &tx.data[..]].concat(),
        ));

        let mut world = state.world.clone();
        let mut logs = Vec::new();
        let outcome = match tx.to {
            Some(to) => world
                .execute(&mut logs, tx.from, to, &tx.data, tx.value.0)
                .map(|_| None),
            None => {
                let (kind, args) = LocalContractKind::from_creation_code(&tx.data)
                    .ok_or(ChainError::UnknownCreationCode)?;
                world
                    .create(&mut logs, tx.from, nonce, kind, args, tx.value.0)
                    .map(Some)
            }
        };

        let contract_address = match outcome {
            Ok(address) => address,
            Err(revert) => {
                debug!(
                    tx = %hash,
                    reason = %Revert::decode(&revert.0).describe(),
                    "local transaction reverted"
                );
                return Err(ChainError::Reverted { data: revert.0 });
            }
        };

        state.world = world;
        state.nonces.insert(tx.from, nonce + 1);
        state.block_number += 1;
        let receipt = TransactionReceipt {
            transaction_hash: hash,
            block_number: state.block_number,
            status: true,
            from: tx.from,
            to: tx.to,
            contract_address,
            logs,
        };
        info!(
            tx = %hash,
            block = receipt.block_number,
            logs = receipt.logs.len(),
            "local transaction mined"
        );
        state.receipts.insert(hash, receipt);
        Ok(hash)
    }

    async fn call(&self, call: CallRequest) -> Result<Vec<u8>, ChainError> {
        let state = self.state.lock().await;
        let mut world = state.world.clone();
        let mut logs = Vec::new();
        world
            .execute(
                &mut logs,
                call.from.unwrap_or(Address::ZERO),
                call.to,
                &call.data,
                0,
            )
            .map_err(|revert| ChainError::Reverted { data: revert.0 })
    }

    async fn transaction_receipt(
        &self,
        hash: TxHash,
    ) -> Result<Option<TransactionReceipt>, ChainError> {
        Ok(self.state.lock().await.receipts.get(&hash).cloned())
    }
}

#[cfg(test)]
#[path = "../tests/local_tests.rs"]
mod tests;
