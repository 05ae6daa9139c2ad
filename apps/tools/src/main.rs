use std::{path::Path, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use chain::{ChainClient, LocalChain, RpcChain};
use clap::{Args, Parser, Subcommand};
use client_core::{
    action_client::{encode_init_data, encode_process_data},
    deploy::{DeployConfig, DeployTag, Orchestrator, RECIPE_ACTION_MODULE},
    load_settings, metadata, metadata_uploader, ActionClient, Erc20Client, FormInvoker,
    InMemoryContentStore, InitializeForm, ProcessForm, ProcessOutcome, Settings,
};
use shared::{
    domain::{encode_prefixed_hex, Address, ProfileId, PublicationId, PublicationRef, Selector, TokenAmount},
    protocol::{InitializeActionData, ProcessActionData},
};
use storage::StaticArtifacts;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "recipe", about = "Recipe open action tooling")]
struct Cli {
    /// JSON-RPC endpoint; overrides settings.
    #[arg(long, global = true)]
    rpc_url: Option<String>,
    /// Deployment network name; overrides settings.
    #[arg(long, global = true)]
    network: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ModuleArgs {
    /// Module address; defaults to the recorded RecipeActionModule deployment.
    #[arg(long)]
    module: Option<Address>,
    /// Sending account; defaults to the node's first account.
    #[arg(long)]
    from: Option<Address>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Deploy contracts selected by tag (CookBook, RecipeActionModule, all).
    Deploy {
        #[arg(long = "tags", value_delimiter = ',', default_value = "all")]
        tags: Vec<DeployTag>,
        /// Also deploy a MockModuleRegistry and a whitelisted TestToken.
        #[arg(long)]
        local_mocks: bool,
    },
    /// Deploy, initialize and process against an in-process chain.
    Demo,
    /// Print the module metadata document.
    Metadata,
    /// Call initializePublicationAction through the hub account.
    Initialize {
        #[command(flatten)]
        target: ModuleArgs,
        #[arg(long)]
        profile_id: String,
        #[arg(long)]
        publication_id: String,
        #[arg(long)]
        executor: String,
        /// 0x-prefixed initialize calldata.
        #[arg(long)]
        calldata: String,
    },
    /// Call processPublicationAction.
    Process {
        #[command(flatten)]
        target: ModuleArgs,
        #[arg(long)]
        publication_acted_profile_id: String,
        #[arg(long)]
        publication_acted_id: String,
        #[arg(long)]
        actor_profile_id: String,
        #[arg(long)]
        actor_profile_owner: String,
        #[arg(long)]
        transaction_executor: String,
        #[arg(long, default_value = "")]
        referrer_profile_ids: String,
        #[arg(long, default_value = "")]
        referrer_pub_ids: String,
        #[arg(long, default_value = "")]
        referrer_pub_types: String,
        #[arg(long)]
        action_module_data: String,
        /// Ether attached to the call.
        #[arg(long, default_value = "0")]
        value: String,
    },
    TipReceiver {
        #[command(flatten)]
        target: ModuleArgs,
        #[arg(long)]
        profile_id: u64,
        #[arg(long)]
        publication_id: u64,
    },
    SupportsInterface {
        #[command(flatten)]
        target: ModuleArgs,
        /// 4-byte interface id; defaults to the LENS_MODULE id.
        #[arg(long)]
        interface_id: Option<Selector>,
    },
    EncodeInitData {
        #[arg(long)]
        tip_receiver: Address,
        #[arg(long)]
        cook_book: Address,
        #[arg(long)]
        cook_book_id: u64,
        #[arg(long)]
        recipe_metadata: String,
    },
    EncodeProcessData {
        #[arg(long)]
        currency: Address,
        /// Tip in whole tokens, 18 decimals.
        #[arg(long)]
        tip_amount: String,
        #[arg(long)]
        cook_book: Address,
        #[arg(long)]
        cook_book_id: u64,
    },
    /// Whitelist an ERC-20 currency in the module registry.
    RegisterCurrency {
        #[arg(long)]
        token: Address,
        /// Registry address; defaults to the resolved module registry.
        #[arg(long)]
        registry: Option<Address>,
    },
    /// Let a spender (usually the module) pull tips from an account.
    Approve {
        #[arg(long)]
        token: Address,
        #[arg(long)]
        spender: Option<Address>,
        #[arg(long)]
        amount: String,
        #[arg(long)]
        from: Option<Address>,
    },
}

fn rpc_chain(settings: &Settings) -> Result<Arc<dyn ChainClient>> {
    let chain = RpcChain::new(settings.rpc_config())
        .with_context(|| format!("failed to create rpc client for {}", settings.rpc_url))?;
    Ok(Arc::new(chain))
}

async fn first_account(chain: &dyn ChainClient) -> Result<Address> {
    chain
        .accounts()
        .await?
        .first()
        .copied()
        .ok_or_else(|| anyhow!("node manages no accounts"))
}

async fn orchestrator(settings: &Settings, chain: Arc<dyn ChainClient>) -> Result<Orchestrator> {
    Ok(Orchestrator::with_first_account(
        chain,
        Arc::new(settings.hardhat_artifacts()),
        settings.deployment_store(),
        metadata_uploader(settings)?,
        DeployConfig::from_settings(settings),
    )
    .await?)
}

async fn action_client(
    settings: &Settings,
    chain: Arc<dyn ChainClient>,
    target: &ModuleArgs,
) -> Result<(ActionClient, Address)> {
    let module = match target.module {
        Some(module) => module,
        None => {
            settings
                .deployment_store()
                .get(RECIPE_ACTION_MODULE)
                .await
                .context("no --module given and no recorded deployment")?
                .address
        }
    };
    let from = match target.from {
        Some(from) => from,
        None => first_account(chain.as_ref()).await?,
    };
    let client = ActionClient::new(chain, module).with_confirmation(settings.confirmation_policy());
    Ok((client, from))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_demo(settings: &Settings) -> Result<()> {
    // Records only describe this in-process chain, so they go away with it.
    let dir = tempfile::Builder::new()
        .prefix("recipe-demo-")
        .tempdir()
        .context("failed to create scratch deployments dir")?;
    demo_flow(settings, dir.path()).await?;
    Ok(())
}

async fn demo_flow(settings: &Settings, deployments: &Path) -> Result<ProcessOutcome> {
    let chain = Arc::new(LocalChain::new());
    let (owner, receiver) = match chain.accounts().await?.as_slice() {
        [owner, receiver, ..] => (*owner, *receiver),
        _ => bail!("local chain needs two accounts"),
    };

    let mut config = DeployConfig::from_settings(settings);
    config.lens_hub = owner;
    config.module_registry = None;
    let orchestrator = Orchestrator::new(
        chain.clone(),
        Arc::new(StaticArtifacts::new(LocalChain::artifacts())),
        storage::DeploymentStore::new(deployments, "demo"),
        Arc::new(InMemoryContentStore::new()),
        config,
        owner,
    );
    let summary = orchestrator.run(&[DeployTag::All], true).await?;
    let module = summary
        .module
        .as_ref()
        .map(|module| module.record.address)
        .ok_or_else(|| anyhow!("demo deployed no module"))?;
    let token = summary
        .test_token
        .as_ref()
        .map(|token| token.address)
        .ok_or_else(|| anyhow!("demo deployed no token"))?;
    let cook_book = summary
        .cook_book
        .as_ref()
        .map(|record| record.address)
        .unwrap_or(Address::ZERO);

    let client = ActionClient::new(chain.clone(), module);
    let invoker = FormInvoker::new(client.clone(), owner);
    let init_data = encode_init_data(&InitializeActionData {
        tip_receiver: receiver,
        cook_book,
        cook_book_id: 1,
        recipe_metadata: "ipfs://QmRecipe".into(),
    });
    invoker
        .submit_initialize(&InitializeForm {
            profile_id: "1".into(),
            publication_id: "1".into(),
            executor_address: owner.to_string(),
            calldata: encode_prefixed_hex(&init_data),
        })
        .await?;

    let tip = TokenAmount::parse_ether("1")?;
    let currency = Erc20Client::new(chain.clone(), token);
    currency.approve(owner, module, tip).await?;
    let process_data = encode_process_data(&ProcessActionData {
        currency: token,
        tip_amount: tip,
        cook_book,
        cook_book_id: 1,
    });
    let outcome = invoker
        .submit_process(&ProcessForm {
            publication_acted_profile_id: "1".into(),
            publication_acted_id: "1".into(),
            actor_profile_id: "1".into(),
            actor_profile_owner: owner.to_string(),
            transaction_executor: owner.to_string(),
            action_module_data: encode_prefixed_hex(&process_data),
            value: "0".into(),
            ..ProcessForm::default()
        })
        .await?;

    println!("module        {module}");
    println!("metadata uri  {}", client.module_metadata_uri().await?);
    println!(
        "tip           {} of {} from {} to {} in block {}",
        outcome.tip_amount,
        outcome.currency,
        outcome.transaction_executor,
        outcome.tip_receiver,
        outcome.block_number
    );
    println!("receiver now  {}", currency.balance_of(receiver).await?);

    Ok(outcome)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings().context("failed to load settings")?;
    if let Some(rpc_url) = cli.rpc_url {
        settings.rpc_url = rpc_url;
    }
    if let Some(network) = cli.network {
        settings.network = network;
    }

    match cli.command {
        Command::Deploy { tags, local_mocks } => {
            let chain = rpc_chain(&settings)?;
            let orchestrator = orchestrator(&settings, chain).await?;
            info!(deployer = %orchestrator.deployer(), network = %settings.network, "deploying");
            let summary = orchestrator.run(&tags, local_mocks).await?;
            if let Some(module) = summary.module {
                println!(
                    "registered open action: tx= {} module={} uri={}",
                    module.registration_tx, module.record.address, module.metadata_uri
                );
            }
            if let Some(cook_book) = summary.cook_book {
                println!("CookBook deployed at {}", cook_book.address);
            }
        }
        Command::Demo => run_demo(&settings).await?,
        Command::Metadata => print_json(&metadata::recipe_module_metadata()?)?,
        Command::Initialize {
            target,
            profile_id,
            publication_id,
            executor,
            calldata,
        } => {
            let (client, from) = action_client(&settings, rpc_chain(&settings)?, &target).await?;
            let outcome = FormInvoker::new(client, from)
                .submit_initialize(&InitializeForm {
                    profile_id,
                    publication_id,
                    executor_address: executor,
                    calldata,
                })
                .await?;
            println!(
                "TipReceiverRegistered {} -> {} (tx {} block {})",
                outcome.publication,
                outcome.tip_receiver,
                outcome.transaction_hash,
                outcome.block_number
            );
        }
        Command::Process {
            target,
            publication_acted_profile_id,
            publication_acted_id,
            actor_profile_id,
            actor_profile_owner,
            transaction_executor,
            referrer_profile_ids,
            referrer_pub_ids,
            referrer_pub_types,
            action_module_data,
            value,
        } => {
            let (client, from) = action_client(&settings, rpc_chain(&settings)?, &target).await?;
            let outcome = FormInvoker::new(client, from)
                .submit_process(&ProcessForm {
                    publication_acted_profile_id,
                    publication_acted_id,
                    actor_profile_id,
                    actor_profile_owner,
                    transaction_executor,
                    referrer_profile_ids,
                    referrer_pub_ids,
                    referrer_pub_types,
                    action_module_data,
                    value,
                })
                .await?;
            println!(
                "TipCreated {} {} -> {} in {} (tx {} block {})",
                outcome.tip_amount,
                outcome.transaction_executor,
                outcome.tip_receiver,
                outcome.currency,
                outcome.transaction_hash,
                outcome.block_number
            );
        }
        Command::TipReceiver {
            target,
            profile_id,
            publication_id,
        } => {
            let (client, _) = action_client(&settings, rpc_chain(&settings)?, &target).await?;
            let publication = PublicationRef::new(ProfileId(profile_id), PublicationId(publication_id));
            match client.tip_receiver(publication).await? {
                Some(receiver) => println!("{receiver}"),
                None => bail!("publication {publication} has no tip receiver"),
            }
        }
        Command::SupportsInterface {
            target,
            interface_id,
        } => {
            let (client, _) = action_client(&settings, rpc_chain(&settings)?, &target).await?;
            let supported = match interface_id {
                Some(id) => client.supports_interface(id).await?,
                None => client.supports_lens_module().await?,
            };
            println!("{supported}");
        }
        Command::EncodeInitData {
            tip_receiver,
            cook_book,
            cook_book_id,
            recipe_metadata,
        } => {
            let data = encode_init_data(&InitializeActionData {
                tip_receiver,
                cook_book,
                cook_book_id,
                recipe_metadata,
            });
            println!("{}", encode_prefixed_hex(&data));
        }
        Command::EncodeProcessData {
            currency,
            tip_amount,
            cook_book,
            cook_book_id,
        } => {
            let data = encode_process_data(&ProcessActionData {
                currency,
                tip_amount: TokenAmount::parse_ether(&tip_amount)
                    .with_context(|| format!("invalid tip amount '{tip_amount}'"))?,
                cook_book,
                cook_book_id,
            });
            println!("{}", encode_prefixed_hex(&data));
        }
        Command::RegisterCurrency { token, registry } => {
            let orchestrator = orchestrator(&settings, rpc_chain(&settings)?).await?;
            let registry = match registry {
                Some(registry) => registry,
                None => orchestrator.resolve_registry().await?,
            };
            let tx = orchestrator.register_currency(registry, token).await?;
            println!("registered currency {token} in {registry}: tx={tx}");
        }
        Command::Approve {
            token,
            spender,
            amount,
            from,
        } => {
            let chain = rpc_chain(&settings)?;
            let spender = match spender {
                Some(spender) => spender,
                None => {
                    settings
                        .deployment_store()
                        .get(RECIPE_ACTION_MODULE)
                        .await
                        .context("no --spender given and no recorded module deployment")?
                        .address
                }
            };
            let from = match from {
                Some(from) => from,
                None => first_account(chain.as_ref()).await?,
            };
            let amount = TokenAmount::parse_ether(&amount)
                .with_context(|| format!("invalid amount '{amount}'"))?;
            let tx = Erc20Client::new(chain, token)
                .with_confirmation(settings.confirmation_policy())
                .approve(from, spender, amount)
                .await?;
            println!("approved {amount} for {spender}: tx={tx}");
        }
    }

    Ok(())
}
