//! gridmatch binary
//!
//! Wires the CLI roles to the solver core. The binary ships with the
//! in-process chain (the escrow contract model) so every role runs
//! standalone; a production deployment points the same core at an
//! external RPC chain client and the HTTP transport instead.

use anyhow::{anyhow, Context};
use clap::Parser;
use escrow::{EscrowContract, LocalChain};
use settlement::{RetryPolicy, SettlementEngine};
use solver::agents::{
    JobCreatorAgent, JudgePolicy, MediatorAgent, MediatorRuling, ResourceProviderAgent,
};
use solver::cli::{
    ChainArgs, Cli, Commands, JobCreatorArgs, MediatorArgs, ResourceProviderArgs, SolverArgs,
};
use solver::{unix_now, Controller, ControllerConfig, LocalGateway, TimeoutWindows};
use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;
use store::{Durability, SolverStore, StoreConfig};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use types::errors::SolverError;
use types::ids::Address;
use types::numeric::TokenAmount;
use types::offer::{Capacity, JobCollateral, JobOffer, ResourceCollateral, ResourceOffer};

/// Dev-faucet balance for standalone accounts.
const FAUCET_BALANCE: u64 = 1_000_000;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let result = match cli.command {
        Commands::Solver(args) => run_solver(args).await,
        Commands::JobCreator(args) => run_job_creator(args).await,
        Commands::ResourceProvider(args) => run_resource_provider(args).await,
        Commands::Mediator(args) => run_mediator(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "startup failed");
            ExitCode::FAILURE
        }
    }
}

struct Stack {
    chain: Arc<LocalChain>,
    controller: Arc<Controller<Arc<LocalChain>>>,
    gateway: Arc<LocalGateway<Arc<LocalChain>>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Build the standalone stack: store, in-process chain, controller.
fn build_stack(chain_args: &ChainArgs, solver_args: Option<&SolverArgs>) -> anyhow::Result<Stack> {
    info!(
        rpc_url = %chain_args.rpc_url,
        chain_id = chain_args.chain_id,
        escrow = %chain_args.escrow_address,
        "using in-process chain; external RPC client not wired"
    );

    let (store_config, config) = match solver_args {
        Some(args) => (
            StoreConfig {
                dir: args.data_dir.clone(),
                prefix: "gridmatch".to_string(),
                durability: if args.durable {
                    Durability::Fsync
                } else {
                    Durability::Buffered
                },
            },
            ControllerConfig {
                solver_address: Address::new(args.chain.address.clone()),
                mediator: Address::new(args.mediator.clone()),
                mediation_fee: args.mediation_fee,
                timeouts: TimeoutWindows {
                    agree_secs: args.agree_timeout,
                    submit_secs: args.submit_timeout,
                    judge_secs: args.judge_timeout,
                    mediate_secs: args.mediate_timeout,
                },
                tick_interval_ms: 1_000,
            },
        ),
        None => (
            StoreConfig::default(),
            ControllerConfig::new(Address::new("0xsolver"), Address::new("0xmediator")),
        ),
    };

    let store = Arc::new(SolverStore::open(store_config).context("cannot open solver store")?);
    let chain = Arc::new(LocalChain::new(EscrowContract::new(
        config.solver_address.clone(),
    )));
    let engine = SettlementEngine::new(Arc::clone(&chain), RetryPolicy::default());
    let controller = Controller::new(store, engine, config);
    let gateway = LocalGateway::new(Arc::clone(&controller));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    controller.start(shutdown_rx.clone());

    Ok(Stack {
        chain,
        controller,
        gateway,
        shutdown_tx,
        shutdown_rx,
    })
}

/// Credit a standalone account from the dev faucet.
fn faucet(stack: &Stack, account: &Address) -> anyhow::Result<()> {
    stack
        .chain
        .with_contract(|contract| {
            let owner = contract.owner().clone();
            contract.fund(&owner, account, TokenAmount::from_u64(FAUCET_BALANCE))
        })
        .map_err(|e| anyhow!("dev faucet failed: {}", e))
}

async fn run_solver(args: SolverArgs) -> anyhow::Result<()> {
    let stack = build_stack(&args.chain, Some(&args))?;
    info!(address = %args.chain.address, "solver running");

    tokio::signal::ctrl_c().await.context("signal handler")?;
    shutdown(&stack)
}

async fn run_job_creator(args: JobCreatorArgs) -> anyhow::Result<()> {
    let stack = build_stack(&args.chain, None)?;
    let address = Address::new(args.chain.address.clone());
    faucet(&stack, &address)?;

    let agent = JobCreatorAgent {
        offer: JobOffer::new(
            address,
            args.module,
            Capacity {
                cpu_millis: args.cpu_millis,
                memory_mb: args.memory_mb,
                gpu_count: args.gpu_count,
            },
            args.max_price,
            JobCollateral {
                payment: args.payment_collateral,
                timeout: args.timeout_collateral,
            },
            unix_now(),
        ),
        judge: if args.challenge {
            JudgePolicy::Challenge
        } else {
            JudgePolicy::Accept
        },
    };

    let run = agent.run(Arc::clone(&stack.gateway), stack.shutdown_rx.clone());
    run_until_ctrl_c(run, &stack).await
}

async fn run_resource_provider(args: ResourceProviderArgs) -> anyhow::Result<()> {
    let stack = build_stack(&args.chain, None)?;
    let address = Address::new(args.chain.address.clone());
    faucet(&stack, &address)?;

    let agent = ResourceProviderAgent {
        offer: ResourceOffer::new(
            address,
            Capacity {
                cpu_millis: args.cpu_millis,
                memory_mb: args.memory_mb,
                gpu_count: args.gpu_count,
            },
            args.unit_price,
            ResourceCollateral {
                results: args.results_collateral,
                timeout: args.timeout_collateral,
            },
            unix_now(),
        ),
        instruction_count: args.instruction_count,
        data_ref: args.data_ref,
    };

    let run = agent.run(Arc::clone(&stack.gateway), stack.shutdown_rx.clone());
    run_until_ctrl_c(run, &stack).await
}

async fn run_mediator(args: MediatorArgs) -> anyhow::Result<()> {
    let stack = build_stack(&args.chain, None)?;
    let agent = MediatorAgent {
        address: Address::new(args.chain.address.clone()),
        ruling: if args.reject {
            MediatorRuling::Reject
        } else {
            MediatorRuling::Accept
        },
    };

    let run = agent.run(Arc::clone(&stack.gateway), stack.shutdown_rx.clone());
    run_until_ctrl_c(run, &stack).await
}

async fn run_until_ctrl_c(
    agent: impl Future<Output = Result<(), SolverError>>,
    stack: &Stack,
) -> anyhow::Result<()> {
    tokio::select! {
        result = agent => result.map_err(|e| anyhow!("agent failed: {}", e))?,
        _ = tokio::signal::ctrl_c() => {}
    }
    shutdown(stack)
}

fn shutdown(stack: &Stack) -> anyhow::Result<()> {
    info!("shutting down");
    let _ = stack.shutdown_tx.send(true);
    stack
        .controller
        .store()
        .sync()
        .map_err(|e| anyhow!("final store sync failed: {}", e))
}
