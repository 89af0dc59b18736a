//! Command-line argument parsing with clap.
//!
//! One subcommand per role. Chain flags are shared across roles and all
//! carry environment fallbacks. Configuration errors exit with clap's
//! status 2; startup failures with 1; a clean shutdown with 0.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use types::numeric::TokenAmount;

/// gridmatch — decentralized compute marketplace solver.
#[derive(Parser, Debug)]
#[command(name = "gridmatch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Chain connection flags shared by every role.
#[derive(Args, Debug, Clone)]
pub struct ChainArgs {
    /// Chain RPC endpoint.
    #[arg(long, env = "GRIDMATCH_RPC_URL", default_value = "http://localhost:8545")]
    pub rpc_url: String,

    /// Hex private key of the acting account (held by the wallet layer).
    #[arg(long, env = "GRIDMATCH_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Account address of the acting party.
    #[arg(long, env = "GRIDMATCH_ADDRESS")]
    pub address: String,

    /// Escrow contract address.
    #[arg(long, env = "GRIDMATCH_ESCROW_ADDRESS", default_value = "0xescrow")]
    pub escrow_address: String,

    /// Payment token contract address.
    #[arg(long, env = "GRIDMATCH_TOKEN_ADDRESS", default_value = "0xtoken")]
    pub token_address: String,

    /// Marketplace controller contract address.
    #[arg(long, env = "GRIDMATCH_CONTROLLER_ADDRESS", default_value = "0xcontroller")]
    pub controller_address: String,

    /// Chain id.
    #[arg(long, env = "GRIDMATCH_CHAIN_ID", default_value_t = 1337)]
    pub chain_id: u64,
}

/// Top-level subcommands, one per role.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the solver service.
    Solver(SolverArgs),

    /// Post a job offer and see its deal through.
    JobCreator(JobCreatorArgs),

    /// Offer compute capacity and serve matched jobs.
    ResourceProvider(ResourceProviderArgs),

    /// Serve mediation rulings.
    Mediator(MediatorArgs),
}

#[derive(Args, Debug)]
pub struct SolverArgs {
    #[command(flatten)]
    pub chain: ChainArgs,

    /// Directory for the JSONL state files.
    #[arg(long, env = "GRIDMATCH_DATA_DIR", default_value = "/var/tmp")]
    pub data_dir: PathBuf,

    /// Fsync every log line instead of buffered appends.
    #[arg(long)]
    pub durable: bool,

    /// Mediator assigned when a result is challenged.
    #[arg(long, env = "GRIDMATCH_MEDIATOR", default_value = "0xmediator")]
    pub mediator: String,

    /// Mediation fee charged into escrow on challenge.
    #[arg(long, default_value = "8")]
    pub mediation_fee: TokenAmount,

    /// Agreement window in seconds.
    #[arg(long, default_value_t = 120)]
    pub agree_timeout: i64,

    /// Result-submission window in seconds.
    #[arg(long, default_value_t = 600)]
    pub submit_timeout: i64,

    /// Judge window in seconds.
    #[arg(long, default_value_t = 300)]
    pub judge_timeout: i64,

    /// Mediation window in seconds.
    #[arg(long, default_value_t = 600)]
    pub mediate_timeout: i64,
}

#[derive(Args, Debug)]
pub struct JobCreatorArgs {
    #[command(flatten)]
    pub chain: ChainArgs,

    /// Module reference describing the work.
    #[arg(long)]
    pub module: String,

    /// Demanded CPU in millicores.
    #[arg(long, default_value_t = 1000)]
    pub cpu_millis: u64,

    /// Demanded memory in MB.
    #[arg(long, default_value_t = 512)]
    pub memory_mb: u64,

    /// Demanded GPU count.
    #[arg(long, default_value_t = 0)]
    pub gpu_count: u64,

    /// Highest unit price this job will pay.
    #[arg(long)]
    pub max_price: TokenAmount,

    /// Payment collateral locked on agree.
    #[arg(long, default_value = "100")]
    pub payment_collateral: TokenAmount,

    /// Timeout collateral locked on agree.
    #[arg(long, default_value = "5")]
    pub timeout_collateral: TokenAmount,

    /// Challenge the result instead of accepting it.
    #[arg(long)]
    pub challenge: bool,
}

#[derive(Args, Debug)]
pub struct ResourceProviderArgs {
    #[command(flatten)]
    pub chain: ChainArgs,

    /// Offered CPU in millicores.
    #[arg(long, default_value_t = 4000)]
    pub cpu_millis: u64,

    /// Offered memory in MB.
    #[arg(long, default_value_t = 8192)]
    pub memory_mb: u64,

    /// Offered GPU count.
    #[arg(long, default_value_t = 0)]
    pub gpu_count: u64,

    /// Price per instruction.
    #[arg(long)]
    pub unit_price: TokenAmount,

    /// Results collateral locked with each submission.
    #[arg(long, default_value = "30")]
    pub results_collateral: TokenAmount,

    /// Timeout collateral locked on agree.
    #[arg(long, default_value = "5")]
    pub timeout_collateral: TokenAmount,

    /// Instruction count reported for executed jobs.
    #[arg(long, default_value_t = 10)]
    pub instruction_count: u64,

    /// Content address submitted for produced results.
    #[arg(long, default_value = "bafy-local-result")]
    pub data_ref: String,
}

#[derive(Args, Debug)]
pub struct MediatorArgs {
    #[command(flatten)]
    pub chain: ChainArgs,

    /// Rule against submitted results instead of upholding them.
    #[arg(long)]
    pub reject: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solver_args_parse_with_defaults() {
        let cli = Cli::try_parse_from([
            "gridmatch",
            "solver",
            "--address",
            "0xsolver",
        ])
        .unwrap();
        match cli.command {
            Commands::Solver(args) => {
                assert_eq!(args.chain.address, "0xsolver");
                assert_eq!(args.chain.chain_id, 1337);
                assert_eq!(args.data_dir, PathBuf::from("/var/tmp"));
                assert_eq!(args.mediation_fee, TokenAmount::from_u64(8));
                assert!(!args.durable);
            }
            _ => panic!("expected solver subcommand"),
        }
    }

    #[test]
    fn test_job_creator_requires_module_and_price() {
        let result = Cli::try_parse_from(["gridmatch", "job-creator", "--address", "0xjc"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from([
            "gridmatch",
            "job-creator",
            "--address",
            "0xjc",
            "--module",
            "wasm:fib",
            "--max-price",
            "10",
        ])
        .unwrap();
        match cli.command {
            Commands::JobCreator(args) => {
                assert_eq!(args.module, "wasm:fib");
                assert_eq!(args.max_price, TokenAmount::from_u64(10));
                assert!(!args.challenge);
            }
            _ => panic!("expected job-creator subcommand"),
        }
    }

    #[test]
    fn test_negative_amount_is_a_config_error() {
        let result = Cli::try_parse_from([
            "gridmatch",
            "job-creator",
            "--address",
            "0xjc",
            "--module",
            "wasm:fib",
            "--max-price",
            "-10",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_mediator_ruling_flag() {
        let cli =
            Cli::try_parse_from(["gridmatch", "mediator", "--address", "0xmed", "--reject"])
                .unwrap();
        match cli.command {
            Commands::Mediator(args) => assert!(args.reject),
            _ => panic!("expected mediator subcommand"),
        }
    }
}
