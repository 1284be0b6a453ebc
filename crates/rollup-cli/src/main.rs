// crates/rollup-cli/src/main.rs
// ============================================================================
// Module: Rollup CLI Entry Point
// Description: Command dispatcher for operator rollup-engine workflows.
// Purpose: Provide a local operator CLI over RollupService/Orchestrator
//          backed by the sqlite reference store.
// Dependencies: clap, rollup-config, rollup-core, rollup-events,
//               rollup-orchestrator, rollup-service, rollup-store-sqlite,
//               tokio, tracing, tracing-subscriber.
// ============================================================================

//! ## Overview
//! The rollup CLI wires `RollupService` and `Orchestrator` to a single
//! `SqliteRollupStore` connection (file-backed or `--in-memory`) and
//! dispatches one operator request per invocation: create/inspect/list/
//! delete a rollup, trigger or cancel an execution, inspect the dead-letter
//! queue. There is no long-running server process; `execute` runs the job
//! inline against a one-shot worker pool and waits for the pipeline to
//! finish before exiting.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use clap::Subcommand;
use rollup_config::RollupEngineConfig;
use rollup_core::RollupError;
use rollup_core::RollupId;
use rollup_core::RollupStore;
use rollup_core::TenantId;
use rollup_events::EventBus;
use rollup_orchestrator::CircuitBreakerRegistry;
use rollup_orchestrator::InProcessJobBroker;
use rollup_orchestrator::Orchestrator;
use rollup_service::CreateRollupInput;
use rollup_service::Pagination;
use rollup_service::RollupListFilter;
use rollup_service::RollupListSort;
use rollup_service::RollupService;
use rollup_service::RollupServiceLimits;
use rollup_store_sqlite::SqliteRollupStore;
use rollup_store_sqlite::SqliteStoreConfig;
use tracing::error;
use tracing::info;
use uuid::Uuid;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "rollup", disable_help_subcommand = true)]
struct Cli {
    /// Path to the sqlite database file; omit for an ephemeral in-memory
    /// store.
    #[arg(long, value_name = "PATH", global = true)]
    db: Option<PathBuf>,
    /// Path to a `rollup-engine.toml` configuration file; omit to use
    /// built-in defaults.
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Rollup configuration CRUD.
    Rollup {
        /// Selected rollup subcommand.
        #[command(subcommand)]
        command: RollupCommand,
    },
    /// Execution lifecycle.
    Execution {
        /// Selected execution subcommand.
        #[command(subcommand)]
        command: ExecutionCommand,
    },
    /// Dead-letter queue inspection.
    Dlq {
        /// Selected dead-letter subcommand.
        #[command(subcommand)]
        command: DlqCommand,
    },
}

/// `rollup` subcommands.
#[derive(Subcommand, Debug)]
enum RollupCommand {
    /// Creates a rollup from a JSON file matching `CreateRollupInput`.
    Create {
        /// Owning tenant id.
        #[arg(long)]
        tenant: Uuid,
        /// Path to a JSON file with the rollup's name, `repositoryIds`,
        /// `matchers`, `mergeOptions`, and optional `schedule`.
        #[arg(long, value_name = "PATH")]
        file: PathBuf,
        /// Identity recorded as the creator.
        #[arg(long)]
        created_by: String,
    },
    /// Fetches a rollup by id.
    Get {
        /// Owning tenant id.
        #[arg(long)]
        tenant: Uuid,
        /// Rollup id.
        #[arg(long)]
        rollup: Uuid,
    },
    /// Lists rollups for a tenant.
    List {
        /// Owning tenant id.
        #[arg(long)]
        tenant: Uuid,
    },
    /// Deletes a rollup by id.
    Delete {
        /// Owning tenant id.
        #[arg(long)]
        tenant: Uuid,
        /// Rollup id.
        #[arg(long)]
        rollup: Uuid,
    },
}

/// `execution` subcommands.
#[derive(Subcommand, Debug)]
enum ExecutionCommand {
    /// Enqueues and runs an execution of a rollup to completion.
    Run {
        /// Owning tenant id.
        #[arg(long)]
        tenant: Uuid,
        /// Rollup id to execute.
        #[arg(long)]
        rollup: Uuid,
    },
    /// Fetches the current state of an execution.
    Get {
        /// Owning tenant id.
        #[arg(long)]
        tenant: Uuid,
        /// Execution id.
        #[arg(long)]
        execution: Uuid,
    },
    /// Cancels a queued or in-flight execution.
    Cancel {
        /// Owning tenant id.
        #[arg(long)]
        tenant: Uuid,
        /// Execution id.
        #[arg(long)]
        execution: Uuid,
    },
}

/// `dlq` subcommands.
#[derive(Subcommand, Debug)]
enum DlqCommand {
    /// Lists dead-letter entries for a tenant.
    List {
        /// Owning tenant id.
        #[arg(long)]
        tenant: Uuid,
    },
}

/// CLI-level error, rendered to stderr with no cause-chain detail beyond
/// what [`RollupError::to_safe`] already strips.
#[derive(Debug)]
struct CliError(String);

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<RollupError> for CliError {
    fn from(err: RollupError) -> Self {
        Self(err.to_string())
    }
}

impl From<rollup_store_sqlite::SqliteStoreError> for CliError {
    fn from(err: rollup_store_sqlite::SqliteStoreError) -> Self {
        Self(err.to_string())
    }
}

impl From<rollup_core::RollupStoreError> for CliError {
    fn from(err: rollup_core::RollupStoreError) -> Self {
        Self(err.to_string())
    }
}

impl From<rollup_config::ConfigError> for CliError {
    fn from(err: rollup_config::ConfigError) -> Self {
        Self(err.to_string())
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Collaborator Wiring
// ============================================================================

/// Collaborators a single CLI invocation needs, torn down at the end of
/// `run`.
struct Context {
    store: Arc<SqliteRollupStore>,
    service: RollupService,
    orchestrator: Arc<Orchestrator>,
}

impl Context {
    /// Builds the collaborator wiring for one CLI invocation: a sqlite
    /// store, a null event bus, and an orchestrator over an in-process
    /// broker.
    fn build(db: Option<&PathBuf>, config_path: Option<&PathBuf>) -> CliResult<Self> {
        let config = match config_path {
            Some(path) => RollupEngineConfig::load(path)?,
            None => RollupEngineConfig::default(),
        };

        let store = Arc::new(match db {
            Some(path) => SqliteRollupStore::new(&SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: 5_000,
                journal_mode: rollup_store_sqlite::SqliteStoreMode::default(),
                sync_mode: rollup_store_sqlite::SqliteSyncMode::default(),
                dead_letter_queue_max_size: config.dead_letter_queue_max_size,
                dead_letter_retention_ms: config.dead_letter_retention_ms,
            })?,
            None => SqliteRollupStore::open_in_memory()?,
        });

        let events = Arc::new(EventBus::null("rollup-cli"));
        let broker = Arc::new(InProcessJobBroker::new(config.execution_retry_policy));
        let breakers = Arc::new(CircuitBreakerRegistry::new(config.circuit_breaker, &["scan_store", "blob_store"]));
        let orchestrator = Arc::new(Orchestrator::new(
            store.clone() as Arc<dyn RollupStore>,
            store.clone() as Arc<dyn rollup_core::ScanGraphStore>,
            events.clone(),
            broker,
            breakers,
            config.execution_retry_policy,
        ));
        let limits = RollupServiceLimits {
            max_repositories_per_rollup: config.max_repositories_per_rollup,
            max_matchers_per_rollup: config.max_matchers_per_rollup,
        };
        let service = RollupService::new(store.clone() as Arc<dyn RollupStore>, orchestrator.clone(), events, limits);

        Ok(Self { store, service, orchestrator })
    }
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "command failed");
            ExitCode::FAILURE
        }
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let ctx = Context::build(cli.db.as_ref(), cli.config.as_ref())?;

    match cli.command {
        Commands::Rollup { command } => command_rollup(&ctx, command).await,
        Commands::Execution { command } => command_execution(&ctx, command).await,
        Commands::Dlq { command } => command_dlq(&ctx, command).await,
    }
}

// ============================================================================
// SECTION: Rollup Commands
// ============================================================================

/// Executes a `rollup` subcommand.
async fn command_rollup(ctx: &Context, command: RollupCommand) -> CliResult<()> {
    match command {
        RollupCommand::Create { tenant, file, created_by } => {
            let bytes = std::fs::read(&file).map_err(|err| CliError(format!("reading {}: {err}", file.display())))?;
            let mut input: CreateRollupInput =
                serde_json::from_slice(&bytes).map_err(|err| CliError(format!("parsing {}: {err}", file.display())))?;
            input.created_by = created_by;
            let rollup = ctx.service.create(TenantId::from_uuid(tenant), input).await?;
            print_json(&rollup);
        }
        RollupCommand::Get { tenant, rollup } => {
            let rollup = ctx.service.get(TenantId::from_uuid(tenant), RollupId::from_uuid(rollup)).await?;
            print_json(&rollup);
        }
        RollupCommand::List { tenant } => {
            let rollups = ctx
                .service
                .list(TenantId::from_uuid(tenant), &RollupListFilter::default(), RollupListSort::default(), Pagination::default())
                .await?;
            print_json(&rollups);
        }
        RollupCommand::Delete { tenant, rollup } => {
            ctx.service.delete(TenantId::from_uuid(tenant), RollupId::from_uuid(rollup)).await?;
            info!(%rollup, "rollup deleted");
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Execution Commands
// ============================================================================

/// Executes an `execution` subcommand.
async fn command_execution(ctx: &Context, command: ExecutionCommand) -> CliResult<()> {
    match command {
        ExecutionCommand::Run { tenant, rollup } => {
            let tenant = TenantId::from_uuid(tenant);
            let workers = ctx.orchestrator.spawn_workers(1);
            let execution_id = ctx.service.execute(tenant, RollupId::from_uuid(rollup), rollup_service::ExecuteOptions::default()).await?;
            info!(%execution_id, "execution enqueued, awaiting completion");
            wait_for_terminal(ctx, tenant, execution_id).await?;
            for worker in workers {
                worker.abort();
            }
            let execution = ctx.service.get_execution_result(tenant, execution_id).await?;
            print_json(&execution);
        }
        ExecutionCommand::Get { tenant, execution } => {
            let result = ctx
                .service
                .get_execution_result(TenantId::from_uuid(tenant), rollup_core::ExecutionId::from_uuid(execution))
                .await?;
            print_json(&result);
        }
        ExecutionCommand::Cancel { tenant, execution } => {
            ctx.service.cancel(TenantId::from_uuid(tenant), rollup_core::ExecutionId::from_uuid(execution)).await?;
            info!(%execution, "execution cancelled");
        }
    }
    Ok(())
}

/// Polls the execution record until it reaches a terminal status, the
/// simplest wait strategy for a one-shot CLI invocation that has no event
/// subscriber of its own.
async fn wait_for_terminal(ctx: &Context, tenant: TenantId, execution_id: rollup_core::ExecutionId) -> CliResult<()> {
    loop {
        let execution = ctx.service.get_execution_result(tenant, execution_id).await?;
        if execution.status.is_terminal() {
            return Ok(());
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}

// ============================================================================
// SECTION: Dead-Letter Commands
// ============================================================================

/// Executes a `dlq` subcommand.
async fn command_dlq(ctx: &Context, command: DlqCommand) -> CliResult<()> {
    match command {
        DlqCommand::List { tenant } => {
            let entries = ctx.store.list_dead_letters(TenantId::from_uuid(tenant)).await.map_err(CliError::from)?;
            print_json(&entries);
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Renders a value as pretty JSON on stdout, the CLI's sole output format.
fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(rendered) => println!("{rendered}"),
        Err(err) => error!(%err, "failed to render output as json"),
    }
}
