//! `flowstore` CLI entry-point.
//!
//! Available sub-commands:
//! - `replay`: save a recorded run into the configured repositories and
//!   print its node executions.
//! - `migrate`: run pending database migrations.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use db::{RepoMode, RepositoryConfig};
use engine::{
    CallerIdentity, OrderConfig, OrderDirection, WorkflowExecution, WorkflowExecutionRepository,
    WorkflowNodeExecution, WorkflowNodeExecutionRepository, WorkflowNodeExecutionTriggeredFrom,
    WorkflowRunTriggeredFrom,
};

#[derive(Parser)]
#[command(name = "flowstore", about = "Workflow execution history store", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Save a recorded run and print the node executions of one workflow run.
    Replay(ReplayArgs),
    /// Run pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
}

#[derive(Args)]
struct ReplayArgs {
    /// JSON file with `workflow_executions` and `node_executions` arrays.
    path: PathBuf,

    /// Workflow run whose node executions are printed.
    #[arg(long)]
    run_id: String,

    #[arg(long, env = "FLOWSTORE_TENANT_ID")]
    tenant_id: String,

    #[arg(long, env = "FLOWSTORE_USER_ID", default_value = "flowstore-cli")]
    user_id: String,

    /// Act as an end user instead of an account.
    #[arg(long)]
    end_user: bool,

    #[arg(long)]
    app_id: Option<String>,

    /// Sort fields, most significant first.
    #[arg(long, value_delimiter = ',')]
    order_by: Vec<String>,

    #[arg(long, default_value = "asc")]
    direction: OrderDirection,

    /// Print only node executions that are still running.
    #[arg(long, conflicts_with = "order_by")]
    running_only: bool,

    /// Keep both repositories in memory whatever the environment says.
    #[arg(long)]
    memory: bool,
}

impl ReplayArgs {
    fn caller(&self) -> CallerIdentity {
        if self.end_user {
            CallerIdentity::EndUser {
                id: self.user_id.clone(),
                tenant_id: Some(self.tenant_id.clone()),
            }
        } else {
            CallerIdentity::Account {
                id: self.user_id.clone(),
                current_tenant_id: Some(self.tenant_id.clone()),
            }
        }
    }

    fn order_config(&self) -> Option<OrderConfig> {
        let config = OrderConfig::new(self.order_by.iter().cloned(), self.direction);
        (!config.is_empty()).then_some(config)
    }
}

/// Contents of a replay file.
#[derive(Debug, Deserialize)]
struct Recording {
    #[serde(default)]
    workflow_executions: Vec<WorkflowExecution>,
    #[serde(default)]
    node_executions: Vec<WorkflowNodeExecution>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("flowstore=info,db=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Replay(args) => replay(args).await,
        Command::Migrate { database_url } => migrate(&database_url).await,
    }
}

async fn replay(args: ReplayArgs) -> Result<()> {
    let content = std::fs::read_to_string(&args.path)
        .with_context(|| format!("cannot read file {}", args.path.display()))?;
    let recording: Recording = serde_json::from_str(&content).context("invalid recording JSON")?;

    let mut config = RepositoryConfig::from_env()?;
    if args.memory {
        config.workflow_execution_repo_mode = RepoMode::Memory;
        config.workflow_node_execution_repo_mode = RepoMode::Memory;
    }
    let pool = db::pool::connect_if_needed(&config).await?;

    let caller = args.caller();
    let executions = db::create_workflow_execution_repository(
        &config,
        pool.as_ref(),
        &caller,
        args.app_id.clone(),
        Some(WorkflowRunTriggeredFrom::AppRun),
    )?;
    let node_executions = db::create_workflow_node_execution_repository(
        &config,
        pool.as_ref(),
        &caller,
        args.app_id.clone(),
        Some(WorkflowNodeExecutionTriggeredFrom::WorkflowRun),
    )?;

    for execution in &recording.workflow_executions {
        executions.save(execution).await?;
    }
    for execution in &recording.node_executions {
        node_executions.save(execution).await?;
    }
    info!(
        "Saved {} workflow executions and {} node executions",
        recording.workflow_executions.len(),
        recording.node_executions.len()
    );

    if let Some(run) = executions.get(&args.run_id).await? {
        info!(
            "Run {} is {} after {:.3}s",
            run.id,
            run.status,
            run.elapsed_time()
        );
    }

    let records = if args.running_only {
        node_executions.get_running_executions(&args.run_id).await?
    } else {
        let order = args.order_config();
        node_executions
            .get_by_workflow_run(&args.run_id, order.as_ref())
            .await?
    };

    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

async fn migrate(database_url: &str) -> Result<()> {
    info!("Running migrations");
    let pool = db::pool::create_pool(database_url, 2)
        .await
        .context("failed to connect to database")?;
    db::pool::run_migrations(&pool)
        .await
        .context("migration failed")?;
    info!("Migrations applied successfully");
    Ok(())
}
