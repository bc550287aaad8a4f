mod agent_cmds;
mod config;
mod export_cmd;
mod plan_cmds;
mod resolve;
mod shell;
mod status_cmd;

use std::io::{IsTerminal, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use bplan_core::{BuildPlanManager, PlanAction, PlanPriority, PlanStatus};

use config::BplanConfig;

#[derive(Parser)]
#[command(name = "bplan", about = "In-process build plan manager", version)]
struct Cli {
    /// Maximum simultaneously active plans (overrides BPLAN_MAX_ACTIVE_PLANS and the config file)
    #[arg(long, global = true)]
    max_active_plans: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new plan
    Create {
        /// Plan name
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// low, medium, high or critical
        #[arg(long, default_value = "medium")]
        priority: PlanPriority,
        /// Parent plan (id, id prefix or name)
        #[arg(long)]
        parent: Option<String>,
        /// Workspace directory for the plan
        #[arg(long)]
        workspace: Option<PathBuf>,
        /// Comma-separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },
    /// Append a goal to a plan
    AddGoal {
        plan_id: String,
        description: String,
        /// Comma-separated success criteria
        #[arg(long, value_delimiter = ',')]
        criteria: Vec<String>,
        /// Comma-separated constraints
        #[arg(long, value_delimiter = ',')]
        constraints: Vec<String>,
    },
    /// Start a created or suspended plan
    Start { plan_id: String },
    /// Suspend an active plan
    Suspend { plan_id: String },
    /// Resume a suspended plan
    Resume { plan_id: String },
    /// Mark an active plan completed
    Complete { plan_id: String },
    /// Mark an active plan failed
    Fail { plan_id: String },
    /// Cancel a plan and release its agents
    Cancel { plan_id: String },
    /// Make a plan depend on another
    AddDependency { plan_id: String, depends_on: String },
    /// Reserve an agent for a plan
    ReserveAgent {
        plan_id: String,
        agent_name: String,
        /// Refuse to share the agent with other plans
        #[arg(long)]
        exclusive: bool,
    },
    /// Release an agent from a plan
    ReleaseAgent { plan_id: String, agent_name: String },
    /// Send one of a plan's goals to a reserved agent
    Dispatch {
        plan_id: String,
        agent_name: String,
        /// Zero-based goal index
        goal_index: usize,
    },
    /// Show one plan, or list all plans
    Status {
        plan_id: Option<String>,
        /// Only list plans in this status
        #[arg(long)]
        filter: Option<PlanStatus>,
    },
    /// Show agent workload
    Agents,
    /// List created plans whose dependencies are satisfied
    Ready,
    /// Show all plans in dependency order
    Order,
    /// Write all state to a JSON file
    Export { output_path: PathBuf },
    /// Read commands from stdin against one manager
    Shell,
}

/// Run one command against `manager`, writing normal output to `out`.
pub async fn execute(
    manager: &BuildPlanManager,
    command: Commands,
    out: &mut dyn Write,
) -> Result<()> {
    match command {
        Commands::Create {
            name,
            description,
            priority,
            parent,
            workspace,
            tags,
        } => plan_cmds::cmd_create(
            manager,
            plan_cmds::CreateArgs {
                name,
                description,
                priority,
                parent,
                workspace,
                tags,
            },
            out,
        ),
        Commands::AddGoal {
            plan_id,
            description,
            criteria,
            constraints,
        } => plan_cmds::cmd_add_goal(manager, &plan_id, description, criteria, constraints, out),
        Commands::Start { plan_id } => {
            plan_cmds::cmd_transition(manager, &plan_id, PlanAction::Start, out).await
        }
        Commands::Suspend { plan_id } => {
            plan_cmds::cmd_transition(manager, &plan_id, PlanAction::Suspend, out).await
        }
        Commands::Resume { plan_id } => {
            plan_cmds::cmd_transition(manager, &plan_id, PlanAction::Resume, out).await
        }
        Commands::Complete { plan_id } => {
            plan_cmds::cmd_transition(manager, &plan_id, PlanAction::Complete, out).await
        }
        Commands::Fail { plan_id } => {
            plan_cmds::cmd_transition(manager, &plan_id, PlanAction::Fail, out).await
        }
        Commands::Cancel { plan_id } => {
            plan_cmds::cmd_transition(manager, &plan_id, PlanAction::Cancel, out).await
        }
        Commands::AddDependency {
            plan_id,
            depends_on,
        } => plan_cmds::cmd_add_dependency(manager, &plan_id, &depends_on, out),
        Commands::ReserveAgent {
            plan_id,
            agent_name,
            exclusive,
        } => agent_cmds::cmd_reserve(manager, &plan_id, &agent_name, exclusive, out).await,
        Commands::ReleaseAgent {
            plan_id,
            agent_name,
        } => agent_cmds::cmd_release(manager, &plan_id, &agent_name, out).await,
        Commands::Dispatch {
            plan_id,
            agent_name,
            goal_index,
        } => agent_cmds::cmd_dispatch(manager, &plan_id, &agent_name, goal_index, out).await,
        Commands::Status { plan_id, filter } => {
            status_cmd::run_status(manager, plan_id.as_deref(), filter, out)
        }
        Commands::Agents => agent_cmds::cmd_agents(manager, out),
        Commands::Ready => status_cmd::run_ready(manager, out),
        Commands::Order => status_cmd::run_order(manager, out),
        Commands::Export { output_path } => export_cmd::run_export(manager, &output_path, out),
        Commands::Shell => anyhow::bail!("already in a shell"),
    }
}

/// Print a failed operation as an `Error:` line. Failed operations do not
/// change the exit code.
pub fn report(result: Result<()>, err: &mut dyn Write) {
    if let Err(e) = result {
        tracing::debug!(error = ?e, "command failed");
        let _ = writeln!(err, "Error: {e:#}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("error")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            std::process::exit(1);
        }
        Err(e) => e.exit(),
    };

    let resolved = BplanConfig::resolve(cli.max_active_plans)?;
    let manager = BuildPlanManager::new(resolved.coordinator, resolved.manager);

    match cli.command {
        Commands::Shell => {
            let stdin = std::io::stdin();
            let interactive = stdin.is_terminal();
            shell::run_shell(
                &manager,
                stdin.lock(),
                interactive,
                &mut std::io::stdout(),
                &mut std::io::stderr(),
            )
            .await?;
        }
        command => {
            let result = execute(&manager, command, &mut std::io::stdout()).await;
            report(result, &mut std::io::stderr());
        }
    }

    Ok(())
}
