use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flowengine::{FlowEngine, MemoryStore, RunStore, TaskRegistry};
use flowmodel::{Flow, TaskRunStatus, END_TASK};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "flowctl")]
#[command(about = "Flow execution CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a flow definition file against an in-process engine
    Run {
        /// Path to flow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a flow definition file
    Validate {
        /// Path to flow JSON file
        file: PathBuf,
    },

    /// List built-in task names
    Tasks,

    /// Write an example flow definition
    Init {
        /// Output file path
        #[arg(short, long, default_value = "flow.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { file, verbose } => {
            let level = if verbose {
                tracing::Level::DEBUG
            } else {
                tracing::Level::WARN
            };
            tracing_subscriber::fmt().with_max_level(level).init();

            run_flow(file).await?;
        }

        Commands::Validate { file } => {
            validate_flow(file)?;
        }

        Commands::Tasks => {
            list_tasks().await;
        }

        Commands::Init { output } => {
            write_example(&output)?;
            println!("wrote example flow to {}", output.display());
        }
    }

    Ok(())
}

fn load_flow(file: &PathBuf) -> Result<Flow> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing {}", file.display()))
}

async fn run_flow(file: PathBuf) -> Result<()> {
    let flow = load_flow(&file)?;
    println!("flow: {} ({} tasks)", flow.name, flow.tasks.len());

    let registry = Arc::new(TaskRegistry::new());
    flowtasks::register_builtin(&registry).await;

    let store = Arc::new(MemoryStore::new());
    let flow_id = flow.id.clone();
    store.create_flow(flow).await?;

    let engine = FlowEngine::new(
        Arc::clone(&store) as Arc<dyn RunStore>,
        Arc::clone(&registry) as _,
    )
    .await;

    let run_id = engine.start(&flow_id).await?;
    println!("run:  {run_id}");
    engine.wait(&run_id).await;

    println!();
    for row in store.list_task_runs(&run_id).await? {
        let marker = match row.status {
            TaskRunStatus::Success => "ok  ",
            TaskRunStatus::Failure => "FAIL",
            TaskRunStatus::Running => "... ",
        };
        match row.error {
            Some(error) => println!("  [{marker}] {} ({error})", row.task_name),
            None => println!("  [{marker}] {}", row.task_name),
        }
    }

    let run = store
        .get_run(&run_id)
        .await?
        .context("run disappeared from store")?;
    println!();
    println!("final status: {:?}", run.status);
    Ok(())
}

fn validate_flow(file: PathBuf) -> Result<()> {
    let flow = load_flow(&file)?;

    let mut problems = Vec::new();
    if flow.start_task != END_TASK && flow.find_task(&flow.start_task).is_none() {
        problems.push(format!("start_task '{}' is not declared", flow.start_task));
    }
    for cond in &flow.conditions {
        if flow.find_task(&cond.source_task).is_none() {
            problems.push(format!(
                "condition '{}' references undeclared source_task '{}'",
                cond.name, cond.source_task
            ));
        }
        for target in [&cond.target_task_success, &cond.target_task_failure] {
            if target != END_TASK && flow.find_task(target).is_none() {
                problems.push(format!(
                    "condition '{}' targets undeclared task '{}'",
                    cond.name, target
                ));
            }
        }
    }

    if problems.is_empty() {
        println!("{} is valid", file.display());
        Ok(())
    } else {
        for problem in &problems {
            eprintln!("problem: {problem}");
        }
        anyhow::bail!("{} problem(s) found", problems.len())
    }
}

async fn list_tasks() {
    let registry = TaskRegistry::new();
    flowtasks::register_builtin(&registry).await;
    for name in registry.task_names().await {
        println!("{name}");
    }
}

fn write_example(output: &PathBuf) -> Result<()> {
    let example = serde_json::json!({
        "id": "demo-pipeline",
        "name": "demo pipeline",
        "start_task": "fetch",
        "tasks": [
            {"name": "fetch", "description": "fetch a batch of items"},
            {"name": "process", "description": "sum the fetched items"},
            {"name": "store", "description": "persist the result"}
        ],
        "conditions": [
            {
                "name": "after-fetch",
                "description": "process on success",
                "source_task": "fetch",
                "outcome": "success",
                "target_task_success": "process",
                "target_task_failure": "end"
            },
            {
                "name": "after-process",
                "description": "store on success",
                "source_task": "process",
                "outcome": "success",
                "target_task_success": "store",
                "target_task_failure": "end"
            }
        ]
    });
    std::fs::write(output, serde_json::to_string_pretty(&example)?)?;
    Ok(())
}
