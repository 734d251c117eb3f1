use std::fs;
use std::io::Read as _;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use stageflow_core::{ExecutionPlan, WorkSubmission};
use stageflow_engine::{EngineConfig, EngineResponse, LocalTaskSource, WorkflowEngine};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "stageflow")]
#[command(about = "Phase-gated workflow engine for development tasks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Workspace root (defaults to the current directory).
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Print the full engine response as JSON instead of text.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the .stageflow directory in the workspace.
    Init {
        /// Enable the optional scaffolding phase.
        #[arg(long)]
        scaffolding: bool,
    },
    /// Begin a task, or resume it where it left off.
    Begin { task_id: String },
    /// Submit work for the active sub-state and move it into review.
    Submit {
        task_id: String,
        /// File with the artifact content, or `-` for stdin.
        #[arg(short, long, default_value = "-")]
        file: String,
        /// JSON file with the structured execution plan (execution-plan stage only).
        #[arg(long)]
        plan: Option<PathBuf>,
    },
    /// Record a review approval.
    Approve { task_id: String },
    /// Record a review rejection with feedback for the reworker.
    Reject {
        task_id: String,
        #[arg(short, long)]
        feedback: Option<String>,
    },
    /// Archive the completed phase and advance into the next one.
    Advance { task_id: String },
    /// Mark an execution step complete during the coding phase.
    Step { task_id: String, step_id: String },
    /// Show a task's workflow position and valid triggers.
    Status { task_id: String },
    /// List open tasks from the task source.
    Tasks,
    /// Write a state directly, bypassing transition validation.
    Force { task_id: String, state: String },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stageflow=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let root = match &cli.root {
        Some(root) => root.clone(),
        None => std::env::current_dir()?,
    };

    if let Commands::Init { scaffolding } = &cli.command {
        return init_workspace(&root, *scaffolding);
    }

    let config = EngineConfig::read(&root);
    let source = LocalTaskSource::new(&config);
    let engine = WorkflowEngine::new(config, Box::new(source));

    match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),
        Commands::Begin { task_id } => {
            let response = engine.begin_or_resume(&task_id)?;
            print_response(&response, cli.json)
        }
        Commands::Submit {
            task_id,
            file,
            plan,
        } => {
            let content = read_content(&file)?;
            let submission = match plan {
                Some(path) => {
                    let raw = fs::read_to_string(&path)
                        .with_context(|| format!("failed to read plan file {}", path.display()))?;
                    let plan: ExecutionPlan = serde_json::from_str(&raw)
                        .with_context(|| format!("invalid plan file {}", path.display()))?;
                    WorkSubmission::with_plan(content, plan)
                }
                None => WorkSubmission::text(content),
            };
            let response = engine.submit_work(&task_id, &submission)?;
            print_response(&response, cli.json)
        }
        Commands::Approve { task_id } => {
            let response = engine.review_decision(&task_id, true, None)?;
            print_response(&response, cli.json)
        }
        Commands::Reject { task_id, feedback } => {
            let response = engine.review_decision(&task_id, false, feedback)?;
            print_response(&response, cli.json)
        }
        Commands::Advance { task_id } => {
            let response = engine.advance_phase(&task_id)?;
            print_response(&response, cli.json)
        }
        Commands::Step { task_id, step_id } => {
            let response = engine.complete_step(&task_id, &step_id)?;
            print_response(&response, cli.json)
        }
        Commands::Status { task_id } => {
            let inspection = engine.inspect_state(&task_id)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&inspection)?);
            } else {
                println!("Task:     {}", inspection.task.task_id);
                println!("State:    {}", inspection.task.current_state);
                println!("Active:   {}", inspection.task.is_active);
                println!("Triggers: {}", inspection.valid_triggers.join(", "));
                if !inspection.task.completed_steps.is_empty() {
                    println!("Steps:    {}", inspection.task.completed_steps.join(", "));
                }
            }
            Ok(())
        }
        Commands::Tasks => {
            let tasks = engine.open_tasks()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else if tasks.is_empty() {
                println!("No open tasks.");
            } else {
                for task in tasks {
                    println!("{}  {}", task.id, task.summary);
                }
            }
            Ok(())
        }
        Commands::Force { task_id, state } => {
            let inspection = engine.force_transition(&task_id, &state)?;
            println!(
                "{} is now at {}",
                inspection.task.task_id, inspection.task.current_state
            );
            Ok(())
        }
    }
}

fn init_workspace(root: &PathBuf, scaffolding: bool) -> Result<()> {
    let mut config = EngineConfig::new(root);
    if config.stageflow_dir().join("config.json").exists() {
        println!(
            "Workspace already initialized at {}",
            config.stageflow_dir().display()
        );
        return Ok(());
    }

    config.scaffolding_enabled = scaffolding;
    config.write()?;
    fs::create_dir_all(config.templates_path())?;
    if !config.tasks_path().exists() {
        fs::write(config.tasks_path(), "[]\n")?;
    }

    println!("Initialized stageflow in {}", root.display());
    println!();
    println!("Created:");
    println!("  .stageflow/");
    println!("  ├── config.json");
    println!("  ├── tasks.json");
    println!("  └── templates/");
    println!();
    println!("Next steps:");
    println!("  1. Add tasks to .stageflow/tasks.json");
    println!("  2. Run 'stageflow begin <task-id>'");
    Ok(())
}

fn read_content(file: &str) -> Result<String> {
    if file == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read content from stdin")?;
        if buf.trim().is_empty() {
            bail!("no content on stdin; pass --file or pipe the artifact in");
        }
        Ok(buf)
    } else {
        fs::read_to_string(file).with_context(|| format!("failed to read content file {file}"))
    }
}

fn print_response(response: &EngineResponse, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }
    println!("State:    {}", response.state);
    println!("Triggers: {}", response.valid_triggers.join(", "));
    println!();
    println!("{}", response.prompt);
    Ok(())
}
