use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde_json::to_writer_pretty;
use serveflow::config::FlowConfig;
use serveflow::lockfile::write_run_lock;
use serveflow::ml::TextClassifier;
use serveflow::observability::{MetricsCollector, init_tracing, log_snapshot, shutdown_tracing};
use serveflow::pipeline::build_workflow;
use serveflow::validation::validate_config;
use serveflow::workflows::{default_registry, hello};
use tracing::{error, info, warn};

fn main() -> Result<()> {
    let Cli { command } = Cli::parse();

    let otlp_endpoint = command.as_ref().and_then(|command| match command {
        Commands::Run { otlp_endpoint, .. } => otlp_endpoint.clone(),
        _ => None,
    });
    init_tracing(otlp_endpoint.as_deref())?;

    let command_result = match command {
        Some(Commands::Run {
            workflow,
            config,
            name,
            work_dir,
            data_home,
            print_metrics,
            metrics_json,
            metrics_prometheus,
            lock,
            otlp_endpoint: _,
        }) => {
            let overrides = Overrides {
                name,
                work_dir,
                data_home,
            };
            let outputs = RunOutputs {
                print_metrics,
                metrics_json,
                metrics_prometheus,
                lock,
            };
            run_command(&workflow, config.as_deref(), overrides, outputs)
        }
        Some(Commands::List) => {
            list_workflows();
            Ok(())
        }
        Some(Commands::Describe { workflow, config }) => {
            describe_workflow(&workflow, config.as_deref())
        }
        Some(Commands::Validate { config }) => validate_config_cmd(&config),
        Some(Commands::Config { action }) => config_command(action),
        Some(Commands::Predict {
            model,
            vectorizer,
            json,
            texts,
        }) => predict_command(&model, &vectorizer, &texts, json),
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "serveflow", &mut io::stdout());
            Ok(())
        }
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    };

    shutdown_tracing();
    command_result
}

struct Overrides {
    name: Option<String>,
    work_dir: Option<PathBuf>,
    data_home: Option<PathBuf>,
}

struct RunOutputs {
    print_metrics: bool,
    metrics_json: Option<PathBuf>,
    metrics_prometheus: Option<PathBuf>,
    lock: Option<PathBuf>,
}

fn run_command(
    workflow: &str,
    config_path: Option<&Path>,
    overrides: Overrides,
    outputs: RunOutputs,
) -> Result<()> {
    let mut config = FlowConfig::resolve(config_path)?;
    if let Some(name) = overrides.name {
        if workflow != hello::NAME {
            warn!(
                workflow,
                name = name.as_str(),
                "--name only applies to {}, ignored",
                hello::NAME
            );
        }
        config.hello.name = name;
    }
    if let Some(work_dir) = overrides.work_dir {
        config.work_dir = work_dir;
    }
    if let Some(data_home) = overrides.data_home {
        config.training.data_home = data_home;
    }

    let registry = default_registry();
    let executor = build_workflow(&registry, workflow, &config)?
        .with_metrics(MetricsCollector::global().clone());
    let metrics_handle = executor.metrics();

    let outcome = executor.execute();
    let snapshot = metrics_handle.snapshot();
    if outputs.print_metrics {
        log_snapshot(&snapshot);
    }
    if let Some(path) = &outputs.metrics_json {
        ensure_parent(path)?;
        let file = File::create(path)
            .with_context(|| format!("Failed to create metrics file: {}", path.display()))?;
        to_writer_pretty(file, &snapshot)
            .with_context(|| format!("Failed to write metrics JSON: {}", path.display()))?;
        info!(metrics = %path.display(), "Metrics JSON written");
    }
    if let Some(path) = &outputs.metrics_prometheus {
        ensure_parent(path)?;
        std::fs::write(path, snapshot.to_prometheus())
            .with_context(|| format!("Failed to write Prometheus metrics: {}", path.display()))?;
        info!(metrics = %path.display(), "Prometheus metrics written");
    }

    let result = outcome?;
    if let Some(path) = &outputs.lock {
        write_run_lock(&result, &config, path)?;
        info!(lockfile = %path.display(), "Run lock written");
    }

    println!("{}", result.output);
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

fn list_workflows() {
    let registry = default_registry();
    println!("Available workflows:");
    for name in registry.known_workflows() {
        println!("- {name}");
    }
}

fn describe_workflow(name: &str, config_path: Option<&Path>) -> Result<()> {
    let config = FlowConfig::resolve(config_path)?;
    let registry = default_registry();
    let workflow = registry.create(name, &config)?;

    println!("{}: {}", workflow.name(), workflow.description());
    for (idx, step) in workflow.steps().iter().enumerate() {
        match &step.resources {
            Some(resources) => println!(
                "{}. {} (cpu: {}, memory: {})",
                idx + 1,
                step.name,
                resources.cpu,
                resources.memory
            ),
            None => println!("{}. {}", idx + 1, step.name),
        }
    }
    Ok(())
}

fn validate_config_cmd(config_path: &Path) -> Result<()> {
    let config = FlowConfig::resolve(Some(config_path))?;
    let registry = default_registry();
    let report = validate_config(&config, &registry);

    for warning in &report.warnings {
        warn!(file = %config_path.display(), "{warning}");
    }

    if report.is_ok() {
        info!(file = %config_path.display(), "Config validation passed");
        Ok(())
    } else {
        for error_msg in &report.errors {
            error!(file = %config_path.display(), "{error_msg}");
        }
        Err(anyhow!(
            "Config validation failed with {} error(s)",
            report.errors.len()
        ))
    }
}

fn config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Init { output, force } => {
            if output.exists() && !force {
                bail!(
                    "{} already exists; pass --force to overwrite",
                    output.display()
                );
            }
            let written = FlowConfig::default().write(&output)?;
            info!(path = %written.display(), "Default config written");
            Ok(())
        }
        ConfigCommands::Show { config } => {
            let config = FlowConfig::resolve(config.as_deref())?;
            print!("{}", config.to_yaml()?);
            Ok(())
        }
    }
}

fn predict_command(model: &Path, vectorizer: &Path, texts: &[String], json: bool) -> Result<()> {
    let classifier = TextClassifier::load(model, vectorizer)?;
    let predictions = classifier
        .predict(texts)
        .context("Failed to classify input text")?;

    if json {
        to_writer_pretty(io::stdout(), &predictions).context("Failed to write predictions")?;
        println!();
    } else {
        for prediction in &predictions {
            println!("{}\t{:.4}", prediction.label, prediction.probability);
        }
    }
    Ok(())
}

#[derive(Parser)]
#[command(
    name = "serveflow",
    version,
    about = "Hello-world and text-classifier train/deploy workflows"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow and print its result
    Run {
        workflow: String,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Name greeted by the hello-world workflow
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "work-dir")]
        work_dir: Option<PathBuf>,
        #[arg(long = "data-home")]
        data_home: Option<PathBuf>,
        #[arg(long)]
        print_metrics: bool,
        #[arg(long = "metrics-json")]
        metrics_json: Option<PathBuf>,
        #[arg(long = "metrics-prometheus")]
        metrics_prometheus: Option<PathBuf>,
        /// Write a run lock with artifact digests
        #[arg(long)]
        lock: Option<PathBuf>,
        #[arg(long = "otlp-endpoint")]
        otlp_endpoint: Option<String>,
    },
    /// List registered workflows
    List,
    /// Show the ordered steps of a workflow
    Describe {
        workflow: String,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    Validate {
        config: PathBuf,
    },
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
    /// Classify text with trained artifacts
    Predict {
        #[arg(long)]
        model: PathBuf,
        #[arg(long)]
        vectorizer: PathBuf,
        #[arg(long)]
        json: bool,
        #[arg(required = true)]
        texts: Vec<String>,
    },
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write the default configuration
    Init {
        #[arg(long, default_value = "serveflow.yaml")]
        output: PathBuf,
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}
