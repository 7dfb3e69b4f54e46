//! flowmgr command line.
//!
//! Thin shell over `flowmgr_core`: builds an execution manager for the
//! selected deployment and renders every result in process mode.

mod config;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use config::{Config, Deployment};
use flowmgr_core::mapper::{self, ProcessRenderer};
use flowmgr_core::payload::PayloadValidator;
use flowmgr_core::{
    CancellationToken, ExecutionHandle, ExecutionManager, ManagerConfig, RunRequest,
    SubprocessInvoker,
};
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "flowmgr")]
#[command(version, about = "Run and track workflow executions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Deployment profile to use (defaults to the current one)
    #[arg(long, global = true)]
    deployment: Option<String>,

    /// Workflow engine URL (overrides the deployment)
    #[arg(long, global = true)]
    engine_url: Option<String>,

    /// State store URL (overrides the deployment)
    #[arg(long, global = true)]
    state_url: Option<String>,

    /// Function service URL (overrides the deployment)
    #[arg(long, global = true)]
    functions_url: Option<String>,

    /// More log output on stderr (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a workflow and wait for its outcome
    /// Examples:
    ///     flowmgr run ingest --payload item.json --run-id item-42
    ///     cat item.json | flowmgr run ingest --payload - --timeout 600 --out result.json
    ///     flowmgr run ingest --payload item.json --run-id item-42 --force
    #[command(verbatim_doc_comment)]
    Run {
        /// Workflow name
        workflow: String,

        /// Payload file, or '-' for stdin
        #[arg(short, long)]
        payload: Option<String>,

        /// Logical run id the execution is recorded under
        #[arg(long)]
        run_id: Option<String>,

        /// Record under a fresh run id derived from --run-id
        #[arg(long, requires = "run_id")]
        force: bool,

        /// Seconds to wait before giving up
        #[arg(long)]
        timeout: Option<u64>,

        /// Seconds between status checks
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,

        /// Also write the result to this file
        #[arg(long)]
        out: Option<PathBuf>,

        /// Compact output
        #[arg(long)]
        raw: bool,
    },
    /// Wait again for a timed-out or cancelled execution
    /// Examples:
    ///     flowmgr resume --run-id item-42
    ///     flowmgr resume --execution-id exec-b --workflow ingest --timeout 60
    #[command(verbatim_doc_comment)]
    Resume {
        #[command(flatten)]
        target: ExecutionTarget,

        /// Seconds to wait before giving up
        #[arg(long)]
        timeout: Option<u64>,

        /// Also write the result to this file
        #[arg(long)]
        out: Option<PathBuf>,

        /// Compact output
        #[arg(long)]
        raw: bool,
    },
    /// Invoke a remote function synchronously
    /// Example:
    ///     flowmgr invoke enrich --payload item.json
    #[command(verbatim_doc_comment)]
    Invoke {
        /// Function name
        function: String,

        /// Payload file, or '-' for stdin
        #[arg(short, long)]
        payload: Option<String>,

        /// Compact output
        #[arg(long)]
        raw: bool,
    },
    /// Run a command with the deployment environment
    /// Examples:
    ///     flowmgr call ./scripts/backfill.sh 2024-01-01
    ///     flowmgr --deployment prod call --isolated env
    #[command(verbatim_doc_comment)]
    Call {
        /// Start the command with only the deployment environment
        #[arg(long)]
        isolated: bool,

        /// Command to run
        command: String,

        /// Command arguments
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Show an execution, or the latest execution of a run
    /// Examples:
    ///     flowmgr get-execution --run-id item-42
    ///     flowmgr get-execution --run-id item-42 --field output
    #[command(verbatim_doc_comment)]
    GetExecution {
        #[command(flatten)]
        target: ExecutionTarget,

        /// Part of the execution to print
        #[arg(long, value_enum, default_value_t = Field::All)]
        field: Field,

        /// Compact output
        #[arg(long)]
        raw: bool,
    },
    /// Show the stored record of a run
    GetState {
        /// Logical run id
        run_id: String,

        /// Compact output
        #[arg(long)]
        raw: bool,
    },
    /// Deployment profile management
    Deployments {
        #[command(subcommand)]
        command: DeploymentCommand,
    },
}

/// Either a run id or an explicit execution.
#[derive(Args)]
struct ExecutionTarget {
    /// Logical run id (uses its latest execution)
    #[arg(long, conflicts_with = "execution_id", required_unless_present = "execution_id")]
    run_id: Option<String>,

    /// Execution id
    #[arg(long, requires = "workflow")]
    execution_id: Option<String>,

    /// Workflow the execution belongs to
    #[arg(long, requires = "execution_id")]
    workflow: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Field {
    All,
    Input,
    Output,
}

#[derive(Subcommand)]
enum DeploymentCommand {
    /// List deployments
    List,
    /// Show a deployment (defaults to the current one)
    Show {
        name: Option<String>,
    },
    /// Add or replace a deployment, taking its URLs from the global flags
    /// Example:
    ///     flowmgr deployments add prod --engine-url https://engine.example.com --env DATA_BUCKET=prod-data --set-current
    #[command(verbatim_doc_comment)]
    Add {
        name: String,

        /// Environment variable for `call`, KEY=VALUE (repeatable)
        #[arg(long = "env", value_parser = parse_key_val)]
        env: Vec<(String, String)>,

        /// Set as current deployment
        #[arg(long)]
        set_current: bool,
    },
    /// Remove a deployment
    Rm {
        name: String,
    },
    /// Switch to a different deployment
    Use {
        name: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbose);
    dotenvy::dotenv().ok();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("ConfigError: {:#}", e);
            mapper::EXIT_INFRA
        }
    };

    std::process::exit(code);
}

fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn,flowmgr_core=info,flowmgr=info",
        1 => "info,flowmgr_core=debug,flowmgr=debug",
        _ => "debug",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    let mut deployments = Config::load()?;

    let command = match cli.command {
        Commands::Deployments { command } => {
            let urls = Deployment {
                engine_url: cli.engine_url,
                state_url: cli.state_url,
                functions_url: cli.functions_url,
                environment: Default::default(),
            };
            handle_deployment_command(&mut deployments, command, urls)?;
            return Ok(mapper::EXIT_SUCCESS);
        }
        command => command,
    };

    let deployment = deployments
        .select(cli.deployment.as_deref())?
        .map(|(name, deployment)| {
            tracing::debug!(deployment = %name, "Using deployment");
            deployment.clone()
        })
        .unwrap_or_default();

    let mut config = ManagerConfig::from_env()?;
    deployment.apply(&mut config);
    if let Some(url) = cli.engine_url {
        config.engine_url = url;
    }
    if let Some(url) = cli.state_url {
        config.state_url = url;
    }
    if let Some(url) = cli.functions_url {
        config.functions_url = url;
    }

    let manager = ExecutionManager::from_config(&config);
    let cancel = cancel_on_ctrl_c();

    let code = match command {
        Commands::Run {
            workflow,
            payload,
            run_id,
            force,
            timeout,
            interval,
            out,
            raw,
        } => {
            let mut renderer = ProcessRenderer::stdio().raw(raw).out_path(out);
            let input = match read_payload(payload.as_deref()) {
                Ok(input) => input,
                Err(e) => return Ok(renderer.render(Err(e))),
            };

            let mut request = RunRequest::new(workflow, input);
            if let Some(run_id) = run_id {
                request = request.with_run_id(run_id);
            }
            if force {
                request = request.forced();
            }
            if let Some(secs) = timeout {
                request = request.with_timeout(Duration::from_secs(secs));
            }
            if let Some(secs) = interval {
                request = request.with_interval(Duration::from_secs(secs));
            }

            renderer.render(manager.run_workflow(&request, &cancel).await)
        }
        Commands::Resume {
            target,
            timeout,
            out,
            raw,
        } => {
            let timeout = timeout.map(Duration::from_secs);
            let result = match target.execution()? {
                Some(handle) => manager.poll_execution(&handle, timeout, &cancel).await,
                None => manager.resume(&target.run_id()?, timeout, &cancel).await,
            };
            ProcessRenderer::stdio().raw(raw).out_path(out).render(result)
        }
        Commands::Invoke {
            function,
            payload,
            raw,
        } => {
            let mut renderer = ProcessRenderer::stdio().raw(raw);
            match read_payload(payload.as_deref()) {
                Ok(input) => renderer.render(manager.invoke_function(&function, &input).await),
                Err(e) => renderer.render(Err(e)),
            }
        }
        Commands::Call {
            isolated,
            command,
            args,
        } => {
            let subprocess = SubprocessInvoker::new()
                .with_env(deployment.environment.clone())
                .isolated(isolated);
            let result = manager
                .with_subprocess(subprocess)
                .call(&command, &args, &cancel)
                .await;
            ProcessRenderer::stdio().raw(true).render(result)
        }
        Commands::GetExecution { target, field, raw } => {
            let described = match target.execution()? {
                Some(handle) => manager.describe_execution(&handle).await,
                None => manager.describe_latest(&target.run_id()?).await,
            };
            let mut renderer = ProcessRenderer::stdio().raw(raw);
            match described {
                Ok(description) => match field {
                    Field::All => renderer.render_document(&description),
                    Field::Input => renderer.render_document(&description.input),
                    Field::Output => renderer.render_document(&description.output),
                },
                Err(e) => renderer.render(Err(e)),
            }
        }
        Commands::GetState { run_id, raw } => {
            let mut renderer = ProcessRenderer::stdio().raw(raw);
            match manager.get_record(&run_id).await {
                Ok(record) => renderer.render_document(&record),
                Err(e) => renderer.render(Err(e)),
            }
        }
        Commands::Deployments { .. } => unreachable!("deployment commands return early"),
    };

    Ok(code)
}

impl ExecutionTarget {
    fn execution(&self) -> Result<Option<ExecutionHandle>> {
        match (&self.execution_id, &self.workflow) {
            (Some(id), Some(workflow)) => Ok(Some(ExecutionHandle::new(id, workflow))),
            (None, None) => Ok(None),
            _ => bail!("--execution-id and --workflow must be given together"),
        }
    }

    fn run_id(&self) -> Result<String> {
        match &self.run_id {
            Some(run_id) => Ok(run_id.clone()),
            None => bail!("either --run-id or --execution-id is required"),
        }
    }
}

/// Cancel the returned token on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling");
            trigger.cancel();
        }
    });
    cancel
}

/// Read a payload from a file, stdin ('-'), or default to an empty object.
fn read_payload(source: Option<&str>) -> flowmgr_core::Result<serde_json::Value> {
    let raw = match source {
        None => return Ok(serde_json::json!({})),
        Some("-") => {
            let mut raw = String::new();
            std::io::stdin().read_to_string(&mut raw)?;
            raw
        }
        Some(path) => std::fs::read_to_string(path)?,
    };

    PayloadValidator::parse(&raw)
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))
}

fn handle_deployment_command(
    config: &mut Config,
    command: DeploymentCommand,
    urls: Deployment,
) -> Result<()> {
    match command {
        DeploymentCommand::Add {
            name,
            env,
            set_current,
        } => {
            let deployment = Deployment {
                environment: env.into_iter().collect(),
                ..urls
            };
            config.deployments.insert(name.clone(), deployment);
            if set_current || config.current_deployment.is_none() {
                config.current_deployment = Some(name.clone());
            }
            config.save()?;
            println!("Deployment '{}' added.", name);
            if config.current_deployment.as_ref() == Some(&name) {
                println!("Deployment '{}' is now the current deployment.", name);
            }
        }
        DeploymentCommand::List => {
            println!("  {:<20} {:<40}", "NAME", "ENGINE URL");
            let mut names: Vec<&String> = config.deployments.keys().collect();
            names.sort();
            for name in names {
                let current_mark = if config.current_deployment.as_ref() == Some(name) {
                    "*"
                } else {
                    " "
                };
                let engine = config.deployments[name]
                    .engine_url
                    .as_deref()
                    .unwrap_or("-");
                println!("{} {:<20} {:<40}", current_mark, name, engine);
            }
        }
        DeploymentCommand::Show { name } => match config.select(name.as_deref())? {
            Some((name, deployment)) => {
                println!("{}", name);
                print!("{}", serde_yaml::to_string(deployment)?);
            }
            None => println!("No current deployment set."),
        },
        DeploymentCommand::Rm { name } => {
            if config.deployments.remove(&name).is_none() {
                bail!("Deployment '{}' not found", name);
            }
            if config.current_deployment.as_ref() == Some(&name) {
                config.current_deployment = None;
            }
            config.save()?;
            println!("Deployment '{}' removed.", name);
        }
        DeploymentCommand::Use { name } => {
            if !config.deployments.contains_key(&name) {
                bail!("Deployment '{}' not found", name);
            }
            config.current_deployment = Some(name.clone());
            config.save()?;
            println!("Switched to deployment '{}'.", name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "flowmgr", "run", "ingest", "--run-id", "item-42", "--force", "--timeout", "60",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                workflow,
                run_id,
                force,
                timeout,
                ..
            } => {
                assert_eq!(workflow, "ingest");
                assert_eq!(run_id.as_deref(), Some("item-42"));
                assert!(force);
                assert_eq!(timeout, Some(60));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_run_rejects_zero_interval() {
        assert!(Cli::try_parse_from(["flowmgr", "run", "ingest", "--interval", "0"]).is_err());

        let cli = Cli::try_parse_from(["flowmgr", "run", "ingest", "--interval", "2"]).unwrap();
        match cli.command {
            Commands::Run { interval, .. } => assert_eq!(interval, Some(2)),
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_call_passes_flags_through() {
        let cli = Cli::try_parse_from(["flowmgr", "call", "--isolated", "ls", "-la", "/tmp"]).unwrap();
        match cli.command {
            Commands::Call {
                isolated,
                command,
                args,
            } => {
                assert!(isolated);
                assert_eq!(command, "ls");
                assert_eq!(args, vec!["-la", "/tmp"]);
            }
            _ => panic!("expected call"),
        }
    }

    #[test]
    fn test_execution_target_requires_pair() {
        assert!(Cli::try_parse_from(["flowmgr", "resume", "--execution-id", "e1"]).is_err());
        assert!(Cli::try_parse_from(["flowmgr", "resume"]).is_err());

        let cli = Cli::try_parse_from([
            "flowmgr",
            "get-execution",
            "--execution-id",
            "e1",
            "--workflow",
            "ingest",
        ])
        .unwrap();
        match cli.command {
            Commands::GetExecution { target, .. } => {
                assert_eq!(
                    target.execution().unwrap(),
                    Some(ExecutionHandle::new("e1", "ingest"))
                );
            }
            _ => panic!("expected get-execution"),
        }
    }

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("A=b=c").unwrap(),
            ("A".to_string(), "b=c".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
    }

    #[test]
    fn test_read_payload() {
        assert_eq!(read_payload(None).unwrap(), serde_json::json!({}));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.json");
        std::fs::write(&path, "{\"id\": \"item-42\"}").unwrap();
        assert_eq!(
            read_payload(path.to_str()).unwrap(),
            serde_json::json!({"id": "item-42"})
        );

        std::fs::write(&path, "{oops").unwrap();
        assert!(matches!(
            read_payload(path.to_str()),
            Err(flowmgr_core::Error::InvalidPayload(_))
        ));
    }
}
