//! CLI route: single route table and run context. Wires input, the batch
//! executor and the console host together on a current-thread runtime.

use crate::batch::{BatchExecutor, BatchSettings, BatchStats, CancellationSignal};
use crate::cli::help::command_name;
use crate::cli::host::{ConsoleHost, PromptMode};
use crate::cli::input::{open_inputs, OperationTemplate};
use crate::cli::parse::{BatchArgs, Commands};
use crate::cli::presentation::{format_config_toml, format_stats_table};
use crate::config::{BulkopConfig, ConfigLoader};
use crate::error::ApiError;
use crate::operation::OperationHost;
use crate::rpc::{HttpOrganizationService, OrganizationService, PassThrough};
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Runtime context for CLI execution: the effective configuration and console options.
pub struct RunContext {
    config: BulkopConfig,
    verbose: bool,
}

impl RunContext {
    /// Load configuration for the workspace (or from an explicit file) and validate it.
    pub fn new(
        workspace_root: PathBuf,
        config_path: Option<PathBuf>,
        endpoint: Option<String>,
        verbose: bool,
    ) -> Result<Self, ApiError> {
        let mut config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        if endpoint.is_some() {
            config.connection.endpoint = endpoint;
        }
        config.validate().map_err(|errors| {
            ApiError::ConfigError(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;
        Ok(Self { config, verbose })
    }

    pub fn config(&self) -> &BulkopConfig {
        &self.config
    }

    /// Execute a CLI command via the single route table. The returned text goes to stdout.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        info!(command = command_name(command), "Executing command");
        match command {
            Commands::Config => {
                let rendered = format_config_toml(&self.config)?;
                Ok(match ConfigLoader::xdg_config_path() {
                    Some(path) => format!("# global config: {}\n{}", path.display(), rendered),
                    None => rendered,
                })
            }
            _ => {
                let (Some(template), Some(args)) =
                    (OperationTemplate::from_command(command), command.batch_args())
                else {
                    return Err(ApiError::InvalidInput(format!(
                        "{} is not an operation command",
                        command_name(command)
                    )));
                };
                self.run_operations(&template, args)
            }
        }
    }

    /// Engine settings: `[batch]` config overridden by command-line flags.
    pub fn batch_settings(&self, args: &BatchArgs) -> Result<BatchSettings, ApiError> {
        let mut batch = self.config.batch.clone();
        if let Some(batch_size) = args.batch_size {
            batch.batch_size = batch_size;
        }
        if let Some(retries) = args.retries {
            batch.retries = retries;
        }
        if let Some(delay) = args.initial_retry_delay {
            batch.initial_retry_delay_secs = delay;
        }
        let settings = batch.to_settings(PassThrough {
            bypass_business_logic_execution: args.bypass_business_logic_execution.clone(),
            bypass_step_ids: args.bypass_step_ids.clone(),
        });
        settings.validate()?;
        Ok(settings)
    }

    fn service(&self) -> Result<Arc<dyn OrganizationService>, ApiError> {
        let connection = &self.config.connection;
        let endpoint = connection.endpoint.clone().ok_or_else(|| {
            ApiError::ConfigError(
                "No endpoint configured (set connection.endpoint or pass --endpoint)".to_string(),
            )
        })?;
        let service = HttpOrganizationService::new(
            endpoint,
            connection.access_token(),
            connection.timeout(),
        )?;
        Ok(Arc::new(service))
    }

    fn run_operations(
        &self,
        template: &OperationTemplate,
        args: &BatchArgs,
    ) -> Result<String, ApiError> {
        let settings = self.batch_settings(args)?;
        let service = self.service()?;
        let inputs = open_inputs(args.input.as_deref())?;

        let prompt = if args.what_if {
            PromptMode::WhatIf
        } else if args.confirm {
            PromptMode::Confirm
        } else {
            PromptMode::Auto
        };
        let color = self.config.logging.color && std::io::stderr().is_terminal();
        let host = Arc::new(ConsoleHost::new(prompt, self.verbose, color));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (stats, invalid, result) = runtime.block_on(async {
            let cancel = CancellationSignal::new();
            let interrupt = {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!("Interrupt received; cancelling");
                        cancel.cancel();
                    }
                })
            };

            let sink: Arc<dyn OperationHost> = host.clone();
            let outcome = match BatchExecutor::new(service, sink, settings, cancel) {
                Ok(mut executor) => {
                    let (invalid, result) =
                        queue_all(&mut executor, template, inputs, color).await;
                    (executor.stats().clone(), invalid, result)
                }
                Err(e) => (BatchStats::default(), 0, Err(e)),
            };
            interrupt.abort();
            outcome
        });

        eprintln!("{}", format_stats_table(&stats));
        if invalid > 0 {
            warn!(invalid, "Input items rejected");
        }
        info!(
            settled = stats.settled(),
            outputs = host.outputs_written(),
            errors = host.errors_written(),
            "Run finished"
        );
        result.map(|()| String::new())
    }
}

/// Queue input items as they are read, then flush and drain retries. Returns
/// the number of rejected input items alongside the engine result.
async fn queue_all<I>(
    executor: &mut BatchExecutor,
    template: &OperationTemplate,
    inputs: I,
    color: bool,
) -> (usize, Result<(), ApiError>)
where
    I: IntoIterator<Item = Result<serde_json::Value, ApiError>>,
{
    let mut invalid = 0;
    let mut read_error = None;
    for (n, item) in inputs.into_iter().enumerate() {
        let built = match item {
            Ok(item) => template.build(&item).map(|kind| (item, kind)),
            Err(e @ ApiError::InvalidInput(_)) => Err(e),
            Err(e) => {
                read_error = Some(e);
                break;
            }
        };
        match built {
            Ok((item, kind)) => {
                let context = executor.operation(item, kind);
                if let Err(e) = executor.queue_operation(context).await {
                    return (invalid, Err(e));
                }
            }
            Err(e) => {
                invalid += 1;
                if color {
                    eprintln!("{} item {}: {}", "error:".red().bold(), n + 1, e);
                } else {
                    eprintln!("error: item {}: {}", n + 1, e);
                }
            }
        }
    }
    let finished = executor.finish().await.map(|_| ());
    match read_error {
        Some(e) => (invalid, finished.and(Err(e))),
        None => (invalid, finished),
    }
}
