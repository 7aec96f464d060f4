//! automl-selector - Main Entry Point

use automl_selector::cli::{cmd_describe, cmd_select, cmd_train_meta, Cli, Commands};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "automl_selector=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Select {
            data,
            target,
            problem,
            time_limit,
            trade_rate,
            meta_models,
            config,
            log,
            task,
            seed,
        } => {
            cmd_select(
                &data,
                &target,
                problem,
                time_limit,
                trade_rate,
                meta_models.as_deref(),
                config.as_deref(),
                log.as_deref(),
                &task,
                seed,
            )?;
        }
        Commands::Describe {
            data,
            target,
            problem,
            seed,
        } => {
            cmd_describe(&data, &target, problem, seed)?;
        }
        Commands::TrainMeta { log, problem, out, seed } => {
            cmd_train_meta(&log, problem, &out, seed)?;
        }
    }

    Ok(())
}
