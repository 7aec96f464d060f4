//! Command-line interface: model selection, meta-feature inspection and
//! meta-model training

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::autopipeline::AutoSelect;
use crate::config::{ProblemClass, SelectorConfig};
use crate::meta_features::MetaFeatureExtractor;
use crate::preprocessing::{Preprocessing, StandardPreprocessing};
use crate::selection::{train_meta_models, Catalog, MetaRegressor};
use crate::tracking::{RunLog, RunLogSchema};
use crate::utils::DataLoader;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString {
    s.truecolor(100, 100, 100)
}

fn accent(s: &str) -> ColoredString {
    s.truecolor(120, 170, 255)
}

fn muted(s: &str) -> ColoredString {
    s.truecolor(140, 140, 140)
}

fn ok(s: &str) -> ColoredString {
    s.truecolor(100, 210, 120)
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e12 {
        format!("{}", value)
    } else {
        format!("{:.6}", value)
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "automl-selector")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Meta-learning model selection under a time budget")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate the candidate catalog on a dataset and fit the best model
    Select {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// Problem class (classification, regression)
        #[arg(short, long)]
        problem: ProblemClass,

        /// Evaluation budget in seconds (0 = evaluate every candidate)
        #[arg(long, default_value = "0")]
        time_limit: f64,

        /// Accuracy fraction traded for a 10x speed-up
        #[arg(long, default_value = "0.05")]
        trade_rate: f64,

        /// Base directory of the meta-model store
        #[arg(long)]
        meta_models: Option<PathBuf>,

        /// JSON config file; command-line flags are ignored when given
        #[arg(long)]
        config: Option<PathBuf>,

        /// Run log to append this run to
        #[arg(long)]
        log: Option<PathBuf>,

        /// Task label written to the run log
        #[arg(long, default_value = "task")]
        task: String,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the meta-features of a dataset
    Describe {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// Problem class (classification, regression)
        #[arg(short, long)]
        problem: ProblemClass,

        /// Random seed for the landmark sample
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Train meta-model artifacts from a run log
    TrainMeta {
        /// Run log CSV
        #[arg(short, long)]
        log: PathBuf,

        /// Problem class (classification, regression)
        #[arg(short, long)]
        problem: ProblemClass,

        /// Base output directory
        #[arg(short, long)]
        out: PathBuf,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
pub fn cmd_select(
    data_path: &Path,
    target: &str,
    problem: ProblemClass,
    time_limit: f64,
    trade_rate: f64,
    meta_models: Option<&Path>,
    config_path: Option<&Path>,
    log: Option<&Path>,
    task: &str,
    seed: Option<u64>,
) -> anyhow::Result<()> {
    section("Select");

    let config = match config_path {
        Some(path) => SelectorConfig::from_json_file(path)?,
        None => {
            let mut config = SelectorConfig::new(problem)
                .with_time_limit_secs(time_limit)
                .with_trade_rate(trade_rate);
            config.meta_model_dir = meta_models.map(Path::to_path_buf);
            config.random_state = seed;
            config.validate()?;
            config
        }
    };

    step_run("Loading data");
    let start = Instant::now();
    let dataset = DataLoader::new().load_csv(data_path, target)?;
    step_done(&format!(
        "{} rows × {} cols in {:?}",
        dataset.n_rows(),
        dataset.n_features(),
        start.elapsed()
    ));

    step_run("Selecting model");
    let start = Instant::now();
    let mut auto = AutoSelect::new(config)?;
    auto.fit(&dataset)?;
    step_done(&format!("{:?}", start.elapsed()));

    let mut ranking: Vec<_> = auto.relative_landmarks().iter().collect();
    ranking.sort_by(|a, b| b.rank.partial_cmp(&a.rank).unwrap_or(std::cmp::Ordering::Equal));

    println!();
    println!(
        "  {:<30} {:>10} {:>10} {:>10}",
        muted("Model"),
        muted("Score"),
        muted("Time"),
        muted("Rank")
    );
    println!("  {}", dim(&"─".repeat(64)));
    for rl in &ranking {
        println!(
            "  {:<30} {:>10.4} {:>9.3}s {:>10.4}",
            rl.candidate.id(),
            rl.normalized_score,
            rl.seconds,
            rl.rank
        );
    }
    println!("  {}", dim(&"─".repeat(64)));

    let evaluated = ranking.len();
    let total = auto.evaluator().catalog().len();
    if evaluated < total {
        println!("  {}", muted(&format!("{} of {} candidates evaluated within the budget", evaluated, total)));
    }

    println!();
    for line in auto.describe()?.lines() {
        println!("  {}", line);
    }
    if let Some(best) = ranking.first() {
        println!("  {} {}", ok("best"), best.candidate.id().white().bold());
    }

    if let Some(log_path) = log {
        step_run(&format!("Appending run → {}", log_path.display()));
        auto.save_meta_data(log_path, task)?;
        step_done(task);
    }
    println!();
    Ok(())
}

pub fn cmd_describe(data_path: &Path, target: &str, problem: ProblemClass, seed: Option<u64>) -> anyhow::Result<()> {
    section("Describe");

    step_run("Loading data");
    let dataset = DataLoader::new().load_csv(data_path, target)?;
    step_done(&format!("{} rows × {} cols", dataset.n_rows(), dataset.n_features()));

    let mut config = SelectorConfig::new(problem);
    config.random_state = seed;
    let mut extractor = MetaFeatureExtractor::from_config(&config);

    step_run("Extracting meta-features");
    let start = Instant::now();
    extractor.extract_initial(&dataset);
    let x = match StandardPreprocessing::default().get_pipeline(&dataset) {
        Some(mut step) => step.fit_transform(&dataset)?,
        None => dataset.numeric_matrix()?,
    };
    extractor.extract_preprocessed(&x, dataset.target());
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    for (key, value) in extractor.as_dict().iter() {
        println!("  {:<24} {}", muted(key), format_value(value).white());
    }
    println!();
    Ok(())
}

pub fn cmd_train_meta(log: &Path, problem: ProblemClass, out: &Path, seed: Option<u64>) -> anyhow::Result<()> {
    section("Train meta-models");

    step_run("Reading run log");
    let rows = RunLog::new(log, RunLogSchema::for_problem(problem)).read()?;
    step_done(&format!("{} runs", rows.len()));

    step_run("Fitting");
    let start = Instant::now();
    let catalog = Catalog::for_problem(problem);
    let models = train_meta_models(&rows, &catalog, out, seed)?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    for model in &models {
        let kind = match model.regressor {
            MetaRegressor::Constant { .. } => "constant",
            MetaRegressor::Linear { .. } => "linear",
            MetaRegressor::Forest { .. } => "forest",
        };
        println!("  {:<30} {}", model.candidate, muted(kind));
    }
    println!();
    println!(
        "  {} {}",
        ok("written"),
        out.join(problem.meta_model_dir_name()).display().to_string().white()
    );
    println!();
    Ok(())
}
