use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use veriprog_rs::annotation::{AnnotationTable, Annotator};
use veriprog_rs::baseline::{summarize, Baseline, BaselineRecord};
use veriprog_rs::batch::{run_stage, BatchSummary, Stage, StageState};
use veriprog_rs::config::{ArtifactPaths, OracleConfig, ScoreWeights};
use veriprog_rs::generation::ProgramGenerator;
use veriprog_rs::llm::{openai::OracleClient, Oracle};
use veriprog_rs::scoring::{aggregate, log_metrics, write_json};
use veriprog_rs::types::*;
use veriprog_rs::verification::VerificationExecutor;
use veriprog_rs::load_array;

#[derive(Parser)]
#[command(name = "veriprog", version, about = "Program-guided claim verification")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
    /// Directory holding every JSON artifact
    #[arg(long, default_value = "./data", global = true)]
    data_dir: PathBuf,
    /// Debug-level logging unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(flatten)]
    oracle: OracleConfig,
}

#[derive(Subcommand)]
enum Cmd {
    /// Generate one reasoning program per claim
    Generate { #[arg(long)] claims: Option<PathBuf>, #[arg(long)] output: Option<PathBuf> },
    /// Classify emotion and narrative technique per claim
    Annotate { #[arg(long)] claims: Option<PathBuf>, #[arg(long)] output: Option<PathBuf> },
    /// Execute programs with the basic and augmented verification passes
    Execute {
        #[arg(long)] programs: Option<PathBuf>,
        #[arg(long)] annotations: Option<PathBuf>,
        #[arg(long)] output: Option<PathBuf>,
        /// Run the augmented pass with neutral framing instead of reading annotations
        #[arg(long)] skip_annotations: bool,
    },
    /// Label claims and compute metrics against ground truth
    Score {
        #[arg(long)] verification: Option<PathBuf>,
        #[arg(long)] claims: Option<PathBuf>,
        #[arg(long)] annotations: Option<PathBuf>,
        /// Per-claim rows, metrics and diagnostics
        #[arg(long)] comparison: Option<PathBuf>,
        #[arg(long)] propagators: Option<PathBuf>,
        #[arg(long, default_value_t = 0.5)] alpha: f64,
        #[arg(long, default_value_t = 0.5)] beta: f64,
    },
    /// Direct true/false prompting without programs
    Baseline {
        #[arg(long)] claims: Option<PathBuf>,
        #[arg(long)] output: Option<PathBuf>,
        /// Counts and accuracies over the finished baseline rows
        #[arg(long)] summary: Option<PathBuf>,
    },
    /// generate -> annotate -> execute -> score
    Run,
}

fn pick(over: Option<PathBuf>, default: &Path) -> PathBuf {
    over.unwrap_or_else(|| default.to_path_buf())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    warn!("interrupt received, finishing current artifact");
}

async fn connect(cfg: &OracleConfig) -> Result<OracleClient> {
    let client = OracleClient::new(cfg)?;
    client.health_check().await?;
    info!(model = %cfg.model, "oracle reachable");
    Ok(client)
}

async fn drive<S: Stage>(stage: &S, inputs: &[S::Input], output: &Path) -> Result<BatchSummary> {
    let summary = run_stage(stage, inputs, output, shutdown_signal())
        .await
        .with_context(|| format!("{} stage", stage.name()))?;
    info!(
        stage = stage.name(),
        written = summary.written,
        skipped = summary.skipped_existing,
        failed = summary.failed,
        state = ?summary.state,
        "stage finished"
    );
    Ok(summary)
}

fn load_truth(path: &Path) -> Result<HashMap<u64, ClaimRecord>> {
    let claims: Vec<ClaimRecord> = load_array(path)?;
    Ok(claims.into_iter().map(|c| (c.id, c)).collect())
}

struct ScoreFiles {
    verification: PathBuf,
    claims: PathBuf,
    annotations: PathBuf,
    comparison: PathBuf,
    propagators: PathBuf,
}

impl ScoreFiles {
    fn defaults(paths: &ArtifactPaths) -> Self {
        Self {
            verification: paths.verification.clone(),
            claims: paths.claims.clone(),
            annotations: paths.annotations.clone(),
            comparison: paths.comparison.clone(),
            propagators: paths.propagators.clone(),
        }
    }
}

fn score(files: &ScoreFiles, weights: ScoreWeights) -> Result<()> {
    let records: Vec<VerificationRecord> = load_array(&files.verification)?;
    let truth = load_truth(&files.claims)?;
    let table = AnnotationTable::load(&files.annotations)?;

    let (report, propagators) = aggregate(&records, &truth, &table, weights);
    write_json(&files.comparison, &report)?;
    write_json(&files.propagators, &propagators)?;

    log_metrics("program", &report.metrics);
    info!(
        propagators = propagators.len(),
        basic_wins = report.diagnostics.basic_wins,
        augmented_wins = report.diagnostics.augmented_wins,
        comparison = %files.comparison.display(),
        "scoring complete"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    std::fs::create_dir_all(&cli.data_dir)
        .with_context(|| format!("creating {}", cli.data_dir.display()))?;
    let paths = ArtifactPaths::in_dir(&cli.data_dir);

    match cli.cmd {
        Cmd::Generate { claims, output } => {
            let claims: Vec<ClaimRecord> = load_array(&pick(claims, &paths.claims))?;
            let oracle = connect(&cli.oracle).await?;
            drive(&ProgramGenerator::new(&oracle), &claims, &pick(output, &paths.programs)).await?;
        }
        Cmd::Annotate { claims, output } => {
            let claims: Vec<ClaimRecord> = load_array(&pick(claims, &paths.claims))?;
            let oracle = connect(&cli.oracle).await?;
            drive(&Annotator::new(&oracle), &claims, &pick(output, &paths.annotations)).await?;
        }
        Cmd::Execute { programs, annotations, output, skip_annotations } => {
            let programs: Vec<ProgramRecord> = load_array(&pick(programs, &paths.programs))?;
            let table = if skip_annotations {
                AnnotationTable::default()
            } else {
                AnnotationTable::load(&pick(annotations, &paths.annotations))?
            };
            if table.is_empty() && !skip_annotations {
                warn!("annotation artifact holds no rows, augmented pass runs with neutral framing");
            }
            info!(programs = programs.len(), annotations = table.len(), "inputs loaded");
            let oracle = connect(&cli.oracle).await?;
            drive(&VerificationExecutor::new(&oracle, &table), &programs, &pick(output, &paths.verification)).await?;
        }
        Cmd::Score { verification, claims, annotations, comparison, propagators, alpha, beta } => {
            let files = ScoreFiles {
                verification: pick(verification, &paths.verification),
                claims: pick(claims, &paths.claims),
                annotations: pick(annotations, &paths.annotations),
                comparison: pick(comparison, &paths.comparison),
                propagators: pick(propagators, &paths.propagators),
            };
            score(&files, ScoreWeights { alpha, beta })?;
        }
        Cmd::Baseline { claims, output, summary: summary_path } => {
            let claims: Vec<ClaimRecord> = load_array(&pick(claims, &paths.claims))?;
            let output = pick(output, &paths.baseline);
            let oracle = connect(&cli.oracle).await?;
            let summary = drive(&Baseline::new(&oracle), &claims, &output).await?;
            if summary.state != StageState::Interrupted {
                let rows: Vec<BaselineRecord> = load_array(&output)?;
                let report = summarize(&rows);
                let summary_path = pick(summary_path, &paths.baseline_summary);
                write_json(&summary_path, &report)?;
                log_metrics("baseline", &report.metrics);
                info!(total = report.total, correct = report.correct, summary = %summary_path.display(), "baseline summary written");
            }
        }
        Cmd::Run => {
            let claims: Vec<ClaimRecord> = load_array(&paths.claims)?;
            let oracle = connect(&cli.oracle).await?;

            if drive(&ProgramGenerator::new(&oracle), &claims, &paths.programs).await?.state == StageState::Interrupted {
                return Ok(());
            }
            if drive(&Annotator::new(&oracle), &claims, &paths.annotations).await?.state == StageState::Interrupted {
                return Ok(());
            }
            let programs: Vec<ProgramRecord> = load_array(&paths.programs)?;
            let table = AnnotationTable::load(&paths.annotations)?;
            if drive(&VerificationExecutor::new(&oracle, &table), &programs, &paths.verification).await?.state
                == StageState::Interrupted
            {
                return Ok(());
            }
            score(&ScoreFiles::defaults(&paths), ScoreWeights::default())?;
        }
    }
    Ok(())
}
