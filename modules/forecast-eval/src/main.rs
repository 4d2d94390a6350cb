use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use forecast_eval::io::{load_records, save_json};
use forecast_eval::{load_config, AppConfig, EvalRecord, EvaluationPipeline, FileConfig};

#[derive(Parser)]
#[command(name = "forecast-eval")]
#[command(about = "Score model-written temperature forecasts against station observations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// TOML config; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Record batch (JSON array or .jsonl)
    #[arg(short, long)]
    input: PathBuf,

    /// Task name used in result file names
    #[arg(long, default_value = "task4")]
    task: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract structured forecasts from model output
    Extract {
        #[command(flatten)]
        common: CommonArgs,
        /// Where to write the extracted records
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Map extracted place names to canonical regions
    Standardize {
        #[command(flatten)]
        common: CommonArgs,
        /// Where to write the standardized records
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Score standardized records and write results plus a summary
    Score {
        #[command(flatten)]
        common: CommonArgs,
        /// Result folder (overrides `[data] result_folder`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extraction, standardization and scoring in one pass
    Run {
        #[command(flatten)]
        common: CommonArgs,
        /// Result folder (overrides `[data] result_folder`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("forecast_eval=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract { common, output } => {
            let pipeline = model_pipeline(&common, None)?;
            let records = load_input(&common.input)?;
            let extracted = pipeline.extract(&records).await?;
            save_json(&extracted, &output)?;
            info!(path = %output.display(), "Saved extracted records");
        }
        Commands::Standardize { common, output } => {
            let pipeline = model_pipeline(&common, None)?;
            let records = load_input(&common.input)?;
            let standardized = pipeline.standardize(&records).await?;
            save_json(&standardized, &output)?;
            info!(path = %output.display(), "Saved standardized records");
        }
        Commands::Score { common, output } => {
            let (config, config_dir) = file_config(&common, output.as_deref())?;
            let pipeline =
                EvaluationPipeline::from_config(config, &config_dir, &common.task)?.with_scoring()?;
            let out = pipeline.score_extracted_file(&common.input)?;
            println!("{}", out.summary);
        }
        Commands::Run { common, output } => {
            let pipeline = model_pipeline(&common, output.as_deref())?.with_scoring()?;
            let out = pipeline.score_file(&common.input).await?;
            println!("{}", out.summary);
        }
    }

    Ok(())
}

fn file_config(common: &CommonArgs, result_folder: Option<&Path>) -> Result<(FileConfig, PathBuf)> {
    let (mut config, config_dir) = match common.config {
        Some(ref path) => {
            let dir = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            (load_config(path)?, dir)
        }
        None => (FileConfig::default(), PathBuf::from(".")),
    };
    if let Some(folder) = result_folder {
        config.data.result_folder = std::env::current_dir()?.join(folder);
    }
    Ok((config, config_dir))
}

fn model_pipeline(common: &CommonArgs, result_folder: Option<&Path>) -> Result<EvaluationPipeline> {
    let (config, config_dir) = file_config(common, result_folder)?;
    let generator = AppConfig::from_env().generator()?;
    Ok(EvaluationPipeline::from_config(config, &config_dir, &common.task)?
        .with_generator(Arc::new(generator)))
}

fn load_input(path: &Path) -> Result<Vec<EvalRecord>> {
    let records: Vec<EvalRecord> = load_records(path)?;
    info!(path = %path.display(), records = records.len(), "Loaded records");
    Ok(records)
}
