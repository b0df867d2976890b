use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::BufWriter;

use banded_report::config::Config;
use banded_report::consumer::{JsonLinesConsumer, ProgressConsumer};
use banded_report::core::ReportDefinition;
use banded_report::pipeline::{JsonLinesSource, LoadingStrategy, ReportSession};
use banded_report::utils::logging;

#[derive(Parser)]
#[clap(version = "0.1.0", author = "Banded Report Contributors")]
enum Cli {
    /// Run a report over a JSON-lines record file
    Run {
        /// Report definition (TOML, or JSON with a .json extension)
        #[clap(short, long)]
        definition: PathBuf,
        /// Input records, one JSON object per line
        #[clap(short, long)]
        input: PathBuf,
        /// Output file, stdout when omitted
        #[clap(short, long)]
        output: Option<PathBuf>,
        #[clap(short, long)]
        config: Option<PathBuf>,
        /// Override the configured loading strategy: auto, in_memory, streaming or aggregation
        #[clap(short, long)]
        strategy: Option<LoadingStrategy>,
        /// Append a summary line with the final variable values
        #[clap(long)]
        summary: bool,
    },
    /// Show which loading strategy would be used
    Strategy {
        #[clap(short, long)]
        definition: PathBuf,
        /// Expected number of rows
        #[clap(short, long)]
        rows: Option<usize>,
        #[clap(short, long)]
        config: Option<PathBuf>,
    },
    /// Validate a report definition and configuration
    Validate {
        #[clap(short, long)]
        definition: PathBuf,
        #[clap(short, long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    fn config_path(&self) -> Option<&Path> {
        match self {
            Cli::Run { config, .. } | Cli::Strategy { config, .. } | Cli::Validate { config, .. } => {
                config.as_deref()
            }
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("无法加载配置文件 {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn load_session(
    definition: &Path,
    config: &Config,
    strategy: Option<LoadingStrategy>,
) -> Result<ReportSession> {
    let definition = ReportDefinition::load(definition)
        .with_context(|| format!("无法加载报表定义 {}", definition.display()))?;
    let mut pipeline = config.pipeline.clone();
    if let Some(strategy) = strategy {
        pipeline = pipeline.with_strategy(strategy);
    }
    Ok(ReportSession::new(definition, pipeline)?)
}

async fn run_report(
    session: &ReportSession,
    input: &Path,
    output: Option<&Path>,
    summary: bool,
) -> Result<()> {
    let source = JsonLinesSource::new(input);
    let lines = match output {
        Some(path) => {
            let file = File::create(path)
                .await
                .with_context(|| format!("无法创建输出文件 {}", path.display()))?;
            let consumer = ProgressConsumer::new(
                JsonLinesConsumer::new(BufWriter::new(file)).with_summary(summary),
                None,
            );
            session.run(source, consumer).await?.lines
        }
        None => {
            let consumer = ProgressConsumer::new(
                JsonLinesConsumer::new(tokio::io::stdout()).with_summary(summary),
                None,
            );
            session.run(source, consumer).await?.lines
        }
    };
    eprintln!("会话 {} 完成, 写出 {} 行", session.id(), lines);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config_path())?;
    logging::init(&config.log).map_err(|e| anyhow::anyhow!("日志初始化失败: {}", e))?;

    let result = match &cli {
        Cli::Run {
            definition,
            input,
            output,
            strategy,
            summary,
            ..
        } => match load_session(definition, &config, *strategy) {
            Ok(session) => run_report(&session, input, output.as_deref(), *summary).await,
            Err(e) => Err(e),
        },
        Cli::Strategy {
            definition, rows, ..
        } => load_session(definition, &config, None).map(|session| {
            println!("{}", session.strategy_for(*rows));
        }),
        Cli::Validate { definition, .. } => load_session(definition, &config, None).map(|session| {
            let definition = session.definition();
            println!(
                "报表 {} 有效: {} 个分组, {} 个变量",
                definition.name,
                definition.groups.len(),
                definition.variables.len()
            );
        }),
    };

    if let Err(e) = &result {
        log::error!("{:#}", e);
    }
    logging::shutdown();
    result
}
