use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cbcont_bandits::EpsilonGreedy;
use cbcont_core::{load_config, Pipeline, PipelineConfig, PipelineMode};

mod input;

#[derive(Parser, Debug)]
#[command(name = "cbcont", version, about = "Continuous-action contextual bandits")]
struct Cli {
    /// More log output
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Predict (and learn from labeled lines) over an example stream
    Run {
        #[command(flatten)]
        settings: Settings,
        /// Example file; reads stdin when omitted
        #[arg(long, short)]
        data: Option<PathBuf>,
        /// Prediction output file; repeatable, "-" is stdout
        #[arg(long, short)]
        predictions: Vec<String>,
        /// Print the run counters in Prometheus text format at the end
        #[arg(long)]
        metrics: bool,
    },
    /// Validate the effective configuration and print it as JSON
    CheckConfig {
        #[command(flatten)]
        settings: Settings,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Sample,
    Pdf,
}

#[derive(clap::Args, Debug)]
struct Settings {
    /// YAML pipeline configuration
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Number of discrete actions
    #[arg(long)]
    num_actions: Option<u32>,
    /// Lower bound of the continuous action range
    #[arg(long, allow_hyphen_values = true)]
    min_value: Option<f32>,
    /// Upper bound of the continuous action range
    #[arg(long, allow_hyphen_values = true)]
    max_value: Option<f32>,
    /// Smoothing radius in bins
    #[arg(long)]
    bandwidth: Option<u32>,
    /// Random seed
    #[arg(long)]
    seed: Option<u64>,
    /// Exploration rate of the discrete learner
    #[arg(long)]
    epsilon: Option<f32>,
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
    /// No progress lines
    #[arg(long)]
    quiet: bool,
}

impl Settings {
    fn resolve(&self) -> anyhow::Result<PipelineConfig> {
        let mut cfg = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if let Some(n) = self.num_actions {
            cfg.num_actions = n;
        }
        if let Some(min) = self.min_value {
            cfg.min_value = Some(min);
        }
        if let Some(max) = self.max_value {
            cfg.max_value = Some(max);
        }
        if let Some(bandwidth) = self.bandwidth {
            cfg.bandwidth = bandwidth;
        }
        if let Some(seed) = self.seed {
            cfg.seed = seed;
        }
        if let Some(epsilon) = self.epsilon {
            cfg.epsilon = epsilon;
        }
        if let Some(mode) = self.mode {
            cfg.mode = match mode {
                ModeArg::Sample => PipelineMode::Sample,
                ModeArg::Pdf => PipelineMode::Pdf,
            };
        }
        cfg.quiet |= self.quiet;
        Ok(cfg)
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run(
    cfg: &PipelineConfig,
    data: Option<PathBuf>,
    predictions: &[String],
    metrics: bool,
) -> anyhow::Result<()> {
    let base = EpsilonGreedy::new(cfg.num_actions, cfg.epsilon);
    let mut pipeline = Pipeline::from_config(cfg, Box::new(base)).context("invalid pipeline configuration")?;

    for target in predictions {
        if target == "-" {
            pipeline.add_sink(Box::new(io::stdout()));
        } else {
            let file = File::create(target)
                .with_context(|| format!("failed to create prediction file {target}"))?;
            pipeline.add_sink(Box::new(BufWriter::new(file)));
        }
    }

    let reader: Box<dyn BufRead> = match &data {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.context("failed to read example stream")?;
        let Some(mut ec) = input::parse_example_line(&line)
            .with_context(|| format!("line {}: bad example", line_no + 1))?
        else {
            continue;
        };
        pipeline
            .process(&mut ec)
            .with_context(|| format!("line {}: example failed", line_no + 1))?;
    }

    pipeline.finish();
    if metrics {
        let body = pipeline
            .stats()
            .metrics()
            .encode()
            .map_err(|_| anyhow::anyhow!("failed to encode metrics"))?;
        print!("{body}");
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            settings,
            data,
            predictions,
            metrics,
        } => {
            let cfg = settings.resolve()?;
            debug!(?cfg, "effective configuration");
            run(&cfg, data, &predictions, metrics)?;
        }
        Commands::CheckConfig { settings } => {
            let cfg = settings.resolve()?;
            cfg.validate().context("invalid pipeline configuration")?;
            info!("configuration is valid");
            println!("{}", serde_json::to_string_pretty(&cfg)?);
        }
    }

    Ok(())
}
