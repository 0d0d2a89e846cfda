//! Habitat suitability model runner.
//!
//! Builds a suitability composite for one site from a YAML model file:
//! - Lists and downloads the soil and climate tiles covering the site
//! - Mosaics, aligns and scores every layer
//! - Writes the composite and per-variable scores as Zarr stores
//! - Renders PNG plots with the site boundary drawn on top

mod config;
mod download;
mod model;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use grid_processor::{
    BoundingBox, GridCodec, GridProcessorConfig, MacaProvider, PolarisProvider, SuitabilityModel,
    TileProvider, TileRequest, TileSource, ZarrGridCodec,
};
use renderer::{Color, Colormap, RenderContext};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::ModelFile;
use download::{DownloadConfig, DownloadManager};

#[derive(Parser, Debug)]
#[command(name = "habitat-model")]
#[command(about = "Habitat suitability modelling from soil, terrain and climate grids")]
struct Cli {
    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "JSON_LOGS", global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a model file and write the composite, scores and plots
    Run {
        /// Model YAML file
        #[arg(short, long)]
        model: PathBuf,

        /// Align and score variables in parallel
        #[arg(long)]
        parallel: bool,
    },

    /// Print the tile URLs covering a site
    Tiles(TileArgs),

    /// Download the tiles covering a site
    Fetch {
        #[command(flatten)]
        tiles: TileArgs,

        /// Directory for completed downloads
        #[arg(long, default_value = "data/downloads")]
        output_dir: PathBuf,

        /// Maximum concurrent downloads
        #[arg(long, default_value = "4")]
        max_concurrent: usize,

        /// Maximum retry attempts
        #[arg(long, default_value = "5")]
        max_retries: u32,
    },

    /// Derive an aspect grid from an elevation grid
    Aspect {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Render a grid to PNG
    Render {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// viridis, terrain or greys
        #[arg(long, default_value = "viridis")]
        colormap: String,

        /// Site outline as min_x,min_y,max_x,max_y in the grid's CRS
        #[arg(long, allow_hyphen_values = true)]
        boundary: Option<BoundingBox>,

        #[arg(long, default_value = "black")]
        boundary_color: String,

        /// Fixed value range as min,max
        #[arg(long, allow_hyphen_values = true, value_parser = parse_range)]
        range: Option<(f32, f32)>,

        /// Pixels per cell
        #[arg(long, default_value = "4")]
        scale: usize,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Source {
    /// POLARIS soil property tiles
    Polaris,
    /// MACA downscaled climate projections
    Maca,
}

#[derive(Args, Debug, Clone)]
struct TileArgs {
    #[arg(long, value_enum, default_value_t = Source::Polaris)]
    source: Source,

    /// Site bounds as min_lon,min_lat,max_lon,max_lat
    #[arg(long, allow_hyphen_values = true)]
    bounds: BoundingBox,

    /// POLARIS soil property
    #[arg(long, default_value = "ph")]
    property: String,

    /// POLARIS statistic
    #[arg(long, default_value = "mean")]
    statistic: String,

    /// POLARIS depth interval in cm
    #[arg(long, default_value = "60_100")]
    depth: String,

    /// MACA climate model
    #[arg(long, default_value = "CanESM2")]
    gcm: String,

    /// MACA emissions scenario
    #[arg(long, default_value = "rcp85")]
    scenario: String,

    /// MACA variable
    #[arg(long, default_value = "tasmax")]
    variable: String,

    /// First year of each MACA five-year slice
    #[arg(long, value_delimiter = ',', default_value = "2036,2041,2046")]
    slices: Vec<i32>,

    /// Override the provider's base URL
    #[arg(long)]
    base_url: Option<String>,
}

fn parse_range(s: &str) -> Result<(f32, f32), String> {
    let (min, max) = s
        .split_once(',')
        .ok_or_else(|| format!("expected min,max, got '{}'", s))?;
    let min: f32 = min.trim().parse().map_err(|e| format!("invalid min: {}", e))?;
    let max: f32 = max.trim().parse().map_err(|e| format!("invalid max: {}", e))?;
    if !(min.is_finite() && max.is_finite()) || min > max {
        return Err(format!("invalid range {},{}", min, max));
    }
    Ok((min, max))
}

fn provider_for(args: &TileArgs) -> Box<dyn TileProvider> {
    match args.source {
        Source::Polaris => {
            let provider = PolarisProvider::new(&args.property, &args.statistic, &args.depth);
            match &args.base_url {
                Some(url) => Box::new(provider.with_base_url(url)),
                None => Box::new(provider),
            }
        }
        Source::Maca => {
            let provider = MacaProvider::new(&args.gcm, &args.scenario, args.slices.clone())
                .with_variable(&args.variable);
            match &args.base_url {
                Some(url) => Box::new(provider.with_base_url(url)),
                None => Box::new(provider),
            }
        }
    }
}

fn list_tiles(args: &TileArgs) -> Result<Vec<TileSource>> {
    if !args.bounds.is_valid() {
        bail!("Invalid site bounds: {:?}", args.bounds);
    }
    let provider = provider_for(args);
    let sources = provider
        .fetch_tiles(&TileRequest::new(args.bounds))
        .with_context(|| format!("Failed to list {} tiles", provider.name()))?;
    info!(provider = provider.name(), tiles = sources.len(), "Listed tiles");
    Ok(sources)
}

fn run_command(command: Command) -> Result<()> {
    match command {
        Command::Run { model, parallel } => {
            let model = ModelFile::load(&model)?;
            let mut config = GridProcessorConfig::from_env();
            config.parallel_variables |= parallel;
            let report = model::run_model(&model, config)?;
            println!("{}", report.composite.display());
            for path in report.scores.iter().chain(&report.plots) {
                println!("{}", path.display());
            }
        }
        Command::Tiles(args) => {
            for source in list_tiles(&args)? {
                println!("{}", source);
            }
        }
        Command::Aspect { input, output } => {
            let config = GridProcessorConfig::from_env();
            let codec = ZarrGridCodec::new(&config);
            let elevation = codec
                .load_grid(&input)
                .with_context(|| format!("Failed to load {}", input.display()))?;
            let aspect = SuitabilityModel::from_config(config)?.aspect(&elevation)?;
            codec
                .save_grid(&aspect, &output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!(
                output = %output.display(),
                valid_cells = aspect.valid_count(),
                "Wrote aspect grid"
            );
        }
        Command::Render {
            input,
            output,
            colormap,
            boundary,
            boundary_color,
            range,
            scale,
        } => {
            let grid = ZarrGridCodec::new(&GridProcessorConfig::from_env())
                .load_grid(&input)
                .with_context(|| format!("Failed to load {}", input.display()))?;
            let mut ctx = RenderContext::new(Colormap::from_str(&colormap)).with_scale(scale);
            if let Some(bbox) = boundary {
                let color = Color::parse(&boundary_color)
                    .with_context(|| format!("Unknown boundary color '{}'", boundary_color))?;
                ctx = ctx.with_boundary(bbox, color);
            }
            if let Some((min, max)) = range {
                ctx = ctx.with_range(min, max);
            }
            model::write_plot(&ctx, &grid, &output)?;
        }
        Command::Fetch { .. } => bail!("fetch runs on the async runtime"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so listings on stdout stay pipeable
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);
    if cli.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    match cli.command {
        Command::Fetch {
            tiles,
            output_dir,
            max_concurrent,
            max_retries,
        } => {
            let sources = list_tiles(&tiles)?;
            let manager = DownloadManager::new(DownloadConfig {
                max_retries,
                max_concurrent,
                output_dir,
                initial_retry_delay: Duration::from_secs(2),
                ..Default::default()
            })?;
            let summary = manager.download_all(&sources).await?;
            for path in &summary.completed {
                println!("{}", path.display());
            }
            info!(
                completed = summary.completed.len(),
                failed = summary.failed.len(),
                "Fetch complete"
            );
            if !summary.failed.is_empty() {
                bail!("{} of {} downloads failed", summary.failed.len(), sources.len());
            }
            Ok(())
        }
        command => tokio::task::spawn_blocking(move || run_command(command))
            .await
            .context("Worker task panicked")?,
    }
}
