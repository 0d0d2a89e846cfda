//! Running a model file: load layers, score them and write the results.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use grid_processor::climate::{grid_to_fahrenheit, mean_composite, shift_longitudes};
use grid_processor::{
    transform_bounds, BoundingBox, CrsCode, Grid, GridCodec, GridProcessorConfig,
    LocalDirProvider, ModelVariable, SuitabilityModel, TileProvider, TileRequest, TileSource,
    VariableSpec, ZarrGridCodec,
};
use renderer::{render_grid, Colormap, RenderContext};
use tracing::{info, instrument};

use crate::config::{LayerSource, ModelFile, VariableConfig};

/// Files written by a model run.
#[derive(Debug)]
pub struct RunReport {
    pub composite: PathBuf,
    pub scores: Vec<PathBuf>,
    pub plots: Vec<PathBuf>,
    pub valid_cells: usize,
    pub total_cells: usize,
}

/// Load every layer, run the suitability model and write its outputs.
#[instrument(skip_all, fields(site = %model.site.name))]
pub fn run_model(model: &ModelFile, config: GridProcessorConfig) -> Result<RunReport> {
    let codec = ZarrGridCodec::new(&config);
    let suitability = SuitabilityModel::from_config(config)?;
    let site = model.site.bbox();

    let start = Instant::now();
    let mut grids: HashMap<String, Grid> = HashMap::new();
    for var in model.variables.iter().filter(|v| v.derived_from().is_none()) {
        let grid = load_layer(model, var, &codec, &suitability, &site)
            .with_context(|| format!("Failed to load layer '{}'", var.name))?;
        info!(layer = %var.name, rows = grid.rows(), cols = grid.cols(), "Loaded layer");
        grids.insert(var.name.clone(), grid);
    }
    for var in &model.variables {
        if let Some(from) = var.derived_from() {
            let base = grids
                .get(from)
                .ok_or_else(|| anyhow!("Layer '{}' was not loaded", from))?;
            let derived = suitability
                .aspect(base)
                .with_context(|| format!("Failed to derive '{}' from '{}'", var.name, from))?;
            grids.insert(var.name.clone(), derived);
        }
    }
    let load_ms = start.elapsed().as_millis() as u64;

    let specs: Vec<VariableSpec> = model
        .variables
        .iter()
        .map(VariableConfig::spec)
        .collect::<Result<_>>()?;
    let variables: Vec<ModelVariable<'_>> = specs
        .iter()
        .map(|spec| {
            grids
                .get(&spec.name)
                .map(|grid| ModelVariable::new(spec, grid))
                .ok_or_else(|| anyhow!("Layer '{}' was not loaded", spec.name))
        })
        .collect::<Result<_>>()?;
    let reference = grids
        .get(&model.reference)
        .ok_or_else(|| anyhow!("Reference layer '{}' was not loaded", model.reference))?;

    let output = suitability
        .run(reference, &variables)
        .context("Suitability model failed")?;

    let composite_path = model.output_path(".zarr");
    codec
        .save_grid(&output.composite, &composite_path)
        .with_context(|| format!("Failed to write {}", composite_path.display()))?;

    let mut scores = Vec::new();
    for (name, score) in output.scores.iter() {
        let path = model.output_path(&format!("-{}-score.zarr", name));
        codec
            .save_grid(score, &path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        scores.push(path);
    }

    let mut plots = Vec::new();
    if let Some(dir) = &model.plots_dir {
        let dir = model.data_path(dir);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create plots directory {}", dir.display()))?;

        for var in &model.variables {
            if let Some(grid) = output.aligned.get(&var.name) {
                let ctx = var.plot.context(&site_in(&site, grid.crs())?)?;
                let path = dir.join(format!("{}-{}.png", model.site.name, var.name));
                write_plot(&ctx, grid, &path)?;
                plots.push(path);
            }
        }

        let ctx = RenderContext::new(Colormap::Viridis)
            .with_range(0.0, 1.0)
            .with_boundary(
                site_in(&site, output.composite.crs())?,
                renderer::Color::rgb(0, 0, 0),
            )
            .with_scale(4);
        let path = dir.join(format!("{}.png", model.output));
        write_plot(&ctx, &output.composite, &path)?;
        plots.push(path);
    }

    let report = RunReport {
        composite: composite_path,
        scores,
        plots,
        valid_cells: output.composite.valid_count(),
        total_cells: output.composite.values().len(),
    };
    info!(
        composite = %report.composite.display(),
        valid_cells = report.valid_cells,
        total_cells = report.total_cells,
        plots = report.plots.len(),
        load_ms,
        total_ms = start.elapsed().as_millis() as u64,
        "Model run complete"
    );
    Ok(report)
}

fn load_layer(
    model: &ModelFile,
    var: &VariableConfig,
    codec: &ZarrGridCodec,
    suitability: &SuitabilityModel,
    site: &BoundingBox,
) -> Result<Grid> {
    match &var.source {
        LayerSource::Grid { path } => Ok(codec.load_grid(&model.data_path(path))?),
        LayerSource::Tiles { dir, suffix } => {
            let provider = LocalDirProvider::new(model.data_path(dir), suffix.as_str());
            let sources = provider.fetch_tiles(&TileRequest::new(*site))?;
            if sources.is_empty() {
                bail!("No '{}' tiles in {}", suffix, provider.dir().display());
            }
            let tiles = sources
                .iter()
                .map(|source| match source {
                    TileSource::Path(path) => Ok(codec.load_grid(path)?),
                    TileSource::Url(url) => Err(anyhow!("Remote tile not fetched: {}", url)),
                })
                .collect::<Result<Vec<_>>>()?;
            let crs = tiles[0].crs().or(suitability.config().default_crs);
            let clip = site_in(site, crs)?;
            Ok(suitability.merge(&tiles, Some(&clip))?)
        }
        LayerSource::Climate { slices, kelvin } => {
            let mut prepared = Vec::with_capacity(slices.len());
            for path in slices {
                let grid = shift_longitudes(&codec.load_grid(&model.data_path(path))?)?;
                prepared.push(if *kelvin { grid_to_fahrenheit(&grid) } else { grid });
            }
            Ok(mean_composite(&prepared.iter().collect::<Vec<_>>())?)
        }
        LayerSource::Aspect { from } => bail!("'{}' is derived from '{}'", var.name, from),
    }
}

/// The lon/lat site box expressed in `crs`.
fn site_in(site: &BoundingBox, crs: Option<CrsCode>) -> Result<BoundingBox> {
    match crs {
        Some(crs) => Ok(transform_bounds(site, CrsCode::Epsg4326, crs)?),
        None => Ok(*site),
    }
}

/// Render `grid` and write the PNG to `path`.
pub fn write_plot(ctx: &RenderContext, grid: &Grid, path: &std::path::Path) -> Result<()> {
    let png = render_grid(ctx, grid)?;
    std::fs::write(path, png).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "Wrote plot");
    Ok(())
}
