//! The habitat suitability model: align, score and combine.

use std::sync::Arc;
use std::time::Instant;

use habitat_common::{BoundingBox, Grid, LayerStack};
use rayon::prelude::*;
use tracing::{info, instrument};

use crate::align::GridAligner;
use crate::config::GridProcessorConfig;
use crate::error::{GridProcessorError, Result};
use crate::merge::GridMerger;
use crate::projection::{Reprojector, TargetGrid, WarpReprojector};
use crate::suitability::{combine, score_variable};
use crate::terrain;
use crate::types::VariableSpec;

/// One model input: a raw layer and its response curve.
#[derive(Debug, Clone, Copy)]
pub struct ModelVariable<'a> {
    pub spec: &'a VariableSpec,
    pub grid: &'a Grid,
}

impl<'a> ModelVariable<'a> {
    pub fn new(spec: &'a VariableSpec, grid: &'a Grid) -> Self {
        Self { spec, grid }
    }
}

/// Everything a model run produces.
#[derive(Debug, Clone)]
pub struct ModelOutput {
    /// Product of all per-variable scores.
    pub composite: Grid,
    /// Inputs on the reference lattice, by variable name.
    pub aligned: LayerStack,
    /// Per-variable scores, by variable name.
    pub scores: LayerStack,
}

/// Runs the suitability pipeline with one configuration.
#[derive(Debug, Clone)]
pub struct SuitabilityModel {
    aligner: GridAligner,
    merger: GridMerger,
    config: GridProcessorConfig,
}

impl SuitabilityModel {
    /// Create a model, rejecting an invalid configuration.
    pub fn new(reprojector: Arc<dyn Reprojector>, config: GridProcessorConfig) -> Result<Self> {
        config.validate().map_err(GridProcessorError::Config)?;
        Ok(Self {
            aligner: GridAligner::from_config(reprojector, &config),
            merger: GridMerger::from_config(&config),
            config,
        })
    }

    /// Create a model with the in-process warper.
    pub fn from_config(config: GridProcessorConfig) -> Result<Self> {
        Self::new(Arc::new(WarpReprojector), config)
    }

    pub fn config(&self) -> &GridProcessorConfig {
        &self.config
    }

    pub fn aligner(&self) -> &GridAligner {
        &self.aligner
    }

    /// Mosaic tiles for a site.
    pub fn merge(&self, tiles: &[Grid], site: Option<&BoundingBox>) -> Result<Grid> {
        self.merger.merge(tiles, site).map_err(|e| e.in_stage("merge"))
    }

    /// Aspect layer from an elevation grid.
    pub fn aspect(&self, elevation: &Grid) -> Result<Grid> {
        terrain::aspect(elevation).map_err(|e| e.in_stage("terrain"))
    }

    fn align_and_score(&self, target: &TargetGrid, variable: &ModelVariable<'_>) -> Result<(Grid, Grid)> {
        let method = self.config.interpolation_for(variable.spec);
        let aligned = self
            .aligner
            .align_to(target, variable.grid, &variable.spec.name, method)
            .map_err(|e| e.in_stage("align"))?;
        let scored = score_variable(&aligned, variable.spec).map_err(|e| e.in_stage("score"))?;
        Ok((aligned, scored))
    }

    /// Align every variable onto `reference`, score it and combine the
    /// scores into one composite.
    #[instrument(skip_all, fields(variables = variables.len(), parallel = self.config.parallel_variables))]
    pub fn run(&self, reference: &Grid, variables: &[ModelVariable<'_>]) -> Result<ModelOutput> {
        if variables.is_empty() {
            return Err(GridProcessorError::EmptyInput { component: "model" });
        }
        for variable in variables {
            variable.spec.validate().map_err(|e| e.in_stage("score"))?;
        }

        let start = Instant::now();
        let target = self
            .aligner
            .target_of(reference)
            .map_err(|e| e.in_stage("align"))?;

        let layers: Vec<(Grid, Grid)> = if self.config.parallel_variables {
            variables
                .par_iter()
                .map(|v| self.align_and_score(&target, v))
                .collect::<Result<_>>()?
        } else {
            variables
                .iter()
                .map(|v| self.align_and_score(&target, v))
                .collect::<Result<_>>()?
        };
        let align_score_ms = start.elapsed().as_millis() as u64;

        let mut aligned = LayerStack::new();
        let mut scores = LayerStack::new();
        for (variable, (grid, score)) in variables.iter().zip(layers) {
            aligned
                .push(variable.spec.name.as_str(), grid)
                .map_err(|e| GridProcessorError::from(e).in_stage("align"))?;
            scores
                .push(variable.spec.name.as_str(), score)
                .map_err(|e| GridProcessorError::from(e).in_stage("score"))?;
        }

        let start = Instant::now();
        let composite = combine(&scores.grids()).map_err(|e| e.in_stage("combine"))?;
        let combine_ms = start.elapsed().as_millis() as u64;

        info!(
            rows = composite.rows(),
            cols = composite.cols(),
            valid = composite.valid_count(),
            align_score_ms,
            combine_ms,
            "Suitability model complete"
        );

        Ok(ModelOutput {
            composite,
            aligned,
            scores,
        })
    }
}
