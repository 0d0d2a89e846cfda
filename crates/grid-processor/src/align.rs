//! Harmonization of input grids onto a reference lattice.

use std::sync::Arc;

use habitat_common::{CrsCode, Grid, LayerStack, RawRaster};
use tracing::{debug, instrument};

use crate::config::GridProcessorConfig;
use crate::error::{GridProcessorError, Result};
use crate::projection::{Reprojector, TargetGrid, WarpReprojector};
use crate::types::InterpolationMethod;

/// One grid to align, with the resampling to use for it.
#[derive(Debug, Clone, Copy)]
pub struct AlignInput<'a> {
    pub name: &'a str,
    pub grid: &'a Grid,
    pub method: InterpolationMethod,
}

/// Puts grids on the exact shape, transform and CRS of a reference grid.
#[derive(Clone)]
pub struct GridAligner {
    reprojector: Arc<dyn Reprojector>,
    default_crs: Option<CrsCode>,
}

impl std::fmt::Debug for GridAligner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridAligner")
            .field("default_crs", &self.default_crs)
            .finish_non_exhaustive()
    }
}

impl Default for GridAligner {
    fn default() -> Self {
        Self::new(Arc::new(WarpReprojector), Some(CrsCode::Epsg3857))
    }
}

impl GridAligner {
    pub fn new(reprojector: Arc<dyn Reprojector>, default_crs: Option<CrsCode>) -> Self {
        Self {
            reprojector,
            default_crs,
        }
    }

    pub fn from_config(reprojector: Arc<dyn Reprojector>, config: &GridProcessorConfig) -> Self {
        Self::new(reprojector, config.default_crs)
    }

    pub fn default_crs(&self) -> Option<CrsCode> {
        self.default_crs
    }

    /// Label a grid that has no CRS with the configured default.
    pub fn assign_crs(&self, grid: &Grid, name: &str) -> Result<Grid> {
        match (grid.crs(), self.default_crs) {
            (Some(_), _) => Ok(grid.clone()),
            (None, Some(crs)) => {
                debug!(name, crs = %crs, "Assigning default CRS");
                Ok(grid.clone().with_crs(crs))
            }
            (None, None) => Err(GridProcessorError::CrsUndefined {
                component: "align",
                name: name.to_string(),
            }),
        }
    }

    /// The lattice every input is resampled onto.
    pub fn target_of(&self, reference: &Grid) -> Result<TargetGrid> {
        let reference = self.assign_crs(reference, "reference")?;
        let crs = reference.crs().ok_or_else(|| GridProcessorError::CrsUndefined {
            component: "align",
            name: "reference".to_string(),
        })?;
        Ok(TargetGrid::from_grid(&reference, crs))
    }

    /// Align one grid onto `target`.
    pub fn align_to(
        &self,
        target: &TargetGrid,
        input: &Grid,
        name: &str,
        method: InterpolationMethod,
    ) -> Result<Grid> {
        let input = self.assign_crs(input, name)?;
        let aligned = self.reprojector.reproject_resample(&input, target, method)?;

        if aligned.shape() != (target.rows, target.cols) {
            return Err(GridProcessorError::ShapeMismatch {
                component: "align",
                index: 0,
                expected: (target.rows, target.cols),
                found: aligned.shape(),
            });
        }

        debug!(
            name,
            method = %method,
            valid = aligned.valid_count(),
            cells = target.rows * target.cols,
            "Aligned grid"
        );
        Ok(aligned)
    }

    /// Align one grid onto the lattice of `reference`.
    pub fn align(
        &self,
        reference: &Grid,
        input: &Grid,
        name: &str,
        method: InterpolationMethod,
    ) -> Result<Grid> {
        let target = self.target_of(reference)?;
        self.align_to(&target, input, name, method)
    }

    /// Accept a decoded N-d raster as a 2D grid and align it.
    pub fn align_raw(
        &self,
        reference: &Grid,
        raw: RawRaster,
        name: &str,
        method: InterpolationMethod,
    ) -> Result<Grid> {
        let grid = Grid::try_from(raw)?;
        self.align(reference, &grid, name, method)
    }

    /// Align every input onto `reference`, returning them as a named stack.
    #[instrument(skip_all, fields(inputs = inputs.len()))]
    pub fn align_all(&self, reference: &Grid, inputs: &[AlignInput<'_>]) -> Result<LayerStack> {
        if inputs.is_empty() {
            return Err(GridProcessorError::EmptyInput { component: "align" });
        }
        let target = self.target_of(reference)?;
        let mut stack = LayerStack::new();
        for input in inputs {
            let aligned = self.align_to(&target, input.grid, input.name, input.method)?;
            stack.push(input.name, aligned)?;
        }
        Ok(stack)
    }
}
