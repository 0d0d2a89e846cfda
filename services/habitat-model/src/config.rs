//! Model file loading.
//!
//! A model file is YAML describing one site: its bounds, where the layers
//! live, and the response curve for every variable.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use grid_processor::{BoundingBox, InterpolationMethod, VariableKind, VariableSpec};
use renderer::{Color, Colormap, RenderContext};
use serde::Deserialize;
use tracing::{debug, info};

/// Root of a model YAML file.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelFile {
    pub site: SiteConfig,
    /// Directory that layer paths are relative to
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Name of the variable whose lattice every layer is aligned to
    pub reference: String,
    /// Base name of the composite written to `data_dir`
    pub output: String,
    /// PNG plots are written here when set
    #[serde(default)]
    pub plots_dir: Option<PathBuf>,
    pub variables: Vec<VariableConfig>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    /// `[min_lon, min_lat, max_lon, max_lat]`
    pub bounds: [f64; 4],
}

impl SiteConfig {
    pub fn bbox(&self) -> BoundingBox {
        let [min_x, min_y, max_x, max_y] = self.bounds;
        BoundingBox::new(min_x, min_y, max_x, max_y)
    }
}

/// Where a variable's raw grid comes from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSource {
    /// One grid store
    Grid { path: PathBuf },
    /// A directory of tiles mosaicked and clipped to the site
    Tiles {
        dir: PathBuf,
        #[serde(default = "default_tile_suffix")]
        suffix: String,
    },
    /// Climate time slices averaged into one grid
    Climate {
        slices: Vec<PathBuf>,
        /// Convert from Kelvin to Fahrenheit
        #[serde(default)]
        kelvin: bool,
    },
    /// Aspect derived from another variable's elevation grid
    Aspect { from: String },
}

fn default_tile_suffix() -> String {
    ".zarr".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariableConfig {
    pub name: String,
    /// Written as a single-key map, e.g. `{ grid: { path: dem.zarr } }`
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub source: LayerSource,
    pub optimal: f64,
    pub tolerance: f64,
    #[serde(default)]
    pub kind: VariableKind,
    #[serde(default)]
    pub resampling: Option<InterpolationMethod>,
    #[serde(default)]
    pub plot: PlotConfig,
}

impl VariableConfig {
    pub fn spec(&self) -> Result<VariableSpec> {
        let mut spec = VariableSpec::new(self.name.as_str(), self.optimal, self.tolerance)
            .with_context(|| format!("Invalid response curve for '{}'", self.name))?;
        spec.kind = self.kind;
        spec.interpolation = self.resampling;
        Ok(spec)
    }

    pub fn derived_from(&self) -> Option<&str> {
        match &self.source {
            LayerSource::Aspect { from } => Some(from),
            _ => None,
        }
    }
}

/// How a layer is plotted.
#[derive(Debug, Clone, Deserialize)]
pub struct PlotConfig {
    #[serde(default)]
    pub colormap: Colormap,
    #[serde(default = "default_boundary_color")]
    pub boundary_color: String,
    #[serde(default = "default_scale")]
    pub scale: usize,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            colormap: Colormap::default(),
            boundary_color: default_boundary_color(),
            scale: default_scale(),
        }
    }
}

fn default_boundary_color() -> String {
    "black".to_string()
}

fn default_scale() -> usize {
    4
}

impl PlotConfig {
    pub fn context(&self, site: &BoundingBox) -> Result<RenderContext> {
        let color = Color::parse(&self.boundary_color)
            .with_context(|| format!("Unknown boundary color '{}'", self.boundary_color))?;
        Ok(RenderContext::new(self.colormap)
            .with_boundary(*site, color)
            .with_scale(self.scale))
    }
}

impl ModelFile {
    /// Load and validate a model file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model file: {}", path.display()))?;
        let mut model = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse model file: {}", path.display()))?;

        // Relative data directories are relative to the model file.
        if model.data_dir.is_relative() {
            if let Some(parent) = path.parent() {
                model.data_dir = parent.join(&model.data_dir);
            }
        }

        info!(
            site = %model.site.name,
            variables = model.variables.len(),
            data_dir = %model.data_dir.display(),
            "Loaded model file"
        );
        Ok(model)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let model: Self = serde_yaml::from_str(content)?;
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.site.bbox().is_valid() {
            bail!("Site bounds {:?} are not a valid box", self.site.bounds);
        }
        if self.variables.is_empty() {
            bail!("Model has no variables");
        }

        let mut names = HashSet::new();
        for var in &self.variables {
            if !names.insert(var.name.as_str()) {
                bail!("Duplicate variable '{}'", var.name);
            }
            var.spec()?;
        }

        if !names.contains(self.reference.as_str()) {
            bail!("Reference '{}' is not a variable", self.reference);
        }

        for var in &self.variables {
            if let Some(from) = var.derived_from() {
                let base = self.variable(from).with_context(|| {
                    format!("'{}' is derived from unknown variable '{}'", var.name, from)
                })?;
                if base.derived_from().is_some() {
                    bail!("'{}' is derived from derived variable '{}'", var.name, from);
                }
            }
        }

        debug!(variables = ?names, "Model file validated");
        Ok(())
    }

    pub fn variable(&self, name: &str) -> Option<&VariableConfig> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Resolve a path from the model file against `data_dir`.
    pub fn data_path(&self, path: &Path) -> PathBuf {
        self.data_dir.join(path)
    }

    pub fn output_path(&self, suffix: &str) -> PathBuf {
        self.data_dir.join(format!("{}{}", self.output, suffix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = r#"
site:
  name: buffalo-gap
  bounds: [-105.5, 39.5, -104.3, 40.2]
data_dir: data
reference: elevation
output: buffalo-gap-suitability
plots_dir: plots
variables:
  - name: elevation
    source: { grid: { path: elevation.zarr } }
    optimal: 1600
    tolerance: 400
    kind: continuous
    plot: { colormap: terrain }
  - name: aspect
    source: { aspect: { from: elevation } }
    optimal: 180
    tolerance: 90
  - name: soil_ph
    source: { tiles: { dir: soil_ph } }
    optimal: 6.5
    tolerance: 1.0
    resampling: nearest
    plot: { boundary_color: lightblue }
  - name: max_temp
    source:
      climate:
        slices: [tasmax_2036.zarr, tasmax_2041.zarr]
        kelvin: true
    optimal: 75
    tolerance: 10
    kind: continuous
"#;

    #[test]
    fn test_parse_model_file() {
        let model = ModelFile::from_yaml(MODEL).unwrap();
        assert_eq!(model.site.name, "buffalo-gap");
        assert_eq!(model.variables.len(), 4);
        assert_eq!(model.reference, "elevation");
        assert_eq!(model.plots_dir, Some(PathBuf::from("plots")));

        let soil = model.variable("soil_ph").unwrap();
        assert_eq!(
            soil.source,
            LayerSource::Tiles {
                dir: PathBuf::from("soil_ph"),
                suffix: ".zarr".to_string()
            }
        );
        let spec = soil.spec().unwrap();
        assert_eq!(spec.kind, VariableKind::Categorical);
        assert_eq!(spec.interpolation, Some(InterpolationMethod::Nearest));
        assert_eq!(soil.plot.boundary_color, "lightblue");

        let elevation = model.variable("elevation").unwrap();
        assert_eq!(elevation.plot.colormap, Colormap::Terrain);
        assert_eq!(elevation.spec().unwrap().kind, VariableKind::Continuous);

        assert_eq!(model.variable("aspect").unwrap().derived_from(), Some("elevation"));
        assert!(matches!(
            model.variable("max_temp").unwrap().source,
            LayerSource::Climate { kelvin: true, .. }
        ));
    }

    #[test]
    fn test_load_resolves_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.yaml");
        std::fs::write(&path, MODEL).unwrap();

        let model = ModelFile::load(&path).unwrap();
        assert_eq!(model.data_dir, dir.path().join("data"));
        assert_eq!(
            model.output_path(".zarr"),
            dir.path().join("data").join("buffalo-gap-suitability.zarr")
        );
    }

    #[test]
    fn test_layer_source_map_syntax() {
        let var: VariableConfig = serde_yaml::from_str(
            "name: max_temp\nsource:\n  climate:\n    slices: [a.zarr]\noptimal: 75\ntolerance: 10\n",
        )
        .unwrap();
        assert_eq!(
            var.source,
            LayerSource::Climate {
                slices: vec![PathBuf::from("a.zarr")],
                kelvin: false
            }
        );

        let unknown = serde_yaml::from_str::<VariableConfig>(
            "name: x\nsource: { raster: { path: a.zarr } }\noptimal: 1\ntolerance: 1\n",
        );
        assert!(unknown.is_err());
    }

    #[test]
    fn test_unknown_reference_rejected() {
        let yaml = MODEL.replace("reference: elevation", "reference: slope");
        assert!(ModelFile::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_bad_tolerance_rejected() {
        let yaml = MODEL.replace("tolerance: 90", "tolerance: 0");
        let err = ModelFile::from_yaml(&yaml).unwrap_err();
        assert!(format!("{:#}", err).contains("aspect"));
    }

    #[test]
    fn test_duplicate_variable_rejected() {
        let yaml = MODEL.replace("name: soil_ph", "name: elevation");
        assert!(ModelFile::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_derived_from_unknown_rejected() {
        let yaml = MODEL.replace("from: elevation", "from: dem");
        assert!(ModelFile::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_plot_context() {
        let plot = PlotConfig::default();
        let site = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let ctx = plot.context(&site).unwrap();
        assert_eq!(ctx.boundary, Some(site));
        assert_eq!(ctx.scale, 4);

        let bad = PlotConfig {
            boundary_color: "chartreuse-ish".to_string(),
            ..Default::default()
        };
        assert!(bad.context(&site).is_err());
    }
}
