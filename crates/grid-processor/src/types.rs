//! Core types for grid processing.

use serde::{Deserialize, Serialize};

use crate::error::{GridProcessorError, Result};

/// Interpolation method for grid resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    /// Nearest neighbor (preserves exact values).
    #[default]
    Nearest,
    /// Bilinear interpolation (smooth, slight value changes).
    Bilinear,
    /// Bicubic interpolation (smoothest, more compute).
    Cubic,
}

impl InterpolationMethod {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "bilinear" | "linear" => Self::Bilinear,
            "cubic" | "bicubic" => Self::Cubic,
            _ => Self::Nearest,
        }
    }
}

impl std::fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nearest => write!(f, "nearest"),
            Self::Bilinear => write!(f, "bilinear"),
            Self::Cubic => write!(f, "cubic"),
        }
    }
}

/// How overlapping tiles are resolved when mosaicking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Later tiles overwrite valid cells placed by earlier tiles.
    #[default]
    LastWins,
    /// The first valid value placed in a cell is kept.
    FirstWins,
}

impl OverlapPolicy {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().replace('-', "_").as_str() {
            "first_wins" | "first" => Self::FirstWins,
            _ => Self::LastWins,
        }
    }
}

/// Whether a variable's cells are class-like or a continuous field.
///
/// The kind picks the default resampling: categorical rasters (soil
/// classes, aspect) must not be blended across cells, continuous fields
/// (temperature) can be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    #[default]
    Categorical,
    Continuous,
}

/// One suitability input: its response-curve parameters and resampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    pub name: String,
    /// Value with score 1.
    pub optimal_value: f64,
    /// Standard deviation of the bell curve; must be > 0.
    pub tolerance: f64,
    #[serde(default)]
    pub kind: VariableKind,
    /// Overrides the kind's default resampling.
    #[serde(default)]
    pub interpolation: Option<InterpolationMethod>,
}

impl VariableSpec {
    /// Create a categorical variable spec, validating the tolerance.
    pub fn new(name: impl Into<String>, optimal_value: f64, tolerance: f64) -> Result<Self> {
        let spec = Self {
            name: name.into(),
            optimal_value,
            tolerance,
            kind: VariableKind::Categorical,
            interpolation: None,
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn continuous(mut self) -> Self {
        self.kind = VariableKind::Continuous;
        self
    }

    pub fn with_interpolation(mut self, method: InterpolationMethod) -> Self {
        self.interpolation = Some(method);
        self
    }

    /// Tolerance must be finite and strictly positive.
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(GridProcessorError::InvalidTolerance(self.tolerance));
        }
        if !self.optimal_value.is_finite() {
            return Err(GridProcessorError::invalid_parameter(
                "optimal_value",
                format!("{} must be finite", self.name),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolation_from_str() {
        assert_eq!(InterpolationMethod::from_str("BILINEAR"), InterpolationMethod::Bilinear);
        assert_eq!(InterpolationMethod::from_str("bicubic"), InterpolationMethod::Cubic);
        assert_eq!(InterpolationMethod::from_str("other"), InterpolationMethod::Nearest);
    }

    #[test]
    fn test_overlap_policy_from_str() {
        assert_eq!(OverlapPolicy::from_str("first-wins"), OverlapPolicy::FirstWins);
        assert_eq!(OverlapPolicy::from_str("last_wins"), OverlapPolicy::LastWins);
    }

    #[test]
    fn test_variable_spec_rejects_bad_tolerance() {
        assert!(VariableSpec::new("ph", 6.5, 0.0).is_err());
        assert!(VariableSpec::new("ph", 6.5, -1.0).is_err());
        assert!(VariableSpec::new("ph", 6.5, f64::NAN).is_err());
        assert!(VariableSpec::new("ph", 6.5, 1.0).is_ok());
    }

    #[test]
    fn test_variable_spec_serde_defaults() {
        let spec: VariableSpec =
            serde_json::from_str(r#"{"name":"max_temp","optimal_value":75.0,"tolerance":10.0}"#)
                .unwrap();
        assert_eq!(spec.kind, VariableKind::Categorical);
        assert_eq!(spec.interpolation, None);
    }
}
