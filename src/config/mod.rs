// src/config/mod.rs

//! Engine configuration loaded from TOML.
//!
//! Lookup order:
//! 1. An explicit path passed to [`load_config`]
//! 2. `$MATH_ENGINE_CONFIG`
//! 3. `~/.config/math-engine/config.toml`
//! 4. Built-in defaults (every key is optional)

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::calculus::{DEFAULT_INTERVALS, DEFAULT_STEP};
use crate::kernel::{DISPLAY_DECIMALS, MAX_DISPLAY_DECIMALS, PIVOT_TOLERANCE};
use crate::{EngineError, EngineResult};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub calculus: CalculusConfig,
    pub matrix: MatrixConfig,
    pub plot: PlotConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CalculusConfig {
    /// Half-width `h` of the central-difference stencil.
    pub derivative_step: f64,
    /// Simpson subintervals; odd values are bumped to the next even one.
    pub integral_intervals: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    pub pivot_tolerance: f64,
    pub display_decimals: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    pub curve_points: usize,
    pub surface_resolution: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Oldest records are evicted past this many.
    pub capacity: usize,
}

// --- Defaults ---

impl Default for CalculusConfig {
    fn default() -> Self {
        Self {
            derivative_step: DEFAULT_STEP,
            integral_intervals: DEFAULT_INTERVALS,
        }
    }
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            pivot_tolerance: PIVOT_TOLERANCE,
            display_decimals: DISPLAY_DECIMALS,
        }
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            curve_points: 400,
            surface_resolution: 50,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { capacity: 100 }
    }
}

impl EngineConfig {
    pub fn from_toml(text: &str) -> EngineResult<Self> {
        let config: EngineConfig = toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> EngineResult<()> {
        if !(self.calculus.derivative_step.is_finite() && self.calculus.derivative_step > 0.0) {
            return Err(EngineError::Config("calculus.derivative_step must be positive".into()));
        }
        if !(self.matrix.pivot_tolerance.is_finite() && self.matrix.pivot_tolerance >= 0.0) {
            return Err(EngineError::Config("matrix.pivot_tolerance must be non-negative".into()));
        }
        if self.matrix.display_decimals > MAX_DISPLAY_DECIMALS {
            return Err(EngineError::Config(format!(
                "matrix.display_decimals must be at most {}",
                MAX_DISPLAY_DECIMALS
            )));
        }
        if self.plot.curve_points < 2 || self.plot.surface_resolution < 2 {
            return Err(EngineError::Config("plot sample counts must be at least 2".into()));
        }
        if self.history.capacity == 0 {
            return Err(EngineError::Config("history.capacity must be at least 1".into()));
        }
        Ok(())
    }
}

/// Load config from disk. Returns defaults if no config file exists.
pub fn load_config(path: Option<&Path>) -> EngineResult<EngineConfig> {
    let resolved = path.map(Path::to_path_buf).or_else(config_path);

    if let Some(p) = &resolved {
        if p.exists() {
            let content = std::fs::read_to_string(p)
                .map_err(|e| EngineError::Config(format!("reading {}: {}", p.display(), e)))?;
            let config = EngineConfig::from_toml(&content).map_err(|e| match e {
                EngineError::Config(msg) => EngineError::Config(format!("parsing {}: {}", p.display(), msg)),
                other => other,
            })?;
            tracing::debug!(path = %p.display(), "loaded engine config");
            return Ok(config);
        }
        if path.is_some() {
            return Err(EngineError::Config(format!("{} does not exist", p.display())));
        }
    }

    Ok(EngineConfig::default())
}

/// Resolve the config file path.
fn config_path() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("MATH_ENGINE_CONFIG") {
        return Some(PathBuf::from(p));
    }
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".config").join("math-engine").join("config.toml"))
}
