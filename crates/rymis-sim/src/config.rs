//! Simulation configuration.
//!
//! Every field has a default, so a YAML document only needs to name the
//! values it changes:
//!
//! ```yaml
//! ode:
//!   atol: 1.0e-10
//!   rtol: 1.0e-8
//! krylov:
//!   dimension: 20
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Complete simulation configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimConfig {
    /// Basis enumeration limits.
    #[serde(default)]
    pub subspace: SubspaceConfig,

    /// Adaptive ODE propagator settings.
    #[serde(default)]
    pub ode: OdeConfig,

    /// Krylov propagator settings.
    #[serde(default)]
    pub krylov: KrylovConfig,
}

/// Limits for basis construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubspaceConfig {
    /// Largest vertex count accepted for enumeration.
    #[serde(default = "default_max_vertices")]
    pub max_vertices: usize,

    /// Largest vertex count accepted for a full 2^n space.
    #[serde(default = "default_max_full_space_sites")]
    pub max_full_space_sites: usize,

    /// Largest number of configurations enumeration may produce.
    #[serde(default = "default_max_basis_size")]
    pub max_basis_size: usize,

    /// Basis size above which construction logs a warning.
    #[serde(default = "default_warn_basis_size")]
    pub warn_basis_size: usize,
}

/// Dormand–Prince propagator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OdeConfig {
    /// Absolute error tolerance per amplitude.
    #[serde(default = "default_ode_atol")]
    pub atol: f64,

    /// Relative error tolerance per amplitude.
    #[serde(default = "default_ode_rtol")]
    pub rtol: f64,

    /// First trial step; `None` picks a hundredth of the window.
    #[serde(default)]
    pub initial_step: Option<f64>,

    /// Maximum number of attempted steps.
    #[serde(default = "default_ode_max_steps")]
    pub max_steps: usize,

    /// Allowed deviation of the squared norm from one.
    #[serde(default = "default_norm_tolerance")]
    pub norm_tolerance: f64,

    /// Keep every accepted step in the returned trajectory.
    #[serde(default)]
    pub record_trajectory: bool,
}

/// Krylov propagator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KrylovConfig {
    /// Maximum Krylov subspace dimension per segment.
    #[serde(default = "default_krylov_dimension")]
    pub dimension: usize,

    /// Largest accepted residual estimate per segment.
    #[serde(default = "default_krylov_tolerance")]
    pub tolerance: f64,

    /// Allowed deviation of the squared norm from one.
    #[serde(default = "default_norm_tolerance")]
    pub norm_tolerance: f64,

    /// Keep the state at every checkpoint in the returned trajectory.
    #[serde(default)]
    pub record_trajectory: bool,
}

fn default_max_vertices() -> usize {
    32
}

fn default_max_full_space_sites() -> usize {
    20
}

fn default_max_basis_size() -> usize {
    1 << 24
}

fn default_warn_basis_size() -> usize {
    1 << 20
}

fn default_ode_atol() -> f64 {
    1e-10
}

fn default_ode_rtol() -> f64 {
    1e-10
}

fn default_ode_max_steps() -> usize {
    1_000_000
}

fn default_norm_tolerance() -> f64 {
    1e-6
}

fn default_krylov_dimension() -> usize {
    30
}

fn default_krylov_tolerance() -> f64 {
    1e-8
}

impl Default for SubspaceConfig {
    fn default() -> Self {
        Self {
            max_vertices: default_max_vertices(),
            max_full_space_sites: default_max_full_space_sites(),
            max_basis_size: default_max_basis_size(),
            warn_basis_size: default_warn_basis_size(),
        }
    }
}

impl Default for OdeConfig {
    fn default() -> Self {
        Self {
            atol: default_ode_atol(),
            rtol: default_ode_rtol(),
            initial_step: None,
            max_steps: default_ode_max_steps(),
            norm_tolerance: default_norm_tolerance(),
            record_trajectory: false,
        }
    }
}

impl Default for KrylovConfig {
    fn default() -> Self {
        Self {
            dimension: default_krylov_dimension(),
            tolerance: default_krylov_tolerance(),
            norm_tolerance: default_norm_tolerance(),
            record_trajectory: false,
        }
    }
}

impl OdeConfig {
    /// Check that tolerances and limits are usable.
    pub fn validate(&self) -> SimResult<()> {
        positive("ode.atol", self.atol)?;
        positive("ode.rtol", self.rtol)?;
        positive("ode.norm_tolerance", self.norm_tolerance)?;
        if let Some(h) = self.initial_step {
            positive("ode.initial_step", h)?;
        }
        if self.max_steps == 0 {
            return Err(SimError::Config("ode.max_steps must be at least 1".into()));
        }
        Ok(())
    }
}

impl KrylovConfig {
    /// Check that tolerances and limits are usable.
    pub fn validate(&self) -> SimResult<()> {
        positive("krylov.tolerance", self.tolerance)?;
        positive("krylov.norm_tolerance", self.norm_tolerance)?;
        if self.dimension == 0 {
            return Err(SimError::Config(
                "krylov.dimension must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl SimConfig {
    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> SimResult<Self> {
        let config: Self =
            serde_yaml_ng::from_str(yaml).map_err(|e| SimError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SimError::Config(format!("{}: {e}", path.display())))?;
        Self::from_yaml_str(&text)
    }

    /// Render as YAML.
    pub fn to_yaml(&self) -> SimResult<String> {
        serde_yaml_ng::to_string(self).map_err(|e| SimError::Config(e.to_string()))
    }

    /// Check every section.
    pub fn validate(&self) -> SimResult<()> {
        if self.subspace.max_vertices == 0 || self.subspace.max_vertices > 64 {
            return Err(SimError::Config(format!(
                "subspace.max_vertices must be in 1..=64, got {}",
                self.subspace.max_vertices
            )));
        }
        if self.subspace.max_basis_size == 0 {
            return Err(SimError::Config(
                "subspace.max_basis_size must be at least 1".into(),
            ));
        }
        self.ode.validate()?;
        self.krylov.validate()
    }
}

fn positive(name: &str, value: f64) -> SimResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SimError::Config(format!(
            "{name} must be positive and finite, got {value}"
        )))
    }
}
