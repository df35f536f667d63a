//! Error types for the simulation core.

use thiserror::Error;

/// Errors produced by geometry, waveform, subspace, Hamiltonian and
/// propagation operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SimError {
    /// Non-increasing clocks, length mismatch, non-finite samples, or
    /// evaluation outside the waveform's domain.
    #[error("Invalid waveform: {0}")]
    InvalidWaveformSpec(String),

    /// Non-positive threshold, coincident atoms, or malformed edge list.
    #[error("Invalid graph: {0}")]
    InvalidGraphSpec(String),

    /// Vertex count exceeds the enumeration safety bound.
    #[error("{n_vertices} vertices exceeds the enumeration limit of {limit}")]
    SubspaceOverflow {
        /// Number of vertices in the offending graph.
        n_vertices: usize,
        /// Configured safety bound.
        limit: usize,
    },

    /// Enumeration produced more configurations than the basis size bound.
    #[error("blockade subspace of {n_vertices} vertices exceeds {limit} configurations")]
    BasisOverflow {
        /// Number of vertices in the offending graph.
        n_vertices: usize,
        /// Configured basis size bound.
        limit: usize,
    },

    /// Propagation could not keep the state within tolerance.
    #[error("Numerical instability at t = {time}: {cause}")]
    NumericalInstability {
        /// Simulation time at which the failure was detected.
        time: f64,
        /// What went wrong.
        cause: Instability,
    },

    /// Wrong arity, non-finite entries or a non-positive duration.
    #[error("Invalid parameter vector: {0}")]
    InvalidParameterVector(String),

    /// Checkpoint list or end time does not describe a valid evolution window.
    #[error("Invalid time specification: {0}")]
    InvalidTimeSpec(String),

    /// A state vector does not live in the Hamiltonian's basis.
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Dimension required by the operator.
        expected: usize,
        /// Dimension supplied.
        got: usize,
    },

    /// Malformed configuration document.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// The specific failure behind a [`SimError::NumericalInstability`].
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Instability {
    /// Squared norm left the tolerance band around one.
    NormDrift {
        /// Observed squared norm.
        norm_sqr: f64,
        /// Allowed deviation from one.
        tolerance: f64,
    },

    /// Krylov residual estimate above tolerance; shrink the segment or raise
    /// the subspace dimension.
    KrylovResidual {
        /// A-posteriori error estimate for the segment.
        estimate: f64,
        /// Configured tolerance.
        tolerance: f64,
        /// Krylov dimension that was used.
        dimension: usize,
    },

    /// Adaptive stepping shrank the step below the representable minimum.
    StepSizeUnderflow {
        /// Rejected step size.
        step: f64,
    },

    /// Adaptive stepping ran out of its step budget.
    StepBudgetExhausted {
        /// Number of attempted steps.
        steps: usize,
    },
}

impl std::fmt::Display for Instability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NormDrift {
                norm_sqr,
                tolerance,
            } => write!(
                f,
                "squared norm {norm_sqr:.3e} drifted more than {tolerance:.1e} from 1"
            ),
            Self::KrylovResidual {
                estimate,
                tolerance,
                dimension,
            } => write!(
                f,
                "Krylov residual {estimate:.3e} exceeds {tolerance:.1e} (dimension {dimension})"
            ),
            Self::StepSizeUnderflow { step } => write!(f, "step size underflow ({step:.3e})"),
            Self::StepBudgetExhausted { steps } => write!(f, "step budget of {steps} exhausted"),
        }
    }
}

impl SimError {
    /// True for failures of the numerical integrators rather than of the
    /// inputs.
    pub fn is_numerical(&self) -> bool {
        matches!(self, Self::NumericalInstability { .. })
    }
}

/// Result type for simulation operations.
pub type SimResult<T> = Result<T, SimError>;
