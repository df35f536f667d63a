//! Time evolution under `i d|ψ⟩/dt = H(t)|ψ⟩`.
//!
//! Two interchangeable propagators implement [`Propagator`]:
//!
//! - [`OdePropagator`]: adaptive Dormand–Prince 5(4) integration, for
//!   smoothly varying controls
//! - [`KrylovPropagator`]: `exp(−i H Δt)|ψ⟩` per checkpoint segment via a
//!   Lanczos projection, for piecewise-constant controls
//!
//! Both borrow their inputs and return a new [`State`]; both fail with
//! [`SimError::NumericalInstability`](crate::SimError::NumericalInstability)
//! instead of returning a state whose norm has drifted.

pub mod krylov;
mod linalg;
pub mod ode;

pub use krylov::KrylovPropagator;
pub use ode::OdePropagator;

use crate::error::{Instability, SimError, SimResult};
use crate::hamiltonian::RydbergHamiltonian;
use crate::state::State;

/// Result of a propagation.
#[derive(Debug, Clone)]
pub struct Evolution {
    /// State at the end time.
    pub state: State,
    /// `(t, state)` checkpoints, when requested in the configuration.
    pub trajectory: Vec<(f64, State)>,
    /// Accepted integration steps or Krylov segments.
    pub steps: usize,
}

/// A method of evolving a state under a Hamiltonian.
pub trait Propagator {
    /// Evolve `initial` under `hamiltonian`, returning a new state.
    fn evolve(&self, hamiltonian: &RydbergHamiltonian, initial: &State) -> SimResult<Evolution>;
}

/// Reject states whose basis does not match the operator.
fn check_basis(hamiltonian: &RydbergHamiltonian, initial: &State) -> SimResult<()> {
    if initial.basis() != hamiltonian.basis() {
        return Err(SimError::DimensionMismatch {
            expected: hamiltonian.dim(),
            got: initial.dim(),
        });
    }
    Ok(())
}

/// Fail if `norm_sqr` is outside `1 ± tolerance`.
fn check_norm(time: f64, norm_sqr: f64, tolerance: f64) -> SimResult<()> {
    if (norm_sqr - 1.0).abs() > tolerance || !norm_sqr.is_finite() {
        return Err(SimError::NumericalInstability {
            time,
            cause: Instability::NormDrift {
                norm_sqr,
                tolerance,
            },
        });
    }
    Ok(())
}
