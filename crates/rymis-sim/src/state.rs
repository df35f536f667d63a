//! Complex state vectors over a [`Basis`].

use num_complex::Complex64;

use crate::error::{SimError, SimResult};
use crate::subspace::Basis;

/// A state vector; amplitude `i` belongs to basis position `i`.
///
/// Propagators return fresh states and never modify their input.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    basis: Basis,
    amplitudes: Vec<Complex64>,
}

impl State {
    /// All atoms in the ground state (the empty configuration).
    pub fn ground(basis: Basis) -> Self {
        // The empty configuration sits at position 0 in both basis kinds.
        let mut amplitudes = vec![Complex64::new(0.0, 0.0); basis.dim()];
        amplitudes[0] = Complex64::new(1.0, 0.0);
        Self { basis, amplitudes }
    }

    /// Wrap caller-supplied amplitudes.
    pub fn from_amplitudes(basis: Basis, amplitudes: Vec<Complex64>) -> SimResult<Self> {
        if amplitudes.len() != basis.dim() {
            return Err(SimError::DimensionMismatch {
                expected: basis.dim(),
                got: amplitudes.len(),
            });
        }
        if amplitudes.iter().any(|a| !a.re.is_finite() || !a.im.is_finite()) {
            return Err(SimError::InvalidParameterVector(
                "state amplitudes must be finite".into(),
            ));
        }
        Ok(Self { basis, amplitudes })
    }

    /// Basis the amplitudes refer to.
    pub fn basis(&self) -> &Basis {
        &self.basis
    }

    /// Amplitudes in basis order.
    pub fn amplitudes(&self) -> &[Complex64] {
        &self.amplitudes
    }

    /// Number of amplitudes.
    pub fn dim(&self) -> usize {
        self.amplitudes.len()
    }

    /// Squared 2-norm.
    pub fn norm_sqr(&self) -> f64 {
        self.amplitudes.iter().map(Complex64::norm_sqr).sum()
    }

    /// Born-rule probabilities in basis order.
    pub fn probabilities(&self) -> Vec<f64> {
        self.amplitudes.iter().map(Complex64::norm_sqr).collect()
    }

    /// `⟨self|other⟩`.
    pub fn overlap(&self, other: &State) -> SimResult<Complex64> {
        if self.basis != other.basis {
            return Err(SimError::DimensionMismatch {
                expected: self.dim(),
                got: other.dim(),
            });
        }
        Ok(self
            .amplitudes
            .iter()
            .zip(&other.amplitudes)
            .map(|(a, b)| a.conj() * b)
            .sum())
    }

    pub(crate) fn with_amplitudes(&self, amplitudes: Vec<Complex64>) -> Self {
        debug_assert_eq!(amplitudes.len(), self.amplitudes.len());
        Self {
            basis: self.basis.clone(),
            amplitudes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SubspaceConfig;

    #[test]
    fn ground_state_is_normalised() {
        let basis = Basis::full(3, &SubspaceConfig::default()).unwrap();
        let s = State::ground(basis);
        assert_eq!(s.dim(), 8);
        assert_eq!(s.norm_sqr(), 1.0);
        assert_eq!(s.probabilities()[0], 1.0);
    }

    #[test]
    fn from_amplitudes_checks_dimension() {
        let basis = Basis::full(2, &SubspaceConfig::default()).unwrap();
        let err = State::from_amplitudes(basis, vec![Complex64::new(1.0, 0.0); 3]).unwrap_err();
        assert!(matches!(err, SimError::DimensionMismatch { expected: 4, got: 3 }));
    }

    #[test]
    fn overlap_with_self_is_norm() {
        let basis = Basis::full(1, &SubspaceConfig::default()).unwrap();
        let h = std::f64::consts::FRAC_1_SQRT_2;
        let s = State::from_amplitudes(basis, vec![Complex64::new(h, 0.0), Complex64::new(0.0, h)])
            .unwrap();
        let o = s.overlap(&s).unwrap();
        assert!((o.re - 1.0).abs() < 1e-15);
        assert!(o.im.abs() < 1e-15);
    }
}
