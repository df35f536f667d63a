//! Segment-wise `exp(−i H Δt)|ψ⟩` by Lanczos projection.
//!
//! For each segment `[t_k, t_{k+1})` the Hamiltonian is frozen at `t_k` and
//! the action of its exponential on the current state is approximated in
//! the Krylov space `span{ψ, Hψ, …, H^{m−1}ψ}`:
//!
//!   exp(−i H Δt) ψ ≈ β₀ V_m exp(−i T_m Δt) e₁
//!
//! where `V_m` holds the orthonormal Lanczos vectors and `T_m` is the real
//! symmetric tridiagonal projection of `H`. `T_m` is diagonalised exactly,
//! and the segment is rejected when the a-posteriori residual
//! `β₀ · β_m · |(exp(−i T_m Δt) e₁)_{m−1}|` exceeds the configured tolerance.

use num_complex::Complex64;
use tracing::debug;

use super::linalg::{axpy, dot, norm, symmetric_tridiagonal_eigen};
use super::{Evolution, Propagator, check_basis, check_norm};
use crate::config::KrylovConfig;
use crate::error::{Instability, SimError, SimResult};
use crate::hamiltonian::{Drive, RydbergHamiltonian};
use crate::state::State;

/// Relative size of the next Lanczos residual below which the Krylov space
/// is treated as invariant.
const BREAKDOWN_TOLERANCE: f64 = 1e-12;

/// Piecewise-constant propagator over an explicit checkpoint list.
#[derive(Debug, Clone)]
pub struct KrylovPropagator {
    checkpoints: Vec<f64>,
    config: KrylovConfig,
}

impl KrylovPropagator {
    /// Segments between consecutive `checkpoints`, which must start at zero
    /// and increase strictly.
    pub fn new(checkpoints: Vec<f64>, config: KrylovConfig) -> SimResult<Self> {
        validate_checkpoints(&checkpoints)?;
        config.validate()?;
        Ok(Self {
            checkpoints,
            config,
        })
    }

    /// `n_segments` equal segments covering `[0, duration]`.
    pub fn uniform(duration: f64, n_segments: usize, config: KrylovConfig) -> SimResult<Self> {
        if n_segments == 0 {
            return Err(SimError::InvalidTimeSpec(
                "at least one segment is required".into(),
            ));
        }
        if !(duration.is_finite() && duration > 0.0) {
            return Err(SimError::InvalidTimeSpec(format!(
                "duration must be positive and finite, got {duration}"
            )));
        }
        let dt = duration / n_segments as f64;
        let checkpoints = (0..=n_segments)
            .map(|k| if k == n_segments { duration } else { k as f64 * dt })
            .collect();
        Self::new(checkpoints, config)
    }

    /// One segment per interval between the breakpoints of either control
    /// waveform. Exact for piecewise-constant controls.
    pub fn from_waveform_breakpoints(
        hamiltonian: &RydbergHamiltonian,
        config: KrylovConfig,
    ) -> SimResult<Self> {
        let mut checkpoints: Vec<f64> = hamiltonian
            .rabi()
            .breakpoints()
            .iter()
            .chain(hamiltonian.detuning().breakpoints())
            .copied()
            .collect();
        checkpoints.sort_by(f64::total_cmp);
        let tolerance = 1e-12 * hamiltonian.duration();
        checkpoints.dedup_by(|b, a| (*b - *a).abs() <= tolerance);
        Self::new(checkpoints, config)
    }

    /// Split every segment into `factor` equal parts. Callers shrink segments
    /// this way after a [`Instability::KrylovResidual`] failure.
    pub fn subdivided(&self, factor: usize) -> SimResult<Self> {
        if factor == 0 {
            return Err(SimError::InvalidTimeSpec(
                "subdivision factor must be at least 1".into(),
            ));
        }
        let mut checkpoints = Vec::with_capacity((self.checkpoints.len() - 1) * factor + 1);
        for pair in self.checkpoints.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let dt = (b - a) / factor as f64;
            for k in 0..factor {
                checkpoints.push(a + k as f64 * dt);
            }
        }
        if let Some(&last) = self.checkpoints.last() {
            checkpoints.push(last);
        }
        Self::new(checkpoints, self.config.clone())
    }

    /// The checkpoint list.
    pub fn checkpoints(&self) -> &[f64] {
        &self.checkpoints
    }

    /// Number of segments.
    pub fn n_segments(&self) -> usize {
        self.checkpoints.len() - 1
    }

    /// Advance `psi` over one segment of length `dt` with the controls
    /// frozen at `drive`.
    fn step(
        &self,
        hamiltonian: &RydbergHamiltonian,
        drive: Drive,
        time: f64,
        dt: f64,
        psi: &[Complex64],
    ) -> SimResult<Vec<Complex64>> {
        let dim = psi.len();
        let zero = Complex64::new(0.0, 0.0);
        let beta0 = norm(psi);
        if beta0 == 0.0 {
            return Ok(psi.to_vec());
        }

        let max_m = self.config.dimension.min(dim);
        let mut basis: Vec<Vec<Complex64>> = Vec::with_capacity(max_m);
        basis.push(psi.iter().map(|a| *a / beta0).collect());
        let mut alpha = Vec::with_capacity(max_m);
        let mut beta: Vec<f64> = Vec::with_capacity(max_m);
        let mut w = vec![zero; dim];
        let mut residual_beta = 0.0;

        loop {
            let j = basis.len() - 1;
            hamiltonian.apply_drive(drive, &basis[j], &mut w)?;
            let a = dot(&basis[j], &w).re;
            alpha.push(a);

            // Full reorthogonalisation against every Lanczos vector so far.
            for v in &basis {
                let c = dot(v, &w);
                axpy(-c, v, &mut w);
            }
            let b = norm(&w);

            let scale = a.abs() + beta.last().copied().unwrap_or(0.0);
            if b <= BREAKDOWN_TOLERANCE * scale.max(1.0) {
                // Invariant subspace: the projection is exact.
                break;
            }
            if basis.len() == max_m {
                residual_beta = b;
                break;
            }
            beta.push(b);
            basis.push(w.iter().map(|x| *x / b).collect());
        }

        let m = basis.len();
        let (values, vectors) = symmetric_tridiagonal_eigen(&alpha, &beta).ok_or_else(|| {
            SimError::NumericalInstability {
                time,
                cause: Instability::KrylovResidual {
                    estimate: f64::NAN,
                    tolerance: self.config.tolerance,
                    dimension: m,
                },
            }
        })?;

        // y = Q exp(−iΛΔt) Qᵀ e₁
        let phases: Vec<Complex64> = (0..m)
            .map(|l| Complex64::from_polar(vectors[[0, l]], -values[l] * dt))
            .collect();
        let y: Vec<Complex64> = (0..m)
            .map(|k| (0..m).map(|l| phases[l] * vectors[[k, l]]).sum())
            .collect();

        // Exact when the whole space is spanned.
        if residual_beta > 0.0 && m < dim {
            let estimate = beta0 * residual_beta * y[m - 1].norm();
            if estimate.is_nan() || estimate > self.config.tolerance {
                return Err(SimError::NumericalInstability {
                    time,
                    cause: Instability::KrylovResidual {
                        estimate,
                        tolerance: self.config.tolerance,
                        dimension: m,
                    },
                });
            }
        }

        let mut out = vec![zero; dim];
        for (v, &yk) in basis.iter().zip(&y) {
            axpy(yk * beta0, v, &mut out);
        }
        Ok(out)
    }
}

fn validate_checkpoints(checkpoints: &[f64]) -> SimResult<()> {
    if checkpoints.len() < 2 {
        return Err(SimError::InvalidTimeSpec(
            "at least two checkpoints are required".into(),
        ));
    }
    if checkpoints[0] != 0.0 {
        return Err(SimError::InvalidTimeSpec(format!(
            "checkpoints must start at 0, got {}",
            checkpoints[0]
        )));
    }
    if checkpoints.iter().any(|t| !t.is_finite()) {
        return Err(SimError::InvalidTimeSpec(
            "checkpoints must be finite".into(),
        ));
    }
    if let Some(k) = checkpoints.windows(2).position(|w| w[1] <= w[0]) {
        return Err(SimError::InvalidTimeSpec(format!(
            "checkpoints must increase strictly: t[{}] = {} follows {}",
            k + 1,
            checkpoints[k + 1],
            checkpoints[k]
        )));
    }
    Ok(())
}

impl Propagator for KrylovPropagator {
    fn evolve(&self, hamiltonian: &RydbergHamiltonian, initial: &State) -> SimResult<Evolution> {
        check_basis(hamiltonian, initial)?;
        let cfg = &self.config;
        let end = self.checkpoints[self.checkpoints.len() - 1];
        let limit = hamiltonian.duration();
        if end > limit * (1.0 + 1e-12) {
            return Err(SimError::InvalidTimeSpec(format!(
                "last checkpoint {end} lies beyond the waveform domain [0, {limit}]"
            )));
        }
        check_norm(0.0, initial.norm_sqr(), cfg.norm_tolerance)?;

        let mut trajectory = Vec::new();
        if cfg.record_trajectory {
            trajectory.push((0.0, initial.clone()));
        }

        let mut psi = initial.amplitudes().to_vec();
        for pair in self.checkpoints.windows(2) {
            let (start, stop) = (pair[0], pair[1]);
            let drive = hamiltonian.drive(start)?;
            psi = self.step(hamiltonian, drive, start, stop - start, &psi)?;

            let norm_sqr: f64 = psi.iter().map(Complex64::norm_sqr).sum();
            check_norm(stop, norm_sqr, cfg.norm_tolerance)?;
            if cfg.record_trajectory {
                trajectory.push((stop, initial.with_amplitudes(psi.clone())));
            }
        }

        debug!(
            segments = self.n_segments(),
            dimension = cfg.dimension,
            dim = initial.dim(),
            "Krylov propagation finished"
        );

        Ok(Evolution {
            state: initial.with_amplitudes(psi),
            trajectory,
            steps: self.n_segments(),
        })
    }
}
