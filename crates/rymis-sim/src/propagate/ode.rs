//! Adaptive Dormand–Prince 5(4) integration of the Schrödinger equation.
//!
//! Each step evaluates `f(t, ψ) = −i H(t) ψ` at seven stages (the last one
//! reused as the first stage of the next step) and compares the fifth-order
//! solution against the embedded fourth-order one. The step is accepted when
//! the scaled RMS error
//!
//!   sqrt(mean_i (|err_i| / (atol + rtol · max(|ψ_i|, |ψ'_i|)))²) ≤ 1
//!
//! and the next step size follows `h · 0.9 · err^(−1/5)`, clamped to
//! `[0.2, 5] · h`.

use num_complex::Complex64;
use tracing::debug;

use super::{Evolution, Propagator, check_basis, check_norm};
use crate::config::OdeConfig;
use crate::error::{Instability, SimError, SimResult};
use crate::hamiltonian::RydbergHamiltonian;
use crate::state::State;

const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

// Fifth-order weights (also the seventh stage's row).
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// Fifth minus fourth order weights.
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;

/// Continuous-time propagator from `t = 0` to a fixed end time.
#[derive(Debug, Clone)]
pub struct OdePropagator {
    end_time: f64,
    config: OdeConfig,
}

impl OdePropagator {
    /// Integrate over `[0, end_time]`.
    pub fn new(end_time: f64, config: OdeConfig) -> Self {
        Self { end_time, config }
    }

    /// Integrate over the whole waveform domain of `hamiltonian`.
    pub fn over(hamiltonian: &RydbergHamiltonian, config: OdeConfig) -> Self {
        Self::new(hamiltonian.duration(), config)
    }

    /// End of the integration window.
    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    fn validate(&self, hamiltonian: &RydbergHamiltonian) -> SimResult<()> {
        self.config.validate()?;
        let limit = hamiltonian.duration();
        if !self.end_time.is_finite()
            || self.end_time < 0.0
            || self.end_time > limit * (1.0 + 1e-12)
        {
            return Err(SimError::InvalidTimeSpec(format!(
                "end time {} outside the waveform domain [0, {limit}]",
                self.end_time
            )));
        }
        Ok(())
    }
}

/// `out = −i H(t) y`.
fn rhs(
    hamiltonian: &RydbergHamiltonian,
    t: f64,
    y: &[Complex64],
    out: &mut [Complex64],
) -> SimResult<()> {
    hamiltonian.apply(t, y, out)?;
    for v in out.iter_mut() {
        *v = Complex64::new(v.im, -v.re);
    }
    Ok(())
}

/// `out = y + h Σ_j a_j k_j`.
fn combine(out: &mut [Complex64], y: &[Complex64], h: f64, terms: &[(f64, &[Complex64])]) {
    out.copy_from_slice(y);
    for &(a, k) in terms {
        if a == 0.0 {
            continue;
        }
        let w = h * a;
        for (o, ki) in out.iter_mut().zip(k) {
            *o += *ki * w;
        }
    }
}

impl Propagator for OdePropagator {
    fn evolve(&self, hamiltonian: &RydbergHamiltonian, initial: &State) -> SimResult<Evolution> {
        self.validate(hamiltonian)?;
        check_basis(hamiltonian, initial)?;
        let cfg = &self.config;
        check_norm(0.0, initial.norm_sqr(), cfg.norm_tolerance)?;

        let end = self.end_time;
        let mut trajectory = Vec::new();
        if cfg.record_trajectory {
            trajectory.push((0.0, initial.clone()));
        }
        if end == 0.0 {
            return Ok(Evolution {
                state: initial.clone(),
                trajectory,
                steps: 0,
            });
        }

        let dim = initial.dim();
        let zero = Complex64::new(0.0, 0.0);
        let mut y = initial.amplitudes().to_vec();
        let mut y_new = vec![zero; dim];
        let mut stage = vec![zero; dim];
        let mut k1 = vec![zero; dim];
        let mut k2 = vec![zero; dim];
        let mut k3 = vec![zero; dim];
        let mut k4 = vec![zero; dim];
        let mut k5 = vec![zero; dim];
        let mut k6 = vec![zero; dim];
        let mut k7 = vec![zero; dim];

        let mut t = 0.0;
        let mut h = cfg.initial_step.unwrap_or(end / 100.0).min(end);
        let min_step = 16.0 * f64::EPSILON * end;
        let mut attempts = 0usize;
        let mut accepted = 0usize;

        rhs(hamiltonian, t, &y, &mut k1)?;

        while t < end {
            if attempts >= cfg.max_steps {
                return Err(SimError::NumericalInstability {
                    time: t,
                    cause: Instability::StepBudgetExhausted { steps: attempts },
                });
            }
            attempts += 1;

            let last = t + h >= end;
            let step = if last { end - t } else { h };

            combine(&mut stage, &y, step, &[(A21, &k1[..])]);
            rhs(hamiltonian, t + C2 * step, &stage, &mut k2)?;
            combine(&mut stage, &y, step, &[(A31, &k1[..]), (A32, &k2[..])]);
            rhs(hamiltonian, t + C3 * step, &stage, &mut k3)?;
            combine(&mut stage, &y, step, &[(A41, &k1[..]), (A42, &k2[..]), (A43, &k3[..])]);
            rhs(hamiltonian, t + C4 * step, &stage, &mut k4)?;
            combine(
                &mut stage,
                &y,
                step,
                &[(A51, &k1[..]), (A52, &k2[..]), (A53, &k3[..]), (A54, &k4[..])],
            );
            rhs(hamiltonian, t + C5 * step, &stage, &mut k5)?;
            combine(
                &mut stage,
                &y,
                step,
                &[(A61, &k1[..]), (A62, &k2[..]), (A63, &k3[..]), (A64, &k4[..]), (A65, &k5[..])],
            );
            let t_next = if last { end } else { t + step };
            rhs(hamiltonian, t_next, &stage, &mut k6)?;
            combine(
                &mut y_new,
                &y,
                step,
                &[(B1, &k1[..]), (B3, &k3[..]), (B4, &k4[..]), (B5, &k5[..]), (B6, &k6[..])],
            );
            rhs(hamiltonian, t_next, &y_new, &mut k7)?;

            let mut sum = 0.0;
            for i in 0..dim {
                let err = (k1[i] * E1 + k3[i] * E3 + k4[i] * E4 + k5[i] * E5 + k6[i] * E6
                    + k7[i] * E7)
                    * step;
                let scale = cfg.atol + cfg.rtol * y[i].norm().max(y_new[i].norm());
                let r = err.norm() / scale;
                sum += r * r;
            }
            let err_norm = (sum / dim as f64).sqrt();

            if !err_norm.is_finite() {
                return Err(SimError::NumericalInstability {
                    time: t,
                    cause: Instability::NormDrift {
                        norm_sqr: f64::NAN,
                        tolerance: cfg.norm_tolerance,
                    },
                });
            }

            let mut factor = if err_norm == 0.0 {
                MAX_FACTOR
            } else {
                (SAFETY * err_norm.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
            };

            if err_norm <= 1.0 {
                t = t_next;
                std::mem::swap(&mut y, &mut y_new);
                std::mem::swap(&mut k1, &mut k7);
                accepted += 1;

                let norm_sqr: f64 = y.iter().map(Complex64::norm_sqr).sum();
                check_norm(t, norm_sqr, cfg.norm_tolerance)?;
                if cfg.record_trajectory {
                    trajectory.push((t, initial.with_amplitudes(y.clone())));
                }
                if last {
                    break;
                }
            } else {
                factor = factor.min(1.0);
            }

            h = step * factor;
            if h < min_step {
                return Err(SimError::NumericalInstability {
                    time: t,
                    cause: Instability::StepSizeUnderflow { step: h },
                });
            }
        }

        debug!(
            accepted,
            rejected = attempts - accepted,
            end_time = end,
            dim,
            "ODE propagation finished"
        );

        Ok(Evolution {
            state: initial.with_amplitudes(y),
            trajectory,
            steps: accepted,
        })
    }
}
