//! Derivative-free minimizers.
//!
//! The objective is a black box: it may be noisy, expensive, or return a
//! non-finite value for a parameter vector it cannot evaluate. Every method
//! here orders non-finite values after all finite ones, so such trials are
//! simply disfavoured.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Result of an optimization run.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Best parameter values found.
    pub optimal_params: Vec<f64>,
    /// Objective value at `optimal_params` (`+∞` if it was not finite).
    pub optimal_value: f64,
    /// Number of objective evaluations.
    pub num_evaluations: usize,
    /// Number of iterations performed.
    pub num_iterations: usize,
    /// Best value after each iteration.
    pub history: Vec<f64>,
    /// Whether the stopping tolerances were met before the budget ran out.
    pub converged: bool,
}

/// A derivative-free minimizer.
pub trait Optimizer {
    /// Minimize `objective` starting from `initial_params`.
    fn minimize<F>(&self, objective: F, initial_params: Vec<f64>) -> OptimizationResult
    where
        F: FnMut(&[f64]) -> f64;
}

/// Map non-finite objective values to `+∞` so they sort last.
fn rank(value: f64) -> f64 {
    if value.is_finite() { value } else { f64::INFINITY }
}

/// Nelder–Mead downhill simplex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NelderMead {
    /// Maximum number of iterations.
    pub max_iter: usize,
    /// Largest spread of simplex values accepted as converged.
    pub f_tol: f64,
    /// Largest vertex distance from the best vertex accepted as
    /// converged.
    pub x_tol: f64,
    /// Edge length of the initial simplex along each axis.
    pub initial_step: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iter: 200,
            f_tol: 1e-6,
            x_tol: 1e-6,
            initial_step: 0.5,
        }
    }
}

impl NelderMead {
    /// Create a new Nelder–Mead optimizer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum iterations.
    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set convergence tolerances.
    #[must_use]
    pub fn with_tolerances(mut self, f_tol: f64, x_tol: f64) -> Self {
        self.f_tol = f_tol;
        self.x_tol = x_tol;
        self
    }

    /// Set the initial simplex edge length.
    #[must_use]
    pub fn with_initial_step(mut self, step: f64) -> Self {
        self.initial_step = step;
        self
    }
}

/// `a + t · (b − a)`.
fn lerp(a: &[f64], b: &[f64], t: f64) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x + t * (y - x)).collect()
}

impl Optimizer for NelderMead {
    fn minimize<F>(&self, mut objective: F, initial_params: Vec<f64>) -> OptimizationResult
    where
        F: FnMut(&[f64]) -> f64,
    {
        let n = initial_params.len();
        let mut num_evaluations = 0;
        let mut eval = |x: &[f64]| {
            num_evaluations += 1;
            rank(objective(x))
        };

        let f0 = eval(&initial_params);
        let mut simplex = vec![initial_params.clone()];
        let mut values = vec![f0];
        for i in 0..n {
            let mut point = initial_params.clone();
            point[i] += self.initial_step;
            values.push(eval(&point));
            simplex.push(point);
        }

        let mut history = vec![f0];
        let mut converged = false;
        let mut iterations = 0;

        if n > 0 {
            for _ in 0..self.max_iter {
                iterations += 1;
                let mut order: Vec<usize> = (0..=n).collect();
                order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
                let (best, second, worst) = (order[0], order[n - 1], order[n]);

                let spread = values[worst] - values[best];
                let size = simplex
                    .iter()
                    .map(|p| {
                        p.iter()
                            .zip(&simplex[best])
                            .fold(0.0_f64, |m, (a, b)| m.max((a - b).abs()))
                    })
                    .fold(0.0_f64, f64::max);
                if spread <= self.f_tol && size <= self.x_tol {
                    converged = true;
                    history.push(values[best]);
                    break;
                }

                let mut centroid = vec![0.0; n];
                for &i in &order[..n] {
                    for (c, x) in centroid.iter_mut().zip(&simplex[i]) {
                        *c += x / n as f64;
                    }
                }

                let reflected = lerp(&centroid, &simplex[worst], -1.0);
                let f_reflected = eval(&reflected);

                if f_reflected < values[best] {
                    let expanded = lerp(&centroid, &simplex[worst], -2.0);
                    let f_expanded = eval(&expanded);
                    if f_expanded < f_reflected {
                        simplex[worst] = expanded;
                        values[worst] = f_expanded;
                    } else {
                        simplex[worst] = reflected;
                        values[worst] = f_reflected;
                    }
                } else if f_reflected < values[second] {
                    simplex[worst] = reflected;
                    values[worst] = f_reflected;
                } else {
                    let (contracted, bound) = if f_reflected < values[worst] {
                        (lerp(&centroid, &reflected, 0.5), f_reflected)
                    } else {
                        (lerp(&centroid, &simplex[worst], 0.5), values[worst])
                    };
                    let f_contracted = eval(&contracted);
                    if f_contracted < bound {
                        simplex[worst] = contracted;
                        values[worst] = f_contracted;
                    } else {
                        let anchor = simplex[best].clone();
                        for i in 0..=n {
                            if i != best {
                                simplex[i] = lerp(&anchor, &simplex[i], 0.5);
                                values[i] = eval(&simplex[i]);
                            }
                        }
                    }
                }

                let current = values.iter().copied().fold(f64::INFINITY, f64::min);
                history.push(current);
            }
        }

        let best = (0..=n)
            .min_by(|&a, &b| values[a].total_cmp(&values[b]))
            .unwrap_or(0);
        debug!(
            evaluations = num_evaluations,
            iterations,
            best = values[best],
            converged,
            "Nelder-Mead finished"
        );

        OptimizationResult {
            optimal_params: simplex.swap_remove(best),
            optimal_value: values[best],
            num_evaluations,
            num_iterations: iterations,
            history,
            converged,
        }
    }
}

/// Simultaneous Perturbation Stochastic Approximation.
///
/// Estimates the gradient from two evaluations along a random ±1 direction
/// per iteration, with gains `a_k = a / (k + 1 + A)^α` and
/// `c_k = c / (k + 1)^γ`. The perturbations come from a seeded generator,
/// so runs are reproducible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Spsa {
    /// Number of iterations.
    pub max_iter: usize,
    /// Step-size gain `a`.
    pub a: f64,
    /// Perturbation gain `c`.
    pub c: f64,
    /// Step-size decay exponent `α`.
    pub alpha: f64,
    /// Perturbation decay exponent `γ`.
    pub gamma: f64,
    /// Stability constant `A`.
    pub stability: f64,
    /// Seed for the perturbation directions.
    pub seed: u64,
}

impl Default for Spsa {
    fn default() -> Self {
        Self {
            max_iter: 100,
            a: 0.2,
            c: 0.1,
            alpha: 0.602,
            gamma: 0.101,
            stability: 10.0,
            seed: 42,
        }
    }
}

impl Spsa {
    /// Create a new SPSA optimizer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum iterations.
    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the perturbation seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl Optimizer for Spsa {
    fn minimize<F>(&self, mut objective: F, initial_params: Vec<f64>) -> OptimizationResult
    where
        F: FnMut(&[f64]) -> f64,
    {
        let n = initial_params.len();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut x = initial_params;
        let mut f_x = rank(objective(&x));
        let mut num_evaluations = 1;
        let mut best = (x.clone(), f_x);
        let mut history = vec![f_x];

        for k in 0..self.max_iter {
            if n == 0 {
                break;
            }
            let a_k = self.a / (k as f64 + 1.0 + self.stability).powf(self.alpha);
            let c_k = self.c / (k as f64 + 1.0).powf(self.gamma);

            let delta: Vec<f64> = (0..n)
                .map(|_| if rng.gen_bool(0.5) { 1.0 } else { -1.0 })
                .collect();
            let x_plus: Vec<f64> = x.iter().zip(&delta).map(|(xi, di)| xi + c_k * di).collect();
            let x_minus: Vec<f64> = x.iter().zip(&delta).map(|(xi, di)| xi - c_k * di).collect();
            let f_plus = rank(objective(&x_plus));
            let f_minus = rank(objective(&x_minus));
            num_evaluations += 2;

            for (point, value) in [(&x_plus, f_plus), (&x_minus, f_minus)] {
                if value < best.1 {
                    best = (point.clone(), value);
                }
            }

            // An invalid side gives no usable gradient; keep x and draw again.
            if f_plus.is_finite() && f_minus.is_finite() {
                let slope = (f_plus - f_minus) / (2.0 * c_k);
                for (xi, di) in x.iter_mut().zip(&delta) {
                    *xi -= a_k * slope / di;
                }
                f_x = rank(objective(&x));
                num_evaluations += 1;
                if f_x < best.1 {
                    best = (x.clone(), f_x);
                }
            }
            history.push(best.1);
        }

        debug!(
            evaluations = num_evaluations,
            best = best.1,
            last = f_x,
            "SPSA finished"
        );

        OptimizationResult {
            optimal_params: best.0,
            optimal_value: best.1,
            num_evaluations,
            num_iterations: if n == 0 { 0 } else { self.max_iter },
            history,
            converged: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bowl(params: &[f64]) -> f64 {
        (params[0] - 1.0).powi(2) + (params[1] - 2.0).powi(2)
    }

    #[test]
    fn nelder_mead_finds_bowl_minimum() {
        let result = NelderMead::new().with_max_iter(1000).minimize(bowl, vec![0.0, 0.0]);
        assert!(result.optimal_value < 1e-6);
        assert!((result.optimal_params[0] - 1.0).abs() < 1e-2);
        assert!((result.optimal_params[1] - 2.0).abs() < 1e-2);
        assert!(result.converged);
    }

    #[test]
    fn nelder_mead_rosenbrock_improves() {
        let result = NelderMead::new().with_max_iter(500).minimize(
            |p| (1.0 - p[0]).powi(2) + 100.0 * (p[1] - p[0].powi(2)).powi(2),
            vec![-1.2, 1.0],
        );
        assert!(result.optimal_value < 1e-3);
    }

    #[test]
    fn nelder_mead_avoids_invalid_region() {
        // NaN left of x = 0.5; minimum of the valid part at x = 0.5.
        let result = NelderMead::new().minimize(
            |p| if p[0] < 0.5 { f64::NAN } else { p[0] * p[0] },
            vec![2.0],
        );
        assert!(result.optimal_value.is_finite());
        assert!(result.optimal_params[0] >= 0.5);
        assert!(result.optimal_value <= 4.0);
    }

    #[test]
    fn nelder_mead_history_never_worsens() {
        let result = NelderMead::new().with_max_iter(50).minimize(bowl, vec![5.0, -3.0]);
        assert!(result.history.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn spsa_descends_and_is_reproducible() {
        let spsa = Spsa::new().with_max_iter(200).with_seed(7);
        let a = spsa.minimize(|p| p[0].powi(2) + p[1].powi(2), vec![1.0, 1.0]);
        let b = spsa.minimize(|p| p[0].powi(2) + p[1].powi(2), vec![1.0, 1.0]);
        assert!(a.optimal_value < 0.5);
        assert_eq!(a.optimal_params, b.optimal_params);
    }

    #[test]
    fn empty_parameter_vector_is_evaluated_once() {
        let mut calls = 0;
        let result = NelderMead::new().minimize(
            |_| {
                calls += 1;
                3.0
            },
            vec![],
        );
        assert_eq!(calls, 1);
        assert_eq!(result.optimal_value, 3.0);
    }
}
