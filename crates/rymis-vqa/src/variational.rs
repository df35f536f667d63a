//! The classical–quantum optimization loop.
//!
//! [`optimize`] treats the loss as a black box. A failed evaluation (for
//! example a [`SimError::NumericalInstability`] from the integrator, or a
//! parameter vector the ansatz rejects) becomes a `+∞` trial that the
//! optimizer steers away from; only a malformed initial vector aborts the
//! run.

use rymis_sim::{SimError, SimResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::optimizer::{NelderMead, Optimizer, Spsa};

/// Which minimizer to run, with its settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum OptimizerConfig {
    /// Downhill simplex.
    NelderMead(NelderMead),
    /// Stochastic perturbation gradient descent.
    Spsa(Spsa),
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::NelderMead(NelderMead::default())
    }
}

/// One loss evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    /// Parameters evaluated.
    pub params: Vec<f64>,
    /// Loss, `+∞` if the evaluation failed.
    pub loss: f64,
}

/// Every evaluation of a run, in call order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OptimizerTrace {
    entries: Vec<TraceEntry>,
}

impl OptimizerTrace {
    fn record(&mut self, params: &[f64], loss: f64) {
        self.entries.push(TraceEntry {
            params: params.to_vec(),
            loss,
        });
    }

    /// Number of evaluations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True before the first evaluation.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evaluations in call order.
    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    /// Losses in call order.
    pub fn losses(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|e| e.loss)
    }

    /// Lowest-loss entry, earliest on ties.
    pub fn best(&self) -> Option<&TraceEntry> {
        self.entries
            .iter()
            .reduce(|best, e| if e.loss < best.loss { e } else { best })
    }

    /// Number of failed evaluations.
    pub fn failures(&self) -> usize {
        self.entries.iter().filter(|e| !e.loss.is_finite()).count()
    }
}

/// Result of [`optimize`].
#[derive(Debug, Clone, Serialize)]
pub struct VariationalOutcome {
    /// Best parameters seen.
    pub best_params: Vec<f64>,
    /// Loss at `best_params`; never above `initial_loss`.
    pub best_loss: f64,
    /// Loss at the initial parameters.
    pub initial_loss: f64,
    /// Every evaluation.
    pub trace: OptimizerTrace,
    /// Whether the optimizer met its own stopping tolerances.
    pub converged: bool,
}

/// Minimize `loss_fn` from `init` with the configured optimizer.
///
/// Fails only when the initial vector itself is malformed: empty, non-finite,
/// or rejected by `loss_fn` with [`SimError::InvalidParameterVector`]. Any
/// other failure, at the initial point or later, is logged and scored as
/// `+∞`.
pub fn optimize<F>(
    init: &[f64],
    mut loss_fn: F,
    config: &OptimizerConfig,
) -> SimResult<VariationalOutcome>
where
    F: FnMut(&[f64]) -> SimResult<f64>,
{
    if init.is_empty() {
        return Err(SimError::InvalidParameterVector(
            "initial parameter vector is empty".into(),
        ));
    }
    if let Some(i) = init.iter().position(|p| !p.is_finite()) {
        return Err(SimError::InvalidParameterVector(format!(
            "initial parameter {i} is not finite ({})",
            init[i]
        )));
    }

    let initial_loss = match loss_fn(init) {
        Ok(loss) if loss.is_finite() => loss,
        Ok(loss) => {
            warn!(loss, "initial loss is not finite");
            f64::INFINITY
        }
        Err(e @ SimError::InvalidParameterVector(_)) => return Err(e),
        Err(e) => {
            warn!(error = %e, "initial loss evaluation failed");
            f64::INFINITY
        }
    };
    info!(
        n_params = init.len(),
        initial_loss,
        ?config,
        "starting variational optimization"
    );

    let mut trace = OptimizerTrace::default();
    trace.record(init, initial_loss);
    let mut initial_pending = true;

    let objective = |params: &[f64]| -> f64 {
        // Optimizers start by evaluating the initial point; reuse it.
        if initial_pending && params == init {
            initial_pending = false;
            return initial_loss;
        }
        let loss = match loss_fn(params) {
            Ok(loss) if loss.is_finite() => loss,
            Ok(loss) => {
                warn!(?params, loss, "non-finite loss");
                f64::INFINITY
            }
            Err(e) => {
                warn!(?params, error = %e, "loss evaluation failed");
                f64::INFINITY
            }
        };
        trace.record(params, loss);
        loss
    };

    let result = match config {
        OptimizerConfig::NelderMead(nm) => nm.minimize(objective, init.to_vec()),
        OptimizerConfig::Spsa(spsa) => spsa.minimize(objective, init.to_vec()),
    };

    let (best_params, best_loss) = match trace.best() {
        Some(entry) if entry.loss < initial_loss => (entry.params.clone(), entry.loss),
        _ => (init.to_vec(), initial_loss),
    };

    info!(
        best_loss,
        initial_loss,
        evaluations = trace.len(),
        failures = trace.failures(),
        converged = result.converged,
        "variational optimization finished"
    );

    Ok(VariationalOutcome {
        best_params,
        best_loss,
        initial_loss,
        trace,
        converged: result.converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quadratic(p: &[f64]) -> SimResult<f64> {
        Ok((p[0] - 3.0).powi(2) + (p[1] + 1.0).powi(2))
    }

    #[test]
    fn finds_quadratic_minimum() {
        let out = optimize(&[0.0, 0.0], quadratic, &OptimizerConfig::default()).unwrap();
        assert!(out.best_loss < 1e-4);
        assert!(out.best_loss <= out.initial_loss);
        assert_eq!(out.initial_loss, 10.0);
        assert_eq!(out.trace.entries()[0].params, vec![0.0, 0.0]);
    }

    #[test]
    fn failing_trials_are_scored_infinite() {
        let loss = |p: &[f64]| {
            if p[0] > 0.2 {
                Err(SimError::NumericalInstability {
                    time: 0.0,
                    cause: rymis_sim::Instability::StepSizeUnderflow { step: 0.0 },
                })
            } else {
                Ok(p[0].powi(2) + p[1].powi(2))
            }
        };
        let out = optimize(&[0.0, 1.0], loss, &OptimizerConfig::default()).unwrap();
        assert!(out.trace.failures() > 0);
        assert!(out.best_loss.is_finite());
        assert!(out.best_loss < out.initial_loss);
    }

    #[test]
    fn malformed_initial_vector_is_fatal() {
        let reject = |_: &[f64]| -> SimResult<f64> {
            Err(SimError::InvalidParameterVector("negative duration".into()))
        };
        assert!(matches!(
            optimize(&[1.0], reject, &OptimizerConfig::default()),
            Err(SimError::InvalidParameterVector(_))
        ));
        assert!(optimize(&[], quadratic, &OptimizerConfig::default()).is_err());
        assert!(optimize(&[f64::NAN, 0.0], quadratic, &OptimizerConfig::default()).is_err());
    }

    #[test]
    fn later_parameter_errors_are_not_fatal() {
        let loss = |p: &[f64]| {
            if p[0] < 0.0 {
                Err(SimError::InvalidParameterVector("negative".into()))
            } else {
                Ok((p[0] - 0.1).powi(2))
            }
        };
        let out = optimize(&[1.0], loss, &OptimizerConfig::default()).unwrap();
        assert!(out.best_loss < out.initial_loss);
    }

    #[test]
    fn spsa_config_runs() {
        let config = OptimizerConfig::Spsa(Spsa::new().with_max_iter(50));
        let out = optimize(&[0.5, 0.5], quadratic, &config).unwrap();
        assert!(out.best_loss <= out.initial_loss);
        assert_eq!(out.trace.len(), 1 + 3 * 50);
    }

    #[test]
    fn config_reads_from_yaml() {
        let config: OptimizerConfig =
            serde_yaml_ng::from_str("method: spsa\nmax_iter: 10\nseed: 3\n").unwrap();
        match config {
            OptimizerConfig::Spsa(s) => {
                assert_eq!(s.max_iter, 10);
                assert_eq!(s.seed, 3);
                assert_eq!(s.alpha, Spsa::default().alpha);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
