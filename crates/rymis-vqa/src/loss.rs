//! The maximum-independent-set loss: minus the expected number of excited
//! atoms after the pulse.

use std::sync::Arc;

use rymis_sim::{
    C6_RB70S, Graph, HamiltonianBuilder, OdeConfig, OdePropagator, Point, Propagator,
    RydbergHamiltonian, SimError, SimResult, State, Subspace, expected_occupied_count,
};
use tracing::trace;

use crate::ansatz::PulseAnsatz;

/// Black-box loss for the variational loop.
///
/// Holds everything needed to turn a parameter vector into a number: the
/// geometry, the shared blockade subspace, the interaction constant, the
/// pulse ansatz and the integrator settings. Each evaluation builds its own
/// Hamiltonian and state, so a `MisLoss` can be shared between threads.
#[derive(Debug, Clone)]
pub struct MisLoss {
    graph: Graph,
    positions: Vec<Point>,
    subspace: Arc<Subspace>,
    c6: f64,
    ansatz: PulseAnsatz,
    ode: OdeConfig,
}

impl MisLoss {
    /// Loss over the blockade subspace of `graph`.
    pub fn new(
        graph: Graph,
        positions: Vec<Point>,
        subspace: Arc<Subspace>,
        ansatz: PulseAnsatz,
    ) -> SimResult<Self> {
        let n = graph.n_vertices();
        if positions.len() != n {
            return Err(SimError::InvalidGraphSpec(format!(
                "{} positions for a graph with {n} vertices",
                positions.len()
            )));
        }
        if subspace.n_sites() != n {
            return Err(SimError::DimensionMismatch {
                expected: n,
                got: subspace.n_sites(),
            });
        }
        ansatz.validate()?;
        Ok(Self {
            graph,
            positions,
            subspace,
            c6: C6_RB70S,
            ansatz,
            ode: OdeConfig::default(),
        })
    }

    /// Interaction coefficient `C` in `C / r⁶`.
    #[must_use]
    pub fn with_interaction(mut self, c6: f64) -> Self {
        self.c6 = c6;
        self
    }

    /// Integrator settings.
    #[must_use]
    pub fn with_ode_config(mut self, config: OdeConfig) -> Self {
        self.ode = config;
        self
    }

    /// The pulse ansatz.
    pub fn ansatz(&self) -> &PulseAnsatz {
        &self.ansatz
    }

    /// The constraint graph.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Hamiltonian for `params`.
    pub fn hamiltonian(&self, params: &[f64]) -> SimResult<RydbergHamiltonian> {
        let (rabi, detuning) = self.ansatz.waveforms(params)?;
        HamiltonianBuilder::new(&self.graph, &self.positions, rabi, detuning)
            .interaction(self.c6)
            .subspace(Arc::clone(&self.subspace))
            .build()
    }

    /// State at the end of the pulse for `params`.
    pub fn final_state(&self, params: &[f64]) -> SimResult<State> {
        let h = self.hamiltonian(params)?;
        let psi0 = State::ground(h.basis().clone());
        let evolution = OdePropagator::over(&h, self.ode.clone()).evolve(&h, &psi0)?;
        Ok(evolution.state)
    }

    /// `−⟨N⟩` of the final state.
    pub fn evaluate(&self, params: &[f64]) -> SimResult<f64> {
        let state = self.final_state(params)?;
        let loss = -expected_occupied_count(&state);
        trace!(?params, loss, "evaluated MIS loss");
        Ok(loss)
    }
}

#[cfg(test)]
mod tests {
    use rymis_sim::{SubspaceConfig, unit_disk_graph};

    use super::*;
    use crate::ansatz::DetuningShape;

    fn path_loss() -> MisLoss {
        let points: Vec<Point> = (0..3).map(|i| Point::new(i as f64, 0.0)).collect();
        let graph = unit_disk_graph(&points, 1.1).unwrap();
        let subspace = Arc::new(Subspace::build(&graph, &SubspaceConfig::default()).unwrap());
        let ansatz = PulseAnsatz {
            omega_max: 5.0,
            ramp_time: 0.3,
            delta_start: -8.0,
            delta_end: 8.0,
            n_interior: 1,
            duration: 3.0,
            free_duration: false,
            shape: DetuningShape::Linear,
        };
        MisLoss::new(graph, points, subspace, ansatz)
            .unwrap()
            .with_interaction(1.0)
    }

    #[test]
    fn loss_is_minus_occupation() {
        let loss = path_loss();
        let value = loss.evaluate(&[0.0]).unwrap();
        // At most two of three atoms on a blockaded path can be excited.
        assert!((-2.0..=0.0).contains(&value));
        assert!(value < -1.0);
    }

    #[test]
    fn bad_arity_surfaces_as_parameter_error() {
        let loss = path_loss();
        assert!(matches!(
            loss.evaluate(&[0.0, 1.0]),
            Err(SimError::InvalidParameterVector(_))
        ));
    }

    #[test]
    fn mismatched_geometry_is_rejected() {
        let graph = Graph::empty(3);
        let subspace = Arc::new(Subspace::build(&graph, &SubspaceConfig::default()).unwrap());
        let err = MisLoss::new(
            graph,
            vec![Point::new(0.0, 0.0)],
            subspace,
            PulseAnsatz::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SimError::InvalidGraphSpec(_)));
    }
}
