//! Variational pulse optimization on top of `rymis-sim`.
//!
//! A [`PulseAnsatz`] maps a short parameter vector to Rabi and detuning
//! waveforms, [`MisLoss`] turns those into `−⟨N⟩` after evolution over the
//! blockade subspace, and [`optimize`] drives a derivative-free optimizer
//! over the loss.
//!
//! ```no_run
//! use std::sync::Arc;
//! use rymis_sim::{Subspace, SubspaceConfig, square_lattice, unit_disk_graph};
//! use rymis_vqa::{MisLoss, OptimizerConfig, PulseAnsatz, optimize};
//!
//! let points = square_lattice(2, 3, 5.0);
//! let graph = unit_disk_graph(&points, 7.5).unwrap();
//! let subspace = Arc::new(Subspace::build(&graph, &SubspaceConfig::default()).unwrap());
//! let loss = MisLoss::new(graph, points, subspace, PulseAnsatz::default()).unwrap();
//!
//! let init = loss.ansatz().linear_guess();
//! let outcome = optimize(&init, |p| loss.evaluate(p), &OptimizerConfig::default()).unwrap();
//! assert!(outcome.best_loss <= outcome.initial_loss);
//! ```

pub mod ansatz;
pub mod loss;
pub mod optimizer;
pub mod variational;

pub use ansatz::{DetuningShape, PulseAnsatz};
pub use loss::MisLoss;
pub use optimizer::{NelderMead, OptimizationResult, Optimizer, Spsa};
pub use variational::{OptimizerConfig, OptimizerTrace, TraceEntry, VariationalOutcome, optimize};
