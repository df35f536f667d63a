//! `rymis-sim`: Rydberg-array dynamics in the blockade subspace.
//!
//! Builds the time-dependent Hamiltonian of neutral atoms driven by a Rabi
//! and a detuning waveform, restricted to configurations that respect the
//! Rydberg blockade (independent sets of the unit-disk graph), and evolves
//! states under it with:
//!
//! - an adaptive **Dormand–Prince** integrator for smooth controls
//! - a **Krylov** (Lanczos) exponentiator for piecewise-constant controls
//!
//! Measurement sampling, occupation observables and greedy repair of
//! blockade violations turn the final state into maximum-independent-set
//! candidates.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use rymis_sim::{
//!     HamiltonianBuilder, OdeConfig, OdePropagator, Point, Propagator, State, Subspace,
//!     SubspaceConfig, Waveform, unit_disk_graph,
//! };
//!
//! // Three atoms on a line; neighbours blockade each other.
//! let points: Vec<Point> = (0..3).map(|i| Point::new(i as f64, 0.0)).collect();
//! let graph = unit_disk_graph(&points, 1.5).unwrap();
//! let subspace = Arc::new(Subspace::build(&graph, &SubspaceConfig::default()).unwrap());
//! assert_eq!(subspace.len(), 5);
//!
//! let rabi = Waveform::piecewise_linear(vec![0.0, 0.5, 3.5, 4.0], vec![0.0, 5.0, 5.0, 0.0]).unwrap();
//! let detuning = Waveform::piecewise_linear(vec![0.0, 4.0], vec![-8.0, 8.0]).unwrap();
//! let h = HamiltonianBuilder::new(&graph, &points, rabi, detuning)
//!     .interaction(1.0)
//!     .subspace(subspace)
//!     .build()
//!     .unwrap();
//!
//! let psi0 = State::ground(h.basis().clone());
//! let out = OdePropagator::over(&h, OdeConfig::default()).evolve(&h, &psi0).unwrap();
//! assert!((out.state.norm_sqr() - 1.0).abs() < 1e-6);
//! ```

pub mod bitstring;
pub mod config;
pub mod error;
pub mod geometry;
pub mod hamiltonian;
pub mod observable;
pub mod propagate;
pub mod repair;
pub mod state;
pub mod subspace;
pub mod waveform;

pub use bitstring::Bitstring;
pub use config::{KrylovConfig, OdeConfig, SimConfig, SubspaceConfig};
pub use error::{Instability, SimError, SimResult};
pub use geometry::{Graph, Point, random_dropout_lattice, square_lattice, unit_disk_graph};
pub use hamiltonian::{C6_RB70S, Drive, HamiltonianBuilder, RydbergHamiltonian};
pub use observable::{
    expected_occupied_count, is_independent_set, most_probable, sample, site_densities,
    total_probability,
};
pub use propagate::{Evolution, KrylovPropagator, OdePropagator, Propagator};
pub use repair::{augment, postprocess, repair};
pub use state::State;
pub use subspace::{Basis, Subspace, SubspaceCache};
pub use waveform::{Interpolation, Kernel, Waveform, WaveformKind};
