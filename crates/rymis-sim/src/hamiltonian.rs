//! Time-dependent Rydberg Hamiltonian.
//!
//! For atoms at positions `r_i`, Rabi drive `Ω(t)` and detuning `Δ(t)`:
//!
//!   H(t) = Σ_k Ω(t)/2 · σˣ_k  −  Δ(t) · Σ_k n_k  +  Σ_{i<j} C / |r_i − r_j|⁶ · n_i n_j
//!
//! The diagonal part is stored per basis configuration (occupation count
//! and interaction energy, both fixed at build time). The σˣ part flips one
//! site at a time and is never materialised as a matrix: in the full space
//! the partner of configuration `c` is `c ^ (1 << k)`, and in the blockade
//! subspace a precomputed index table lists only the partners that stay
//! inside the subspace. Every flip appears in both directions, so `H(t)` is
//! Hermitian by construction.
//!
//! Units: time in µs, frequencies in rad/µs, distances in µm.

use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::Array2;
use num_complex::Complex64;
use tracing::debug;

use crate::config::SubspaceConfig;
use crate::error::{SimError, SimResult};
use crate::geometry::{Graph, Point};
use crate::state::State;
use crate::subspace::{Basis, Subspace};
use crate::waveform::Waveform;

/// Van der Waals C6 coefficient of the Rb-87 70S state, in rad/µs · µm⁶.
pub const C6_RB70S: f64 = 2.0 * PI * 862_690.0;

/// Control values frozen at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drive {
    /// Rabi frequency Ω.
    pub rabi: f64,
    /// Detuning Δ.
    pub detuning: f64,
}

#[derive(Debug, Clone)]
enum Representation {
    Full,
    /// CSR-style flip table: partners of row `i` are
    /// `targets[offsets[i]..offsets[i + 1]]`.
    Blockade {
        offsets: Vec<usize>,
        targets: Vec<usize>,
    },
}

/// `H(t)` over a fixed basis.
#[derive(Debug, Clone)]
pub struct RydbergHamiltonian {
    basis: Basis,
    rabi: Waveform,
    detuning: Waveform,
    occupation: Vec<f64>,
    interaction: Vec<f64>,
    representation: Representation,
}

/// Collects the inputs of a [`RydbergHamiltonian`].
///
/// ```rust
/// use rymis_sim::geometry::{Point, unit_disk_graph};
/// use rymis_sim::hamiltonian::HamiltonianBuilder;
/// use rymis_sim::subspace::Subspace;
/// use rymis_sim::waveform::Waveform;
/// use rymis_sim::SubspaceConfig;
/// use std::sync::Arc;
///
/// let points = vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(2.0, 0.0)];
/// let graph = unit_disk_graph(&points, 1.2).unwrap();
/// let subspace = Arc::new(Subspace::build(&graph, &SubspaceConfig::default()).unwrap());
///
/// let h = HamiltonianBuilder::new(
///     &graph,
///     &points,
///     Waveform::constant(1.0, 2.0).unwrap(),
///     Waveform::constant(1.0, 0.5).unwrap(),
/// )
/// .interaction(1.0)
/// .subspace(subspace)
/// .build()
/// .unwrap();
/// assert_eq!(h.dim(), 5);
/// ```
pub struct HamiltonianBuilder<'a> {
    graph: &'a Graph,
    positions: &'a [Point],
    rabi: Waveform,
    detuning: Waveform,
    c6: f64,
    basis: BasisChoice,
}

enum BasisChoice {
    Full(SubspaceConfig),
    Subspace(Arc<Subspace>),
}

impl<'a> HamiltonianBuilder<'a> {
    /// Start from geometry and the two control waveforms. Defaults to the
    /// full space and the Rb-87 70S interaction constant.
    ///
    /// `rabi` is the full Rabi frequency Ω(t): the drive term applied to
    /// each site is Ω(t)/2 · σx, so a constant Ω held for π/Ω flips an
    /// isolated atom. `detuning` is Δ(t), entering as −Δ(t) · n.
    pub fn new(graph: &'a Graph, positions: &'a [Point], rabi: Waveform, detuning: Waveform) -> Self {
        Self {
            graph,
            positions,
            rabi,
            detuning,
            c6: C6_RB70S,
            basis: BasisChoice::Full(SubspaceConfig::default()),
        }
    }

    /// Interaction coefficient `C` in `C / r⁶`.
    #[must_use]
    pub fn interaction(mut self, c6: f64) -> Self {
        self.c6 = c6;
        self
    }

    /// Restrict to the blockade subspace.
    #[must_use]
    pub fn subspace(mut self, subspace: Arc<Subspace>) -> Self {
        self.basis = BasisChoice::Subspace(subspace);
        self
    }

    /// Use the full `2^n` space, bounded by `config.max_full_space_sites`.
    #[must_use]
    pub fn full_space(mut self, config: &SubspaceConfig) -> Self {
        self.basis = BasisChoice::Full(config.clone());
        self
    }

    /// Validate the inputs and tabulate the diagonal and the flip table.
    pub fn build(self) -> SimResult<RydbergHamiltonian> {
        let n = self.graph.n_vertices();
        if self.positions.len() != n {
            return Err(SimError::InvalidGraphSpec(format!(
                "{} positions for a graph with {n} vertices",
                self.positions.len()
            )));
        }
        if !(self.c6.is_finite() && self.c6 >= 0.0) {
            return Err(SimError::InvalidGraphSpec(format!(
                "interaction constant must be finite and non-negative, got {}",
                self.c6
            )));
        }
        let (t_rabi, t_det) = (self.rabi.duration(), self.detuning.duration());
        if (t_rabi - t_det).abs() > 1e-12 * t_rabi.max(t_det) {
            return Err(SimError::InvalidWaveformSpec(format!(
                "rabi lasts {t_rabi} but detuning lasts {t_det}"
            )));
        }

        let basis = match self.basis {
            BasisChoice::Full(config) => Basis::full(n, &config)?,
            BasisChoice::Subspace(s) => {
                if s.n_sites() != n {
                    return Err(SimError::DimensionMismatch {
                        expected: n,
                        got: s.n_sites(),
                    });
                }
                Basis::Blockade(s)
            }
        };

        let pair = pair_interactions(self.positions, self.c6)?;
        let dim = basis.dim();
        let mut occupation = Vec::with_capacity(dim);
        let mut interaction = Vec::with_capacity(dim);
        for i in 0..dim {
            let bits = basis.bits(i);
            occupation.push(f64::from(bits.count_ones()));
            interaction.push(configuration_energy(bits, n, &pair));
        }

        let representation = match &basis {
            Basis::Full { .. } => Representation::Full,
            Basis::Blockade(s) => {
                let mut offsets = Vec::with_capacity(dim + 1);
                let mut targets = Vec::new();
                offsets.push(0);
                for &bits in s.raw() {
                    for k in 0..n {
                        if let Some(j) = s.index_of_bits(bits ^ (1 << k)) {
                            targets.push(j);
                        }
                    }
                    offsets.push(targets.len());
                }
                Representation::Blockade { offsets, targets }
            }
        };

        debug!(
            n_sites = n,
            dim,
            full_space = basis.is_full(),
            "built Rydberg Hamiltonian"
        );

        Ok(RydbergHamiltonian {
            basis,
            rabi: self.rabi,
            detuning: self.detuning,
            occupation,
            interaction,
            representation,
        })
    }
}

/// `C / |r_i − r_j|⁶` for every pair, row-major `n × n`.
fn pair_interactions(positions: &[Point], c6: f64) -> SimResult<Vec<f64>> {
    let n = positions.len();
    let mut table = vec![0.0; n * n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = positions[i].distance(&positions[j]);
            if d == 0.0 {
                return Err(SimError::InvalidGraphSpec(format!(
                    "atoms {i} and {j} coincide"
                )));
            }
            let v = c6 / d.powi(6);
            table[i * n + j] = v;
            table[j * n + i] = v;
        }
    }
    Ok(table)
}

/// Sum of pair interactions over every pair of excited sites.
fn configuration_energy(bits: u64, n: usize, pair: &[f64]) -> f64 {
    let mut energy = 0.0;
    let mut rest = bits;
    while rest != 0 {
        let i = rest.trailing_zeros() as usize;
        rest &= rest - 1;
        let mut others = rest;
        while others != 0 {
            let j = others.trailing_zeros() as usize;
            others &= others - 1;
            energy += pair[i * n + j];
        }
    }
    energy
}

impl RydbergHamiltonian {
    /// The basis this operator acts on.
    pub fn basis(&self) -> &Basis {
        &self.basis
    }

    /// Dimension of the basis.
    pub fn dim(&self) -> usize {
        self.basis.dim()
    }

    /// Number of atoms.
    pub fn n_sites(&self) -> usize {
        self.basis.n_sites()
    }

    /// End of the waveform domain.
    pub fn duration(&self) -> f64 {
        self.rabi.duration()
    }

    /// Rabi waveform.
    pub fn rabi(&self) -> &Waveform {
        &self.rabi
    }

    /// Detuning waveform.
    pub fn detuning(&self) -> &Waveform {
        &self.detuning
    }

    /// Interaction energy of basis state `i`.
    pub fn interaction_energy(&self, i: usize) -> f64 {
        self.interaction[i]
    }

    /// Control values at time `t`.
    pub fn drive(&self, t: f64) -> SimResult<Drive> {
        Ok(Drive {
            rabi: self.rabi.evaluate(t)?,
            detuning: self.detuning.evaluate(t)?,
        })
    }

    /// `output = H(t) · input`.
    pub fn apply(&self, t: f64, input: &[Complex64], output: &mut [Complex64]) -> SimResult<()> {
        let drive = self.drive(t)?;
        self.apply_drive(drive, input, output)
    }

    /// `output = H · input` with the controls frozen at `drive`.
    ///
    /// Costs `O(dim × n)`.
    pub fn apply_drive(
        &self,
        drive: Drive,
        input: &[Complex64],
        output: &mut [Complex64],
    ) -> SimResult<()> {
        let dim = self.dim();
        for len in [input.len(), output.len()] {
            if len != dim {
                return Err(SimError::DimensionMismatch {
                    expected: dim,
                    got: len,
                });
            }
        }

        let half_rabi = 0.5 * drive.rabi;
        match &self.representation {
            Representation::Full => {
                let n = self.n_sites();
                for (i, out) in output.iter_mut().enumerate() {
                    let diagonal = self.interaction[i] - drive.detuning * self.occupation[i];
                    let mut flips = Complex64::new(0.0, 0.0);
                    for k in 0..n {
                        flips += input[i ^ (1 << k)];
                    }
                    *out = input[i] * diagonal + flips * half_rabi;
                }
            }
            Representation::Blockade { offsets, targets } => {
                for (i, out) in output.iter_mut().enumerate() {
                    let diagonal = self.interaction[i] - drive.detuning * self.occupation[i];
                    let flips: Complex64 = targets[offsets[i]..offsets[i + 1]]
                        .iter()
                        .map(|&j| input[j])
                        .sum();
                    *out = input[i] * diagonal + flips * half_rabi;
                }
            }
        }
        Ok(())
    }

    /// Dense matrix of `H(t)`; intended for small bases and inspection.
    pub fn to_dense(&self, t: f64) -> SimResult<Array2<Complex64>> {
        let drive = self.drive(t)?;
        let dim = self.dim();
        let mut matrix = Array2::<Complex64>::zeros((dim, dim));
        let half_rabi = Complex64::new(0.5 * drive.rabi, 0.0);
        for i in 0..dim {
            matrix[[i, i]] = Complex64::new(
                self.interaction[i] - drive.detuning * self.occupation[i],
                0.0,
            );
            match &self.representation {
                Representation::Full => {
                    for k in 0..self.n_sites() {
                        matrix[[i, i ^ (1 << k)]] += half_rabi;
                    }
                }
                Representation::Blockade { offsets, targets } => {
                    for &j in &targets[offsets[i]..offsets[i + 1]] {
                        matrix[[i, j]] += half_rabi;
                    }
                }
            }
        }
        Ok(matrix)
    }

    /// `⟨ψ|H(t)|ψ⟩`.
    pub fn expected_energy(&self, state: &State, t: f64) -> SimResult<f64> {
        if state.basis() != &self.basis {
            return Err(SimError::DimensionMismatch {
                expected: self.dim(),
                got: state.dim(),
            });
        }
        let mut h_psi = vec![Complex64::new(0.0, 0.0); self.dim()];
        self.apply(t, state.amplitudes(), &mut h_psi)?;
        Ok(state
            .amplitudes()
            .iter()
            .zip(&h_psi)
            .map(|(a, b)| (a.conj() * b).re)
            .sum())
    }
}
