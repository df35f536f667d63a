//! Shared helpers for CLI commands: the run file, instance construction,
//! propagation and terminal output.

use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rymis_sim::{
    C6_RB70S, Graph, HamiltonianBuilder, Instability, KrylovPropagator, OdePropagator, Point,
    Propagator, RydbergHamiltonian, SimConfig, SimError, State, Subspace, random_dropout_lattice,
    unit_disk_graph,
};
use rymis_vqa::{OptimizerConfig, PulseAnsatz};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Everything a run needs, as read from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFile {
    /// Atom placement and blockade radius.
    #[serde(default)]
    pub lattice: LatticeSpec,

    /// Interaction coefficient `C` in `C / r⁶`.
    #[serde(default = "default_c6")]
    pub c6: f64,

    /// Evolve in the full `2^n` space instead of the blockade subspace.
    #[serde(default)]
    pub full_space: bool,

    /// Pulse family; the adiabatic command uses its linear sweep.
    #[serde(default)]
    pub ansatz: PulseAnsatz,

    /// Propagator selection for the adiabatic command.
    #[serde(default)]
    pub propagator: PropagatorChoice,

    /// Numerical settings.
    #[serde(default)]
    pub simulation: SimConfig,

    /// Variational optimizer.
    #[serde(default)]
    pub optimizer: OptimizerConfig,

    /// Configurations listed in the report.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Born-rule samples drawn from the final state.
    #[serde(default)]
    pub shots: usize,

    /// Seed for sampling.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for RunFile {
    fn default() -> Self {
        Self {
            lattice: LatticeSpec::default(),
            c6: default_c6(),
            full_space: false,
            ansatz: PulseAnsatz::default(),
            propagator: PropagatorChoice::default(),
            simulation: SimConfig::default(),
            optimizer: OptimizerConfig::default(),
            top_k: default_top_k(),
            shots: 0,
            seed: default_seed(),
        }
    }
}

/// A square lattice with optional random vacancies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatticeSpec {
    /// Lattice rows.
    pub rows: usize,
    /// Lattice columns.
    pub cols: usize,
    /// Site spacing in µm.
    pub spacing: f64,
    /// Probability of keeping each site.
    pub filling: f64,
    /// Seed for vacancy placement.
    pub seed: u64,
    /// Edge threshold for the unit-disk graph in µm.
    pub blockade_radius: f64,
}

impl Default for LatticeSpec {
    fn default() -> Self {
        Self {
            rows: 3,
            cols: 3,
            spacing: 5.0,
            filling: 1.0,
            seed: 42,
            blockade_radius: 7.5,
        }
    }
}

/// Which propagator the adiabatic command uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropagatorChoice {
    /// Adaptive Dormand–Prince.
    Ode,
    /// Piecewise-frozen Krylov exponentiation.
    Krylov {
        /// Uniform segments over the sweep.
        #[serde(default = "default_segments")]
        segments: usize,
        /// Times a failed run is retried with segments halved.
        #[serde(default = "default_refinements")]
        refinements: usize,
    },
}

impl Default for PropagatorChoice {
    fn default() -> Self {
        Self::Krylov {
            segments: default_segments(),
            refinements: default_refinements(),
        }
    }
}

fn default_c6() -> f64 {
    C6_RB70S
}

fn default_top_k() -> usize {
    5
}

fn default_seed() -> u64 {
    7
}

fn default_segments() -> usize {
    400
}

fn default_refinements() -> usize {
    3
}

impl RunFile {
    /// Parse and validate a YAML run file.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let run: Self = serde_yaml_ng::from_str(yaml).context("Malformed run file")?;
        run.validate()?;
        Ok(run)
    }

    /// Check the sections that serde cannot.
    pub fn validate(&self) -> Result<()> {
        self.simulation.validate()?;
        self.ansatz.validate()?;
        let l = &self.lattice;
        if l.rows == 0 || l.cols == 0 {
            anyhow::bail!("lattice must have at least one row and one column");
        }
        if !(l.spacing.is_finite() && l.spacing > 0.0) {
            anyhow::bail!("lattice.spacing must be positive, got {}", l.spacing);
        }
        if let PropagatorChoice::Krylov { segments: 0, .. } = self.propagator {
            anyhow::bail!("propagator.segments must be at least 1");
        }
        Ok(())
    }
}

/// Load a run file from disk.
pub fn load_run_file(path: &Path) -> Result<RunFile> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read run file: {}", path.display()))?;
    RunFile::from_yaml_str(&text).with_context(|| format!("Invalid run file: {}", path.display()))
}

/// A placed problem instance.
pub struct Instance {
    pub points: Vec<Point>,
    pub graph: Graph,
    pub subspace: Arc<Subspace>,
}

/// Place the atoms and enumerate the blockade subspace.
pub fn build_instance(run: &RunFile) -> Result<Instance> {
    let l = &run.lattice;
    let mut rng = StdRng::seed_from_u64(l.seed);
    let points = random_dropout_lattice(l.rows, l.cols, l.spacing, l.filling, &mut rng)?;
    if points.is_empty() {
        anyhow::bail!(
            "no atoms left after dropout (filling {}, seed {})",
            l.filling,
            l.seed
        );
    }
    let graph = unit_disk_graph(&points, l.blockade_radius)?;
    let subspace = Arc::new(Subspace::build(&graph, &run.simulation.subspace)?);
    info!(
        atoms = points.len(),
        edges = graph.n_edges(),
        basis = subspace.len(),
        "instance built"
    );
    Ok(Instance {
        points,
        graph,
        subspace,
    })
}

/// Hamiltonian for the ansatz at `params`, in the basis the run file asks for.
pub fn hamiltonian(
    run: &RunFile,
    instance: &Instance,
    params: &[f64],
) -> Result<RydbergHamiltonian> {
    let (rabi, detuning) = run.ansatz.waveforms(params)?;
    let builder = HamiltonianBuilder::new(&instance.graph, &instance.points, rabi, detuning)
        .interaction(run.c6);
    let builder = if run.full_space {
        builder.full_space(&run.simulation.subspace)
    } else {
        builder.subspace(Arc::clone(&instance.subspace))
    };
    Ok(builder.build()?)
}

/// Evolve the ground state with the configured propagator.
///
/// A Krylov run that trips its residual or norm check is retried with every
/// segment halved, up to `refinements` times.
pub fn propagate(run: &RunFile, h: &RydbergHamiltonian) -> Result<State> {
    let psi0 = State::ground(h.basis().clone());
    match run.propagator {
        PropagatorChoice::Ode => {
            let evolution = OdePropagator::over(h, run.simulation.ode.clone()).evolve(h, &psi0)?;
            info!(steps = evolution.steps, "ODE propagation finished");
            Ok(evolution.state)
        }
        PropagatorChoice::Krylov {
            segments,
            refinements,
        } => {
            let mut propagator =
                KrylovPropagator::uniform(h.duration(), segments, run.simulation.krylov.clone())?;
            let mut attempt = 0;
            loop {
                match propagator.evolve(h, &psi0) {
                    Ok(evolution) => {
                        info!(segments = evolution.steps, "Krylov propagation finished");
                        return Ok(evolution.state);
                    }
                    Err(SimError::NumericalInstability {
                        time,
                        cause:
                            cause @ (Instability::KrylovResidual { .. }
                            | Instability::NormDrift { .. }),
                    }) if attempt < refinements => {
                        attempt += 1;
                        warn!(
                            time,
                            %cause,
                            segments = propagator.n_segments() * 2,
                            "refining Krylov segments"
                        );
                        propagator = propagator.subdivided(2)?;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }
}

/// Spinner for long-running work.
pub fn create_spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {pos} {msg}",
    )?);
    pb.set_message(message.to_string());
    Ok(pb)
}

/// Print a report header.
pub fn print_header(title: &str) {
    println!();
    println!("{}", style("═".repeat(60)).cyan());
    println!("{}", style(format!("  {title}")).cyan().bold());
    println!("{}", style("═".repeat(60)).cyan());
    println!();
}

/// Print a report section.
pub fn print_section(title: &str) {
    println!();
    println!("{}", style(format!("▶ {title}")).green().bold());
    println!("{}", style("─".repeat(40)).dim());
}

/// Print a result line.
pub fn print_result(label: &str, value: impl Display) {
    println!("  {} {}", style(format!("{label}:")).dim(), value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_run_file_roundtrips() {
        let run = RunFile::default();
        let yaml = serde_yaml_ng::to_string(&run).unwrap();
        assert_eq!(RunFile::from_yaml_str(&yaml).unwrap(), run);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let run = RunFile::from_yaml_str("{}").unwrap();
        assert_eq!(run, RunFile::default());
    }

    #[test]
    fn default_lattice_is_king_graph() {
        let instance = build_instance(&RunFile::default()).unwrap();
        assert_eq!(instance.points.len(), 9);
        // 12 lattice bonds + 8 diagonals
        assert_eq!(instance.graph.n_edges(), 20);
        assert_eq!(instance.subspace.len(), 35);
    }

    #[test]
    fn rejects_degenerate_lattice() {
        assert!(RunFile::from_yaml_str("lattice:\n  rows: 0\n").is_err());
        assert!(RunFile::from_yaml_str("lattice:\n  spacing: -1.0\n").is_err());
        assert!(RunFile::from_yaml_str("propagator:\n  type: krylov\n  segments: 0\n").is_err());
    }

    #[test]
    fn empty_dropout_is_an_error() {
        let run = RunFile::from_yaml_str("lattice:\n  filling: 0.0\n").unwrap();
        assert!(build_instance(&run).is_err());
    }
}
