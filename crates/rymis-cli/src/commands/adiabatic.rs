//! Adiabatic command implementation.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use console::style;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rymis_sim::{
    Bitstring, Graph, State, expected_occupied_count, is_independent_set, most_probable,
    postprocess, sample, site_densities,
};
use serde::Serialize;

use super::common::{
    build_instance, hamiltonian, load_run_file, print_header, print_result, print_section,
    propagate,
};

/// One row of the ranking.
#[derive(Debug, Serialize)]
pub struct RankedConfiguration {
    pub configuration: String,
    pub probability: f64,
    pub independent: bool,
    pub postprocessed: String,
    pub postprocessed_size: usize,
}

/// Outcome of a sampled readout.
#[derive(Debug, Serialize)]
pub struct ShotSummary {
    pub shots: usize,
    /// Largest postprocessed set seen.
    pub best: String,
    pub best_size: usize,
    /// How many shots postprocessed to a set of `best_size`.
    pub best_count: usize,
    pub mean_size: f64,
}

/// Full report of an adiabatic run.
#[derive(Debug, Serialize)]
pub struct AdiabaticReport {
    pub atoms: usize,
    pub edges: usize,
    pub basis_dim: usize,
    pub sweep_time: f64,
    pub expected_occupation: f64,
    pub site_densities: Vec<f64>,
    pub top: Vec<RankedConfiguration>,
    pub shots: Option<ShotSummary>,
}

/// Execute the adiabatic command.
pub fn execute(config: &Path, json: bool) -> Result<()> {
    let run = load_run_file(config)?;
    let instance = build_instance(&run)?;

    let params = run.ansatz.linear_guess();
    let h = hamiltonian(&run, &instance, &params)?;
    let state = propagate(&run, &h)?;

    let top = rank(&state, &instance.graph, run.top_k);
    let shots = (run.shots > 0).then(|| {
        let mut rng = StdRng::seed_from_u64(run.seed);
        summarize_shots(&state, &instance.graph, run.shots, &mut rng)
    });

    let report = AdiabaticReport {
        atoms: instance.points.len(),
        edges: instance.graph.n_edges(),
        basis_dim: h.dim(),
        sweep_time: h.duration(),
        expected_occupation: expected_occupied_count(&state),
        site_densities: site_densities(&state),
        top,
        shots,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn rank(state: &State, graph: &Graph, k: usize) -> Vec<RankedConfiguration> {
    most_probable(state, k)
        .into_iter()
        .map(|(configuration, probability)| {
            let repaired = postprocess(&configuration, graph);
            RankedConfiguration {
                configuration: configuration.to_string(),
                probability,
                independent: is_independent_set(&configuration, graph),
                postprocessed: repaired.to_string(),
                postprocessed_size: repaired.occupied_count(),
            }
        })
        .collect()
}

fn summarize_shots(state: &State, graph: &Graph, shots: usize, rng: &mut StdRng) -> ShotSummary {
    let mut counts: BTreeMap<Bitstring, usize> = BTreeMap::new();
    for (configuration, _) in sample(state, shots, rng) {
        *counts.entry(postprocess(&configuration, graph)).or_default() += 1;
    }

    let total: usize = counts
        .iter()
        .map(|(set, count)| set.occupied_count() * count)
        .sum();
    let best_size = counts.keys().map(Bitstring::occupied_count).max().unwrap_or(0);
    let (best, best_count) = counts
        .iter()
        .filter(|(set, _)| set.occupied_count() == best_size)
        .fold((None, 0), |(first, n), (set, count)| {
            (first.or(Some(*set)), n + count)
        });

    ShotSummary {
        shots,
        best: best.map(|b| b.to_string()).unwrap_or_default(),
        best_size,
        best_count,
        mean_size: total as f64 / shots as f64,
    }
}

fn print_report(report: &AdiabaticReport) {
    print_header("Adiabatic sweep");
    print_result("Atoms", report.atoms);
    print_result("Edges", report.edges);
    print_result("Basis dimension", report.basis_dim);
    print_result("Sweep time (µs)", format!("{:.3}", report.sweep_time));
    print_result(
        "⟨N⟩",
        style(format!("{:.4}", report.expected_occupation)).yellow(),
    );

    print_section("Most probable configurations");
    for row in &report.top {
        let marker = if row.independent {
            style("✓").green()
        } else {
            style("✗").red()
        };
        println!(
            "  {} {}  p = {:.4}  → {} (|S| = {})",
            marker,
            style(&row.configuration).cyan(),
            row.probability,
            row.postprocessed,
            row.postprocessed_size
        );
    }

    if let Some(shots) = &report.shots {
        print_section(&format!("Sampled readout ({} shots)", shots.shots));
        print_result("Largest set", format!("{} (|S| = {})", shots.best, shots.best_size));
        print_result("Hits", shots.best_count);
        print_result("Mean |S|", format!("{:.3}", shots.mean_size));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use num_complex::Complex64;
    use rymis_sim::{Basis, Point, Subspace, SubspaceConfig, unit_disk_graph};

    use super::*;

    /// Two atoms within range, all amplitude on `10`.
    fn pair_state() -> (State, Graph) {
        let points = vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)];
        let graph = unit_disk_graph(&points, 1.5).unwrap();
        let subspace = Arc::new(Subspace::build(&graph, &SubspaceConfig::default()).unwrap());
        let basis = Basis::Blockade(subspace);
        let index = basis.index_of(&Bitstring::from_sites(2, [0])).unwrap();
        let mut amplitudes = vec![Complex64::new(0.0, 0.0); basis.dim()];
        amplitudes[index] = Complex64::new(1.0, 0.0);
        (State::from_amplitudes(basis, amplitudes).unwrap(), graph)
    }

    #[test]
    fn ranking_marks_independence() {
        let (state, graph) = pair_state();
        let top = rank(&state, &graph, 2);
        assert_eq!(top[0].probability, 1.0);
        assert!(top[0].independent);
        assert_eq!(top[0].postprocessed_size, 1);
    }

    #[test]
    fn shot_summary_counts_every_draw() {
        let (state, graph) = pair_state();
        let mut rng = StdRng::seed_from_u64(1);
        let summary = summarize_shots(&state, &graph, 20, &mut rng);
        assert_eq!(summary.best_size, 1);
        assert_eq!(summary.best_count, 20);
        assert_eq!(summary.mean_size, 1.0);
    }
}
