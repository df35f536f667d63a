//! Optimize command implementation.

use std::path::Path;

use anyhow::Result;
use console::style;
use indicatif::ProgressBar;
use rymis_sim::{is_independent_set, most_probable, postprocess};
use rymis_vqa::{MisLoss, optimize};
use serde::Serialize;

use super::common::{
    build_instance, create_spinner, load_run_file, print_header, print_result, print_section,
};

/// Result of a variational run.
#[derive(Debug, Serialize)]
pub struct OptimizeReport {
    pub atoms: usize,
    pub basis_dim: usize,
    pub initial_params: Vec<f64>,
    pub initial_loss: f64,
    pub best_params: Vec<f64>,
    pub best_loss: f64,
    pub evaluations: usize,
    pub failed_evaluations: usize,
    pub converged: bool,
    /// Most probable configuration at the best parameters, postprocessed.
    pub solution: String,
    pub solution_size: usize,
}

/// Execute the optimize command.
pub fn execute(config: &Path, json: bool) -> Result<()> {
    let run = load_run_file(config)?;
    let instance = build_instance(&run)?;
    let graph = instance.graph.clone();

    let loss = MisLoss::new(
        instance.graph,
        instance.points,
        instance.subspace,
        run.ansatz.clone(),
    )?
    .with_interaction(run.c6)
    .with_ode_config(run.simulation.ode.clone());

    let init = run.ansatz.linear_guess();
    let spinner = if json {
        ProgressBar::hidden()
    } else {
        create_spinner("evaluations")?
    };

    let outcome = optimize(
        &init,
        |params| {
            let value = loss.evaluate(params);
            spinner.inc(1);
            if let Ok(v) = &value {
                spinner.set_message(format!("evaluations, last loss {v:.4}"));
            }
            value
        },
        &run.optimizer,
    )?;
    spinner.finish_and_clear();

    let state = loss.final_state(&outcome.best_params)?;
    let (solution, solution_size) = match most_probable(&state, 1).first() {
        Some((configuration, _)) => {
            let repaired = postprocess(configuration, &graph);
            debug_assert!(is_independent_set(&repaired, &graph));
            (repaired.to_string(), repaired.occupied_count())
        }
        None => (String::new(), 0),
    };

    let report = OptimizeReport {
        atoms: graph.n_vertices(),
        basis_dim: state.dim(),
        initial_params: init,
        initial_loss: outcome.initial_loss,
        best_params: outcome.best_params,
        best_loss: outcome.best_loss,
        evaluations: outcome.trace.len(),
        failed_evaluations: outcome.trace.failures(),
        converged: outcome.converged,
        solution,
        solution_size,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn format_params(params: &[f64]) -> String {
    let parts: Vec<String> = params.iter().map(|p| format!("{p:.4}")).collect();
    format!("[{}]", parts.join(", "))
}

fn print_report(report: &OptimizeReport) {
    print_header("Variational optimization");
    print_result("Atoms", report.atoms);
    print_result("Basis dimension", report.basis_dim);

    print_section("Loss");
    print_result("Initial", format!("{:.6}", report.initial_loss));
    print_result("Best", style(format!("{:.6}", report.best_loss)).yellow());
    print_result(
        "Evaluations",
        format!(
            "{} ({} failed)",
            report.evaluations, report.failed_evaluations
        ),
    );
    let status = if report.converged {
        style("converged").green()
    } else {
        style("budget exhausted").yellow()
    };
    print_result("Status", status);

    print_section("Parameters");
    print_result("Initial", format_params(&report.initial_params));
    print_result("Best", format_params(&report.best_params));

    print_section("Solution");
    print_result(
        "Independent set",
        format!("{} (|S| = {})", report.solution, report.solution_size),
    );
}
