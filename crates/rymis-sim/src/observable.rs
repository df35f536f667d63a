//! Observables and measurement sampling.

use rand::Rng;

use crate::bitstring::Bitstring;
use crate::geometry::Graph;
use crate::state::State;

/// `Σ_c |ψ_c|² · popcount(c)`.
pub fn expected_occupied_count(state: &State) -> f64 {
    let basis = state.basis();
    state
        .amplitudes()
        .iter()
        .enumerate()
        .map(|(i, a)| a.norm_sqr() * f64::from(basis.bits(i).count_ones()))
        .sum()
}

/// Probability that each vertex is excited.
pub fn site_densities(state: &State) -> Vec<f64> {
    let basis = state.basis();
    let mut densities = vec![0.0; basis.n_sites()];
    for (i, a) in state.amplitudes().iter().enumerate() {
        let p = a.norm_sqr();
        let mut bits = basis.bits(i);
        while bits != 0 {
            densities[bits.trailing_zeros() as usize] += p;
            bits &= bits - 1;
        }
    }
    densities
}

/// Sum of Born probabilities over the basis.
pub fn total_probability(state: &State) -> f64 {
    state.norm_sqr()
}

/// Draw `count` independent measurement outcomes.
///
/// Results come back in draw order, each paired with its Born probability.
/// Probabilities are renormalised by their sum, so a state that drifted
/// slightly off unit norm still samples correctly.
pub fn sample<R: Rng>(state: &State, count: usize, rng: &mut R) -> Vec<(Bitstring, f64)> {
    let probabilities = state.probabilities();
    let mut cdf = Vec::with_capacity(probabilities.len());
    let mut acc = 0.0;
    for p in &probabilities {
        acc += p;
        cdf.push(acc);
    }
    if acc <= 0.0 {
        return Vec::new();
    }

    let basis = state.basis();
    let last = probabilities.len() - 1;
    (0..count)
        .map(|_| {
            let u = rng.r#gen::<f64>() * acc;
            let i = cdf.partition_point(|&c| c <= u).min(last);
            (basis.configuration(i), probabilities[i])
        })
        .collect()
}

/// The `k` most likely configurations, by descending probability with ties
/// in basis order.
pub fn most_probable(state: &State, k: usize) -> Vec<(Bitstring, f64)> {
    let probabilities = state.probabilities();
    let mut order: Vec<usize> = (0..probabilities.len()).collect();
    order.sort_by(|&a, &b| probabilities[b].total_cmp(&probabilities[a]));
    order
        .into_iter()
        .take(k)
        .map(|i| (state.basis().configuration(i), probabilities[i]))
        .collect()
}

/// True iff no edge of `graph` has both endpoints excited.
pub fn is_independent_set(configuration: &Bitstring, graph: &Graph) -> bool {
    graph
        .edges()
        .into_iter()
        .all(|(a, b)| !(configuration.is_set(a) && configuration.is_set(b)))
}
