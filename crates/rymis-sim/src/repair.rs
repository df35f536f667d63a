//! Post-measurement repair of blockade violations.
//!
//! Samples taken from a full-space simulation (or from noisy hardware) may
//! excite two neighbouring atoms. [`repair`] removes excitations until the
//! configuration is independent; [`augment`] then greedily adds vertices
//! back, so [`postprocess`] always returns a maximal independent set.

use tracing::trace;

use crate::bitstring::Bitstring;
use crate::geometry::Graph;

/// Remove excitations until no edge has both endpoints set.
///
/// Each round drops the excited vertex with the most excited neighbours,
/// the lowest index winning ties. Only removes bits, and stops after at most
/// `n` rounds.
pub fn repair(configuration: &Bitstring, graph: &Graph) -> Bitstring {
    let n = graph.n_vertices().min(configuration.len());
    let neighbors: Vec<Vec<usize>> = (0..n).map(|v| graph.neighbors(v)).collect();
    let mut current = *configuration;

    for _ in 0..n {
        let mut worst: Option<(usize, usize)> = None;
        for v in current.occupied_sites().filter(|&v| v < n) {
            let conflicts = neighbors[v].iter().filter(|&&u| current.is_set(u)).count();
            if conflicts > 0 && worst.is_none_or(|(_, best)| conflicts > best) {
                worst = Some((v, conflicts));
            }
        }
        match worst {
            Some((v, conflicts)) => {
                trace!(vertex = v, conflicts, "dropping excitation");
                current = current.cleared(v);
            }
            None => break,
        }
    }
    current
}

/// Greedily excite every vertex, in ascending index order, that has no
/// excited neighbour. Only adds bits.
pub fn augment(configuration: &Bitstring, graph: &Graph) -> Bitstring {
    let n = graph.n_vertices().min(configuration.len());
    let mut current = *configuration;
    for v in 0..n {
        if !current.is_set(v) && graph.neighbors(v).iter().all(|&u| !current.is_set(u)) {
            current = current.with_set(v);
        }
    }
    current
}

/// [`repair`] followed by [`augment`]: a maximal independent set.
pub fn postprocess(configuration: &Bitstring, graph: &Graph) -> Bitstring {
    augment(&repair(configuration, graph), graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::is_independent_set;

    fn path(n: usize) -> Graph {
        Graph::from_edges(n, (0..n - 1).map(|i| (i, i + 1))).unwrap()
    }

    #[test]
    fn removes_highest_violation_degree_first() {
        // 0-1-2 all excited: vertex 1 has two conflicts, the ends have one.
        let g = path(3);
        let fixed = repair(&Bitstring::from_sites(3, [0, 1, 2]), &g);
        assert_eq!(fixed, Bitstring::from_sites(3, [0, 2]));
    }

    #[test]
    fn ties_go_to_lowest_index() {
        let g = path(2);
        let fixed = repair(&Bitstring::from_sites(2, [0, 1]), &g);
        assert_eq!(fixed, Bitstring::from_sites(2, [1]));
    }

    #[test]
    fn independent_input_is_untouched() {
        let g = path(4);
        let c = Bitstring::from_sites(4, [0, 3]);
        assert_eq!(repair(&c, &g), c);
    }

    #[test]
    fn augment_fills_gaps() {
        let g = path(5);
        let out = augment(&Bitstring::from_sites(5, [1]), &g);
        assert_eq!(out, Bitstring::from_sites(5, [1, 3]));
        assert!(is_independent_set(&out, &g));
    }

    #[test]
    fn postprocess_gives_maximal_set() {
        let g = path(4);
        let out = postprocess(&Bitstring::from_sites(4, [0, 1, 2, 3]), &g);
        assert!(is_independent_set(&out, &g));
        for v in 0..4 {
            if !out.is_set(v) {
                assert!(g.neighbors(v).iter().any(|&u| out.is_set(u)));
            }
        }
    }
}
