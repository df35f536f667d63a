//! Blockade subspace enumeration against brute force.

use proptest::prelude::*;
use rymis_sim::{
    Basis, Bitstring, Graph, SimError, Subspace, SubspaceCache, SubspaceConfig,
    is_independent_set, square_lattice, unit_disk_graph,
};

/// Random graphs on up to 12 vertices.
fn arb_graph() -> impl Strategy<Value = Graph> {
    (1_usize..=12).prop_flat_map(|n| {
        prop::collection::vec((0..n, 0..n), 0..=2 * n).prop_map(move |pairs| {
            let edges = pairs.into_iter().filter(|(a, b)| a != b);
            Graph::from_edges(n, edges).unwrap()
        })
    })
}

fn brute_force_independent_sets(graph: &Graph) -> Vec<u64> {
    let n = graph.n_vertices();
    (0..1u64 << n)
        .filter(|&bits| is_independent_set(&Bitstring::new(bits, n), graph))
        .collect()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn matches_brute_force(graph in arb_graph()) {
        let subspace = Subspace::build(&graph, &SubspaceConfig::default()).unwrap();
        let expected = brute_force_independent_sets(&graph);
        prop_assert_eq!(subspace.raw(), expected.as_slice());
    }

    #[test]
    fn every_member_is_independent_and_zero_is_first(graph in arb_graph()) {
        let subspace = Subspace::build(&graph, &SubspaceConfig::default()).unwrap();
        prop_assert_eq!(subspace.raw()[0], 0);
        for c in subspace.iter() {
            prop_assert!(is_independent_set(&c, &graph));
        }
    }

    #[test]
    fn index_lookup_inverts_position(graph in arb_graph()) {
        let subspace = Subspace::build(&graph, &SubspaceConfig::default()).unwrap();
        for (i, c) in subspace.iter().enumerate() {
            prop_assert_eq!(subspace.index_of(&c), Some(i));
        }
    }
}

// ---------------------------------------------------------------------------
// Fixed instances
// ---------------------------------------------------------------------------

#[test]
fn edgeless_graph_spans_full_space() {
    for n in [1, 4, 9] {
        let subspace = Subspace::build(&Graph::empty(n), &SubspaceConfig::default()).unwrap();
        assert_eq!(subspace.len(), 1 << n);
        let full = Basis::full(n, &SubspaceConfig::default()).unwrap();
        assert_eq!(full.dim(), subspace.len());
    }
}

#[test]
fn triangle_has_four_independent_sets() {
    let g = Graph::from_edges(3, [(0, 1), (1, 2), (0, 2)]).unwrap();
    let subspace = Subspace::build(&g, &SubspaceConfig::default()).unwrap();
    assert_eq!(subspace.raw(), &[0b000, 0b001, 0b010, 0b100]);
}

#[test]
fn king_graph_lattice_count() {
    // 3×3 lattice with diagonal blockade: the king graph on 9 vertices has
    // 35 independent sets.
    let points = square_lattice(3, 3, 1.0);
    let graph = unit_disk_graph(&points, 1.5).unwrap();
    let subspace = Subspace::build(&graph, &SubspaceConfig::default()).unwrap();
    assert_eq!(subspace.len(), 35);
}

#[test]
fn vertex_limit_is_enforced() {
    let config = SubspaceConfig {
        max_vertices: 8,
        ..SubspaceConfig::default()
    };
    let err = Subspace::build(&Graph::empty(9), &config).unwrap_err();
    assert!(matches!(
        err,
        SimError::SubspaceOverflow {
            n_vertices: 9,
            limit: 8
        }
    ));
}

#[test]
fn edgeless_graph_at_vertex_limit_fails_on_basis_size() {
    // 2^32 independent sets: the default basis bound stops enumeration long
    // before memory runs out.
    let config = SubspaceConfig::default();
    assert_eq!(config.max_vertices, 32);
    let err = Subspace::build(&Graph::empty(32), &config).unwrap_err();
    assert!(matches!(
        err,
        SimError::BasisOverflow { n_vertices: 32, limit } if limit == config.max_basis_size
    ));
}

#[test]
fn cache_separates_distinct_graphs() {
    let mut cache = SubspaceCache::new();
    let config = SubspaceConfig::default();
    let path = Graph::from_edges(3, [(0, 1), (1, 2)]).unwrap();
    let triangle = Graph::from_edges(3, [(0, 1), (1, 2), (0, 2)]).unwrap();
    assert_eq!(cache.get_or_build(&path, &config).unwrap().len(), 5);
    assert_eq!(cache.get_or_build(&triangle, &config).unwrap().len(), 4);
    assert_eq!(cache.get_or_build(&path, &config).unwrap().len(), 5);
    assert_eq!(cache.len(), 2);
}
