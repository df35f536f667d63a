//! Properties of blockade-violation repair.

use proptest::prelude::*;
use rymis_sim::{Bitstring, Graph, augment, is_independent_set, postprocess, repair};

fn arb_instance() -> impl Strategy<Value = (Graph, Bitstring)> {
    (1_usize..=16).prop_flat_map(|n| {
        (
            prop::collection::vec((0..n, 0..n), 0..=3 * n),
            any::<u64>(),
        )
            .prop_map(move |(pairs, bits)| {
                let graph =
                    Graph::from_edges(n, pairs.into_iter().filter(|(a, b)| a != b)).unwrap();
                (graph, Bitstring::new(bits, n))
            })
    })
}

proptest! {
    #[test]
    fn repair_yields_independent_subset((graph, config) in arb_instance()) {
        let fixed = repair(&config, &graph);
        prop_assert!(is_independent_set(&fixed, &graph));
        prop_assert!(fixed.is_subset_of(&config));
    }

    #[test]
    fn repair_is_idempotent((graph, config) in arb_instance()) {
        let once = repair(&config, &graph);
        prop_assert_eq!(repair(&once, &graph), once);
    }

    #[test]
    fn augment_only_adds_and_stays_independent((graph, config) in arb_instance()) {
        let independent = repair(&config, &graph);
        let grown = augment(&independent, &graph);
        prop_assert!(independent.is_subset_of(&grown));
        prop_assert!(is_independent_set(&grown, &graph));
    }

    #[test]
    fn postprocess_is_maximal((graph, config) in arb_instance()) {
        let out = postprocess(&config, &graph);
        prop_assert!(is_independent_set(&out, &graph));
        for v in 0..graph.n_vertices() {
            if !out.is_set(v) {
                prop_assert!(graph.neighbors(v).iter().any(|&u| out.is_set(u)));
            }
        }
    }
}

#[test]
fn star_centre_is_removed_first() {
    // Centre 0 conflicts with every leaf; dropping it frees all leaves.
    let graph = Graph::from_edges(5, [(0, 1), (0, 2), (0, 3), (0, 4)]).unwrap();
    let all = Bitstring::from_sites(5, 0..5);
    assert_eq!(repair(&all, &graph), Bitstring::from_sites(5, 1..5));
}
