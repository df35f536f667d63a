//! Blockade subspace enumeration and basis selection.
//!
//! The blockade subspace holds every configuration that is an independent
//! set of the constraint graph. It is enumerated once by backtracking over
//! the vertices and stored as one contiguous arena of packed patterns in
//! ascending numeric order; everything downstream (Hamiltonian rows, state
//! amplitudes) refers to configurations by their position in that arena.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::bitstring::Bitstring;
use crate::config::SubspaceConfig;
use crate::error::{SimError, SimResult};
use crate::geometry::Graph;

/// The independent sets of a graph, indexed.
#[derive(Debug, Clone)]
pub struct Subspace {
    n_sites: usize,
    configurations: Vec<u64>,
    index: FxHashMap<u64, usize>,
}

impl PartialEq for Subspace {
    fn eq(&self, other: &Self) -> bool {
        self.n_sites == other.n_sites && self.configurations == other.configurations
    }
}

impl Subspace {
    /// Enumerate the independent sets of `graph`.
    ///
    /// Fails with [`SimError::SubspaceOverflow`] when the vertex count is
    /// above `config.max_vertices`, and with [`SimError::BasisOverflow`] as
    /// soon as enumeration passes `config.max_basis_size` configurations.
    pub fn build(graph: &Graph, config: &SubspaceConfig) -> SimResult<Self> {
        let n = graph.n_vertices();
        let limit = config.max_vertices.min(64);
        if n > limit {
            return Err(SimError::SubspaceOverflow {
                n_vertices: n,
                limit,
            });
        }
        let masks = graph.neighbor_masks()?;

        let mut configurations = Vec::new();
        if !extend(n, 0, 0, &masks, config.max_basis_size, &mut configurations) {
            return Err(SimError::BasisOverflow {
                n_vertices: n,
                limit: config.max_basis_size,
            });
        }

        if configurations.len() > config.warn_basis_size {
            warn!(
                n_vertices = n,
                basis_size = configurations.len(),
                "blockade subspace is very large"
            );
        }
        debug!(
            n_vertices = n,
            n_edges = graph.n_edges(),
            basis_size = configurations.len(),
            "built blockade subspace"
        );

        let index = configurations
            .iter()
            .enumerate()
            .map(|(i, &c)| (c, i))
            .collect();
        Ok(Self {
            n_sites: n,
            configurations,
            index,
        })
    }

    /// Number of configurations.
    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    /// Always false: the empty configuration is a member of every subspace.
    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }

    /// Number of sites per configuration.
    pub fn n_sites(&self) -> usize {
        self.n_sites
    }

    /// Configuration at position `i`.
    pub fn configuration(&self, i: usize) -> Bitstring {
        Bitstring::new(self.configurations[i], self.n_sites)
    }

    /// Packed patterns in basis order.
    pub fn raw(&self) -> &[u64] {
        &self.configurations
    }

    /// Position of a packed pattern, if it is a member.
    pub fn index_of_bits(&self, bits: u64) -> Option<usize> {
        self.index.get(&bits).copied()
    }

    /// Position of `configuration`, if it is a member.
    pub fn index_of(&self, configuration: &Bitstring) -> Option<usize> {
        if configuration.len() != self.n_sites {
            return None;
        }
        self.index_of_bits(configuration.bits())
    }

    /// Configurations in basis order.
    pub fn iter(&self) -> impl Iterator<Item = Bitstring> + '_ {
        self.configurations
            .iter()
            .map(move |&c| Bitstring::new(c, self.n_sites))
    }
}

/// Decide vertices `remaining - 1` down to 0, excluded before included, so
/// patterns come out in ascending numeric order.
///
/// Returns false once `out` would grow past `cap`.
fn extend(
    remaining: usize,
    bits: u64,
    blocked: u64,
    masks: &[u64],
    cap: usize,
    out: &mut Vec<u64>,
) -> bool {
    if remaining == 0 {
        if out.len() >= cap {
            return false;
        }
        out.push(bits);
        return true;
    }
    let v = remaining - 1;
    if !extend(v, bits, blocked, masks, cap, out) {
        return false;
    }
    if blocked & (1 << v) == 0 {
        return extend(v, bits | (1 << v), blocked | masks[v], masks, cap, out);
    }
    true
}

/// The space a Hamiltonian and its states are expressed in.
///
/// This is the mode tag that selects the matrix-vector implementation.
#[derive(Debug, Clone)]
pub enum Basis {
    /// All `2^n` configurations, index = packed pattern.
    Full {
        /// Number of sites.
        n_sites: usize,
    },
    /// Independent sets only.
    Blockade(Arc<Subspace>),
}

impl PartialEq for Basis {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Full { n_sites: a }, Self::Full { n_sites: b }) => a == b,
            (Self::Blockade(a), Self::Blockade(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

impl Basis {
    /// The full `2^n` space, bounded by `config.max_full_space_sites`.
    pub fn full(n_sites: usize, config: &SubspaceConfig) -> SimResult<Self> {
        let limit = config.max_full_space_sites.min(63);
        if n_sites > limit {
            return Err(SimError::SubspaceOverflow {
                n_vertices: n_sites,
                limit,
            });
        }
        Ok(Self::Full { n_sites })
    }

    /// Number of sites.
    pub fn n_sites(&self) -> usize {
        match self {
            Self::Full { n_sites } => *n_sites,
            Self::Blockade(s) => s.n_sites(),
        }
    }

    /// Number of basis states.
    pub fn dim(&self) -> usize {
        match self {
            Self::Full { n_sites } => 1 << n_sites,
            Self::Blockade(s) => s.len(),
        }
    }

    /// True for the unconstrained space.
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full { .. })
    }

    /// Packed pattern at position `i`.
    pub fn bits(&self, i: usize) -> u64 {
        match self {
            Self::Full { .. } => i as u64,
            Self::Blockade(s) => s.raw()[i],
        }
    }

    /// Configuration at position `i`.
    pub fn configuration(&self, i: usize) -> Bitstring {
        Bitstring::new(self.bits(i), self.n_sites())
    }

    /// Position of `configuration`, if representable.
    pub fn index_of(&self, configuration: &Bitstring) -> Option<usize> {
        match self {
            Self::Full { n_sites } => {
                (configuration.len() == *n_sites).then_some(configuration.bits() as usize)
            }
            Self::Blockade(s) => s.index_of(configuration),
        }
    }
}

/// Memoised subspaces keyed by graph structure.
#[derive(Debug, Default)]
pub struct SubspaceCache {
    entries: FxHashMap<(usize, Vec<(usize, usize)>), Arc<Subspace>>,
}

impl SubspaceCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached subspace for `graph`, building it on first use.
    pub fn get_or_build(
        &mut self,
        graph: &Graph,
        config: &SubspaceConfig,
    ) -> SimResult<Arc<Subspace>> {
        let key = graph.fingerprint();
        if let Some(hit) = self.entries.get(&key) {
            return Ok(Arc::clone(hit));
        }
        let subspace = Arc::new(Subspace::build(graph, config)?);
        self.entries.insert(key, Arc::clone(&subspace));
        Ok(subspace)
    }

    /// Number of cached subspaces.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path4() -> Graph {
        Graph::from_edges(4, [(0, 1), (1, 2), (2, 3)]).unwrap()
    }

    #[test]
    fn path_graph_independent_sets() {
        let s = Subspace::build(&path4(), &SubspaceConfig::default()).unwrap();
        // ∅, 4 singletons, {0,2}, {0,3}, {1,3}
        assert_eq!(s.len(), 8);
        assert_eq!(s.raw(), &[0b0000, 0b0001, 0b0010, 0b0100, 0b0101, 0b1000, 0b1001, 0b1010]);
    }

    #[test]
    fn order_is_ascending() {
        let g = Graph::from_edges(6, [(0, 1), (2, 3), (1, 4), (4, 5)]).unwrap();
        let s = Subspace::build(&g, &SubspaceConfig::default()).unwrap();
        assert!(s.raw().windows(2).all(|w| w[0] < w[1]));
        assert_eq!(s.raw()[0], 0);
    }

    #[test]
    fn overflow_is_reported() {
        let config = SubspaceConfig {
            max_vertices: 3,
            ..SubspaceConfig::default()
        };
        let err = Subspace::build(&path4(), &config).unwrap_err();
        assert!(matches!(
            err,
            SimError::SubspaceOverflow {
                n_vertices: 4,
                limit: 3
            }
        ));
    }

    #[test]
    fn basis_size_bound_stops_enumeration() {
        let config = SubspaceConfig {
            max_basis_size: 7,
            ..SubspaceConfig::default()
        };
        // path4 has exactly 8 independent sets.
        let err = Subspace::build(&path4(), &config).unwrap_err();
        assert!(matches!(
            err,
            SimError::BasisOverflow {
                n_vertices: 4,
                limit: 7
            }
        ));
        let exact = SubspaceConfig {
            max_basis_size: 8,
            ..SubspaceConfig::default()
        };
        assert_eq!(Subspace::build(&path4(), &exact).unwrap().len(), 8);
    }

    #[test]
    fn lookup_roundtrip() {
        let s = Subspace::build(&path4(), &SubspaceConfig::default()).unwrap();
        for (i, c) in s.iter().enumerate() {
            assert_eq!(s.index_of(&c), Some(i));
        }
        assert_eq!(s.index_of(&Bitstring::from_sites(4, [0, 1])), None);
        assert_eq!(s.index_of(&Bitstring::zeros(5)), None);
    }

    #[test]
    fn full_basis_indexing() {
        let b = Basis::full(3, &SubspaceConfig::default()).unwrap();
        assert_eq!(b.dim(), 8);
        assert_eq!(b.configuration(5), Bitstring::from_sites(3, [0, 2]));
        assert_eq!(b.index_of(&Bitstring::from_sites(3, [1])), Some(2));
        let small = SubspaceConfig {
            max_full_space_sites: 2,
            ..SubspaceConfig::default()
        };
        assert!(Basis::full(3, &small).is_err());
    }

    #[test]
    fn cache_reuses_structure() {
        let mut cache = SubspaceCache::new();
        let a = cache.get_or_build(&path4(), &SubspaceConfig::default()).unwrap();
        let g = Graph::from_edges(4, [(2, 3), (1, 2), (0, 1)]).unwrap();
        let b = cache.get_or_build(&g, &SubspaceConfig::default()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }
}
