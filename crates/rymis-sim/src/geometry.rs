//! Atom geometry and the unit-disk graph derived from it.
//!
//! Two atoms closer than the blockade radius cannot both be excited, so the
//! constraint graph joins every pair of points within that distance.
//!
//! ```rust
//! use rymis_sim::geometry::{Point, unit_disk_graph};
//!
//! let points = vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(3.0, 0.0)];
//! let graph = unit_disk_graph(&points, 1.5).unwrap();
//! assert_eq!(graph.n_edges(), 1);
//! assert!(graph.has_edge(0, 1));
//! ```

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// A 2-D atom position (µm).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Create a point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// Undirected constraint graph; vertex `i` is point `i`.
///
/// Edge weights hold the pair distance when the graph came from geometry,
/// and `1.0` for graphs built from an explicit edge list.
#[derive(Debug, Clone)]
pub struct Graph {
    inner: UnGraph<(), f64>,
}

impl Graph {
    /// A graph with `n` vertices and no edges.
    pub fn empty(n: usize) -> Self {
        let mut inner = UnGraph::with_capacity(n, 0);
        for _ in 0..n {
            inner.add_node(());
        }
        Self { inner }
    }

    /// Build from an explicit edge list. Duplicate edges collapse; self-loops
    /// and out-of-range endpoints are rejected.
    pub fn from_edges(n: usize, edges: impl IntoIterator<Item = (usize, usize)>) -> SimResult<Self> {
        let mut graph = Self::empty(n);
        for (a, b) in edges {
            graph.insert_edge(a, b, 1.0)?;
        }
        Ok(graph)
    }

    fn insert_edge(&mut self, a: usize, b: usize, weight: f64) -> SimResult<()> {
        let n = self.n_vertices();
        if a >= n || b >= n {
            return Err(SimError::InvalidGraphSpec(format!(
                "edge ({a}, {b}) references a vertex outside 0..{n}"
            )));
        }
        if a == b {
            return Err(SimError::InvalidGraphSpec(format!("self-loop on vertex {a}")));
        }
        self.inner
            .update_edge(NodeIndex::new(a), NodeIndex::new(b), weight);
        Ok(())
    }

    /// Number of vertices.
    pub fn n_vertices(&self) -> usize {
        self.inner.node_count()
    }

    /// Number of edges.
    pub fn n_edges(&self) -> usize {
        self.inner.edge_count()
    }

    /// Edges as `(low, high)` index pairs, sorted.
    pub fn edges(&self) -> Vec<(usize, usize)> {
        let mut edges: Vec<(usize, usize)> = self
            .inner
            .edge_references()
            .map(|e| {
                let (a, b) = (e.source().index(), e.target().index());
                (a.min(b), a.max(b))
            })
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Neighbours of `v` in ascending order.
    pub fn neighbors(&self, v: usize) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .inner
            .neighbors(NodeIndex::new(v))
            .map(NodeIndex::index)
            .collect();
        out.sort_unstable();
        out
    }

    /// True if `a` and `b` are adjacent.
    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        let n = self.n_vertices();
        a < n && b < n && self.inner.contains_edge(NodeIndex::new(a), NodeIndex::new(b))
    }

    /// Number of neighbours of `v`.
    pub fn degree(&self, v: usize) -> usize {
        self.inner.neighbors(NodeIndex::new(v)).count()
    }

    /// One bit mask of neighbours per vertex.
    ///
    /// Configurations are packed into `u64`, so graphs above 64 vertices are
    /// rejected.
    pub fn neighbor_masks(&self) -> SimResult<Vec<u64>> {
        let n = self.n_vertices();
        if n > 64 {
            return Err(SimError::SubspaceOverflow {
                n_vertices: n,
                limit: 64,
            });
        }
        let mut masks = vec![0u64; n];
        for (a, b) in self.edges() {
            masks[a] |= 1 << b;
            masks[b] |= 1 << a;
        }
        Ok(masks)
    }

    /// Order-independent fingerprint of the vertex count and edge set.
    pub fn fingerprint(&self) -> (usize, Vec<(usize, usize)>) {
        (self.n_vertices(), self.edges())
    }

    /// The underlying petgraph graph, for external solvers.
    pub fn as_petgraph(&self) -> &UnGraph<(), f64> {
        &self.inner
    }
}

/// Join every pair of points whose distance is at most `threshold`.
pub fn unit_disk_graph(points: &[Point], threshold: f64) -> SimResult<Graph> {
    if !(threshold.is_finite() && threshold > 0.0) {
        return Err(SimError::InvalidGraphSpec(format!(
            "distance threshold must be positive and finite, got {threshold}"
        )));
    }
    if let Some(i) = points.iter().position(|p| !p.is_finite()) {
        return Err(SimError::InvalidGraphSpec(format!(
            "point {i} has a non-finite coordinate"
        )));
    }

    let mut graph = Graph::empty(points.len());
    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            let d = points[i].distance(&points[j]);
            if d <= threshold {
                graph.insert_edge(i, j, d)?;
            }
        }
    }
    Ok(graph)
}

/// Sites of a `rows × cols` square lattice with the given spacing, row-major.
pub fn square_lattice(rows: usize, cols: usize, spacing: f64) -> Vec<Point> {
    (0..rows)
        .flat_map(|r| (0..cols).map(move |c| Point::new(c as f64 * spacing, r as f64 * spacing)))
        .collect()
}

/// A square lattice with each site kept independently with probability
/// `filling`.
///
/// The caller owns the random source, so lattice generation is reproducible
/// independently of any later sampling.
pub fn random_dropout_lattice<R: Rng>(
    rows: usize,
    cols: usize,
    spacing: f64,
    filling: f64,
    rng: &mut R,
) -> SimResult<Vec<Point>> {
    if !(0.0..=1.0).contains(&filling) {
        return Err(SimError::InvalidGraphSpec(format!(
            "filling fraction must lie in [0, 1], got {filling}"
        )));
    }
    Ok(square_lattice(rows, cols, spacing)
        .into_iter()
        .filter(|_| rng.r#gen::<f64>() < filling)
        .collect())
}
