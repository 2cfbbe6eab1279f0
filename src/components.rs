//! Connected components of the surviving edge graph.
//!
//! Components are found with a union-find arena over the nodes. Only nodes that are an endpoint of
//! at least one surviving edge take part; isolated nodes are not components.

use std::fmt;
use std::str::FromStr;

use crate::error::{NbsError, Result};
use crate::threshold::AdjacencyMask;

/// How the size of a component is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeMetric {
    /// Number of surviving edges in the component (the NBS convention).
    Edges,
    /// Number of nodes in the component.
    Nodes,
}

impl Default for SizeMetric {
    fn default() -> SizeMetric {
        SizeMetric::Edges
    }
}

impl fmt::Display for SizeMetric {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SizeMetric::Edges => write!(f, "edges"),
            SizeMetric::Nodes => write!(f, "nodes"),
        }
    }
}

impl FromStr for SizeMetric {
    type Err = NbsError;

    fn from_str(s: &str) -> Result<SizeMetric> {
        match s.trim().to_ascii_lowercase().as_str() {
            "edges" | "extent" => Ok(SizeMetric::Edges),
            "nodes" => Ok(SizeMetric::Nodes),
            _ => Err(NbsError::invalid_parameter("size_metric", s, "expected 'edges' or 'nodes'")),
        }
    }
}


/// A maximal connected subgraph of surviving edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Member nodes, ascending.
    pub nodes: Vec<usize>,
    /// Member edges as `(i, j)` with `i < j`, in row-major order.
    pub edges: Vec<(usize, usize)>,
    /// Size under the [`SizeMetric`] used for extraction.
    pub size: usize,
}

impl Component {
    pub fn contains_edge(&self, i: usize, j: usize) -> bool {
        let e = if i < j { (i, j) } else { (j, i) };
        self.edges.binary_search(&e).is_ok()
    }

    pub fn contains_node(&self, node: usize) -> bool {
        self.nodes.binary_search(&node).is_ok()
    }
}


/// Disjoint-set forest with union by rank and path halving.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    pub fn new(n: usize) -> UnionFind {
        UnionFind {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    /// Put every node back into its own set.
    pub fn reset(&mut self) {
        for (i, p) in self.parent.iter_mut().enumerate() {
            *p = i;
        }
        for r in self.rank.iter_mut() {
            *r = 0;
        }
    }

    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Merge the sets of `a` and `b`. Returns the new root.
    pub fn union(&mut self, a: usize, b: usize) -> usize {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return ra;
        }
        if self.rank[ra] < self.rank[rb] {
            self.parent[ra] = rb;
            rb
        } else if self.rank[ra] > self.rank[rb] {
            self.parent[rb] = ra;
            ra
        } else {
            self.parent[rb] = ra;
            self.rank[ra] += 1;
            ra
        }
    }
}


/// Extracts size-ranked components from a set of surviving edges.
///
/// The scratch arena is reused between calls, so one extractor per worker avoids allocations in the
/// permutation loop.
#[derive(Debug, Clone)]
pub struct ComponentExtractor {
    metric: SizeMetric,
    forest: UnionFind,
    touched: Vec<bool>,
    sizes: Vec<usize>,
}

impl ComponentExtractor {
    pub fn new(num_nodes: usize, metric: SizeMetric) -> ComponentExtractor {
        ComponentExtractor {
            metric,
            forest: UnionFind::new(num_nodes),
            touched: vec![false; num_nodes],
            sizes: vec![0; num_nodes],
        }
    }

    pub fn metric(&self) -> SizeMetric {
        self.metric
    }

    fn link(&mut self, edges: &[(usize, usize)]) {
        self.forest.reset();
        for t in self.touched.iter_mut() {
            *t = false;
        }
        for &(i, j) in edges {
            self.touched[i] = true;
            self.touched[j] = true;
            self.forest.union(i, j);
        }
    }


    /// Components of the graph formed by `edges`, sorted by size descending. Ties are ordered by
    /// their smallest node, so the output is fully determined by the edge set.
    ///
    /// # Panics
    ///
    /// If an edge refers to a node outside the extractor's node range.
    pub fn extract(&mut self, edges: &[(usize, usize)]) -> Vec<Component> {
        self.link(edges);

        let n = self.touched.len();
        // Component slot per root, assigned in ascending order of each component's smallest node.
        let mut slot: Vec<Option<usize>> = vec![None; n];
        let mut components: Vec<Component> = Vec::new();
        for node in 0..n {
            if !self.touched[node] {
                continue;
            }
            let root = self.forest.find(node);
            let idx = match slot[root] {
                Some(idx) => idx,
                None => {
                    components.push(Component { nodes: Vec::new(), edges: Vec::new(), size: 0 });
                    slot[root] = Some(components.len() - 1);
                    components.len() - 1
                }
            };
            components[idx].nodes.push(node);
        }

        let mut sorted_edges: Vec<(usize, usize)> = edges.iter()
            .map(|&(i, j)| if i < j { (i, j) } else { (j, i) })
            .collect();
        sorted_edges.sort_unstable();
        sorted_edges.dedup();
        for e in sorted_edges {
            let root = self.forest.find(e.0);
            if let Some(idx) = slot[root] {
                components[idx].edges.push(e);
            }
        }

        for c in components.iter_mut() {
            c.size = match self.metric {
                SizeMetric::Edges => c.edges.len(),
                SizeMetric::Nodes => c.nodes.len(),
            };
        }
        // Stable sort keeps the smallest-node order among equal sizes.
        components.sort_by(|a, b| b.size.cmp(&a.size));
        components
    }


    /// Components of the surviving edges of `mask`.
    pub fn extract_mask(&mut self, mask: &AdjacencyMask) -> Vec<Component> {
        self.extract(&mask.edges())
    }


    /// Size of the largest component of the graph formed by `edges`, or 0 if there are no edges.
    ///
    /// Edges must be distinct. This is the hot path of every permutation trial and does not build
    /// member lists.
    pub fn max_size(&mut self, edges: &[(usize, usize)]) -> usize {
        self.link(edges);
        for s in self.sizes.iter_mut() {
            *s = 0;
        }
        match self.metric {
            SizeMetric::Edges => {
                for &(i, _) in edges {
                    let root = self.forest.find(i);
                    self.sizes[root] += 1;
                }
            }
            SizeMetric::Nodes => {
                for node in 0..self.touched.len() {
                    if self.touched[node] {
                        let root = self.forest.find(node);
                        self.sizes[root] += 1;
                    }
                }
            }
        }
        self.sizes.iter().cloned().max().unwrap_or(0)
    }
}


/// Components of the surviving edges of `mask`, sorted by size descending.
pub fn extract_components(mask: &AdjacencyMask, metric: SizeMetric) -> Vec<Component> {
    ComponentExtractor::new(mask.num_nodes(), metric).extract_mask(mask)
}
