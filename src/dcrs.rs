//! Distributed compressed-row-storage adjacency graph.
//!
//! A [`Dcrs`] holds one process's slice of a global cell-to-cell graph:
//! `offsets`/`indices` are a local CSR pair whose neighbor entries are
//! *global* ids, and `distribution` records the global entity split the
//! graph was built against. The layout is exactly what a k-way graph
//! partitioner consumes (`vtxdist`/`xadj`/`adjncy`).

use serde::{Deserialize, Serialize};

/// One process's slice of the distributed adjacency graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dcrs {
    /// `entries() + 1` monotone offsets, `offsets[0] == 0`.
    pub offsets: Vec<usize>,
    /// Flattened neighbor lists, global ids.
    pub indices: Vec<usize>,
    /// Global entity distribution the graph was built against.
    pub distribution: Vec<usize>,
}

impl Dcrs {
    /// Number of locally-owned graph nodes.
    pub fn entries(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Total number of global entities in the distribution.
    pub fn global_indices(&self) -> usize {
        self.distribution.last().copied().unwrap_or(0)
    }

    /// Number of regions in the naive distribution.
    pub fn global_colors(&self) -> usize {
        self.distribution.len().saturating_sub(1)
    }

    /// Neighbor list of local node `i`.
    pub fn neighbors(&self, i: usize) -> &[usize] {
        &self.indices[self.offsets[i]..self.offsets[i + 1]]
    }

    /// Offsets cast to the partitioner index type.
    pub fn offsets_as<T: TryFrom<usize>>(&self) -> Vec<T>
    where
        T::Error: std::fmt::Debug,
    {
        self.offsets
            .iter()
            .map(|&v| T::try_from(v).expect("offset exceeds partitioner index range"))
            .collect()
    }

    /// Adjacency cast to the partitioner index type.
    pub fn indices_as<T: TryFrom<usize>>(&self) -> Vec<T>
    where
        T::Error: std::fmt::Debug,
    {
        self.indices
            .iter()
            .map(|&v| T::try_from(v).expect("index exceeds partitioner index range"))
            .collect()
    }

    /// Distribution cast to the partitioner index type.
    pub fn distribution_as<T: TryFrom<usize>>(&self) -> Vec<T>
    where
        T::Error: std::fmt::Debug,
    {
        self.distribution
            .iter()
            .map(|&v| T::try_from(v).expect("distribution exceeds partitioner index range"))
            .collect()
    }

    /// Structural invariants: monotone offsets starting at zero, and the
    /// adjacency length matching the final offset.
    pub fn validate(&self) -> bool {
        if self.offsets.first() != Some(&0) {
            return false;
        }
        if !self.offsets.windows(2).all(|w| w[0] <= w[1]) {
            return false;
        }
        self.indices.len() == *self.offsets.last().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_slice() -> Dcrs {
        // Cells 0..4 on this rank out of a global 0..8 split in half.
        Dcrs {
            offsets: vec![0, 1, 3, 5, 7],
            indices: vec![1, 0, 2, 1, 3, 2, 4],
            distribution: vec![0, 4, 8],
        }
    }

    #[test]
    fn accessors() {
        let g = chain_slice();
        assert!(g.validate());
        assert_eq!(g.entries(), 4);
        assert_eq!(g.global_indices(), 8);
        assert_eq!(g.global_colors(), 2);
        assert_eq!(g.neighbors(0), &[1]);
        assert_eq!(g.neighbors(3), &[2, 4]);
    }

    #[test]
    fn casts() {
        let g = chain_slice();
        assert_eq!(g.distribution_as::<i32>(), vec![0, 4, 8]);
        assert_eq!(g.offsets_as::<i64>(), vec![0, 1, 3, 5, 7]);
        assert_eq!(g.indices_as::<i32>().len(), g.indices.len());
    }

    #[test]
    fn validate_rejects_bad_offsets() {
        let mut g = chain_slice();
        g.offsets[2] = 0;
        assert!(!g.validate());
        let mut g = chain_slice();
        g.indices.pop();
        assert!(!g.validate());
    }
}
