//! Pack value types for the coloring pipeline's communication rounds.
//!
//! Each round is a small value type implementing a pack trait from
//! [`crate::comm::collective`]. All-to-all packs serialize every
//! per-destination payload in their constructor; `byte_count` and
//! `payload_for` only read the precomputed buffers, so repeated calls
//! are cheap and side-effect free.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::color_map::{distribution_offset, ColorMap};
use crate::coloring::MeshState;
use crate::comm::collective::{encode, AllToAllPack, OneToAllPack};
use crate::dcrs::Dcrs;
use crate::definition::MeshDefinition;
use crate::error::ColoringError;

/// Root-side packing of the naive contiguous cell slices.
pub struct PackCells<'a, D> {
    md: &'a D,
    dist: &'a [usize],
}

impl<'a, D: MeshDefinition> PackCells<'a, D> {
    pub fn new(md: &'a D, dist: &'a [usize]) -> Self {
        Self { md, dist }
    }
}

impl<D: MeshDefinition> OneToAllPack for PackCells<'_, D> {
    type Output = Vec<Vec<usize>>;

    fn payload(&self, rank: usize, _size: usize) -> Vec<Vec<usize>> {
        let dim = self.md.dimension();
        (self.dist[rank]..self.dist[rank + 1])
            .map(|i| self.md.entities(dim, 0, i))
            .collect()
    }
}

/// Root-side packing of the naive contiguous vertex-coordinate slices.
pub struct PackVertices<'a, D> {
    md: &'a D,
    dist: &'a [usize],
}

impl<'a, D: MeshDefinition> PackVertices<'a, D> {
    pub fn new(md: &'a D, dist: &'a [usize]) -> Self {
        Self { md, dist }
    }
}

impl<D: MeshDefinition> OneToAllPack for PackVertices<'_, D> {
    type Output = Vec<D::Point>;

    fn payload(&self, rank: usize, _size: usize) -> Vec<D::Point> {
        (self.dist[rank]..self.dist[rank + 1])
            .map(|i| self.md.vertex(i))
            .collect()
    }
}

/// Round 1: send partial vertex-to-cell contributions to the rank that
/// owns each vertex under the naive vertex distribution.
pub struct VertexReferencers {
    rank: usize,
    bufs: Vec<Bytes>,
}

impl VertexReferencers {
    pub fn new(
        v2c: &BTreeMap<usize, Vec<usize>>,
        vertex_dist: &[usize],
        rank: usize,
    ) -> Result<Self, ColoringError> {
        let size = vertex_dist.len() - 1;
        let mut references: Vec<BTreeMap<usize, Vec<usize>>> = vec![BTreeMap::new(); size];

        for (&v, cells) in v2c {
            let r = distribution_offset(vertex_dist, v);
            if r != rank {
                references[r]
                    .entry(v)
                    .or_default()
                    .extend(cells.iter().copied());
            }
        }

        let bufs = references
            .iter()
            .map(encode)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rank, bufs })
    }
}

impl AllToAllPack for VertexReferencers {
    type Output = BTreeMap<usize, Vec<usize>>;

    fn byte_count(&self, rank: usize) -> usize {
        if rank == self.rank {
            0
        } else {
            self.bufs[rank].len()
        }
    }

    fn payload_for(&self, rank: usize) -> Bytes {
        self.bufs[rank].clone()
    }
}

/// Round 2: ship completed vertex-to-cell lists back to every rank that
/// referenced one of our naively-owned vertices.
#[derive(Debug)]
pub struct CellConnectivity {
    rank: usize,
    bufs: Vec<Bytes>,
}

impl CellConnectivity {
    pub fn new(
        referencer_inverse: &[Vec<usize>],
        v2c: &BTreeMap<usize, Vec<usize>>,
        rank: usize,
    ) -> Result<Self, ColoringError> {
        let size = referencer_inverse.len();
        let mut connectivity: Vec<BTreeMap<usize, Vec<usize>>> = vec![BTreeMap::new(); size];

        for (r, vertices) in referencer_inverse.iter().enumerate() {
            if r != rank {
                for &v in vertices {
                    let cells = v2c
                        .get(&v)
                        .ok_or(ColoringError::MissingConnectivity(v))?;
                    connectivity[r].insert(v, cells.clone());
                }
            }
        }

        let bufs = connectivity
            .iter()
            .map(encode)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rank, bufs })
    }
}

impl AllToAllPack for CellConnectivity {
    type Output = BTreeMap<usize, Vec<usize>>;

    fn byte_count(&self, rank: usize) -> usize {
        if rank == self.rank {
            0
        } else {
            self.bufs[rank].len()
        }
    }

    fn payload_for(&self, rank: usize) -> Bytes {
        self.bufs[rank].clone()
    }
}

/// Send `(color, global id)` pairs to the process that owns each color.
pub struct DistributeCells {
    bufs: Vec<Bytes>,
}

impl DistributeCells {
    pub fn new(
        naive: &Dcrs,
        colors: usize,
        index_colors: &[usize],
        rank: usize,
    ) -> Result<Self, ColoringError> {
        let size = naive.global_colors();
        let cm = ColorMap::new(size, colors, naive.global_indices());
        let offset = naive.distribution[rank];

        let mut packs: Vec<Vec<(usize, usize)>> = vec![Vec::new(); size];
        for (i, &color) in index_colors.iter().enumerate().take(naive.entries()) {
            packs[cm.process(color)].push((color, offset + i));
        }

        let bufs = packs.iter().map(encode).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { bufs })
    }
}

impl AllToAllPack for DistributeCells {
    type Output = Vec<(usize, usize)>;

    fn byte_count(&self, rank: usize) -> usize {
        self.bufs[rank].len()
    }

    fn payload_for(&self, rank: usize) -> Bytes {
        self.bufs[rank].clone()
    }
}

/// One migrating cell: `((color, global id), ordered vertex ids)`.
pub type CellPack = Vec<((usize, usize), Vec<usize>)>;

/// Per-destination migration bundle: the cells plus the v2c and c2c
/// subsets keyed by the migrating cells' vertices and ids.
pub type MigratePack = (
    CellPack,
    BTreeMap<usize, Vec<usize>>, // vertex -> cells
    BTreeMap<usize, Vec<usize>>, // cell -> cells
);

/// Repack cell definitions and connectivity for their color-assigned
/// owners, draining the local state as the packs are built.
///
/// Once a cell has been queued here it is no longer queryable locally;
/// vertex-to-cell entries are cloned into every pack that needs them and
/// the map is drained after the destination loop, since multiple
/// destinations may share vertices.
pub struct MigrateCells {
    bufs: Vec<Bytes>,
}

impl MigrateCells {
    pub fn new(
        naive: &Dcrs,
        colors: usize,
        index_colors: &[usize],
        state: &mut MeshState,
        rank: usize,
    ) -> Result<Self, ColoringError> {
        let size = naive.global_colors();
        let cm = ColorMap::new(size, colors, naive.global_indices());
        let offset = naive.distribution[rank];

        let mut bufs = Vec::with_capacity(size);
        for r in 0..size {
            let mut cell_pack: CellPack = Vec::new();
            let mut v2c_pack = BTreeMap::new();
            let mut c2c_pack = BTreeMap::new();

            for i in 0..naive.entries() {
                if cm.process(index_colors[i]) == r {
                    let id = offset + i;
                    let definition = std::mem::take(&mut state.c2v[i]);

                    // Full connectivity travels with the cell; partial
                    // information would need another exchange anyway.
                    for &v in &definition {
                        if let Some(cells) = state.v2c.get(&v) {
                            v2c_pack.insert(v, cells.clone());
                        }
                    }
                    // Isolated cells get an explicit empty row, so every
                    // migrated cell has a c2c entry at the destination.
                    c2c_pack.insert(id, state.c2c.remove(&id).unwrap_or_default());

                    cell_pack.push(((index_colors[i], id), definition));
                }
            }

            bufs.push(encode(&(cell_pack, v2c_pack, c2c_pack))?);
        }

        // Every cell now lives in exactly one outgoing pack.
        state.c2v.clear();
        state.v2c.clear();
        state.c2c.clear();

        Ok(Self { bufs })
    }
}

impl AllToAllPack for MigrateCells {
    type Output = MigratePack;

    fn byte_count(&self, rank: usize) -> usize {
        self.bufs[rank].len()
    }

    fn payload_for(&self, rank: usize) -> Bytes {
        self.bufs[rank].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referencers_route_to_naive_owner() {
        // Vertices 0..4 split [0,2) | [2,4); rank 0 holds entries for
        // both halves but only ships the remote half.
        let mut v2c = BTreeMap::new();
        v2c.insert(0, vec![10]);
        v2c.insert(1, vec![10, 11]);
        v2c.insert(2, vec![11]);
        v2c.insert(3, vec![12]);
        let dist = [0, 2, 4];

        let pack = VertexReferencers::new(&v2c, &dist, 0).unwrap();
        assert_eq!(pack.byte_count(0), 0);
        assert!(pack.byte_count(1) > 0);

        let shipped: BTreeMap<usize, Vec<usize>> =
            bincode::deserialize(&pack.payload_for(1)).unwrap();
        assert_eq!(shipped.len(), 2);
        assert_eq!(shipped[&2], vec![11]);
        assert_eq!(shipped[&3], vec![12]);
    }

    #[test]
    fn connectivity_requires_known_vertices() {
        let v2c = BTreeMap::new();
        let inverse = vec![vec![], vec![7]];
        let err = CellConnectivity::new(&inverse, &v2c, 0).unwrap_err();
        assert!(matches!(err, ColoringError::MissingConnectivity(7)));
    }

    #[test]
    fn migrate_drains_state() {
        let naive = Dcrs {
            offsets: vec![0, 1, 2],
            indices: vec![1, 0],
            distribution: vec![0, 2],
        };
        let mut state = MeshState {
            c2v: vec![vec![0, 1], vec![1, 2]],
            v2c: [(0, vec![0]), (1, vec![0, 1]), (2, vec![1])]
                .into_iter()
                .collect(),
            c2c: [(0, vec![1]), (1, vec![0])].into_iter().collect(),
        };

        let pack = MigrateCells::new(&naive, 2, &[0, 1], &mut state, 0).unwrap();
        assert!(state.c2v.is_empty());
        assert!(state.v2c.is_empty());
        assert!(state.c2c.is_empty());

        let (cells, v2c, c2c): MigratePack = bincode::deserialize(&pack.payload_for(0)).unwrap();
        assert_eq!(cells, vec![((0, 0), vec![0, 1]), ((1, 1), vec![1, 2])]);
        assert_eq!(v2c[&1], vec![0, 1]);
        assert_eq!(c2c[&0], vec![1]);
    }

    #[test]
    fn isolated_cells_ship_empty_rows() {
        // Two cells with no shared vertices: no adjacency anywhere.
        let naive = Dcrs {
            offsets: vec![0, 0, 0],
            indices: Vec::new(),
            distribution: vec![0, 2],
        };
        let mut state = MeshState {
            c2v: vec![vec![0, 1], vec![2, 3]],
            v2c: [(0, vec![0]), (1, vec![0]), (2, vec![1]), (3, vec![1])]
                .into_iter()
                .collect(),
            c2c: BTreeMap::new(),
        };

        let pack = MigrateCells::new(&naive, 1, &[0, 0], &mut state, 0).unwrap();
        let (cells, _, c2c): MigratePack = bincode::deserialize(&pack.payload_for(0)).unwrap();
        assert_eq!(cells.len(), 2);
        // Every migrated cell carries a row, empty or not.
        assert_eq!(c2c[&0], Vec::<usize>::new());
        assert_eq!(c2c[&1], Vec::<usize>::new());
    }
}
