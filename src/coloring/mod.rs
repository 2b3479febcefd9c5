//! Distributed construction of the cell-to-cell adjacency graph and
//! migration of cells to their color-assigned owners.
//!
//! The pipeline starts from a naive contiguous slice per rank and runs
//! entirely on collective exchanges — no process ever holds the full
//! mesh:
//!
//! 1. [`make_dcrs`] — naive load, two all-to-all rounds to complete
//!    vertex-to-cell connectivity, local derivation of cell-to-cell
//!    adjacency over the *thru dimension* threshold, flattened into a
//!    [`Dcrs`] slice.
//! 2. An external k-way partitioner (see [`crate::partition`]) assigns a
//!    color to every locally-owned graph node.
//! 3. [`distribute`] / [`migrate`] — ship cells (with their definitions
//!    and connectivity) to the processes owning their colors.
//!
//! Re-coloring is a fresh invocation with a fresh [`MeshState`], never an
//! incremental update.

pub mod functors;

use std::collections::BTreeMap;

use itertools::Itertools;

use crate::color_map::{distribution_offset, ColorMap};
use crate::comm::collective::{all_to_allv, one_to_allv};
use crate::comm::communicator::{CommTag, Communicator};
use crate::dcrs::Dcrs;
use crate::definition::MeshDefinition;
use crate::error::ColoringError;
use functors::{
    CellConnectivity, DistributeCells, MigrateCells, PackCells, PackVertices, VertexReferencers,
};

// One base tag per pipeline round; each collective claims two tags.
const CELLS_TAG: CommTag = CommTag(0x0100);
const VERTICES_TAG: CommTag = CommTag(0x0110);
const REFERENCERS_TAG: CommTag = CommTag(0x0120);
const CONNECTIVITY_TAG: CommTag = CommTag(0x0130);
const DISTRIBUTE_TAG: CommTag = CommTag(0x0140);
const MIGRATE_TAG: CommTag = CommTag(0x0150);

/// Locally-owned slice of the mesh connectivity, mutated in place by the
/// pipeline stages and drained/refilled by [`migrate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeshState {
    /// Local cell -> ordered global vertex ids (order is meaningful).
    pub c2v: Vec<Vec<usize>>,
    /// Global vertex id -> global cell ids referencing it.
    pub v2c: BTreeMap<usize, Vec<usize>>,
    /// Global cell id -> adjacent global cell ids (symmetric).
    pub c2c: BTreeMap<usize, Vec<usize>>,
}

/// Sort and deduplicate a list in place. Idempotent.
pub fn force_unique<T: Ord>(v: &mut Vec<T>) {
    v.sort_unstable();
    v.dedup();
}

/// Sort and deduplicate every value list of a map in place.
pub fn force_unique_map<K, T: Ord>(m: &mut BTreeMap<K, Vec<T>>) {
    for v in m.values_mut() {
        force_unique(v);
    }
}

/// Naive contiguous cell load: rank 0 reads every rank's slice from the
/// definition and ships it. Intentionally unscalable at the root; runs
/// once per coloring pass.
pub fn naive_cells<D, C>(md: &D, comm: &C) -> Result<Vec<Vec<usize>>, ColoringError>
where
    D: MeshDefinition,
    C: Communicator,
{
    let size = comm.size();
    let cm = ColorMap::new(size, size, md.num_entities(md.dimension()));
    one_to_allv(&PackCells::new(md, cm.distribution()), comm, CELLS_TAG)
}

/// Naive contiguous vertex-coordinate load, mirroring [`naive_cells`].
pub fn naive_vertices<D, C>(md: &D, comm: &C) -> Result<Vec<D::Point>, ColoringError>
where
    D: MeshDefinition,
    C: Communicator,
{
    let size = comm.size();
    let cm = ColorMap::new(size, size, md.num_entities(0));
    one_to_allv(&PackVertices::new(md, cm.distribution()), comm, VERTICES_TAG)
}

/// Build the distributed cell-to-cell adjacency graph.
///
/// Two cells are adjacent when they share more than `thru_dimension`
/// vertices (0 = any shared vertex, 1 = a shared edge, ...). Returns the
/// local [`Dcrs`] slice and the [`MeshState`] holding the complete
/// vertex-to-cell closure for every vertex this rank has seen.
pub fn make_dcrs<D, C>(
    md: &D,
    thru_dimension: usize,
    comm: &C,
) -> Result<(Dcrs, MeshState), ColoringError>
where
    D: MeshDefinition,
    C: Communicator,
{
    assert!(
        thru_dimension < md.dimension(),
        "thru_dimension({thru_dimension}) must be less than the entity dimension({})",
        md.dimension()
    );

    let rank = comm.rank();
    let size = comm.size();

    // Naive distribution of cells, one color per process.
    let cm = ColorMap::new(size, size, md.num_entities(md.dimension()));
    let c2v = one_to_allv(&PackCells::new(md, cm.distribution()), comm, CELLS_TAG)?;

    let offset = cm.distribution()[rank];
    let entries = cm.indices_for(rank, 0);
    debug_assert_eq!(c2v.len(), entries);
    log::debug!("make_dcrs: rank {rank} loaded {entries} cells at offset {offset}");

    // Seed vertex-to-cell connectivity from the loaded slice.
    let mut v2c: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, cell) in c2v.iter().enumerate() {
        for &v in cell {
            v2c.entry(v).or_default().push(offset + i);
        }
    }

    // Round 1: route partial v2c entries to the naive vertex owners.
    // Vertex ownership here is a routing key only — a stable merge
    // point every rank computes identically.
    let vm = ColorMap::new(size, size, md.num_entities(0));
    let referencers = all_to_allv(
        &VertexReferencers::new(&v2c, vm.distribution(), rank)?,
        comm,
        REFERENCERS_TAG,
    )?;
    for contribution in referencers {
        for (v, cells) in contribution {
            v2c.entry(v).or_default().extend(cells);
        }
    }
    force_unique_map(&mut v2c);

    // Inverse of the routing relation: every remote rank that referenced
    // one of the vertices merged here still needs the completed list.
    let mut referencer_inverse: Vec<Vec<usize>> = vec![Vec::new(); size];
    for (&v, cells) in &v2c {
        for &c in cells {
            let r = distribution_offset(cm.distribution(), c);
            if r != rank {
                referencer_inverse[r].push(v);
            }
        }
    }
    let referencer_inverse: Vec<Vec<usize>> = referencer_inverse
        .into_iter()
        .map(|v| v.into_iter().sorted_unstable().dedup().collect())
        .collect();

    // Round 2: ship completed lists back out. After the merge every rank
    // holds full v2c for every vertex it has seen; the naive owner
    // aggregated all referencers in round 1, so no third round exists.
    let connectivity = all_to_allv(
        &CellConnectivity::new(&referencer_inverse, &v2c, rank)?,
        comm,
        CONNECTIVITY_TAG,
    )?;
    for contribution in connectivity {
        for (v, cells) in contribution {
            v2c.entry(v).or_default().extend(cells);
        }
    }
    force_unique_map(&mut v2c);
    log::debug!("make_dcrs: rank {rank} closure complete, {} vertices", v2c.len());

    // Cell-to-cell adjacency is derived locally, with no further
    // communication: tally co-occurring cells through shared vertices.
    let mut c2c: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, cell) in c2v.iter().enumerate() {
        let c = offset + i;
        let mut thru_counts: BTreeMap<usize, usize> = BTreeMap::new();

        for v in cell {
            if let Some(cells) = v2c.get(v) {
                for &rc in cells {
                    if rc != c {
                        *thru_counts.entry(rc).or_default() += 1;
                    }
                }
            }
        }

        for (rc, shared) in thru_counts {
            if shared > thru_dimension {
                c2c.entry(c).or_default().push(rc);
                c2c.entry(rc).or_default().push(c);
            }
        }
    }
    force_unique_map(&mut c2c);

    // Flatten the owned slice into CSR form.
    let mut dcrs = Dcrs {
        offsets: Vec::with_capacity(entries + 1),
        indices: Vec::new(),
        distribution: cm.distribution().to_vec(),
    };
    dcrs.offsets.push(0);
    for c in 0..entries {
        if let Some(row) = c2c.get(&(offset + c)) {
            dcrs.indices.extend_from_slice(row);
        }
        dcrs.offsets.push(dcrs.indices.len());
    }
    debug_assert!(dcrs.validate());

    Ok((dcrs, MeshState { c2v, v2c, c2c }))
}

/// Resolve which global ids belong to each color owned by this process.
///
/// Returns one id list per locally-owned color, indexed by
/// process-local color (global color minus `color_offset`).
pub fn distribute<C>(
    naive: &Dcrs,
    colors: usize,
    index_colors: &[usize],
    comm: &C,
) -> Result<Vec<Vec<usize>>, ColoringError>
where
    C: Communicator,
{
    let rank = comm.rank();
    let size = comm.size();
    assert_eq!(
        naive.global_colors(),
        size,
        "naive distribution regions must match the group size"
    );

    let color_primaries = all_to_allv(
        &DistributeCells::new(naive, colors, index_colors, rank)?,
        comm,
        DISTRIBUTE_TAG,
    )?;

    let cm = ColorMap::new(size, colors, naive.global_indices());
    let offset = cm.color_offset(rank);
    let mut primaries = vec![Vec::new(); cm.colors_for(rank)];

    for pack in color_primaries {
        for (color, id) in pack {
            primaries[color - offset].push(id);
        }
    }

    Ok(primaries)
}

/// Migrate cells (definitions plus connectivity) to the processes that
/// own their assigned colors.
///
/// The outgoing packs drain `state` as they are built; the receive loop
/// refills it with everything this process now owns, including its own
/// retained pack. Returns `(primaries, l2m)`: the global ids per color
/// and the local-to-global id map for the post-migration storage order.
pub fn migrate<C>(
    naive: &Dcrs,
    colors: usize,
    index_colors: &[usize],
    state: &mut MeshState,
    comm: &C,
) -> Result<(BTreeMap<usize, Vec<usize>>, Vec<usize>), ColoringError>
where
    C: Communicator,
{
    let rank = comm.rank();
    assert_eq!(
        naive.global_colors(),
        comm.size(),
        "naive distribution regions must match the group size"
    );

    let migrated = all_to_allv(
        &MigrateCells::new(naive, colors, index_colors, state, rank)?,
        comm,
        MIGRATE_TAG,
    )?;

    let mut primaries: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    let mut l2m = Vec::new();

    for (cell_pack, v2c_pack, c2c_pack) in migrated {
        for ((color, id), definition) in cell_pack {
            state.c2v.push(definition);
            l2m.push(id);
            primaries.entry(color).or_default().push(id);
        }
        for (v, cells) in v2c_pack {
            state.v2c.entry(v).or_insert(cells);
        }
        for (c, row) in c2c_pack {
            state.c2c.entry(c).or_insert(row);
        }
    }

    log::debug!(
        "migrate: rank {rank} now owns {} cells across {} colors",
        l2m.len(),
        primaries.len()
    );

    Ok((primaries, l2m))
}
