//! Adapter from a [`Dcrs`] slice to an external k-way graph partitioner.
//!
//! The adapter assembles the classic distributed call contract
//! (`vtxdist`/`xadj`/`adjncy` plus weights and an initial partition) and
//! hands it to a [`KWayPartitioner`] implementation exactly once. Any
//! non-success status is fatal — a partial partition is unsafe to use.

#[cfg(feature = "metis-support")]
pub mod metis;

use crate::color_map::ColorMap;
use crate::comm::communicator::Communicator;
use crate::dcrs::Dcrs;
use crate::error::ColoringError;

/// Index type of the external partitioner interface.
pub type Idx = i32;

/// Assembled arguments for one k-way partitioning call.
#[derive(Debug, Clone)]
pub struct KWayArgs {
    /// Global node distribution across ranks (`size + 1` offsets).
    pub vtxdist: Vec<Idx>,
    /// Local CSR offsets.
    pub xadj: Vec<Idx>,
    /// Local adjacency, global ids.
    pub adjncy: Vec<Idx>,
    /// Optional per-node weights (uniform if `None`).
    pub vwgt: Option<Vec<Idx>>,
    /// Optional per-edge weights (uniform if `None`).
    pub adjwgt: Option<Vec<Idx>>,
    /// Number of balancing constraints.
    pub ncon: Idx,
    /// Requested color count.
    pub nparts: Idx,
    /// Target partition weights, `ncon * nparts` entries.
    pub tpwgts: Vec<f32>,
    /// Imbalance tolerance per constraint.
    pub ubvec: Vec<f32>,
    /// Initial partition guess, one entry per local node. Meaningful
    /// only in decoupled mode.
    pub part: Vec<Idx>,
    /// True when colors == processes and the partitioner may use its own
    /// coupled heuristic instead of the initial guess.
    pub coupled: bool,
}

/// Black-box k-way partitioner seam.
pub trait KWayPartitioner {
    /// Partition once; fills `args.part` with one color per local node
    /// and returns the edge cut. Non-success must surface as
    /// [`ColoringError::PartitionerFailure`].
    fn part_kway<C: Communicator>(&self, args: &mut KWayArgs, comm: &C)
        -> Result<Idx, ColoringError>;
}

/// Assign a color to every locally-owned graph node.
///
/// `naive` must have been built against the same process group:
/// its distribution needs exactly one region per rank.
pub fn color<C, P>(
    naive: &Dcrs,
    colors: usize,
    weights: Option<&[usize]>,
    partitioner: &P,
    comm: &C,
) -> Result<Vec<usize>, ColoringError>
where
    C: Communicator,
    P: KWayPartitioner,
{
    let rank = comm.rank();
    let size = comm.size();
    assert_eq!(
        naive.global_colors(),
        size,
        "invalid naive coloring: distribution regions({}) must equal group size({size})",
        naive.global_colors()
    );

    let ncon: Idx = 1;
    let nparts = colors as Idx;
    let mut args = KWayArgs {
        vtxdist: naive.distribution_as::<Idx>(),
        xadj: naive.offsets_as::<Idx>(),
        adjncy: naive.indices_as::<Idx>(),
        vwgt: weights.map(|w| {
            w.iter()
                .map(|&x| Idx::try_from(x).expect("weight exceeds partitioner index range"))
                .collect()
        }),
        adjwgt: None,
        ncon,
        nparts,
        tpwgts: vec![1.0 / colors as f32; ncon as usize * colors],
        ubvec: vec![1.05; ncon as usize],
        part: vec![0; naive.entries()],
        coupled: colors == size,
    };

    if !args.coupled {
        // Decoupled mode: seed the partitioner with the block coloring.
        let cm = ColorMap::new(size, colors, naive.global_indices());
        for (i, p) in args.part.iter_mut().enumerate() {
            *p = cm.index_color(naive.distribution[rank] + i) as Idx;
        }
    }

    let edgecut = partitioner.part_kway(&mut args, comm)?;
    log::debug!(
        "color: rank {rank} partitioned {} nodes into {colors} colors, edgecut {edgecut}",
        naive.entries()
    );

    Ok(args.part.into_iter().map(|p| p as usize).collect())
}

/// Deterministic contiguous-block partitioner.
///
/// Finalizes the `index_color` block assignment instead of calling an
/// external library; the fallback when METIS is not linked and the
/// reference partitioner in tests.
#[derive(Debug, Clone, Default)]
pub struct BlockKWay;

impl KWayPartitioner for BlockKWay {
    fn part_kway<C: Communicator>(
        &self,
        args: &mut KWayArgs,
        comm: &C,
    ) -> Result<Idx, ColoringError> {
        let rank = comm.rank();
        let size = args.vtxdist.len() - 1;
        let indices = args.vtxdist[size] as usize;
        let cm = ColorMap::new(size, args.nparts as usize, indices);

        let offset = args.vtxdist[rank] as usize;
        for (i, p) in args.part.iter_mut().enumerate() {
            *p = cm.index_color(offset + i) as Idx;
        }

        // Local count of cut edges under the block assignment.
        let mut edgecut = 0;
        for i in 0..args.xadj.len() - 1 {
            let own = cm.index_color(offset + i);
            for e in args.xadj[i] as usize..args.xadj[i + 1] as usize {
                if cm.index_color(args.adjncy[e] as usize) != own {
                    edgecut += 1;
                }
            }
        }

        Ok(edgecut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::communicator::NoComm;

    fn chain_graph() -> Dcrs {
        let mut g = Dcrs {
            offsets: vec![0],
            indices: Vec::new(),
            distribution: vec![0, 8],
        };
        for c in 0..8usize {
            if c > 0 {
                g.indices.push(c - 1);
            }
            if c < 7 {
                g.indices.push(c + 1);
            }
            g.offsets.push(g.indices.len());
        }
        g
    }

    #[test]
    fn block_partition_splits_contiguously() {
        let naive = chain_graph();
        let part = color(&naive, 2, None, &BlockKWay, &NoComm).unwrap();
        assert_eq!(part, vec![0, 0, 0, 0, 1, 1, 1, 1]);
    }

    #[test]
    fn decoupled_mode_seeds_initial_guess() {
        let naive = chain_graph();
        // colors != size, so the guess is the block coloring.
        let part = color(&naive, 4, None, &BlockKWay, &NoComm).unwrap();
        assert_eq!(part, vec![0, 0, 1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn weights_are_forwarded() {
        struct Probe;
        impl KWayPartitioner for Probe {
            fn part_kway<C: Communicator>(
                &self,
                args: &mut KWayArgs,
                _comm: &C,
            ) -> Result<Idx, ColoringError> {
                assert_eq!(args.vwgt.as_deref(), Some(&[1, 2, 3, 4, 5, 6, 7, 8][..]));
                assert_eq!(args.tpwgts.len(), 2);
                Ok(0)
            }
        }
        let naive = chain_graph();
        let weights: Vec<usize> = (1..=8).collect();
        color(&naive, 2, Some(&weights), &Probe, &NoComm).unwrap();
    }

    #[test]
    fn partitioner_failure_is_fatal() {
        struct Failing;
        impl KWayPartitioner for Failing {
            fn part_kway<C: Communicator>(
                &self,
                _args: &mut KWayArgs,
                _comm: &C,
            ) -> Result<Idx, ColoringError> {
                Err(ColoringError::PartitionerFailure { status: -4 })
            }
        }
        let err = color(&chain_graph(), 2, None, &Failing, &NoComm).unwrap_err();
        assert!(matches!(
            err,
            ColoringError::PartitionerFailure { status: -4 }
        ));
    }
}
