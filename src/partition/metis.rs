//! METIS-backed k-way partitioner.
//!
//! The linked METIS library is serial, so the distributed call contract
//! is realized by gathering the CSR slices onto rank 0 (the `vtxdist`
//! offsets make reassembly trivial), partitioning there, and scattering
//! each rank its slice of the color array. The initial partition guess
//! is not consumable by serial METIS; k-way starts from its own seed.

use bytes::Bytes;

use crate::comm::collective::{all_to_allv, encode, one_to_allv, AllToAllPack, OneToAllPack};
use crate::comm::communicator::{CommTag, Communicator};
use crate::error::ColoringError;
use crate::partition::{Idx, KWayArgs, KWayPartitioner};

const GATHER_TAG: CommTag = CommTag(0x0200);
const SCATTER_TAG: CommTag = CommTag(0x0210);

/// One rank's contribution to the gathered graph.
type GraphSlice = (usize, Vec<Idx>, Vec<Idx>, Option<Vec<Idx>>);

/// Ships this rank's CSR slice to rank 0.
struct GatherGraph {
    buf: Bytes,
}

impl GatherGraph {
    fn new(rank: usize, args: &KWayArgs) -> Result<Self, ColoringError> {
        let slice: GraphSlice = (
            rank,
            args.xadj.clone(),
            args.adjncy.clone(),
            args.vwgt.clone(),
        );
        Ok(Self { buf: encode(&slice)? })
    }
}

impl AllToAllPack for GatherGraph {
    type Output = GraphSlice;

    fn byte_count(&self, rank: usize) -> usize {
        if rank == 0 {
            self.buf.len()
        } else {
            0
        }
    }

    fn payload_for(&self, _rank: usize) -> Bytes {
        self.buf.clone()
    }
}

/// Root-side scatter of the computed color array.
struct ScatterPart {
    vtxdist: Vec<Idx>,
    edgecut: Idx,
    part: Vec<Idx>,
}

impl OneToAllPack for ScatterPart {
    type Output = (Idx, Vec<Idx>);

    fn payload(&self, rank: usize, _size: usize) -> (Idx, Vec<Idx>) {
        let lo = self.vtxdist[rank] as usize;
        let hi = self.vtxdist[rank + 1] as usize;
        (self.edgecut, self.part[lo..hi].to_vec())
    }
}

/// Serial-METIS realization of the k-way seam.
#[derive(Debug, Clone, Default)]
pub struct MetisKWay;

impl KWayPartitioner for MetisKWay {
    fn part_kway<C: Communicator>(
        &self,
        args: &mut KWayArgs,
        comm: &C,
    ) -> Result<Idx, ColoringError> {
        let rank = comm.rank();
        let size = comm.size();

        let slices = all_to_allv(&GatherGraph::new(rank, args)?, comm, GATHER_TAG)?;

        let scatter = if rank == 0 {
            let n = args.vtxdist[size] as usize;
            let mut gxadj: Vec<metis::Idx> = vec![0];
            let mut gadjncy: Vec<metis::Idx> = Vec::new();
            let mut gvwgt: Vec<metis::Idx> = Vec::new();
            let mut weighted = false;

            let mut sorted = slices;
            sorted.sort_by_key(|&(r, ..)| r);
            for (r, xadj, adjncy, vwgt) in sorted {
                let expected = (args.vtxdist[r + 1] - args.vtxdist[r]) as usize;
                if xadj.len() != expected + 1 {
                    return Err(ColoringError::comm(
                        r,
                        format!("graph slice has {} rows, expected {expected}", xadj.len() - 1),
                    ));
                }
                let base = *gxadj.last().unwrap();
                gxadj.extend(xadj[1..].iter().map(|&o| base + o as metis::Idx));
                gadjncy.extend(adjncy.iter().map(|&a| a as metis::Idx));
                match vwgt {
                    Some(w) => {
                        weighted = true;
                        gvwgt.extend(w.iter().map(|&x| x as metis::Idx));
                    }
                    None => gvwgt.extend(std::iter::repeat(1).take(expected)),
                }
            }

            let mut part = vec![0 as metis::Idx; n];
            let mut ubvec: Vec<metis::Real> =
                args.ubvec.iter().map(|&u| u as metis::Real).collect();

            let mut graph = metis::Graph::new(
                args.ncon as metis::Idx,
                args.nparts as metis::Idx,
                &mut gxadj,
                &mut gadjncy,
            )
            .map_err(|e| {
                log::error!("METIS rejected the gathered graph: {e}");
                ColoringError::PartitionerFailure { status: -1 }
            })?;
            if weighted {
                graph = graph.set_vwgt(&mut gvwgt);
            }
            graph = graph.set_ubvec(&mut ubvec);

            let edgecut = graph.part_kway(&mut part).map_err(|e| {
                log::error!("METIS k-way partitioning failed: {e}");
                ColoringError::PartitionerFailure { status: -2 }
            })?;

            ScatterPart {
                vtxdist: args.vtxdist.clone(),
                edgecut: edgecut as Idx,
                part: part.into_iter().map(|p| p as Idx).collect(),
            }
        } else {
            // Only the root's payloads are ever packed.
            ScatterPart {
                vtxdist: args.vtxdist.clone(),
                edgecut: 0,
                part: Vec::new(),
            }
        };

        let (edgecut, part) = one_to_allv(&scatter, comm, SCATTER_TAG)?;
        debug_assert_eq!(part.len(), args.part.len());
        args.part = part;
        Ok(edgecut)
    }
}
