//! One-to-all and all-to-all variable-length collectives.
//!
//! Every round of the coloring pipeline is expressed as a *pack*: a value
//! type that already holds (or can compute) the payload for each
//! destination rank. The collectives serialize with bincode, exchange a
//! fixed-size [`WireCount`] header first, and block until every posted
//! request has completed. All handles are drained before an error is
//! returned so no rank leaves a partner hanging.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::comm::communicator::{CommTag, Communicator, Wait, WaitRecv};
use crate::comm::wire::WireCount;
use crate::error::ColoringError;

/// Packing contract for [`one_to_allv`]: rank 0 computes the payload for
/// every rank; the other ranks only need the output type.
pub trait OneToAllPack {
    type Output: Serialize + DeserializeOwned;

    /// Payload destined for `rank` in a group of `size`. Called on the
    /// root only.
    fn payload(&self, rank: usize, size: usize) -> Self::Output;
}

/// Packing contract for [`all_to_allv`].
///
/// Implementations must precompute all per-destination payloads at
/// construction: `byte_count` and `payload_for` are pure reads and may
/// be called more than once for the same rank.
pub trait AllToAllPack {
    type Output: DeserializeOwned;

    /// Serialized size of the payload for `rank`; zero means nothing is
    /// sent to (and nothing is returned from) that slot.
    fn byte_count(&self, rank: usize) -> usize;

    /// Precomputed serialized payload for `rank`.
    fn payload_for(&self, rank: usize) -> Bytes;
}

/// Serialize a pack payload once, for storage inside a pack constructor.
pub fn encode<T: Serialize>(value: &T) -> Result<Bytes, ColoringError> {
    Ok(Bytes::from(bincode::serialize(value)?))
}

/// Rank 0 computes and ships `pack.payload(r, size)` to every rank `r`;
/// every other rank receives exactly one length-prefixed message. The
/// root's own payload is returned directly.
pub fn one_to_allv<P, C>(pack: &P, comm: &C, tag: CommTag) -> Result<P::Output, ColoringError>
where
    P: OneToAllPack,
    C: Communicator,
{
    let size = comm.size();

    if comm.rank() == 0 {
        let mut pending = Vec::with_capacity(2 * size.saturating_sub(1));
        for r in 1..size {
            let body = encode(&pack.payload(r, size))?;
            let header = Bytes::copy_from_slice(WireCount::new(body.len()).as_bytes());
            pending.push((r, comm.isend(r, tag.size_tag(), header)));
            pending.push((r, comm.isend(r, tag.data_tag(), body)));
        }

        let mut maybe_err = None;
        for (r, h) in pending {
            if let Err(e) = h.wait() {
                maybe_err.get_or_insert_with(|| {
                    log::error!("one_to_allv: send to rank {r} failed");
                    e
                });
            }
        }
        if let Some(err) = maybe_err {
            return Err(err);
        }

        Ok(pack.payload(0, size))
    } else {
        let raw = comm.irecv(0, tag.size_tag(), WireCount::SIZE).wait()?;
        let bytes = WireCount::decode(&raw)
            .ok_or_else(|| ColoringError::comm(0, "malformed size header"))?
            .get();

        let raw = comm.irecv(0, tag.data_tag(), bytes).wait()?;
        Ok(bincode::deserialize(&raw)?)
    }
}

/// Exchange per-rank byte counts in one fixed-size round, then the
/// variable-size payloads sized by the received counts.
///
/// Returns the decoded payload of every source whose byte count was
/// non-zero, in ascending source-rank order. The caller's own non-empty
/// payload is delivered locally, so a rank's retained contribution
/// participates in the result exactly as a remote one would.
pub fn all_to_allv<P, C>(pack: &P, comm: &C, tag: CommTag) -> Result<Vec<P::Output>, ColoringError>
where
    P: AllToAllPack,
    C: Communicator,
{
    let size = comm.size();
    let rank = comm.rank();
    let peers = || (0..size).filter(|&r| r != rank);

    // Stage 1: post all count receives, then all count sends.
    let recv_size: Vec<_> = peers()
        .map(|r| (r, comm.irecv(r, tag.size_tag(), WireCount::SIZE)))
        .collect();

    let mut pending_sends = Vec::with_capacity(size.saturating_sub(1));
    for r in peers() {
        let count = WireCount::new(pack.byte_count(r));
        let buf = Bytes::copy_from_slice(count.as_bytes());
        pending_sends.push((r, comm.isend(r, tag.size_tag(), buf)));
    }

    // Collect counts without early return; every handle gets drained.
    let mut bytes_in = vec![0usize; size];
    let mut maybe_err = None;
    for (r, h) in recv_size {
        match h.wait() {
            Ok(raw) => match WireCount::decode(&raw) {
                Some(count) => bytes_in[r] = count.get(),
                None if maybe_err.is_none() => {
                    maybe_err = Some(ColoringError::comm(
                        r,
                        format!(
                            "expected {} bytes for size header, got {}",
                            WireCount::SIZE,
                            raw.len()
                        ),
                    ));
                }
                None => {}
            },
            Err(e) => {
                maybe_err.get_or_insert(e);
            }
        }
    }
    for (_, h) in pending_sends {
        let _ = h.wait();
    }
    if let Some(err) = maybe_err {
        return Err(err);
    }

    // Stage 2: payloads, sized by the counts received above.
    let recv_data: Vec<_> = peers()
        .filter(|&r| bytes_in[r] > 0)
        .map(|r| (r, comm.irecv(r, tag.data_tag(), bytes_in[r])))
        .collect();

    let mut pending_sends = Vec::new();
    for r in peers().filter(|&r| pack.byte_count(r) > 0) {
        pending_sends.push((r, comm.isend(r, tag.data_tag(), pack.payload_for(r))));
    }

    let mut raw: Vec<(usize, Vec<u8>)> = Vec::with_capacity(recv_data.len() + 1);
    let mut maybe_err = None;
    for (r, h) in recv_data {
        match h.wait() {
            Ok(data) if data.len() == bytes_in[r] => raw.push((r, data)),
            Ok(data) => {
                maybe_err.get_or_insert_with(|| {
                    ColoringError::comm(
                        r,
                        format!("expected {} payload bytes, got {}", bytes_in[r], data.len()),
                    )
                });
            }
            Err(e) => {
                maybe_err.get_or_insert(e);
            }
        }
    }
    for (_, h) in pending_sends {
        let _ = h.wait();
    }
    if let Some(err) = maybe_err {
        return Err(err);
    }

    // Local delivery of this rank's own contribution.
    if pack.byte_count(rank) > 0 {
        raw.push((rank, pack.payload_for(rank).to_vec()));
    }
    raw.sort_by_key(|&(r, _)| r);

    log::trace!(
        "all_to_allv: rank {rank} received {} non-empty payloads",
        raw.len()
    );

    raw.into_iter()
        .map(|(_, data)| Ok(bincode::deserialize(&data)?))
        .collect()
}
