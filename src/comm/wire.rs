//! Fixed, little-endian wire records for the collective count stage.

use bytemuck::{Pod, Zeroable};

/// Byte count carried in the fixed-size stage of a collective exchange.
/// Little-endian on the wire.
#[repr(transparent)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireCount {
    n_le: u64,
}

impl WireCount {
    pub const SIZE: usize = 8;

    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u64).to_le(),
        }
    }

    pub fn get(&self) -> usize {
        u64::from_le(self.n_le) as usize
    }

    /// Decode from a received byte buffer; `None` on length mismatch.
    /// Reads unaligned: receive buffers carry no alignment guarantee.
    pub fn decode(raw: &[u8]) -> Option<Self> {
        bytemuck::try_pod_read_unaligned::<WireCount>(raw).ok()
    }

    /// Wire representation.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

const _: () = {
    assert!(std::mem::size_of::<WireCount>() == WireCount::SIZE);
    assert!(std::mem::align_of::<WireCount>() == 8);
};
