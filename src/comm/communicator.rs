//! Thin façade over in-process or MPI message passing.
//!
//! Messages are owned byte buffers; every handle is waitable and the
//! collectives in [`crate::comm::collective`] wait on all of them before
//! returning. The trait is minimal by design: `rank`, `size`, and paired
//! non-blocking send/receive are the only operations the pipeline needs,
//! so it runs unmodified under any subgroup.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use bytes::Bytes;
use dashmap::DashMap;

use crate::error::ColoringError;

/// Typed communication tag. Each pipeline round owns a base tag; the
/// collectives derive the fixed-size and payload stage tags from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommTag(pub u16);

impl CommTag {
    pub fn base(self) -> u16 {
        self.0
    }

    /// Tag of the fixed-size count stage.
    pub fn size_tag(self) -> u16 {
        self.0
    }

    /// Tag of the variable-size payload stage.
    pub fn data_tag(self) -> u16 {
        self.0 + 1
    }
}

/// Non-blocking communication interface.
pub trait Communicator: Send + Sync {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: WaitRecv;

    /// This process's rank within the group.
    fn rank(&self) -> usize;
    /// Size of the group.
    fn size(&self) -> usize;

    /// Post a non-blocking send of `buf` to `peer`.
    fn isend(&self, peer: usize, tag: u16, buf: Bytes) -> Self::SendHandle;
    /// Post a non-blocking receive of exactly `len` bytes from `peer`.
    fn irecv(&self, peer: usize, tag: u16, len: usize) -> Self::RecvHandle;
}

/// A send handle that can be waited on.
pub trait Wait {
    fn wait(self) -> Result<(), ColoringError>;
}

/// A receive handle that yields the received bytes.
pub trait WaitRecv {
    fn wait(self) -> Result<Vec<u8>, ColoringError>;
}

impl Wait for () {
    fn wait(self) -> Result<(), ColoringError> {
        Ok(())
    }
}

/// No-op comm for pure serial (size-1) runs and unit tests. The
/// collectives never address a peer at size 1, so both primitives are
/// unreachable in correct use.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

/// Receive handle of [`NoComm`]; always an error if waited on.
pub struct NoRecv {
    peer: usize,
}

impl WaitRecv for NoRecv {
    fn wait(self) -> Result<Vec<u8>, ColoringError> {
        Err(ColoringError::comm(
            self.peer,
            "NoComm has no peers to receive from",
        ))
    }
}

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = NoRecv;

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn isend(&self, _peer: usize, _tag: u16, _buf: Bytes) -> Self::SendHandle {}

    fn irecv(&self, peer: usize, _tag: u16, _len: usize) -> Self::RecvHandle {
        NoRecv { peer }
    }
}

// --- LocalComm: multiple "ranks" inside one process ---

type Key = (usize, usize, u16); // (src, dst, tag)
type Mailbox = DashMap<Key, VecDeque<Bytes>>;

/// In-process communicator for driving the pipeline from threads.
///
/// A group shares one FIFO mailbox; messages between a `(src, dst, tag)`
/// pair are delivered in send order. Each test thread owns one handle.
#[derive(Clone, Debug)]
pub struct LocalComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
}

impl LocalComm {
    /// Create a connected group of `size` communicators, one per rank.
    pub fn group(size: usize) -> Vec<LocalComm> {
        assert!(size > 0, "group size must be non-zero");
        let mailbox = Arc::new(Mailbox::new());
        (0..size)
            .map(|rank| LocalComm {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
            })
            .collect()
    }
}

/// Receive handle of [`LocalComm`]; joins the polling thread on wait.
pub struct LocalRecvHandle {
    peer: usize,
    buf: Arc<Mutex<Option<Vec<u8>>>>,
    handle: Option<JoinHandle<()>>,
}

impl WaitRecv for LocalRecvHandle {
    fn wait(mut self) -> Result<Vec<u8>, ColoringError> {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                return Err(ColoringError::comm(self.peer, "receive thread panicked"));
            }
        }
        let mut guard = self
            .buf
            .lock()
            .map_err(|_| ColoringError::comm(self.peer, "receive buffer poisoned"))?;
        guard
            .take()
            .ok_or_else(|| ColoringError::comm(self.peer, "no message delivered"))
    }
}

impl Communicator for LocalComm {
    type SendHandle = ();
    type RecvHandle = LocalRecvHandle;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: Bytes) -> Self::SendHandle {
        let key = (self.rank, peer, tag);
        self.mailbox.entry(key).or_default().push_back(buf);
    }

    fn irecv(&self, peer: usize, tag: u16, len: usize) -> Self::RecvHandle {
        let key = (peer, self.rank, tag);
        let mailbox = Arc::clone(&self.mailbox);
        let buf = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&buf);
        let handle = std::thread::spawn(move || loop {
            let msg = mailbox.get_mut(&key).and_then(|mut q| q.pop_front());
            if let Some(bytes) = msg {
                let n = len.min(bytes.len());
                *slot.lock().unwrap() = Some(bytes[..n].to_vec());
                break;
            }
            std::thread::yield_now();
        });
        LocalRecvHandle {
            peer,
            buf,
            handle: Some(handle),
        }
    }
}

// --- MPI backend (feature = "mpi-support") ---

#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::point_to_point::Status;
    use mpi::request::{Request, StaticScope};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    /// MPI-backed communicator. The caller owns the `Universe`; any
    /// communicator (including subgroups) works, only `rank`/`size` and
    /// point-to-point operations are used.
    pub struct MpiComm {
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        pub fn new(world: SimpleCommunicator) -> Self {
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Self { world, rank, size }
        }
    }

    pub struct MpiSendHandle {
        peer: usize,
        req: Request<'static, [u8], StaticScope>,
        // Keeps the send buffer alive until the request completes.
        _buf: Bytes,
    }

    impl Wait for MpiSendHandle {
        fn wait(self) -> Result<(), ColoringError> {
            let _: Status = self.req.wait();
            let _ = self.peer;
            Ok(())
        }
    }

    pub struct MpiRecvHandle {
        peer: usize,
        req: Request<'static, [u8], StaticScope>,
        buf: *mut [u8],
    }

    // The raw buffer pointer is only touched after the request completes.
    unsafe impl Send for MpiRecvHandle {}

    impl WaitRecv for MpiRecvHandle {
        fn wait(self) -> Result<Vec<u8>, ColoringError> {
            let _: Status = self.req.wait();
            let _ = self.peer;
            let buf = unsafe { Box::from_raw(self.buf) };
            Ok(buf.into_vec())
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiSendHandle;
        type RecvHandle = MpiRecvHandle;

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn isend(&self, peer: usize, tag: u16, buf: Bytes) -> MpiSendHandle {
            // Safety: `_buf` in the handle keeps the allocation alive
            // until `wait` completes the request.
            let slice: &'static [u8] = unsafe { std::mem::transmute::<&[u8], _>(&buf[..]) };
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, slice, tag as i32);
            MpiSendHandle {
                peer,
                req,
                _buf: buf,
            }
        }

        fn irecv(&self, peer: usize, tag: u16, len: usize) -> MpiRecvHandle {
            let buf: *mut [u8] = Box::into_raw(vec![0u8; len].into_boxed_slice());
            // Safety: the boxed slice is reclaimed in `wait`, strictly
            // after the request completes.
            let slice: &'static mut [u8] = unsafe { &mut *buf };
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_receive_into_with_tag(StaticScope, slice, tag as i32);
            MpiRecvHandle { peer, req, buf }
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_round_trip() {
        let tag = CommTag(0x1000);
        let group = LocalComm::group(2);

        let msg = Bytes::from_static(b"hello");
        group[0].isend(1, tag.base(), msg.clone());

        let h = group[1].irecv(0, tag.base(), msg.len());
        assert_eq!(h.wait().unwrap(), msg.to_vec());
    }

    #[test]
    fn local_fifo_order() {
        let tag = CommTag(0x1001);
        let group = LocalComm::group(2);

        for i in 0..10u8 {
            group[0].isend(1, tag.base(), Bytes::copy_from_slice(&[i]));
        }
        let mut out = Vec::new();
        for _ in 0..10 {
            let h = group[1].irecv(0, tag.base(), 1);
            out.push(h.wait().unwrap()[0]);
        }
        assert_eq!(out, (0u8..10u8).collect::<Vec<_>>());
    }

    #[test]
    fn local_groups_are_isolated() {
        let tag = CommTag(0x1002);
        let a = LocalComm::group(2);
        let b = LocalComm::group(2);

        a[0].isend(1, tag.base(), Bytes::from_static(b"x"));
        // The message must not appear in the other group's mailbox.
        b[0].isend(1, tag.base(), Bytes::from_static(b"y"));
        let h = b[1].irecv(0, tag.base(), 1);
        assert_eq!(h.wait().unwrap(), b"y".to_vec());
    }
}
