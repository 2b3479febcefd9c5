//! Collective transport: communicator backends, wire records, and the
//! one-to-all / all-to-all exchange patterns the pipeline is built on.

pub mod collective;
pub mod communicator;
pub mod wire;

pub use collective::{all_to_allv, one_to_allv, AllToAllPack, OneToAllPack};
#[cfg(feature = "mpi-support")]
pub use communicator::MpiComm;
pub use communicator::{CommTag, Communicator, LocalComm, NoComm, Wait, WaitRecv};
