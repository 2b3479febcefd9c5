//! # mesh-coloring
//!
//! Distributed partitioning of unstructured meshes: each process starts
//! from a naive contiguous slice of cells, builds the global
//! cell-to-cell adjacency graph through collective exchanges, hands the
//! graph to an external k-way partitioner, and migrates cells (with
//! their connectivity) to the processes that own their assigned colors.
//! No process ever holds the full mesh.
//!
//! ## Pipeline
//!
//! ```text
//! MeshDefinition -> make_dcrs -> Dcrs -> partition::color -> migrate
//! ```
//!
//! - [`coloring::make_dcrs`] builds the distributed CSR graph from a
//!   [`definition::MeshDefinition`] via two all-to-all closure rounds.
//! - [`partition::color`] adapts the graph to a [`partition::KWayPartitioner`]
//!   (METIS behind the `metis-support` feature, or the deterministic
//!   [`partition::BlockKWay`]).
//! - [`coloring::migrate`] redistributes cell definitions and
//!   connectivity to the color owners, draining the sender's state as
//!   packs are built.
//!
//! ## Communication backends
//!
//! The pipeline is generic over [`comm::Communicator`]: `NoComm` for
//! serial runs, `LocalComm` groups for multi-rank tests inside one
//! process, and `MpiComm` behind the `mpi-support` feature. Every
//! collective is a blocking barrier; communication failures are fatal
//! (the coloring pass is one-shot and never retried).

pub mod color_map;
pub mod coloring;
pub mod comm;
pub mod dcrs;
pub mod definition;
pub mod error;
pub mod partition;

/// The most-used traits and types.
pub mod prelude {
    pub use crate::color_map::{distribution_offset, ColorMap};
    pub use crate::coloring::{distribute, make_dcrs, migrate, naive_cells, naive_vertices, MeshState};
    #[cfg(feature = "mpi-support")]
    pub use crate::comm::MpiComm;
    pub use crate::comm::{CommTag, Communicator, LocalComm, NoComm, Wait, WaitRecv};
    pub use crate::dcrs::Dcrs;
    pub use crate::definition::{MeshDefinition, SimpleDefinition};
    pub use crate::error::ColoringError;
    #[cfg(feature = "metis-support")]
    pub use crate::partition::metis::MetisKWay;
    pub use crate::partition::{color, BlockKWay, KWayPartitioner};
}
