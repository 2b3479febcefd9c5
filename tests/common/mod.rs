//! Shared harness for the multi-rank pipeline tests: a thread-per-rank
//! runner over a [`LocalComm`] group plus centralized connectivity
//! oracles to check the distributed results against.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use mesh_coloring::comm::LocalComm;
use mesh_coloring::definition::MeshDefinition;

/// Run `f` once per rank of a connected group, one thread per rank, and
/// return the results in rank order.
pub fn run_group<T, F>(size: usize, f: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(LocalComm) -> T + Send + Sync + 'static,
{
    let _ = env_logger::builder().is_test(true).try_init();
    let f = Arc::new(f);
    let handles: Vec<_> = LocalComm::group(size)
        .into_iter()
        .map(|comm| {
            let f = Arc::clone(&f);
            std::thread::spawn(move || f(comm))
        })
        .collect();
    handles
        .into_iter()
        .map(|h| h.join().expect("rank thread panicked"))
        .collect()
}

/// Complete vertex-to-cell connectivity computed centrally.
pub fn oracle_v2c<D: MeshDefinition>(md: &D) -> BTreeMap<usize, Vec<usize>> {
    let dim = md.dimension();
    let mut v2c: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for c in 0..md.num_entities(dim) {
        for v in md.entities(dim, 0, c) {
            v2c.entry(v).or_default().push(c);
        }
    }
    v2c
}

/// Complete cell-to-cell adjacency computed centrally: cells sharing
/// more than `thru_dimension` vertices are neighbors.
pub fn oracle_c2c<D: MeshDefinition>(md: &D, thru_dimension: usize) -> BTreeMap<usize, Vec<usize>> {
    let dim = md.dimension();
    let n = md.num_entities(dim);
    let mut c2c: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for a in 0..n {
        let va = md.entities(dim, 0, a);
        for b in a + 1..n {
            let vb = md.entities(dim, 0, b);
            let shared = va.iter().filter(|v| vb.contains(v)).count();
            if shared > thru_dimension {
                c2c.entry(a).or_default().push(b);
                c2c.entry(b).or_default().push(a);
            }
        }
    }
    c2c
}
