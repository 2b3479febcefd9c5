//! Three-rank pipeline over a 4x4 quad grid with five colors,
//! exercising the decoupled path where colors outnumber processes and
//! two ranks own more than one color.

mod common;

use mesh_coloring::color_map::ColorMap;
use mesh_coloring::prelude::*;

const RANKS: usize = 3;
const COLORS: usize = 5;

struct RankRun {
    dcrs: Dcrs,
    closure: MeshState,
    index_colors: Vec<usize>,
    primaries: Vec<Vec<usize>>,
    l2m: Vec<usize>,
    state: MeshState,
}

fn run_grid() -> Vec<RankRun> {
    common::run_group(RANKS, |comm| {
        let md = SimpleDefinition::quad_grid(4, 4);
        let (dcrs, mut state) = make_dcrs(&md, 0, &comm).unwrap();
        let closure = state.clone();
        let index_colors = color(&dcrs, COLORS, None, &BlockKWay, &comm).unwrap();
        let primaries = distribute(&dcrs, COLORS, &index_colors, &comm).unwrap();
        let (_, l2m) = migrate(&dcrs, COLORS, &index_colors, &mut state, &comm).unwrap();
        RankRun {
            dcrs,
            closure,
            index_colors,
            primaries,
            l2m,
            state,
        }
    })
}

#[test]
fn closure_is_complete_on_every_rank() {
    let runs = run_grid();
    let md = SimpleDefinition::quad_grid(4, 4);
    let oracle = common::oracle_v2c(&md);

    assert_eq!(runs[0].dcrs.distribution, vec![0, 6, 11, 16]);
    for (rank, run) in runs.iter().enumerate() {
        let offset = run.dcrs.distribution[rank];
        for (i, cell) in run.closure.c2v.iter().enumerate() {
            assert_eq!(cell, &md.entities(2, 0, offset + i));
            for v in cell {
                assert_eq!(run.closure.v2c[v], oracle[v], "vertex {v} on rank {rank}");
            }
        }
    }
}

#[test]
fn graph_matches_centralized_adjacency() {
    let runs = run_grid();
    let md = SimpleDefinition::quad_grid(4, 4);
    // thru_dimension 0: corner-sharing diagonal neighbors count too.
    let oracle = common::oracle_c2c(&md, 0);

    for (rank, run) in runs.iter().enumerate() {
        let offset = run.dcrs.distribution[rank];
        for c in 0..run.dcrs.entries() {
            assert_eq!(run.dcrs.neighbors(c), &oracle[&(offset + c)][..]);
        }
    }
}

#[test]
fn decoupled_block_coloring_and_distribution() {
    let runs = run_grid();
    let cm = ColorMap::new(RANKS, COLORS, 16);

    for (rank, run) in runs.iter().enumerate() {
        let offset = run.dcrs.distribution[rank];
        let want: Vec<usize> = (0..run.dcrs.entries())
            .map(|i| cm.index_color(offset + i))
            .collect();
        assert_eq!(run.index_colors, want);
    }

    // Color sizes are 4,3,3,3,3; ranks own colors {0,1}, {2,3}, {4}.
    assert_eq!(runs[0].primaries, vec![vec![0, 1, 2, 3], vec![4, 5, 6]]);
    assert_eq!(runs[1].primaries, vec![vec![7, 8, 9], vec![10, 11, 12]]);
    assert_eq!(runs[2].primaries, vec![vec![13, 14, 15]]);
}

#[test]
fn migration_places_every_cell_with_its_color_owner() {
    let runs = run_grid();
    let md = SimpleDefinition::quad_grid(4, 4);
    let oracle = common::oracle_c2c(&md, 0);
    let cm = ColorMap::new(RANKS, COLORS, 16);

    let total: usize = runs.iter().map(|r| r.state.c2v.len()).sum();
    assert_eq!(total, 16);

    let mut seen = vec![false; 16];
    for (rank, run) in runs.iter().enumerate() {
        assert_eq!(run.state.c2c.len(), run.l2m.len());
        for (local, &id) in run.l2m.iter().enumerate() {
            assert!(!seen[id], "cell {id} migrated twice");
            seen[id] = true;
            assert_eq!(cm.process(cm.index_color(id)), rank);
            assert_eq!(run.state.c2v[local], md.entities(2, 0, id));
            assert_eq!(run.state.c2c[&id], oracle[&id]);
        }
    }
    assert!(seen.iter().all(|&s| s));
}
