//! Read-only mesh definition interface consumed by the naive loader.
//!
//! A definition exposes per-cell vertex lists and vertex coordinates for
//! a mesh that has already been parsed; file formats are out of scope
//! here. Only rank 0 needs real data behind the interface — the loader
//! ships slices to the other ranks.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Narrow query interface over a parsed mesh.
pub trait MeshDefinition {
    /// Coordinate type shipped by the naive vertex loader.
    type Point: Clone + Send + Serialize + DeserializeOwned;

    /// Topological dimension of the cells.
    fn dimension(&self) -> usize;

    /// Number of entities of the given dimension (0 = vertices).
    fn num_entities(&self, dimension: usize) -> usize;

    /// Ordered global vertex ids of entity `index`. Order is meaningful
    /// (it encodes local vertex numbering) and must survive migration.
    fn entities(&self, entity_dim: usize, vertex_dim: usize, index: usize) -> Vec<usize>;

    /// Coordinates of vertex `index`.
    fn vertex(&self, index: usize) -> Self::Point;
}

/// A 2-d point, the coordinate type of the built-in fixtures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

/// In-memory definition backed by explicit cell-vertex lists.
///
/// Useful for tests and for callers that already hold a parsed mesh.
#[derive(Debug, Clone)]
pub struct SimpleDefinition {
    dimension: usize,
    cells: Vec<Vec<usize>>,
    points: Vec<Point2>,
}

impl SimpleDefinition {
    pub fn new(dimension: usize, cells: Vec<Vec<usize>>, points: Vec<Point2>) -> Self {
        Self {
            dimension,
            cells,
            points,
        }
    }

    /// 1-d chain of `n` cells: cell `i` spans vertices `[i, i + 1]`, so
    /// consecutive cells share exactly one vertex.
    pub fn chain(n: usize) -> Self {
        let cells = (0..n).map(|i| vec![i, i + 1]).collect();
        let points = (0..=n)
            .map(|i| Point2 {
                x: i as f64,
                y: 0.0,
            })
            .collect();
        Self::new(1, cells, points)
    }

    /// Structured `nx` x `ny` quad grid with `(nx + 1) * (ny + 1)`
    /// vertices, row-major cell and vertex numbering.
    pub fn quad_grid(nx: usize, ny: usize) -> Self {
        let stride = nx + 1;
        let mut cells = Vec::with_capacity(nx * ny);
        for j in 0..ny {
            for i in 0..nx {
                let v0 = j * stride + i;
                cells.push(vec![v0, v0 + 1, v0 + stride + 1, v0 + stride]);
            }
        }
        let points = (0..=ny)
            .flat_map(|j| {
                (0..=nx).map(move |i| Point2 {
                    x: i as f64,
                    y: j as f64,
                })
            })
            .collect();
        Self::new(2, cells, points)
    }
}

impl MeshDefinition for SimpleDefinition {
    type Point = Point2;

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn num_entities(&self, dimension: usize) -> usize {
        if dimension == 0 {
            self.points.len()
        } else if dimension == self.dimension {
            self.cells.len()
        } else {
            0
        }
    }

    fn entities(&self, entity_dim: usize, vertex_dim: usize, index: usize) -> Vec<usize> {
        assert_eq!(entity_dim, self.dimension, "only cell queries are supported");
        assert_eq!(vertex_dim, 0, "only vertex connectivity is stored");
        self.cells[index].clone()
    }

    fn vertex(&self, index: usize) -> Point2 {
        self.points[index]
    }
}
