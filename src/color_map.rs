//! Deterministic mapping of colors to processes and indices to colors.
//!
//! A [`ColorMap`] is a pure function of `(processes, colors, indices)`:
//! the first `indices % colors` colors receive one extra index, and the
//! first `colors % processes` processes own one extra color. The same
//! map is used to slice the naive entity load and to route migration
//! destinations, so every rank computing it independently arrives at the
//! same answer.

/// Region of a distribution vector containing `index`.
///
/// `dist` is a monotone offset vector (`dist[0] == 0`); the result `r`
/// satisfies `dist[r] <= index < dist[r + 1]`.
pub fn distribution_offset(dist: &[usize], index: usize) -> usize {
    debug_assert!(dist.len() >= 2, "distribution needs at least one region");
    assert!(
        index < *dist.last().unwrap(),
        "index({index}) out-of-range({})",
        dist.last().unwrap()
    );
    // partition_point returns the first region whose start exceeds index
    dist.partition_point(|&off| off <= index) - 1
}

/// Partition of `indices` entries across `colors` partitions, with the
/// colors themselves distributed across `processes`.
#[derive(Debug, Clone)]
pub struct ColorMap {
    colors: usize,
    indices: usize,
    domain_size: usize,
    quotient: usize,
    remainder: usize,
    color_quotient: usize,
    color_remainder: usize,
    dist: Vec<usize>,
}

impl ColorMap {
    /// Construct a color map.
    ///
    /// * `processes` — number of processes in the group.
    /// * `colors` — desired number of colors to partition onto them.
    /// * `indices` — number of entries to partition onto the colors.
    pub fn new(processes: usize, colors: usize, indices: usize) -> Self {
        assert!(processes > 0, "processes must be non-zero");
        assert!(colors > 0, "colors must be non-zero");

        let mut cm = Self {
            colors,
            indices,
            domain_size: processes.min(colors),
            quotient: indices / colors,
            remainder: indices % colors,
            color_quotient: colors / processes,
            color_remainder: colors % processes,
            dist: vec![0; colors + 1],
        };

        let mut offset = 0;
        for p in 0..cm.domain_size {
            for c in 0..cm.colors_for(p) {
                cm.dist[offset + 1] = cm.dist[offset] + cm.indices_for(p, c);
                offset += 1;
            }
        }

        cm
    }

    /// Launch-domain size: the minimum of processes and colors.
    pub fn domain_size(&self) -> usize {
        self.domain_size
    }

    /// Distribution of indices across colors (`colors + 1` offsets).
    pub fn distribution(&self) -> &[usize] {
        &self.dist
    }

    /// Offset of the first color owned by `process`.
    pub fn color_offset(&self, process: usize) -> usize {
        process * self.color_quotient + process.min(self.color_remainder)
    }

    /// Total number of colors.
    pub fn colors(&self) -> usize {
        self.colors
    }

    /// Number of colors owned by `process`.
    pub fn colors_for(&self, process: usize) -> usize {
        self.color_quotient + usize::from(process < self.color_remainder)
    }

    /// Global color id for `process` and a process-local color index.
    pub fn color_id(&self, process: usize, color: usize) -> usize {
        self.color_offset(process) + color
    }

    /// Offset of the first index owned by `process` and a process-local
    /// color index.
    pub fn index_offset(&self, process: usize, color: usize) -> usize {
        let c = self.color_offset(process) + color;
        c * self.quotient + c.min(self.remainder)
    }

    /// The color that owns `index`. O(1) over the two-region split.
    pub fn index_color(&self, index: usize) -> usize {
        assert!(
            index < self.indices,
            "index({index}) out-of-range({})",
            self.indices
        );

        let lower = self.remainder * (self.quotient + 1);
        if index < lower {
            index / (self.quotient + 1)
        } else {
            self.remainder + (index - lower) / self.quotient
        }
    }

    /// The process that owns `color`. O(1) over the two-region split.
    pub fn process(&self, color: usize) -> usize {
        assert!(
            color < self.colors,
            "color({color}) out-of-range({})",
            self.colors
        );

        let lower = self.color_remainder * (self.color_quotient + 1);
        if color < lower {
            color / (self.color_quotient + 1)
        } else {
            self.color_remainder + (color - lower) / self.color_quotient
        }
    }

    /// Total number of indices.
    pub fn indices(&self) -> usize {
        self.indices
    }

    /// Number of indices assigned to `process` and a process-local color
    /// index.
    pub fn indices_for(&self, process: usize, color: usize) -> usize {
        let c = self.color_offset(process) + color;
        self.quotient + usize::from(c < self.remainder)
    }
}
