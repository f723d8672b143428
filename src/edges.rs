//! Edge store
//!
//! Flattened lines are stored as edges bucketed by the first scanline they
//! cross. Edges are only ever appended, the whole store is reset between renders.
//! Scanline `s` covers subpixel rows `[s, s + 1)` and is sampled at `s + 0.5`,
//! the same holds for subpixel columns.
use crate::{
    arena::{AlignedBuf, BlockCache},
    utils::ceil_i32,
};
use bytemuck::{Pod, Zeroable};

/// Number of fractional bits in fixed point edge positions
pub const FIXED_SHIFT: u32 = 32;
const FIXED_ONE: f64 = (1u64 << FIXED_SHIFT) as f64;
/// Bias added to positions so that the integer part is the ceiling
const FIXED_CEIL_BIAS: i64 = (1i64 << FIXED_SHIFT) - 1;

/// Initial number of edges
pub const INITIAL_EDGES: usize = 256;

#[derive(Clone, Copy, Pod, Zeroable, Default, PartialEq, Eq)]
#[repr(C)]
pub struct Edge {
    /// Crossing position at the current scanline (32.32 fixed point, biased)
    pub x: i64,
    /// Change of `x` per scanline (32.32 fixed point)
    pub slope: i64,
    /// Exclusive last scanline shifted left by one, low bit is orientation
    pub y_max_or: i32,
    /// Index of the next edge in the bucket plus one, zero terminates the list
    pub next: u32,
}

impl Edge {
    /// Subpixel column of the crossing at current scanline
    #[inline]
    pub fn crossing(&self) -> i32 {
        (self.x >> FIXED_SHIFT) as i32
    }

    /// Encoded crossing `x << 1 | orientation`
    #[inline]
    pub fn crossing_or(&self) -> i32 {
        (self.crossing() << 1) | (self.y_max_or & 1)
    }

    /// Exclusive last scanline
    #[inline]
    pub fn y_max(&self) -> i32 {
        self.y_max_or >> 1
    }

    /// `1` if edge goes down (increasing y), `0` otherwise
    #[inline]
    pub fn orientation(&self) -> i32 {
        self.y_max_or & 1
    }

    /// Move to the next scanline
    #[inline]
    pub fn advance(&mut self) {
        self.x += self.slope;
    }
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Edge")
            .field("x", &self.crossing())
            .field("slope", &(self.slope as f64 / FIXED_ONE))
            .field("y_max", &self.y_max())
            .field("or", &self.orientation())
            .finish()
    }
}

/// Subpixel extents of the geometry that survived clipping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extents {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Default for Extents {
    fn default() -> Self {
        Self {
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }
}

impl Extents {
    pub fn is_set(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }
}

/// Subpixel rectangle `[min_x, max_x) x [min_y, max_y)` of scanlines and columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubpixelBounds {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl SubpixelBounds {
    pub fn is_empty(&self) -> bool {
        self.min_x >= self.max_x || self.min_y >= self.max_y
    }
}

/// Append-only store of edges bucketed by their first scanline
pub struct EdgeStore {
    edges: AlignedBuf<Edge>,
    used: usize,
    /// Per scanline head of the edge list (index plus one)
    heads: AlignedBuf<u32>,
    /// Per scanline `added_count << 1 | edge_ends_here`
    counts: AlignedBuf<u32>,
    bounds: SubpixelBounds,
    extents: Extents,
}

impl EdgeStore {
    pub fn new(cache: &mut BlockCache) -> Self {
        Self {
            edges: AlignedBuf::new("edges", INITIAL_EDGES, cache),
            used: 0,
            heads: AlignedBuf::new("edge_heads", 0, cache),
            counts: AlignedBuf::new("edge_counts", 0, cache),
            bounds: SubpixelBounds::default(),
            extents: Extents::default(),
        }
    }

    /// Prepare store for a new render clipped by `bounds`
    pub fn init(&mut self, bounds: SubpixelBounds, cache: &mut BlockCache) {
        self.used = 0;
        self.extents = Extents::default();
        self.bounds = bounds;
        // one extra bucket to flag edges ending at the last scanline
        let rows = (bounds.max_y - bounds.min_y).max(0) as usize + 1;
        self.heads.ensure(rows, cache);
        self.counts.ensure(rows, cache);
        self.heads.as_mut_slice()[..rows].fill(0);
        self.counts.as_mut_slice()[..rows].fill(0);
    }

    /// Drop all edges and shrink buffers that have grown during the last render
    pub fn reset(&mut self, cache: &mut BlockCache) {
        self.used = 0;
        self.extents = Extents::default();
        self.edges.reset(INITIAL_EDGES, cache);
    }

    /// Clip bounds of the current render
    pub fn bounds(&self) -> SubpixelBounds {
        self.bounds
    }

    /// Extents of all stored edges
    pub fn extents(&self) -> Extents {
        self.extents
    }

    /// Number of stored edges
    pub fn len(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges.as_slice()[..self.used]
    }

    pub fn edges_mut(&mut self) -> &mut [Edge] {
        let used = self.used;
        &mut self.edges.as_mut_slice()[..used]
    }

    /// Bucket counter for scanline `y`
    #[inline]
    pub fn bucket_count(&self, y: i32) -> u32 {
        self.counts.as_slice()[(y - self.bounds.min_y) as usize]
    }

    /// Detach list of edges that start at scanline `y`, calling `f` with each edge index
    pub fn take_bucket(&mut self, y: i32, mut f: impl FnMut(u32)) {
        let bucket = (y - self.bounds.min_y) as usize;
        let heads = self.heads.as_mut_slice();
        let mut next = heads[bucket];
        heads[bucket] = 0;
        let edges = self.edges.as_slice();
        while next != 0 {
            let index = next - 1;
            f(index);
            next = edges[index as usize].next;
        }
    }

    /// Add line in subpixel coordinates
    ///
    /// Returns `false` if the line does not cross any scanline inside bounds.
    pub fn add_line(
        &mut self,
        mut x0: f64,
        mut y0: f64,
        mut x1: f64,
        mut y1: f64,
        cache: &mut BlockCache,
    ) -> bool {
        let mut or = 1;
        if y0 > y1 {
            std::mem::swap(&mut x0, &mut x1);
            std::mem::swap(&mut y0, &mut y1);
            or = 0;
        }
        let first = ceil_i32(y0 - 0.5).max(self.bounds.min_y);
        let last = ceil_i32(y1 - 0.5).min(self.bounds.max_y);
        if first >= last {
            // horizontal, zero height or outside of bounds
            return false;
        }

        let extents = &mut self.extents;
        extents.min_y = extents.min_y.min(y0);
        extents.max_y = extents.max_y.max(y1);
        extents.min_x = extents.min_x.min(x0.min(x1));
        extents.max_x = extents.max_x.max(x0.max(x1));

        let slope = (x1 - x0) / (y1 - y0);
        let x_first = x0 + (first as f64 + 0.5 - y0) * slope;
        let x = ((x_first - 0.5) * FIXED_ONE).floor() as i64 + FIXED_CEIL_BIAS;

        let index = self.used;
        self.edges.ensure(index + 1, cache);
        let bucket = (first - self.bounds.min_y) as usize;
        let heads = self.heads.as_mut_slice();
        self.edges.as_mut_slice()[index] = Edge {
            x,
            slope: (slope * FIXED_ONE).round() as i64,
            y_max_or: (last << 1) | or,
            next: heads[bucket],
        };
        heads[bucket] = index as u32 + 1;
        let counts = self.counts.as_mut_slice();
        counts[bucket] += 2;
        counts[(last - self.bounds.min_y) as usize] |= 1;
        self.used += 1;
        true
    }

    /// Subpixel rectangle that needs to be swept, `None` if nothing is visible
    pub fn sweep_bounds(&self) -> Option<SubpixelBounds> {
        if !self.extents.is_set() {
            return None;
        }
        let result = SubpixelBounds {
            min_x: ceil_i32(self.extents.min_x - 0.5).max(self.bounds.min_x),
            max_x: ceil_i32(self.extents.max_x - 0.5).min(self.bounds.max_x),
            min_y: ceil_i32(self.extents.min_y - 0.5).max(self.bounds.min_y),
            max_y: ceil_i32(self.extents.max_y - 0.5).min(self.bounds.max_y),
        };
        (!result.is_empty()).then_some(result)
    }
}
