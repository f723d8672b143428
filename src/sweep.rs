//! Scanline sweep
//!
//! Keeps the list of edges crossing the current scanline ordered by crossing
//! position, and turns crossings into inside spans according to the fill rule.
use crate::{
    arena::{AlignedBuf, BlockCache},
    coverage::CoverageLine,
    edges::{EdgeStore, SubpixelBounds},
    path::FillRule,
    sort::{insertion_sort, merge_runs, merge_sort, shift_insert, upper_bound},
};

/// Initial capacity of active edges
pub const INITIAL_ACTIVE: usize = 256;
/// Plain insertion sort is used if fewer edges were added on a scanline
pub const MERGE_ADDED_THRESHOLD: usize = 10;
/// Plain insertion sort is used if fewer edges are active
pub const MERGE_ACTIVE_THRESHOLD: usize = 40;
/// Insertion position is found with binary search starting from this many active edges
pub const BINARY_SEARCH_THRESHOLD: usize = 20;

/// Edges crossing the current scanline
pub struct ActiveEdges {
    edges: AlignedBuf<u32>,
    crossings: AlignedBuf<i32>,
    aux_edges: AlignedBuf<u32>,
    aux_crossings: AlignedBuf<i32>,
    count: usize,
    max_count: usize,
}

impl ActiveEdges {
    pub fn new(cache: &mut BlockCache) -> Self {
        Self {
            edges: AlignedBuf::new("active_edges", INITIAL_ACTIVE, cache),
            crossings: AlignedBuf::new("crossings", INITIAL_ACTIVE, cache),
            aux_edges: AlignedBuf::new("aux_edges", INITIAL_ACTIVE, cache),
            aux_crossings: AlignedBuf::new("aux_crossings", INITIAL_ACTIVE, cache),
            count: 0,
            max_count: 0,
        }
    }

    /// Number of active edges
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Largest number of simultaneously active edges since the last reset
    pub fn max_len(&self) -> usize {
        self.max_count
    }

    /// Sorted encoded crossings `x << 1 | orientation` of the current scanline
    pub fn crossings(&self) -> &[i32] {
        &self.crossings.as_slice()[..self.count]
    }

    pub fn reset(&mut self, cache: &mut BlockCache) {
        self.count = 0;
        self.max_count = 0;
        self.edges.reset(INITIAL_ACTIVE, cache);
        self.crossings.reset(INITIAL_ACTIVE, cache);
        self.aux_edges.reset(INITIAL_ACTIVE, cache);
        self.aux_crossings.reset(INITIAL_ACTIVE, cache);
    }

    /// Move to scanline `y`
    ///
    /// Drops finished edges, adds edges starting at `y`, computes sorted crossings
    /// and advances all active edges to the next scanline.
    pub fn step(&mut self, store: &mut EdgeStore, y: i32, cache: &mut BlockCache) {
        let bucket = store.bucket_count(y);

        // evict edges that ended before this scanline
        if bucket & 1 != 0 {
            let edges = store.edges();
            let active = self.edges.as_mut_slice();
            let mut kept = 0;
            for index in 0..self.count {
                let edge = active[index];
                if edges[edge as usize].y_max() > y {
                    active[kept] = edge;
                    kept += 1;
                }
            }
            self.count = kept;
        }

        // splice new edges at the end
        let prev = self.count;
        let added = (bucket >> 1) as usize;
        let count = prev + added;
        if added > 0 {
            self.edges.ensure(count, cache);
            self.crossings.ensure(count, cache);
            self.aux_edges.ensure(count, cache);
            self.aux_crossings.ensure(count, cache);
            let active = self.edges.as_mut_slice();
            let mut index = prev;
            store.take_bucket(y, |edge| {
                active[index] = edge;
                index += 1;
            });
            debug_assert_eq!(index, count);
        }
        self.count = count;
        self.max_count = self.max_count.max(count);

        let edges = store.edges_mut();
        let active = &mut self.edges.as_mut_slice()[..count];
        let crossings = &mut self.crossings.as_mut_slice()[..count];
        if added < MERGE_ADDED_THRESHOLD || count < MERGE_ACTIVE_THRESHOLD {
            // edges keep their order between scanlines, so this is mostly linear
            let binary = count >= BINARY_SEARCH_THRESHOLD;
            let mut last = i32::MIN;
            for index in 0..count {
                let edge_index = active[index];
                let edge = &mut edges[edge_index as usize];
                let cross = edge.crossing_or();
                edge.advance();
                if cross >= last {
                    crossings[index] = cross;
                    last = cross;
                    continue;
                }
                let pos = if binary {
                    upper_bound(&crossings[..index], cross)
                } else {
                    let mut pos = index;
                    while pos > 0 && crossings[pos - 1] > cross {
                        pos -= 1;
                    }
                    pos
                };
                shift_insert(crossings, active, pos, index, cross, edge_index);
            }
        } else {
            for index in 0..count {
                let edge = &mut edges[active[index] as usize];
                crossings[index] = edge.crossing_or();
                edge.advance();
            }
            // old edges are almost sorted, new ones are in arbitrary order
            insertion_sort(&mut crossings[..prev], &mut active[..prev]);
            let aux_crossings = &mut self.aux_crossings.as_mut_slice()[..count];
            let aux_edges = &mut self.aux_edges.as_mut_slice()[..count];
            merge_sort(
                &mut crossings[prev..],
                &mut active[prev..],
                &mut aux_crossings[prev..],
                &mut aux_edges[prev..],
            );
            aux_crossings.copy_from_slice(crossings);
            aux_edges.copy_from_slice(active);
            merge_runs(aux_crossings, aux_edges, prev, crossings, active);
        }
    }
}

/// Drives active edges over scanlines and accumulates spans into the coverage line
#[derive(Debug, Clone, Copy)]
pub struct Sweeper {
    rule: FillRule,
    bounds: SubpixelBounds,
    /// Subpixel column of the left border of the first pixel
    origin_x: i32,
    /// Next scanline to process
    y: i32,
    subpixel_lg_y: u32,
}

impl Sweeper {
    pub fn new(rule: FillRule, bounds: SubpixelBounds, origin_x: i32, subpixel_lg_y: u32) -> Self {
        Self {
            rule,
            bounds,
            origin_x,
            y: bounds.min_y,
            subpixel_lg_y,
        }
    }

    pub fn rule(&self) -> FillRule {
        self.rule
    }

    /// Next scanline that will be processed
    pub fn scanline(&self) -> i32 {
        self.y
    }

    /// Process all scanlines of the pixel row `pixel_y`, scanlines must be visited in order
    pub fn sweep_row(
        &mut self,
        pixel_y: i32,
        store: &mut EdgeStore,
        active: &mut ActiveEdges,
        line: &mut CoverageLine,
        cache: &mut BlockCache,
    ) {
        let start = (pixel_y << self.subpixel_lg_y).max(self.bounds.min_y);
        let end = ((pixel_y + 1) << self.subpixel_lg_y).min(self.bounds.max_y);
        debug_assert!(start >= end || start == self.y, "scanlines out of order");
        for y in start..end {
            active.step(store, y, cache);
            self.spans(active.crossings(), line);
        }
        self.y = self.y.max(end);
    }

    /// Accumulate inside spans of a single scanline
    fn spans(&self, crossings: &[i32], line: &mut CoverageLine) {
        let (min_x, max_x) = (self.bounds.min_x, self.bounds.max_x);
        let mut span = |x0: i32, x1: i32| {
            let x0 = x0.max(min_x);
            let x1 = x1.min(max_x);
            if x0 < x1 {
                line.add_span(x0 - self.origin_x, x1 - self.origin_x);
            }
        };
        match self.rule {
            FillRule::EvenOdd => {
                for pair in crossings.chunks_exact(2) {
                    span(pair[0] >> 1, pair[1] >> 1);
                }
            }
            FillRule::NonZero => {
                let mut winding = 0;
                let mut prev = 0;
                for cross in crossings {
                    let x = cross >> 1;
                    if winding != 0 {
                        span(prev, x);
                    }
                    winding += ((cross & 1) << 1) - 1;
                    prev = x;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(lines: &[(f64, f64, f64, f64)]) -> (EdgeStore, ActiveEdges, BlockCache) {
        let mut cache = BlockCache::new();
        let mut store = EdgeStore::new(&mut cache);
        store.init(
            SubpixelBounds {
                min_x: -1000,
                max_x: 1000,
                min_y: 0,
                max_y: 1000,
            },
            &mut cache,
        );
        for (x0, y0, x1, y1) in lines.iter().copied() {
            store.add_line(x0, y0, x1, y1, &mut cache);
        }
        let active = ActiveEdges::new(&mut cache);
        (store, active, cache)
    }

    fn xs(active: &ActiveEdges) -> Vec<i32> {
        active.crossings().iter().map(|c| c >> 1).collect()
    }

    #[test]
    fn test_step_order() {
        // two lines crossing each other at y = 5
        let (mut store, mut active, mut cache) = setup(&[(0.0, 0.0, 10.0, 10.0), (10.0, 0.0, 0.0, 10.0)]);
        active.step(&mut store, 0, &mut cache);
        // sampled at y = 0.5, that is x = 0.5 and x = 9.5
        assert_eq!(xs(&active), vec![0, 9]);
        for y in 1..10 {
            active.step(&mut store, y, &mut cache);
            let crossings = xs(&active);
            assert!(crossings[0] <= crossings[1]);
        }
        assert_eq!(active.len(), 2);
        active.step(&mut store, 10, &mut cache);
        assert!(active.is_empty());
    }

    #[test]
    fn test_step_many_edges() {
        // enough edges starting on one scanline to take the merge path
        let mut lines = Vec::new();
        for i in 0..64 {
            let x = ((i * 37) % 64) as f64 * 10.0 - 320.0;
            lines.push((x, 0.0, x + (i % 3) as f64, 100.0));
        }
        let (mut store, mut active, mut cache) = setup(&lines);
        for y in 0..100 {
            active.step(&mut store, y, &mut cache);
            assert_eq!(active.len(), 64);
            let crossings = active.crossings();
            assert!(crossings.windows(2).all(|w| w[0] <= w[1]));
        }
        assert_eq!(active.max_len(), 64);
        active.step(&mut store, 100, &mut cache);
        assert!(active.is_empty());
    }

    #[test]
    fn test_step_crossing_edges() {
        // one edge enters per scanline, converging edges swap order while many are active
        let lines: Vec<_> = (0..24)
            .map(|i| {
                let y0 = i as f64;
                let x0 = 8.0 * i as f64 + 0.375;
                let x1 = 8.0 * (23 - i) as f64 + 0.625;
                (x0, y0, x1, y0 + 128.0)
            })
            .collect();
        let (mut store, mut active, mut cache) = setup(&lines);
        let bounds = SubpixelBounds {
            min_x: 0,
            max_x: 256,
            min_y: 0,
            max_y: 256,
        };
        let sweeper = Sweeper::new(FillRule::EvenOdd, bounds, 0, 0);
        let mut line = CoverageLine::new(0, 0, &mut cache);
        line.init(256, &mut cache);
        let mut row = vec![0u8; 256];
        let mut swaps = 0;
        let mut prev_order: Vec<u32> = Vec::new();
        for y in 0..160 {
            active.step(&mut store, y, &mut cache);
            let sample = y as f64 + 0.5;
            let mut expected: Vec<i32> = lines
                .iter()
                .filter(|(_, y0, _, y1)| *y0 <= y as f64 && (y as f64) < *y1)
                .map(|(x0, y0, x1, y1)| {
                    let x = x0 + (sample - y0) * (x1 - x0) / (y1 - y0);
                    (x - 0.5).ceil() as i32
                })
                .collect();
            expected.sort();
            assert_eq!(xs(&active), expected, "scanline {}", y);

            // relative order of edges that were already active changed
            let order = active.edges.as_slice()[..active.len()].to_vec();
            let kept: Vec<_> = order.iter().filter(|e| prev_order.contains(e)).collect();
            let before: Vec<_> = prev_order.iter().filter(|e| order.contains(e)).collect();
            if kept != before && active.len() >= BINARY_SEARCH_THRESHOLD {
                swaps += 1;
            }
            prev_order = order;

            row.fill(0);
            sweeper.spans(active.crossings(), &mut line);
            line.emit(&mut row, |_, _| {});
            for (x, alpha) in row.iter().enumerate() {
                let inside = expected.iter().filter(|c| **c <= x as i32).count() % 2 == 1;
                assert_eq!(*alpha, if inside { 255 } else { 0 }, "x={} y={}", x, y);
            }
        }
        assert!(swaps > 0);
        assert_eq!(active.max_len(), 24);
    }

    #[test]
    fn test_winding_spans() {
        let mut cache = BlockCache::new();
        // two overlapping squares drawn in the same direction
        let square = |x: f64| [(x, 0.0, x, 4.0), (x + 4.0, 4.0, x + 4.0, 0.0)];
        let lines: Vec<_> = square(0.0).into_iter().chain(square(2.0)).collect();
        let bounds = SubpixelBounds {
            min_x: 0,
            max_x: 6,
            min_y: 0,
            max_y: 4,
        };
        for (rule, expected) in [
            (FillRule::NonZero, vec![255u8, 255, 255, 255, 255, 255]),
            (FillRule::EvenOdd, vec![255u8, 255, 0, 0, 255, 255]),
        ] {
            let (mut store, mut active, _) = setup(&lines);
            let mut line = CoverageLine::new(0, 0, &mut cache);
            line.init(6, &mut cache);
            let mut sweeper = Sweeper::new(rule, bounds, 0, 0);
            sweeper.sweep_row(0, &mut store, &mut active, &mut line, &mut cache);
            let mut row = vec![0u8; 6];
            line.emit(&mut row, |_, _| {});
            assert_eq!(row, expected, "{:?}", rule);
            assert_eq!(sweeper.scanline(), 1);
        }
    }
}
