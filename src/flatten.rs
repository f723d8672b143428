//! Curve flattening with forward differencing
//!
//! All coordinates here are in subpixel units, so error bounds are expressed in
//! subpixels as well. Second forward difference `dd` of a curve sampled with
//! step `h` bounds the distance between the curve and its chord by `dd / 8`,
//! hence the `8.0` factor in all bounds below.
use crate::Point;

/// Maximum allowed quadratic deviation from its chords in subpixels
pub const QUAD_DEC_ERR_SUBPIX: f64 = 0.5;

/// Cubic deviation above which the step is halved, in subpixels
pub const CUB_DEC_ERR_SUBPIX: f64 = 1.0;

/// Cubic deviation below which the step is doubled, in subpixels
pub const CUB_INC_ERR_SUBPIX: f64 = 0.4;

/// log2 of the initial cubic step count
pub const CUB_COUNT_LG: u32 = 2;

/// log2 of the upper limit on the number of lines a single curve can produce
pub const MAX_STEPS_LG: u32 = 16;

/// Upper limit on the number of lines a single curve can produce
pub const MAX_STEPS: u64 = 1 << MAX_STEPS_LG;

const CUB_COUNT: u64 = 1 << CUB_COUNT_LG;
const CUB_INV_COUNT: f64 = 1.0 / (1u64 << CUB_COUNT_LG) as f64;
const CUB_INV_COUNT_2: f64 = CUB_INV_COUNT * CUB_INV_COUNT;
const CUB_INV_COUNT_3: f64 = CUB_INV_COUNT_2 * CUB_INV_COUNT;

/// Breaks quadratic and cubic curves into lines within error bounds
#[derive(Debug, Clone, Copy)]
pub struct Flattener {
    quad_dec_bnd: f64,
    cub_dec_bnd: f64,
    cub_inc_bnd: f64,
    /// Ratio between x and y subpixel sizes, y differences are measured in x units
    scale_dy: f64,
}

impl Flattener {
    /// Create flattener for the subpixel grid with provided positions per pixel
    pub fn new(positions_x: u32, positions_y: u32) -> Self {
        Self {
            quad_dec_bnd: 8.0 * QUAD_DEC_ERR_SUBPIX,
            cub_dec_bnd: 8.0 * CUB_DEC_ERR_SUBPIX,
            cub_inc_bnd: 8.0 * CUB_INC_ERR_SUBPIX,
            scale_dy: positions_x as f64 / positions_y as f64,
        }
    }

    #[inline]
    fn norm(&self, dx: f64, dy: f64) -> f64 {
        dx.abs() + dy.abs() * self.scale_dy
    }

    /// Flatten quadratic curve `p0, p1, p2`, returns number of produced lines
    ///
    /// Step count starts at one and is doubled while the second difference is
    /// above the bound.
    pub fn quad(&self, p0: Point, p1: Point, p2: Point, mut sink: impl FnMut(Point, Point)) -> u64 {
        // p(t) = a t^2 + b t + p0
        let ax = p0.x() - 2.0 * p1.x() + p2.x();
        let ay = p0.y() - 2.0 * p1.y() + p2.y();
        let bx = 2.0 * (p1.x() - p0.x());
        let by = 2.0 * (p1.y() - p0.y());

        // second difference with unit step
        let mut max_dd = self.norm(2.0 * ax, 2.0 * ay);
        let mut count: u64 = 1;
        while max_dd >= self.quad_dec_bnd && count < MAX_STEPS {
            // halving the step divides the second difference by four
            max_dd /= 4.0;
            count <<= 1;
        }

        let lines = count;
        let (mut x0, mut y0) = (p0.x(), p0.y());
        if count > 1 {
            let icount = 1.0 / count as f64;
            let icount2 = icount * icount;
            let ddx = 2.0 * ax * icount2;
            let ddy = 2.0 * ay * icount2;
            let mut dx = ax * icount2 + bx * icount;
            let mut dy = ay * icount2 + by * icount;
            while count > 1 {
                count -= 1;
                let x1 = x0 + dx;
                let y1 = y0 + dy;
                sink(Point::new(x0, y0), Point::new(x1, y1));
                x0 = x1;
                y0 = y1;
                dx += ddx;
                dy += ddy;
            }
        }
        sink(Point::new(x0, y0), p2);
        lines
    }

    /// Flatten cubic curve `p0, p1, p2, p3`, returns number of produced lines
    ///
    /// Adaptive forward differencing: the step is halved while the second
    /// difference is above the decrement bound, and doubled while it is below
    /// the increment bound and the position lies on the coarser grid.
    pub fn cubic(
        &self,
        p0: Point,
        p1: Point,
        p2: Point,
        p3: Point,
        mut sink: impl FnMut(Point, Point),
    ) -> u64 {
        // p(t) = a t^3 + b t^2 + c t + p0
        let ax = 3.0 * (p1.x() - p2.x()) + p3.x() - p0.x();
        let ay = 3.0 * (p1.y() - p2.y()) + p3.y() - p0.y();
        let bx = 3.0 * (p0.x() - 2.0 * p1.x() + p2.x());
        let by = 3.0 * (p0.y() - 2.0 * p1.y() + p2.y());
        let cx = 3.0 * (p1.x() - p0.x());
        let cy = 3.0 * (p1.y() - p0.y());

        let mut count = CUB_COUNT;
        // log2 of the current step resolution, bounded by `MAX_STEPS_LG`
        let mut level = CUB_COUNT_LG;
        let mut dddx = 6.0 * ax * CUB_INV_COUNT_3;
        let mut dddy = 6.0 * ay * CUB_INV_COUNT_3;
        let mut ddx = dddx + 2.0 * bx * CUB_INV_COUNT_2;
        let mut ddy = dddy + 2.0 * by * CUB_INV_COUNT_2;
        let mut dx = ax * CUB_INV_COUNT_3 + bx * CUB_INV_COUNT_2 + cx * CUB_INV_COUNT;
        let mut dy = ay * CUB_INV_COUNT_3 + by * CUB_INV_COUNT_2 + cy * CUB_INV_COUNT;

        let mut lines = 0;
        let (mut x0, mut y0) = (p0.x(), p0.y());
        loop {
            // double the step, only possible on even count
            while count % 2 == 0 && self.norm(ddx, ddy) <= self.cub_inc_bnd {
                dx = 2.0 * dx + ddx;
                dy = 2.0 * dy + ddy;
                ddx = 4.0 * (ddx + dddx);
                ddy = 4.0 * (ddy + dddy);
                dddx *= 8.0;
                dddy *= 8.0;
                count >>= 1;
                level -= 1;
            }
            // halve the step
            while self.norm(ddx, ddy) >= self.cub_dec_bnd && level < MAX_STEPS_LG {
                dddx /= 8.0;
                dddy /= 8.0;
                ddx = ddx / 4.0 - dddx;
                ddy = ddy / 4.0 - dddy;
                dx = (dx - ddx) / 2.0;
                dy = (dy - ddy) / 2.0;
                count <<= 1;
                level += 1;
            }
            count -= 1;
            if count == 0 {
                break;
            }
            let x1 = x0 + dx;
            let y1 = y0 + dy;
            dx += ddx;
            dy += ddy;
            ddx += dddx;
            ddy += dddy;
            sink(Point::new(x0, y0), Point::new(x1, y1));
            lines += 1;
            x0 = x1;
            y0 = y1;
        }
        sink(Point::new(x0, y0), p3);
        lines + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_at(p0: Point, p1: Point, p2: Point, t: f64) -> Point {
        let u = 1.0 - t;
        (u * u) * p0 + (2.0 * u * t) * p1 + (t * t) * p2
    }

    fn cubic_at(p0: Point, p1: Point, p2: Point, p3: Point, t: f64) -> Point {
        let u = 1.0 - t;
        (u * u * u) * p0 + (3.0 * u * u * t) * p1 + (3.0 * u * t * t) * p2 + (t * t * t) * p3
    }

    /// Distance from point to the closest line of the polyline
    fn polyline_dist(lines: &[(Point, Point)], p: Point) -> f64 {
        lines
            .iter()
            .map(|(a, b)| {
                let ab = *b - *a;
                let ap = p - *a;
                let len2 = ab.x() * ab.x() + ab.y() * ab.y();
                let t = if len2 > 0.0 {
                    ((ap.x() * ab.x() + ap.y() * ab.y()) / len2).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let d = p - (*a + t * ab);
                d.x().hypot(d.y())
            })
            .fold(f64::INFINITY, f64::min)
    }

    fn check_connected(lines: &[(Point, Point)], start: Point, end: Point) {
        assert!(lines[0].0.is_close_to(start));
        for pair in lines.windows(2) {
            assert!(pair[0].1.is_close_to(pair[1].0));
        }
        assert_eq!(lines.last().unwrap().1, end);
    }

    #[test]
    fn test_quad() {
        let flattener = Flattener::new(8, 8);
        let (p0, p1, p2) = (
            Point::new(0.0, 0.0),
            Point::new(400.0, 800.0),
            Point::new(800.0, 0.0),
        );
        let mut lines = Vec::new();
        let count = flattener.quad(p0, p1, p2, |a, b| lines.push((a, b)));
        assert_eq!(count as usize, lines.len());
        assert!(count.is_power_of_two());
        check_connected(&lines, p0, p2);
        for i in 0..=100 {
            let p = quad_at(p0, p1, p2, i as f64 / 100.0);
            assert!(polyline_dist(&lines, p) <= QUAD_DEC_ERR_SUBPIX);
        }
    }

    #[test]
    fn test_quad_flat() {
        let flattener = Flattener::new(8, 8);
        let mut lines = Vec::new();
        let count = flattener.quad(
            Point::new(0.0, 0.0),
            Point::new(5.0, 5.0),
            Point::new(10.0, 10.0),
            |a, b| lines.push((a, b)),
        );
        assert_eq!(count, 1);
        assert_eq!(lines, vec![(Point::new(0.0, 0.0), Point::new(10.0, 10.0))]);
    }

    #[test]
    fn test_cubic() {
        let flattener = Flattener::new(8, 8);
        let (p0, p1, p2, p3) = (
            Point::new(158.0, 70.0),
            Point::new(2100.0, 2500.0),
            Point::new(25.0, 1900.0),
            Point::new(2190.0, 89.0),
        );
        let mut lines = Vec::new();
        let count = flattener.cubic(p0, p1, p2, p3, |a, b| lines.push((a, b)));
        assert_eq!(count as usize, lines.len());
        check_connected(&lines, p0, p3);
        for i in 0..=1000 {
            let p = cubic_at(p0, p1, p2, p3, i as f64 / 1000.0);
            let dist = polyline_dist(&lines, p);
            // bound is enforced on differences, not on the curve itself
            assert!(dist <= 1.25 * CUB_DEC_ERR_SUBPIX, "distance {} at {}", dist, i);
        }
    }

    #[test]
    fn test_cubic_adapts() {
        let flattener = Flattener::new(8, 8);
        // straight cubic collapses to few lines
        let mut straight = 0;
        flattener.cubic(
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(20.0, 20.0),
            Point::new(30.0, 30.0),
            |_, _| straight += 1,
        );
        assert!(straight <= 2, "straight cubic produced {} lines", straight);

        // scaling the curve up requires more lines
        let mut small = 0;
        let mut large = 0;
        let curve = [(0.0, 0.0), (0.0, 100.0), (100.0, 100.0), (100.0, 0.0)];
        let pts = |scale: f64| curve.map(|(x, y)| Point::new(x * scale, y * scale));
        let [a, b, c, d] = pts(1.0);
        flattener.cubic(a, b, c, d, |_, _| small += 1);
        let [a, b, c, d] = pts(100.0);
        flattener.cubic(a, b, c, d, |_, _| large += 1);
        assert!(large > small * 4, "{} vs {}", large, small);
    }

    #[test]
    fn test_cubic_pathological() {
        let flattener = Flattener::new(8, 8);
        let mut count = 0u64;
        let total = flattener.cubic(
            Point::new(0.0, 0.0),
            Point::new(1e30, -1e30),
            Point::new(-1e30, 1e30),
            Point::new(1.0, 1.0),
            |_, _| count += 1,
        );
        assert_eq!(total, count);
        assert!(count <= MAX_STEPS);
    }
}
