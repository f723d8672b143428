//! Scanline rasterizer
//!
//! [`Rasterizer`] consumes path geometry in pixel coordinates, converts it to
//! subpixel space, flattens curves and stores resulting lines in the edge store
//! of its [`RendererContext`]. Once the path is done, [`Rasterizer::end_rendering`]
//! produces a [`TileGenerator`] that sweeps the edges and hands out alpha tiles.
use crate::{
    context::RendererContext,
    edges::SubpixelBounds,
    flatten::Flattener,
    geometry::BBox,
    path::{FillRule, PathConsumer},
    tile::TileGenerator,
    Point,
};

/// Largest absolute subpixel coordinate, larger values are clamped
pub const MAX_COORD: f64 = (1 << 24) as f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for the first `move_to`
    Initial,
    /// Inside of a sub-path
    Open,
    /// Sub-path was closed, only `move_to` starts new geometry
    Closed,
    /// `path_done` was received
    Done,
    /// Protocol was violated, render is empty
    Poisoned,
}

/// Path consumer that accumulates edges for the scanline sweep
pub struct Rasterizer {
    ctx: Option<Box<RendererContext>>,
    rule: FillRule,
    bounds: BBox,
    flattener: Flattener,
    scale_x: f64,
    scale_y: f64,
    /// Start of the current sub-path in subpixels
    start: Point,
    /// Current position in subpixels
    current: Point,
    state: State,
    lines: usize,
}

impl Rasterizer {
    /// Create rasterizer that renders into pixel rectangle `bounds`
    pub fn new(mut ctx: Box<RendererContext>, bounds: BBox, rule: FillRule) -> Self {
        let params = ctx.params();
        // keep subpixel bounds inside of representable coordinates
        let limit_x = (MAX_COORD as i32) >> params.subpixel_lg_x;
        let limit_y = (MAX_COORD as i32) >> params.subpixel_lg_y;
        let sub_bounds = SubpixelBounds {
            min_x: bounds.x0.clamp(-limit_x, limit_x) << params.subpixel_lg_x,
            max_x: bounds.x1.clamp(-limit_x, limit_x) << params.subpixel_lg_x,
            min_y: bounds.y0.clamp(-limit_y, limit_y) << params.subpixel_lg_y,
            max_y: bounds.y1.clamp(-limit_y, limit_y) << params.subpixel_lg_y,
        };
        ctx.start_render();
        let RendererContext { edges, cache, .. } = &mut *ctx;
        edges.init(sub_bounds, cache);
        Self {
            ctx: Some(ctx),
            rule,
            bounds,
            flattener: Flattener::new(params.positions_x(), params.positions_y()),
            scale_x: params.positions_x() as f64,
            scale_y: params.positions_y() as f64,
            start: Point::default(),
            current: Point::default(),
            state: State::Initial,
            lines: 0,
        }
    }

    /// Create rasterizer using pooled context of the current thread
    pub fn acquire(bounds: BBox, rule: FillRule) -> Self {
        Self::new(RendererContext::acquire(), bounds, rule)
    }

    pub fn bounds(&self) -> BBox {
        self.bounds
    }

    pub fn rule(&self) -> FillRule {
        self.rule
    }

    /// Number of lines that were stored as edges
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Whether protocol was violated and nothing will be rendered
    pub fn is_poisoned(&self) -> bool {
        self.state == State::Poisoned
    }

    /// Finish rendering, returns `None` if there is nothing to render
    pub fn end_rendering(mut self) -> Option<TileGenerator> {
        match self.state {
            State::Done => {}
            State::Poisoned => return None,
            _ => {
                self.violation("end_rendering before path_done");
                return None;
            }
        }
        let ctx = self.ctx.take()?;
        let Some(bounds) = ctx.edges.sweep_bounds() else {
            tracing::debug!("[rasterizer] nothing to render, {} lines", self.lines);
            ctx.release();
            return None;
        };
        tracing::debug!(
            "[rasterizer] {} lines, {} edges, subpixel bounds {:?}",
            self.lines,
            ctx.edges.len(),
            bounds
        );
        Some(TileGenerator::new(ctx, bounds, self.rule))
    }

    fn violation(&mut self, what: &str) {
        debug_assert!(false, "path protocol violation: {}", what);
        tracing::error!("[rasterizer] path protocol violation: {}", what);
        self.state = State::Poisoned;
    }

    /// Check that a segment can be added, `false` if it must be ignored
    fn segment_allowed(&mut self, what: &str) -> bool {
        match self.state {
            State::Open => true,
            State::Closed => {
                // segment after close continues from the start of the closed sub-path
                self.state = State::Open;
                true
            }
            State::Poisoned => false,
            State::Initial | State::Done => {
                self.violation(what);
                false
            }
        }
    }

    #[inline]
    fn to_subpixel(&self, p: Point) -> Point {
        let clamp = |value: f64| {
            if value.is_nan() {
                0.0
            } else {
                value.clamp(-MAX_COORD, MAX_COORD)
            }
        };
        Point::new(clamp(p.x() * self.scale_x), clamp(p.y() * self.scale_y))
    }

    fn add_line(&mut self, p0: Point, p1: Point) {
        let Some(ctx) = self.ctx.as_deref_mut() else {
            return;
        };
        let RendererContext { edges, cache, .. } = ctx;
        if edges.add_line(p0.x(), p0.y(), p1.x(), p1.y(), cache) {
            self.lines += 1;
        }
    }

    fn close_subpath(&mut self) {
        if self.state == State::Open {
            if self.current != self.start {
                self.add_line(self.current, self.start);
            }
            self.current = self.start;
            self.state = State::Closed;
        }
    }
}

impl PathConsumer for Rasterizer {
    fn move_to(&mut self, p: Point) {
        match self.state {
            State::Poisoned => return,
            State::Done => return self.violation("move_to after path_done"),
            _ => {}
        }
        self.close_subpath();
        let p = self.to_subpixel(p);
        self.start = p;
        self.current = p;
        self.state = State::Open;
    }

    fn line_to(&mut self, p: Point) {
        if !self.segment_allowed("line_to before move_to") {
            return;
        }
        let p = self.to_subpixel(p);
        self.add_line(self.current, p);
        self.current = p;
    }

    fn quad_to(&mut self, p1: Point, p2: Point) {
        if !self.segment_allowed("quad_to before move_to") {
            return;
        }
        let (p1, p2) = (self.to_subpixel(p1), self.to_subpixel(p2));
        let flattener = self.flattener;
        flattener.quad(self.current, p1, p2, |a, b| self.add_line(a, b));
        self.current = p2;
    }

    fn curve_to(&mut self, p1: Point, p2: Point, p3: Point) {
        if !self.segment_allowed("curve_to before move_to") {
            return;
        }
        let (p1, p2, p3) = (
            self.to_subpixel(p1),
            self.to_subpixel(p2),
            self.to_subpixel(p3),
        );
        let flattener = self.flattener;
        flattener.cubic(self.current, p1, p2, p3, |a, b| self.add_line(a, b));
        self.current = p3;
    }

    fn close_path(&mut self) {
        match self.state {
            State::Open => self.close_subpath(),
            State::Initial => self.violation("close_path before move_to"),
            State::Done => self.violation("close_path after path_done"),
            _ => {}
        }
    }

    fn path_done(&mut self) {
        match self.state {
            State::Poisoned => {}
            State::Done => self.violation("path_done called twice"),
            _ => {
                self.close_subpath();
                self.state = State::Done;
            }
        }
    }
}

impl Drop for Rasterizer {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            ctx.release();
        }
    }
}

impl std::fmt::Debug for Rasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rasterizer")
            .field("bounds", &self.bounds)
            .field("rule", &self.rule)
            .field("state", &self.state)
            .field("lines", &self.lines)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{context::RasterParams, utils::tests::init_tracing, Path};

    pub(crate) const PARAMS_8X8: RasterParams = RasterParams {
        subpixel_lg_x: 3,
        subpixel_lg_y: 3,
        tile_lg: 3,
    };

    /// Rasterize path and collect coverage of the whole bounding box
    pub(crate) fn rasterize(
        path: &Path,
        rule: FillRule,
        params: RasterParams,
        bounds: BBox,
    ) -> Option<(BBox, Vec<u8>)> {
        let mut rasterizer = Rasterizer::new(RendererContext::new(params), bounds, rule);
        path.emit(&mut rasterizer);
        let mut tiles = rasterizer.end_rendering()?;
        let bbox = tiles.bbox();
        let (width, height) = (bbox.width() as usize, bbox.height() as usize);
        let tile = tiles.tile_width();
        let mut mask = vec![0u8; width * height];
        let mut buffer = vec![0u8; tile * tiles.tile_height()];
        while !tiles.is_done() {
            tiles.fill_alpha(&mut buffer, 0, tile);
            let x0 = (tiles.tile_x() - bbox.x0) as usize;
            let y0 = (tiles.tile_y() - bbox.y0) as usize;
            for row in 0..tiles.tile_height() {
                for col in 0..tile {
                    let (x, y) = (x0 + col, y0 + row);
                    if x < width && y < height {
                        mask[y * width + x] = buffer[row * tile + col];
                    }
                }
            }
            tiles.advance();
        }
        tiles.dispose();
        Some((bbox, mask))
    }

    fn area(mask: &[u8]) -> f64 {
        mask.iter().map(|a| *a as f64 / 255.0).sum()
    }

    #[test]
    fn test_square_no_subpixels() {
        init_tracing();
        let params = RasterParams {
            subpixel_lg_x: 0,
            subpixel_lg_y: 0,
            tile_lg: 3,
        };
        let path = Path::builder().move_to((0.0, 0.0)).rect(10.0, 10.0).build();
        let (bbox, mask) =
            rasterize(&path, FillRule::NonZero, params, BBox::from_size(16, 16)).unwrap();
        assert_eq!(bbox, BBox::new(0, 0, 10, 10));
        assert!(mask.iter().all(|a| *a == 255));

        // offset square, everything outside is transparent
        let path = Path::builder().move_to((3.0, 2.0)).rect(10.0, 10.0).build();
        let mut rasterizer =
            Rasterizer::new(RendererContext::new(params), BBox::from_size(16, 16), FillRule::NonZero);
        path.emit(&mut rasterizer);
        let mut tiles = rasterizer.end_rendering().unwrap();
        assert_eq!(tiles.bbox(), BBox::new(3, 2, 13, 12));
        let mut buffer = vec![0xAAu8; 64];
        let mut count = 0;
        while !tiles.is_done() {
            tiles.fill_alpha(&mut buffer, 0, 8);
            for row in 0..8 {
                for col in 0..8 {
                    let x = tiles.tile_x() + col;
                    let y = tiles.tile_y() + row;
                    let inside = (3..13).contains(&x) && (2..12).contains(&y);
                    assert_eq!(buffer[(row * 8 + col) as usize], if inside { 255 } else { 0 });
                }
            }
            count += 1;
            tiles.advance();
        }
        assert_eq!(count, 4);
    }

    #[test]
    fn test_coverage_conservation() {
        let triangle = Path::builder()
            .move_to((2.0, 2.0))
            .line_to((50.0, 10.0))
            .line_to((20.0, 40.0))
            .close()
            .build();
        let (_, mask) = rasterize(&triangle, FillRule::NonZero, PARAMS_8X8, BBox::from_size(64, 64)).unwrap();
        crate::assert_approx_eq!(area(&mask), 840.0, 8.4);

        let circle = Path::builder().move_to((32.0, 32.0)).circle(20.0).build();
        let (bbox, mask) = rasterize(&circle, FillRule::EvenOdd, PARAMS_8X8, BBox::from_size(64, 64)).unwrap();
        assert_eq!(bbox, BBox::new(12, 12, 52, 52));
        let expected = std::f64::consts::PI * 400.0;
        crate::assert_approx_eq!(area(&mask), expected, expected * 0.01);
    }

    #[test]
    fn test_clipping() {
        // square partially outside of bounds on all sides
        let path = Path::builder().move_to((-5.0, -5.0)).rect(30.0, 30.0).build();
        let (bbox, mask) = rasterize(&path, FillRule::NonZero, PARAMS_8X8, BBox::new(2, 3, 12, 9)).unwrap();
        assert_eq!(bbox, BBox::new(2, 3, 12, 9));
        assert!(mask.iter().all(|a| *a == 255));

        // completely outside
        let path = Path::builder().move_to((20.0, 20.0)).rect(5.0, 5.0).build();
        assert!(rasterize(&path, FillRule::NonZero, PARAMS_8X8, BBox::from_size(16, 16)).is_none());
    }

    #[test]
    fn test_winding() {
        let squares = |reverse: bool| {
            let mut builder = Path::builder();
            builder.move_to((0.0, 0.0)).rect(8.0, 8.0);
            if reverse {
                builder
                    .move_to((4.0, 0.0))
                    .line_to((4.0, 8.0))
                    .line_to((12.0, 8.0))
                    .line_to((12.0, 0.0))
                    .close();
            } else {
                builder.move_to((4.0, 0.0)).rect(8.0, 8.0);
            }
            builder.build()
        };
        let bounds = BBox::from_size(16, 16);
        let overlap = |mask: &[u8]| mask[3 * 12 + 6];
        let single = |mask: &[u8]| (mask[3 * 12 + 1], mask[3 * 12 + 10]);

        let (_, mask) = rasterize(&squares(false), FillRule::NonZero, PARAMS_8X8, bounds).unwrap();
        assert_eq!(overlap(&mask), 255);
        assert_eq!(single(&mask), (255, 255));

        let (_, mask) = rasterize(&squares(true), FillRule::NonZero, PARAMS_8X8, bounds).unwrap();
        assert_eq!(overlap(&mask), 0);
        assert_eq!(single(&mask), (255, 255));

        for reverse in [false, true] {
            let (_, mask) = rasterize(&squares(reverse), FillRule::EvenOdd, PARAMS_8X8, bounds).unwrap();
            assert_eq!(overlap(&mask), 0);
            assert_eq!(single(&mask), (255, 255));
        }
    }

    #[test]
    fn test_diagonal_band_symmetry() {
        let path = Path::builder()
            .move_to((0.0, 0.0))
            .line_to((2.3, 0.0))
            .line_to((8.0, 5.7))
            .line_to((8.0, 8.0))
            .line_to((5.7, 8.0))
            .line_to((0.0, 2.3))
            .close()
            .build();
        let (bbox, mask) = rasterize(&path, FillRule::NonZero, PARAMS_8X8, BBox::from_size(8, 8)).unwrap();
        assert_eq!(bbox, BBox::new(0, 0, 8, 8));
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(mask[y * 8 + x], mask[x * 8 + y], "x={} y={}", x, y);
            }
        }
        assert_eq!(mask[4 * 8 + 4], 255);
        assert_eq!(mask[7], 0);
        assert_eq!(mask[7 * 8], 0);
        assert!(mask[2] > 0 && mask[2] < 255);
    }

    #[test]
    fn test_empty_path() {
        let mut rasterizer =
            Rasterizer::new(RendererContext::new(PARAMS_8X8), BBox::from_size(16, 16), FillRule::NonZero);
        rasterizer.move_to(Point::new(1.0, 1.0));
        rasterizer.path_done();
        assert!(!rasterizer.is_poisoned());
        assert!(rasterizer.end_rendering().is_none());

        // zero area and horizontal geometry
        let path = Path::builder()
            .move_to((1.0, 1.0))
            .line_to((10.0, 1.0))
            .move_to((3.0, 3.0))
            .line_to((3.0, 9.0))
            .build();
        assert!(rasterize(&path, FillRule::NonZero, PARAMS_8X8, BBox::from_size(16, 16)).is_none());
    }

    #[test]
    fn test_huge_coordinates() {
        let path = Path::builder()
            .move_to((-1e30, -1e30))
            .line_to((1e30, -1e30))
            .line_to((1e30, 1e30))
            .line_to((-1e30, 1e30))
            .close()
            .build();
        let (bbox, mask) = rasterize(&path, FillRule::NonZero, PARAMS_8X8, BBox::from_size(20, 10)).unwrap();
        assert_eq!(bbox, BBox::from_size(20, 10));
        assert!(mask.iter().all(|a| *a == 255));
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "path protocol violation"))]
    fn test_protocol_violation() {
        let mut rasterizer =
            Rasterizer::new(RendererContext::new(PARAMS_8X8), BBox::from_size(16, 16), FillRule::NonZero);
        rasterizer.line_to(Point::new(1.0, 1.0));
        assert!(rasterizer.is_poisoned());
        rasterizer.move_to(Point::new(0.0, 0.0));
        rasterizer.line_to(Point::new(10.0, 0.0));
        rasterizer.line_to(Point::new(10.0, 10.0));
        rasterizer.path_done();
        assert!(rasterizer.end_rendering().is_none());
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "path protocol violation"))]
    fn test_close_before_move() {
        let mut rasterizer =
            Rasterizer::new(RendererContext::new(PARAMS_8X8), BBox::from_size(16, 16), FillRule::NonZero);
        rasterizer.close_path();
        assert!(rasterizer.is_poisoned());
        rasterizer.move_to(Point::new(0.0, 0.0));
        rasterizer.line_to(Point::new(10.0, 0.0));
        rasterizer.line_to(Point::new(10.0, 10.0));
        rasterizer.path_done();
        assert!(rasterizer.end_rendering().is_none());
    }
}
