//! Path input protocol
//!
//! Geometry enters the rasterizer through [`PathConsumer`], the same protocol
//! is used by the stroker/dasher collaborators of the host. [`Path`] is a
//! recorded sequence of commands that can be replayed into any consumer, and
//! [`TransformFilter`] applies an affine transformation on the way.
use crate::{Point, Scalar, Transform, EPSILON};
use std::fmt;

/// Rule used to decide whether a point is inside of the path
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FillRule {
    /// Inside when sum of signed crossings is not zero
    #[default]
    NonZero,
    /// Inside when number of crossings is odd
    EvenOdd,
}

/// Consumer of the path geometry
///
/// Expected call order is `move_to` followed by any number of segments and
/// `close_path`, repeated, and terminated by a single `path_done`.
pub trait PathConsumer {
    /// Start new sub-path at point `p`
    fn move_to(&mut self, p: Point);

    /// Line from the current point to `p`
    fn line_to(&mut self, p: Point);

    /// Quadratic bezier curve with control point `p1` ending at `p2`
    fn quad_to(&mut self, p1: Point, p2: Point);

    /// Cubic bezier curve with control points `p1`, `p2` ending at `p3`
    fn curve_to(&mut self, p1: Point, p2: Point, p3: Point);

    /// Close current sub-path with a line to its starting point
    fn close_path(&mut self);

    /// No more geometry will follow
    fn path_done(&mut self);
}

impl<C: PathConsumer + ?Sized> PathConsumer for &mut C {
    fn move_to(&mut self, p: Point) {
        (**self).move_to(p)
    }

    fn line_to(&mut self, p: Point) {
        (**self).line_to(p)
    }

    fn quad_to(&mut self, p1: Point, p2: Point) {
        (**self).quad_to(p1, p2)
    }

    fn curve_to(&mut self, p1: Point, p2: Point, p3: Point) {
        (**self).curve_to(p1, p2, p3)
    }

    fn close_path(&mut self) {
        (**self).close_path()
    }

    fn path_done(&mut self) {
        (**self).path_done()
    }
}

/// Single recorded path command
#[derive(Clone, Copy, PartialEq)]
pub enum PathCmd {
    MoveTo(Point),
    LineTo(Point),
    QuadTo(Point, Point),
    CurveTo(Point, Point, Point),
    Close,
}

impl fmt::Debug for PathCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MoveTo(p) => write!(f, "M{:?}", p),
            Self::LineTo(p) => write!(f, "L{:?}", p),
            Self::QuadTo(p1, p2) => write!(f, "Q{:?} {:?}", p1, p2),
            Self::CurveTo(p1, p2, p3) => write!(f, "C{:?} {:?} {:?}", p1, p2, p3),
            Self::Close => write!(f, "Z"),
        }
    }
}

/// Recorded sequence of path commands
#[derive(Clone, PartialEq, Default)]
pub struct Path {
    cmds: Vec<PathCmd>,
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cmds.is_empty() {
            return write!(f, "Empty");
        }
        let mut first = true;
        for cmd in self.cmds.iter() {
            if !first {
                write!(f, " ")?;
            }
            first = false;
            cmd.fmt(f)?;
        }
        Ok(())
    }
}

impl Path {
    pub fn new(cmds: Vec<PathCmd>) -> Self {
        Self { cmds }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Convenience method to create `PathBuilder`
    pub fn builder() -> PathBuilder {
        PathBuilder::new()
    }

    pub fn cmds(&self) -> &[PathCmd] {
        &self.cmds
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    /// Replay path into the consumer, terminating it with `path_done`
    pub fn emit(&self, mut consumer: impl PathConsumer) {
        for cmd in self.cmds.iter() {
            match *cmd {
                PathCmd::MoveTo(p) => consumer.move_to(p),
                PathCmd::LineTo(p) => consumer.line_to(p),
                PathCmd::QuadTo(p1, p2) => consumer.quad_to(p1, p2),
                PathCmd::CurveTo(p1, p2, p3) => consumer.curve_to(p1, p2, p3),
                PathCmd::Close => consumer.close_path(),
            }
        }
        consumer.path_done();
    }

    /// Replay path into the consumer with transformation applied
    pub fn emit_transformed(&self, tr: Transform, consumer: impl PathConsumer) {
        if tr.is_identity() {
            self.emit(consumer)
        } else {
            self.emit(TransformFilter::new(tr, consumer))
        }
    }
}

/// Path builder similar to Canvas/Cairo interface.
#[derive(Clone, Default)]
pub struct PathBuilder {
    position: Point,
    start: Point,
    cmds: Vec<PathCmd>,
}

impl PathBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build path
    pub fn build(&mut self) -> Path {
        let PathBuilder { cmds, .. } = std::mem::take(self);
        Path::new(cmds)
    }

    /// Move current position, starting new subpath
    pub fn move_to(&mut self, p: impl Into<Point>) -> &mut Self {
        let p = p.into();
        self.position = p;
        self.start = p;
        self.cmds.push(PathCmd::MoveTo(p));
        self
    }

    /// Close current subpath
    pub fn close(&mut self) -> &mut Self {
        self.position = self.start;
        self.cmds.push(PathCmd::Close);
        self
    }

    /// Add line from the current position to the specified point
    pub fn line_to(&mut self, p: impl Into<Point>) -> &mut Self {
        let p = p.into();
        if !self.position.is_close_to(p) {
            self.position = p;
            self.cmds.push(PathCmd::LineTo(p));
        }
        self
    }

    /// Add quadratic bezier curve
    pub fn quad_to(&mut self, p1: impl Into<Point>, p2: impl Into<Point>) -> &mut Self {
        let p2 = p2.into();
        self.position = p2;
        self.cmds.push(PathCmd::QuadTo(p1.into(), p2));
        self
    }

    /// Add cubic beizer curve
    pub fn cubic_to(
        &mut self,
        p1: impl Into<Point>,
        p2: impl Into<Point>,
        p3: impl Into<Point>,
    ) -> &mut Self {
        let p3 = p3.into();
        self.position = p3;
        self.cmds.push(PathCmd::CurveTo(p1.into(), p2.into(), p3));
        self
    }

    /// Add axis aligned rectangle with current position being low-x and low-y coordinate
    pub fn rect(&mut self, width: Scalar, height: Scalar) -> &mut Self {
        let Point([x, y]) = self.position;
        self.move_to((x, y))
            .line_to((x + width, y))
            .line_to((x + width, y + height))
            .line_to((x, y + height))
            .close()
    }

    /// Add circle with the center at current position and provided radius.
    ///
    /// Current position is not changed after invocation.
    pub fn circle(&mut self, radius: Scalar) -> &mut Self {
        // (4/3)*tan(pi/8) = 4*(sqrt(2)-1)/3 = 0.5522847498307935
        let offset = 0.5522847498307935 * radius;
        let x_offset = Point::new(offset, 0.0);
        let y_offset = Point::new(0.0, offset);
        let center = self.position();
        let p0 = center - Point::new(radius, 0.0);
        let p1 = center - Point::new(0.0, radius);
        let p2 = center + Point::new(radius, 0.0);
        let p3 = center + Point::new(0.0, radius);

        self.move_to(p0)
            .cubic_to(p0 - y_offset, p1 - x_offset, p1)
            .cubic_to(p1 + x_offset, p2 - y_offset, p2)
            .cubic_to(p2 + y_offset, p3 + x_offset, p3)
            .cubic_to(p3 - x_offset, p0 + y_offset, p0)
            .close();
        self.position = center;
        self
    }

    /// Current possition of the builder
    pub fn position(&self) -> Point {
        self.position
    }
}

/// Consumer adapter that transforms all points before forwarding them
///
/// Pure scale transformations (no translation and shear) take a cheaper path
/// that only multiplies coordinates.
pub struct TransformFilter<C> {
    tr: Transform,
    kind: FilterKind,
    inner: C,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterKind {
    Identity,
    Scale,
    Delta,
    Affine,
}

impl<C: PathConsumer> TransformFilter<C> {
    pub fn new(tr: Transform, inner: C) -> Self {
        let kind = if tr.is_identity() {
            FilterKind::Identity
        } else if tr.is_delta() && tr.is_axis_aligned() {
            FilterKind::Scale
        } else if tr.is_delta() {
            FilterKind::Delta
        } else {
            FilterKind::Affine
        };
        Self { tr, kind, inner }
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    #[inline]
    fn map(&self, p: Point) -> Point {
        match self.kind {
            FilterKind::Identity => p,
            FilterKind::Scale => {
                let [sx, _, _, _, sy, _] = self.tr.to_array();
                Point::new(p.x() * sx, p.y() * sy)
            }
            FilterKind::Delta => self.tr.apply_delta(p),
            FilterKind::Affine => self.tr.apply(p),
        }
    }
}

impl<C: PathConsumer> PathConsumer for TransformFilter<C> {
    fn move_to(&mut self, p: Point) {
        let p = self.map(p);
        self.inner.move_to(p)
    }

    fn line_to(&mut self, p: Point) {
        let p = self.map(p);
        self.inner.line_to(p)
    }

    fn quad_to(&mut self, p1: Point, p2: Point) {
        let (p1, p2) = (self.map(p1), self.map(p2));
        self.inner.quad_to(p1, p2)
    }

    fn curve_to(&mut self, p1: Point, p2: Point, p3: Point) {
        let (p1, p2, p3) = (self.map(p1), self.map(p2), self.map(p3));
        self.inner.curve_to(p1, p2, p3)
    }

    fn close_path(&mut self) {
        self.inner.close_path()
    }

    fn path_done(&mut self) {
        self.inner.path_done()
    }
}

/// Whether the transformation collapses geometry to a line or a point
pub fn is_degenerate(tr: Transform) -> bool {
    tr.det().abs() <= EPSILON
}
