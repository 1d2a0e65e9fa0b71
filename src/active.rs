//! Active edges.
//!
//! An [`Active`] is an edge bound currently crossed by the sweep line. The
//! engine threads actives into two intrusive doubly-linked lists (the AEL,
//! ordered left-to-right at the sweep, and the transient SEL used for
//! intersection detection); the links are arena indices rather than
//! pointers.

use ordered_float::NotNan;

use crate::geom::{round, Point};
use crate::outrec::OutRecIdx;
use crate::vertex::VertexIdx;

/// An index into the engine's arena of active edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ActiveIdx(pub(crate) usize);

/// Slope sentinel for horizontal edges. Horizontals sort before every real
/// slope, which the local-minima bound ordering relies on.
pub(crate) fn horizontal() -> NotNan<f64> {
    // unwrap: -MAX is not a NaN
    NotNan::new(-f64::MAX).unwrap()
}

#[derive(Clone, Debug)]
pub(crate) struct Active {
    pub(crate) bot: Point,
    /// Position at the current sweep y; updated at every new scanline.
    pub(crate) curr: Point,
    pub(crate) top: Point,
    /// x-per-unit-y slope, or [`horizontal`] when the edge has no height.
    pub(crate) dx: NotNan<f64>,
    /// +1 on the ascending bound of a minimum, -1 on the descending bound.
    pub(crate) wind_dx: i32,
    pub(crate) wind_cnt: i32,
    /// Winding count with respect to the opposite polytype.
    pub(crate) wind_cnt2: i32,
    pub(crate) outrec: Option<OutRecIdx>,
    pub(crate) prev_in_ael: Option<ActiveIdx>,
    pub(crate) next_in_ael: Option<ActiveIdx>,
    pub(crate) prev_in_sel: Option<ActiveIdx>,
    pub(crate) next_in_sel: Option<ActiveIdx>,
    /// Right-hand group head during the bottom-up SEL merge sort.
    pub(crate) merge_jump: Option<ActiveIdx>,
    pub(crate) vertex_top: VertexIdx,
    /// Index of the local minimum this bound emanates from.
    pub(crate) local_min: usize,
}

impl Active {
    pub(crate) fn new(bot: Point, top: Point, vertex_top: VertexIdx, wind_dx: i32, local_min: usize) -> Active {
        let mut e = Active {
            bot,
            curr: bot,
            top,
            dx: horizontal(),
            wind_dx,
            wind_cnt: 0,
            wind_cnt2: 0,
            outrec: None,
            prev_in_ael: None,
            next_in_ael: None,
            prev_in_sel: None,
            next_in_sel: None,
            merge_jump: None,
            vertex_top,
            local_min,
        };
        e.set_dx();
        e
    }

    pub(crate) fn set_dx(&mut self) {
        let dy = self.top.y - self.bot.y;
        self.dx = if dy == 0 {
            horizontal()
        } else {
            // unwrap: a finite quotient with a non-zero denominator
            NotNan::new((self.top.x - self.bot.x) as f64 / dy as f64).unwrap()
        };
    }

    pub(crate) fn is_horizontal(&self) -> bool {
        self.dx == horizontal()
    }

    /// The edge's x at height `y`, rounding along the slope.
    pub(crate) fn top_x(&self, y: i64) -> i64 {
        if y == self.top.y {
            self.top.x
        } else {
            self.bot.x + round(self.dx.into_inner() * (y - self.bot.y) as f64)
        }
    }
}

/// Projects both edges to the higher of their two tops and returns how far
/// `e2` sits to the right of `e1` there. Used to break x ties in the AEL.
pub(crate) fn top_delta_x(e1: &Active, e2: &Active) -> i64 {
    if e1.top.y > e2.top.y {
        e2.top_x(e1.top.y) - e1.top.x
    } else {
        e2.top.x - e1.top_x(e2.top.y)
    }
}

/// AEL insertion ordering: should `e2` be placed before (left of) `e1`?
///
/// With `prefer_left`, an exact tie in both x and projected x puts the new
/// edge first; this keeps insertion at local minima deterministic.
pub(crate) fn e2_inserts_before_e1(e1: &Active, e2: &Active, prefer_left: bool) -> bool {
    if e2.curr.x == e1.curr.x {
        if prefer_left {
            top_delta_x(e1, e2) <= 0
        } else {
            top_delta_x(e1, e2) < 0
        }
    } else {
        e2.curr.x < e1.curr.x
    }
}

/// The intersection of two (extended) edges, rounded to integer
/// coordinates. When both slopes are finite the projection goes through the
/// more vertical edge, which keeps the rounding error smaller.
pub(crate) fn intersect_point(e1: &Active, e2: &Active) -> Point {
    if e1.dx == e2.dx {
        return Point::new(e1.top_x(e1.curr.y), e1.curr.y);
    }

    if e1.dx.into_inner() == 0.0 {
        if e2.is_horizontal() {
            return Point::new(e1.bot.x, e2.bot.y);
        }
        let b2 = e2.bot.y as f64 - e2.bot.x as f64 / e2.dx.into_inner();
        return Point::new(e1.bot.x, round(e1.bot.x as f64 / e2.dx.into_inner() + b2));
    }
    if e2.dx.into_inner() == 0.0 {
        if e1.is_horizontal() {
            return Point::new(e2.bot.x, e1.bot.y);
        }
        let b1 = e1.bot.y as f64 - e1.bot.x as f64 / e1.dx.into_inner();
        return Point::new(e2.bot.x, round(e2.bot.x as f64 / e1.dx.into_inner() + b1));
    }

    let b1 = e1.bot.x as f64 - e1.bot.y as f64 * e1.dx.into_inner();
    let b2 = e2.bot.x as f64 - e2.bot.y as f64 * e2.dx.into_inner();
    let q = (b2 - b1) / (e1.dx.into_inner() - e2.dx.into_inner());
    if e1.dx.into_inner().abs() < e2.dx.into_inner().abs() {
        Point::new(round(e1.dx.into_inner() * q + b1), round(q))
    } else {
        Point::new(round(e2.dx.into_inner() * q + b2), round(q))
    }
}
