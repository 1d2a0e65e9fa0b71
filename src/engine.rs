//! The sweep-line clipping engine.
//!
//! The sweep advances bottom-up through the y-down axis: scanlines are
//! popped from a max-heap, local minima open pairs of edge bounds into the
//! active edge list (AEL), horizontals are processed as a layered pass, and
//! between consecutive scanlines a merge sort over the sorted edge list
//! (SEL) finds every crossing. Edges that currently contribute to the
//! output ("hot" edges) accumulate points into output records, which are
//! materialised once the sweep completes.

use std::collections::BinaryHeap;

use crate::active::{e2_inserts_before_e1, intersect_point, Active, ActiveIdx};
use crate::geom::{Point, Rect};
use crate::outrec::{OutPtStore, OutRec, OutRecFlags, OutRecIdx};
use crate::polytree::PolyTree;
use crate::vertex::{VertexFlags, VertexIdx, VertexStore};
use crate::{ClipType, Error, FillRule, PathType, Paths};

/// A scheduled edge crossing; lives only across one scanbeam step.
#[derive(Clone, Copy, Debug)]
struct IntersectNode {
    edge1: ActiveIdx,
    edge2: ActiveIdx,
    pt: Point,
}

/// A polygon clipping engine.
///
/// Feed it subject and clip paths with [`Clipper::add_path`], then run a
/// Boolean operation with one of the `execute` methods. The vertex rings
/// built from the inputs persist between executions, so the same inputs can
/// be clipped several times with different operations; [`Clipper::clear`]
/// discards them.
#[derive(Clone, Debug, Default)]
pub struct Clipper {
    vertices: VertexStore,
    minima_sorted: bool,
    /// Cursor into the sorted minima list.
    curr_loc_min: usize,

    actives: Vec<Active>,
    ael_first: Option<ActiveIdx>,
    /// Head of the SEL; reused as the pending-horizontals stack.
    sel_first: Option<ActiveIdx>,
    scanlines: BinaryHeap<i64>,
    outrecs: Vec<OutRec>,
    outpts: OutPtStore,
    intersects: Vec<IntersectNode>,

    cliptype: ClipType,
    fillrule: FillRule,
    has_open_paths: bool,
    locked: bool,
}

impl Clipper {
    /// Creates an empty engine.
    pub fn new() -> Clipper {
        Clipper::default()
    }

    /// Appends one path to the inputs.
    ///
    /// Open paths may only be subjects; an open clip path fails with
    /// [`Error::OpenClipPath`] without modifying the engine.
    pub fn add_path(
        &mut self,
        path: &[Point],
        polytype: PathType,
        is_open: bool,
    ) -> Result<(), Error> {
        if is_open {
            if polytype == PathType::Clip {
                return Err(Error::OpenClipPath);
            }
            self.has_open_paths = true;
        }
        self.minima_sorted = false;
        self.vertices.add_path(path, polytype, is_open);
        Ok(())
    }

    /// Appends several paths to the inputs; see [`Clipper::add_path`].
    pub fn add_paths(
        &mut self,
        paths: &[crate::Path],
        polytype: PathType,
        is_open: bool,
    ) -> Result<(), Error> {
        for path in paths {
            self.add_path(path, polytype, is_open)?;
        }
        Ok(())
    }

    /// Discards all inputs and per-run state.
    pub fn clear(&mut self) {
        self.cleanup();
        self.vertices.clear();
        self.curr_loc_min = 0;
        self.minima_sorted = false;
        self.has_open_paths = false;
    }

    /// The axis-aligned bounding box of every input vertex, or a zero rect
    /// when no paths have been added.
    pub fn bounds(&self) -> Rect {
        let mut points = self.vertices.points();
        let Some(first) = points.next() else {
            return Rect::new(0, 0, 0, 0);
        };
        let mut r = Rect::new(first.x, first.y, first.x, first.y);
        for p in points {
            r.left = r.left.min(p.x);
            r.top = r.top.min(p.y);
            r.right = r.right.max(p.x);
            r.bottom = r.bottom.max(p.y);
        }
        r
    }

    /// Runs the Boolean operation and returns the closed result polygons.
    /// Open results are discarded; use [`Clipper::execute_open`] to keep
    /// them.
    pub fn execute(&mut self, cliptype: ClipType, fillrule: FillRule) -> Result<Paths, Error> {
        if self.locked {
            return Err(Error::Busy);
        }
        self.locked = true;
        let result = self.execute_internal(cliptype, fillrule).map(|()| {
            let mut closed = Paths::new();
            self.build_paths(&mut closed, None);
            closed
        });
        self.cleanup();
        self.locked = false;
        result
    }

    /// Runs the Boolean operation and returns `(closed, open)` results.
    pub fn execute_open(
        &mut self,
        cliptype: ClipType,
        fillrule: FillRule,
    ) -> Result<(Paths, Paths), Error> {
        if self.locked {
            return Err(Error::Busy);
        }
        self.locked = true;
        let result = self.execute_internal(cliptype, fillrule).map(|()| {
            let mut closed = Paths::new();
            let mut open = Paths::new();
            self.build_paths(&mut closed, Some(&mut open));
            (closed, open)
        });
        self.cleanup();
        self.locked = false;
        result
    }

    /// Runs the Boolean operation and returns the closed results nested by
    /// containment, together with any open results.
    pub fn execute_tree(
        &mut self,
        cliptype: ClipType,
        fillrule: FillRule,
    ) -> Result<(PolyTree, Paths), Error> {
        if self.locked {
            return Err(Error::Busy);
        }
        self.locked = true;
        let result = self.execute_internal(cliptype, fillrule);
        let out = result.map(|()| {
            let mut open = Paths::new();
            let tree = self.build_tree(&mut open);
            (tree, open)
        });
        self.cleanup();
        self.locked = false;
        out
    }

    fn execute_internal(&mut self, cliptype: ClipType, fillrule: FillRule) -> Result<(), Error> {
        self.cliptype = cliptype;
        self.fillrule = fillrule;
        self.reset();
        log::debug!(
            "{:?} of {} local minima with {:?} filling",
            cliptype,
            self.vertices.minima.len(),
            fillrule
        );
        let Some(mut y) = self.pop_scanline() else {
            return Ok(());
        };
        loop {
            self.insert_local_minima(y)?;
            while let Some(horz) = self.pop_horz() {
                self.process_horizontal(horz)?;
            }
            // y is now at the top of the scanbeam
            let Some(top_y) = self.pop_scanline() else {
                break;
            };
            self.process_intersections(top_y)?;
            self.sel_first = None; // SEL now doubles as the horizontals stack
            self.top_of_scanbeam(top_y)?;
            y = top_y;
        }
        Ok(())
    }

    /// Releases per-run scratch. Inputs (vertex rings, minima) survive.
    fn cleanup(&mut self) {
        self.actives.clear();
        self.ael_first = None;
        self.sel_first = None;
        self.scanlines.clear();
        self.outrecs.clear();
        self.outpts.clear();
        self.intersects.clear();
    }

    fn reset(&mut self) {
        if !self.minima_sorted {
            self.vertices.sort_minima();
            self.minima_sorted = true;
        }
        for i in 0..self.vertices.minima.len() {
            let y = self.vertices.minima_y(i);
            self.scanlines.push(y);
        }
        self.curr_loc_min = 0;
        self.ael_first = None;
        self.sel_first = None;
    }

    fn insert_scanline(&mut self, y: i64) {
        self.scanlines.push(y);
    }

    /// Pops the bottom-most pending scanline, swallowing duplicates.
    fn pop_scanline(&mut self) -> Option<i64> {
        let y = self.scanlines.pop()?;
        while self.scanlines.peek() == Some(&y) {
            self.scanlines.pop();
        }
        Some(y)
    }

    fn pop_local_minima(&mut self, y: i64) -> Option<usize> {
        if self.curr_loc_min >= self.vertices.minima.len() {
            return None;
        }
        if self.vertices.minima_y(self.curr_loc_min) != y {
            return None;
        }
        let i = self.curr_loc_min;
        self.curr_loc_min += 1;
        Some(i)
    }

    // ----- small edge accessors -------------------------------------------

    fn is_open(&self, e: ActiveIdx) -> bool {
        self.vertices.minima[self.actives[e.0].local_min].is_open
    }

    fn polytype(&self, e: ActiveIdx) -> PathType {
        self.vertices.minima[self.actives[e.0].local_min].polytype
    }

    fn is_same_polytype(&self, e1: ActiveIdx, e2: ActiveIdx) -> bool {
        self.polytype(e1) == self.polytype(e2)
    }

    fn is_hot(&self, e: ActiveIdx) -> bool {
        self.actives[e.0].outrec.is_some()
    }

    fn is_maxima(&self, e: ActiveIdx) -> bool {
        self.vertices[self.actives[e.0].vertex_top]
            .flags
            .contains(VertexFlags::LOCAL_MAX)
    }

    /// The next ring vertex along this bound's travel direction.
    fn next_vertex(&self, e: ActiveIdx) -> VertexIdx {
        let a = &self.actives[e.0];
        if a.wind_dx > 0 {
            self.vertices[a.vertex_top].next
        } else {
            self.vertices[a.vertex_top].prev
        }
    }

    // ----- winding --------------------------------------------------------

    fn is_contributing_closed(&self, e: ActiveIdx) -> bool {
        let a = &self.actives[e.0];
        match self.fillrule {
            FillRule::EvenOdd => {}
            FillRule::NonZero => {
                if a.wind_cnt.abs() != 1 {
                    return false;
                }
            }
            FillRule::Positive => {
                if a.wind_cnt != 1 {
                    return false;
                }
            }
            FillRule::Negative => {
                if a.wind_cnt != -1 {
                    return false;
                }
            }
        }
        match self.cliptype {
            ClipType::Intersection => match self.fillrule {
                FillRule::EvenOdd | FillRule::NonZero => a.wind_cnt2 != 0,
                FillRule::Positive => a.wind_cnt2 > 0,
                FillRule::Negative => a.wind_cnt2 < 0,
            },
            ClipType::Union => match self.fillrule {
                FillRule::EvenOdd | FillRule::NonZero => a.wind_cnt2 == 0,
                FillRule::Positive => a.wind_cnt2 <= 0,
                FillRule::Negative => a.wind_cnt2 >= 0,
            },
            ClipType::Difference => {
                let outside_clip = match self.fillrule {
                    FillRule::EvenOdd | FillRule::NonZero => a.wind_cnt2 == 0,
                    FillRule::Positive => a.wind_cnt2 <= 0,
                    FillRule::Negative => a.wind_cnt2 >= 0,
                };
                if self.polytype(e) == PathType::Subject {
                    outside_clip
                } else {
                    !outside_clip
                }
            }
            ClipType::Xor => true,
        }
    }

    fn is_contributing_open(&self, e: ActiveIdx) -> bool {
        let a = &self.actives[e.0];
        match self.cliptype {
            ClipType::Intersection => a.wind_cnt2 != 0,
            ClipType::Union => a.wind_cnt == 0 && a.wind_cnt2 == 0,
            ClipType::Difference => a.wind_cnt2 == 0,
            ClipType::Xor => (a.wind_cnt != 0) != (a.wind_cnt2 != 0),
        }
    }

    /// Computes both winding counts for a freshly inserted closed bound.
    ///
    /// Wind counts refer to polygon regions, not edges: an edge's count is
    /// the higher of the two region counts touching it, so adjacent region
    /// counts only ever differ by one.
    fn set_windings_closed(&mut self, e: ActiveIdx) {
        let pt = self.polytype(e);

        // nearest closed same-polytype neighbour, heading left
        let mut e2 = self.actives[e.0].prev_in_ael;
        while let Some(i) = e2 {
            if self.polytype(i) == pt && !self.is_open(i) {
                break;
            }
            e2 = self.actives[i.0].prev_in_ael;
        }

        let mut cursor;
        match e2 {
            None => {
                let wind_dx = self.actives[e.0].wind_dx;
                self.actives[e.0].wind_cnt = wind_dx;
                cursor = self.ael_first;
            }
            Some(prev) if self.fillrule == FillRule::EvenOdd => {
                let wind_dx = self.actives[e.0].wind_dx;
                let wc2 = self.actives[prev.0].wind_cnt2;
                self.actives[e.0].wind_cnt = wind_dx;
                self.actives[e.0].wind_cnt2 = wc2;
                cursor = self.actives[prev.0].next_in_ael;
            }
            Some(prev) => {
                let prev_cnt = self.actives[prev.0].wind_cnt;
                let prev_dx = self.actives[prev.0].wind_dx;
                let wind_dx = self.actives[e.0].wind_dx;
                let wind_cnt = if prev_cnt * prev_dx < 0 {
                    // opposite signs: the new edge is outside prev
                    if prev_cnt.abs() > 1 {
                        if prev_dx * wind_dx < 0 {
                            prev_cnt
                        } else {
                            prev_cnt + wind_dx
                        }
                    } else if self.is_open(e) {
                        1
                    } else {
                        wind_dx
                    }
                } else {
                    // same signs: the new edge is inside prev
                    if prev_dx * wind_dx < 0 {
                        prev_cnt
                    } else {
                        prev_cnt + wind_dx
                    }
                };
                let wc2 = self.actives[prev.0].wind_cnt2;
                self.actives[e.0].wind_cnt = wind_cnt;
                self.actives[e.0].wind_cnt2 = wc2;
                cursor = self.actives[prev.0].next_in_ael;
            }
        }

        // accumulate wind_cnt2 over opposite-polytype closed edges up to e
        let even_odd = self.fillrule == FillRule::EvenOdd;
        while let Some(i) = cursor {
            if i == e {
                break;
            }
            if self.polytype(i) != pt && !self.is_open(i) {
                if even_odd {
                    let w = self.actives[e.0].wind_cnt2;
                    self.actives[e.0].wind_cnt2 = if w == 0 { 1 } else { 0 };
                } else {
                    let wind_dx = self.actives[i.0].wind_dx;
                    self.actives[e.0].wind_cnt2 += wind_dx;
                }
            }
            cursor = self.actives[i.0].next_in_ael;
        }
    }

    /// Open paths have no winding of their own; both counts come from the
    /// closed edges to the left, grouped by polytype.
    fn set_windings_open(&mut self, e: ActiveIdx) {
        if self.fillrule == FillRule::EvenOdd {
            let mut cnt1 = 0;
            let mut cnt2 = 0;
            let mut cursor = self.ael_first;
            while let Some(i) = cursor {
                if i == e {
                    break;
                }
                if self.polytype(i) == PathType::Clip {
                    cnt2 += 1;
                } else if !self.is_open(i) {
                    cnt1 += 1;
                }
                cursor = self.actives[i.0].next_in_ael;
            }
            self.actives[e.0].wind_cnt = cnt1 & 1;
            self.actives[e.0].wind_cnt2 = cnt2 & 1;
        } else {
            let mut cursor = self.ael_first;
            while let Some(i) = cursor {
                if i == e {
                    break;
                }
                let wind_dx = self.actives[i.0].wind_dx;
                if self.polytype(i) == PathType::Clip {
                    self.actives[e.0].wind_cnt2 += wind_dx;
                } else if !self.is_open(i) {
                    self.actives[e.0].wind_cnt += wind_dx;
                }
                cursor = self.actives[i.0].next_in_ael;
            }
        }
    }

    // ----- AEL maintenance ------------------------------------------------

    fn insert_into_ael(&mut self, edge: ActiveIdx, start: Option<ActiveIdx>, mut prefer_left: bool) {
        match self.ael_first {
            None => {
                self.actives[edge.0].prev_in_ael = None;
                self.actives[edge.0].next_in_ael = None;
                self.ael_first = Some(edge);
            }
            Some(first)
                if start.is_none()
                    && e2_inserts_before_e1(
                        &self.actives[first.0],
                        &self.actives[edge.0],
                        prefer_left,
                    ) =>
            {
                self.actives[edge.0].prev_in_ael = None;
                self.actives[edge.0].next_in_ael = Some(first);
                self.actives[first.0].prev_in_ael = Some(edge);
                self.ael_first = Some(edge);
            }
            Some(first) => {
                let mut cursor = start.unwrap_or(first);
                while let Some(next) = self.actives[cursor.0].next_in_ael {
                    if e2_inserts_before_e1(
                        &self.actives[next.0],
                        &self.actives[edge.0],
                        prefer_left,
                    ) {
                        break;
                    }
                    cursor = next;
                    prefer_left = false; // an intervening edge lifts the restriction
                }
                let next = self.actives[cursor.0].next_in_ael;
                self.actives[edge.0].next_in_ael = next;
                if let Some(n) = next {
                    self.actives[n.0].prev_in_ael = Some(edge);
                }
                self.actives[edge.0].prev_in_ael = Some(cursor);
                self.actives[cursor.0].next_in_ael = Some(edge);
            }
        }
    }

    fn delete_from_ael(&mut self, e: ActiveIdx) {
        let prev = self.actives[e.0].prev_in_ael;
        let next = self.actives[e.0].next_in_ael;
        if prev.is_none() && next.is_none() && self.ael_first != Some(e) {
            return; // already unlinked
        }
        match prev {
            Some(p) => self.actives[p.0].next_in_ael = next,
            None => self.ael_first = next,
        }
        if let Some(n) = next {
            self.actives[n.0].prev_in_ael = prev;
        }
        self.actives[e.0].prev_in_ael = None;
        self.actives[e.0].next_in_ael = None;
    }

    fn swap_in_ael(&mut self, e1: ActiveIdx, e2: ActiveIdx) {
        // skip if either edge has already been unlinked
        if self.actives[e1.0].next_in_ael == self.actives[e1.0].prev_in_ael
            || self.actives[e2.0].next_in_ael == self.actives[e2.0].prev_in_ael
        {
            return;
        }

        if self.actives[e1.0].next_in_ael == Some(e2) {
            let next = self.actives[e2.0].next_in_ael;
            if let Some(n) = next {
                self.actives[n.0].prev_in_ael = Some(e1);
            }
            let prev = self.actives[e1.0].prev_in_ael;
            if let Some(p) = prev {
                self.actives[p.0].next_in_ael = Some(e2);
            }
            self.actives[e2.0].prev_in_ael = prev;
            self.actives[e2.0].next_in_ael = Some(e1);
            self.actives[e1.0].prev_in_ael = Some(e2);
            self.actives[e1.0].next_in_ael = next;
        } else if self.actives[e2.0].next_in_ael == Some(e1) {
            let next = self.actives[e1.0].next_in_ael;
            if let Some(n) = next {
                self.actives[n.0].prev_in_ael = Some(e2);
            }
            let prev = self.actives[e2.0].prev_in_ael;
            if let Some(p) = prev {
                self.actives[p.0].next_in_ael = Some(e1);
            }
            self.actives[e1.0].prev_in_ael = prev;
            self.actives[e1.0].next_in_ael = Some(e2);
            self.actives[e2.0].prev_in_ael = Some(e1);
            self.actives[e2.0].next_in_ael = next;
        } else {
            let next = self.actives[e1.0].next_in_ael;
            let prev = self.actives[e1.0].prev_in_ael;
            let next2 = self.actives[e2.0].next_in_ael;
            let prev2 = self.actives[e2.0].prev_in_ael;
            self.actives[e1.0].next_in_ael = next2;
            if let Some(n) = next2 {
                self.actives[n.0].prev_in_ael = Some(e1);
            }
            self.actives[e1.0].prev_in_ael = prev2;
            if let Some(p) = prev2 {
                self.actives[p.0].next_in_ael = Some(e1);
            }
            self.actives[e2.0].next_in_ael = next;
            if let Some(n) = next {
                self.actives[n.0].prev_in_ael = Some(e2);
            }
            self.actives[e2.0].prev_in_ael = prev;
            if let Some(p) = prev {
                self.actives[p.0].next_in_ael = Some(e2);
            }
        }

        if self.actives[e1.0].prev_in_ael.is_none() {
            self.ael_first = Some(e1);
        } else if self.actives[e2.0].prev_in_ael.is_none() {
            self.ael_first = Some(e2);
        }
    }

    fn swap_in_sel(&mut self, e1: ActiveIdx, e2: ActiveIdx) {
        if self.actives[e1.0].next_in_sel.is_none() && self.actives[e1.0].prev_in_sel.is_none() {
            return;
        }
        if self.actives[e2.0].next_in_sel.is_none() && self.actives[e2.0].prev_in_sel.is_none() {
            return;
        }

        if self.actives[e1.0].next_in_sel == Some(e2) {
            let next = self.actives[e2.0].next_in_sel;
            if let Some(n) = next {
                self.actives[n.0].prev_in_sel = Some(e1);
            }
            let prev = self.actives[e1.0].prev_in_sel;
            if let Some(p) = prev {
                self.actives[p.0].next_in_sel = Some(e2);
            }
            self.actives[e2.0].prev_in_sel = prev;
            self.actives[e2.0].next_in_sel = Some(e1);
            self.actives[e1.0].prev_in_sel = Some(e2);
            self.actives[e1.0].next_in_sel = next;
        } else if self.actives[e2.0].next_in_sel == Some(e1) {
            let next = self.actives[e1.0].next_in_sel;
            if let Some(n) = next {
                self.actives[n.0].prev_in_sel = Some(e2);
            }
            let prev = self.actives[e2.0].prev_in_sel;
            if let Some(p) = prev {
                self.actives[p.0].next_in_sel = Some(e1);
            }
            self.actives[e1.0].prev_in_sel = prev;
            self.actives[e1.0].next_in_sel = Some(e2);
            self.actives[e2.0].prev_in_sel = Some(e1);
            self.actives[e2.0].next_in_sel = next;
        } else {
            let next = self.actives[e1.0].next_in_sel;
            let prev = self.actives[e1.0].prev_in_sel;
            let next2 = self.actives[e2.0].next_in_sel;
            let prev2 = self.actives[e2.0].prev_in_sel;
            self.actives[e1.0].next_in_sel = next2;
            if let Some(n) = next2 {
                self.actives[n.0].prev_in_sel = Some(e1);
            }
            self.actives[e1.0].prev_in_sel = prev2;
            if let Some(p) = prev2 {
                self.actives[p.0].next_in_sel = Some(e1);
            }
            self.actives[e2.0].next_in_sel = next;
            if let Some(n) = next {
                self.actives[n.0].prev_in_sel = Some(e2);
            }
            self.actives[e2.0].prev_in_sel = prev;
            if let Some(p) = prev {
                self.actives[p.0].next_in_sel = Some(e2);
            }
        }

        if self.actives[e1.0].prev_in_sel.is_none() {
            self.sel_first = Some(e1);
        } else if self.actives[e2.0].prev_in_sel.is_none() {
            self.sel_first = Some(e2);
        }
    }

    fn copy_ael_to_sel(&mut self) {
        self.sel_first = self.ael_first;
        let mut e = self.ael_first;
        while let Some(i) = e {
            let prev = self.actives[i.0].prev_in_ael;
            let next = self.actives[i.0].next_in_ael;
            self.actives[i.0].prev_in_sel = prev;
            self.actives[i.0].next_in_sel = next;
            e = next;
        }
    }

    fn push_horz(&mut self, e: ActiveIdx) {
        self.actives[e.0].next_in_sel = self.sel_first;
        self.sel_first = Some(e);
    }

    fn pop_horz(&mut self) -> Option<ActiveIdx> {
        let e = self.sel_first?;
        self.sel_first = self.actives[e.0].next_in_sel;
        Some(e)
    }

    #[cfg(debug_assertions)]
    fn check_ael_links(&self) {
        let mut prev = None;
        let mut e = self.ael_first;
        while let Some(i) = e {
            debug_assert_eq!(self.actives[i.0].prev_in_ael, prev);
            prev = e;
            e = self.actives[i.0].next_in_ael;
        }
    }

    // ----- local minima ---------------------------------------------------

    fn new_active(
        &mut self,
        local_min: usize,
        bot_vertex: VertexIdx,
        vertex_top: VertexIdx,
        wind_dx: i32,
    ) -> ActiveIdx {
        let bot = self.vertices[bot_vertex].pt;
        let top = self.vertices[vertex_top].pt;
        let idx = ActiveIdx(self.actives.len());
        self.actives
            .push(Active::new(bot, top, vertex_top, wind_dx, local_min));
        idx
    }

    /// Opens the bound pair of every local minimum at `bot_y` into the AEL.
    fn insert_local_minima(&mut self, bot_y: i64) -> Result<(), Error> {
        while let Some(lm_idx) = self.pop_local_minima(bot_y) {
            let lm = self.vertices.minima[lm_idx];
            let vflags = self.vertices[lm.vertex].flags;

            // the descending bound runs along prev links, the ascending
            // bound along next links
            let left = if vflags.contains(VertexFlags::OPEN_START) {
                None
            } else {
                let vtop = self.vertices[lm.vertex].prev;
                Some(self.new_active(lm_idx, lm.vertex, vtop, -1))
            };
            let right = if vflags.contains(VertexFlags::OPEN_END) {
                None
            } else {
                let vtop = self.vertices[lm.vertex].next;
                Some(self.new_active(lm_idx, lm.vertex, vtop, 1))
            };

            let (left, right) = match (left, right) {
                (Some(l), Some(r)) => {
                    // swap so `left` really is the left-hand bound
                    let le = &self.actives[l.0];
                    let re = &self.actives[r.0];
                    let swap = if le.is_horizontal() {
                        le.top.x > le.bot.x
                    } else {
                        le.dx < re.dx
                    };
                    if swap {
                        (r, Some(l))
                    } else {
                        (l, Some(r))
                    }
                }
                (None, Some(r)) => (r, None),
                (Some(l), None) => (l, None),
                (None, None) => continue,
            };

            self.insert_into_ael(left, None, false);
            let contributing = if self.is_open(left) {
                self.set_windings_open(left);
                self.is_contributing_open(left)
            } else {
                self.set_windings_closed(left);
                self.is_contributing_closed(left)
            };

            let bot = self.actives[left.0].bot;
            if let Some(right) = right {
                let wind_cnt = self.actives[left.0].wind_cnt;
                let wind_cnt2 = self.actives[left.0].wind_cnt2;
                self.actives[right.0].wind_cnt = wind_cnt;
                self.actives[right.0].wind_cnt2 = wind_cnt2;
                self.insert_into_ael(right, Some(left), false);

                if contributing {
                    self.add_local_min_poly(left, right, bot);
                }
                if self.actives[right.0].is_horizontal() {
                    self.push_horz(right);
                } else {
                    let y = self.actives[right.0].top.y;
                    self.insert_scanline(y);
                }
            } else if contributing {
                self.start_open_path(left, bot);
            }

            if self.actives[left.0].is_horizontal() {
                self.push_horz(left);
            } else {
                let y = self.actives[left.0].top.y;
                self.insert_scanline(y);
            }

            if let Some(right) = right {
                // edges landed between the two bounds must cross the right
                // bound; winding assumes `right` stays right of them above
                // the crossing
                let mut e = self.actives[left.0].next_in_ael;
                while let Some(i) = e {
                    if i == right {
                        break;
                    }
                    let pt = self.actives[right.0].bot;
                    self.intersect_edges(right, i, pt)?;
                    e = self.actives[i.0].next_in_ael;
                }
            }
        }
        Ok(())
    }

    // ----- output records -------------------------------------------------

    fn is_start_side(&self, e: ActiveIdx) -> bool {
        match self.actives[e.0].outrec {
            Some(or) => self.outrecs[or.0].start_edge == Some(e),
            None => false,
        }
    }

    /// Looks for the output record that will own a polygon started at `e`:
    /// the nearest hot closed neighbour decides, depending on which of its
    /// sides faces us.
    fn get_owner(&self, e: ActiveIdx) -> Option<OutRecIdx> {
        let a = &self.actives[e.0];
        if a.is_horizontal() && a.top.x < a.bot.x {
            let mut cur = a.next_in_ael;
            while let Some(i) = cur {
                if let Some(or) = self.actives[i.0].outrec {
                    if !self.is_open(i) {
                        let rec = &self.outrecs[or.0];
                        let outer = rec.flags.contains(OutRecFlags::OUTER);
                        return if outer == (rec.start_edge == Some(i)) {
                            rec.owner
                        } else {
                            Some(or)
                        };
                    }
                }
                cur = self.actives[i.0].next_in_ael;
            }
            None
        } else {
            let mut cur = a.prev_in_ael;
            while let Some(i) = cur {
                if let Some(or) = self.actives[i.0].outrec {
                    if !self.is_open(i) {
                        let rec = &self.outrecs[or.0];
                        let outer = rec.flags.contains(OutRecFlags::OUTER);
                        return if outer == (rec.end_edge == Some(i)) {
                            rec.owner
                        } else {
                            Some(or)
                        };
                    }
                }
                cur = self.actives[i.0].prev_in_ael;
            }
            None
        }
    }

    fn add_local_min_poly(&mut self, e1: ActiveIdx, e2: ActiveIdx, pt: Point) {
        let owner = self.get_owner(e1);
        let owner_is_outer = owner
            .map(|o| self.outrecs[o.0].flags.contains(OutRecFlags::OUTER))
            .unwrap_or(false);
        let mut flags = if owner_is_outer {
            OutRecFlags::empty()
        } else {
            OutRecFlags::OUTER
        };
        if self.is_open(e1) {
            flags |= OutRecFlags::OPEN;
        }
        let is_outer = flags.contains(OutRecFlags::OUTER);

        // orientation: pick which edge grows the start side so the ring
        // winds the way its nesting demands
        let e1a = &self.actives[e1.0];
        let e2a = &self.actives[e2.0];
        let clockwise = if e1a.is_horizontal() {
            if e2a.is_horizontal() {
                is_outer == (e1a.bot.x > e2a.bot.x)
            } else {
                is_outer == (e1a.top.x < e1a.bot.x)
            }
        } else if e2a.is_horizontal() {
            is_outer == (e2a.top.x > e2a.bot.x)
        } else {
            is_outer == (e1a.dx >= e2a.dx)
        };

        let idx = OutRecIdx(self.outrecs.len());
        let op = self.outpts.new_ring(pt);
        let (start, end) = if clockwise { (e1, e2) } else { (e2, e1) };
        self.outrecs.push(OutRec {
            owner,
            pts: Some(op),
            start_edge: Some(start),
            end_edge: Some(end),
            flags,
            polypath: None,
        });
        self.actives[e1.0].outrec = Some(idx);
        self.actives[e2.0].outrec = Some(idx);
    }

    fn add_local_max_poly(&mut self, e1: ActiveIdx, e2: ActiveIdx, pt: Point) -> Result<(), Error> {
        let (Some(or1), Some(or2)) = (self.actives[e1.0].outrec, self.actives[e2.0].outrec) else {
            return Err(Error::Clipping("local maximum on a cold edge"));
        };
        self.add_out_pt(e1, pt);
        if or1 == or2 {
            self.end_outrec(or1);
        } else if or1 < or2 {
            // keep the older record so its winding orientation survives
            self.join_outrec_paths(e1, e2)?;
        } else {
            self.join_outrec_paths(e2, e1)?;
        }
        Ok(())
    }

    fn end_outrec(&mut self, or: OutRecIdx) {
        let (start, end) = {
            let rec = &mut self.outrecs[or.0];
            (rec.start_edge.take(), rec.end_edge.take())
        };
        if let Some(s) = start {
            self.actives[s.0].outrec = None;
        }
        if let Some(e) = end {
            self.actives[e.0].outrec = None;
        }
    }

    /// Concatenates `e2`'s ring onto `e1`'s (reversing where the meeting
    /// sides demand it) and abandons `e2`'s record.
    fn join_outrec_paths(&mut self, e1: ActiveIdx, e2: ActiveIdx) -> Result<(), Error> {
        let (Some(or1), Some(or2)) = (self.actives[e1.0].outrec, self.actives[e2.0].outrec) else {
            return Err(Error::Clipping("joining a cold edge"));
        };
        if self.outrecs[or1.0].owner == Some(or2) {
            return Err(Error::Clipping("cyclic ownership while joining paths"));
        }
        let (Some(p1_start), Some(p2_start)) = (self.outrecs[or1.0].pts, self.outrecs[or2.0].pts)
        else {
            return Err(Error::Clipping("joining an empty output ring"));
        };
        let p1_end = self.outpts[p1_start].prev;
        let p2_end = self.outpts[p2_start].prev;

        if self.outrecs[or1.0].start_edge == Some(e1) {
            if self.outrecs[or2.0].start_edge == Some(e2) {
                self.outpts.reverse(p2_start);
                self.outpts.link(p2_start, p1_start);
                self.outpts.link(p1_end, p2_end);
                self.outrecs[or1.0].pts = Some(p2_end);
                let new_start = self.outrecs[or2.0].end_edge;
                self.outrecs[or1.0].start_edge = new_start;
            } else {
                self.outpts.link(p2_end, p1_start);
                self.outpts.link(p1_end, p2_start);
                self.outrecs[or1.0].pts = Some(p2_start);
                let new_start = self.outrecs[or2.0].start_edge;
                self.outrecs[or1.0].start_edge = new_start;
            }
            if let Some(s) = self.outrecs[or1.0].start_edge {
                self.actives[s.0].outrec = Some(or1);
            }
        } else {
            if self.outrecs[or2.0].start_edge == Some(e2) {
                self.outpts.link(p1_end, p2_start);
                self.outpts.link(p2_end, p1_start);
                let new_end = self.outrecs[or2.0].end_edge;
                self.outrecs[or1.0].end_edge = new_end;
            } else {
                self.outpts.reverse(p2_start);
                self.outpts.link(p1_end, p2_end);
                self.outpts.link(p2_start, p1_start);
                let new_end = self.outrecs[or2.0].start_edge;
                self.outrecs[or1.0].end_edge = new_end;
            }
            if let Some(en) = self.outrecs[or1.0].end_edge {
                self.actives[en.0].outrec = Some(or1);
            }
        }

        // or2 is abandoned; anything that owned through it falls back to or1
        self.outrecs[or2.0].start_edge = None;
        self.outrecs[or2.0].end_edge = None;
        self.outrecs[or2.0].pts = None;
        self.outrecs[or2.0].owner = Some(or1);

        // both edges are maxima and about to leave the AEL
        self.actives[e1.0].outrec = None;
        self.actives[e2.0].outrec = None;
        Ok(())
    }

    fn add_out_pt(&mut self, e: ActiveIdx, pt: Point) {
        let Some(or) = self.actives[e.0].outrec else {
            debug_assert!(false, "add_out_pt on a cold edge");
            return;
        };
        let Some(start) = self.outrecs[or.0].pts else {
            debug_assert!(false, "output record without a ring");
            return;
        };
        let to_start = self.is_start_side(e);
        let end = self.outpts[start].prev;
        // coincident-with-head points are suppressed
        if to_start {
            if pt == self.outpts[start].pt {
                return;
            }
        } else if pt == self.outpts[end].pt {
            return;
        }
        let new_op = self.outpts.insert_before(start, pt);
        if to_start {
            self.outrecs[or.0].pts = Some(new_op);
        }
    }

    fn start_open_path(&mut self, e: ActiveIdx, pt: Point) {
        let idx = OutRecIdx(self.outrecs.len());
        let op = self.outpts.new_ring(pt);
        self.outrecs.push(OutRec {
            owner: None,
            pts: Some(op),
            start_edge: None,
            end_edge: None,
            flags: OutRecFlags::OPEN,
            polypath: None,
        });
        self.actives[e.0].outrec = Some(idx);
    }

    fn terminate_hot_open(&mut self, e: ActiveIdx) {
        let Some(or) = self.actives[e.0].outrec else {
            return;
        };
        if self.outrecs[or.0].start_edge == Some(e) {
            self.outrecs[or.0].start_edge = None;
        } else {
            self.outrecs[or.0].end_edge = None;
        }
        self.actives[e.0].outrec = None;
    }

    fn swap_outrecs(&mut self, e1: ActiveIdx, e2: ActiveIdx) {
        let or1 = self.actives[e1.0].outrec;
        let or2 = self.actives[e2.0].outrec;
        if or1 == or2 {
            if let Some(or) = or1 {
                let rec = &mut self.outrecs[or.0];
                std::mem::swap(&mut rec.start_edge, &mut rec.end_edge);
            }
            return;
        }
        if let Some(or) = or1 {
            let rec = &mut self.outrecs[or.0];
            if rec.start_edge == Some(e1) {
                rec.start_edge = Some(e2);
            } else {
                rec.end_edge = Some(e2);
            }
        }
        if let Some(or) = or2 {
            let rec = &mut self.outrecs[or.0];
            if rec.start_edge == Some(e2) {
                rec.start_edge = Some(e1);
            } else {
                rec.end_edge = Some(e1);
            }
        }
        self.actives[e1.0].outrec = or2;
        self.actives[e2.0].outrec = or1;
    }

    // ----- edge events ----------------------------------------------------

    /// Promotes an edge to the next segment of its bound.
    fn update_edge_into_ael(&mut self, e: ActiveIdx) {
        let vtop = self.next_vertex(e);
        let new_top = self.vertices[vtop].pt;
        let a = &mut self.actives[e.0];
        a.bot = a.top;
        a.vertex_top = vtop;
        a.top = new_top;
        a.curr = a.bot;
        a.set_dx();
        if !self.actives[e.0].is_horizontal() {
            let y = self.actives[e.0].top.y;
            self.insert_scanline(y);
        }
    }

    /// Resolves one crossing. Callers arrange that `e1` is to the right of
    /// `e2` *above* the intersection, which the winding updates rely on.
    fn intersect_edges(&mut self, e1: ActiveIdx, e2: ActiveIdx, pt: Point) -> Result<(), Error> {
        self.actives[e1.0].curr = pt;
        self.actives[e2.0].curr = pt;

        if self.has_open_paths && (self.is_open(e1) || self.is_open(e2)) {
            if self.is_open(e1) && self.is_open(e2) {
                return Ok(()); // lines may cross freely
            }
            let (eo, ec) = if self.is_open(e2) { (e2, e1) } else { (e1, e2) };
            let closed_wc = self.actives[ec.0].wind_cnt;
            match self.cliptype {
                ClipType::Intersection | ClipType::Difference => {
                    if self.is_same_polytype(eo, ec) || closed_wc.abs() != 1 {
                        return Ok(());
                    }
                }
                ClipType::Union => {
                    // The union's coverage only changes across a unit fill
                    // boundary whose opposite polytype does not also cover
                    // the crossing; wind_cnt2 carries that coverage, kept
                    // current by the closed-closed winding updates.
                    let closed_wc2 = self.actives[ec.0].wind_cnt2;
                    if closed_wc.abs() != 1 || closed_wc2 != 0 {
                        return Ok(());
                    }
                }
                ClipType::Xor => {
                    if closed_wc.abs() != 1 {
                        return Ok(());
                    }
                }
            }
            if self.is_hot(eo) {
                self.add_out_pt(eo, pt);
                self.terminate_hot_open(eo);
            } else {
                self.start_open_path(eo, pt);
            }
            return Ok(());
        }

        // update winding counts
        if self.is_same_polytype(e1, e2) {
            if self.fillrule == FillRule::EvenOdd {
                let w1 = self.actives[e1.0].wind_cnt;
                let w2 = self.actives[e2.0].wind_cnt;
                self.actives[e1.0].wind_cnt = w2;
                self.actives[e2.0].wind_cnt = w1;
            } else {
                let w1 = self.actives[e1.0].wind_cnt;
                let w2 = self.actives[e2.0].wind_cnt;
                let dx1 = self.actives[e1.0].wind_dx;
                let dx2 = self.actives[e2.0].wind_dx;
                self.actives[e1.0].wind_cnt = if w1 + dx2 == 0 { -w1 } else { w1 + dx2 };
                self.actives[e2.0].wind_cnt = if w2 - dx1 == 0 { -w2 } else { w2 - dx1 };
            }
        } else {
            let dx1 = self.actives[e1.0].wind_dx;
            let dx2 = self.actives[e2.0].wind_dx;
            if self.fillrule == FillRule::EvenOdd {
                let w1 = self.actives[e1.0].wind_cnt2;
                let w2 = self.actives[e2.0].wind_cnt2;
                self.actives[e1.0].wind_cnt2 = if w1 == 0 { 1 } else { 0 };
                self.actives[e2.0].wind_cnt2 = if w2 == 0 { 1 } else { 0 };
            } else {
                self.actives[e1.0].wind_cnt2 += dx2;
                self.actives[e2.0].wind_cnt2 -= dx1;
            }
        }

        let (w1, w2) = match self.fillrule {
            FillRule::Positive => (self.actives[e1.0].wind_cnt, self.actives[e2.0].wind_cnt),
            FillRule::Negative => (-self.actives[e1.0].wind_cnt, -self.actives[e2.0].wind_cnt),
            _ => (
                self.actives[e1.0].wind_cnt.abs(),
                self.actives[e2.0].wind_cnt.abs(),
            ),
        };

        let hot1 = self.is_hot(e1);
        let hot2 = self.is_hot(e2);
        if hot1 && hot2 {
            if (w1 != 0 && w1 != 1)
                || (w2 != 0 && w2 != 1)
                || (!self.is_same_polytype(e1, e2) && self.cliptype != ClipType::Xor)
            {
                self.add_local_max_poly(e1, e2, pt)?;
            } else if self.actives[e1.0].outrec == self.actives[e2.0].outrec {
                self.add_local_max_poly(e1, e2, pt)?;
                self.add_local_min_poly(e1, e2, pt);
            } else {
                self.add_out_pt(e1, pt);
                self.add_out_pt(e2, pt);
                self.swap_outrecs(e1, e2);
            }
        } else if hot1 {
            if w2 == 0 || w2 == 1 {
                self.add_out_pt(e1, pt);
                self.swap_outrecs(e1, e2);
            }
        } else if hot2 {
            if w1 == 0 || w1 == 1 {
                self.add_out_pt(e2, pt);
                self.swap_outrecs(e1, e2);
            }
        } else if (w1 == 0 || w1 == 1) && (w2 == 0 || w2 == 1) {
            // neither edge is contributing yet
            let (wc21, wc22) = match self.fillrule {
                FillRule::Positive => (self.actives[e1.0].wind_cnt2, self.actives[e2.0].wind_cnt2),
                FillRule::Negative => {
                    (-self.actives[e1.0].wind_cnt2, -self.actives[e2.0].wind_cnt2)
                }
                _ => (
                    self.actives[e1.0].wind_cnt2.abs(),
                    self.actives[e2.0].wind_cnt2.abs(),
                ),
            };
            if !self.is_same_polytype(e1, e2) {
                self.add_local_min_poly(e1, e2, pt);
            } else if w1 == 1 && w2 == 1 {
                match self.cliptype {
                    ClipType::Intersection => {
                        if wc21 > 0 && wc22 > 0 {
                            self.add_local_min_poly(e1, e2, pt);
                        }
                    }
                    ClipType::Union => {
                        if wc21 <= 0 && wc22 <= 0 {
                            self.add_local_min_poly(e1, e2, pt);
                        }
                    }
                    ClipType::Difference => {
                        let p1 = self.polytype(e1);
                        if (p1 == PathType::Clip && wc21 > 0 && wc22 > 0)
                            || (p1 == PathType::Subject && wc21 <= 0 && wc22 <= 0)
                        {
                            self.add_local_min_poly(e1, e2, pt);
                        }
                    }
                    ClipType::Xor => self.add_local_min_poly(e1, e2, pt),
                }
            }
        }
        Ok(())
    }

    // ----- intersections --------------------------------------------------

    fn process_intersections(&mut self, top_y: i64) -> Result<(), Error> {
        self.build_intersect_list(top_y);
        if self.intersects.is_empty() {
            return Ok(());
        }
        log::trace!(
            "{} crossings in the scanbeam below y={}",
            self.intersects.len(),
            top_y
        );
        self.fixup_intersect_order();
        self.process_intersect_list()
    }

    fn new_intersect_node(&mut self, e1: ActiveIdx, e2: ActiveIdx, top_y: i64) {
        let a1 = &self.actives[e1.0];
        let a2 = &self.actives[e2.0];
        let mut pt = intersect_point(a1, a2);

        // Rounding can drop the point outside the scanbeam; clamp it back,
        // re-deriving x from the more vertical edge.
        if pt.y > a1.curr.y {
            pt.y = a1.curr.y; // curr.y is still the bottom of the scanbeam
            pt.x = if a1.dx.into_inner().abs() < a2.dx.into_inner().abs() {
                a1.top_x(pt.y)
            } else {
                a2.top_x(pt.y)
            };
        } else if pt.y < top_y {
            pt.y = top_y;
            pt.x = if a1.top.y == top_y {
                a1.top.x
            } else if a2.top.y == top_y {
                a2.top.x
            } else if a1.dx.into_inner().abs() < a2.dx.into_inner().abs() {
                a1.curr.x
            } else {
                a2.curr.x
            };
        }
        self.intersects.push(IntersectNode {
            edge1: e1,
            edge2: e2,
            pt,
        });
    }

    /// Merge sort over the SEL, keyed by x at the top of the scanbeam.
    /// Every out-of-order pair found while merging is a crossing inside the
    /// scanbeam and is recorded as an [`IntersectNode`]. The `merge_jump`
    /// links remember each right-hand group head so successive passes double
    /// the group size.
    fn build_intersect_list(&mut self, top_y: i64) {
        let Some(first) = self.ael_first else {
            return;
        };
        if self.actives[first.0].next_in_ael.is_none() {
            return;
        }

        self.sel_first = self.ael_first;
        let mut e = self.ael_first;
        while let Some(i) = e {
            let prev = self.actives[i.0].prev_in_ael;
            let next = self.actives[i.0].next_in_ael;
            let x = self.actives[i.0].top_x(top_y);
            let a = &mut self.actives[i.0];
            a.prev_in_sel = prev;
            a.next_in_sel = next;
            a.curr.x = x;
            e = next;
        }

        let mut mul = 1usize;
        loop {
            let mut first = self.sel_first;
            let mut prev_base: Option<ActiveIdx> = None;

            while let Some(f) = first {
                let second;
                if mul == 1 {
                    let Some(s) = self.actives[f.0].next_in_sel else {
                        break;
                    };
                    second = s;
                    let jump = self.actives[s.0].next_in_sel;
                    self.actives[f.0].merge_jump = jump;
                } else {
                    let Some(s) = self.actives[f.0].merge_jump else {
                        break;
                    };
                    second = s;
                    let jump = self.actives[s.0].merge_jump;
                    self.actives[f.0].merge_jump = jump;
                }

                let mut base = f;
                let mut fcur = Some(f);
                let mut scur = Some(second);
                let mut lcnt = mul;
                let mut rcnt = mul;
                while lcnt > 0 && rcnt > 0 {
                    let (Some(fi), Some(si)) = (fcur, scur) else {
                        break;
                    };
                    if self.actives[si.0].curr.x < self.actives[fi.0].curr.x {
                        // one crossing per remaining left-group member
                        let mut tmp = self.actives[si.0].prev_in_sel;
                        for _ in 0..lcnt {
                            let Some(t) = tmp else { break };
                            self.new_intersect_node(t, si, top_y);
                            tmp = self.actives[t.0].prev_in_sel;
                        }
                        if fcur == Some(base) {
                            if let Some(pb) = prev_base {
                                self.actives[pb.0].merge_jump = Some(si);
                            }
                            let jump = self.actives[fi.0].merge_jump;
                            self.actives[si.0].merge_jump = jump;
                            base = si;
                            if self.actives[fi.0].prev_in_sel.is_none() {
                                self.sel_first = Some(si);
                            }
                        }
                        let next = self.actives[si.0].next_in_sel;
                        // move the out-of-place edge left of the group
                        self.insert2_before1_in_sel(fi, si);
                        scur = next;
                        if scur.is_none() {
                            fcur = None;
                            break;
                        }
                        rcnt -= 1;
                    } else {
                        fcur = self.actives[fi.0].next_in_sel;
                        lcnt -= 1;
                    }
                }
                first = self.actives[base.0].merge_jump;
                prev_base = Some(base);
            }

            let Some(head) = self.sel_first else { break };
            if self.actives[head.0].merge_jump.is_none() {
                break;
            }
            mul <<= 1;
        }
    }

    fn insert2_before1_in_sel(&mut self, first: ActiveIdx, second: ActiveIdx) {
        let prev = self.actives[second.0].prev_in_sel;
        let next = self.actives[second.0].next_in_sel;
        if let Some(p) = prev {
            self.actives[p.0].next_in_sel = next;
        }
        if let Some(n) = next {
            self.actives[n.0].prev_in_sel = prev;
        }
        let fprev = self.actives[first.0].prev_in_sel;
        if let Some(p) = fprev {
            self.actives[p.0].next_in_sel = Some(second);
        }
        self.actives[first.0].prev_in_sel = Some(second);
        self.actives[second.0].prev_in_sel = fprev;
        self.actives[second.0].next_in_sel = Some(first);
    }

    fn edges_adjacent_in_sel(&self, node: &IntersectNode) -> bool {
        self.actives[node.edge1.0].next_in_sel == Some(node.edge2)
            || self.actives[node.edge1.0].prev_in_sel == Some(node.edge2)
    }

    /// Crossings are applied bottom-up, but each one also has to happen
    /// between AEL-adjacent edges; a crossing whose edges have drifted apart
    /// is deferred behind one whose edges are adjacent now.
    fn fixup_intersect_order(&mut self) {
        if self.intersects.len() < 3 {
            return;
        }
        self.copy_ael_to_sel();
        self.intersects.sort_by(|a, b| b.pt.y.cmp(&a.pt.y));
        for i in 0..self.intersects.len() {
            if !self.edges_adjacent_in_sel(&self.intersects[i]) {
                let mut j = i + 1;
                while !self.edges_adjacent_in_sel(&self.intersects[j]) {
                    j += 1;
                }
                self.intersects.swap(i, j);
            }
            let node = self.intersects[i];
            self.swap_in_sel(node.edge1, node.edge2);
        }
    }

    fn process_intersect_list(&mut self) -> Result<(), Error> {
        for i in 0..self.intersects.len() {
            let IntersectNode { edge1, edge2, pt } = self.intersects[i];
            self.intersect_edges(edge1, edge2, pt)?;
            self.swap_in_ael(edge1, edge2);
        }
        self.intersects.clear();
        Ok(())
    }

    // ----- horizontals ----------------------------------------------------

    /// Direction and x-range of a horizontal pass. A zero-length horizontal
    /// inherits its direction from where the maxima pair sits.
    fn reset_horz_direction(
        &self,
        horz: ActiveIdx,
        max_pair: Option<ActiveIdx>,
    ) -> (bool, i64, i64) {
        let h = &self.actives[horz.0];
        if h.bot.x == h.top.x {
            let x = h.curr.x;
            let mut e = h.next_in_ael;
            while let Some(i) = e {
                if Some(i) == max_pair {
                    break;
                }
                e = self.actives[i.0].next_in_ael;
            }
            (e.is_some(), x, x)
        } else if h.curr.x < h.top.x {
            (true, h.curr.x, h.top.x)
        } else {
            (false, h.top.x, h.curr.x)
        }
    }

    fn get_maxima_pair(&self, e: ActiveIdx) -> Option<ActiveIdx> {
        let a = &self.actives[e.0];
        if a.is_horizontal() {
            // the pair may sit on either side of a horizontal
            let mut cur = a.prev_in_ael;
            while let Some(i) = cur {
                let b = &self.actives[i.0];
                if b.curr.x < a.top.x {
                    break;
                }
                if b.vertex_top == a.vertex_top {
                    return Some(i);
                }
                cur = b.prev_in_ael;
            }
            let mut cur = a.next_in_ael;
            while let Some(i) = cur {
                let b = &self.actives[i.0];
                if b.top_x(a.top.y) > a.top.x {
                    break;
                }
                if b.vertex_top == a.vertex_top {
                    return Some(i);
                }
                cur = b.next_in_ael;
            }
            None
        } else {
            let mut cur = a.next_in_ael;
            while let Some(i) = cur {
                if self.actives[i.0].vertex_top == a.vertex_top {
                    return Some(i);
                }
                cur = self.actives[i.0].next_in_ael;
            }
            None
        }
    }

    /// Processes one horizontal edge (and, for open paths, any consecutive
    /// horizontals that follow it in the bound).
    ///
    /// Horizontals at a scanline are treated as layered: the pass sweeps
    /// the AEL in the horizontal's direction, resolving a crossing with
    /// every edge it steps over, until it passes the far end or reaches the
    /// bound's maxima pair.
    fn process_horizontal(&mut self, horz: ActiveIdx) -> Result<(), Error> {
        let is_open = self.is_open(horz);
        if !is_open {
            // collapse consecutive collinear horizontals into a single pass
            let pt = self.actives[horz.0].bot;
            while !self.is_maxima(horz) && self.vertices[self.next_vertex(horz)].pt.y == pt.y {
                self.update_edge_into_ael(horz);
            }
            self.actives[horz.0].bot = pt;
            self.actives[horz.0].curr = pt;
        }

        let mut max_pair = None;
        if self.is_maxima(horz) {
            let vtop = self.actives[horz.0].vertex_top;
            let open_end = self.vertices[vtop]
                .flags
                .intersects(VertexFlags::OPEN_START | VertexFlags::OPEN_END);
            if !is_open || !open_end {
                max_pair = self.get_maxima_pair(horz);
            }
        }

        let (mut ltr, mut left, mut right) = self.reset_horz_direction(horz, max_pair);
        if self.is_hot(horz) {
            let curr = self.actives[horz.0].curr;
            self.add_out_pt(horz, curr);
        }

        loop {
            let is_max = self.is_maxima(horz);
            let mut e = if ltr {
                self.actives[horz.0].next_in_ael
            } else {
                self.actives[horz.0].prev_in_ael
            };
            while let Some(i) = e {
                let ex = self.actives[i.0].curr.x;
                // past the far end of the horizontal
                if (ltr && ex > right) || (!ltr && ex < left) {
                    break;
                }
                // at the end of an intermediate horizontal, stop early if
                // the bound's upcoming vertex would be overshot
                if ex == self.actives[horz.0].top.x && !is_max && !self.actives[i.0].is_horizontal()
                {
                    let pt = self.vertices[self.next_vertex(horz)].pt;
                    let tx = self.actives[i.0].top_x(pt.y);
                    if (ltr && tx >= pt.x) || (!ltr && tx <= pt.x) {
                        break;
                    }
                }
                if Some(i) == max_pair {
                    if self.is_hot(horz) {
                        let top = self.actives[horz.0].top;
                        self.add_local_max_poly(horz, i, top)?;
                    }
                    self.delete_from_ael(i);
                    self.delete_from_ael(horz);
                    return Ok(());
                }
                let y = self.actives[horz.0].curr.y;
                let pt = Point::new(ex, y);
                if ltr {
                    self.intersect_edges(horz, i, pt)?;
                } else {
                    self.intersect_edges(i, horz, pt)?;
                }
                let next = if ltr {
                    self.actives[i.0].next_in_ael
                } else {
                    self.actives[i.0].prev_in_ael
                };
                self.swap_in_ael(horz, i);
                e = next;
            }

            if is_max || self.vertices[self.next_vertex(horz)].pt.y != self.actives[horz.0].top.y {
                break;
            }

            // open path: promote to the next consecutive horizontal
            self.update_edge_into_ael(horz);
            let dir = self.reset_horz_direction(horz, max_pair);
            ltr = dir.0;
            left = dir.1;
            right = dir.2;

            if is_open {
                if self.is_maxima(horz) {
                    max_pair = self.get_maxima_pair(horz);
                }
                if self.is_hot(horz) {
                    let bot = self.actives[horz.0].bot;
                    self.add_out_pt(horz, bot);
                }
            }
        }

        if self.is_hot(horz) {
            let top = self.actives[horz.0].top;
            self.add_out_pt(horz, top);
        }

        if !is_open {
            self.update_edge_into_ael(horz); // end of an intermediate horizontal
        } else if !self.is_maxima(horz) {
            self.update_edge_into_ael(horz);
        } else if let Some(mp) = max_pair {
            if self.is_hot(horz) {
                let top = self.actives[horz.0].top;
                self.add_local_max_poly(horz, mp, top)?;
            } else {
                self.delete_from_ael(mp);
                self.delete_from_ael(horz);
            }
        } else {
            self.delete_from_ael(horz); // open at the top
        }
        Ok(())
    }

    // ----- top of scanbeam ------------------------------------------------

    fn top_of_scanbeam(&mut self, y: i64) -> Result<(), Error> {
        #[cfg(debug_assertions)]
        self.check_ael_links();

        let mut e = self.ael_first;
        while let Some(i) = e {
            // nb: no edge is horizontal at this point
            if self.actives[i.0].top.y == y {
                let top = self.actives[i.0].top;
                self.actives[i.0].curr = top; // needed for horizontal processing
                if self.is_maxima(i) {
                    e = self.process_maxima(i)?;
                    continue;
                }
                // intermediate vertex
                self.update_edge_into_ael(i);
                if self.is_hot(i) {
                    let bot = self.actives[i.0].bot;
                    self.add_out_pt(i, bot);
                }
                if self.actives[i.0].is_horizontal() {
                    self.push_horz(i); // horizontals are processed later
                }
            } else {
                let x = self.actives[i.0].top_x(y);
                let a = &mut self.actives[i.0];
                a.curr.y = y;
                a.curr.x = x;
            }
            e = self.actives[i.0].next_in_ael;
        }
        Ok(())
    }

    /// Closes the bound pair at a maximum, resolving crossings with every
    /// edge caught strictly between the pair. Returns the edge the AEL walk
    /// should resume from.
    fn process_maxima(&mut self, e: ActiveIdx) -> Result<Option<ActiveIdx>, Error> {
        let prev_e = self.actives[e.0].prev_in_ael;
        let next_e = self.actives[e.0].next_in_ael;
        let open = self.is_open(e);

        if open {
            let vtop = self.actives[e.0].vertex_top;
            if self.vertices[vtop]
                .flags
                .intersects(VertexFlags::OPEN_START | VertexFlags::OPEN_END)
            {
                if self.is_hot(e) {
                    let top = self.actives[e.0].top;
                    self.add_out_pt(e, top);
                }
                if !self.actives[e.0].is_horizontal() {
                    if self.is_hot(e) {
                        self.terminate_hot_open(e);
                    }
                    self.delete_from_ael(e);
                }
                return Ok(next_e);
            }
        }
        let Some(max_pair) = self.get_maxima_pair(e) else {
            return Ok(next_e); // the pair is horizontal and will close the bound
        };

        // only non-horizontal maxima here; clear out everything between
        let mut next = self.actives[e.0].next_in_ael;
        while next != Some(max_pair) {
            let Some(i) = next else { break };
            let top = self.actives[e.0].top;
            self.intersect_edges(e, i, top)?;
            self.swap_in_ael(e, i);
            next = self.actives[e.0].next_in_ael;
        }

        if open {
            if self.is_hot(e) {
                let top = self.actives[e.0].top;
                self.add_local_max_poly(e, max_pair, top)?;
            }
            self.delete_from_ael(max_pair);
            self.delete_from_ael(e);
        } else {
            // e is now adjacent to its maxima pair
            if self.is_hot(e) {
                let top = self.actives[e.0].top;
                self.add_local_max_poly(e, max_pair, top)?;
            }
            self.delete_from_ael(e);
            self.delete_from_ael(max_pair);
        }
        Ok(match prev_e {
            Some(p) => self.actives[p.0].next_in_ael,
            None => self.ael_first,
        })
    }

    // ----- results --------------------------------------------------------

    /// Emits completed rings as paths, in output record creation order.
    /// Rings are walked backwards from the end side so polygons keep the
    /// conventional orientation of their source winding.
    fn build_paths(&self, closed: &mut Paths, mut open: Option<&mut Paths>) {
        for rec in &self.outrecs {
            let Some(start) = rec.pts else { continue };
            let end = self.outpts[start].prev;
            let mut cnt = self.outpts.count(start);
            if self.outpts[end].pt == self.outpts[start].pt {
                cnt -= 1; // seam point duplicated at both heads
            }
            let is_open = rec.flags.contains(OutRecFlags::OPEN);
            if cnt < 2 || (!is_open && cnt == 2) || (is_open && open.is_none()) {
                continue;
            }
            let mut path = crate::Path::with_capacity(cnt);
            let mut op = end;
            for _ in 0..cnt {
                path.push(self.outpts[op].pt);
                op = self.outpts[op].prev;
            }
            if is_open {
                if let Some(out) = open.as_deref_mut() {
                    out.push(path);
                }
            } else {
                closed.push(path);
            }
        }
    }

    /// Emits completed rings as a containment tree plus open paths. An
    /// owner is always created before the records it owns, so its tree node
    /// exists by the time a child looks it up.
    fn build_tree(&mut self, open: &mut Paths) -> PolyTree {
        let mut tree = PolyTree::default();
        for idx in 0..self.outrecs.len() {
            let Some(start) = self.outrecs[idx].pts else {
                continue;
            };
            let end = self.outpts[start].prev;
            let mut cnt = self.outpts.count(start);
            if self.outpts[end].pt == self.outpts[start].pt {
                cnt -= 1;
            }
            let is_open = self.outrecs[idx].flags.contains(OutRecFlags::OPEN);
            if cnt < 2 || (!is_open && cnt == 2) {
                continue;
            }
            let mut path = crate::Path::with_capacity(cnt);
            let mut op = end;
            for _ in 0..cnt {
                path.push(self.outpts[op].pt);
                op = self.outpts[op].prev;
            }
            if is_open {
                open.push(path);
                continue;
            }
            let parent = self.outrecs[idx]
                .owner
                .and_then(|o| self.outrecs[o.0].polypath);
            let node = tree.add_child(parent, path);
            self.outrecs[idx].polypath = Some(node);
        }
        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signed_area;

    fn p(x: i64, y: i64) -> Point {
        Point::new(x, y)
    }

    fn square(left: i64, top: i64, size: i64) -> Vec<Point> {
        vec![
            p(left, top),
            p(left + size, top),
            p(left + size, top + size),
            p(left, top + size),
        ]
    }

    #[test]
    fn empty_inputs_clip_to_nothing() {
        let mut clipper = Clipper::new();
        let solution = clipper.execute(ClipType::Union, FillRule::NonZero).unwrap();
        assert!(solution.is_empty());
    }

    #[test]
    fn union_of_one_square_is_that_square() {
        let mut clipper = Clipper::new();
        clipper
            .add_path(&square(0, 0, 10), PathType::Subject, false)
            .unwrap();
        let solution = clipper.execute(ClipType::Union, FillRule::NonZero).unwrap();
        assert_eq!(solution.len(), 1);
        assert_eq!(solution[0].len(), 4);
        assert_eq!(signed_area(&solution[0]).abs(), 100.0);
    }

    #[test]
    fn union_of_disjoint_squares_keeps_both() {
        let mut clipper = Clipper::new();
        clipper
            .add_path(&square(0, 0, 10), PathType::Subject, false)
            .unwrap();
        clipper
            .add_path(&square(20, 20, 5), PathType::Subject, false)
            .unwrap();
        let solution = clipper.execute(ClipType::Union, FillRule::NonZero).unwrap();
        assert_eq!(solution.len(), 2);
        let total: f64 = solution.iter().map(|p| signed_area(p).abs()).sum();
        assert_eq!(total, 125.0);
    }

    #[test]
    fn difference_of_contained_square_leaves_a_hole() {
        let mut clipper = Clipper::new();
        clipper
            .add_path(&square(0, 0, 20), PathType::Subject, false)
            .unwrap();
        clipper
            .add_path(&square(5, 5, 10), PathType::Clip, false)
            .unwrap();
        let solution = clipper
            .execute(ClipType::Difference, FillRule::NonZero)
            .unwrap();
        assert_eq!(solution.len(), 2);
        let net: f64 = solution.iter().map(|p| signed_area(p)).sum();
        assert_eq!(net.abs(), 300.0);
        // outer and hole wind opposite ways
        assert!(solution.iter().any(|p| signed_area(p) > 0.0));
        assert!(solution.iter().any(|p| signed_area(p) < 0.0));
    }

    #[test]
    fn inputs_survive_across_executions() {
        let mut clipper = Clipper::new();
        clipper
            .add_path(&square(0, 0, 10), PathType::Subject, false)
            .unwrap();
        clipper
            .add_path(&square(5, 5, 10), PathType::Clip, false)
            .unwrap();
        let union = clipper.execute(ClipType::Union, FillRule::NonZero).unwrap();
        let inter = clipper
            .execute(ClipType::Intersection, FillRule::NonZero)
            .unwrap();
        let union_area: f64 = union.iter().map(|p| signed_area(p).abs()).sum();
        let inter_area: f64 = inter.iter().map(|p| signed_area(p).abs()).sum();
        assert_eq!(union_area, 175.0);
        assert_eq!(inter_area, 25.0);
    }

    #[test]
    fn union_clips_open_paths_to_the_outside() {
        let mut clipper = Clipper::new();
        clipper
            .add_path(&[p(-5, 5), p(15, 5)], PathType::Subject, true)
            .unwrap();
        clipper
            .add_path(&square(0, 0, 10), PathType::Subject, false)
            .unwrap();
        let (closed, open) = clipper
            .execute_open(ClipType::Union, FillRule::NonZero)
            .unwrap();
        assert_eq!(closed.len(), 1);
        // only the parts outside the filled square survive
        let mut segs: Vec<Vec<(i64, i64)>> = open
            .iter()
            .map(|path| path.iter().map(|q| (q.x, q.y)).collect())
            .collect();
        segs.sort();
        assert_eq!(segs, vec![vec![(-5, 5), (0, 5)], vec![(10, 5), (15, 5)]]);
    }

    #[test]
    fn open_clip_paths_are_rejected() {
        let mut clipper = Clipper::new();
        let err = clipper
            .add_path(&[p(0, 0), p(5, 5)], PathType::Clip, true)
            .unwrap_err();
        assert_eq!(err, Error::OpenClipPath);
    }

    #[test]
    fn bounds_cover_every_input_vertex() {
        let mut clipper = Clipper::new();
        assert_eq!(clipper.bounds(), Rect::new(0, 0, 0, 0));
        clipper
            .add_path(&square(-3, 2, 10), PathType::Subject, false)
            .unwrap();
        clipper
            .add_path(&[p(50, -20), p(60, 40)], PathType::Subject, true)
            .unwrap();
        assert_eq!(clipper.bounds(), Rect::new(-3, -20, 60, 40));
    }

    #[test]
    fn clearing_discards_inputs() {
        let mut clipper = Clipper::new();
        clipper
            .add_path(&square(0, 0, 10), PathType::Subject, false)
            .unwrap();
        clipper.clear();
        let solution = clipper.execute(ClipType::Union, FillRule::NonZero).unwrap();
        assert!(solution.is_empty());
    }
}
