//! Vertex rings and local minima.
//!
//! Every input path becomes a circular doubly-linked list of vertices, with
//! the links stored as arena indices. While building the ring we flag the
//! vertices where the path's vertical direction reverses: a *local minimum*
//! is a bottom vertex (largest `y` in the y-down axis) and a *local maximum*
//! a top vertex. The minima seed the sweep; the maxima terminate edge bounds.

use crate::geom::Point;
use crate::PathType;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub(crate) struct VertexFlags: u8 {
        const OPEN_START = 1 << 0;
        const OPEN_END = 1 << 1;
        const LOCAL_MAX = 1 << 2;
        const LOCAL_MIN = 1 << 3;
    }
}

/// An index into [`VertexStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct VertexIdx(pub(crate) usize);

#[derive(Clone, Debug)]
pub(crate) struct Vertex {
    pub(crate) pt: Point,
    pub(crate) prev: VertexIdx,
    pub(crate) next: VertexIdx,
    pub(crate) flags: VertexFlags,
}

/// The bottom of a pair of edge bounds. Both bounds emanating from the
/// minimum keep a reference to this until they leave the active list.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LocalMinimum {
    pub(crate) vertex: VertexIdx,
    pub(crate) polytype: PathType,
    pub(crate) is_open: bool,
}

/// Owns every vertex ring and the list of local minima.
///
/// Rings persist across consecutive executions so the same inputs can be
/// clipped repeatedly; [`VertexStore::clear`] discards them.
#[derive(Clone, Debug, Default)]
pub(crate) struct VertexStore {
    verts: Vec<Vertex>,
    pub(crate) minima: Vec<LocalMinimum>,
}

impl std::ops::Index<VertexIdx> for VertexStore {
    type Output = Vertex;

    fn index(&self, index: VertexIdx) -> &Vertex {
        &self.verts[index.0]
    }
}

impl VertexStore {
    pub(crate) fn clear(&mut self) {
        self.verts.clear();
        self.minima.clear();
    }

    pub(crate) fn points(&self) -> impl Iterator<Item = Point> + '_ {
        self.verts.iter().map(|v| v.pt)
    }

    pub(crate) fn minima_y(&self, i: usize) -> i64 {
        self.verts[self.minima[i].vertex.0].pt.y
    }

    /// Sorts the minima so the sweep consumes them bottom-up (descending
    /// `y`). The sort is stable, so minima at the same height keep the order
    /// their paths were added in.
    pub(crate) fn sort_minima(&mut self) {
        let verts = &self.verts;
        self.minima
            .sort_by(|a, b| verts[b.vertex.0].pt.y.cmp(&verts[a.vertex.0].pt.y));
    }

    fn add_loc_min(&mut self, v: VertexIdx, polytype: PathType, is_open: bool) {
        let vert = &mut self.verts[v.0];
        // a vertex may seed at most one minimum
        if vert.flags.contains(VertexFlags::LOCAL_MIN) {
            return;
        }
        vert.flags |= VertexFlags::LOCAL_MIN;
        self.minima.push(LocalMinimum {
            vertex: v,
            polytype,
            is_open,
        });
    }

    /// Builds the vertex ring for one path.
    ///
    /// Exact duplicate points are skipped, and a closed path is first
    /// stripped of any trailing repeats of its start point. Degenerate
    /// paths (fewer than two distinct points) and closed zero-height paths
    /// are dropped entirely.
    pub(crate) fn add_path(&mut self, path: &[Point], polytype: PathType, is_open: bool) {
        let mut len = path.len();
        while len > 1 && path[len - 1] == path[0] {
            len -= 1;
        }
        if len < 2 {
            return;
        }

        // Find the first vertex that leaves the start point's scanline, to
        // learn the path's initial vertical direction.
        let mut i = 1;
        while i < len && path[i].y == path[0].y {
            i += 1;
        }
        let is_flat = i == len;
        let mut going_up = false;
        let mut p0_is_minima = false;
        let mut p0_is_maxima = false;
        if is_flat {
            if !is_open {
                return; // closed paths with zero area are ignored
            }
        } else {
            going_up = path[i].y < path[0].y; // y-down: up means smaller y
            let mut j = len - 1;
            while path[j].y == path[0].y {
                j -= 1;
            }
            if going_up {
                p0_is_minima = path[j].y < path[0].y;
            } else {
                p0_is_maxima = path[j].y > path[0].y;
            }
        }

        let first = VertexIdx(self.verts.len());
        self.verts.push(Vertex {
            pt: path[0],
            prev: first,
            next: first,
            flags: VertexFlags::empty(),
        });

        if is_open {
            self.verts[first.0].flags |= VertexFlags::OPEN_START;
            if going_up {
                self.add_loc_min(first, polytype, is_open);
            } else {
                self.verts[first.0].flags |= VertexFlags::LOCAL_MAX;
            }
        }

        // nb: polygon orientation is determined later, when the minima are
        // inserted into the active list.
        let mut curr = first;
        for j in 1..len {
            if path[j] == self.verts[curr.0].pt {
                continue; // skip duplicates
            }
            let v = VertexIdx(self.verts.len());
            self.verts.push(Vertex {
                pt: path[j],
                prev: curr,
                next: first,
                flags: VertexFlags::empty(),
            });
            self.verts[curr.0].next = v;
            if path[j].y > self.verts[curr.0].pt.y && going_up {
                self.verts[curr.0].flags |= VertexFlags::LOCAL_MAX;
                going_up = false;
            } else if path[j].y < self.verts[curr.0].pt.y && !going_up {
                going_up = true;
                self.add_loc_min(curr, polytype, is_open);
            }
            curr = v;
        }
        self.verts[first.0].prev = curr;

        if is_open {
            self.verts[curr.0].flags |= VertexFlags::OPEN_END;
            if going_up {
                self.verts[curr.0].flags |= VertexFlags::LOCAL_MAX;
            } else {
                self.add_loc_min(curr, polytype, is_open);
            }
        } else if going_up {
            // still going up at the seam, so the ring's top is ahead of us
            let mut v = curr;
            while self.verts[self.verts[v.0].next.0].pt.y <= self.verts[v.0].pt.y {
                v = self.verts[v.0].next;
            }
            self.verts[v.0].flags |= VertexFlags::LOCAL_MAX;
            if p0_is_minima {
                self.add_loc_min(first, polytype, is_open);
            }
        } else {
            let mut v = curr;
            while self.verts[self.verts[v.0].next.0].pt.y >= self.verts[v.0].pt.y {
                v = self.verts[v.0].next;
            }
            self.add_loc_min(v, polytype, is_open);
            if p0_is_maxima {
                self.verts[first.0].flags |= VertexFlags::LOCAL_MAX;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: i64, y: i64) -> Point {
        Point::new(x, y)
    }

    fn ring_len(store: &VertexStore, start: VertexIdx) -> usize {
        let mut n = 1;
        let mut v = store[start].next;
        while v != start {
            n += 1;
            v = store[v].next;
        }
        n
    }

    #[test]
    fn square_has_one_minimum_and_one_maximum() {
        let mut store = VertexStore::default();
        store.add_path(
            &[p(0, 0), p(10, 0), p(10, 10), p(0, 10)],
            PathType::Subject,
            false,
        );
        assert_eq!(store.minima.len(), 1);
        // bottom-left corner is the minimum in the y-down axis
        assert_eq!(store[store.minima[0].vertex].pt, p(0, 10));
        let maxima = store
            .verts
            .iter()
            .filter(|v| v.flags.contains(VertexFlags::LOCAL_MAX))
            .count();
        assert_eq!(maxima, 1);
    }

    #[test]
    fn diamond_minimum_is_the_bottom_vertex() {
        let mut store = VertexStore::default();
        store.add_path(
            &[p(0, -5), p(5, 0), p(0, 5), p(-5, 0)],
            PathType::Clip,
            false,
        );
        assert_eq!(store.minima.len(), 1);
        assert_eq!(store[store.minima[0].vertex].pt, p(0, 5));
    }

    #[test]
    fn duplicates_and_trailing_repeats_are_stripped() {
        let mut store = VertexStore::default();
        store.add_path(
            &[p(0, 0), p(5, 0), p(5, 0), p(5, 5), p(0, 5), p(0, 0)],
            PathType::Subject,
            false,
        );
        assert_eq!(store.minima.len(), 1);
        assert_eq!(ring_len(&store, VertexIdx(0)), 4);
    }

    #[test]
    fn degenerate_paths_are_dropped() {
        let mut store = VertexStore::default();
        store.add_path(&[p(3, 3), p(3, 3), p(3, 3)], PathType::Subject, false);
        // a closed flat path has zero area
        store.add_path(&[p(0, 0), p(4, 0), p(9, 0)], PathType::Subject, false);
        assert!(store.verts.is_empty());
        assert!(store.minima.is_empty());
    }

    #[test]
    fn open_path_endpoints_are_flagged() {
        let mut store = VertexStore::default();
        store.add_path(&[p(0, 10), p(5, 5), p(10, 8)], PathType::Subject, true);
        assert!(store[VertexIdx(0)]
            .flags
            .contains(VertexFlags::OPEN_START | VertexFlags::LOCAL_MIN));
        assert!(store[VertexIdx(2)]
            .flags
            .contains(VertexFlags::OPEN_END | VertexFlags::LOCAL_MIN));
        assert!(store[VertexIdx(1)].flags.contains(VertexFlags::LOCAL_MAX));
        assert_eq!(store.minima.len(), 2);
    }

    #[test]
    fn flat_open_path_gets_max_at_start_and_min_at_end() {
        let mut store = VertexStore::default();
        store.add_path(&[p(-5, 5), p(25, 5)], PathType::Subject, true);
        assert!(store[VertexIdx(0)].flags.contains(VertexFlags::LOCAL_MAX));
        assert!(store[VertexIdx(1)].flags.contains(VertexFlags::LOCAL_MIN));
        assert_eq!(store.minima.len(), 1);
    }

    #[test]
    fn minima_sort_is_bottom_up_and_stable() {
        let mut store = VertexStore::default();
        store.add_path(&[p(0, 0), p(4, 0), p(4, 4), p(0, 4)], PathType::Subject, false);
        store.add_path(&[p(10, 0), p(14, 0), p(14, 9), p(10, 9)], PathType::Clip, false);
        store.add_path(&[p(20, 0), p(24, 0), p(24, 4), p(20, 4)], PathType::Clip, false);
        store.sort_minima();
        assert_eq!(store.minima_y(0), 9);
        assert_eq!(store.minima_y(1), 4);
        assert_eq!(store.minima_y(2), 4);
        // equal heights keep insertion order
        assert_eq!(store.minima[1].polytype, PathType::Subject);
        assert_eq!(store.minima[2].polytype, PathType::Clip);
    }
}
