//! Hierarchical clipping results.
//!
//! A [`PolyTree`] nests the emitted polygons by containment: the children of
//! an outer polygon are the holes inside it, the children of a hole are the
//! islands inside that hole, and so on. Nodes live in an arena and are
//! addressed with [`PolyNodeIdx`]; there are no parent/child pointers to
//! cycle.

use crate::{Error, Path};

/// A handle to one polygon inside a [`PolyTree`].
///
/// Only valid for the tree that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub struct PolyNodeIdx(usize);

#[derive(Clone, Debug, serde::Serialize)]
struct PolyNode {
    path: Path,
    parent: Option<PolyNodeIdx>,
    children: Vec<PolyNodeIdx>,
}

/// The nested form of a clipping result.
#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct PolyTree {
    nodes: Vec<PolyNode>,
    top: Vec<PolyNodeIdx>,
}

impl PolyTree {
    pub(crate) fn add_child(&mut self, parent: Option<PolyNodeIdx>, path: Path) -> PolyNodeIdx {
        let idx = PolyNodeIdx(self.nodes.len());
        self.nodes.push(PolyNode {
            path,
            parent,
            children: Vec::new(),
        });
        match parent {
            Some(p) => self.nodes[p.0].children.push(idx),
            None => self.top.push(idx),
        }
        idx
    }

    /// The polygons that are not contained in any other polygon.
    pub fn top_level(&self) -> &[PolyNodeIdx] {
        &self.top
    }

    /// The polygons directly contained in `node`.
    pub fn children(&self, node: PolyNodeIdx) -> &[PolyNodeIdx] {
        &self.nodes[node.0].children
    }

    /// The `i`th child of `node`, or [`Error::ChildIndex`] when out of range.
    pub fn child(&self, node: PolyNodeIdx, i: usize) -> Result<PolyNodeIdx, Error> {
        self.nodes[node.0]
            .children
            .get(i)
            .copied()
            .ok_or(Error::ChildIndex)
    }

    /// The vertices of `node`'s polygon.
    pub fn path(&self, node: PolyNodeIdx) -> &Path {
        &self.nodes[node.0].path
    }

    /// The polygon immediately enclosing `node`, if any.
    pub fn parent(&self, node: PolyNodeIdx) -> Option<PolyNodeIdx> {
        self.nodes[node.0].parent
    }

    /// A node at odd nesting depth bounds a hole rather than a filled area.
    pub fn is_hole(&self, node: PolyNodeIdx) -> bool {
        let mut hole = false;
        let mut cur = self.nodes[node.0].parent;
        while let Some(p) = cur {
            hole = !hole;
            cur = self.nodes[p.0].parent;
        }
        hole
    }

    /// Total number of polygons in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the tree holds no polygons at all.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Point;

    #[test]
    fn nesting_depth_decides_holes() {
        let mut tree = PolyTree::default();
        let outer = tree.add_child(None, vec![Point::new(0, 0)]);
        let hole = tree.add_child(Some(outer), vec![Point::new(1, 1)]);
        let island = tree.add_child(Some(hole), vec![Point::new(2, 2)]);

        assert_eq!(tree.top_level(), &[outer]);
        assert!(!tree.is_hole(outer));
        assert!(tree.is_hole(hole));
        assert!(!tree.is_hole(island));
        assert_eq!(tree.parent(island), Some(hole));
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn child_lookup_is_range_checked() {
        let mut tree = PolyTree::default();
        let outer = tree.add_child(None, Vec::new());
        let hole = tree.add_child(Some(outer), Vec::new());
        assert_eq!(tree.child(outer, 0), Ok(hole));
        assert_eq!(tree.child(outer, 1), Err(Error::ChildIndex));
    }
}
