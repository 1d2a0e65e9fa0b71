#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

mod active;
mod engine;
mod geom;
mod outrec;
mod polytree;
mod vertex;

pub use engine::Clipper;
pub use geom::{signed_area, Point, Rect};
pub use polytree::{PolyNodeIdx, PolyTree};

/// A sequence of points; closed paths leave the closing segment implicit.
pub type Path = Vec<Point>;

/// A collection of paths.
pub type Paths = Vec<Path>;

/// The role a path plays in a clipping operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize)]
pub enum PathType {
    /// A path of the set being clipped.
    Subject,
    /// A path of the set doing the clipping.
    Clip,
}

/// Binary operations between the subject and clip sets.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, serde::Serialize)]
pub enum ClipType {
    /// A point is in the result if it is in both sets.
    #[default]
    Intersection,
    /// A point is in the result if it is in either set.
    Union,
    /// A point is in the result if it is in the subject but not the clip.
    Difference,
    /// A point is in the result if it is in exactly one of the sets.
    Xor,
}

/// A fill rule decides whether a point is "inside" a set of closed paths,
/// as a predicate on the point's winding number.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, serde::Serialize)]
pub enum FillRule {
    /// Inside when the winding number is odd.
    #[default]
    EvenOdd,
    /// Inside when the winding number is non-zero.
    NonZero,
    /// Inside when the winding number is positive.
    Positive,
    /// Inside when the winding number is negative.
    Negative,
}

/// Failures reported by the clipper.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Error {
    /// An open path was supplied with [`PathType::Clip`]; only subjects may
    /// be open.
    OpenClipPath,
    /// A [`PolyTree`] child index was out of range.
    ChildIndex,
    /// An internal invariant was violated; the run is aborted because
    /// continuing would emit malformed geometry.
    Clipping(&'static str),
    /// `execute` was called re-entrantly.
    Busy,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::OpenClipPath => write!(f, "open paths may only be subjects, not clips"),
            Error::ChildIndex => write!(f, "polytree child index out of range"),
            Error::Clipping(msg) => write!(f, "clipping failed: {msg}"),
            Error::Busy => write!(f, "clipper is already executing"),
        }
    }
}

impl std::error::Error for Error {}

/// Computes a Boolean operation between two sets of closed paths.
///
/// This is the one-shot convenience wrapper around [`Clipper`]; use the
/// engine directly to mix in open paths, reuse inputs across several
/// operations, or get results nested as a [`PolyTree`].
pub fn boolean_op(
    subject: &[Path],
    clip: &[Path],
    cliptype: ClipType,
    fillrule: FillRule,
) -> Result<Paths, Error> {
    let mut clipper = Clipper::new();
    clipper.add_paths(subject, PathType::Subject, false)?;
    clipper.add_paths(clip, PathType::Clip, false)?;
    clipper.execute(cliptype, fillrule)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(left: i64, top: i64, size: i64) -> Path {
        vec![
            Point::new(left, top),
            Point::new(left + size, top),
            Point::new(left + size, top + size),
            Point::new(left, top + size),
        ]
    }

    #[test]
    fn two_squares() {
        let a = [square(0, 0, 10)];
        let b = [square(5, 5, 10)];
        let out = boolean_op(&a, &b, ClipType::Intersection, FillRule::NonZero).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(signed_area(&out[0]).abs(), 25.0);
    }

    #[test]
    fn error_messages_name_the_failure() {
        assert_eq!(
            boolean_op(&[], &[], ClipType::Union, FillRule::EvenOdd),
            Ok(Vec::new())
        );
        let err = Error::Clipping("cyclic ownership while joining paths");
        assert!(err.to_string().contains("cyclic ownership"));
    }
}
