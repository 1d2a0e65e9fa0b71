use polyclip::{
    boolean_op, signed_area, ClipType, Clipper, FillRule, PathType, Point, Path, Paths,
};
use proptest::prelude::*;

fn pt(x: i64, y: i64) -> Point {
    Point::new(x, y)
}

fn square(left: i64, top: i64, size: i64) -> Path {
    rect(left, top, size, size)
}

fn rect(left: i64, top: i64, w: i64, h: i64) -> Path {
    vec![
        pt(left, top),
        pt(left + w, top),
        pt(left + w, top + h),
        pt(left, top + h),
    ]
}

/// Net signed area of a result; holes wind opposite to their outers, so
/// this is the measure of the filled region (up to a global sign).
fn total_area(paths: &Paths) -> f64 {
    paths.iter().map(|p| signed_area(p)).sum()
}

/// The filled measure of a set of input paths, by canonicalising it
/// through a union against nothing.
fn filled_area(paths: &Paths, fillrule: FillRule) -> f64 {
    total_area(&boolean_op(paths, &[], ClipType::Union, fillrule).unwrap())
}

/// Normalises a result for comparison: orient every ring the same way,
/// rotate it to start at its smallest vertex, then sort the rings.
fn canonical(paths: &Paths) -> Vec<Vec<(i64, i64)>> {
    let mut out: Vec<Vec<(i64, i64)>> = paths
        .iter()
        .map(|p| {
            let mut ring: Vec<(i64, i64)> = p.iter().map(|q| (q.x, q.y)).collect();
            if signed_area(p) < 0.0 {
                ring.reverse();
            }
            let first = ring
                .iter()
                .enumerate()
                .min_by_key(|(_, q)| **q)
                .map(|(i, _)| i)
                .unwrap_or(0);
            ring.rotate_left(first);
            ring
        })
        .collect();
    out.sort();
    out
}

// ---------------------------------------------------------------------------
// end-to-end scenarios
// ---------------------------------------------------------------------------

#[test]
fn overlapping_squares_union() {
    let a = [square(0, 0, 10)];
    let b = [square(5, 5, 10)];
    let out = boolean_op(&a, &b, ClipType::Union, FillRule::NonZero).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].len(), 8);
    assert_eq!(total_area(&out).abs(), 175.0);
}

#[test]
fn overlapping_squares_intersection() {
    let a = [square(0, 0, 10)];
    let b = [square(5, 5, 10)];
    let out = boolean_op(&a, &b, ClipType::Intersection, FillRule::NonZero).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].len(), 4);
    assert_eq!(total_area(&out).abs(), 25.0);
    let mut verts: Vec<(i64, i64)> = out[0].iter().map(|p| (p.x, p.y)).collect();
    verts.sort();
    assert_eq!(verts, vec![(5, 5), (5, 10), (10, 5), (10, 10)]);
}

#[test]
fn overlapping_squares_difference() {
    let a = [square(0, 0, 10)];
    let b = [square(5, 5, 10)];
    let out = boolean_op(&a, &b, ClipType::Difference, FillRule::NonZero).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].len(), 6);
    assert_eq!(total_area(&out).abs(), 75.0);
}

#[test]
fn overlapping_squares_xor() {
    let a = [square(0, 0, 10)];
    let b = [square(5, 5, 10)];
    let out = boolean_op(&a, &b, ClipType::Xor, FillRule::NonZero).unwrap();
    assert_eq!(out.len(), 2);
    let total: f64 = out.iter().map(|p| signed_area(p).abs()).sum();
    assert_eq!(total, 150.0);
}

#[test]
fn contained_hole_builds_a_nested_tree() {
    let mut clipper = Clipper::new();
    clipper
        .add_path(&square(0, 0, 20), PathType::Subject, false)
        .unwrap();
    clipper
        .add_path(&square(5, 5, 10), PathType::Clip, false)
        .unwrap();
    let (tree, open) = clipper
        .execute_tree(ClipType::Difference, FillRule::NonZero)
        .unwrap();
    assert!(open.is_empty());
    assert_eq!(tree.top_level().len(), 1);
    let outer = tree.top_level()[0];
    assert!(!tree.is_hole(outer));
    assert_eq!(tree.children(outer).len(), 1);
    let hole = tree.child(outer, 0).unwrap();
    assert!(tree.is_hole(hole));

    // the hole lies strictly inside its parent
    let ox: Vec<i64> = tree.path(outer).iter().map(|p| p.x).collect();
    let oy: Vec<i64> = tree.path(outer).iter().map(|p| p.y).collect();
    for p in tree.path(hole) {
        assert!(p.x > *ox.iter().min().unwrap() && p.x < *ox.iter().max().unwrap());
        assert!(p.y > *oy.iter().min().unwrap() && p.y < *oy.iter().max().unwrap());
    }
}

#[test]
fn open_polyline_clipped_by_square() {
    let mut clipper = Clipper::new();
    clipper
        .add_path(&[pt(-5, 5), pt(25, 5)], PathType::Subject, true)
        .unwrap();
    clipper
        .add_path(&rect(0, 0, 20, 10), PathType::Clip, false)
        .unwrap();
    let (closed, open) = clipper
        .execute_open(ClipType::Intersection, FillRule::NonZero)
        .unwrap();
    assert!(closed.is_empty());
    assert_eq!(open, vec![vec![pt(0, 5), pt(20, 5)]]);
}

#[test]
fn open_results_are_discarded_without_a_channel() {
    let mut clipper = Clipper::new();
    clipper
        .add_path(&[pt(-5, 5), pt(25, 5)], PathType::Subject, true)
        .unwrap();
    clipper
        .add_path(&rect(0, 0, 20, 10), PathType::Clip, false)
        .unwrap();
    let closed = clipper
        .execute(ClipType::Intersection, FillRule::NonZero)
        .unwrap();
    assert!(closed.is_empty());
}

#[test]
fn open_line_through_nested_squares_union() {
    let mut clipper = Clipper::new();
    clipper
        .add_path(&[pt(-5, 10), pt(25, 10)], PathType::Subject, true)
        .unwrap();
    clipper
        .add_path(&square(0, 0, 20), PathType::Subject, false)
        .unwrap();
    clipper
        .add_path(&square(5, 5, 10), PathType::Clip, false)
        .unwrap();
    let (closed, open) = clipper
        .execute_open(ClipType::Union, FillRule::NonZero)
        .unwrap();

    // The union of the two squares is the outer square alone, so the line
    // is hidden on all of x in [0, 20]; the inner square's edges sit in a
    // solid interior and must not re-expose it.
    assert_eq!(closed.len(), 1);
    assert_eq!(total_area(&closed).abs(), 400.0);
    let mut segs: Vec<Vec<(i64, i64)>> = open
        .iter()
        .map(|path| path.iter().map(|q| (q.x, q.y)).collect())
        .collect();
    segs.sort();
    assert_eq!(
        segs,
        vec![vec![(-5, 10), (0, 10)], vec![(20, 10), (25, 10)]]
    );
}

/// Two results describe the same region when their symmetric difference
/// encloses nothing. This is robust against coincident boundary artifacts
/// (cancelling ring pairs), which a vertex-level comparison is not.
fn assert_same_region(a: &Paths, b: &Paths) {
    let sym = boolean_op(a, b, ClipType::Xor, FillRule::NonZero).unwrap();
    assert!(
        total_area(&sym).abs() < 1e-9,
        "regions differ by {sym:?}"
    );
    assert!((total_area(a).abs() - total_area(b).abs()).abs() < 1e-9);
}

#[test]
fn de_morgan_on_squares() {
    let bounds = vec![square(-20, -20, 50)];
    let a = vec![square(0, 0, 10)];
    let b = vec![square(5, 5, 10)];

    let not_a = boolean_op(&bounds, &a, ClipType::Difference, FillRule::NonZero).unwrap();
    let not_b = boolean_op(&bounds, &b, ClipType::Difference, FillRule::NonZero).unwrap();
    let neither = boolean_op(&not_a, &not_b, ClipType::Intersection, FillRule::NonZero).unwrap();
    let either = boolean_op(&bounds, &neither, ClipType::Difference, FillRule::NonZero).unwrap();

    let union = boolean_op(&a, &b, ClipType::Union, FillRule::NonZero).unwrap();
    assert_same_region(&either, &union);
}

// ---------------------------------------------------------------------------
// properties over random inputs
// ---------------------------------------------------------------------------

fn any_rect() -> impl Strategy<Value = Path> {
    (-50i64..50, -50i64..50, 1i64..30, 1i64..30).prop_map(|(l, t, w, h)| rect(l, t, w, h))
}

fn any_triangle() -> impl Strategy<Value = Path> {
    let coord = -50i64..50;
    let point = (coord.clone(), coord);
    (point.clone(), point.clone(), point)
        .prop_map(|(a, b, c)| vec![pt(a.0, a.1), pt(b.0, b.1), pt(c.0, c.1)])
        .prop_filter("degenerate triangle", |t| signed_area(t) != 0.0)
        .prop_map(|mut t| {
            if signed_area(&t) < 0.0 {
                t.reverse();
            }
            t
        })
}

fn any_shape_set() -> impl Strategy<Value = Paths> {
    prop::collection::vec(prop_oneof![any_rect(), any_triangle()], 1..4)
}

fn any_rect_set() -> impl Strategy<Value = Paths> {
    prop::collection::vec(any_rect(), 1..4)
}

/// Rectangles with even boundary coordinates; they can never share a
/// boundary segment with the odd-grid rectangles of [`any_offset_rect`].
fn any_even_rect() -> impl Strategy<Value = Path> {
    (-25i64..25, -25i64..25, 1i64..15, 1i64..15)
        .prop_map(|(l, t, w, h)| rect(2 * l, 2 * t, 2 * w, 2 * h))
}

fn any_even_rect_set() -> impl Strategy<Value = Paths> {
    prop::collection::vec(any_even_rect(), 1..4)
}

/// Rectangles with odd boundary coordinates.
fn any_offset_rect() -> impl Strategy<Value = Path> {
    (-25i64..25, -25i64..25, 1i64..15, 1i64..15)
        .prop_map(|(l, t, w, h)| rect(2 * l + 1, 2 * t + 1, 2 * w, 2 * h))
}

fn any_offset_rect_set() -> impl Strategy<Value = Paths> {
    prop::collection::vec(any_offset_rect(), 1..4)
}

fn any_fill_rule() -> impl Strategy<Value = FillRule> {
    prop_oneof![
        Just(FillRule::EvenOdd),
        Just(FillRule::NonZero),
        Just(FillRule::Positive),
        Just(FillRule::Negative),
    ]
}

fn any_clip_type() -> impl Strategy<Value = ClipType> {
    prop_oneof![
        Just(ClipType::Intersection),
        Just(ClipType::Union),
        Just(ClipType::Difference),
        Just(ClipType::Xor),
    ]
}

proptest! {
    /// |A ∪ B| + |A ∩ B| = |A| + |B|. Rectangles keep every crossing on
    /// the integer grid, so the identity holds exactly; slanted crossings
    /// would be rounded and perturb the two sides independently.
    #[test]
    fn union_and_intersection_partition_the_measure(
        a in any_rect_set(),
        b in any_rect_set(),
    ) {
        let union = total_area(&boolean_op(&a, &b, ClipType::Union, FillRule::NonZero).unwrap());
        let inter =
            total_area(&boolean_op(&a, &b, ClipType::Intersection, FillRule::NonZero).unwrap());
        let lhs = union + inter;
        let rhs = filled_area(&a, FillRule::NonZero) + filled_area(&b, FillRule::NonZero);
        prop_assert!((lhs - rhs).abs() < 1e-6, "lhs = {lhs}, rhs = {rhs}");
    }

    /// Coincident boundaries may survive as cancelling ring pairs, so the
    /// check is on the enclosed measure rather than the ring count.
    #[test]
    fn xor_with_self_encloses_nothing(a in any_rect_set(), fillrule in any_fill_rule()) {
        let out = boolean_op(&a, &a, ClipType::Xor, fillrule).unwrap();
        prop_assert!(total_area(&out).abs() < 1e-9, "xor(A, A) produced {out:?}");
    }

    #[test]
    fn difference_is_antisymmetric(a in any_shape_set(), b in any_shape_set()) {
        let ab = boolean_op(&a, &b, ClipType::Difference, FillRule::NonZero).unwrap();
        let ba = boolean_op(&b, &a, ClipType::Difference, FillRule::NonZero).unwrap();
        let both = boolean_op(&ab, &ba, ClipType::Intersection, FillRule::NonZero).unwrap();
        prop_assert!(total_area(&both).abs() < 1e-6, "A\\B and B\\A overlap: {both:?}");
    }

    /// Commutative up to ring ordering and vertex rotation; with offset
    /// grids the boundaries cannot coincide, so the comparison can be
    /// vertex-exact.
    #[test]
    fn union_and_intersection_commute(a in any_even_rect_set(), b in any_offset_rect_set()) {
        let u1 = boolean_op(&a, &b, ClipType::Union, FillRule::NonZero).unwrap();
        let u2 = boolean_op(&b, &a, ClipType::Union, FillRule::NonZero).unwrap();
        prop_assert_eq!(canonical(&u1), canonical(&u2));
        let i1 = boolean_op(&a, &b, ClipType::Intersection, FillRule::NonZero).unwrap();
        let i2 = boolean_op(&b, &a, ClipType::Intersection, FillRule::NonZero).unwrap();
        prop_assert_eq!(canonical(&i1), canonical(&i2));
    }

    /// Every emitted closed polygon is a real polygon. Subject and clip
    /// live on offset grids, so no boundary segment can coincide; exactly
    /// shared boundaries are covered by the deterministic scenarios.
    #[test]
    fn closed_outputs_are_nondegenerate(
        a in any_even_rect_set(),
        b in any_offset_rect_set(),
        cliptype in any_clip_type(),
        fillrule in any_fill_rule(),
    ) {
        for path in boolean_op(&a, &b, cliptype, fillrule).unwrap() {
            prop_assert!(path.len() >= 3, "short path {path:?}");
            prop_assert!(signed_area(&path) != 0.0, "zero-area path {path:?}");
        }
    }
}
