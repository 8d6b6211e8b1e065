use assert_matches::assert_matches;
use kurbo::{BezPath, ParamCurveNearest, Point, Shape};
use pathops::{binary_op, binary_op_with_fill_rules, simplify, BinaryOp, Contours, Error, FillRule};
use proptest::prelude::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> BezPath {
    let mut p = BezPath::new();
    p.move_to((x0, y0));
    p.line_to((x1, y0));
    p.line_to((x1, y1));
    p.line_to((x0, y1));
    p.close_path();
    p
}

fn unit_square(dx: f64, dy: f64) -> BezPath {
    rect(dx, dy, dx + 1.0, dy + 1.0)
}

fn area(c: &Contours) -> f64 {
    c.contours().map(|c| c.path.area()).sum()
}

fn vertices(c: &Contours) -> Vec<usize> {
    c.contours().map(|c| c.path.segments().count()).collect()
}

fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-9, "{a} != {b}");
}

#[test]
fn vertical_shift() {
    init_logging();
    let a = unit_square(0.0, 0.0);
    let b = unit_square(0.0, 0.5);

    let union = binary_op(&a, &b, FillRule::NonZero, BinaryOp::Union).unwrap();
    assert_eq!(vertices(&union), vec![4]);
    assert_close(area(&union), 1.5);

    let inter = binary_op(&a, &b, FillRule::NonZero, BinaryOp::Intersection).unwrap();
    assert_eq!(vertices(&inter), vec![4]);
    assert_close(area(&inter), 0.5);

    let diff = binary_op(&a, &b, FillRule::NonZero, BinaryOp::Difference).unwrap();
    assert_eq!(vertices(&diff), vec![4]);
    assert_close(area(&diff), 0.5);

    let xor = binary_op(&a, &b, FillRule::NonZero, BinaryOp::Xor).unwrap();
    assert_eq!(xor.len(), 2);
    for c in xor.contours() {
        assert_close(c.path.area(), 0.5);
        assert!(c.outer);
        assert!(c.parent.is_none());
    }
}

#[test]
fn diagonal_shift() {
    init_logging();
    let a = unit_square(0.0, 0.0);
    let b = unit_square(0.5, 0.5);

    let union = binary_op(&a, &b, FillRule::NonZero, BinaryOp::Union).unwrap();
    assert_eq!(vertices(&union), vec![8]);
    assert_close(area(&union), 1.75);

    let diff = binary_op(&a, &b, FillRule::NonZero, BinaryOp::Difference).unwrap();
    assert_eq!(vertices(&diff), vec![6]);
    assert_close(area(&diff), 0.75);

    let inter = binary_op(&a, &b, FillRule::EvenOdd, BinaryOp::Intersection).unwrap();
    assert_eq!(vertices(&inter), vec![4]);
    assert_close(area(&inter), 0.25);

    let xor = binary_op(&a, &b, FillRule::EvenOdd, BinaryOp::Xor).unwrap();
    assert_eq!(xor.len(), 2);
    assert_close(area(&xor), 1.5);
}

#[test]
fn identical_squares() {
    init_logging();
    let a = unit_square(0.0, 0.0);

    let union = binary_op(&a, &a, FillRule::NonZero, BinaryOp::Union).unwrap();
    assert_eq!(vertices(&union), vec![4]);
    assert_close(area(&union), 1.0);

    let inter = binary_op(&a, &a, FillRule::NonZero, BinaryOp::Intersection).unwrap();
    assert_close(area(&inter), 1.0);

    assert!(binary_op(&a, &a, FillRule::NonZero, BinaryOp::Difference)
        .unwrap()
        .is_empty());
    assert!(binary_op(&a, &a, FillRule::EvenOdd, BinaryOp::Xor)
        .unwrap()
        .is_empty());
}

#[test]
fn reversed_operand_cancels() {
    init_logging();
    let a = unit_square(0.0, 0.0);
    let mut b = BezPath::new();
    b.move_to((0.0, 0.0));
    b.line_to((0.0, 1.0));
    b.line_to((1.0, 1.0));
    b.line_to((1.0, 0.0));
    b.close_path();

    // Orientation doesn't matter for a single operand.
    let union = binary_op(&a, &b, FillRule::NonZero, BinaryOp::Union).unwrap();
    assert_close(area(&union), 1.0);

    // But it does within one operand.
    let mut both = a.clone();
    both.extend(b.elements().iter().copied());
    assert!(simplify(&both, FillRule::NonZero).unwrap().is_empty());
    assert!(simplify(&both, FillRule::EvenOdd).unwrap().is_empty());
}

#[test]
fn hole_has_parent() {
    init_logging();
    let outer = rect(0.0, 0.0, 4.0, 4.0);
    let inner = rect(1.0, 1.0, 3.0, 3.0);
    let diff = binary_op(&outer, &inner, FillRule::NonZero, BinaryOp::Difference).unwrap();
    assert_eq!(diff.len(), 2);
    assert_close(area(&diff), 12.0);

    let groups = diff.grouped();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
    let (top, hole) = (groups[0][0], groups[0][1]);
    assert!(diff[top].outer);
    assert!(!diff[hole].outer);
    assert_eq!(diff[hole].parent, Some(top));
    assert_close(diff[hole].path.area(), -4.0);
}

#[test]
fn per_operand_fill_rules() {
    init_logging();
    // Two copies of the same square in one operand: winding 2.
    let mut doubled = unit_square(0.0, 0.0);
    doubled.extend(unit_square(0.0, 0.0).elements().iter().copied());
    let other = unit_square(0.5, 0.0);

    let nonzero = binary_op_with_fill_rules(
        &doubled,
        FillRule::NonZero,
        &other,
        FillRule::NonZero,
        BinaryOp::Union,
    )
    .unwrap();
    assert_close(area(&nonzero), 1.5);

    // Under even-odd, the doubled square is empty.
    let even_odd = binary_op_with_fill_rules(
        &doubled,
        FillRule::EvenOdd,
        &other,
        FillRule::NonZero,
        BinaryOp::Union,
    )
    .unwrap();
    assert_close(area(&even_odd), 1.0);
}

#[test]
fn simplify_bowtie() {
    init_logging();
    let mut bowtie = BezPath::new();
    bowtie.move_to((0.0, 0.0));
    bowtie.line_to((2.0, 2.0));
    bowtie.line_to((2.0, 0.0));
    bowtie.line_to((0.0, 2.0));
    bowtie.close_path();

    let out = simplify(&bowtie, FillRule::NonZero).unwrap();
    assert_eq!(vertices(&out), vec![3, 3]);
    // Both lobes come out counter-clockwise, even though the input goes around
    // one of them clockwise.
    for c in out.contours() {
        assert_close(c.path.area(), 1.0);
        assert!(c.outer);
    }
}

#[test]
fn simplify_overlapping_squares() {
    init_logging();
    let mut p = rect(0.0, 0.0, 2.0, 2.0);
    p.extend(rect(1.0, 1.0, 3.0, 3.0).elements().iter().copied());

    let nonzero = simplify(&p, FillRule::NonZero).unwrap();
    assert_eq!(vertices(&nonzero), vec![8]);
    assert_close(area(&nonzero), 7.0);

    let even_odd = simplify(&p, FillRule::EvenOdd).unwrap();
    assert_close(area(&even_odd), 6.0);
}

/// Two shapes whose boundaries leave the origin along cubics that agree in
/// tangent and curvature there.
fn tangent_cubics() -> (BezPath, BezPath) {
    let mut a = BezPath::new();
    a.move_to((0.0, 0.0));
    a.curve_to((1.0, 0.0), (2.0, 1.0), (3.0, 3.0));
    a.line_to((3.0, -1.0));
    a.curve_to((2.0, 1.0), (1.0, 0.0), (0.0, 0.0));
    a.close_path();

    let mut b = BezPath::new();
    b.move_to((0.0, 0.0));
    b.curve_to((1.0, 0.0), (2.0, 1.0), (4.0, 5.0));
    b.line_to((4.0, -3.0));
    b.curve_to((2.0, 1.0), (1.0, 0.0), (0.0, 0.0));
    b.close_path();
    (a, b)
}

#[test]
fn unorderable_junction_is_reported() {
    init_logging();
    let (a, b) = tangent_cubics();
    assert!(binary_op(&a, &b, FillRule::NonZero, BinaryOp::Union).is_err());

    // On its own, each shape only has two edges at the origin.
    let alone = simplify(&b, FillRule::NonZero).unwrap();
    assert_eq!(alone.len(), 1);
    // The input runs clockwise, but the output is always counter-clockwise.
    assert_close(area(&alone), -b.area());
}

#[test]
fn curves_keep_their_verbs() {
    init_logging();
    let circle = |cx: f64| kurbo::Circle::new((cx, 0.0), 10.0).to_path(0.1);
    let (a, b) = (circle(0.0), circle(5.0));

    let union = binary_op(&a, &b, FillRule::NonZero, BinaryOp::Union).unwrap();
    let inter = binary_op(&a, &b, FillRule::NonZero, BinaryOp::Intersection).unwrap();
    assert_eq!(union.len(), 1);
    assert_eq!(inter.len(), 1);
    assert!(union
        .to_bez_path()
        .elements()
        .iter()
        .any(|el| matches!(el, kurbo::PathEl::CurveTo(..))));
    let total = area(&union) + area(&inter);
    assert!((total - a.area() - b.area()).abs() < 1e-6);
}

#[test]
fn invalid_input() {
    let good = unit_square(0.0, 0.0);
    let mut nan = BezPath::new();
    nan.move_to((0.0, 0.0));
    nan.line_to((f64::NAN, 1.0));
    nan.line_to((1.0, 0.0));
    let mut inf = BezPath::new();
    inf.move_to((0.0, 0.0));
    inf.line_to((f64::NEG_INFINITY, 1.0));
    inf.line_to((1.0, 0.0));

    for op in [BinaryOp::Union, BinaryOp::Difference] {
        assert_matches!(binary_op(&good, &nan, FillRule::NonZero, op), Err(Error::NaN));
        assert_matches!(binary_op(&inf, &good, FillRule::NonZero, op), Err(Error::Infinity));
    }
    assert_matches!(simplify(&inf, FillRule::EvenOdd), Err(Error::Infinity));
}

proptest! {
    #[test]
    fn rectangle_areas_add_up(
        x0 in -10.0f64..10.0, y0 in -10.0f64..10.0, w0 in 0.5f64..10.0, h0 in 0.5f64..10.0,
        x1 in -10.0f64..10.0, y1 in -10.0f64..10.0, w1 in 0.5f64..10.0, h1 in 0.5f64..10.0,
    ) {
        let a = rect(x0, y0, x0 + w0, y0 + h0);
        let b = rect(x1, y1, x1 + w1, y1 + h1);
        let area_of = |op| area(&binary_op(&a, &b, FillRule::NonZero, op).unwrap());

        let union = area_of(BinaryOp::Union);
        let inter = area_of(BinaryOp::Intersection);
        let diff = area_of(BinaryOp::Difference);
        let xor = area_of(BinaryOp::Xor);
        let tol = 1e-6 * (1.0 + union.abs());

        prop_assert!((union + inter - a.area() - b.area()).abs() < tol);
        prop_assert!((diff + inter - a.area()).abs() < tol);
        prop_assert!((xor + inter - union).abs() < tol);
        prop_assert!(inter >= -tol);
    }
}

/// Is `p` in the result of `op`, going by the inputs' own winding numbers?
fn expected_inside(a: &BezPath, b: &BezPath, op: BinaryOp, p: Point) -> bool {
    let (in_a, in_b) = (a.winding(p) != 0, b.winding(p) != 0);
    match op {
        BinaryOp::Union => in_a || in_b,
        BinaryOp::Intersection => in_a && in_b,
        BinaryOp::Difference => in_a && !in_b,
        BinaryOp::Xor => in_a != in_b,
    }
}

fn near_boundary(paths: &[&BezPath], p: Point) -> bool {
    paths
        .iter()
        .flat_map(|path| path.segments())
        .any(|seg| seg.nearest(p, 1e-9).distance_sq < 1e-6)
}

/// Samples a grid covering both inputs, and returns the points where the
/// output disagrees with the inputs' winding numbers.
fn wrong_samples(a: &BezPath, b: &BezPath, op: BinaryOp, out: &Contours) -> Vec<Point> {
    let out = out.to_bez_path();
    let bbox = a.bounding_box().union(b.bounding_box()).inflate(0.5, 0.5);
    let n = 40;
    let mut wrong = Vec::new();
    for i in 0..n {
        for j in 0..n {
            // Offset from the grid, so that samples don't sit on integer coordinates.
            let x = bbox.x0 + bbox.width() * (i as f64 + 0.37) / n as f64;
            let y = bbox.y0 + bbox.height() * (j as f64 + 0.61) / n as f64;
            let p = Point::new(x, y);
            if near_boundary(&[a, b], p) {
                continue;
            }
            if (out.winding(p) != 0) != expected_inside(a, b, op, p) {
                wrong.push(p);
            }
        }
    }
    wrong
}

const OPS: [BinaryOp; 4] = [
    BinaryOp::Union,
    BinaryOp::Intersection,
    BinaryOp::Difference,
    BinaryOp::Xor,
];

fn check_all_ops(a: &BezPath, b: &BezPath, must_succeed: &[BinaryOp]) {
    for op in OPS {
        match binary_op(a, b, FillRule::NonZero, op) {
            Ok(out) => {
                let wrong = wrong_samples(a, b, op, &out);
                assert!(wrong.is_empty(), "{op:?} is wrong at {wrong:?}");
            }
            Err(e) => assert!(!must_succeed.contains(&op), "{op:?} failed: {e}"),
        }
    }
}

#[test]
fn quad_doubling_back() {
    init_logging();
    // The quad runs out along y = 2x and comes part of the way back.
    let a = BezPath::from_svg("M0,0 Q2,4 1,2 L0,1 Z").unwrap();
    let b = BezPath::from_svg("M0,3 Q0,0 1,1 L4,4 Z").unwrap();
    check_all_ops(&a, &b, &[BinaryOp::Intersection]);

    // The meeting point is where b's quad actually crosses y = 2x.
    let inter = binary_op(&a, &b, FillRule::NonZero, BinaryOp::Intersection).unwrap();
    let t = 3f64.sqrt() / (1.0 + 3f64.sqrt());
    let crossing = Point::new(t * t, 2.0 * t * t);
    let has_crossing = inter
        .to_bez_path()
        .segments()
        .any(|seg| seg.nearest(crossing, 1e-9).distance_sq < 1e-10);
    assert!(has_crossing);
}

#[test]
fn cubic_doubling_back() {
    init_logging();
    // The cubic runs down x = 2 and comes back up.
    let a = BezPath::from_svg("M2,4 C2,3 2,0 2,2 L0,1 Z").unwrap();
    let b = BezPath::from_svg("M4,1 C2,1 4,2 1,4 L1,0 Z").unwrap();
    check_all_ops(&a, &b, &[BinaryOp::Union]);
}

fn grid_point() -> impl Strategy<Value = Point> {
    (0..=4i32, 0..=4i32).prop_map(|(x, y)| Point::new(x as f64, y as f64))
}

fn quad_shape() -> impl Strategy<Value = BezPath> {
    prop::array::uniform4(grid_point()).prop_map(|[p0, p1, p2, p3]| {
        let mut p = BezPath::new();
        p.move_to(p0);
        p.quad_to(p1, p2);
        p.line_to(p3);
        p.close_path();
        p
    })
}

fn cubic_shape() -> impl Strategy<Value = BezPath> {
    prop::array::uniform5(grid_point()).prop_map(|[p0, p1, p2, p3, p4]| {
        let mut p = BezPath::new();
        p.move_to(p0);
        p.curve_to(p1, p2, p3);
        p.line_to(p4);
        p.close_path();
        p
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Failing is allowed; succeeding with the wrong answer isn't.
    #[test]
    fn quads_match_winding(a in quad_shape(), b in quad_shape()) {
        for op in OPS {
            if let Ok(out) = binary_op(&a, &b, FillRule::NonZero, op) {
                let wrong = wrong_samples(&a, &b, op, &out);
                prop_assert!(wrong.is_empty(), "{:?} is wrong at {:?}", op, wrong);
            }
        }
    }

    #[test]
    fn cubics_match_winding(a in cubic_shape(), b in cubic_shape()) {
        for op in OPS {
            if let Ok(out) = binary_op(&a, &b, FillRule::NonZero, op) {
                let wrong = wrong_samples(&a, &b, op, &out);
                prop_assert!(wrong.is_empty(), "{:?} is wrong at {:?}", op, wrong);
            }
        }
    }
}
