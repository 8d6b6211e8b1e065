//! Pure functions of a single curve: evaluation, tangents, monotone splitting
//! and the small solvers that the rest of the engine leans on.
//!
//! All of the engine's curves are monotone in both `x` and `y` (see
//! [`monotone_pieces`]). That makes a lot of things easy: the bounding box of any
//! sub-range is the box spanned by its endpoints, and a horizontal or vertical
//! line crosses it at most once.

use arrayvec::ArrayVec;
use kurbo::{ParamCurve, ParamCurveExtrema, ParamCurveNearest, PathSeg, Point, Rect, Vec2};

/// The kind of a segment, ordered from simplest to most complex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verb {
    Line,
    Quad,
    Cubic,
}

pub fn verb(seg: &PathSeg) -> Verb {
    match seg {
        PathSeg::Line(_) => Verb::Line,
        PathSeg::Quad(_) => Verb::Quad,
        PathSeg::Cubic(_) => Verb::Cubic,
    }
}

/// The control points of a segment, in order.
pub fn control_points(seg: &PathSeg) -> ArrayVec<Point, 4> {
    let mut ret = ArrayVec::new();
    match *seg {
        PathSeg::Line(l) => {
            ret.push(l.p0);
            ret.push(l.p1);
        }
        PathSeg::Quad(q) => {
            ret.push(q.p0);
            ret.push(q.p1);
            ret.push(q.p2);
        }
        PathSeg::Cubic(c) => {
            ret.push(c.p0);
            ret.push(c.p1);
            ret.push(c.p2);
            ret.push(c.p3);
        }
    }
    ret
}

/// Replaces the endpoints of a segment, leaving interior control points alone.
pub fn with_endpoints(seg: PathSeg, start: Point, end: Point) -> PathSeg {
    match seg {
        PathSeg::Line(mut l) => {
            l.p0 = start;
            l.p1 = end;
            PathSeg::Line(l)
        }
        PathSeg::Quad(mut q) => {
            q.p0 = start;
            q.p2 = end;
            PathSeg::Quad(q)
        }
        PathSeg::Cubic(mut c) => {
            c.p0 = start;
            c.p3 = end;
            PathSeg::Cubic(c)
        }
    }
}

/// The first derivative at `t`.
pub fn deriv(seg: &PathSeg, t: f64) -> Vec2 {
    let mt = 1.0 - t;
    match *seg {
        PathSeg::Line(l) => l.p1 - l.p0,
        PathSeg::Quad(q) => 2.0 * (mt * (q.p1 - q.p0) + t * (q.p2 - q.p1)),
        PathSeg::Cubic(c) => {
            3.0 * (mt * mt * (c.p1 - c.p0) + 2.0 * mt * t * (c.p2 - c.p1) + t * t * (c.p3 - c.p2))
        }
    }
}

/// The second derivative at `t`.
pub fn deriv2(seg: &PathSeg, t: f64) -> Vec2 {
    match *seg {
        PathSeg::Line(_) => Vec2::ZERO,
        PathSeg::Quad(q) => 2.0 * ((q.p2 - q.p1) - (q.p1 - q.p0)),
        PathSeg::Cubic(c) => {
            let a = (c.p2 - c.p1) - (c.p1 - c.p0);
            let b = (c.p3 - c.p2) - (c.p2 - c.p1);
            6.0 * ((1.0 - t) * a + t * b)
        }
    }
}

/// The direction in which the curve leaves the point at `t`.
///
/// If `forward` is true, this is the direction of increasing `t`; otherwise
/// it's the direction of decreasing `t`. At a cusp (where the derivative
/// vanishes, for example because a control point coincides with an endpoint)
/// we fall back to the second derivative and then to the chord.
pub fn tangent_out(seg: &PathSeg, t: f64, forward: bool) -> Vec2 {
    let sign = if forward { 1.0 } else { -1.0 };
    let scale = control_scale(seg);
    let d = deriv(seg, t);
    if d.hypot() > scale * 1e-12 {
        return sign * d;
    }
    // Near a zero of the derivative, the curve moves like t^2 * deriv2, so its
    // direction is that of deriv2 in both directions.
    let dd = deriv2(seg, t);
    if dd.hypot() > scale * 1e-12 {
        return dd;
    }
    let far = if forward { seg.end() } else { seg.start() };
    far - seg.eval(t)
}

/// The signed curvature of the curve as it leaves the point at `t`.
///
/// Positive values turn counter-clockwise (in the usual mathematical orientation,
/// where the cross product of `(1, 0)` and `(0, 1)` is positive).
pub fn curvature_out(seg: &PathSeg, t: f64, forward: bool) -> f64 {
    let d = deriv(seg, t);
    let len = d.hypot();
    if len <= control_scale(seg) * 1e-12 {
        return 0.0;
    }
    // Reversing the parameterization flips the first derivative but not the second.
    let d = if forward { d } else { -d };
    d.cross(deriv2(seg, t)) / (len * len * len)
}

fn control_scale(seg: &PathSeg) -> f64 {
    let pts = control_points(seg);
    let mut scale: f64 = 0.0;
    for w in pts.windows(2) {
        scale = scale.max((w[1] - w[0]).hypot());
    }
    scale.max(f64::MIN_POSITIVE)
}

/// The largest distance between an interior control point and the chord.
///
/// The curve lies in the convex hull of its control points, so this bounds how
/// far the curve strays from a straight line.
pub fn flatness(seg: &PathSeg) -> f64 {
    let pts = control_points(seg);
    let start = seg.start();
    let chord = seg.end() - start;
    let len = chord.hypot();
    let interior = &pts[1..pts.len() - 1];
    if len == 0.0 {
        return interior
            .iter()
            .map(|p| (*p - start).hypot())
            .fold(0.0, f64::max);
    }
    interior
        .iter()
        .map(|p| (chord.cross(*p - start) / len).abs())
        .fold(0.0, f64::max)
}

/// The bounding box of a segment.
pub fn bounds(seg: &PathSeg) -> Rect {
    ParamCurveExtrema::bounding_box(seg)
}

pub fn rects_overlap(a: &Rect, b: &Rect, slop: f64) -> bool {
    a.x0 <= b.x1 + slop && b.x0 <= a.x1 + slop && a.y0 <= b.y1 + slop && b.y0 <= a.y1 + slop
}

/// Splits a segment into pieces that are monotone in both `x` and `y`.
///
/// Adjacent pieces share bit-identical endpoints, and the first and last pieces
/// start and end exactly where `seg` does. Splits that would produce a piece
/// shorter than `eps` are skipped.
pub fn monotone_pieces(seg: PathSeg, eps: f64) -> Vec<PathSeg> {
    if let PathSeg::Line(_) = seg {
        return vec![seg];
    }
    let mut extrema: ArrayVec<f64, 4> = seg.extrema().into_iter().collect();
    extrema.sort_by(f64::total_cmp);
    let mut splits = Vec::new();
    let mut last_pt = seg.start();
    for t in extrema {
        let p = seg.eval(t);
        if (p - last_pt).hypot() > eps && (seg.end() - p).hypot() > eps {
            splits.push(t);
            last_pt = p;
        }
    }

    let mut ret = Vec::with_capacity(splits.len() + 1);
    let mut t0 = 0.0;
    let mut start = seg.start();
    for t1 in splits.into_iter().chain(std::iter::once(1.0)) {
        let end = if t1 == 1.0 { seg.end() } else { seg.eval(t1) };
        let piece = seg.subsegment(t0..t1);
        ret.push(with_endpoints(piece, start, end));
        t0 = t1;
        start = end;
    }
    ret
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub fn of(self, p: Point) -> f64 {
        match self {
            Axis::X => p.x,
            Axis::Y => p.y,
        }
    }

    pub fn other(self) -> Axis {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
        }
    }
}

/// Finds the parameter in `[t0, t1]` at which a monotone segment reaches `value`
/// along `axis`.
///
/// The caller guarantees that `value` is between the coordinates at `t0` and
/// `t1`; if it isn't, we return whichever end is closer.
pub fn solve_monotone(seg: &PathSeg, t0: f64, t1: f64, axis: Axis, value: f64) -> f64 {
    let v0 = axis.of(seg.eval(t0));
    let v1 = axis.of(seg.eval(t1));
    if value == v0 {
        return t0;
    }
    if value == v1 {
        return t1;
    }
    let increasing = v1 > v0;
    let (mut lo, mut hi) = (t0, t1);
    if (value < v0.min(v1)) || (value > v0.max(v1)) {
        return if (value - v0).abs() <= (value - v1).abs() {
            t0
        } else {
            t1
        };
    }
    // Plain bisection: it's the only thing that's guaranteed not to escape the
    // bracket, and we only need it for ray casting.
    for _ in 0..64 {
        let mid = 0.5 * (lo + hi);
        if mid <= lo || mid >= hi {
            break;
        }
        let v = axis.of(seg.eval(mid));
        if (v < value) == increasing {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// The parameter of the point on `seg` nearest to `p`, and the distance to it.
pub fn nearest(seg: &PathSeg, p: Point) -> (f64, f64) {
    let nearest = seg.nearest(p, 1e-12);
    (nearest.t, nearest.distance_sq.sqrt())
}

/// Checks whether the point at `t` on `a` lies on `b`.
///
/// We drop a perpendicular from the point onto `b` (which is what the nearest
/// point is, away from `b`'s endpoints) and ask that it land within `eps`, and
/// that the two curves run in parallel there. On success, returns the
/// parameter of the foot of the perpendicular on `b`.
pub fn is_close(a: &PathSeg, t: f64, b: &PathSeg, eps: f64) -> Option<f64> {
    let p = a.eval(t);
    let (tb, dist) = nearest(b, p);
    if dist > eps {
        return None;
    }
    let da = tangent_out(a, t, true);
    let db = tangent_out(b, tb, true);
    let sin = da.cross(db) / (da.hypot() * db.hypot());
    // Anything this far out of parallel would leave `b` within a few eps.
    if sin.is_finite() && sin.abs() < 1e-3 {
        Some(tb)
    } else {
        None
    }
}
