//! Turning walked loops into output paths.

use kurbo::{BezPath, Line, ParamCurve, PathSeg, Point, Shape};

use crate::{context::OpContext, curve::with_endpoints, walk::Piece};

/// An index for a [`Contour`] within [`Contours`].
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, serde::Serialize)]
pub struct ContourIdx(pub usize);

/// A simple, closed path.
///
/// As you walk along a contour, the filled part of the result is on your
/// left. This means that outer contours wind counter-clockwise (in the
/// usual mathematical orientation, with the y axis pointing up) and holes
/// wind clockwise.
#[derive(Clone, Debug, serde::Serialize)]
pub struct Contour {
    /// The contour's geometry: a single closed subpath.
    pub path: BezPath,

    /// The smallest other contour surrounding this one, if there is one.
    ///
    /// A square with a diamond-shaped hole is represented as a square contour
    /// with no parent, and a diamond contour with the square as its parent.
    pub parent: Option<ContourIdx>,

    /// Whether this contour bounds the filled region from the outside.
    ///
    /// Outer contours have positive signed area; holes have negative signed area.
    pub outer: bool,
}

/// A collection of [`Contour`]s.
///
/// Can be indexed with a [`ContourIdx`].
#[derive(Clone, Debug, serde::Serialize, Default)]
pub struct Contours {
    contours: Vec<Contour>,
}

impl Contours {
    /// Returns all of the contour indices, grouped by containment.
    ///
    /// For each of the inner vecs, the first element is a contour with no
    /// parent. All of the other contours in that inner vec lie inside that
    /// first contour.
    pub fn grouped(&self) -> Vec<Vec<ContourIdx>> {
        let mut children = vec![Vec::new(); self.contours.len()];
        let mut top_level = Vec::new();
        for (i, contour) in self.contours.iter().enumerate() {
            if let Some(parent) = contour.parent {
                children[parent.0].push(ContourIdx(i));
            } else {
                top_level.push(ContourIdx(i));
            }
        }

        let mut ret = Vec::with_capacity(top_level.len());
        for top in top_level {
            let mut tree = Vec::new();
            fn visit(idx: ContourIdx, children: &[Vec<ContourIdx>], acc: &mut Vec<ContourIdx>) {
                acc.push(idx);
                for &child in &children[idx.0] {
                    visit(child, children, acc);
                }
            }
            visit(top, &children, &mut tree);
            ret.push(tree);
        }

        ret
    }

    /// Iterates over all of the contours.
    pub fn contours(&self) -> impl Iterator<Item = &Contour> + '_ {
        self.contours.iter()
    }

    /// The number of contours.
    pub fn len(&self) -> usize {
        self.contours.len()
    }

    /// Is the result empty?
    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }

    /// All the contours, as subpaths of one path.
    pub fn to_bez_path(&self) -> BezPath {
        let mut ret = BezPath::new();
        for c in &self.contours {
            ret.extend(c.path.elements().iter().copied());
        }
        ret
    }
}

impl std::ops::Index<ContourIdx> for Contours {
    type Output = Contour;

    fn index(&self, index: ContourIdx) -> &Self::Output {
        &self.contours[index.0]
    }
}

/// Are `a` and `b` (which meet end to start) really one line?
fn collinear(a: &Line, b: &Line, eps: f64) -> bool {
    let (u, v) = (a.p1 - a.p0, b.p1 - b.p0);
    if u.dot(v) <= 0.0 {
        return false;
    }
    let whole = b.p1 - a.p0;
    let len = whole.hypot();
    len > 0.0 && (whole.cross(a.p1 - a.p0) / len).abs() <= eps
}

fn degenerate(seg: &PathSeg) -> bool {
    match seg {
        PathSeg::Line(l) => l.p0 == l.p1,
        PathSeg::Quad(q) => q.p0 == q.p1 && q.p1 == q.p2,
        PathSeg::Cubic(c) => c.p0 == c.p1 && c.p1 == c.p2 && c.p2 == c.p3,
    }
}

impl OpContext {
    /// The geometry of a walked loop, with adjacent collinear lines merged.
    fn loop_segments(&self, pieces: &[Piece]) -> Vec<PathSeg> {
        let mut out: Vec<PathSeg> = Vec::with_capacity(pieces.len());
        for piece in pieces {
            let Some(next) = self.spans[piece.span].next else {
                continue;
            };
            let curve = &self.segments[self.spans[piece.span].segment].curve;
            let sub = curve.subsegment(self.span_t(piece.span)..self.span_t(next));
            // Pin the ends to the junctions, so that consecutive pieces meet exactly.
            let sub = with_endpoints(sub, self.span_pt(piece.span), self.span_pt(next));
            let sub = if piece.forward { sub } else { sub.reverse() };
            if degenerate(&sub) {
                continue;
            }
            if let (Some(PathSeg::Line(last)), PathSeg::Line(line)) = (out.last_mut(), &sub) {
                if collinear(last, line, self.eps) {
                    last.p1 = line.p1;
                    continue;
                }
            }
            out.push(sub);
        }

        // The loop may start in the middle of a straight run.
        while out.len() > 2 {
            let (Some(PathSeg::Line(first)), Some(PathSeg::Line(last))) = (out.first(), out.last())
            else {
                break;
            };
            if !collinear(last, first, self.eps) {
                break;
            }
            let start = last.p0;
            out.pop();
            if let Some(PathSeg::Line(first)) = out.first_mut() {
                first.p0 = start;
            }
        }
        out
    }

    fn loop_path(&self, pieces: &[Piece]) -> Option<BezPath> {
        let segs = self.loop_segments(pieces);
        let first = segs.first()?;
        let start: Point = first.start();
        let mut path = BezPath::new();
        path.move_to(start);
        let n = segs.len();
        for (i, seg) in segs.iter().enumerate() {
            match seg {
                PathSeg::Line(l) if i + 1 == n && l.p1 == start => {}
                PathSeg::Line(l) => path.line_to(l.p1),
                PathSeg::Quad(q) => path.quad_to(q.p1, q.p2),
                PathSeg::Cubic(c) => path.curve_to(c.p1, c.p2, c.p3),
            }
        }
        path.close_path();
        Some(path)
    }

    /// Converts walked loops into contours, and works out which ones are nested in which.
    pub fn write_contours(&self, loops: &[Vec<Piece>]) -> Contours {
        let paths: Vec<BezPath> = loops.iter().filter_map(|l| self.loop_path(l)).collect();
        let areas: Vec<f64> = paths.iter().map(|p| p.area()).collect();

        let mut contours = Vec::with_capacity(paths.len());
        for (i, path) in paths.iter().enumerate() {
            let sample = path.segments().next().map(|s| s.eval(0.5));
            let parent = sample.and_then(|p| {
                (0..paths.len())
                    .filter(|&j| j != i && areas[j].abs() > areas[i].abs())
                    .filter(|&j| paths[j].winding(p) != 0)
                    .min_by(|&x, &y| areas[x].abs().total_cmp(&areas[y].abs()))
            });
            contours.push(Contour {
                path: path.clone(),
                parent: parent.map(ContourIdx),
                outer: areas[i] > 0.0,
            });
        }
        log::debug!("wrote {} contours", contours.len());
        Contours { contours }
    }
}
