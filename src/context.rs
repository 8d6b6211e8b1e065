//! The state of a single boolean operation.
//!
//! Everything an operation creates (segments, span boundaries, PtTs, angles,
//! coincidence records) lives in arenas owned by an [`OpContext`] and refers
//! to everything else by index. The context is built, driven through the
//! pipeline in [`OpContext::run`], and then dropped.

use kurbo::{BezPath, CubicBez, Line, ParamCurve, PathEl, PathSeg, Point, QuadBez};

use crate::{
    angle::{Angle, AngleRing, AngleVec},
    coincidence::CoinSpans,
    curve::{self, monotone_pieces, rects_overlap},
    disjoint_sets::DisjointSets,
    intersect::{intersect, Intersections},
    segment::{PtT, PtTIdx, PtTVec, SegIdx, Segment, SegmentVec, SpanBase, SpanIdx, SpanVec},
    winding::Operation,
    writer::Contours,
    Error, FillRule,
};

/// All the state of one boolean operation.
#[derive(Debug)]
pub struct OpContext {
    /// Points closer than this are considered the same.
    pub eps: f64,
    /// The fill rule of each operand, indexed by [`Segment::operand`].
    pub fill: [FillRule; 2],
    pub ptts: PtTVec<PtT>,
    pub spans: SpanVec<SpanBase>,
    pub segments: SegmentVec<Segment>,
    /// PtTs that name the same location.
    pub rings: DisjointSets<PtTIdx>,
    /// Spans that run along each other.
    pub coincident: DisjointSets<SpanIdx>,
    pub coincidences: Vec<CoinSpans>,
    pub angles: AngleVec<Angle>,
    pub angle_rings: Vec<AngleRing>,
}

impl OpContext {
    pub fn new(eps: f64, fill: [FillRule; 2]) -> OpContext {
        OpContext {
            eps,
            fill,
            ptts: Default::default(),
            spans: Default::default(),
            segments: Default::default(),
            rings: Default::default(),
            coincident: Default::default(),
            coincidences: Vec::new(),
            angles: Default::default(),
            angle_rings: Vec::new(),
        }
    }

    pub fn fill_rule(&self, operand: bool) -> FillRule {
        self.fill[operand as usize]
    }

    /// Adds all the subpaths of a path, as contours of the given operand.
    ///
    /// Open subpaths are closed with a line. Curves are split into pieces that
    /// are monotone in both coordinates, and pieces that are too small to matter
    /// are dropped.
    pub fn add_path(&mut self, path: &BezPath, operand: bool) {
        let mut contour = Vec::new();
        let mut start = None;
        let mut last = Point::ZERO;
        for el in path.elements() {
            match *el {
                PathEl::MoveTo(p) => {
                    self.add_contour(&mut contour, start, last, operand);
                    start = Some(p);
                    last = p;
                }
                PathEl::LineTo(p) => {
                    start.get_or_insert(last);
                    contour.push(PathSeg::Line(Line::new(last, p)));
                    last = p;
                }
                PathEl::QuadTo(p1, p2) => {
                    start.get_or_insert(last);
                    contour.push(PathSeg::Quad(QuadBez::new(last, p1, p2)));
                    last = p2;
                }
                PathEl::CurveTo(p1, p2, p3) => {
                    start.get_or_insert(last);
                    contour.push(PathSeg::Cubic(CubicBez::new(last, p1, p2, p3)));
                    last = p3;
                }
                PathEl::ClosePath => {
                    self.add_contour(&mut contour, start, last, operand);
                    if let Some(s) = start {
                        last = s;
                    }
                }
            }
        }
        self.add_contour(&mut contour, start, last, operand);
    }

    fn add_contour(
        &mut self,
        segs: &mut Vec<PathSeg>,
        start: Option<Point>,
        last: Point,
        operand: bool,
    ) {
        let mut segs = std::mem::take(segs);
        let Some(start) = start else {
            return;
        };
        if last != start {
            segs.push(PathSeg::Line(Line::new(last, start)));
        }

        let eps = self.eps;
        let tiny = |seg: &PathSeg| {
            let r = curve::bounds(seg);
            r.width() <= eps && r.height() <= eps
        };
        let pieces: Vec<PathSeg> = segs
            .into_iter()
            .filter(|s| !tiny(s))
            .flat_map(|s| monotone_pieces(s, eps))
            .filter(|s| !tiny(s))
            .collect();
        if pieces.len() < 2 {
            if !pieces.is_empty() {
                log::debug!("dropping a contour with a single segment");
            }
            return;
        }
        if encloses_nothing(&pieces, eps) {
            log::debug!("dropping a contour that lies on a line");
            return;
        }

        let idxs: Vec<SegIdx> = pieces
            .into_iter()
            .map(|p| self.add_segment(p, operand))
            .collect();
        for (i, &seg) in idxs.iter().enumerate() {
            let next = idxs[(i + 1) % idxs.len()];
            let tail = self.spans[self.segments[seg].tail].ptt;
            let head = self.spans[self.segments[next].head].ptt;
            self.rings.union(tail, head);
        }
    }

    /// Intersects every pair of segments, splitting both at the intersections
    /// and registering coincident runs.
    pub fn intersect_all(&mut self) -> Result<(), Error> {
        let segs: Vec<SegIdx> = self.segments.indices().collect();
        let mut crossings = 0;
        for (i, &a) in segs.iter().enumerate() {
            for &b in &segs[(i + 1)..] {
                if !rects_overlap(&self.segments[a].bounds, &self.segments[b].bounds, self.eps) {
                    continue;
                }
                let ca = self.segments[a].curve;
                let cb = self.segments[b].curve;
                match intersect(&ca, &cb, self.eps)? {
                    Intersections::Points(hits) => {
                        crossings += hits.len();
                        for (ta, tb) in hits {
                            let pa = self.add_t(a, ta, ca.eval(ta), false);
                            let pb = self.add_t(b, tb, cb.eval(tb), false);
                            self.rings.union(pa, pb);
                        }
                    }
                    Intersections::Overlap { a: (a0, a1), b: (b0, b1) } => {
                        log::debug!("{a:?} [{a0}, {a1}] runs along {b:?} [{b0}, {b1}]");
                        self.add_or_overlap(a, b, a0, a1, b0, b1)?;
                    }
                }
            }
        }
        log::debug!("{crossings} contacts, {} coincidences", self.coincidences.len());
        Ok(())
    }

    /// Runs [`OpContext::move_nearby`] on every segment.
    pub fn move_all_nearby(&mut self) -> bool {
        let mut changed = false;
        for seg in self.segments.indices().collect::<Vec<_>>() {
            changed |= self.move_nearby(seg);
        }
        changed
    }

    /// Runs the whole operation.
    pub fn run(&mut self, op: Operation) -> Result<Contours, Error> {
        log::debug!("{} segments", self.segments.len());
        self.intersect_all()?;
        self.move_all_nearby();
        #[cfg(feature = "slow-asserts")]
        self.check_invariants();

        self.resolve_coincidences()?;
        #[cfg(feature = "slow-asserts")]
        self.check_invariants();

        for seg in self.segments.indices().collect::<Vec<_>>() {
            self.align(seg);
        }
        #[cfg(feature = "slow-asserts")]
        self.check_aligned();

        self.apply()?;
        #[cfg(feature = "slow-asserts")]
        self.check_invariants();

        self.calc_angles();
        self.sort_angles();
        self.resolve_windings()?;
        self.mark_inactive(op)?;

        #[cfg(feature = "debug-svg")]
        {
            if let Err(e) = svg::save("pathops-debug.svg", &self.dump_svg()) {
                log::warn!("failed to save debug svg: {e}");
            }
        }

        self.walk(op)
    }

    /// Checks the structural invariants of the segments and their spans.
    ///
    /// # Panics
    ///
    /// Panics if anything is inconsistent.
    #[cfg(any(test, feature = "slow-asserts"))]
    pub fn check_invariants(&self) {
        for (seg_idx, seg) in self.segments.iter() {
            let bs = self.boundaries(seg_idx);
            assert_eq!(bs.first(), Some(&seg.head));
            assert_eq!(bs.last(), Some(&seg.tail));
            assert_eq!(bs.len(), seg.count + 1, "{seg_idx:?} has the wrong count");
            assert_eq!(self.span_t(seg.head), 0.0);
            assert_eq!(self.span_t(seg.tail), 1.0);

            let mut done = 0;
            for w in bs.windows(2) {
                assert!(self.span_t(w[0]) < self.span_t(w[1]), "{seg_idx:?} is out of order");
                assert_eq!(self.spans[w[1]].prev, Some(w[0]));
            }
            for &b in &bs {
                let base = &self.spans[b];
                assert!(!base.deleted);
                assert_eq!(base.segment, seg_idx);
                assert_eq!(self.ptts[base.ptt].span, b);
                assert!(!self.ptts[base.ptt].deleted);
                assert_eq!(base.span.is_none(), b == seg.tail);
                if base.span.as_ref().is_some_and(|s| s.done) {
                    done += 1;
                }
            }
            assert_eq!(done, seg.done_count, "{seg_idx:?} has the wrong done count");
        }
    }

    /// Checks that every ring names its point with bit-identical coordinates.
    ///
    /// # Panics
    ///
    /// Panics if some ring doesn't.
    #[cfg(any(test, feature = "slow-asserts"))]
    pub fn check_aligned(&self) {
        for (idx, base) in self.spans.iter() {
            assert!(base.deleted || base.aligned, "{idx:?} wasn't aligned");
        }
        for (idx, ptt) in self.ptts.iter() {
            let root = self.rings.find(idx);
            let pt = self.ptts[root].pt;
            assert!(
                ptt.pt.x.to_bits() == pt.x.to_bits() && ptt.pt.y.to_bits() == pt.y.to_bits(),
                "{idx:?} is at {:?}, but its ring is at {pt:?}",
                ptt.pt
            );
        }
    }

    /// Draws the segments and the locations of their span boundaries.
    #[cfg(feature = "debug-svg")]
    pub fn dump_svg(&self) -> svg::Document {
        use svg::node::element::{path::Data, Circle, Path};

        let mut bbox: Option<kurbo::Rect> = None;
        let mut doc = svg::Document::new();
        for (_, seg) in self.segments.iter() {
            bbox = Some(bbox.map_or(seg.bounds, |b| b.union(seg.bounds)));
            let s = seg.curve.start();
            let data = Data::new().move_to((s.x, s.y));
            let data = match seg.curve {
                PathSeg::Line(l) => data.line_to((l.p1.x, l.p1.y)),
                PathSeg::Quad(q) => data.quadratic_curve_to((q.p1.x, q.p1.y, q.p2.x, q.p2.y)),
                PathSeg::Cubic(c) => {
                    data.cubic_curve_to((c.p1.x, c.p1.y, c.p2.x, c.p2.y, c.p3.x, c.p3.y))
                }
            };
            let color = if seg.operand { "red" } else { "blue" };
            doc = doc.add(
                Path::new()
                    .set("d", data)
                    .set("fill", "none")
                    .set("stroke", color)
                    .set("stroke-width", "0.5%"),
            );
        }
        let bbox = bbox.unwrap_or_default().inflate(1.0, 1.0);
        let r = 0.005 * bbox.width().max(bbox.height());
        for (idx, base) in self.spans.iter() {
            if base.deleted {
                continue;
            }
            let p = self.ptts[base.ptt].pt;
            let color = match &base.span {
                Some(s) if s.done => "gray",
                _ => "black",
            };
            let circle = Circle::new()
                .set("cx", p.x)
                .set("cy", p.y)
                .set("r", r)
                .set("fill", color);
            doc = doc.add(circle.add(svg::node::element::Title::new(format!("{idx:?}"))));
        }
        doc.set(
            "viewBox",
            (bbox.min_x(), bbox.min_y(), bbox.width(), bbox.height()),
        )
    }
}

/// Does this contour lie within `eps` of a single line?
///
/// Such a contour goes out and comes back along the same path, so it has
/// winding number zero everywhere off the line.
fn encloses_nothing(pieces: &[PathSeg], eps: f64) -> bool {
    let pts: Vec<Point> = pieces.iter().flat_map(curve::control_points).collect();
    let Some(&origin) = pts.first() else {
        return true;
    };
    let Some(far) = pts
        .iter()
        .copied()
        .max_by(|p, q| (*p - origin).hypot2().total_cmp(&(*q - origin).hypot2()))
    else {
        return true;
    };
    let dir = far - origin;
    let len = dir.hypot();
    if len <= eps {
        return true;
    }
    pts.iter()
        .all(|p| (dir.cross(*p - origin) / len).abs() <= eps)
}
