//! Segments, and the spans that subdivide them.
//!
//! Every segment starts out as a single span covering `[0, 1]`. Whenever we
//! learn that something interesting happens at a parameter (another segment
//! crosses it, or a coincident run starts or stops there), we insert a new
//! span boundary with [`OpContext::add_t`]. Boundaries are never removed from
//! their arena, only unlinked and marked deleted, so handles to them stay valid
//! for the whole operation.
//!
//! A boundary owns a [`PtT`] (its parameter and location). PtTs on different
//! segments that name the same location are joined into a ring, which is a set
//! in the context's union-find.

use kurbo::{ParamCurve, PathSeg, Point, Rect};

use crate::{
    context::OpContext,
    curve::{self, with_endpoints},
    Error,
};

typed_vec!(
    /// The arena of parameter/point records.
    PtTVec,
    /// A handle to a [`PtT`].
    PtTIdx,
    "pt"
);

typed_vec!(
    /// The arena of span boundaries.
    SpanVec,
    /// A handle to a [`SpanBase`].
    SpanIdx,
    "sp"
);

typed_vec!(
    /// The arena of segments.
    SegmentVec,
    /// A handle to a [`Segment`].
    SegIdx,
    "s"
);

/// A location on one segment: a parameter and the point it maps to.
#[derive(Clone, Debug)]
pub struct PtT {
    pub t: f64,
    pub pt: Point,
    /// The boundary that owns this record.
    ///
    /// When boundaries get merged, the PtTs of the removed boundary are
    /// re-homed here, so this always leads to a live boundary.
    pub span: SpanIdx,
    /// Another PtT in this ring lives on the same segment, at a different `t`.
    pub duplicate: bool,
    /// Superseded by the canonical PtT of its (new) boundary.
    pub deleted: bool,
}

/// A span boundary.
///
/// Boundaries are linked into a list per segment, ordered by `t`. The first one
/// (the head) is at `t = 0` and the last one (the tail) is at `t = 1`. Every
/// boundary but the tail starts a span, and carries that span's data.
#[derive(Clone, Debug)]
pub struct SpanBase {
    pub ptt: PtTIdx,
    pub segment: SegIdx,
    pub prev: Option<SpanIdx>,
    pub next: Option<SpanIdx>,
    /// False if some PtT was aliased onto this boundary and hasn't been aligned yet.
    pub aligned: bool,
    pub deleted: bool,
    /// `None` exactly for the tail.
    pub span: Option<Span>,
}

/// The part of a span boundary that describes the span following it.
#[derive(Clone, Debug)]
pub struct Span {
    /// Net number of this segment's operand's edges running along this span,
    /// counted in the segment's direction.
    ///
    /// Starts at 1. Coincidence resolution stacks coincident edges onto one
    /// span (making this larger, or cancelling it to zero).
    pub wind_value: i32,
    /// Like `wind_value`, but for edges of the other operand.
    pub opp_value: i32,
    /// The winding number of this segment's operand just to the left of the span,
    /// looking in the direction of increasing `t`.
    pub wind_sum: Option<i32>,
    /// The winding number of the other operand just to the left of the span.
    pub opp_sum: Option<i32>,
    pub done: bool,
    /// We failed to find a winding number for this span by ray casting.
    pub unsortable: bool,
    /// The angle leaving the start of this span, toward its end.
    pub from_angle: Option<crate::angle::AngleIdx>,
    /// The angle leaving the end of this span, back toward its start.
    pub to_angle: Option<crate::angle::AngleIdx>,
}

impl Span {
    fn new() -> Span {
        Span {
            wind_value: 1,
            opp_value: 0,
            wind_sum: None,
            opp_sum: None,
            done: false,
            unsortable: false,
            from_angle: None,
            to_angle: None,
        }
    }

    /// A fresh span for the second half of a split, carrying over the values.
    fn split_off(&self) -> Span {
        Span {
            wind_value: self.wind_value,
            opp_value: self.opp_value,
            done: self.done,
            ..Span::new()
        }
    }
}

#[derive(Clone, Debug)]
pub struct Segment {
    pub curve: PathSeg,
    pub bounds: Rect,
    pub head: SpanIdx,
    pub tail: SpanIdx,
    /// The number of spans (live boundaries other than the tail).
    pub count: usize,
    pub done_count: usize,
    /// Which input this segment came from (false for the first one).
    pub operand: bool,
}

impl Segment {
    pub fn done(&self) -> bool {
        debug_assert!(self.done_count <= self.count);
        self.done_count == self.count
    }
}

impl OpContext {
    /// Adds a new segment consisting of a single span.
    pub fn add_segment(&mut self, curve: PathSeg, operand: bool) -> SegIdx {
        let seg = self.segments.next_idx();
        let head = self.spans.next_idx();
        let tail = SpanIdx(head.0 + 1);
        let head_ptt = self.new_ptt(0.0, curve.start(), head);
        let tail_ptt = self.new_ptt(1.0, curve.end(), tail);
        self.spans.push(SpanBase {
            ptt: head_ptt,
            segment: seg,
            prev: None,
            next: Some(tail),
            aligned: true,
            deleted: false,
            span: Some(Span::new()),
        });
        self.spans.push(SpanBase {
            ptt: tail_ptt,
            segment: seg,
            prev: Some(head),
            next: None,
            aligned: true,
            deleted: false,
            span: None,
        });
        self.segments.push(Segment {
            curve,
            bounds: curve::bounds(&curve),
            head,
            tail,
            count: 1,
            done_count: 0,
            operand,
        })
    }

    fn new_ptt(&mut self, t: f64, pt: Point, span: SpanIdx) -> PtTIdx {
        let idx = self.ptts.push(PtT {
            t,
            pt,
            span,
            duplicate: false,
            deleted: false,
        });
        self.rings.insert(idx);
        idx
    }

    /// The segment that a PtT lives on.
    pub fn ptt_segment(&self, ptt: PtTIdx) -> SegIdx {
        self.spans[self.ptts[ptt].span].segment
    }

    /// The live PtT that stands in for `ptt` (which is `ptt` itself unless it was superseded).
    pub fn canonical(&self, ptt: PtTIdx) -> PtTIdx {
        self.spans[self.ptts[ptt].span].ptt
    }

    pub fn span_t(&self, span: SpanIdx) -> f64 {
        self.ptts[self.spans[span].ptt].t
    }

    pub fn span_pt(&self, span: SpanIdx) -> Point {
        self.ptts[self.spans[span].ptt].pt
    }

    /// The span data starting at this boundary, or an error if it's the tail.
    pub fn upcast(&self, span: SpanIdx) -> Result<&Span, Error> {
        self.spans[span].span.as_ref().ok_or(Error::Coincidence)
    }

    pub fn upcast_mut(&mut self, span: SpanIdx) -> Result<&mut Span, Error> {
        self.spans[span].span.as_mut().ok_or(Error::Coincidence)
    }

    /// The boundaries of a segment, in order of increasing `t`.
    pub fn boundaries(&self, seg: SegIdx) -> Vec<SpanIdx> {
        let mut ret = Vec::with_capacity(self.segments[seg].count + 1);
        let mut cur = Some(self.segments[seg].head);
        while let Some(b) = cur {
            ret.push(b);
            cur = self.spans[b].next;
        }
        ret
    }

    /// The boundaries of a segment that start a span that isn't done.
    pub fn live_spans(&self, seg: SegIdx) -> impl Iterator<Item = SpanIdx> + '_ {
        self.boundaries(seg)
            .into_iter()
            .filter(move |&b| self.spans[b].span.as_ref().is_some_and(|s| !s.done))
    }

    /// Do these two locations on `seg` (or this PtT and a location on another segment) name the same point?
    pub fn matches(&self, ptt: PtTIdx, seg: SegIdx, t: f64, pt: Point) -> bool {
        let existing = &self.ptts[ptt];
        let same_seg = self.ptt_segment(ptt) == seg;
        if same_seg && existing.t == t {
            return true;
        }
        if (existing.pt - pt).hypot() > self.eps {
            return false;
        }
        !same_seg || !self.pts_disjoint(seg, existing.t, t)
    }

    /// Two nearby parameters on a curve are distinct if the curve wanders away
    /// between them (a tight loop, say).
    fn pts_disjoint(&self, seg: SegIdx, t0: f64, t1: f64) -> bool {
        let curve = &self.segments[seg].curve;
        if let PathSeg::Line(_) = curve {
            return false;
        }
        let mid = curve.eval(0.5 * (t0 + t1));
        (mid - curve.eval(t0)).hypot() > self.eps && (mid - curve.eval(t1)).hypot() > self.eps
    }

    /// Finds or inserts a span boundary at `t`.
    ///
    /// If a boundary already sits at `t`, or at a point matching `pt`, returns
    /// its PtT; in `alias` mode a matching (but not identical) location instead
    /// gets a new PtT linked into that boundary's ring. Otherwise a new boundary
    /// is inserted in order. Either way, the segment gains at most one span.
    pub fn add_t(&mut self, seg: SegIdx, t: f64, pt: Point, alias: bool) -> PtTIdx {
        let head = self.segments[seg].head;
        let tail = self.segments[seg].tail;
        if t <= 0.0 {
            return self.spans[head].ptt;
        }
        if t >= 1.0 {
            return self.spans[tail].ptt;
        }

        let mut cur = head;
        loop {
            let cur_ptt = self.spans[cur].ptt;
            let cur_t = self.ptts[cur_ptt].t;
            if cur_t == t {
                return cur_ptt;
            }
            if self.matches(cur_ptt, seg, t, pt) {
                if !alias {
                    return cur_ptt;
                }
                let mut duplicate_pt = false;
                for &m in self.rings.members(cur_ptt) {
                    let same_pt = self.ptts[m].pt == pt;
                    if same_pt && self.ptt_segment(m) == seg && self.ptts[m].t == t {
                        return m;
                    }
                    duplicate_pt |= same_pt;
                }
                let alias_ptt = self.new_ptt(t, pt, cur);
                self.ptts[alias_ptt].duplicate = duplicate_pt;
                self.rings.union(cur_ptt, alias_ptt);
                self.spans[cur].aligned = false;
                log::trace!("aliased {alias_ptt:?} onto {cur:?} at t={t}");
                return alias_ptt;
            }
            if cur_t > t {
                return self.insert_before(cur, t, pt);
            }
            match self.spans[cur].next {
                Some(next) => cur = next,
                // The tail has t = 1, so we can't fall off the end.
                None => return self.insert_before(cur, t, pt),
            }
        }
    }

    fn insert_before(&mut self, next: SpanIdx, t: f64, pt: Point) -> PtTIdx {
        // The head has t = 0 and we never insert at 0, so there's always a prev.
        let prev = self.spans[next].prev.unwrap_or(next);
        let seg = self.spans[next].segment;
        let idx = self.spans.next_idx();
        let ptt = self.new_ptt(t, pt, idx);
        let span = self.spans[prev].span.as_ref().map(Span::split_off);
        if span.as_ref().is_some_and(|s| s.done) {
            self.segments[seg].done_count += 1;
        }
        self.spans.push(SpanBase {
            ptt,
            segment: seg,
            prev: Some(prev),
            next: Some(next),
            aligned: true,
            deleted: false,
            span,
        });
        self.spans[prev].next = Some(idx);
        self.spans[next].prev = Some(idx);
        self.segments[seg].count += 1;
        log::trace!("split {seg:?} at t={t}: new boundary {idx:?}");
        ptt
    }

    /// Merges boundaries that have ended up at the same place.
    ///
    /// Two adjacent boundaries are merged if their PtTs are in the same ring, or
    /// if their points are within tolerance. Runs until nothing changes, and
    /// returns whether anything was merged.
    pub fn move_nearby(&mut self, seg: SegIdx) -> bool {
        let mut changed = false;
        loop {
            let mut merged = false;
            let mut cur = self.segments[seg].head;
            while let Some(next) = self.spans[cur].next {
                let a = self.spans[cur].ptt;
                let b = self.spans[next].ptt;
                let close = self.rings.same(a, b)
                    || (self.ptts[a].pt - self.ptts[b].pt).hypot() <= self.eps;
                if close && self.merge_boundaries(cur, next) {
                    merged = true;
                    break;
                }
                cur = next;
            }
            if !merged {
                break;
            }
            changed = true;
        }
        changed
    }

    /// Merges two adjacent boundaries, keeping the head or tail if one of them
    /// is one. Returns false if they're the head and the tail.
    fn merge_boundaries(&mut self, first: SpanIdx, second: SpanIdx) -> bool {
        let seg = self.spans[first].segment;
        let is_head = first == self.segments[seg].head;
        let is_tail = second == self.segments[seg].tail;
        let (keep, remove) = match (is_head, is_tail) {
            (true, true) => return false,
            (_, true) => (second, first),
            _ => (first, second),
        };

        let keep_ptt = self.spans[keep].ptt;
        let remove_ptt = self.spans[remove].ptt;
        let owned: Vec<PtTIdx> = self
            .rings
            .members(remove_ptt)
            .iter()
            .copied()
            .filter(|&p| self.ptts[p].span == remove)
            .collect();
        for p in owned {
            self.ptts[p].span = keep;
            self.ptts[p].deleted = true;
            self.ptts[p].duplicate = true;
        }
        self.rings.union(keep_ptt, remove_ptt);

        // Unlink `remove`. If it started a span, that span disappears (it was
        // a sliver); if it was the end of one, the previous span now runs to
        // the following boundary.
        let prev = self.spans[remove].prev;
        let next = self.spans[remove].next;
        if let Some(p) = prev {
            self.spans[p].next = next;
        }
        if let Some(n) = next {
            self.spans[n].prev = prev;
        }
        if self.spans[remove].span.as_ref().is_some_and(|s| s.done) {
            self.segments[seg].done_count -= 1;
        }
        self.spans[remove].deleted = true;
        self.spans[remove].span = None;
        self.segments[seg].count -= 1;
        log::trace!("merged {remove:?} into {keep:?} on {seg:?}");
        true
    }

    /// Gives every PtT in the ring of each of this segment's boundaries the
    /// same coordinates.
    ///
    /// The chosen point is a segment endpoint if the ring contains one (so that
    /// contours stay closed), and otherwise the point of the ring's oldest PtT
    /// that isn't a duplicate. Segment endpoints in the ring are moved to the
    /// chosen point too. Aliases are superseded by their boundary's PtT.
    pub fn align(&mut self, seg: SegIdx) {
        for b in self.boundaries(seg) {
            let ptt = self.spans[b].ptt;
            self.align_ring(ptt);
            self.spans[b].aligned = true;
        }
    }

    fn align_ring(&mut self, ptt: PtTIdx) {
        let mut members = self.rings.members(ptt).to_vec();
        members.sort();
        let anchor = members
            .iter()
            .copied()
            .find(|&p| self.ptts[p].t == 0.0 || self.ptts[p].t == 1.0)
            .or_else(|| members.iter().copied().find(|&p| !self.ptts[p].duplicate))
            .unwrap_or(members[0]);
        let pt = self.ptts[anchor].pt;
        for p in members {
            self.ptts[p].pt = pt;
            if self.canonical(p) != p {
                self.ptts[p].deleted = true;
            }
            let t = self.ptts[p].t;
            if t == 0.0 || t == 1.0 {
                let seg = self.ptt_segment(p);
                let curve = self.segments[seg].curve;
                let curve = if t == 0.0 {
                    with_endpoints(curve, pt, curve.end())
                } else {
                    with_endpoints(curve, curve.start(), pt)
                };
                self.segments[seg].curve = curve;
                self.segments[seg].bounds = curve::bounds(&curve);
            }
        }
    }

    /// Marks a span as consumed. Returns false if it already was.
    pub fn mark_done(&mut self, span: SpanIdx) -> bool {
        let seg = self.spans[span].segment;
        match self.spans[span].span.as_mut() {
            Some(s) if !s.done => {
                s.done = true;
                self.segments[seg].done_count += 1;
                true
            }
            _ => false,
        }
    }
}
