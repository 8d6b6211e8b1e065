//! Coincident runs: parameter ranges on two segments that trace the same curve.
//!
//! Two edges running along each other must be counted as one edge with a
//! combined winding value, or else every winding number near them comes out
//! wrong. The registry records each such run once, and a handful of passes
//! (run to a fixed point) make sure the records are complete and that both
//! segments are split at exactly matching places. Finally [`OpContext::apply`]
//! folds the winding values of each coincident pair onto one of its spans.

use kurbo::ParamCurve;

use crate::{
    context::OpContext,
    curve::{control_points, is_close, verb},
    intersect::project,
    segment::{PtTIdx, SegIdx, SpanIdx},
    Error, FillRule,
};

/// The coincidence passes give up (with an error) after this many rounds
/// without converging.
pub const MAX_COINCIDENCE_PASSES: usize = 32;

/// A coincident run.
///
/// `coin_start..coin_end` on one segment traces the same curve as
/// `opp_start..opp_end` on another, with `coin_start` matching `opp_start`.
/// The "coin" segment always comes first in [`OpContext::ordered`] order, and
/// `coin_start` always has the smaller parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoinSpans {
    pub coin_start: PtTIdx,
    pub coin_end: PtTIdx,
    pub opp_start: PtTIdx,
    pub opp_end: PtTIdx,
}

/// One side of a coincident run: a segment and a parameter range on it.
///
/// The range is in the order that matches the other side, so it may be decreasing.
#[derive(Clone, Copy, Debug)]
struct Side {
    seg: SegIdx,
    start: f64,
    end: f64,
}

impl Side {
    fn lo(&self) -> f64 {
        self.start.min(self.end)
    }

    fn hi(&self) -> f64 {
        self.start.max(self.end)
    }
}

impl OpContext {
    /// Do these segments appear in this order in coincidence records?
    ///
    /// Segments are compared by kind and then by control points, so that
    /// the order doesn't depend on the order the input was given in.
    pub fn ordered(&self, a: SegIdx, b: SegIdx) -> bool {
        let ca = &self.segments[a].curve;
        let cb = &self.segments[b].curve;
        if verb(ca) != verb(cb) {
            return verb(ca) < verb(cb);
        }
        for (p, q) in control_points(ca).iter().zip(&control_points(cb)) {
            match p.x.total_cmp(&q.x).then(p.y.total_cmp(&q.y)) {
                std::cmp::Ordering::Less => return true,
                std::cmp::Ordering::Greater => return false,
                std::cmp::Ordering::Equal => {}
            }
        }
        a <= b
    }

    /// Is the run on `opp` reversed relative to the run on `coin`?
    pub fn flipped(&self, rec: &CoinSpans) -> bool {
        self.ptts[rec.opp_start].t > self.ptts[rec.opp_end].t
    }

    fn sides(&self, rec: &CoinSpans) -> [Side; 2] {
        [
            Side {
                seg: self.ptt_segment(rec.coin_start),
                start: self.ptts[rec.coin_start].t,
                end: self.ptts[rec.coin_end].t,
            },
            Side {
                seg: self.ptt_segment(rec.opp_start),
                start: self.ptts[rec.opp_start].t,
                end: self.ptts[rec.opp_end].t,
            },
        ]
    }

    /// Appends a record, putting it into canonical form first.
    pub fn add(
        &mut self,
        coin_start: PtTIdx,
        coin_end: PtTIdx,
        opp_start: PtTIdx,
        opp_end: PtTIdx,
    ) -> CoinSpans {
        let (mut cs, mut ce, mut os, mut oe) = (coin_start, coin_end, opp_start, opp_end);
        if !self.ordered(self.ptt_segment(cs), self.ptt_segment(os)) {
            std::mem::swap(&mut cs, &mut os);
            std::mem::swap(&mut ce, &mut oe);
        }
        if self.ptts[cs].t > self.ptts[ce].t {
            std::mem::swap(&mut cs, &mut ce);
            std::mem::swap(&mut os, &mut oe);
        }
        let rec = CoinSpans {
            coin_start: cs,
            coin_end: ce,
            opp_start: os,
            opp_end: oe,
        };
        log::trace!("new coincidence {rec:?}");
        self.coincidences.push(rec);
        rec
    }

    /// Removes a record from the registry.
    pub fn release(&mut self, idx: usize) -> CoinSpans {
        self.coincidences.remove(idx)
    }

    /// Is the run `t0..t1` on `seg` against `o0..o1` on `opp` already covered by a record?
    pub fn contains(&self, seg: SegIdx, t0: f64, t1: f64, opp: SegIdx, o0: f64, o1: f64) -> bool {
        let (seg, lo, hi, opp) = if self.ordered(seg, opp) {
            (seg, t0.min(t1), t0.max(t1), opp)
        } else {
            (opp, o0.min(o1), o0.max(o1), seg)
        };
        self.coincidences.iter().any(|rec| {
            let [c, o] = self.sides(rec);
            c.seg == seg && o.seg == opp && c.lo() <= lo && hi <= c.hi()
        })
    }

    /// Records that `t0..t1` on `seg` runs along `o0..o1` on `opp`.
    ///
    /// Existing records for the same pair of segments that overlap or touch
    /// the new run are merged with it into a single record. Returns false if
    /// an existing record already covered the new run.
    pub fn add_or_overlap(
        &mut self,
        seg: SegIdx,
        opp: SegIdx,
        t0: f64,
        t1: f64,
        o0: f64,
        o1: f64,
    ) -> Result<bool, Error> {
        let (seg, opp, mut t0, mut t1, mut o0, mut o1) = if self.ordered(seg, opp) {
            (seg, opp, t0, t1, o0, o1)
        } else {
            (opp, seg, o0, o1, t0, t1)
        };
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
            std::mem::swap(&mut o0, &mut o1);
        }
        if t0 == t1 || seg == opp {
            return Ok(false);
        }

        let same_pair = |ctx: &OpContext, rec: &CoinSpans| {
            let [c, o] = ctx.sides(rec);
            c.seg == seg && o.seg == opp
        };
        let covered = self.coincidences.iter().any(|rec| {
            let [c, _] = self.sides(rec);
            same_pair(self, rec) && c.start <= t0 && t1 <= c.end
        });
        if covered {
            return Ok(false);
        }

        // Absorbing one record can make the run reach another, so keep going
        // until nothing else overlaps or touches it.
        let mut overlapping = Vec::new();
        loop {
            let mut grew = false;
            for (idx, rec) in self.coincidences.iter().enumerate() {
                let [c, o] = self.sides(rec);
                if overlapping.contains(&idx)
                    || !same_pair(self, rec)
                    || c.start > t1
                    || t0 > c.end
                {
                    continue;
                }
                if (o.start > o.end) != (o0 > o1) {
                    log::debug!("coincident runs on {seg:?} and {opp:?} disagree on direction");
                    return Err(Error::Coincidence);
                }
                if c.start < t0 {
                    t0 = c.start;
                    o0 = o.start;
                }
                if c.end > t1 {
                    t1 = c.end;
                    o1 = o.end;
                }
                overlapping.push(idx);
                grew = true;
            }
            if !grew {
                break;
            }
        }
        overlapping.sort_unstable();
        let released: Vec<CoinSpans> = overlapping
            .iter()
            .rev()
            .map(|&idx| self.release(idx))
            .collect();

        // The ends of a run get their own PtTs even if they land next to an
        // existing boundary, so that each side keeps its own parameter.
        let seg_curve = self.segments[seg].curve;
        let opp_curve = self.segments[opp].curve;
        let cs = self.add_t(seg, t0, seg_curve.eval(t0), true);
        let ce = self.add_t(seg, t1, seg_curve.eval(t1), true);
        let os = self.add_t(opp, o0, opp_curve.eval(o0), true);
        let oe = self.add_t(opp, o1, opp_curve.eval(o1), true);
        if self.ptts[cs].span == self.ptts[ce].span || self.ptts[os].span == self.ptts[oe].span {
            // The run was too short to survive snapping to existing boundaries.
            self.coincidences.extend(released);
            return Ok(false);
        }
        self.rings.union(cs, os);
        self.rings.union(ce, oe);
        let rec = self.add(cs, ce, os, oe);
        // Snapping to existing boundaries can make the merged run identical to one we had.
        Ok(!released.contains(&rec))
    }

    /// Grows a record to cover more, and merges it with any records it now overlaps.
    ///
    /// The record itself stays in the registry until the grown run replaces
    /// it, so an extension that collapses leaves it alone.
    fn extend(&mut self, rec: CoinSpans, cs: PtTIdx, ce: PtTIdx, os: PtTIdx, oe: PtTIdx) -> Result<(), Error> {
        let seg = self.ptt_segment(rec.coin_start);
        let opp = self.ptt_segment(rec.opp_start);
        let (t0, t1) = (self.ptts[cs].t, self.ptts[ce].t);
        let (o0, o1) = (self.ptts[os].t, self.ptts[oe].t);
        self.add_or_overlap(seg, opp, t0, t1, o0, o1)?;
        Ok(())
    }

    /// The boundaries from `start` to `end` along their segment, inclusive.
    fn run_boundaries(&self, start: PtTIdx, end: PtTIdx) -> Result<Vec<SpanIdx>, Error> {
        let s = self.ptts[start].span;
        let e = self.ptts[end].span;
        let forward = self.span_t(s) <= self.span_t(e);
        let mut ret = vec![s];
        let mut cur = s;
        while cur != e {
            let next = if forward {
                self.spans[cur].next
            } else {
                self.spans[cur].prev
            };
            cur = next.ok_or(Error::Coincidence)?;
            ret.push(cur);
        }
        Ok(ret)
    }

    /// Takes a parameter on one side of a run to the matching parameter on the other.
    fn map_across(&self, from: Side, t: f64, to: Side) -> f64 {
        let pt = self.segments[from.seg].curve.eval(t);
        match project(&self.segments[to.seg].curve, pt, self.eps) {
            Some(u) => u.clamp(to.lo(), to.hi()),
            None => {
                let ratio = if from.end != from.start {
                    (t - from.start) / (from.end - from.start)
                } else {
                    0.0
                };
                to.start + ratio * (to.end - to.start)
            }
        }
    }

    /// Tries to grow each record by one span at each end.
    ///
    /// A record grows if the next boundaries out on both segments are at the
    /// same place, and the curves stay close in between.
    pub fn expand(&mut self) -> Result<bool, Error> {
        let mut grown = Vec::new();
        for rec in &self.coincidences {
            let flipped = self.flipped(rec);
            let s = self.ptts[rec.coin_start].span;
            let o = self.ptts[rec.opp_start].span;
            let new_start = self.spans[s].prev.zip(if flipped {
                self.spans[o].next
            } else {
                self.spans[o].prev
            });
            let new_start = new_start.filter(|&(p, op)| self.can_extend(p, s, op, o));

            let e = self.ptts[rec.coin_end].span;
            let oe = self.ptts[rec.opp_end].span;
            let new_end = self.spans[e].next.zip(if flipped {
                self.spans[oe].prev
            } else {
                self.spans[oe].next
            });
            let new_end = new_end.filter(|&(n, on)| self.can_extend(n, e, on, oe));

            if new_start.is_some() || new_end.is_some() {
                let (cs, os) = new_start.map_or((rec.coin_start, rec.opp_start), |(p, op)| {
                    (self.spans[p].ptt, self.spans[op].ptt)
                });
                let (ce, oe) = new_end.map_or((rec.coin_end, rec.opp_end), |(n, on)| {
                    (self.spans[n].ptt, self.spans[on].ptt)
                });
                grown.push((*rec, cs, ce, os, oe));
            }
        }

        let expanded = !grown.is_empty();
        for (rec, cs, ce, os, oe) in grown {
            log::trace!("expanding coincidence {rec:?}");
            self.extend(rec, cs, ce, os, oe)?;
        }
        Ok(expanded)
    }

    /// Can a run ending at `at` / `opp_at` be extended to `to` / `opp_to`?
    fn can_extend(&self, to: SpanIdx, at: SpanIdx, opp_to: SpanIdx, opp_at: SpanIdx) -> bool {
        let p = self.spans[to].ptt;
        let q = self.spans[opp_to].ptt;
        if !self.rings.same(p, q) && (self.ptts[p].pt - self.ptts[q].pt).hypot() > self.eps {
            return false;
        }
        let seg = self.spans[to].segment;
        let opp = self.spans[opp_to].segment;
        let mid = 0.5 * (self.span_t(to) + self.span_t(at));
        let (o0, o1) = (self.span_t(opp_to), self.span_t(opp_at));
        is_close(
            &self.segments[seg].curve,
            mid,
            &self.segments[opp].curve,
            self.eps,
        )
        .is_some_and(|u| o0.min(o1) <= u && u <= o0.max(o1))
    }

    /// Makes sure that every boundary inside a run has a matching boundary on the other side.
    pub fn add_expanded(&mut self) -> Result<bool, Error> {
        let mut added = false;
        for idx in 0..self.coincidences.len() {
            let rec = self.coincidences[idx];
            let sides = self.sides(&rec);
            let runs = [
                self.run_boundaries(rec.coin_start, rec.coin_end)?,
                self.run_boundaries(rec.opp_start, rec.opp_end)?,
            ];
            for (k, run) in runs.iter().enumerate() {
                let (from, to) = (sides[k], sides[1 - k]);
                for &b in &run[1..run.len().saturating_sub(1)] {
                    let ptt = self.spans[b].ptt;
                    let paired = self
                        .rings
                        .members(ptt)
                        .iter()
                        .any(|&m| self.ptt_segment(m) == to.seg);
                    if paired {
                        continue;
                    }
                    let u = self.map_across(from, self.ptts[ptt].t, to);
                    let curve = self.segments[to.seg].curve;
                    let other = self.add_t(to.seg, u, curve.eval(u), false);
                    self.rings.union(ptt, other);
                    log::trace!("matched {b:?} with t={u} on {:?}", to.seg);
                    added = true;
                }
            }
        }
        Ok(added)
    }

    /// Adds the ends of runs that sit inside other runs on the same segment.
    ///
    /// If a run on `S` and `X` starts in the middle of a run on `S` and `Y`,
    /// then `Y` needs a boundary where the first run starts.
    pub fn add_uncommon(&mut self) -> bool {
        let mut todo = Vec::new();
        for (i, r1) in self.coincidences.iter().enumerate() {
            for (j, r2) in self.coincidences.iter().enumerate() {
                if i == j {
                    continue;
                }
                let sides = self.sides(r2);
                for end in [r1.coin_start, r1.coin_end, r1.opp_start, r1.opp_end] {
                    let seg = self.ptt_segment(end);
                    let t = self.ptts[end].t;
                    for m in 0..2 {
                        let (on, other) = (sides[m], sides[1 - m]);
                        if on.seg != seg || t <= on.lo() || t >= on.hi() {
                            continue;
                        }
                        let paired = self
                            .rings
                            .members(end)
                            .iter()
                            .any(|&p| self.ptt_segment(p) == other.seg);
                        if !paired {
                            todo.push((end, on, other));
                        }
                    }
                }
            }
        }

        let added = !todo.is_empty();
        for (end, on, other) in todo {
            let u = self.map_across(on, self.ptts[end].t, other);
            let curve = self.segments[other.seg].curve;
            let p = self.add_t(other.seg, u, curve.eval(u), false);
            self.rings.union(end, p);
        }
        added
    }

    /// Adds runs implied by pairs of other runs.
    ///
    /// If `S` runs along `X` and `S` also runs along `Y` over an overlapping
    /// range, then `X` runs along `Y` there too.
    pub fn add_missing(&mut self) -> Result<bool, Error> {
        let mut todo = Vec::new();
        for (i, r1) in self.coincidences.iter().enumerate() {
            for r2 in &self.coincidences[(i + 1)..] {
                let s1 = self.sides(r1);
                let s2 = self.sides(r2);
                for k in 0..2 {
                    for m in 0..2 {
                        let (a, other1) = (s1[k], s1[1 - k]);
                        let (b, other2) = (s2[m], s2[1 - m]);
                        if a.seg != b.seg || other1.seg == other2.seg {
                            continue;
                        }
                        let lo = a.lo().max(b.lo());
                        let hi = a.hi().min(b.hi());
                        if hi <= lo {
                            continue;
                        }
                        let curve = &self.segments[a.seg].curve;
                        if (curve.eval(hi) - curve.eval(lo)).hypot() <= self.eps {
                            continue;
                        }
                        let u0 = self.map_across(a, lo, other1);
                        let u1 = self.map_across(a, hi, other1);
                        let v0 = self.map_across(b, lo, other2);
                        let v1 = self.map_across(b, hi, other2);
                        if self.contains(other1.seg, u0, u1, other2.seg, v0, v1) {
                            continue;
                        }
                        let close = is_close(
                            &self.segments[other1.seg].curve,
                            0.5 * (u0 + u1),
                            &self.segments[other2.seg].curve,
                            self.eps,
                        );
                        if close.is_some() {
                            todo.push((other1.seg, other2.seg, u0, u1, v0, v1));
                        }
                    }
                }
            }
        }

        let mut added = false;
        for (x, y, u0, u1, v0, v1) in todo {
            log::trace!("adding implied coincidence between {x:?} and {y:?}");
            added |= self.add_or_overlap(x, y, u0, u1, v0, v1)?;
        }
        Ok(added)
    }

    /// Points every record at live PtTs, in case `move_nearby` superseded its ends.
    pub fn correct_ends(&mut self) {
        for idx in 0..self.coincidences.len() {
            let rec = self.coincidences[idx];
            self.coincidences[idx] = CoinSpans {
                coin_start: self.canonical(rec.coin_start),
                coin_end: self.canonical(rec.coin_end),
                opp_start: self.canonical(rec.opp_start),
                opp_end: self.canonical(rec.opp_end),
            };
        }
    }

    /// Makes sure the matching ends of every record are in the same ring.
    pub fn add_end_moved_spans(&mut self) {
        for rec in self.coincidences.clone() {
            self.rings.union(rec.coin_start, rec.opp_start);
            self.rings.union(rec.coin_end, rec.opp_end);
        }
    }

    /// Releases records that have collapsed to a single boundary on either side.
    pub fn remove_collapsed(&mut self) -> usize {
        let before = self.coincidences.len();
        let collapsed: Vec<bool> = self
            .coincidences
            .iter()
            .map(|rec| {
                self.ptts[rec.coin_start].span == self.ptts[rec.coin_end].span
                    || self.ptts[rec.opp_start].span == self.ptts[rec.opp_end].span
            })
            .collect();
        let mut collapsed = collapsed.into_iter();
        self.coincidences.retain(|_| !collapsed.next().unwrap_or(false));
        before - self.coincidences.len()
    }

    /// Repairs the registry after boundaries have moved.
    pub fn fix_up(&mut self) {
        self.correct_ends();
        self.add_end_moved_spans();
        let removed = self.remove_collapsed();
        if removed > 0 {
            log::trace!("released {removed} collapsed coincidences");
        }
    }

    /// Runs the coincidence passes until none of them finds anything new,
    /// then links up the coincident spans.
    pub fn resolve_coincidences(&mut self) -> Result<(), Error> {
        self.fix_up();
        for pass in 0..MAX_COINCIDENCE_PASSES {
            let mut progress = self.expand()?;
            progress |= self.add_uncommon();
            progress |= self.add_missing()?;
            progress |= self.add_expanded()?;
            progress |= self.move_all_nearby();
            self.fix_up();
            if !progress {
                log::debug!(
                    "{} coincidences after {} passes",
                    self.coincidences.len(),
                    pass + 1
                );
                return self.mark();
            }
        }
        log::debug!("coincidence passes failed to converge");
        Err(Error::Coincidence)
    }

    /// The boundaries of both sides of a record, walked in lock-step from the
    /// matching start ends.
    fn lock_step(&self, rec: &CoinSpans) -> Result<(Vec<SpanIdx>, Vec<SpanIdx>), Error> {
        let a = self.run_boundaries(rec.coin_start, rec.coin_end)?;
        let b = self.run_boundaries(rec.opp_start, rec.opp_end)?;
        if a.len() != b.len() {
            log::debug!("coincidence {rec:?} has unmatched boundaries");
            return Err(Error::Coincidence);
        }
        Ok((a, b))
    }

    /// Links each span in a run with its partner on the other side.
    ///
    /// Spans that are coincident through a chain of records (a run on `S` and
    /// `X`, and another on `X` and `Y`) end up in one set.
    pub fn mark(&mut self) -> Result<(), Error> {
        if let Some(last) = self.spans.len().checked_sub(1) {
            self.coincident.insert(SpanIdx(last));
        }
        for rec in self.coincidences.clone() {
            let flipped = self.flipped(&rec);
            let (a, b) = self.lock_step(&rec)?;
            for i in 0..(a.len() - 1) {
                let sa = a[i];
                let sb = if flipped { b[i + 1] } else { b[i] };
                self.upcast(sa)?;
                self.upcast(sb)?;
                self.coincident.union(sa, sb);
            }
        }
        Ok(())
    }

    fn mask(&self, value: i32, operand: bool) -> i32 {
        match self.fill_rule(operand) {
            FillRule::EvenOdd => value & 1,
            FillRule::NonZero => value,
        }
    }

    /// Picks the span of a coincident set that keeps the combined values: the
    /// one with the most edges on it, or the first by [`OpContext::ordered`]
    /// on a tie.
    fn coincident_winner(&self, set: &[SpanIdx]) -> Result<SpanIdx, Error> {
        let weight = |ctx: &OpContext, s: SpanIdx| -> Result<i32, Error> {
            let span = ctx.upcast(s)?;
            Ok(span.wind_value.abs() + span.opp_value.abs())
        };
        let mut best = *set.first().ok_or(Error::Coincidence)?;
        let mut best_weight = weight(self, best)?;
        for &s in &set[1..] {
            let w = weight(self, s)?;
            let tie_break = self.ordered(self.spans[s].segment, self.spans[best].segment);
            if w > best_weight || (w == best_weight && tie_break) {
                best = s;
                best_weight = w;
            }
        }
        Ok(best)
    }

    /// Combines the winding values of every set of coincident spans onto one
    /// of them, zeroing the others and marking them done.
    ///
    /// Two spans in a set run the same way if their start points share a ring.
    pub fn apply(&mut self) -> Result<(), Error> {
        let mut sets = Vec::new();
        for idx in self.coincident.roots() {
            let members = self.coincident.members(idx);
            if members.len() < 2 {
                continue;
            }
            let mut set = members.to_vec();
            set.sort();
            sets.push(set);
        }

        for set in sets {
            let winner = self.coincident_winner(&set)?;
            let winner_start = self.spans[winner].ptt;
            let winner_operand = self.segments[self.spans[winner].segment].operand;
            let (mut wind, mut opp) = {
                let span = self.upcast(winner)?;
                (span.wind_value, span.opp_value)
            };

            for &loser in &set {
                if loser == winner {
                    continue;
                }
                let dir = if self.rings.same(self.spans[loser].ptt, winner_start) {
                    1
                } else {
                    -1
                };
                let operand = self.segments[self.spans[loser].segment].operand;
                let span = self.upcast_mut(loser)?;
                let (lw, lo) = if operand == winner_operand {
                    (span.wind_value, span.opp_value)
                } else {
                    (span.opp_value, span.wind_value)
                };
                wind += dir * lw;
                opp += dir * lo;
                span.wind_value = 0;
                span.opp_value = 0;
                self.mark_done(loser);
            }

            let wind = self.mask(wind, winner_operand);
            let opp = self.mask(opp, !winner_operand);
            let span = self.upcast_mut(winner)?;
            span.wind_value = wind;
            span.opp_value = opp;
            if wind == 0 && opp == 0 {
                self.mark_done(winner);
            }
            log::trace!("coincident {winner:?} now has values ({wind}, {opp}); {} others are done", set.len() - 1);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use kurbo::{Line, PathSeg, Point};
    use proptest::prelude::*;

    use super::*;

    fn ctx(fill: FillRule) -> OpContext {
        OpContext::new(1e-9, [fill; 2])
    }

    fn line(ctx: &mut OpContext, p0: (f64, f64), p1: (f64, f64), operand: bool) -> SegIdx {
        ctx.add_segment(PathSeg::Line(Line::new(p0, p1)), operand)
    }

    fn values(ctx: &OpContext, seg: SegIdx) -> Vec<(i32, i32, bool)> {
        ctx.boundaries(seg)
            .into_iter()
            .filter_map(|b| ctx.spans[b].span.as_ref())
            .map(|s| (s.wind_value, s.opp_value, s.done))
            .collect()
    }

    #[test]
    fn ordering_is_by_geometry() {
        let mut ctx = ctx(FillRule::NonZero);
        let b = line(&mut ctx, (1.0, 0.0), (2.0, 0.0), false);
        let a = line(&mut ctx, (0.0, 0.0), (2.0, 0.0), false);
        assert!(ctx.ordered(a, b));
        assert!(!ctx.ordered(b, a));
        assert!(ctx.ordered(a, a));
    }

    #[test]
    fn overlapping_runs_merge() {
        let mut ctx = ctx(FillRule::NonZero);
        let a = line(&mut ctx, (0.0, 0.0), (4.0, 0.0), false);
        let b = line(&mut ctx, (0.0, 0.0), (4.0, 0.0), true);
        assert!(ctx.add_or_overlap(a, b, 0.0, 0.5, 0.0, 0.5).unwrap());
        assert!(ctx.add_or_overlap(b, a, 0.25, 0.75, 0.25, 0.75).unwrap());
        assert!(!ctx.add_or_overlap(a, b, 0.1, 0.6, 0.1, 0.6).unwrap());
        assert_eq!(ctx.coincidences.len(), 1);
        let rec = ctx.coincidences[0];
        assert_eq!(ctx.ptts[rec.coin_start].t, 0.0);
        assert_eq!(ctx.ptts[rec.coin_end].t, 0.75);
        assert!(ctx.contains(a, 0.2, 0.7, b, 0.2, 0.7));
    }

    #[test]
    fn flipped_runs_stay_flipped() {
        let mut ctx = ctx(FillRule::NonZero);
        let a = line(&mut ctx, (0.0, 0.0), (4.0, 0.0), false);
        let b = line(&mut ctx, (4.0, 0.0), (0.0, 0.0), false);
        assert!(ctx.add_or_overlap(b, a, 0.0, 0.5, 1.0, 0.5).unwrap());
        let rec = ctx.coincidences[0];
        assert_eq!(ctx.ptt_segment(rec.coin_start), a);
        assert!(ctx.flipped(&rec));
        assert_eq!(ctx.ptts[rec.coin_start].t, 0.5);
        assert_eq!(ctx.ptts[rec.opp_start].t, 0.5);
    }

    #[test]
    fn add_expanded_matches_boundaries() {
        let mut ctx = ctx(FillRule::NonZero);
        let a = line(&mut ctx, (0.0, 0.0), (4.0, 0.0), false);
        let b = line(&mut ctx, (1.0, 0.0), (3.0, 0.0), true);
        ctx.add_t(a, 0.375, Point::new(1.5, 0.0), false);
        ctx.add_or_overlap(a, b, 0.25, 0.75, 0.0, 1.0).unwrap();
        assert!(ctx.add_expanded().unwrap());
        assert!(!ctx.add_expanded().unwrap());
        let ts: Vec<f64> = ctx.boundaries(b).iter().map(|&s| ctx.span_t(s)).collect();
        assert_eq!(ts, vec![0.0, 0.25, 1.0]);
    }

    #[test]
    fn add_missing_is_transitive() {
        let mut ctx = ctx(FillRule::NonZero);
        let s = line(&mut ctx, (0.0, 0.0), (4.0, 0.0), false);
        let x = line(&mut ctx, (0.0, 0.0), (2.0, 0.0), true);
        let y = line(&mut ctx, (1.0, 0.0), (4.0, 0.0), true);
        ctx.add_or_overlap(s, x, 0.0, 0.5, 0.0, 1.0).unwrap();
        ctx.add_or_overlap(s, y, 0.25, 1.0, 0.0, 1.0).unwrap();
        assert!(ctx.add_missing().unwrap());
        assert!(ctx.contains(x, 0.5, 1.0, y, 0.0, 1.0 / 3.0));
        assert!(!ctx.add_missing().unwrap());
    }

    #[test]
    fn apply_stacks_values() {
        let mut ctx = ctx(FillRule::NonZero);
        let a = line(&mut ctx, (0.0, 0.0), (4.0, 0.0), false);
        let b = line(&mut ctx, (0.0, 0.0), (4.0, 0.0), true);
        ctx.add_or_overlap(a, b, 0.0, 1.0, 0.0, 1.0).unwrap();
        ctx.resolve_coincidences().unwrap();
        ctx.apply().unwrap();
        // The first operand's segment wins the tie, and picks up the second's edge.
        assert_eq!(values(&ctx, a), vec![(1, 1, false)]);
        assert_eq!(values(&ctx, b), vec![(0, 0, true)]);
        assert!(ctx.coincident.same(ctx.segments[a].head, ctx.segments[b].head));
    }

    #[test]
    fn apply_cancels_opposite_edges() {
        let mut ctx = ctx(FillRule::NonZero);
        let a = line(&mut ctx, (0.0, 0.0), (4.0, 0.0), false);
        let b = line(&mut ctx, (4.0, 0.0), (0.0, 0.0), false);
        ctx.add_or_overlap(a, b, 0.0, 1.0, 1.0, 0.0).unwrap();
        ctx.resolve_coincidences().unwrap();
        ctx.apply().unwrap();
        assert_eq!(values(&ctx, a), vec![(0, 0, true)]);
        assert_eq!(values(&ctx, b), vec![(0, 0, true)]);
    }

    #[test]
    fn even_odd_values_are_masked() {
        let mut ctx = ctx(FillRule::EvenOdd);
        let a = line(&mut ctx, (0.0, 0.0), (4.0, 0.0), false);
        let b = line(&mut ctx, (0.0, 0.0), (4.0, 0.0), false);
        ctx.add_or_overlap(a, b, 0.0, 1.0, 0.0, 1.0).unwrap();
        ctx.resolve_coincidences().unwrap();
        ctx.apply().unwrap();
        assert_eq!(values(&ctx, a), vec![(0, 0, true)]);
    }

    #[test]
    fn partial_overlap_splits_both() {
        let mut ctx = ctx(FillRule::NonZero);
        let a = line(&mut ctx, (0.0, 0.0), (4.0, 0.0), false);
        let b = line(&mut ctx, (2.0, 0.0), (6.0, 0.0), true);
        ctx.add_or_overlap(a, b, 0.5, 1.0, 0.0, 0.5).unwrap();
        ctx.resolve_coincidences().unwrap();
        ctx.apply().unwrap();
        assert_eq!(values(&ctx, a), vec![(1, 0, false), (1, 1, false)]);
        assert_eq!(values(&ctx, b), vec![(0, 0, true), (1, 0, false)]);
    }

    #[test]
    fn collapsed_records_are_released() {
        let mut ctx = ctx(FillRule::NonZero);
        let a = line(&mut ctx, (0.0, 0.0), (4.0, 0.0), false);
        let b = line(&mut ctx, (0.0, 0.0), (4.0, 0.0), true);
        ctx.add_or_overlap(a, b, 0.5, 0.75, 0.5, 0.75).unwrap();
        assert_eq!(ctx.coincidences.len(), 1);
        let rec = ctx.coincidences[0];
        // Pretend that the run collapsed onto one boundary.
        let s = ctx.ptts[rec.coin_start].span;
        ctx.ptts[rec.coin_end].span = s;
        assert_eq!(ctx.remove_collapsed(), 1);
        assert!(ctx.coincidences.is_empty());
    }

    #[test]
    fn run_end_aliases_nearby_boundary() {
        let mut ctx = ctx(FillRule::NonZero);
        let a = line(&mut ctx, (0.0, 0.0), (4.0, 0.0), false);
        let b = line(&mut ctx, (0.0, 0.0), (4.0, 0.0), true);
        let mid = ctx.add_t(a, 0.5, Point::new(2.0, 0.0), false);
        let t = 0.5 + 1e-12;
        ctx.add_or_overlap(a, b, 0.0, t, 0.0, t).unwrap();

        let rec = ctx.coincidences[0];
        assert_ne!(rec.coin_end, mid);
        assert_eq!(ctx.ptts[rec.coin_end].span, ctx.ptts[mid].span);
        assert!(ctx.rings.same(rec.coin_end, rec.opp_end));

        // Adding the same run again changes nothing.
        assert!(!ctx.add_or_overlap(a, b, 0.0, t, 0.0, t).unwrap());
        assert_eq!(ctx.rings.members(mid).len(), 3);

        ctx.fix_up();
        assert_eq!(ctx.coincidences.len(), 1);
        assert_eq!(ctx.coincidences[0].coin_end, mid);
    }

    #[test]
    fn collapsed_extension_keeps_record() {
        let mut ctx = ctx(FillRule::NonZero);
        let a = line(&mut ctx, (0.0, 0.0), (4.0, 0.0), false);
        let b = line(&mut ctx, (0.0, 0.0), (4.0, 0.0), true);
        ctx.add_or_overlap(a, b, 0.25, 0.5, 0.25, 0.5).unwrap();
        let rec = ctx.coincidences[0];
        let cs = ctx.spans[ctx.segments[a].head].ptt;
        let ce = ctx.spans[ctx.segments[a].tail].ptt;
        ctx.extend(rec, cs, ce, rec.opp_end, rec.opp_end).unwrap();
        assert_eq!(ctx.coincidences, vec![rec]);
    }

    #[test]
    fn extension_replaces_record() {
        let mut ctx = ctx(FillRule::NonZero);
        let a = line(&mut ctx, (0.0, 0.0), (4.0, 0.0), false);
        let b = line(&mut ctx, (0.0, 0.0), (4.0, 0.0), true);
        ctx.add_or_overlap(a, b, 0.25, 0.5, 0.25, 0.5).unwrap();
        let rec = ctx.coincidences[0];
        let cs = ctx.spans[ctx.segments[a].head].ptt;
        let os = ctx.spans[ctx.segments[b].head].ptt;
        ctx.extend(rec, cs, rec.coin_end, os, rec.opp_end).unwrap();
        assert_eq!(ctx.coincidences.len(), 1);
        let grown = ctx.coincidences[0];
        assert_eq!(ctx.ptts[grown.coin_start].t, 0.0);
        assert_eq!(ctx.ptts[grown.coin_end].t, 0.5);
    }

    proptest! {
        #[test]
        fn merged_runs_cover_inputs(
            runs in proptest::collection::vec((0u8..=16, 0u8..=16), 1..8)
        ) {
            let mut ctx = ctx(FillRule::NonZero);
            let a = line(&mut ctx, (0.0, 0.0), (16.0, 0.0), false);
            let b = line(&mut ctx, (0.0, 0.0), (16.0, 0.0), true);
            let mut inputs = Vec::new();
            for (x, y) in runs {
                if x == y {
                    continue;
                }
                let (t0, t1) = (x as f64 / 16.0, y as f64 / 16.0);
                ctx.add_or_overlap(a, b, t0, t1, t0, t1).unwrap();
                inputs.push((t0.min(t1), t0.max(t1)));
            }

            let ranges: Vec<(f64, f64)> = ctx
                .coincidences
                .iter()
                .map(|r| (ctx.ptts[r.coin_start].t, ctx.ptts[r.coin_end].t))
                .collect();
            for (i, r) in ranges.iter().enumerate() {
                prop_assert!(r.0 < r.1);
                for s in &ranges[(i + 1)..] {
                    // Neither overlapping nor touching.
                    prop_assert!(r.1 < s.0 || s.1 < r.0);
                }
            }
            for (lo, hi) in inputs {
                prop_assert!(ranges.iter().any(|r| r.0 <= lo && hi <= r.1));
            }
        }
    }
}
