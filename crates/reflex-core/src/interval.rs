//! Single-variable interval reduction for relational constraints

use crate::value::cmp_f64;
use crate::CmpOp;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A contiguous range of reals. Infinite bounds are always open.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Interval {
    lo: f64,
    lo_closed: bool,
    hi: f64,
    hi_closed: bool,
}

impl Interval {
    pub fn new(lo: f64, lo_closed: bool, hi: f64, hi_closed: bool) -> Self {
        Self {
            lo,
            lo_closed: lo_closed && lo.is_finite(),
            hi,
            hi_closed: hi_closed && hi.is_finite(),
        }
    }

    /// The whole real line
    pub fn full() -> Self {
        Self::new(f64::NEG_INFINITY, false, f64::INFINITY, false)
    }

    /// The single point `[x, x]`
    pub fn point(x: f64) -> Self {
        Self::new(x, true, x, true)
    }

    pub fn lo(&self) -> f64 {
        self.lo
    }

    pub fn hi(&self) -> f64 {
        self.hi
    }

    pub fn is_empty(&self) -> bool {
        match cmp_f64(self.lo, self.hi) {
            Ordering::Greater => true,
            Ordering::Equal => !(self.lo_closed && self.hi_closed),
            Ordering::Less => false,
        }
    }

    pub fn contains(&self, x: f64) -> bool {
        let above = match cmp_f64(x, self.lo) {
            Ordering::Greater => true,
            Ordering::Equal => self.lo_closed,
            Ordering::Less => false,
        };
        let below = match cmp_f64(x, self.hi) {
            Ordering::Less => true,
            Ordering::Equal => self.hi_closed,
            Ordering::Greater => false,
        };
        above && below
    }

    pub fn intersect(&self, other: &Interval) -> Interval {
        let (lo, lo_closed) = match cmp_f64(self.lo, other.lo) {
            Ordering::Greater => (self.lo, self.lo_closed),
            Ordering::Less => (other.lo, other.lo_closed),
            Ordering::Equal => (self.lo, self.lo_closed && other.lo_closed),
        };
        let (hi, hi_closed) = match cmp_f64(self.hi, other.hi) {
            Ordering::Less => (self.hi, self.hi_closed),
            Ordering::Greater => (other.hi, other.hi_closed),
            Ordering::Equal => (self.hi, self.hi_closed && other.hi_closed),
        };
        Interval::new(lo, lo_closed, hi, hi_closed)
    }

    /// Whether `next` (which starts no earlier than `self`) overlaps or touches `self`
    fn joins(&self, next: &Interval) -> bool {
        match cmp_f64(next.lo, self.hi) {
            Ordering::Less => true,
            Ordering::Equal => next.lo_closed || self.hi_closed,
            Ordering::Greater => false,
        }
    }

    fn lower_key(&self) -> (f64, bool) {
        (self.lo, !self.lo_closed)
    }
}

impl PartialEq for Interval {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Interval {}

impl PartialOrd for Interval {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Interval {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_f64(self.lo, other.lo)
            .then_with(|| other.lo_closed.cmp(&self.lo_closed))
            .then_with(|| cmp_f64(self.hi, other.hi))
            .then_with(|| self.hi_closed.cmp(&other.hi_closed))
    }
}

impl Hash for Interval {
    fn hash<H: Hasher>(&self, state: &mut H) {
        crate::value::normalize(self.lo).to_bits().hash(state);
        self.lo_closed.hash(state);
        crate::value::normalize(self.hi).to_bits().hash(state);
        self.hi_closed.hash(state);
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |x: f64| {
            if x == f64::INFINITY {
                "inf".to_string()
            } else if x == f64::NEG_INFINITY {
                "-inf".to_string()
            } else {
                crate::Value::Number(x).to_string()
            }
        };
        write!(
            f,
            "{}{}, {}{}",
            if self.lo_closed { '[' } else { '(' },
            bound(self.lo),
            bound(self.hi),
            if self.hi_closed { ']' } else { ')' }
        )
    }
}

/// A normalised union of disjoint intervals, sorted by lower bound
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntervalSet {
    intervals: Vec<Interval>,
}

impl IntervalSet {
    /// The empty set (unsatisfiable)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn full() -> Self {
        Self {
            intervals: vec![Interval::full()],
        }
    }

    pub fn from_intervals(intervals: impl IntoIterator<Item = Interval>) -> Self {
        let mut intervals: Vec<Interval> = intervals.into_iter().filter(|i| !i.is_empty()).collect();
        intervals.sort_by(|a, b| {
            let (alo, aopen) = a.lower_key();
            let (blo, bopen) = b.lower_key();
            cmp_f64(alo, blo).then_with(|| aopen.cmp(&bopen))
        });

        let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
        for next in intervals {
            match merged.last_mut() {
                Some(current) if current.joins(&next) => match cmp_f64(next.hi, current.hi) {
                    Ordering::Greater => {
                        current.hi = next.hi;
                        current.hi_closed = next.hi_closed;
                    }
                    Ordering::Equal => current.hi_closed |= next.hi_closed,
                    Ordering::Less => {}
                },
                _ => merged.push(next),
            }
        }
        Self { intervals: merged }
    }

    /// The solution set of `x op c`
    pub fn relation(op: CmpOp, c: f64) -> Self {
        let (ninf, inf) = (f64::NEG_INFINITY, f64::INFINITY);
        match op {
            CmpOp::Eq => Self::from_intervals([Interval::point(c)]),
            CmpOp::Ne => Self::from_intervals([
                Interval::new(ninf, false, c, false),
                Interval::new(c, false, inf, false),
            ]),
            CmpOp::Lt => Self::from_intervals([Interval::new(ninf, false, c, false)]),
            CmpOp::Le => Self::from_intervals([Interval::new(ninf, false, c, true)]),
            CmpOp::Gt => Self::from_intervals([Interval::new(c, false, inf, false)]),
            CmpOp::Ge => Self::from_intervals([Interval::new(c, true, inf, false)]),
        }
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.intervals.as_slice() == [Interval::full()]
    }

    pub fn contains(&self, x: f64) -> bool {
        self.intervals.iter().any(|i| i.contains(x))
    }

    /// The single value this set admits, if it is a point
    pub fn as_point(&self) -> Option<f64> {
        match self.intervals.as_slice() {
            [only] if cmp_f64(only.lo, only.hi) == Ordering::Equal => Some(only.lo),
            _ => None,
        }
    }

    pub fn union(&self, other: &IntervalSet) -> IntervalSet {
        Self::from_intervals(self.intervals.iter().chain(other.intervals.iter()).copied())
    }

    pub fn intersect(&self, other: &IntervalSet) -> IntervalSet {
        let mut pieces = Vec::new();
        for a in &self.intervals {
            for b in &other.intervals {
                pieces.push(a.intersect(b));
            }
        }
        Self::from_intervals(pieces)
    }

    pub fn complement(&self) -> IntervalSet {
        let mut gaps = Vec::with_capacity(self.intervals.len() + 1);
        let (mut lo, mut lo_closed) = (f64::NEG_INFINITY, false);
        for i in &self.intervals {
            gaps.push(Interval::new(lo, lo_closed, i.lo, !i.lo_closed));
            lo = i.hi;
            lo_closed = !i.hi_closed;
        }
        gaps.push(Interval::new(lo, lo_closed, f64::INFINITY, false));
        Self::from_intervals(gaps)
    }
}

impl fmt::Display for IntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.intervals.is_empty() {
            return write!(f, "{{}}");
        }
        for (n, i) in self.intervals.iter().enumerate() {
            if n > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{}", i)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation() {
        let gt = IntervalSet::relation(CmpOp::Gt, 3.0);
        assert!(gt.contains(3.5));
        assert!(!gt.contains(3.0));
        let ge = IntervalSet::relation(CmpOp::Ge, 3.0);
        assert!(ge.contains(3.0));
        let ne = IntervalSet::relation(CmpOp::Ne, 1.0);
        assert_eq!(ne.intervals().len(), 2);
        assert!(!ne.contains(1.0));
        assert_eq!(IntervalSet::relation(CmpOp::Eq, 2.0).as_point(), Some(2.0));
    }

    #[test]
    fn test_union_merges_touching() {
        let a = IntervalSet::relation(CmpOp::Lt, 2.0);
        let b = IntervalSet::relation(CmpOp::Ge, 2.0);
        assert!(a.union(&b).is_full());

        let open = IntervalSet::relation(CmpOp::Lt, 2.0).union(&IntervalSet::relation(CmpOp::Gt, 2.0));
        assert_eq!(open, IntervalSet::relation(CmpOp::Ne, 2.0));
    }

    #[test]
    fn test_intersect() {
        let band = IntervalSet::relation(CmpOp::Gt, 1.0).intersect(&IntervalSet::relation(CmpOp::Le, 4.0));
        assert_eq!(band.intervals(), &[Interval::new(1.0, false, 4.0, true)]);
        assert_eq!(band.to_string(), "(1, 4]");

        let none = IntervalSet::relation(CmpOp::Lt, 1.0).intersect(&IntervalSet::relation(CmpOp::Gt, 1.0));
        assert!(none.is_empty());

        let touching = IntervalSet::relation(CmpOp::Le, 1.0).intersect(&IntervalSet::relation(CmpOp::Ge, 1.0));
        assert_eq!(touching.as_point(), Some(1.0));
    }

    #[test]
    fn test_complement() {
        let gt = IntervalSet::relation(CmpOp::Gt, 3.0);
        assert_eq!(gt.complement(), IntervalSet::relation(CmpOp::Le, 3.0));
        assert!(IntervalSet::full().complement().is_empty());
        assert!(IntervalSet::empty().complement().is_full());
        assert_eq!(
            IntervalSet::relation(CmpOp::Eq, 0.0).complement(),
            IntervalSet::relation(CmpOp::Ne, 0.0)
        );
    }
}
