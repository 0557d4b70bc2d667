//! Symbolic multi-valued entity values
//!
//! An [`EntityValue`] is a set of possible members with a probability weight.
//! A value is truthy iff it holds at least one concrete member (a literal or a
//! relational constraint); symbol placeholders and deferred expressions ride
//! along without making a value truthy.

use crate::symbolic::{Constraint, SymExpr};
use crate::value::{cmp_f64, normalize};
use crate::{ArithOp, CmpOp, Error, IntervalSet, Reference, Result, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// One possible member of an entity value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Member {
    /// A concrete literal
    Literal(Value),
    /// A reference standing in for a value not known yet
    Symbol(Reference),
    /// A free variable restricted to an interval set
    Constraint(Constraint),
    /// An unevaluated expression over free symbols
    Deferred(SymExpr),
}

impl Member {
    /// Whether this member counts towards truthiness
    pub fn is_concrete(&self) -> bool {
        matches!(self, Member::Literal(_) | Member::Constraint(_))
    }

    /// Symbol placeholders and deferred expressions
    pub fn is_symbolic(&self) -> bool {
        !self.is_concrete()
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Member::Literal(v) => v.type_name(),
            Member::Symbol(_) => "symbol",
            Member::Constraint(_) => "constraint",
            Member::Deferred(_) => "expression",
        }
    }

    fn as_expr(&self) -> Option<SymExpr> {
        match self {
            Member::Literal(v) => Some(SymExpr::Literal(v.clone())),
            Member::Symbol(r) => Some(SymExpr::Symbol(r.clone())),
            Member::Deferred(e) => Some(e.clone()),
            Member::Constraint(_) => None,
        }
    }

    fn collect_symbols(&self, out: &mut BTreeSet<Reference>) {
        match self {
            Member::Symbol(r) => {
                out.insert(r.clone());
            }
            Member::Deferred(e) => out.extend(e.symbols()),
            Member::Constraint(c) => {
                out.insert(c.variable.clone());
            }
            Member::Literal(_) => {}
        }
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Member::Literal(v) => write!(f, "{}", v),
            Member::Symbol(r) => write!(f, "{}", r),
            Member::Constraint(c) => write!(f, "{}", c),
            Member::Deferred(e) => write!(f, "{}", e),
        }
    }
}

/// An immutable set of possible members with a probability weight in `[0, 1]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityValue {
    members: BTreeSet<Member>,
    probability: f64,
}

impl Default for EntityValue {
    fn default() -> Self {
        Self::empty()
    }
}

impl EntityValue {
    /// The empty (falsy) value
    pub fn empty() -> Self {
        Self {
            members: BTreeSet::new(),
            probability: 1.0,
        }
    }

    /// The truthy sentinel `{true}`
    pub fn truthy() -> Self {
        Self::literal(Value::Bool(true))
    }

    pub fn literal(value: Value) -> Self {
        Self::from_members([Member::Literal(value)])
    }

    /// A lone symbol placeholder
    pub fn symbol(reference: Reference) -> Self {
        Self::from_members([Member::Symbol(reference)])
    }

    pub fn constraint(constraint: Constraint) -> Self {
        Self::from_members([Member::Constraint(constraint)])
    }

    /// Build a normalised value from members
    pub fn from_members(members: impl IntoIterator<Item = Member>) -> Self {
        let mut value = Self::empty();
        for member in members {
            value.insert(member);
        }
        value
    }

    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        Self::from_members(values.into_iter().map(Member::Literal))
    }

    /// Return a copy with the given probability (clamped to `[0, 1]`)
    pub fn with_probability(mut self, probability: f64) -> Self {
        self.probability = clamp_probability(probability);
        self
    }

    pub fn members(&self) -> &BTreeSet<Member> {
        &self.members
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, member: &Member) -> bool {
        self.members.contains(member)
    }

    /// Truthy iff at least one concrete member is present
    pub fn is_truthy(&self) -> bool {
        self.members.iter().any(Member::is_concrete)
    }

    /// Whether any symbolic member is present
    pub fn has_symbolic(&self) -> bool {
        self.members.iter().any(Member::is_symbolic)
    }

    /// The concrete members only, keeping the probability
    pub fn concrete(&self) -> EntityValue {
        Self::from_members(self.members.iter().filter(|m| m.is_concrete()).cloned())
            .with_probability(self.probability)
    }

    pub fn literals(&self) -> impl Iterator<Item = &Value> {
        self.members.iter().filter_map(|m| match m {
            Member::Literal(v) => Some(v),
            _ => None,
        })
    }

    /// Numeric literal members
    pub fn numbers(&self) -> impl Iterator<Item = f64> + '_ {
        self.literals().filter_map(Value::as_number)
    }

    /// Bare symbol placeholders
    pub fn symbols(&self) -> impl Iterator<Item = &Reference> {
        self.members.iter().filter_map(|m| match m {
            Member::Symbol(r) => Some(r),
            _ => None,
        })
    }

    pub fn constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.members.iter().filter_map(|m| match m {
            Member::Constraint(c) => Some(c),
            _ => None,
        })
    }

    /// Whether a constraint on `variable` is held
    pub fn constrains(&self, variable: &Reference) -> bool {
        self.constraints().any(|c| c.variable == *variable)
    }

    /// Every free variable mentioned by any member
    pub fn free_symbols(&self) -> BTreeSet<Reference> {
        let mut out = BTreeSet::new();
        for member in &self.members {
            member.collect_symbols(&mut out);
        }
        out
    }

    /// Insert keeping the set canonical: `false` never survives, empty
    /// constraints vanish and constraints over one variable are merged.
    fn insert(&mut self, member: Member) {
        match member {
            Member::Literal(Value::Bool(false)) => {}
            Member::Constraint(c) => {
                let existing = self
                    .constraints()
                    .find(|other| other.variable == c.variable)
                    .cloned();
                let merged = match existing {
                    Some(old) => {
                        self.members.remove(&Member::Constraint(old.clone()));
                        Constraint::new(c.variable, old.domain.union(&c.domain))
                    }
                    None => c,
                };
                if merged.is_satisfiable() {
                    self.members.insert(Member::Constraint(merged));
                }
            }
            Member::Literal(Value::Number(n)) => {
                self.members.insert(Member::Literal(Value::Number(normalize(n))));
            }
            other => {
                self.members.insert(other);
            }
        }
    }

    /// Intersect a constraint with any constraint already held on its variable.
    ///
    /// Returns false when the combination is unsatisfiable.
    fn restrict(&mut self, c: Constraint) -> bool {
        let existing = self
            .constraints()
            .find(|other| other.variable == c.variable)
            .cloned();
        let narrowed = match existing {
            Some(old) => {
                self.members.remove(&Member::Constraint(old.clone()));
                old.restrict(&c.domain)
            }
            None => c,
        };
        if !narrowed.is_satisfiable() {
            return false;
        }
        self.members.insert(Member::Constraint(narrowed));
        true
    }

    /// Set union; the weight is the larger of the two.
    ///
    /// An empty side contributes no weight.
    pub fn union(&self, other: &EntityValue) -> EntityValue {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        let mut out = self.clone();
        for member in &other.members {
            out.insert(member.clone());
        }
        out.probability = self.probability.max(other.probability);
        out
    }

    /// Members of `self` not present in `other`
    pub fn difference(&self, other: &EntityValue) -> EntityValue {
        Self {
            members: self.members.difference(&other.members).cloned().collect(),
            probability: self.probability,
        }
    }

    /// Truthy iff `self` is falsy; symbol placeholders are kept
    pub fn negate(&self) -> EntityValue {
        let symbolic = self.members.iter().filter(|m| m.is_symbolic()).cloned();
        let mut out = if self.is_truthy() {
            Self::from_members(symbolic)
        } else {
            Self::from_members(symbolic.chain([Member::Literal(Value::Bool(true))]))
        };
        out.probability = self.probability;
        out
    }

    /// Union of both sides iff both are truthy, else empty.
    ///
    /// Constraints over the same variable are intersected; an unsatisfiable
    /// intersection empties the result.
    pub fn and(&self, other: &EntityValue) -> EntityValue {
        if !self.is_truthy() || !other.is_truthy() {
            return Self::empty();
        }
        let mut out = self.clone();
        for member in &other.members {
            match member {
                Member::Constraint(c) => {
                    if !out.restrict(c.clone()) {
                        return Self::empty();
                    }
                }
                m => out.insert(m.clone()),
            }
        }
        out.probability = self.probability.min(other.probability);
        out
    }

    /// Union iff either side is truthy, else empty
    pub fn or(&self, other: &EntityValue) -> EntityValue {
        if !self.is_truthy() && !other.is_truthy() {
            return Self::empty();
        }
        self.union(other)
    }

    /// The truthy side iff exactly one side is truthy, else empty
    pub fn xor(&self, other: &EntityValue) -> EntityValue {
        match (self.is_truthy(), other.is_truthy()) {
            (true, false) => self.clone(),
            (false, true) => other.clone(),
            _ => Self::empty(),
        }
    }

    /// Target-mode `and`: every referenced target on either side
    pub fn target_and(&self, other: &EntityValue) -> EntityValue {
        self.union(other)
    }

    /// Target-mode `or`: the left operand
    pub fn target_or(&self, _other: &EntityValue) -> EntityValue {
        self.clone()
    }

    /// Target-mode `xor`: the side whose referenced entity is active, the left
    /// operand when both or neither are
    pub fn target_xor(&self, other: &EntityValue) -> EntityValue {
        if other.is_truthy() && !self.is_truthy() {
            other.clone()
        } else {
            self.clone()
        }
    }

    /// Cartesian combination of every member pair.
    ///
    /// Literal pairs are evaluated; pairs with a symbolic side stay deferred.
    /// Constraints cannot take part in arithmetic, and neither can a symbolic
    /// divisor or exponent.
    pub fn arith(op: ArithOp, lhs: &EntityValue, rhs: &EntityValue) -> Result<EntityValue> {
        let mut out = Self::empty();
        for a in &lhs.members {
            for b in &rhs.members {
                let member = match (a, b) {
                    (Member::Literal(x), Member::Literal(y)) => Member::Literal(Value::arith(op, x, y)?),
                    (Member::Constraint(_), _) | (_, Member::Constraint(_)) => {
                        return Err(Error::type_mismatch(op.symbol(), a.type_name(), b.type_name()));
                    }
                    (_, b) if b.is_symbolic() && matches!(op, ArithOp::Div | ArithOp::Pow) => {
                        return Err(Error::type_mismatch(op.symbol(), a.type_name(), b.type_name()));
                    }
                    (a, b) => match (a.as_expr(), b.as_expr()) {
                        (Some(x), Some(y)) => Member::Deferred(SymExpr::arith(op, x, y)),
                        _ => {
                            return Err(Error::type_mismatch(op.symbol(), a.type_name(), b.type_name()))
                        }
                    },
                };
                out.insert(member);
            }
        }
        out.probability = lhs.probability * rhs.probability;
        Ok(out)
    }

    /// Unary minus, `0 - self`
    pub fn negative(&self) -> Result<EntityValue> {
        Self::arith(ArithOp::Sub, &Self::literal(Value::Number(0.0)), self)
    }

    /// Compare every member pair.
    ///
    /// Literal pairs are evaluated and counted; each satisfied pair yields the
    /// `true` sentinel. A symbolic side that is linear in one variable, compared
    /// against a number, yields a derived constraint; carried constraints are
    /// narrowed by the relation. Other symbolic pairs stay deferred, and the
    /// free symbols of both sides are carried. The weight is the satisfied
    /// ratio times both operand weights; a ratio below one half collapses the
    /// result to empty.
    pub fn compare(op: CmpOp, lhs: &EntityValue, rhs: &EntityValue) -> EntityValue {
        match (lhs.is_empty(), rhs.is_empty()) {
            (true, true) if op == CmpOp::Eq => return Self::truthy(),
            (true, false) | (false, true) if op == CmpOp::Ne => return Self::truthy(),
            (true, _) | (_, true) => return Self::empty(),
            _ => {}
        }

        let mut out = Self::empty();
        let mut evaluated = 0usize;
        let mut satisfied = 0usize;

        for a in &lhs.members {
            for b in &rhs.members {
                match compare_pair(op, a, b) {
                    Pair::Evaluated(true) => {
                        evaluated += 1;
                        satisfied += 1;
                        out.insert(Member::Literal(Value::Bool(true)));
                    }
                    Pair::Evaluated(false) => evaluated += 1,
                    Pair::Narrowed(c) => {
                        evaluated += 1;
                        if c.is_satisfiable() {
                            satisfied += 1;
                            out.insert(Member::Constraint(c));
                        }
                    }
                    Pair::Derived(Member::Constraint(c))
                        if lhs.constrains(&c.variable) || rhs.constrains(&c.variable) => {}
                    Pair::Derived(member) => out.insert(member),
                    Pair::Carried => {}
                }
            }
        }

        for member in lhs.members.iter().chain(rhs.members.iter()) {
            match member {
                Member::Symbol(_) | Member::Deferred(_) => {
                    let mut symbols = BTreeSet::new();
                    member.collect_symbols(&mut symbols);
                    for s in symbols {
                        out.insert(Member::Symbol(s));
                    }
                }
                Member::Constraint(c) if !rhs_has_number(lhs, rhs, member) => {
                    out.insert(Member::Constraint(c.clone()));
                }
                _ => {}
            }
        }

        let ratio = if evaluated == 0 {
            1.0
        } else {
            let ratio = satisfied as f64 / evaluated as f64;
            if ratio < 0.5 {
                return Self::empty();
            }
            ratio
        };
        out.probability = clamp_probability(ratio * lhs.probability * rhs.probability);
        out
    }

    /// Drop the `true` sentinel when other concrete members make it redundant
    pub fn clean(&self) -> EntityValue {
        let sentinel = Member::Literal(Value::Bool(true));
        let redundant = self.members.contains(&sentinel)
            && self
                .members
                .iter()
                .any(|m| m.is_concrete() && *m != sentinel);
        if !redundant {
            return self.clone();
        }
        let mut out = self.clone();
        out.members.remove(&sentinel);
        out
    }

    /// Replace symbolic members using `lookup`, one level deep.
    ///
    /// Symbols resolve to their looked-up values, deferred expressions are
    /// re-evaluated, and constraints whose variable resolves to numbers are
    /// checked: satisfied becomes `true`, violated disappears.
    pub fn substitute<F>(&self, lookup: &F) -> Result<EntityValue>
    where
        F: Fn(&Reference) -> Option<EntityValue>,
    {
        let mut out = Self::empty();
        for member in &self.members {
            match member {
                Member::Literal(_) => out.insert(member.clone()),
                Member::Symbol(r) => match lookup(r) {
                    Some(_) if self.constrains(r) => {}
                    Some(value) => value.members.into_iter().for_each(|m| out.insert(m)),
                    None => out.insert(member.clone()),
                },
                Member::Constraint(c) => {
                    let numbers: Vec<f64> = lookup(&c.variable)
                        .map(|v| v.numbers().collect())
                        .unwrap_or_default();
                    if numbers.is_empty() {
                        out.insert(member.clone());
                    } else if numbers.iter().any(|n| c.domain.contains(*n)) {
                        out.insert(Member::Literal(Value::Bool(true)));
                    }
                }
                Member::Deferred(e) => {
                    e.evaluate(lookup)?
                        .members
                        .into_iter()
                        .for_each(|m| out.insert(m));
                }
            }
        }
        out.probability = self.probability;
        Ok(out)
    }
}

/// Outcome of comparing one member pair
enum Pair {
    Evaluated(bool),
    Narrowed(Constraint),
    Derived(Member),
    Carried,
}

fn compare_pair(op: CmpOp, a: &Member, b: &Member) -> Pair {
    match (a, b) {
        (Member::Literal(x), Member::Literal(y)) => Pair::Evaluated(Value::compare(op, x, y) == Some(true)),
        (Member::Constraint(c), Member::Literal(y)) => match y.as_number() {
            Some(n) => Pair::Narrowed(c.restrict(&IntervalSet::relation(op, n))),
            None => Pair::Evaluated(false),
        },
        (Member::Literal(_), Member::Constraint(_)) => match compare_pair(op.mirror(), b, a) {
            p @ (Pair::Narrowed(_) | Pair::Evaluated(_)) => p,
            _ => Pair::Carried,
        },
        (Member::Constraint(_), _) | (_, Member::Constraint(_)) => Pair::Carried,
        (sym, Member::Literal(y)) => derive(op, sym, y),
        (Member::Literal(x), sym) => derive(op.mirror(), sym, x),
        (a, b) => match (a.as_expr(), b.as_expr()) {
            (Some(x), Some(y)) => Pair::Derived(Member::Deferred(SymExpr::compare(op, x, y))),
            _ => Pair::Carried,
        },
    }
}

/// `sym op literal` for a symbolic member
fn derive(op: CmpOp, sym: &Member, literal: &Value) -> Pair {
    let Some(expr) = sym.as_expr() else {
        return Pair::Carried;
    };
    match (expr.linear(), literal.as_number()) {
        (Some((variable, k, m)), Some(n)) if k != 0.0 => {
            let op = if k < 0.0 { op.mirror() } else { op };
            Pair::Derived(Member::Constraint(Constraint::relation(variable, op, (n - m) / k)))
        }
        (Some((_, _, m)), Some(n)) => Pair::Evaluated(op.holds(cmp_f64(m, n))),
        _ => Pair::Derived(Member::Deferred(SymExpr::compare(
            op,
            expr,
            SymExpr::Literal(literal.clone()),
        ))),
    }
}

/// Whether a carried constraint met a numeric literal on the opposite side
fn rhs_has_number(lhs: &EntityValue, rhs: &EntityValue, member: &Member) -> bool {
    let opposite = if lhs.members.contains(member) { rhs } else { lhs };
    opposite.numbers().next().is_some()
}

fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

impl PartialEq for EntityValue {
    fn eq(&self, other: &Self) -> bool {
        self.members == other.members && cmp_f64(self.probability, other.probability) == Ordering::Equal
    }
}

impl Eq for EntityValue {}

impl Hash for EntityValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.members.hash(state);
        normalize(self.probability).to_bits().hash(state);
    }
}

impl fmt::Display for EntityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (n, member) in self.members.iter().enumerate() {
            if n > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", member)?;
        }
        write!(f, "}}")?;
        if self.probability < 1.0 {
            write!(f, "@{}", self.probability)?;
        }
        Ok(())
    }
}

impl From<Value> for EntityValue {
    fn from(value: Value) -> Self {
        Self::literal(value)
    }
}

impl From<bool> for EntityValue {
    fn from(b: bool) -> Self {
        Self::literal(Value::Bool(b))
    }
}

impl From<f64> for EntityValue {
    fn from(n: f64) -> Self {
        Self::literal(Value::Number(n))
    }
}

impl From<i64> for EntityValue {
    fn from(n: i64) -> Self {
        Self::literal(Value::from(n))
    }
}

impl From<&str> for EntityValue {
    fn from(s: &str) -> Self {
        Self::literal(Value::from(s))
    }
}

impl From<Vec<Value>> for EntityValue {
    fn from(values: Vec<Value>) -> Self {
        Self::from_values(values)
    }
}

impl FromIterator<Member> for EntityValue {
    fn from_iter<I: IntoIterator<Item = Member>>(iter: I) -> Self {
        Self::from_members(iter)
    }
}

impl FromIterator<Value> for EntityValue {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::from_values(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn nums(ns: &[i64]) -> EntityValue {
        ns.iter().map(|n| Value::from(*n)).collect()
    }

    fn sym(name: &str) -> EntityValue {
        EntityValue::symbol(Reference::new(name))
    }

    #[test]
    fn test_construction_normalizes() {
        assert!(EntityValue::from(false).is_empty());
        assert_eq!(EntityValue::from(true), EntityValue::truthy());
        assert_eq!(nums(&[1, 1, 2]).len(), 2);
        assert!(EntityValue::from(0i64).is_truthy());
        assert_eq!(EntityValue::empty().with_probability(3.0).probability(), 1.0);
    }

    #[test]
    fn test_truthiness_ignores_symbols() {
        assert!(!sym("x").is_truthy());
        assert!(sym("x").union(&nums(&[1])).is_truthy());
        let c = EntityValue::constraint(Constraint::relation(Reference::new("x"), CmpOp::Gt, 1.0));
        assert!(c.is_truthy());
    }

    #[test]
    fn test_boolean_ops() {
        let a = nums(&[1]);
        let b = nums(&[2]);
        assert_eq!(a.and(&b), nums(&[1, 2]));
        assert!(a.and(&EntityValue::empty()).is_empty());
        assert_eq!(a.or(&EntityValue::empty()), a);
        assert!(EntityValue::empty().or(&sym("x")).is_empty());
        assert_eq!(a.xor(&EntityValue::empty()), a);
        assert!(a.xor(&b).is_empty());
        assert!(a.negate().is_empty());
        assert_eq!(EntityValue::empty().negate(), EntityValue::truthy());
    }

    #[test]
    fn test_negate_keeps_symbols() {
        let x = sym("x");
        let negated = x.negate();
        assert!(negated.is_truthy());
        assert_eq!(negated.symbols().count(), 1);
        assert_eq!(negated.negate(), x);
    }

    #[test]
    fn test_and_intersects_constraints() {
        let x = Reference::new("x");
        let gt = EntityValue::constraint(Constraint::relation(x.clone(), CmpOp::Gt, 1.0));
        let lt = EntityValue::constraint(Constraint::relation(x.clone(), CmpOp::Lt, 5.0));
        let band = gt.and(&lt);
        let c = band.constraints().next().unwrap();
        assert!(c.domain.contains(3.0) && !c.domain.contains(6.0));

        let never = EntityValue::constraint(Constraint::relation(x, CmpOp::Lt, 0.0));
        assert!(gt.and(&never).is_empty());
    }

    #[test]
    fn test_union_merges_constraints() {
        let x = Reference::new("x");
        let lo = EntityValue::constraint(Constraint::relation(x.clone(), CmpOp::Lt, 0.0));
        let hi = EntityValue::constraint(Constraint::relation(x, CmpOp::Ge, 0.0));
        let all = lo.union(&hi);
        assert_eq!(all.len(), 1);
        assert!(all.constraints().next().unwrap().domain.is_full());
    }

    #[test]
    fn test_arith_cartesian() {
        let sum = EntityValue::arith(ArithOp::Add, &nums(&[1, 2]), &nums(&[10, 20])).unwrap();
        assert_eq!(sum, nums(&[11, 12, 21, 22]));
        let halves = EntityValue::arith(ArithOp::Mul, &nums(&[2]).with_probability(0.5), &nums(&[3])).unwrap();
        assert_eq!(halves.probability(), 0.5);
        assert!(EntityValue::arith(ArithOp::Add, &EntityValue::empty(), &nums(&[1]))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_arith_defers_symbols() {
        let deferred = EntityValue::arith(ArithOp::Add, &sym("x"), &nums(&[1])).unwrap();
        assert_eq!(deferred.len(), 1);
        assert!(!deferred.is_truthy());
        assert_eq!(deferred.to_string(), "{(x + 1)}");
    }

    #[test]
    fn test_arith_errors() {
        assert_eq!(
            EntityValue::arith(ArithOp::Div, &nums(&[1]), &nums(&[0])),
            Err(Error::DivisionByZero)
        );
        assert!(matches!(
            EntityValue::arith(ArithOp::Div, &nums(&[1]), &sym("x")),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            EntityValue::arith(ArithOp::Add, &EntityValue::from("a"), &nums(&[1])),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_compare_literals() {
        assert_eq!(EntityValue::compare(CmpOp::Gt, &nums(&[5]), &nums(&[3])), EntityValue::truthy());
        assert!(EntityValue::compare(CmpOp::Lt, &nums(&[5]), &nums(&[3])).is_empty());

        let half = EntityValue::compare(CmpOp::Gt, &nums(&[1, 2, 3, 4]), &nums(&[2]));
        assert_eq!(half, EntityValue::truthy().with_probability(0.5));

        assert!(EntityValue::compare(CmpOp::Gt, &nums(&[1, 2, 3, 4]), &nums(&[3])).is_empty());
    }

    #[test]
    fn test_compare_empty_shortcuts() {
        let empty = EntityValue::empty();
        assert_eq!(EntityValue::compare(CmpOp::Eq, &empty, &empty), EntityValue::truthy());
        assert!(EntityValue::compare(CmpOp::Ne, &empty, &empty).is_empty());
        assert!(EntityValue::compare(CmpOp::Eq, &empty, &nums(&[1])).is_empty());
        assert_eq!(EntityValue::compare(CmpOp::Ne, &nums(&[1]), &empty), EntityValue::truthy());
        assert!(EntityValue::compare(CmpOp::Lt, &empty, &nums(&[1])).is_empty());
    }

    #[test]
    fn test_compare_derives_constraint() {
        let x = Reference::new("x");
        // 2 * x - 1 > 5  =>  x > 3
        let lhs = EntityValue::arith(
            ArithOp::Sub,
            &EntityValue::arith(ArithOp::Mul, &nums(&[2]), &sym("x")).unwrap(),
            &nums(&[1]),
        )
        .unwrap();
        let result = EntityValue::compare(CmpOp::Gt, &lhs, &nums(&[5]));
        assert!(result.is_truthy());
        let c = result.constraints().next().unwrap();
        assert_eq!(c.variable, x);
        assert_eq!(c.domain, IntervalSet::relation(CmpOp::Gt, 3.0));
        assert!(result.symbols().any(|s| *s == x));

        // 5 > -x  =>  x > -5
        let neg = sym("x").negative().unwrap();
        let flipped = EntityValue::compare(CmpOp::Gt, &nums(&[5]), &neg);
        let c = flipped.constraints().next().unwrap();
        assert_eq!(c.domain, IntervalSet::relation(CmpOp::Gt, -5.0));
    }

    #[test]
    fn test_compare_narrows_constraint() {
        let gt = EntityValue::compare(CmpOp::Gt, &sym("x"), &nums(&[3]));
        let band = EntityValue::compare(CmpOp::Lt, &gt, &nums(&[10]));
        let c = band.constraints().next().unwrap();
        assert!(c.domain.contains(5.0));
        assert!(!c.domain.contains(11.0) && !c.domain.contains(2.0));

        assert!(EntityValue::compare(CmpOp::Lt, &gt, &nums(&[1])).constraints().next().is_none());
    }

    #[test]
    fn test_compare_symbols_defer() {
        let result = EntityValue::compare(CmpOp::Eq, &sym("x"), &sym("y"));
        assert!(!result.is_truthy());
        assert_eq!(result.symbols().count(), 2);
        assert!(result.members().iter().any(|m| matches!(m, Member::Deferred(_))));
    }

    #[test]
    fn test_clean() {
        let mixed = EntityValue::truthy().union(&nums(&[3]));
        assert_eq!(mixed.clean(), nums(&[3]));
        assert_eq!(EntityValue::truthy().clean(), EntityValue::truthy());
        let with_symbol = EntityValue::truthy().union(&sym("x"));
        assert_eq!(with_symbol.clean(), with_symbol);
    }

    #[test]
    fn test_substitute() {
        let lookup = |r: &Reference| match r.to_string().as_str() {
            "x" => Some(nums(&[4])),
            _ => None,
        };
        assert_eq!(sym("x").substitute(&lookup).unwrap(), nums(&[4]));
        assert_eq!(sym("y").substitute(&lookup).unwrap(), sym("y"));

        let deferred = EntityValue::arith(ArithOp::Mul, &sym("x"), &nums(&[2])).unwrap();
        assert_eq!(deferred.substitute(&lookup).unwrap(), nums(&[8]));

        let gt = EntityValue::compare(CmpOp::Gt, &sym("x"), &nums(&[3]));
        assert!(gt.substitute(&lookup).unwrap().is_truthy());
        let lt = EntityValue::compare(CmpOp::Lt, &sym("x"), &nums(&[3]));
        assert!(!lt.substitute(&lookup).unwrap().is_truthy());
    }

    #[test]
    fn test_target_ops() {
        let a = sym("a");
        let b = sym("b").union(&nums(&[1]));
        assert_eq!(a.target_and(&b).symbols().count(), 2);
        assert_eq!(a.target_or(&b), a);
        assert_eq!(a.target_xor(&b), b);
        assert_eq!(b.target_xor(&a), b);
        assert_eq!(a.target_xor(&sym("c")), a);
    }

    #[test]
    fn test_display() {
        let v = nums(&[1, 2]).with_probability(0.25);
        assert_eq!(v.to_string(), "{1, 2}@0.25");
        assert_eq!(EntityValue::empty().to_string(), "{}");
    }

    #[test]
    fn test_concrete_drops_symbols() {
        let v = sym("x").union(&nums(&[1])).with_probability(0.5);
        let c = v.concrete();
        assert_eq!(c, nums(&[1]).with_probability(0.5));
        assert!(sym("x").concrete().is_empty());
        assert_eq!(v.is_truthy(), c.is_truthy());
    }

    fn literal_set() -> impl Strategy<Value = EntityValue> {
        proptest::collection::vec(-5i64..5, 0..4).prop_map(|ns| nums(&ns))
    }

    proptest! {
        #[test]
        fn prop_and_with_empty_is_empty(x in literal_set()) {
            prop_assert!(x.and(&EntityValue::empty()).is_empty());
        }

        #[test]
        fn prop_xor_self_is_empty(x in literal_set()) {
            prop_assert!(x.xor(&x).is_empty());
        }

        #[test]
        fn prop_union_commutes(x in literal_set(), y in literal_set()) {
            prop_assert_eq!(x.union(&y), y.union(&x));
        }

        #[test]
        fn prop_double_negation_of_booleans(b in any::<bool>()) {
            let x = EntityValue::from(b);
            prop_assert_eq!(x.negate().negate(), x);
        }

        #[test]
        fn prop_double_negation_keeps_symbols(
            b in any::<bool>(),
            names in proptest::collection::btree_set("[a-c]", 0..3),
        ) {
            let x = names.iter().fold(EntityValue::from(b), |acc, n| acc.union(&sym(n)));
            prop_assert_eq!(x.negate().negate(), x);
        }

        #[test]
        fn prop_or_is_truthy_iff_either(x in literal_set(), y in literal_set()) {
            prop_assert_eq!(x.or(&y).is_truthy(), x.is_truthy() || y.is_truthy());
        }
    }
}
