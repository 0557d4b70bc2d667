//! Deferred symbolic expressions and relational constraints
//!
//! Only what the value algebra needs: substitution, cartesian combination
//! (done by [`EntityValue`]) and reduction of single-variable linear
//! comparisons to interval sets.

use crate::{ArithOp, CmpOp, EntityValue, IntervalSet, Reference, Result, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// An unevaluated algebraic expression over free symbols
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SymExpr {
    Symbol(Reference),
    Literal(Value),
    Arith(ArithOp, Box<SymExpr>, Box<SymExpr>),
    Compare(CmpOp, Box<SymExpr>, Box<SymExpr>),
}

/// `coefficient * variable + offset`, with no variable for constants
#[derive(Debug, Clone, PartialEq)]
struct Affine {
    variable: Option<Reference>,
    coefficient: f64,
    offset: f64,
}

impl Affine {
    fn constant(offset: f64) -> Self {
        Self {
            variable: None,
            coefficient: 0.0,
            offset,
        }
    }

    fn scale(self, k: f64) -> Self {
        Self {
            variable: self.variable,
            coefficient: self.coefficient * k,
            offset: self.offset * k,
        }
    }

    fn combine(self, other: Affine, sign: f64) -> Option<Affine> {
        let variable = match (self.variable, other.variable) {
            (Some(a), Some(b)) if a != b => return None,
            (Some(a), _) => Some(a),
            (None, b) => b,
        };
        Some(Affine {
            variable,
            coefficient: self.coefficient + sign * other.coefficient,
            offset: self.offset + sign * other.offset,
        })
    }
}

impl SymExpr {
    pub fn arith(op: ArithOp, lhs: SymExpr, rhs: SymExpr) -> Self {
        SymExpr::Arith(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn compare(op: CmpOp, lhs: SymExpr, rhs: SymExpr) -> Self {
        SymExpr::Compare(op, Box::new(lhs), Box::new(rhs))
    }

    /// Free symbols referenced anywhere in the expression
    pub fn symbols(&self) -> BTreeSet<Reference> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<Reference>) {
        match self {
            SymExpr::Symbol(r) => {
                out.insert(r.clone());
            }
            SymExpr::Literal(_) => {}
            SymExpr::Arith(_, l, r) | SymExpr::Compare(_, l, r) => {
                l.collect_symbols(out);
                r.collect_symbols(out);
            }
        }
    }

    /// Decompose into `(variable, coefficient, offset)` when the expression is
    /// linear in exactly one variable
    pub fn linear(&self) -> Option<(Reference, f64, f64)> {
        let affine = self.affine()?;
        Some((affine.variable?, affine.coefficient, affine.offset))
    }

    fn affine(&self) -> Option<Affine> {
        match self {
            SymExpr::Symbol(r) => Some(Affine {
                variable: Some(r.clone()),
                coefficient: 1.0,
                offset: 0.0,
            }),
            SymExpr::Literal(v) => v.as_number().map(Affine::constant),
            SymExpr::Compare(..) => None,
            SymExpr::Arith(op, l, r) => {
                let (l, r) = (l.affine()?, r.affine()?);
                match op {
                    ArithOp::Add => l.combine(r, 1.0),
                    ArithOp::Sub => l.combine(r, -1.0),
                    ArithOp::Mul => match (&l.variable, &r.variable) {
                        (None, _) => Some(r.scale(l.offset)),
                        (_, None) => Some(l.scale(r.offset)),
                        _ => None,
                    },
                    ArithOp::Div if r.variable.is_none() && r.offset != 0.0 => {
                        Some(l.scale(1.0 / r.offset))
                    }
                    ArithOp::Pow if l.variable.is_none() && r.variable.is_none() => {
                        Some(Affine::constant(l.offset.powf(r.offset)))
                    }
                    ArithOp::Div | ArithOp::Pow => None,
                }
            }
        }
    }

    /// Evaluate through the value algebra, resolving symbols with `lookup`.
    ///
    /// Symbols the lookup cannot resolve stay symbolic.
    pub fn evaluate<F>(&self, lookup: &F) -> Result<EntityValue>
    where
        F: Fn(&Reference) -> Option<EntityValue>,
    {
        match self {
            SymExpr::Symbol(r) => Ok(lookup(r).unwrap_or_else(|| EntityValue::symbol(r.clone()))),
            SymExpr::Literal(v) => Ok(EntityValue::literal(v.clone())),
            SymExpr::Arith(op, l, r) => EntityValue::arith(*op, &l.evaluate(lookup)?, &r.evaluate(lookup)?),
            SymExpr::Compare(op, l, r) => Ok(EntityValue::compare(
                *op,
                &l.evaluate(lookup)?,
                &r.evaluate(lookup)?,
            )),
        }
    }
}

impl fmt::Display for SymExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymExpr::Symbol(r) => write!(f, "{}", r),
            SymExpr::Literal(v) => write!(f, "{}", v),
            SymExpr::Arith(op, l, r) => write!(f, "({} {} {})", l, op, r),
            SymExpr::Compare(op, l, r) => write!(f, "({} {} {})", l, op, r),
        }
    }
}

/// A free variable restricted to a set of intervals
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Constraint {
    pub variable: Reference,
    pub domain: IntervalSet,
}

impl Constraint {
    pub fn new(variable: Reference, domain: IntervalSet) -> Self {
        Self { variable, domain }
    }

    /// `variable op c`
    pub fn relation(variable: Reference, op: CmpOp, c: f64) -> Self {
        Self::new(variable, IntervalSet::relation(op, c))
    }

    pub fn is_satisfiable(&self) -> bool {
        !self.domain.is_empty()
    }

    /// Narrow the domain further; the result may be unsatisfiable
    pub fn restrict(&self, domain: &IntervalSet) -> Constraint {
        Constraint::new(self.variable.clone(), self.domain.intersect(domain))
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.variable, self.domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str) -> SymExpr {
        SymExpr::Symbol(Reference::new(name))
    }

    fn num(n: f64) -> SymExpr {
        SymExpr::Literal(Value::Number(n))
    }

    #[test]
    fn test_linear_decomposition() {
        // 2 * (x + 1) - 4
        let e = SymExpr::arith(
            ArithOp::Sub,
            SymExpr::arith(ArithOp::Mul, num(2.0), SymExpr::arith(ArithOp::Add, sym("x"), num(1.0))),
            num(4.0),
        );
        assert_eq!(e.linear(), Some((Reference::new("x"), 2.0, -2.0)));

        let halved = SymExpr::arith(ArithOp::Div, sym("x"), num(2.0));
        assert_eq!(halved.linear(), Some((Reference::new("x"), 0.5, 0.0)));
    }

    #[test]
    fn test_nonlinear_is_rejected() {
        assert_eq!(SymExpr::arith(ArithOp::Mul, sym("x"), sym("x")).linear(), None);
        assert_eq!(SymExpr::arith(ArithOp::Add, sym("x"), sym("y")).linear(), None);
        assert_eq!(SymExpr::arith(ArithOp::Pow, sym("x"), num(2.0)).linear(), None);
        assert_eq!(num(3.0).linear(), None);
    }

    #[test]
    fn test_symbols() {
        let e = SymExpr::compare(CmpOp::Lt, sym("a.x"), SymExpr::arith(ArithOp::Add, sym("b"), num(1.0)));
        let symbols: Vec<String> = e.symbols().iter().map(|r| r.to_string()).collect();
        assert_eq!(symbols, vec!["a.x", "b"]);
        assert_eq!(e.to_string(), "(a.x < (b + 1))");
    }

    #[test]
    fn test_evaluate_with_lookup() {
        let e = SymExpr::arith(ArithOp::Add, sym("x"), num(1.0));
        let resolved = e
            .evaluate(&|r: &Reference| (r.to_string() == "x").then(|| EntityValue::literal(Value::from(4))))
            .unwrap();
        assert_eq!(resolved, EntityValue::literal(Value::from(5)));

        let unresolved = e.evaluate(&|_: &Reference| None).unwrap();
        assert!(!unresolved.is_truthy());
        assert_eq!(unresolved.symbols().count(), 0);
    }

    #[test]
    fn test_constraint_restrict() {
        let c = Constraint::relation(Reference::new("x"), CmpOp::Gt, 3.0);
        assert!(c.restrict(&IntervalSet::relation(CmpOp::Lt, 5.0)).is_satisfiable());
        assert!(!c.restrict(&IntervalSet::relation(CmpOp::Lt, 2.0)).is_satisfiable());
        assert_eq!(c.to_string(), "x in (3, inf)");
    }
}
