//! Expression trees and their compiled evaluation plans
//!
//! Expressions arrive already parsed (from RON programs or built in code) and
//! are compiled once into a flat postfix [`Plan`], with numeric constant
//! sub-expressions folded ahead of time.

use crate::{ArithOp, CmpOp, EngineContext, EntityValue, Error, LogicOp, Reference, Result, UnaryOp, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A typed expression tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    // === Leaves ===
    /// A literal value
    Literal(Value),
    /// The entity of a reference
    Ref(Reference),

    // === Arithmetic ===
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    /// Unary minus
    Neg(Box<Expr>),

    // === Comparison ===
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Le(Box<Expr>, Box<Expr>),
    Gt(Box<Expr>, Box<Expr>),
    Ge(Box<Expr>, Box<Expr>),

    // === Logical ===
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Xor(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

/// Operator classification of an expression node
enum Shape<'a> {
    Literal(&'a Value),
    Ref(&'a Reference),
    Unary(UnaryOp, &'a Expr),
    Arith(ArithOp, &'a Expr, &'a Expr),
    Compare(CmpOp, &'a Expr, &'a Expr),
    Logic(LogicOp, &'a Expr, &'a Expr),
}

impl Expr {
    /// Create a literal expression
    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    /// Create a reference expression from a dotted path
    pub fn reference(path: &str) -> Self {
        Expr::Ref(Reference::new(path))
    }

    pub fn not(e: Expr) -> Self {
        Expr::Not(Box::new(e))
    }

    pub fn neg(e: Expr) -> Self {
        Expr::Neg(Box::new(e))
    }

    pub fn and(l: Expr, r: Expr) -> Self {
        Expr::And(Box::new(l), Box::new(r))
    }

    pub fn or(l: Expr, r: Expr) -> Self {
        Expr::Or(Box::new(l), Box::new(r))
    }

    pub fn xor(l: Expr, r: Expr) -> Self {
        Expr::Xor(Box::new(l), Box::new(r))
    }

    pub fn arith(op: ArithOp, l: Expr, r: Expr) -> Self {
        let (l, r) = (Box::new(l), Box::new(r));
        match op {
            ArithOp::Add => Expr::Add(l, r),
            ArithOp::Sub => Expr::Sub(l, r),
            ArithOp::Mul => Expr::Mul(l, r),
            ArithOp::Div => Expr::Div(l, r),
            ArithOp::Pow => Expr::Pow(l, r),
        }
    }

    pub fn compare(op: CmpOp, l: Expr, r: Expr) -> Self {
        let (l, r) = (Box::new(l), Box::new(r));
        match op {
            CmpOp::Eq => Expr::Eq(l, r),
            CmpOp::Ne => Expr::Ne(l, r),
            CmpOp::Lt => Expr::Lt(l, r),
            CmpOp::Le => Expr::Le(l, r),
            CmpOp::Gt => Expr::Gt(l, r),
            CmpOp::Ge => Expr::Ge(l, r),
        }
    }

    fn shape(&self) -> Shape<'_> {
        match self {
            Expr::Literal(v) => Shape::Literal(v),
            Expr::Ref(r) => Shape::Ref(r),
            Expr::Add(l, r) => Shape::Arith(ArithOp::Add, l, r),
            Expr::Sub(l, r) => Shape::Arith(ArithOp::Sub, l, r),
            Expr::Mul(l, r) => Shape::Arith(ArithOp::Mul, l, r),
            Expr::Div(l, r) => Shape::Arith(ArithOp::Div, l, r),
            Expr::Pow(l, r) => Shape::Arith(ArithOp::Pow, l, r),
            Expr::Neg(e) => Shape::Unary(UnaryOp::Neg, e),
            Expr::Eq(l, r) => Shape::Compare(CmpOp::Eq, l, r),
            Expr::Ne(l, r) => Shape::Compare(CmpOp::Ne, l, r),
            Expr::Lt(l, r) => Shape::Compare(CmpOp::Lt, l, r),
            Expr::Le(l, r) => Shape::Compare(CmpOp::Le, l, r),
            Expr::Gt(l, r) => Shape::Compare(CmpOp::Gt, l, r),
            Expr::Ge(l, r) => Shape::Compare(CmpOp::Ge, l, r),
            Expr::And(l, r) => Shape::Logic(LogicOp::And, l, r),
            Expr::Or(l, r) => Shape::Logic(LogicOp::Or, l, r),
            Expr::Xor(l, r) => Shape::Logic(LogicOp::Xor, l, r),
            Expr::Not(e) => Shape::Unary(UnaryOp::Not, e),
        }
    }

    /// Every reference read by the expression, in first-use order
    pub fn references(&self) -> Vec<Reference> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references(&self, out: &mut Vec<Reference>) {
        match self.shape() {
            Shape::Literal(_) => {}
            Shape::Ref(r) => {
                if !out.contains(r) {
                    out.push(r.clone());
                }
            }
            Shape::Unary(_, e) => e.collect_references(out),
            Shape::Arith(_, l, r) | Shape::Compare(_, l, r) | Shape::Logic(_, l, r) => {
                l.collect_references(out);
                r.collect_references(out);
            }
        }
    }

    /// The numeric value of a purely numeric sub-expression.
    ///
    /// Division by zero is left for evaluation to report.
    fn fold(&self) -> Option<f64> {
        match self.shape() {
            Shape::Literal(v) => v.as_number(),
            Shape::Unary(UnaryOp::Neg, e) => e.fold().map(|n| -n),
            Shape::Arith(op, l, r) => {
                let (l, r) = (l.fold()?, r.fold()?);
                Value::arith(op, &Value::Number(l), &Value::Number(r))
                    .ok()
                    .and_then(|v| v.as_number())
            }
            _ => None,
        }
    }

    /// Compile into a postfix plan
    pub fn compile(&self) -> Plan {
        let mut plan = Plan::default();
        self.emit(&mut plan);
        plan.references = self.references();
        plan
    }

    fn emit(&self, plan: &mut Plan) {
        if let Some(n) = self.fold() {
            plan.steps.push(Step::Push(EntityValue::from(n)));
            return;
        }
        match self.shape() {
            Shape::Literal(v) => plan.steps.push(Step::Push(EntityValue::literal(v.clone()))),
            Shape::Ref(r) => plan.steps.push(Step::Load(r.clone())),
            Shape::Unary(op, e) => {
                e.emit(plan);
                plan.steps.push(Step::Unary(op));
            }
            Shape::Arith(op, l, r) => {
                l.emit(plan);
                r.emit(plan);
                plan.steps.push(Step::Arith(op));
            }
            Shape::Compare(op, l, r) => {
                l.emit(plan);
                r.emit(plan);
                plan.steps.push(Step::Compare(op));
            }
            Shape::Logic(op, l, r) => {
                l.emit(plan);
                r.emit(plan);
                plan.steps.push(Step::Logic(op));
            }
        }
    }

    fn is_leaf(&self) -> bool {
        matches!(self, Expr::Literal(_) | Expr::Ref(_))
    }
}

fn write_operand(e: &Expr, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if e.is_leaf() {
        write!(f, "{}", e)
    } else {
        write!(f, "({})", e)
    }
}

fn write_binary(l: &Expr, symbol: &str, r: &Expr, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write_operand(l, f)?;
    write!(f, " {} ", symbol)?;
    write_operand(r, f)
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shape() {
            Shape::Literal(v) => write!(f, "{}", v),
            Shape::Ref(r) => write!(f, "{}", r),
            Shape::Unary(op, e) => {
                write!(f, "{}", op)?;
                write_operand(e, f)
            }
            Shape::Arith(op, l, r) => write_binary(l, op.symbol(), r, f),
            Shape::Compare(op, l, r) => write_binary(l, op.symbol(), r, f),
            Shape::Logic(op, l, r) => write_binary(l, op.symbol(), r, f),
        }
    }
}

/// How references and connectives are evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    /// References load their resolved entity; connectives are boolean
    Value,
    /// References load as symbol placeholders alongside their entity;
    /// connectives pick targets
    Target,
}

/// One instruction of a compiled plan
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Push(EntityValue),
    Load(Reference),
    Unary(UnaryOp),
    Arith(ArithOp),
    Compare(CmpOp),
    Logic(LogicOp),
}

/// A compiled postfix evaluation plan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    steps: Vec<Step>,
    references: Vec<Reference>,
}

impl Plan {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// References read by the plan
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// Run the plan against a context
    pub fn eval(&self, ctx: &EngineContext, mode: EvalMode) -> Result<EntityValue> {
        let mut stack: Vec<EntityValue> = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let value = match step {
                Step::Push(v) => v.clone(),
                Step::Load(r) => match mode {
                    EvalMode::Value => ctx.resolve(r)?,
                    EvalMode::Target => {
                        EntityValue::symbol(r.clone())
                            .union(&ctx.get(r).unwrap_or_default().concrete())
                    }
                },
                Step::Unary(op) => {
                    let v = pop(&mut stack)?;
                    match op {
                        UnaryOp::Not => v.negate(),
                        UnaryOp::Neg => v.negative()?,
                    }
                }
                Step::Arith(op) => {
                    let (l, r) = pop_pair(&mut stack)?;
                    EntityValue::arith(*op, &l, &r)?
                }
                Step::Compare(op) => {
                    let (l, r) = pop_pair(&mut stack)?;
                    EntityValue::compare(*op, &l, &r)
                }
                Step::Logic(op) => {
                    let (l, r) = pop_pair(&mut stack)?;
                    match (mode, op) {
                        (EvalMode::Value, LogicOp::And) => l.and(&r),
                        (EvalMode::Value, LogicOp::Or) => l.or(&r),
                        (EvalMode::Value, LogicOp::Xor) => l.xor(&r),
                        (EvalMode::Target, LogicOp::And) => l.target_and(&r),
                        (EvalMode::Target, LogicOp::Or) => l.target_or(&r),
                        (EvalMode::Target, LogicOp::Xor) => l.target_xor(&r),
                    }
                }
            };
            stack.push(value);
        }
        match (stack.pop(), stack.is_empty()) {
            (Some(result), true) => Ok(result),
            (None, _) => Err(Error::InvariantViolation("plan produced no value".to_string())),
            (Some(_), false) => Err(Error::InvariantViolation(format!(
                "plan left {} values on the stack",
                stack.len() + 1
            ))),
        }
    }
}

fn pop(stack: &mut Vec<EntityValue>) -> Result<EntityValue> {
    stack
        .pop()
        .ok_or_else(|| Error::InvariantViolation("evaluation stack underflow".to_string()))
}

fn pop_pair(stack: &mut Vec<EntityValue>) -> Result<(EntityValue, EntityValue)> {
    let r = pop(stack)?;
    let l = pop(stack)?;
    Ok((l, r))
}
