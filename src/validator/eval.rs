use tracing::trace;

use crate::model::expression::Expr;
use crate::model::problem::Problem;
use super::grounder::Groundings;
use super::state::{fluent_key, State};

/// A condition or numeric term that can not be interpreted.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("'{kind}' node can not be evaluated as a {context}: {expr}")]
    Unexpected { kind: &'static str, context: &'static str, expr: String },
    #[error("unbound parameter ?{0}")]
    UnboundParameter(String),
    #[error("unbound variable ?{0}")]
    UnboundVariable(String),
    #[error("fluent argument {0} is not an object")]
    NotAnObject(String),
    #[error("'{0}' needs at least one operand")]
    MissingOperand(&'static str),
}

/// Interprets conditions and numeric terms against one frozen state.
pub struct Evaluator<'a> {
    problem: &'a Problem,
    state: &'a State,
    subtype_domains: bool,
}

impl<'a> Evaluator<'a> {
    pub fn new(problem: &'a Problem, state: &'a State) -> Self {
        Self { problem, state, subtype_domains: true }
    }

    /// Whether quantifier domains include objects of descendant types.
    pub fn subtype_domains(mut self, include: bool) -> Self {
        self.subtype_domains = include;
        self
    }

    pub fn holds(&self, condition: &Expr) -> Result<bool, EvalError> {
        self.eval_bool(condition, false)
    }

    pub fn holds_all(&self, conditions: &[Expr]) -> Result<bool, EvalError> {
        for condition in conditions {
            if !self.holds(condition)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Truth of `expr`, or of its negation when `negated` is set. Negation is
    /// pushed down to the leaves: a negated fluent tests for absence and a
    /// negated comparison uses the complementary operator.
    pub fn eval_bool(&self, expr: &Expr, negated: bool) -> Result<bool, EvalError> {
        match expr {
            Expr::And(v) if negated => self.any(v, true),
            Expr::And(v) => self.all(v, false),
            Expr::Or(v) if negated => self.all(v, true),
            Expr::Or(v) => self.any(v, false),
            Expr::Not(e) => self.eval_bool(e, !negated),
            Expr::Fluent(_, _) => Ok(self.state.contains(&fluent_key(expr)?) != negated),
            Expr::BoolConst(b) => Ok(*b != negated),
            Expr::Le(l, r) => {
                let (l, r) = (self.eval_number(l)?, self.eval_number(r)?);
                Ok(if negated { l > r } else { l <= r })
            },
            Expr::Lt(l, r) => {
                let (l, r) = (self.eval_number(l)?, self.eval_number(r)?);
                Ok(if negated { l >= r } else { l < r })
            },
            Expr::Eq(l, r) => match (l.as_ref(), r.as_ref()) {
                (Expr::Object(a), Expr::Object(b)) => Ok((a == b) != negated),
                _ => {
                    let (l, r) = (self.eval_number(l)?, self.eval_number(r)?);
                    Ok(if negated { l != r } else { l == r })
                },
            },
            Expr::Implies(l, r) => {
                let value = self.eval_bool(l, true)? || self.eval_bool(r, false)?;
                Ok(value != negated)
            },
            Expr::Exists(vars, body) => {
                let mut value = false;
                let groundings = Groundings::new(self.problem, vars, body, self.subtype_domains);
                trace!("exists over {} groundings", groundings.combinations());
                for grounded in groundings {
                    trace!("exists: {}", grounded);
                    if self.eval_bool(&grounded, false)? {
                        value = true;
                        break;
                    }
                }
                Ok(value != negated)
            },
            Expr::Forall(vars, body) => {
                let mut value = true;
                let groundings = Groundings::new(self.problem, vars, body, self.subtype_domains);
                trace!("forall over {} groundings", groundings.combinations());
                for grounded in groundings {
                    trace!("forall: {}", grounded);
                    if !self.eval_bool(&grounded, false)? {
                        value = false;
                        break;
                    }
                }
                Ok(value != negated)
            },
            Expr::Parameter(p) => Err(EvalError::UnboundParameter(p.clone())),
            Expr::Variable(v) => Err(EvalError::UnboundVariable(v.clone())),
            Expr::Object(_) | Expr::Time |
            Expr::IntConst(_) | Expr::RealConst(_) |
            Expr::Plus(_) | Expr::Minus(_) | Expr::Times(_) | Expr::Div(_) => Err(Self::unexpected(expr, "condition")),
        }
    }

    /// Value of a numeric term. Operators fold left over their operands.
    pub fn eval_number(&self, expr: &Expr) -> Result<f64, EvalError> {
        match expr {
            Expr::Fluent(_, _) => Ok(self.state.number(&fluent_key(expr)?)),
            Expr::IntConst(i) => Ok(*i as f64),
            Expr::RealConst(r) => Ok(*r),
            Expr::Plus(v) => self.fold(v, "+", |acc, x| acc + x),
            Expr::Minus(v) => self.fold(v, "-", |acc, x| acc - x),
            Expr::Times(v) => self.fold(v, "*", |acc, x| acc * x),
            Expr::Div(v) => self.fold(v, "/", |acc, x| acc / x),
            Expr::Parameter(p) => Err(EvalError::UnboundParameter(p.clone())),
            Expr::Variable(v) => Err(EvalError::UnboundVariable(v.clone())),
            Expr::And(_) | Expr::Or(_) | Expr::Not(_) | Expr::Implies(_, _) |
            Expr::Exists(_, _) | Expr::Forall(_, _) |
            Expr::Object(_) | Expr::Time | Expr::BoolConst(_) |
            Expr::Le(_, _) | Expr::Lt(_, _) | Expr::Eq(_, _) => Err(Self::unexpected(expr, "number")),
        }
    }

    fn all(&self, v: &[Expr], negated: bool) -> Result<bool, EvalError> {
        for e in v {
            if !self.eval_bool(e, negated)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn any(&self, v: &[Expr], negated: bool) -> Result<bool, EvalError> {
        for e in v {
            if self.eval_bool(e, negated)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn fold<F: Fn(f64, f64) -> f64>(&self, v: &[Expr], op: &'static str, f: F) -> Result<f64, EvalError> {
        let mut it = v.iter();
        let first = it.next().ok_or(EvalError::MissingOperand(op))?;
        let mut acc = self.eval_number(first)?;
        for e in it {
            acc = f(acc, self.eval_number(e)?);
        }
        Ok(acc)
    }

    fn unexpected(expr: &Expr, context: &'static str) -> EvalError {
        EvalError::Unexpected { kind: expr.kind_name(), context, expr: expr.to_string() }
    }
}
