use std::fmt;
use std::collections::HashMap;
use serde::{Deserialize, Serialize};

/// Quantified variable or action parameter together with the name of its type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypedVariable {
    pub name: String,
    pub kind: String,
}

impl TypedVariable {
    pub fn new(name: &str, kind: &str) -> Self {
        Self { name: name.to_owned(), kind: kind.to_owned() }
    }
}

/// Every condition, effect operand and goal is one of these nodes.
///
/// Arity is part of the shape: `Not` owns one child and the comparisons own
/// exactly two. The n-ary nodes (`And`, `Or` and the arithmetic operators)
/// hold their children in evaluation order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Implies(Box<Expr>, Box<Expr>),
    Exists(Vec<TypedVariable>, Box<Expr>),
    Forall(Vec<TypedVariable>, Box<Expr>),
    /// Fluent name and its arguments (objects, parameters or variables).
    Fluent(String, Vec<Expr>),
    Object(String),
    Variable(String),
    Parameter(String),
    Time,
    BoolConst(bool),
    IntConst(i64),
    RealConst(f64),
    Plus(Vec<Expr>),
    Minus(Vec<Expr>),
    Times(Vec<Expr>),
    Div(Vec<Expr>),
    Le(Box<Expr>, Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
}

#[macro_export]
macro_rules! exp_not {
    ( $e: expr ) => {
        $crate::model::expression::Expr::Not(Box::new($e))
    };
}

#[macro_export]
macro_rules! exp_and {
    ( $($e: expr), * ) => {
        $crate::model::expression::Expr::And(vec![$($e),*])
    };
}

#[macro_export]
macro_rules! exp_or {
    ( $($e: expr), * ) => {
        $crate::model::expression::Expr::Or(vec![$($e),*])
    };
}

/// Grounded fluent reference: `exp_fluent!("at", "robot", "a")`.
#[macro_export]
macro_rules! exp_fluent {
    ( $name: expr $(, $arg: expr)* ) => {
        $crate::model::expression::Expr::Fluent(String::from($name), vec![$($crate::model::expression::Expr::Object(String::from($arg))),*])
    };
}

impl Expr {
    pub fn fluent(name: &str, args: Vec<Expr>) -> Self {
        Expr::Fluent(name.to_owned(), args)
    }

    pub fn obj(name: &str) -> Self {
        Expr::Object(name.to_owned())
    }

    pub fn param(name: &str) -> Self {
        Expr::Parameter(name.to_owned())
    }

    pub fn var(name: &str) -> Self {
        Expr::Variable(name.to_owned())
    }

    pub fn exists(variables: Vec<TypedVariable>, body: Expr) -> Self {
        Expr::Exists(variables, Box::new(body))
    }

    pub fn forall(variables: Vec<TypedVariable>, body: Expr) -> Self {
        Expr::Forall(variables, Box::new(body))
    }

    pub fn implies(left: Expr, right: Expr) -> Self {
        Expr::Implies(Box::new(left), Box::new(right))
    }

    pub fn le(left: Expr, right: Expr) -> Self {
        Expr::Le(Box::new(left), Box::new(right))
    }

    pub fn lt(left: Expr, right: Expr) -> Self {
        Expr::Lt(Box::new(left), Box::new(right))
    }

    pub fn equals(left: Expr, right: Expr) -> Self {
        Expr::Eq(Box::new(left), Box::new(right))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::And(_) => "and",
            Expr::Or(_) => "or",
            Expr::Not(_) => "not",
            Expr::Implies(_, _) => "imply",
            Expr::Exists(_, _) => "exists",
            Expr::Forall(_, _) => "forall",
            Expr::Fluent(_, _) => "fluent",
            Expr::Object(_) => "object",
            Expr::Variable(_) => "variable",
            Expr::Parameter(_) => "parameter",
            Expr::Time => "time",
            Expr::BoolConst(_) => "bool",
            Expr::IntConst(_) => "int",
            Expr::RealConst(_) => "real",
            Expr::Plus(_) => "+",
            Expr::Minus(_) => "-",
            Expr::Times(_) => "*",
            Expr::Div(_) => "/",
            Expr::Le(_, _) => "<=",
            Expr::Lt(_, _) => "<",
            Expr::Eq(_, _) => "=",
        }
    }

    /// Whether this node can only be read as a truth value.
    pub fn is_condition(&self) -> bool {
        matches!(self,
            Expr::And(_) | Expr::Or(_) | Expr::Not(_) | Expr::Implies(_, _) |
            Expr::Exists(_, _) | Expr::Forall(_, _) | Expr::BoolConst(_) |
            Expr::Le(_, _) | Expr::Lt(_, _) | Expr::Eq(_, _))
    }

    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::And(v) | Expr::Or(v) |
            Expr::Plus(v) | Expr::Minus(v) | Expr::Times(v) | Expr::Div(v) |
            Expr::Fluent(_, v) => v.iter().collect(),
            Expr::Not(e) |
            Expr::Exists(_, e) |
            Expr::Forall(_, e) => vec![e.as_ref()],
            Expr::Implies(l, r) |
            Expr::Le(l, r) | Expr::Lt(l, r) | Expr::Eq(l, r) => vec![l.as_ref(), r.as_ref()],
            Expr::Object(_) | Expr::Variable(_) | Expr::Parameter(_) | Expr::Time |
            Expr::BoolConst(_) | Expr::IntConst(_) | Expr::RealConst(_) => vec![],
        }
    }

    /// Pre-order walk over this node and all of its descendants.
    pub fn walk<F: FnMut(&Expr)>(&self, f: &mut F) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Copies the tree, replacing every node for which `f` returns a substitute.
    /// Replaced nodes are not descended into.
    pub fn rewrite<F: Fn(&Expr) -> Option<Expr>>(&self, f: &F) -> Expr {
        if let Some(replacement) = f(self) {
            return replacement;
        }
        let all = |v: &Vec<Expr>| v.iter().map(|e| e.rewrite(f)).collect::<Vec<_>>();
        let one = |e: &Expr| Box::new(e.rewrite(f));
        match self {
            Expr::And(v) => Expr::And(all(v)),
            Expr::Or(v) => Expr::Or(all(v)),
            Expr::Not(e) => Expr::Not(one(e)),
            Expr::Implies(l, r) => Expr::Implies(one(l), one(r)),
            Expr::Exists(vars, e) => Expr::Exists(vars.clone(), one(e)),
            Expr::Forall(vars, e) => Expr::Forall(vars.clone(), one(e)),
            Expr::Fluent(name, v) => Expr::Fluent(name.clone(), all(v)),
            Expr::Plus(v) => Expr::Plus(all(v)),
            Expr::Minus(v) => Expr::Minus(all(v)),
            Expr::Times(v) => Expr::Times(all(v)),
            Expr::Div(v) => Expr::Div(all(v)),
            Expr::Le(l, r) => Expr::Le(one(l), one(r)),
            Expr::Lt(l, r) => Expr::Lt(one(l), one(r)),
            Expr::Eq(l, r) => Expr::Eq(one(l), one(r)),
            leaf => leaf.clone(),
        }
    }

    /// Replaces action parameters by the objects they are bound to.
    /// Parameters missing from `params` are left in place.
    pub fn bind_parameters(&self, params: &HashMap<String, String>) -> Expr {
        self.rewrite(&|e| match e {
            Expr::Parameter(p) => params.get(p).map(|o| Expr::Object(o.clone())),
            _ => None,
        })
    }

    /// Replaces quantified variables by objects. A nested quantifier that
    /// declares a variable of the same name hides the outer binding.
    pub fn bind_variables(&self, values: &[(&str, &str)]) -> Expr {
        fn visible<'v>(values: &[(&'v str, &'v str)], vars: &[TypedVariable]) -> Vec<(&'v str, &'v str)> {
            values.iter().filter(|(n, _)| !vars.iter().any(|v| v.name == *n)).cloned().collect()
        }
        self.rewrite(&|e| match e {
            Expr::Variable(v) => values.iter().find(|(n, _)| *n == v.as_str()).map(|(_, o)| Expr::Object((*o).to_owned())),
            Expr::Exists(vars, body) => Some(Expr::Exists(vars.clone(), Box::new(body.bind_variables(&visible(values, vars))))),
            Expr::Forall(vars, body) => Some(Expr::Forall(vars.clone(), Box::new(body.bind_variables(&visible(values, vars))))),
            _ => None,
        })
    }
}

impl fmt::Display for TypedVariable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "?{} - {}", self.name, self.kind)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fn list(f: &mut fmt::Formatter, head: &str, v: &[Expr]) -> fmt::Result {
            write!(f, "({}", head)?;
            v.iter().try_for_each(|item| write!(f, " {}", item))?;
            write!(f, ")")
        }
        fn quantifier(f: &mut fmt::Formatter, head: &str, vars: &[TypedVariable], body: &Expr) -> fmt::Result {
            write!(f, "({} (", head)?;
            let mut it = vars.iter();
            it.by_ref().take(1).try_for_each(|v| write!(f, "{}", v))?;
            it.try_for_each(|v| write!(f, " {}", v))?;
            write!(f, ") {})", body)
        }
        match self {
            Expr::And(v) => list(f, "and", v),
            Expr::Or(v) => list(f, "or", v),
            Expr::Not(e) => write!(f, "(not {})", e),
            Expr::Implies(l, r) => write!(f, "(imply {} {})", l, r),
            Expr::Exists(vars, e) => quantifier(f, "exists", vars, e),
            Expr::Forall(vars, e) => quantifier(f, "forall", vars, e),
            Expr::Fluent(name, args) => list(f, name, args),
            Expr::Object(o) => write!(f, "{}", o),
            Expr::Variable(v) |
            Expr::Parameter(v) => write!(f, "?{}", v),
            Expr::Time => write!(f, "#t"),
            Expr::BoolConst(b) => write!(f, "{}", b),
            Expr::IntConst(i) => write!(f, "{}", i),
            Expr::RealConst(r) => write!(f, "{}", r),
            Expr::Plus(v) => list(f, "+", v),
            Expr::Minus(v) => list(f, "-", v),
            Expr::Times(v) => list(f, "*", v),
            Expr::Div(v) => list(f, "/", v),
            Expr::Le(l, r) => write!(f, "(<= {} {})", l, r),
            Expr::Lt(l, r) => write!(f, "(< {} {})", l, r),
            Expr::Eq(l, r) => write!(f, "(= {} {})", l, r),
        }
    }
}
