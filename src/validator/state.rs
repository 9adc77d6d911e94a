use std::collections::HashMap;
use std::fmt;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::model::expression::Expr;
use super::eval::EvalError;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// A boolean fluent that holds.
    True,
    Number(f64),
}

/// Grounded fluent name (`name arg1 arg2`) to value. A missing key is `false`
/// for boolean fluents and `0` for numeric ones.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct State(HashMap<String, Value>);

impl State {
    pub fn new() -> State {
        State(HashMap::new())
    }

    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.get(key).copied()
    }

    /// Numeric reading of a fluent. Absent is 0 and a present boolean is 1.
    pub fn number(&self, key: &str) -> f64 {
        match self.0.get(key) {
            Some(Value::Number(n)) => *n,
            Some(Value::True) => 1.0,
            None => 0.0,
        }
    }

    pub fn insert(&mut self, key: String, value: Value) -> Option<Value> {
        self.0.insert(key, value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn apply(&mut self, effect: &GroundEffect) {
        trace!("apply {}", effect);
        let key = &effect.fluent;
        match effect.update {
            Update::Set(true) => { self.insert(key.clone(), Value::True); },
            Update::Set(false) => { self.remove(key); },
            Update::Assign(v) => { self.insert(key.clone(), Value::Number(v)); },
            Update::Increase(d) => { self.insert(key.clone(), Value::Number(self.number(key) + d)); },
            Update::Decrease(d) => { self.insert(key.clone(), Value::Number(self.number(key) - d)); },
        }
    }
}

/// State key of a fluent reference whose arguments are all objects.
pub fn fluent_key(expr: &Expr) -> Result<String, EvalError> {
    match expr {
        Expr::Fluent(name, args) => args.iter().try_fold(name.clone(), |acc, arg| match arg {
            Expr::Object(o) => Ok(acc + " " + o),
            Expr::Parameter(p) => Err(EvalError::UnboundParameter(p.clone())),
            Expr::Variable(v) => Err(EvalError::UnboundVariable(v.clone())),
            other => Err(EvalError::NotAnObject(other.to_string())),
        }),
        other => Err(EvalError::Unexpected { kind: other.kind_name(), context: "fluent reference", expr: other.to_string() }),
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Update {
    /// Propositional add (`true`) or delete (`false`).
    Set(bool),
    Assign(f64),
    Increase(f64),
    Decrease(f64),
}

/// An effect with its fluent key and value already resolved against the
/// state that preceded the batch.
#[derive(Clone, Debug, PartialEq)]
pub struct GroundEffect {
    pub fluent: String,
    pub update: Update,
}

impl GroundEffect {
    pub fn new(fluent: &str, update: Update) -> Self {
        Self { fluent: fluent.to_owned(), update }
    }

    /// Whether two effects of different simultaneous actions cannot both apply.
    /// Only increases and decreases of one numeric fluent commute.
    pub fn contradicts(&self, other: &GroundEffect) -> bool {
        if self.fluent != other.fluent {
            return false;
        }
        match (self.update, other.update) {
            (Update::Set(l), Update::Set(r)) => l != r,
            (Update::Increase(_), Update::Increase(_)) |
            (Update::Increase(_), Update::Decrease(_)) |
            (Update::Decrease(_), Update::Increase(_)) |
            (Update::Decrease(_), Update::Decrease(_)) => false,
            _ => true,
        }
    }
}

impl fmt::Display for GroundEffect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.update {
            Update::Set(true) => write!(f, "({})", self.fluent),
            Update::Set(false) => write!(f, "(not ({}))", self.fluent),
            Update::Assign(v) => write!(f, "(assign ({}) {})", self.fluent, v),
            Update::Increase(v) => write!(f, "(increase ({}) {})", self.fluent, v),
            Update::Decrease(v) => write!(f, "(decrease ({}) {})", self.fluent, v),
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut keys: Vec<&String> = self.0.keys().collect();
        keys.sort();
        write!(f, "{{")?;
        for (idx, k) in keys.into_iter().enumerate() {
            if idx > 0 {
                write!(f, " ")?;
            }
            match self.0[k] {
                Value::True => write!(f, "({})", k)?,
                Value::Number(n) => write!(f, "({})={}", k, n)?,
            }
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use crate::exp_fluent;
    use crate::model::expression::Expr;
    use super::super::eval::EvalError;
    use super::{fluent_key, GroundEffect, State, Update, Value};

    #[test]
    fn test_fluent_key() {
        assert_eq!(fluent_key(&exp_fluent!("at", "robot", "a")), Ok(String::from("at robot a")));
        assert_eq!(fluent_key(&exp_fluent!("count")), Ok(String::from("count")));
        assert_eq!(fluent_key(&Expr::fluent("at", vec![Expr::param("r")])), Err(EvalError::UnboundParameter(String::from("r"))));
        assert!(fluent_key(&Expr::IntConst(1)).is_err());
    }

    #[test]
    fn test_apply() {
        let mut state = State::new();
        state.apply(&GroundEffect::new("door_open", Update::Set(true)));
        assert_eq!(state.get("door_open"), Some(Value::True));
        state.apply(&GroundEffect::new("door_open", Update::Set(false)));
        assert!(!state.contains("door_open"));
        state.apply(&GroundEffect::new("door_open", Update::Set(false)));
        assert!(state.is_empty());
        state.apply(&GroundEffect::new("count", Update::Increase(2.0)));
        state.apply(&GroundEffect::new("count", Update::Decrease(0.5)));
        assert_eq!(state.number("count"), 1.5);
        state.apply(&GroundEffect::new("count", Update::Assign(7.0)));
        assert_eq!(state.get("count"), Some(Value::Number(7.0)));
        assert_eq!(state.number("missing"), 0.0);
        assert_eq!(state.to_string(), "{(count)=7}");
    }

    #[test]
    fn test_contradicts() {
        let add = GroundEffect::new("p", Update::Set(true));
        let del = GroundEffect::new("p", Update::Set(false));
        let inc = GroundEffect::new("p", Update::Increase(1.0));
        let dec = GroundEffect::new("p", Update::Decrease(1.0));
        let set = GroundEffect::new("p", Update::Assign(1.0));
        assert!(add.contradicts(&del));
        assert!(!add.contradicts(&add));
        assert!(add.contradicts(&inc));
        assert!(!inc.contradicts(&dec));
        assert!(set.contradicts(&inc));
        assert!(set.contradicts(&set));
        assert!(!add.contradicts(&GroundEffect::new("q", Update::Set(false))));
        for (a, b) in [(&add, &del), (&inc, &set), (&dec, &inc), (&add, &dec)] {
            assert_eq!(a.contradicts(b), b.contradicts(a));
        }
    }
}
