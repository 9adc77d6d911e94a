use std::fmt;
use serde::{Deserialize, Serialize};
use super::expression::Expr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    Assign,
    Increase,
    Decrease,
}

/// `fluent <op> value`, optionally guarded by `condition`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub kind: EffectKind,
    pub fluent: Expr,
    pub value: Expr,
    #[serde(default)]
    pub condition: Option<Expr>,
}

impl Effect {
    pub fn new(kind: EffectKind, fluent: Expr, value: Expr) -> Self {
        Self { kind, fluent, value, condition: None }
    }

    pub fn assign(fluent: Expr, value: Expr) -> Self {
        Self::new(EffectKind::Assign, fluent, value)
    }

    pub fn increase(fluent: Expr, value: Expr) -> Self {
        Self::new(EffectKind::Increase, fluent, value)
    }

    pub fn decrease(fluent: Expr, value: Expr) -> Self {
        Self::new(EffectKind::Decrease, fluent, value)
    }

    /// Shorthand for a propositional add (`true`) or delete (`false`).
    pub fn set(fluent: Expr, value: bool) -> Self {
        Self::assign(fluent, Expr::BoolConst(value))
    }

    pub fn when(mut self, condition: Expr) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }
}

/// Effects that share one guard. `condition` is `None` for an unconditional effect.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectGroup {
    pub condition: Option<Expr>,
    pub effects: Vec<Effect>,
}

/// Folds conditional effects with identical guards into one group, placed where
/// the guard first appears. Every unconditional effect keeps its own group.
///
/// Listing order is kept except across a merge: a later effect joins its
/// guard's group and so moves ahead of unconditional effects listed before
/// it. `[when g x:=1, x:=2, when g x:=3]` applies as `1, 3, 2`.
pub fn merge_conditional(effects: &[Effect]) -> Vec<EffectGroup> {
    let mut groups: Vec<EffectGroup> = Vec::new();
    for effect in effects {
        let plain = Effect { condition: None, ..effect.clone() };
        match effect.condition {
            Some(ref condition) => {
                if let Some(group) = groups.iter_mut().find(|g| g.condition.as_ref() == Some(condition)) {
                    group.effects.push(plain);
                } else {
                    groups.push(EffectGroup { condition: Some(condition.clone()), effects: vec![plain] });
                }
            },
            None => groups.push(EffectGroup { condition: None, effects: vec![plain] }),
        }
    }
    groups
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(ref condition) = self.condition {
            write!(f, "(when {} ", condition)?;
        }
        match (self.kind, &self.value) {
            (EffectKind::Assign, Expr::BoolConst(true)) => write!(f, "{}", self.fluent)?,
            (EffectKind::Assign, Expr::BoolConst(false)) => write!(f, "(not {})", self.fluent)?,
            (EffectKind::Assign, v) => write!(f, "(assign {} {})", self.fluent, v)?,
            (EffectKind::Increase, v) => write!(f, "(increase {} {})", self.fluent, v)?,
            (EffectKind::Decrease, v) => write!(f, "(decrease {} {})", self.fluent, v)?,
        }
        if self.condition.is_some() {
            write!(f, ")")?;
        }
        Ok(())
    }
}
