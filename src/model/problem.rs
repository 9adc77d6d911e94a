use std::collections::HashSet;
use std::fs;
use enumset::{EnumSet, EnumSetType};
use serde::{Deserialize, Serialize};

use super::Error;
use super::effect::{Effect, EffectKind};
use super::expression::{Expr, TypedVariable};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserType {
    pub name: String,
    /// Every supertype of this type, nearest first.
    #[serde(default)]
    pub ancestors: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    pub name: String,
    pub kind: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FluentKind {
    Bool,
    Numeric,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FluentDecl {
    pub name: String,
    /// Type names of the arguments.
    #[serde(default)]
    pub signature: Vec<String>,
    pub kind: FluentKind,
}

/// Instantaneous action schema. Conditions and effects refer to the
/// parameters through `Expr::Parameter`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionSchema {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<TypedVariable>,
    #[serde(default)]
    pub preconditions: Vec<Expr>,
    #[serde(default)]
    pub effects: Vec<Effect>,
}

impl ActionSchema {
    pub fn new(name: &str, parameters: Vec<TypedVariable>) -> Self {
        Self { name: name.to_owned(), parameters, preconditions: Vec::new(), effects: Vec::new() }
    }

    pub fn precondition(mut self, condition: Expr) -> Self {
        self.preconditions.push(condition);
        self
    }

    pub fn effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InitialValue {
    pub fluent: Expr,
    pub value: Expr,
}

/// Timed initial literal or numeric value, `time` units after the start.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimedEffect {
    pub time: f64,
    pub fluent: Expr,
    pub value: Expr,
}

/// Problem features the validator may or may not be able to simulate.
#[derive(EnumSetType, Debug)]
pub enum Feature {
    /// `not` in conditions
    NegativeConditions,
    /// `or` and `imply` in conditions
    DisjunctiveConditions,
    ExistentialConditions,
    UniversalConditions,
    /// `=` between terms
    Equality,
    /// Numeric fluents, comparisons or arithmetic
    NumericFluents,
    ConditionalEffects,
    IncreaseDecreaseEffects,
    TimedInitialEffects,
    /// References to the current time point
    TimingExpressions,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Problem {
    pub name: String,
    pub types: Vec<UserType>,
    pub objects: Vec<Object>,
    pub fluents: Vec<FluentDecl>,
    pub actions: Vec<ActionSchema>,
    pub initial_values: Vec<InitialValue>,
    pub timed_effects: Vec<TimedEffect>,
    pub goals: Vec<Expr>,
}

impl Problem {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_owned(), ..Default::default() }
    }

    pub fn from_json(json: &str) -> Result<Problem, Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(filepath: &str) -> Result<Problem, Error> {
        let code = fs::read_to_string(filepath).map_err(|e| Error::Io(filepath.to_owned(), e))?;
        Self::from_json(&code)
    }

    pub fn add_type(&mut self, name: &str, ancestors: &[&str]) -> &mut Self {
        self.types.push(UserType { name: name.to_owned(), ancestors: ancestors.iter().map(|a| (*a).to_owned()).collect() });
        self
    }

    pub fn add_object(&mut self, name: &str, kind: &str) -> &mut Self {
        self.objects.push(Object { name: name.to_owned(), kind: kind.to_owned() });
        self
    }

    pub fn add_fluent(&mut self, name: &str, signature: &[&str], kind: FluentKind) -> &mut Self {
        self.fluents.push(FluentDecl { name: name.to_owned(), signature: signature.iter().map(|s| (*s).to_owned()).collect(), kind });
        self
    }

    pub fn add_action(&mut self, action: ActionSchema) -> &mut Self {
        self.actions.push(action);
        self
    }

    pub fn set_initial(&mut self, fluent: Expr, value: Expr) -> &mut Self {
        self.initial_values.push(InitialValue { fluent, value });
        self
    }

    pub fn add_timed_effect(&mut self, time: f64, fluent: Expr, value: Expr) -> &mut Self {
        self.timed_effects.push(TimedEffect { time, fluent, value });
        self
    }

    pub fn add_goal(&mut self, goal: Expr) -> &mut Self {
        self.goals.push(goal);
        self
    }

    pub fn action(&self, name: &str) -> Option<&ActionSchema> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn fluent(&self, name: &str) -> Option<&FluentDecl> {
        self.fluents.iter().find(|f| f.name == name)
    }

    pub fn object(&self, name: &str) -> Option<&Object> {
        self.objects.iter().find(|o| o.name == name)
    }

    /// True when `kind` is `ancestor` or descends from it. Ancestor lists are
    /// followed transitively, so listing only the direct parent is enough.
    pub fn is_subtype(&self, kind: &str, ancestor: &str) -> bool {
        let mut visited = HashSet::new();
        let mut pending = vec![kind];
        while let Some(current) = pending.pop() {
            if current == ancestor {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(t) = self.types.iter().find(|t| t.name == current) {
                pending.extend(t.ancestors.iter().map(|a| a.as_str()));
            }
        }
        false
    }

    /// Names of the objects of type `kind` in declaration order.
    pub fn objects_of_type(&self, kind: &str, include_subtypes: bool) -> Vec<&str> {
        self.objects.iter()
            .filter(|o| o.kind == kind || (include_subtypes && self.is_subtype(&o.kind, kind)))
            .map(|o| o.name.as_str())
            .collect()
    }

    /// Features this problem makes use of.
    pub fn kind(&self) -> EnumSet<Feature> {
        let mut features: EnumSet<Feature> = EnumSet::empty();
        let mut scan = |e: &Expr| e.walk(&mut |n: &Expr| match n {
            Expr::Not(_) => features |= Feature::NegativeConditions,
            Expr::Or(_) | Expr::Implies(_, _) => features |= Feature::DisjunctiveConditions,
            Expr::Exists(_, _) => features |= Feature::ExistentialConditions,
            Expr::Forall(_, _) => features |= Feature::UniversalConditions,
            Expr::Eq(_, _) => features |= Feature::Equality,
            Expr::Le(_, _) | Expr::Lt(_, _) |
            Expr::Plus(_) | Expr::Minus(_) | Expr::Times(_) | Expr::Div(_) => features |= Feature::NumericFluents,
            Expr::Time => features |= Feature::TimingExpressions,
            _ => (),
        });
        for action in &self.actions {
            action.preconditions.iter().for_each(&mut scan);
            for effect in &action.effects {
                if let Some(ref condition) = effect.condition {
                    scan(condition);
                }
                scan(&effect.fluent);
                scan(&effect.value);
            }
        }
        self.goals.iter().for_each(&mut scan);
        for iv in &self.initial_values {
            scan(&iv.value);
        }
        if self.actions.iter().flat_map(|a| a.effects.iter()).any(|e| e.is_conditional()) {
            features |= Feature::ConditionalEffects;
        }
        if self.actions.iter().flat_map(|a| a.effects.iter()).any(|e| e.kind != EffectKind::Assign) {
            features |= Feature::IncreaseDecreaseEffects | Feature::NumericFluents;
        }
        if self.fluents.iter().any(|f| f.kind == FluentKind::Numeric) {
            features |= Feature::NumericFluents;
        }
        if !self.timed_effects.is_empty() {
            features |= Feature::TimedInitialEffects;
        }
        features
    }
}

#[cfg(test)]
mod tests {
    use enumset::{EnumSet, enum_set};
    use crate::{exp_and, exp_fluent, exp_not};
    use super::super::{effect::Effect, expression::{Expr, TypedVariable}};
    use super::{ActionSchema, Feature, FluentKind, Problem};

    fn blocks() -> Problem {
        let mut p = Problem::new("blocks");
        p.add_type("block", &[])
            .add_type("heavy", &["block"])
            .add_type("anvil", &["heavy"])
            .add_type("robot", &[])
            .add_object("b1", "block")
            .add_object("r1", "robot")
            .add_object("h1", "heavy")
            .add_object("a1", "anvil");
        p
    }

    #[test]
    fn test_subtypes() {
        let p = blocks();
        assert!(p.is_subtype("anvil", "block"));
        assert!(p.is_subtype("block", "block"));
        assert!(!p.is_subtype("block", "heavy"));
        assert!(!p.is_subtype("robot", "block"));
        assert_eq!(p.objects_of_type("block", true), vec!["b1", "h1", "a1"]);
        assert_eq!(p.objects_of_type("block", false), vec!["b1"]);
        assert_eq!(p.objects_of_type("crate", true), Vec::<&str>::new());
    }

    #[test]
    fn test_lookup() {
        let mut p = blocks();
        p.add_action(ActionSchema::new("pick", vec![TypedVariable::new("b", "block")]));
        assert!(p.action("pick").is_some());
        assert!(p.action("drop").is_none());
        assert_eq!(p.object("r1").map(|o| o.kind.as_str()), Some("robot"));
        p.add_fluent("holding", &["robot", "block"], FluentKind::Bool);
        assert_eq!(p.fluent("holding").map(|f| f.kind), Some(FluentKind::Bool));
        assert!(p.fluent("carrying").is_none());
    }

    #[test]
    fn test_kind() {
        let mut p = blocks();
        assert_eq!(p.kind(), EnumSet::<Feature>::empty());
        p.add_fluent("count", &[], FluentKind::Numeric);
        p.add_action(ActionSchema::new("tick", vec![])
            .precondition(exp_and!(exp_not!(exp_fluent!("stopped")), Expr::exists(vec![TypedVariable::new("x", "block")], Expr::fluent("clear", vec![Expr::var("x")]))))
            .effect(Effect::increase(exp_fluent!("count"), Expr::IntConst(1)).when(exp_fluent!("armed"))));
        assert_eq!(p.kind(), enum_set!(Feature::NumericFluents | Feature::NegativeConditions | Feature::ExistentialConditions |
            Feature::ConditionalEffects | Feature::IncreaseDecreaseEffects));
        p.add_goal(Expr::le(Expr::Time, Expr::IntConst(10)));
        assert!(p.kind().contains(Feature::TimingExpressions));
    }

    #[test]
    fn test_from_file() {
        use std::io::Write;
        use tempfile::Builder;
        let mut p = blocks();
        p.add_fluent("on_table", &["block"], FluentKind::Bool)
            .set_initial(exp_fluent!("on_table", "b1"), Expr::BoolConst(true))
            .add_goal(exp_fluent!("on_table", "b1"));
        let mut file = Builder::new().suffix(".json").tempfile().expect("Unable to create temporary file");
        write!(file.as_file_mut(), "{}", serde_json::to_string(&p).expect("Unable to serialize problem")).expect("Unable to write to tempfile");
        let loaded = Problem::from_file(file.path().to_str().expect("Non utf-8 temp path"));
        assert_eq!(loaded.expect("Problem failed to load"), p);
        assert!(Problem::from_file("does/not/exist.json").is_err());
    }
}
