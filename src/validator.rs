//! Validation of partial-order plans by batch simulation.
//!
//! Steps with no ordering between them run as one batch: all of them are
//! checked against the same state and their effects must not contradict.

pub mod eval;
pub mod grounder;
pub mod order;
pub mod simulator;
pub mod state;

use enumset::{enum_set, EnumSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::plan::PartialOrderPlan;
use crate::model::problem::{Feature, Problem};
use self::eval::EvalError;
use self::simulator::Simulator;
use self::state::State;

/// Problem features the simulator handles.
pub const SUPPORTED: EnumSet<Feature> = enum_set!(
    Feature::NegativeConditions | Feature::DisjunctiveConditions |
    Feature::ExistentialConditions | Feature::UniversalConditions |
    Feature::Equality | Feature::NumericFluents |
    Feature::ConditionalEffects | Feature::IncreaseDecreaseEffects |
    Feature::TimedInitialEffects
);

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error("steps {remaining:?} can never start")]
    Stalled { remaining: Vec<usize> },
    #[error("{first} and {second} make contradictory changes to ({fluent})")]
    Contradiction { first: String, second: String, fluent: String },
    #[error("precondition {condition} of {action} does not hold")]
    UnsatisfiedPrecondition { action: String, condition: String },
    #[error("goal {goal} does not hold in the final state")]
    GoalNotSatisfied { goal: String },
    #[error("unknown action '{0}'")]
    UnknownAction(String),
    #[error("{action} has {found} parameters, expected {expected}")]
    ParameterMismatch { action: String, expected: usize, found: usize },
    #[error("{action} refers to undeclared object '{object}'")]
    UnknownObject { action: String, object: String },
    #[error("{action}: '{object}' is not of type {expected}")]
    ParameterType { action: String, object: String, expected: String },
    #[error("ordering {before}->{after} refers to a step outside a plan of {steps}")]
    InvalidOrdering { before: usize, after: usize, steps: usize },
    #[error("unsupported problem features {0:?}")]
    Unsupported(EnumSet<Feature>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Quantifier domains and parameter type checks also accept objects of
    /// descendant types.
    pub subtype_domains: bool,
    /// Plan step parameters must name declared objects of the right type.
    pub check_objects: bool,
    /// Give up as stalled after this many batches.
    pub max_batches: Option<usize>,
}

impl Default for Options {
    fn default() -> Self {
        Self { subtype_domains: true, check_objects: true, max_batches: None }
    }
}

impl Options {
    pub fn from_json(json: &str) -> Result<Options, crate::model::Error> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Outcome of a successful run.
#[derive(Clone, Debug, PartialEq)]
pub struct Execution {
    /// Step indices of each batch, in execution order.
    pub batches: Vec<Vec<usize>>,
    pub state: State,
}

/// Whether `plan` solves `problem`.
pub fn validate(problem: &Problem, plan: &PartialOrderPlan) -> bool {
    match check(problem, plan) {
        Ok(_) => true,
        Err(e) => {
            debug!("plan rejected: {}", e);
            false
        },
    }
}

pub fn check(problem: &Problem, plan: &PartialOrderPlan) -> Result<Execution, Error> {
    check_with(problem, plan, &Options::default())
}

pub fn check_with(problem: &Problem, plan: &PartialOrderPlan, options: &Options) -> Result<Execution, Error> {
    let unsupported = problem.kind() - SUPPORTED;
    if !unsupported.is_empty() {
        return Err(Error::Unsupported(unsupported));
    }
    Simulator::new(problem, plan, options)?.run()
}
