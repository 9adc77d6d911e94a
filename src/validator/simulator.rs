use std::collections::HashMap;
use tracing::{debug, trace};

use crate::model::effect::{merge_conditional, Effect, EffectKind};
use crate::model::expression::Expr;
use crate::model::plan::{ActionInstance, PartialOrderPlan};
use crate::model::problem::{ActionSchema, FluentKind, Problem};
use super::eval::Evaluator;
use super::order::OrderMatrix;
use super::state::{fluent_key, GroundEffect, State, Update};
use super::{Error, Execution, Options};

/// Where a validation run currently stands. `Valid` and `Invalid` are final.
#[derive(Clone, Debug, PartialEq)]
pub enum Phase {
    /// No batch has been computed yet.
    Ready,
    /// These steps execute next, simultaneously.
    BatchReady(Vec<usize>),
    /// Steps remain but none of them can start.
    Stalled(Vec<usize>),
    /// Every step has executed; the goals are checked next.
    GoalCheck,
    Valid,
    /// The run failed; further steps report the same error.
    Invalid(Error),
}

/// Replays a partial-order plan batch by batch against a private state.
pub struct Simulator<'a> {
    problem: &'a Problem,
    plan: &'a PartialOrderPlan,
    options: &'a Options,
    order: OrderMatrix,
    state: State,
    executed: Vec<bool>,
    batches: Vec<Vec<usize>>,
    phase: Phase,
}

impl<'a> Simulator<'a> {
    pub fn new(problem: &'a Problem, plan: &'a PartialOrderPlan, options: &'a Options) -> Result<Self, Error> {
        let order = OrderMatrix::from_plan(plan)?;
        let state = initial_state(problem)?;
        debug!("simulating {} steps of {} from {}", plan.len(), problem.name, state);
        Ok(Self {
            problem,
            plan,
            options,
            order,
            state,
            executed: vec![false; plan.len()],
            batches: Vec::new(),
            phase: Phase::Ready,
        })
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn batches(&self) -> &[Vec<usize>] {
        &self.batches
    }

    /// Performs one transition. Any error leaves the run in `Phase::Invalid`.
    pub fn step(&mut self) -> Result<&Phase, Error> {
        let phase = std::mem::replace(&mut self.phase, Phase::Ready);
        match self.transition(phase) {
            Ok(next) => {
                self.phase = next;
                Ok(&self.phase)
            },
            Err(error) => {
                self.phase = Phase::Invalid(error.clone());
                Err(error)
            },
        }
    }

    fn transition(&mut self, phase: Phase) -> Result<Phase, Error> {
        match phase {
            Phase::Ready => Ok(self.next_batch()),
            Phase::BatchReady(batch) => {
                self.execute(&batch)?;
                batch.iter().for_each(|&i| self.executed[i] = true);
                self.batches.push(batch);
                Ok(self.next_batch())
            },
            Phase::Stalled(remaining) => {
                debug!("stalled with steps {:?} unexecuted", remaining);
                Err(Error::Stalled { remaining })
            },
            Phase::GoalCheck => {
                self.check_goals()?;
                Ok(Phase::Valid)
            },
            Phase::Valid => Ok(Phase::Valid),
            Phase::Invalid(error) => Err(error),
        }
    }

    /// Steps until the plan is found valid or invalid.
    pub fn run(mut self) -> Result<Execution, Error> {
        while self.phase != Phase::Valid {
            self.step()?;
        }
        Ok(Execution { batches: self.batches, state: self.state })
    }

    fn next_batch(&self) -> Phase {
        let remaining: Vec<usize> = (0..self.plan.len()).filter(|&i| !self.executed[i]).collect();
        if remaining.is_empty() {
            return Phase::GoalCheck;
        }
        if let Some(max) = self.options.max_batches {
            if self.batches.len() >= max {
                debug!("batch limit {} reached", max);
                return Phase::Stalled(remaining);
            }
        }
        let batch = self.order.ready(&self.executed);
        if batch.is_empty() {
            Phase::Stalled(remaining)
        } else {
            Phase::BatchReady(batch)
        }
    }

    /// Checks and applies one batch. Everything is evaluated against the state
    /// as it was before the batch; effects are applied only once every step
    /// has passed.
    fn execute(&mut self, batch: &[usize]) -> Result<(), Error> {
        debug!("batch {}: {:?}", self.batches.len(), batch);
        let plan: &'a PartialOrderPlan = self.plan;
        let mut deltas: Vec<(&ActionInstance, Vec<GroundEffect>)> = Vec::with_capacity(batch.len());
        {
            let evaluator = Evaluator::new(self.problem, &self.state).subtype_domains(self.options.subtype_domains);
            for &idx in batch {
                let instance = &plan.actions()[idx];
                let (schema, bindings) = self.bind(instance)?;
                for precondition in &schema.preconditions {
                    let grounded = precondition.bind_parameters(&bindings);
                    trace!("{}: precondition {}", instance, grounded);
                    if !evaluator.holds(&grounded)? {
                        debug!("{}: precondition {} does not hold", instance, grounded);
                        return Err(Error::UnsatisfiedPrecondition { action: instance.to_string(), condition: grounded.to_string() });
                    }
                }
                deltas.push((instance, ground_effects(self.problem, &evaluator, &schema.effects, &bindings)?));
            }
        }
        for (i, (first, left)) in deltas.iter().enumerate() {
            for (second, right) in deltas.iter().skip(i + 1) {
                if let Some(clash) = left.iter().find(|l| right.iter().any(|r| l.contradicts(r))) {
                    debug!("{} and {} contradict on ({})", first, second, clash.fluent);
                    return Err(Error::Contradiction { first: first.to_string(), second: second.to_string(), fluent: clash.fluent.clone() });
                }
            }
        }
        for effect in deltas.iter().flat_map(|(_, effects)| effects.iter()) {
            self.state.apply(effect);
        }
        Ok(())
    }

    /// Resolves the schema of a plan step and maps its parameter names to the
    /// step's objects.
    fn bind(&self, instance: &ActionInstance) -> Result<(&'a ActionSchema, HashMap<String, String>), Error> {
        let problem: &'a Problem = self.problem;
        let schema = problem.action(&instance.name).ok_or_else(|| Error::UnknownAction(instance.name.clone()))?;
        if schema.parameters.len() != instance.parameters.len() {
            return Err(Error::ParameterMismatch {
                action: instance.to_string(),
                expected: schema.parameters.len(),
                found: instance.parameters.len(),
            });
        }
        if self.options.check_objects {
            for (param, object) in schema.parameters.iter().zip(instance.parameters.iter()) {
                let declared = problem.object(object).ok_or_else(|| Error::UnknownObject { action: instance.to_string(), object: object.clone() })?;
                let fits = declared.kind == param.kind || (self.options.subtype_domains && problem.is_subtype(&declared.kind, &param.kind));
                if !fits {
                    return Err(Error::ParameterType { action: instance.to_string(), object: object.clone(), expected: param.kind.clone() });
                }
            }
        }
        let bindings = schema.parameters.iter().map(|p| p.name.clone()).zip(instance.parameters.iter().cloned()).collect();
        Ok((schema, bindings))
    }

    fn check_goals(&self) -> Result<(), Error> {
        let evaluator = Evaluator::new(self.problem, &self.state).subtype_domains(self.options.subtype_domains);
        for goal in &self.problem.goals {
            if !evaluator.holds(goal)? {
                debug!("goal {} does not hold in {}", goal, self.state);
                return Err(Error::GoalNotSatisfied { goal: goal.to_string() });
            }
        }
        debug!("all goals hold after {} batches", self.batches.len());
        Ok(())
    }
}

/// Resolves an action's effects against the pre-batch state. Guards are
/// evaluated once per merged group and values are computed before anything
/// is applied.
fn ground_effects(problem: &Problem, evaluator: &Evaluator, effects: &[Effect], bindings: &HashMap<String, String>) -> Result<Vec<GroundEffect>, Error> {
    let mut grounded = Vec::new();
    for group in merge_conditional(effects) {
        if let Some(condition) = group.condition {
            let condition = condition.bind_parameters(bindings);
            let fires = evaluator.holds(&condition)?;
            trace!("guard {}: {}", condition, fires);
            if !fires {
                continue;
            }
        }
        for effect in group.effects {
            let target = effect.fluent.bind_parameters(bindings);
            let value = effect.value.bind_parameters(bindings);
            let update = match effect.kind {
                EffectKind::Assign => assignment(problem, evaluator, &target, &value)?,
                EffectKind::Increase => Update::Increase(evaluator.eval_number(&value)?),
                EffectKind::Decrease => Update::Decrease(evaluator.eval_number(&value)?),
            };
            grounded.push(GroundEffect { fluent: fluent_key(&target)?, update });
        }
    }
    Ok(grounded)
}

/// Update for `target := value`. Boolean fluents and condition-shaped values
/// store the truth of `value`, so a false value deletes the fluent.
fn assignment(problem: &Problem, evaluator: &Evaluator, target: &Expr, value: &Expr) -> Result<Update, Error> {
    let boolean = value.is_condition() || match target {
        Expr::Fluent(name, _) => problem.fluent(name).map_or(false, |decl| decl.kind == FluentKind::Bool),
        _ => false,
    };
    if boolean {
        Ok(Update::Set(evaluator.holds(value)?))
    } else {
        Ok(Update::Assign(evaluator.eval_number(value)?))
    }
}

/// Explicit initial values, then timed initial effects in time order.
fn initial_state(problem: &Problem) -> Result<State, Error> {
    let mut state = State::new();
    let initial = problem.initial_values.iter().map(|iv| (&iv.fluent, &iv.value));
    let mut timed: Vec<_> = problem.timed_effects.iter().collect();
    timed.sort_by(|a, b| a.time.total_cmp(&b.time));
    for (fluent, value) in initial.chain(timed.into_iter().map(|te| (&te.fluent, &te.value))) {
        let key = fluent_key(fluent)?;
        let update = assignment(problem, &Evaluator::new(problem, &state), fluent, value)?;
        state.apply(&GroundEffect { fluent: key, update });
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use crate::exp_fluent;
    use crate::model::effect::Effect;
    use crate::model::expression::{Expr, TypedVariable};
    use crate::model::plan::{ActionInstance, PartialOrderPlan};
    use crate::model::problem::{ActionSchema, FluentKind, Problem};
    use super::super::state::Value;
    use super::super::{Error, Options};
    use super::{Phase, Simulator};

    fn switches() -> Problem {
        let mut p = Problem::new("switches");
        p.add_type("switch", &[])
            .add_object("s1", "switch")
            .add_object("s2", "switch")
            .add_fluent("on", &["switch"], FluentKind::Bool)
            .add_fluent("flips", &[], FluentKind::Numeric)
            .set_initial(exp_fluent!("flips"), Expr::IntConst(0))
            .add_action(ActionSchema::new("turn_on", vec![TypedVariable::new("s", "switch")])
                .precondition(crate::exp_not!(Expr::fluent("on", vec![Expr::param("s")])))
                .effect(Effect::set(Expr::fluent("on", vec![Expr::param("s")]), true))
                .effect(Effect::increase(exp_fluent!("flips"), Expr::IntConst(1))))
            .add_action(ActionSchema::new("turn_off", vec![TypedVariable::new("s", "switch")])
                .precondition(Expr::fluent("on", vec![Expr::param("s")]))
                .effect(Effect::set(Expr::fluent("on", vec![Expr::param("s")]), false))
                .effect(Effect::increase(exp_fluent!("flips"), Expr::IntConst(1))));
        p
    }

    #[test]
    fn test_phases() {
        let mut p = switches();
        p.add_goal(exp_fluent!("on", "s2"));
        let plan: PartialOrderPlan = "|0:turn_on s1|1:turn_on s2|2:turn_off s1|0->2|".parse().expect("Plan failed to parse");
        let options = Options::default();
        let mut sim = Simulator::new(&p, &plan, &options).expect("Simulator failed to start");
        assert_eq!(sim.phase(), &Phase::Ready);
        assert_eq!(sim.step(), Ok(&Phase::BatchReady(vec![0, 1])));
        assert_eq!(sim.step(), Ok(&Phase::BatchReady(vec![2])));
        assert_eq!(sim.state().get("on s1"), Some(Value::True));
        assert_eq!(sim.state().number("flips"), 2.0);
        assert_eq!(sim.step(), Ok(&Phase::GoalCheck));
        assert_eq!(sim.step(), Ok(&Phase::Valid));
        assert_eq!(sim.state().get("on s1"), None);
        assert_eq!(sim.batches(), &[vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_precondition_sees_pre_batch_state() {
        // Unordered, so turn_off s1 must not see turn_on s1's effect.
        let p = switches();
        let plan: PartialOrderPlan = "|0:turn_on s1|1:turn_off s1|".parse().expect("Plan failed to parse");
        let options = Options::default();
        let result = Simulator::new(&p, &plan, &options).and_then(|s| s.run());
        assert!(matches!(result, Err(Error::UnsatisfiedPrecondition { .. })));
    }

    #[test]
    fn test_binding_errors() {
        let p = switches();
        let options = Options::default();
        let run = |text: &str| {
            let plan: PartialOrderPlan = text.parse().expect("Plan failed to parse");
            Simulator::new(&p, &plan, &options).and_then(|s| s.run())
        };
        assert_eq!(run("|0:smash s1|").err(), Some(Error::UnknownAction(String::from("smash"))));
        assert!(matches!(run("|0:turn_on|"), Err(Error::ParameterMismatch { expected: 1, found: 0, .. })));
        assert!(matches!(run("|0:turn_on s9|"), Err(Error::UnknownObject { .. })));
        let lax = Options { check_objects: false, ..Options::default() };
        let plan: PartialOrderPlan = "|0:turn_on s9|".parse().expect("Plan failed to parse");
        assert!(Simulator::new(&p, &plan, &lax).and_then(|s| s.run()).is_ok());
    }

    #[test]
    fn test_parameter_type() {
        let mut p = switches();
        p.add_type("dimmer", &["switch"]).add_type("lamp", &[]).add_object("d1", "dimmer").add_object("l1", "lamp");
        let options = Options::default();
        let plan = |step: &str| {
            let mut plan = PartialOrderPlan::new();
            plan.add_action(ActionInstance::new("turn_on", &[step]));
            plan
        };
        let dimmer = plan("d1");
        assert!(Simulator::new(&p, &dimmer, &options).and_then(|s| s.run()).is_ok());
        let lamp = plan("l1");
        assert!(matches!(Simulator::new(&p, &lamp, &options).and_then(|s| s.run()), Err(Error::ParameterType { .. })));
        let exact = Options { subtype_domains: false, ..Options::default() };
        assert!(matches!(Simulator::new(&p, &dimmer, &exact).and_then(|s| s.run()), Err(Error::ParameterType { .. })));
    }

    #[test]
    fn test_max_batches() {
        let p = switches();
        let plan: PartialOrderPlan = "|0:turn_on s1|1:turn_off s1|0->1|".parse().expect("Plan failed to parse");
        let options = Options { max_batches: Some(1), ..Options::default() };
        let result = Simulator::new(&p, &plan, &options).and_then(|s| s.run());
        assert_eq!(result.err(), Some(Error::Stalled { remaining: vec![1] }));
    }

    #[test]
    fn test_initial_state() {
        let mut p = switches();
        p.set_initial(exp_fluent!("on", "s1"), Expr::BoolConst(true))
            .set_initial(exp_fluent!("on", "s2"), Expr::BoolConst(false))
            .add_timed_effect(5.0, exp_fluent!("flips"), Expr::IntConst(9))
            .add_timed_effect(2.0, exp_fluent!("flips"), Expr::IntConst(4))
            .add_timed_effect(3.0, exp_fluent!("on", "s1"), Expr::BoolConst(false));
        let plan = PartialOrderPlan::new();
        let options = Options::default();
        let sim = Simulator::new(&p, &plan, &options).expect("Simulator failed to start");
        assert_eq!(sim.state().get("on s1"), None);
        assert_eq!(sim.state().get("on s2"), None);
        assert_eq!(sim.state().get("flips"), Some(Value::Number(9.0)));
    }

    #[test]
    fn test_failures_are_final() {
        let options = Options::default();
        let p = switches();
        let cycle: PartialOrderPlan = "|0:turn_on s1|1:turn_on s2|0->1|1->0|".parse().expect("Plan failed to parse");
        let mut sim = Simulator::new(&p, &cycle, &options).expect("Simulator failed to start");
        assert_eq!(sim.step(), Ok(&Phase::Stalled(vec![0, 1])));
        let stalled = Error::Stalled { remaining: vec![0, 1] };
        assert_eq!(sim.step(), Err(stalled.clone()));
        assert_eq!(sim.phase(), &Phase::Invalid(stalled.clone()));
        assert_eq!(sim.step(), Err(stalled));
        assert!(sim.batches().is_empty());

        let unmet: PartialOrderPlan = "|0:turn_off s1|".parse().expect("Plan failed to parse");
        let mut sim = Simulator::new(&p, &unmet, &options).expect("Simulator failed to start");
        assert_eq!(sim.step(), Ok(&Phase::BatchReady(vec![0])));
        assert!(matches!(sim.step(), Err(Error::UnsatisfiedPrecondition { .. })));
        assert!(matches!(sim.phase(), Phase::Invalid(Error::UnsatisfiedPrecondition { .. })));
        assert!(matches!(sim.step(), Err(Error::UnsatisfiedPrecondition { .. })));
        assert!(sim.batches().is_empty());
        assert_eq!(sim.state().number("flips"), 0.0);

        let mut unreached = switches();
        unreached.add_goal(exp_fluent!("on", "s2"));
        let wrong: PartialOrderPlan = "|0:turn_on s1|".parse().expect("Plan failed to parse");
        let mut sim = Simulator::new(&unreached, &wrong, &options).expect("Simulator failed to start");
        assert_eq!(sim.step(), Ok(&Phase::BatchReady(vec![0])));
        assert_eq!(sim.step(), Ok(&Phase::GoalCheck));
        let missed = Error::GoalNotSatisfied { goal: String::from("(on s2)") };
        assert_eq!(sim.step(), Err(missed.clone()));
        assert_eq!(sim.phase(), &Phase::Invalid(missed.clone()));
        assert_eq!(sim.step(), Err(missed));
    }

    #[test]
    fn test_boolean_assignment() {
        let mut p = Problem::new("copy");
        p.add_fluent("p", &[], FluentKind::Bool)
            .add_fluent("q", &[], FluentKind::Bool)
            .add_fluent("r", &[], FluentKind::Bool)
            .set_initial(exp_fluent!("r"), exp_fluent!("q"))
            .add_action(ActionSchema::new("copy", vec![])
                .effect(Effect::assign(exp_fluent!("p"), exp_fluent!("q"))))
            .add_action(ActionSchema::new("test", vec![])
                .effect(Effect::assign(exp_fluent!("p"), crate::exp_not!(exp_fluent!("q")))))
            .add_goal(crate::exp_not!(exp_fluent!("p")));
        let options = Options::default();
        let copy: PartialOrderPlan = "|0:copy|".parse().expect("Plan failed to parse");
        let execution = Simulator::new(&p, &copy, &options).and_then(|s| s.run()).expect("Copying a false fluent keeps it absent");
        assert!(!execution.state.contains("p"));
        assert!(!execution.state.contains("r"));
        let test: PartialOrderPlan = "|0:test|".parse().expect("Plan failed to parse");
        let result = Simulator::new(&p, &test, &options).and_then(|s| s.run());
        assert!(matches!(result, Err(Error::GoalNotSatisfied { .. })));

        p.set_initial(exp_fluent!("q"), Expr::BoolConst(true));
        p.goals.clear();
        let execution = Simulator::new(&p, &copy, &options).and_then(|s| s.run()).expect("Plan should be valid");
        assert_eq!(execution.state.get("p"), Some(Value::True));
    }
}
