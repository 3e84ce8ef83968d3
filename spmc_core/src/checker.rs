//! Model checking of properties on explicit models.
//!
//! Probabilities of unbounded path formulas are computed by a graph-based precomputation,
//! identifying the states with probability exactly 0 or 1,
//! followed by value iteration on the remaining states.
//! Bounded formulas are computed by a fixed number of iterations.
//!
//! Optimal schedulers can be extracted together with the results of top-level operators.

mod graph;
mod solver;

use crate::{
    Bound, CheckResult, Direction, Model, PathFormula, ProbabilityOperator, Property,
    RewardMeasure, RewardModel, RewardOperator, Scheduler, StateFormula, Values,
};
use graph::Predecessors;
use log::{debug, info, trace, warn};
use solver::Iteration;
use std::{cell::OnceCell, time::Instant};
use thiserror::Error;

/// Options of the numerical computations.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOptions {
    /// Convergence threshold of value iteration.
    pub precision: f64,
    /// Whether the precision is relative to the values (rather than absolute).
    pub relative: bool,
    /// Maximum number of iterations before giving up on convergence.
    pub max_iterations: usize,
    /// Whether to extract an optimal scheduler.
    pub extract_scheduler: bool,
    /// Whether to iterate on a single thread.
    pub single_thread: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            precision: 1e-6,
            relative: true,
            max_iterations: 1_000_000,
            extract_scheduler: false,
            single_thread: false,
        }
    }
}

/// Errors raised while checking a property.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CheckError {
    /// A label in the property is not declared by the model.
    #[error("label '{0}' is not declared in the model")]
    UnknownLabel(String),
    /// A reward model in the property does not exist.
    #[error("the model has no reward model named '{0}'")]
    UnknownRewardModel(String),
    /// A reward operator is used on a model without rewards.
    #[error("the model has no reward model")]
    NoRewardModel,
    /// A reward operator does not name its reward model but the model has many.
    #[error("the model has multiple reward models and the property does not name one")]
    AmbiguousRewardModel,
    /// A query on a nondeterministic model needs an optimization direction.
    #[error("an optimization direction (min or max) is needed on nondeterministic models")]
    MissingDirection,
    /// An operator nested in a formula is a numerical query.
    #[error("nested operators must be bounded, not queries (=?)")]
    NestedQuery,
    /// Schedulers can only be extracted from nondeterministic models.
    #[error("cannot extract a scheduler from a deterministic model")]
    DeterministicModel,
    /// Schedulers can only be extracted for top-level operators.
    #[error("cannot extract a scheduler for a property that is not a probability or reward operator")]
    NotAnOperator,
    /// The options have a precision that is not a positive number.
    #[error("precision must be positive, found {0}")]
    InvalidPrecision(f64),
}

/// Checks a property on a model.
///
/// ```
/// # use spmc_core::*;
/// let mut builder = SparseMatrixBuilder::new();
/// builder.new_group();
/// builder.new_row().unwrap();
/// builder.add_entry(0, 0.5).unwrap();
/// builder.add_entry(1, 0.5).unwrap();
/// builder.new_group();
/// builder.new_row().unwrap();
/// builder.add_entry(1, 1.0).unwrap();
/// let matrix = builder.build().unwrap();
/// let mut labeling = Labeling::new(2);
/// labeling.add_label(INIT_LABEL).unwrap();
/// labeling.add_label("goal").unwrap();
/// labeling.add_label_to_state(INIT_LABEL, 0).unwrap();
/// labeling.add_label_to_state("goal", 1).unwrap();
/// let model = Model::new(ModelType::Dtmc, matrix, labeling).unwrap();
///
/// let property = &parse_properties("P=? [F<=1 \"goal\"]").unwrap()[0];
/// let result = model_checking(&model, property, &CheckOptions::default()).unwrap();
/// assert_eq!(result.initial_values(), vec![Value::Number(0.5)]);
/// ```
pub fn model_checking(
    model: &Model,
    property: &Property,
    options: &CheckOptions,
) -> Result<CheckResult, CheckError> {
    ModelChecker::new(model, options.clone()).check(property)
}

/// Checks properties on a model, sharing the analysis of the model's graph between them.
#[derive(Debug)]
pub struct ModelChecker<'a> {
    model: &'a Model,
    options: CheckOptions,
    predecessors: OnceCell<Predecessors>,
}

impl<'a> ModelChecker<'a> {
    /// Creates a checker for the model.
    pub fn new(model: &'a Model, options: CheckOptions) -> Self {
        Self {
            model,
            options,
            predecessors: OnceCell::new(),
        }
    }

    /// The options of the checker.
    pub fn options(&self) -> &CheckOptions {
        &self.options
    }

    fn predecessors(&self) -> &Predecessors {
        self.predecessors.get_or_init(|| {
            trace!("computing predecessors");
            graph::predecessors(self.model.transitions())
        })
    }

    fn states_count(&self) -> usize {
        self.model.states()
    }

    /// Checks a property.
    ///
    /// A top-level operator without bound yields [`Values::Quantitative`],
    /// anything else [`Values::Qualitative`].
    pub fn check(&self, property: &Property) -> Result<CheckResult, CheckError> {
        info!("checking property {property}");
        let time = Instant::now();
        if self.options.precision.is_nan() || self.options.precision <= 0.0 {
            return Err(CheckError::InvalidPrecision(self.options.precision));
        }
        let extract = self.options.extract_scheduler;
        if extract && !self.model.is_nondeterministic() {
            return Err(CheckError::DeterministicModel);
        }
        let result = match &property.formula {
            StateFormula::Probability(op) => {
                let (values, scheduler) = self.probabilities(op, extract)?;
                self.result(values, op.bound, scheduler)
            }
            StateFormula::Reward(op) => {
                let (values, scheduler) = self.rewards(op, extract)?;
                self.result(values, op.bound, scheduler)
            }
            formula => {
                if extract {
                    return Err(CheckError::NotAnOperator);
                }
                let values = self.states(formula)?;
                CheckResult::new(
                    Values::Qualitative(values),
                    self.model.initial_states(),
                    None,
                )
            }
        };
        info!("property checked in {:?}", time.elapsed());
        Ok(result)
    }

    fn result(
        &self,
        values: Vec<f64>,
        bound: Option<Bound>,
        scheduler: Option<Scheduler>,
    ) -> CheckResult {
        let values = match bound {
            Some(bound) => Values::Qualitative(values.iter().map(|&v| bound.holds(v)).collect()),
            None => Values::Quantitative(values),
        };
        CheckResult::new(values, self.model.initial_states(), scheduler)
    }

    /// The states satisfying a state formula.
    pub fn states(&self, formula: &StateFormula) -> Result<Vec<bool>, CheckError> {
        let n = self.states_count();
        match formula {
            StateFormula::True => Ok(vec![true; n]),
            StateFormula::False => Ok(vec![false; n]),
            StateFormula::Label(label) => self
                .model
                .labeling()
                .states_with(label)
                .map(<[bool]>::to_vec)
                .ok_or_else(|| CheckError::UnknownLabel(label.clone())),
            StateFormula::Not(sub) => self.states(sub).map(|states| graph::negate(&states)),
            StateFormula::And(subs) => {
                let lhs = self.states(&subs.0)?;
                let rhs = self.states(&subs.1)?;
                Ok(lhs.iter().zip(&rhs).map(|(&l, &r)| l && r).collect())
            }
            StateFormula::Or(subs) => {
                let lhs = self.states(&subs.0)?;
                let rhs = self.states(&subs.1)?;
                Ok(lhs.iter().zip(&rhs).map(|(&l, &r)| l || r).collect())
            }
            StateFormula::Probability(op) => {
                let bound = op.bound.ok_or(CheckError::NestedQuery)?;
                let (values, _) = self.probabilities(op, false)?;
                Ok(values.iter().map(|&v| bound.holds(v)).collect())
            }
            StateFormula::Reward(op) => {
                let bound = op.bound.ok_or(CheckError::NestedQuery)?;
                let (values, _) = self.rewards(op, false)?;
                Ok(values.iter().map(|&v| bound.holds(v)).collect())
            }
        }
    }

    fn direction(
        &self,
        direction: Option<Direction>,
        bound: Option<Bound>,
    ) -> Result<Direction, CheckError> {
        if !self.model.is_nondeterministic() {
            if direction.is_some() {
                warn!("optimization direction is ignored on deterministic models");
            }
            return Ok(Direction::Maximize);
        }
        direction
            .or_else(|| bound.map(|bound| bound.comparison.implied_direction()))
            .ok_or(CheckError::MissingDirection)
    }

    fn reward_model(&self, name: Option<&str>) -> Result<&'a RewardModel, CheckError> {
        let model: &'a Model = self.model;
        match name {
            Some(name) => model
                .reward_model(name)
                .ok_or_else(|| CheckError::UnknownRewardModel(name.to_owned())),
            None => {
                let mut reward_models = model.reward_models();
                match (reward_models.next(), reward_models.next()) {
                    (Some((_, rewards)), None) => Ok(rewards),
                    (None, _) => Err(CheckError::NoRewardModel),
                    (Some(_), Some(_)) => Err(CheckError::AmbiguousRewardModel),
                }
            }
        }
    }

    fn probabilities(
        &self,
        op: &ProbabilityOperator,
        extract: bool,
    ) -> Result<(Vec<f64>, Option<Scheduler>), CheckError> {
        let direction = self.direction(op.direction, op.bound)?;
        let n = self.states_count();
        match &op.path {
            PathFormula::Next(sub) => {
                let target = self.states(sub)?;
                Ok(self.next(&target, direction, extract))
            }
            PathFormula::Until(subs, steps) => {
                let lhs = self.states(&subs.0)?;
                let rhs = self.states(&subs.1)?;
                Ok(self.until(&lhs, &rhs, *steps, direction, extract))
            }
            PathFormula::Eventually(sub, steps) => {
                let rhs = self.states(sub)?;
                Ok(self.until(&vec![true; n], &rhs, *steps, direction, extract))
            }
            PathFormula::Globally(sub, steps) => {
                // P_opt [G φ] = 1 - P_dual [F !φ]
                let rhs = graph::negate(&self.states(sub)?);
                let (mut values, scheduler) =
                    self.until(&vec![true; n], &rhs, *steps, direction.dual(), extract);
                values.iter_mut().for_each(|value| *value = 1.0 - *value);
                Ok((values, scheduler))
            }
        }
    }

    fn next(
        &self,
        target: &[bool],
        direction: Direction,
        extract: bool,
    ) -> (Vec<f64>, Option<Scheduler>) {
        let n = self.states_count();
        let indicator = target
            .iter()
            .map(|&b| if b { 1.0 } else { 0.0 })
            .collect::<Vec<_>>();
        let iteration = Iteration::new(self.model.transitions(), direction);
        let values = (0..n)
            .map(|state| iteration.state_value(state, &indicator))
            .collect();
        let scheduler = extract.then(|| {
            Scheduler::Memoryless(
                (0..n)
                    .map(|state| iteration.best_choice(state, &indicator))
                    .collect(),
            )
        });
        (values, scheduler)
    }

    fn until(
        &self,
        lhs: &[bool],
        rhs: &[bool],
        steps: Option<u32>,
        direction: Direction,
        extract: bool,
    ) -> (Vec<f64>, Option<Scheduler>) {
        match steps {
            Some(steps) => self.bounded_until(lhs, rhs, steps, direction, extract),
            None => self.unbounded_until(lhs, rhs, direction, extract),
        }
    }

    fn bounded_until(
        &self,
        lhs: &[bool],
        rhs: &[bool],
        steps: u32,
        direction: Direction,
        extract: bool,
    ) -> (Vec<f64>, Option<Scheduler>) {
        let zero = graph::prob0a(self.predecessors(), lhs, rhs);
        let maybe = (0..self.states_count())
            .map(|s| lhs[s] && !rhs[s] && !zero[s])
            .collect::<Vec<_>>();
        debug!(
            "bounded until: {} states to iterate for {steps} steps",
            graph::count(&maybe)
        );
        let mut values = indicator(rhs);
        let schedule = Iteration::new(self.model.transitions(), direction).steps(
            &maybe,
            &mut values,
            steps,
            extract,
            !self.options.single_thread,
        );
        (values, schedule.map(Scheduler::StepDependent))
    }

    fn unbounded_until(
        &self,
        lhs: &[bool],
        rhs: &[bool],
        direction: Direction,
        extract: bool,
    ) -> (Vec<f64>, Option<Scheduler>) {
        let matrix = self.model.transitions();
        let predecessors = self.predecessors();
        let (zero, one) = match direction {
            Direction::Maximize => (
                graph::prob0a(predecessors, lhs, rhs),
                graph::prob1e(matrix, predecessors, lhs, rhs),
            ),
            Direction::Minimize => {
                let zero = graph::prob0e(matrix, predecessors, lhs, rhs);
                let one = graph::prob1a(predecessors, lhs, rhs, &zero);
                (zero, one)
            }
        };
        let maybe = zero
            .iter()
            .zip(&one)
            .map(|(&z, &o)| !z && !o)
            .collect::<Vec<_>>();
        debug!(
            "precomputation: {} states with probability 0, {} with probability 1, {} left",
            graph::count(&zero),
            graph::count(&one),
            graph::count(&maybe),
        );
        let mut values = indicator(&one);
        let iteration = Iteration::new(matrix, direction);
        if maybe.contains(&true) {
            iteration.solve(&maybe, &mut values, &self.options);
        }
        let scheduler = extract.then(|| {
            let mut choices = vec![0; self.states_count()];
            match direction {
                Direction::Minimize => {
                    for state in 0..self.states_count() {
                        if zero[state] && lhs[state] && !rhs[state] {
                            // Stay where rhs is avoided surely.
                            choices[state] = matrix
                                .group(state)
                                .position(|row| matrix.row(row).iter().all(|e| zero[e.column]))
                                .unwrap_or_default();
                        } else if maybe[state] {
                            choices[state] = iteration.best_choice(state, &values);
                        }
                    }
                }
                Direction::Maximize => {
                    let not_rhs = one
                        .iter()
                        .zip(rhs)
                        .map(|(&o, &r)| o && !r)
                        .collect::<Vec<_>>();
                    let towards_rhs =
                        graph::attractor_choices(matrix, predecessors, &not_rhs, rhs, |_, row| {
                            matrix.row(row).iter().all(|e| one[e.column])
                        });
                    let optimal = self.optimal_choices(&iteration, &maybe, &one, &values);
                    for (state, choice) in choices.iter_mut().enumerate() {
                        if let Some(c) = towards_rhs[state].or(optimal[state]) {
                            *choice = c;
                        }
                    }
                }
            }
            Scheduler::Memoryless(choices)
        });
        (values, scheduler)
    }

    /// Optimal choices of the `states` that make progress towards `target`,
    /// falling back to any optimal choice.
    ///
    /// Picking merely optimal choices is not enough when maximizing probabilities
    /// or minimizing rewards:
    /// staying forever in an end component would be optimal for the values
    /// but never reach the target.
    fn optimal_choices(
        &self,
        iteration: &Iteration,
        states: &[bool],
        target: &[bool],
        values: &[f64],
    ) -> Vec<Option<usize>> {
        let matrix = self.model.transitions();
        let mut choices = graph::attractor_choices(
            matrix,
            self.predecessors(),
            states,
            target,
            |state, row| {
                let best = iteration.state_value(state, values);
                let value = iteration.row_value(row, values);
                value.is_finite() && (best - value).abs() <= self.tolerance(best)
            },
        );
        for (state, choice) in choices.iter_mut().enumerate() {
            if states[state] && choice.is_none() {
                trace!("no optimal choice of state {state} progresses towards the target");
                *choice = Some(iteration.best_choice(state, values));
            }
        }
        choices
    }

    fn tolerance(&self, value: f64) -> f64 {
        let scale = if self.options.relative && value != 0.0 {
            value.abs()
        } else {
            1.0
        };
        10.0 * self.options.precision * scale
    }

    fn rewards(
        &self,
        op: &RewardOperator,
        extract: bool,
    ) -> Result<(Vec<f64>, Option<Scheduler>), CheckError> {
        let direction = self.direction(op.direction, op.bound)?;
        let rewards = self
            .reward_model(op.reward_model.as_deref())?
            .choice_rewards(self.model.transitions());
        match &op.measure {
            RewardMeasure::Reachability(target) => {
                let target = self.states(target)?;
                Ok(self.reachability_rewards(&target, &rewards, direction, extract))
            }
            RewardMeasure::Cumulative(steps) => {
                Ok(self.cumulative_rewards(&rewards, *steps, direction, extract))
            }
        }
    }

    fn reachability_rewards(
        &self,
        target: &[bool],
        rewards: &[f64],
        direction: Direction,
        extract: bool,
    ) -> (Vec<f64>, Option<Scheduler>) {
        let n = self.states_count();
        let matrix = self.model.transitions();
        let predecessors = self.predecessors();
        let all = vec![true; n];
        // When maximizing, states where the target can be avoided surely.
        let zero = (direction == Direction::Maximize)
            .then(|| graph::prob0e(matrix, predecessors, &all, target));
        // Rewards are infinite where the target is not reached almost surely.
        let finite = match &zero {
            Some(zero) => graph::prob1a(predecessors, &all, target, zero),
            None => graph::prob1e(matrix, predecessors, &all, target),
        };
        let maybe = (0..n)
            .map(|s| finite[s] && !target[s])
            .collect::<Vec<_>>();
        debug!(
            "precomputation: {} states with infinite reward, {} left",
            n - graph::count(&finite),
            graph::count(&maybe),
        );
        let mut values = finite
            .iter()
            .map(|&f| if f { 0.0 } else { f64::INFINITY })
            .collect::<Vec<_>>();
        let iteration = Iteration::new(matrix, direction).with_rewards(rewards);
        let stays_finite = |_: usize, row: usize| matrix.row(row).iter().all(|e| finite[e.column]);
        if maybe.contains(&true) {
            if direction == Direction::Minimize {
                // Start from the values of a scheduler reaching the target surely,
                // then improve them from above.
                let proper =
                    graph::attractor_choices(matrix, predecessors, &maybe, target, stays_finite)
                        .into_iter()
                        .map(Option::unwrap_or_default)
                        .collect::<Vec<_>>();
                iteration
                    .with_choices(&proper)
                    .solve(&maybe, &mut values, &self.options);
            }
            iteration.solve(&maybe, &mut values, &self.options);
        }
        let scheduler = extract.then(|| {
            let choices = match &zero {
                Some(zero) => {
                    let mut choices = (0..n)
                        .map(|state| {
                            if maybe[state] {
                                iteration.best_choice(state, &values)
                            } else {
                                0
                            }
                        })
                        .collect::<Vec<_>>();
                    // Infinite rewards need the target to be missed with positive probability:
                    // stay where it is avoided surely, and move there from the other states.
                    let escaping = (0..n)
                        .map(|state| !finite[state] && !zero[state])
                        .collect::<Vec<_>>();
                    let towards_zero = graph::attractor_choices(
                        matrix,
                        predecessors,
                        &escaping,
                        zero,
                        |_, _| true,
                    );
                    for (state, choice) in choices.iter_mut().enumerate() {
                        if zero[state] {
                            *choice = matrix
                                .group(state)
                                .position(|row| matrix.row(row).iter().all(|e| zero[e.column]))
                                .unwrap_or_default();
                        } else if let Some(c) = towards_zero[state] {
                            *choice = c;
                        }
                    }
                    choices
                }
                None => self
                    .optimal_choices(&iteration, &maybe, target, &values)
                    .into_iter()
                    .map(Option::unwrap_or_default)
                    .collect(),
            };
            Scheduler::Memoryless(choices)
        });
        (values, scheduler)
    }

    fn cumulative_rewards(
        &self,
        rewards: &[f64],
        steps: u32,
        direction: Direction,
        extract: bool,
    ) -> (Vec<f64>, Option<Scheduler>) {
        let n = self.states_count();
        let mut values = vec![0.0; n];
        let schedule = Iteration::new(self.model.transitions(), direction)
            .with_rewards(rewards)
            .steps(
                &vec![true; n],
                &mut values,
                steps,
                extract,
                !self.options.single_thread,
            );
        (values, schedule.map(Scheduler::StepDependent))
    }
}

fn indicator(states: &[bool]) -> Vec<f64> {
    states
        .iter()
        .map(|&b| if b { 1.0 } else { 0.0 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{INIT_LABEL, Labeling, ModelType, SparseMatrixBuilder, parse_properties};

    // 0 init: a -> 1 (p=0.9) | 2 (p=0.1); b -> 0
    // 1 goal, 2 sink
    fn model(model_type: ModelType) -> Model {
        let mut builder = SparseMatrixBuilder::new();
        builder.new_group();
        builder.new_row().unwrap();
        builder.add_entry(1, 0.9).unwrap();
        builder.add_entry(2, 0.1).unwrap();
        if model_type == ModelType::Mdp {
            builder.new_row().unwrap();
            builder.add_entry(0, 1.0).unwrap();
        }
        for state in 1..3 {
            builder.new_group();
            builder.new_row().unwrap();
            builder.add_entry(state, 1.0).unwrap();
        }
        let mut labeling = Labeling::new(3);
        labeling.add_label(INIT_LABEL).unwrap();
        labeling.add_label("goal").unwrap();
        labeling.add_label_to_state(INIT_LABEL, 0).unwrap();
        labeling.add_label_to_state("goal", 1).unwrap();
        Model::new(model_type, builder.build().unwrap(), labeling).unwrap()
    }

    fn check(
        model: &Model,
        property: &str,
        options: &CheckOptions,
    ) -> Result<CheckResult, CheckError> {
        let property = parse_properties(property).unwrap().pop().unwrap();
        model_checking(model, &property, options)
    }

    #[test]
    fn direction_resolution() {
        let mdp = model(ModelType::Mdp);
        let options = CheckOptions::default();
        assert_eq!(
            check(&mdp, "P=? [F \"goal\"]", &options),
            Err(CheckError::MissingDirection)
        );
        // Lower bounds are checked against the minimum.
        let result = check(&mdp, "P>=0.5 [F \"goal\"]", &options).unwrap();
        assert_eq!(result.value(0), Some(crate::Value::Truth(false)));
        let result = check(&mdp, "P<=0.95 [F \"goal\"]", &options).unwrap();
        assert_eq!(result.value(0), Some(crate::Value::Truth(true)));

        let dtmc = model(ModelType::Dtmc);
        let result = check(&dtmc, "Pmin=? [F \"goal\"]", &options).unwrap();
        assert_eq!(result.value(0), Some(crate::Value::Number(0.9)));
    }

    #[test]
    fn errors() {
        let mdp = model(ModelType::Mdp);
        let options = CheckOptions::default();
        assert_eq!(
            check(&mdp, "Pmax=? [F \"nowhere\"]", &options),
            Err(CheckError::UnknownLabel("nowhere".to_owned()))
        );
        assert_eq!(
            check(&mdp, "Pmax=? [F Pmax=? [X \"goal\"]]", &options),
            Err(CheckError::NestedQuery)
        );
        assert_eq!(
            check(&mdp, "Rmin=? [F \"goal\"]", &options),
            Err(CheckError::NoRewardModel)
        );
        let extract = CheckOptions {
            extract_scheduler: true,
            ..Default::default()
        };
        assert_eq!(
            check(&mdp, "\"goal\" | \"init\"", &extract),
            Err(CheckError::NotAnOperator)
        );
        assert_eq!(
            check(&model(ModelType::Dtmc), "P=? [F \"goal\"]", &extract),
            Err(CheckError::DeterministicModel)
        );
        let imprecise = CheckOptions {
            precision: 0.0,
            ..Default::default()
        };
        assert_eq!(
            check(&mdp, "Pmax=? [F \"goal\"]", &imprecise),
            Err(CheckError::InvalidPrecision(0.0))
        );
    }

    #[test]
    fn end_component_scheduler() {
        let mdp = model(ModelType::Mdp);
        let options = CheckOptions {
            extract_scheduler: true,
            ..Default::default()
        };
        // Looping on b is as good as a for the values but never reaches the goal.
        let result = check(&mdp, "Pmax=? [F \"goal\"]", &options).unwrap();
        assert_eq!(result.value(0), Some(crate::Value::Number(0.9)));
        assert_eq!(result.scheduler().unwrap().choice(0, 0), 0);
        // Looping forever avoids the goal.
        let result = check(&mdp, "Pmin=? [F \"goal\"]", &options).unwrap();
        assert_eq!(result.value(0), Some(crate::Value::Number(0.0)));
        assert_eq!(result.scheduler().unwrap().choice(0, 0), 1);
    }
}
