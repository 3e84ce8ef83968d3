//! Value iteration over the rows of a model's transition matrix.

use super::CheckOptions;
use crate::{Direction, SparseMatrix};
use log::{debug, trace, warn};
use rayon::prelude::*;

/// A Bellman operator:
/// the value of a state is the optimal value over its choices
/// of the choice's reward plus the expected value of the successors.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Iteration<'a> {
    matrix: &'a SparseMatrix,
    direction: Direction,
    rewards: Option<&'a [f64]>,
    choices: Option<&'a [usize]>,
}

impl<'a> Iteration<'a> {
    pub(crate) fn new(matrix: &'a SparseMatrix, direction: Direction) -> Self {
        Self {
            matrix,
            direction,
            rewards: None,
            choices: None,
        }
    }

    /// Adds a reward to each row of the matrix.
    pub(crate) fn with_rewards(mut self, rewards: &'a [f64]) -> Self {
        self.rewards = Some(rewards);
        self
    }

    /// Fixes the choice of every state, evaluating the induced chain instead of optimizing.
    pub(crate) fn with_choices(mut self, choices: &'a [usize]) -> Self {
        self.choices = Some(choices);
        self
    }

    #[inline]
    pub(crate) fn row_value(&self, row: usize, values: &[f64]) -> f64 {
        let reward = self.rewards.map_or(0.0, |rewards| rewards[row]);
        reward + self.matrix.multiply_row(row, values)
    }

    pub(crate) fn state_value(&self, state: usize, values: &[f64]) -> f64 {
        let mut rows = self.matrix.group(state);
        if let Some(choices) = self.choices {
            return self.row_value(rows.start + choices[state], values);
        }
        let first = rows
            .next()
            .map(|row| self.row_value(row, values))
            .unwrap_or_default();
        rows.fold(first, |best, row| {
            let value = self.row_value(row, values);
            if self.direction.better(value, best) {
                value
            } else {
                best
            }
        })
    }

    /// The first optimal choice of `state`, local to the state.
    pub(crate) fn best_choice(&self, state: usize, values: &[f64]) -> usize {
        let rows = self.matrix.group(state);
        let start = rows.start;
        let mut best = None;
        for row in rows {
            let value = self.row_value(row, values);
            match best {
                Some((_, best_value)) if !self.direction.better(value, best_value) => {}
                _ => best = Some((row - start, value)),
            }
        }
        best.map(|(choice, _)| choice).unwrap_or_default()
    }

    /// Applies the operator once to the `states`, leaving other values untouched.
    fn step(&self, states: &[bool], old: &[f64], new: &mut [f64], parallel: bool) {
        let update = |(state, value): (usize, &mut f64)| {
            *value = if states[state] {
                self.state_value(state, old)
            } else {
                old[state]
            };
        };
        if parallel {
            new.par_iter_mut().enumerate().for_each(update);
        } else {
            new.iter_mut().enumerate().for_each(update);
        }
    }

    /// Iterates the operator on `states` until the values converge
    /// within the precision given by the options.
    ///
    /// If convergence is not reached within the maximum number of iterations,
    /// the current values are kept and `false` is returned.
    pub(crate) fn solve(
        &self,
        states: &[bool],
        values: &mut Vec<f64>,
        options: &CheckOptions,
    ) -> bool {
        let mut next = values.clone();
        for iteration in 1..=options.max_iterations {
            self.step(states, values, &mut next, !options.single_thread);
            std::mem::swap(values, &mut next);
            if converged(states, &next, values, options) {
                debug!("value iteration converged after {iteration} iterations");
                return true;
            }
            if iteration % 1000 == 0 {
                trace!("value iteration: {iteration} iterations");
            }
        }
        warn!(
            "value iteration did not converge within {} iterations, results may be imprecise",
            options.max_iterations
        );
        false
    }

    /// Applies the operator `steps` times on `states`.
    ///
    /// If `extract` is set, returns the optimal choices for each step,
    /// where step `i` is the `i`-th step taken from the start.
    pub(crate) fn steps(
        &self,
        states: &[bool],
        values: &mut Vec<f64>,
        steps: u32,
        extract: bool,
        parallel: bool,
    ) -> Option<Vec<Vec<usize>>> {
        let mut schedule = extract.then(|| Vec::with_capacity(steps as usize));
        let mut next = values.clone();
        for _ in 0..steps {
            if let Some(schedule) = schedule.as_mut() {
                schedule.push(
                    (0..self.matrix.groups())
                        .map(|state| {
                            if states[state] {
                                self.best_choice(state, values)
                            } else {
                                0
                            }
                        })
                        .collect::<Vec<_>>(),
                );
            }
            self.step(states, values, &mut next, parallel);
            std::mem::swap(values, &mut next);
        }
        // Choices were computed with increasing remaining steps.
        schedule.map(|mut schedule| {
            schedule.reverse();
            schedule
        })
    }
}

fn converged(states: &[bool], old: &[f64], new: &[f64], options: &CheckOptions) -> bool {
    states
        .iter()
        .zip(old)
        .zip(new)
        .all(|((&state, &old), &new)| {
            if !state || old == new {
                return true;
            }
            let diff = (new - old).abs();
            if options.relative {
                diff <= options.precision * new.abs()
            } else {
                diff <= options.precision
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SparseMatrixBuilder;

    // State 0: choice 0 goes to 1 w.p. 0.5 and stays w.p. 0.5,
    // choice 1 goes to 2 surely.
    fn matrix() -> SparseMatrix {
        let mut builder = SparseMatrixBuilder::new();
        builder.new_group();
        builder.new_row().unwrap();
        builder.add_entry(0, 0.5).unwrap();
        builder.add_entry(1, 0.5).unwrap();
        builder.new_row().unwrap();
        builder.add_entry(2, 1.0).unwrap();
        for state in 1..3 {
            builder.new_group();
            builder.new_row().unwrap();
            builder.add_entry(state, 1.0).unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn optimizes_over_choices() {
        let matrix = matrix();
        let values = [0.0, 1.0, 0.0];
        let max = Iteration::new(&matrix, Direction::Maximize);
        assert_eq!(max.state_value(0, &values), 0.5);
        assert_eq!(max.best_choice(0, &values), 0);
        let min = Iteration::new(&matrix, Direction::Minimize);
        assert_eq!(min.state_value(0, &values), 0.0);
        assert_eq!(min.best_choice(0, &values), 1);
        let fixed = [1, 0, 0];
        let fixed = max.with_choices(&fixed);
        assert_eq!(fixed.state_value(0, &values), 0.0);
    }

    #[test]
    fn solves_to_precision() {
        let matrix = matrix();
        let options = CheckOptions::default();
        let mut values = vec![0.0, 1.0, 0.0];
        let states = [true, false, false];
        let iteration = Iteration::new(&matrix, Direction::Maximize);
        assert!(iteration.solve(&states, &mut values, &options));
        assert!((values[0] - 1.0).abs() < 1e-5);
        assert_eq!(values[1..], [1.0, 0.0]);
    }

    #[test]
    fn reports_non_convergence() {
        let matrix = matrix();
        let options = CheckOptions {
            max_iterations: 3,
            ..Default::default()
        };
        let mut values = vec![0.0, 1.0, 0.0];
        let iteration = Iteration::new(&matrix, Direction::Maximize);
        assert!(!iteration.solve(&[true, false, false], &mut values, &options));
        assert_eq!(values[0], 0.875);
    }

    #[test]
    fn bounded_steps() {
        let matrix = matrix();
        let rewards = [1.5, 2.0, 0.0, 0.0];
        let mut values = vec![0.0; 3];
        let iteration = Iteration::new(&matrix, Direction::Maximize).with_rewards(&rewards);
        let schedule = iteration
            .steps(&[true; 3], &mut values, 2, true, false)
            .unwrap();
        // Leaving gains 2 once, staying pays off only with two steps left.
        assert_eq!(values[0], 2.5);
        assert_eq!(schedule.len(), 2);
        assert_eq!(schedule[0][0], 0);
        assert_eq!(schedule[1][0], 1);
    }
}
