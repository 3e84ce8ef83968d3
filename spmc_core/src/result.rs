use crate::Scheduler;
use std::fmt::Display;

/// The per-state outcome of model checking.
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    /// A probability or expected reward for each state.
    Quantitative(Vec<f64>),
    /// Whether each state satisfies the formula.
    Qualitative(Vec<bool>),
}

/// The outcome in a single state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// A probability or expected reward.
    Number(f64),
    /// Satisfaction of the formula.
    Truth(bool),
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(number) => write!(f, "{number}"),
            Value::Truth(truth) => write!(f, "{truth}"),
        }
    }
}

/// The result of checking a property on a model.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    values: Values,
    initial_states: Vec<usize>,
    scheduler: Option<Scheduler>,
}

impl CheckResult {
    pub(crate) fn new(
        values: Values,
        initial_states: &[usize],
        scheduler: Option<Scheduler>,
    ) -> Self {
        Self {
            values,
            initial_states: initial_states.to_vec(),
            scheduler,
        }
    }

    /// The values in all states.
    pub fn values(&self) -> &Values {
        &self.values
    }

    /// The value in the given state.
    pub fn value(&self, state: usize) -> Option<Value> {
        match &self.values {
            Values::Quantitative(values) => values.get(state).copied().map(Value::Number),
            Values::Qualitative(values) => values.get(state).copied().map(Value::Truth),
        }
    }

    /// The initial states of the checked model.
    pub fn initial_states(&self) -> &[usize] {
        &self.initial_states
    }

    /// The values in the initial states of the checked model.
    pub fn initial_values(&self) -> Vec<Value> {
        self.initial_states
            .iter()
            .filter_map(|&state| self.value(state))
            .collect()
    }

    /// Whether a scheduler was extracted together with the result.
    pub fn has_scheduler(&self) -> bool {
        self.scheduler.is_some()
    }

    /// The scheduler extracted together with the result, if any.
    pub fn scheduler(&self) -> Option<&Scheduler> {
        self.scheduler.as_ref()
    }

    /// Takes the scheduler out of the result.
    pub fn take_scheduler(&mut self) -> Option<Scheduler> {
        self.scheduler.take()
    }
}

impl Display for CheckResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.initial_values().as_slice() {
            [] => write!(f, "no initial state"),
            [value] => write!(f, "{value}"),
            values => match &self.values {
                Values::Quantitative(_) => {
                    let numbers = values.iter().filter_map(|value| match value {
                        Value::Number(number) => Some(*number),
                        Value::Truth(_) => None,
                    });
                    let (min, max) = numbers
                        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), n| {
                            (min.min(n), max.max(n))
                        });
                    write!(f, "[{min}, {max}] (range over {} initial states)", values.len())
                }
                Values::Qualitative(_) => {
                    let holds = values
                        .iter()
                        .filter(|value| matches!(value, Value::Truth(true)))
                        .count();
                    if holds == values.len() {
                        write!(f, "true (in all {} initial states)", values.len())
                    } else if holds == 0 {
                        write!(f, "false (in all {} initial states)", values.len())
                    } else {
                        write!(f, "true in {holds} of {} initial states", values.len())
                    }
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_initial_state() {
        let result = CheckResult::new(Values::Quantitative(vec![0.25, 1.0]), &[0], None);
        assert_eq!(result.to_string(), "0.25");
        assert_eq!(result.initial_values(), vec![Value::Number(0.25)]);
        assert!(!result.has_scheduler());
    }

    #[test]
    fn multiple_initial_states() {
        let result = CheckResult::new(
            Values::Quantitative(vec![0.25, 1.0, 0.5]),
            &[0, 2],
            Some(Scheduler::Memoryless(vec![0, 0, 0])),
        );
        assert_eq!(result.to_string(), "[0.25, 0.5] (range over 2 initial states)");
        assert!(result.has_scheduler());

        let result = CheckResult::new(Values::Qualitative(vec![true, false]), &[0, 1], None);
        assert_eq!(result.to_string(), "true in 1 of 2 initial states");
    }
}
