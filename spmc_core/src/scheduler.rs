use crate::Model;
use std::fmt::Display;

/// A scheduler (or policy) resolving the nondeterminism of a model,
/// by picking one of the choices available in each state.
///
/// Choices are local to the state: `0` is the first choice of the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scheduler {
    /// Picks a choice depending only on the current state.
    Memoryless(Vec<usize>),
    /// Picks a choice depending on the current state and the number of steps taken so far.
    ///
    /// The `i`-th entry holds the choices for step `i`;
    /// after the last step, the choice is irrelevant and the last entry is reused.
    StepDependent(Vec<Vec<usize>>),
}

impl Scheduler {
    /// The choice to take in `state` after `step` steps.
    pub fn choice(&self, state: usize, step: usize) -> usize {
        match self {
            Scheduler::Memoryless(choices) => choices[state],
            Scheduler::StepDependent(steps) => steps
                .get(step)
                .or_else(|| steps.last())
                .map(|choices| choices[state])
                .unwrap_or_default(),
        }
    }

    /// Whether the scheduler needs no memory.
    pub fn is_memoryless(&self) -> bool {
        matches!(self, Scheduler::Memoryless(_))
    }

    /// Number of memory states, i.e., distinct steps the scheduler distinguishes.
    pub fn memory_size(&self) -> usize {
        match self {
            Scheduler::Memoryless(_) => 1,
            Scheduler::StepDependent(steps) => steps.len().max(1),
        }
    }

    /// Number of states the scheduler is defined on.
    pub fn states(&self) -> usize {
        match self {
            Scheduler::Memoryless(choices) => choices.len(),
            Scheduler::StepDependent(steps) => steps.first().map(Vec::len).unwrap_or_default(),
        }
    }

    /// Pairs the scheduler with a model, to print choices with their labels.
    pub fn display<'a>(&'a self, model: &'a Model) -> SchedulerDisplay<'a> {
        SchedulerDisplay {
            scheduler: self,
            model,
        }
    }
}

/// Prints a [`Scheduler`] as a table of states and choices.
pub struct SchedulerDisplay<'a> {
    scheduler: &'a Scheduler,
    model: &'a Model,
}

impl SchedulerDisplay<'_> {
    fn choice(&self, state: usize, choice: usize) -> String {
        match self.model.choice_label(state, choice) {
            Some(label) => format!("{choice} {{{label}}}"),
            None => choice.to_string(),
        }
    }
}

impl Display for SchedulerDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.scheduler {
            Scheduler::Memoryless(choices) => {
                writeln!(f, "state\tchoice")?;
                for (state, &choice) in choices.iter().enumerate() {
                    writeln!(f, "{state}\t{}", self.choice(state, choice))?;
                }
            }
            Scheduler::StepDependent(steps) => {
                writeln!(f, "step\tstate\tchoice")?;
                for (step, choices) in steps.iter().enumerate() {
                    for (state, &choice) in choices.iter().enumerate() {
                        writeln!(f, "{step}\t{state}\t{}", self.choice(state, choice))?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_dependent() {
        let scheduler = Scheduler::StepDependent(vec![vec![0, 1], vec![1, 0]]);
        assert_eq!(scheduler.choice(0, 0), 0);
        assert_eq!(scheduler.choice(0, 1), 1);
        // Past the horizon the last step is reused.
        assert_eq!(scheduler.choice(0, 7), 1);
        assert_eq!(scheduler.memory_size(), 2);
        assert_eq!(scheduler.states(), 2);
        assert!(!scheduler.is_memoryless());
    }

    #[test]
    fn memoryless() {
        let scheduler = Scheduler::Memoryless(vec![2, 0, 1]);
        assert_eq!(scheduler.choice(0, 100), 2);
        assert_eq!(scheduler.memory_size(), 1);
        assert_eq!(scheduler.states(), 3);
    }
}
