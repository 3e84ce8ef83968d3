//! Random simulation of paths of a model.

use crate::{Model, Scheduler};
use log::trace;
use rand::{Rng, SeedableRng, rngs::SmallRng};

/// How a simulated path ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathOutcome {
    /// The path reached an absorbing state after the given number of steps.
    Absorbed(usize),
    /// The path was cut at the maximum number of steps.
    Truncated,
}

/// Trait for types that receive the states of a simulated path as they are visited.
pub trait Tracer {
    /// Initialize new streaming.
    ///
    /// This method needs to be called once, before calls to [`Self::trace`].
    fn init(&mut self);

    /// Stream a new state of the path, together with the choice taken from it
    /// (`None` for the last state).
    fn trace(&mut self, step: usize, state: usize, choice: Option<usize>);

    /// Finalize and close streaming.
    ///
    /// This method needs to be called at the end of the path.
    fn finalize(self, outcome: &PathOutcome);
}

// Dummy Tracer that does nothing
impl Tracer for () {
    fn init(&mut self) {}

    fn trace(&mut self, _step: usize, _state: usize, _choice: Option<usize>) {}

    fn finalize(self, _outcome: &PathOutcome) {}
}

/// Samples paths of a [`Model`].
///
/// Nondeterminism is resolved by a [`Scheduler`] if one is given,
/// and uniformly at random otherwise.
#[derive(Debug, Clone)]
pub struct Simulator<'a> {
    model: &'a Model,
    scheduler: Option<&'a Scheduler>,
    rng: SmallRng,
}

impl<'a> Simulator<'a> {
    /// Creates a simulator, seeded from the OS unless a seed is given.
    pub fn new(model: &'a Model, seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(SmallRng::from_os_rng, SmallRng::seed_from_u64);
        Self {
            model,
            scheduler: None,
            rng,
        }
    }

    /// Resolves nondeterminism with the given scheduler.
    pub fn with_scheduler(mut self, scheduler: &'a Scheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    fn initial_state(&mut self) -> usize {
        let initial_states = self.model.initial_states();
        initial_states[self.rng.random_range(0..initial_states.len())]
    }

    fn choice(&mut self, state: usize, step: usize) -> usize {
        let choices = self.model.transitions().group_size(state);
        match self.scheduler {
            Some(scheduler) => {
                let choice = scheduler.choice(state, step);
                debug_assert!(choice < choices, "scheduler does not fit the model");
                choice.min(choices - 1)
            }
            None => self.rng.random_range(0..choices),
        }
    }

    fn successor(&mut self, row: usize) -> usize {
        let entries = self.model.transitions().row(row);
        let mut sample = self.rng.random::<f64>();
        for entry in entries {
            if sample < entry.value {
                return entry.column;
            }
            sample -= entry.value;
        }
        // Rounding errors can leave some probability mass unassigned.
        entries.last().map(|entry| entry.column).unwrap_or_default()
    }

    /// Samples a path of at most `steps` steps from an initial state,
    /// stopping early in absorbing states.
    pub fn run<T: Tracer>(&mut self, steps: usize, mut tracer: T) -> PathOutcome {
        trace!("new path starting");
        tracer.init();
        let mut state = self.initial_state();
        for step in 0..steps {
            if self.model.is_absorbing(state) {
                trace!("path absorbed after {step} steps");
                tracer.trace(step, state, None);
                let outcome = PathOutcome::Absorbed(step);
                tracer.finalize(&outcome);
                return outcome;
            }
            let choice = self.choice(state, step);
            tracer.trace(step, state, Some(choice));
            let row = self.model.transitions().group(state).start + choice;
            state = self.successor(row);
        }
        trace!("path truncated");
        tracer.trace(steps, state, None);
        tracer.finalize(&PathOutcome::Truncated);
        PathOutcome::Truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{INIT_LABEL, Labeling, ModelType, SparseMatrixBuilder};

    #[derive(Default)]
    struct Path(Vec<(usize, Option<usize>)>);

    impl Tracer for &mut Path {
        fn init(&mut self) {
            self.0.clear();
        }

        fn trace(&mut self, _step: usize, state: usize, choice: Option<usize>) {
            self.0.push((state, choice));
        }

        fn finalize(self, _outcome: &PathOutcome) {}
    }

    // 0 -a-> 1, 0 -b-> 2, 1 -> 0, 2 absorbing
    fn model() -> Model {
        let mut builder = SparseMatrixBuilder::new();
        builder.new_group();
        builder.new_row().unwrap();
        builder.add_entry(1, 1.0).unwrap();
        builder.new_row().unwrap();
        builder.add_entry(2, 1.0).unwrap();
        builder.new_group();
        builder.new_row().unwrap();
        builder.add_entry(0, 1.0).unwrap();
        builder.new_group();
        builder.new_row().unwrap();
        builder.add_entry(2, 1.0).unwrap();
        let mut labeling = Labeling::new(3);
        labeling.add_label(INIT_LABEL).unwrap();
        labeling.add_label_to_state(INIT_LABEL, 0).unwrap();
        Model::new(ModelType::Mdp, builder.build().unwrap(), labeling).unwrap()
    }

    #[test]
    fn scheduled_paths() {
        let model = model();
        let mut path = Path::default();
        let looping = Scheduler::Memoryless(vec![0, 0, 0]);
        let mut simulator = Simulator::new(&model, Some(0)).with_scheduler(&looping);
        assert_eq!(simulator.run(3, &mut path), PathOutcome::Truncated);
        assert_eq!(
            path.0,
            vec![(0, Some(0)), (1, Some(0)), (0, Some(0)), (1, None)]
        );

        let leaving = Scheduler::StepDependent(vec![vec![0, 0, 0], vec![0, 0, 0], vec![1, 0, 0]]);
        let mut simulator = Simulator::new(&model, Some(0)).with_scheduler(&leaving);
        assert_eq!(simulator.run(10, &mut path), PathOutcome::Absorbed(3));
        assert_eq!(path.0.last(), Some(&(2, None)));
    }

    #[test]
    fn seeded_paths_repeat() {
        let model = model();
        let mut first = Path::default();
        let mut second = Path::default();
        Simulator::new(&model, Some(42)).run(20, &mut first);
        Simulator::new(&model, Some(42)).run(20, &mut second);
        assert_eq!(first.0, second.0);
        assert_eq!(Simulator::new(&model, None).run(0, ()), PathOutcome::Truncated);
    }
}
