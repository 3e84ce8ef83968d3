use crate::sparse::SparseMatrix;
use smallvec::SmallVec;
use std::{collections::BTreeMap, fmt::Display};
use thiserror::Error;

/// Rows of a stochastic matrix must sum up to 1 within this tolerance.
pub const STOCHASTIC_TOLERANCE: f64 = 1e-6;

/// Name of the label marking initial states.
pub const INIT_LABEL: &str = "init";

/// Name of the label marking states whose deadlock has been fixed with a self-loop.
pub const DEADLOCK_LABEL: &str = "deadlock";

/// An error in the definition of a [`Model`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// The labeling does not cover the same states as the transition matrix.
    #[error("transition matrix has {matrix} states but labeling has {labeling}")]
    StateMismatch {
        /// States of the transition matrix.
        matrix: usize,
        /// States of the labeling.
        labeling: usize,
    },
    /// A transition points outside of the state space.
    #[error("transition targets state {0}, which is out of range")]
    TargetOutOfRange(usize),
    /// A row of the transition matrix is not a probability distribution.
    #[error("choice {row} of state {state} is not a probability distribution (sum {sum})")]
    NotStochastic {
        /// The state owning the choice.
        state: usize,
        /// The (global) choice index.
        row: usize,
        /// Sum of the choice's probabilities.
        sum: f64,
    },
    /// A transition probability is not positive.
    #[error("choice {row} has non-positive probability {value}")]
    NonPositive {
        /// The (global) choice index.
        row: usize,
        /// The offending value.
        value: f64,
    },
    /// A deterministic model has a state with multiple choices.
    #[error("state {0} of deterministic model has multiple choices")]
    Nondeterministic(usize),
    /// No initial state.
    #[error("no initial states (missing or empty label 'init')")]
    NoInitialStates,
    /// A label is declared twice.
    #[error("label '{0}' declared twice")]
    DuplicateLabel(String),
    /// A label is not declared.
    #[error("label '{0}' is not declared")]
    UnknownLabel(String),
    /// A state is out of range.
    #[error("state {0} is out of range")]
    StateOutOfRange(usize),
    /// A reward model has the wrong number of entries.
    #[error("reward model '{name}' has {found} entries, but {expected} were expected")]
    RewardSize {
        /// Name of the reward model.
        name: String,
        /// Expected number of entries.
        expected: usize,
        /// Found number of entries.
        found: usize,
    },
    /// A reward is negative or not finite.
    #[error("reward model '{name}' has invalid reward {value}")]
    InvalidReward {
        /// Name of the reward model.
        name: String,
        /// The offending value.
        value: f64,
    },
    /// Choice labels do not match the choices of the model.
    #[error("{found} choice labels for {expected} choices")]
    ChoiceLabelsSize {
        /// Number of choices.
        expected: usize,
        /// Number of labels.
        found: usize,
    },
}

/// The kind of probabilistic model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelType {
    /// Discrete-time Markov chain: a single choice per state.
    Dtmc,
    /// Markov decision process: possibly multiple choices per state.
    Mdp,
}

impl Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::Dtmc => write!(f, "DTMC"),
            ModelType::Mdp => write!(f, "MDP"),
        }
    }
}

/// Assigns sets of states to label names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labeling {
    states: usize,
    labels: BTreeMap<String, Vec<bool>>,
}

impl Labeling {
    /// Creates an empty labeling over the given number of states.
    pub fn new(states: usize) -> Self {
        Self {
            states,
            labels: BTreeMap::new(),
        }
    }

    /// The number of states this labeling is defined over.
    pub fn states(&self) -> usize {
        self.states
    }

    /// Declares a new label, initially attached to no state.
    pub fn add_label(&mut self, label: &str) -> Result<(), ModelError> {
        if self.labels.contains_key(label) {
            Err(ModelError::DuplicateLabel(label.to_owned()))
        } else {
            self.labels
                .insert(label.to_owned(), vec![false; self.states]);
            Ok(())
        }
    }

    /// Attaches a declared label to a state.
    pub fn add_label_to_state(&mut self, label: &str, state: usize) -> Result<(), ModelError> {
        let states = self
            .labels
            .get_mut(label)
            .ok_or_else(|| ModelError::UnknownLabel(label.to_owned()))?;
        *states
            .get_mut(state)
            .ok_or(ModelError::StateOutOfRange(state))? = true;
        Ok(())
    }

    /// Whether the label is declared.
    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains_key(label)
    }

    /// The set of states carrying the label, if declared.
    pub fn states_with(&self, label: &str) -> Option<&[bool]> {
        self.labels.get(label).map(Vec::as_slice)
    }

    /// Iterates over the declared labels.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.keys().map(String::as_str)
    }

    /// The labels attached to the given state.
    pub fn labels_of(&self, state: usize) -> SmallVec<[&str; 4]> {
        self.labels
            .iter()
            .filter(|(_, states)| states.get(state).copied().unwrap_or(false))
            .map(|(label, _)| label.as_str())
            .collect()
    }
}

/// Rewards earned by being in a state and by taking a choice.
///
/// All rewards are non-negative.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RewardModel {
    /// Reward per state, if any.
    pub state_rewards: Option<Vec<f64>>,
    /// Reward per choice (i.e., row of the transition matrix), if any.
    pub choice_rewards: Option<Vec<f64>>,
}

impl RewardModel {
    /// A reward model with state rewards only.
    pub fn with_state_rewards(rewards: Vec<f64>) -> Self {
        Self {
            state_rewards: Some(rewards),
            choice_rewards: None,
        }
    }

    /// The total reward of every choice of the given matrix:
    /// the reward of the choice plus the reward of the state it belongs to.
    pub fn choice_rewards(&self, matrix: &SparseMatrix) -> Vec<f64> {
        let mut rewards = self
            .choice_rewards
            .clone()
            .unwrap_or_else(|| vec![0.0; matrix.rows()]);
        if let Some(state_rewards) = &self.state_rewards {
            for (state, reward) in state_rewards.iter().enumerate() {
                matrix
                    .group(state)
                    .for_each(|row| rewards[row] += *reward);
            }
        }
        rewards
    }
}

/// An explicit probabilistic model: a [`ModelType::Dtmc`] or [`ModelType::Mdp`]
/// given by its transition matrix, state labeling and reward models.
#[derive(Debug, Clone)]
pub struct Model {
    model_type: ModelType,
    transitions: SparseMatrix,
    labeling: Labeling,
    initial_states: Vec<usize>,
    reward_models: BTreeMap<String, RewardModel>,
    choice_labels: Option<Vec<Option<String>>>,
}

impl Model {
    /// Creates a new [`Model`], checking that:
    ///
    /// - the transition matrix has one row group per state,
    /// - every row is a probability distribution over the states,
    /// - DTMCs have a single choice per state,
    /// - the [`INIT_LABEL`] label marks at least one state.
    pub fn new(
        model_type: ModelType,
        transitions: SparseMatrix,
        labeling: Labeling,
    ) -> Result<Self, ModelError> {
        let states = transitions.groups();
        if states != labeling.states() {
            return Err(ModelError::StateMismatch {
                matrix: states,
                labeling: labeling.states(),
            });
        }
        if transitions.columns() > states {
            return Err(ModelError::TargetOutOfRange(transitions.columns() - 1));
        }
        for state in 0..states {
            if model_type == ModelType::Dtmc && transitions.group_size(state) > 1 {
                return Err(ModelError::Nondeterministic(state));
            }
            for row in transitions.group(state) {
                if let Some(entry) = transitions.row(row).iter().find(|e| e.value <= 0.0) {
                    return Err(ModelError::NonPositive {
                        row,
                        value: entry.value,
                    });
                }
                let sum = transitions.row_sum(row);
                if (sum - 1.0).abs() > STOCHASTIC_TOLERANCE {
                    return Err(ModelError::NotStochastic { state, row, sum });
                }
            }
        }
        let initial_states = labeling
            .states_with(INIT_LABEL)
            .map(|init| {
                init.iter()
                    .enumerate()
                    .filter_map(|(state, &b)| b.then_some(state))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        if initial_states.is_empty() {
            return Err(ModelError::NoInitialStates);
        }
        Ok(Self {
            model_type,
            transitions,
            labeling,
            initial_states,
            reward_models: BTreeMap::new(),
            choice_labels: None,
        })
    }

    /// Adds (or replaces) a named reward model.
    pub fn with_reward_model(
        mut self,
        name: &str,
        rewards: RewardModel,
    ) -> Result<Self, ModelError> {
        let check = |values: &[f64], expected: usize| {
            if values.len() != expected {
                Err(ModelError::RewardSize {
                    name: name.to_owned(),
                    expected,
                    found: values.len(),
                })
            } else if let Some(value) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
                Err(ModelError::InvalidReward {
                    name: name.to_owned(),
                    value: *value,
                })
            } else {
                Ok(())
            }
        };
        if let Some(state_rewards) = &rewards.state_rewards {
            check(state_rewards, self.states())?;
        }
        if let Some(choice_rewards) = &rewards.choice_rewards {
            check(choice_rewards, self.choices())?;
        }
        self.reward_models.insert(name.to_owned(), rewards);
        Ok(self)
    }

    /// Attaches a (possibly missing) label to every choice.
    pub fn with_choice_labels(mut self, labels: Vec<Option<String>>) -> Result<Self, ModelError> {
        if labels.len() != self.choices() {
            return Err(ModelError::ChoiceLabelsSize {
                expected: self.choices(),
                found: labels.len(),
            });
        }
        self.choice_labels = Some(labels);
        Ok(self)
    }

    /// The type of the model.
    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    /// Whether the model may have multiple choices per state.
    pub fn is_nondeterministic(&self) -> bool {
        self.model_type == ModelType::Mdp
    }

    /// Number of states.
    pub fn states(&self) -> usize {
        self.transitions.groups()
    }

    /// Number of choices over all states.
    pub fn choices(&self) -> usize {
        self.transitions.rows()
    }

    /// The transition matrix.
    pub fn transitions(&self) -> &SparseMatrix {
        &self.transitions
    }

    /// The state labeling.
    pub fn labeling(&self) -> &Labeling {
        &self.labeling
    }

    /// The initial states, in increasing order.
    pub fn initial_states(&self) -> &[usize] {
        &self.initial_states
    }

    /// The named reward models.
    pub fn reward_models(&self) -> impl Iterator<Item = (&str, &RewardModel)> {
        self.reward_models
            .iter()
            .map(|(name, rewards)| (name.as_str(), rewards))
    }

    /// Looks up a reward model by name.
    pub fn reward_model(&self, name: &str) -> Option<&RewardModel> {
        self.reward_models.get(name)
    }

    /// The label of the `choice`-th choice of `state`, if any.
    pub fn choice_label(&self, state: usize, choice: usize) -> Option<&str> {
        let row = self.transitions.group(state).start + choice;
        self.choice_labels
            .as_ref()
            .and_then(|labels| labels.get(row))
            .and_then(Option::as_deref)
    }

    /// Whether the state can only loop on itself.
    pub fn is_absorbing(&self, state: usize) -> bool {
        self.transitions.group(state).all(|row| {
            let row = self.transitions.row(row);
            row.len() == 1 && row[0].column == state
        })
    }
}

impl Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Model type: \t{}", self.model_type)?;
        writeln!(f, "States: \t{}", self.states())?;
        writeln!(f, "Transitions: \t{}", self.transitions.entries())?;
        if self.is_nondeterministic() {
            writeln!(f, "Choices: \t{}", self.choices())?;
        }
        if self.reward_models.is_empty() {
            writeln!(f, "Reward models: \tnone")?;
        } else {
            let names = self
                .reward_models
                .keys()
                .map(String::as_str)
                .collect::<Vec<_>>();
            writeln!(f, "Reward models: \t{}", names.join(", "))?;
        }
        write!(f, "Labels: \t{}", self.labeling.labels.len())?;
        for (label, states) in &self.labeling.labels {
            let count = states.iter().filter(|b| **b).count();
            write!(f, "\n   * {label} -> {count} item(s)")?;
        }
        Ok(())
    }
}
