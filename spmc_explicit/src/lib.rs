//! Parser and model builder for the explicit model format:
//! a transition file (`.tra`), a label file (`.lab`)
//! and optional state (`.rew`) and transition (`.trew`) reward files.

pub mod lab;
pub mod rew;
pub mod tra;

use anyhow::Context;
use log::{info, warn};
use spmc_core::{DEADLOCK_LABEL, MatrixError, Model, ModelError, RewardModel};
use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
    str::SplitWhitespace,
};
use thiserror::Error;

/// Name of the reward model built from reward files without a usable file name.
pub const DEFAULT_REWARD_MODEL: &str = "rewards";

/// An error in an explicit model file, at the given line.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}: {kind}")]
pub struct ExplicitError {
    /// The line of the error, starting from 1.
    pub line: usize,
    /// What went wrong.
    pub kind: ErrorKind,
}

impl ExplicitError {
    pub(crate) fn new(line: usize, kind: ErrorKind) -> Self {
        Self { line, kind }
    }
}

/// The kinds of [`ExplicitError`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    /// The transition file has no model type header.
    #[error("missing model type")]
    MissingModelType,
    /// The model type header is not known.
    #[error("unknown model type '{0}'")]
    UnknownModelType(String),
    /// The model type is known but not supported.
    #[error("unsupported model type '{0}', only 'dtmc' and 'mdp' are supported")]
    UnsupportedModelType(String),
    /// A field is missing from the line.
    #[error("missing {0}")]
    MissingField(&'static str),
    /// The line has more fields than expected.
    #[error("unexpected field '{0}'")]
    UnexpectedField(String),
    /// A field is not a state or choice index.
    #[error("invalid {field} '{value}'")]
    InvalidIndex {
        /// The parsed field.
        field: &'static str,
        /// The offending value.
        value: String,
    },
    /// A field is not a number.
    #[error("invalid {field} '{value}'")]
    InvalidNumber {
        /// The parsed field.
        field: &'static str,
        /// The offending value.
        value: String,
    },
    /// Transitions are not sorted by source state.
    #[error("source state {found} after state {previous}, transitions must be sorted by source")]
    UnsortedSource {
        /// The source state of the line.
        found: usize,
        /// The source state of the previous line.
        previous: usize,
    },
    /// Choices of a state are not numbered in order from 0.
    #[error("choice {found} of state {state}, expected {expected}")]
    UnsortedChoice {
        /// The source state.
        state: usize,
        /// The choice of the line.
        found: usize,
        /// The choice expected at this point.
        expected: String,
    },
    /// A state has no outgoing transition.
    #[error("state {0} has no outgoing transition (deadlock fixing is disabled)")]
    Deadlock(usize),
    /// The label file does not start with a `#DECLARATION` block.
    #[error("missing '#DECLARATION' section")]
    MissingDeclaration,
    /// The `#DECLARATION` block is not closed.
    #[error("missing '#END' of the declaration section")]
    MissingEnd,
    /// A state index beyond the states of the model.
    #[error("state {0} does not exist in the model")]
    StateOutOfRange(usize),
    /// A reward refers to a transition that is not in the model.
    #[error("no transition from state {state} (choice {choice}) to state {target}")]
    NoSuchTransition {
        /// The source state.
        state: usize,
        /// The choice of the source state.
        choice: usize,
        /// The target state.
        target: usize,
    },
    /// An error in building the transition matrix.
    #[error(transparent)]
    Matrix(#[from] MatrixError),
    /// An error in the model definition.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Non-empty lines of the input that are not comments,
/// with their line numbers starting from 1.
pub(crate) fn records(input: &str) -> impl Iterator<Item = (usize, SplitWhitespace<'_>)> {
    input
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line, text)| (line, text.split_whitespace()))
}

pub(crate) fn field<'a>(
    fields: &mut SplitWhitespace<'a>,
    line: usize,
    field: &'static str,
) -> Result<&'a str, ExplicitError> {
    fields
        .next()
        .ok_or_else(|| ExplicitError::new(line, ErrorKind::MissingField(field)))
}

pub(crate) fn index(
    fields: &mut SplitWhitespace<'_>,
    line: usize,
    name: &'static str,
) -> Result<usize, ExplicitError> {
    let value = field(fields, line, name)?;
    value.parse().map_err(|_| {
        ExplicitError::new(
            line,
            ErrorKind::InvalidIndex {
                field: name,
                value: value.to_owned(),
            },
        )
    })
}

pub(crate) fn number(
    fields: &mut SplitWhitespace<'_>,
    line: usize,
    name: &'static str,
) -> Result<f64, ExplicitError> {
    let value = field(fields, line, name)?;
    value.parse().map_err(|_| {
        ExplicitError::new(
            line,
            ErrorKind::InvalidNumber {
                field: name,
                value: value.to_owned(),
            },
        )
    })
}

pub(crate) fn end(fields: &mut SplitWhitespace<'_>, line: usize) -> Result<(), ExplicitError> {
    match fields.next() {
        Some(value) => Err(ExplicitError::new(
            line,
            ErrorKind::UnexpectedField(value.to_owned()),
        )),
        None => Ok(()),
    }
}

/// Loads a model from a transition file and a label file.
pub fn load(transitions: &Path, labels: &Path) -> anyhow::Result<Model> {
    ExplicitFiles::new(transitions, labels).load()
}

/// The files making up an explicit model.
///
/// ```no_run
/// # use spmc_explicit::ExplicitFiles;
/// let model = ExplicitFiles::new("die.tra", "die.lab")
///     .state_rewards("die.rew")
///     .fix_deadlocks(true)
///     .load()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ExplicitFiles {
    transitions: PathBuf,
    labels: PathBuf,
    state_rewards: Option<PathBuf>,
    transition_rewards: Option<PathBuf>,
    fix_deadlocks: bool,
}

impl ExplicitFiles {
    /// The files of a model without rewards.
    pub fn new(transitions: impl Into<PathBuf>, labels: impl Into<PathBuf>) -> Self {
        Self {
            transitions: transitions.into(),
            labels: labels.into(),
            state_rewards: None,
            transition_rewards: None,
            fix_deadlocks: false,
        }
    }

    /// Adds a state reward file.
    pub fn state_rewards(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_rewards = Some(path.into());
        self
    }

    /// Adds a transition reward file.
    pub fn transition_rewards(mut self, path: impl Into<PathBuf>) -> Self {
        self.transition_rewards = Some(path.into());
        self
    }

    /// Whether to add self-loops to states without outgoing transitions,
    /// labelling them `deadlock`, instead of failing.
    pub fn fix_deadlocks(mut self, fix: bool) -> Self {
        self.fix_deadlocks = fix;
        self
    }

    /// Name of the reward model: the stem of the first reward file.
    fn reward_model_name(&self) -> String {
        self.state_rewards
            .as_ref()
            .or(self.transition_rewards.as_ref())
            .and_then(|path| path.file_stem())
            .and_then(|stem| stem.to_str())
            .unwrap_or(DEFAULT_REWARD_MODEL)
            .to_owned()
    }

    /// Reads and parses all the files, and builds the model.
    pub fn load(&self) -> anyhow::Result<Model> {
        let time = std::time::Instant::now();
        info!(target: "parser", "parsing transition file '{}'", self.transitions.display());
        let input = read(&self.transitions)?;
        let transitions = tra::parse(&input, self.fix_deadlocks).with_context(|| {
            format!(
                "failed to parse transition file '{}'",
                self.transitions.display()
            )
        })?;
        if !transitions.deadlocks.is_empty() {
            warn!(
                "fixed {} deadlock states with self-loops",
                transitions.deadlocks.len()
            );
        }

        info!(target: "parser", "parsing label file '{}'", self.labels.display());
        let states = transitions.matrix.groups();
        let input = read(&self.labels)?;
        let mut labeling = lab::parse(&input, states)
            .with_context(|| format!("failed to parse label file '{}'", self.labels.display()))?;
        if !transitions.deadlocks.is_empty() {
            if !labeling.contains(DEADLOCK_LABEL) {
                labeling.add_label(DEADLOCK_LABEL)?;
            }
            for &state in &transitions.deadlocks {
                labeling.add_label_to_state(DEADLOCK_LABEL, state)?;
            }
        }

        let mut rewards = RewardModel::default();
        if let Some(path) = &self.state_rewards {
            info!(target: "parser", "parsing state reward file '{}'", path.display());
            let input = read(path)?;
            let state_rewards = rew::parse_state_rewards(&input, states).with_context(|| {
                format!("failed to parse state reward file '{}'", path.display())
            })?;
            rewards.state_rewards = Some(state_rewards);
        }
        if let Some(path) = &self.transition_rewards {
            info!(target: "parser", "parsing transition reward file '{}'", path.display());
            let input = read(path)?;
            let choice_rewards =
                rew::parse_transition_rewards(&input, &transitions.matrix, transitions.model_type)
                    .with_context(|| {
                        format!(
                            "failed to parse transition reward file '{}'",
                            path.display()
                        )
                    })?;
            rewards.choice_rewards = Some(choice_rewards);
        }
        info!("parsing complete in {:?}", time.elapsed());

        let time = std::time::Instant::now();
        info!(target: "build", "building model");
        let mut model = Model::new(transitions.model_type, transitions.matrix, labeling)
            .context("failed to build model")?;
        if transitions.choice_labels.iter().any(Option::is_some) {
            model = model.with_choice_labels(transitions.choice_labels)?;
        }
        if rewards.state_rewards.is_some() || rewards.choice_rewards.is_some() {
            let name = self.reward_model_name();
            model = model
                .with_reward_model(&name, rewards)
                .with_context(|| format!("failed to add reward model '{name}'"))?;
        }
        info!("building model completed in {:?}", time.elapsed());
        Ok(model)
    }
}

fn read(path: &Path) -> anyhow::Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("failed to open file '{}'", path.display()))?;
    let size = file.metadata().map(|data| data.len()).unwrap_or_default();
    let mut buf = String::new();
    // Reserve enough bytes in buf to avoid reallocation.
    buf.reserve(size as usize);
    file.read_to_string(&mut buf)
        .with_context(|| format!("failed to read file '{}' to string", path.display()))?;
    Ok(buf)
}
