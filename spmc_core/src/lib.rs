//! Explicit-state probabilistic model checking of
//! *discrete-time Markov chains* (DTMC) and *Markov decision processes* (MDP)[^1].
//!
//! Models are stored as sparse matrices with one group of rows per state,
//! one row per nondeterministic choice.
//! Properties are written in PCTL extended with reward operators,
//! and checked by graph precomputations and value iteration.
//! For MDPs, optimal schedulers can be extracted together with the results.
//!
//! [^1]: Baier, C., & Katoen, J. (2008). *Principles of model checking*. MIT Press.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod checker;
mod model;
mod property;
mod result;
mod scheduler;
mod simulation;
mod sparse;

pub use checker::{CheckError, CheckOptions, ModelChecker, model_checking};
pub use model::{
    DEADLOCK_LABEL, INIT_LABEL, Labeling, Model, ModelError, ModelType, RewardModel,
    STOCHASTIC_TOLERANCE,
};
pub use property::{
    Bound, Comparison, Direction, ParseError, PathFormula, ProbabilityOperator, Property,
    RewardMeasure, RewardOperator, StateFormula, parse_properties,
};
pub use result::{CheckResult, Value, Values};
pub use scheduler::{Scheduler, SchedulerDisplay};
pub use simulation::{PathOutcome, Simulator, Tracer};
pub use sparse::{Entry, MatrixError, SparseMatrix, SparseMatrixBuilder};
