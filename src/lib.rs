//! # SPMC (Sparse Probabilistic Model Checker)
//!
//! SPMC is an explicit-state probabilistic model checker
//! for discrete-time Markov chains (DTMC) and Markov decision processes (MDP).[^1]
//!
//! Models are read from the explicit format:
//! a transition file (`.tra`), a label file (`.lab`)
//! and, optionally, state (`.rew`) and transition (`.trew`) reward files.
//! Properties are written in PCTL extended with reward operators.
//!
//! SPMC computes (optimal) probabilities and expected rewards,
//! extracts the schedulers achieving them,
//! and simulates paths of the model under such schedulers.
//!
//! [^1]: Baier, C., & Katoen, J. (2008). *Principles of model checking*. MIT Press.

mod check;
mod progress;
mod report;
mod simulate;

use check::CheckArgs;
use clap::{Parser, Subcommand};
use progress::Bar;
use simulate::SimulateArgs;
use spmc_explicit::ExplicitFiles;
use std::path::PathBuf;

/// SPMC's available commands.
#[deny(missing_docs)]
#[derive(Subcommand)]
enum Commands {
    /// Validate the syntactical and semantical correctness of the model files,
    /// and print a summary of the model.
    Validate,
    /// Check properties of the given model
    ///
    /// EXAMPLE: spmc PATH/TO/MODEL.tra check 'Pmax=? [ G !"bad" ]'
    /// EXAMPLE: spmc PATH/TO/MODEL.tra check 'Pmax=? [ F "goal" ]; Rmin=? [ F "goal" ]'
    /// EXAMPLE: spmc PATH/TO/MODEL.tra check --file PATH/TO/PROPERTIES --extract-scheduler
    #[clap(verbatim_doc_comment)]
    Check {
        /// Args for model checking.
        #[clap(flatten)]
        args: CheckArgs,
        /// Print a progress bar while checking.
        ///
        /// By default, SPMC only prints a terse message while checking the properties.
        /// For longer lists of properties, it might be nice to see in real-time how checking is proceeding.
        #[arg(long, value_enum)]
        progress: Option<Bar>,
        /// Print JSON-serialized final report.
        ///
        /// By default, SPMC prints a user-friendly report at the end of checking.
        /// This flag has the report printed in JSON format instead.
        #[arg(long)]
        json: bool,
    },
    /// Simulate paths of the model and save them to file in csv format.
    Simulate(SimulateArgs),
}

/// An explicit-state probabilistic model checker for Markov decision processes.
///
/// SPMC (Sparse Probabilistic Model Checker) computes probabilities and expected rewards
/// of PCTL properties on models given in explicit format,
/// and extracts the optimal schedulers achieving them.
#[derive(Parser)]
#[deny(missing_docs)]
#[command(version, about, long_about)]
pub struct Cli {
    /// Path of the model's transition file (.tra).
    #[arg(value_hint = clap::ValueHint::FilePath)]
    model: PathBuf,
    /// Path of the model's label file.
    ///
    /// By default, it is the path of the transition file with extension '.lab'.
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    labels: Option<PathBuf>,
    /// Path of a state reward file (.rew).
    ///
    /// Rewards are named after the file, e.g., 'time.rew' defines the reward model 'time'.
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    state_rewards: Option<PathBuf>,
    /// Path of a transition reward file (.trew).
    ///
    /// Transition rewards add to the state rewards, if any.
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    transition_rewards: Option<PathBuf>,
    /// Add a self-loop to states without outgoing transitions, and label them 'deadlock'.
    ///
    /// By default, such states are an error.
    #[arg(long)]
    fix_deadlocks: bool,
    /// Verbose output
    #[command(flatten)]
    pub verbosity: clap_verbosity_flag::Verbosity,
    /// Actions to execute on the model.
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn files(&self) -> ExplicitFiles {
        let labels = self
            .labels
            .clone()
            .unwrap_or_else(|| self.model.with_extension("lab"));
        let mut files = ExplicitFiles::new(&self.model, labels).fix_deadlocks(self.fix_deadlocks);
        if let Some(path) = &self.state_rewards {
            files = files.state_rewards(path);
        }
        if let Some(path) = &self.transition_rewards {
            files = files.transition_rewards(path);
        }
        files
    }

    /// Loads the model and executes the command.
    pub fn run(self) -> anyhow::Result<()> {
        let name = self
            .model
            .file_name()
            .and_then(|os_str| os_str.to_str())
            .unwrap_or("model")
            .to_owned();

        eprint!("Processing model, please wait...");
        let model = self.files().load()?;
        eprintln!(" done");

        match self.command {
            Commands::Validate => {
                println!("model '{name}' successfully validated");
                println!("{model}");
            }
            Commands::Check {
                args,
                progress,
                json,
            } => {
                let report = if let Some(bar) = progress {
                    args.check(name, &model, Some(bar))?
                } else {
                    eprint!("Checking in progress...");
                    let report = args.check(name, &model, None)?;
                    eprintln!(" done!");
                    report
                };
                report.print(json)?;
            }
            Commands::Simulate(args) => {
                eprint!("Simulation in progress...");
                args.simulate(&model)?;
                eprintln!(" done");
            }
        }
        Ok(())
    }
}

// From Clap tutorial <https://docs.rs/clap/latest/clap/_derive/_tutorial/index.html#testing>
#[test]
fn verify_cli() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}
