//! Transition files.
//!
//! The first line gives the model type, `dtmc` or `mdp`;
//! each following line is a transition,
//! `source target probability` for DTMCs and
//! `source choice target probability [action]` for MDPs,
//! sorted by source state and choice.

use crate::{ErrorKind, ExplicitError, end, field, index, number, records};
use spmc_core::{ModelType, SparseMatrix, SparseMatrixBuilder};

/// The content of a transition file.
#[derive(Debug, Clone)]
pub struct Transitions {
    /// The type of the model.
    pub model_type: ModelType,
    /// The transition matrix, with a row group per state.
    pub matrix: SparseMatrix,
    /// The action label of every choice, if given.
    pub choice_labels: Vec<Option<String>>,
    /// States without transitions that have been given a self-loop.
    pub deadlocks: Vec<usize>,
}

struct TransitionsBuilder {
    matrix: SparseMatrixBuilder,
    choice_labels: Vec<Option<String>>,
    deadlocks: Vec<usize>,
    fix_deadlocks: bool,
    // Largest state index mentioned so far.
    max_state: Option<usize>,
}

impl TransitionsBuilder {
    fn new(fix_deadlocks: bool) -> Self {
        Self {
            matrix: SparseMatrixBuilder::new(),
            choice_labels: Vec::new(),
            deadlocks: Vec::new(),
            fix_deadlocks,
            max_state: None,
        }
    }

    fn mention(&mut self, state: usize) {
        self.max_state = Some(self.max_state.map_or(state, |max| max.max(state)));
    }

    // Gives a self-loop to the states before `state` that have no group yet.
    fn fill_deadlocks(&mut self, state: usize, line: usize) -> Result<(), ExplicitError> {
        let next = self.matrix.current_group().map_or(0, |group| group + 1);
        for deadlock in next..state {
            if !self.fix_deadlocks {
                return Err(ExplicitError::new(line, ErrorKind::Deadlock(deadlock)));
            }
            self.matrix.new_group();
            self.new_row(None, line)?;
            self.add_entry(deadlock, 1.0, line)?;
            self.deadlocks.push(deadlock);
        }
        Ok(())
    }

    fn open_state(&mut self, state: usize, line: usize) -> Result<(), ExplicitError> {
        self.fill_deadlocks(state, line)?;
        self.matrix.new_group();
        self.mention(state);
        Ok(())
    }

    fn new_row(&mut self, action: Option<&str>, line: usize) -> Result<(), ExplicitError> {
        self.matrix
            .new_row()
            .map_err(|err| ExplicitError::new(line, err.into()))?;
        self.choice_labels.push(action.map(str::to_owned));
        Ok(())
    }

    fn add_entry(
        &mut self,
        target: usize,
        probability: f64,
        line: usize,
    ) -> Result<(), ExplicitError> {
        self.mention(target);
        self.matrix
            .add_entry(target, probability)
            .map_err(|err| ExplicitError::new(line, err.into()))
    }

    fn build(mut self, model_type: ModelType, line: usize) -> Result<Transitions, ExplicitError> {
        if let Some(max_state) = self.max_state {
            // States only ever reached as targets.
            self.fill_deadlocks(max_state + 1, line)?;
        }
        let matrix = self
            .matrix
            .build()
            .map_err(|err| ExplicitError::new(line, err.into()))?;
        Ok(Transitions {
            model_type,
            matrix,
            choice_labels: self.choice_labels,
            deadlocks: self.deadlocks,
        })
    }
}

/// Parses a transition file.
///
/// States without outgoing transitions are an error,
/// unless `fix_deadlocks` is set, in which case they get a self-loop.
pub fn parse(input: &str, fix_deadlocks: bool) -> Result<Transitions, ExplicitError> {
    let mut records = records(input);
    let (line, mut fields) = records
        .next()
        .ok_or_else(|| ExplicitError::new(1, ErrorKind::MissingModelType))?;
    let model_type = match field(&mut fields, line, "model type")? {
        "dtmc" => ModelType::Dtmc,
        "mdp" => ModelType::Mdp,
        unsupported @ ("ctmc" | "ma") => {
            return Err(ExplicitError::new(
                line,
                ErrorKind::UnsupportedModelType(unsupported.to_owned()),
            ));
        }
        unknown => {
            return Err(ExplicitError::new(
                line,
                ErrorKind::UnknownModelType(unknown.to_owned()),
            ));
        }
    };
    end(&mut fields, line)?;

    let mut builder = TransitionsBuilder::new(fix_deadlocks);
    let mut last_line = line;
    // Current source state and choice.
    let mut current: Option<(usize, usize)> = None;
    for (line, mut fields) in records {
        last_line = line;
        let source = index(&mut fields, line, "source state")?;
        let choice = match model_type {
            ModelType::Dtmc => 0,
            ModelType::Mdp => index(&mut fields, line, "choice")?,
        };
        let target = index(&mut fields, line, "target state")?;
        let probability = number(&mut fields, line, "probability")?;
        let action = match model_type {
            ModelType::Dtmc => None,
            ModelType::Mdp => fields.next(),
        };
        end(&mut fields, line)?;

        match current {
            Some((state, _)) if source < state => {
                return Err(ExplicitError::new(
                    line,
                    ErrorKind::UnsortedSource {
                        found: source,
                        previous: state,
                    },
                ));
            }
            Some((state, current_choice)) if source == state => {
                if choice == current_choice + 1 {
                    builder.new_row(action, line)?;
                } else if choice != current_choice {
                    return Err(ExplicitError::new(
                        line,
                        ErrorKind::UnsortedChoice {
                            state,
                            found: choice,
                            expected: format!("{current_choice} or {}", current_choice + 1),
                        },
                    ));
                }
            }
            _ => {
                if choice != 0 {
                    return Err(ExplicitError::new(
                        line,
                        ErrorKind::UnsortedChoice {
                            state: source,
                            found: choice,
                            expected: "0".to_owned(),
                        },
                    ));
                }
                builder.open_state(source, line)?;
                builder.new_row(action, line)?;
            }
        }
        current = Some((source, choice));
        builder.add_entry(target, probability, line)?;
    }
    builder.build(model_type, last_line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dtmc() {
        let transitions = parse("dtmc\n0 0 0.5\n0 1 0.5\n1 1 1\n", false).unwrap();
        assert_eq!(transitions.model_type, ModelType::Dtmc);
        assert_eq!(transitions.matrix.groups(), 2);
        assert_eq!(transitions.matrix.rows(), 2);
        assert_eq!(transitions.matrix.entries(), 3);
        assert_eq!(transitions.choice_labels, vec![None, None]);
    }

    #[test]
    fn mdp_with_actions() {
        let input = "# a comment\nmdp\n0 0 1 1 go\n0 1 0 0.5 wait\n0 1 1 0.5 wait\n\n1 0 1 1\n";
        let transitions = parse(input, false).unwrap();
        assert_eq!(transitions.model_type, ModelType::Mdp);
        assert_eq!(transitions.matrix.groups(), 2);
        assert_eq!(transitions.matrix.group_size(0), 2);
        assert_eq!(
            transitions.choice_labels,
            vec![Some("go".to_owned()), Some("wait".to_owned()), None]
        );
    }

    #[test]
    fn deadlocks() {
        // State 1 has no transitions, state 2 is only a target.
        let input = "dtmc\n0 1 0.5\n0 2 0.5\n";
        let err = parse(input, false).unwrap_err();
        assert_eq!(err, ExplicitError::new(3, ErrorKind::Deadlock(1)));

        let transitions = parse(input, true).unwrap();
        assert_eq!(transitions.matrix.groups(), 3);
        assert_eq!(transitions.deadlocks, vec![1, 2]);
        assert_eq!(transitions.matrix.row(2)[0].column, 2);

        let input = "mdp\n0 0 0 1\n2 0 2 1\n";
        let err = parse(input, false).unwrap_err();
        assert_eq!(err, ExplicitError::new(3, ErrorKind::Deadlock(1)));
    }

    #[test]
    fn ordering() {
        let err = parse("dtmc\n1 0 1\n0 0 1\n", true).unwrap_err();
        assert_eq!(
            err,
            ExplicitError::new(
                3,
                ErrorKind::UnsortedSource {
                    found: 0,
                    previous: 1
                }
            )
        );
        let err = parse("mdp\n0 0 0 1\n0 2 0 1\n", true).unwrap_err();
        assert_eq!(err.line, 3);
        assert!(matches!(err.kind, ErrorKind::UnsortedChoice { found: 2, .. }));
        let err = parse("mdp\n0 1 0 1\n", true).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnsortedChoice { found: 1, .. }));
    }

    #[test]
    fn malformed() {
        assert_eq!(
            parse("", false).unwrap_err().kind,
            ErrorKind::MissingModelType
        );
        assert_eq!(
            parse("ctmc\n", false).unwrap_err().kind,
            ErrorKind::UnsupportedModelType("ctmc".to_owned())
        );
        assert_eq!(
            parse("pta\n", false).unwrap_err().kind,
            ErrorKind::UnknownModelType("pta".to_owned())
        );
        assert_eq!(
            parse("dtmc\n0 1\n", false).unwrap_err(),
            ExplicitError::new(2, ErrorKind::MissingField("probability"))
        );
        assert_eq!(
            parse("dtmc\n0 0 1 extra\n", false).unwrap_err().kind,
            ErrorKind::UnexpectedField("extra".to_owned())
        );
        assert!(matches!(
            parse("dtmc\n0 x 1\n", false).unwrap_err().kind,
            ErrorKind::InvalidIndex { field: "target state", .. }
        ));
        assert!(matches!(
            parse("dtmc\n0 0 one\n", false).unwrap_err().kind,
            ErrorKind::InvalidNumber { field: "probability", .. }
        ));
    }
}
