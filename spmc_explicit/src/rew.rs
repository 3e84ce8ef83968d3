//! Reward files.
//!
//! State reward files have lines `state reward`.
//! Transition reward files have lines `source target reward` for DTMCs
//! and `source choice target reward` for MDPs.
//! Anything not listed has reward 0.

use crate::{ErrorKind, ExplicitError, end, index, number, records};
use spmc_core::{ModelType, SparseMatrix};

/// Parses a state reward file for a model with the given number of states.
pub fn parse_state_rewards(input: &str, states: usize) -> Result<Vec<f64>, ExplicitError> {
    let mut rewards = vec![0.0; states];
    for (line, mut fields) in records(input) {
        let state = index(&mut fields, line, "state")?;
        let reward = number(&mut fields, line, "reward")?;
        end(&mut fields, line)?;
        *rewards
            .get_mut(state)
            .ok_or_else(|| ExplicitError::new(line, ErrorKind::StateOutOfRange(state)))? = reward;
    }
    Ok(rewards)
}

/// Parses a transition reward file,
/// returning the expected reward of each choice (row) of the matrix:
/// the sum of the rewards of its transitions weighted by their probabilities.
pub fn parse_transition_rewards(
    input: &str,
    matrix: &SparseMatrix,
    model_type: ModelType,
) -> Result<Vec<f64>, ExplicitError> {
    let mut rewards = vec![0.0; matrix.rows()];
    for (line, mut fields) in records(input) {
        let source = index(&mut fields, line, "source state")?;
        let choice = match model_type {
            ModelType::Dtmc => 0,
            ModelType::Mdp => index(&mut fields, line, "choice")?,
        };
        let target = index(&mut fields, line, "target state")?;
        let reward = number(&mut fields, line, "reward")?;
        end(&mut fields, line)?;

        let no_transition = || {
            ExplicitError::new(
                line,
                ErrorKind::NoSuchTransition {
                    state: source,
                    choice,
                    target,
                },
            )
        };
        if source >= matrix.groups() || choice >= matrix.group_size(source) {
            return Err(no_transition());
        }
        let row = matrix.group(source).start + choice;
        let entries = matrix.row(row);
        let entry = entries
            .binary_search_by_key(&target, |entry| entry.column)
            .map(|position| entries[position])
            .map_err(|_| no_transition())?;
        rewards[row] += entry.value * reward;
    }
    Ok(rewards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tra;

    #[test]
    fn state_rewards() {
        let rewards = parse_state_rewards("0 1.5\n# comment\n2 3\n", 3).unwrap();
        assert_eq!(rewards, vec![1.5, 0.0, 3.0]);
        assert_eq!(
            parse_state_rewards("3 1\n", 3).unwrap_err(),
            ExplicitError::new(1, ErrorKind::StateOutOfRange(3))
        );
    }

    #[test]
    fn transition_rewards() {
        let transitions =
            tra::parse("mdp\n0 0 0 0.5\n0 0 1 0.5\n0 1 1 1\n1 0 1 1\n", false).unwrap();
        let rewards = parse_transition_rewards(
            "0 0 1 4\n0 1 1 2\n",
            &transitions.matrix,
            transitions.model_type,
        )
        .unwrap();
        assert_eq!(rewards, vec![2.0, 2.0, 0.0]);
        assert_eq!(
            parse_transition_rewards("1 0 0 1\n", &transitions.matrix, transitions.model_type)
                .unwrap_err()
                .kind,
            ErrorKind::NoSuchTransition {
                state: 1,
                choice: 0,
                target: 0
            }
        );
        assert!(
            parse_transition_rewards("0 2 1 1\n", &transitions.matrix, transitions.model_type)
                .is_err()
        );
    }
}
