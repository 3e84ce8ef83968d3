//! Graph-based precomputations on the underlying graph of a model.
//!
//! They identify the states where the probability of `lhs U rhs`
//! is exactly 0 or 1 without numerical computations,
//! under all schedulers (`A` variants) or under some scheduler (`E` variants).
//! For models with a single choice per state both variants coincide.

use crate::SparseMatrix;
use smallvec::SmallVec;

pub(crate) type Predecessors = Vec<SmallVec<[usize; 4]>>;

/// For each state, the states with a transition into it.
pub(crate) fn predecessors(matrix: &SparseMatrix) -> Predecessors {
    let mut predecessors: Predecessors = vec![SmallVec::new(); matrix.groups()];
    for state in 0..matrix.groups() {
        for row in matrix.group(state) {
            for entry in matrix.row(row) {
                let preds = &mut predecessors[entry.column];
                if preds.last() != Some(&state) {
                    preds.push(state);
                }
            }
        }
    }
    predecessors
}

pub(crate) fn negate(states: &[bool]) -> Vec<bool> {
    states.iter().map(|b| !b).collect()
}

pub(crate) fn count(states: &[bool]) -> usize {
    states.iter().filter(|b| **b).count()
}

fn indices(states: &[bool]) -> Vec<usize> {
    states
        .iter()
        .enumerate()
        .filter_map(|(state, &b)| b.then_some(state))
        .collect()
}

/// States that can reach `target` along a path through `constraint` states.
pub(crate) fn backward_reachable(
    predecessors: &Predecessors,
    constraint: &[bool],
    target: &[bool],
) -> Vec<bool> {
    let mut reached = target.to_vec();
    let mut stack = indices(target);
    while let Some(state) = stack.pop() {
        for &pred in &predecessors[state] {
            if !reached[pred] && constraint[pred] {
                reached[pred] = true;
                stack.push(pred);
            }
        }
    }
    reached
}

/// States where `lhs U rhs` has probability 0 under all schedulers.
pub(crate) fn prob0a(predecessors: &Predecessors, lhs: &[bool], rhs: &[bool]) -> Vec<bool> {
    negate(&backward_reachable(predecessors, lhs, rhs))
}

/// States where `lhs U rhs` has probability 0 under some scheduler.
pub(crate) fn prob0e(
    matrix: &SparseMatrix,
    predecessors: &Predecessors,
    lhs: &[bool],
    rhs: &[bool],
) -> Vec<bool> {
    // States where every scheduler reaches rhs with positive probability.
    let mut forced = rhs.to_vec();
    let mut stack = indices(rhs);
    while let Some(state) = stack.pop() {
        for &pred in &predecessors[state] {
            if !forced[pred]
                && lhs[pred]
                && matrix
                    .group(pred)
                    .all(|row| matrix.row(row).iter().any(|e| forced[e.column]))
            {
                forced[pred] = true;
                stack.push(pred);
            }
        }
    }
    negate(&forced)
}

/// States where `lhs U rhs` has probability 1 under all schedulers,
/// given the result of [`prob0e`].
///
/// Some scheduler fails to reach `rhs` exactly when it can be driven,
/// through `lhs` states, into a state where `rhs` can be avoided surely.
pub(crate) fn prob1a(
    predecessors: &Predecessors,
    lhs: &[bool],
    rhs: &[bool],
    prob0e: &[bool],
) -> Vec<bool> {
    let constraint = lhs
        .iter()
        .zip(rhs)
        .map(|(&l, &r)| l && !r)
        .collect::<Vec<_>>();
    negate(&backward_reachable(predecessors, &constraint, prob0e))
}

/// States where `lhs U rhs` has probability 1 under some scheduler.
pub(crate) fn prob1e(
    matrix: &SparseMatrix,
    predecessors: &Predecessors,
    lhs: &[bool],
    rhs: &[bool],
) -> Vec<bool> {
    let mut candidates = backward_reachable(predecessors, lhs, rhs);
    loop {
        let mut reached = rhs.to_vec();
        let mut stack = indices(rhs);
        while let Some(state) = stack.pop() {
            for &pred in &predecessors[state] {
                if !reached[pred]
                    && lhs[pred]
                    && candidates[pred]
                    && matrix.group(pred).any(|row| {
                        let row = matrix.row(row);
                        row.iter().all(|e| candidates[e.column])
                            && row.iter().any(|e| reached[e.column])
                    })
                {
                    reached[pred] = true;
                    stack.push(pred);
                }
            }
        }
        if reached == candidates {
            return reached;
        }
        candidates = reached;
    }
}

/// Picks a choice for each of the `states` outside of `target`,
/// among the choices accepted by `allowed`,
/// such that following the picked choices reaches `target` with positive probability
/// from every state that gets a choice.
///
/// Choices are local to the state.
/// States that cannot reach `target` through accepted choices get no choice.
pub(crate) fn attractor_choices<F>(
    matrix: &SparseMatrix,
    predecessors: &Predecessors,
    states: &[bool],
    target: &[bool],
    allowed: F,
) -> Vec<Option<usize>>
where
    F: Fn(usize, usize) -> bool,
{
    let mut choices = vec![None; matrix.groups()];
    let mut done = target.to_vec();
    let mut stack = indices(target);
    while let Some(state) = stack.pop() {
        for &pred in &predecessors[state] {
            if done[pred] || !states[pred] {
                continue;
            }
            let group = matrix.group(pred);
            let start = group.start;
            if let Some(row) = group.into_iter().find(|&row| {
                allowed(pred, row) && matrix.row(row).iter().any(|e| done[e.column])
            }) {
                choices[pred] = Some(row - start);
                done[pred] = true;
                stack.push(pred);
            }
        }
    }
    choices
}
