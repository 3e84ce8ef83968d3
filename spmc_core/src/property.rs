//! Probabilistic temporal properties.
//!
//! Properties are written in a fragment of PCTL extended with reward operators,
//! e.g., `Pmax=? [ G !"bad" ]` or `R{"steps"}min=? [ F "goal" ]`.

mod parser;

pub use parser::{ParseError, parse_properties};
use std::fmt::Display;

/// Whether a quantity is to be minimized or maximized over all schedulers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Minimize.
    Minimize,
    /// Maximize.
    Maximize,
}

impl Direction {
    /// The opposite direction.
    pub fn dual(self) -> Self {
        match self {
            Direction::Minimize => Direction::Maximize,
            Direction::Maximize => Direction::Minimize,
        }
    }

    /// Whether `value` is strictly better than `other` in this direction.
    #[inline]
    pub fn better(self, value: f64, other: f64) -> bool {
        match self {
            Direction::Minimize => value < other,
            Direction::Maximize => value > other,
        }
    }
}

/// A comparison operator in bounded operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    /// `<`
    Less,
    /// `<=`
    LessEq,
    /// `>`
    Greater,
    /// `>=`
    GreaterEq,
}

impl Comparison {
    /// The direction to use when the operator does not give one:
    /// upper bounds must hold for the maximal value, lower bounds for the minimal one.
    pub fn implied_direction(self) -> Direction {
        match self {
            Comparison::Less | Comparison::LessEq => Direction::Maximize,
            Comparison::Greater | Comparison::GreaterEq => Direction::Minimize,
        }
    }
}

/// A bound on a probability or reward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    /// The comparison operator.
    pub comparison: Comparison,
    /// The threshold to compare with.
    pub threshold: f64,
}

impl Bound {
    /// Whether the value satisfies the bound.
    pub fn holds(&self, value: f64) -> bool {
        match self.comparison {
            Comparison::Less => value < self.threshold,
            Comparison::LessEq => value <= self.threshold,
            Comparison::Greater => value > self.threshold,
            Comparison::GreaterEq => value >= self.threshold,
        }
    }
}

/// A state formula, which holds or does not hold in every state.
#[derive(Debug, Clone, PartialEq)]
pub enum StateFormula {
    /// Holds everywhere.
    True,
    /// Holds nowhere.
    False,
    /// Holds in states carrying the label.
    Label(String),
    /// Negation.
    Not(Box<StateFormula>),
    /// Conjunction.
    And(Box<(StateFormula, StateFormula)>),
    /// Disjunction.
    Or(Box<(StateFormula, StateFormula)>),
    /// Probability operator.
    Probability(Box<ProbabilityOperator>),
    /// Reward operator.
    Reward(Box<RewardOperator>),
}

impl StateFormula {
    /// Whether the formula is a (top-level) probability or reward operator.
    pub fn is_operator(&self) -> bool {
        matches!(self, StateFormula::Probability(_) | StateFormula::Reward(_))
    }

    fn precedence(&self) -> u8 {
        match self {
            StateFormula::Or(_) => 0,
            StateFormula::And(_) => 1,
            _ => 2,
        }
    }

    // Prints the formula, parenthesized if it binds less tightly than `min`.
    fn fmt_prec(&self, f: &mut std::fmt::Formatter<'_>, min: u8) -> std::fmt::Result {
        if self.precedence() < min {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

/// A path formula, which holds or does not hold on every path.
#[derive(Debug, Clone, PartialEq)]
pub enum PathFormula {
    /// `X φ`: the next state satisfies φ.
    Next(StateFormula),
    /// `φ U ψ`, `φ U<=k ψ`: φ holds until ψ does (within `k` steps).
    Until(Box<(StateFormula, StateFormula)>, Option<u32>),
    /// `F ψ`, `F<=k ψ`: eventually ψ holds (within `k` steps).
    Eventually(StateFormula, Option<u32>),
    /// `G φ`, `G<=k φ`: φ holds always (for the first `k` steps).
    Globally(StateFormula, Option<u32>),
}

/// The probability operator `P`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityOperator {
    /// Optimization direction, mandatory for queries on nondeterministic models.
    pub direction: Option<Direction>,
    /// Bound; a missing bound makes the operator a numerical query (`=?`).
    pub bound: Option<Bound>,
    /// The path formula whose probability is measured.
    pub path: PathFormula,
}

/// The reward quantity measured by a [`RewardOperator`].
#[derive(Debug, Clone, PartialEq)]
pub enum RewardMeasure {
    /// `F ψ`: reward accumulated until reaching ψ.
    Reachability(StateFormula),
    /// `C<=k`: reward accumulated in the first `k` steps.
    Cumulative(u32),
}

/// The reward operator `R`.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardOperator {
    /// Name of the reward model; can be omitted if the model has a single one.
    pub reward_model: Option<String>,
    /// Optimization direction, mandatory for queries on nondeterministic models.
    pub direction: Option<Direction>,
    /// Bound; a missing bound makes the operator a numerical query (`=?`).
    pub bound: Option<Bound>,
    /// The measured reward.
    pub measure: RewardMeasure,
}

/// A (possibly named) property.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Name of the property, if given.
    pub name: Option<String>,
    /// The property's formula.
    pub formula: StateFormula,
}

impl Display for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "\"{name}\": ")?;
        }
        write!(f, "{}", self.formula)
    }
}

impl Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Comparison::Less => write!(f, "<"),
            Comparison::LessEq => write!(f, "<="),
            Comparison::Greater => write!(f, ">"),
            Comparison::GreaterEq => write!(f, ">="),
        }
    }
}

fn fmt_operator_suffix(
    f: &mut std::fmt::Formatter<'_>,
    direction: Option<Direction>,
    bound: Option<Bound>,
) -> std::fmt::Result {
    match direction {
        Some(Direction::Minimize) => write!(f, "min")?,
        Some(Direction::Maximize) => write!(f, "max")?,
        None => {}
    }
    match bound {
        Some(bound) => write!(f, "{}{}", bound.comparison, bound.threshold),
        None => write!(f, "=?"),
    }
}

fn fmt_steps(f: &mut std::fmt::Formatter<'_>, steps: Option<u32>) -> std::fmt::Result {
    match steps {
        Some(steps) => write!(f, "<={steps} "),
        None => write!(f, " "),
    }
}

impl Display for StateFormula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateFormula::True => write!(f, "true"),
            StateFormula::False => write!(f, "false"),
            StateFormula::Label(label) => write!(f, "\"{label}\""),
            StateFormula::Not(sub) => {
                write!(f, "!")?;
                sub.fmt_prec(f, 2)
            }
            StateFormula::And(subs) => {
                subs.0.fmt_prec(f, 1)?;
                write!(f, " & ")?;
                subs.1.fmt_prec(f, 2)
            }
            StateFormula::Or(subs) => {
                subs.0.fmt_prec(f, 0)?;
                write!(f, " | ")?;
                subs.1.fmt_prec(f, 1)
            }
            StateFormula::Probability(op) => {
                write!(f, "P")?;
                fmt_operator_suffix(f, op.direction, op.bound)?;
                write!(f, " [{}]", op.path)
            }
            StateFormula::Reward(op) => {
                write!(f, "R")?;
                if let Some(name) = &op.reward_model {
                    write!(f, "{{\"{name}\"}}")?;
                }
                fmt_operator_suffix(f, op.direction, op.bound)?;
                match &op.measure {
                    RewardMeasure::Reachability(target) => write!(f, " [F {target}]"),
                    RewardMeasure::Cumulative(steps) => write!(f, " [C<={steps}]"),
                }
            }
        }
    }
}

impl Display for PathFormula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathFormula::Next(sub) => write!(f, "X {sub}"),
            PathFormula::Until(subs, steps) => {
                subs.0.fmt_prec(f, 2)?;
                write!(f, " U")?;
                fmt_steps(f, *steps)?;
                subs.1.fmt_prec(f, 2)
            }
            PathFormula::Eventually(sub, steps) => {
                write!(f, "F")?;
                fmt_steps(f, *steps)?;
                write!(f, "{sub}")
            }
            PathFormula::Globally(sub, steps) => {
                write!(f, "G")?;
                fmt_steps(f, *steps)?;
                write!(f, "{sub}")
            }
        }
    }
}
