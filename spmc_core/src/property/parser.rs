use super::{
    Bound, Comparison, Direction, PathFormula, ProbabilityOperator, Property, RewardMeasure,
    RewardOperator, StateFormula,
};
use logos::Logos;
use std::{fmt::Display, ops::Range};
use thiserror::Error;

/// An error in parsing properties.
///
/// Positions are byte offsets in the parsed input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// Input that is not a token of the language.
    #[error("invalid token at position {0}")]
    InvalidToken(usize),
    /// A token that cannot appear at this point.
    #[error("unexpected {found} at position {position}, expected {expected}")]
    Unexpected {
        /// The token found.
        found: String,
        /// What the parser expected.
        expected: &'static str,
        /// Position of the token.
        position: usize,
    },
    /// The input ends too early.
    #[error("unexpected end of input, expected {0}")]
    UnexpectedEnd(&'static str),
    /// A malformed number.
    #[error("invalid number '{number}' at position {position}")]
    InvalidNumber {
        /// The malformed number.
        number: String,
        /// Position of the number.
        position: usize,
    },
    /// A probability bound outside of `[0, 1]`.
    #[error("probability bound {threshold} at position {position} is not in [0, 1]")]
    InvalidBound {
        /// The bound's threshold.
        threshold: f64,
        /// Position of the threshold.
        position: usize,
    },
    /// A strict step bound `<0`, which no path can satisfy.
    #[error("empty step bound '<0' at position {0}")]
    EmptyStepBound(usize),
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"([ \t\r\n\f]+|//[^\n]*)")]
enum Token {
    #[token("=?")]
    Query,
    #[token("<=")]
    LessEq,
    #[token("<")]
    Less,
    #[token(">=")]
    GreaterEq,
    #[token(">")]
    Greater,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("!")]
    Not,
    #[token("&")]
    And,
    #[token("|")]
    Or,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[regex(r#""[^"]*""#, |lex| { let s = lex.slice(); s[1..s.len() - 1].to_owned() })]
    Str(String),
    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", |lex| lex.slice().to_owned())]
    Number(String),
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_owned())]
    Ident(String),
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Query => write!(f, "'=?'"),
            Token::LessEq => write!(f, "'<='"),
            Token::Less => write!(f, "'<'"),
            Token::GreaterEq => write!(f, "'>='"),
            Token::Greater => write!(f, "'>'"),
            Token::LBracket => write!(f, "'['"),
            Token::RBracket => write!(f, "']'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::LBrace => write!(f, "'{{'"),
            Token::RBrace => write!(f, "'}}'"),
            Token::Not => write!(f, "'!'"),
            Token::And => write!(f, "'&'"),
            Token::Or => write!(f, "'|'"),
            Token::Colon => write!(f, "':'"),
            Token::Semicolon => write!(f, "';'"),
            Token::Str(s) => write!(f, "string \"{s}\""),
            Token::Number(n) => write!(f, "number {n}"),
            Token::Ident(id) => write!(f, "'{id}'"),
        }
    }
}

/// Parses a list of properties separated by `;`.
///
/// ```
/// # use spmc_core::parse_properties;
/// let input = r#"Pmax=? [ G !"bad" ]; "reach": Pmin=? [ F "good" ]"#;
/// let properties = parse_properties(input).unwrap();
/// assert_eq!(properties.len(), 2);
/// assert_eq!(properties[1].name.as_deref(), Some("reach"));
/// ```
pub fn parse_properties(input: &str) -> Result<Vec<Property>, ParseError> {
    Parser::new(input)?.properties()
}

struct Parser {
    tokens: Vec<(Token, Range<usize>)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn new(input: &str) -> Result<Self, ParseError> {
        let tokens = Token::lexer(input)
            .spanned()
            .map(|(token, span)| {
                token
                    .map(|token| (token, span.clone()))
                    .map_err(|()| ParseError::InvalidToken(span.start))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            tokens,
            pos: 0,
            end: input.len(),
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|(token, _)| token)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, span)| span.start)
            .unwrap_or(self.end)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(token, _)| token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        match self.peek() {
            Some(token) => ParseError::Unexpected {
                found: token.to_string(),
                expected,
                position: self.position(),
            },
            None => ParseError::UnexpectedEnd(expected),
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_ident(&mut self, ident: &str) -> bool {
        if self.is_ident(ident) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn is_ident(&self, ident: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(id)) if id == ident)
    }

    fn expect(&mut self, token: &Token, expected: &'static str) -> Result<(), ParseError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn properties(&mut self) -> Result<Vec<Property>, ParseError> {
        let mut properties = Vec::new();
        loop {
            while self.eat(&Token::Semicolon) {}
            if self.peek().is_none() {
                return Ok(properties);
            }
            properties.push(self.property()?);
            if self.peek().is_some() && !self.eat(&Token::Semicolon) {
                return Err(self.unexpected("';'"));
            }
        }
    }

    fn property(&mut self) -> Result<Property, ParseError> {
        let name = if let (Some(Token::Str(name)), Some(Token::Colon)) =
            (self.peek(), self.peek_nth(1))
        {
            Some(name.clone())
        } else {
            None
        };
        if name.is_some() {
            self.pos += 2;
        }
        let formula = self.state_formula()?;
        Ok(Property { name, formula })
    }

    fn state_formula(&mut self) -> Result<StateFormula, ParseError> {
        let mut lhs = self.conjunction()?;
        while self.eat(&Token::Or) {
            let rhs = self.conjunction()?;
            lhs = StateFormula::Or(Box::new((lhs, rhs)));
        }
        Ok(lhs)
    }

    fn conjunction(&mut self) -> Result<StateFormula, ParseError> {
        let mut lhs = self.unary()?;
        while self.eat(&Token::And) {
            let rhs = self.unary()?;
            lhs = StateFormula::And(Box::new((lhs, rhs)));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<StateFormula, ParseError> {
        if self.eat(&Token::Not) {
            Ok(StateFormula::Not(Box::new(self.unary()?)))
        } else {
            self.atom()
        }
    }

    fn atom(&mut self) -> Result<StateFormula, ParseError> {
        const EXPECTED: &str = "a state formula";
        let position = self.position();
        match self.next() {
            Some(Token::Str(label)) => Ok(StateFormula::Label(label)),
            Some(Token::LParen) => {
                let formula = self.state_formula()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(formula)
            }
            Some(Token::Ident(id)) => match id.as_str() {
                "true" => Ok(StateFormula::True),
                "false" => Ok(StateFormula::False),
                "P" => self.probability(None),
                "Pmin" => self.probability(Some(Direction::Minimize)),
                "Pmax" => self.probability(Some(Direction::Maximize)),
                "R" => self.reward(None),
                "Rmin" => self.reward(Some(Direction::Minimize)),
                "Rmax" => self.reward(Some(Direction::Maximize)),
                _ => Err(ParseError::Unexpected {
                    found: Token::Ident(id).to_string(),
                    expected: EXPECTED,
                    position,
                }),
            },
            Some(token) => Err(ParseError::Unexpected {
                found: token.to_string(),
                expected: EXPECTED,
                position,
            }),
            None => Err(ParseError::UnexpectedEnd(EXPECTED)),
        }
    }

    fn probability(&mut self, direction: Option<Direction>) -> Result<StateFormula, ParseError> {
        let position = self.position();
        let (direction, bound) = self.operator_suffix(direction)?;
        if let Some(bound) = bound {
            if !(0.0..=1.0).contains(&bound.threshold) {
                return Err(ParseError::InvalidBound {
                    threshold: bound.threshold,
                    position,
                });
            }
        }
        self.expect(&Token::LBracket, "'['")?;
        let path = self.path()?;
        self.expect(&Token::RBracket, "']'")?;
        Ok(StateFormula::Probability(Box::new(ProbabilityOperator {
            direction,
            bound,
            path,
        })))
    }

    fn reward(&mut self, direction: Option<Direction>) -> Result<StateFormula, ParseError> {
        let reward_model = if self.eat(&Token::LBrace) {
            let position = self.position();
            let name = match self.next() {
                Some(Token::Str(name)) => name,
                Some(token) => {
                    return Err(ParseError::Unexpected {
                        found: token.to_string(),
                        expected: "a reward model name",
                        position,
                    });
                }
                None => return Err(ParseError::UnexpectedEnd("a reward model name")),
            };
            self.expect(&Token::RBrace, "'}'")?;
            Some(name)
        } else {
            None
        };
        let (direction, bound) = self.operator_suffix(direction)?;
        self.expect(&Token::LBracket, "'['")?;
        let measure = if self.eat_ident("F") {
            RewardMeasure::Reachability(self.state_formula()?)
        } else if self.eat_ident("C") {
            let position = self.position();
            match self.step_bound()? {
                Some(steps) => RewardMeasure::Cumulative(steps),
                None => {
                    return Err(ParseError::Unexpected {
                        found: self.peek().map(ToString::to_string).unwrap_or_default(),
                        expected: "a step bound",
                        position,
                    });
                }
            }
        } else {
            return Err(self.unexpected("'F' or 'C'"));
        };
        self.expect(&Token::RBracket, "']'")?;
        Ok(StateFormula::Reward(Box::new(RewardOperator {
            reward_model,
            direction,
            bound,
            measure,
        })))
    }

    // Parses the `min`/`max` keyword (unless the direction is already known),
    // and either `=?` or a bound.
    fn operator_suffix(
        &mut self,
        mut direction: Option<Direction>,
    ) -> Result<(Option<Direction>, Option<Bound>), ParseError> {
        if direction.is_none() {
            if self.eat_ident("min") {
                direction = Some(Direction::Minimize);
            } else if self.eat_ident("max") {
                direction = Some(Direction::Maximize);
            }
        }
        let comparison = match self.peek() {
            Some(Token::Query) => {
                self.pos += 1;
                return Ok((direction, None));
            }
            Some(Token::Less) => Comparison::Less,
            Some(Token::LessEq) => Comparison::LessEq,
            Some(Token::Greater) => Comparison::Greater,
            Some(Token::GreaterEq) => Comparison::GreaterEq,
            _ => return Err(self.unexpected("'=?' or a bound")),
        };
        self.pos += 1;
        let threshold = self.number()?;
        Ok((
            direction,
            Some(Bound {
                comparison,
                threshold,
            }),
        ))
    }

    fn path(&mut self) -> Result<PathFormula, ParseError> {
        if self.eat_ident("X") {
            Ok(PathFormula::Next(self.state_formula()?))
        } else if self.eat_ident("F") {
            let steps = self.step_bound()?;
            Ok(PathFormula::Eventually(self.state_formula()?, steps))
        } else if self.eat_ident("G") {
            let steps = self.step_bound()?;
            Ok(PathFormula::Globally(self.state_formula()?, steps))
        } else {
            let lhs = self.state_formula()?;
            if !self.eat_ident("U") {
                return Err(self.unexpected("'U'"));
            }
            let steps = self.step_bound()?;
            let rhs = self.state_formula()?;
            Ok(PathFormula::Until(Box::new((lhs, rhs)), steps))
        }
    }

    fn step_bound(&mut self) -> Result<Option<u32>, ParseError> {
        if self.eat(&Token::LessEq) {
            self.integer().map(Some)
        } else if self.eat(&Token::Less) {
            let position = self.position();
            let steps = self.integer()?;
            steps
                .checked_sub(1)
                .map(Some)
                .ok_or(ParseError::EmptyStepBound(position))
        } else {
            Ok(None)
        }
    }

    fn number(&mut self) -> Result<f64, ParseError> {
        let position = self.position();
        match self.next() {
            Some(Token::Number(number)) => number
                .parse::<f64>()
                .map_err(|_| ParseError::InvalidNumber { number, position }),
            Some(token) => Err(ParseError::Unexpected {
                found: token.to_string(),
                expected: "a number",
                position,
            }),
            None => Err(ParseError::UnexpectedEnd("a number")),
        }
    }

    fn integer(&mut self) -> Result<u32, ParseError> {
        let position = self.position();
        match self.next() {
            Some(Token::Number(number)) => number
                .parse::<u32>()
                .map_err(|_| ParseError::InvalidNumber { number, position }),
            Some(token) => Err(ParseError::Unexpected {
                found: token.to_string(),
                expected: "a step count",
                position,
            }),
            None => Err(ParseError::UnexpectedEnd("a step count")),
        }
    }
}
