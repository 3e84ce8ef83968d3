//! Label files.
//!
//! ```text
//! #DECLARATION
//! init bad good
//! #END
//! 0 init
//! 23 bad
//! ```

use crate::{ErrorKind, ExplicitError, index};
use spmc_core::Labeling;

/// Parses a label file for a model with the given number of states.
pub fn parse(input: &str, states: usize) -> Result<Labeling, ExplicitError> {
    let mut labeling = Labeling::new(states);
    let mut lines = input
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    match lines.next() {
        Some((_, "#DECLARATION")) => {}
        Some((line, _)) => return Err(ExplicitError::new(line, ErrorKind::MissingDeclaration)),
        None => return Err(ExplicitError::new(1, ErrorKind::MissingDeclaration)),
    }
    let mut last_line = 1;
    loop {
        let Some((line, text)) = lines.next() else {
            return Err(ExplicitError::new(last_line, ErrorKind::MissingEnd));
        };
        if text == "#END" {
            break;
        }
        for label in text.split_whitespace() {
            labeling
                .add_label(label)
                .map_err(|err| ExplicitError::new(line, err.into()))?;
        }
        last_line = line;
    }

    for (line, text) in lines {
        if text.starts_with('#') {
            continue;
        }
        let mut fields = text.split_whitespace();
        let state = index(&mut fields, line, "state")?;
        if state >= states {
            return Err(ExplicitError::new(line, ErrorKind::StateOutOfRange(state)));
        }
        for label in fields {
            labeling
                .add_label_to_state(label, state)
                .map_err(|err| ExplicitError::new(line, err.into()))?;
        }
    }
    Ok(labeling)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spmc_core::ModelError;

    #[test]
    fn labels() {
        let input = "#DECLARATION\ninit goal\nbad\n#END\n0 init\n1 goal bad\n\n2 bad\n";
        let labeling = parse(input, 3).unwrap();
        assert_eq!(labeling.labels().collect::<Vec<_>>(), vec!["bad", "goal", "init"]);
        assert_eq!(labeling.states_with("bad"), Some([false, true, true].as_slice()));
        assert_eq!(labeling.labels_of(1).as_slice(), &["bad", "goal"]);
    }

    #[test]
    fn undeclared_label() {
        let input = "#DECLARATION\ninit\n#END\n0 init goal\n";
        assert_eq!(
            parse(input, 1).unwrap_err(),
            ExplicitError::new(4, ErrorKind::Model(ModelError::UnknownLabel("goal".to_owned())))
        );
    }

    #[test]
    fn malformed() {
        assert_eq!(
            parse("0 init\n", 1).unwrap_err().kind,
            ErrorKind::MissingDeclaration
        );
        assert_eq!(
            parse("#DECLARATION\ninit\n", 1).unwrap_err(),
            ExplicitError::new(2, ErrorKind::MissingEnd)
        );
        assert_eq!(
            parse("#DECLARATION\ninit\n#END\n3 init\n", 2).unwrap_err(),
            ExplicitError::new(4, ErrorKind::StateOutOfRange(3))
        );
        assert!(matches!(
            parse("#DECLARATION\ninit init\n#END\n", 1).unwrap_err().kind,
            ErrorKind::Model(ModelError::DuplicateLabel(_))
        ));
    }
}
