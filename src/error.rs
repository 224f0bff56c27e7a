use std::fmt;
use thiserror::Error;

/// Details of a failed compilation: what went wrong and, when known, where.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    /// Byte offset of the offending token in the source text.
    pub position: Option<usize>,
    pub token: Option<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        ParseError {
            message: message.into(),
            position: None,
            token: None,
        }
    }

    pub fn at(message: impl Into<String>, position: usize, token: impl Into<String>) -> Self {
        ParseError {
            message: message.into(),
            position: Some(position),
            token: Some(token.into()),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        match (&self.token, self.position) {
            (Some(token), Some(pos)) => write!(f, " ('{}' at position {})", token, pos),
            (None, Some(pos)) => write!(f, " (at position {})", pos),
            _ => Ok(()),
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("no finite value of f(x) on [{x_min}, {x_max}]")]
    EmptyRange { x_min: f64, x_max: f64 },
}

impl CalcError {
    pub fn validation(message: impl Into<String>) -> Self {
        CalcError::Validation(message.into())
    }
}

pub type CalcResult<T> = Result<T, CalcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_mentions_token_and_position() {
        let err = ParseError::at("unknown identifier", 4, "foo");
        assert_eq!(err.to_string(), "unknown identifier ('foo' at position 4)");
    }

    #[test]
    fn parse_error_converts_into_calc_error() {
        let err: CalcError = ParseError::new("empty expression").into();
        assert_eq!(err.to_string(), "parse error: empty expression");
    }
}
