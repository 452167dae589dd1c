use crate::language::{lexer::LexError, span::Span};
use thiserror::Error;

/// Stage that rejected the fragment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    /// The scanner could not form a token.
    Lexical,
    Grammar,
    /// The fragment nests deeper than the parser accepts.
    TooDeep,
}

#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub message: String,
    pub span: Span,
    pub help: Option<String>,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: SyntaxErrorKind::Grammar,
            message: message.into(),
            span,
            help: None,
        }
    }

    pub fn too_deep(limit: usize, span: Span) -> Self {
        Self {
            kind: SyntaxErrorKind::TooDeep,
            message: "Expression nested too deeply".to_string(),
            span,
            help: Some(format!(
                "nesting is limited to {limit} levels; bind inner parts with `let` first"
            )),
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl From<LexError> for SyntaxError {
    fn from(err: LexError) -> Self {
        Self {
            kind: SyntaxErrorKind::Lexical,
            message: err.message,
            span: err.span,
            help: None,
        }
    }
}

/// Every error found in one fragment, in source order.
#[derive(Clone, Debug, Error)]
#[error("fragment has {} syntax error(s)", .errors.len())]
pub struct SyntaxErrors {
    pub errors: Vec<SyntaxError>,
}

impl SyntaxErrors {
    pub fn new(errors: Vec<SyntaxError>) -> Self {
        Self { errors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexer_errors_keep_their_position() {
        let err = SyntaxError::from(LexError {
            message: "Unterminated string literal".into(),
            span: Span::new(4, 9),
        });
        assert_eq!(err.kind, SyntaxErrorKind::Lexical);
        assert_eq!(err.span, Span::new(4, 9));
        assert_eq!(err.to_string(), "Unterminated string literal");
    }

    #[test]
    fn nesting_errors_explain_the_limit() {
        let err = SyntaxError::too_deep(200, Span::new(0, 1));
        assert_eq!(err.kind, SyntaxErrorKind::TooDeep);
        assert!(err.help.as_deref().is_some_and(|help| help.contains("200 levels")));
    }
}
