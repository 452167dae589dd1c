use crate::language::{
    errors::SyntaxError,
    span::{line_col, Span},
};
use std::fmt;

pub const CODE_SYNTAX: &str = "prime.syntax";
pub const CODE_UNKNOWN_SYMBOL: &str = "prime.unknownSymbol";
pub const CODE_UNKNOWN_NAMESPACE: &str = "prime.unknownNamespace";
pub const CODE_AMBIGUOUS_IMPORT: &str = "prime.ambiguousImport";
pub const CODE_ARITY_MISMATCH: &str = "prime.arityMismatch";
pub const CODE_IMMUTABLE_ASSIGN: &str = "prime.immutableAssign";
pub const CODE_LOOP_CONTROL: &str = "prime.loopControlOutsideLoop";
pub const CODE_NESTED_FUNCTION: &str = "prime.nestedFunction";
pub const CODE_DUPLICATE_DEFINITION: &str = "prime.duplicateDefinition";
pub const CODE_LIBRARY_STATEMENT: &str = "prime.libraryStatement";
pub const CODE_UNUSED_VARIABLE: &str = "prime.unusedVariable";
pub const CODE_UNREACHABLE: &str = "prime.unreachableCode";
pub const CODE_DIVIDE_BY_ZERO: &str = "prime.divideByZero";
pub const CODE_IMPLICIT_DECLARATION: &str = "prime.implicitDeclaration";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn is_blocking(self) -> bool {
        matches!(self, Severity::Error)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        })
    }
}

/// A compiler message tied to a position in the submitted source.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    pub span: Span,
    pub line: usize,
    pub column: usize,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        code: &'static str,
        message: impl Into<String>,
        span: Span,
        source: &str,
    ) -> Self {
        let (line, column) = line_col(source, span.start);
        Self {
            severity,
            code,
            message: message.into(),
            span,
            line,
            column,
            help: None,
        }
    }

    pub fn error(code: &'static str, message: impl Into<String>, span: Span, source: &str) -> Self {
        Self::new(Severity::Error, code, message, span, source)
    }

    pub fn warning(
        code: &'static str,
        message: impl Into<String>,
        span: Span,
        source: &str,
    ) -> Self {
        Self::new(Severity::Warning, code, message, span, source)
    }

    pub fn info(code: &'static str, message: impl Into<String>, span: Span, source: &str) -> Self {
        Self::new(Severity::Info, code, message, span, source)
    }

    pub fn from_syntax(err: SyntaxError, source: &str) -> Self {
        let mut diagnostic = Self::error(CODE_SYNTAX, err.message, err.span, source);
        diagnostic.help = err.help;
        diagnostic
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity.is_blocking()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({},{}): {}[{}]: {}",
            self.line, self.column, self.severity, self.code, self.message
        )
    }
}

/// Splits compiler output into blocking errors and everything else. Both
/// halves keep the order the compiler produced.
pub fn partition(diagnostics: Vec<Diagnostic>) -> (Vec<Diagnostic>, Vec<Diagnostic>) {
    diagnostics.into_iter().partition(Diagnostic::is_error)
}

/// Renders diagnostics one per line, the way `execute` reports them.
pub fn join(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(severity: Severity, offset: usize, source: &str) -> Diagnostic {
        Diagnostic::new(
            severity,
            CODE_UNKNOWN_SYMBOL,
            format!("at {offset}"),
            Span::new(offset, offset + 1),
            source,
        )
    }

    #[test]
    fn partition_keeps_compiler_order() {
        let source = "abcdefgh";
        let diagnostics = vec![
            at(Severity::Warning, 0, source),
            at(Severity::Error, 2, source),
            at(Severity::Info, 3, source),
            at(Severity::Error, 5, source),
            at(Severity::Warning, 7, source),
        ];
        let (blocking, informational) = partition(diagnostics);
        let offsets = |items: &[Diagnostic]| items.iter().map(|d| d.span.start).collect::<Vec<_>>();
        assert_eq!(offsets(&blocking), vec![2, 5]);
        assert_eq!(offsets(&informational), vec![0, 3, 7]);
    }

    #[test]
    fn renders_position_severity_and_code() {
        let source = "let a = 1;\nb";
        let diagnostic = Diagnostic::error(
            CODE_UNKNOWN_SYMBOL,
            "cannot find `b` in this scope",
            Span::new(11, 12),
            source,
        );
        assert_eq!(
            diagnostic.to_string(),
            "(2,1): error[prime.unknownSymbol]: cannot find `b` in this scope"
        );
    }
}
