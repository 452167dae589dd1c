use crate::{
    compilation::{
        binder::{bind, BindContext, ENTRY_NAME},
        bound::BoundProgram,
        diagnostic::Diagnostic,
        symbols::SubmissionSymbols,
    },
    language::{ast::Submission, parser::parse_submission},
    references::ReferenceSet,
};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnitKind {
    /// The `ordinal`-th accepted submission of a session, counting from 1.
    Script { ordinal: u32 },
    Library { namespace: String },
}

impl UnitKind {
    /// Prefix of every qualified function name in the unit.
    pub fn qualifier(&self) -> String {
        match self {
            UnitKind::Script { ordinal } => format!("Submission#{ordinal}"),
            UnitKind::Library { namespace } => namespace.clone(),
        }
    }

    /// Index of the submission-state slot this unit's entry routine fills.
    pub fn record_index(&self) -> Option<usize> {
        match self {
            UnitKind::Script { ordinal } => (*ordinal as usize).checked_sub(1),
            UnitKind::Library { .. } => None,
        }
    }
}

/// The accumulated program after one more fragment. Never mutated once
/// built; the next submission links to it through `previous`.
#[derive(Debug)]
pub struct CompilationUnit {
    name: String,
    kind: UnitKind,
    source: String,
    syntax: Submission,
    references: ReferenceSet,
    implicit_imports: Arc<[String]>,
    previous: Option<Arc<CompilationUnit>>,
    symbols: SubmissionSymbols,
    program: BoundProgram,
    diagnostics: Vec<Diagnostic>,
}

impl CompilationUnit {
    /// Parses and binds `source`. Syntax errors stop here; every other
    /// diagnostic is kept on the unit for the caller to gate on.
    pub fn create(
        kind: UnitKind,
        source: &str,
        references: ReferenceSet,
        implicit_imports: Arc<[String]>,
        previous: Option<Arc<CompilationUnit>>,
    ) -> Result<Self, Vec<Diagnostic>> {
        let syntax = parse_submission(source).map_err(|errors| {
            errors
                .errors
                .into_iter()
                .map(|err| Diagnostic::from_syntax(err, source))
                .collect::<Vec<_>>()
        })?;

        let output = bind(
            BindContext {
                source,
                kind: &kind,
                previous: previous.as_deref(),
                references: &references,
                implicit_imports: &implicit_imports,
            },
            &syntax,
        );

        Ok(Self {
            name: kind.qualifier(),
            kind,
            source: source.to_string(),
            syntax,
            references,
            implicit_imports,
            previous,
            symbols: output.symbols,
            program: output.program,
            diagnostics: output.diagnostics,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &UnitKind {
        &self.kind
    }

    pub fn ordinal(&self) -> Option<u32> {
        match self.kind {
            UnitKind::Script { ordinal } => Some(ordinal),
            UnitKind::Library { .. } => None,
        }
    }

    pub fn record_index(&self) -> Option<usize> {
        self.kind.record_index()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn syntax(&self) -> &Submission {
        &self.syntax
    }

    pub fn references(&self) -> &ReferenceSet {
        &self.references
    }

    pub fn implicit_imports(&self) -> &[String] {
        &self.implicit_imports
    }

    pub fn previous(&self) -> Option<&CompilationUnit> {
        self.previous.as_deref()
    }

    pub fn symbols(&self) -> &SubmissionSymbols {
        &self.symbols
    }

    pub fn program(&self) -> &BoundProgram {
        &self.program
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Fully qualified name of the synthesized entry routine.
    pub fn entry_point_name(&self) -> Option<String> {
        match self.kind {
            UnitKind::Script { .. } => Some(format!("{}.{ENTRY_NAME}", self.name)),
            UnitKind::Library { .. } => None,
        }
    }

    /// Number of units in the chain ending at this one.
    pub fn depth(&self) -> usize {
        std::iter::successors(Some(self), |unit| unit.previous()).count()
    }
}

impl Drop for CompilationUnit {
    // Unlink iteratively so a long chain does not recurse once per unit.
    fn drop(&mut self) {
        let mut previous = self.previous.take();
        while let Some(unit) = previous {
            match Arc::try_unwrap(unit) {
                Ok(mut unit) => previous = unit.previous.take(),
                Err(_) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compilation::diagnostic::CODE_SYNTAX;

    fn script(ordinal: u32, source: &str, previous: Option<Arc<CompilationUnit>>) -> CompilationUnit {
        CompilationUnit::create(
            UnitKind::Script { ordinal },
            source,
            ReferenceSet::empty(),
            Arc::from(Vec::new()),
            previous,
        )
        .expect("parse")
    }

    #[test]
    fn resolves_names_through_previous_units() {
        let first = Arc::new(script(1, "let x = 5;", None));
        let second = script(2, "x + 1", Some(first.clone()));
        assert!(!second.has_errors(), "{:?}", second.diagnostics());
        assert_eq!(second.depth(), 2);
        assert_eq!(second.entry_point_name().as_deref(), Some("Submission#2.<Main>"));
        assert_eq!(second.previous().map(CompilationUnit::name), Some("Submission#1"));
    }

    #[test]
    fn syntax_errors_are_diagnostics() {
        let errors = CompilationUnit::create(
            UnitKind::Script { ordinal: 1 },
            "let = ;",
            ReferenceSet::empty(),
            Arc::from(Vec::new()),
            None,
        )
        .unwrap_err();
        assert_eq!(errors[0].code, CODE_SYNTAX);
        assert_eq!(errors[0].to_string(), "(1,5): error[prime.syntax]: Expected binding name");
    }
}
