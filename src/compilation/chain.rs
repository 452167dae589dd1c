use crate::{
    compilation::{
        diagnostic::{partition, Diagnostic},
        unit::{CompilationUnit, UnitKind},
    },
    emit::{emit_and_load, EmitError, ExecutableFragment},
    references::ReferenceSet,
};
use std::sync::Arc;

/// A fragment that compiled and loaded.
#[derive(Debug)]
pub struct Compiled {
    pub unit: Arc<CompilationUnit>,
    pub fragment: ExecutableFragment,
    /// Warnings and infos, in source order.
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug)]
pub enum CompileFailure {
    /// At least one error-severity diagnostic. Carries every diagnostic of the
    /// attempt in source order.
    Rejected(Vec<Diagnostic>),
    /// The backend failed on a fragment with no blocking diagnostics.
    Emit {
        error: EmitError,
        diagnostics: Vec<Diagnostic>,
    },
}

impl CompileFailure {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CompileFailure::Rejected(diagnostics) => diagnostics,
            CompileFailure::Emit { diagnostics, .. } => diagnostics,
        }
    }
}

/// The current head of the chain plus the submission counter. Only a full
/// compile-and-load success moves either of them.
#[derive(Debug)]
pub struct CompilationChain {
    current: Option<Arc<CompilationUnit>>,
    submission_index: u32,
    implicit_imports: Arc<[String]>,
}

impl CompilationChain {
    pub fn new(implicit_imports: Vec<String>) -> Self {
        Self {
            current: None,
            submission_index: 0,
            implicit_imports: implicit_imports.into(),
        }
    }

    pub fn current(&self) -> Option<&Arc<CompilationUnit>> {
        self.current.as_ref()
    }

    pub fn submission_index(&self) -> u32 {
        self.submission_index
    }

    pub fn implicit_imports(&self) -> &[String] {
        &self.implicit_imports
    }

    pub fn compile(
        &mut self,
        source: &str,
        references: &ReferenceSet,
    ) -> Result<Compiled, CompileFailure> {
        let ordinal = self.submission_index + 1;
        let unit = CompilationUnit::create(
            UnitKind::Script { ordinal },
            source,
            references.clone(),
            self.implicit_imports.clone(),
            self.current.clone(),
        )
        .map_err(CompileFailure::Rejected)?;

        let (blocking, informational) = partition(unit.diagnostics().to_vec());
        if !blocking.is_empty() {
            tracing::debug!(
                target: "compile",
                unit = unit.name(),
                errors = blocking.len(),
                warnings = informational.len(),
                "submission rejected"
            );
            return Err(CompileFailure::Rejected(unit.diagnostics().to_vec()));
        }

        let fragment = emit_and_load(&unit).map_err(|error| {
            tracing::warn!(target: "emit", unit = unit.name(), %error, "emit failed");
            CompileFailure::Emit {
                error,
                diagnostics: informational.clone(),
            }
        })?;

        let unit = Arc::new(unit);
        self.current = Some(unit.clone());
        self.submission_index = ordinal;
        tracing::debug!(
            target: "compile",
            unit = unit.name(),
            submission_index = ordinal,
            diagnostics = informational.len(),
            "submission accepted"
        );
        Ok(Compiled {
            unit,
            fragment,
            diagnostics: informational,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_compile_leaves_chain_untouched() {
        let mut chain = CompilationChain::new(Vec::new());
        let references = ReferenceSet::empty();
        chain.compile("let x = 1;", &references).expect("first");
        let head = chain.current().cloned().expect("head");

        let failure = chain.compile("let y = x +;", &references).unwrap_err();
        assert!(matches!(failure, CompileFailure::Rejected(_)));
        assert_eq!(chain.submission_index(), 1);
        assert!(Arc::ptr_eq(chain.current().expect("head"), &head));

        let compiled = chain.compile("x", &references).expect("third");
        assert_eq!(compiled.unit.name(), "Submission#2");
        assert_eq!(chain.submission_index(), 2);
    }

    #[test]
    fn warnings_do_not_block() {
        let mut chain = CompilationChain::new(Vec::new());
        let compiled = chain
            .compile("{ let unused = 1; } 1 / 0", &ReferenceSet::empty())
            .expect("compile");
        assert_eq!(compiled.diagnostics.len(), 2);
        assert_eq!(chain.submission_index(), 1);
    }

    #[test]
    fn emit_failure_rolls_back() {
        let mut chain = CompilationChain::new(Vec::new());
        let args = vec!["1"; 300].join(", ");
        let failure = chain
            .compile(&format!("print({args});"), &ReferenceSet::empty())
            .unwrap_err();
        assert!(matches!(failure, CompileFailure::Emit { .. }));
        assert_eq!(chain.submission_index(), 0);
        assert!(chain.current().is_none());
    }
}
