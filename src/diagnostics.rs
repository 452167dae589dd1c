use crate::{
    compilation::diagnostic::{self as engine, Diagnostic, Severity},
    runtime::{error::render_chain, RuntimeFault},
};
use miette::{LabeledSpan, NamedSource, Report, SourceCode, SourceSpan};
use std::fmt::Display;
use thiserror::Error;

/// An engine diagnostic attached to its submission source, for fancy
/// rendering.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SourceDiagnostic {
    src: NamedSource<String>,
    span: SourceSpan,
    code: &'static str,
    severity: miette::Severity,
    help: Option<String>,
    message: String,
    label: &'static str,
}

impl SourceDiagnostic {
    pub fn from_diagnostic(src: NamedSource<String>, diagnostic: &Diagnostic) -> Self {
        Self {
            src,
            span: (diagnostic.span.start, diagnostic.span.len()).into(),
            code: diagnostic.code,
            severity: match diagnostic.severity {
                Severity::Error => miette::Severity::Error,
                Severity::Warning => miette::Severity::Warning,
                Severity::Info => miette::Severity::Advice,
            },
            help: diagnostic.help.clone(),
            message: diagnostic.message.clone(),
            label: label_for(diagnostic.code),
        }
    }
}

impl miette::Diagnostic for SourceDiagnostic {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        Some(Box::new(self.code))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(self.severity)
    }

    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        self.help
            .as_ref()
            .map(|help| Box::new(help) as Box<dyn Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        Some(&self.src)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let label = LabeledSpan::new_with_span(Some(self.label.to_string()), self.span);
        Some(Box::new(std::iter::once(label)))
    }
}

fn label_for(code: &str) -> &'static str {
    match code {
        engine::CODE_SYNTAX => "here",
        engine::CODE_UNKNOWN_SYMBOL => "not found",
        engine::CODE_UNKNOWN_NAMESPACE => "unknown namespace",
        engine::CODE_AMBIGUOUS_IMPORT => "ambiguous",
        engine::CODE_ARITY_MISMATCH => "wrong number of arguments",
        engine::CODE_IMMUTABLE_ASSIGN => "cannot assign twice",
        engine::CODE_LOOP_CONTROL => "outside of a loop",
        engine::CODE_NESTED_FUNCTION => "nested function",
        engine::CODE_DUPLICATE_DEFINITION => "defined again here",
        engine::CODE_LIBRARY_STATEMENT => "not a function",
        engine::CODE_UNUSED_VARIABLE => "never read",
        engine::CODE_UNREACHABLE => "unreachable",
        engine::CODE_DIVIDE_BY_ZERO => "divides by zero",
        engine::CODE_IMPLICIT_DECLARATION => "declared here",
        _ => "here",
    }
}

pub fn to_reports(name: &str, source: &str, diagnostics: &[Diagnostic]) -> Vec<Report> {
    let src = NamedSource::new(name, source.to_string());
    diagnostics
        .iter()
        .map(|diagnostic| Report::new(SourceDiagnostic::from_diagnostic(src.clone(), diagnostic)))
        .collect()
}

pub fn emit_diagnostics(name: &str, source: &str, diagnostics: &[Diagnostic]) {
    for report in to_reports(name, source, diagnostics) {
        eprintln!("{:?}", report);
    }
}

pub fn report_runtime_fault(fault: &RuntimeFault) {
    eprintln!("{}", fault.render());
}

pub fn report_error(error: &dyn std::error::Error) {
    eprintln!("error: {}", render_chain(error));
}
