use crate::{
    compilation::{
        diagnostic::{join, Diagnostic},
        unit::{CompilationUnit, UnitKind},
    },
    emit::{codegen::generate, writer::write_image, EmitError},
    references::ReferenceSet,
    runtime::intrinsics::Intrinsic,
};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("`{namespace}` cannot name a library")]
    InvalidNamespace { namespace: String },
    #[error("library `{namespace}` does not compile:\n{}", join(.diagnostics))]
    Rejected {
        namespace: String,
        diagnostics: Vec<Diagnostic>,
    },
    #[error("library `{namespace}` could not be emitted")]
    Emit {
        namespace: String,
        #[source]
        source: EmitError,
    },
}

/// Builds the binary image of a library from a source file of `fn`
/// declarations. Libraries see only their own functions and the intrinsics.
pub fn compile_library(namespace: &str, source: &str) -> Result<Vec<u8>, LibraryError> {
    if !is_valid_namespace(namespace) {
        return Err(LibraryError::InvalidNamespace {
            namespace: namespace.to_string(),
        });
    }
    let rejected = |diagnostics| LibraryError::Rejected {
        namespace: namespace.to_string(),
        diagnostics,
    };
    let unit = CompilationUnit::create(
        UnitKind::Library {
            namespace: namespace.to_string(),
        },
        source,
        ReferenceSet::empty(),
        Arc::from(Vec::new()),
        None,
    )
    .map_err(rejected)?;
    if unit.has_errors() {
        return Err(rejected(unit.diagnostics().to_vec()));
    }

    let image = generate(&unit).map_err(|source| LibraryError::Emit {
        namespace: namespace.to_string(),
        source,
    })?;
    let bytes = write_image(&image);
    tracing::debug!(
        target: "emit",
        namespace,
        functions = image.functions.len(),
        bytes = bytes.len(),
        "library image written"
    );
    Ok(bytes)
}

/// A plain identifier other than the intrinsic namespace.
fn is_valid_namespace(namespace: &str) -> bool {
    let mut chars = namespace.chars();
    let head = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    head
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && namespace != Intrinsic::NAMESPACE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::{image::ImageKind, loader::decode};

    #[test]
    fn library_image_lists_its_functions() {
        let bytes = compile_library("demo", "fn one() { 1 } fn inc(x) { x + one() }").expect("compile");
        let image = decode(&bytes).expect("decode");
        assert_eq!(image.kind, ImageKind::Library);
        assert_eq!(image.name, "demo");
        assert!(image.entry.is_none());
        let names: Vec<_> = image.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["demo.one", "demo.inc"]);
    }

    #[test]
    fn statements_are_rejected() {
        let err = compile_library("demo", "let x = 1;").unwrap_err();
        assert!(err.to_string().contains("error[prime.libraryStatement]"));
    }

    #[test]
    fn namespace_must_be_an_identifier() {
        for namespace in ["core", "", "9lives", "a-b"] {
            assert!(matches!(
                compile_library(namespace, "fn one() { 1 }"),
                Err(LibraryError::InvalidNamespace { .. })
            ));
        }
        assert!(compile_library("_util2", "fn one() { 1 }").is_ok());
    }
}
