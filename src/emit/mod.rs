pub mod codegen;
pub mod error;
pub mod image;
pub mod loader;
pub mod module;
pub mod writer;

pub use error::{EmitError, LoadError};
pub use module::{Callable, EntryPoint, ExecutableFragment, LoadedModule};

use crate::compilation::unit::CompilationUnit;

/// Serializes `unit` to an in-memory image and loads it back against the
/// unit's references, yielding the fragment and its typed entry point.
pub fn emit_and_load(unit: &CompilationUnit) -> Result<ExecutableFragment, EmitError> {
    let image = codegen::generate(unit)?;
    let bytes = writer::write_image(&image);
    let entry_name = unit
        .entry_point_name()
        .ok_or_else(|| LoadError::MissingEntryPoint {
            name: format!("{}.{}", unit.name(), crate::compilation::binder::ENTRY_NAME),
        })?;

    let decoded = loader::decode(&bytes)?;
    let module = loader::load_module(decoded, unit.references())?;
    let entry = loader::resolve_entry(&module, &entry_name)?;
    tracing::debug!(
        target: "emit",
        unit = unit.name(),
        bytes = bytes.len(),
        functions = module.functions().len(),
        imports = module.imports().len(),
        entry = entry.name(),
        "fragment loaded"
    );
    Ok(ExecutableFragment {
        module,
        entry,
        image_len: bytes.len(),
    })
}
