pub mod binder;
pub mod bound;
pub mod chain;
pub mod diagnostic;
pub mod library;
pub mod symbols;
pub mod unit;

pub use chain::{CompilationChain, CompileFailure, Compiled};
pub use diagnostic::{partition, Diagnostic, Severity};
pub use library::{compile_library, LibraryError};
pub use unit::{CompilationUnit, UnitKind};
