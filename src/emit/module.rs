use crate::emit::image::{FunctionProto, ImageKind};
use std::{fmt, sync::Arc};

/// A validated, linked image. Imports are already resolved to functions of
/// the referenced library modules.
#[derive(Debug)]
pub struct LoadedModule {
    pub(crate) name: String,
    pub(crate) kind: ImageKind,
    pub(crate) ordinal: u32,
    pub(crate) functions: Vec<FunctionProto>,
    pub(crate) imports: Vec<Callable>,
    pub(crate) slot_names: Arc<[String]>,
}

impl LoadedModule {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    pub fn functions(&self) -> &[FunctionProto] {
        &self.functions
    }

    pub fn imports(&self) -> &[Callable] {
        &self.imports
    }

    pub fn slot_names(&self) -> &Arc<[String]> {
        &self.slot_names
    }

    /// Submission-state slot filled by this module's entry routine.
    pub fn record_index(&self) -> Option<usize> {
        match self.kind {
            ImageKind::Submission => (self.ordinal as usize).checked_sub(1),
            ImageKind::Library => None,
        }
    }

    pub fn find(&self, name: &str) -> Option<u16> {
        self.functions
            .iter()
            .position(|function| function.name == name)
            .and_then(|index| u16::try_from(index).ok())
    }
}

/// A function of a loaded module. Only the loader creates these, after
/// checking the index.
#[derive(Clone)]
pub struct Callable {
    module: Arc<LoadedModule>,
    index: u16,
}

impl Callable {
    pub(crate) fn new(module: Arc<LoadedModule>, index: u16) -> Self {
        Self { module, index }
    }

    pub fn module(&self) -> &Arc<LoadedModule> {
        &self.module
    }

    pub fn proto(&self) -> &FunctionProto {
        &self.module.functions[self.index as usize]
    }

    pub fn name(&self) -> &str {
        &self.proto().name
    }

    pub fn arity(&self) -> usize {
        self.proto().arity as usize
    }

    pub fn same_as(&self, other: &Callable) -> bool {
        Arc::ptr_eq(&self.module, &other.module) && self.index == other.index
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable({})", self.name())
    }
}

/// The synthesized routine that runs a submission's top-level code.
#[derive(Clone, Debug)]
pub struct EntryPoint {
    callable: Callable,
}

impl EntryPoint {
    pub(crate) fn new(callable: Callable) -> Self {
        Self { callable }
    }

    pub fn callable(&self) -> &Callable {
        &self.callable
    }

    pub fn name(&self) -> &str {
        self.callable.name()
    }

    /// Submission-state slot the routine initialises.
    pub fn record_index(&self) -> Option<usize> {
        self.callable.module().record_index()
    }
}

/// The runnable form of an accepted submission.
#[derive(Clone, Debug)]
pub struct ExecutableFragment {
    pub(crate) module: Arc<LoadedModule>,
    pub(crate) entry: EntryPoint,
    pub(crate) image_len: usize,
}

impl ExecutableFragment {
    pub fn module(&self) -> &Arc<LoadedModule> {
        &self.module
    }

    pub fn entry(&self) -> &EntryPoint {
        &self.entry
    }

    /// Size of the binary image the fragment was loaded from.
    pub fn image_len(&self) -> usize {
        self.image_len
    }
}
