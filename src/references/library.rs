use crate::emit::{image::ImageKind, loader, LoadedModule};
use crate::references::error::ReferenceError;
use std::{fmt, sync::Arc};

/// A function a library makes available to submissions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Export {
    pub name: String,
    pub arity: usize,
    pub index: u16,
}

/// A loaded library image.
pub struct Library {
    location: String,
    namespace: String,
    module: Arc<LoadedModule>,
    exports: Vec<Export>,
}

impl Library {
    pub fn from_bytes(location: &str, bytes: &[u8]) -> Result<Self, ReferenceError> {
        let malformed = |source| ReferenceError::Malformed {
            location: location.to_string(),
            source,
        };
        let image = loader::decode(bytes).map_err(malformed)?;
        if image.kind != ImageKind::Library {
            return Err(ReferenceError::UnexpectedKind {
                location: location.to_string(),
            });
        }
        let module = loader::load_module(image, &ReferenceSet::empty()).map_err(malformed)?;
        let exports = module
            .functions()
            .iter()
            .enumerate()
            .filter_map(|(index, function)| {
                Some(Export {
                    name: function.short_name().to_string(),
                    arity: function.arity as usize,
                    index: u16::try_from(index).ok()?,
                })
            })
            .collect();
        Ok(Self {
            location: location.to_string(),
            namespace: module.name().to_string(),
            module,
            exports,
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn module(&self) -> &Arc<LoadedModule> {
        &self.module
    }

    pub fn exports(&self) -> &[Export] {
        &self.exports
    }

    pub fn export(&self, name: &str) -> Option<&Export> {
        self.exports.iter().find(|export| export.name == name)
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("location", &self.location)
            .field("namespace", &self.namespace)
            .field("exports", &self.exports.len())
            .finish()
    }
}

/// The ordered libraries every submission compiles against. Cheap to clone.
#[derive(Clone, Debug)]
pub struct ReferenceSet {
    libraries: Arc<[Arc<Library>]>,
}

impl ReferenceSet {
    pub fn new(libraries: Vec<Arc<Library>>) -> Self {
        Self {
            libraries: libraries.into(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn library(&self, namespace: &str) -> Option<&Arc<Library>> {
        self.libraries
            .iter()
            .find(|library| library.namespace == namespace)
    }

    pub fn libraries(&self) -> &[Arc<Library>] {
        &self.libraries
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    pub fn same_as(&self, other: &ReferenceSet) -> bool {
        Arc::ptr_eq(&self.libraries, &other.libraries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compilation::compile_library;

    #[test]
    fn exports_use_short_names() {
        let bytes = compile_library("geo", "fn area(w, h) { w * h } fn unit() { 1 }")
            .expect("library compiles");
        let library = Library::from_bytes("geo.plib", &bytes).expect("library loads");
        assert_eq!(library.namespace(), "geo");
        assert_eq!(
            library.export("area"),
            Some(&Export {
                name: "area".into(),
                arity: 2,
                index: 0
            })
        );
        assert!(library.export("geo.area").is_none());
    }

    #[test]
    fn garbage_is_malformed() {
        let err = Library::from_bytes("junk.plib", b"not an image").unwrap_err();
        assert!(matches!(err, ReferenceError::Malformed { .. }));
    }
}
