use crate::compilation::compile_library;
use crate::references::error::FetchError;
use std::{
    collections::HashMap,
    future::Future,
    io,
    path::{Path, PathBuf},
};

/// Prefix of locations served from the bundled standard library.
pub const STD_PREFIX: &str = "std/";
pub const LIBRARY_EXTENSION: &str = "plib";

/// Retrieves library image bytes by location name.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, location: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// Serves images held in memory, keyed by location.
#[derive(Clone, Debug, Default)]
pub struct MemoryFetcher {
    images: HashMap<String, Vec<u8>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, location: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(location, bytes);
        self
    }

    pub fn insert(&mut self, location: impl Into<String>, bytes: Vec<u8>) {
        self.images.insert(location.into(), bytes);
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch(&self, location: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send {
        let result = self
            .images
            .get(location)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                location: location.to_string(),
            });
        async move { result }
    }
}

/// Reads images from files below a root directory.
#[derive(Clone, Debug)]
pub struct DirectoryFetcher {
    root: PathBuf,
}

impl DirectoryFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, location: &str) -> PathBuf {
        self.root.join(location)
    }
}

impl Fetcher for DirectoryFetcher {
    fn fetch(&self, location: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send {
        read_file(location.to_string(), self.resolve(location))
    }
}

async fn read_file(location: String, path: PathBuf) -> Result<Vec<u8>, FetchError> {
    tracing::trace!(target: "references", %location, path = %path.display(), "reading image");
    tokio::fs::read(&path).await.map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            FetchError::NotFound { location }
        } else {
            FetchError::Io { location, source }
        }
    })
}

/// Builds the bundled standard library on demand. Locations look like
/// `std/math.plib`.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdlibFetcher;

impl StdlibFetcher {
    pub const NAMESPACES: [&'static str; 3] = ["math", "text", "list"];

    pub fn source(namespace: &str) -> Option<&'static str> {
        match namespace {
            "math" => Some(include_str!("stdlib/math.prime")),
            "text" => Some(include_str!("stdlib/text.prime")),
            "list" => Some(include_str!("stdlib/list.prime")),
            _ => None,
        }
    }

    /// Default reference locations: every bundled namespace, in order.
    pub fn locations() -> Vec<String> {
        Self::NAMESPACES
            .iter()
            .map(|namespace| format!("{STD_PREFIX}{namespace}.{LIBRARY_EXTENSION}"))
            .collect()
    }

    fn build(location: &str) -> Result<Vec<u8>, FetchError> {
        let not_found = || FetchError::NotFound {
            location: location.to_string(),
        };
        let namespace = location
            .strip_prefix(STD_PREFIX)
            .and_then(|rest| rest.strip_suffix(LIBRARY_EXTENSION))
            .and_then(|rest| rest.strip_suffix('.'))
            .ok_or_else(not_found)?;
        let source = Self::source(namespace).ok_or_else(not_found)?;
        compile_library(namespace, source).map_err(|source| FetchError::Build {
            location: location.to_string(),
            source,
        })
    }
}

impl Fetcher for StdlibFetcher {
    fn fetch(&self, location: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send {
        let result = Self::build(location);
        async move { result }
    }
}

/// The fetcher the command line uses: `std/` locations come from the
/// bundled library, everything else from the optional base directory.
#[derive(Clone, Debug, Default)]
pub struct EngineFetcher {
    directory: Option<DirectoryFetcher>,
}

impl EngineFetcher {
    pub fn new(base: Option<PathBuf>) -> Self {
        Self {
            directory: base.map(DirectoryFetcher::new),
        }
    }
}

enum Route {
    Built(Result<Vec<u8>, FetchError>),
    File(PathBuf),
    Missing,
}

impl Fetcher for EngineFetcher {
    fn fetch(&self, location: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send {
        let route = if location.starts_with(STD_PREFIX) {
            Route::Built(StdlibFetcher::build(location))
        } else {
            match &self.directory {
                Some(directory) => Route::File(directory.resolve(location)),
                None => Route::Missing,
            }
        };
        let location = location.to_string();
        async move {
            match route {
                Route::Built(result) => result,
                Route::File(path) => read_file(location, path).await,
                Route::Missing => Err(FetchError::Unavailable {
                    location,
                    reason: "no reference directory is configured".into(),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stdlib_builds_every_bundled_namespace() {
        for location in StdlibFetcher::locations() {
            let bytes = StdlibFetcher.fetch(&location).await.expect("builds");
            assert!(bytes.starts_with(b"PRIM"));
        }
    }

    #[tokio::test]
    async fn unknown_locations_are_not_found() {
        let err = StdlibFetcher.fetch("std/net.plib").await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound { location } if location == "std/net.plib"));
        let err = MemoryFetcher::new().fetch("a.plib").await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound { .. }));
    }

    #[tokio::test]
    async fn engine_fetcher_without_directory_reports_it() {
        let err = EngineFetcher::new(None).fetch("extra.plib").await.unwrap_err();
        assert!(matches!(err, FetchError::Unavailable { .. }));
    }
}
