//! Library references: fetching images, loading them, and caching the set
//! for the life of the process.

pub mod cache;
pub mod error;
pub mod fetcher;
pub mod library;

pub use cache::ReferenceCache;
pub use error::{FetchError, ReferenceError};
pub use fetcher::{DirectoryFetcher, EngineFetcher, Fetcher, MemoryFetcher, StdlibFetcher};
pub use library::{Export, Library, ReferenceSet};
