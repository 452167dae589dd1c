pub mod compilation;
pub mod config;
pub mod diagnostics;
pub mod emit;
pub mod language;
pub mod logging;
pub mod references;
pub mod repl;
pub mod runtime;
pub mod session;

pub use config::EngineConfig;
pub use references::{Fetcher, ReferenceCache, ReferenceSet};
pub use session::{Outcome, ScriptSession, SessionOptions, SubmissionReport};
