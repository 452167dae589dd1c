use thiserror::Error;

/// Backend failures on a unit that had no blocking diagnostics.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("`{function}` uses more than {limit} constants")]
    TooManyConstants { function: String, limit: usize },
    #[error("`{function}` declares more than {limit} locals")]
    TooManyLocals { function: String, limit: usize },
    #[error("`{function}` declares {count} parameters; at most {limit} are supported")]
    TooManyParameters {
        function: String,
        count: usize,
        limit: usize,
    },
    #[error("a call in `{function}` passes {count} arguments; at most {limit} are supported")]
    TooManyArguments {
        function: String,
        count: usize,
        limit: usize,
    },
    #[error("a list literal in `{function}` has {count} elements; at most {limit} are supported")]
    TooManyElements {
        function: String,
        count: usize,
        limit: usize,
    },
    #[error("`{function}` is too large to encode")]
    CodeTooLarge { function: String },
    #[error("the unit has {count} {what}; at most {limit} are supported")]
    TooManyEntries {
        what: &'static str,
        count: usize,
        limit: usize,
    },
    #[error("`{keyword}` outside of a loop in `{function}`")]
    LoopControl {
        function: String,
        keyword: &'static str,
    },
    #[error("the emitted image failed to load")]
    Load(#[from] LoadError),
}

/// Failures decoding, validating or linking a binary image.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("not a Prime image (bad magic)")]
    BadMagic,
    #[error("unsupported image format version {found} (expected {expected})")]
    UnsupportedVersion { found: u16, expected: u16 },
    #[error("malformed image at byte {offset}: {reason}")]
    Malformed { offset: usize, reason: &'static str },
    #[error("{trailing} trailing bytes after the image")]
    TrailingBytes { trailing: usize },
    #[error("expected a {expected} image but `{name}` is a {found}")]
    UnexpectedKind {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("invalid operand in `{function}` at instruction {pc}: {detail}")]
    InvalidOperand {
        function: String,
        pc: usize,
        detail: String,
    },
    #[error("`{function}` is empty or does not end in a return")]
    UnterminatedFunction { function: String },
    #[error("import `{namespace}::{name}` is not provided by any loaded reference")]
    UnresolvedImport { namespace: String, name: String },
    #[error("entry point `{name}` not found")]
    MissingEntryPoint { name: String },
    #[error("entry point `{name}` must take no parameters, found {arity}")]
    InvalidEntryPoint { name: String, arity: u8 },
}
