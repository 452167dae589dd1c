pub mod cancel;
pub mod error;
pub mod intrinsics;
pub mod invoker;
pub mod state;
pub mod value;
pub mod vm;

pub use cancel::CancelToken;
pub use error::{RuntimeError, RuntimeFault, TraceFrame};
pub use invoker::{invoke, Invocation, InvokeOptions};
pub use state::SubmissionState;
pub use value::{List, Value};
