//! Invocation Executor: runs the external reasoning tool with a wall-clock
//! timeout and bounded retries, and parses its structured reply.

pub mod executor;
pub mod result;
pub mod transport;

pub use executor::{InvocationExecutor, RetryPolicy};
pub use result::{ResultStatus, StructuredResult, parse_result};
pub use transport::{CliTransport, Transport};
