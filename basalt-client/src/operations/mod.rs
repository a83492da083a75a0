//! Write operations and the chunked, concurrent batch executor.

pub mod batch;
pub mod operation;

pub use batch::{BatchRequest, execute, parse_chunk_response};
pub use operation::{BatchOutcome, Operation};
