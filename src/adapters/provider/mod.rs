//! Connection provider adapters.

mod in_memory;

pub use in_memory::{HandleOp, InMemoryConnectionProvider, OutboundCall};
