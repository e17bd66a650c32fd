mod memory;

pub use memory::{InMemoryBackend, MemoryExecutionResult, Record};
