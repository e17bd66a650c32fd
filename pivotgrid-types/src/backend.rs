use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::data_view::DataView;
use crate::definition::ExecutionDefinition;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid execution definition: {0}")]
    InvalidDefinition(String),
    #[error("Window at {offset:?} is outside of the result of size {total:?}")]
    OutOfRange { offset: [usize; 2], total: [usize; 2] },
    #[error("{0}")]
    Other(String),
}

/// Runs execution definitions.
pub trait Executor: Send + Sync {
    fn execute(
        &self,
        definition: ExecutionDefinition,
    ) -> BoxFuture<'static, Result<Arc<dyn ExecutionResult>, BackendError>>;
}

/// A computed result that can be read window by window.
pub trait ExecutionResult: Send + Sync + std::fmt::Debug {
    fn definition(&self) -> &ExecutionDefinition;

    fn read_window(
        &self,
        offset: [usize; 2],
        size: [usize; 2],
    ) -> BoxFuture<'static, Result<DataView, BackendError>>;
}
