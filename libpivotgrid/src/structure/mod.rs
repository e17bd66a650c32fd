mod cols;
mod descriptor;
mod factory;
mod locator;
mod sorting;

use thiserror::Error;

pub use cols::{
    AnyCol, MIXED_VALUES_COL_ID, MixedValuesCol, SLICE_MEASURE_COL_ID, ScopeCol, ScopeStep,
    SeriesCol, SliceCol, SliceMeasureCol,
};
pub use descriptor::TableDescriptor;
pub use sorting::SortModelItem;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("No column with id {0}")]
    NotFound(String),
    #[error("Column {0} cannot be sorted")]
    NotSortable(String),
    #[error("Malformed data view: {0}")]
    MalformedDataView(String),
}
