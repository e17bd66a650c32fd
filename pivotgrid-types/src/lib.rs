pub mod backend;
pub mod column_width;
pub mod data_view;
pub mod definition;

pub use backend::{BackendError, ExecutionResult, Executor};
pub use column_width::{
    ColumnWidth, ColumnWidthItem, LocatorItem, WidthItemError, WidthValue,
    parse_column_width_items_lenient,
};
pub use data_view::{DataValue, DataView, DataViewError, ResultHeader};
pub use definition::{
    AttributeDef, Dimension, DimensionItem, ExecutionDefinition, MeasureDef, SortDirection,
    SortItem, TotalDefinition, TotalType,
};

#[cfg(test)]
mod tests;
