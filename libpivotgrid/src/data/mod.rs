//! Row windows: grid rows from data views, grouping of repeated values and the
//! paged data source feeding the grid host.
mod format;
mod grouping;
mod row;
mod source;

pub use format::format_measure_value;
pub use grouping::{
    AttributeGroupingProvider, DisabledGroupingProvider, RowGroupingProvider,
    create_grouping_provider,
};
pub use row::{
    GridRow, RowType, SubtotalStyle, create_pinned_total_rows, create_rows, raw_value_text,
    subtotal_styles,
};
pub use source::{
    COLS_PER_PAGE, FetchError, PageLoadedListener, PagedDataSource, RowWindow, RowWindowRequest,
};

#[cfg(test)]
mod tests;
