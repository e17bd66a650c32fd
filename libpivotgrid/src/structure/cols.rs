use pivotgrid_types::{AttributeDef, MeasureDef, ResultHeader, TotalDefinition};

/// Column id of the measure-name column in measures-in-rows layouts.
pub const SLICE_MEASURE_COL_ID: &str = "sm";
/// Column id of the single values column in measures-in-rows layouts without column attributes.
pub const MIXED_VALUES_COL_ID: &str = "mv";

/// Row header column for one slicing attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceCol {
    pub id: String,
    /// Position among slice columns.
    pub index: usize,
    /// Position of the attribute within the row dimension items.
    pub header_item: usize,
    pub attribute: AttributeDef,
    /// Totals defined against this attribute, one per total type.
    pub effective_totals: Vec<TotalDefinition>,
}

/// Row header column listing measure names when measures are laid out in rows.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceMeasureCol {
    pub id: String,
    pub index: usize,
    pub header_item: usize,
}

/// One (attribute, element) step of a column scope path.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeStep {
    pub attribute: AttributeDef,
    pub header: ResultHeader,
}

/// Column group keyed by one scoping attribute element.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeCol {
    pub id: String,
    pub scope: Vec<ScopeStep>,
    pub index_path: Vec<usize>,
    pub children: Vec<String>,
    pub is_total: bool,
    pub is_subtotal: bool,
}

/// Leaf carrying the values of one measure within one scope path.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesCol {
    pub id: String,
    /// Position among data leaves, equal to the result column.
    pub index: usize,
    pub measure: MeasureDef,
    pub scope: Vec<ScopeStep>,
    pub index_path: Vec<usize>,
    pub is_total: bool,
    pub is_subtotal: bool,
}

/// Leaf carrying values of several measures, used when measures are laid out in rows.
#[derive(Debug, Clone, PartialEq)]
pub struct MixedValuesCol {
    pub id: String,
    pub index: usize,
    pub scope: Vec<ScopeStep>,
    pub index_path: Vec<usize>,
    pub is_total: bool,
    pub is_subtotal: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnyCol {
    Slice(SliceCol),
    SliceMeasure(SliceMeasureCol),
    Scope(ScopeCol),
    Series(SeriesCol),
    MixedValues(MixedValuesCol),
}

impl AnyCol {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Slice(col) => &col.id,
            Self::SliceMeasure(col) => &col.id,
            Self::Scope(col) => &col.id,
            Self::Series(col) => &col.id,
            Self::MixedValues(col) => &col.id,
        }
    }

    /// Row header column, as opposed to a data column.
    #[must_use]
    pub fn is_row_header(&self) -> bool {
        matches!(self, Self::Slice(_) | Self::SliceMeasure(_))
    }

    /// Leaf data column that holds computed values.
    #[must_use]
    pub fn is_data_leaf(&self) -> bool {
        matches!(self, Self::Series(_) | Self::MixedValues(_))
    }

    /// Measure computing this column's values, if it is a single-measure leaf.
    #[must_use]
    pub fn measure_identifier(&self) -> Option<&str> {
        match self {
            Self::Series(col) => Some(&col.measure.local_id),
            _ => None,
        }
    }

    #[must_use]
    pub fn scope(&self) -> &[ScopeStep] {
        match self {
            Self::Scope(col) => &col.scope,
            Self::Series(col) => &col.scope,
            Self::MixedValues(col) => &col.scope,
            Self::Slice(_) | Self::SliceMeasure(_) => &[],
        }
    }

    #[must_use]
    pub fn index_path(&self) -> &[usize] {
        match self {
            Self::Scope(col) => &col.index_path,
            Self::Series(col) => &col.index_path,
            Self::MixedValues(col) => &col.index_path,
            Self::Slice(_) | Self::SliceMeasure(_) => &[],
        }
    }

    #[must_use]
    pub fn is_total(&self) -> bool {
        match self {
            Self::Scope(col) => col.is_total,
            Self::Series(col) => col.is_total,
            Self::MixedValues(col) => col.is_total,
            Self::Slice(_) | Self::SliceMeasure(_) => false,
        }
    }

    #[must_use]
    pub fn is_subtotal(&self) -> bool {
        match self {
            Self::Scope(col) => col.is_subtotal,
            Self::Series(col) => col.is_subtotal,
            Self::MixedValues(col) => col.is_subtotal,
            Self::Slice(_) | Self::SliceMeasure(_) => false,
        }
    }

    #[must_use]
    pub fn as_slice(&self) -> Option<&SliceCol> {
        match self {
            Self::Slice(col) => Some(col),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_series(&self) -> Option<&SeriesCol> {
        match self {
            Self::Series(col) => Some(col),
            _ => None,
        }
    }
}

pub(crate) fn slice_col_id(attribute_local_id: &str) -> String {
    format!("s_{attribute_local_id}")
}

pub(crate) fn scope_segment(attribute_local_id: &str, element_key: &str) -> String {
    format!("c_{attribute_local_id}={element_key}")
}

pub(crate) fn join_col_id(prefix: Option<&str>, segment: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}|{segment}"),
        None => segment.to_string(),
    }
}
