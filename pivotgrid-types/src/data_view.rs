use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::definition::{DimensionItem, ExecutionDefinition, TotalType};

/// Header describing one position of a result dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResultHeader {
    AttributeHeaderItem { uri: String, name: String },
    MeasureHeaderItem { order: usize },
    TotalHeaderItem {
        name: String,
        #[serde(rename = "type")]
        total_type: TotalType,
    },
}

impl ResultHeader {
    #[must_use]
    pub fn element(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self::AttributeHeaderItem {
            uri: uri.into(),
            name: name.into(),
        }
    }

    #[must_use]
    pub fn total(total_type: TotalType) -> Self {
        Self::TotalHeaderItem {
            name: total_type.to_string(),
            total_type,
        }
    }

    /// Identity of the element this header stands for. Measures have none.
    #[must_use]
    pub fn element_key(&self) -> Option<String> {
        match self {
            Self::AttributeHeaderItem { uri, .. } => Some(uri.clone()),
            Self::TotalHeaderItem { total_type, .. } => Some(format!("!{}", total_type.key())),
            Self::MeasureHeaderItem { .. } => None,
        }
    }

    #[must_use]
    pub fn is_total(&self) -> bool {
        matches!(self, Self::TotalHeaderItem { .. })
    }

    #[must_use]
    pub fn total_type(&self) -> Option<TotalType> {
        match self {
            Self::TotalHeaderItem { total_type, .. } => Some(*total_type),
            _ => None,
        }
    }

    /// Text shown for the header.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        match self {
            Self::AttributeHeaderItem { name, .. } | Self::TotalHeaderItem { name, .. } => {
                Some(name)
            }
            Self::MeasureHeaderItem { .. } => None,
        }
    }
}

pub type DataValue = Option<f64>;

/// One window of an executed result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataView {
    pub definition: ExecutionDefinition,
    pub offset: [usize; 2],
    pub count: [usize; 2],
    pub total_count: [usize; 2],
    /// `headers[dim][item][position]`, positions relative to `offset[dim]`.
    pub headers: [Vec<Vec<ResultHeader>>; 2],
    pub data: Vec<Vec<DataValue>>,
    /// Grand-total rows, one per distinct row grand-total type.
    #[serde(default)]
    pub totals: Vec<Vec<DataValue>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataViewError {
    #[error("dimension {dimension} has {actual} header items, definition has {expected}")]
    HeaderItemCount {
        dimension: usize,
        expected: usize,
        actual: usize,
    },
    #[error("dimension {dimension} item {item} has {actual} headers, expected {expected}")]
    HeaderCount {
        dimension: usize,
        item: usize,
        expected: usize,
        actual: usize,
    },
    #[error("data row {row} has {actual} values, expected {expected}")]
    DataWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("data has {actual} rows, expected {expected}")]
    DataHeight { expected: usize, actual: usize },
}

impl DataView {
    /// Checks that headers and data agree with the counts and the definition.
    pub fn validate(&self) -> Result<(), DataViewError> {
        for dimension in 0..2 {
            let expected = self.definition.dimensions[dimension].items.len();
            let actual = self.headers[dimension].len();
            if expected != actual {
                return Err(DataViewError::HeaderItemCount {
                    dimension,
                    expected,
                    actual,
                });
            }
            for (item, headers) in self.headers[dimension].iter().enumerate() {
                if headers.len() != self.count[dimension] {
                    return Err(DataViewError::HeaderCount {
                        dimension,
                        item,
                        expected: self.count[dimension],
                        actual: headers.len(),
                    });
                }
            }
        }
        if self.data.len() != self.count[0] {
            return Err(DataViewError::DataHeight {
                expected: self.count[0],
                actual: self.data.len(),
            });
        }
        for (row, values) in self.data.iter().enumerate() {
            if values.len() != self.count[1] {
                return Err(DataViewError::DataWidth {
                    row,
                    expected: self.count[1],
                    actual: values.len(),
                });
            }
        }
        Ok(())
    }

    /// Headers of the given dimension item, if the item exists.
    #[must_use]
    pub fn item_headers(&self, dimension: usize, item: usize) -> Option<&[ResultHeader]> {
        self.headers
            .get(dimension)
            .and_then(|items| items.get(item))
            .map(Vec::as_slice)
    }

    /// Position of the measure group within a dimension.
    #[must_use]
    pub fn measure_group_index(&self, dimension: usize) -> Option<usize> {
        self.definition.dimensions[dimension]
            .items
            .iter()
            .position(|item| item == &DimensionItem::MeasureGroup)
    }

    /// True when this window ends at the last row of the result.
    #[must_use]
    pub fn is_last_row_window(&self) -> bool {
        self.offset[0] + self.count[0] >= self.total_count[0]
    }
}
