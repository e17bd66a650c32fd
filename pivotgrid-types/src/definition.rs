use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::column_width::LocatorItem;

/// Attribute referenced by an execution, identified by its local id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDef {
    pub local_id: String,
    pub title: String,
}

/// Measure referenced by an execution.
///
/// `format` follows the usual `#,##0.00` number mask convention; `None` falls back
/// to the raw number text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureDef {
    pub local_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Item placed into one of the two result dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DimensionItem {
    Attribute(String),
    MeasureGroup,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimension {
    pub items: Vec<DimensionItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub totals: Vec<TotalDefinition>,
}

impl Dimension {
    pub fn attribute_ids(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|item| match item {
            DimensionItem::Attribute(id) => Some(id.as_str()),
            DimensionItem::MeasureGroup => None,
        })
    }

    #[must_use]
    pub fn has_measure_group(&self) -> bool {
        self.items.contains(&DimensionItem::MeasureGroup)
    }
}

/// Aggregation function of a total or subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TotalType {
    #[display("Sum")]
    Sum,
    #[display("Avg")]
    Avg,
    #[display("Max")]
    Max,
    #[display("Min")]
    Min,
    #[display("Median")]
    Med,
    #[display("Rollup (Total)")]
    Nat,
}

impl TotalType {
    /// Stable lowercase key used in column ids and locators.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Max => "max",
            Self::Min => "min",
            Self::Med => "med",
            Self::Nat => "nat",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "sum" => Some(Self::Sum),
            "avg" => Some(Self::Avg),
            "max" => Some(Self::Max),
            "min" => Some(Self::Min),
            "med" => Some(Self::Med),
            "nat" => Some(Self::Nat),
            _ => None,
        }
    }
}

/// A requested total. A total on the first attribute of a dimension is a grand total,
/// a total on any later attribute is a subtotal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalDefinition {
    #[serde(rename = "type")]
    pub total_type: TotalType,
    pub measure_identifier: String,
    pub attribute_identifier: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Backend sort item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortItem {
    #[serde(rename_all = "camelCase")]
    AttributeSortItem {
        attribute_identifier: String,
        direction: SortDirection,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        aggregation: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    MeasureSortItem {
        direction: SortDirection,
        locators: Vec<LocatorItem>,
    },
}

impl SortItem {
    #[must_use]
    pub fn direction(&self) -> SortDirection {
        match self {
            Self::AttributeSortItem { direction, .. } | Self::MeasureSortItem { direction, .. } => {
                *direction
            }
        }
    }
}

/// Everything needed to compute one result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionDefinition {
    pub attributes: Vec<AttributeDef>,
    pub measures: Vec<MeasureDef>,
    pub dimensions: [Dimension; 2],
    #[serde(default)]
    pub sort_by: Vec<SortItem>,
}

impl ExecutionDefinition {
    /// Standard layout: row attributes in the first dimension, column attributes
    /// followed by the measure group in the second one.
    #[must_use]
    pub fn pivot(
        attributes: Vec<AttributeDef>,
        measures: Vec<MeasureDef>,
        row_attributes: &[&str],
        column_attributes: &[&str],
    ) -> Self {
        let rows = row_attributes
            .iter()
            .map(|id| DimensionItem::Attribute((*id).to_string()))
            .collect();
        let mut columns: Vec<DimensionItem> = column_attributes
            .iter()
            .map(|id| DimensionItem::Attribute((*id).to_string()))
            .collect();
        if !measures.is_empty() {
            columns.push(DimensionItem::MeasureGroup);
        }
        Self {
            attributes,
            measures,
            dimensions: [
                Dimension {
                    items: rows,
                    totals: vec![],
                },
                Dimension {
                    items: columns,
                    totals: vec![],
                },
            ],
            sort_by: vec![],
        }
    }

    /// Moves the measure group from the column dimension to the end of the row dimension.
    #[must_use]
    pub fn transposed(mut self) -> Self {
        let [rows, columns] = &mut self.dimensions;
        if columns.has_measure_group() {
            columns.items.retain(|item| item != &DimensionItem::MeasureGroup);
            rows.items.push(DimensionItem::MeasureGroup);
        }
        self
    }

    #[must_use]
    pub fn with_sorts(mut self, sorts: Vec<SortItem>) -> Self {
        self.sort_by = sorts;
        self
    }

    /// Replaces the row totals.
    #[must_use]
    pub fn with_totals(mut self, totals: Vec<TotalDefinition>) -> Self {
        self.dimensions[0].totals = totals;
        self
    }

    #[must_use]
    pub fn with_column_totals(mut self, totals: Vec<TotalDefinition>) -> Self {
        self.dimensions[1].totals = totals;
        self
    }

    #[must_use]
    pub fn row_totals(&self) -> &[TotalDefinition] {
        &self.dimensions[0].totals
    }

    #[must_use]
    pub fn column_totals(&self) -> &[TotalDefinition] {
        &self.dimensions[1].totals
    }

    /// Measures are laid out in rows instead of columns.
    #[must_use]
    pub fn is_transposed(&self) -> bool {
        self.dimensions[0].has_measure_group()
    }

    pub fn row_attributes(&self) -> impl Iterator<Item = &AttributeDef> {
        self.dimensions[0]
            .attribute_ids()
            .filter_map(|id| self.attribute(id))
    }

    pub fn column_attributes(&self) -> impl Iterator<Item = &AttributeDef> {
        self.dimensions[1]
            .attribute_ids()
            .filter_map(|id| self.attribute(id))
    }

    #[must_use]
    pub fn attribute(&self, local_id: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.local_id == local_id)
    }

    #[must_use]
    pub fn measure(&self, local_id: &str) -> Option<&MeasureDef> {
        self.measures.iter().find(|m| m.local_id == local_id)
    }

    #[must_use]
    pub fn measure_index(&self, local_id: &str) -> Option<usize> {
        self.measures.iter().position(|m| m.local_id == local_id)
    }
}
