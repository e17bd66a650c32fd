use pivotgrid_types::{SortDirection, SortItem};
use serde::{Deserialize, Serialize};

use super::DescriptorError;
use super::cols::AnyCol;
use super::factory::TableCols;
use super::locator::{create_locator, search_for_locator_match};

/// Sort indicator the grid host shows on a column header.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortModelItem {
    pub col_id: String,
    pub direction: SortDirection,
}

impl SortModelItem {
    #[must_use]
    pub fn new(col_id: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            col_id: col_id.into(),
            direction,
        }
    }
}

/// Builds the backend sort item for a sorted column.
///
/// Attribute sorts keep the `aggregation` of an original sort on the same attribute so
/// that flipping the direction does not lose it.
pub(crate) fn create_sort_item_for_col(
    col: &AnyCol,
    direction: SortDirection,
    original_sorts: &[SortItem],
) -> Result<SortItem, DescriptorError> {
    match col {
        AnyCol::Slice(slice) => {
            let aggregation = original_sorts.iter().find_map(|sort| match sort {
                SortItem::AttributeSortItem {
                    attribute_identifier,
                    aggregation,
                    ..
                } if attribute_identifier == &slice.attribute.local_id => aggregation.clone(),
                _ => None,
            });
            Ok(SortItem::AttributeSortItem {
                attribute_identifier: slice.attribute.local_id.clone(),
                direction,
                aggregation,
            })
        }
        AnyCol::Series(_) => Ok(SortItem::MeasureSortItem {
            direction,
            locators: create_locator(col).unwrap_or_default(),
        }),
        AnyCol::SliceMeasure(_) | AnyCol::Scope(_) | AnyCol::MixedValues(_) => {
            Err(DescriptorError::NotSortable(col.id().to_string()))
        }
    }
}

/// Sort model the grid host shows for backend sorts. Sorts pointing at columns that no
/// longer exist are left out.
pub(crate) fn create_sort_model(sorts: &[SortItem], cols: &TableCols) -> Vec<SortModelItem> {
    sorts
        .iter()
        .filter_map(|sort| match sort {
            SortItem::AttributeSortItem {
                attribute_identifier,
                direction,
                ..
            } => cols
                .slice_cols
                .iter()
                .find(|col| &col.attribute.local_id == attribute_identifier)
                .map(|col| SortModelItem::new(col.id.clone(), *direction)),
            SortItem::MeasureSortItem {
                direction,
                locators,
            } => search_for_locator_match(cols, locators)
                .filter(|col| matches!(col, AnyCol::Series(_)))
                .map(|col| SortModelItem::new(col.id(), *direction)),
        })
        .collect()
}
