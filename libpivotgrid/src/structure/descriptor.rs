use pivotgrid_types::{
    AttributeDef, DataView, ExecutionDefinition, LocatorItem, MeasureDef, SortItem,
    TotalDefinition,
};

use super::DescriptorError;
use super::cols::{AnyCol, SliceCol, SliceMeasureCol};
use super::factory::{TableCols, create_table_cols};
use super::locator::{create_locator, search_for_locator_match, search_for_mixed_values_match};
use super::sorting::{SortModelItem, create_sort_item_for_col, create_sort_model};

/// Entry point to the column structure of a table.
///
/// Built once per structural shape of a result. Row header columns (one per slicing
/// attribute, plus the measure-name column in measures-in-rows layouts) come first,
/// followed by the data columns. Data columns form a tree: one layer of scope columns per
/// column attribute with value-bearing leaves at the bottom.
///
/// Column ids are derived from attribute and measure local ids and the element keys on
/// the scope path, so they stay stable across pages and re-executions as long as the
/// set of scoping elements does not change.
#[derive(Debug, Clone)]
pub struct TableDescriptor {
    definition: ExecutionDefinition,
    cols: TableCols,
}

impl TableDescriptor {
    pub fn for_data_view(view: &DataView) -> Result<Self, DescriptorError> {
        let cols = create_table_cols(view)?;
        Ok(Self {
            definition: view.definition.clone(),
            cols,
        })
    }

    /// Definition of the result the descriptor was built from.
    #[must_use]
    pub fn definition(&self) -> &ExecutionDefinition {
        &self.definition
    }

    /// Looks up a column. Fails only for ids that do not belong to this table.
    pub fn get_col(&self, id: &str) -> Result<&AnyCol, DescriptorError> {
        self.cols
            .id_to_col
            .get(id)
            .ok_or_else(|| DescriptorError::NotFound(id.to_string()))
    }

    /// Same as [`Self::get_col`] for callers that hold possibly stale ids.
    #[must_use]
    pub fn find_col(&self, id: &str) -> Option<&AnyCol> {
        self.cols.id_to_col.get(id)
    }

    #[must_use]
    pub fn slice_cols(&self) -> &[SliceCol] {
        &self.cols.slice_cols
    }

    #[must_use]
    pub fn slice_measure_col(&self) -> Option<&SliceMeasureCol> {
        self.cols.slice_measure_col.as_ref()
    }

    #[must_use]
    pub fn slice_col_count(&self) -> usize {
        self.cols.slice_cols.len()
    }

    #[must_use]
    pub fn slice_col_ids(&self) -> Vec<String> {
        self.cols.slice_cols.iter().map(|c| c.id.clone()).collect()
    }

    /// Ids of the row header columns, left to right.
    #[must_use]
    pub fn row_header_col_ids(&self) -> Vec<String> {
        let mut ids = self.slice_col_ids();
        if let Some(col) = &self.cols.slice_measure_col {
            ids.push(col.id.clone());
        }
        ids
    }

    pub fn root_data_cols(&self) -> impl Iterator<Item = &AnyCol> {
        self.cols
            .root_data_cols
            .iter()
            .filter_map(|id| self.cols.id_to_col.get(id))
    }

    /// Data leaves left to right.
    pub fn leaf_data_cols(&self) -> impl Iterator<Item = &AnyCol> {
        self.cols
            .leaf_data_cols
            .iter()
            .filter_map(|id| self.cols.id_to_col.get(id))
    }

    /// Ids of every sizable column: row headers, then data leaves.
    #[must_use]
    pub fn all_leaf_col_ids(&self) -> Vec<String> {
        let mut ids = self.row_header_col_ids();
        ids.extend(self.cols.leaf_data_cols.iter().cloned());
        ids
    }

    #[must_use]
    pub fn data_col_leaves_count(&self) -> usize {
        self.cols.leaf_data_cols.len()
    }

    #[must_use]
    pub fn has_data_leaf_cols(&self) -> bool {
        !self.cols.leaf_data_cols.is_empty()
    }

    /// True if data columns are grouped under scope columns.
    #[must_use]
    pub fn has_grouped_data_cols(&self) -> bool {
        self.root_data_cols()
            .next()
            .is_some_and(|col| matches!(col, AnyCol::Scope(_)))
    }

    pub fn slicing_attributes(&self) -> impl Iterator<Item = &AttributeDef> {
        self.cols.slice_cols.iter().map(|col| &col.attribute)
    }

    #[must_use]
    pub fn measures(&self) -> &[MeasureDef] {
        &self.definition.measures
    }

    #[must_use]
    pub fn is_transposed(&self) -> bool {
        self.cols.slice_measure_col.is_some()
    }

    /// Position of a row header or leaf column among all sizable columns.
    pub fn absolute_col_index(&self, id: &str) -> Result<usize, DescriptorError> {
        let row_headers = self.slice_col_count() + usize::from(self.is_transposed());
        match self.get_col(id)? {
            AnyCol::Slice(col) => Ok(col.index),
            AnyCol::SliceMeasure(col) => Ok(col.index),
            AnyCol::Series(col) => Ok(row_headers + col.index),
            AnyCol::MixedValues(col) => Ok(row_headers + col.index),
            AnyCol::Scope(_) => Err(DescriptorError::NotFound(id.to_string())),
        }
    }

    /// Left-most column of the table.
    #[must_use]
    pub fn is_first_col(&self, id: &str) -> bool {
        match self.cols.slice_cols.first() {
            Some(first) => first.id == id,
            None => match &self.cols.slice_measure_col {
                Some(col) => col.id == id,
                None => self.is_first_data_col(id),
            },
        }
    }

    /// Right-most leaf of the table.
    #[must_use]
    pub fn is_last_col(&self, id: &str) -> bool {
        self.all_leaf_col_ids().last().is_some_and(|last| last == id)
    }

    /// Any column on the left edge of the data part: the first root and its first
    /// descendants down to the first leaf.
    #[must_use]
    pub fn is_first_data_col(&self, id: &str) -> bool {
        match self.find_col(id) {
            Some(col @ (AnyCol::Scope(_) | AnyCol::Series(_) | AnyCol::MixedValues(_))) => {
                col.index_path().iter().all(|idx| *idx == 0)
            }
            _ => false,
        }
    }

    /// Ordered path of attribute elements (and the measure) identifying a data column.
    #[must_use]
    pub fn create_locator(&self, id: &str) -> Option<Vec<LocatorItem>> {
        self.find_col(id).and_then(create_locator)
    }

    #[must_use]
    pub fn match_attribute_width_item(&self, attribute_identifier: &str) -> Option<&SliceCol> {
        self.cols
            .slice_cols
            .iter()
            .find(|col| col.attribute.local_id == attribute_identifier)
    }

    /// Finds the data column a persisted locator points to, if it still exists.
    #[must_use]
    pub fn match_measure_width_item(&self, locators: &[LocatorItem]) -> Option<&AnyCol> {
        search_for_locator_match(&self.cols, locators)
    }

    #[must_use]
    pub fn match_slice_measure_width_item(&self) -> Option<&SliceMeasureCol> {
        self.cols.slice_measure_col.as_ref()
    }

    #[must_use]
    pub fn match_mixed_values_width_item(&self, locators: &[LocatorItem]) -> Option<&AnyCol> {
        search_for_mixed_values_match(&self.cols, locators)
    }

    /// Tables without slicing attributes or without data leaves cannot show totals.
    #[must_use]
    pub fn can_table_have_totals(&self) -> bool {
        self.slice_col_count() > 0 && self.data_col_leaves_count() > 0
    }

    /// Slice column grand totals are defined against.
    #[must_use]
    pub fn grand_total_col(&self) -> Option<&SliceCol> {
        self.cols.slice_cols.first()
    }

    /// Slice column a total or subtotal belongs to.
    #[must_use]
    pub fn slice_col_for_total(&self, total: &TotalDefinition) -> Option<&SliceCol> {
        self.match_attribute_width_item(&total.attribute_identifier)
    }

    /// Totals in effect for a slice column.
    pub fn effective_totals(&self, id: &str) -> Result<&[TotalDefinition], DescriptorError> {
        match self.get_col(id)? {
            AnyCol::Slice(col) => Ok(&col.effective_totals),
            _ => Ok(&[]),
        }
    }

    /// Slice columns left of and including `id`. Data columns see all of them.
    pub fn slice_cols_up_to_including(&self, id: &str) -> Result<&[SliceCol], DescriptorError> {
        match self.get_col(id)? {
            AnyCol::Slice(col) => Ok(&self.cols.slice_cols[..=col.index]),
            _ => Ok(&self.cols.slice_cols),
        }
    }

    /// Translates the grid's sort model into backend sort items.
    pub fn create_sort_items(
        &self,
        sort_model: &[SortModelItem],
        original_sorts: &[SortItem],
    ) -> Result<Vec<SortItem>, DescriptorError> {
        sort_model
            .iter()
            .map(|item| {
                let col = self.get_col(&item.col_id)?;
                create_sort_item_for_col(col, item.direction, original_sorts)
            })
            .collect()
    }

    /// Inverse of [`Self::create_sort_items`].
    #[must_use]
    pub fn sort_model(&self, sorts: &[SortItem]) -> Vec<SortModelItem> {
        create_sort_model(sorts, &self.cols)
    }

    /// Rows are ordered by the first slicing attribute, either explicitly or because
    /// nothing else was requested.
    #[must_use]
    pub fn is_sorted_by_first_attribute(&self, sorts: &[SortItem]) -> bool {
        match sorts.first() {
            None => true,
            Some(SortItem::AttributeSortItem {
                attribute_identifier,
                ..
            }) => self
                .cols
                .slice_cols
                .first()
                .is_some_and(|col| &col.attribute.local_id == attribute_identifier),
            Some(SortItem::MeasureSortItem { .. }) => false,
        }
    }

    /// Text for the column header.
    #[must_use]
    pub fn header_name(&self, id: &str) -> Option<String> {
        match self.find_col(id)? {
            AnyCol::Slice(col) => Some(col.attribute.title.clone()),
            AnyCol::SliceMeasure(_) => Some(String::new()),
            AnyCol::Scope(col) => col
                .scope
                .last()
                .and_then(|step| step.header.display_name())
                .map(str::to_string),
            AnyCol::Series(col) => Some(col.measure.title.clone()),
            AnyCol::MixedValues(col) => Some(
                col.scope
                    .last()
                    .and_then(|step| step.header.display_name())
                    .unwrap_or_default()
                    .to_string(),
            ),
        }
    }
}
