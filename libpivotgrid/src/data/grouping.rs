use std::collections::HashMap;

use super::row::GridRow;

/// Tracks repeated slicing attribute values across loaded windows.
///
/// Rows are addressed by absolute index, so windows may arrive in any order.
pub trait RowGroupingProvider: Send + Sync + std::fmt::Debug {
    fn reset(&mut self);
    /// True if the cell repeats the value above it and should render blank.
    fn is_repeated_value(&self, col_id: &str, row: usize) -> bool;
    fn process_page(&mut self, rows: &[GridRow], row_offset: usize, slice_col_ids: &[String]);
    /// True if a separator belongs above `row`.
    fn is_group_boundary(&self, row: usize) -> bool;
    fn is_column_with_grouping(&self, col_id: &str) -> bool;
}

/// Grouping is off: nothing repeats, there are no boundaries.
#[derive(Debug, Default)]
pub struct DisabledGroupingProvider;

impl RowGroupingProvider for DisabledGroupingProvider {
    fn reset(&mut self) {}

    fn is_repeated_value(&self, _col_id: &str, _row: usize) -> bool {
        false
    }

    fn process_page(&mut self, _rows: &[GridRow], _row_offset: usize, _slice_col_ids: &[String]) {}

    fn is_group_boundary(&self, _row: usize) -> bool {
        false
    }

    fn is_column_with_grouping(&self, _col_id: &str) -> bool {
        false
    }
}

#[derive(Debug, Default)]
pub struct AttributeGroupingProvider {
    slice_col_ids: Vec<String>,
    /// Element key seen per column at each absolute row. `None` for rows not loaded yet.
    item_keys: HashMap<String, Vec<Option<String>>>,
    repetitions: HashMap<String, Vec<bool>>,
    /// Number of leading columns repeated at each row.
    repetition_counts: Vec<usize>,
    max_repetitions: usize,
}

impl AttributeGroupingProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&mut self) {
        let row_count = self
            .item_keys
            .values()
            .map(Vec::len)
            .max()
            .unwrap_or_default();
        let mut counts = vec![0; row_count];
        let mut repetitions = HashMap::new();
        let mut previous: Option<Vec<bool>> = None;

        for col_id in &self.slice_col_ids {
            let keys = self
                .item_keys
                .get(col_id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let mut repeated = vec![false; row_count];
            for row in 1..keys.len() {
                let same = matches!(
                    (&keys[row - 1], &keys[row]),
                    (Some(above), Some(current)) if above == current
                );
                let major_repeated = previous.as_ref().is_none_or(|p| p[row]);
                if same && major_repeated {
                    repeated[row] = true;
                    counts[row] += 1;
                }
            }
            repetitions.insert(col_id.clone(), repeated.clone());
            previous = Some(repeated);
        }

        self.max_repetitions = counts.iter().copied().max().unwrap_or_default();
        self.repetition_counts = counts;
        self.repetitions = repetitions;
    }
}

impl RowGroupingProvider for AttributeGroupingProvider {
    fn reset(&mut self) {
        *self = Self::default();
    }

    fn is_repeated_value(&self, col_id: &str, row: usize) -> bool {
        self.repetitions
            .get(col_id)
            .and_then(|r| r.get(row))
            .copied()
            .unwrap_or(false)
    }

    fn process_page(&mut self, rows: &[GridRow], row_offset: usize, slice_col_ids: &[String]) {
        for col_id in slice_col_ids {
            let keys = self.item_keys.entry(col_id.clone()).or_default();
            if keys.len() < row_offset + rows.len() {
                keys.resize(row_offset + rows.len(), None);
            }
            for (i, row) in rows.iter().enumerate() {
                keys[row_offset + i] = row
                    .header_item_map
                    .get(col_id)
                    .and_then(|header| header.element_key());
            }
        }
        self.slice_col_ids = slice_col_ids.to_vec();
        self.update();
    }

    fn is_group_boundary(&self, row: usize) -> bool {
        self.repetition_counts
            .get(row)
            .is_some_and(|count| *count < self.max_repetitions)
    }

    fn is_column_with_grouping(&self, col_id: &str) -> bool {
        self.slice_col_ids
            .iter()
            .position(|id| id == col_id)
            .is_some_and(|index| index < self.max_repetitions)
    }
}

#[must_use]
pub fn create_grouping_provider(group_rows: bool) -> Box<dyn RowGroupingProvider> {
    if group_rows {
        Box::new(AttributeGroupingProvider::new())
    } else {
        Box::new(DisabledGroupingProvider)
    }
}
