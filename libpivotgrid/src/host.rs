//! The virtualized grid the rows and widths are handed to.
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use crate::data::GridRow;

/// Operations the grid layer needs from the widget that renders it.
///
/// All methods take `&self`; implementations synchronize internally.
pub trait GridHost: Send + Sync {
    fn set_column_width(&self, col_id: &str, width: f32);
    /// Width currently applied to a displayed column.
    fn column_width(&self, col_id: &str) -> Option<f32>;
    /// Ids of the displayed leaf columns, left to right.
    fn displayed_column_ids(&self) -> Vec<String>;
    /// Width available to the columns.
    fn client_width(&self) -> f32;

    fn set_pinned_bottom_rows(&self, rows: Vec<GridRow>);
    fn pinned_bottom_rows(&self) -> Vec<GridRow>;

    fn set_row_count(&self, count: usize);
    fn displayed_row_count(&self) -> usize;
    /// Loaded rows in display order, starting at the first row.
    fn displayed_rows(&self) -> Vec<GridRow>;

    fn is_column_sorted(&self, col_id: &str) -> bool;
    /// Asks the host to recompute cell classes, e.g. after grouping changed.
    fn refresh_cells(&self);
}

#[derive(Debug, Default)]
struct MemoryGridState {
    columns: Vec<String>,
    widths: BTreeMap<String, f32>,
    client_width: f32,
    pinned: Vec<GridRow>,
    row_count: Option<usize>,
    rows: BTreeMap<usize, GridRow>,
    sorted: BTreeSet<String>,
    refreshes: usize,
}

/// Host that keeps everything in memory, like a headless grid would.
///
/// Delivered windows are cached by absolute row index so a failed window never
/// disturbs rows loaded earlier.
#[derive(Debug, Default)]
pub struct MemoryGridHost {
    state: Mutex<MemoryGridState>,
}

impl MemoryGridHost {
    #[must_use]
    pub fn new(client_width: f32) -> Self {
        Self {
            state: Mutex::new(MemoryGridState {
                client_width,
                ..Default::default()
            }),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MemoryGridState) -> R) -> R {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut state)
    }

    /// Replaces the displayed columns. Widths of known columns are kept.
    pub fn set_columns(&self, columns: Vec<String>) {
        self.with_state(|s| s.columns = columns);
    }

    pub fn set_client_width(&self, width: f32) {
        self.with_state(|s| s.client_width = width);
    }

    pub fn set_sorted_columns(&self, sorted: impl IntoIterator<Item = String>) {
        self.with_state(|s| s.sorted = sorted.into_iter().collect());
    }

    /// Stores a delivered window at `offset`.
    pub fn store_rows(&self, offset: usize, rows: Vec<GridRow>) {
        self.with_state(|s| {
            for (i, row) in rows.into_iter().enumerate() {
                s.rows.insert(offset + i, row);
            }
        });
    }

    /// Forgets cached rows, as the grid does after a sort change.
    pub fn purge_rows(&self) {
        self.with_state(|s| s.rows.clear());
    }

    #[must_use]
    pub fn row_at(&self, index: usize) -> Option<GridRow> {
        self.with_state(|s| s.rows.get(&index).cloned())
    }

    #[must_use]
    pub fn row_count(&self) -> Option<usize> {
        self.with_state(|s| s.row_count)
    }

    #[must_use]
    pub fn widths(&self) -> BTreeMap<String, f32> {
        self.with_state(|s| s.widths.clone())
    }

    #[must_use]
    pub fn refresh_count(&self) -> usize {
        self.with_state(|s| s.refreshes)
    }
}

impl GridHost for MemoryGridHost {
    fn set_column_width(&self, col_id: &str, width: f32) {
        self.with_state(|s| {
            s.widths.insert(col_id.to_string(), width);
        });
    }

    fn column_width(&self, col_id: &str) -> Option<f32> {
        self.with_state(|s| s.widths.get(col_id).copied())
    }

    fn displayed_column_ids(&self) -> Vec<String> {
        self.with_state(|s| s.columns.clone())
    }

    fn client_width(&self) -> f32 {
        self.with_state(|s| s.client_width)
    }

    fn set_pinned_bottom_rows(&self, rows: Vec<GridRow>) {
        self.with_state(|s| s.pinned = rows);
    }

    fn pinned_bottom_rows(&self) -> Vec<GridRow> {
        self.with_state(|s| s.pinned.clone())
    }

    fn set_row_count(&self, count: usize) {
        self.with_state(|s| s.row_count = Some(count));
    }

    fn displayed_row_count(&self) -> usize {
        self.with_state(|s| s.rows.len())
    }

    fn displayed_rows(&self) -> Vec<GridRow> {
        self.with_state(|s| {
            s.rows
                .iter()
                .enumerate()
                .take_while(|(expected, (index, _))| expected == *index)
                .map(|(_, (_, row))| row.clone())
                .collect()
        })
    }

    fn is_column_sorted(&self, col_id: &str) -> bool {
        self.with_state(|s| s.sorted.contains(col_id))
    }

    fn refresh_cells(&self) {
        self.with_state(|s| s.refreshes += 1);
    }
}
