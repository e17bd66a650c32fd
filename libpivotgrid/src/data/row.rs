use std::collections::BTreeMap;

use pivotgrid_types::{DataValue, DataView, MeasureDef, ResultHeader, TotalType};
use serde::{Deserialize, Serialize};

use crate::structure::{AnyCol, TableDescriptor};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowType {
    #[default]
    Normal,
    Total,
    Subtotal,
}

/// Visual variant of a subtotal row, alternating between nesting levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtotalStyle {
    Even,
    Odd,
}

/// One row as handed to the grid host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRow {
    /// Column id to raw cell text.
    pub fields: BTreeMap<String, String>,
    /// Column id to the header the cell originates from, for drilling.
    pub header_item_map: BTreeMap<String, ResultHeader>,
    #[serde(rename = "type")]
    pub row_type: RowType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtotal_style: Option<SubtotalStyle>,
}

impl GridRow {
    #[must_use]
    pub fn field(&self, col_id: &str) -> Option<&str> {
        self.fields.get(col_id).map(String::as_str)
    }

    #[must_use]
    pub fn is_some_total(&self) -> bool {
        matches!(self.row_type, RowType::Total | RowType::Subtotal)
    }
}

/// Raw text of a value: empty for nulls, shortest round-trip form otherwise.
#[must_use]
pub fn raw_value_text(value: DataValue) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Style per slice column. The first column only carries grand totals; later columns
/// with subtotals alternate starting with `even`.
#[must_use]
pub fn subtotal_styles(descriptor: &TableDescriptor) -> Vec<Option<SubtotalStyle>> {
    let mut even = false;
    descriptor
        .slice_cols()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            if i == 0 || col.effective_totals.is_empty() {
                return None;
            }
            even = !even;
            Some(if even {
                SubtotalStyle::Even
            } else {
                SubtotalStyle::Odd
            })
        })
        .collect()
}

/// Flattens the row headers and values of a window into grid rows.
#[must_use]
pub fn create_rows(view: &DataView, descriptor: &TableDescriptor) -> Vec<GridRow> {
    let styles = subtotal_styles(descriptor);
    let leaves: Vec<&AnyCol> = descriptor.leaf_data_cols().collect();

    (0..view.count[0])
        .map(|r| {
            let mut row = GridRow::default();
            let mut row_measure = None;

            for (i, col) in descriptor.slice_cols().iter().enumerate() {
                let Some(header) = row_header(view, col.header_item, r) else {
                    continue;
                };
                if header.is_total() {
                    if row.row_type == RowType::Normal {
                        row.row_type = RowType::Subtotal;
                        row.subtotal_style = styles.get(i).copied().flatten();
                        row.fields.insert(
                            col.id.clone(),
                            header.display_name().unwrap_or_default().to_string(),
                        );
                        row.header_item_map.insert(col.id.clone(), header.clone());
                    }
                    continue;
                }
                row.fields.insert(
                    col.id.clone(),
                    header.display_name().unwrap_or_default().to_string(),
                );
                row.header_item_map.insert(col.id.clone(), header.clone());
            }

            if let Some(col) = descriptor.slice_measure_col()
                && let Some(header) = row_header(view, col.header_item, r)
                && let ResultHeader::MeasureHeaderItem { order } = header
            {
                let title = descriptor
                    .measures()
                    .get(*order)
                    .map(|m| m.title.clone())
                    .unwrap_or_default();
                row.fields.insert(col.id.clone(), title);
                row.header_item_map.insert(col.id.clone(), header.clone());
                row_measure = Some(header.clone());
            }

            let values = view.data.get(r).map(Vec::as_slice).unwrap_or_default();
            let cells = LeafCells {
                values,
                col_offset: view.offset[1],
                measures: descriptor.measures(),
                row_measure: row_measure.as_ref(),
            };
            cells.fill(&mut row, &leaves);
            row
        })
        .collect()
}

/// Grand-total rows shown pinned below the scrolling rows.
#[must_use]
pub fn create_pinned_total_rows(view: &DataView, descriptor: &TableDescriptor) -> Vec<GridRow> {
    let Some(grand_total_col) = descriptor.grand_total_col() else {
        return vec![];
    };
    if !descriptor.can_table_have_totals() || descriptor.is_transposed() {
        return vec![];
    }
    let types: Vec<TotalType> = grand_total_col
        .effective_totals
        .iter()
        .map(|t| t.total_type)
        .collect();
    let leaves: Vec<&AnyCol> = descriptor.leaf_data_cols().collect();

    view.totals
        .iter()
        .zip(types)
        .map(|(values, total_type)| {
            let header = ResultHeader::total(total_type);
            let mut row = GridRow {
                row_type: RowType::Total,
                ..Default::default()
            };
            row.fields
                .insert(grand_total_col.id.clone(), total_type.to_string());
            row.header_item_map
                .insert(grand_total_col.id.clone(), header);
            let cells = LeafCells {
                values,
                col_offset: view.offset[1],
                measures: descriptor.measures(),
                row_measure: None,
            };
            cells.fill(&mut row, &leaves);
            row
        })
        .collect()
}

fn row_header(view: &DataView, item: usize, row: usize) -> Option<&ResultHeader> {
    view.item_headers(0, item).and_then(|headers| headers.get(row))
}

struct LeafCells<'a> {
    values: &'a [DataValue],
    col_offset: usize,
    measures: &'a [MeasureDef],
    /// Measure header of the row in measures-in-rows layouts.
    row_measure: Option<&'a ResultHeader>,
}

impl LeafCells<'_> {
    fn fill(&self, row: &mut GridRow, leaves: &[&AnyCol]) {
        for leaf in leaves {
            let (index, header) = match leaf {
                AnyCol::Series(col) => (
                    col.index,
                    self.measures
                        .iter()
                        .position(|m| m.local_id == col.measure.local_id)
                        .map(|order| ResultHeader::MeasureHeaderItem { order }),
                ),
                AnyCol::MixedValues(col) => (col.index, self.row_measure.cloned()),
                _ => continue,
            };
            let Some(value) = index
                .checked_sub(self.col_offset)
                .and_then(|i| self.values.get(i))
                .copied()
            else {
                continue;
            };
            row.fields
                .insert(leaf.id().to_string(), raw_value_text(value));
            if let Some(header) = header {
                row.header_item_map.insert(leaf.id().to_string(), header);
            }
        }
    }
}
