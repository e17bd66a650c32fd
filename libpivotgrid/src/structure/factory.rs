use std::collections::HashMap;

use itertools::Itertools;
use pivotgrid_types::{DataView, DimensionItem, ResultHeader};

use super::cols::{
    AnyCol, MIXED_VALUES_COL_ID, MixedValuesCol, SLICE_MEASURE_COL_ID, ScopeCol, ScopeStep,
    SeriesCol, SliceCol, SliceMeasureCol, join_col_id, scope_segment, slice_col_id,
};
use super::DescriptorError;

/// Column descriptors of one structural shape.
#[derive(Debug, Clone, Default)]
pub struct TableCols {
    pub slice_cols: Vec<SliceCol>,
    pub slice_measure_col: Option<SliceMeasureCol>,
    pub root_data_cols: Vec<String>,
    pub leaf_data_cols: Vec<String>,
    pub id_to_col: HashMap<String, AnyCol>,
}

pub(crate) fn create_table_cols(view: &DataView) -> Result<TableCols, DescriptorError> {
    let definition = &view.definition;
    let mut cols = TableCols::default();

    for (header_item, item) in definition.dimensions[0].items.iter().enumerate() {
        match item {
            DimensionItem::Attribute(local_id) => {
                let attribute = definition.attribute(local_id).ok_or_else(|| {
                    DescriptorError::MalformedDataView(format!("unknown row attribute {local_id}"))
                })?;
                let effective_totals = definition
                    .row_totals()
                    .iter()
                    .filter(|total| &total.attribute_identifier == local_id)
                    .unique_by(|total| total.total_type)
                    .cloned()
                    .collect();
                let col = SliceCol {
                    id: slice_col_id(local_id),
                    index: cols.slice_cols.len(),
                    header_item,
                    attribute: attribute.clone(),
                    effective_totals,
                };
                cols.id_to_col.insert(col.id.clone(), AnyCol::Slice(col.clone()));
                cols.slice_cols.push(col);
            }
            DimensionItem::MeasureGroup => {
                let col = SliceMeasureCol {
                    id: SLICE_MEASURE_COL_ID.to_string(),
                    index: 0,
                    header_item,
                };
                cols.slice_measure_col = Some(col);
            }
        }
    }
    // Measure names always render right of the attribute columns.
    if let Some(col) = cols.slice_measure_col.as_mut() {
        col.index = cols.slice_cols.len();
        cols.id_to_col.insert(col.id.clone(), AnyCol::SliceMeasure(col.clone()));
    }

    create_data_cols(view, &mut cols)?;

    Ok(cols)
}

fn create_data_cols(view: &DataView, cols: &mut TableCols) -> Result<(), DescriptorError> {
    let definition = &view.definition;
    let column_items = &definition.dimensions[1].items;
    let transposed = definition.is_transposed();
    let measure_group = column_items
        .iter()
        .position(|item| item == &DimensionItem::MeasureGroup);

    if !transposed && measure_group.is_none() {
        return Ok(());
    }

    let scoping: Vec<(usize, &str)> = column_items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| match item {
            DimensionItem::Attribute(id) => Some((i, id.as_str())),
            DimensionItem::MeasureGroup => None,
        })
        .collect();

    for column in 0..view.count[1] {
        let mut scope = Vec::with_capacity(scoping.len());
        let mut parent: Option<String> = None;
        let mut index_path = Vec::with_capacity(scoping.len() + 1);
        let mut total_depth: Option<usize> = None;

        for (depth, (item, local_id)) in scoping.iter().enumerate() {
            let header = header_at(view, *item, column)?;
            let Some(key) = header.element_key() else {
                return Err(DescriptorError::MalformedDataView(format!(
                    "measure header in scope of attribute {local_id}"
                )));
            };
            let attribute = definition.attribute(local_id).ok_or_else(|| {
                DescriptorError::MalformedDataView(format!("unknown column attribute {local_id}"))
            })?;
            if header.is_total() && total_depth.is_none() {
                total_depth = Some(depth);
            }
            scope.push(ScopeStep {
                attribute: attribute.clone(),
                header: header.clone(),
            });

            let id = join_col_id(parent.as_deref(), &scope_segment(local_id, &key));
            if let Some(existing) = cols.id_to_col.get(&id) {
                index_path = existing.index_path().to_vec();
            } else {
                let position = attach_child(cols, parent.as_deref(), &id);
                index_path.push(position);
                cols.id_to_col.insert(
                    id.clone(),
                    AnyCol::Scope(ScopeCol {
                        id: id.clone(),
                        scope: scope.clone(),
                        index_path: index_path.clone(),
                        children: vec![],
                        is_total: total_depth == Some(0),
                        is_subtotal: total_depth.is_some_and(|d| d > 0),
                    }),
                );
            }
            parent = Some(id);
        }

        let is_total = total_depth == Some(0);
        let is_subtotal = total_depth.is_some_and(|d| d > 0);
        let leaf = if transposed {
            AnyCol::MixedValues(MixedValuesCol {
                id: join_col_id(parent.as_deref(), MIXED_VALUES_COL_ID),
                index: column,
                scope,
                index_path: vec![],
                is_total,
                is_subtotal,
            })
        } else {
            let measure_item = measure_group.unwrap_or_default();
            let ResultHeader::MeasureHeaderItem { order } = header_at(view, measure_item, column)?
            else {
                return Err(DescriptorError::MalformedDataView(format!(
                    "expected measure header in column {column}"
                )));
            };
            let measure = definition.measures.get(*order).ok_or_else(|| {
                DescriptorError::MalformedDataView(format!("measure #{order} is not defined"))
            })?;
            let id = join_col_id(parent.as_deref(), &format!("m_{}", measure.local_id));
            AnyCol::Series(SeriesCol {
                id,
                index: column,
                measure: measure.clone(),
                scope,
                index_path: vec![],
                is_total,
                is_subtotal,
            })
        };

        let id = leaf.id().to_string();
        if cols.id_to_col.contains_key(&id) {
            return Err(DescriptorError::MalformedDataView(format!("duplicate column {id}")));
        }
        let position = attach_child(cols, parent.as_deref(), &id);
        index_path.push(position);
        let leaf = match leaf {
            AnyCol::Series(col) => AnyCol::Series(SeriesCol { index_path, ..col }),
            AnyCol::MixedValues(col) => AnyCol::MixedValues(MixedValuesCol { index_path, ..col }),
            other => other,
        };
        cols.leaf_data_cols.push(id.clone());
        cols.id_to_col.insert(id, leaf);
    }

    Ok(())
}

fn header_at(view: &DataView, item: usize, column: usize) -> Result<&ResultHeader, DescriptorError> {
    view.item_headers(1, item)
        .and_then(|headers| headers.get(column))
        .ok_or_else(|| {
            DescriptorError::MalformedDataView(format!(
                "missing column header for item {item} at {column}"
            ))
        })
}

/// Registers `id` under `parent` (or as a root) and returns its position among siblings.
fn attach_child(cols: &mut TableCols, parent: Option<&str>, id: &str) -> usize {
    match parent.and_then(|p| cols.id_to_col.get_mut(p)) {
        Some(AnyCol::Scope(scope)) => {
            scope.children.push(id.to_string());
            scope.children.len() - 1
        }
        _ => {
            cols.root_data_cols.push(id.to_string());
            cols.root_data_cols.len() - 1
        }
    }
}
