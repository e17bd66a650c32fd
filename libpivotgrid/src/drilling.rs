//! Drillability of cells, by matching the headers behind a cell against externally
//! supplied predicates.
use pivotgrid_types::{AttributeDef, MeasureDef, ResultHeader};

use crate::data::GridRow;
use crate::structure::{AnyCol, SLICE_MEASURE_COL_ID, ScopeStep, TableDescriptor};

/// A header contributing to a cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrillHeader<'a> {
    Attribute {
        attribute: &'a AttributeDef,
        header: &'a ResultHeader,
    },
    Measure(&'a MeasureDef),
}

pub trait HeaderPredicate: Send + Sync {
    fn matches(&self, header: &DrillHeader<'_>) -> bool;
}

impl<F> HeaderPredicate for F
where
    F: Fn(&DrillHeader<'_>) -> bool + Send + Sync,
{
    fn matches(&self, header: &DrillHeader<'_>) -> bool {
        self(header)
    }
}

/// Matches any element of an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePredicate(pub String);

impl HeaderPredicate for AttributePredicate {
    fn matches(&self, header: &DrillHeader<'_>) -> bool {
        matches!(header, DrillHeader::Attribute { attribute, .. } if attribute.local_id == self.0)
    }
}

/// Matches a measure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurePredicate(pub String);

impl HeaderPredicate for MeasurePredicate {
    fn matches(&self, header: &DrillHeader<'_>) -> bool {
        matches!(header, DrillHeader::Measure(measure) if measure.local_id == self.0)
    }
}

/// Whether the cell of `row` in `col_id` can be drilled into.
///
/// Header cells are drillable when their own header matches. Data cells are drillable
/// when any header on their row or column path matches. Cells of total rows and total
/// headers never are.
#[must_use]
pub fn is_cell_drillable(
    row: &GridRow,
    col_id: &str,
    descriptor: &TableDescriptor,
    predicates: &[Box<dyn HeaderPredicate>],
) -> bool {
    if predicates.is_empty() || row.is_some_total() {
        return false;
    }
    let Some(col) = descriptor.find_col(col_id) else {
        return false;
    };

    let headers: Vec<DrillHeader<'_>> = match col {
        AnyCol::Slice(slice) => row
            .header_item_map
            .get(&slice.id)
            .filter(|header| !header.is_total())
            .map(|header| DrillHeader::Attribute {
                attribute: &slice.attribute,
                header,
            })
            .into_iter()
            .collect(),
        AnyCol::SliceMeasure(_) => row_measure(row, descriptor).into_iter().collect(),
        AnyCol::Series(series) => {
            if col.is_total() || col.is_subtotal() {
                return false;
            }
            let mut headers = row_path(row, descriptor);
            headers.extend(scope_path(&series.scope));
            headers.push(DrillHeader::Measure(&series.measure));
            headers
        }
        AnyCol::Scope(_) | AnyCol::MixedValues(_) => {
            if col.is_total() || col.is_subtotal() {
                return false;
            }
            let mut headers = row_path(row, descriptor);
            headers.extend(scope_path(col.scope()));
            headers.extend(row_measure(row, descriptor));
            headers
        }
    };

    headers
        .iter()
        .any(|header| predicates.iter().any(|p| p.matches(header)))
}

fn row_path<'a>(row: &'a GridRow, descriptor: &'a TableDescriptor) -> Vec<DrillHeader<'a>> {
    descriptor
        .slice_cols()
        .iter()
        .filter_map(|slice| {
            let header = row.header_item_map.get(&slice.id)?;
            (!header.is_total()).then_some(DrillHeader::Attribute {
                attribute: &slice.attribute,
                header,
            })
        })
        .collect()
}

fn scope_path(scope: &[ScopeStep]) -> impl Iterator<Item = DrillHeader<'_>> {
    scope
        .iter()
        .filter(|step| !step.header.is_total())
        .map(|step| DrillHeader::Attribute {
            attribute: &step.attribute,
            header: &step.header,
        })
}

fn row_measure<'a>(row: &GridRow, descriptor: &'a TableDescriptor) -> Option<DrillHeader<'a>> {
    match row.header_item_map.get(SLICE_MEASURE_COL_ID)? {
        ResultHeader::MeasureHeaderItem { order } => {
            descriptor.measures().get(*order).map(DrillHeader::Measure)
        }
        _ => None,
    }
}
