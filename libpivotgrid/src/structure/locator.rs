use pivotgrid_types::{LocatorItem, ResultHeader};

use super::cols::{AnyCol, ScopeStep};
use super::factory::TableCols;

pub(crate) fn scope_locators(scope: &[ScopeStep]) -> Vec<LocatorItem> {
    scope.iter().map(step_locator).collect()
}

fn step_locator(step: &ScopeStep) -> LocatorItem {
    match &step.header {
        ResultHeader::TotalHeaderItem { total_type, .. } => LocatorItem::TotalLocatorItem {
            attribute_identifier: step.attribute.local_id.clone(),
            total_function: *total_type,
        },
        ResultHeader::AttributeHeaderItem { uri, .. } => {
            LocatorItem::attribute(step.attribute.local_id.clone(), uri.clone())
        }
        // Scope steps never carry measure headers, the factory rejects them.
        ResultHeader::MeasureHeaderItem { .. } => {
            LocatorItem::attribute(step.attribute.local_id.clone(), String::new())
        }
    }
}

/// Locator for a data column: scope steps followed by the measure, if any.
pub(crate) fn create_locator(col: &AnyCol) -> Option<Vec<LocatorItem>> {
    match col {
        AnyCol::Series(series) => {
            let mut locators = scope_locators(&series.scope);
            locators.push(LocatorItem::measure(series.measure.local_id.clone()));
            Some(locators)
        }
        AnyCol::Scope(scope) => Some(scope_locators(&scope.scope)),
        AnyCol::MixedValues(mixed) => Some(scope_locators(&mixed.scope)),
        AnyCol::Slice(_) | AnyCol::SliceMeasure(_) => None,
    }
}

fn locator_matches(locator: &LocatorItem, col: &AnyCol) -> bool {
    match (locator, col) {
        (LocatorItem::MeasureLocatorItem { measure_identifier }, AnyCol::Series(series)) => {
            &series.measure.local_id == measure_identifier
        }
        (LocatorItem::MeasureLocatorItem { .. }, _) => false,
        (_, AnyCol::Scope(scope)) => scope
            .scope
            .last()
            .is_some_and(|step| &step_locator(step) == locator),
        _ => false,
    }
}

/// Walks the data column tree one locator at a time.
///
/// Returns the column reached after the last locator. A locator that does not match
/// anything on its level ends the search with `None`.
pub(crate) fn search_for_locator_match<'a>(
    cols: &'a TableCols,
    locators: &[LocatorItem],
) -> Option<&'a AnyCol> {
    let mut level: &[String] = &cols.root_data_cols;
    let mut found: Option<&AnyCol> = None;

    for locator in locators {
        let col = level
            .iter()
            .filter_map(|id| cols.id_to_col.get(id))
            .find(|col| locator_matches(locator, col))?;
        level = match col {
            AnyCol::Scope(scope) => &scope.children,
            _ => &[],
        };
        found = Some(col);
    }

    found
}

/// Mixed-values leaf below the scope path described by `locators`.
pub(crate) fn search_for_mixed_values_match<'a>(
    cols: &'a TableCols,
    locators: &[LocatorItem],
) -> Option<&'a AnyCol> {
    let level: &[String] = if locators.is_empty() {
        &cols.root_data_cols
    } else {
        match search_for_locator_match(cols, locators)? {
            AnyCol::Scope(scope) => &scope.children,
            _ => return None,
        }
    };
    level
        .iter()
        .filter_map(|id| cols.id_to_col.get(id))
        .find(|col| matches!(col, AnyCol::MixedValues(_)))
}
