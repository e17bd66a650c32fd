//! Executes definitions against records held in memory.
//!
//! Cells are sums over matching records. Totals aggregate the visible cells of the
//! group they summarize. Positions are laid out the way an analytical backend returns
//! them: subtotals inline after their group, column grand totals after all columns and
//! row grand totals in a separate block.
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use itertools::Itertools;
use pivotgrid_types::{
    BackendError, DataValue, DataView, DimensionItem, ExecutionDefinition, ExecutionResult,
    Executor, LocatorItem, ResultHeader, SortDirection, SortItem, TotalDefinition, TotalType,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::async_util::sleep_ms;

/// One input fact: attribute element values and measure values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub measures: BTreeMap<String, f64>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn attr(mut self, local_id: &str, element: &str) -> Self {
        self.attributes.insert(local_id.to_string(), element.to_string());
        self
    }

    #[must_use]
    pub fn measure(mut self, local_id: &str, value: f64) -> Self {
        self.measures.insert(local_id.to_string(), value);
        self
    }
}

#[derive(Debug, Default)]
struct FailurePlan {
    failing_executions: usize,
    failing_reads_from_row: Option<usize>,
    execute_delays_ms: VecDeque<u64>,
}

#[derive(Debug, Default)]
struct BackendShared {
    executions: AtomicUsize,
    reads: AtomicUsize,
    plan: Mutex<FailurePlan>,
}

/// Executor over a fixed set of records.
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    records: Arc<Vec<Record>>,
    shared: Arc<BackendShared>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: Arc::new(records),
            shared: Arc::new(BackendShared::default()),
        }
    }

    /// Number of `execute` calls so far, failed ones included.
    #[must_use]
    pub fn executions(&self) -> usize {
        self.shared.executions.load(AtomicOrdering::SeqCst)
    }

    /// Number of `read_window` calls so far.
    #[must_use]
    pub fn reads(&self) -> usize {
        self.shared.reads.load(AtomicOrdering::SeqCst)
    }

    /// Makes the next `count` executions fail.
    pub fn fail_next_executions(&self, count: usize) {
        if let Ok(mut plan) = self.shared.plan.lock() {
            plan.failing_executions = count;
        }
    }

    /// Makes reads of windows starting at or after `row` fail. `None` heals the backend.
    pub fn fail_reads_from_row(&self, row: Option<usize>) {
        if let Ok(mut plan) = self.shared.plan.lock() {
            plan.failing_reads_from_row = row;
        }
    }

    /// Queues a delay for the next execution.
    pub fn delay_next_execution(&self, delay: Duration) {
        if let Ok(mut plan) = self.shared.plan.lock() {
            plan.execute_delays_ms
                .push_back(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX));
        }
    }

    /// Computes a result synchronously.
    pub fn compute(
        &self,
        definition: &ExecutionDefinition,
    ) -> Result<MemoryExecutionResult, BackendError> {
        Table::compute(definition, &self.records).map(|table| MemoryExecutionResult {
            definition: definition.clone(),
            table: Arc::new(table),
            shared: self.shared.clone(),
        })
    }
}

impl Executor for InMemoryBackend {
    fn execute(
        &self,
        definition: ExecutionDefinition,
    ) -> BoxFuture<'static, Result<Arc<dyn ExecutionResult>, BackendError>> {
        self.shared.executions.fetch_add(1, AtomicOrdering::SeqCst);
        let (fail, delay) = match self.shared.plan.lock() {
            Ok(mut plan) => {
                let fail = plan.failing_executions > 0;
                plan.failing_executions = plan.failing_executions.saturating_sub(1);
                (fail, plan.execute_delays_ms.pop_front())
            }
            Err(_) => (false, None),
        };
        let backend = self.clone();
        async move {
            if let Some(delay) = delay {
                sleep_ms(delay).await;
            }
            if fail {
                return Err(BackendError::Unavailable(
                    "execution rejected by backend".to_string(),
                ));
            }
            let result = backend.compute(&definition)?;
            info!(
                "Executed definition with {} rows and {} columns",
                result.table.rows.len(),
                result.table.cols.len()
            );
            Ok(Arc::new(result) as Arc<dyn ExecutionResult>)
        }
        .boxed()
    }
}

/// A computed result backed by [`InMemoryBackend`].
#[derive(Debug, Clone)]
pub struct MemoryExecutionResult {
    definition: ExecutionDefinition,
    table: Arc<Table>,
    shared: Arc<BackendShared>,
}

impl MemoryExecutionResult {
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.table.rows.len()
    }

    #[must_use]
    pub fn col_count(&self) -> usize {
        self.table.cols.len()
    }

    /// Reads a window without going through the future.
    pub fn window(&self, offset: [usize; 2], size: [usize; 2]) -> Result<DataView, BackendError> {
        self.table.window(&self.definition, offset, size)
    }
}

impl ExecutionResult for MemoryExecutionResult {
    fn definition(&self) -> &ExecutionDefinition {
        &self.definition
    }

    fn read_window(
        &self,
        offset: [usize; 2],
        size: [usize; 2],
    ) -> BoxFuture<'static, Result<DataView, BackendError>> {
        self.shared.reads.fetch_add(1, AtomicOrdering::SeqCst);
        let failing = self
            .shared
            .plan
            .lock()
            .ok()
            .and_then(|plan| plan.failing_reads_from_row)
            .is_some_and(|row| offset[0] >= row);
        let result = if failing {
            Err(BackendError::Unavailable(format!(
                "window at row {} could not be read",
                offset[0]
            )))
        } else {
            self.window(offset, size)
        };
        async move { result }.boxed()
    }
}

// ========================
// Layout computation
// ========================

#[derive(Debug, Clone, PartialEq)]
enum Position {
    Element(Vec<String>),
    Total {
        prefix: Vec<String>,
        total_type: TotalType,
        level: usize,
    },
}

/// A laid out position, with the measure it carries when the measure group is in
/// this dimension.
type Entry = (Position, Option<usize>);

#[derive(Debug)]
struct Table {
    rows: Vec<Entry>,
    cols: Vec<Entry>,
    data: Vec<Vec<DataValue>>,
    grand_totals: Vec<Vec<DataValue>>,
    row_headers: Vec<Vec<ResultHeader>>,
    col_headers: Vec<Vec<ResultHeader>>,
}

struct Facts<'a> {
    definition: &'a ExecutionDefinition,
    row_attrs: Vec<String>,
    col_attrs: Vec<String>,
    cells: HashMap<(Vec<String>, Vec<String>), Vec<Option<f64>>>,
    row_keys: Vec<Vec<String>>,
    col_keys: Vec<Vec<String>>,
}

impl Facts<'_> {
    fn base(&self, row_key: &[String], col_key: &[String], measure: usize) -> Option<f64> {
        self.cells
            .get(&(row_key.to_vec(), col_key.to_vec()))
            .and_then(|values| values.get(measure).copied().flatten())
    }

    fn has_total(
        &self,
        totals: &[TotalDefinition],
        t: TotalType,
        measure: usize,
        attr: &str,
    ) -> bool {
        let Some(measure) = self.definition.measures.get(measure) else {
            return false;
        };
        totals.iter().any(|total| {
            total.total_type == t
                && total.measure_identifier == measure.local_id
                && total.attribute_identifier == attr
        })
    }

    fn col_value(&self, row_key: &[String], col: &Position, measure: usize) -> Option<f64> {
        match col {
            Position::Element(col_key) => self.base(row_key, col_key, measure),
            Position::Total {
                prefix,
                total_type,
                level,
            } => {
                let attr = self.col_attrs.get(*level)?;
                if !self.has_total(self.definition.column_totals(), *total_type, measure, attr) {
                    return None;
                }
                let values = self
                    .col_keys
                    .iter()
                    .filter(|key| key.starts_with(prefix))
                    .filter_map(|key| self.base(row_key, key, measure))
                    .collect_vec();
                aggregate(*total_type, &values)
            }
        }
    }

    fn cell(&self, row: &Entry, col: &Entry) -> Option<f64> {
        let measure = row.1.or(col.1)?;
        match &row.0 {
            Position::Element(row_key) => self.col_value(row_key, &col.0, measure),
            Position::Total {
                prefix,
                total_type,
                level,
            } => {
                let attr = self.row_attrs.get(*level)?;
                self.row_aggregate(prefix, *total_type, attr, &col.0, measure)
            }
        }
    }

    fn row_aggregate(
        &self,
        prefix: &[String],
        total_type: TotalType,
        attr: &str,
        col: &Position,
        measure: usize,
    ) -> Option<f64> {
        if !self.has_total(self.definition.row_totals(), total_type, measure, attr) {
            return None;
        }
        let values = self
            .row_keys
            .iter()
            .filter(|key| key.starts_with(prefix))
            .filter_map(|key| self.col_value(key, col, measure))
            .collect_vec();
        aggregate(total_type, &values)
    }
}

fn aggregate(total_type: TotalType, values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(match total_type {
        TotalType::Sum | TotalType::Nat => values.iter().sum(),
        TotalType::Avg => values.iter().sum::<f64>() / values.len() as f64,
        TotalType::Max => values.iter().copied().fold(f64::MIN, f64::max),
        TotalType::Min => values.iter().copied().fold(f64::MAX, f64::min),
        TotalType::Med => {
            let sorted = values.iter().copied().sorted_by(f64::total_cmp).collect_vec();
            let mid = sorted.len() / 2;
            if sorted.len() % 2 == 0 {
                (sorted[mid - 1] + sorted[mid]) / 2.0
            } else {
                sorted[mid]
            }
        }
    })
}

fn attribute_ids(definition: &ExecutionDefinition, dimension: usize) -> Vec<String> {
    definition.dimensions[dimension]
        .attribute_ids()
        .map(str::to_string)
        .collect()
}

/// Inserts subtotal positions after each group and, when `grand` is set, grand
/// totals at the end.
fn with_totals(
    keys: &[Vec<String>],
    attrs: &[String],
    totals: &[TotalDefinition],
    grand: bool,
) -> Vec<Position> {
    let types_at = |level: usize| -> Vec<TotalType> {
        totals
            .iter()
            .filter(|t| attrs.get(level).is_some_and(|a| a == &t.attribute_identifier))
            .map(|t| t.total_type)
            .unique()
            .collect()
    };
    let mut positions = Vec::with_capacity(keys.len());
    for (i, key) in keys.iter().enumerate() {
        positions.push(Position::Element(key.clone()));
        let next = keys.get(i + 1);
        for level in (1..attrs.len()).rev() {
            let group_ends = next.is_none_or(|next| next[..level] != key[..level]);
            if group_ends {
                for total_type in types_at(level) {
                    positions.push(Position::Total {
                        prefix: key[..level].to_vec(),
                        total_type,
                        level,
                    });
                }
            }
        }
    }
    if grand && !keys.is_empty() {
        for total_type in types_at(0) {
            positions.push(Position::Total {
                prefix: vec![],
                total_type,
                level: 0,
            });
        }
    }
    positions
}

/// Pairs positions with measures when the measure group lives in this dimension.
/// Total positions only carry the measures the total was requested for.
fn expand(
    facts: &Facts<'_>,
    positions: Vec<Position>,
    totals: &[TotalDefinition],
    attrs: &[String],
    with_measures: bool,
) -> Vec<Entry> {
    if !with_measures {
        return positions.into_iter().map(|p| (p, None)).collect();
    }
    let measure_count = facts.definition.measures.len();
    positions
        .into_iter()
        .flat_map(|position| {
            (0..measure_count)
                .filter(|m| match &position {
                    Position::Element(_) => true,
                    Position::Total {
                        total_type, level, ..
                    } => attrs
                        .get(*level)
                        .is_some_and(|a| facts.has_total(totals, *total_type, *m, a)),
                })
                .map(|m| (position.clone(), Some(m)))
                .collect_vec()
        })
        .collect()
}

fn headers_for(
    entry: &Entry,
    items: &[DimensionItem],
    attrs: &[String],
) -> Vec<ResultHeader> {
    items
        .iter()
        .map(|item| match item {
            DimensionItem::MeasureGroup => ResultHeader::MeasureHeaderItem {
                order: entry.1.unwrap_or_default(),
            },
            DimensionItem::Attribute(id) => {
                let p = attrs.iter().position(|a| a == id).unwrap_or_default();
                match &entry.0 {
                    Position::Element(key) => ResultHeader::element(key[p].clone(), key[p].clone()),
                    Position::Total {
                        prefix, total_type, ..
                    } => match prefix.get(p) {
                        Some(element) => ResultHeader::element(element.clone(), element.clone()),
                        None => ResultHeader::total(*total_type),
                    },
                }
            }
        })
        .collect()
}

impl Table {
    fn compute(definition: &ExecutionDefinition, records: &[Record]) -> Result<Self, BackendError> {
        let known = |id: &str| definition.attribute(id).is_some();
        for dimension in &definition.dimensions {
            if let Some(unknown) = dimension.attribute_ids().find(|id| !known(id)) {
                return Err(BackendError::InvalidDefinition(format!(
                    "attribute {unknown} is not defined"
                )));
            }
        }
        if definition.dimensions.iter().all(|d| d.has_measure_group()) {
            return Err(BackendError::InvalidDefinition(
                "measure group placed in both dimensions".to_string(),
            ));
        }

        let row_attrs = attribute_ids(definition, 0);
        let col_attrs = attribute_ids(definition, 1);
        let measure_count = definition.measures.len();

        let mut cells: HashMap<(Vec<String>, Vec<String>), Vec<Option<f64>>> = HashMap::new();
        for record in records {
            let key_of = |attrs: &[String]| -> Option<Vec<String>> {
                attrs
                    .iter()
                    .map(|a| record.attributes.get(a).cloned())
                    .collect()
            };
            let (Some(row_key), Some(col_key)) = (key_of(&row_attrs), key_of(&col_attrs)) else {
                debug!("Skipping record without all attributes: {record:?}");
                continue;
            };
            let entry = cells
                .entry((row_key, col_key))
                .or_insert_with(|| vec![None; measure_count]);
            for (i, measure) in definition.measures.iter().enumerate() {
                if let Some(value) = record.measures.get(&measure.local_id) {
                    entry[i] = Some(entry[i].unwrap_or(0.0) + value);
                }
            }
        }

        let row_keys = cells.keys().map(|(r, _)| r.clone()).unique().sorted().collect_vec();
        let col_keys = cells.keys().map(|(_, c)| c.clone()).unique().sorted().collect_vec();

        let mut facts = Facts {
            definition,
            row_attrs,
            col_attrs,
            cells,
            row_keys,
            col_keys,
        };
        let sorted_rows = sort_row_keys(&facts, &definition.sort_by);
        facts.row_keys = sorted_rows;

        let transposed = definition.is_transposed();
        let row_positions =
            with_totals(&facts.row_keys, &facts.row_attrs, definition.row_totals(), false);
        let col_positions =
            with_totals(&facts.col_keys, &facts.col_attrs, definition.column_totals(), true);

        let rows = expand(
            &facts,
            row_positions,
            definition.row_totals(),
            &facts.row_attrs,
            transposed,
        );
        let cols = expand(
            &facts,
            col_positions,
            definition.column_totals(),
            &facts.col_attrs,
            definition.dimensions[1].has_measure_group(),
        );

        let data = rows
            .iter()
            .map(|row| cols.iter().map(|col| facts.cell(row, col)).collect_vec())
            .collect_vec();

        let grand_totals = match facts.row_attrs.first() {
            Some(first) if !transposed && !facts.row_keys.is_empty() => definition
                .row_totals()
                .iter()
                .filter(|t| &t.attribute_identifier == first)
                .map(|t| t.total_type)
                .unique()
                .map(|total_type| {
                    cols.iter()
                        .map(|(col, measure)| {
                            measure.and_then(|m| facts.row_aggregate(&[], total_type, first, col, m))
                        })
                        .collect_vec()
                })
                .collect_vec(),
            _ => vec![],
        };

        let row_headers = rows
            .iter()
            .map(|entry| headers_for(entry, &definition.dimensions[0].items, &facts.row_attrs))
            .collect_vec();
        let col_headers = cols
            .iter()
            .map(|entry| headers_for(entry, &definition.dimensions[1].items, &facts.col_attrs))
            .collect_vec();

        Ok(Self {
            rows,
            cols,
            data,
            grand_totals,
            row_headers,
            col_headers,
        })
    }

    fn window(
        &self,
        definition: &ExecutionDefinition,
        offset: [usize; 2],
        size: [usize; 2],
    ) -> Result<DataView, BackendError> {
        let total = [self.rows.len(), self.cols.len()];
        if offset[0] > total[0] || offset[1] > total[1] {
            return Err(BackendError::OutOfRange { offset, total });
        }
        let row_end = (offset[0] + size[0]).min(total[0]);
        let col_end = (offset[1] + size[1]).min(total[1]);
        let rows = offset[0]..row_end;
        let cols = offset[1]..col_end;

        // headers are stored per position, the view wants them per item
        let transpose = |per_position: &[Vec<ResultHeader>],
                         range: std::ops::Range<usize>,
                         items: usize| {
            (0..items)
                .map(|item| {
                    per_position[range.clone()]
                        .iter()
                        .map(|headers| headers[item].clone())
                        .collect_vec()
                })
                .collect_vec()
        };

        Ok(DataView {
            definition: definition.clone(),
            offset,
            count: [row_end - offset[0], col_end - offset[1]],
            total_count: total,
            headers: [
                transpose(
                    &self.row_headers,
                    rows.clone(),
                    definition.dimensions[0].items.len(),
                ),
                transpose(
                    &self.col_headers,
                    cols.clone(),
                    definition.dimensions[1].items.len(),
                ),
            ],
            data: self.data[rows]
                .iter()
                .map(|row| row[cols.clone()].to_vec())
                .collect(),
            totals: self
                .grand_totals
                .iter()
                .map(|row| row[cols.clone()].to_vec())
                .collect(),
        })
    }
}

fn sort_row_keys(facts: &Facts<'_>, sorts: &[SortItem]) -> Vec<Vec<String>> {
    let mut keys = facts.row_keys.clone();
    keys.sort_by(|a, b| {
        sorts
            .iter()
            .map(|sort| compare_by_sort(facts, sort, a, b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.cmp(b))
    });
    keys
}

fn compare_by_sort(facts: &Facts<'_>, sort: &SortItem, a: &[String], b: &[String]) -> Ordering {
    let ordering = match sort {
        SortItem::AttributeSortItem {
            attribute_identifier,
            ..
        } => match facts.row_attrs.iter().position(|id| id == attribute_identifier) {
            Some(p) => a[p].cmp(&b[p]),
            None => Ordering::Equal,
        },
        SortItem::MeasureSortItem { locators, .. } => {
            let Some((col_key, measure)) = column_for_locators(facts, locators) else {
                return Ordering::Equal;
            };
            let va = facts.base(a, &col_key, measure);
            let vb = facts.base(b, &col_key, measure);
            match (va, vb) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        }
    };
    match sort.direction() {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

fn column_for_locators(facts: &Facts<'_>, locators: &[LocatorItem]) -> Option<(Vec<String>, usize)> {
    let mut elements = BTreeMap::new();
    let mut measure = None;
    for locator in locators {
        match locator {
            LocatorItem::AttributeLocatorItem {
                attribute_identifier,
                element,
            } => {
                elements.insert(attribute_identifier.clone(), element.clone());
            }
            LocatorItem::MeasureLocatorItem { measure_identifier } => {
                measure = facts.definition.measure_index(measure_identifier);
            }
            LocatorItem::TotalLocatorItem { .. } => return None,
        }
    }
    let col_key = facts
        .col_attrs
        .iter()
        .map(|a| elements.get(a).cloned())
        .collect::<Option<Vec<_>>>()?;
    Some((col_key, measure?))
}
