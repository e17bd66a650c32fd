use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use pivotgrid_types::{
    BackendError, DataView, ExecutionDefinition, ExecutionResult, Executor, SortItem,
    TotalDefinition,
};
use thiserror::Error;
use tracing::{debug, error, info};

use super::grouping::{RowGroupingProvider, create_grouping_provider};
use super::row::{GridRow, create_pinned_total_rows, create_rows};
use crate::host::GridHost;
use crate::structure::{DescriptorError, SortModelItem, TableDescriptor};

/// Columns requested with every row window.
pub const COLS_PER_PAGE: usize = 1000;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Row window starting at {start_row} is past the last row {row_count}")]
    OutOfRange { start_row: usize, row_count: usize },
    #[error("Backend request failed: {0}")]
    Backend(#[from] BackendError),
    #[error("Cannot build table structure: {0}")]
    Descriptor(#[from] DescriptorError),
    #[error("Result generation {generation} was superseded by generation {current}")]
    Superseded { generation: u64, current: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowWindowRequest {
    pub start_row: usize,
    pub end_row: usize,
    pub sort_model: Vec<SortModelItem>,
}

impl RowWindowRequest {
    #[must_use]
    pub fn new(start_row: usize, end_row: usize, sort_model: Vec<SortModelItem>) -> Self {
        Self {
            start_row,
            end_row,
            sort_model,
        }
    }
}

/// Rows delivered for one request.
#[derive(Debug, Clone)]
pub struct RowWindow {
    pub start_row: usize,
    pub rows: Vec<GridRow>,
    /// Total row count reported by the backend.
    pub row_count: usize,
    /// Result generation the rows were read from.
    pub generation: u64,
    pub descriptor: Arc<TableDescriptor>,
    /// True when serving this window required a re-execution.
    pub re_executed: bool,
}

pub type PageLoadedListener = Box<dyn Fn(&RowWindow) + Send + Sync>;

type SharedExecution = Shared<BoxFuture<'static, Result<Arc<dyn ExecutionResult>, BackendError>>>;

/// A re-execution that was started and not applied yet.
struct InFlight {
    generation: u64,
    definition: ExecutionDefinition,
    execution: SharedExecution,
}

impl fmt::Debug for InFlight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlight")
            .field("generation", &self.generation)
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct SourceState {
    result: Arc<dyn ExecutionResult>,
    /// Definition the table was first executed with.
    original_definition: ExecutionDefinition,
    /// First window of the original execution.
    initial_view: DataView,
    descriptor: Arc<TableDescriptor>,
    grouping: Box<dyn RowGroupingProvider>,
    desired_totals: Vec<TotalDefinition>,
    row_count: usize,
    pinned: Vec<GridRow>,
    /// Generation `result` is served under.
    generation: u64,
    /// Latest generation handed out. Ahead of `generation` while `in_flight` runs.
    issued: u64,
    in_flight: Option<InFlight>,
}

/// Host notifications collected under the lock and sent after it is released.
#[derive(Default)]
struct HostUpdates {
    pinned: Option<Vec<GridRow>>,
    row_count: Option<usize>,
    refresh: bool,
}

/// Serves row windows to the grid host.
///
/// Re-executes the backend query when the requested sorts or the desired totals differ
/// from the ones the current result was computed with, otherwise reads windows from the
/// current result. Any number of requests may be in flight. Requests wanting the same
/// re-execution share it. Every re-execution takes a new generation when it starts, and
/// completions of generations older than the latest one are discarded.
pub struct PagedDataSource {
    executor: Arc<dyn Executor>,
    host: Arc<dyn GridHost>,
    group_rows: bool,
    state: Arc<Mutex<SourceState>>,
    listeners: Arc<Mutex<Vec<PageLoadedListener>>>,
}

impl PagedDataSource {
    /// Executes `definition` and builds a source around its first window.
    pub async fn execute(
        executor: Arc<dyn Executor>,
        host: Arc<dyn GridHost>,
        definition: ExecutionDefinition,
        page_size: usize,
        group_rows: bool,
    ) -> Result<Self, FetchError> {
        let result = executor.execute(definition).await?;
        let view = result
            .read_window([0, 0], [page_size, COLS_PER_PAGE])
            .await?;
        Self::new(executor, host, result, view, group_rows)
    }

    pub fn new(
        executor: Arc<dyn Executor>,
        host: Arc<dyn GridHost>,
        result: Arc<dyn ExecutionResult>,
        initial_view: DataView,
        group_rows: bool,
    ) -> Result<Self, FetchError> {
        let descriptor = Arc::new(TableDescriptor::for_data_view(&initial_view)?);
        let definition = result.definition().clone();
        let grouping = create_grouping_provider(
            group_rows && descriptor.is_sorted_by_first_attribute(&definition.sort_by),
        );
        let pinned = create_pinned_total_rows(&initial_view, &descriptor);
        let row_count = initial_view.total_count[0];

        host.set_row_count(row_count);
        host.set_pinned_bottom_rows(pinned.clone());

        let state = SourceState {
            result,
            desired_totals: definition.row_totals().to_vec(),
            original_definition: definition,
            initial_view,
            descriptor,
            grouping,
            row_count,
            pinned,
            generation: 0,
            issued: 0,
            in_flight: None,
        };
        Ok(Self {
            executor,
            host,
            group_rows,
            state: Arc::new(Mutex::new(state)),
            listeners: Arc::new(Mutex::new(vec![])),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, SourceState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Serves the rows `[start_row, end_row)` in the order given by `sort_model`.
    pub async fn get_rows(&self, request: RowWindowRequest) -> Result<RowWindow, FetchError> {
        let RowWindowRequest {
            start_row,
            end_row,
            sort_model,
        } = request;
        let size = [end_row.saturating_sub(start_row), COLS_PER_PAGE];

        let plan = {
            let mut state = self.lock_state();
            if start_row > state.row_count {
                return Err(FetchError::OutOfRange {
                    start_row,
                    row_count: state.row_count,
                });
            }
            let current = state.result.definition().clone();
            let sorts = state
                .descriptor
                .create_sort_items(&sort_model, &current.sort_by)?;
            let target = current
                .clone()
                .with_sorts(sorts)
                .with_totals(state.desired_totals.clone());

            if target != current {
                self.start_or_join_execution(&mut state, target)
            } else {
                if let Some(abandoned) = state.in_flight.take() {
                    // the current result is wanted again
                    debug!("Abandoning generation {}", abandoned.generation);
                    state.issued += 1;
                    state.generation = state.issued;
                }
                let result = state.result.clone();
                let generation = state.generation;
                if start_row == 0
                    && current == state.original_definition
                    && (state.initial_view.count[0] >= size[0]
                        || state.initial_view.is_last_row_window())
                {
                    Plan::Initial {
                        generation,
                        result,
                        view: state.initial_view.clone(),
                    }
                } else {
                    Plan::Read { generation, result }
                }
            }
        };

        let (view, served) = match plan {
            Plan::ReExecute {
                generation,
                execution,
            } => {
                let result = match execution.await {
                    Ok(result) => result,
                    Err(e) => {
                        error!("Re-execution of generation {generation} failed: {e}");
                        self.forget_failed_execution(generation);
                        return Err(e.into());
                    }
                };
                let view = result
                    .read_window([start_row, 0], size)
                    .await
                    .inspect_err(|e| error!("Reading window {start_row}..{end_row} failed: {e}"))?;
                (view, Served::ReExecuted { generation, result })
            }
            Plan::Initial {
                generation,
                result,
                view,
            } => {
                debug!("Serving cached initial window");
                (view, Served::Current { generation, result })
            }
            Plan::Read { generation, result } => {
                let view = result
                    .read_window([start_row, 0], size)
                    .await
                    .inspect_err(|e| error!("Reading window {start_row}..{end_row} failed: {e}"))?;
                (view, Served::Current { generation, result })
            }
        };

        let (window, updates) = self.apply_window(view, served, start_row)?;

        if let Some(pinned) = updates.pinned {
            self.host.set_pinned_bottom_rows(pinned);
        }
        if let Some(row_count) = updates.row_count {
            self.host.set_row_count(row_count);
        }
        if updates.refresh {
            self.host.refresh_cells();
        }
        self.notify_page_loaded(&window);
        Ok(window)
    }

    /// Joins the running re-execution of `target` or starts one under a new generation.
    fn start_or_join_execution(&self, state: &mut SourceState, target: ExecutionDefinition) -> Plan {
        if let Some(in_flight) = &state.in_flight
            && in_flight.definition == target
        {
            debug!("Joining re-execution of generation {}", in_flight.generation);
            return Plan::ReExecute {
                generation: in_flight.generation,
                execution: in_flight.execution.clone(),
            };
        }

        state.issued += 1;
        let generation = state.issued;
        info!(
            "Re-executing with sorts {:?} as generation {generation}",
            target.sort_by
        );
        let execution = self.executor.execute(target.clone()).shared();
        state.in_flight = Some(InFlight {
            generation,
            definition: target,
            execution: execution.clone(),
        });
        Plan::ReExecute {
            generation,
            execution,
        }
    }

    fn forget_failed_execution(&self, generation: u64) {
        let mut state = self.lock_state();
        if state
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.generation == generation)
        {
            state.in_flight = None;
        }
        if state.issued == generation {
            // the current result stays, under the failed generation
            state.generation = generation;
        }
    }

    fn apply_window(
        &self,
        view: DataView,
        served: Served,
        start_row: usize,
    ) -> Result<(RowWindow, HostUpdates), FetchError> {
        let mut state = self.lock_state();

        let re_executed = match served {
            Served::Current { generation, result } => {
                if !Arc::ptr_eq(&result, &state.result) || state.issued != state.generation {
                    debug!(
                        "Discarding window {start_row} of generation {generation}, latest is {}",
                        state.issued
                    );
                    return Err(FetchError::Superseded {
                        generation,
                        current: state.issued,
                    });
                }
                false
            }
            Served::ReExecuted { generation, result } => {
                if generation < state.issued {
                    debug!(
                        "Discarding re-executed window {start_row} of generation {generation}, latest is {}",
                        state.issued
                    );
                    return Err(FetchError::Superseded {
                        generation,
                        current: state.issued,
                    });
                }
                if state.generation != generation {
                    let descriptor = TableDescriptor::for_data_view(&view)?;
                    let enabled = self.group_rows
                        && descriptor.is_sorted_by_first_attribute(&result.definition().sort_by);
                    state.descriptor = Arc::new(descriptor);
                    state.result = result;
                    state.grouping = create_grouping_provider(enabled);
                    state.generation = generation;
                    state.in_flight = None;
                }
                true
            }
        };

        let descriptor = state.descriptor.clone();
        let rows = create_rows(&view, &descriptor);
        state
            .grouping
            .process_page(&rows, start_row, &descriptor.slice_col_ids());

        let mut updates = HostUpdates {
            refresh: self.group_rows,
            ..Default::default()
        };
        let pinned = create_pinned_total_rows(&view, &descriptor);
        if pinned != state.pinned {
            state.pinned = pinned.clone();
            updates.pinned = Some(pinned);
        }
        let row_count = view.total_count[0];
        if row_count != state.row_count || re_executed {
            state.row_count = row_count;
            updates.row_count = Some(row_count);
        }

        let window = RowWindow {
            start_row,
            rows,
            row_count,
            generation: state.generation,
            descriptor,
            re_executed,
        };
        Ok((window, updates))
    }

    fn notify_page_loaded(&self, window: &RowWindow) {
        let listeners = match self.listeners.lock() {
            Ok(listeners) => listeners,
            Err(poisoned) => poisoned.into_inner(),
        };
        for listener in listeners.iter() {
            listener(window);
        }
    }

    /// Registers a callback run after every successfully served window.
    pub fn on_page_loaded(&self, listener: impl Fn(&RowWindow) + Send + Sync + 'static) {
        match self.listeners.lock() {
            Ok(mut listeners) => listeners.push(Box::new(listener)),
            Err(poisoned) => poisoned.into_inner().push(Box::new(listener)),
        }
    }

    /// Row totals wanted from now on. Takes effect with the next window.
    pub fn set_desired_totals(&self, totals: Vec<TotalDefinition>) {
        self.lock_state().desired_totals = totals;
    }

    #[must_use]
    pub fn descriptor(&self) -> Arc<TableDescriptor> {
        self.lock_state().descriptor.clone()
    }

    #[must_use]
    pub fn current_definition(&self) -> ExecutionDefinition {
        self.lock_state().result.definition().clone()
    }

    /// Sort model matching the sorts of the current result.
    #[must_use]
    pub fn current_sort_model(&self) -> Vec<SortModelItem> {
        let state = self.lock_state();
        state
            .descriptor
            .sort_model(&state.result.definition().sort_by)
    }

    #[must_use]
    pub fn current_sorts(&self) -> Vec<SortItem> {
        self.lock_state().result.definition().sort_by.clone()
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.lock_state().row_count
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.lock_state().generation
    }

    #[must_use]
    pub fn pinned_total_rows(&self) -> Vec<GridRow> {
        self.lock_state().pinned.clone()
    }

    #[must_use]
    pub fn is_repeated_value(&self, col_id: &str, row: usize) -> bool {
        self.lock_state().grouping.is_repeated_value(col_id, row)
    }

    #[must_use]
    pub fn is_group_boundary(&self, row: usize) -> bool {
        self.lock_state().grouping.is_group_boundary(row)
    }

    #[must_use]
    pub fn is_column_with_grouping(&self, col_id: &str) -> bool {
        self.lock_state().grouping.is_column_with_grouping(col_id)
    }

    /// Runs `f` with the current grouping provider.
    pub fn with_grouping_provider<R>(&self, f: impl FnOnce(&dyn RowGroupingProvider) -> R) -> R {
        f(self.lock_state().grouping.as_ref())
    }
}

enum Plan {
    ReExecute {
        generation: u64,
        execution: SharedExecution,
    },
    Initial {
        generation: u64,
        result: Arc<dyn ExecutionResult>,
        view: DataView,
    },
    Read {
        generation: u64,
        result: Arc<dyn ExecutionResult>,
    },
}

/// Where the rows of a window came from.
enum Served {
    Current {
        generation: u64,
        result: Arc<dyn ExecutionResult>,
    },
    ReExecuted {
        generation: u64,
        result: Arc<dyn ExecutionResult>,
    },
}
