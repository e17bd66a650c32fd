//! The single writer of column width state.
//!
//! Manual resizes, resets, persisted width items and measurements all go through
//! [`PivotTableController`], which keeps the [`ColumnWidthState`] and pushes the
//! resulting widths to the grid host.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use derive_more::Display;
use pivotgrid_types::ColumnWidthItem;
use tracing::{debug, info};

use crate::async_util::{perform_async_work, sleep_ms};
use crate::config::PivotGridConfig;
use crate::data::PagedDataSource;
use crate::host::GridHost;
use crate::resizing::{
    AutoSizeConfig, AutoSizeInput, COLUMN_RESIZE_TIMEOUT_MS, FontMeasurer,
    ColumnWidthState, DEFAULT_COLUMN_WIDTH, GrowColumn, TextMeasurer, auto_size_columns,
    grow_to_fit,
};
use crate::structure::{AnyCol, DescriptorError, TableDescriptor};

/// How a manual resize or reset of a single column spreads to other columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
pub enum ResizedColumnKind {
    /// Only the given columns.
    #[default]
    Single,
    /// Every measure column, through the all-measures width.
    AllMeasures,
    /// Every column of the same measure, through a weak width.
    WeakMeasure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResizingSettings {
    pub default_width: f32,
    pub grow_to_fit: bool,
    pub autosize: AutoSizeConfig,
    pub resize_delay_ms: u64,
}

impl Default for ResizingSettings {
    fn default() -> Self {
        Self {
            default_width: DEFAULT_COLUMN_WIDTH,
            grow_to_fit: false,
            autosize: AutoSizeConfig::default(),
            resize_delay_ms: COLUMN_RESIZE_TIMEOUT_MS,
        }
    }
}

impl From<&PivotGridConfig> for ResizingSettings {
    fn from(config: &PivotGridConfig) -> Self {
        Self {
            default_width: config.default_column_width,
            grow_to_fit: config.grow_to_fit,
            autosize: AutoSizeConfig {
                measure_headers: config.autosize.measure_headers,
                padding: config.autosize.padding,
                option: config.column_autoresize,
                client_width: None,
                fonts: config.fonts.clone(),
            },
            resize_delay_ms: config.autosize.resize_delay_ms,
        }
    }
}

pub type WidthListener = Box<dyn Fn(&[ColumnWidthItem]) + Send + Sync>;

struct ControllerState {
    descriptor: Arc<TableDescriptor>,
    widths: ColumnWidthState,
    /// Measured widths, never persisted.
    auto_widths: HashMap<String, f32>,
    /// Widths found by the last grow-to-fit.
    fitted_widths: HashMap<String, f32>,
}

pub struct PivotTableController {
    host: Arc<dyn GridHost>,
    source: Option<Arc<PagedDataSource>>,
    measurer: Box<dyn TextMeasurer>,
    settings: ResizingSettings,
    state: Mutex<ControllerState>,
    resizing: AtomicBool,
    listener: Mutex<Option<WidthListener>>,
}

impl PivotTableController {
    #[must_use]
    pub fn new(
        host: Arc<dyn GridHost>,
        descriptor: Arc<TableDescriptor>,
        settings: ResizingSettings,
    ) -> Self {
        Self {
            host,
            source: None,
            measurer: Box::new(FontMeasurer::new()),
            settings,
            state: Mutex::new(ControllerState {
                descriptor,
                widths: ColumnWidthState::new(),
                auto_widths: HashMap::new(),
                fitted_widths: HashMap::new(),
            }),
            resizing: AtomicBool::new(false),
            listener: Mutex::new(None),
        }
    }

    /// Uses the grouping of `source` so merged cells are not measured.
    #[must_use]
    pub fn with_source(mut self, source: Arc<PagedDataSource>) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn with_measurer(mut self, measurer: impl TextMeasurer + 'static) -> Self {
        self.measurer = Box::new(measurer);
        self
    }

    /// Called with the exported width items after every user driven width change.
    pub fn on_width_change(&self, listener: impl Fn(&[ColumnWidthItem]) + Send + Sync + 'static) {
        match self.listener.lock() {
            Ok(mut slot) => *slot = Some(Box::new(listener)),
            Err(poisoned) => *poisoned.into_inner() = Some(Box::new(listener)),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ControllerState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn notify_width_change(&self) {
        let items = self.column_width_items();
        let listener = match self.listener.lock() {
            Ok(listener) => listener,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(listener) = listener.as_ref() {
            listener(&items);
        }
    }

    // ========================
    // Accessors
    // ========================

    #[must_use]
    pub fn descriptor(&self) -> Arc<TableDescriptor> {
        self.lock_state().descriptor.clone()
    }

    #[must_use]
    pub fn width_state(&self) -> ColumnWidthState {
        self.lock_state().widths.clone()
    }

    #[must_use]
    pub fn auto_widths(&self) -> HashMap<String, f32> {
        self.lock_state().auto_widths.clone()
    }

    #[must_use]
    pub fn is_resizing(&self) -> bool {
        self.resizing.load(Ordering::SeqCst)
    }

    /// Persistable width items of the current overrides.
    #[must_use]
    pub fn column_width_items(&self) -> Vec<ColumnWidthItem> {
        let state = self.lock_state();
        state.widths.width_items(&state.descriptor)
    }

    /// Width a column gets: override, fitted (when growing), measured, then the default.
    pub fn effective_width(&self, col_id: &str) -> Result<f32, DescriptorError> {
        let state = self.lock_state();
        let col = state.descriptor.get_col(col_id)?;
        Ok(self.width_of(&state, col, true))
    }

    fn width_of(&self, state: &ControllerState, col: &AnyCol, with_fitted: bool) -> f32 {
        if let Some(manual) = state.widths.manual_width(col) {
            return manual.width;
        }
        if with_fitted
            && self.settings.grow_to_fit
            && let Some(width) = state.fitted_widths.get(col.id())
        {
            return *width;
        }
        state
            .widths
            .effective_width(col, &state.auto_widths, self.settings.default_width)
    }

    // ========================
    // Structure
    // ========================

    /// Switches to the descriptor of a new result. Overrides are carried over through
    /// their width items, so those that no longer match a column are dropped.
    pub fn set_descriptor(&self, descriptor: Arc<TableDescriptor>) {
        let mut state = self.lock_state();
        if Arc::ptr_eq(&state.descriptor, &descriptor) {
            return;
        }
        let items = state.widths.width_items(&state.descriptor);
        state.widths = ColumnWidthState::with_width_items(&items, &descriptor);
        state
            .auto_widths
            .retain(|id, _| descriptor.find_col(id).is_some());
        state.fitted_widths.clear();
        state.descriptor = descriptor;
    }

    // ========================
    // Manual resizing
    // ========================

    /// Commits widths the user dragged columns to.
    ///
    /// `AllMeasures` and `WeakMeasure` only apply to a single measure column and fall
    /// back to `Single` otherwise.
    pub fn on_columns_manually_resized(
        &self,
        kind: ResizedColumnKind,
        columns: &[(String, f32)],
    ) -> Result<(), DescriptorError> {
        debug!("{kind} resize of {} columns", columns.len());
        {
            let mut state = self.lock_state();
            let descriptor = state.descriptor.clone();
            let single_measure = match columns {
                [(id, width)] => descriptor
                    .get_col(id)?
                    .as_series()
                    .map(|series| (series, *width)),
                _ => None,
            };

            match (kind, single_measure) {
                (ResizedColumnKind::AllMeasures, Some((_, width))) => {
                    info!("Resizing all measure columns to {width}");
                    state.widths = std::mem::take(&mut state.widths)
                        .with_all_measures_width(width, &descriptor);
                    for col in descriptor.leaf_data_cols().filter(|c| c.as_series().is_some()) {
                        self.host.set_column_width(col.id(), width);
                    }
                }
                (ResizedColumnKind::WeakMeasure, Some((series, width))) => {
                    let measure = &series.measure.local_id;
                    info!("Resizing columns of measure {measure} to {width}");
                    state.widths =
                        std::mem::take(&mut state.widths).with_weak_measure_width(measure, width);
                    for col in descriptor.leaf_data_cols() {
                        if let Some(width) = state.widths.matched_weak_measure_width(col) {
                            self.host.set_column_width(col.id(), width);
                        }
                    }
                }
                _ => {
                    for (id, width) in columns {
                        let col = descriptor.get_col(id)?;
                        state.widths =
                            std::mem::take(&mut state.widths).with_manual_width(col, *width, false);
                        self.host.set_column_width(id, *width);
                    }
                }
            }
        }
        self.after_resize();
        Ok(())
    }

    /// Drops the overrides behind `col_id` and sizes it to its content. The measured
    /// width is remembered as a manual width that still takes part in grow-to-fit.
    pub fn reset_column_to_best_fit(
        &self,
        kind: ResizedColumnKind,
        col_id: &str,
    ) -> Result<(), DescriptorError> {
        if self.lock_state().auto_widths.is_empty() {
            self.update_auto_widths();
        }

        let to_reset: Vec<String> = {
            let mut state = self.lock_state();
            let descriptor = state.descriptor.clone();
            let col = descriptor.get_col(col_id)?;
            match (kind, col.as_series()) {
                (ResizedColumnKind::AllMeasures, Some(_)) => {
                    state.widths = std::mem::take(&mut state.widths).without_all_measures_width();
                    measure_col_ids(&descriptor, None)
                }
                (ResizedColumnKind::WeakMeasure, Some(series)) => {
                    let ids = measure_col_ids(&descriptor, Some(&series.measure.local_id));
                    state.widths = std::mem::take(&mut state.widths).without_weak_measure_width(col);
                    ids
                }
                _ => vec![col_id.to_string()],
            }
        };

        for id in &to_reset {
            self.reset_resized_column(id);
        }
        self.after_resize();
        Ok(())
    }

    fn reset_resized_column(&self, col_id: &str) {
        let measured = {
            let mut state = self.lock_state();
            let descriptor = state.descriptor.clone();
            let Some(col) = descriptor.find_col(col_id) else {
                return;
            };
            if state.widths.is_manually_resized(col) {
                state.widths = std::mem::take(&mut state.widths).without_manual_width(col);
            }
            if let Some(width) = state.auto_widths.get(col_id) {
                self.host.set_column_width(col_id, *width);
                return;
            }
            self.measure(&state, &[col_id.to_string()])
                .get(col_id)
                .copied()
        };

        let width = measured
            .or_else(|| self.host.column_width(col_id))
            .unwrap_or(self.settings.default_width);
        let mut state = self.lock_state();
        let descriptor = state.descriptor.clone();
        if let Some(col) = descriptor.find_col(col_id) {
            state.widths = std::mem::take(&mut state.widths).with_manual_width(col, width, true);
            self.host.set_column_width(col_id, width);
        }
    }

    pub fn clear_manual_width(&self, col_id: &str) -> Result<(), DescriptorError> {
        {
            let mut state = self.lock_state();
            let descriptor = state.descriptor.clone();
            let col = descriptor.get_col(col_id)?;
            state.widths = std::mem::take(&mut state.widths).without_manual_width(col);
        }
        self.after_resize();
        Ok(())
    }

    pub fn clear_all_measures_width(&self) {
        {
            let mut state = self.lock_state();
            state.widths = std::mem::take(&mut state.widths).without_all_measures_width();
        }
        self.after_resize();
    }

    /// Clears the weak width of the measure behind `col_id`.
    pub fn clear_weak_measure_width(&self, col_id: &str) -> Result<(), DescriptorError> {
        {
            let mut state = self.lock_state();
            let descriptor = state.descriptor.clone();
            let col = descriptor.get_col(col_id)?;
            state.widths = std::mem::take(&mut state.widths).without_weak_measure_width(col);
        }
        self.after_resize();
        Ok(())
    }

    fn after_resize(&self) {
        if self.settings.grow_to_fit {
            self.grow_to_fit();
        } else {
            self.reset_columns_width_to_default();
        }
        self.notify_width_change();
    }

    // ========================
    // Applying widths
    // ========================

    /// Replaces the overrides with persisted width items and applies the widths.
    pub fn apply_column_sizes(&self, items: &[ColumnWidthItem]) {
        {
            let mut state = self.lock_state();
            state.widths = ColumnWidthState::with_width_items(items, &state.descriptor);
            debug!(
                "Applied {} width items, {} exported back",
                items.len(),
                state.widths.width_items(&state.descriptor).len()
            );
        }
        if self.settings.grow_to_fit {
            self.grow_to_fit();
        } else {
            self.reset_columns_width_to_default();
        }
    }

    /// Sets every displayed column to its override, measured or default width.
    pub fn reset_columns_width_to_default(&self) {
        let state = self.lock_state();
        for id in self.host.displayed_column_ids() {
            let Some(col) = state.descriptor.find_col(&id) else {
                continue;
            };
            self.host
                .set_column_width(&id, self.width_of(&state, col, false));
        }
    }

    /// Stretches the displayed columns to the client width when they are narrower.
    pub fn grow_to_fit(&self) {
        self.reset_columns_width_to_default();
        let mut state = self.lock_state();
        state.fitted_widths.clear();

        let columns: Vec<GrowColumn> = self
            .host
            .displayed_column_ids()
            .into_iter()
            .filter_map(|id| {
                let col = state.descriptor.find_col(&id)?;
                let manual = state.widths.manual_width(col);
                Some(GrowColumn {
                    width: self
                        .host
                        .column_width(&id)
                        .unwrap_or_else(|| self.width_of(&state, col, false)),
                    suppress_size_to_fit: manual.is_some_and(|m| !m.allow_grow_to_fit),
                    id,
                })
            })
            .collect();

        if let Some(fitted) = grow_to_fit(&columns, self.host.client_width()) {
            for (id, width) in &fitted {
                self.host.set_column_width(id, *width);
            }
            state.fitted_widths = fitted;
        }
    }

    // ========================
    // Auto-sizing
    // ========================

    fn measure(&self, state: &ControllerState, columns: &[String]) -> HashMap<String, f32> {
        let rows = self.host.displayed_rows();
        let total_rows = self.host.pinned_bottom_rows();
        let host = self.host.clone();
        let is_sorted = move |id: &str| host.is_column_sorted(id);
        let source = self.source.clone();
        let is_repeated = move |id: &str, row: usize| {
            source
                .as_ref()
                .is_some_and(|source| source.is_repeated_value(id, row))
        };
        let config = AutoSizeConfig {
            client_width: Some(self.host.client_width()),
            ..self.settings.autosize.clone()
        };
        let input = AutoSizeInput {
            descriptor: &state.descriptor,
            columns,
            rows: &rows,
            total_rows: &total_rows,
            store: &state.widths,
            is_repeated: &is_repeated,
            is_sorted: &is_sorted,
        };
        auto_size_columns(&input, self.measurer.as_ref(), &config)
    }

    fn update_auto_widths(&self) {
        let columns = self.host.displayed_column_ids();
        let mut state = self.lock_state();
        let measured = self.measure(&state, &columns);
        debug!("Measured {} of {} columns", measured.len(), columns.len());
        state.auto_widths = measured;
    }

    /// Measures the displayed columns once freshly delivered rows settled.
    ///
    /// Returns `false` without doing anything when a resize is already running,
    /// unless `force` is set.
    pub async fn autoresize_columns(&self, force: bool) -> bool {
        let already_resizing = self.resizing.swap(true, Ordering::SeqCst);
        if already_resizing && !force {
            return false;
        }

        let option = self.settings.autosize.option;
        if option.is_enabled() {
            sleep_ms(self.settings.resize_delay_ms).await;
            self.update_auto_widths();
        }

        if self.settings.grow_to_fit {
            self.grow_to_fit();
        } else if option.is_enabled() {
            self.reset_columns_width_to_default();
        }

        // a forced pass leaves the flag to the pass it overlapped
        if !already_resizing {
            self.resizing.store(false, Ordering::SeqCst);
        }
        true
    }

    /// Schedules a non-forced [`Self::autoresize_columns`] whenever `source` serves a
    /// window, after switching to the descriptor the window was read with.
    pub fn autoresize_on_page_loads(self: &Arc<Self>, source: &PagedDataSource) {
        let controller = Arc::downgrade(self);
        source.on_page_loaded(move |window| {
            let Some(controller) = controller.upgrade() else {
                return;
            };
            controller.set_descriptor(window.descriptor.clone());
            perform_async_work(async move {
                controller.autoresize_columns(false).await;
            });
        });
    }
}

/// Ids of the measure leaf columns, optionally of one measure only.
fn measure_col_ids(descriptor: &TableDescriptor, measure: Option<&str>) -> Vec<String> {
    descriptor
        .leaf_data_cols()
        .filter_map(AnyCol::as_series)
        .filter(|series| measure.is_none_or(|m| series.measure.local_id == m))
        .map(|series| series.id.clone())
        .collect()
}
