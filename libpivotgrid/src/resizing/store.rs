use std::collections::{BTreeMap, HashMap};

use pivotgrid_types::{ColumnWidth, ColumnWidthItem};
use tracing::debug;

use super::{MANUALLY_SIZED_MAX_WIDTH, MIN_WIDTH};
use crate::structure::{AnyCol, TableDescriptor};

/// Width resolved from the override tiers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManualWidth {
    pub width: f32,
    pub allow_grow_to_fit: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct ResizedColumn {
    width: ColumnWidth,
    /// Measure of the column, so weak and all-measures changes can find the entry.
    measure_identifier: Option<String>,
}

/// Width overrides, from strongest to weakest: per column, per measure ("weak") and
/// one value for all measure columns.
///
/// Transitions consume the state and return the new one. An explicit `auto` entry for
/// a column masks the weak and all-measures tiers for that column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnWidthState {
    manually_resized: BTreeMap<String, ResizedColumn>,
    weak_measures: BTreeMap<String, f32>,
    all_measures: Option<f32>,
}

impl ColumnWidthState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================
    // Transitions
    // ========================

    #[must_use]
    pub fn with_manual_width(mut self, col: &AnyCol, width: f32, allow_grow_to_fit: bool) -> Self {
        self.manually_resized.insert(
            col.id().to_string(),
            ResizedColumn {
                width: ColumnWidth::pixels(width).with_grow_to_fit(allow_grow_to_fit),
                measure_identifier: col.measure_identifier().map(str::to_string),
            },
        );
        self
    }

    /// Sets one width for every measure column. Per-column entries of measure columns
    /// and all weak entries are superseded.
    #[must_use]
    pub fn with_all_measures_width(mut self, width: f32, descriptor: &TableDescriptor) -> Self {
        self.all_measures = Some(width);
        self.manually_resized
            .retain(|id, _| !matches!(descriptor.find_col(id), Some(AnyCol::Series(_))));
        self.weak_measures.clear();
        self
    }

    /// Sets the width of every column of a measure. Per-column entries of that measure
    /// are superseded.
    #[must_use]
    pub fn with_weak_measure_width(mut self, measure_identifier: &str, width: f32) -> Self {
        self.weak_measures
            .insert(measure_identifier.to_string(), width);
        self.manually_resized
            .retain(|_, item| item.measure_identifier.as_deref() != Some(measure_identifier));
        self
    }

    /// Drops the per-column entry. A measure column still covered by a weak or
    /// all-measures width gets an `auto` entry instead, so it stays opted out.
    #[must_use]
    pub fn without_manual_width(mut self, col: &AnyCol) -> Self {
        self.manually_resized.remove(col.id());

        if let AnyCol::Series(series) = col
            && (self.all_measures.is_some()
                || self.weak_measures.contains_key(&series.measure.local_id))
        {
            self.manually_resized.insert(
                series.id.clone(),
                ResizedColumn {
                    width: ColumnWidth::auto(),
                    measure_identifier: Some(series.measure.local_id.clone()),
                },
            );
        }
        self
    }

    /// Clears the all-measures width together with the weak widths and the `auto`
    /// entries kept to opt out of them.
    #[must_use]
    pub fn without_all_measures_width(mut self) -> Self {
        self.all_measures = None;
        self.manually_resized.retain(|_, item| !item.width.is_auto());
        self.weak_measures.clear();
        self
    }

    /// Clears the weak width of the column's measure.
    #[must_use]
    pub fn without_weak_measure_width(mut self, col: &AnyCol) -> Self {
        let Some(measure) = col.measure_identifier().map(str::to_string) else {
            return self;
        };
        if self.weak_measures.remove(&measure).is_some() && self.all_measures.is_none() {
            self.manually_resized.retain(|_, item| {
                !(item.width.is_auto() && item.measure_identifier.as_ref() == Some(&measure))
            });
        }
        self
    }

    /// Replaces everything with persisted items matched against `descriptor`.
    ///
    /// Pixel widths are clamped to the manual range. Items that do not match a column
    /// of the table are dropped.
    #[must_use]
    pub fn with_width_items(items: &[ColumnWidthItem], descriptor: &TableDescriptor) -> Self {
        let validate = |width: ColumnWidth| width.clamped(MIN_WIDTH, MANUALLY_SIZED_MAX_WIDTH);
        let mut state = Self::default();

        state.all_measures = items.iter().find_map(|item| match item {
            ColumnWidthItem::AllMeasures { width } => validate(*width).as_pixels(),
            _ => None,
        });

        for item in items {
            let matched: Option<(&AnyCol, ColumnWidth)> = match item {
                ColumnWidthItem::AllMeasures { .. } => continue,
                ColumnWidthItem::WeakMeasure {
                    measure_identifier,
                    width,
                } => {
                    if let Some(px) = validate(*width).as_pixels() {
                        state.weak_measures.insert(measure_identifier.clone(), px);
                    }
                    continue;
                }
                ColumnWidthItem::Attribute {
                    attribute_identifier,
                    width,
                } => descriptor
                    .match_attribute_width_item(attribute_identifier)
                    .and_then(|col| descriptor.find_col(&col.id))
                    .map(|col| (col, *width)),
                ColumnWidthItem::Measure { locators, width } => descriptor
                    .match_measure_width_item(locators)
                    .map(|col| (col, *width)),
                ColumnWidthItem::SliceMeasure { width } => descriptor
                    .match_slice_measure_width_item()
                    .and_then(|col| descriptor.find_col(&col.id))
                    .map(|col| (col, *width)),
                ColumnWidthItem::MixedValues { locators, width } => descriptor
                    .match_mixed_values_width_item(locators)
                    .map(|col| (col, *width)),
            };
            match matched {
                Some((col, width)) => {
                    state.manually_resized.insert(
                        col.id().to_string(),
                        ResizedColumn {
                            width: validate(width),
                            measure_identifier: col.measure_identifier().map(str::to_string),
                        },
                    );
                }
                None => debug!("Dropping width item without matching column: {item:?}"),
            }
        }
        state
    }

    // ========================
    // Queries
    // ========================

    /// Width from the override tiers, `None` if the column is not overridden.
    #[must_use]
    pub fn manual_width(&self, col: &AnyCol) -> Option<ManualWidth> {
        if let Some(item) = self.manually_resized.get(col.id()) {
            return item.width.as_pixels().map(|width| ManualWidth {
                width,
                allow_grow_to_fit: item.width.allow_grow_to_fit,
            });
        }
        let AnyCol::Series(series) = col else {
            return None;
        };
        self.weak_measures
            .get(&series.measure.local_id)
            .copied()
            .or(self.all_measures)
            .map(|width| ManualWidth {
                width,
                allow_grow_to_fit: false,
            })
    }

    #[must_use]
    pub fn is_manually_resized(&self, col: &AnyCol) -> bool {
        self.manual_width(col).is_some()
    }

    #[must_use]
    pub fn weak_measure_width(&self, measure_identifier: &str) -> Option<f32> {
        self.weak_measures.get(measure_identifier).copied()
    }

    /// Weak width applying to `col`, if it is a measure column.
    #[must_use]
    pub fn matched_weak_measure_width(&self, col: &AnyCol) -> Option<f32> {
        match col {
            AnyCol::Series(series) => self.weak_measure_width(&series.measure.local_id),
            _ => None,
        }
    }

    #[must_use]
    pub fn all_measures_width(&self) -> Option<f32> {
        self.all_measures
    }

    /// Final width of a column: override tiers, then the measured width, then `default`.
    #[must_use]
    pub fn effective_width(
        &self,
        col: &AnyCol,
        auto_widths: &HashMap<String, f32>,
        default: f32,
    ) -> f32 {
        self.manual_width(col)
            .map(|manual| manual.width)
            .or_else(|| auto_widths.get(col.id()).copied())
            .unwrap_or(default)
    }

    /// Exports the overrides: per-column items, then the all-measures item, then the
    /// weak items.
    #[must_use]
    pub fn width_items(&self, descriptor: &TableDescriptor) -> Vec<ColumnWidthItem> {
        let mut items: Vec<ColumnWidthItem> = self
            .manually_resized
            .iter()
            .filter_map(|(id, item)| {
                let Some(col) = descriptor.find_col(id) else {
                    debug!("Not exporting width of unknown column {id}");
                    return None;
                };
                width_item_for_col(col, item.width, descriptor)
            })
            .collect();

        if let Some(width) = self.all_measures {
            items.push(ColumnWidthItem::AllMeasures {
                width: ColumnWidth::pixels(width),
            });
        }
        items.extend(
            self.weak_measures
                .iter()
                .map(|(measure, width)| ColumnWidthItem::WeakMeasure {
                    measure_identifier: measure.clone(),
                    width: ColumnWidth::pixels(*width),
                }),
        );
        items
    }
}

fn width_item_for_col(
    col: &AnyCol,
    width: ColumnWidth,
    descriptor: &TableDescriptor,
) -> Option<ColumnWidthItem> {
    match col {
        AnyCol::Slice(slice) => {
            // attribute columns always have a pixel width
            width.as_pixels()?;
            Some(ColumnWidthItem::Attribute {
                attribute_identifier: slice.attribute.local_id.clone(),
                width,
            })
        }
        AnyCol::Scope(_) | AnyCol::Series(_) => Some(ColumnWidthItem::Measure {
            locators: descriptor.create_locator(col.id())?,
            width,
        }),
        AnyCol::SliceMeasure(_) => Some(ColumnWidthItem::SliceMeasure { width }),
        AnyCol::MixedValues(_) => Some(ColumnWidthItem::MixedValues {
            locators: descriptor.create_locator(col.id())?,
            width,
        }),
    }
}
