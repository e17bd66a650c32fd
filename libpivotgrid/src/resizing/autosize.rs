use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use pivotgrid_types::ResultHeader;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::measure::TextMeasurer;
use super::store::ColumnWidthState;
use super::{AUTO_SIZED_MAX_WIDTH, ColumnAutoresizeOption, DEFAULT_AUTOSIZE_PADDING, MIN_WIDTH, SORT_ICON_WIDTH};
use crate::data::{GridRow, format_measure_value};
use crate::structure::{AnyCol, SLICE_MEASURE_COL_ID, TableDescriptor};

const DEFAULT_FONT_FAMILY: &str = "Avenir, \"Helvetica Neue\", arial, sans-serif";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FontSpecError {
    #[error("font '{0}' has no size in px")]
    MissingSize(String),
    #[error("font '{0}' has no family")]
    MissingFamily(String),
    #[error("unsupported font weight '{0}'")]
    InvalidWeight(String),
}

/// A font given in CSS shorthand, `[style] [weight] <size>px[/line-height] <family>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FontSpec {
    pub weight: u16,
    pub size_px: f32,
    pub family: String,
}

impl FontSpec {
    #[must_use]
    pub fn new(weight: u16, size_px: f32) -> Self {
        Self {
            weight,
            size_px,
            family: DEFAULT_FONT_FAMILY.to_string(),
        }
    }
}

impl FromStr for FontSpec {
    type Err = FontSpecError;

    fn from_str(css: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = css.split_whitespace().collect();
        let size_at = tokens
            .iter()
            .position(|t| t.split('/').next().is_some_and(|s| s.ends_with("px")))
            .ok_or_else(|| FontSpecError::MissingSize(css.to_string()))?;
        let size_px = tokens[size_at]
            .split('/')
            .next()
            .and_then(|s| s.trim_end_matches("px").parse::<f32>().ok())
            .ok_or_else(|| FontSpecError::MissingSize(css.to_string()))?;

        let mut weight = 400;
        for token in &tokens[..size_at] {
            weight = match *token {
                "normal" | "italic" | "oblique" | "small-caps" => continue,
                "bold" => 700,
                "lighter" => 300,
                "bolder" => 800,
                other => other
                    .parse()
                    .map_err(|_| FontSpecError::InvalidWeight(other.to_string()))?,
            };
        }

        let family = tokens[size_at + 1..].join(" ");
        if family.is_empty() {
            return Err(FontSpecError::MissingFamily(css.to_string()));
        }
        Ok(Self {
            weight,
            size_px,
            family,
        })
    }
}

impl TryFrom<String> for FontSpec {
    type Error = FontSpecError;

    fn try_from(css: String) -> Result<Self, Self::Error> {
        css.parse()
    }
}

impl From<FontSpec> for String {
    fn from(font: FontSpec) -> Self {
        font.to_string()
    }
}

impl fmt::Display for FontSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}px {}", self.weight, self.size_px, self.family)
    }
}

/// Fonts of the table parts that are measured separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableFonts {
    pub header: FontSpec,
    pub row: FontSpec,
    pub subtotal: FontSpec,
    pub total: FontSpec,
    pub subtotal_column: FontSpec,
    pub total_column: FontSpec,
}

impl Default for TableFonts {
    fn default() -> Self {
        Self {
            header: FontSpec::new(400, 12.),
            row: FontSpec::new(400, 12.),
            subtotal: FontSpec::new(700, 12.),
            total: FontSpec::new(700, 12.),
            subtotal_column: FontSpec::new(700, 12.),
            total_column: FontSpec::new(700, 12.),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutoSizeConfig {
    pub measure_headers: bool,
    pub padding: f32,
    pub option: ColumnAutoresizeOption,
    /// Width available to the columns, used by [`ColumnAutoresizeOption::Viewport`].
    pub client_width: Option<f32>,
    pub fonts: TableFonts,
}

impl Default for AutoSizeConfig {
    fn default() -> Self {
        Self {
            measure_headers: true,
            padding: DEFAULT_AUTOSIZE_PADDING,
            option: ColumnAutoresizeOption::AutoresizeAll,
            client_width: None,
            fonts: TableFonts::default(),
        }
    }
}

/// What is on screen at the time of measuring.
pub struct AutoSizeInput<'a> {
    pub descriptor: &'a TableDescriptor,
    /// Displayed columns, left to right.
    pub columns: &'a [String],
    pub rows: &'a [GridRow],
    pub total_rows: &'a [GridRow],
    pub store: &'a ColumnWidthState,
    /// Grouping lookup, `(col_id, row) -> repeated`.
    pub is_repeated: &'a dyn Fn(&str, usize) -> bool,
    pub is_sorted: &'a dyn Fn(&str) -> bool,
}

/// Width for a measured text width: padded, rounded up and clamped to the auto range.
#[must_use]
pub fn auto_col_width(max_text_width: Option<f32>, padding: f32) -> f32 {
    let width = max_text_width.map_or(0., |w| (w + padding).ceil());
    width.clamp(MIN_WIDTH, AUTO_SIZED_MAX_WIDTH)
}

struct Pass<'a> {
    input: &'a AutoSizeInput<'a>,
    measurer: &'a dyn TextMeasurer,
    config: &'a AutoSizeConfig,
    cache: HashMap<String, f32>,
    max_widths: HashMap<String, f32>,
}

impl Pass<'_> {
    fn offer(&mut self, col_id: &str, width: f32) {
        let max = self.max_widths.entry(col_id.to_string()).or_insert(0.);
        if width > *max {
            *max = width;
        }
    }

    fn measure_cached(&mut self, font: &FontSpec, text: &str) -> f32 {
        let key = format!("{font}:{text}");
        if let Some(width) = self.cache.get(&key) {
            return *width;
        }
        let width = self.measurer.measure(font, text);
        self.cache.insert(key, width);
        width
    }

    fn header_font(&self, col: &AnyCol) -> &FontSpec {
        let fonts = &self.config.fonts;
        if col.is_total() {
            &fonts.total_column
        } else if col.is_subtotal() {
            &fonts.subtotal_column
        } else {
            &fonts.header
        }
    }

    fn row_font(&self, col: &AnyCol, row: &GridRow) -> FontSpec {
        let fonts = &self.config.fonts;
        if col.is_total() {
            fonts.total_column.clone()
        } else if col.is_subtotal() {
            fonts.subtotal_column.clone()
        } else if row.is_some_total() {
            fonts.subtotal.clone()
        } else {
            fonts.row.clone()
        }
    }

    fn cell_text(&self, col: &AnyCol, row: &GridRow) -> Option<String> {
        let raw = row.field(col.id())?;
        let descriptor = self.input.descriptor;
        let format = match col {
            AnyCol::Series(series) => series.measure.format.as_deref(),
            AnyCol::MixedValues(_) => row_measure_format(descriptor, row),
            AnyCol::Scope(_) if descriptor.is_transposed() => row_measure_format(descriptor, row),
            _ => return Some(raw.to_string()),
        };
        Some(format_measure_value(raw, format))
    }

    fn collect(&mut self, col: &AnyCol, row: &GridRow, font: &FontSpec) {
        let Some(text) = self.cell_text(col, row) else {
            return;
        };
        if text.is_empty() {
            return;
        }
        let width = self.measure_cached(font, &text);
        self.offer(col.id(), width);
    }
}

fn row_measure_format<'a>(descriptor: &'a TableDescriptor, row: &GridRow) -> Option<&'a str> {
    match row.header_item_map.get(SLICE_MEASURE_COL_ID)? {
        ResultHeader::MeasureHeaderItem { order } => descriptor.measures().get(*order)?.format.as_deref(),
        _ => None,
    }
}

/// Measures the displayed columns against their header and the loaded rows.
///
/// Values the grouping hides are skipped. With [`ColumnAutoresizeOption::Viewport`]
/// measuring stops once the columns measured so far fill the client width. Only
/// columns that had something to measure are in the result.
#[must_use]
pub fn auto_size_columns(
    input: &AutoSizeInput<'_>,
    measurer: &dyn TextMeasurer,
    config: &AutoSizeConfig,
) -> HashMap<String, f32> {
    let mut pass = Pass {
        input,
        measurer,
        config,
        cache: HashMap::new(),
        max_widths: HashMap::new(),
    };
    let viewport = config.option == ColumnAutoresizeOption::Viewport;
    let mut measured_total = 0.;

    for col_id in input.columns {
        if viewport && config.client_width.is_some_and(|client| measured_total > client) {
            break;
        }
        let Some(col) = input.descriptor.find_col(col_id) else {
            continue;
        };

        if config.measure_headers
            && let Some(header) = input.descriptor.header_name(col_id).filter(|h| !h.is_empty())
        {
            let font = pass.header_font(col).clone();
            let sort = if (input.is_sorted)(col_id) { SORT_ICON_WIDTH } else { 0. };
            let width = measurer.measure(&font, &header) + sort;
            pass.offer(col_id, width);
        }

        for (index, row) in input.rows.iter().enumerate() {
            if (input.is_repeated)(col_id, index) {
                continue;
            }
            let font = pass.row_font(col, row);
            pass.collect(col, row, &font);
        }
        let total_font = config.fonts.total.clone();
        for row in input.total_rows {
            pass.collect(col, row, &total_font);
        }

        if viewport {
            measured_total += match input.store.manual_width(col) {
                Some(manual) => manual.width,
                None => auto_col_width(pass.max_widths.get(col_id).copied(), config.padding),
            };
        }
    }

    pass.max_widths
        .into_iter()
        .filter(|(_, width)| *width > 0.)
        .map(|(id, width)| (id, auto_col_width(Some(width), config.padding)))
        .collect()
}
