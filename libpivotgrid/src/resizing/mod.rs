//! Column widths: persisted overrides, text based auto-sizing and grow-to-fit.
mod autosize;
mod grow;
mod measure;
mod store;

use derive_more::{Display, FromStr};
use serde::{Deserialize, Serialize};

pub use autosize::{
    AutoSizeConfig, AutoSizeInput, FontSpec, FontSpecError, TableFonts, auto_col_width,
    auto_size_columns,
};
pub use grow::{GrowColumn, grow_to_fit};
pub use measure::{FontMeasurer, TextMeasurer};
pub use store::{ColumnWidthState, ManualWidth};

pub const MIN_WIDTH: f32 = 60.;
pub const MANUALLY_SIZED_MAX_WIDTH: f32 = 2000.;
pub const AUTO_SIZED_MAX_WIDTH: f32 = 500.;
/// Extra header width when the sort indicator is shown.
pub const SORT_ICON_WIDTH: f32 = 12.;
/// Cell padding on both sides plus the border.
pub const DEFAULT_AUTOSIZE_PADDING: f32 = 2. * 12. + 1.;
pub const DEFAULT_COLUMN_WIDTH: f32 = 200.;
/// Delay before measuring, so freshly delivered rows are rendered.
pub const COLUMN_RESIZE_TIMEOUT_MS: u64 = 300;

/// When columns are sized to their content.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, FromStr, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum ColumnAutoresizeOption {
    /// Columns keep the default width.
    #[default]
    Unset,
    /// Only columns within the client width are measured.
    Viewport,
    AutoresizeAll,
}

impl ColumnAutoresizeOption {
    #[must_use]
    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Viewport | Self::AutoresizeAll)
    }
}
