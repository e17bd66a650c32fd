//! Persisted column width items.
//!
//! The JSON shape is a tagged union keyed by item kind. Measure items without
//! locators apply to all measures, a single `locator` makes a weak per-measure
//! item and a `locators` list binds the width to one specific column.
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::definition::TotalType;

/// Pixel width or the `auto` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawColumnWidth", into = "RawColumnWidth")]
pub struct ColumnWidth {
    pub value: WidthValue,
    pub allow_grow_to_fit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WidthValue {
    Pixels(f32),
    Auto,
}

impl ColumnWidth {
    #[must_use]
    pub fn pixels(value: f32) -> Self {
        Self {
            value: WidthValue::Pixels(value),
            allow_grow_to_fit: false,
        }
    }

    #[must_use]
    pub fn auto() -> Self {
        Self {
            value: WidthValue::Auto,
            allow_grow_to_fit: false,
        }
    }

    #[must_use]
    pub fn with_grow_to_fit(mut self, allow_grow_to_fit: bool) -> Self {
        self.allow_grow_to_fit = allow_grow_to_fit;
        self
    }

    #[must_use]
    pub fn is_auto(&self) -> bool {
        self.value == WidthValue::Auto
    }

    #[must_use]
    pub fn as_pixels(&self) -> Option<f32> {
        match self.value {
            WidthValue::Pixels(px) => Some(px),
            WidthValue::Auto => None,
        }
    }

    /// Clamps pixel widths into `[min, max]`, leaving `auto` untouched.
    #[must_use]
    pub fn clamped(self, min: f32, max: f32) -> Self {
        match self.value {
            WidthValue::Pixels(px) => Self {
                value: WidthValue::Pixels(px.clamp(min, max)),
                ..self
            },
            WidthValue::Auto => self,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawColumnWidth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<RawWidthValue>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    allow_grow_to_fit: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawWidthValue {
    Number(f64),
    Keyword(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WidthItemError {
    #[error("width must be a positive finite number or \"auto\", got {0}")]
    InvalidWidth(String),
    #[error("weak measure width item needs a measure locator")]
    InvalidWeakLocator,
    #[error("measure width item has an empty locator list")]
    EmptyLocators,
}

impl TryFrom<RawColumnWidth> for ColumnWidth {
    type Error = WidthItemError;

    fn try_from(raw: RawColumnWidth) -> Result<Self, Self::Error> {
        let value = match raw.value {
            None => WidthValue::Auto,
            Some(RawWidthValue::Keyword(k)) if k == "auto" => WidthValue::Auto,
            Some(RawWidthValue::Keyword(k)) => return Err(WidthItemError::InvalidWidth(k)),
            Some(RawWidthValue::Number(n)) if n.is_finite() && n > 0.0 => {
                WidthValue::Pixels(n as f32)
            }
            Some(RawWidthValue::Number(n)) => {
                return Err(WidthItemError::InvalidWidth(n.to_string()));
            }
        };
        Ok(Self {
            value,
            allow_grow_to_fit: raw.allow_grow_to_fit,
        })
    }
}

impl From<ColumnWidth> for RawColumnWidth {
    fn from(width: ColumnWidth) -> Self {
        Self {
            value: Some(match width.value {
                WidthValue::Pixels(px) => RawWidthValue::Number(f64::from(px)),
                WidthValue::Auto => RawWidthValue::Keyword("auto".to_string()),
            }),
            allow_grow_to_fit: width.allow_grow_to_fit,
        }
    }
}

/// One step of the path that identifies a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LocatorItem {
    #[serde(rename_all = "camelCase")]
    AttributeLocatorItem {
        attribute_identifier: String,
        element: String,
    },
    #[serde(rename_all = "camelCase")]
    MeasureLocatorItem { measure_identifier: String },
    #[serde(rename_all = "camelCase")]
    TotalLocatorItem {
        attribute_identifier: String,
        total_function: TotalType,
    },
}

impl LocatorItem {
    #[must_use]
    pub fn attribute(attribute_identifier: impl Into<String>, element: impl Into<String>) -> Self {
        Self::AttributeLocatorItem {
            attribute_identifier: attribute_identifier.into(),
            element: element.into(),
        }
    }

    #[must_use]
    pub fn measure(measure_identifier: impl Into<String>) -> Self {
        Self::MeasureLocatorItem {
            measure_identifier: measure_identifier.into(),
        }
    }

    #[must_use]
    pub fn measure_identifier(&self) -> Option<&str> {
        match self {
            Self::MeasureLocatorItem { measure_identifier } => Some(measure_identifier),
            _ => None,
        }
    }
}

/// A persisted width setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawColumnWidthItem", into = "RawColumnWidthItem")]
pub enum ColumnWidthItem {
    Attribute {
        attribute_identifier: String,
        width: ColumnWidth,
    },
    /// Bound to exactly one column.
    Measure {
        locators: Vec<LocatorItem>,
        width: ColumnWidth,
    },
    AllMeasures {
        width: ColumnWidth,
    },
    /// Bound to every column of one measure.
    WeakMeasure {
        measure_identifier: String,
        width: ColumnWidth,
    },
    SliceMeasure {
        width: ColumnWidth,
    },
    MixedValues {
        locators: Vec<LocatorItem>,
        width: ColumnWidth,
    },
}

impl ColumnWidthItem {
    #[must_use]
    pub fn width(&self) -> ColumnWidth {
        match self {
            Self::Attribute { width, .. }
            | Self::Measure { width, .. }
            | Self::AllMeasures { width }
            | Self::WeakMeasure { width, .. }
            | Self::SliceMeasure { width }
            | Self::MixedValues { width, .. } => *width,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum RawColumnWidthItem {
    AttributeColumnWidthItem(RawAttributeItem),
    MeasureColumnWidthItem(RawMeasureItem),
    SliceMeasureColumnWidthItem(RawSliceMeasureItem),
    MixedValuesColumnWidthItem(RawMixedValuesItem),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAttributeItem {
    attribute_identifier: String,
    width: ColumnWidth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMeasureItem {
    width: ColumnWidth,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    locators: Option<Vec<LocatorItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    locator: Option<LocatorItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSliceMeasureItem {
    width: ColumnWidth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMixedValuesItem {
    width: ColumnWidth,
    #[serde(default)]
    locators: Vec<LocatorItem>,
}

impl TryFrom<RawColumnWidthItem> for ColumnWidthItem {
    type Error = WidthItemError;

    fn try_from(raw: RawColumnWidthItem) -> Result<Self, Self::Error> {
        Ok(match raw {
            RawColumnWidthItem::AttributeColumnWidthItem(item) => Self::Attribute {
                attribute_identifier: item.attribute_identifier,
                width: item.width,
            },
            RawColumnWidthItem::MeasureColumnWidthItem(item) => match (item.locators, item.locator)
            {
                (Some(locators), _) if locators.is_empty() => {
                    return Err(WidthItemError::EmptyLocators);
                }
                (Some(locators), _) => Self::Measure {
                    locators,
                    width: item.width,
                },
                (None, Some(LocatorItem::MeasureLocatorItem { measure_identifier })) => {
                    Self::WeakMeasure {
                        measure_identifier,
                        width: item.width,
                    }
                }
                (None, Some(_)) => return Err(WidthItemError::InvalidWeakLocator),
                (None, None) => Self::AllMeasures { width: item.width },
            },
            RawColumnWidthItem::SliceMeasureColumnWidthItem(item) => {
                Self::SliceMeasure { width: item.width }
            }
            RawColumnWidthItem::MixedValuesColumnWidthItem(item) => Self::MixedValues {
                locators: item.locators,
                width: item.width,
            },
        })
    }
}

impl From<ColumnWidthItem> for RawColumnWidthItem {
    fn from(item: ColumnWidthItem) -> Self {
        match item {
            ColumnWidthItem::Attribute {
                attribute_identifier,
                width,
            } => Self::AttributeColumnWidthItem(RawAttributeItem {
                attribute_identifier,
                width,
            }),
            ColumnWidthItem::Measure { locators, width } => {
                Self::MeasureColumnWidthItem(RawMeasureItem {
                    width,
                    locators: Some(locators),
                    locator: None,
                })
            }
            ColumnWidthItem::AllMeasures { width } => Self::MeasureColumnWidthItem(RawMeasureItem {
                width,
                locators: None,
                locator: None,
            }),
            ColumnWidthItem::WeakMeasure {
                measure_identifier,
                width,
            } => Self::MeasureColumnWidthItem(RawMeasureItem {
                width,
                locators: None,
                locator: Some(LocatorItem::MeasureLocatorItem { measure_identifier }),
            }),
            ColumnWidthItem::SliceMeasure { width } => {
                Self::SliceMeasureColumnWidthItem(RawSliceMeasureItem { width })
            }
            ColumnWidthItem::MixedValues { locators, width } => {
                Self::MixedValuesColumnWidthItem(RawMixedValuesItem { width, locators })
            }
        }
    }
}

/// Parses a JSON array of width items, dropping the ones that do not parse.
///
/// Anything that is not an array yields no items.
#[must_use]
pub fn parse_column_width_items_lenient(value: &serde_json::Value) -> Vec<ColumnWidthItem> {
    let Some(items) = value.as_array() else {
        debug!("Ignoring column widths that are not a list: {value}");
        return vec![];
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<ColumnWidthItem>(item.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!("Dropping malformed column width item {item}: {e}");
                None
            }
        })
        .collect()
}
