//! Versioned, self-describing schema for a serialized spreadsheet region.

use serde::{Deserialize, Serialize};

use crate::frame::PayloadMode;

/// Longest string value carried verbatim; longer values are cut and marked.
pub const MAX_TEXT_LEN: usize = 1000;
pub const TRUNCATION_MARKER: &str = "...[TRUNCATED]";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionPayload {
    pub meta: RegionMeta,
    /// Row-major cell values, `height` rows of `width` values.
    pub data: Vec<Vec<CellValue>>,
    /// Same shape as `data`.
    pub styles: Vec<Vec<CellStyle>>,
    /// Merge references relative to the region's top-left cell (`A1`).
    pub merged: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionMeta {
    pub source: String,
    pub sheet: String,
    pub region: String,
    pub version: u32,
    pub timestamp: String,
    pub mode: PayloadMode,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Formula text without the leading `=`, e.g. `"A1*3"`.
    Formula(String),
}

impl CellValue {
    /// Builds a text value, truncating it past `MAX_TEXT_LEN` characters.
    pub fn text(value: &str) -> Self {
        if value.chars().count() > MAX_TEXT_LEN {
            let mut cut: String = value.chars().take(MAX_TEXT_LEN).collect();
            cut.push_str(TRUNCATION_MARKER);
            CellValue::Text(cut)
        } else {
            CellValue::Text(value.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

/// Flat style descriptor; a `None` attribute is left at the workbook default.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CellStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<FontStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<FillStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<BorderStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<AlignmentStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_format: Option<String>,
}

impl CellStyle {
    pub fn is_default(&self) -> bool {
        self == &CellStyle::default()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FontStyle {
    pub name: Option<String>,
    pub size: Option<f64>,
    pub bold: bool,
    pub italic: bool,
    pub strike: bool,
    /// ARGB hex, e.g. `"FFFF0000"`.
    pub color: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FillStyle {
    /// Pattern name as stored in the workbook, e.g. `"solid"`.
    pub pattern: String,
    pub fg_color: Option<String>,
    pub bg_color: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BorderStyle {
    pub left: Option<BorderEdge>,
    pub right: Option<BorderEdge>,
    pub top: Option<BorderEdge>,
    pub bottom: Option<BorderEdge>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BorderEdge {
    /// Line style name, e.g. `"thin"`.
    pub style: String,
    pub color: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignmentStyle {
    pub horizontal: Option<String>,
    pub vertical: Option<String>,
    pub wrap_text: bool,
}

impl RegionPayload {
    pub fn width(&self) -> usize {
        self.data.first().map(Vec::len).unwrap_or(0)
    }

    pub fn height(&self) -> usize {
        self.data.len()
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
