//! Turns a source file, or a rectangle of a spreadsheet, into a sealed frame.

use crate::error::{Error, Result};
use crate::frame::{CompressedFrame, PayloadMode};
use crate::range::CellRange;
use crate::region::{RegionMeta, RegionPayload};
use crate::workbook;

/// Largest region, in cells, read out of a workbook by default.
pub const DEFAULT_MAX_REGION_CELLS: u64 = 1_000_000;

pub struct Serializer {
    version: u32,
    source_name: String,
    max_region_cells: u64,
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new(crate::frame::FORMAT_VERSION)
    }
}

impl Serializer {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            source_name: "workbook.xlsx".to_string(),
            max_region_cells: DEFAULT_MAX_REGION_CELLS,
        }
    }

    pub fn with_max_region_cells(mut self, cells: u64) -> Self {
        self.max_region_cells = cells;
        self
    }

    /// Name recorded in the region metadata.
    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = name.into();
        self
    }

    /// Compresses `source` as-is; the frame carries the file-mode marker.
    pub fn serialize_file(&self, source: &[u8]) -> Result<CompressedFrame> {
        let frame = CompressedFrame::seal(PayloadMode::File, self.version, source)?;
        log::debug!(
            "file payload: {} bytes -> {} bytes on the wire",
            source.len(),
            frame.wire_len()
        );
        Ok(frame)
    }

    /// Reads `range_spec` from `sheet_name` (or the active sheet) of an xlsx
    /// workbook and seals it as a region frame.
    ///
    /// Rows and columns past the sheet's used area are dropped; they would
    /// restore as nothing. What remains must fit `max_region_cells`.
    pub fn serialize_region(
        &self,
        source: &[u8],
        range_spec: &str,
        sheet_name: Option<&str>,
    ) -> Result<CompressedFrame> {
        let range = CellRange::parse(range_spec)?;
        let book = workbook::load(source)?;
        let sheet = workbook::select_sheet(&book, sheet_name);
        let used = workbook::clamp_to_used(sheet, &range);
        if used.cell_count() > self.max_region_cells {
            return Err(Error::Serialization(format!(
                "region {} spans {} cells, the limit is {}",
                used,
                used.cell_count(),
                self.max_region_cells
            )));
        }
        let table = workbook::read_region(sheet, &used);

        let payload = RegionPayload {
            meta: RegionMeta {
                source: self.source_name.clone(),
                sheet: table.sheet,
                region: range.to_string(),
                version: self.version,
                timestamp: chrono::Local::now().to_rfc3339(),
                mode: PayloadMode::Region,
            },
            data: table.data,
            styles: table.styles,
            merged: table.merged,
        };
        let raw = payload
            .to_json()
            .map_err(|e| Error::Serialization(format!("cannot encode region: {}", e)))?;

        let frame = CompressedFrame::seal(PayloadMode::Region, self.version, &raw)?;
        log::info!(
            "region {} of sheet {:?}: {}x{} cells, {} merges, {} bytes on the wire",
            payload.meta.region,
            payload.meta.sheet,
            payload.width(),
            payload.height(),
            payload.merged.len(),
            frame.wire_len()
        );
        Ok(frame)
    }
}
