//! Spreadsheet adapter: reads a rectangle out of an xlsx workbook and
//! rebuilds one from a `RegionPayload`.

use std::io::Cursor;
use std::path::Path;
use std::str::FromStr;

use umya_spreadsheet::{
    Cell, EnumTrait, HorizontalAlignmentValues, PatternValues, Spreadsheet, Style,
    VerticalAlignmentValues, Worksheet,
};

use crate::error::{Error, Result};
use crate::range::CellRange;
use crate::region::{
    AlignmentStyle, BorderEdge, BorderStyle, CellStyle, CellValue, FillStyle, FontStyle,
    RegionPayload,
};

/// Excel limits sheet titles to 31 characters.
pub const SHEET_NAME_MAX: usize = 31;
const SHEET_NAME_FORBIDDEN: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// Cell contents of a region, row-major.
pub struct RegionTable {
    pub sheet: String,
    pub data: Vec<Vec<CellValue>>,
    pub styles: Vec<Vec<CellStyle>>,
    pub merged: Vec<String>,
}

pub fn load(bytes: &[u8]) -> Result<Spreadsheet> {
    umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(bytes), true)
        .map_err(|e| Error::Serialization(format!("cannot read workbook: {}", e)))
}

pub fn sheet_names(book: &Spreadsheet) -> Vec<String> {
    book.get_sheet_collection()
        .iter()
        .map(|sheet| sheet.get_name().to_string())
        .collect()
}

/// Picks `sheet_name` when present, the active sheet otherwise.
pub fn select_sheet<'a>(book: &'a Spreadsheet, sheet_name: Option<&str>) -> &'a Worksheet {
    if let Some(name) = sheet_name {
        if let Some(sheet) = book.get_sheet_by_name(name) {
            return sheet;
        }
        log::warn!("sheet {:?} not found, using the active sheet", name);
    }
    book.get_active_sheet()
}

/// Highest column and row holding a cell or a merge.
pub fn used_extent(sheet: &Worksheet) -> (u32, u32) {
    let (mut max_col, mut max_row) = sheet.get_highest_column_and_row();
    for merge in sheet.get_merge_cells() {
        if let Ok(range) = CellRange::parse(&merge.get_range()) {
            max_col = max_col.max(range.max_col);
            max_row = max_row.max(range.max_row);
        }
    }
    (max_col, max_row)
}

/// Cuts `range` to the part of the sheet that holds anything; the cells
/// past it would all read as empty.
pub fn clamp_to_used(sheet: &Worksheet, range: &CellRange) -> CellRange {
    let (max_col, max_row) = used_extent(sheet);
    let clamped = range.clamp_to(max_col, max_row);
    if clamped != *range {
        log::debug!("region {} clamped to the used area {}", range, clamped);
    }
    clamped
}

pub fn read_region(sheet: &Worksheet, range: &CellRange) -> RegionTable {
    let mut data = Vec::with_capacity(range.height() as usize);
    let mut styles = Vec::with_capacity(range.height() as usize);

    for row in range.min_row..=range.max_row {
        let mut row_data = Vec::with_capacity(range.width() as usize);
        let mut row_styles = Vec::with_capacity(range.width() as usize);
        for col in range.min_col..=range.max_col {
            match sheet.get_cell((col, row)) {
                Some(cell) => {
                    row_data.push(cell_value(cell));
                    row_styles.push(extract_style(cell.get_style()));
                }
                None => {
                    row_data.push(CellValue::Empty);
                    row_styles.push(CellStyle::default());
                }
            }
        }
        data.push(row_data);
        styles.push(row_styles);
    }

    let mut merged = Vec::new();
    for merge in sheet.get_merge_cells() {
        let reference = merge.get_range();
        match CellRange::parse(&reference) {
            Ok(merge_range) if range.contains(&merge_range) => {
                merged.push(merge_range.rebase(range).to_string());
            }
            Ok(_) => log::debug!("merge {} lies outside {}, not carried", reference, range),
            Err(e) => log::warn!("skip unreadable merge reference {:?}: {}", reference, e),
        }
    }

    RegionTable {
        sheet: sheet.get_name().to_string(),
        data,
        styles,
        merged,
    }
}

/// Builds a fresh workbook holding `payload` from `A1` and saves it to `path`.
pub fn write_region(payload: &RegionPayload, path: &Path) -> Result<()> {
    let mut book = umya_spreadsheet::new_file();
    let sheet = book
        .get_sheet_mut(&0)
        .ok_or_else(|| Error::Workbook("new workbook has no sheet".into()))?;
    sheet.set_name(sheet_title(&payload.meta.sheet));

    let mut style_failures = 0usize;
    for (r, (row_data, row_styles)) in payload.data.iter().zip(&payload.styles).enumerate() {
        for (c, (value, style)) in row_data.iter().zip(row_styles).enumerate() {
            let coordinate = (c as u32 + 1, r as u32 + 1);
            match value {
                CellValue::Empty => {}
                CellValue::Text(s) => {
                    sheet.get_cell_mut(coordinate).set_value_string(s.as_str());
                }
                CellValue::Number(n) => {
                    sheet.get_cell_mut(coordinate).set_value_number(*n);
                }
                CellValue::Bool(b) => {
                    sheet.get_cell_mut(coordinate).set_value_bool(*b);
                }
                CellValue::Formula(f) => {
                    sheet.get_cell_mut(coordinate).set_formula(f.as_str());
                }
            }
            if !style.is_default() {
                style_failures += apply_style(sheet.get_style_mut(coordinate), style);
            }
        }
    }
    if style_failures > 0 {
        log::warn!("{} style attributes could not be restored", style_failures);
    }

    for reference in &payload.merged {
        match CellRange::parse(reference) {
            Ok(merge) => {
                sheet.add_merge_cells(merge.to_string());
            }
            Err(e) => log::warn!("skip merge {:?}: {}", reference, e),
        }
    }

    umya_spreadsheet::writer::xlsx::write(&book, path)
        .map_err(|e| Error::Workbook(format!("cannot save {}: {}", path.display(), e)))
}

fn sheet_title(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if SHEET_NAME_FORBIDDEN.contains(&c) { '_' } else { c })
        .take(SHEET_NAME_MAX)
        .collect();
    if cleaned.trim().is_empty() {
        "Restored".to_string()
    } else {
        cleaned
    }
}

fn cell_value(cell: &Cell) -> CellValue {
    // formulas win over their cached result, which may be absent
    let formula = cell.get_formula();
    if !formula.is_empty() {
        return CellValue::Formula(formula.trim_start_matches('=').to_string());
    }
    let raw = cell.get_value();
    if raw.is_empty() {
        return CellValue::Empty;
    }
    match cell.get_data_type() {
        "n" => match cell.get_value_number() {
            Some(n) => CellValue::Number(n),
            None => CellValue::text(&raw),
        },
        "b" => CellValue::Bool(raw.eq_ignore_ascii_case("true") || raw == "1"),
        _ => CellValue::text(&raw),
    }
}

// ============================================================================
// Style descriptors
// ============================================================================

fn argb(color: &umya_spreadsheet::Color) -> Option<String> {
    let value = color.get_argb();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

pub fn extract_style(style: &Style) -> CellStyle {
    let font = style.get_font().map(|font| FontStyle {
        name: Some(font.get_name().to_string()).filter(|n| !n.is_empty()),
        size: Some(font.get_size().to_owned()).filter(|s| *s > 0.0),
        bold: font.get_bold().to_owned(),
        italic: font.get_italic().to_owned(),
        strike: font.get_strikethrough().to_owned(),
        color: argb(font.get_color()),
    });

    let fill = style
        .get_fill()
        .and_then(|fill| fill.get_pattern_fill())
        .and_then(|pattern| {
            let name = pattern.get_pattern_type().get_value_string();
            if name == "none" {
                return None;
            }
            Some(FillStyle {
                pattern: name.to_string(),
                fg_color: pattern.get_foreground_color().and_then(argb),
                bg_color: pattern.get_background_color().and_then(argb),
            })
        });

    let border = style.get_borders().and_then(|borders| {
        let edge = |border: &umya_spreadsheet::Border| {
            let line = border.get_border_style();
            if line.is_empty() || line == "none" {
                None
            } else {
                Some(BorderEdge {
                    style: line.to_string(),
                    color: argb(border.get_color()),
                })
            }
        };
        let descriptor = BorderStyle {
            left: edge(borders.get_left()),
            right: edge(borders.get_right()),
            top: edge(borders.get_top()),
            bottom: edge(borders.get_bottom()),
        };
        if descriptor == BorderStyle::default() {
            None
        } else {
            Some(descriptor)
        }
    });

    let alignment = style.get_alignment().map(|alignment| AlignmentStyle {
        horizontal: Some(alignment.get_horizontal().get_value_string().to_string())
            .filter(|h| h != "general"),
        vertical: Some(alignment.get_vertical().get_value_string().to_string())
            .filter(|v| v != "bottom"),
        wrap_text: alignment.get_wrap_text().to_owned(),
    });

    let number_format = style
        .get_number_format()
        .map(|format| format.get_format_code().to_string())
        .filter(|code| !code.is_empty() && code != "General");

    CellStyle {
        font,
        fill,
        border,
        alignment,
        number_format,
    }
}

/// Applies every attribute it can; returns how many attributes failed.
/// A failed attribute is logged and does not stop the rest.
pub fn apply_style(target: &mut Style, style: &CellStyle) -> usize {
    let results = [
        ("font", style.font.as_ref().map(|f| apply_font(target, f))),
        ("fill", style.fill.as_ref().map(|f| apply_fill(target, f))),
        ("border", style.border.as_ref().map(|b| apply_border(target, b))),
        (
            "alignment",
            style.alignment.as_ref().map(|a| apply_alignment(target, a)),
        ),
        (
            "number_format",
            style.number_format.as_ref().map(|code| {
                target.get_number_format_mut().set_format_code(code.as_str());
                Ok(())
            }),
        ),
    ];

    let mut failures = 0;
    for (attribute, result) in results {
        if let Some(Err(reason)) = result {
            log::warn!("style attribute {} not applied: {}", attribute, reason);
            failures += 1;
        }
    }
    failures
}

fn apply_font(target: &mut Style, font: &FontStyle) -> std::result::Result<(), String> {
    let out = target.get_font_mut();
    if let Some(name) = &font.name {
        out.set_name(name.as_str());
    }
    if let Some(size) = font.size {
        if !size.is_finite() || size <= 0.0 {
            return Err(format!("invalid font size {}", size));
        }
        out.set_size(size);
    }
    out.set_bold(font.bold);
    out.set_italic(font.italic);
    out.set_strikethrough(font.strike);
    if let Some(color) = &font.color {
        out.get_color_mut().set_argb(color.as_str());
    }
    Ok(())
}

fn apply_fill(target: &mut Style, fill: &FillStyle) -> std::result::Result<(), String> {
    let pattern = PatternValues::from_str(&fill.pattern)
        .map_err(|_| format!("unknown fill pattern {:?}", fill.pattern))?;
    let out = target.get_fill_mut().get_pattern_fill_mut();
    out.set_pattern_type(pattern);
    if let Some(color) = &fill.fg_color {
        out.get_foreground_color_mut().set_argb(color.as_str());
    }
    if let Some(color) = &fill.bg_color {
        out.get_background_color_mut().set_argb(color.as_str());
    }
    Ok(())
}

fn apply_border(target: &mut Style, border: &BorderStyle) -> std::result::Result<(), String> {
    let borders = target.get_borders_mut();
    apply_edge(borders.get_left_mut(), border.left.as_ref())?;
    apply_edge(borders.get_right_mut(), border.right.as_ref())?;
    apply_edge(borders.get_top_mut(), border.top.as_ref())?;
    apply_edge(borders.get_bottom_mut(), border.bottom.as_ref())?;
    Ok(())
}

fn apply_edge(
    out: &mut umya_spreadsheet::Border,
    edge: Option<&BorderEdge>,
) -> std::result::Result<(), String> {
    let Some(edge) = edge else { return Ok(()) };
    if edge.style.is_empty() {
        return Err("empty border style".into());
    }
    out.set_border_style(edge.style.as_str());
    if let Some(color) = &edge.color {
        out.get_color_mut().set_argb(color.as_str());
    }
    Ok(())
}

fn apply_alignment(
    target: &mut Style,
    alignment: &AlignmentStyle,
) -> std::result::Result<(), String> {
    let out = target.get_alignment_mut();
    if let Some(horizontal) = &alignment.horizontal {
        let value = HorizontalAlignmentValues::from_str(horizontal)
            .map_err(|_| format!("unknown horizontal alignment {:?}", horizontal))?;
        out.set_horizontal(value);
    }
    if let Some(vertical) = &alignment.vertical {
        let value = VerticalAlignmentValues::from_str(vertical)
            .map_err(|_| format!("unknown vertical alignment {:?}", vertical))?;
        out.set_vertical(value);
    }
    out.set_wrap_text(alignment.wrap_text);
    Ok(())
}

#[cfg(test)]
#[path = "workbook_test.rs"]
mod workbook_test;
