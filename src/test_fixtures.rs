//! Shared fixtures for unit tests.

use std::io::Cursor;

use umya_spreadsheet::{Border, HorizontalAlignmentValues, PatternValues};

pub const FIXTURE_SHEET: &str = "Inventory";

/// A two-sheet workbook whose "Inventory" sheet holds a styled 2x2 block at
/// `A1:B2` with `A1:B1` merged, a formula without a cached value at `C2`, and
/// an unrelated merge at `D5:E6`.
pub fn styled_workbook() -> umya_spreadsheet::Spreadsheet {
    let mut book = umya_spreadsheet::new_file();
    let _ = book.new_sheet(FIXTURE_SHEET);
    let sheet = book
        .get_sheet_by_name_mut(FIXTURE_SHEET)
        .expect("fixture sheet exists");

    sheet.get_cell_mut("A1").set_value_string("Item");
    sheet.get_cell_mut("B1").set_value_number(42);
    sheet.get_cell_mut("A2").set_value_bool(true);
    sheet.get_cell_mut("B2").set_value_string("centered");
    sheet.get_cell_mut("C2").set_formula("B1*3");

    let a1 = sheet.get_style_mut("A1");
    a1.get_font_mut().set_bold(true);
    a1.get_font_mut().get_color_mut().set_argb("FFFF0000");

    let b1 = sheet.get_style_mut("B1");
    b1.get_fill_mut()
        .get_pattern_fill_mut()
        .set_pattern_type(PatternValues::Solid);
    b1.get_fill_mut()
        .get_pattern_fill_mut()
        .get_foreground_color_mut()
        .set_argb("FFFFFF00");
    b1.get_number_format_mut().set_format_code("0.00");

    let b2 = sheet.get_style_mut("B2");
    b2.get_borders_mut()
        .get_bottom_mut()
        .set_border_style(Border::BORDER_THIN);
    b2.get_alignment_mut()
        .set_horizontal(HorizontalAlignmentValues::Center);
    b2.get_alignment_mut().set_wrap_text(true);

    sheet.add_merge_cells("A1:B1");
    sheet.add_merge_cells("D5:E6");
    book
}

pub fn styled_workbook_bytes() -> Vec<u8> {
    let book = styled_workbook();
    let mut cursor = Cursor::new(Vec::new());
    umya_spreadsheet::writer::xlsx::write_writer(&book, &mut cursor)
        .expect("fixture workbook serializes");
    cursor.into_inner()
}

/// Deterministic pseudo-random bytes; compresses poorly.
pub fn noise(len: usize, seed: u64) -> Vec<u8> {
    use rand::{Rng, SeedableRng, rngs::StdRng};
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = vec![0u8; len];
    rng.fill(out.as_mut_slice());
    out
}
