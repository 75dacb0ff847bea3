//! Write-then-read tests for everything a tracker worksheet carries

use pretty_assertions::assert_eq;
use std::io::Cursor;
use tracker_sheets_core::{
    CellRange, CellValue, CfRuleType, Color, ConditionalFormatRule, DataValidation, FreezePanes,
    HorizontalAlignment, NumberFormat, Style, ValidationType, Workbook,
};
use tracker_sheets_xlsx::{XlsxReader, XlsxWriter};

fn tracker_like_workbook() -> Workbook {
    let mut wb = Workbook::empty();
    for name in ["Easy", "Medium"] {
        wb.add_worksheet_with_name(name).unwrap();
    }

    let sheet = wb.worksheet_mut(0).unwrap();
    let header = Style::new().bold(true);
    for (col, title) in ["Q.No", "Title", "Status"].iter().enumerate() {
        sheet.set_cell_value_at(0, col as u16, *title).unwrap();
        sheet.set_cell_style_at(0, col as u16, &header).unwrap();
    }
    sheet.set_cell_value("A2", 1.0).unwrap();
    sheet.set_cell_value("B2", "Coin & Dice").unwrap();
    sheet.set_cell_value("C2", "To Solve").unwrap();
    sheet
        .set_cell_formula("D2", "=SUMPRODUCT(--EXACT(C2:C2,\"Solved\"))")
        .unwrap();
    sheet
        .set_cell_style("E2", &Style::new().number_format("0.0\"%\""))
        .unwrap();

    sheet.set_column_width(0, 6.0);
    sheet.set_column_width(1, 30.0);
    sheet.set_freeze_panes(1, 0);
    sheet
        .merge_cells(&CellRange::parse("C4:E4").unwrap())
        .unwrap();

    let status = CellRange::parse("C2:C2").unwrap();
    sheet.add_conditional_format(
        ConditionalFormatRule::expression("EXACT(C2,\"Solved\")")
            .with_range(status)
            .with_priority(2)
            .with_format(
                Style::new()
                    .fill_color(Color::rgb(0x00, 0xB0, 0x50))
                    .font_color(Color::WHITE)
                    .bold(true)
                    .horizontal_alignment(HorizontalAlignment::Center),
            ),
    );
    sheet.add_data_validation(
        DataValidation::list_of(["To Solve", "Solved", "Revisit"])
            .with_range(status)
            .with_input_message("", "Select a status")
            .with_error_message("", "Choose from the list only"),
    );

    wb
}

fn write_to_vec(wb: &Workbook) -> Vec<u8> {
    let mut buf = Vec::new();
    XlsxWriter::write(wb, Cursor::new(&mut buf)).unwrap();
    buf
}

#[test]
fn test_roundtrip_sheet_order_and_values() {
    let buf = write_to_vec(&tracker_like_workbook());
    let wb = XlsxReader::read(Cursor::new(&buf)).unwrap();

    let names: Vec<_> = wb.worksheets().map(|ws| ws.name()).collect();
    assert_eq!(names, ["Easy", "Medium"]);
    assert!(wb.worksheet(1).unwrap().is_empty());

    let sheet = wb.worksheet(0).unwrap();
    assert_eq!(sheet.get_value("A1").unwrap(), CellValue::String("Q.No".into()));
    assert_eq!(sheet.get_value("A2").unwrap(), CellValue::Number(1.0));
    assert_eq!(
        sheet.get_value("B2").unwrap(),
        CellValue::String("Coin & Dice".into())
    );
    assert_eq!(
        sheet.get_value("D2").unwrap(),
        CellValue::formula("=SUMPRODUCT(--EXACT(C2:C2,\"Solved\"))")
    );
}

#[test]
fn test_roundtrip_layout() {
    let buf = write_to_vec(&tracker_like_workbook());
    let wb = XlsxReader::read(Cursor::new(&buf)).unwrap();
    let sheet = wb.worksheet(0).unwrap();

    assert_eq!(sheet.column_width(0), 6.0);
    assert_eq!(sheet.column_width(1), 30.0);
    assert_eq!(sheet.freeze_panes(), Some(&FreezePanes { row: 1, col: 0 }));
    assert_eq!(
        sheet.merged_regions(),
        [CellRange::parse("C4:E4").unwrap()].as_slice()
    );
}

#[test]
fn test_roundtrip_styles() {
    let buf = write_to_vec(&tracker_like_workbook());
    let wb = XlsxReader::read(Cursor::new(&buf)).unwrap();
    let sheet = wb.worksheet(0).unwrap();

    assert!(sheet.cell_style("B1").unwrap().unwrap().font.bold);
    assert_eq!(
        sheet.cell_style("E2").unwrap().unwrap().number_format,
        NumberFormat::Custom("0.0\"%\"".into())
    );
    assert!(sheet.cell_style("A2").unwrap().is_none());
}

#[test]
fn test_roundtrip_conditional_format() {
    let buf = write_to_vec(&tracker_like_workbook());
    let wb = XlsxReader::read(Cursor::new(&buf)).unwrap();
    let sheet = wb.worksheet(0).unwrap();

    let rules = sheet.conditional_formats_at(1, 2);
    assert_eq!(rules.len(), 1);
    let rule = rules[0];
    assert_eq!(
        rule.rule_type,
        CfRuleType::Expression {
            formula: "EXACT(C2,\"Solved\")".into()
        }
    );
    assert_eq!(rule.priority, 2);

    let format = rule.format.as_ref().unwrap();
    assert_eq!(format.font.color, Color::WHITE);
    assert!(format.font.bold);
    assert_eq!(format.alignment.horizontal, HorizontalAlignment::Center);
}

#[test]
fn test_roundtrip_data_validation() {
    let buf = write_to_vec(&tracker_like_workbook());
    let wb = XlsxReader::read(Cursor::new(&buf)).unwrap();
    let sheet = wb.worksheet(0).unwrap();

    let dv = sheet.data_validation_at(1, 2).unwrap();
    assert_eq!(
        dv.validation_type,
        ValidationType::List {
            source: "To Solve,Solved,Revisit".into()
        }
    );
    assert_eq!(dv.input_message.as_deref(), Some("Select a status"));
    assert_eq!(dv.error_message.as_deref(), Some("Choose from the list only"));
    assert!(dv.allow_blank);
    assert!(dv.show_dropdown);
    assert!(sheet.data_validation_at(2, 2).is_none());
}

#[test]
fn test_rewrite_of_read_workbook_is_identical() {
    let first = write_to_vec(&tracker_like_workbook());
    let reread = XlsxReader::read(Cursor::new(&first)).unwrap();
    let second = write_to_vec(&reread);
    assert!(first == second, "re-written package differs from the first write");
}

#[test]
fn test_write_file_and_read_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tracker.xlsx");

    XlsxWriter::write_file(&tracker_like_workbook(), &path).unwrap();
    let wb = XlsxReader::read_file(&path).unwrap();
    assert_eq!(wb.sheet_count(), 2);
}

#[test]
fn test_control_characters_survive_as_well_formed_xml() {
    let titles = ["Bell\u{7} puzzle", "Tab\u{1}ctl", "under_x0041_score", "tab\tok"];
    let mut wb = Workbook::empty();
    let idx = wb.add_worksheet_with_name("Medium").unwrap();
    let sheet = wb.worksheet_mut(idx).unwrap();
    for (row, title) in titles.iter().enumerate() {
        sheet.set_cell_value_at(row as u32 + 1, 1, *title).unwrap();
    }

    let bytes = write_to_vec(&wb);

    let mut archive = zip::ZipArchive::new(Cursor::new(&bytes)).unwrap();
    let mut sheet_xml = String::new();
    std::io::Read::read_to_string(
        &mut archive.by_name("xl/worksheets/sheet1.xml").unwrap(),
        &mut sheet_xml,
    )
    .unwrap();
    let illegal: Vec<char> = sheet_xml
        .chars()
        .filter(|&c| c < '\u{20}' && !matches!(c, '\t' | '\n' | '\r'))
        .collect();
    assert_eq!(illegal, Vec::<char>::new());

    let read = XlsxReader::read(Cursor::new(&bytes)).unwrap();
    let sheet = read.worksheet(0).unwrap();
    let values: Vec<_> = (1..=titles.len() as u32)
        .map(|row| sheet.get_value_at(row, 1))
        .collect();
    let expected: Vec<_> = titles.iter().map(|t| CellValue::String(t.to_string())).collect();
    assert_eq!(values, expected);
}
