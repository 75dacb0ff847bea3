//! XLSX writer
//!
//! Parts are assembled as XML strings and stored in a deflated ZIP package.
//! Entry timestamps are pinned, so the same workbook always produces the same
//! bytes.

use std::fs::File;
use std::io::{Seek, Write};
use std::path::Path;

use log::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::error::{XlsxError, XlsxResult};
use crate::styles::{escape_xml_attr as escape_xml, XlsxStyleTable};
use tracker_sheets_core::conditional_format::CfRuleType;
use tracker_sheets_core::validation::ValidationType;
use tracker_sheets_core::{CellAddress, CellValue, Workbook, Worksheet};

/// XLSX file writer
pub struct XlsxWriter;

impl XlsxWriter {
    /// Write a workbook to a file path
    pub fn write_file<P: AsRef<Path>>(workbook: &Workbook, path: P) -> XlsxResult<()> {
        let file = File::create(path)?;
        Self::write(workbook, file)
    }

    /// Write a workbook to a writer
    pub fn write<W: Write + Seek>(workbook: &Workbook, writer: W) -> XlsxResult<()> {
        if workbook.is_empty() {
            return Err(XlsxError::InvalidFormat(
                "a workbook needs at least one worksheet".into(),
            ));
        }

        let mut zip = ZipWriter::new(writer);
        let style_table = XlsxStyleTable::build(workbook);

        Self::write_part(&mut zip, "[Content_Types].xml", &Self::content_types_xml(workbook))?;
        Self::write_part(&mut zip, "_rels/.rels", ROOT_RELS_XML)?;
        Self::write_part(&mut zip, "xl/workbook.xml", &Self::workbook_xml(workbook))?;
        Self::write_part(
            &mut zip,
            "xl/_rels/workbook.xml.rels",
            &Self::workbook_rels_xml(workbook),
        )?;
        Self::write_part(&mut zip, "xl/styles.xml", &style_table.to_styles_xml())?;

        for (i, sheet) in workbook.worksheets().enumerate() {
            debug!(
                "writing worksheet '{}' ({} cells, {} rules, {} validations)",
                sheet.name(),
                sheet.cell_count(),
                sheet.conditional_formats().len(),
                sheet.data_validations().len()
            );
            let xml = Self::worksheet_xml(sheet, i, &style_table);
            Self::write_part(&mut zip, &format!("xl/worksheets/sheet{}.xml", i + 1), &xml)?;
        }

        zip.finish()?;
        Ok(())
    }

    fn write_part<W: Write + Seek>(
        zip: &mut ZipWriter<W>,
        name: &str,
        content: &str,
    ) -> XlsxResult<()> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default());
        zip.start_file(name.to_string(), options)?;
        zip.write_all(content.as_bytes())?;
        Ok(())
    }

    fn content_types_xml(workbook: &Workbook) -> String {
        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Default Extension="xml" ContentType="application/xml"/>
    <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
    <Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
        );

        for i in 0..workbook.sheet_count() {
            content.push_str(&format!(
                r#"
    <Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
                i + 1
            ));
        }

        content.push_str("\n</Types>");
        content
    }

    fn workbook_xml(workbook: &Workbook) -> String {
        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
    <sheets>"#,
        );

        for (i, sheet) in workbook.worksheets().enumerate() {
            content.push_str(&format!(
                r#"
        <sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                escape_xml(sheet.name()),
                i + 1,
                i + 1
            ));
        }

        // Formulas carry no cached values, so ask for a full recalculation on open
        content.push_str(
            r#"
    </sheets>
    <calcPr calcId="0" fullCalcOnLoad="1"/>
</workbook>"#,
        );
        content
    }

    fn workbook_rels_xml(workbook: &Workbook) -> String {
        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );

        for i in 0..workbook.sheet_count() {
            content.push_str(&format!(
                r#"
    <Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
                i + 1,
                i + 1
            ));
        }

        content.push_str(&format!(
            r#"
    <Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#,
            workbook.sheet_count() + 1
        ));
        content
    }

    fn worksheet_xml(sheet: &Worksheet, index: usize, style_table: &XlsxStyleTable) -> String {
        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
        );

        Self::write_sheet_views(&mut content, sheet);
        Self::write_columns(&mut content, sheet);
        Self::write_sheet_data(&mut content, sheet, index, style_table);

        let merged_regions = sheet.merged_regions();
        if !merged_regions.is_empty() {
            content.push_str(&format!(
                "\n    <mergeCells count=\"{}\">",
                merged_regions.len()
            ));
            for range in merged_regions {
                content.push_str(&format!("\n        <mergeCell ref=\"{}\"/>", range));
            }
            content.push_str("\n    </mergeCells>");
        }

        Self::write_conditional_formatting(&mut content, sheet, index, style_table);
        Self::write_data_validations(&mut content, sheet);

        content.push_str("\n</worksheet>");
        content
    }

    fn write_sheet_views(content: &mut String, sheet: &Worksheet) {
        let Some(panes) = sheet.freeze_panes() else {
            return;
        };

        let active_pane = match (panes.row > 0, panes.col > 0) {
            (true, true) => "bottomRight",
            (true, false) => "bottomLeft",
            _ => "topRight",
        };
        let mut split = String::new();
        if panes.col > 0 {
            split.push_str(&format!(" xSplit=\"{}\"", panes.col));
        }
        if panes.row > 0 {
            split.push_str(&format!(" ySplit=\"{}\"", panes.row));
        }
        let top_left = CellAddress::new(panes.row, panes.col);

        content.push_str(&format!(
            r#"
    <sheetViews>
        <sheetView workbookViewId="0">
            <pane{} topLeftCell="{}" activePane="{}" state="frozen"/>
            <selection pane="{}"/>
        </sheetView>
    </sheetViews>"#,
            split, top_left, active_pane, active_pane
        ));
    }

    fn write_columns(content: &mut String, sheet: &Worksheet) {
        let widths = sheet.custom_column_widths();
        if widths.is_empty() {
            return;
        }

        content.push_str("\n    <cols>");
        for (&col, &width) in widths {
            content.push_str(&format!(
                "\n        <col min=\"{}\" max=\"{}\" width=\"{}\" customWidth=\"1\"/>",
                col + 1,
                col + 1,
                width
            ));
        }
        content.push_str("\n    </cols>");
    }

    fn write_sheet_data(
        content: &mut String,
        sheet: &Worksheet,
        index: usize,
        style_table: &XlsxStyleTable,
    ) {
        content.push_str("\n    <sheetData>");

        // Sparse, row-major
        let mut current_row: Option<u32> = None;
        for (row, col, cell) in sheet.iter_cells() {
            if current_row != Some(row) {
                if current_row.is_some() {
                    content.push_str("\n        </row>");
                }
                content.push_str(&format!("\n        <row r=\"{}\">", row + 1));
                current_row = Some(row);
            }

            let cell_ref = CellAddress::new(row, col).to_a1_string();
            let xf_id = style_table.xf_id_for(index, cell.style_index);
            let style_attr = if xf_id != 0 {
                format!(" s=\"{}\"", xf_id)
            } else {
                String::new()
            };

            match &cell.value {
                CellValue::Number(n) => {
                    content.push_str(&format!(
                        "\n            <c r=\"{}\"{}><v>{}</v></c>",
                        cell_ref, style_attr, n
                    ));
                }
                CellValue::String(s) => {
                    let space = if s.trim() != s {
                        " xml:space=\"preserve\""
                    } else {
                        ""
                    };
                    content.push_str(&format!(
                        "\n            <c r=\"{}\"{} t=\"inlineStr\"><is><t{}>{}</t></is></c>",
                        cell_ref,
                        style_attr,
                        space,
                        escape_xml(&encode_cell_text(s))
                    ));
                }
                CellValue::Boolean(b) => {
                    content.push_str(&format!(
                        "\n            <c r=\"{}\"{} t=\"b\"><v>{}</v></c>",
                        cell_ref,
                        style_attr,
                        u8::from(*b)
                    ));
                }
                CellValue::Formula { text, .. } => {
                    let formula_text = text.strip_prefix('=').unwrap_or(text);
                    content.push_str(&format!(
                        "\n            <c r=\"{}\"{}><f>{}</f></c>",
                        cell_ref,
                        style_attr,
                        escape_xml(formula_text)
                    ));
                }
                CellValue::Empty => {
                    // Preserve style-only cells
                    content.push_str(&format!("\n            <c r=\"{}\"{}/>", cell_ref, style_attr));
                }
            }
        }

        if current_row.is_some() {
            content.push_str("\n        </row>");
        }

        content.push_str("\n    </sheetData>");
    }

    fn write_conditional_formatting(
        content: &mut String,
        sheet: &Worksheet,
        sheet_index: usize,
        style_table: &XlsxStyleTable,
    ) {
        // One <conditionalFormatting> per rule
        for (rule_idx, rule) in sheet.conditional_formats().iter().enumerate() {
            if rule.ranges.is_empty() {
                continue;
            }

            let sqref = sqref(&rule.ranges);
            let dxf_attr = style_table
                .dxf_id_for(sheet_index, rule_idx)
                .map_or(String::new(), |id| format!(" dxfId=\"{}\"", id));
            let priority = rule.priority.max(1);
            let stop_if_true = if rule.stop_if_true {
                " stopIfTrue=\"1\""
            } else {
                ""
            };

            content.push_str(&format!(
                "\n    <conditionalFormatting sqref=\"{}\">",
                sqref
            ));

            match &rule.rule_type {
                CfRuleType::CellIs {
                    operator,
                    formula1,
                    formula2,
                } => {
                    content.push_str(&format!(
                        "\n        <cfRule type=\"{}\"{} priority=\"{}\"{} operator=\"{}\">\n            <formula>{}</formula>",
                        rule.rule_type.xlsx_type(),
                        dxf_attr,
                        priority,
                        stop_if_true,
                        operator.xlsx_operator(),
                        escape_xml(formula1)
                    ));
                    if let Some(f2) = formula2 {
                        content.push_str(&format!(
                            "\n            <formula>{}</formula>",
                            escape_xml(f2)
                        ));
                    }
                    content.push_str("\n        </cfRule>");
                }
                CfRuleType::Expression { formula } => {
                    content.push_str(&format!(
                        "\n        <cfRule type=\"{}\"{} priority=\"{}\"{}>\n            <formula>{}</formula>\n        </cfRule>",
                        rule.rule_type.xlsx_type(),
                        dxf_attr,
                        priority,
                        stop_if_true,
                        escape_xml(formula.strip_prefix('=').unwrap_or(formula))
                    ));
                }
            }

            content.push_str("\n    </conditionalFormatting>");
        }
    }

    fn write_data_validations(content: &mut String, sheet: &Worksheet) {
        let validations: Vec<_> = sheet
            .data_validations()
            .iter()
            .filter(|v| !v.ranges.is_empty())
            .collect();
        if validations.is_empty() {
            return;
        }

        content.push_str(&format!(
            "\n    <dataValidations count=\"{}\">",
            validations.len()
        ));

        for validation in validations {
            let mut attrs = format!(" type=\"{}\"", validation.validation_type.xlsx_type());
            if validation.error_style != Default::default() {
                attrs.push_str(&format!(
                    " errorStyle=\"{}\"",
                    validation.error_style.xlsx_style()
                ));
            }
            if validation.allow_blank {
                attrs.push_str(" allowBlank=\"1\"");
            }
            // showDropDown="1" hides the in-cell arrow
            if !validation.show_dropdown {
                attrs.push_str(" showDropDown=\"1\"");
            }
            if validation.show_input_message {
                attrs.push_str(" showInputMessage=\"1\"");
            }
            if validation.show_error_alert {
                attrs.push_str(" showErrorMessage=\"1\"");
            }
            let optional_attrs = [
                ("errorTitle", &validation.error_title),
                ("error", &validation.error_message),
                ("promptTitle", &validation.input_title),
                ("prompt", &validation.input_message),
            ];
            for (name, value) in optional_attrs {
                if let Some(value) = value {
                    attrs.push_str(&format!(" {}=\"{}\"", name, escape_xml(value)));
                }
            }

            let formula = match &validation.validation_type {
                ValidationType::List { source } => match source.strip_prefix('=') {
                    Some(reference) => reference.to_string(),
                    None => format!("\"{}\"", source),
                },
                ValidationType::Custom { formula } => {
                    formula.strip_prefix('=').unwrap_or(formula).to_string()
                }
            };

            content.push_str(&format!(
                "\n        <dataValidation{} sqref=\"{}\">\n            <formula1>{}</formula1>\n        </dataValidation>",
                attrs,
                sqref(&validation.ranges),
                escape_xml(&formula)
            ));
        }

        content.push_str("\n    </dataValidations>");
    }
}

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

fn sqref(ranges: &[tracker_sheets_core::CellRange]) -> String {
    ranges
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Encode characters XML 1.0 cannot carry as `_xHHHH_`
///
/// A literal `_x` is written as `_x005F_x` so it never reads back as an
/// escape. Tab, LF and CR are legal and kept as is.
fn encode_cell_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '_' if chars.peek() == Some(&'x') => out.push_str("_x005F_"),
            '\t' | '\n' | '\r' => out.push(c),
            c if c < '\u{20}' || c == '\u{FFFE}' || c == '\u{FFFF}' => {
                out.push_str(&format!("_x{:04X}_", u32::from(c)));
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tracker_sheets_core::{CellRange, ConditionalFormatRule, DataValidation, Style};

    fn sample_sheet() -> Workbook {
        let mut wb = Workbook::empty();
        let idx = wb.add_worksheet_with_name("Easy").unwrap();
        let ws = wb.worksheet_mut(idx).unwrap();
        ws.set_cell_value("A1", "Q.No").unwrap();
        ws.set_cell_value("B2", "A & B").unwrap();
        ws.set_cell_formula("F5", "=SUMPRODUCT(--EXACT(E2:E3,\"Solved\"))")
            .unwrap();
        ws.set_column_width(3, 50.0);
        ws.set_freeze_panes(1, 0);
        ws.merge_cells(&CellRange::parse("E4:G4").unwrap()).unwrap();
        wb
    }

    #[test]
    fn test_empty_workbook_is_rejected() {
        let result = XlsxWriter::write(&Workbook::empty(), Cursor::new(Vec::new()));
        assert!(matches!(result, Err(XlsxError::InvalidFormat(_))));
    }

    #[test]
    fn test_worksheet_xml_parts_in_schema_order() {
        let wb = sample_sheet();
        let table = XlsxStyleTable::build(&wb);
        let xml = XlsxWriter::worksheet_xml(wb.worksheet(0).unwrap(), 0, &table);

        let views = xml.find("<sheetViews>").unwrap();
        let cols = xml.find("<cols>").unwrap();
        let data = xml.find("<sheetData>").unwrap();
        let merges = xml.find("<mergeCells").unwrap();
        assert!(views < cols && cols < data && data < merges);

        assert!(xml.contains(r#"<pane ySplit="1" topLeftCell="A2" activePane="bottomLeft" state="frozen"/>"#));
        assert!(xml.contains(r#"<col min="4" max="4" width="50" customWidth="1"/>"#));
        assert!(xml.contains("<t>A &amp; B</t>"));
        assert!(xml.contains("<f>SUMPRODUCT(--EXACT(E2:E3,&quot;Solved&quot;))</f>"));
        assert!(xml.contains(r#"<mergeCell ref="E4:G4"/>"#));
    }

    #[test]
    fn test_rules_and_validations() {
        let mut wb = sample_sheet();
        let ws = wb.worksheet_mut(0).unwrap();
        let range = CellRange::parse("E2:E3").unwrap();
        ws.add_conditional_format(
            ConditionalFormatRule::expression("EXACT(E2,\"Solved\")")
                .with_range(range)
                .with_format(Style::new().bold(true)),
        );
        ws.add_data_validation(
            DataValidation::list_of(["To Solve", "Solved"])
                .with_range(range)
                .with_input_message("", "Select a status"),
        );

        let table = XlsxStyleTable::build(&wb);
        let xml = XlsxWriter::worksheet_xml(wb.worksheet(0).unwrap(), 0, &table);

        assert!(xml.contains(r#"<cfRule type="expression" dxfId="0" priority="1">"#));
        assert!(xml.contains("<formula>EXACT(E2,&quot;Solved&quot;)</formula>"));
        assert!(xml.contains(r#"prompt="Select a status" sqref="E2:E3""#));
        assert!(xml.contains("<formula1>&quot;To Solve,Solved&quot;</formula1>"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let wb = sample_sheet();
        let mut first = Cursor::new(Vec::new());
        let mut second = Cursor::new(Vec::new());
        XlsxWriter::write(&wb, &mut first).unwrap();
        XlsxWriter::write(&wb, &mut second).unwrap();
        assert_eq!(first.into_inner(), second.into_inner());
    }

    #[test]
    fn test_sheet_name_is_escaped() {
        let mut wb = Workbook::empty();
        wb.add_worksheet_with_name("Q&A").unwrap();
        assert!(XlsxWriter::workbook_xml(&wb).contains(r#"name="Q&amp;A""#));
    }

    /// Every character must match the XML 1.0 `Char` production
    fn assert_xml_chars(xml: &str) {
        let bad = xml.chars().find(|&c| {
            !matches!(c,
                '\t' | '\n' | '\r'
                | '\u{20}'..='\u{D7FF}'
                | '\u{E000}'..='\u{FFFD}'
                | '\u{10000}'..='\u{10FFFF}')
        });
        assert_eq!(bad, None, "illegal XML character in {}", xml);
    }

    #[test]
    fn test_control_characters_are_encoded() {
        let mut wb = Workbook::empty();
        let idx = wb.add_worksheet_with_name("Easy").unwrap();
        let ws = wb.worksheet_mut(idx).unwrap();
        ws.set_cell_value("B2", "Bell\u{7} puzzle").unwrap();
        ws.set_cell_value("B3", "Tab\u{1}ctl").unwrap();
        ws.set_cell_value("B4", "snake_x0041_case").unwrap();
        ws.set_cell_value("B5", "line\nbreak\tand tab").unwrap();

        let table = XlsxStyleTable::build(&wb);
        let xml = XlsxWriter::worksheet_xml(wb.worksheet(0).unwrap(), 0, &table);
        assert_xml_chars(&xml);

        let mut reader = quick_xml::Reader::from_str(&xml);
        loop {
            match reader.read_event() {
                Ok(quick_xml::events::Event::Eof) => break,
                Ok(_) => {}
                Err(e) => panic!("worksheet XML is not well-formed: {}", e),
            }
        }

        assert!(xml.contains("<t>Bell_x0007_ puzzle</t>"));
        assert!(xml.contains("<t>Tab_x0001_ctl</t>"));
        assert!(xml.contains("<t>snake_x005F_x0041_case</t>"));
        assert!(xml.contains("<t>line\nbreak\tand tab</t>"));
    }

    #[test]
    fn test_encode_cell_text() {
        assert_eq!(encode_cell_text("plain"), "plain");
        assert_eq!(encode_cell_text("a_b"), "a_b");
        assert_eq!(encode_cell_text("_x"), "_x005F_x");
        assert_eq!(encode_cell_text("\u{0}\u{1F}\u{FFFF}"), "_x0000__x001F__xFFFF_");
    }
}
