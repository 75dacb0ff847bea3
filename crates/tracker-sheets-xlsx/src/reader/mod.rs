//! XLSX reader
//!
//! Reads back the parts [`crate::XlsxWriter`] emits: sheet order and names,
//! cell values and formulas, cell styles, column widths, frozen panes, merged
//! regions, conditional formatting and data validation. Shared strings are
//! never written, so a `t="s"` cell is reported as a parse error.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use crate::styles::{read_styles_xml, ParsedStyles};
use tracker_sheets_core::conditional_format::{CfOperator, CfRuleType, ConditionalFormatRule};
use tracker_sheets_core::style::Style;
use tracker_sheets_core::validation::{DataValidation, ValidationErrorStyle, ValidationType};
use tracker_sheets_core::{CellAddress, CellRange, CellValue, Workbook, Worksheet};

/// XLSX file reader
pub struct XlsxReader;

/// Raw `<c>` element state collected while parsing
#[derive(Debug, Default)]
struct PendingCell {
    reference: String,
    cell_type: Option<String>,
    style: Option<u32>,
    value: Option<String>,
    formula: Option<String>,
}

/// Raw `<cfRule>` element state collected while parsing
#[derive(Debug)]
struct PendingRule {
    rule_type: String,
    operator: Option<String>,
    dxf_id: Option<u32>,
    priority: u32,
    stop_if_true: bool,
    ranges: Vec<CellRange>,
    formulas: Vec<String>,
}

impl XlsxReader {
    /// Read a workbook from a file path
    pub fn read_file<P: AsRef<Path>>(path: P) -> XlsxResult<Workbook> {
        let file = File::open(path)?;
        Self::read(file)
    }

    /// Read a workbook from a reader
    pub fn read<R: Read + Seek>(reader: R) -> XlsxResult<Workbook> {
        let mut archive = zip::ZipArchive::new(reader)?;

        if archive.by_name("[Content_Types].xml").is_err() {
            return Err(XlsxError::InvalidFormat(
                "Missing [Content_Types].xml".into(),
            ));
        }

        let styles = Self::read_styles(&mut archive)?;
        let sheet_info = Self::read_workbook_xml(&mut archive)?;
        let sheet_paths = Self::read_workbook_rels(&mut archive)?;

        let mut workbook = Workbook::empty();
        for (name, r_id) in &sheet_info {
            let path = sheet_paths
                .get(r_id)
                .ok_or_else(|| XlsxError::MissingPart(format!("relationship {}", r_id)))?;

            let mut worksheet = Worksheet::new(name.as_str());
            Self::read_worksheet(&mut archive, path, &mut worksheet, &styles)?;
            debug!("read worksheet '{}' ({} cells)", name, worksheet.cell_count());
            workbook.add_existing_worksheet(worksheet)?;
        }

        Ok(workbook)
    }

    fn read_styles<R: Read + Seek>(archive: &mut zip::ZipArchive<R>) -> XlsxResult<ParsedStyles> {
        match archive.by_name("xl/styles.xml") {
            Ok(file) => read_styles_xml(file),
            Err(_) => Ok(ParsedStyles::default()),
        }
    }

    /// Read workbook.xml to get sheet names and rIds, in tab order
    fn read_workbook_xml<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<Vec<(String, String)>> {
        let file = archive
            .by_name("xl/workbook.xml")
            .map_err(|_| XlsxError::MissingPart("xl/workbook.xml".into()))?;

        let mut xml_reader = Reader::from_reader(BufReader::new(file));
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut sheets = Vec::new();

        loop {
            match xml_reader.read_event_into(&mut buf)? {
                Event::Empty(e) | Event::Start(e) if e.name().as_ref() == b"sheet" => {
                    if let (Some(name), Some(r_id)) = (attr(&e, b"name"), attr(&e, b"r:id")) {
                        sheets.push((name, r_id));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(sheets)
    }

    /// Read workbook.xml.rels to map rIds to worksheet part paths
    fn read_workbook_rels<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<HashMap<String, String>> {
        let file = archive
            .by_name("xl/_rels/workbook.xml.rels")
            .map_err(|_| XlsxError::MissingPart("xl/_rels/workbook.xml.rels".into()))?;

        let mut xml_reader = Reader::from_reader(BufReader::new(file));
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut rels = HashMap::new();

        loop {
            match xml_reader.read_event_into(&mut buf)? {
                Event::Empty(e) | Event::Start(e) if e.name().as_ref() == b"Relationship" => {
                    let is_worksheet = attr(&e, b"Type")
                        .map_or(false, |t| t.ends_with("/worksheet"));
                    if let (true, Some(id), Some(target)) =
                        (is_worksheet, attr(&e, b"Id"), attr(&e, b"Target"))
                    {
                        // Target is relative to xl/ unless absolute
                        let full_path = match target.strip_prefix('/') {
                            Some(absolute) => absolute.to_string(),
                            None => format!("xl/{}", target),
                        };
                        rels.insert(id, full_path);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(rels)
    }

    fn read_worksheet<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
        path: &str,
        worksheet: &mut Worksheet,
        styles: &ParsedStyles,
    ) -> XlsxResult<()> {
        let file = archive
            .by_name(path)
            .map_err(|_| XlsxError::MissingPart(path.to_string()))?;

        // Text is not trimmed so cell values keep their surrounding whitespace
        let mut xml_reader = Reader::from_reader(BufReader::new(file));

        let mut buf = Vec::new();

        let mut cell: Option<PendingCell> = None;
        let mut in_value = false;
        let mut in_formula = false;
        let mut in_inline_text = false;

        let mut cf_ranges: Vec<CellRange> = Vec::new();
        let mut rule: Option<PendingRule> = None;
        let mut in_cf_formula = false;

        let mut validation: Option<DataValidation> = None;
        let mut dv_formula1: Option<String> = None;
        let mut in_dv_formula1 = false;

        loop {
            let event = xml_reader.read_event_into(&mut buf)?;
            let is_empty = matches!(event, Event::Empty(_));
            match event {
                Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                    b"pane" => {
                        let split = |key: &[u8]| {
                            attr(&e, key)
                                .and_then(|v| v.parse::<f64>().ok())
                                .map_or(0, |v| v as u32)
                        };
                        let (rows, cols) = (split(b"ySplit"), split(b"xSplit"));
                        if attr(&e, b"state").as_deref() == Some("frozen") {
                            worksheet.set_freeze_panes(rows, cols as u16);
                        }
                    }
                    b"col" => {
                        let bound = |key: &[u8]| attr(&e, key).and_then(|v| v.parse::<u16>().ok());
                        let width = attr(&e, b"width").and_then(|v| v.parse::<f64>().ok());
                        let custom = is_true(attr(&e, b"customWidth").as_deref());
                        if let (Some(min), Some(max), Some(width), true) =
                            (bound(b"min"), bound(b"max"), width, custom)
                        {
                            // min/max are 1-based
                            for col in min..=max {
                                worksheet.set_column_width(col.saturating_sub(1), width);
                            }
                        }
                    }
                    b"c" => {
                        let pending = PendingCell {
                            reference: attr(&e, b"r").ok_or_else(|| {
                                XlsxError::Parse(format!("cell without reference in {}", path))
                            })?,
                            cell_type: attr(&e, b"t"),
                            style: attr(&e, b"s").and_then(|v| v.parse().ok()),
                            ..PendingCell::default()
                        };
                        if is_empty {
                            Self::process_cell(worksheet, pending, &styles.cell_styles)?;
                        } else {
                            cell = Some(pending);
                        }
                    }
                    b"v" if cell.is_some() && !is_empty => in_value = true,
                    b"f" if cell.is_some() && !is_empty => in_formula = true,
                    b"t" if cell.is_some() && !is_empty => in_inline_text = true,
                    b"mergeCell" => {
                        if let Some(reference) = attr(&e, b"ref") {
                            worksheet.merge_cells(&CellRange::parse(&reference)?)?;
                        }
                    }
                    b"conditionalFormatting" => {
                        cf_ranges = parse_sqref(attr(&e, b"sqref").as_deref())?;
                    }
                    b"cfRule" => {
                        let pending = PendingRule {
                            rule_type: attr(&e, b"type").unwrap_or_default(),
                            operator: attr(&e, b"operator"),
                            dxf_id: attr(&e, b"dxfId").and_then(|v| v.parse().ok()),
                            priority: attr(&e, b"priority")
                                .and_then(|v| v.parse().ok())
                                .unwrap_or(1),
                            stop_if_true: is_true(attr(&e, b"stopIfTrue").as_deref()),
                            ranges: cf_ranges.clone(),
                            formulas: Vec::new(),
                        };
                        if is_empty {
                            Self::finish_rule(worksheet, pending, &styles.dxf_styles)?;
                        } else {
                            rule = Some(pending);
                        }
                    }
                    b"formula" if rule.is_some() && !is_empty => in_cf_formula = true,
                    b"dataValidation" => {
                        dv_formula1 = None;
                        let parsed = Self::parse_data_validation_attrs(&e)?;
                        if is_empty {
                            worksheet.add_data_validation(parsed);
                        } else {
                            validation = Some(parsed);
                        }
                    }
                    b"formula1" if validation.is_some() && !is_empty => in_dv_formula1 = true,
                    _ => {}
                },
                Event::Text(e) => {
                    let text = e.unescape()?;
                    if let Some(pending) = cell.as_mut() {
                        if in_value || in_inline_text {
                            pending.value.get_or_insert_with(String::new).push_str(&text);
                        } else if in_formula {
                            pending.formula.get_or_insert_with(String::new).push_str(&text);
                        }
                    } else if in_cf_formula {
                        if let Some(pending) = rule.as_mut() {
                            pending.formulas.push(text.into_owned());
                        }
                    } else if in_dv_formula1 {
                        dv_formula1.get_or_insert_with(String::new).push_str(&text);
                    }
                }
                Event::End(e) => match e.name().as_ref() {
                    b"c" => {
                        if let Some(pending) = cell.take() {
                            Self::process_cell(worksheet, pending, &styles.cell_styles)?;
                        }
                    }
                    b"v" => in_value = false,
                    b"f" => in_formula = false,
                    b"t" => in_inline_text = false,
                    b"formula" => in_cf_formula = false,
                    b"cfRule" => {
                        if let Some(pending) = rule.take() {
                            Self::finish_rule(worksheet, pending, &styles.dxf_styles)?;
                        }
                    }
                    b"conditionalFormatting" => cf_ranges.clear(),
                    b"formula1" => in_dv_formula1 = false,
                    b"dataValidation" => {
                        if let Some(mut parsed) = validation.take() {
                            Self::apply_validation_formula(&mut parsed, dv_formula1.take());
                            worksheet.add_data_validation(parsed);
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(())
    }

    /// Store a parsed cell in the worksheet
    fn process_cell(
        worksheet: &mut Worksheet,
        cell: PendingCell,
        styles: &[Style],
    ) -> XlsxResult<()> {
        let addr = CellAddress::parse(&cell.reference).map_err(|e| {
            XlsxError::Parse(format!("Invalid cell reference '{}': {}", cell.reference, e))
        })?;

        if let Some(formula) = cell.formula {
            worksheet.set_cell_value_at(addr.row, addr.col, CellValue::formula(formula))?;
        } else if let Some(value) = cell.value {
            let value = match cell.cell_type.as_deref() {
                Some("s") => {
                    return Err(XlsxError::Parse(format!(
                        "shared string cell {} is not supported",
                        cell.reference
                    )))
                }
                Some("b") => CellValue::Boolean(value == "1" || value.eq_ignore_ascii_case("true")),
                Some("inlineStr") | Some("str") => CellValue::String(decode_excel_escapes(&value)),
                None | Some("n") => value
                    .parse::<f64>()
                    .map(CellValue::Number)
                    .map_err(|_| {
                        XlsxError::Parse(format!(
                            "Invalid number '{}' in cell {}",
                            value, cell.reference
                        ))
                    })?,
                Some(_) => CellValue::String(value),
            };
            worksheet.set_cell_value_at(addr.row, addr.col, value)?;
        }

        if let Some(s) = cell.style.filter(|&s| s != 0) {
            let style = styles
                .get(s as usize)
                .ok_or_else(|| XlsxError::Parse(format!("Style index {} out of bounds", s)))?;
            worksheet.set_cell_style_at(addr.row, addr.col, style)?;
        }

        Ok(())
    }

    /// Turn a parsed `<cfRule>` into a rule on the worksheet
    fn finish_rule(
        worksheet: &mut Worksheet,
        pending: PendingRule,
        dxf_styles: &[Style],
    ) -> XlsxResult<()> {
        let mut formulas = pending.formulas.into_iter();
        let rule_type = match pending.rule_type.as_str() {
            "cellIs" => {
                let operator = pending
                    .operator
                    .as_deref()
                    .and_then(CfOperator::from_xlsx)
                    .unwrap_or(CfOperator::Equal);
                CfRuleType::CellIs {
                    operator,
                    formula1: formulas.next().unwrap_or_default(),
                    formula2: formulas.next(),
                }
            }
            "expression" => CfRuleType::Expression {
                formula: formulas.next().unwrap_or_default(),
            },
            other => {
                return Err(XlsxError::Parse(format!(
                    "unsupported conditional format type '{}'",
                    other
                )))
            }
        };

        let mut rule = ConditionalFormatRule::new(rule_type)
            .with_priority(pending.priority)
            .with_stop_if_true(pending.stop_if_true);
        rule.ranges = pending.ranges;
        if let Some(dxf_id) = pending.dxf_id {
            let style = dxf_styles
                .get(dxf_id as usize)
                .ok_or_else(|| XlsxError::Parse(format!("dxf index {} out of bounds", dxf_id)))?;
            rule = rule.with_format(style.clone());
        }

        worksheet.add_conditional_format(rule);
        Ok(())
    }

    /// Parse data validation attributes from an element
    fn parse_data_validation_attrs(e: &BytesStart<'_>) -> XlsxResult<DataValidation> {
        let validation_type = match attr(e, b"type").as_deref() {
            Some("list") => ValidationType::List {
                source: String::new(),
            },
            Some("custom") => ValidationType::Custom {
                formula: String::new(),
            },
            other => {
                return Err(XlsxError::Parse(format!(
                    "unsupported data validation type {:?}",
                    other
                )))
            }
        };

        Ok(DataValidation {
            validation_type,
            ranges: parse_sqref(attr(e, b"sqref").as_deref())?,
            allow_blank: is_true(attr(e, b"allowBlank").as_deref()),
            // showDropDown="1" hides the in-cell arrow
            show_dropdown: !is_true(attr(e, b"showDropDown").as_deref()),
            show_input_message: is_true(attr(e, b"showInputMessage").as_deref()),
            input_title: attr(e, b"promptTitle"),
            input_message: attr(e, b"prompt"),
            show_error_alert: is_true(attr(e, b"showErrorMessage").as_deref()),
            error_style: attr(e, b"errorStyle")
                .as_deref()
                .and_then(ValidationErrorStyle::from_xlsx)
                .unwrap_or_default(),
            error_title: attr(e, b"errorTitle"),
            error_message: attr(e, b"error"),
        })
    }

    fn apply_validation_formula(validation: &mut DataValidation, formula1: Option<String>) {
        let formula = formula1.unwrap_or_default();
        match &mut validation.validation_type {
            ValidationType::List { source } => {
                // A quoted formula is an inline list, anything else a reference
                *source = match formula
                    .strip_prefix('"')
                    .and_then(|f| f.strip_suffix('"'))
                {
                    Some(values) => values.to_string(),
                    None => format!("={}", formula),
                };
            }
            ValidationType::Custom { formula: f } => *f = formula,
        }
    }
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Decode `_xHHHH_` escapes in cell text
///
/// Anything that is not a complete escape (four hex digits and a closing
/// underscore) is kept literally.
fn decode_excel_escapes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find("_x") {
        out.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        match decode_escape(candidate) {
            Some(c) => {
                out.push(c);
                rest = &candidate[7..];
            }
            None => {
                out.push('_');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_escape(s: &str) -> Option<char> {
    let hex = s.get(2..6)?;
    if s.as_bytes().get(6) != Some(&b'_') || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
}

fn is_true(value: Option<&str>) -> bool {
    matches!(value, Some("1") | Some("true"))
}

fn parse_sqref(sqref: Option<&str>) -> XlsxResult<Vec<CellRange>> {
    sqref
        .unwrap_or_default()
        .split_whitespace()
        .map(|r| CellRange::parse(r).map_err(XlsxError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn package(sheet_xml: &str) -> Cursor<Vec<u8>> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        let parts = [
            ("[Content_Types].xml", "<Types/>"),
            (
                "xl/workbook.xml",
                r#"<workbook xmlns:r="r"><sheets><sheet name="Easy" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<Relationships><Relationship Id="rId1" Type="http://x/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#,
            ),
            ("xl/worksheets/sheet1.xml", sheet_xml),
        ];
        for (name, content) in parts {
            zip.start_file(name.to_string(), options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        let mut cursor = zip.finish().unwrap();
        cursor.set_position(0);
        cursor
    }

    #[test]
    fn test_reads_cells_without_styles_part() {
        let wb = XlsxReader::read(package(
            r#"<worksheet><sheetData><row r="1">
                <c r="A1" t="inlineStr"><is><t xml:space="preserve"> padded </t></is></c>
                <c r="B1"><v>42</v></c>
                <c r="C1" t="b"><v>1</v></c>
                <c r="D1"><f>SUM(B1:B1)</f></c>
            </row></sheetData></worksheet>"#,
        ))
        .unwrap();

        let ws = wb.worksheet_by_name("Easy").unwrap();
        assert_eq!(ws.get_value_at(0, 0), CellValue::String(" padded ".into()));
        assert_eq!(ws.get_value_at(0, 1), CellValue::Number(42.0));
        assert_eq!(ws.get_value_at(0, 2), CellValue::Boolean(true));
        assert_eq!(ws.get_value_at(0, 3), CellValue::formula("=SUM(B1:B1)"));
    }

    #[test]
    fn test_decodes_escaped_cell_text() {
        let wb = XlsxReader::read(package(
            r#"<worksheet><sheetData><row r="1">
                <c r="A1" t="inlineStr"><is><t>Bell_x0007_ puzzle</t></is></c>
                <c r="B1" t="inlineStr"><is><t>snake_x005F_x0041_case</t></is></c>
                <c r="C1" t="inlineStr"><is><t>_x12_ and _xZZZZ_ stay</t></is></c>
            </row></sheetData></worksheet>"#,
        ))
        .unwrap();

        let ws = wb.worksheet(0).unwrap();
        assert_eq!(ws.get_value_at(0, 0), CellValue::String("Bell\u{7} puzzle".into()));
        assert_eq!(ws.get_value_at(0, 1), CellValue::String("snake_x0041_case".into()));
        assert_eq!(ws.get_value_at(0, 2), CellValue::String("_x12_ and _xZZZZ_ stay".into()));
    }

    #[test]
    fn test_shared_string_cells_are_rejected() {
        let result = XlsxReader::read(package(
            r#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c></row></sheetData></worksheet>"#,
        ));
        assert!(matches!(result, Err(XlsxError::Parse(_))));
    }

    #[test]
    fn test_range_list_source_keeps_reference() {
        let wb = XlsxReader::read(package(
            r#"<worksheet><dataValidations count="1"><dataValidation type="list" sqref="E2:E9"><formula1>Lists!$A$1:$A$3</formula1></dataValidation></dataValidations></worksheet>"#,
        ))
        .unwrap();

        let dv = &wb.worksheet(0).unwrap().data_validations()[0];
        assert_eq!(
            dv.validation_type,
            ValidationType::List {
                source: "=Lists!$A$1:$A$3".into()
            }
        );
        assert!(!dv.allow_blank);
    }

    #[test]
    fn test_missing_content_types() {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("xl/workbook.xml".to_string(), SimpleFileOptions::default())
            .unwrap();
        let mut cursor = zip.finish().unwrap();
        cursor.set_position(0);

        assert!(matches!(
            XlsxReader::read(cursor),
            Err(XlsxError::InvalidFormat(_))
        ));
    }
}
