//! XLSX styles (styles.xml) read/write helpers

use std::collections::HashMap;
use std::io::{BufReader, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::XlsxResult;
use tracker_sheets_core::style::{
    Alignment, Color, FillStyle, FontStyle, HorizontalAlignment, NumberFormat, Style,
    VerticalAlignment,
};
use tracker_sheets_core::Workbook;

// === Writing ===

#[derive(Debug)]
pub(crate) struct XlsxStyleTable {
    /// Global, deduplicated styles. Index corresponds to the cellXfs index (xfId).
    styles: Vec<Style>,
    /// Per-worksheet mapping: local worksheet style index -> global xfId.
    sheet_maps: Vec<HashMap<u32, u32>>,
    /// DXF (differential format) styles for conditional formatting.
    dxf_styles: Vec<Style>,
    /// Mapping from (sheet_index, cf_rule_index) to dxf_id
    dxf_map: HashMap<(usize, usize), u32>,
}

#[derive(Debug, Clone, Copy)]
struct ResolvedXfIds {
    font_id: u32,
    fill_id: u32,
    num_fmt_id: u32,
}

impl XlsxStyleTable {
    pub(crate) fn build(workbook: &Workbook) -> Self {
        let mut styles: Vec<Style> = Vec::new();
        let mut style_to_xf: HashMap<Style, u32> = HashMap::new();

        // Index 0 is always default style
        let default = Style::default();
        styles.push(default.clone());
        style_to_xf.insert(default, 0);

        let mut sheet_maps: Vec<HashMap<u32, u32>> = Vec::with_capacity(workbook.sheet_count());

        let mut dxf_styles: Vec<Style> = Vec::new();
        let mut dxf_map: HashMap<(usize, usize), u32> = HashMap::new();
        let mut dxf_style_to_id: HashMap<Style, u32> = HashMap::new();

        for (sheet_idx, sheet) in workbook.worksheets().enumerate() {
            let mut map: HashMap<u32, u32> = HashMap::new();
            map.insert(0, 0);

            for (_row, _col, cell) in sheet.iter_cells() {
                let local_idx = cell.style_index;
                if local_idx == 0 || map.contains_key(&local_idx) {
                    continue;
                }

                let style = sheet
                    .style_by_index(local_idx)
                    .cloned()
                    .unwrap_or_default();

                let xf_id = match style_to_xf.get(&style) {
                    Some(&id) => id,
                    None => {
                        let id = styles.len() as u32;
                        styles.push(style.clone());
                        style_to_xf.insert(style, id);
                        id
                    }
                };

                map.insert(local_idx, xf_id);
            }

            sheet_maps.push(map);

            for (rule_idx, rule) in sheet.conditional_formats().iter().enumerate() {
                if let Some(ref format) = rule.format {
                    let dxf_id = match dxf_style_to_id.get(format) {
                        Some(&id) => id,
                        None => {
                            let id = dxf_styles.len() as u32;
                            dxf_styles.push(format.clone());
                            dxf_style_to_id.insert(format.clone(), id);
                            id
                        }
                    };
                    dxf_map.insert((sheet_idx, rule_idx), dxf_id);
                }
            }
        }

        Self {
            styles,
            sheet_maps,
            dxf_styles,
            dxf_map,
        }
    }

    pub(crate) fn xf_id_for(&self, sheet_index: usize, local_style_index: u32) -> u32 {
        self.sheet_maps
            .get(sheet_index)
            .and_then(|m| m.get(&local_style_index).copied())
            .unwrap_or(0)
    }

    /// Get the DXF ID for a conditional format rule, if it has a format defined
    pub(crate) fn dxf_id_for(&self, sheet_index: usize, rule_index: usize) -> Option<u32> {
        self.dxf_map.get(&(sheet_index, rule_index)).copied()
    }

    pub(crate) fn to_styles_xml(&self) -> String {
        let mut font_ids: HashMap<FontStyle, u32> = HashMap::new();
        let mut fonts: Vec<FontStyle> = Vec::new();

        let default_font = FontStyle::default();
        fonts.push(default_font.clone());
        font_ids.insert(default_font, 0);

        let mut fill_ids: HashMap<FillStyle, u32> = HashMap::new();
        // Excel requires the first two fills to be: none and gray125
        let mut fill_count: u32 = 2;
        let mut fills: Vec<FillStyle> = Vec::new();

        let mut numfmt_ids: HashMap<String, u32> = HashMap::new();
        let mut numfmts: Vec<(u32, String)> = Vec::new();
        let mut next_numfmt_id = NumberFormat::FIRST_CUSTOM_ID;

        let mut resolved: Vec<ResolvedXfIds> = Vec::with_capacity(self.styles.len());

        for style in &self.styles {
            let font_id = match font_ids.get(&style.font) {
                Some(&id) => id,
                None => {
                    let id = fonts.len() as u32;
                    fonts.push(style.font.clone());
                    font_ids.insert(style.font.clone(), id);
                    id
                }
            };

            let fill_id = match &style.fill {
                FillStyle::None => 0,
                other => match fill_ids.get(other) {
                    Some(&id) => id,
                    None => {
                        let id = fill_count;
                        fill_count += 1;
                        fills.push(other.clone());
                        fill_ids.insert(other.clone(), id);
                        id
                    }
                },
            };

            let num_fmt_id = match &style.number_format {
                NumberFormat::General => 0,
                NumberFormat::BuiltIn(id) => *id,
                NumberFormat::Custom(code) => match numfmt_ids.get(code) {
                    Some(&id) => id,
                    None => {
                        let id = next_numfmt_id;
                        next_numfmt_id += 1;
                        numfmt_ids.insert(code.clone(), id);
                        numfmts.push((id, code.clone()));
                        id
                    }
                },
            };

            resolved.push(ResolvedXfIds {
                font_id,
                fill_id,
                num_fmt_id,
            });
        }

        let mut xml = String::new();
        xml.push_str(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
        );

        if !numfmts.is_empty() {
            xml.push_str(&format!("\n  <numFmts count=\"{}\">", numfmts.len()));
            for (id, code) in &numfmts {
                xml.push_str(&format!(
                    "\n    <numFmt numFmtId=\"{}\" formatCode=\"{}\"/>",
                    id,
                    escape_xml_attr(code)
                ));
            }
            xml.push_str("\n  </numFmts>");
        }

        xml.push_str(&format!("\n  <fonts count=\"{}\">", fonts.len()));
        for font in &fonts {
            xml.push_str("\n    ");
            xml.push_str(&write_font(font));
        }
        xml.push_str("\n  </fonts>");

        xml.push_str(&format!("\n  <fills count=\"{}\">", fill_count));
        xml.push_str("\n    <fill><patternFill patternType=\"none\"/></fill>");
        xml.push_str("\n    <fill><patternFill patternType=\"gray125\"/></fill>");
        for fill in &fills {
            xml.push_str("\n    ");
            xml.push_str(&write_fill(fill));
        }
        xml.push_str("\n  </fills>");

        xml.push_str(
            r#"
  <borders count="1">
    <border><left/><right/><top/><bottom/><diagonal/></border>
  </borders>
  <cellStyleXfs count="1">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0"/>
  </cellStyleXfs>"#,
        );

        xml.push_str(&format!("\n  <cellXfs count=\"{}\">", self.styles.len()));
        for (style, ids) in self.styles.iter().zip(&resolved) {
            xml.push_str("\n    ");
            xml.push_str(&write_xf(style, *ids));
        }
        xml.push_str("\n  </cellXfs>");

        xml.push_str(
            r#"
  <cellStyles count="1">
    <cellStyle name="Normal" xfId="0" builtinId="0"/>
  </cellStyles>"#,
        );

        if self.dxf_styles.is_empty() {
            xml.push_str("\n  <dxfs count=\"0\"/>");
        } else {
            xml.push_str(&format!("\n  <dxfs count=\"{}\">", self.dxf_styles.len()));
            for dxf_style in &self.dxf_styles {
                xml.push_str("\n    ");
                xml.push_str(&write_dxf(dxf_style));
            }
            xml.push_str("\n  </dxfs>");
        }

        xml.push_str(
            r#"
  <tableStyles count="0" defaultTableStyle="TableStyleMedium9" defaultPivotStyle="PivotStyleLight16"/>"#,
        );

        xml.push_str("\n</styleSheet>");
        xml
    }
}

pub(crate) fn escape_xml_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn write_color(tag: &str, color: &Color) -> String {
    match color {
        Color::Auto => format!("<{tag} indexed=\"64\"/>"),
        other => format!("<{tag} rgb=\"{}\"/>", other.to_argb_hex()),
    }
}

fn write_font(font: &FontStyle) -> String {
    let mut s = String::from("<font>");
    if font.bold {
        s.push_str("<b/>");
    }
    if font.italic {
        s.push_str("<i/>");
    }
    s.push_str(&format!("<sz val=\"{}\"/>", font.size));
    if !font.color.is_auto() {
        s.push_str(&write_color("color", &font.color));
    }
    s.push_str(&format!("<name val=\"{}\"/>", escape_xml_attr(&font.name)));
    s.push_str("</font>");
    s
}

fn write_fill(fill: &FillStyle) -> String {
    match fill {
        FillStyle::None => "<fill><patternFill patternType=\"none\"/></fill>".to_string(),
        FillStyle::Solid { color } => format!(
            "<fill><patternFill patternType=\"solid\">{}<bgColor indexed=\"64\"/></patternFill></fill>",
            write_color("fgColor", color)
        ),
    }
}

/// Differential fills take their color from bgColor; fgColor is written too
/// for applications that read it instead.
fn write_dxf_fill(fill: &FillStyle) -> String {
    match fill {
        FillStyle::None => String::new(),
        FillStyle::Solid { color } => format!(
            "<fill><patternFill patternType=\"solid\">{}{}</patternFill></fill>",
            write_color("fgColor", color),
            write_color("bgColor", color)
        ),
    }
}

fn write_alignment(al: &Alignment) -> String {
    let default = Alignment::default();
    if al == &default {
        return String::new();
    }

    let mut s = String::from("<alignment");
    if al.horizontal != default.horizontal {
        s.push_str(&format!(" horizontal=\"{}\"", al.horizontal.xlsx_name()));
    }
    if al.vertical != default.vertical {
        s.push_str(&format!(" vertical=\"{}\"", al.vertical.xlsx_name()));
    }
    if al.wrap_text {
        s.push_str(" wrapText=\"1\"");
    }
    s.push_str("/>");
    s
}

fn write_xf(style: &Style, ids: ResolvedXfIds) -> String {
    let mut attrs = String::new();
    if ids.num_fmt_id != 0 {
        attrs.push_str(" applyNumberFormat=\"1\"");
    }
    if style.font != FontStyle::default() {
        attrs.push_str(" applyFont=\"1\"");
    }
    if !style.fill.is_none() {
        attrs.push_str(" applyFill=\"1\"");
    }
    if style.alignment != Alignment::default() {
        attrs.push_str(" applyAlignment=\"1\"");
    }

    let s = format!(
        "<xf numFmtId=\"{}\" fontId=\"{}\" fillId=\"{}\" borderId=\"0\" xfId=\"0\"{}",
        ids.num_fmt_id, ids.font_id, ids.fill_id, attrs
    );

    let alignment_xml = write_alignment(&style.alignment);
    if alignment_xml.is_empty() {
        format!("{}/>", s)
    } else {
        format!("{}>{}</xf>", s, alignment_xml)
    }
}

/// Write a DXF (differential format) element for conditional formatting
fn write_dxf(style: &Style) -> String {
    let mut s = String::from("<dxf>");

    if style.font != FontStyle::default() {
        let font = &style.font;
        s.push_str("<font>");
        if font.bold {
            s.push_str("<b/>");
        }
        if font.italic {
            s.push_str("<i/>");
        }
        if !font.color.is_auto() {
            s.push_str(&write_color("color", &font.color));
        }
        s.push_str("</font>");
    }
    s.push_str(&write_dxf_fill(&style.fill));
    s.push_str(&write_alignment(&style.alignment));

    s.push_str("</dxf>");
    s
}

// === Reading ===

/// Result of reading styles.xml, containing both cell styles and DXF styles
#[derive(Debug)]
pub(crate) struct ParsedStyles {
    pub cell_styles: Vec<Style>,
    pub dxf_styles: Vec<Style>,
}

impl Default for ParsedStyles {
    fn default() -> Self {
        Self {
            cell_styles: vec![Style::default()],
            dxf_styles: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct PendingFill {
    solid: bool,
    fg: Option<Color>,
    bg: Option<Color>,
}

impl PendingFill {
    fn finish(self, prefer_bg: bool) -> FillStyle {
        if !self.solid {
            return FillStyle::None;
        }
        let color = if prefer_bg {
            self.bg.or(self.fg)
        } else {
            self.fg.or(self.bg)
        };
        FillStyle::solid(color.unwrap_or_default())
    }
}

pub(crate) fn read_styles_xml<R: Read>(reader: R) -> XlsxResult<ParsedStyles> {
    let mut xml_reader = Reader::from_reader(BufReader::new(reader));
    xml_reader.trim_text(true);

    let mut buf = Vec::new();

    let mut numfmts: HashMap<u32, String> = HashMap::new();
    let mut fonts: Vec<FontStyle> = Vec::new();
    let mut fills: Vec<FillStyle> = Vec::new();
    let mut cell_xfs: Vec<Style> = Vec::new();
    let mut dxf_styles: Vec<Style> = Vec::new();

    let mut in_cell_xfs = false;
    let mut in_dxf = false;
    let mut current_font: Option<FontStyle> = None;
    let mut current_fill: Option<PendingFill> = None;
    let mut current_xf: Option<Style> = None;
    let mut current_dxf: Option<Style> = None;

    loop {
        let event = xml_reader.read_event_into(&mut buf)?;
        let is_empty = matches!(event, Event::Empty(_));
        match event {
            Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                b"numFmt" => {
                    let id = attr_value(&e, b"numFmtId").and_then(|s| s.parse().ok());
                    if let (Some(id), Some(code)) = (id, attr_value(&e, b"formatCode")) {
                        numfmts.insert(id, code);
                    }
                }
                b"cellXfs" => in_cell_xfs = !is_empty,
                b"dxf" => {
                    in_dxf = true;
                    current_dxf = Some(Style::default());
                    if is_empty {
                        dxf_styles.push(Style::default());
                        in_dxf = false;
                        current_dxf = None;
                    }
                }
                b"font" => {
                    current_font = Some(FontStyle::default());
                    if is_empty {
                        finish_font(&mut current_font, &mut fonts, current_dxf.as_mut());
                    }
                }
                b"b" => {
                    if let Some(font) = current_font.as_mut() {
                        font.bold = attr_value(&e, b"val").map_or(true, |v| v != "0");
                    }
                }
                b"i" => {
                    if let Some(font) = current_font.as_mut() {
                        font.italic = attr_value(&e, b"val").map_or(true, |v| v != "0");
                    }
                }
                b"sz" => {
                    if let Some(font) = current_font.as_mut() {
                        if let Some(size) = attr_value(&e, b"val").and_then(|v| v.parse().ok()) {
                            font.size = size;
                        }
                    }
                }
                b"name" => {
                    if let (Some(font), Some(name)) = (current_font.as_mut(), attr_value(&e, b"val"))
                    {
                        font.name = name;
                    }
                }
                b"color" => {
                    if let Some(font) = current_font.as_mut() {
                        font.color = parse_color_attrs(&e);
                    }
                }
                b"fill" => {
                    current_fill = Some(PendingFill::default());
                    if is_empty {
                        finish_fill(&mut current_fill, &mut fills, current_dxf.as_mut());
                    }
                }
                b"patternFill" => {
                    if let Some(fill) = current_fill.as_mut() {
                        fill.solid = attr_value(&e, b"patternType").as_deref() == Some("solid");
                    }
                }
                b"fgColor" => {
                    if let Some(fill) = current_fill.as_mut() {
                        fill.fg = Some(parse_color_attrs(&e));
                    }
                }
                b"bgColor" => {
                    if let Some(fill) = current_fill.as_mut() {
                        fill.bg = Some(parse_color_attrs(&e));
                    }
                }
                b"xf" if in_cell_xfs => {
                    let id = |key: &[u8]| -> u32 {
                        attr_value(&e, key)
                            .and_then(|s| s.parse().ok())
                            .unwrap_or(0)
                    };
                    let mut style = Style {
                        font: fonts.get(id(b"fontId") as usize).cloned().unwrap_or_default(),
                        fill: fills.get(id(b"fillId") as usize).cloned().unwrap_or_default(),
                        ..Style::default()
                    };
                    style.number_format = match id(b"numFmtId") {
                        0 => NumberFormat::General,
                        n => numfmts
                            .get(&n)
                            .map(|code| NumberFormat::Custom(code.clone()))
                            .unwrap_or(NumberFormat::BuiltIn(n)),
                    };
                    if is_empty {
                        cell_xfs.push(style);
                    } else {
                        current_xf = Some(style);
                    }
                }
                b"alignment" => {
                    let target = if in_dxf {
                        current_dxf.as_mut()
                    } else {
                        current_xf.as_mut()
                    };
                    if let Some(style) = target {
                        style.alignment = parse_alignment(&e);
                    }
                }
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"font" => finish_font(&mut current_font, &mut fonts, current_dxf.as_mut()),
                b"fill" => finish_fill(&mut current_fill, &mut fills, current_dxf.as_mut()),
                b"xf" => {
                    if let Some(style) = current_xf.take() {
                        cell_xfs.push(style);
                    }
                }
                b"cellXfs" => in_cell_xfs = false,
                b"dxf" => {
                    if let Some(style) = current_dxf.take() {
                        dxf_styles.push(style);
                    }
                    in_dxf = false;
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if cell_xfs.is_empty() {
        cell_xfs.push(Style::default());
    }

    Ok(ParsedStyles {
        cell_styles: cell_xfs,
        dxf_styles,
    })
}

fn finish_font(
    current: &mut Option<FontStyle>,
    fonts: &mut Vec<FontStyle>,
    dxf: Option<&mut Style>,
) {
    if let Some(font) = current.take() {
        match dxf {
            Some(style) => style.font = font,
            None => fonts.push(font),
        }
    }
}

fn finish_fill(
    current: &mut Option<PendingFill>,
    fills: &mut Vec<FillStyle>,
    dxf: Option<&mut Style>,
) {
    if let Some(fill) = current.take() {
        match dxf {
            Some(style) => style.fill = fill.finish(true),
            None => fills.push(fill.finish(false)),
        }
    }
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.to_string()))
}

pub(crate) fn parse_color_attrs(e: &BytesStart<'_>) -> Color {
    attr_value(e, b"rgb")
        .and_then(|rgb| Color::from_hex(&rgb))
        .map(|color| match color {
            Color::Argb { a: 0xFF, r, g, b } => Color::rgb(r, g, b),
            other => other,
        })
        .unwrap_or(Color::Auto)
}

fn parse_alignment(e: &BytesStart<'_>) -> Alignment {
    let mut al = Alignment::default();
    if let Some(h) = attr_value(e, b"horizontal").and_then(|v| HorizontalAlignment::from_xlsx(&v))
    {
        al.horizontal = h;
    }
    if let Some(v) = attr_value(e, b"vertical").and_then(|v| VerticalAlignment::from_xlsx(&v)) {
        al.vertical = v;
    }
    al.wrap_text = attr_value(e, b"wrapText").as_deref() == Some("1");
    al
}
