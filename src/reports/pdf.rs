//! Self-contained PDF 1.4 report writer
//!
//! Lays out a title block followed by one table per section on A4 pages,
//! using the standard Helvetica fonts with WinAnsi encoding so that no
//! font data has to be embedded. Tables that run past the bottom margin
//! continue on a new page with their header repeated.

use super::export::ReportSection;
use super::ReportData;

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 40.0;
const LINE_HEIGHT: f32 = 13.0;
const BODY_SIZE: f32 = 8.5;
/// Average Helvetica glyph width as a fraction of the font size
const GLYPH_WIDTH: f32 = 0.52;

#[derive(Clone, Copy)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

/// Encode text as a PDF string literal body in WinAnsi
fn encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            ' '..='~' => out.push(ch),
            '\n' | '\r' | '\t' => out.push(' '),
            '€' => out.push_str("\\200"),
            c if (0xA0..=0xFF).contains(&(c as u32)) => {
                out.push_str(&format!("\\{:03o}", c as u32));
            }
            _ => out.push('?'),
        }
    }
    out
}

/// Truncate `text` to what fits in `width` points
fn fit(text: &str, width: f32, size: f32) -> String {
    let max = (width / (size * GLYPH_WIDTH)).floor().max(1.0) as usize;
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(2);
    let mut cut: String = text.chars().take(keep).collect();
    cut.push_str("..");
    cut
}

struct Layout {
    pages: Vec<String>,
    ops: String,
    y: f32,
}

impl Layout {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            ops: String::new(),
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn break_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.ops));
        self.y = PAGE_HEIGHT - MARGIN;
    }

    /// Start a new page unless `height` more points fit on this one
    fn ensure(&mut self, height: f32) -> bool {
        if self.y - height < MARGIN {
            self.break_page();
            return true;
        }
        false
    }

    fn text_at(&mut self, x: f32, y: f32, font: Font, size: f32, text: &str) {
        self.ops.push_str(&format!(
            "BT /{} {:.1} Tf {:.2} {:.2} Td ({}) Tj ET\n",
            font.resource(),
            size,
            x,
            y,
            encode(text)
        ));
    }

    fn line(&mut self, font: Font, size: f32, text: &str) {
        self.ensure(size + 4.0);
        self.y -= size + 4.0;
        let y = self.y;
        self.text_at(MARGIN, y, font, size, text);
    }

    fn rule(&mut self) {
        let y = self.y - 3.0;
        self.ops.push_str(&format!(
            "0.5 w {:.2} {:.2} m {:.2} {:.2} l S\n",
            MARGIN,
            y,
            PAGE_WIDTH - MARGIN,
            y
        ));
    }

    fn gap(&mut self, height: f32) {
        self.y -= height;
    }

    fn row(&mut self, cells: &[String], font: Font) {
        let width = (PAGE_WIDTH - 2.0 * MARGIN) / cells.len().max(1) as f32;
        self.y -= LINE_HEIGHT;
        let y = self.y;
        for (i, cell) in cells.iter().enumerate() {
            let x = MARGIN + i as f32 * width;
            let text = fit(cell, width - 4.0, BODY_SIZE);
            self.text_at(x, y, font, BODY_SIZE, &text);
        }
    }

    fn table(&mut self, headers: &[&str], rows: &[Vec<String>]) {
        let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        self.ensure(LINE_HEIGHT * 2.0);
        self.row(&headers, Font::Bold);
        self.rule();
        for row in rows {
            if self.ensure(LINE_HEIGHT) {
                self.row(&headers, Font::Bold);
                self.rule();
            }
            self.row(row, Font::Regular);
        }
    }

    fn finish(mut self) -> Vec<String> {
        if !self.ops.is_empty() || self.pages.is_empty() {
            self.pages.push(self.ops);
        }
        let total = self.pages.len();
        for (i, page) in self.pages.iter_mut().enumerate() {
            let footer = format!("Page {} of {}", i + 1, total);
            page.push_str(&format!(
                "BT /F1 8.0 Tf {:.2} {:.2} Td ({}) Tj ET\n",
                PAGE_WIDTH - MARGIN - 50.0,
                MARGIN / 2.0,
                encode(&footer)
            ));
        }
        self.pages
    }
}

/// Assemble page content streams into a complete document
fn assemble(pages: &[String]) -> Vec<u8> {
    // 1 catalog, 2 page tree, 3-4 fonts, then a page and its content per page
    let page_obj = |k: usize| 5 + 2 * k;
    let kids: Vec<String> = (0..pages.len())
        .map(|k| format!("{} 0 R", page_obj(k)))
        .collect();

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages.len()
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];
    for (k, content) in pages.iter().enumerate() {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
             /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
            PAGE_WIDTH,
            PAGE_HEIGHT,
            page_obj(k) + 1
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}endstream",
            content.len(),
            content
        ));
    }

    let mut out: Vec<u8> = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        )
        .as_bytes(),
    );
    out
}

/// Render the chosen sections as a PDF document
pub fn render(data: &ReportData, sections: &[ReportSection], shop_name: &str, currency: &str) -> Vec<u8> {
    let mut layout = Layout::new();
    layout.line(Font::Bold, 16.0, &format!("{} - Shop Report", shop_name));
    layout.line(Font::Regular, 10.0, &format!("Period: {}", data.period));
    layout.line(Font::Regular, 10.0, &format!("Currency: {}", currency));

    for section in sections {
        layout.gap(LINE_HEIGHT);
        layout.ensure(LINE_HEIGHT * 3.0);
        layout.line(Font::Bold, 12.0, section.title());
        let rows = section.rows(data);
        if rows.is_empty() {
            layout.line(Font::Regular, BODY_SIZE, "No orders in this period.");
            continue;
        }
        layout.table(section.headers(), &rows);
    }

    let pages = layout.finish();
    tracing::debug!(pages = pages.len(), "rendered pdf");
    assemble(&pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::{EntityId, EntityPrefix};
    use crate::entities::OrderStatus;
    use crate::reports::fixtures::Fixture;
    use crate::reports::{aggregate, DateRange};
    use chrono::NaiveDate;

    fn period() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
        .unwrap()
    }

    fn count(haystack: &[u8], needle: &str) -> usize {
        String::from_utf8_lossy(haystack).matches(needle).count()
    }

    #[test]
    fn test_encode_escapes_and_latin1() {
        assert_eq!(encode("a(b)c\\"), "a\\(b\\)c\\\\");
        assert_eq!(encode("João"), "Jo\\343o");
        assert_eq!(encode("R$ 10 €"), "R$ 10 \\200");
        assert_eq!(encode("日本"), "??");
    }

    #[test]
    fn test_fit_truncates_long_cells() {
        assert_eq!(fit("short", 100.0, 10.0), "short");
        let cut = fit("a very long customer name indeed", 40.0, 10.0);
        assert!(cut.ends_with(".."));
        assert!(cut.chars().count() <= 7);
    }

    #[test]
    fn test_empty_report_is_single_page_document() {
        let pdf = render(&aggregate(period(), &[]), ReportSection::all(), "Oficina", "BRL");
        assert!(pdf.starts_with(b"%PDF-1.4"));
        assert!(pdf.ends_with(b"%%EOF\n"));
        assert_eq!(count(&pdf, "/Type /Page "), 1);
        assert_eq!(count(&pdf, "/Count 1 "), 1);
    }

    #[test]
    fn test_long_tables_break_pages() {
        let mut fx = Fixture::new();
        let records: Vec<_> = (0..120)
            .map(|i| {
                let c = EntityId::new(EntityPrefix::Cust);
                let v = EntityId::new(EntityPrefix::Veh);
                fx.record(
                    (&c, &format!("Cliente {}", i)),
                    (&v, "ABC1234"),
                    "2024-04-10",
                    OrderStatus::Completed,
                    None,
                    &[("Revisão", "Geral", "10.00")],
                )
            })
            .collect();
        let pdf = render(&aggregate(period(), &records), &[ReportSection::Orders], "Oficina", "BRL");
        assert!(count(&pdf, "/Type /Page ") > 1);
        assert!(count(&pdf, "Page 2 of") == 1);
    }

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let pdf = render(&aggregate(period(), &[]), &[ReportSection::Summary], "Oficina", "BRL");
        let text = String::from_utf8_lossy(&pdf).into_owned();
        let xref_at: usize = text
            .rsplit("startxref\n")
            .next()
            .and_then(|tail| tail.lines().next())
            .unwrap()
            .parse()
            .unwrap();
        assert!(pdf[xref_at..].starts_with(b"xref"));
        let table = String::from_utf8_lossy(&pdf[xref_at..]).into_owned();
        let first_entry = &table.lines().nth(3).unwrap()[..10];
        let offset: usize = first_entry.parse().unwrap();
        assert!(pdf[offset..].starts_with(b"1 0 obj"));
    }
}
