//! Paged table document.
//!
//! Rendering runs in two phases. [`layout`] places every mark and breaks the
//! table into pages, repeating the column header on each one. Once the page
//! count is known, [`stamp_page_numbers`] adds the "Page i / P" footer.
//! [`encode`] then writes the pages with lopdf.

use chrono::{DateTime, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

use crate::error::AppError;
use crate::report::format::display_cell;
use crate::report::{Cell, DateRange, ReportRows};

// A4 portrait, in points.
pub const PAGE_WIDTH: f32 = 595.0;
pub const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 40.0;

const TITLE_SIZE: f32 = 16.0;
const META_SIZE: f32 = 10.0;
const CELL_SIZE: f32 = 8.0;
const FOOTER_SIZE: f32 = 8.0;

const HEADER_HEIGHT: f32 = 20.0;
const ROW_HEIGHT: f32 = 16.0;
const CELL_PADDING: f32 = 3.0;
/// Lowest baseline a table row may use before breaking to a new page.
const TABLE_BOTTOM: f32 = MARGIN + 20.0;
const FOOTER_BASELINE: f32 = 20.0;

const HEADER_FILL: Rgb = Rgb(0.16, 0.50, 0.73);
const STRIPE_FILL: Rgb = Rgb(0.96, 0.96, 0.96);
const BLACK: Rgb = Rgb(0.0, 0.0, 0.0);
const WHITE: Rgb = Rgb(1.0, 1.0, 1.0);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(f32, f32, f32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
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

/// One drawing instruction, in page coordinates (origin bottom-left).
#[derive(Debug, Clone, PartialEq)]
pub enum Mark {
    Fill {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Rgb,
    },
    Text {
        x: f32,
        y: f32,
        size: f32,
        font: Font,
        color: Rgb,
        text: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub marks: Vec<Mark>,
}

impl PageLayout {
    /// Every text run on the page, in drawing order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.marks.iter().filter_map(|mark| match mark {
            Mark::Text { text, .. } => Some(text.as_str()),
            Mark::Fill { .. } => None,
        })
    }

    fn text(&mut self, x: f32, y: f32, size: f32, font: Font, color: Rgb, text: impl Into<String>) {
        self.marks.push(Mark::Text {
            x,
            y,
            size,
            font,
            color,
            text: text.into(),
        });
    }

    fn fill(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgb) {
        self.marks.push(Mark::Fill {
            x,
            y,
            width,
            height,
            color,
        });
    }
}

#[tracing::instrument(
    name = "render document",
    skip(rows, range, generated_at),
    fields(report.kind = %rows.kind(), report.rows = rows.len(), document.pages)
)]
pub fn render_document(
    rows: &ReportRows,
    range: Option<&DateRange>,
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>, AppError> {
    let mut pages = layout(rows, range, generated_at);
    stamp_page_numbers(&mut pages);
    tracing::Span::current().record("document.pages", pages.len());

    encode(&pages, rows.kind().title())
}

/// Phase 1: lays the title block and the table out over as many pages as
/// needed. Rows keep their received order.
pub fn layout(
    rows: &ReportRows,
    range: Option<&DateRange>,
    generated_at: DateTime<Utc>,
) -> Vec<PageLayout> {
    let kind = rows.kind();
    let table_width = PAGE_WIDTH - 2.0 * MARGIN;
    let widths: Vec<f32> = kind
        .column_weights()
        .iter()
        .map(|w| w * table_width)
        .collect();
    let numeric = numeric_columns(rows);

    let mut pages = Vec::new();
    let mut page = PageLayout::default();
    let mut y = PAGE_HEIGHT - MARGIN - TITLE_SIZE;

    page.text(MARGIN, y, TITLE_SIZE, Font::Bold, BLACK, kind.title());
    y -= TITLE_SIZE + 4.0;
    if let Some(range) = range {
        page.text(
            MARGIN,
            y,
            META_SIZE,
            Font::Regular,
            BLACK,
            format!("Période : {}", range.period_label()),
        );
        y -= META_SIZE + 6.0;
    }
    page.text(
        MARGIN,
        y,
        META_SIZE,
        Font::Regular,
        BLACK,
        format!("Date d'édition : {}", generated_at.format("%d/%m/%Y")),
    );
    y -= META_SIZE + 14.0;

    y = table_header(&mut page, kind.columns(), &widths, y);

    for (index, cells) in rows.cells().iter().enumerate() {
        if y - ROW_HEIGHT < TABLE_BOTTOM {
            pages.push(std::mem::take(&mut page));
            y = table_header(&mut page, kind.columns(), &widths, PAGE_HEIGHT - MARGIN);
        }

        let top = y;
        if index % 2 == 1 {
            page.fill(MARGIN, top - ROW_HEIGHT, table_width, ROW_HEIGHT, STRIPE_FILL);
        }

        let baseline = top - ROW_HEIGHT + (ROW_HEIGHT - CELL_SIZE) / 2.0 + 1.0;
        let mut x = MARGIN;
        for (column, cell) in cells.iter().enumerate() {
            let width = widths[column];
            let text = fit(&display_cell(cell), width - 2.0 * CELL_PADDING, CELL_SIZE);
            let text_x = if numeric[column] {
                x + width - CELL_PADDING - text_width(&text, CELL_SIZE)
            } else {
                x + CELL_PADDING
            };
            page.text(text_x, baseline, CELL_SIZE, Font::Regular, BLACK, text);
            x += width;
        }
        y -= ROW_HEIGHT;
    }

    pages.push(page);
    pages
}

/// Draws the filled header band at `top` and returns the y below it.
fn table_header(page: &mut PageLayout, labels: &[&str], widths: &[f32], top: f32) -> f32 {
    let table_width: f32 = widths.iter().sum();
    page.fill(MARGIN, top - HEADER_HEIGHT, table_width, HEADER_HEIGHT, HEADER_FILL);

    let baseline = top - HEADER_HEIGHT + (HEADER_HEIGHT - CELL_SIZE) / 2.0 + 1.0;
    let mut x = MARGIN;
    for (label, width) in labels.iter().zip(widths) {
        let text = fit(label, width - 2.0 * CELL_PADDING, CELL_SIZE);
        page.text(x + CELL_PADDING, baseline, CELL_SIZE, Font::Bold, WHITE, text);
        x += width;
    }
    top - HEADER_HEIGHT
}

/// Phase 2: with the page count known, stamps "Page i / P" bottom-right.
pub fn stamp_page_numbers(pages: &mut [PageLayout]) {
    let total = pages.len();
    for (index, page) in pages.iter_mut().enumerate() {
        let label = format!("Page {} / {}", index + 1, total);
        let x = PAGE_WIDTH - MARGIN - text_width(&label, FOOTER_SIZE);
        page.text(x, FOOTER_BASELINE, FOOTER_SIZE, Font::Regular, BLACK, label);
    }
}

/// Columns whose cells are all numeric, right-aligned in the table.
fn numeric_columns(rows: &ReportRows) -> Vec<bool> {
    let cells = rows.cells();
    (0..rows.columns().len())
        .map(|c| {
            cells
                .first()
                .and_then(|row| row.get(c))
                .is_some_and(|cell| matches!(cell, Cell::Number(_) | Cell::Position(_)))
        })
        .collect()
}

/// Approximate Helvetica advance width.
fn text_width(text: &str, size: f32) -> f32 {
    text.chars()
        .map(|c| match c {
            ' ' | '\u{a0}' | '\u{202f}' | '.' | ',' | ':' | ';' | 'i' | 'j' | 'l' | '\'' => 0.278,
            'f' | 't' | 'I' | '/' | '(' | ')' | '-' | 'r' => 0.333,
            'm' | 'M' | 'W' => 0.833,
            'w' => 0.722,
            c if c.is_ascii_uppercase() => 0.667,
            _ => 0.556,
        })
        .sum::<f32>()
        * size
}

/// Truncates `text` with an ellipsis so it fits `max_width`.
fn fit(text: &str, max_width: f32, size: f32) -> String {
    if text_width(text, size) <= max_width {
        return text.to_string();
    }
    let ellipsis = "...";
    let budget = max_width - text_width(ellipsis, size);
    let mut out = String::new();
    let mut used = 0.0;
    for c in text.chars() {
        let w = text_width(c.encode_utf8(&mut [0; 4]), size);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push_str(ellipsis);
    out
}

/// Maps text onto WinAnsiEncoding bytes; unsupported characters become '?'.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7e}' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '\u{202f}' | '\u{2009}' => 0xa0,
            '€' => 0x80,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '–' => 0x96,
            '—' => 0x97,
            _ => b'?',
        })
        .collect()
}

fn operations(page: &PageLayout) -> Vec<Operation> {
    let mut ops = Vec::new();
    for mark in &page.marks {
        match mark {
            Mark::Fill {
                x,
                y,
                width,
                height,
                color: Rgb(r, g, b),
            } => {
                ops.push(Operation::new("q", vec![]));
                ops.push(Operation::new("rg", vec![(*r).into(), (*g).into(), (*b).into()]));
                ops.push(Operation::new(
                    "re",
                    vec![(*x).into(), (*y).into(), (*width).into(), (*height).into()],
                ));
                ops.push(Operation::new("f", vec![]));
                ops.push(Operation::new("Q", vec![]));
            }
            Mark::Text {
                x,
                y,
                size,
                font,
                color: Rgb(r, g, b),
                text,
            } => {
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new("rg", vec![(*r).into(), (*g).into(), (*b).into()]));
                ops.push(Operation::new("Tf", vec![font.resource().into(), (*size).into()]));
                ops.push(Operation::new("Td", vec![(*x).into(), (*y).into()]));
                ops.push(Operation::new("Tj", vec![Object::string_literal(win_ansi(text))]));
                ops.push(Operation::new("ET", vec![]));
            }
        }
    }
    ops
}

/// Writes the laid-out pages as an uncompressed PDF 1.5 file.
fn encode(pages: &[PageLayout], title: &str) -> Result<Vec<u8>, AppError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            Font::Regular.resource() => regular_id,
            Font::Bold.resource() => bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page in pages {
        let content = Content {
            operations: operations(page),
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_tree = dictionary! {
        "Type" => "Pages",
        "Count" => kids.len() as i64,
        "Kids" => kids,
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::from(0_i64),
            Object::from(0_i64),
            Object::from(PAGE_WIDTH),
            Object::from(PAGE_HEIGHT),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(page_tree));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(win_ansi(title)),
        "Producer" => Object::string_literal("fleet-reports"),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|err| AppError::Render(format!("document: {err}")))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportKind;
    use crate::report::rows::fixtures::{cost, cost_rows};
    use chrono::{NaiveDate, TimeZone};

    fn january() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
    }

    fn edition_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 5, 9, 30, 0).unwrap()
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|window| window == needle)
    }

    #[test]
    fn test_two_rows_fit_on_one_page() {
        let rows = ReportRows::VehicleCost(vec![
            cost("1234 TBA", 150_000.0, 50_000.0),
            cost("5678 TBB", 80_000.0, 0.0),
        ]);
        let pages = layout(&rows, Some(&january()), edition_date());

        assert_eq!(pages.len(), 1);
        let texts: Vec<&str> = pages[0].texts().collect();
        assert_eq!(texts[0], "Rapport des Coûts par Véhicule");
        assert!(texts.contains(&"Période : du 2024-01-01 au 2024-01-31"));
        assert!(texts.contains(&"Date d'édition : 05/02/2024"));
        assert!(texts.contains(&"1234 TBA"));
    }

    #[test]
    fn test_range_line_omitted_without_range() {
        let pages = layout(
            &ReportRows::empty(ReportKind::TopMaintenance),
            None,
            edition_date(),
        );
        assert!(!pages[0].texts().any(|t| t.starts_with("Période")));
    }

    #[test]
    fn test_header_repeats_and_rows_keep_order_across_pages() {
        let rows = cost_rows(120);
        let mut pages = layout(&rows, Some(&january()), edition_date());
        assert!(pages.len() > 1);

        for page in &pages {
            assert!(page.texts().any(|t| t == "Immatriculation"));
        }

        let plates: Vec<&str> = pages
            .iter()
            .flat_map(|p| p.texts())
            .filter(|t| t.ends_with(" TBA"))
            .collect();
        let expected: Vec<String> = (0..120).map(|i| format!("{:04} TBA", 1000 + i)).collect();
        assert_eq!(plates, expected);

        stamp_page_numbers(&mut pages);
        let total = pages.len();
        for (i, page) in pages.iter().enumerate() {
            let stamp = format!("Page {} / {}", i + 1, total);
            assert_eq!(page.texts().filter(|t| *t == stamp).count(), 1);
        }
    }

    #[test]
    fn test_marks_stay_inside_page() {
        let pages = layout(&cost_rows(120), None, edition_date());
        for page in &pages {
            for mark in &page.marks {
                if let Mark::Text { x, y, .. } = mark {
                    assert!(*x >= 0.0 && *x <= PAGE_WIDTH, "x = {x}");
                    assert!(*y >= TABLE_BOTTOM - ROW_HEIGHT && *y <= PAGE_HEIGHT, "y = {y}");
                }
            }
        }
    }

    #[test]
    fn test_rendered_document_has_stamped_pages() {
        let rows = cost_rows(120);
        let expected_pages = layout(&rows, Some(&january()), edition_date()).len();
        let bytes = render_document(&rows, Some(&january()), edition_date()).unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        let page_ids = doc.get_pages();
        assert_eq!(page_ids.len(), expected_pages);

        for (number, id) in page_ids {
            let content = doc.get_page_content(id).unwrap();
            let stamp = format!("(Page {} / {})", number, expected_pages);
            assert!(contains(&content, stamp.as_bytes()), "missing {stamp}");
            assert!(contains(&content, b"(Immatriculation)"));
        }
    }

    #[test]
    fn test_rendered_period_and_single_page() {
        let rows = ReportRows::VehicleCost(vec![
            cost("1234 TBA", 150_000.0, 50_000.0),
            cost("5678 TBB", 80_000.0, 0.0),
        ]);
        let bytes = render_document(&rows, Some(&january()), edition_date()).unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        let content = doc.get_page_content(doc.page_iter().next().unwrap()).unwrap();
        assert!(contains(&content, b"du 2024-01-01 au 2024-01-31"));
        assert!(contains(&content, b"(Page 1 / 1)"));
    }

    #[test]
    fn test_win_ansi_mapping() {
        assert_eq!(win_ansi("Période"), b"P\xe9riode".to_vec());
        assert_eq!(win_ansi("1\u{202f}250"), b"1\xa0250".to_vec());
        assert_eq!(win_ansi("€"), vec![0x80]);
        assert_eq!(win_ansi("日"), b"?".to_vec());
    }

    #[test]
    fn test_fit_truncates_long_text() {
        let long = "Remplacement complet du système de freinage avant et arrière";
        let fitted = fit(long, 60.0, CELL_SIZE);
        assert!(fitted.ends_with("..."));
        assert!(text_width(&fitted, CELL_SIZE) <= 60.0);
        assert_eq!(fit("Vidange", 60.0, CELL_SIZE), "Vidange");
    }
}
