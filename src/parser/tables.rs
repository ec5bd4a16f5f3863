use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

static TABLE_OR_HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2, h3, h4, table.wikitable").unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td, th").unwrap());
static GEO_SPAN: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span.geo").unwrap());
static CANONICAL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"link[rel="canonical"]"#).unwrap());

/// A wiki table paired with the heading that precedes it in document order.
#[derive(Debug, Clone)]
pub struct HarvestedTable {
    /// Raw heading text, markers not yet stripped. `None` if no heading precedes the table.
    pub heading: Option<String>,
    /// Data rows, header row already dropped.
    pub rows: Vec<RowCells>,
}

#[derive(Debug, Clone, Default)]
pub struct RowCells {
    /// Whitespace-normalized text of every `td`/`th`, in column order.
    pub cells: Vec<String>,
    /// Text of the coordinate span, if any cell carries one.
    pub coordinates: Option<String>,
}

/// Walk the document once, in order, remembering the last `h2`–`h4` seen and
/// attaching it to every `table.wikitable` that follows.
pub fn collect_tables(document: &Html) -> Vec<HarvestedTable> {
    let mut tables = Vec::new();
    let mut heading: Option<String> = None;

    for el in document.select(&TABLE_OR_HEADING) {
        match el.value().name() {
            "table" => tables.push(HarvestedTable {
                heading: heading.clone(),
                rows: el.select(&ROW).skip(1).map(row_cells).collect(),
            }),
            _ => heading = Some(element_text(&el)),
        }
    }

    tables
}

fn row_cells(row: ElementRef) -> RowCells {
    let mut out = RowCells::default();
    for cell in row.select(&CELL) {
        // Last span wins when several cells carry one.
        if let Some(span) = cell.select(&GEO_SPAN).next() {
            out.coordinates = Some(element_text(&span));
        }
        out.cells.push(element_text(&cell));
    }
    out
}

/// `<link rel="canonical">` target, if the page declares one.
pub fn canonical_url(document: &Html) -> Option<String> {
    document
        .select(&CANONICAL)
        .find_map(|el| el.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(str::to_string)
}

fn element_text(el: &ElementRef) -> String {
    let raw: String = el.text().collect();
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
