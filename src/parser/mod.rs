pub mod assemble;
pub mod coords;
pub mod jurisdiction;
pub mod tables;

use scraper::Html;
use tracing::{debug, info};

use crate::model::{SiteRecord, UNKNOWN};
use assemble::RowRejection;

/// Result of one pass over a fetched page.
#[derive(Debug, Clone, Default)]
pub struct Harvest {
    pub sites: Vec<SiteRecord>,
    pub report: HarvestReport,
}

/// What was looked at and why things were dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestReport {
    pub tables_seen: usize,
    pub tables_rejected: usize,
    pub rows_seen: usize,
    pub rows_too_short: usize,
    pub rows_without_coordinates: usize,
    pub rows_unparseable: usize,
}

impl HarvestReport {
    pub fn rows_skipped(&self) -> usize {
        self.rows_too_short + self.rows_without_coordinates + self.rows_unparseable
    }

    fn count(&mut self, rejection: &RowRejection) {
        match rejection {
            RowRejection::TooFewCells(_) => self.rows_too_short += 1,
            RowRejection::NoCoordinates => self.rows_without_coordinates += 1,
            RowRejection::Unparseable(_) | RowRejection::OutOfRange(_) => {
                self.rows_unparseable += 1
            }
        }
    }
}

/// Two-stage pipeline: page → (heading, table) pairs → site records.
///
/// `page_url` is used as `wiki_url` unless the page declares a canonical link.
/// Output order is table order, then row order.
pub fn harvest(html: &str, page_url: &str) -> Harvest {
    let document = Html::parse_document(html);
    let wiki_url = tables::canonical_url(&document).unwrap_or_else(|| page_url.to_string());

    let mut out = Harvest::default();
    for table in tables::collect_tables(&document) {
        out.report.tables_seen += 1;
        let state = table
            .heading
            .as_deref()
            .map(jurisdiction::clean_heading)
            .unwrap_or_else(|| UNKNOWN.to_string());

        if !jurisdiction::is_recognized(&state) {
            info!("Skipping table under non-US heading: {}", state);
            out.report.tables_rejected += 1;
            continue;
        }
        debug!("Processing {} rows for {}", table.rows.len(), state);

        for (i, row) in table.rows.iter().enumerate() {
            out.report.rows_seen += 1;
            match assemble::assemble(row, &state, &wiki_url) {
                Ok(site) => {
                    debug!("Extracted site: {} - {}", site.site_code, site.name);
                    out.sites.push(site);
                }
                Err(rejection) => {
                    debug!("{} row {} skipped: {}", state, i + 1, rejection);
                    out.report.count(&rejection);
                }
            }
        }
    }

    info!(
        "Extracted {} sites from {} tables ({} rejected, {} rows skipped)",
        out.sites.len(),
        out.report.tables_seen,
        out.report.tables_rejected,
        out.report.rows_skipped()
    );
    out
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://en.wikipedia.org/wiki/List_of_Nike_missile_sites";

    const TWO_TABLES: &str = r#"<html><body>
        <div class="mw-heading mw-heading2"><h2 id="California">California</h2></div>
        <table class="wikitable">
          <tr><th>Site</th><th>Location</th><th>Coordinates</th><th>Notes</th></tr>
          <tr><td>SF-88</td><td>Fort Barry</td>
              <td><span class="geo">37.8273; -122.5265</span></td>
              <td>Restored launch site open as a museum</td></tr>
          <tr><td>SF-51</td><td>Sweeney Ridge</td><td>no coordinates here</td><td>Control area</td></tr>
        </table>
        <h2>Ontario</h2>
        <table class="wikitable">
          <tr><th>Site</th><th>Location</th><th>Coordinates</th></tr>
          <tr><td>ON-1</td><td>Toronto</td><td><span class="geo">43.65; -79.38</span></td></tr>
        </table>
        </body></html>"#;

    #[test]
    fn only_recognized_rows_with_coordinates() {
        let h = harvest(TWO_TABLES, PAGE);
        assert_eq!(h.sites.len(), 1);
        let s = &h.sites[0];
        assert_eq!(s.site_code, "SF-88");
        assert_eq!(s.name, "Fort Barry");
        assert_eq!(s.state, "California");
        assert_eq!((s.latitude, s.longitude), (37.8273, -122.5265));
        assert_eq!(s.description, "Restored launch site open as a museum");
        assert_eq!(s.wiki_url, PAGE);

        assert_eq!(
            h.report,
            HarvestReport {
                tables_seen: 2,
                tables_rejected: 1,
                rows_seen: 2,
                rows_too_short: 0,
                rows_without_coordinates: 1,
                rows_unparseable: 0,
            }
        );
    }

    #[test]
    fn order_and_footnoted_headings() {
        let html = r#"
            <h2>Alaska<sup>[3]</sup></h2>
            <table class="wikitable">
              <tr><th>a</th><th>b</th><th>c</th></tr>
              <tr><td>A-1</td><td>Site Summit</td><td><span class="geo">61.25; -149.53</span></td></tr>
              <tr><td>A-2</td><td>Point</td><td><span class="geo">61.2; -149.9</span></td></tr>
            </table>
            <h3>New York[edit]</h3>
            <table class="wikitable">
              <tr><th>a</th><th>b</th><th>c</th></tr>
              <tr><td>NY-1</td><td>short</td></tr>
              <tr><td>NY-2</td><td>Lido Beach</td><td><span class="geo">not a place</span></td></tr>
              <tr><td>NY-3</td><td>Amityville</td><td><span class="geo">40.7; -73.4</span></td></tr>
            </table>"#;
        let h = harvest(html, PAGE);
        let codes: Vec<&str> = h.sites.iter().map(|s| s.site_code.as_str()).collect();
        assert_eq!(codes, vec!["A-1", "A-2", "NY-3"]);
        assert_eq!(h.sites[0].state, "Alaska");
        assert_eq!(h.sites[2].state, "New York");
        assert_eq!(h.report.rows_too_short, 1);
        assert_eq!(h.report.rows_unparseable, 1);
        assert_eq!(h.report.rows_skipped(), 2);
    }

    #[test]
    fn canonical_url_overrides_fetch_url() {
        let html = format!(
            r#"<html><head><link rel="canonical" href="https://en.wikipedia.org/wiki/Canonical"></head>
            <body>{}</body></html>"#,
            TWO_TABLES
        );
        let h = harvest(&html, "https://en.m.wikipedia.org/wiki/whatever");
        assert_eq!(h.sites[0].wiki_url, "https://en.wikipedia.org/wiki/Canonical");
    }

    #[test]
    fn table_without_heading_is_rejected() {
        let html = r#"<table class="wikitable">
            <tr><th>a</th><th>b</th><th>c</th></tr>
            <tr><td>X</td><td>Y</td><td><span class="geo">40.0; -75.0</span></td></tr>
            </table>"#;
        let h = harvest(html, PAGE);
        assert!(h.sites.is_empty());
        assert_eq!(h.report.tables_rejected, 1);
    }

    #[test]
    fn empty_document() {
        let h = harvest("", PAGE);
        assert!(h.sites.is_empty());
        assert_eq!(h.report, HarvestReport::default());
    }
}
