//! Extraction of tabular financial data from HTML pages.

use scraper::{ElementRef, Html, Selector};

/// A structured table lifted out of a page.
///
/// Absence means no qualifying table was found: a table only qualifies when
/// it has non-empty headers and at least one non-empty data row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinancialTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl FinancialTable {
    /// Renders the table as plain text, headers first then rows in order,
    /// cells joined with `" | "`. This is the form the loader hands to the
    /// chunker for embedding.
    pub fn to_text(&self) -> String {
        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        lines.push(self.headers.join(" | "));
        for row in &self.rows {
            lines.push(row.join(" | "));
        }
        lines.join("\n")
    }
}

/// Returns the first qualifying table in document order.
///
/// Later tables on the same page are ignored even if they are larger or
/// more relevant; first table wins.
pub fn extract_first_table(html: &str) -> Option<FinancialTable> {
    let document = Html::parse_document(html);
    let table_sel = Selector::parse("table").expect("static selector");

    document
        .select(&table_sel)
        .find_map(|table| parse_table(table))
}

fn parse_table(table: ElementRef<'_>) -> Option<FinancialTable> {
    let th_sel = Selector::parse("th").expect("static selector");
    let tr_sel = Selector::parse("tr").expect("static selector");
    let td_sel = Selector::parse("td").expect("static selector");

    let headers: Vec<String> = table
        .select(&th_sel)
        .map(cell_text)
        .filter(|text| !text.is_empty())
        .collect();

    let mut rows: Vec<Vec<String>> = table
        .select(&tr_sel)
        .map(|row| {
            row.select(&td_sel)
                .map(cell_text)
                .collect::<Vec<String>>()
        })
        .filter(|cells| cells.iter().any(|cell| !cell.is_empty()))
        .collect();

    // No <th> elements: promote the first data row to headers.
    let headers = if headers.is_empty() {
        if rows.is_empty() {
            return None;
        }
        rows.remove(0)
    } else {
        headers
    };

    if headers.is_empty() || rows.is_empty() {
        return None;
    }

    Some(FinancialTable { headers, rows })
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}
