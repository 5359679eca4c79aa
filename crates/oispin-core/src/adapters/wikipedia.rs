use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::http_client::{HttpClient, HttpRequest};
use crate::source::{RosterFetchError, RosterSource};
use crate::Symbol;

const SP500_MEMBERS_URL: &str = "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies";

/// A scraped roster smaller than this is a truncated or error page, not a
/// real constituents table.
const MIN_PLAUSIBLE_ROSTER: usize = 100;

/// Roster source backed by the Wikipedia S&P 500 constituents table.
pub struct WikipediaRosterSource {
    http_client: Arc<dyn HttpClient>,
    timeout_ms: u64,
}

impl WikipediaRosterSource {
    pub fn new(http_client: Arc<dyn HttpClient>, timeout_ms: u64) -> Self {
        Self {
            http_client,
            timeout_ms,
        }
    }
}

impl RosterSource for WikipediaRosterSource {
    fn fetch_roster<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<BTreeSet<Symbol>, RosterFetchError>> + Send + 'a>>
    {
        Box::pin(async move {
            let request = HttpRequest::get(SP500_MEMBERS_URL).with_timeout_ms(self.timeout_ms);

            let response = self.http_client.execute(request).await.map_err(|error| {
                RosterFetchError::new(format!("wikipedia transport error: {}", error.message()))
            })?;

            if !response.is_success() {
                return Err(RosterFetchError::new(format!(
                    "wikipedia returned status {}",
                    response.status
                )));
            }

            let symbols = extract_constituents(&response.body)?;
            if symbols.len() < MIN_PLAUSIBLE_ROSTER {
                return Err(RosterFetchError::new(format!(
                    "constituents table yielded only {} symbols",
                    symbols.len()
                )));
            }

            Ok(symbols)
        })
    }
}

/// Pull the first-column ticker out of every row of the constituents table.
///
/// Cells that do not parse as a symbol (header cells, footnote markup) are
/// skipped; the plausibility floor above catches a page whose structure
/// changed enough to break extraction.
fn extract_constituents(body: &str) -> Result<BTreeSet<Symbol>, RosterFetchError> {
    let table_start = body
        .find("id=\"constituents\"")
        .ok_or_else(|| RosterFetchError::new("constituents table not found in page"))?;
    let table = &body[table_start..];
    let table = match table.find("</table>") {
        Some(end) => &table[..end],
        None => table,
    };

    let mut symbols = BTreeSet::new();
    for row in table.split("<tr").skip(1) {
        let Some(cell_start) = row.find("<td") else {
            continue;
        };
        let cell = &row[cell_start..];
        let Some(cell_end) = cell.find("</td>") else {
            continue;
        };

        let text = strip_tags(&cell[..cell_end]);
        if let Ok(symbol) = Symbol::parse(&text) {
            symbols.insert(symbol);
        }
    }

    Ok(symbols)
}

fn strip_tags(fragment: &str) -> String {
    let mut text = String::new();
    let mut in_tag = true; // fragment starts inside the <td ...> tag
    for ch in fragment.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    text.trim().to_owned()
}
