// PoE status page scraping
//
// `cmd=773` renders the PoE port table as HTML. There are no ids or
// classes to anchor on, so the table is found by structural position and
// rows are recognised by having exactly 13 cells.

use std::fmt;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use tracing::{debug, trace, warn};

use crate::auth::TableLocator;
use crate::client::SwitchClient;
use crate::error::Error;
use crate::transport::Transport;

/// Status page command.
pub(crate) const STATUS_CMD: &str = "773";

static TABLE: LazyLock<Selector> = LazyLock::new(|| selector("table"));
static ROW: LazyLock<Selector> = LazyLock::new(|| selector("tr"));
static CELL: LazyLock<Selector> = LazyLock::new(|| selector("td"));

pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid CSS")
}

// ── Records ──────────────────────────────────────────────────────────

/// Administrative PoE state of a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    On,
    Off,
    /// Anything other than "Enable"/"Disable", kept verbatim.
    Unknown(String),
}

impl PowerState {
    pub fn from_cell(cell: &str) -> Self {
        match cell {
            "Enable" => Self::On,
            "Disable" => Self::Off,
            other => Self::Unknown(other.to_owned()),
        }
    }

    pub fn from_bool(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }

    pub fn is_on(&self) -> bool {
        matches!(self, Self::On)
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => f.write_str("on"),
            Self::Off => f.write_str("off"),
            Self::Unknown(raw) => f.write_str(raw),
        }
    }
}

/// One row of the PoE status table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortRecord {
    pub port_id: String,
    pub power: PowerState,
    pub class: String,
    pub priority: String,
    pub power_up_mode: String,
    pub wide_range_detection: String,
    pub current_power_watts: f64,
    pub max_power_watts: f64,
    pub time_range_name: String,
    pub time_range_status: String,
}

#[derive(Debug, ThisError)]
enum RowError {
    #[error("expected 13 cells, found {0}")]
    CellCount(usize),
    #[error("{field} is not an integer milliwatt value: {value:?}")]
    Power { field: &'static str, value: String },
}

fn milliwatts_to_watts(field: &'static str, value: &str) -> Result<f64, RowError> {
    value
        .parse::<i32>()
        .map(|mw| f64::from(mw) / 1000.0)
        .map_err(|_| RowError::Power {
            field,
            value: value.to_owned(),
        })
}

fn parse_row(cells: &[String]) -> Result<PortRecord, RowError> {
    let [
        _,
        _,
        port,
        state,
        class,
        priority,
        power_up,
        wide_range,
        consumption_mw,
        max_power_mw,
        range_name,
        range_status,
        _,
    ] = cells
    else {
        return Err(RowError::CellCount(cells.len()));
    };

    Ok(PortRecord {
        port_id: port.clone(),
        power: PowerState::from_cell(state),
        class: class.clone(),
        priority: priority.clone(),
        power_up_mode: power_up.clone(),
        wide_range_detection: wide_range.clone(),
        current_power_watts: milliwatts_to_watts("current power", consumption_mw)?,
        max_power_watts: milliwatts_to_watts("max power", max_power_mw)?,
        time_range_name: range_name.clone(),
        time_range_status: range_status.clone(),
    })
}

// ── Table location ───────────────────────────────────────────────────

fn locate_rows(doc: &Html, locator: TableLocator) -> Option<Vec<ElementRef<'_>>> {
    match locator {
        TableLocator::NestedInFirst { index, header_rows } => {
            let outer = doc.select(&TABLE).next()?;
            let table = outer
                .select(&TABLE)
                .filter(|t| t.id() != outer.id())
                .nth(index)?;
            Some(table.select(&ROW).skip(header_rows).collect())
        }
        TableLocator::Nth { index } => {
            let table = doc.select(&TABLE).nth(index)?;
            Some(table.select(&ROW).collect())
        }
    }
}

fn cell_texts(row: ElementRef<'_>) -> Vec<String> {
    row.select(&CELL)
        .map(|td| td.text().collect::<String>().trim().to_owned())
        .collect()
}

/// Extract port records from a status page.
///
/// Rows without exactly 13 cells are layout and are skipped quietly. Rows
/// whose power readings aren't integers are skipped with a warning. A page
/// without the expected table is an error.
pub fn parse_port_table(html: &str, locator: TableLocator) -> Result<Vec<PortRecord>, Error> {
    let doc = Html::parse_document(html);
    let rows = locate_rows(&doc, locator).ok_or_else(|| Error::Scrape {
        message: format!("port table not found ({locator:?})"),
    })?;

    let mut records = Vec::new();
    for row in rows {
        let cells = cell_texts(row);
        match parse_row(&cells) {
            Ok(record) => records.push(record),
            Err(RowError::CellCount(n)) => trace!(cells = n, "skipping non-port row"),
            Err(e) => warn!(row = ?cells, error = %e, "skipping malformed port row"),
        }
    }
    Ok(records)
}

// ── Client operation ─────────────────────────────────────────────────

impl<T: Transport> SwitchClient<T> {
    /// Fetch the raw status page.
    pub(crate) async fn status_page(&mut self) -> Result<String, Error> {
        self.get_ok(&[("cmd", STATUS_CMD.to_owned())]).await
    }

    /// Scrape the PoE port table. Requires a valid session.
    ///
    /// An expired session gets the login page instead of the status page;
    /// when the table is missing the session is marked invalid so the next
    /// operation logs in again.
    pub async fn fetch_ports(&mut self) -> Result<Vec<PortRecord>, Error> {
        if !self.session.is_valid() {
            return Err(Error::SessionExpired);
        }

        let page = self.status_page().await?;
        match parse_port_table(&page, self.variant().table_locator()) {
            Ok(records) => {
                debug!(ports = records.len(), "status page scraped");
                Ok(records)
            }
            Err(e) => {
                warn!(error = %e, "status page has no port table, invalidating session");
                self.session.invalidate();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn row(cells: &[&str]) -> String {
        let tds: String = cells.iter().map(|c| format!("<td> {c} </td>")).collect();
        format!("<tr>{tds}</tr>")
    }

    fn port_row(port: &str, state: &str, mw: &str, max_mw: &str) -> String {
        row(&[
            "", "", port, state, "4", "Low", "802.3at", "Disable", mw, max_mw, "none", "-", "",
        ])
    }

    /// Third table in document order holds the ports.
    fn nth_layout(rows: &str) -> String {
        format!(
            "<html><body><table><tr><td>menu</td></tr></table>\
             <table><tr><td>summary</td></tr></table>\
             <table>{rows}</table></body></html>"
        )
    }

    /// Second table nested in the first, with a header row.
    fn nested_layout(rows: &str) -> String {
        format!(
            "<html><body><table><tr><td>\
             <table><tr><td>title</td></tr></table>\
             <table><tr><td>header</td></tr>{rows}</table>\
             </td></tr></table></body></html>"
        )
    }

    const NTH: TableLocator = TableLocator::Nth { index: 2 };
    const NESTED: TableLocator = TableLocator::NestedInFirst {
        index: 1,
        header_rows: 1,
    };

    #[test]
    fn enabled_row_is_powered() {
        let html = nth_layout(&port_row("1", "Enable", "4200", "30000"));
        let ports = parse_port_table(&html, NTH).unwrap();

        assert_eq!(
            ports,
            vec![PortRecord {
                port_id: "1".into(),
                power: PowerState::On,
                class: "4".into(),
                priority: "Low".into(),
                power_up_mode: "802.3at".into(),
                wide_range_detection: "Disable".into(),
                current_power_watts: 4.2,
                max_power_watts: 30.0,
                time_range_name: "none".into(),
                time_range_status: "-".into(),
            }]
        );
    }

    #[test]
    fn twelve_cell_row_is_skipped() {
        let short = row(&["", "", "9", "Enable", "4", "Low", "802.3at", "Disable", "0", "30000", "none", "-"]);
        let html = nth_layout(&format!("{short}{}", port_row("2", "Disable", "0", "15400")));
        let ports = parse_port_table(&html, NTH).unwrap();

        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].port_id, "2");
        assert_eq!(ports[0].power, PowerState::Off);
    }

    #[test]
    fn non_integer_power_skips_only_that_row() {
        let rows = format!(
            "{}{}",
            port_row("1", "Enable", "n/a", "30000"),
            port_row("2", "Enable", "1000", "30000")
        );
        let ports = parse_port_table(&nth_layout(&rows), NTH).unwrap();

        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].port_id, "2");
        assert_eq!(ports[0].current_power_watts, 1.0);
    }

    #[test]
    fn unknown_state_is_passed_through() {
        let html = nth_layout(&port_row("5", "Searching", "0", "30000"));
        let ports = parse_port_table(&html, NTH).unwrap();
        assert_eq!(ports[0].power, PowerState::Unknown("Searching".into()));
        assert!(!ports[0].power.is_on());
    }

    #[test]
    fn nested_layout_skips_header_row() {
        let header = row(&["", "", "Port", "State", "", "", "", "", "0", "0", "", "", ""]);
        let rows = format!("{}{}", port_row("7", "Enable", "500", "30000"), port_row("8", "Disable", "0", "30000"));
        // The header row sits first and would otherwise parse as a port.
        let html = nested_layout(&format!("{header}{rows}")).replacen("<tr><td>header</td></tr>", "", 1);
        let ports = parse_port_table(&html, NESTED).unwrap();

        let ids: Vec<_> = ports.iter().map(|p| p.port_id.as_str()).collect();
        assert_eq!(ids, vec!["7", "8"]);
    }

    #[test]
    fn missing_table_is_an_error() {
        let err = parse_port_table("<html><body><form>login</form></body></html>", NTH).unwrap_err();
        assert!(matches!(err, Error::Scrape { .. }));

        let err = parse_port_table("<html><body><table></table></body></html>", NESTED).unwrap_err();
        assert!(matches!(err, Error::Scrape { .. }));
    }

    #[test]
    fn max_power_in_milliwatts_becomes_watts() {
        assert_eq!(milliwatts_to_watts("max power", "30000").unwrap(), 30.0);
    }
}
