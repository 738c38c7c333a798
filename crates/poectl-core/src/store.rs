// ── Port state table ──
//
// Last known state of every port seen on a switch. Snapshots are merged,
// not swapped: a port missing from a later page keeps its old record.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use poectl_api::{PortRecord, PowerState};

/// Port id → latest record, plus when it was last refreshed.
#[derive(Debug, Clone, Default)]
pub struct PortTable {
    ports: HashMap<String, PortRecord>,
    last_refresh: Option<DateTime<Utc>>,
}

impl PortTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a scrape result. Later rows for the same port win.
    pub(crate) fn apply_snapshot(&mut self, records: Vec<PortRecord>) {
        for record in records {
            self.ports.insert(record.port_id.clone(), record);
        }
        self.last_refresh = Some(Utc::now());
    }

    /// Record an accepted command locally until the next refresh says
    /// otherwise. Returns `false` if the port has never been seen.
    pub(crate) fn mark_powered(&mut self, port: &str, on: bool) -> bool {
        match self.ports.get_mut(port) {
            Some(record) => {
                record.power = PowerState::from_bool(on);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, port: &str) -> Option<&PortRecord> {
        self.ports.get(port)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_refresh
    }

    /// Records ordered by port number, non-numeric ids last.
    pub fn sorted(&self) -> Vec<&PortRecord> {
        let mut records: Vec<_> = self.ports.values().collect();
        records.sort_by(|a, b| compare_port_ids(&a.port_id, &b.port_id));
        records
    }
}

fn compare_port_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u32>(), b.parse::<u32>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn record(port: &str, power: PowerState, watts: f64) -> PortRecord {
        PortRecord {
            port_id: port.into(),
            power,
            class: "0".into(),
            priority: "Low".into(),
            power_up_mode: "802.3at".into(),
            wide_range_detection: "Disable".into(),
            current_power_watts: watts,
            max_power_watts: 30.0,
            time_range_name: "none".into(),
            time_range_status: "-".into(),
        }
    }

    #[test]
    fn later_snapshot_overwrites_and_keeps_missing_ports() {
        let mut table = PortTable::new();
        table.apply_snapshot(vec![
            record("1", PowerState::On, 4.0),
            record("2", PowerState::Off, 0.0),
        ]);
        table.apply_snapshot(vec![record("1", PowerState::Off, 0.0)]);

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("1").unwrap().power, PowerState::Off);
        assert_eq!(table.get("2").unwrap().power, PowerState::Off);
        assert!(table.last_refresh().is_some());
    }

    #[test]
    fn duplicate_rows_last_one_wins() {
        let mut table = PortTable::new();
        table.apply_snapshot(vec![
            record("4", PowerState::On, 1.0),
            record("4", PowerState::On, 2.5),
        ]);
        assert_eq!(table.get("4").unwrap().current_power_watts, 2.5);
    }

    #[test]
    fn mark_powered_only_touches_known_ports() {
        let mut table = PortTable::new();
        table.apply_snapshot(vec![record("3", PowerState::Off, 0.0)]);

        assert!(table.mark_powered("3", true));
        assert!(table.get("3").unwrap().power.is_on());
        assert!(!table.mark_powered("9", true));
        assert!(table.get("9").is_none());
    }

    #[test]
    fn sorted_orders_numerically() {
        let mut table = PortTable::new();
        table.apply_snapshot(vec![
            record("10", PowerState::On, 0.0),
            record("2", PowerState::On, 0.0),
            record("uplink", PowerState::Off, 0.0),
            record("1", PowerState::On, 0.0),
        ]);
        let ids: Vec<_> = table.sorted().iter().map(|r| r.port_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "10", "uplink"]);
    }
}
