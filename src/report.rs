use comfy_table::{presets::ASCII_FULL, Table};

use crate::statistics::Statistics;

const FIELD_NAMES: [&str; 8] = [
    "Host",
    "Port",
    "Successed",
    "Failed",
    "Success Rate",
    "Minimum",
    "Maximum",
    "Average",
];

/// Collects snapshots and renders them for the terminal.
#[derive(Debug, Default)]
pub struct Printer {
    rows: Vec<Statistics>,
}

impl Printer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_statistics(&mut self, row: Statistics) {
        self.rows.push(row);
    }

    pub fn table(&self) -> String {
        let mut table = Table::new();
        table.load_preset(ASCII_FULL).set_header(FIELD_NAMES.to_vec());
        for row in &self.rows {
            table.add_row(vec![
                row.host.clone(),
                row.port.to_string(),
                row.successed.to_string(),
                row.failed.to_string(),
                row.success_rate.clone(),
                row.minimum.clone(),
                row.maximum.clone(),
                row.average.clone(),
            ]);
        }
        format!("\n{table}")
    }

    pub fn raw(&self) -> String {
        self.rows
            .iter()
            .map(|row| {
                format!(
                    "\n--- {host}[:{port}] tcping statistics ---\
                     \n{total} connections, {ok} successed, {failed} failed, {rate} success rate\
                     \nminimum = {min}, maximum = {max}, average = {avg}",
                    host = row.host,
                    port = row.port,
                    total = row.total(),
                    ok = row.successed,
                    failed = row.failed,
                    rate = row.success_rate,
                    min = row.minimum,
                    max = row.maximum,
                    avg = row.average,
                )
            })
            .collect()
    }

    pub fn json(&self) -> serde_json::Result<String> {
        match self.rows.as_slice() {
            [single] => serde_json::to_string_pretty(single),
            rows => serde_json::to_string_pretty(rows),
        }
    }
}
