use crate::fact::Fact;
use crate::storage::DbStats;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct FactRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Fact")]
    text: String,
}

#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

/// Render facts as a rounded table. Empty input renders as an empty string.
pub fn facts_table(facts: &[Fact]) -> String {
    if facts.is_empty() {
        return String::new();
    }

    let rows = facts.iter().enumerate().map(|(i, fact)| FactRow {
        position: i + 1,
        id: fact.id.to_id_string(),
        text: fact.text.clone(),
    });
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn stats_table(stats: &DbStats) -> String {
    let rows = [
        MetricRow { metric: "Facts", value: stats.facts.to_string() },
        MetricRow { metric: "Size", value: format!("{} bytes", stats.size_bytes) },
    ];
    Table::new(rows).with(Style::rounded()).to_string()
}
