//! CLI presentation: run summary table and configuration rendering.

use crate::batch::BatchStats;
use crate::config::BulkopConfig;
use crate::error::ApiError;
use comfy_table::Table;

/// Summary of one run, rendered for stderr.
pub fn format_stats_table(stats: &BatchStats) -> String {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Metric", "Count"]);
    let rows: [(&str, usize); 9] = [
        ("Queued", stats.queued),
        ("Composite calls", stats.composite_calls),
        ("Single calls", stats.single_calls),
        ("Succeeded", stats.succeeded),
        ("Suppressed", stats.suppressed),
        ("Failed", stats.failed),
        ("Retries scheduled", stats.retries_scheduled),
        ("Declined", stats.declined),
        ("Abandoned", stats.abandoned),
    ];
    for (label, count) in rows {
        table.add_row(vec![label.to_string(), count.to_string()]);
    }
    table.to_string()
}

/// Effective configuration as TOML.
pub fn format_config_toml(config: &BulkopConfig) -> Result<String, ApiError> {
    toml::to_string_pretty(config)
        .map_err(|e| ApiError::ConfigError(format!("Failed to render configuration: {}", e)))
}
