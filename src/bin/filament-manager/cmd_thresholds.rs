use anyhow::Result;
use filament_manager::{Config, FilamentTracker, SpoolStore};

use super::{Cli, Format};

pub fn main(_cli: &Cli, cfg: &Config, format: Format) -> Result<()> {
    let client_id = cfg.client_id();
    let store = cfg.build_store(client_id)?;
    let tracker = FilamentTracker::new(&store, cfg.settings, client_id, cfg.tool_count);

    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(tracker.pause_thresholds())?);
        return Ok(());
    }

    let offsets = tracker.temperature_offsets()?;

    println!("{:>4}  {:<40}  {:>12}  {:>8}", "TOOL", "SPOOL", "PAUSE AT mm", "TEMP °C");
    for selection in store.selections(client_id)? {
        let Some(spool) = selection.spool else {
            continue;
        };
        let threshold = match tracker.pause_thresholds().get(&selection.tool) {
            Some(threshold) => format!("{threshold:.1}"),
            None => "-".to_owned(),
        };
        let offset = offsets.get(&selection.tool).copied().unwrap_or_default();
        println!(
            "{:>4}  {:<40}  {:>12}  {:>+8}",
            selection.tool,
            spool.label(),
            threshold,
            offset
        );
    }

    Ok(())
}
