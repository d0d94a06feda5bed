use std::path::Path;

use anyhow::{Context, Result};
use filament_manager::{noop::Noop, Config, FilamentTracker, GcodeLine, PauseControl, PrintEvent, UsageReport};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{Cli, Format};

/// What happened while replaying a file.
#[derive(Debug, Default, Serialize)]
struct Replay {
    lines: usize,
    commands: usize,
    consumed: usize,
    paused_at: Option<usize>,
    usage: UsageReport,
}

pub async fn main(_cli: &Cli, cfg: &Config, file: &Path, format: Format) -> Result<()> {
    let client_id = cfg.client_id();
    let store = cfg.build_store(client_id)?;
    let mut tracker = FilamentTracker::new(&store, cfg.settings, client_id, cfg.tool_count);
    let mut actuator = Noop::new();

    let gcode = tokio::fs::File::open(file)
        .await
        .with_context(|| format!("opening {}", file.display()))?;
    let mut lines = BufReader::new(gcode).lines();

    let mut replay = Replay::default();
    tracker.on_event(PrintEvent::Started);

    while let Some(line) = lines.next_line().await? {
        replay.lines += 1;
        let Some(line) = GcodeLine::parse(&line) else {
            continue;
        };
        replay.commands += 1;

        let outcome = tracker.on_line(&line);
        if outcome.consumed {
            replay.consumed += 1;
        }
        if let Some(usage) = outcome.usage {
            replay.usage.merge(usage);
        }

        if outcome.pause {
            tracing::warn!(line = replay.lines, "spool is running out, stopping replay");
            actuator.pause().await?;
            replay.paused_at = Some(replay.lines);
            if let Some(usage) = tracker.on_event(PrintEvent::Paused) {
                replay.usage.merge(usage);
            }
            break;
        }
    }

    if replay.paused_at.is_none() {
        if let Some(usage) = tracker.on_event(PrintEvent::Done) {
            replay.usage.merge(usage);
        }
    }

    tracing::info!(
        lines = replay.lines,
        commands = replay.commands,
        consumed = replay.consumed,
        "replay finished"
    );

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&replay)?),
        Format::Table => print_table(&replay),
    }

    Ok(())
}

fn print_table(replay: &Replay) {
    println!("{:>4}  {:>6}  {:>12}  {:>10}  {:>12}", "TOOL", "SPOOL", "LENGTH mm", "MASS g", "LEFT g");
    for usage in &replay.usage.tools {
        println!(
            "{:>4}  {:>6}  {:>12.2}  {:>10.3}  {:>12.3}",
            usage.tool, usage.spool_id, usage.length_mm, usage.mass_g, usage.remaining_g
        );
    }
    println!("total {:.3} g", replay.usage.total_mass());

    if let Some(line) = replay.paused_at {
        println!("paused at line {line}");
    }
}
