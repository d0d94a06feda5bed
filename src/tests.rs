use pretty_assertions::assert_eq;
use test_context::{test_context, TestContext};
use testresult::TestResult;

use crate::{
    gcode::GcodeLine, noop::Noop, usage, FilamentTracker, InMemoryStore, JobState, PauseControl, PrintEvent, Profile,
    Settings, SpoolRecord, SpoolStore, Table,
};

const CLIENT: &str = "octopi";

struct InventoryContext {
    store: InMemoryStore,
    pla: Profile,
    spool: u64,
}

impl TestContext for InventoryContext {
    fn setup() -> Self {
        let store = InMemoryStore::new();
        let pla = store.create_profile("Prusament", "PLA", 1.24, 1.75);
        let spool = store.create_spool("Galaxy Black", pla.id, 1000.0).unwrap();
        store.select_spool(0, CLIENT, Some(spool.id)).unwrap();

        InventoryContext {
            store,
            pla,
            spool: spool.id,
        }
    }
}

impl InventoryContext {
    fn tracker(&self, settings: Settings, tool_count: usize) -> FilamentTracker<&InMemoryStore> {
        FilamentTracker::new(&self.store, settings, CLIENT, tool_count)
    }

    fn used(&self, spool: u64) -> f64 {
        self.store.spool(spool).unwrap().used
    }
}

fn send(tracker: &mut FilamentTracker<&InMemoryStore>, lines: &[&str]) {
    for line in lines {
        let line = GcodeLine::parse(line).unwrap();
        tracker.on_line(&line);
    }
}

fn assert_close(actual: f64, expected: f64) {
    assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
}

#[test_context(InventoryContext)]
#[test]
fn test_finished_print_updates_spool(ctx: &mut InventoryContext) -> TestResult {
    let mut tracker = ctx.tracker(Settings::default(), 1);

    tracker.on_event(PrintEvent::Started);
    send(&mut tracker, &["G90", "M82", "G92 E0", "G1 X10 E500", "G1 E498", "G1 X20 E1000"]);

    let report = tracker.on_event(PrintEvent::Done).ok_or("no report")?;
    assert_eq!(report.tools.len(), 1);
    assert_eq!(report.tools[0].length_mm, 1000.0);
    assert_close(report.tools[0].mass_g, usage::length_to_mass(&ctx.pla, 1000.0));
    assert!((report.tools[0].mass_g - 2.98).abs() < 0.01);

    assert_close(ctx.used(ctx.spool), report.tools[0].mass_g);
    assert_close(report.tools[0].remaining_g, 1000.0 - report.tools[0].mass_g);
    assert_eq!(tracker.state(), JobState::Idle);

    Ok(())
}

#[test_context(InventoryContext)]
#[test]
fn test_pause_resume_counts_once(ctx: &mut InventoryContext) -> TestResult {
    let mut tracker = ctx.tracker(Settings::default(), 1);

    tracker.on_event(PrintEvent::Started);
    send(&mut tracker, &["G92 E0", "G1 E400"]);

    let paused = tracker.on_event(PrintEvent::Paused).ok_or("no report on pause")?;
    assert_eq!(paused.tools[0].length_mm, 400.0);
    assert_eq!(tracker.state(), JobState::Paused);
    assert_eq!(tracker.odometer().extrusion(), &[0.0]);

    // Manual moves while paused are not the print's.
    send(&mut tracker, &["G1 E450"]);
    tracker.on_event(PrintEvent::Resumed);
    assert_eq!(tracker.state(), JobState::Printing);

    send(&mut tracker, &["G1 E1000"]);
    let finished = tracker.on_event(PrintEvent::Done).ok_or("no report on finish")?;
    assert_eq!(finished.tools[0].length_mm, 600.0);

    assert_close(ctx.used(ctx.spool), usage::length_to_mass(&ctx.pla, 1000.0));

    Ok(())
}

#[test_context(InventoryContext)]
#[test]
fn test_terminal_events_flush_once(ctx: &mut InventoryContext) -> TestResult {
    let mut tracker = ctx.tracker(Settings::default(), 1);

    assert_eq!(tracker.on_event(PrintEvent::Done), None);

    tracker.on_event(PrintEvent::Started);
    send(&mut tracker, &["G1 E100"]);
    assert!(tracker.on_event(PrintEvent::Cancelled).is_some());
    assert_eq!(tracker.on_event(PrintEvent::Failed), None);

    assert_close(ctx.used(ctx.spool), usage::length_to_mass(&ctx.pla, 100.0));

    Ok(())
}

#[test_context(InventoryContext)]
#[test]
fn test_lines_outside_a_print_are_ignored(ctx: &mut InventoryContext) -> TestResult {
    let mut tracker = ctx.tracker(Settings::default(), 1);

    let outcome = tracker.on_gcode_sent("G1", "G1 E50");
    assert!(!outcome.consumed);
    assert_eq!(tracker.odometer().extrusion(), &[0.0]);

    let mut tracker = ctx.tracker(
        Settings {
            enable_odometer: false,
            ..Settings::default()
        },
        1,
    );
    tracker.on_event(PrintEvent::Started);
    assert!(!tracker.on_gcode_sent("G1", "G1 E50").consumed);
    assert_eq!(tracker.on_event(PrintEvent::Done), None);
    assert_eq!(ctx.used(ctx.spool), 0.0);

    Ok(())
}

#[test_context(InventoryContext)]
#[test]
fn test_filament_change_flushes(ctx: &mut InventoryContext) -> TestResult {
    let mut tracker = ctx.tracker(Settings::default(), 1);

    tracker.on_event(PrintEvent::Started);
    send(&mut tracker, &["G92 E0", "G1 E100"]);

    let outcome = tracker.on_gcode_sent("M600", "M600");
    assert!(!outcome.consumed);
    let flushed = outcome.usage.ok_or("no report on filament change")?;
    assert_eq!(flushed.tools[0].length_mm, 100.0);
    assert_eq!(tracker.state(), JobState::Printing);

    send(&mut tracker, &["G1 E150"]);
    let finished = tracker.on_event(PrintEvent::Done).ok_or("no report")?;
    assert_eq!(finished.tools[0].length_mm, 50.0);

    assert_close(ctx.used(ctx.spool), usage::length_to_mass(&ctx.pla, 150.0));

    Ok(())
}

#[test_context(InventoryContext)]
#[test]
fn test_usage_limited_to_tool_count(ctx: &mut InventoryContext) -> TestResult {
    let other = ctx.store.create_spool("Orange", ctx.pla.id, 1000.0)?;
    ctx.store.select_spool(1, CLIENT, Some(other.id))?;

    let mut tracker = ctx.tracker(Settings::default(), 1);
    tracker.on_event(PrintEvent::Started);
    send(&mut tracker, &["T1", "G92 E0", "G1 E80", "T0", "G1 E20"]);

    let report = tracker.on_event(PrintEvent::Done).ok_or("no report")?;
    assert_eq!(report.tools.len(), 1);
    assert_eq!(report.tools[0].tool, 0);
    assert_eq!(ctx.used(other.id), 0.0);

    Ok(())
}

#[test_context(InventoryContext)]
#[test]
fn test_multi_tool_usage(ctx: &mut InventoryContext) -> TestResult {
    let other = ctx.store.create_spool("Orange", ctx.pla.id, 1000.0)?;
    ctx.store.select_spool(1, CLIENT, Some(other.id))?;

    let mut tracker = ctx.tracker(Settings::default(), 3);
    tracker.on_event(PrintEvent::Started);
    send(
        &mut tracker,
        &["T2", "G1 E5", "T1", "G92 E0", "G1 E80", "T0", "G92 E0", "G1 E20"],
    );

    let report = tracker.on_event(PrintEvent::Done).ok_or("no report")?;
    let tools: Vec<(usize, f64)> = report.tools.iter().map(|usage| (usage.tool, usage.length_mm)).collect();
    assert_eq!(tools, vec![(0, 20.0), (1, 80.0)]);
    assert_close(ctx.used(other.id), usage::length_to_mass(&ctx.pla, 80.0));

    Ok(())
}

#[test_context(InventoryContext)]
#[test]
fn test_zero_density_has_no_threshold(ctx: &mut InventoryContext) -> TestResult {
    let broken = ctx.store.create_profile("Unknown", "Mystery", 0.0, 1.75);
    let spool = ctx.store.create_spool("Mystery", broken.id, 500.0)?;
    ctx.store.select_spool(1, CLIENT, Some(spool.id))?;

    let tracker = ctx.tracker(Settings::default(), 2);
    let thresholds = tracker.pause_thresholds();
    assert!(thresholds.contains_key(&0));
    assert!(!thresholds.contains_key(&1));

    let expected = usage::remaining_length(&ctx.pla, 1000.0)? - Settings::default().pause_threshold;
    assert_close(thresholds[&0], expected);

    Ok(())
}

#[test_context(InventoryContext)]
#[test]
fn test_auto_pause(ctx: &mut InventoryContext) -> TestResult {
    let spool = ctx.store.create_spool("Nearly empty", ctx.pla.id, 3.0)?;
    ctx.store.select_spool(0, CLIENT, Some(spool.id))?;

    let settings = Settings {
        auto_pause: true,
        ..Settings::default()
    };
    let mut tracker = ctx.tracker(settings, 1);
    // About 1006 mm left on the spool, less 100 mm reserve.
    let threshold = tracker.pause_thresholds()[&0];
    assert!((threshold - 905.9).abs() < 0.1, "threshold was {threshold}");

    tracker.on_event(PrintEvent::Started);
    assert!(!tracker.on_gcode_sent("G1", "G1 E500").pause);
    assert!(!tracker.check_threshold());

    let outcome = tracker.on_gcode_sent("G1", "G1 E1000");
    assert!(outcome.consumed);
    assert!(outcome.pause);
    assert!(tracker.check_threshold());

    Ok(())
}

#[test_context(InventoryContext)]
#[test]
fn test_threshold_change_recomputes(ctx: &mut InventoryContext) -> TestResult {
    let mut tracker = ctx.tracker(Settings::default(), 1);
    let before = tracker.pause_thresholds()[&0];

    tracker.set_settings(Settings {
        pause_threshold: 300.0,
        ..Settings::default()
    });
    assert_close(tracker.pause_thresholds()[&0], before - 200.0);

    Ok(())
}

#[test_context(InventoryContext)]
#[test]
fn test_flush_lowers_threshold(ctx: &mut InventoryContext) -> TestResult {
    let mut tracker = ctx.tracker(Settings::default(), 1);
    let before = tracker.pause_thresholds()[&0];

    tracker.on_event(PrintEvent::Started);
    send(&mut tracker, &["G92 E0", "G1 E250"]);
    tracker.on_event(PrintEvent::Done);

    assert!((tracker.pause_thresholds()[&0] - (before - 250.0)).abs() < 1e-6);
    assert!(ctx.store.selections(CLIENT)?[0].spool.is_some());

    Ok(())
}

#[test_context(InventoryContext)]
#[test]
fn test_line_numbered_gcode_is_counted(ctx: &mut InventoryContext) -> TestResult {
    let mut tracker = ctx.tracker(Settings::default(), 1);

    tracker.on_event(PrintEvent::Started);
    send(
        &mut tracker,
        &["N1 G92 E0*10", "N2 G1 X5 E40*33", "N3 T0*1", "N4 G1 E100 ; infill*9"],
    );

    let report = tracker.on_event(PrintEvent::Done).ok_or("no report")?;
    assert_eq!(report.tools[0].length_mm, 100.0);

    Ok(())
}

#[test_context(InventoryContext)]
#[test]
fn test_swapped_spool_after_auto_pause(ctx: &mut InventoryContext) -> TestResult {
    let nearly_empty = ctx.store.create_spool("Nearly empty", ctx.pla.id, 3.0)?;
    ctx.store.select_spool(0, CLIENT, Some(nearly_empty.id))?;

    let settings = Settings {
        auto_pause: true,
        ..Settings::default()
    };
    let mut tracker = ctx.tracker(settings, 1);

    tracker.on_event(PrintEvent::Started);
    send(&mut tracker, &["G92 E0"]);
    assert!(tracker.on_gcode_sent("G1", "G1 E1000").pause);
    tracker.on_event(PrintEvent::Paused);

    // Only the reserve is left, so the old spool would pause straight away.
    assert!(tracker.check_threshold());

    ctx.store.select_spool(0, CLIENT, Some(ctx.spool))?;
    tracker.on_data_modified(Table::Selections);
    assert!(!tracker.check_threshold());
    assert!(tracker.pause_thresholds()[&0] > 300_000.0);

    tracker.on_event(PrintEvent::Resumed);
    let outcome = tracker.on_gcode_sent("G1", "G1 E1010");
    assert!(outcome.consumed);
    assert!(!outcome.pause);

    let report = tracker.on_event(PrintEvent::Done).ok_or("no report")?;
    assert_eq!(report.tools[0].spool_id, ctx.spool);
    assert_eq!(report.tools[0].length_mm, 10.0);

    Ok(())
}

#[test_context(InventoryContext)]
#[test]
fn test_resume_reloads_thresholds(ctx: &mut InventoryContext) -> TestResult {
    let nearly_empty = ctx.store.create_spool("Nearly empty", ctx.pla.id, 3.0)?;
    ctx.store.select_spool(0, CLIENT, Some(nearly_empty.id))?;

    let settings = Settings {
        auto_pause: true,
        ..Settings::default()
    };
    let mut tracker = ctx.tracker(settings, 1);

    tracker.on_event(PrintEvent::Started);
    assert!(tracker.on_gcode_sent("G1", "G1 E1000").pause);
    tracker.on_event(PrintEvent::Paused);

    ctx.store.select_spool(0, CLIENT, Some(ctx.spool))?;
    tracker.on_event(PrintEvent::Resumed);

    assert!(!tracker.on_gcode_sent("G1", "G1 E1001").pause);

    Ok(())
}

#[test_context(InventoryContext)]
#[test]
fn test_temperature_offsets(ctx: &mut InventoryContext) -> TestResult {
    let hot = ctx.store.insert_spool(SpoolRecord {
        id: 40,
        name: "High flow".to_string(),
        profile: ctx.pla.id,
        cost: 25.0,
        weight: 750.0,
        used: 0.0,
        temp_offset: 5,
    })?;
    ctx.store.select_spool(1, CLIENT, Some(hot.id))?;

    let tracker = ctx.tracker(Settings::default(), 3);
    let offsets: Vec<(usize, i32)> = tracker.temperature_offsets()?.into_iter().collect();
    assert_eq!(offsets, vec![(0, 0), (1, 5), (2, 0)]);

    ctx.store.select_spool(1, CLIENT, None)?;
    assert_eq!(tracker.temperature_offsets()?.get(&1), Some(&0));

    Ok(())
}

#[tokio::test]
async fn test_pause_actuator_from_tracker() -> TestResult {
    let store = InMemoryStore::new();
    let pla = store.create_profile("Prusament", "PLA", 1.24, 1.75);
    let spool = store.create_spool("Sample", pla.id, 1.0)?;
    store.select_spool(0, CLIENT, Some(spool.id))?;

    let settings = Settings {
        auto_pause: true,
        pause_threshold: 0.0,
        ..Settings::default()
    };
    let mut tracker = FilamentTracker::new(&store, settings, CLIENT, 1);
    let mut actuator = Noop::new();

    tracker.on_event(PrintEvent::Started);
    for e in (0..=500).step_by(50) {
        let outcome = tracker.on_gcode_sent("G1", &format!("G1 E{e}"));
        if outcome.pause {
            actuator.pause().await?;
            tracker.on_event(PrintEvent::Paused);
        }
    }

    assert_eq!(actuator.pauses(), 1);
    assert_eq!(tracker.state(), JobState::Paused);
    assert!(store.spool(spool.id)?.remaining() <= 0.0);

    Ok(())
}
