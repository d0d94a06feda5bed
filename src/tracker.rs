//! The filament tracker ties the [Odometer] to the spool inventory.
//!
//! It is fed two things by the host: print job events, and every line of
//! G-code as it is sent to the printer. From those it keeps the odometer in
//! step with the job, writes the filament used back to the loaded spools, and
//! tells the caller when a print should be paused because a spool is about to
//! run out.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use parse_display::{Display, FromStr};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    config::Settings,
    gcode::{GcodeLine, FILAMENT_CHANGE},
    odometer::Odometer,
    store::Table,
    usage, SpoolStore,
};

/// Print job lifecycle events delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromStr, Deserialize, Serialize, JsonSchema)]
#[display(style = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PrintEvent {
    /// A new print job started.
    Started,

    /// The job was paused.
    Paused,

    /// The printer asked for a filament change (`M600`) mid-job.
    FilamentChange,

    /// A paused job was resumed.
    Resumed,

    /// The job finished.
    Done,

    /// The job failed.
    Failed,

    /// The job was cancelled.
    Cancelled,
}

/// Where the tracked print job is in its lifecycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display(style = "snake_case")]
pub enum JobState {
    /// No print job is active.
    #[default]
    Idle,

    /// A job is printing; sent G-code is tracked.
    Printing,

    /// A job is paused; sent G-code is not tracked.
    Paused,
}

/// Filament taken from the spool loaded in one tool.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct ToolUsage {
    /// Tool index.
    pub tool: usize,

    /// Spool the filament was taken from.
    pub spool_id: u64,

    /// Filament extruded, in millimeters.
    pub length_mm: f64,

    /// Filament extruded, in grams.
    pub mass_g: f64,

    /// Filament left on the spool after this usage, in grams.
    pub remaining_g: f64,
}

/// Filament usage written to the inventory.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct UsageReport {
    /// One entry per tool with a spool loaded.
    pub tools: Vec<ToolUsage>,
}

impl UsageReport {
    /// Total filament used across tools, in grams.
    pub fn total_mass(&self) -> f64 {
        self.tools.iter().map(|usage| usage.mass_g).sum()
    }

    /// Fold a later report into this one, summing lengths and masses per
    /// tool and keeping the latest remaining weight.
    pub fn merge(&mut self, other: UsageReport) {
        for usage in other.tools {
            match self
                .tools
                .iter_mut()
                .find(|known| known.tool == usage.tool && known.spool_id == usage.spool_id)
            {
                Some(known) => {
                    known.length_mm += usage.length_mm;
                    known.mass_g += usage.mass_g;
                    known.remaining_g = usage.remaining_g;
                }
                None => self.tools.push(usage),
            }
        }
        self.tools.sort_by_key(|usage| usage.tool);
    }
}

/// What happened to one line of sent G-code.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SendOutcome {
    /// The odometer tracked the command.
    pub consumed: bool,

    /// The loaded spool is about to run out and the print should be paused.
    pub pause: bool,

    /// Usage flushed because the line requested a filament change.
    pub usage: Option<UsageReport>,
}

/// Tracks filament usage of print jobs against a [SpoolStore].
#[derive(Debug)]
pub struct FilamentTracker<S> {
    store: S,
    settings: Settings,
    client_id: String,
    tool_count: usize,
    odometer: Odometer,
    pause_thresholds: BTreeMap<usize, f64>,
    state: JobState,
}

impl<S> FilamentTracker<S>
where
    S: SpoolStore,
{
    /// Create a tracker for a printer with `tool_count` extruders, recording
    /// usage against the selections of `client_id`.
    pub fn new(store: S, settings: Settings, client_id: impl Into<String>, tool_count: usize) -> Self {
        let mut odometer = Odometer::new();
        odometer.set_g90_extruder(settings.g90_influences_extruder);

        let mut tracker = Self {
            store,
            settings,
            client_id: client_id.into(),
            tool_count,
            odometer,
            pause_thresholds: BTreeMap::new(),
            state: JobState::Idle,
        };
        tracker.update_pause_thresholds();
        tracker
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The odometer following the current job.
    pub fn odometer(&self) -> &Odometer {
        &self.odometer
    }

    /// Current settings.
    pub fn settings(&self) -> Settings {
        self.settings
    }

    /// Where the current job is in its lifecycle.
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Extrusion, in millimeters, at which each tool should pause.
    pub fn pause_thresholds(&self) -> &BTreeMap<usize, f64> {
        &self.pause_thresholds
    }

    /// Apply new settings. Pause thresholds are recomputed if the reserve
    /// changed.
    pub fn set_settings(&mut self, settings: Settings) {
        let threshold_changed = settings.pause_threshold != self.settings.pause_threshold;
        self.settings = settings;
        self.odometer.set_g90_extruder(settings.g90_influences_extruder);

        if threshold_changed {
            self.update_pause_thresholds();
        }
    }

    /// React to a print job event. Returns the usage written to the inventory,
    /// if the event caused a flush.
    pub fn on_event(&mut self, event: PrintEvent) -> Option<UsageReport> {
        tracing::debug!(%event, state = %self.state, "print event");

        match event {
            PrintEvent::Started => {
                self.odometer.reset();
                self.state = JobState::Printing;
                self.update_pause_thresholds();
                tracing::debug!(
                    odometer = self.settings.enable_odometer,
                    auto_pause = self.settings.enable_odometer && self.settings.auto_pause,
                    "print started"
                );
                None
            }
            PrintEvent::Paused | PrintEvent::FilamentChange => {
                if self.state == JobState::Idle {
                    return None;
                }
                let report = self.flush();
                self.odometer.reset_extruded_length();
                if event == PrintEvent::Paused {
                    self.state = JobState::Paused;
                }
                report
            }
            PrintEvent::Resumed => {
                if self.state == JobState::Paused {
                    self.state = JobState::Printing;
                    // The spool may have been swapped while paused.
                    self.update_pause_thresholds();
                }
                None
            }
            PrintEvent::Done | PrintEvent::Failed | PrintEvent::Cancelled => {
                if self.state == JobState::Idle {
                    tracing::debug!(%event, "no active job; ignoring");
                    return None;
                }
                self.state = JobState::Idle;
                self.flush()
            }
        }
    }

    /// React to a change in the inventory. Any change to profiles, spools or
    /// selections can move a pause threshold, so they are all recomputed.
    pub fn on_data_modified(&mut self, table: Table) {
        tracing::debug!(%table, "inventory changed");
        self.update_pause_thresholds();
    }

    /// Hotend temperature offset for every tool, taken from the spool loaded
    /// in it. Tools below the printer's tool count with nothing loaded get 0.
    pub fn temperature_offsets(&self) -> Result<BTreeMap<usize, i32>, S::Error> {
        let mut offsets: BTreeMap<usize, i32> = (0..self.tool_count).map(|tool| (tool, 0)).collect();
        for selection in self.store.selections(&self.client_id)? {
            let offset = selection.spool.map_or(0, |spool| spool.temp_offset);
            offsets.insert(selection.tool, offset);
        }
        Ok(offsets)
    }

    /// Feed one sent line of G-code. Lines are only tracked while a job is
    /// printing and the odometer is enabled.
    pub fn on_gcode_sent(&mut self, gcode: &str, raw_command: &str) -> SendOutcome {
        if !self.settings.enable_odometer || self.state != JobState::Printing {
            return SendOutcome::default();
        }

        let consumed = self.odometer.parse(gcode, raw_command);
        let usage = if !consumed && gcode == FILAMENT_CHANGE {
            self.on_event(PrintEvent::FilamentChange)
        } else {
            None
        };

        let pause = self.settings.auto_pause && self.check_threshold();
        if pause {
            tracing::info!(tool = self.odometer.current_tool(), "filament is running out, pausing print");
        }

        SendOutcome { consumed, pause, usage }
    }

    /// Feed one parsed line of G-code.
    pub fn on_line(&mut self, line: &GcodeLine) -> SendOutcome {
        self.on_gcode_sent(line.mnemonic(), line.raw())
    }

    /// Whether the current tool has extruded past its pause threshold.
    pub fn check_threshold(&self) -> bool {
        let tool = self.odometer.current_tool();
        match (self.pause_thresholds.get(&tool), self.odometer.extrusion().get(tool)) {
            (Some(threshold), Some(extruded)) => extruded >= threshold,
            _ => false,
        }
    }

    /// Recompute, for every selected spool, how much can be extruded before
    /// only the configured reserve is left. Spools whose profile has a zero
    /// diameter or density get no threshold.
    pub fn update_pause_thresholds(&mut self) {
        self.pause_thresholds.clear();

        let selections = match self.store.selections(&self.client_id) {
            Ok(selections) => selections,
            Err(err) => {
                tracing::error!(
                    error = %err,
                    "failed to fetch selected spools, pause feature will not be available"
                );
                return;
            }
        };

        for selection in selections {
            let Some(spool) = selection.spool else {
                continue;
            };

            match usage::remaining_length(&spool.profile, spool.remaining()) {
                Ok(length) => {
                    self.pause_thresholds
                        .insert(selection.tool, length - self.settings.pause_threshold);
                }
                Err(err) => {
                    tracing::warn!(
                        tool = selection.tool,
                        spool = %spool.label(),
                        error = %err,
                        "pause feature not available for selected spool"
                    );
                }
            }
        }

        tracing::debug!(thresholds = ?self.pause_thresholds, "updated pause thresholds");
    }

    /// Write the filament extruded so far to the spools loaded in each tool.
    ///
    /// Only tools below the printer's tool count are recorded. A tool without
    /// a spool, or one whose spool cannot be updated, is logged and skipped.
    pub fn update_filament_usage(&mut self) -> UsageReport {
        let extrusion = self.odometer.extrusion().to_vec();
        let tools = self.tool_count.min(extrusion.len());
        tracing::info!(
            tool_count = self.tool_count,
            tracked = extrusion.len(),
            values = ?extrusion,
            "updating filament usage"
        );

        let mut report = UsageReport::default();
        for (tool, length) in extrusion.into_iter().enumerate().take(tools) {
            tracing::info!(tool, length_mm = length, "filament used");

            match self.record_usage(tool, length) {
                Ok(Some(usage)) => report.tools.push(usage),
                Ok(None) => tracing::warn!(tool, "no selected spool"),
                Err(err) => tracing::error!(tool, error = format!("{:?}", err), "failed to update filament"),
            }
        }

        // Remaining weights changed, so did the thresholds.
        self.update_pause_thresholds();
        report
    }

    fn flush(&mut self) -> Option<UsageReport> {
        if !self.settings.enable_odometer {
            return None;
        }
        Some(self.update_filament_usage())
    }

    fn record_usage(&self, tool: usize, length: f64) -> Result<Option<ToolUsage>> {
        let selection = self
            .store
            .selection(tool, &self.client_id)
            .context("fetching selection")?;
        let Some(mut spool) = selection.spool else {
            return Ok(None);
        };

        let mass = usage::length_to_mass(&spool.profile, length);
        let old = spool.remaining();
        spool.used += mass;
        self.store.update_spool(&spool).context("writing spool")?;

        tracing::info!(
            spool = %spool.label(),
            old_g = old,
            new_g = spool.remaining(),
            diff_g = -mass,
            "updated remaining filament on spool"
        );

        Ok(Some(ToolUsage {
            tool,
            spool_id: spool.id,
            length_mm: length,
            mass_g: mass,
            remaining_g: spool.remaining(),
        }))
    }
}
