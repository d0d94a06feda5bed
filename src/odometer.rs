//! The extrusion odometer follows the E axis of the G-code stream sent to a
//! printer and keeps, for every tool, a running account of how much filament
//! has been pulled off the spool.
//!
//! The odometer only understands the handful of commands that change how an
//! `E` value is interpreted:
//!
//! | command      | effect                                                  |
//! |--------------|---------------------------------------------------------|
//! | `G0`, `G1`   | extrude (or retract) by the `E` word, if present        |
//! | `G90`, `G91` | absolute / relative positioning                         |
//! | `G92`        | redefine the current `E` position without moving        |
//! | `M82`, `M83` | absolute / relative extruder                            |
//! | `T<n>`       | select tool `n`, growing the per-tool ledgers as needed |
//!
//! Everything else is ignored.

use parse_display::Display;

use crate::gcode::{e_value, tool_index};

/// Number of tool slots an [Odometer] will track at most. Selecting a tool
/// index at or beyond this is ignored.
pub const MAX_TOOLS: usize = 256;

/// How a coordinate on a move command is interpreted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display(style = "snake_case")]
pub enum PositioningMode {
    /// Coordinates are absolute positions.
    #[default]
    Absolute,

    /// Coordinates are offsets from the current position.
    Relative,
}

/// Per-tool extrusion ledger fed one G-code command at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct Odometer {
    positioning_mode: PositioningMode,
    extruder_mode: PositioningMode,
    g90_influences_extruder: bool,
    current_tool: usize,

    last_position: Vec<f64>,
    total_extrusion: Vec<f64>,
    max_extrusion: Vec<f64>,
}

impl Default for Odometer {
    fn default() -> Self {
        Self::new()
    }
}

impl Odometer {
    /// Create an odometer tracking a single tool, in absolute mode, with
    /// `G90`/`G91` also switching the extruder mode.
    pub fn new() -> Self {
        Self {
            positioning_mode: PositioningMode::Absolute,
            extruder_mode: PositioningMode::Absolute,
            g90_influences_extruder: true,
            current_tool: 0,
            last_position: vec![0.0],
            total_extrusion: vec![0.0],
            max_extrusion: vec![0.0],
        }
    }

    /// Choose whether `G90`/`G91` also govern the extruder (as Marlin
    /// does), or whether only `M82`/`M83` do.
    pub fn set_g90_extruder(&mut self, enabled: bool) {
        self.g90_influences_extruder = enabled;
    }

    /// Start over for a new print job. All counters and positions go back to
    /// zero and both modes to absolute; the number of tracked tools is kept.
    pub fn reset(&mut self) {
        self.positioning_mode = PositioningMode::Absolute;
        self.extruder_mode = PositioningMode::Absolute;
        self.current_tool = 0;

        for ledger in [&mut self.last_position, &mut self.total_extrusion, &mut self.max_extrusion] {
            ledger.fill(0.0);
        }
    }

    /// Forget the filament extruded so far, but keep the last known `E`
    /// positions so the next absolute move is measured against where the
    /// extruder really is.
    pub fn reset_extruded_length(&mut self) {
        self.total_extrusion.fill(0.0);
        self.max_extrusion.fill(0.0);
    }

    /// Feed one command to the odometer. `gcode` is the normalized mnemonic
    /// (`G1`, `M83`, `T2`) and `raw_command` the full line the operands are
    /// read from.
    ///
    /// Returns `true` if the command is one the odometer tracks, even when it
    /// carried no `E` word.
    pub fn parse(&mut self, gcode: &str, raw_command: &str) -> bool {
        match gcode {
            "G0" | "G1" => {
                if let Some(e) = e_value(raw_command) {
                    self.extrude(e);
                }
                true
            }
            "G90" => {
                self.set_positioning_mode(PositioningMode::Absolute);
                true
            }
            "G91" => {
                self.set_positioning_mode(PositioningMode::Relative);
                true
            }
            "G92" => {
                if let Some(e) = e_value(raw_command) {
                    self.last_position[self.current_tool] = e;
                }
                true
            }
            "M82" => {
                self.extruder_mode = PositioningMode::Absolute;
                true
            }
            "M83" => {
                self.extruder_mode = PositioningMode::Relative;
                true
            }
            _ if gcode.starts_with('T') => match tool_index(raw_command) {
                Some(tool) => self.select_tool(tool),
                None => false,
            },
            _ => false,
        }
    }

    /// Filament extruded per tool since the last reset, in millimeters.
    ///
    /// This is the high-water mark of each tool's running total, so filament
    /// that was retracted and primed again is only counted once.
    pub fn extrusion(&self) -> &[f64] {
        &self.max_extrusion
    }

    /// The running total per tool, including any retraction that has not
    /// been primed back yet.
    pub fn total_extrusion(&self) -> &[f64] {
        &self.total_extrusion
    }

    /// Last known absolute `E` position per tool.
    pub fn last_position(&self) -> &[f64] {
        &self.last_position
    }

    /// The tool selected by the most recent `T` command.
    pub fn current_tool(&self) -> usize {
        self.current_tool
    }

    /// Number of tools currently tracked.
    pub fn tool_count(&self) -> usize {
        self.max_extrusion.len()
    }

    /// The axis positioning mode set by `G90`/`G91`.
    pub fn positioning_mode(&self) -> PositioningMode {
        self.positioning_mode
    }

    /// How `E` words are interpreted right now. The extruder is relative if
    /// `M83` made it so, or, while `G90`/`G91` apply to it, if positioning is
    /// relative.
    pub fn effective_extruder_mode(&self) -> PositioningMode {
        let relative_axes = self.g90_influences_extruder && self.positioning_mode == PositioningMode::Relative;
        if self.extruder_mode == PositioningMode::Relative || relative_axes {
            PositioningMode::Relative
        } else {
            PositioningMode::Absolute
        }
    }

    fn set_positioning_mode(&mut self, mode: PositioningMode) {
        self.positioning_mode = mode;
        // Marlin's G90 also drops relative extrusion.
        if self.g90_influences_extruder && mode == PositioningMode::Absolute {
            self.extruder_mode = PositioningMode::Absolute;
        }
    }

    fn extrude(&mut self, e: f64) {
        let tool = self.current_tool;

        let delta = match self.effective_extruder_mode() {
            PositioningMode::Absolute => {
                let delta = e - self.last_position[tool];
                self.last_position[tool] = e;
                delta
            }
            PositioningMode::Relative => {
                self.last_position[tool] += e;
                e
            }
        };

        self.total_extrusion[tool] += delta;
        self.max_extrusion[tool] = self.max_extrusion[tool].max(self.total_extrusion[tool]);
    }

    fn select_tool(&mut self, tool: usize) -> bool {
        if tool >= MAX_TOOLS {
            tracing::warn!(tool, max = MAX_TOOLS - 1, "tool index out of range; ignoring");
            return false;
        }

        if tool >= self.max_extrusion.len() {
            tracing::debug!(tool, "tracking new tool");
            for ledger in [&mut self.last_position, &mut self.total_extrusion, &mut self.max_extrusion] {
                ledger.resize(tool + 1, 0.0);
            }
        }

        self.current_tool = tool;
        true
    }
}
