//! Filament inventory records: material profiles, spools, and which spool is
//! loaded in which tool.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Material properties shared by every spool of the same filament.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct Profile {
    /// Profile id.
    pub id: u64,

    /// Filament vendor, e.g. "Prusament".
    #[serde(default)]
    pub vendor: String,

    /// Material name, e.g. "PLA".
    #[serde(default)]
    pub material: String,

    /// Density in g/cm³.
    pub density: f64,

    /// Filament diameter in millimeters.
    pub diameter: f64,
}

/// A roll of filament, as stored: the profile is referenced by id.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct SpoolRecord {
    /// Spool id.
    pub id: u64,

    /// Display name of the spool.
    #[serde(default)]
    pub name: String,

    /// Id of the [Profile] describing the filament on this spool.
    pub profile: u64,

    /// Purchase price.
    #[serde(default)]
    pub cost: f64,

    /// Net weight of filament on a full spool, in grams.
    pub weight: f64,

    /// Filament used so far, in grams.
    #[serde(default)]
    pub used: f64,

    /// Offset added to the hotend temperature while this spool is loaded.
    #[serde(default)]
    pub temp_offset: i32,
}

/// A roll of filament together with its material profile.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct Spool {
    /// Spool id.
    pub id: u64,

    /// Display name of the spool.
    pub name: String,

    /// Material profile of the filament on this spool.
    pub profile: Profile,

    /// Purchase price.
    pub cost: f64,

    /// Net weight of filament on a full spool, in grams.
    pub weight: f64,

    /// Filament used so far, in grams.
    pub used: f64,

    /// Offset added to the hotend temperature while this spool is loaded.
    pub temp_offset: i32,
}

impl Spool {
    /// Filament left on the spool, in grams.
    pub fn remaining(&self) -> f64 {
        self.weight - self.used
    }

    /// Human readable `name - material (vendor)` label.
    pub fn label(&self) -> String {
        format!("{} - {} ({})", self.name, self.profile.material, self.profile.vendor)
    }
}

/// Which spool a host client has loaded into a tool.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct Selection {
    /// Tool index.
    pub tool: usize,

    /// Host client the selection belongs to.
    pub client_id: String,

    /// The loaded spool, if any.
    pub spool: Option<Spool>,
}
