//! Code for the configuration of the application.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    inventory::{Profile, SpoolRecord},
    store::InMemoryStore,
};

/// The configuration of the application.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Id of this host client. Selections are stored per client, so two
    /// hosts sharing an inventory each keep their own tool assignments. A v4
    /// uuid is generated once, when the config is loaded, if none is set.
    #[serde(default = "generate_client_id")]
    pub client_id: String,

    /// Number of extruders on the printer. Usage is only recorded for tools
    /// below this count.
    #[serde(default = "default_tool_count")]
    pub tool_count: usize,

    /// Tracking behaviour.
    #[serde(default)]
    pub settings: Settings,

    /// Material profiles to load into the inventory.
    #[serde(default)]
    pub profiles: Vec<Profile>,

    /// Spools to load into the inventory.
    #[serde(default)]
    pub spools: Vec<SpoolRecord>,

    /// Spools loaded into each tool.
    #[serde(default)]
    pub selections: Vec<SelectionConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: generate_client_id(),
            tool_count: default_tool_count(),
            settings: Settings::default(),
            profiles: Vec::new(),
            spools: Vec::new(),
            selections: Vec::new(),
        }
    }
}

fn default_tool_count() -> usize {
    1
}

fn generate_client_id() -> String {
    let id = uuid::Uuid::new_v4().to_string();
    tracing::debug!(client_id = %id, "no client id configured; generated one");
    id
}

impl Config {
    /// Parse a configuration from a toml file.
    pub fn from_file(file: &Path) -> Result<Self> {
        let config = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
        Self::from_str(&config)
    }

    /// Parse a configuration from a toml string.
    pub fn from_str(config: &str) -> Result<Self> {
        Ok(toml::from_str(config)?)
    }

    /// The id selections are made under.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Build an in-memory store holding the configured inventory, with the
    /// selections made for `client_id`.
    pub fn build_store(&self, client_id: &str) -> Result<InMemoryStore> {
        let store = InMemoryStore::new();

        for profile in &self.profiles {
            store.insert_profile(profile.clone());
        }

        for spool in &self.spools {
            store
                .insert_spool(spool.clone())
                .with_context(|| format!("loading spool {}", spool.id))?;
        }

        for selection in &self.selections {
            store
                .select_spool(selection.tool, client_id, selection.spool)
                .with_context(|| format!("selecting spool for tool {}", selection.tool))?;
        }

        Ok(store)
    }
}

/// Tracking behaviour settings.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Track extrusion while printing.
    pub enable_odometer: bool,

    /// Ask for a pause when the loaded spool is about to run out.
    pub auto_pause: bool,

    /// Filament, in millimeters, to keep on the spool when pausing.
    pub pause_threshold: f64,

    /// Whether `G90`/`G91` also switch the extruder between absolute and
    /// relative mode.
    pub g90_influences_extruder: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enable_odometer: true,
            auto_pause: false,
            pause_threshold: 100.0,
            g90_influences_extruder: true,
        }
    }
}

/// The spool loaded into a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct SelectionConfig {
    /// Tool index.
    pub tool: usize,

    /// Spool id, or nothing for an empty tool.
    pub spool: Option<u64>,
}
