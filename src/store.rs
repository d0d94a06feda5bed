//! An in-memory [SpoolStore], used by the command line tool and tests.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parse_display::{Display, FromStr};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    inventory::{Profile, Selection, Spool, SpoolRecord},
    SpoolStore,
};

/// The tables whose modification time is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromStr, Deserialize, Serialize, JsonSchema)]
#[display(style = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Table {
    /// Material profiles.
    Profiles,

    /// Spools.
    Spools,

    /// Tool selections.
    Selections,
}

/// Errors returned by [InMemoryStore].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No profile with this id exists.
    #[error("no profile with id {0}")]
    UnknownProfile(u64),

    /// No spool with this id exists.
    #[error("no spool with id {0}")]
    UnknownSpool(u64),
}

/// Profiles, spools and selections held in concurrent maps.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    profiles: DashMap<u64, Profile>,
    spools: DashMap<u64, SpoolRecord>,
    selections: DashMap<(String, usize), u64>,
    modified: DashMap<Table, DateTime<Utc>>,
    next_id: AtomicU64,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a profile, replacing any with the same id.
    pub fn insert_profile(&self, profile: Profile) {
        self.reserve_id(profile.id);
        self.profiles.insert(profile.id, profile);
        self.touch(Table::Profiles);
    }

    /// Create a profile with a fresh id.
    pub fn create_profile(&self, vendor: &str, material: &str, density: f64, diameter: f64) -> Profile {
        let profile = Profile {
            id: self.allocate_id(),
            vendor: vendor.to_owned(),
            material: material.to_owned(),
            density,
            diameter,
        };
        self.insert_profile(profile.clone());
        profile
    }

    /// Insert a spool, replacing any with the same id. The referenced profile
    /// must already exist.
    pub fn insert_spool(&self, record: SpoolRecord) -> Result<Spool, StoreError> {
        let profile = self.profile(record.profile)?;
        self.reserve_id(record.id);

        let spool = join(&record, profile);
        self.spools.insert(record.id, record);
        self.touch(Table::Spools);
        Ok(spool)
    }

    /// Create a full, unused spool with a fresh id.
    pub fn create_spool(&self, name: &str, profile: u64, weight: f64) -> Result<Spool, StoreError> {
        self.insert_spool(SpoolRecord {
            id: self.allocate_id(),
            name: name.to_owned(),
            profile,
            cost: 0.0,
            weight,
            used: 0.0,
            temp_offset: 0,
        })
    }

    /// Remove a spool, unloading it from every tool it was selected in.
    pub fn delete_spool(&self, id: u64) -> Result<(), StoreError> {
        self.spools.remove(&id).ok_or(StoreError::UnknownSpool(id))?;
        self.touch(Table::Spools);

        let before = self.selections.len();
        self.selections.retain(|_, spool| *spool != id);
        if self.selections.len() != before {
            self.touch(Table::Selections);
        }
        Ok(())
    }

    /// Load a spool into a tool for a host client, or unload the tool with
    /// `None`.
    pub fn select_spool(&self, tool: usize, client_id: &str, spool: Option<u64>) -> Result<Selection, StoreError> {
        let key = (client_id.to_owned(), tool);
        match spool {
            Some(id) => {
                let spool = self.spool(id)?;
                self.selections.insert(key, id);
                self.touch(Table::Selections);
                Ok(Selection {
                    tool,
                    client_id: client_id.to_owned(),
                    spool: Some(spool),
                })
            }
            None => {
                if self.selections.remove(&key).is_some() {
                    self.touch(Table::Selections);
                }
                Ok(Selection {
                    tool,
                    client_id: client_id.to_owned(),
                    spool: None,
                })
            }
        }
    }

    /// Look up a profile.
    pub fn profile(&self, id: u64) -> Result<Profile, StoreError> {
        self.profiles
            .get(&id)
            .map(|profile| profile.value().clone())
            .ok_or(StoreError::UnknownProfile(id))
    }

    /// Look up a spool together with its profile.
    pub fn spool(&self, id: u64) -> Result<Spool, StoreError> {
        let record = self
            .spools
            .get(&id)
            .map(|record| record.value().clone())
            .ok_or(StoreError::UnknownSpool(id))?;
        let profile = self.profile(record.profile)?;
        Ok(join(&record, profile))
    }

    /// All profiles, ordered by id.
    pub fn profiles(&self) -> Vec<Profile> {
        let mut profiles: Vec<Profile> = self.profiles.iter().map(|entry| entry.value().clone()).collect();
        profiles.sort_by_key(|profile| profile.id);
        profiles
    }

    /// All spools, ordered by id. Spools whose profile went missing are
    /// skipped.
    pub fn spools(&self) -> Vec<Spool> {
        let ids: Vec<u64> = self.spools.iter().map(|entry| *entry.key()).collect();
        let mut spools: Vec<Spool> = ids
            .into_iter()
            .filter_map(|id| match self.spool(id) {
                Ok(spool) => Some(spool),
                Err(err) => {
                    tracing::warn!(spool = id, error = %err, "skipping spool");
                    None
                }
            })
            .collect();
        spools.sort_by_key(|spool| spool.id);
        spools
    }

    /// When a table was last written to, if ever.
    pub fn last_modified(&self, table: Table) -> Option<DateTime<Utc>> {
        self.modified.get(&table).map(|modified| *modified.value())
    }

    fn touch(&self, table: Table) {
        self.modified.insert(table, Utc::now());
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn reserve_id(&self, id: u64) {
        self.next_id.fetch_max(id, Ordering::Relaxed);
    }
}

impl SpoolStore for InMemoryStore {
    type Error = StoreError;

    fn selections(&self, client_id: &str) -> Result<Vec<Selection>, StoreError> {
        let loaded: Vec<(usize, u64)> = self
            .selections
            .iter()
            .filter(|entry| entry.key().0 == client_id)
            .map(|entry| (entry.key().1, *entry.value()))
            .collect();

        let mut selections = loaded
            .into_iter()
            .map(|(tool, id)| {
                Ok(Selection {
                    tool,
                    client_id: client_id.to_owned(),
                    spool: Some(self.spool(id)?),
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        selections.sort_by_key(|selection| selection.tool);
        Ok(selections)
    }

    fn selection(&self, tool: usize, client_id: &str) -> Result<Selection, StoreError> {
        let loaded = self
            .selections
            .get(&(client_id.to_owned(), tool))
            .map(|entry| *entry.value());

        Ok(Selection {
            tool,
            client_id: client_id.to_owned(),
            spool: loaded.map(|id| self.spool(id)).transpose()?,
        })
    }

    fn update_spool(&self, spool: &Spool) -> Result<(), StoreError> {
        self.profile(spool.profile.id)?;

        let mut record = self.spools.get_mut(&spool.id).ok_or(StoreError::UnknownSpool(spool.id))?;
        record.name.clone_from(&spool.name);
        record.profile = spool.profile.id;
        record.cost = spool.cost;
        record.weight = spool.weight;
        record.used = spool.used;
        record.temp_offset = spool.temp_offset;
        drop(record);

        self.touch(Table::Spools);
        Ok(())
    }
}

fn join(record: &SpoolRecord, profile: Profile) -> Spool {
    Spool {
        id: record.id,
        name: record.name.clone(),
        profile,
        cost: record.cost,
        weight: record.weight,
        used: record.used,
        temp_offset: record.temp_offset,
    }
}
