//! Traits at the boundary between the filament tracker and the things it does
//! not own: where spools are stored, and how a print gets paused.

use std::{error::Error, future::Future};

use crate::inventory::{Selection, Spool};

/// Storage for spools and tool selections.
///
/// Methods take `&self`; implementations that need mutation behind the scenes
/// are expected to handle their own interior locking.
pub trait SpoolStore {
    /// Error type returned by this trait.
    type Error: Error + Send + Sync + 'static;

    /// All selections of the given host client, ordered by tool.
    fn selections(&self, client_id: &str) -> Result<Vec<Selection>, Self::Error>;

    /// The selection for one tool. A tool with nothing loaded yields a
    /// [Selection] without spool.
    fn selection(&self, tool: usize, client_id: &str) -> Result<Selection, Self::Error>;

    /// Persist changes made to a spool (typically its `used` weight).
    fn update_spool(&self, spool: &Spool) -> Result<(), Self::Error>;
}

impl<T> SpoolStore for &T
where
    T: SpoolStore + ?Sized,
{
    type Error = T::Error;

    fn selections(&self, client_id: &str) -> Result<Vec<Selection>, Self::Error> {
        (**self).selections(client_id)
    }

    fn selection(&self, tool: usize, client_id: &str) -> Result<Selection, Self::Error> {
        (**self).selection(tool, client_id)
    }

    fn update_spool(&self, spool: &Spool) -> Result<(), Self::Error> {
        (**self).update_spool(spool)
    }
}

/// PauseControl is implemented by whatever can pause and resume the print
/// currently running on the printer.
pub trait PauseControl {
    /// Error type returned by this trait.
    type Error: Error + Send + Sync + 'static;

    /// Request that the printer pause the current job, which may be resumed
    /// later.
    fn pause(&mut self) -> impl Future<Output = Result<(), Self::Error>>;

    /// Request that the printer resume the paused job.
    fn resume(&mut self) -> impl Future<Output = Result<(), Self::Error>>;
}
